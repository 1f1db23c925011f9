//! The type-factory façade (spec §6.3): a read-only, queried interface
//! onto the decompiler's data-type system. The core never constructs or
//! mutates data-types; it only asks this trait questions while resolving
//! pointer arithmetic into struct-field/array-element access.

use std::rc::Rc;

/// The closed set of type categories spec §6.3 lists
/// (`get_metatype()`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metatype {
    /// Unsigned integer.
    Uint,
    /// Signed integer.
    Int,
    /// Pointer to another type.
    Ptr,
    /// Fixed-length array of a uniform element type.
    Array,
    /// Aggregate with named, individually-typed fields.
    Struct,
    /// The stack/frame pointer's pseudo-type.
    Spacebase,
    /// IEEE floating point.
    Float,
    /// No further structure is known.
    Unknown,
}

/// A sub-type found at a byte offset within a composite type, along with
/// the offset remaining to be resolved inside *it* (spec §6.3
/// `get_sub_type`: `(offset, &mut new_offset)`).
#[derive(Debug, Clone)]
pub struct SubType {
    /// The field or element type found.
    pub datatype: Rc<dyn Datatype>,
    /// Offset remaining within `datatype` once the containing field/element
    /// has been selected.
    pub remaining_offset: i64,
}

/// A sub-type located by the nearest-arrayed-component search, along with
/// where the array itself starts and its element size (spec §6.3
/// `nearest_arrayed_component_{backward,forward}`).
#[derive(Debug, Clone)]
pub struct ArrayedComponent {
    /// The array (or array-like) type found.
    pub datatype: Rc<dyn Datatype>,
    /// Byte offset, relative to the type being searched, at which the
    /// array begins.
    pub found_offset: i64,
    /// Size in bytes of one array element.
    pub element_size: u32,
}

/// The read-only query surface onto a single data-type (spec §6.3).
///
/// Implementations are expected to be cheap to clone (typically an `Rc`
/// wrapping interned type data) since rules freely pass them around while
/// walking an `AddTreeState` (spec §4.4 "Pointer arithmetic").
pub trait Datatype: std::fmt::Debug {
    /// Size in bytes.
    fn get_size(&self) -> u32;
    /// Required alignment in bytes.
    fn get_align_size(&self) -> u32;
    /// The type category.
    fn get_metatype(&self) -> Metatype;
    /// `true` for `char`-like types the emitter would print as a
    /// character rather than a numeral.
    fn is_char_print(&self) -> bool {
        false
    }
    /// `true` if this type's in-memory layout is expected to be rebuilt
    /// from a `PIECE` tree rather than read as a scalar (spec
    /// "piece_structure").
    fn is_piece_structured(&self) -> bool {
        false
    }
    /// `true` for types whose size isn't fixed until instantiated
    /// (flexible array members and similar).
    fn is_variable_length(&self) -> bool {
        false
    }
    /// `true` if this is a pointer-relative type: a pointer whose
    /// compile-time value is known to be an offset within a parent
    /// structure (spec glossary "Pointer-relative type").
    fn is_formal_pointer_rel(&self) -> bool {
        false
    }
    /// `true` for enum types.
    fn is_enum_type(&self) -> bool {
        false
    }

    /// Looks up the direct field/element at `offset` bytes into this type.
    fn get_sub_type(&self, offset: i64) -> Option<SubType> {
        let _ = offset;
        None
    }

    /// Finds the nearest array-like component at or before `offset`.
    fn nearest_arrayed_component_backward(&self, offset: i64) -> Option<ArrayedComponent> {
        let _ = offset;
        None
    }

    /// Finds the nearest array-like component at or after `offset`.
    fn nearest_arrayed_component_forward(&self, offset: i64) -> Option<ArrayedComponent> {
        let _ = offset;
        None
    }

    /// For pointer types: the type pointed to.
    fn get_ptr_to(&self) -> Option<Rc<dyn Datatype>> {
        None
    }
    /// For pointer types: the addressable word size pointer arithmetic is
    /// scaled by (usually the pointee's size, but may differ for
    /// bit-addressed targets).
    fn get_word_size(&self) -> u32 {
        1
    }

    /// For pointer-relative types: the parent structure.
    fn get_parent(&self) -> Option<Rc<dyn Datatype>> {
        None
    }
    /// For pointer-relative types: the compile-time-known offset within
    /// the parent this pointer refers to.
    fn get_address_offset(&self) -> i64 {
        0
    }
    /// For pointer-relative types: the byte offset within the parent's
    /// layout (may differ from `get_address_offset` when the parent has
    /// its own base adjustment).
    fn get_byte_offset(&self) -> i64 {
        0
    }
    /// Resolves `off` as if it had been evaluated through this type's
    /// parent instead of through this type directly — used when
    /// `AddTreeState` must choose between the pointer-relative and raw
    /// forms (spec §4.4 step 4).
    fn evaluate_thru_parent(&self, off: i64) -> i64 {
        off
    }

    /// Rebuilds the precise field type covering `[offset, offset+size)`,
    /// for reconstructing a `CONCAT`/`PIECE` tree's element types (spec
    /// §6.3 `get_exact_piece`).
    fn get_exact_piece(&self, offset: i64, size: u32) -> Option<Rc<dyn Datatype>> {
        let _ = (offset, size);
        None
    }
}

/// A fixed-size primitive (`int`, `uint`, `float`, ...).
#[derive(Debug, Clone)]
pub struct Primitive {
    /// Byte size.
    pub size: u32,
    /// Category.
    pub metatype: Metatype,
    /// `true` if this primitive should print as a character.
    pub char_print: bool,
}

impl Datatype for Primitive {
    fn get_size(&self) -> u32 {
        self.size
    }
    fn get_align_size(&self) -> u32 {
        self.size.max(1)
    }
    fn get_metatype(&self) -> Metatype {
        self.metatype
    }
    fn is_char_print(&self) -> bool {
        self.char_print
    }
}

/// A named field within a [`Struct`].
#[derive(Debug, Clone)]
pub struct Field {
    /// Field name (diagnostic only; the core never prints it).
    pub name: String,
    /// Byte offset of the field within the struct.
    pub offset: i64,
    /// The field's type.
    pub datatype: Rc<dyn Datatype>,
}

/// A C-like struct: fields at fixed byte offsets, no overlap.
#[derive(Debug, Clone)]
pub struct Struct {
    /// Total size in bytes (may exceed the sum of fields due to padding).
    pub size: u32,
    /// Required alignment.
    pub align: u32,
    /// Fields in ascending offset order.
    pub fields: Vec<Field>,
}

impl Datatype for Struct {
    fn get_size(&self) -> u32 {
        self.size
    }
    fn get_align_size(&self) -> u32 {
        self.align
    }
    fn get_metatype(&self) -> Metatype {
        Metatype::Struct
    }

    fn get_sub_type(&self, offset: i64) -> Option<SubType> {
        if offset < 0 || offset as u64 >= self.size as u64 {
            return None;
        }
        // Last field whose offset is <= the query offset (spec §6.3:
        // "the direct field/element at offset"); an opaque struct with no
        // matching field is "no sub-type at this offset" (spec §7.4).
        let field = self
            .fields
            .iter()
            .filter(|f| f.offset <= offset)
            .max_by_key(|f| f.offset)?;
        let remaining = offset - field.offset;
        if remaining as u64 >= field.datatype.get_size() as u64 {
            return None;
        }
        Some(SubType {
            datatype: field.datatype.clone(),
            remaining_offset: remaining,
        })
    }

    fn nearest_arrayed_component_backward(&self, offset: i64) -> Option<ArrayedComponent> {
        self.fields
            .iter()
            .filter(|f| f.offset <= offset && f.datatype.get_metatype() == Metatype::Array)
            .max_by_key(|f| f.offset)
            .map(|f| ArrayedComponent {
                datatype: f.datatype.clone(),
                found_offset: f.offset,
                element_size: f
                    .datatype
                    .get_ptr_to()
                    .map(|t| t.get_size())
                    .unwrap_or(f.datatype.get_size()),
            })
    }

    fn nearest_arrayed_component_forward(&self, offset: i64) -> Option<ArrayedComponent> {
        self.fields
            .iter()
            .filter(|f| f.offset >= offset && f.datatype.get_metatype() == Metatype::Array)
            .min_by_key(|f| f.offset)
            .map(|f| ArrayedComponent {
                datatype: f.datatype.clone(),
                found_offset: f.offset,
                element_size: f
                    .datatype
                    .get_ptr_to()
                    .map(|t| t.get_size())
                    .unwrap_or(f.datatype.get_size()),
            })
    }
}

/// A fixed-length array of a uniform element type.
#[derive(Debug, Clone)]
pub struct Array {
    /// Element type.
    pub element: Rc<dyn Datatype>,
    /// Number of elements.
    pub count: u32,
}

impl Datatype for Array {
    fn get_size(&self) -> u32 {
        self.element.get_size() * self.count
    }
    fn get_align_size(&self) -> u32 {
        self.element.get_align_size()
    }
    fn get_metatype(&self) -> Metatype {
        Metatype::Array
    }
    fn get_ptr_to(&self) -> Option<Rc<dyn Datatype>> {
        Some(self.element.clone())
    }

    fn get_sub_type(&self, offset: i64) -> Option<SubType> {
        let elsize = self.element.get_size() as i64;
        if elsize == 0 || offset < 0 || offset >= elsize * self.count as i64 {
            return None;
        }
        Some(SubType {
            datatype: self.element.clone(),
            remaining_offset: offset % elsize,
        })
    }
}

/// A pointer to another type.
#[derive(Debug, Clone)]
pub struct Pointer {
    /// Pointee type.
    pub pointee: Rc<dyn Datatype>,
    /// Pointer width in bytes.
    pub size: u32,
}

impl Datatype for Pointer {
    fn get_size(&self) -> u32 {
        self.size
    }
    fn get_align_size(&self) -> u32 {
        self.size
    }
    fn get_metatype(&self) -> Metatype {
        Metatype::Ptr
    }
    fn get_ptr_to(&self) -> Option<Rc<dyn Datatype>> {
        Some(self.pointee.clone())
    }
    fn get_word_size(&self) -> u32 {
        self.pointee.get_size().max(1)
    }
}

/// A pointer whose value is known at compile time to be an offset within a
/// parent structure (spec glossary "Pointer-relative type").
#[derive(Debug, Clone)]
pub struct PointerRelative {
    /// The underlying pointer type.
    pub pointer: Pointer,
    /// The parent structure this pointer is relative to.
    pub parent: Rc<dyn Datatype>,
    /// Offset within `parent` this pointer's value designates.
    pub address_offset: i64,
}

impl Datatype for PointerRelative {
    fn get_size(&self) -> u32 {
        self.pointer.get_size()
    }
    fn get_align_size(&self) -> u32 {
        self.pointer.get_align_size()
    }
    fn get_metatype(&self) -> Metatype {
        Metatype::Ptr
    }
    fn get_ptr_to(&self) -> Option<Rc<dyn Datatype>> {
        self.pointer.get_ptr_to()
    }
    fn get_word_size(&self) -> u32 {
        self.pointer.get_word_size()
    }
    fn is_formal_pointer_rel(&self) -> bool {
        true
    }
    fn get_parent(&self) -> Option<Rc<dyn Datatype>> {
        Some(self.parent.clone())
    }
    fn get_address_offset(&self) -> i64 {
        self.address_offset
    }
    fn get_byte_offset(&self) -> i64 {
        self.address_offset
    }
    fn evaluate_thru_parent(&self, off: i64) -> i64 {
        self.address_offset + off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> Rc<dyn Datatype> {
        Rc::new(Primitive {
            size: 4,
            metatype: Metatype::Int,
            char_print: false,
        })
    }

    #[test]
    fn struct_sub_type_resolves_field_c_at_offset_8() {
        // S3: struct { int32 a; int32 b; int32 c; }
        let s = Struct {
            size: 12,
            align: 4,
            fields: vec![
                Field { name: "a".into(), offset: 0, datatype: int32() },
                Field { name: "b".into(), offset: 4, datatype: int32() },
                Field { name: "c".into(), offset: 8, datatype: int32() },
            ],
        };
        let sub = s.get_sub_type(8).expect("offset 8 resolves");
        assert_eq!(sub.remaining_offset, 0);
        assert_eq!(sub.datatype.get_size(), 4);
    }

    #[test]
    fn struct_sub_type_out_of_range_is_none() {
        let s = Struct { size: 4, align: 4, fields: vec![Field { name: "a".into(), offset: 0, datatype: int32() }] };
        assert!(s.get_sub_type(100).is_none());
    }

    #[test]
    fn array_sub_type_wraps_by_element_size() {
        let arr = Array { element: int32(), count: 4 };
        let sub = arr.get_sub_type(9).unwrap();
        assert_eq!(sub.remaining_offset, 1);
    }
}

//! Opaque arena handles (spec §9: "two arenas indexed by opaque integer
//! handles").

use std::fmt;

macro_rules! arena_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(u32);

        impl $name {
            /// Builds a handle from a raw arena index. Only
            /// [`crate::function_data::FunctionData`] should normally do
            /// this; exposed for test builders.
            pub const fn from_raw(index: u32) -> Self {
                $name(index)
            }

            /// The raw arena index.
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", stringify!($name), self.0)
            }
        }
    };
}

arena_id!(VarnodeId, "Handle into the Varnode arena.");
arena_id!(OpId, "Handle into the PcodeOp arena.");
arena_id!(BlockId, "Handle into the basic-block arena.");

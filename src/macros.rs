#[macro_export]
macro_rules! bits_ext {
    ($structname:ident, $trait:path, $len:literal, $t:ty) => {
        #[repr(transparent)]
        #[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
        pub struct $structname(Bits<$len, $t>);

        impl $trait for $structname {
            fn from_num(bits: $t) -> Self {
                Self(Bits::from(bits))
            }

            fn from_bits(bits: Vec<bool>) -> Self {
                Self(Bits::from_bits(bits))
            }

            fn to_inner(&self) -> $t {
                self.0.to_inner()
            }

            fn zero() -> Self {
                Self(Bits::from(0))
            }

            fn one() -> Self {
                Self(Bits::from(1))
            }

            fn bits(&self) -> &[bool] {
                self.0.bits()
            }
        }
    };
}

/// Generates a marker type carrying one `u64` associated constant per wire
/// frame-type code. A plain `enum` would collide here: an inherent impl
/// can't define a const with the same name as one of the enum's own
/// variants, and nothing in this crate pattern-matches on a `FrameType`
/// value directly — frame bodies are matched on [`crate::packet::frame::Frame`]
/// instead, so `FrameType` only ever needs to hand out wire-format codes.
#[macro_export]
macro_rules! frame {
    {$($typename:ident = $encoding:expr,)*} => {
        #[allow(non_camel_case_types)]
        pub struct FrameType;

        impl FrameType {
            $(pub const $typename: u64 = $encoding;)*
        }
    }
}

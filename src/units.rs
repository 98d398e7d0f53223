use crate::time::Delta;

macro_rules! unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            PartialEq,
            derive_more::Add,
            derive_more::Sub,
            derive_more::AddAssign,
            derive_more::SubAssign,
            derive_more::Sum,
            derive_more::Display,
            derive_more::FromStr,
            derive_more::From,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(f64);

        impl $name {
            pub const ZERO: $name = Self::new(0.0);

            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            pub const fn into_f64(self) -> f64 {
                self.0
            }

            pub fn scale_by(self, val: f64) -> Self {
                Self(self.0 * val)
            }

            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            /// Clamps into `[min, max]`. NaN collapses to `min`.
            pub fn clamp(self, min: Self, max: Self) -> Self {
                if self.0.is_nan() {
                    return min;
                }
                Self(self.0.clamp(min.0, max.0))
            }
        }
    };
}

unit!(Bits);
unit!(Bytes);

impl Bytes {
    pub fn into_bits(self) -> Bits {
        Bits::new(self.0 * 8.0)
    }
}

impl From<Bytes> for Bits {
    fn from(val: Bytes) -> Self {
        val.into_bits()
    }
}

// One kbps is one bit per millisecond, which keeps the conversions below free of scale factors.
unit!(Kbps);

impl Kbps {
    /// Time needed to push `size` bytes through a link of this rate.
    pub fn length(&self, size: Bytes) -> Delta {
        assert!(self.0 > 0.0, "rate must be positive, got {} kbps", self.0);
        if size == Bytes::ZERO {
            return Delta::ZERO;
        }
        Delta::new(size.into_bits().into_f64() / self.0)
    }

    /// Bytes this rate delivers over `delta`.
    pub fn width(&self, delta: Delta) -> Bytes {
        if delta == Delta::ZERO {
            return Bytes::ZERO;
        }
        Bytes::new(self.0 * delta.into_f64() / 8.0)
    }

    /// The rate at which `size` bytes cover `span`.
    pub fn over(size: Bytes, span: Delta) -> Kbps {
        Kbps::new(size.into_bits().into_f64() / span.into_f64())
    }
}

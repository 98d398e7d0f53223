use std::ops::{Add, AddAssign, Sub, SubAssign};

// Logical simulation time. Everything is kept in milliseconds.
macro_rules! time_unit {
    ($name: ident) => {
        #[derive(
            Debug,
            Default,
            Copy,
            Clone,
            PartialOrd,
            PartialEq,
            derive_more::Add,
            derive_more::Display,
            derive_more::FromStr,
            derive_more::From,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(f64);

        impl $name {
            pub const ZERO: $name = Self::new(0.0);
            pub const INFINITY: $name = Self::new(f64::INFINITY);

            pub const fn new(ms: f64) -> Self {
                Self(ms)
            }

            pub fn from_secs(secs: f64) -> Self {
                Self(secs * 1_000.0)
            }

            pub const fn into_f64(self) -> f64 {
                self.0
            }

            pub fn into_secs(self) -> f64 {
                self.0 / 1_000.0
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
        }
    };
}

time_unit!(Time);

impl Time {
    pub const fn into_delta(self) -> Delta {
        Delta::new(self.0)
    }
}

time_unit!(Delta);

impl Delta {
    pub const fn into_time(self) -> Time {
        Time::new(self.0)
    }
}

impl Add<Delta> for Time {
    type Output = Time;

    fn add(self, rhs: Delta) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub<Delta> for Time {
    type Output = Time;

    fn sub(self, rhs: Delta) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Sub<Time> for Time {
    type Output = Delta;

    fn sub(self, rhs: Time) -> Self::Output {
        Delta::new(self.0 - rhs.0)
    }
}

impl Sub<Delta> for Delta {
    type Output = Delta;

    fn sub(self, rhs: Delta) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign<Delta> for Time {
    fn add_assign(&mut self, rhs: Delta) {
        *self = Self(self.0 + rhs.0)
    }
}

impl SubAssign<Delta> for Time {
    fn sub_assign(&mut self, rhs: Delta) {
        *self = Self(self.0 - rhs.0)
    }
}

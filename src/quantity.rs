macro_rules! quantity {
    ($name:ident, $unit:literal) => {
        #[repr(transparent)]
        #[derive(
            ::derive_more::Add,
            ::derive_more::Sub,
            ::derive_more::Neg,
            ::derive_more::Sum,
            ::derive_more::From,
            ::derive_more::FromStr,
            ::serde::Deserialize,
            ::serde::Serialize,
            ::std::clone::Clone,
            ::std::marker::Copy,
            ::std::cmp::PartialEq,
            ::std::cmp::PartialOrd,
            ::std::default::Default,
        )]
        pub struct $name(pub f64);

        impl ::std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, formatter)?;
                write!(formatter, " {}", $unit)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, formatter: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Debug::fmt(&self.0, formatter)?;
                write!(formatter, "{}", $unit)
            }
        }

        impl From<$name> for f64 {
            fn from(quantity: $name) -> Self {
                quantity.0
            }
        }

        impl $name {
            pub const ZERO: Self = Self(0.0);

            #[must_use]
            pub const fn abs(self) -> Self {
                Self(self.0.abs())
            }
        }
    };
}

quantity!(Watts, "W");
quantity!(WattHours, "Wh");
quantity!(Percentage, "%");

impl Percentage {
    /// Round to one decimal place, the way the gateway app displays the charge.
    ///
    /// The exact binary value gets rounded, and the exact ties go to the even digit.
    #[must_use]
    pub fn round_to_tenth(self) -> Self {
        Self(format!("{:.1}", self.0).parse().unwrap_or(self.0))
    }
}

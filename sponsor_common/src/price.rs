use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Sub, SubAssign},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CURRENCY_CODE: &str = "CNY";

//--------------------------------------        Price        ---------------------------------------------------------
/// A currency amount, held internally in minor units (fen/cents).
///
/// On the API surface a `Price` is always a decimal currency value (e.g. `12.5`), and the database stores the minor
/// unit integer. Only the payment gateway boundary sees minor units, via [`Price::minor_units`].
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Price(i64);

op!(binary Price, Add, add);
op!(binary Price, Sub, sub);
op!(inplace Price, SubAssign, sub_assign);

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a price: {0}")]
pub struct PriceConversionError(String);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_minor_units(value: i64) -> Self {
        Self(value)
    }

    /// The amount in the gateway's minor-unit representation
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Clamps negative amounts to zero. Charges are never negative.
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }

    /// `self - other`, floored at zero.
    pub fn saturating_diff(self, other: Price) -> Self {
        Self(self.0.saturating_sub(other.0)).non_negative()
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let mut rounded = value.round_dp(2);
        rounded.rescale(2);
        i64::try_from(rounded.mantissa())
            .map(Self)
            .map_err(|_| PriceConversionError(format!("{value} is too large to be a price")))
    }
}

impl Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {CURRENCY_CODE}", self.to_decimal())
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Price::try_from(value).map_err(serde::de::Error::custom)
    }
}

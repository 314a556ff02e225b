use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::TaxSimError;
use crate::TaxSimResult;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Number of decimal places carried by every monetary output.
pub const MONEY_DP: u32 = 2;

/// Round half-up (midpoint away from zero) to two decimals, always keeping
/// a scale of exactly two so the textual form reads "1234.50".
pub fn round_money(value: Decimal) -> Money {
    let mut rounded = value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_DP);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    rounded
}

/// Zero with monetary scale ("0.00").
pub fn zero_money() -> Money {
    round_money(Decimal::ZERO)
}

pub fn checked_add(a: Decimal, b: Decimal, context: &str) -> TaxSimResult<Decimal> {
    a.checked_add(b).ok_or_else(|| TaxSimError::ArithmeticOverflow {
        context: context.to_string(),
    })
}

pub fn checked_sub(a: Decimal, b: Decimal, context: &str) -> TaxSimResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| TaxSimError::ArithmeticOverflow {
        context: context.to_string(),
    })
}

pub fn checked_mul(a: Decimal, b: Decimal, context: &str) -> TaxSimResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| TaxSimError::ArithmeticOverflow {
        context: context.to_string(),
    })
}

/// Division that callers have already guarded against a zero divisor.
pub fn checked_div(a: Decimal, b: Decimal, context: &str) -> TaxSimResult<Decimal> {
    a.checked_div(b).ok_or_else(|| TaxSimError::ArithmeticOverflow {
        context: context.to_string(),
    })
}

pub fn checked_sum<I>(values: I, context: &str) -> TaxSimResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_add(acc, v, context))
}

/// Parse a caller-supplied amount. Empty text means "not provided".
pub fn parse_amount(raw: &str) -> Result<Option<Decimal>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map(Some)
        .map_err(|e| format!("'{trimmed}' is not a decimal amount: {e}"))
}

// ---------------------------------------------------------------------------
// Serde helpers: amounts travel as two-decimal strings
// ---------------------------------------------------------------------------

/// `#[serde(with = "money_str")]` for required amounts. Absent input reads
/// as zero.
pub mod money_str {
    use rust_decimal::Decimal;
    use serde::{Deserializer, Serializer};

    use super::{round_money, Money};

    pub fn serialize<S: Serializer>(value: &Money, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&round_money(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Money, D::Error> {
        super::opt_money_str::deserialize(deserializer).map(|v| v.unwrap_or(Decimal::ZERO))
    }
}

/// `#[serde(with = "opt_money_str")]` for amounts where "unknown" differs
/// from zero. Unknown serializes as "0.00".
pub mod opt_money_str {
    use rust_decimal::Decimal;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    use super::{parse_amount, round_money, zero_money, Money};

    pub fn serialize<S: Serializer>(
        value: &Option<Money>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let shown = value.map(round_money).unwrap_or_else(zero_money);
        serializer.serialize_str(&shown.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Money>, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Option<Decimal>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a decimal amount as string or number, or null")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_amount(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(Decimal::from(v)))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Decimal::from(v)))
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
            super::decimal_from_f64(v)
                .map(Some)
                .ok_or_else(|| E::custom(format!("{v} cannot be represented as a decimal")))
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(AmountVisitor)
        }
    }
}

/// `#[serde(with = "opt_rate_str")]` for optional rate overrides, kept at
/// full precision.
pub mod opt_rate_str {
    use serde::{Deserializer, Serializer};

    use super::Rate;

    pub fn serialize<S: Serializer>(value: &Option<Rate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(rate) => serializer.serialize_str(&rate.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Rate>, D::Error> {
        super::opt_money_str::deserialize(deserializer)
    }
}

fn decimal_from_f64(v: f64) -> Option<Decimal> {
    // JSON numbers arrive as f64; go through the shortest textual form so
    // 0.1 stays 0.1 instead of its binary expansion.
    Decimal::from_str(&v.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(v))
}

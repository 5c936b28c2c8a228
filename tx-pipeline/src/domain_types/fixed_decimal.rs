//! FixedDecimal - Non-negative decimal with exactly 18 fractional digits
//!
//! Stored as the scaled integer (`value * 10^18`) in a U256, so token amounts
//! of any realistic size keep every wei. Handles deserialization from:
//! - Decimal strings: "1.5" -> 1.5
//! - Integers: 42 -> 42
//!
//! Floats are rejected: an amount that went through f64 has already lost
//! precision.

use ethers::types::U256;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Fractional digits kept by `FixedDecimal`, and of every token this pipeline handles
pub const WEI_DECIMALS: u32 = 18;

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash, Default)]
pub struct FixedDecimal(U256);

fn pow10(exp: u32) -> Result<U256, String> {
    U256::from(10u64)
        .checked_pow(U256::from(exp))
        .ok_or_else(|| format!("Unsupported token decimals: {}", exp))
}

fn scale() -> U256 {
    U256::exp10(WEI_DECIMALS as usize)
}

impl FixedDecimal {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn from_integer(value: u64) -> Self {
        Self(U256::from(value) * scale())
    }

    /// Wrap an already scaled value (`value * 10^18`)
    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    /// The scaled integer, i.e. the amount in 18-decimal wei
    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Convert to the smallest unit of a token with `decimals` digits,
    /// truncating anything below one unit
    pub fn to_wei(&self, decimals: u32) -> Result<U256, String> {
        if decimals >= WEI_DECIMALS {
            let factor = pow10(decimals - WEI_DECIMALS)?;
            self.0
                .checked_mul(factor)
                .ok_or_else(|| format!("Amount {} overflows at {} decimals", self, decimals))
        } else {
            Ok(self.0 / pow10(WEI_DECIMALS - decimals)?)
        }
    }

    /// Build from a smallest-unit integer
    pub fn from_wei(wei: U256, decimals: u32) -> Result<Self, String> {
        if decimals <= WEI_DECIMALS {
            let factor = pow10(WEI_DECIMALS - decimals)?;
            wei.checked_mul(factor)
                .map(Self)
                .ok_or_else(|| format!("Wei value {} overflows at {} decimals", wei, decimals))
        } else {
            Ok(Self(wei / pow10(decimals - WEI_DECIMALS)?))
        }
    }
}

impl FromStr for FixedDecimal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.starts_with('-') {
            return Err(format!("Negative amount is not supported: '{}'", value));
        }

        let (integral, fraction) = value.split_once('.').unwrap_or((value, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (integral.is_empty() && fraction.is_empty())
            || !all_digits(integral)
            || !all_digits(fraction)
        {
            return Err(format!("Invalid decimal amount '{}'", value));
        }

        // Digits past the 18th are below one wei
        let fraction = &fraction[..fraction.len().min(WEI_DECIMALS as usize)];
        let digits = format!(
            "{}{:0<width$}",
            integral,
            fraction,
            width = WEI_DECIMALS as usize
        );
        U256::from_dec_str(&digits)
            .map(Self)
            .map_err(|e| format!("Amount '{}' does not fit in 256 bits: {:?}", value, e))
    }
}

impl fmt::Display for FixedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (integral, fraction) = self.0.div_mod(scale());
        if fraction.is_zero() {
            return write!(f, "{}", integral);
        }
        let fraction = format!(
            "{:0>width$}",
            fraction.to_string(),
            width = WEI_DECIMALS as usize
        );
        write!(f, "{}.{}", integral, fraction.trim_end_matches('0'))
    }
}

impl Serialize for FixedDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FixedDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FixedDecimalVisitor;

        impl<'de> Visitor<'de> for FixedDecimalVisitor {
            type Value = FixedDecimal;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a decimal string or a non-negative integer")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                FixedDecimal::from_str(value.trim_matches('"')).map_err(de::Error::custom)
            }

            fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                self.visit_str(&value)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(FixedDecimal::from_integer(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value < 0 {
                    Err(de::Error::custom("negative amount is not supported"))
                } else {
                    Ok(FixedDecimal::from_integer(value as u64))
                }
            }
        }

        deserializer.deserialize_any(FixedDecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> FixedDecimal {
        FixedDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_wei_whole() {
        assert_eq!(
            d("1").to_wei(WEI_DECIMALS).unwrap(),
            U256::from_dec_str("1000000000000000000").unwrap()
        );
    }

    #[test]
    fn test_to_wei_smallest_unit() {
        assert_eq!(d("0.000000000000000001").to_wei(WEI_DECIMALS).unwrap(), U256::one());
        assert_eq!(d(".5").to_string(), "0.5");
    }

    #[test]
    fn test_sub_wei_digits_truncated() {
        assert_eq!(
            d("1.0000000000000000019").to_wei(WEI_DECIMALS).unwrap(),
            U256::from_dec_str("1000000000000000001").unwrap()
        );
    }

    #[test]
    fn test_to_wei_beyond_a_hundred_billion_tokens() {
        assert_eq!(
            d("100000000000").to_wei(WEI_DECIMALS).unwrap(),
            U256::from_dec_str("100000000000000000000000000000").unwrap()
        );

        let whole = "9".repeat(40);
        let amount = d(&format!("{}.123456789012345678", whole));
        assert_eq!(
            amount.to_wei(WEI_DECIMALS).unwrap(),
            U256::from_dec_str(&format!("{}123456789012345678", whole)).unwrap()
        );
        assert_eq!(amount.to_string(), format!("{}.123456789012345678", whole));
    }

    #[test]
    fn test_other_token_decimals() {
        let amount = d("1.23456789");
        assert_eq!(amount.to_wei(6).unwrap(), U256::from(1_234_567u64));
        assert_eq!(
            FixedDecimal::from_wei(U256::from(1_234_567u64), 6).unwrap().to_string(),
            "1.234567"
        );
        assert!(FixedDecimal::from_raw(U256::MAX).to_wei(19).is_err());
    }

    #[test]
    fn test_rejects_invalid_input() {
        for input in ["-1", "", ".", "1.2.3", "abc", "1e18", "+1"] {
            assert!(FixedDecimal::from_str(input).is_err(), "{}", input);
        }
        let too_big = "1".repeat(80);
        assert!(FixedDecimal::from_str(&too_big).is_err());
    }

    #[test]
    fn test_from_wei() {
        let wei = U256::from_dec_str("1500000000000000000").unwrap();
        let amount = FixedDecimal::from_wei(wei, WEI_DECIMALS).unwrap();
        assert_eq!(amount.to_string(), "1.5");
        assert_eq!(amount.raw(), wei);
    }

    #[test]
    fn test_deserialize_string_and_integer() {
        let a: FixedDecimal = serde_json::from_str(r#""2.25""#).unwrap();
        assert_eq!(a.to_string(), "2.25");
        let b: FixedDecimal = serde_json::from_str("7").unwrap();
        assert_eq!(b, FixedDecimal::from_integer(7));
        assert!(serde_json::from_str::<FixedDecimal>("1.5").is_err());
        assert!(serde_json::from_str::<FixedDecimal>("-3").is_err());
    }

    #[test]
    fn test_serialize_normalized() {
        assert_eq!(serde_json::to_string(&d("10.500")).unwrap(), r#""10.5""#);
        assert_eq!(d("007").to_string(), "7");
    }
}

//! Formats 64-bit integers using quotes, the way the beacon API encodes them.
//!
//! E.g., `1` serializes as `"1"`. Quotes are optional during decoding, so both
//! `"123"` and `123` are accepted, and for the signed width both `"-5"` and `-5`.

use serde::de::Visitor;
use serde::{Deserializer, Serializer};
use std::fmt;

macro_rules! define_mod {
    ($int: ty) => {
        struct QuotedIntVisitor;

        impl<'a> Visitor<'a> for QuotedIntVisitor {
            type Value = $int;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a quoted or unquoted integer")
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                s.parse::<$int>().map_err(serde::de::Error::custom)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                <$int>::try_from(v)
                    .map_err(|_| serde::de::Error::custom("integer out of range"))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                <$int>::try_from(v)
                    .map_err(|_| serde::de::Error::custom("integer out of range"))
            }
        }

        /// Serialize with quotes.
        pub fn serialize<S>(value: &$int, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.to_string())
        }

        /// Deserialize with or without quotes.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<$int, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(QuotedIntVisitor)
        }
    };
}

pub mod quoted_u64 {
    use super::*;

    define_mod!(u64);
}

pub mod quoted_i64 {
    use super::*;

    define_mod!(i64);
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct WrappedU64(#[serde(with = "super::quoted_u64")] u64);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct WrappedI64(#[serde(with = "super::quoted_i64")] i64);

    #[test]
    fn quoted_and_unquoted_u64() {
        assert_eq!(
            serde_json::from_str::<WrappedU64>("\"123\"").unwrap(),
            WrappedU64(123)
        );
        assert_eq!(
            serde_json::from_str::<WrappedU64>("123").unwrap(),
            WrappedU64(123)
        );
    }

    #[test]
    fn quoted_and_unquoted_i64() {
        assert_eq!(
            serde_json::from_str::<WrappedI64>("\"-5\"").unwrap(),
            WrappedI64(-5)
        );
        assert_eq!(
            serde_json::from_str::<WrappedI64>("-5").unwrap(),
            WrappedI64(-5)
        );
        assert_eq!(
            serde_json::from_str::<WrappedI64>("\"5\"").unwrap(),
            WrappedI64(5)
        );
    }

    #[test]
    fn max_effective_balance_decodes() {
        // 2048 ETH in gwei, the MaxEB ceiling.
        let max_eb = 2_048_000_000_000_u64;
        assert_eq!(
            serde_json::from_str::<WrappedU64>(&format!("\"{}\"", max_eb)).unwrap(),
            WrappedU64(max_eb)
        );
    }

    #[test]
    fn serializes_with_quotes() {
        assert_eq!(serde_json::to_string(&WrappedU64(7)).unwrap(), "\"7\"");
        assert_eq!(serde_json::to_string(&WrappedI64(-7)).unwrap(), "\"-7\"");
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(serde_json::from_str::<WrappedU64>("\"-1\"").is_err());
        assert!(serde_json::from_str::<WrappedU64>("-1").is_err());
        assert!(serde_json::from_str::<WrappedI64>("\"18446744073709551615\"").is_err());
        assert!(serde_json::from_str::<WrappedU64>("\"cow\"").is_err());
    }
}

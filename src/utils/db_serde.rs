//! 非有限dB值的serde编解码
//!
//! JSON 不支持 `-Infinity`，`serde_json` 会把非有限浮点写成 `null`。
//! 这里把非有限值写成字符串 `"-Infinity"` / `"Infinity"` / `"NaN"`，
//! 有限值保持为数字，反序列化两种形式都接受。
//!
//! ```rust,ignore
//! #[serde(with = "crate::utils::db_serde")]
//! pub overall_db: f64,
//! ```

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_str("NaN")
    } else if *value > 0.0 {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_str("-Infinity")
    }
}

struct DbVisitor;

impl Visitor<'_> for DbVisitor {
    type Value = f64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or one of \"-Infinity\", \"Infinity\", \"NaN\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        match v {
            "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
            "Infinity" | "inf" => Ok(f64::INFINITY),
            "NaN" => Ok(f64::NAN),
            other => other.parse::<f64>().map_err(E::custom),
        }
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    deserializer.deserialize_any(DbVisitor)
}

/// `Vec<f64>` 版本（每声道dB列表）
pub mod vec {
    use serde::de::{SeqAccess, Visitor};
    use serde::ser::SerializeSeq;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    struct Wrapped(f64);

    impl serde::Serialize for Wrapped {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize(&self.0, serializer)
        }
    }

    impl<'de> serde::Deserialize<'de> for Wrapped {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            super::deserialize(deserializer).map(Wrapped)
        }
    }

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for &value in values {
            seq.serialize_element(&Wrapped(value))?;
        }
        seq.end()
    }

    struct VecVisitor;

    impl<'de> Visitor<'de> for VecVisitor {
        type Value = Vec<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a sequence of dB values")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<f64>, A::Error> {
            let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(Wrapped(value)) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        deserializer.deserialize_seq(VecVisitor)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Level {
        #[serde(with = "crate::utils::db_serde")]
        db: f64,
        #[serde(with = "crate::utils::db_serde::vec")]
        per_channel: Vec<f64>,
    }

    #[test]
    fn test_negative_infinity_survives_json() {
        let level = Level {
            db: f64::NEG_INFINITY,
            per_channel: vec![-12.5, f64::NEG_INFINITY],
        };
        let json = serde_json::to_string(&level).unwrap();
        assert_eq!(
            json,
            r#"{"db":"-Infinity","per_channel":[-12.5,"-Infinity"]}"#
        );

        let back: Level = serde_json::from_str(&json).unwrap();
        assert_eq!(back, level);
    }

    #[test]
    fn test_plain_numbers_accepted() {
        let back: Level = serde_json::from_str(r#"{"db":-3,"per_channel":[0.5]}"#).unwrap();
        assert_eq!(back.db, -3.0);
        assert_eq!(back.per_channel, vec![0.5]);
    }
}

//! Round-trip properties of the reversible key field codecs.
//!
//! PAD, NATIVE and MINBYTE must give back exactly the value they encoded.

use cellgraph_api::{DataType, Value};
use cellgraph_storage::{HashAlgorithm, KeyFieldCodec, KeyFieldCodecType};
use chrono::NaiveDate;
use proptest::prelude::*;

fn codec(codec_type: KeyFieldCodecType, data_type: DataType, max_length: usize) -> KeyFieldCodec {
    KeyFieldCodec::select(codec_type, data_type, max_length, HashAlgorithm::Jenkins)
}

fn roundtrip(c: &KeyFieldCodec, v: &Value) -> Value {
    c.decode(&c.encode(v).unwrap()).unwrap()
}

proptest! {
    #[test]
    fn pad_long(v in any::<i64>()) {
        let c = codec(KeyFieldCodecType::Pad, DataType::Long, 24);
        prop_assert_eq!(roundtrip(&c, &Value::Int(v)), Value::Int(v));
    }

    #[test]
    fn pad_string(s in "[a-zA-Z0-9 _-]{0,16}") {
        let c = codec(KeyFieldCodecType::Pad, DataType::String, 16);
        prop_assert_eq!(roundtrip(&c, &Value::String(s.clone())), Value::String(s));
    }

    #[test]
    fn pad_double(v in -1.0e9f64..1.0e9) {
        let c = codec(KeyFieldCodecType::Pad, DataType::Double, 64);
        prop_assert_eq!(roundtrip(&c, &Value::Float(v)), Value::Float(v));
    }

    #[test]
    fn native_int(v in any::<i32>()) {
        let c = codec(KeyFieldCodecType::Native, DataType::Int, 0);
        prop_assert_eq!(roundtrip(&c, &Value::Int(i64::from(v))), Value::Int(i64::from(v)));
    }

    #[test]
    fn native_double(v in any::<f64>().prop_filter("not nan", |v| !v.is_nan())) {
        let c = codec(KeyFieldCodecType::Native, DataType::Double, 0);
        prop_assert_eq!(roundtrip(&c, &Value::Float(v)), Value::Float(v));
    }

    #[test]
    fn native_string(s in "\\PC{0,32}") {
        let c = codec(KeyFieldCodecType::Native, DataType::String, 0);
        prop_assert_eq!(roundtrip(&c, &Value::String(s.clone())), Value::String(s));
    }

    #[test]
    fn minbyte_long(v in any::<i64>()) {
        let c = codec(KeyFieldCodecType::MinByte, DataType::Long, 0);
        prop_assert_eq!(roundtrip(&c, &Value::Int(v)), Value::Int(v));
    }

    #[test]
    fn minbyte_double(v in any::<f64>().prop_filter("not nan", |v| !v.is_nan())) {
        let c = codec(KeyFieldCodecType::MinByte, DataType::Double, 0);
        prop_assert_eq!(roundtrip(&c, &Value::Float(v)), Value::Float(v));
    }

    #[test]
    fn dates_roundtrip_in_every_reversible_codec(days in 1i32..1_000_000) {
        let d = Value::Date(NaiveDate::from_num_days_from_ce_opt(days).unwrap());
        for c in [
            codec(KeyFieldCodecType::Pad, DataType::Date, 10),
            codec(KeyFieldCodecType::Native, DataType::Date, 0),
            codec(KeyFieldCodecType::MinByte, DataType::Date, 0),
        ] {
            prop_assert_eq!(roundtrip(&c, &d), d.clone());
        }
    }

    #[test]
    fn native_order_matches_value_order(a in 0i64..i64::MAX, b in 0i64..i64::MAX) {
        let c = codec(KeyFieldCodecType::Native, DataType::Long, 0);
        let (ea, eb) = (c.encode(&Value::Int(a)).unwrap(), c.encode(&Value::Int(b)).unwrap());
        prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
    }
}

#[test]
fn t10_booleans_roundtrip() {
    for codec_type in [
        KeyFieldCodecType::Pad,
        KeyFieldCodecType::Native,
        KeyFieldCodecType::MinByte,
    ] {
        let c = codec(codec_type, DataType::Boolean, 1);
        for b in [true, false] {
            assert_eq!(roundtrip(&c, &Value::Bool(b)), Value::Bool(b));
        }
    }
}

//! Key field codecs.
//!
//! A codec turns one typed key field value into the bytes it occupies in a
//! composite row key. PAD, NATIVE and MINBYTE are reversible; HASH and
//! LEXICOHASH are one-way.

use crate::{Error, Result};
use cellgraph_api::{DataFlavor, DataType, Value};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

const PAD_BYTE: u8 = 0x00;
const PAD_DIGIT: u8 = b'0';
const LEXICO_HASH_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFieldCodecType {
    #[default]
    Pad,
    Hash,
    LexicoHash,
    Native,
    MinByte,
}

impl KeyFieldCodecType {
    /// Parses a codec name. Unknown names fall back to PAD.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pad" => Self::Pad,
            "hash" => Self::Hash,
            "lexicohash" | "lexico_hash" => Self::LexicoHash,
            "native" => Self::Native,
            "minbyte" | "min_byte" => Self::MinByte,
            other => {
                warn!(codec = other, "unknown key field codec - using pad");
                Self::Pad
            }
        }
    }
}

/// Hash algorithm configured on a table for HASH/LEXICOHASH fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Jenkins,
    Crc32,
    Sha256,
}

impl HashAlgorithm {
    /// Resolves an optional algorithm name, defaulting to Jenkins.
    pub fn resolve(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            None => Self::Jenkins,
            Some(n) => match n.as_str() {
                "jenkins" => Self::Jenkins,
                "crc32" => Self::Crc32,
                "sha256" => Self::Sha256,
                other => {
                    warn!(algorithm = other, "unknown hash algorithm - using jenkins");
                    Self::Jenkins
                }
            },
        }
    }

    pub fn hash(self, bytes: &[u8]) -> u32 {
        match self {
            Self::Jenkins => jenkins_one_at_a_time(bytes),
            Self::Crc32 => crc32fast::hash(bytes),
            Self::Sha256 => {
                let digest = Sha256::digest(bytes);
                u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
            }
        }
    }
}

fn jenkins_one_at_a_time(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &b in bytes {
        h = h.wrapping_add(u32::from(b));
        h = h.wrapping_add(h << 10);
        h ^= h >> 6;
    }
    h = h.wrapping_add(h << 3);
    h ^= h >> 11;
    h.wrapping_add(h << 15)
}

/// A selected codec bound to the data type of its key field.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFieldCodec {
    Pad {
        data_type: DataType,
        max_length: usize,
    },
    Hash {
        data_type: DataType,
        algorithm: HashAlgorithm,
    },
    LexicoHash {
        data_type: DataType,
        algorithm: HashAlgorithm,
    },
    Native {
        data_type: DataType,
    },
    MinByte {
        data_type: DataType,
    },
}

impl KeyFieldCodec {
    /// Selects the codec for a key field. Combinations a strategy cannot
    /// express fall back to PAD.
    pub fn select(
        codec_type: KeyFieldCodecType,
        data_type: DataType,
        max_length: usize,
        algorithm: HashAlgorithm,
    ) -> Self {
        let pad = KeyFieldCodec::Pad {
            data_type,
            max_length,
        };
        match codec_type {
            KeyFieldCodecType::Pad => pad,
            KeyFieldCodecType::Hash => KeyFieldCodec::Hash {
                data_type,
                algorithm,
            },
            KeyFieldCodecType::LexicoHash => KeyFieldCodec::LexicoHash {
                data_type,
                algorithm,
            },
            KeyFieldCodecType::Native if data_type != DataType::Object => {
                KeyFieldCodec::Native { data_type }
            }
            KeyFieldCodecType::MinByte
                if matches!(
                    data_type.flavor(),
                    DataFlavor::Integral | DataFlavor::Real
                ) || data_type == DataType::Date =>
            {
                KeyFieldCodec::MinByte { data_type }
            }
            unsupported => {
                warn!(
                    codec = ?unsupported,
                    ?data_type,
                    "unsupported codec for data type - using pad"
                );
                pad
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyFieldCodec::Pad { .. } => "pad",
            KeyFieldCodec::Hash { .. } => "hash",
            KeyFieldCodec::LexicoHash { .. } => "lexicohash",
            KeyFieldCodec::Native { .. } => "native",
            KeyFieldCodec::MinByte { .. } => "minbyte",
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            KeyFieldCodec::Pad { data_type, .. }
            | KeyFieldCodec::Hash { data_type, .. }
            | KeyFieldCodec::LexicoHash { data_type, .. }
            | KeyFieldCodec::Native { data_type }
            | KeyFieldCodec::MinByte { data_type } => *data_type,
        }
    }

    pub fn is_reversible(&self) -> bool {
        !matches!(
            self,
            KeyFieldCodec::Hash { .. } | KeyFieldCodec::LexicoHash { .. }
        )
    }

    /// Byte width of every encoding, or `None` when widths vary.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            KeyFieldCodec::Pad { max_length, .. } if *max_length > 0 => Some(*max_length),
            KeyFieldCodec::Pad { .. } => None,
            KeyFieldCodec::Hash { .. } => Some(4),
            KeyFieldCodec::LexicoHash { .. } => Some(LEXICO_HASH_WIDTH),
            KeyFieldCodec::Native { data_type } => native_width(*data_type),
            KeyFieldCodec::MinByte { .. } => None,
        }
    }

    /// Whether a range bound at `value` selects exactly the stored values
    /// on its side of the bound, whatever else is stored.
    pub fn preserves_order(&self, value: &Value) -> bool {
        let data_type = self.data_type();
        let Ok(value) = coerce(data_type, value) else {
            return false;
        };
        match self {
            KeyFieldCodec::Pad { max_length, .. } => {
                *max_length > 0
                    && match value {
                        Value::Int(i) => i >= 0,
                        Value::Bool(_) | Value::String(_) | Value::Date(_) | Value::Bytes(_) => {
                            true
                        }
                        Value::Float(_) => false,
                    }
            }
            // Two's complement puts negative stored values after every
            // non-negative one, so no numeric bound is safe.
            KeyFieldCodec::Native { .. } => {
                matches!(value, Value::Bool(_) | Value::String(_) | Value::Bytes(_))
            }
            _ => false,
        }
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let data_type = self.data_type();
        let value = coerce(data_type, value)?;
        match self {
            KeyFieldCodec::Pad { max_length, .. } => pad_encode(&value, *max_length),
            KeyFieldCodec::Hash { algorithm, .. } => {
                Ok(algorithm.hash(&canonical_bytes(&value)).to_be_bytes().to_vec())
            }
            KeyFieldCodec::LexicoHash { algorithm, .. } => {
                let h = algorithm.hash(&canonical_bytes(&value));
                Ok(format!("{h:0width$}", width = LEXICO_HASH_WIDTH).into_bytes())
            }
            KeyFieldCodec::Native { data_type } => native_encode(*data_type, &value),
            KeyFieldCodec::MinByte { .. } => minbyte_encode(&value),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            KeyFieldCodec::Pad { data_type, .. } => pad_decode(*data_type, bytes),
            KeyFieldCodec::Hash { .. } | KeyFieldCodec::LexicoHash { .. } => {
                Err(Error::Irreversible(self.name()))
            }
            KeyFieldCodec::Native { data_type } => native_decode(*data_type, bytes),
            KeyFieldCodec::MinByte { data_type } => minbyte_decode(*data_type, bytes),
        }
    }
}

/// Brings `value` into the variant the data type expects, converting through
/// its text form when the variants differ.
pub fn coerce(data_type: DataType, value: &Value) -> Result<Value> {
    let fits = match (data_type.flavor(), value) {
        (DataFlavor::Integral, Value::Bool(_)) => data_type == DataType::Boolean,
        (DataFlavor::Integral, Value::Int(_)) => data_type != DataType::Boolean,
        (DataFlavor::Real, Value::Float(_)) => true,
        (DataFlavor::Real, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
        (DataFlavor::String, Value::String(_)) => true,
        (DataFlavor::Temporal, Value::Date(_)) => data_type == DataType::Date,
        (DataFlavor::Temporal, Value::String(_)) => data_type != DataType::Date,
        (DataFlavor::Other, Value::Bytes(_)) => data_type == DataType::Bytes,
        _ => false,
    };
    if fits {
        return Ok(value.clone());
    }
    Ok(data_type.convert(&value.to_string())?)
}

fn canonical_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Bytes(b) => b.clone(),
        other => other.to_string().into_bytes(),
    }
}

fn pad_encode(value: &Value, max_length: usize) -> Result<Vec<u8>> {
    let (mut bytes, numeric) = match value {
        Value::Bool(b) => (if *b { b"1".to_vec() } else { b"0".to_vec() }, true),
        Value::Int(_) | Value::Float(_) => (value.to_string().into_bytes(), true),
        Value::Bytes(b) => (b.clone(), false),
        other => (other.to_string().into_bytes(), false),
    };
    if max_length == 0 {
        return Ok(bytes);
    }
    if bytes.len() > max_length {
        return Err(Error::KeyFieldOverflow {
            len: bytes.len(),
            max: max_length,
        });
    }
    let fill = max_length - bytes.len();
    if numeric {
        // Sign stays in front of the zero fill.
        let sign = usize::from(bytes.first() == Some(&b'-'));
        let mut out = Vec::with_capacity(max_length);
        out.extend_from_slice(&bytes[..sign]);
        out.resize(sign + fill, PAD_DIGIT);
        out.extend_from_slice(&bytes[sign..]);
        Ok(out)
    } else {
        bytes.resize(max_length, PAD_BYTE);
        Ok(bytes)
    }
}

fn strip_zero_fill(text: &str) -> String {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let mut digits = digits;
    while digits.len() > 1
        && digits.starts_with('0')
        && digits.as_bytes()[1].is_ascii_digit()
    {
        digits = &digits[1..];
    }
    if digits.is_empty() {
        digits = "0";
    }
    format!("{sign}{digits}")
}

fn pad_decode(data_type: DataType, bytes: &[u8]) -> Result<Value> {
    match data_type.flavor() {
        DataFlavor::Integral | DataFlavor::Real => {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| Error::MalformedKey("pad field is not utf-8".into()))?;
            let text = strip_zero_fill(text);
            if data_type == DataType::Boolean {
                return Ok(Value::Bool(text == "1"));
            }
            Ok(data_type.convert(&text)?)
        }
        _ => {
            let end = bytes
                .iter()
                .rposition(|b| *b != PAD_BYTE)
                .map_or(0, |i| i + 1);
            let trimmed = &bytes[..end];
            if data_type == DataType::Bytes {
                return Ok(Value::Bytes(trimmed.to_vec()));
            }
            let text = std::str::from_utf8(trimmed)
                .map_err(|_| Error::MalformedKey("pad field is not utf-8".into()))?;
            Ok(data_type.convert(text)?)
        }
    }
}

fn native_width(data_type: DataType) -> Option<usize> {
    match data_type {
        DataType::Boolean | DataType::Byte => Some(1),
        DataType::Short => Some(2),
        DataType::Int | DataType::Float | DataType::Date => Some(4),
        DataType::Long | DataType::Double | DataType::Decimal => Some(8),
        _ => None,
    }
}

/// Narrows `value` to a `max`-byte integer.
fn narrow<T: TryFrom<i64>>(value: i64, max: usize) -> Result<T> {
    T::try_from(value).map_err(|_| Error::KeyFieldOverflow {
        len: signed_width(value),
        max,
    })
}

/// Bytes needed to hold `value` in two's complement.
fn signed_width(value: i64) -> usize {
    let magnitude = if value < 0 { !value } else { value };
    (64 - magnitude.leading_zeros() as usize) / 8 + 1
}

fn native_encode(data_type: DataType, value: &Value) -> Result<Vec<u8>> {
    let bytes = match (data_type, value) {
        (DataType::Boolean, Value::Bool(b)) => vec![u8::from(*b)],
        (DataType::Byte, Value::Int(i)) => narrow::<i8>(*i, 1)?.to_be_bytes().to_vec(),
        (DataType::Short, Value::Int(i)) => narrow::<i16>(*i, 2)?.to_be_bytes().to_vec(),
        (DataType::Int, Value::Int(i)) => narrow::<i32>(*i, 4)?.to_be_bytes().to_vec(),
        (DataType::Long, Value::Int(i)) => i.to_be_bytes().to_vec(),
        (DataType::Float, Value::Float(f)) => (*f as f32).to_bits().to_be_bytes().to_vec(),
        (DataType::Double | DataType::Decimal, Value::Float(f)) => {
            f.to_bits().to_be_bytes().to_vec()
        }
        (DataType::Date, Value::Date(d)) => d.num_days_from_ce().to_be_bytes().to_vec(),
        (_, Value::String(s)) => s.as_bytes().to_vec(),
        (_, Value::Bytes(b)) => b.clone(),
        _ => {
            return Err(Error::UnsupportedType {
                codec: "native",
                data_type,
            });
        }
    };
    Ok(bytes)
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::MalformedKey(format!("expected {N} bytes, found {}", bytes.len())))
}

fn native_decode(data_type: DataType, bytes: &[u8]) -> Result<Value> {
    let value = match data_type {
        DataType::Boolean => Value::Bool(fixed::<1>(bytes)?[0] != 0),
        DataType::Byte => Value::Int(i64::from(i8::from_be_bytes(fixed(bytes)?))),
        DataType::Short => Value::Int(i64::from(i16::from_be_bytes(fixed(bytes)?))),
        DataType::Int => Value::Int(i64::from(i32::from_be_bytes(fixed(bytes)?))),
        DataType::Long => Value::Int(i64::from_be_bytes(fixed(bytes)?)),
        DataType::Float => Value::Float(f64::from(f32::from_bits(u32::from_be_bytes(
            fixed(bytes)?,
        )))),
        DataType::Double | DataType::Decimal => {
            Value::Float(f64::from_bits(u64::from_be_bytes(fixed(bytes)?)))
        }
        DataType::Date => date_from_days(i32::from_be_bytes(fixed(bytes)?))?,
        DataType::Bytes => Value::Bytes(bytes.to_vec()),
        DataType::String | DataType::DateTime | DataType::Time => Value::String(
            String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::MalformedKey("native field is not utf-8".into()))?,
        ),
        DataType::Object => {
            return Err(Error::UnsupportedType {
                codec: "native",
                data_type,
            });
        }
    };
    Ok(value)
}

fn date_from_days(days: i32) -> Result<Value> {
    NaiveDate::from_num_days_from_ce_opt(days)
        .map(Value::Date)
        .ok_or_else(|| Error::MalformedKey(format!("day number {days} out of range")))
}

fn minimal_twos_complement(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn sign_extend(bytes: &[u8]) -> Result<i64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(Error::MalformedKey(format!(
            "minbyte integer of {} bytes",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut buf = [fill; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(i64::from_be_bytes(buf))
}

fn minbyte_encode(value: &Value) -> Result<Vec<u8>> {
    match value {
        Value::Bool(b) => Ok(vec![u8::from(*b)]),
        Value::Int(i) => Ok(minimal_twos_complement(*i)),
        Value::Float(f) => {
            let narrow = *f as f32;
            if f.is_nan() || f64::from(narrow) == *f {
                Ok(narrow.to_bits().to_be_bytes().to_vec())
            } else {
                Ok(f.to_bits().to_be_bytes().to_vec())
            }
        }
        Value::Date(d) => Ok(minimal_twos_complement(i64::from(d.num_days_from_ce()))),
        Value::String(_) | Value::Bytes(_) => Err(Error::UnsupportedType {
            codec: "minbyte",
            data_type: DataType::String,
        }),
    }
}

fn minbyte_decode(data_type: DataType, bytes: &[u8]) -> Result<Value> {
    match data_type.flavor() {
        DataFlavor::Integral if data_type == DataType::Boolean => {
            Ok(Value::Bool(sign_extend(bytes)? != 0))
        }
        DataFlavor::Integral => Ok(Value::Int(sign_extend(bytes)?)),
        DataFlavor::Real => match bytes.len() {
            4 => Ok(Value::Float(f64::from(f32::from_bits(u32::from_be_bytes(
                fixed(bytes)?,
            ))))),
            8 => Ok(Value::Float(f64::from_bits(u64::from_be_bytes(fixed(
                bytes,
            )?)))),
            n => Err(Error::MalformedKey(format!("minbyte real of {n} bytes"))),
        },
        _ if data_type == DataType::Date => {
            let days = i32::try_from(sign_extend(bytes)?)
                .map_err(|_| Error::MalformedKey("day number out of range".into()))?;
            date_from_days(days)
        }
        _ => Err(Error::UnsupportedType {
            codec: "minbyte",
            data_type,
        }),
    }
}

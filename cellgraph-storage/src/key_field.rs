use crate::codec::{HashAlgorithm, KeyFieldCodec, KeyFieldCodecType};
use crate::{Error, Result};
use cellgraph_api::{DataFlavor, DataType, TypeDef, Value};
use std::sync::OnceLock;

/// Where a key field takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFieldSource {
    /// The root type's name.
    TypeName,
    /// The root type's URI.
    Uri,
    /// A data property reached from the root by this path.
    Property(Vec<String>),
}

impl KeyFieldSource {
    pub fn is_predefined(&self) -> bool {
        !matches!(self, KeyFieldSource::Property(_))
    }
}

/// One field of a composite row key.
#[derive(Debug, Clone)]
pub struct KeyFieldMapping {
    seq_num: usize,
    total_fields: usize,
    source: KeyFieldSource,
    data_type: DataType,
    codec_type: KeyFieldCodecType,
    max_length: usize,
    hash_algorithm: HashAlgorithm,
    codec: OnceLock<KeyFieldCodec>,
}

impl KeyFieldMapping {
    pub fn new(
        seq_num: usize,
        total_fields: usize,
        source: KeyFieldSource,
        data_type: DataType,
        codec_type: KeyFieldCodecType,
        max_length: usize,
        hash_algorithm: HashAlgorithm,
    ) -> Result<Self> {
        if seq_num >= total_fields {
            return Err(Error::InvalidMapping(format!(
                "key field sequence {seq_num} not below field count {total_fields}"
            )));
        }
        Ok(Self {
            seq_num,
            total_fields,
            source,
            data_type,
            codec_type,
            max_length,
            hash_algorithm,
            codec: OnceLock::new(),
        })
    }

    pub fn seq_num(&self) -> usize {
        self.seq_num
    }

    pub fn total_fields(&self) -> usize {
        self.total_fields
    }

    pub fn source(&self) -> &KeyFieldSource {
        &self.source
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn data_flavor(&self) -> DataFlavor {
        self.data_type.flavor()
    }

    pub fn codec_type(&self) -> KeyFieldCodecType {
        self.codec_type
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Property path of a property-sourced field.
    pub fn property_path(&self) -> Option<&[String]> {
        match &self.source {
            KeyFieldSource::Property(path) => Some(path),
            _ => None,
        }
    }

    /// The codec for this field, selected on first use.
    pub fn codec(&self) -> &KeyFieldCodec {
        self.codec.get_or_init(|| {
            KeyFieldCodec::select(
                self.codec_type,
                self.data_type,
                self.max_length,
                self.hash_algorithm,
            )
        })
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        self.codec().encode(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value> {
        self.codec().decode(bytes)
    }

    /// Value of a predefined field for the given root type.
    pub fn predefined_value(&self, type_def: &TypeDef) -> Option<Value> {
        match &self.source {
            KeyFieldSource::TypeName => Some(Value::String(type_def.name.clone())),
            KeyFieldSource::Uri => Some(Value::String(type_def.uri.clone())),
            KeyFieldSource::Property(_) => None,
        }
    }
}

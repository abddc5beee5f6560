use cellgraph_api::{ConvertError, DataType};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key field overflow: {len} bytes exceeds max length {max}")]
    KeyFieldOverflow { len: usize, max: usize },

    #[error("{0} codec is not reversible")]
    Irreversible(&'static str),

    #[error("{codec} codec does not support {data_type:?}")]
    UnsupportedType {
        codec: &'static str,
        data_type: DataType,
    },

    #[error("malformed key: {0}")]
    MalformedKey(String),

    #[error("invalid value ({found}) for {column} - expected {expected}")]
    DecodeIntegrity {
        column: String,
        found: usize,
        expected: usize,
    },

    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("no key mapping for type {0}")]
    UnknownType(String),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error("mapping parse error: {0}")]
    Mapping(#[from] serde_json::Error),
}

//! Storage-side building blocks: key field codecs, composite row keys,
//! table key mappings, scan descriptors and the scan executor seam.

pub mod codec;
pub mod column_key;
pub mod edge;
mod error;
pub mod key_field;
pub mod mapping;
pub mod memtable;
pub mod row_key;
pub mod scan;
pub mod table_cache;

pub use crate::codec::{HashAlgorithm, KeyFieldCodec, KeyFieldCodecType};
pub use crate::error::{Error, Result};
pub use crate::key_field::{KeyFieldMapping, KeyFieldSource};
pub use crate::mapping::{KeyMappingProvider, StoreMapping, TableMapping, TypeKeyMapping};
pub use crate::row_key::{RowKey, prefix_end};
pub use crate::scan::{
    ColumnFilter, CompleteKey, FuzzyKey, PartialKey, ScanDescriptor, ScanExecutor, Scanner,
};

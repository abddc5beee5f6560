//! Table and row key mapping.
//!
//! A mapping file names the tables of the store and, per root type, the
//! ordered row key fields:
//!
//! ```json
//! {
//!   "tables": [{
//!     "name": "people",
//!     "data_family": "f",
//!     "hash_algorithm": "jenkins",
//!     "types": [{
//!       "type": "Person",
//!       "row_key": [
//!         { "predefined": "type", "codec": "hash" },
//!         { "path": "name", "codec": "pad", "max_length": 16 }
//!       ]
//!     }]
//!   }]
//! }
//! ```

use crate::codec::{HashAlgorithm, KeyFieldCodecType};
use crate::key_field::{KeyFieldMapping, KeyFieldSource};
use crate::row_key::RowKey;
use crate::{Error, Result};
use cellgraph_api::{DataType, PropertyKind, TypeCatalog, TypeDef};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct MappingFile {
    tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize)]
struct TableConfig {
    name: String,
    data_family: String,
    #[serde(default)]
    hash_algorithm: Option<String>,
    #[serde(default = "default_tombstone_rows")]
    tombstone_rows: bool,
    #[serde(default)]
    types: Vec<TypeConfig>,
}

fn default_tombstone_rows() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct TypeConfig {
    #[serde(rename = "type")]
    type_name: String,
    row_key: Vec<FieldConfig>,
}

#[derive(Debug, Deserialize)]
struct FieldConfig {
    #[serde(default)]
    predefined: Option<String>,
    /// Dot-separated property path.
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    max_length: usize,
    #[serde(default)]
    data_type: Option<DataType>,
}

/// Physical table settings shared by the types stored in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMapping {
    pub name: String,
    pub data_family: Vec<u8>,
    pub hash_algorithm: HashAlgorithm,
    /// Whether deleted graphs leave tombstone rows behind.
    pub tombstone_rows: bool,
}

/// Row key layout of one root type.
#[derive(Debug, Clone)]
pub struct TypeKeyMapping {
    type_name: String,
    table: Arc<TableMapping>,
    fields: Vec<KeyFieldMapping>,
}

impl TypeKeyMapping {
    pub fn new(
        type_name: impl Into<String>,
        table: Arc<TableMapping>,
        fields: Vec<KeyFieldMapping>,
    ) -> Result<Self> {
        RowKey::new(&fields).validate()?;
        Ok(Self {
            type_name: type_name.into(),
            table,
            fields,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table(&self) -> &TableMapping {
        &self.table
    }

    pub fn fields(&self) -> &[KeyFieldMapping] {
        &self.fields
    }

    pub fn row_key(&self) -> RowKey<'_> {
        RowKey::new(&self.fields)
    }

    /// Number of leading predefined fields.
    pub fn predefined_len(&self) -> usize {
        self.fields
            .iter()
            .take_while(|f| f.source().is_predefined())
            .count()
    }

    /// Encoded leading predefined fields: the type's key-space prefix.
    pub fn type_prefix(&self, type_def: &TypeDef) -> Result<Vec<u8>> {
        let mut prefix = Vec::new();
        for field in &self.fields[..self.predefined_len()] {
            let value = field
                .predefined_value(type_def)
                .ok_or_else(|| Error::InvalidMapping("predefined field without value".into()))?;
            prefix.extend_from_slice(&field.encode(&value)?);
        }
        Ok(prefix)
    }
}

/// Lookup of the row key layout for a root type.
pub trait KeyMappingProvider {
    fn key_mapping(&self, type_name: &str) -> Option<&TypeKeyMapping>;

    fn require(&self, type_name: &str) -> Result<&TypeKeyMapping> {
        self.key_mapping(type_name)
            .ok_or_else(|| Error::UnknownType(type_name.to_string()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreMapping {
    types: BTreeMap<String, TypeKeyMapping>,
}

impl StoreMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mapping: TypeKeyMapping) {
        self.types.insert(mapping.type_name.clone(), mapping);
    }

    pub fn from_file(path: impl AsRef<Path>, catalog: &dyn TypeCatalog) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text, catalog)
    }

    /// Parses a mapping and resolves property data types against `catalog`.
    pub fn from_json(text: &str, catalog: &dyn TypeCatalog) -> Result<Self> {
        let file: MappingFile = serde_json::from_str(text)?;
        let mut mapping = StoreMapping::new();
        for table in file.tables {
            let table_mapping = Arc::new(TableMapping {
                name: table.name,
                data_family: table.data_family.into_bytes(),
                hash_algorithm: HashAlgorithm::resolve(table.hash_algorithm.as_deref()),
                tombstone_rows: table.tombstone_rows,
            });
            for type_config in table.types {
                let type_def = catalog
                    .find_type(&type_config.type_name)
                    .ok_or_else(|| Error::UnknownType(type_config.type_name.clone()))?;
                let total = type_config.row_key.len();
                let fields = type_config
                    .row_key
                    .into_iter()
                    .enumerate()
                    .map(|(seq, field)| {
                        resolve_field(
                            seq,
                            total,
                            field,
                            type_def,
                            catalog,
                            table_mapping.hash_algorithm,
                        )
                    })
                    .collect::<Result<Vec<_>>>()?;
                mapping.insert(TypeKeyMapping::new(
                    type_config.type_name,
                    Arc::clone(&table_mapping),
                    fields,
                )?);
            }
        }
        Ok(mapping)
    }
}

impl KeyMappingProvider for StoreMapping {
    fn key_mapping(&self, type_name: &str) -> Option<&TypeKeyMapping> {
        self.types.get(type_name)
    }
}

fn resolve_field(
    seq: usize,
    total: usize,
    field: FieldConfig,
    root: &TypeDef,
    catalog: &dyn TypeCatalog,
    hash_algorithm: HashAlgorithm,
) -> Result<KeyFieldMapping> {
    let codec_type = field
        .codec
        .as_deref()
        .map_or(KeyFieldCodecType::Pad, KeyFieldCodecType::parse);
    let (source, data_type) = match (field.predefined.as_deref(), field.path) {
        (Some("type" | "type_name"), None) => (KeyFieldSource::TypeName, DataType::String),
        (Some("uri"), None) => (KeyFieldSource::Uri, DataType::String),
        (None, Some(path)) => {
            let path: Vec<String> = path.split('.').map(str::to_string).collect();
            let data_type = match field.data_type {
                Some(dt) => dt,
                None => path_data_type(root, &path, catalog)?,
            };
            (KeyFieldSource::Property(path), data_type)
        }
        (Some(other), None) => {
            return Err(Error::InvalidMapping(format!(
                "unknown predefined key field '{other}'"
            )));
        }
        _ => {
            return Err(Error::InvalidMapping(format!(
                "key field {seq} needs exactly one of predefined or path"
            )));
        }
    };
    KeyFieldMapping::new(
        seq,
        total,
        source,
        data_type,
        codec_type,
        field.max_length,
        hash_algorithm,
    )
}

/// Follows singular reference properties to the data property at the end
/// of `path`.
fn path_data_type(root: &TypeDef, path: &[String], catalog: &dyn TypeCatalog) -> Result<DataType> {
    let mut current = root;
    for (i, name) in path.iter().enumerate() {
        let prop = current.property(name).ok_or_else(|| {
            Error::InvalidMapping(format!("type {} has no property '{name}'", current.name))
        })?;
        let last = i + 1 == path.len();
        match (&prop.kind, last) {
            (PropertyKind::Data(dt), true) => return Ok(*dt),
            (PropertyKind::Reference(target), false) if !prop.many => {
                current = catalog
                    .find_type(target)
                    .ok_or_else(|| Error::UnknownType(target.clone()))?;
            }
            _ => {
                return Err(Error::InvalidMapping(format!(
                    "key path '{}' must end at a data property through singular references",
                    path.join(".")
                )));
            }
        }
    }
    Err(Error::InvalidMapping("empty key path".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellgraph_api::Catalog;

    fn catalog() -> Catalog {
        Catalog::new()
            .with(
                TypeDef::new("http://ex", "Person")
                    .data("name", DataType::String)
                    .data("age", DataType::Int)
                    .reference("employer", "Company", false),
            )
            .with(TypeDef::new("http://ex", "Company").data("name", DataType::String))
    }

    const MAPPING: &str = r#"{
        "tables": [{
            "name": "people",
            "data_family": "f",
            "types": [{
                "type": "Person",
                "row_key": [
                    { "predefined": "type", "codec": "hash" },
                    { "path": "employer.name", "codec": "pad", "max_length": 8 },
                    { "path": "age", "codec": "native" }
                ]
            }]
        }]
    }"#;

    #[test]
    fn resolves_paths_through_references() {
        let mapping = StoreMapping::from_json(MAPPING, &catalog()).unwrap();
        let person = mapping.require("Person").unwrap();
        assert_eq!(person.fields().len(), 3);
        assert_eq!(person.fields()[1].data_type(), DataType::String);
        assert_eq!(person.fields()[2].data_type(), DataType::Int);
        assert_eq!(person.table().hash_algorithm, HashAlgorithm::Jenkins);
        assert!(person.table().tombstone_rows);
        assert_eq!(person.predefined_len(), 1);
        let cat = catalog();
        let prefix = person.type_prefix(cat.find_type("Person").unwrap()).unwrap();
        assert_eq!(prefix.len(), 4);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = StoreMapping::new().require("Nope").unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
    }

    #[test]
    fn bad_path_is_rejected() {
        let text = MAPPING.replace("employer.name", "employer");
        assert!(matches!(
            StoreMapping::from_json(&text, &catalog()),
            Err(Error::InvalidMapping(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, MAPPING).unwrap();
        let mapping = StoreMapping::from_file(&path, &catalog()).unwrap();
        assert!(mapping.key_mapping("Person").is_some());
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Declared data type of a data property or key field.
///
/// The type decides how literals are converted and which [`DataFlavor`]
/// drives comparison semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Decimal,
    String,
    Date,
    DateTime,
    Time,
    Bytes,
    Object,
}

/// Coarse classification of a [`DataType`].
///
/// Booleans are integral: they order as 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFlavor {
    Integral,
    Real,
    String,
    Temporal,
    Other,
}

impl fmt::Display for DataFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataFlavor::Integral => "integral",
            DataFlavor::Real => "real",
            DataFlavor::String => "string",
            DataFlavor::Temporal => "temporal",
            DataFlavor::Other => "other",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("cannot convert '{text}' to {data_type:?}")]
    Invalid { text: String, data_type: DataType },

    #[error("value '{text}' out of range for {data_type:?}")]
    OutOfRange { text: String, data_type: DataType },

    #[error("data type {0:?} has no literal form")]
    Unsupported(DataType),
}

impl DataType {
    pub fn flavor(self) -> DataFlavor {
        match self {
            DataType::Boolean
            | DataType::Byte
            | DataType::Short
            | DataType::Int
            | DataType::Long => DataFlavor::Integral,
            DataType::Float | DataType::Double | DataType::Decimal => DataFlavor::Real,
            DataType::String => DataFlavor::String,
            DataType::Date | DataType::DateTime | DataType::Time => DataFlavor::Temporal,
            DataType::Bytes | DataType::Object => DataFlavor::Other,
        }
    }

    /// Converts literal text into a value of this type.
    ///
    /// Temporal types other than `Date` stay strings; they compare
    /// lexicographically.
    pub fn convert(self, text: &str) -> Result<Value, ConvertError> {
        let invalid = || ConvertError::Invalid {
            text: text.to_string(),
            data_type: self,
        };
        match self {
            DataType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            DataType::Byte | DataType::Short | DataType::Int | DataType::Long => {
                let v: i64 = text.trim().parse().map_err(|_| invalid())?;
                let (min, max) = self.integral_bounds();
                if v < min || v > max {
                    return Err(ConvertError::OutOfRange {
                        text: text.to_string(),
                        data_type: self,
                    });
                }
                Ok(Value::Int(v))
            }
            DataType::Float | DataType::Double | DataType::Decimal => text
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid()),
            DataType::String | DataType::DateTime | DataType::Time => {
                Ok(Value::String(text.to_string()))
            }
            DataType::Date => parse_date(text.trim())
                .map(Value::Date)
                .ok_or_else(invalid),
            DataType::Bytes => Ok(Value::Bytes(text.as_bytes().to_vec())),
            DataType::Object => Err(ConvertError::Unsupported(self)),
        }
    }

    /// Inclusive value range of an integral type.
    pub fn integral_bounds(self) -> (i64, i64) {
        match self {
            DataType::Boolean => (0, 1),
            DataType::Byte => (i64::from(i8::MIN), i64::from(i8::MAX)),
            DataType::Short => (i64::from(i16::MIN), i64::from(i16::MAX)),
            DataType::Int => (i64::from(i32::MIN), i64::from(i32::MAX)),
            _ => (i64::MIN, i64::MAX),
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    // Timestamps such as 2024-03-01T10:00:00Z carry the date in their first ten chars.
    text.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

/// A data value carried by a graph property or a key field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// A value collected at the endpoint of a property path.
///
/// `Absent` marks a single-valued property that is not set on the object
/// it was collected from.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected {
    Present(Value),
    Absent,
}

impl Collected {
    pub fn is_absent(&self) -> bool {
        matches!(self, Collected::Absent)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Collected::Present(v) => Some(v),
            Collected::Absent => None,
        }
    }
}

impl From<Option<Value>> for Collected {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Collected::Absent, Collected::Present)
    }
}

/// What a property holds: data of a declared type, or references to
/// objects of a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Data(DataType),
    Reference(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
    pub many: bool,
}

impl PropertyDef {
    pub fn data_type(&self) -> Option<DataType> {
        match self.kind {
            PropertyKind::Data(dt) => Some(dt),
            PropertyKind::Reference(_) => None,
        }
    }
}

/// Type metadata for one object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub uri: String,
    pub name: String,
    pub properties: Vec<PropertyDef>,
}

impl TypeDef {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a single-valued data property.
    pub fn data(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with(name, PropertyKind::Data(data_type), false)
    }

    /// Adds a multi-valued data property.
    pub fn data_many(self, name: impl Into<String>, data_type: DataType) -> Self {
        self.with(name, PropertyKind::Data(data_type), true)
    }

    pub fn reference(self, name: impl Into<String>, target: impl Into<String>, many: bool) -> Self {
        self.with(name, PropertyKind::Reference(target.into()), many)
    }

    fn with(mut self, name: impl Into<String>, kind: PropertyKind, many: bool) -> Self {
        self.properties.push(PropertyDef {
            name: name.into(),
            kind,
            many,
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// `uri#name`, the form used in key-space prefixes.
    pub fn qualified_name(&self) -> String {
        format!("{}#{}", self.uri, self.name)
    }
}

/// Lookup of type metadata by type name.
pub trait TypeCatalog {
    fn find_type(&self, name: &str) -> Option<&TypeDef>;
}

/// A map-backed [`TypeCatalog`].
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: BTreeMap<String, TypeDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: TypeDef) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn with(mut self, def: TypeDef) -> Self {
        self.insert(def);
        self
    }
}

impl TypeCatalog for Catalog {
    fn find_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }
}

/// Index of a node inside a [`DataGraph`].
pub type NodeIndex = usize;

/// Content of one set property on a [`DataNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    Values(Vec<Value>),
    One(NodeIndex),
    Many(Vec<NodeIndex>),
}

/// One object of an assembled graph. Unset properties have no entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DataNode {
    pub type_name: String,
    fields: BTreeMap<String, Field>,
}

impl DataNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, property: impl Into<String>, field: Field) {
        self.fields.insert(property.into(), field);
    }

    pub fn with(mut self, property: impl Into<String>, field: Field) -> Self {
        self.set(property, field);
        self
    }

    pub fn with_value(self, property: impl Into<String>, value: Value) -> Self {
        self.with(property, Field::Value(value))
    }

    pub fn get(&self, property: &str) -> Option<&Field> {
        self.fields.get(property)
    }

    pub fn is_set(&self, property: &str) -> bool {
        self.fields.contains_key(property)
    }
}

/// An object graph materialized from one store row. Node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct DataGraph {
    row_key: Vec<u8>,
    nodes: Vec<DataNode>,
}

impl DataGraph {
    pub fn new(row_key: impl Into<Vec<u8>>, root: DataNode) -> Self {
        Self {
            row_key: row_key.into(),
            nodes: vec![root],
        }
    }

    pub fn row_key(&self) -> &[u8] {
        &self.row_key
    }

    pub fn add_node(&mut self, node: DataNode) -> NodeIndex {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn root(&self) -> &DataNode {
        &self.nodes[0]
    }

    pub fn root_index(&self) -> NodeIndex {
        0
    }

    pub fn node(&self, index: NodeIndex) -> Option<&DataNode> {
        self.nodes.get(index)
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> Option<&mut DataNode> {
        self.nodes.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// One column cell of a store row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
}

/// A row returned by a scan: its key and the cells that passed the column filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultRow {
    pub row_key: Vec<u8>,
    pub cells: Vec<Cell>,
}

impl ResultRow {
    pub fn new(row_key: impl Into<Vec<u8>>) -> Self {
        Self {
            row_key: row_key.into(),
            cells: Vec::new(),
        }
    }

    pub fn with_cell(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.cells.push(Cell {
            family: family.into(),
            qualifier: qualifier.into(),
            value: value.into(),
        });
        self
    }

    pub fn contains_column(&self, family: &[u8], qualifier: &[u8]) -> bool {
        self.value(family, qualifier).is_some()
    }

    pub fn value(&self, family: &[u8], qualifier: &[u8]) -> Option<&[u8]> {
        self.cells
            .iter()
            .find(|c| c.family == family && c.qualifier == qualifier)
            .map(|c| c.value.as_slice())
    }
}

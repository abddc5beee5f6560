//! Column qualifiers for graph and edge metadata.

/// Row-level metadata columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphMetaKey {
    /// Present on rows whose graph has been deleted.
    Tombstone,
    /// Root type of the graph stored in the row.
    RootType,
    Timestamp,
}

impl GraphMetaKey {
    pub fn code(self) -> &'static str {
        match self {
            GraphMetaKey::Tombstone => "__TSTN__",
            GraphMetaKey::RootType => "__RTTP__",
            GraphMetaKey::Timestamp => "__TSMP__",
        }
    }
}

/// Metadata columns describing one edge collection of a reference property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeMetaKey {
    BaseType,
    Path,
    Sequences,
    SubType,
    RowKeys,
    Count,
}

impl EdgeMetaKey {
    pub fn code(self) -> &'static str {
        match self {
            EdgeMetaKey::BaseType => "_BTP_",
            EdgeMetaKey::Path => "_PTH_",
            EdgeMetaKey::Sequences => "_SQS_",
            EdgeMetaKey::SubType => "_STP_",
            EdgeMetaKey::RowKeys => "_RKS_",
            EdgeMetaKey::Count => "_CNT_",
        }
    }
}

/// Produces column qualifiers for metadata cells.
pub trait ColumnKeyFactory {
    fn graph_column(&self, key: GraphMetaKey) -> Vec<u8>;

    /// Qualifier of an edge metadata column. `sequence` distinguishes
    /// instances of the same type within one row.
    fn edge_column(
        &self,
        type_name: &str,
        sequence: Option<u64>,
        property: &str,
        key: EdgeMetaKey,
    ) -> Vec<u8>;
}

/// Joins qualifier parts with a single delimiter byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedColumnKeyFactory {
    delimiter: u8,
}

impl Default for DelimitedColumnKeyFactory {
    fn default() -> Self {
        Self { delimiter: b'|' }
    }
}

impl DelimitedColumnKeyFactory {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }
}

impl ColumnKeyFactory for DelimitedColumnKeyFactory {
    fn graph_column(&self, key: GraphMetaKey) -> Vec<u8> {
        key.code().as_bytes().to_vec()
    }

    fn edge_column(
        &self,
        type_name: &str,
        sequence: Option<u64>,
        property: &str,
        key: EdgeMetaKey,
    ) -> Vec<u8> {
        let mut out = type_name.as_bytes().to_vec();
        if let Some(seq) = sequence {
            out.push(self.delimiter);
            out.extend_from_slice(seq.to_string().as_bytes());
        }
        out.push(self.delimiter);
        out.extend_from_slice(property.as_bytes());
        out.push(self.delimiter);
        out.extend_from_slice(key.code().as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_columns_are_delimited() {
        let f = DelimitedColumnKeyFactory::default();
        assert_eq!(
            f.edge_column("Person", None, "friends", EdgeMetaKey::Count),
            b"Person|friends|_CNT_".to_vec()
        );
        assert_eq!(
            f.edge_column("Person", Some(3), "friends", EdgeMetaKey::RowKeys),
            b"Person|3|friends|_RKS_".to_vec()
        );
        assert_eq!(f.graph_column(GraphMetaKey::Tombstone), b"__TSTN__".to_vec());
    }
}

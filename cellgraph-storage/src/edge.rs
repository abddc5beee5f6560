use crate::column_key::{ColumnKeyFactory, EdgeMetaKey};
use crate::{Error, Result};
use cellgraph_api::ResultRow;

/// Decoded metadata of one reference property's edge collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeCollection {
    pub base_type: String,
    pub path: Option<String>,
    pub sequences: Vec<u64>,
    pub sub_type: Option<String>,
    pub row_keys: Vec<Vec<u8>>,
    pub count: u64,
}

/// Reads edge metadata cells from a row.
pub struct EdgeReader<'a, F: ColumnKeyFactory> {
    factory: &'a F,
    family: &'a [u8],
}

impl<'a, F: ColumnKeyFactory> EdgeReader<'a, F> {
    pub fn new(factory: &'a F, family: &'a [u8]) -> Self {
        Self { factory, family }
    }

    pub fn exists(
        &self,
        row: &ResultRow,
        type_name: &str,
        sequence: Option<u64>,
        property: &str,
    ) -> bool {
        let qual = self
            .factory
            .edge_column(type_name, sequence, property, EdgeMetaKey::BaseType);
        row.contains_column(self.family, &qual)
    }

    /// Reads and checks an edge collection. The declared count must agree
    /// with every element list that is present.
    pub fn read(
        &self,
        row: &ResultRow,
        type_name: &str,
        sequence: Option<u64>,
        property: &str,
    ) -> Result<EdgeCollection> {
        let column = |key: EdgeMetaKey| {
            self.factory.edge_column(type_name, sequence, property, key)
        };
        let find = |key: EdgeMetaKey| row.value(self.family, &column(key));
        let fetch = |key: EdgeMetaKey| {
            find(key).ok_or_else(|| {
                Error::MissingColumn(String::from_utf8_lossy(&column(key)).into_owned())
            })
        };

        let base_type = utf8(fetch(EdgeMetaKey::BaseType)?)?;
        let count_text = utf8(fetch(EdgeMetaKey::Count)?)?;
        let count: u64 = count_text
            .trim()
            .parse()
            .map_err(|_| Error::MalformedKey(format!("edge count '{count_text}'")))?;

        let mut edges = EdgeCollection {
            base_type,
            count,
            path: find(EdgeMetaKey::Path).map(utf8).transpose()?,
            sub_type: find(EdgeMetaKey::SubType).map(utf8).transpose()?,
            ..Default::default()
        };

        if let Some(bytes) = find(EdgeMetaKey::Sequences) {
            edges.sequences = decode_sequences(bytes)?;
            check_count(&column(EdgeMetaKey::Count), count, edges.sequences.len())?;
        }
        if let Some(bytes) = find(EdgeMetaKey::RowKeys) {
            edges.row_keys = decode_row_keys(bytes)?;
            check_count(&column(EdgeMetaKey::Count), count, edges.row_keys.len())?;
        }
        Ok(edges)
    }
}

fn check_count(qualifier: &[u8], count: u64, decoded: usize) -> Result<()> {
    if count != decoded as u64 {
        return Err(Error::DecodeIntegrity {
            column: String::from_utf8_lossy(qualifier).into_owned(),
            found: count as usize,
            expected: decoded,
        });
    }
    Ok(())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::MalformedKey("edge metadata is not utf-8".into()))
}

/// Comma-separated decimal sequence numbers.
pub fn encode_sequences(sequences: &[u64]) -> Vec<u8> {
    sequences
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
        .into_bytes()
}

pub fn decode_sequences(bytes: &[u8]) -> Result<Vec<u64>> {
    let text = utf8(bytes)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|_| Error::MalformedKey(format!("edge sequence '{s}'")))
        })
        .collect()
}

/// Row keys, each prefixed with its u32 big-endian length.
pub fn encode_row_keys(keys: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    for key in keys {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key);
    }
    out
}

pub fn decode_row_keys(mut bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut keys = Vec::new();
    while !bytes.is_empty() {
        let Some((len, rest)) = bytes.split_first_chunk::<4>() else {
            return Err(Error::MalformedKey("truncated edge row key length".into()));
        };
        let len = u32::from_be_bytes(*len) as usize;
        if rest.len() < len {
            return Err(Error::MalformedKey("truncated edge row key".into()));
        }
        let (key, tail) = rest.split_at(len);
        keys.push(key.to_vec());
        bytes = tail;
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_key::DelimitedColumnKeyFactory;

    const FAM: &[u8] = b"f";

    fn row_with(factory: &DelimitedColumnKeyFactory, count: &str, seqs: &[u64]) -> ResultRow {
        let q = |k| factory.edge_column("Person", None, "friends", k);
        ResultRow::new(b"r1".to_vec())
            .with_cell(FAM, q(EdgeMetaKey::BaseType), b"http://ex#Person".to_vec())
            .with_cell(FAM, q(EdgeMetaKey::Count), count.as_bytes().to_vec())
            .with_cell(FAM, q(EdgeMetaKey::Sequences), encode_sequences(seqs))
            .with_cell(
                FAM,
                q(EdgeMetaKey::RowKeys),
                encode_row_keys(&vec![b"k1".to_vec(); seqs.len()]),
            )
    }

    #[test]
    fn reads_consistent_collection() {
        let factory = DelimitedColumnKeyFactory::default();
        let row = row_with(&factory, "2", &[1, 2]);
        let reader = EdgeReader::new(&factory, FAM);
        assert!(reader.exists(&row, "Person", None, "friends"));
        let edges = reader.read(&row, "Person", None, "friends").unwrap();
        assert_eq!(edges.count, 2);
        assert_eq!(edges.sequences, vec![1, 2]);
        assert_eq!(edges.row_keys.len(), 2);
        assert_eq!(edges.path, None);
    }

    #[test]
    fn count_mismatch_is_an_integrity_error() {
        let factory = DelimitedColumnKeyFactory::default();
        let row = row_with(&factory, "3", &[1, 2]);
        let err = EdgeReader::new(&factory, FAM)
            .read(&row, "Person", None, "friends")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DecodeIntegrity {
                found: 3,
                expected: 2,
                ..
            }
        ));
    }

    #[test]
    fn missing_count_column() {
        let factory = DelimitedColumnKeyFactory::default();
        let row = ResultRow::new(b"r1".to_vec()).with_cell(
            FAM,
            factory.edge_column("Person", None, "friends", EdgeMetaKey::BaseType),
            b"T".to_vec(),
        );
        let err = EdgeReader::new(&factory, FAM)
            .read(&row, "Person", None, "friends")
            .unwrap_err();
        assert!(matches!(err, Error::MissingColumn(_)));
    }

    #[test]
    fn truncated_row_keys() {
        assert!(decode_row_keys(&[0, 0, 0, 5, b'a']).is_err());
        assert_eq!(decode_sequences(b"").unwrap(), Vec::<u64>::new());
    }
}

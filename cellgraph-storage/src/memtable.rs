use crate::scan::{ColumnFilter, ScanDescriptor, ScanExecutor, Scanner};
use cellgraph_api::{Cell, ResultRow};
use std::collections::BTreeMap;
use std::collections::btree_map::Range;
use std::io;
use std::ops::Bound;

type Column = (Vec<u8>, Vec<u8>);

/// Sorted in-memory table. Serves scans in row key order.
#[derive(Debug, Default, Clone)]
pub struct MemTable {
    rows: BTreeMap<Vec<u8>, BTreeMap<Column, Vec<u8>>>,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(
        &mut self,
        row_key: impl Into<Vec<u8>>,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) {
        self.rows
            .entry(row_key.into())
            .or_default()
            .insert((family.into(), qualifier.into()), value.into());
    }

    pub fn put_row(&mut self, row: ResultRow) {
        let cells = self.rows.entry(row.row_key).or_default();
        for cell in row.cells {
            cells.insert((cell.family, cell.qualifier), cell.value);
        }
    }

    pub fn delete_row(&mut self, row_key: &[u8]) {
        self.rows.remove(row_key);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn project(
        row_key: &[u8],
        cells: &BTreeMap<Column, Vec<u8>>,
        columns: &ColumnFilter,
    ) -> ResultRow {
        let mut row = ResultRow::new(row_key.to_vec());
        for ((family, qualifier), value) in cells {
            let cell = Cell {
                family: family.clone(),
                qualifier: qualifier.clone(),
                value: value.clone(),
            };
            if columns.accepts(&cell) {
                row.cells.push(cell);
            }
        }
        row
    }

    fn range(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
    ) -> Range<'_, Vec<u8>, BTreeMap<Column, Vec<u8>>> {
        let upper = match stop {
            Some(stop) if stop <= start => Bound::Excluded(start.to_vec()),
            Some(stop) => Bound::Excluded(stop.to_vec()),
            None => Bound::Unbounded,
        };
        self.rows.range((Bound::Included(start.to_vec()), upper))
    }
}

/// Keeps a deterministic `fraction` of row keys.
fn sampled(row_key: &[u8], fraction: f32) -> bool {
    let bucket = crc32fast::hash(row_key) % 10_000;
    (bucket as f32) < fraction.clamp(0.0, 1.0) * 10_000.0
}

impl ScanExecutor for MemTable {
    fn scan<'a>(
        &'a self,
        scan: &ScanDescriptor,
        columns: &ColumnFilter,
    ) -> io::Result<Scanner<'a>> {
        let columns = columns.clone();
        match scan {
            ScanDescriptor::Complete(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "complete keys are served by point lookups",
            )),
            ScanDescriptor::Partial(p) => {
                let sample = p.sample;
                Ok(Box::new(
                    self.range(&p.start, p.stop.as_deref())
                        .filter(move |(k, _)| sample.is_none_or(|s| sampled(k, s)))
                        .map(move |(k, cells)| Ok(Self::project(k, cells, &columns))),
                ))
            }
            ScanDescriptor::Fuzzy(f) => {
                let fuzzy = f.clone();
                Ok(Box::new(
                    self.range(&f.start, f.stop.as_deref())
                        .filter(move |(k, _)| fuzzy.matches(k))
                        .map(move |(k, cells)| Ok(Self::project(k, cells, &columns))),
                ))
            }
        }
    }

    fn get(&self, key: &[u8], columns: &ColumnFilter) -> io::Result<Option<ResultRow>> {
        Ok(self
            .rows
            .get(key)
            .map(|cells| Self::project(key, cells, columns)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::{CompleteKey, FuzzyKey, PartialKey};

    fn table() -> MemTable {
        let mut t = MemTable::new();
        for k in ["a1", "a2", "b1", "b2", "c1"] {
            t.put(k.as_bytes().to_vec(), b"f".to_vec(), b"q".to_vec(), k.as_bytes().to_vec());
        }
        t
    }

    fn keys(scanner: Scanner<'_>) -> Vec<Vec<u8>> {
        scanner.map(|r| r.unwrap().row_key).collect()
    }

    #[test]
    fn partial_scan_is_half_open() {
        let t = table();
        let scan = ScanDescriptor::Partial(PartialKey {
            start: b"a".to_vec(),
            stop: Some(b"b".to_vec()),
            sample: None,
        });
        let got = keys(t.scan(&scan, &ColumnFilter::all()).unwrap());
        assert_eq!(got, vec![b"a1".to_vec(), b"a2".to_vec()]);
    }

    #[test]
    fn fuzzy_scan_filters_by_mask() {
        let t = table();
        let scan = ScanDescriptor::Fuzzy(FuzzyKey {
            template: b"\x001".to_vec(),
            mask: vec![1, 0],
            start: Vec::new(),
            stop: None,
        });
        let got = keys(t.scan(&scan, &ColumnFilter::all()).unwrap());
        assert_eq!(got, vec![b"a1".to_vec(), b"b1".to_vec(), b"c1".to_vec()]);
    }

    #[test]
    fn complete_keys_are_not_scannable() {
        let t = table();
        let scan = ScanDescriptor::Complete(CompleteKey { key: b"a1".to_vec() });
        assert!(t.scan(&scan, &ColumnFilter::all()).is_err());
        assert!(t.get(b"a1", &ColumnFilter::all()).unwrap().is_some());
        assert!(t.get(b"zz", &ColumnFilter::all()).unwrap().is_none());
    }

    #[test]
    fn sampling_is_deterministic_and_bounded() {
        let t = table();
        let scan = ScanDescriptor::Partial(PartialKey {
            start: Vec::new(),
            stop: None,
            sample: Some(0.0),
        });
        assert!(keys(t.scan(&scan, &ColumnFilter::all()).unwrap()).is_empty());
        let all = ScanDescriptor::Partial(PartialKey {
            start: Vec::new(),
            stop: None,
            sample: Some(1.0),
        });
        assert_eq!(keys(t.scan(&all, &ColumnFilter::all()).unwrap()).len(), 5);
    }
}

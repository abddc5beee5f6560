use crate::row_key::fuzzy_matches;
use cellgraph_api::{Cell, ResultRow};
use std::collections::BTreeSet;
use std::io;

/// Point lookup of a single fully-specified row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteKey {
    pub key: Vec<u8>,
}

/// Range scan over `[start, stop)`. An absent `stop` scans to the end of
/// the table.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialKey {
    pub start: Vec<u8>,
    pub stop: Option<Vec<u8>>,
    /// Fraction of rows to sample, if any.
    pub sample: Option<f32>,
}

/// Range scan filtered by a byte template where mask positions set to
/// [`FUZZY_ANY`](crate::row_key::FUZZY_ANY) match any byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzyKey {
    pub template: Vec<u8>,
    pub mask: Vec<u8>,
    pub start: Vec<u8>,
    pub stop: Option<Vec<u8>>,
}

impl FuzzyKey {
    pub fn matches(&self, key: &[u8]) -> bool {
        fuzzy_matches(key, &self.template, &self.mask)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanDescriptor {
    Complete(CompleteKey),
    Partial(PartialKey),
    Fuzzy(FuzzyKey),
}

impl ScanDescriptor {
    pub fn is_complete(&self) -> bool {
        matches!(self, ScanDescriptor::Complete(_))
    }

    /// Lower bound of the scanned key range.
    pub fn start(&self) -> &[u8] {
        match self {
            ScanDescriptor::Complete(c) => &c.key,
            ScanDescriptor::Partial(p) => &p.start,
            ScanDescriptor::Fuzzy(f) => &f.start,
        }
    }

    /// Exclusive upper bound of the scanned key range, if any.
    pub fn stop(&self) -> Option<&[u8]> {
        match self {
            ScanDescriptor::Complete(_) => None,
            ScanDescriptor::Partial(p) => p.stop.as_deref(),
            ScanDescriptor::Fuzzy(f) => f.stop.as_deref(),
        }
    }
}

/// Restricts the cells a scan returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFilter {
    families: BTreeSet<Vec<u8>>,
    columns: BTreeSet<(Vec<u8>, Vec<u8>)>,
}

impl ColumnFilter {
    /// Accepts every cell.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family: impl Into<Vec<u8>>) -> Self {
        self.families.insert(family.into());
        self
    }

    pub fn with_column(
        mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
    ) -> Self {
        self.columns.insert((family.into(), qualifier.into()));
        self
    }

    pub fn accepts(&self, cell: &Cell) -> bool {
        if self.families.is_empty() && self.columns.is_empty() {
            return true;
        }
        self.families.contains(&cell.family)
            || self
                .columns
                .contains(&(cell.family.clone(), cell.qualifier.clone()))
    }
}

/// Lazy rows of one scan. Dropping the scanner releases it.
pub type Scanner<'a> = Box<dyn Iterator<Item = io::Result<ResultRow>> + 'a>;

/// The store's scan capability.
pub trait ScanExecutor {
    /// Opens a range scan. Complete keys are served by [`get`](Self::get).
    fn scan<'a>(&'a self, scan: &ScanDescriptor, columns: &ColumnFilter) -> io::Result<Scanner<'a>>;

    fn get(&self, key: &[u8], columns: &ColumnFilter) -> io::Result<Option<ResultRow>>;
}

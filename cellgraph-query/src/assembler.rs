//! Turns scanned rows into result graphs inside a `[start, end]` window of
//! accepted ordinals.
//!
//! Per row: tombstone rows are dropped, then rows that cannot land in the
//! window are slid past without materializing (only when no recognizer is
//! present, since otherwise the ordinal depends on recognition), then the
//! graph is materialized, recognized and placed by ordinal. Ordinals are
//! 1-based and cumulative across every scan fed to the same assembler.

use crate::error::Result;
use crate::ordering::ResultsComparator;
use crate::recognizer::GraphRecognizer;
use cellgraph_api::{DataGraph, ResultRow};
use cellgraph_storage::TableMapping;
use cellgraph_storage::column_key::{ColumnKeyFactory, DelimitedColumnKeyFactory, GraphMetaKey};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Builds a graph from the cells of one row.
pub trait GraphMaterializer {
    fn assemble(&mut self, row: &ResultRow) -> Result<DataGraph>;
    /// Drops any per-row state held since the last `assemble`.
    fn clear(&mut self);
}

/// Inclusive, 1-based range of accepted ordinals to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl Window {
    pub fn new(start: Option<u64>, end: Option<u64>) -> Self {
        Self { start, end }
    }

    pub fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    pub fn contains(&self, ordinal: u64) -> bool {
        self.start.is_none_or(|s| ordinal >= s) && self.end.is_none_or(|e| ordinal <= e)
    }
}

pub struct SlidingResultsAssembler<M> {
    materializer: M,
    data_family: Vec<u8>,
    tombstone: Option<Vec<u8>>,
    recognizer: Option<Box<dyn GraphRecognizer>>,
    comparator: Option<Box<dyn ResultsComparator>>,
    window: Window,
    seen: Option<HashSet<Vec<u8>>>,
    graphs: VecDeque<DataGraph>,
    accepted: u64,
    retained: usize,
    ignored: usize,
    unrecognized: usize,
}

impl<M: GraphMaterializer> SlidingResultsAssembler<M> {
    pub fn new(materializer: M, table: &TableMapping) -> Self {
        let tombstone = table
            .tombstone_rows
            .then(|| DelimitedColumnKeyFactory::default().graph_column(GraphMetaKey::Tombstone));
        Self {
            materializer,
            data_family: table.data_family.clone(),
            tombstone,
            recognizer: None,
            comparator: None,
            window: Window::default(),
            seen: None,
            graphs: VecDeque::new(),
            accepted: 0,
            retained: 0,
            ignored: 0,
            unrecognized: 0,
        }
    }

    pub fn with_recognizer(mut self, recognizer: Box<dyn GraphRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_comparator(mut self, comparator: Box<dyn ResultsComparator>) -> Self {
        self.comparator = Some(comparator);
        self
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Skips rows whose key was already collected. Needed when several
    /// scans may overlap.
    pub fn with_dedupe(mut self) -> Self {
        self.seen = Some(HashSet::new());
        self
    }

    pub fn has_comparator(&self) -> bool {
        self.comparator.is_some()
    }

    pub fn window(&self) -> Window {
        self.window
    }

    fn is_tombstone(&self, row: &ResultRow) -> bool {
        self.tombstone
            .as_deref()
            .is_some_and(|q| row.contains_column(&self.data_family, q))
    }

    /// Feeds one row. Returns whether a graph was buffered for output.
    pub fn collect(&mut self, row: &ResultRow) -> Result<bool> {
        if self.is_tombstone(row) {
            return Ok(false);
        }
        if let Some(seen) = self.seen.as_mut()
            && !seen.insert(row.row_key.clone())
        {
            return Ok(false);
        }
        if self.recognizer.is_none() && !self.window.contains(self.accepted + 1) {
            self.accepted += 1;
            self.ignored += 1;
            return Ok(false);
        }

        let assembled = self.materializer.assemble(row);
        self.materializer.clear();
        let graph = assembled?;

        if let Some(recognizer) = &self.recognizer
            && !recognizer.recognize(&graph)?
        {
            self.unrecognized += 1;
            return Ok(false);
        }

        self.accepted += 1;
        if !self.window.contains(self.accepted) {
            debug!(ordinal = self.accepted, "graph outside results window");
            return Ok(false);
        }
        self.graphs.push_back(graph);
        self.retained += 1;
        Ok(true)
    }

    /// Next buffered graph in arrival order. Always `None` when a comparator
    /// is set, since ordering needs the complete set.
    pub fn pop_ready(&mut self) -> Option<DataGraph> {
        if self.comparator.is_some() {
            return None;
        }
        self.graphs.pop_front()
    }

    /// Buffered graphs, sorted when a comparator is set.
    pub fn into_results(self) -> Vec<DataGraph> {
        let mut graphs: Vec<DataGraph> = self.graphs.into();
        if let Some(comparator) = &self.comparator {
            graphs.sort_by(|a, b| comparator.compare(a, b));
        }
        graphs
    }

    /// Takes the buffered graphs, sorted when a comparator is set.
    pub fn drain_results(&mut self) -> Vec<DataGraph> {
        let mut graphs: Vec<DataGraph> = std::mem::take(&mut self.graphs).into();
        if let Some(comparator) = &self.comparator {
            graphs.sort_by(|a, b| comparator.compare(a, b));
        }
        graphs
    }

    pub fn is_end_range_reached(&self) -> bool {
        self.window.end.is_some_and(|end| self.accepted >= end)
    }

    /// Graphs placed inside the window so far.
    pub fn size(&self) -> usize {
        self.retained
    }

    /// Rows slid past without materializing.
    pub fn ignored_count(&self) -> usize {
        self.ignored
    }

    pub fn unrecognized_count(&self) -> usize {
        self.unrecognized
    }
}

use cellgraph_api::ResultRow;
use cellgraph_storage::memtable::MemTable;
use cellgraph_storage::table_cache::TableHandle;
use cellgraph_storage::{ColumnFilter, ScanDescriptor, ScanExecutor, Scanner};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A wide-column store that hands out table handles.
pub trait Store {
    type Table: TableHandle + ScanExecutor;

    fn open_table(&self, name: &str) -> io::Result<Self::Table>;
}

/// Store backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemStore {
    tables: BTreeMap<String, Arc<MemTable>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, table: MemTable) -> Self {
        self.tables.insert(name.into(), Arc::new(table));
        self
    }

    /// Handles opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles closed so far.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Store for MemStore {
    type Table = MemTableHandle;

    fn open_table(&self, name: &str) -> io::Result<MemTableHandle> {
        let table = self.tables.get(name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no table named {name}"))
        })?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemTableHandle {
            name: name.to_string(),
            table: Arc::clone(table),
            closed: Arc::clone(&self.closed),
        })
    }
}

#[derive(Debug)]
pub struct MemTableHandle {
    name: String,
    table: Arc<MemTable>,
    closed: Arc<AtomicUsize>,
}

impl TableHandle for MemTableHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(&self) {
        debug!(table = %self.name, "closing table handle");
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScanExecutor for MemTableHandle {
    fn scan<'a>(
        &'a self,
        scan: &ScanDescriptor,
        columns: &ColumnFilter,
    ) -> io::Result<Scanner<'a>> {
        self.table.scan(scan, columns)
    }

    fn get(&self, key: &[u8], columns: &ColumnFilter) -> io::Result<Option<ResultRow>> {
        self.table.get(key, columns)
    }
}

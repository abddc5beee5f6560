use crate::config::{FetchType, QueryConfig};
use crate::error::{Error, Result};
use crate::materializer::RowGraphMaterializer;
use crate::query::Query;
use crate::store::Store;
use cellgraph_api::{Catalog, DataGraph, TypeCatalog, TypeDef};
use cellgraph_query::ast::properties;
use cellgraph_query::{
    ExprRecognizer, ExprRef, GraphStream, OrderBy, ScanPlan, SlidingResultsAssembler,
    WildcardCache, Window, execute_collect, execute_streaming, plan_scans,
};
use cellgraph_storage::table_cache::TableCache;
use cellgraph_storage::{ColumnFilter, KeyMappingProvider, StoreMapping, TypeKeyMapping};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

type Assembler<'a, T> = SlidingResultsAssembler<RowGraphMaterializer<'a, T>>;

/// Answers graph queries against the tables of a wide-column store.
///
/// Table handles are cached per service and closed when evicted, expired
/// or on [`GraphService::destroy`].
pub struct GraphService<S: Store> {
    store: S,
    catalog: Catalog,
    mapping: StoreMapping,
    config: QueryConfig,
    tables: TableCache<S::Table>,
    wildcards: Arc<WildcardCache>,
    graph_depth: usize,
}

impl<S: Store> GraphService<S> {
    /// Creates a service with configuration resolved from the environment.
    pub fn new(store: S, catalog: Catalog, mapping: StoreMapping) -> Result<Self> {
        let config = QueryConfig::resolve(&BTreeMap::new())?;
        Ok(Self::with_config(store, catalog, mapping, config))
    }

    /// Loads the key mapping from a JSON file.
    pub fn open(store: S, catalog: Catalog, mapping_path: impl AsRef<Path>) -> Result<Self> {
        let mapping = StoreMapping::from_file(mapping_path, &catalog)?;
        Self::new(store, catalog, mapping)
    }

    pub fn with_config(
        store: S,
        catalog: Catalog,
        mapping: StoreMapping,
        config: QueryConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.table_cache_size).unwrap_or(NonZeroUsize::MIN);
        let tables = TableCache::new(capacity, config.table_cache_timeout);
        Self {
            store,
            catalog,
            mapping,
            config,
            tables,
            wildcards: Arc::new(WildcardCache::new()),
            graph_depth: 1,
        }
    }

    /// Minimum reference hops materialized below each root node. Queries
    /// whose WHERE paths reach further get the depth their paths need.
    pub fn with_graph_depth(mut self, depth: usize) -> Self {
        self.graph_depth = depth;
        self
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn root(&self, query: &Query) -> Result<(&TypeDef, &TypeKeyMapping)> {
        let root = self
            .catalog
            .find_type(query.root_type())
            .ok_or_else(|| Error::Query(format!("unknown root type {}", query.root_type())))?;
        let key_mapping = self.mapping.require(&root.name)?;
        Ok((root, key_mapping))
    }

    /// The cached handle of the table holding the query's root type.
    pub fn table(&self, query: &Query) -> Result<Arc<S::Table>> {
        let (_, key_mapping) = self.root(query)?;
        let handle = self
            .tables
            .get(&key_mapping.table().name, |name| self.store.open_table(name))?;
        Ok(handle)
    }

    fn plan(&self, query: &Query) -> Result<(QueryConfig, ScanPlan)> {
        let config = self.config.with_overrides(query.properties())?;
        if config.fetch_type == FetchType::Parallel {
            debug!("parallel fetch not available for row graphs - fetching serially");
        }
        let (root, key_mapping) = self.root(query)?;
        let mut plan = plan_scans(query.predicate(), root, &self.catalog, key_mapping)?;
        if query.predicate().is_none() && !query.has_range() {
            warn!(
                "no root predicate or range limit present - using default graph partial key scan - could result in very large results set"
            );
        }
        if let Some(fraction) = query.random_sample() {
            plan.apply_sample(fraction);
        }
        Ok((config, plan))
    }

    fn assembler<'a>(
        &'a self,
        table: &'a S::Table,
        query: &Query,
        config: &QueryConfig,
        plan: &ScanPlan,
    ) -> Result<(Assembler<'a, S::Table>, ColumnFilter)> {
        let (root, key_mapping) = self.root(query)?;
        let family = key_mapping.table().data_family.clone();
        // Ordering is restricted to root properties, so only WHERE paths add hops.
        let depth = query.predicate().map_or(0, path_depth).max(self.graph_depth);
        let materializer = RowGraphMaterializer::new(table, &self.catalog, root, family.clone())
            .with_max_depth(depth);
        let mut assembler = SlidingResultsAssembler::new(materializer, key_mapping.table())
            .with_window(Window::new(query.start_range(), query.end_range()));
        if plan.requires_recognizer
            && let Some(predicate) = query.predicate()
        {
            let recognizer = ExprRecognizer::new(
                Arc::clone(predicate),
                root,
                &self.catalog,
                Arc::clone(&self.wildcards),
            )?
            .with_default_delimiter(config.in_delimiter.clone());
            assembler = assembler.with_recognizer(Box::new(recognizer));
        }
        if !query.ordering().is_empty() {
            let order = OrderBy::new(root, query.ordering().to_vec())?;
            assembler = assembler.with_comparator(Box::new(order));
        }
        Ok((assembler, ColumnFilter::all().with_family(family)))
    }

    /// Streams the graphs matching `query` from `table`.
    ///
    /// Queries whose plan resolves to complete row keys cannot stream; the
    /// returned stream yields a single error for them. Use
    /// [`GraphService::find`] instead.
    pub fn find_as_stream<'a>(
        &'a self,
        table: &'a S::Table,
        query: &Query,
    ) -> Result<ResultStream<'a, S::Table>> {
        let (config, plan) = self.plan(query)?;
        let (assembler, columns) = self.assembler(table, query, &config, &plan)?;
        Ok(ResultStream {
            inner: execute_streaming(table, plan.scans, columns, assembler),
        })
    }

    /// Collects every graph matching `query`, serving complete row keys by
    /// point lookup.
    pub fn find(&self, query: &Query) -> Result<Vec<DataGraph>> {
        let table = self.table(query)?;
        let (config, plan) = self.plan(query)?;
        let (assembler, columns) = self.assembler(&table, query, &config, &plan)?;
        Ok(execute_collect(table.as_ref(), &plan.scans, &columns, assembler)?)
    }

    /// Closes every cached table handle.
    pub fn destroy(&self) {
        debug!(tables = self.tables.len(), "closing cached table handles");
        self.tables.invalidate_all();
    }
}

/// Reference hops needed to reach the endpoint of every path in `predicate`.
fn path_depth(predicate: &ExprRef) -> usize {
    properties(predicate)
        .iter()
        .filter_map(|p| p.names())
        .map(|names| names.len().saturating_sub(1))
        .max()
        .unwrap_or(0)
}

/// Graphs of one streamed query, in scan order or comparator order.
pub struct ResultStream<'a, T> {
    inner: GraphStream<'a, T, RowGraphMaterializer<'a, T>>,
}

impl<T> ResultStream<'_, T>
where
    T: cellgraph_storage::ScanExecutor,
{
    /// Graphs accepted into the window so far.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Rows skipped before the window start without materializing them.
    pub fn ignored_count(&self) -> usize {
        self.inner.ignored_count()
    }

    /// Graphs the recognizer rejected.
    pub fn unrecognized_count(&self) -> usize {
        self.inner.unrecognized_count()
    }
}

impl<T> Iterator for ResultStream<'_, T>
where
    T: cellgraph_storage::ScanExecutor,
{
    type Item = Result<DataGraph>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|r| r.map_err(Error::from))
    }
}

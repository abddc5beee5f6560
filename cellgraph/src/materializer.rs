//! Builds data graphs from store rows.
//!
//! Data properties live in the table's data family under a qualifier equal
//! to the property name, as UTF-8 literal text; multi-valued properties hold
//! a JSON array of such literals. Reference properties are described by
//! edge metadata columns whose row keys name the target rows, which are
//! fetched and linked up to a maximum depth.

use cellgraph_api::{
    DataGraph, DataNode, Field, NodeIndex, PropertyKind, ResultRow, TypeCatalog, TypeDef,
};
use cellgraph_query::{Error, GraphMaterializer, Result};
use cellgraph_storage::column_key::DelimitedColumnKeyFactory;
use cellgraph_storage::edge::EdgeReader;
use cellgraph_storage::{ColumnFilter, ScanExecutor};
use std::collections::HashMap;
use tracing::debug;

pub struct RowGraphMaterializer<'a, E: ?Sized> {
    executor: &'a E,
    catalog: &'a dyn TypeCatalog,
    root: &'a TypeDef,
    family: Vec<u8>,
    columns: DelimitedColumnKeyFactory,
    max_depth: usize,
    linked: HashMap<Vec<u8>, NodeIndex>,
}

impl<'a, E: ScanExecutor + ?Sized> RowGraphMaterializer<'a, E> {
    pub fn new(
        executor: &'a E,
        catalog: &'a dyn TypeCatalog,
        root: &'a TypeDef,
        family: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            executor,
            catalog,
            root,
            family: family.into(),
            columns: DelimitedColumnKeyFactory::default(),
            max_depth: 1,
            linked: HashMap::new(),
        }
    }

    /// Number of reference hops followed from the root. Zero reads the
    /// root row only.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    fn node(&self, row: &ResultRow, type_def: &TypeDef) -> Result<DataNode> {
        let mut node = DataNode::new(type_def.name.clone());
        for def in &type_def.properties {
            let PropertyKind::Data(data_type) = def.kind else {
                continue;
            };
            let Some(bytes) = row.value(&self.family, def.name.as_bytes()) else {
                continue;
            };
            let text = std::str::from_utf8(bytes).map_err(|_| {
                Error::Materialize(format!("property {} is not utf-8", def.name))
            })?;
            let convert = |t: &str| {
                data_type
                    .convert(t)
                    .map_err(|e| Error::Materialize(format!("property {}: {e}", def.name)))
            };
            let field = if def.many {
                let items: Vec<String> = serde_json::from_str(text).map_err(|e| {
                    Error::Materialize(format!("property {}: {e}", def.name))
                })?;
                Field::Values(items.iter().map(|t| convert(t)).collect::<Result<_>>()?)
            } else {
                Field::Value(convert(text)?)
            };
            node.set(def.name.clone(), field);
        }
        Ok(node)
    }

    fn link(
        &mut self,
        graph: &mut DataGraph,
        index: NodeIndex,
        row: &ResultRow,
        type_def: &'a TypeDef,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Ok(());
        }
        let catalog = self.catalog;
        let filter = ColumnFilter::all().with_family(self.family.clone());
        for def in &type_def.properties {
            let PropertyKind::Reference(target) = &def.kind else {
                continue;
            };
            let edges = {
                let reader = EdgeReader::new(&self.columns, &self.family);
                if !reader.exists(row, &type_def.name, None, &def.name) {
                    continue;
                }
                reader.read(row, &type_def.name, None, &def.name)?
            };
            let target_name = edges.sub_type.as_deref().unwrap_or(target.as_str());
            let target_type = catalog.find_type(target_name).ok_or_else(|| {
                Error::Materialize(format!("unknown edge target type {target_name}"))
            })?;

            let mut targets = Vec::with_capacity(edges.row_keys.len());
            for key in &edges.row_keys {
                if let Some(&i) = self.linked.get(key) {
                    targets.push(i);
                    continue;
                }
                let Some(target_row) = self.executor.get(key, &filter)? else {
                    debug!(property = %def.name, "edge target row not found");
                    continue;
                };
                let node = self.node(&target_row, target_type)?;
                let i = graph.add_node(node);
                self.linked.insert(key.clone(), i);
                targets.push(i);
                self.link(graph, i, &target_row, target_type, depth + 1)?;
            }

            let field = if def.many {
                Some(Field::Many(targets))
            } else {
                targets.first().copied().map(Field::One)
            };
            if let (Some(field), Some(node)) = (field, graph.node_mut(index)) {
                node.set(def.name.clone(), field);
            }
        }
        Ok(())
    }
}

impl<'a, E: ScanExecutor + ?Sized> GraphMaterializer for RowGraphMaterializer<'a, E> {
    fn assemble(&mut self, row: &ResultRow) -> Result<DataGraph> {
        let root = self.node(row, self.root)?;
        let mut graph = DataGraph::new(row.row_key.clone(), root);
        let index = graph.root_index();
        self.linked.insert(row.row_key.clone(), index);
        let root_type = self.root;
        self.link(&mut graph, index, row, root_type, 1)?;
        Ok(graph)
    }

    fn clear(&mut self) {
        self.linked.clear();
    }
}

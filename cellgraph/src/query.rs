use cellgraph_query::{ExprRef, OrderItem};
use std::collections::BTreeMap;

/// A graph query: root type, optional WHERE tree, ordering and result
/// window.
///
/// ```
/// use cellgraph::{Expr, Query};
///
/// let query = Query::new("Person")
///     .filter(Expr::eq("name", "ann"))
///     .range(Some(1), Some(10));
/// assert_eq!(query.root_type(), "Person");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    from: String,
    predicate: Option<ExprRef>,
    order_by: Vec<OrderItem>,
    start_range: Option<u64>,
    end_range: Option<u64>,
    random_sample: Option<f32>,
    properties: BTreeMap<String, String>,
}

impl Query {
    pub fn new(root_type: impl Into<String>) -> Self {
        Self {
            from: root_type.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, predicate: ExprRef) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn order_by(mut self, item: OrderItem) -> Self {
        self.order_by.push(item);
        self
    }

    /// Inclusive, 1-based ordinals of the results to return.
    pub fn range(mut self, start: Option<u64>, end: Option<u64>) -> Self {
        self.start_range = start;
        self.end_range = end;
        self
    }

    /// Returns roughly `fraction` of the matching graphs. Applies only to
    /// queries without key constraints.
    pub fn sample(mut self, fraction: f32) -> Self {
        self.random_sample = Some(fraction);
        self
    }

    /// Per-query configuration override, see [`crate::config`].
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn root_type(&self) -> &str {
        &self.from
    }

    pub fn predicate(&self) -> Option<&ExprRef> {
        self.predicate.as_ref()
    }

    pub fn ordering(&self) -> &[OrderItem] {
        &self.order_by
    }

    pub fn start_range(&self) -> Option<u64> {
        self.start_range
    }

    pub fn end_range(&self) -> Option<u64> {
        self.end_range
    }

    pub fn random_sample(&self) -> Option<f32> {
        self.random_sample
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn has_range(&self) -> bool {
        self.start_range.is_some() || self.end_range.is_some()
    }
}

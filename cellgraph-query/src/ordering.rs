use crate::error::{Error, Result};
use cellgraph_api::{DataGraph, Field, PropertyKind, TypeDef, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Orders assembled graphs before they are emitted.
pub trait ResultsComparator {
    fn compare(&self, a: &DataGraph, b: &DataGraph) -> Ordering;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub property: String,
    pub direction: Direction,
}

impl OrderItem {
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Descending,
        }
    }
}

/// Comparator over single-valued data properties of the root object.
#[derive(Debug, Clone)]
pub struct OrderBy {
    items: Vec<OrderItem>,
}

impl OrderBy {
    pub fn new(root: &TypeDef, items: Vec<OrderItem>) -> Result<Self> {
        for item in &items {
            let def = root.property(&item.property).ok_or_else(|| {
                Error::Planning(format!(
                    "order by property '{}' not found on type {}",
                    item.property, root.name
                ))
            })?;
            if def.many || !matches!(def.kind, PropertyKind::Data(_)) {
                return Err(Error::Planning(format!(
                    "order by property '{}' must be a single-valued data property",
                    item.property
                )));
            }
        }
        Ok(Self { items })
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }
}

fn root_value<'g>(graph: &'g DataGraph, property: &str) -> Option<&'g Value> {
    match graph.root().get(property) {
        Some(Field::Value(v)) => Some(v),
        _ => None,
    }
}

/// Absent values sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
            (Value::Int(l), Value::Int(r)) => l.cmp(r),
            (Value::Float(l), Value::Float(r)) => l.total_cmp(r),
            (Value::Int(l), Value::Float(r)) => (*l as f64).total_cmp(r),
            (Value::Float(l), Value::Int(r)) => l.total_cmp(&(*r as f64)),
            (Value::Date(l), Value::Date(r)) => l.cmp(r),
            (Value::Bytes(l), Value::Bytes(r)) => l.cmp(r),
            (l, r) => l.to_string().cmp(&r.to_string()),
        },
    }
}

impl ResultsComparator for OrderBy {
    fn compare(&self, a: &DataGraph, b: &DataGraph) -> Ordering {
        for item in &self.items {
            let order = compare_values(
                root_value(a, &item.property),
                root_value(b, &item.property),
            );
            match order {
                Ordering::Equal => continue,
                order if item.direction == Direction::Ascending => return order,
                order => return order.reverse(),
            }
        }
        Ordering::Equal
    }
}

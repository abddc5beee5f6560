//! Evaluation of the predicate tree against assembled graphs.
//!
//! A leaf predicate over a property path holds when at least one value
//! collected at the path's endpoints satisfies it. Unset single-valued
//! properties are collected as [`Collected::Absent`].

use crate::ast::{
    ArithmeticOp, Expr, ExprRef, Literal, LogicalOp, PredicateOp, Property, RelationalOp,
    ScalarFunction, properties,
};
use crate::error::{Error, Result};
use crate::planner::{ResolvedProperty, resolve_property};
use crate::wildcard::WildcardCache;
use cellgraph_api::{Collected, DataFlavor, DataGraph, DataType, Field, TypeCatalog, TypeDef, Value};
use cellgraph_storage::codec::coerce;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

const DEFAULT_IN_DELIMITER: &str = " ";

/// Decides whether an assembled graph belongs to the results.
pub trait GraphRecognizer {
    fn recognize(&self, graph: &DataGraph) -> Result<bool>;
}

/// Recognizer over a WHERE tree.
pub struct ExprRecognizer {
    root: ExprRef,
    resolved: HashMap<Property, ResolvedProperty>,
    wildcards: Arc<WildcardCache>,
    default_delimiter: String,
    delimiter_warned: AtomicBool,
}

impl ExprRecognizer {
    pub fn new(
        root: ExprRef,
        root_type: &TypeDef,
        catalog: &dyn TypeCatalog,
        wildcards: Arc<WildcardCache>,
    ) -> Result<Self> {
        let mut resolved = HashMap::new();
        for property in properties(&root) {
            let r = resolve_property(root_type, catalog, &property)?;
            resolved.insert(property, r);
        }
        Ok(Self {
            root,
            resolved,
            wildcards,
            default_delimiter: DEFAULT_IN_DELIMITER.to_string(),
            delimiter_warned: AtomicBool::new(false),
        })
    }

    /// Replaces the single-space separator used for IN/NOT_IN literals
    /// without a delimiter of their own.
    pub fn with_default_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        if !delimiter.is_empty() {
            self.default_delimiter = delimiter;
        }
        self
    }

    fn resolved(&self, property: &Property) -> Result<ResolvedProperty> {
        self.resolved
            .get(property)
            .copied()
            .ok_or_else(|| Error::Evaluation(format!("unresolved property {property}")))
    }

    /// Values at every endpoint of `property` reachable in `graph`, after
    /// the property's first function.
    pub fn collect(&self, graph: &DataGraph, property: &Property) -> Result<Vec<Collected>> {
        let resolved = self.resolved(property)?;
        let names = property.names().ok_or_else(|| {
            Error::Evaluation(format!("wildcard path element in {property}"))
        })?;
        let Some((name, path)) = names.split_last() else {
            return Ok(Vec::new());
        };

        let node = |idx| {
            graph
                .node(idx)
                .ok_or_else(|| Error::Evaluation(format!("dangling node reference {idx}")))
        };

        let mut nodes = vec![graph.root_index()];
        for segment in path {
            let mut next = Vec::new();
            for idx in nodes {
                match node(idx)?.get(segment) {
                    Some(Field::One(i)) => next.push(*i),
                    Some(Field::Many(targets)) => next.extend(targets.iter().copied()),
                    None => {}
                    Some(_) => {
                        return Err(Error::Evaluation(format!(
                            "path segment '{segment}' of {property} holds data"
                        )));
                    }
                }
            }
            nodes = next;
        }

        let function = property.functions.first().copied();
        let present = |v: &Value| -> Result<Collected> {
            Ok(Collected::Present(match function {
                Some(f) => apply_function(f, v.clone())?,
                None => v.clone(),
            }))
        };

        let mut out = Vec::new();
        for idx in nodes {
            match node(idx)?.get(name) {
                Some(Field::Value(v)) => out.push(present(v)?),
                Some(Field::Values(vs)) => {
                    for v in vs {
                        out.push(present(v)?);
                    }
                }
                None if !resolved.endpoint_many => out.push(Collected::Absent),
                None => {}
                Some(_) => {
                    return Err(Error::Evaluation(format!(
                        "endpoint of {property} holds references"
                    )));
                }
            }
        }
        Ok(out)
    }

    pub fn evaluate(&self, expr: &Expr, graph: &DataGraph) -> Result<bool> {
        match expr {
            Expr::Logical { left, op, right } => match op {
                LogicalOp::And => Ok(self.evaluate(left, graph)? && self.evaluate(right, graph)?),
                LogicalOp::Or => Ok(self.evaluate(left, graph)? || self.evaluate(right, graph)?),
            },
            Expr::Relational { left, op, right } => self.relational(left, *op, right, graph),
            Expr::Predicate {
                property,
                op: PredicateOp::Like,
                literal,
                ..
            } => self.like(property, literal, graph),
            Expr::Predicate {
                property,
                op,
                literal,
                delimiter,
            } => self.membership(
                property,
                *op == PredicateOp::In,
                literal,
                delimiter.as_deref(),
                graph,
            ),
            other => Err(Error::Evaluation(format!(
                "expression is not a condition: {other}"
            ))),
        }
    }

    fn relational(
        &self,
        left: &ExprRef,
        op: RelationalOp,
        literal: &Literal,
        graph: &DataGraph,
    ) -> Result<bool> {
        let (data_type, values) = match left.as_ref() {
            Expr::Property(p) => (self.resolved(p)?.effective_type(p), self.collect(graph, p)?),
            Expr::Arithmetic { .. } => {
                let value = self.arithmetic(left, graph)?;
                let data_type = match value {
                    Some(Value::Float(_)) => DataType::Double,
                    _ => DataType::Long,
                };
                (data_type, vec![Collected::from(value)])
            }
            other => {
                return Err(Error::Evaluation(format!(
                    "cannot compare {other} with a literal"
                )));
            }
        };

        let text = match literal {
            Literal::Null => {
                return match op {
                    RelationalOp::Equals => Ok(values.iter().any(Collected::is_absent)),
                    RelationalOp::NotEquals => Ok(values.iter().any(|v| !v.is_absent())),
                    other => Err(Error::Evaluation(format!(
                        "illegal relational operator {other:?} against null literal"
                    ))),
                };
            }
            Literal::Text(text) => text,
        };
        let literal = convert(data_type, text)?;
        for value in values.iter().filter_map(Collected::value) {
            if compare(data_type, value, &literal, op)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn like(&self, property: &Property, literal: &Literal, graph: &DataGraph) -> Result<bool> {
        let flavor = self.resolved(property)?.effective_type(property).flavor();
        if flavor != DataFlavor::String {
            return Err(Error::Evaluation(format!(
                "LIKE not defined for {flavor} property {property}"
            )));
        }
        let Literal::Text(pattern) = literal else {
            return Err(Error::Evaluation("LIKE against null literal".into()));
        };
        for value in self.collect(graph, property)?.iter().filter_map(Collected::value) {
            if self.wildcards.matches(pattern, value.to_string().trim())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn membership(
        &self,
        property: &Property,
        is_in: bool,
        literal: &Literal,
        delimiter: Option<&str>,
        graph: &DataGraph,
    ) -> Result<bool> {
        let data_type = self.resolved(property)?.effective_type(property);
        let flavor = data_type.flavor();
        if matches!(flavor, DataFlavor::Temporal | DataFlavor::Other) {
            return Err(Error::Evaluation(format!(
                "IN/NOT_IN not defined for {flavor} property {property}"
            )));
        }
        let Literal::Text(text) = literal else {
            return Err(Error::Evaluation("IN/NOT_IN against null literal".into()));
        };
        let delimiter = match delimiter {
            Some(d) if !d.is_empty() => d,
            _ => {
                if !self.delimiter_warned.swap(true, Ordering::Relaxed) {
                    warn!(
                        %property,
                        delimiter = %self.default_delimiter,
                        "no delimiter found for IN/NOT_IN literal - using default"
                    );
                }
                self.default_delimiter.as_str()
            }
        };
        let members: Vec<&str> = text
            .split(delimiter)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .collect();
        let members = if flavor == DataFlavor::String {
            members
                .iter()
                .map(|m| Value::String((*m).to_string()))
                .collect::<Vec<_>>()
        } else {
            members
                .iter()
                .map(|m| convert(data_type, m))
                .collect::<Result<Vec<_>>>()?
        };

        for collected in self.collect(graph, property)? {
            // An absent value is neither in nor out of the list.
            let Collected::Present(value) = collected else {
                continue;
            };
            let mut found = false;
            for member in &members {
                let equal = if flavor == DataFlavor::String {
                    value.to_string().trim() == member.to_string()
                } else {
                    compare(data_type, &value, member, RelationalOp::Equals)?
                };
                if equal {
                    found = true;
                    break;
                }
            }
            if found == is_in {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn arithmetic(&self, expr: &ExprRef, graph: &DataGraph) -> Result<Option<Value>> {
        match expr.as_ref() {
            Expr::Property(p) => {
                let value = self
                    .collect(graph, p)?
                    .into_iter()
                    .find_map(|c| c.value().cloned());
                Ok(value.map(numeric).transpose()?)
            }
            Expr::Literal(Literal::Null) => Ok(None),
            Expr::Literal(Literal::Text(t)) => {
                let t = t.trim();
                if let Ok(i) = t.parse::<i64>() {
                    return Ok(Some(Value::Int(i)));
                }
                t.parse::<f64>()
                    .map(|f| Some(Value::Float(f)))
                    .map_err(|_| Error::Evaluation(format!("non-numeric arithmetic literal '{t}'")))
            }
            Expr::Arithmetic { left, op, right } => {
                let (Some(a), Some(b)) =
                    (self.arithmetic(left, graph)?, self.arithmetic(right, graph)?)
                else {
                    return Ok(None);
                };
                arithmetic(*op, a, b).map(Some)
            }
            other => Err(Error::Evaluation(format!(
                "invalid arithmetic operand {other}"
            ))),
        }
    }
}

impl GraphRecognizer for ExprRecognizer {
    fn recognize(&self, graph: &DataGraph) -> Result<bool> {
        let recognized = self.evaluate(&self.root, graph)?;
        if !recognized {
            debug!(row_key = ?graph.row_key(), "graph excluded by recognizer");
        }
        Ok(recognized)
    }
}

fn convert(data_type: DataType, text: &str) -> Result<Value> {
    data_type
        .convert(text)
        .map_err(|e| Error::Evaluation(e.to_string()))
}

fn numeric(value: Value) -> Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Int(_) | Value::Float(_) => Ok(value),
        other => Err(Error::Evaluation(format!("non-numeric value {other} in arithmetic"))),
    }
}

fn arithmetic(op: ArithmeticOp, a: Value, b: Value) -> Result<Value> {
    let overflow = || Error::Evaluation(format!("arithmetic overflow in {op:?}"));
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => match op {
            ArithmeticOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            ArithmeticOp::Subtract => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            ArithmeticOp::Multiply => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            ArithmeticOp::Divide if b == 0 => Err(Error::Evaluation("division by zero".into())),
            ArithmeticOp::Divide => {
                let rem = a.checked_rem(b).ok_or_else(overflow)?;
                if rem == 0 {
                    a.checked_div(b).map(Value::Int).ok_or_else(overflow)
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            ArithmeticOp::Modulus if b == 0 => Err(Error::Evaluation("division by zero".into())),
            ArithmeticOp::Modulus => a.checked_rem(b).map(Value::Int).ok_or_else(overflow),
        },
        (a, b) => {
            let (Some(a), Some(b)) = (as_f64(&a), as_f64(&b)) else {
                return Err(Error::Evaluation("non-numeric arithmetic operand".into()));
            };
            Ok(Value::Float(match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => a / b,
                ArithmeticOp::Modulus => a % b,
            }))
        }
    }
}

/// Applies a scalar function to one value.
pub fn apply_function(function: ScalarFunction, value: Value) -> Result<Value> {
    let value = match (function, value) {
        (ScalarFunction::Abs, Value::Int(i)) => Value::Int(
            i.checked_abs()
                .ok_or_else(|| Error::Evaluation("abs overflow".into()))?,
        ),
        (ScalarFunction::Abs, Value::Float(f)) => Value::Float(f.abs()),
        (ScalarFunction::Ceiling, Value::Float(f)) => Value::Float(f.ceil()),
        (ScalarFunction::Floor, Value::Float(f)) => Value::Float(f.floor()),
        (ScalarFunction::Round, Value::Float(f)) => Value::Float(f.round()),
        (
            ScalarFunction::Ceiling | ScalarFunction::Floor | ScalarFunction::Round,
            Value::Int(i),
        ) => Value::Int(i),
        (ScalarFunction::Lower, Value::String(s)) => Value::String(s.to_lowercase()),
        (ScalarFunction::Upper, Value::String(s)) => Value::String(s.to_uppercase()),
        (function, value) => {
            return Err(Error::Evaluation(format!(
                "function {function:?} not defined for value {value}"
            )));
        }
    };
    Ok(value)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(f) => Some(*f),
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn holds(op: RelationalOp, ordering: CmpOrdering) -> bool {
    match op {
        RelationalOp::Equals => ordering == CmpOrdering::Equal,
        RelationalOp::NotEquals => ordering != CmpOrdering::Equal,
        RelationalOp::GreaterThan => ordering == CmpOrdering::Greater,
        RelationalOp::GreaterThanEquals => ordering != CmpOrdering::Less,
        RelationalOp::LessThan => ordering == CmpOrdering::Less,
        RelationalOp::LessThanEquals => ordering != CmpOrdering::Greater,
    }
}

/// Compares a collected value with a converted literal under the data
/// type's flavor.
pub fn compare(
    data_type: DataType,
    value: &Value,
    literal: &Value,
    op: RelationalOp,
) -> Result<bool> {
    let flavor = data_type.flavor();
    let value = coerce(data_type, value).map_err(|e| Error::Evaluation(e.to_string()))?;
    let ordering = match flavor {
        DataFlavor::Integral => match (as_i64(&value), as_i64(literal)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => None,
        },
        DataFlavor::Real => match (as_f64(&value), as_f64(literal)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
        DataFlavor::String => Some(value.to_string().cmp(&literal.to_string())),
        DataFlavor::Temporal => match (&value, literal) {
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => Some(a.to_string().cmp(&b.to_string())),
        },
        DataFlavor::Other => {
            return Err(Error::Evaluation(format!(
                "relational operator {op:?} not defined for {data_type:?}"
            )));
        }
    };
    match ordering {
        Some(o) => Ok(holds(op, o)),
        None if flavor == DataFlavor::Real => Ok(false),
        None => Err(Error::Evaluation(format!(
            "cannot compare {value} with {literal} as {flavor}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Property;
    use cellgraph_api::{Catalog, DataNode};
    use chrono::NaiveDate;

    fn person() -> TypeDef {
        TypeDef::new("http://ex", "Person")
            .data("name", DataType::String)
            .data("age", DataType::Int)
            .data("active", DataType::Boolean)
            .data("born", DataType::Date)
            .data("wake", DataType::Time)
            .data("score", DataType::Double)
            .data_many("nicknames", DataType::String)
            .reference("friends", "Person", true)
            .reference("boss", "Person", false)
    }

    fn catalog() -> Catalog {
        Catalog::new().with(person())
    }

    fn recognizer(expr: ExprRef) -> ExprRecognizer {
        ExprRecognizer::new(expr, &person(), &catalog(), Arc::new(WildcardCache::new())).unwrap()
    }

    fn graph() -> DataGraph {
        let root = DataNode::new("Person")
            .with_value("name", Value::String(" Ann ".into()))
            .with_value("age", Value::Int(40))
            .with_value("active", Value::Bool(true))
            .with_value(
                "born",
                Value::Date(NaiveDate::from_ymd_opt(1984, 5, 1).unwrap()),
            )
            .with_value("wake", Value::String("07:30".into()))
            .with_value("score", Value::Float(2.5))
            .with("nicknames", Field::Values(vec![Value::String("an".into())]));
        let mut g = DataGraph::new(b"r1".to_vec(), root);
        let bob = g.add_node(
            DataNode::new("Person")
                .with_value("name", Value::String("Bob".into()))
                .with_value("age", Value::Int(20)),
        );
        let cy = g.add_node(DataNode::new("Person").with_value("name", Value::String("Cy".into())));
        g.node_mut(0)
            .unwrap()
            .set("friends", Field::Many(vec![bob, cy]));
        g
    }

    fn check(expr: ExprRef) -> Result<bool> {
        recognizer(expr).recognize(&graph())
    }

    fn rel(path: &str, op: RelationalOp, lit: Literal) -> ExprRef {
        Expr::compare(Property::parse(path), op, lit)
    }

    #[test]
    fn null_literal_tests_absence() {
        // root has no boss: no endpoint reached, nothing collected
        assert!(!check(rel("boss/name", RelationalOp::Equals, Literal::Null)).unwrap());
        // Cy has no age
        assert!(check(rel("friends/age", RelationalOp::Equals, Literal::Null)).unwrap());
        assert!(!check(rel("name", RelationalOp::Equals, Literal::Null)).unwrap());
        assert!(check(rel("name", RelationalOp::NotEquals, Literal::Null)).unwrap());
        assert!(matches!(
            check(rel("name", RelationalOp::GreaterThan, Literal::Null)),
            Err(Error::Evaluation(_))
        ));
    }

    #[test]
    fn absent_value_against_literal_is_false() {
        let e = rel("friends/age", RelationalOp::LessThan, Literal::text("10"));
        assert!(!check(e).unwrap());
    }

    #[test]
    fn multi_valued_paths_are_existential() {
        assert!(check(Expr::eq("friends/name", "Cy")).unwrap());
        assert!(!check(Expr::eq("friends/name", "Dee")).unwrap());
        assert!(check(rel("friends/age", RelationalOp::GreaterThan, Literal::text("19"))).unwrap());
        assert!(check(Expr::eq("nicknames", "an")).unwrap());
    }

    #[test]
    fn numeric_and_boolean_comparisons() {
        assert!(check(rel("age", RelationalOp::GreaterThanEquals, Literal::text("40"))).unwrap());
        assert!(!check(rel("age", RelationalOp::GreaterThan, Literal::text("40"))).unwrap());
        assert!(check(rel("score", RelationalOp::LessThan, Literal::text("2.75"))).unwrap());
        assert!(check(rel("active", RelationalOp::GreaterThan, Literal::text("false"))).unwrap());
    }

    #[test]
    fn temporal_comparisons() {
        assert!(check(rel("born", RelationalOp::LessThan, Literal::text("1990-01-01"))).unwrap());
        // times compare as strings
        assert!(check(rel("wake", RelationalOp::GreaterThan, Literal::text("07:00"))).unwrap());
    }

    #[test]
    fn strings_are_case_sensitive() {
        assert!(check(Expr::eq("friends/name", "Bob")).unwrap());
        assert!(!check(Expr::eq("friends/name", "bob")).unwrap());
    }

    #[test]
    fn like_trims_the_value() {
        assert!(check(Expr::like("name", "A?n")).unwrap());
        assert!(check(Expr::like("friends/name", "B*")).unwrap());
        assert!(!check(Expr::like("friends/name", "Z*")).unwrap());
    }

    #[test]
    fn in_and_not_in() {
        assert!(check(Expr::member("age", PredicateOp::In, "10 40 50", None)).unwrap());
        assert!(!check(Expr::member("age", PredicateOp::NotIn, "10 40 50", None)).unwrap());
        assert!(check(Expr::member("friends/name", PredicateOp::In, "Cy,Dee", Some(","))).unwrap());
        assert!(check(Expr::member("name", PredicateOp::In, "Ann", Some(";"))).unwrap());
    }

    #[test]
    fn in_default_delimiter_is_a_single_space() {
        // A comma-separated list without a delimiter is one member.
        assert!(!check(Expr::member("friends/name", PredicateOp::In, "Bob,Cy", None)).unwrap());
        assert!(check(Expr::member("friends/name", PredicateOp::In, "Bob Cy", None)).unwrap());
    }

    #[test]
    fn configured_default_delimiter() {
        let e = Expr::member("friends/name", PredicateOp::In, "Bob,Cy", None);
        let r = recognizer(e).with_default_delimiter(",");
        assert!(r.recognize(&graph()).unwrap());
    }

    #[test]
    fn in_against_absent_value_is_false() {
        assert!(!check(Expr::member("boss/age", PredicateOp::NotIn, "1", None)).unwrap());
    }

    #[test]
    fn functions_and_arithmetic() {
        let lower = Expr::compare(
            Property::new("name").with_function(ScalarFunction::Lower),
            RelationalOp::Equals,
            Literal::text(" ann "),
        );
        assert!(check(lower).unwrap());

        let sum = Expr::arithmetic(
            Arc::new(Expr::Property(Property::new("age"))),
            ArithmeticOp::Add,
            Arc::new(Expr::Literal(Literal::text("2"))),
        );
        let e = Arc::new(Expr::Relational {
            left: sum,
            op: RelationalOp::Equals,
            right: Literal::text("42"),
        });
        assert!(check(e).unwrap());

        let half = Expr::arithmetic(
            Arc::new(Expr::Property(Property::new("age"))),
            ArithmeticOp::Divide,
            Arc::new(Expr::Literal(Literal::text("3"))),
        );
        let e = Arc::new(Expr::Relational {
            left: half,
            op: RelationalOp::GreaterThan,
            right: Literal::text("13.3"),
        });
        assert!(check(e).unwrap());
    }

    #[test]
    fn integer_overflow_is_an_evaluation_error() {
        for op in [ArithmeticOp::Divide, ArithmeticOp::Modulus] {
            let r = arithmetic(op, Value::Int(i64::MIN), Value::Int(-1));
            assert!(matches!(r, Err(Error::Evaluation(_))), "{op:?}");
        }
        assert!(matches!(
            arithmetic(ArithmeticOp::Divide, Value::Int(-9), Value::Int(-3)),
            Ok(Value::Int(3))
        ));
        assert!(matches!(
            arithmetic(ArithmeticOp::Modulus, Value::Int(i64::MIN + 1), Value::Int(-1)),
            Ok(Value::Int(0))
        ));
    }

    #[test]
    fn logical_operators() {
        let both = Expr::and(Expr::eq("age", "40"), Expr::eq("friends/name", "Bob"));
        assert!(check(both).unwrap());
        let either = Expr::or(Expr::eq("age", "1"), Expr::eq("friends/name", "Bob"));
        assert!(check(either).unwrap());
        let neither = Expr::and(Expr::eq("age", "1"), Expr::eq("friends/name", "Bob"));
        assert!(!check(neither).unwrap());
    }

    #[test]
    fn unresolvable_paths_fail_construction() {
        let r = ExprRecognizer::new(
            Expr::eq("friends/*/name", "x"),
            &person(),
            &catalog(),
            Arc::new(WildcardCache::new()),
        );
        assert!(matches!(r, Err(Error::Planning(_))));
    }
}

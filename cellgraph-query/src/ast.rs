use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

/// Shared handle to a node of the predicate tree.
pub type ExprRef = Arc<Expr>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RelationalOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PredicateOp {
    Like,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScalarFunction {
    Abs,
    Ceiling,
    Floor,
    Round,
    Lower,
    Upper,
}

impl ScalarFunction {
    /// Whether the function produces a string rather than a number.
    pub fn is_string(self) -> bool {
        matches!(self, ScalarFunction::Lower | ScalarFunction::Upper)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PathElement {
    Named(String),
    Wildcard,
}

/// A property reached from the root type through `path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Property {
    pub path: Vec<PathElement>,
    pub name: String,
    pub functions: Vec<ScalarFunction>,
}

impl Property {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            path: Vec::new(),
            name: name.into(),
            functions: Vec::new(),
        }
    }

    /// Parses `a/b/name`; a `*` segment is a wildcard path element.
    pub fn parse(path: &str) -> Self {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let name = parts.pop().unwrap_or_default().to_string();
        Self {
            path: parts
                .into_iter()
                .map(|p| {
                    if p == "*" {
                        PathElement::Wildcard
                    } else {
                        PathElement::Named(p.to_string())
                    }
                })
                .collect(),
            name,
            functions: Vec::new(),
        }
    }

    pub fn with_function(mut self, function: ScalarFunction) -> Self {
        self.functions.push(function);
        self
    }

    pub fn has_wildcard(&self) -> bool {
        self.path.iter().any(|p| *p == PathElement::Wildcard)
    }

    /// Named segments followed by the property name, or `None` with a wildcard.
    pub fn names(&self) -> Option<Vec<String>> {
        let mut names = Vec::with_capacity(self.path.len() + 1);
        for element in &self.path {
            match element {
                PathElement::Named(n) => names.push(n.clone()),
                PathElement::Wildcard => return None,
            }
        }
        names.push(self.name.clone());
        Some(names)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.path {
            match element {
                PathElement::Named(n) => write!(f, "{n}/")?,
                PathElement::Wildcard => f.write_str("*/")?,
            }
        }
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Text(String),
}

impl Literal {
    pub fn text(value: impl Into<String>) -> Self {
        Literal::Text(value.into())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Text(t) => write!(f, "'{t}'"),
        }
    }
}

/// Node of the predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Logical {
        left: ExprRef,
        op: LogicalOp,
        right: ExprRef,
    },
    /// `left` is a property or an arithmetic expression.
    Relational {
        left: ExprRef,
        op: RelationalOp,
        right: Literal,
    },
    Predicate {
        property: Property,
        op: PredicateOp,
        literal: Literal,
        /// Separator of IN/NOT_IN members.
        delimiter: Option<String>,
    },
    /// Operands are properties, literals or nested arithmetic.
    Arithmetic {
        left: ExprRef,
        op: ArithmeticOp,
        right: ExprRef,
    },
    Property(Property),
    Literal(Literal),
}

impl Expr {
    pub fn and(left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expr::Logical {
            left,
            op: LogicalOp::And,
            right,
        })
    }

    pub fn or(left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expr::Logical {
            left,
            op: LogicalOp::Or,
            right,
        })
    }

    pub fn compare(property: Property, op: RelationalOp, literal: Literal) -> ExprRef {
        Arc::new(Expr::Relational {
            left: Arc::new(Expr::Property(property)),
            op,
            right: literal,
        })
    }

    pub fn eq(property: &str, value: impl Into<String>) -> ExprRef {
        Self::compare(
            Property::parse(property),
            RelationalOp::Equals,
            Literal::text(value),
        )
    }

    pub fn like(property: &str, pattern: impl Into<String>) -> ExprRef {
        Arc::new(Expr::Predicate {
            property: Property::parse(property),
            op: PredicateOp::Like,
            literal: Literal::text(pattern),
            delimiter: None,
        })
    }

    pub fn member(
        property: &str,
        op: PredicateOp,
        members: impl Into<String>,
        delimiter: Option<&str>,
    ) -> ExprRef {
        Arc::new(Expr::Predicate {
            property: Property::parse(property),
            op,
            literal: Literal::text(members),
            delimiter: delimiter.map(str::to_string),
        })
    }

    pub fn arithmetic(left: ExprRef, op: ArithmeticOp, right: ExprRef) -> ExprRef {
        Arc::new(Expr::Arithmetic { left, op, right })
    }

    fn children(&self) -> Vec<&ExprRef> {
        match self {
            Expr::Logical { left, right, .. } | Expr::Arithmetic { left, right, .. } => {
                vec![left, right]
            }
            Expr::Relational { left, .. } => vec![left],
            Expr::Predicate { .. } | Expr::Property(_) | Expr::Literal(_) => Vec::new(),
        }
    }

    fn label(&self) -> String {
        match self {
            Expr::Logical { op, .. } => format!("{op:?}"),
            Expr::Relational { op, right, .. } => format!("{op:?} {right}"),
            Expr::Predicate {
                property,
                op,
                literal,
                ..
            } => format!("{property} {op:?} {literal}"),
            Expr::Arithmetic { op, .. } => format!("{op:?}"),
            Expr::Property(p) => p.to_string(),
            Expr::Literal(l) => l.to_string(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Logical { left, op, right } => write!(f, "({left} {op:?} {right})"),
            Expr::Relational { left, op, right } => write!(f, "{left} {op:?} {right}"),
            Expr::Arithmetic { left, op, right } => write!(f, "({left} {op:?} {right})"),
            other => f.write_str(&other.label()),
        }
    }
}

/// Callback of [`accept`]. Returning `false` stops descent below `expr`.
pub trait ExprVisitor {
    fn visit(&mut self, expr: &ExprRef, parent: Option<&ExprRef>, level: usize) -> bool;
}

/// Depth-first pre-order walk. A node shared by several parents is visited
/// once.
pub fn accept(root: &ExprRef, visitor: &mut dyn ExprVisitor) {
    let mut visited = HashSet::new();
    walk(root, None, 0, visitor, &mut visited);
}

fn walk(
    expr: &ExprRef,
    parent: Option<&ExprRef>,
    level: usize,
    visitor: &mut dyn ExprVisitor,
    visited: &mut HashSet<*const Expr>,
) {
    if !visited.insert(Arc::as_ptr(expr)) {
        return;
    }
    if !visitor.visit(expr, parent, level) {
        return;
    }
    for child in expr.children() {
        walk(child, Some(expr), level + 1, visitor, visited);
    }
}

struct TreePrinter {
    out: String,
}

impl ExprVisitor for TreePrinter {
    fn visit(&mut self, expr: &ExprRef, _parent: Option<&ExprRef>, level: usize) -> bool {
        let _ = writeln!(self.out, "{}{}", "  ".repeat(level), expr.label());
        true
    }
}

/// Indented one-node-per-line rendering for debug logs.
pub fn print_tree(root: &ExprRef) -> String {
    let mut printer = TreePrinter { out: String::new() };
    accept(root, &mut printer);
    printer.out
}

/// Every property referenced in the tree.
pub fn properties(root: &ExprRef) -> Vec<Property> {
    struct Collect(Vec<Property>);
    impl ExprVisitor for Collect {
        fn visit(&mut self, expr: &ExprRef, _: Option<&ExprRef>, _: usize) -> bool {
            match expr.as_ref() {
                Expr::Property(p) | Expr::Predicate { property: p, .. } => self.0.push(p.clone()),
                _ => {}
            }
            true
        }
    }
    let mut c = Collect(Vec::new());
    accept(root, &mut c);
    c.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Count(usize);

    impl ExprVisitor for Count {
        fn visit(&mut self, _: &ExprRef, _: Option<&ExprRef>, _: usize) -> bool {
            self.0 += 1;
            true
        }
    }

    #[test]
    fn shared_subtrees_are_visited_once() {
        let leaf = Expr::eq("name", "a");
        let tree = Expr::or(Expr::and(leaf.clone(), leaf.clone()), leaf);
        let mut count = Count(0);
        accept(&tree, &mut count);
        // or, and, relational, property
        assert_eq!(count.0, 4);
    }

    #[test]
    fn parse_paths() {
        let p = Property::parse("employer/*/name");
        assert_eq!(p.name, "name");
        assert!(p.has_wildcard());
        assert_eq!(p.names(), None);
        assert_eq!(
            Property::parse("employer/name").names(),
            Some(vec!["employer".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn printer_indents_by_level() {
        let tree = Expr::and(Expr::eq("a", "1"), Expr::like("b", "x*"));
        let printed = print_tree(&tree);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines[0], "And");
        assert_eq!(lines[1], "  Equals '1'");
        assert_eq!(lines[2], "    a");
        assert_eq!(lines[3], "  b Like 'x*'");
        assert_eq!(properties(&tree).len(), 2);
    }
}

//! Row key planning.
//!
//! Maps the WHERE tree of a query onto scans over the root type's row key
//! space. Equality on a gap-free run of leading key fields becomes a prefix
//! scan, equality on fields after a gap becomes a fuzzy scan, and equality on
//! every field becomes a point lookup. Terms that the key cannot express stay
//! with the graph recognizer.

use crate::ast::{
    Expr, ExprRef, ExprVisitor, Literal, LogicalOp, PredicateOp, Property, RelationalOp, accept,
    print_tree,
};
use crate::error::{Error, Result};
use cellgraph_api::{DataFlavor, DataType, PropertyKind, TypeCatalog, TypeDef, Value};
use cellgraph_storage::{
    CompleteKey, Error as StorageError, FuzzyKey, KeyFieldMapping, PartialKey, ScanDescriptor,
    TypeKeyMapping, prefix_end,
};
use tracing::{debug, warn};

/// Upper bound on disjuncts produced by distributing AND over OR. Larger
/// trees fall back to the type scan.
const MAX_DISJUNCTS: usize = 64;

/// Property endpoint resolved against the type catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedProperty {
    pub data_type: DataType,
    /// Whether the path can reach more than one value.
    pub many: bool,
    /// Whether the endpoint property itself is multi-valued.
    pub endpoint_many: bool,
}

impl ResolvedProperty {
    /// Data type seen by comparisons after the property's first function.
    pub fn effective_type(&self, property: &Property) -> DataType {
        match property.functions.first() {
            Some(f) if f.is_string() => DataType::String,
            _ => self.data_type,
        }
    }
}

/// Follows `property` from `root` to the data property it names.
pub fn resolve_property(
    root: &TypeDef,
    catalog: &dyn TypeCatalog,
    property: &Property,
) -> Result<ResolvedProperty> {
    let names = property.names().ok_or_else(|| {
        Error::Planning(format!(
            "wildcard path elements are not supported in a where clause: {property}"
        ))
    })?;
    let mut current = root;
    let mut many = false;
    for (i, name) in names.iter().enumerate() {
        let def = current.property(name).ok_or_else(|| {
            Error::Planning(format!("type {} has no property '{name}'", current.name))
        })?;
        many |= def.many;
        let last = i + 1 == names.len();
        match (&def.kind, last) {
            (PropertyKind::Data(dt), true) => {
                return Ok(ResolvedProperty {
                    data_type: *dt,
                    many,
                    endpoint_many: def.many,
                });
            }
            (PropertyKind::Reference(target), false) => {
                current = catalog
                    .find_type(target)
                    .ok_or_else(|| Error::Planning(format!("unknown type {target}")))?;
            }
            (PropertyKind::Reference(_), true) => {
                return Err(Error::Planning(format!(
                    "property {property} is a reference, expected a data property"
                )));
            }
            (PropertyKind::Data(_), false) => {
                return Err(Error::Planning(format!(
                    "path {property} continues past data property '{name}'"
                )));
            }
        }
    }
    Err(Error::Planning("empty property path".into()))
}

/// Scans for one query plus whether the recognizer must re-check results.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub scans: Vec<ScanDescriptor>,
    pub requires_recognizer: bool,
    /// The plan is the unconstrained scan over the type's key space.
    pub fallback: bool,
}

impl ScanPlan {
    pub fn has_complete_keys(&self) -> bool {
        self.scans.iter().any(ScanDescriptor::is_complete)
    }

    /// Samples `fraction` of the rows of an unconstrained plan.
    pub fn apply_sample(&mut self, fraction: f32) {
        if !self.fallback {
            warn!(fraction, "random sample ignored for a key-constrained scan");
            return;
        }
        warn!(fraction, "using random sample - results will be a subset of matching graphs");
        for scan in &mut self.scans {
            if let ScanDescriptor::Partial(p) = scan {
                p.sample = Some(fraction);
            }
        }
    }
}

struct Validator<'a> {
    root: &'a TypeDef,
    catalog: &'a dyn TypeCatalog,
    error: Option<Error>,
}

impl Validator<'_> {
    fn check_property(&self, property: &Property) -> Result<ResolvedProperty> {
        let resolved = resolve_property(self.root, self.catalog, property)?;
        if let Some(function) = property.functions.first() {
            if property.functions.len() > 1 {
                warn!(%property, "more than one function on property - applying only {function:?}");
            }
            if resolved.many {
                return Err(Error::Planning(format!(
                    "function {function:?} applied to multi-valued property {property}"
                )));
            }
            let flavor = resolved.data_type.flavor();
            let fits = if function.is_string() {
                flavor == DataFlavor::String
            } else {
                matches!(flavor, DataFlavor::Integral | DataFlavor::Real)
            };
            if !fits {
                return Err(Error::Planning(format!(
                    "function {function:?} not defined for {flavor} property {property}"
                )));
            }
        }
        Ok(resolved)
    }

    fn check(&self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Logical { left, right, .. } => {
                for side in [left, right] {
                    if !matches!(
                        side.as_ref(),
                        Expr::Logical { .. } | Expr::Relational { .. } | Expr::Predicate { .. }
                    ) {
                        return Err(Error::Planning(format!(
                            "logical operand is not a condition: {side}"
                        )));
                    }
                }
                Ok(())
            }
            Expr::Relational { left, .. } => match left.as_ref() {
                Expr::Property(p) => {
                    let resolved = self.check_property(p)?;
                    if resolved.effective_type(p).flavor() == DataFlavor::Other {
                        return Err(Error::Planning(format!(
                            "relational operator not defined for property {p}"
                        )));
                    }
                    Ok(())
                }
                Expr::Arithmetic { .. } => Ok(()),
                other => Err(Error::Planning(format!(
                    "left side of a comparison must be a property or arithmetic: {other}"
                ))),
            },
            Expr::Predicate { property, op, .. } => {
                let resolved = self.check_property(property)?;
                let flavor = resolved.effective_type(property).flavor();
                match op {
                    PredicateOp::Like if flavor != DataFlavor::String => Err(Error::Planning(
                        format!("LIKE requires a string property, {property} is {flavor}"),
                    )),
                    PredicateOp::In | PredicateOp::NotIn
                        if matches!(flavor, DataFlavor::Temporal | DataFlavor::Other) =>
                    {
                        Err(Error::Planning(format!(
                            "{op:?} not defined for {flavor} property {property}"
                        )))
                    }
                    _ => Ok(()),
                }
            }
            Expr::Arithmetic { left, right, .. } => {
                for side in [left, right] {
                    match side.as_ref() {
                        Expr::Property(p) => {
                            let resolved = self.check_property(p)?;
                            if !matches!(
                                resolved.effective_type(p).flavor(),
                                DataFlavor::Integral | DataFlavor::Real
                            ) {
                                return Err(Error::Planning(format!(
                                    "arithmetic on non-numeric property {p}"
                                )));
                            }
                        }
                        Expr::Literal(_) | Expr::Arithmetic { .. } => {}
                        other => {
                            return Err(Error::Planning(format!(
                                "invalid arithmetic operand: {other}"
                            )));
                        }
                    }
                }
                Ok(())
            }
            // Visited as children of the nodes above.
            Expr::Property(_) | Expr::Literal(_) => Ok(()),
        }
    }
}

impl ExprVisitor for Validator<'_> {
    fn visit(&mut self, expr: &ExprRef, _parent: Option<&ExprRef>, _level: usize) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.check(expr) {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }
}

/// Checks a predicate tree against the root type before any scan runs.
pub fn validate(predicate: &ExprRef, root: &TypeDef, catalog: &dyn TypeCatalog) -> Result<()> {
    if !matches!(
        predicate.as_ref(),
        Expr::Logical { .. } | Expr::Relational { .. } | Expr::Predicate { .. }
    ) {
        return Err(Error::Planning(format!(
            "where clause is not a condition: {predicate}"
        )));
    }
    let mut validator = Validator {
        root,
        catalog,
        error: None,
    };
    accept(predicate, &mut validator);
    validator.error.map_or(Ok(()), Err)
}

/// Distributes AND over OR. `None` when the result would exceed
/// [`MAX_DISJUNCTS`].
fn disjuncts(expr: &ExprRef) -> Option<Vec<Vec<ExprRef>>> {
    match expr.as_ref() {
        Expr::Logical {
            left,
            op: LogicalOp::Or,
            right,
        } => {
            let mut out = disjuncts(left)?;
            out.extend(disjuncts(right)?);
            (out.len() <= MAX_DISJUNCTS).then_some(out)
        }
        Expr::Logical {
            left,
            op: LogicalOp::And,
            right,
        } => {
            let l = disjuncts(left)?;
            let r = disjuncts(right)?;
            if l.len() * r.len() > MAX_DISJUNCTS {
                return None;
            }
            let mut out = Vec::with_capacity(l.len() * r.len());
            for a in &l {
                for b in &r {
                    out.push(a.iter().chain(b).cloned().collect());
                }
            }
            Some(out)
        }
        _ => Some(vec![vec![expr.clone()]]),
    }
}

struct KeyTerm {
    field: usize,
    op: RelationalOp,
    value: Value,
}

/// A relational term on a key field's property, without functions.
fn key_term(expr: &Expr, fields: &[KeyFieldMapping]) -> Result<Option<KeyTerm>> {
    let Expr::Relational {
        left,
        op,
        right: Literal::Text(text),
    } = expr
    else {
        return Ok(None);
    };
    let Expr::Property(property) = left.as_ref() else {
        return Ok(None);
    };
    if *op == RelationalOp::NotEquals || !property.functions.is_empty() {
        return Ok(None);
    }
    let Some(names) = property.names() else {
        return Ok(None);
    };
    let Some(field) = fields
        .iter()
        .position(|f| f.property_path() == Some(names.as_slice()))
    else {
        return Ok(None);
    };
    let value = fields[field].data_type().convert(text).map_err(|e| {
        Error::Planning(format!("literal for key property {property}: {e}"))
    })?;
    Ok(Some(KeyTerm {
        field,
        op: *op,
        value,
    }))
}

struct DisjunctPlan {
    scan: ScanDescriptor,
    residual: bool,
}

fn plan_disjunct(
    terms: &[ExprRef],
    root: &TypeDef,
    mapping: &TypeKeyMapping,
) -> Result<Option<DisjunctPlan>> {
    let fields = mapping.fields();
    let n = fields.len();
    let pre_len = mapping.predefined_len();

    let mut bound: Vec<Option<Vec<u8>>> = vec![None; n];
    for (i, field) in fields.iter().enumerate().take(pre_len) {
        let value = field
            .predefined_value(root)
            .ok_or_else(|| Error::Planning("predefined key field without value".into()))?;
        bound[i] = Some(field.encode(&value)?);
    }

    let mut key_terms: Vec<Option<KeyTerm>> = Vec::with_capacity(terms.len());
    for term in terms {
        key_terms.push(key_term(term, fields)?);
    }

    // Equality binds a field; a second, different value leaves the term to the recognizer.
    let mut eq_binders: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (ti, kt) in key_terms.iter().enumerate() {
        let Some(kt) = kt else { continue };
        if kt.op != RelationalOp::Equals {
            continue;
        }
        let Some(bytes) = encode_key_value(&fields[kt.field], &kt.value)? else {
            continue;
        };
        match &bound[kt.field] {
            None => {
                bound[kt.field] = Some(bytes);
                eq_binders[kt.field].push(ti);
            }
            Some(existing) if *existing == bytes && kt.field >= pre_len => {
                eq_binders[kt.field].push(ti)
            }
            Some(_) => {}
        }
    }

    let mut consumed = vec![false; terms.len()];
    let consume_fields = |range: std::ops::Range<usize>, consumed: &mut Vec<bool>| {
        for f in range {
            if fields[f].codec().is_reversible() {
                for &ti in &eq_binders[f] {
                    consumed[ti] = true;
                }
            }
        }
    };

    let prefix_len = bound.iter().take_while(|b| b.is_some()).count();
    let prefix: Vec<u8> = bound[..prefix_len]
        .iter()
        .flatten()
        .flat_map(|b| b.iter().copied())
        .collect();

    let scan = if prefix_len == n {
        consume_fields(0..n, &mut consumed);
        ScanDescriptor::Complete(CompleteKey { key: prefix })
    } else if let Some((template, mask)) = bound[prefix_len..]
        .iter()
        .any(Option::is_some)
        .then(|| mapping.row_key().fuzzy(&bound).ok())
        .flatten()
    {
        consume_fields(0..n, &mut consumed);
        ScanDescriptor::Fuzzy(FuzzyKey {
            template,
            mask,
            stop: prefix_end(&prefix),
            start: prefix,
        })
    } else {
        let range = push_down_range(&key_terms, prefix_len, &prefix, &fields[prefix_len])?;
        if prefix_len == pre_len && range.is_none() {
            return Ok(None);
        }
        consume_fields(0..prefix_len, &mut consumed);
        let (start, stop) = match range {
            Some(r) => {
                for ti in r.terms {
                    consumed[ti] = true;
                }
                (r.start.unwrap_or_else(|| prefix.clone()), r.stop.or_else(|| prefix_end(&prefix)))
            }
            None => (prefix.clone(), prefix_end(&prefix)),
        };
        ScanDescriptor::Partial(PartialKey {
            start,
            stop,
            sample: None,
        })
    };

    Ok(Some(DisjunctPlan {
        scan,
        residual: consumed.iter().any(|c| !c),
    }))
}

/// Encodes a literal for a key field. `None` when the literal is wider
/// than the field can hold; such a term stays with the recognizer.
fn encode_key_value(field: &KeyFieldMapping, value: &Value) -> Result<Option<Vec<u8>>> {
    match field.encode(value) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(StorageError::KeyFieldOverflow { len, max }) => {
            debug!(len, max, "key literal exceeds field width - left to recognizer");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

struct KeyRange {
    start: Option<Vec<u8>>,
    stop: Option<Vec<u8>>,
    terms: Vec<usize>,
}

/// Narrows the prefix scan with `<, <=, >, >=` terms on the field right
/// after the prefix, when its codec keeps the bound values in byte order.
fn push_down_range(
    key_terms: &[Option<KeyTerm>],
    field_index: usize,
    prefix: &[u8],
    field: &KeyFieldMapping,
) -> Result<Option<KeyRange>> {
    let codec = field.codec();
    if codec.fixed_width().is_none() {
        return Ok(None);
    }
    let mut bounds = KeyRange {
        start: None,
        stop: None,
        terms: Vec::new(),
    };
    for (ti, kt) in key_terms.iter().enumerate() {
        let Some(kt) = kt else { continue };
        if kt.field != field_index || !codec.preserves_order(&kt.value) {
            continue;
        }
        let Some(encoded) = encode_key_value(field, &kt.value)? else {
            continue;
        };
        let mut at = prefix.to_vec();
        at.extend_from_slice(&encoded);
        let (lower, upper) = match kt.op {
            RelationalOp::GreaterThanEquals => (Some(at), None),
            RelationalOp::GreaterThan => match prefix_end(&at) {
                Some(next) => (Some(next), None),
                None => continue,
            },
            RelationalOp::LessThan => (None, Some(at)),
            RelationalOp::LessThanEquals => match prefix_end(&at) {
                Some(next) => (None, Some(next)),
                None => continue,
            },
            RelationalOp::Equals | RelationalOp::NotEquals => continue,
        };
        if let Some(lower) = lower {
            if bounds.start.as_ref().is_none_or(|s| lower > *s) {
                bounds.start = Some(lower);
            }
        }
        if let Some(upper) = upper {
            if bounds.stop.as_ref().is_none_or(|s| upper < *s) {
                bounds.stop = Some(upper);
            }
        }
        bounds.terms.push(ti);
    }
    Ok((!bounds.terms.is_empty()).then_some(bounds))
}

fn fallback(
    predicate: Option<&ExprRef>,
    root: &TypeDef,
    mapping: &TypeKeyMapping,
) -> Result<ScanPlan> {
    let prefix = mapping.type_prefix(root)?;
    if predicate.is_some() {
        warn!(
            type_name = %root.name,
            "no key constraint in where clause - using default graph partial key scan - could result in very large results set"
        );
    }
    Ok(ScanPlan {
        scans: vec![ScanDescriptor::Partial(PartialKey {
            stop: prefix_end(&prefix),
            start: prefix,
            sample: None,
        })],
        requires_recognizer: predicate.is_some(),
        fallback: true,
    })
}

/// Plans the scans that cover every row `predicate` can match.
///
/// The result is deterministic for a given tree, type and mapping.
pub fn plan_scans(
    predicate: Option<&ExprRef>,
    root: &TypeDef,
    catalog: &dyn TypeCatalog,
    mapping: &TypeKeyMapping,
) -> Result<ScanPlan> {
    let Some(predicate) = predicate else {
        return fallback(None, root, mapping);
    };
    validate(predicate, root, catalog)?;
    debug!(type_name = %root.name, "planning where clause\n{}", print_tree(predicate));

    let Some(disjuncts) = disjuncts(predicate) else {
        return fallback(Some(predicate), root, mapping);
    };

    let mut plans = Vec::with_capacity(disjuncts.len());
    for terms in &disjuncts {
        match plan_disjunct(terms, root, mapping)? {
            Some(plan) => plans.push(plan),
            None => return fallback(Some(predicate), root, mapping),
        }
    }

    let requires_recognizer = plans.iter().any(|p| p.residual);
    let mut scans: Vec<ScanDescriptor> = Vec::with_capacity(plans.len());
    for plan in plans {
        if !scans.contains(&plan.scan) {
            scans.push(plan.scan);
        }
    }

    // Point lookups and range scans do not mix: demote the lookups to single-row ranges.
    if scans.iter().any(ScanDescriptor::is_complete)
        && !scans.iter().all(ScanDescriptor::is_complete)
    {
        for scan in &mut scans {
            if let ScanDescriptor::Complete(c) = scan {
                let mut stop = c.key.clone();
                stop.push(0);
                *scan = ScanDescriptor::Partial(PartialKey {
                    start: std::mem::take(&mut c.key),
                    stop: Some(stop),
                    sample: None,
                });
            }
        }
    }

    debug!(scans = scans.len(), requires_recognizer, "planned key scans");
    Ok(ScanPlan {
        scans,
        requires_recognizer,
        fallback: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ScalarFunction;
    use cellgraph_api::Catalog;
    use cellgraph_storage::codec::HashAlgorithm;
    use cellgraph_storage::{KeyFieldCodecType, KeyFieldSource, TableMapping};
    use std::sync::Arc;

    fn root() -> TypeDef {
        TypeDef::new("http://ex", "Item")
            .data("f1", DataType::Int)
            .data("f2", DataType::Int)
            .data("f3", DataType::Int)
            .data("title", DataType::String)
            .data("tags", DataType::Bytes)
            .data_many("labels", DataType::String)
    }

    fn catalog() -> Catalog {
        Catalog::new().with(root())
    }

    fn mapping(codecs: [KeyFieldCodecType; 3]) -> TypeKeyMapping {
        let table = Arc::new(TableMapping {
            name: "items".into(),
            data_family: b"f".to_vec(),
            hash_algorithm: HashAlgorithm::Jenkins,
            tombstone_rows: true,
        });
        let fields = codecs
            .iter()
            .enumerate()
            .map(|(i, c)| {
                KeyFieldMapping::new(
                    i,
                    3,
                    KeyFieldSource::Property(vec![format!("f{}", i + 1)]),
                    DataType::Int,
                    *c,
                    4,
                    HashAlgorithm::Jenkins,
                )
                .unwrap()
            })
            .collect();
        TypeKeyMapping::new("Item", table, fields).unwrap()
    }

    fn pads() -> TypeKeyMapping {
        mapping([KeyFieldCodecType::Pad; 3])
    }

    fn plan(expr: &ExprRef, m: &TypeKeyMapping) -> Result<ScanPlan> {
        plan_scans(Some(expr), &root(), &catalog(), m)
    }

    #[test]
    fn contiguous_prefix_gives_one_partial_key() {
        let m = pads();
        let e = Expr::and(Expr::eq("f1", "5"), Expr::eq("f2", "10"));
        let p = plan(&e, &m).unwrap();
        assert_eq!(p.scans.len(), 1);
        let ScanDescriptor::Partial(pk) = &p.scans[0] else {
            panic!("expected partial key, got {:?}", p.scans[0]);
        };
        assert_eq!(pk.start, b"00050010".to_vec());
        assert_eq!(pk.stop, Some(b"00050011".to_vec()));
        assert!(!p.requires_recognizer);
        assert!(!p.fallback);
    }

    #[test]
    fn residual_terms_require_the_recognizer() {
        let m = pads();
        let e = Expr::and(Expr::eq("f1", "5"), Expr::like("title", "a*"));
        let p = plan(&e, &m).unwrap();
        assert_eq!(p.scans.len(), 1);
        assert!(p.requires_recognizer);
    }

    #[test]
    fn gap_gives_fuzzy_key() {
        let m = pads();
        let e = Expr::and(Expr::eq("f1", "5"), Expr::eq("f3", "7"));
        let p = plan(&e, &m).unwrap();
        let ScanDescriptor::Fuzzy(fk) = &p.scans[0] else {
            panic!("expected fuzzy key");
        };
        assert_eq!(fk.template, b"0005\0\0\0\00007".to_vec());
        assert_eq!(fk.mask, vec![0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(fk.start, b"0005".to_vec());
        assert!(!p.requires_recognizer);
    }

    #[test]
    fn every_field_bound_gives_complete_key() {
        let m = pads();
        let e = Expr::and(
            Expr::and(Expr::eq("f1", "1"), Expr::eq("f2", "2")),
            Expr::eq("f3", "3"),
        );
        let p = plan(&e, &m).unwrap();
        assert_eq!(
            p.scans,
            vec![ScanDescriptor::Complete(CompleteKey {
                key: b"000100020003".to_vec()
            })]
        );
        assert!(p.has_complete_keys());
    }

    #[test]
    fn no_key_constraint_falls_back() {
        let m = pads();
        let e = Expr::like("title", "x*");
        let p = plan(&e, &m).unwrap();
        assert!(p.fallback);
        assert!(p.requires_recognizer);
        assert_eq!(
            p.scans,
            vec![ScanDescriptor::Partial(PartialKey {
                start: Vec::new(),
                stop: None,
                sample: None
            })]
        );
    }

    #[test]
    fn no_predicate_falls_back_without_recognizer() {
        let p = plan_scans(None, &root(), &catalog(), &pads()).unwrap();
        assert!(p.fallback);
        assert!(!p.requires_recognizer);
    }

    #[test]
    fn range_after_prefix_is_pushed_down() {
        let m = pads();
        let e = Expr::and(
            Expr::eq("f1", "5"),
            Expr::and(
                Expr::compare(
                    Property::new("f2"),
                    RelationalOp::GreaterThanEquals,
                    Literal::text("3"),
                ),
                Expr::compare(Property::new("f2"), RelationalOp::LessThan, Literal::text("9")),
            ),
        );
        let p = plan(&e, &m).unwrap();
        let ScanDescriptor::Partial(pk) = &p.scans[0] else {
            panic!("expected partial key");
        };
        assert_eq!(pk.start, b"00050003".to_vec());
        assert_eq!(pk.stop, Some(b"00050009".to_vec()));
        assert!(!p.requires_recognizer);
    }

    #[test]
    fn negative_range_stays_residual() {
        let m = pads();
        let e = Expr::and(
            Expr::eq("f1", "5"),
            Expr::compare(Property::new("f2"), RelationalOp::GreaterThan, Literal::text("-3")),
        );
        let p = plan(&e, &m).unwrap();
        let ScanDescriptor::Partial(pk) = &p.scans[0] else {
            panic!("expected partial key");
        };
        assert_eq!(pk.start, b"0005".to_vec());
        assert!(p.requires_recognizer);
    }

    #[test]
    fn oversized_range_literal_stays_residual() {
        let m = pads();
        let e = Expr::and(
            Expr::eq("f1", "5"),
            Expr::compare(Property::new("f2"), RelationalOp::LessThan, Literal::text("10000")),
        );
        let p = plan(&e, &m).unwrap();
        assert_eq!(
            p.scans,
            vec![ScanDescriptor::Partial(PartialKey {
                start: b"0005".to_vec(),
                stop: Some(b"0006".to_vec()),
                sample: None
            })]
        );
        assert!(p.requires_recognizer);
        assert!(!p.fallback);
    }

    #[test]
    fn oversized_equality_literal_is_not_bound() {
        let m = pads();
        let e = Expr::and(Expr::eq("f1", "5"), Expr::eq("f2", "123456"));
        let p = plan(&e, &m).unwrap();
        let ScanDescriptor::Partial(pk) = &p.scans[0] else {
            panic!("expected partial key, got {:?}", p.scans[0]);
        };
        assert_eq!(pk.start, b"0005".to_vec());
        assert!(p.requires_recognizer);

        let p = plan(&Expr::eq("f1", "123456"), &m).unwrap();
        assert!(p.fallback);
        assert!(p.requires_recognizer);
    }

    #[test]
    fn hashed_equality_keeps_the_recognizer() {
        let m = mapping([
            KeyFieldCodecType::Hash,
            KeyFieldCodecType::Pad,
            KeyFieldCodecType::Pad,
        ]);
        let p = plan(&Expr::eq("f1", "5"), &m).unwrap();
        assert_eq!(p.scans.len(), 1);
        assert!(!p.fallback);
        assert!(p.requires_recognizer);
    }

    #[test]
    fn disjunction_plans_one_scan_per_branch() {
        let m = pads();
        let e = Expr::or(Expr::eq("f1", "1"), Expr::eq("f1", "2"));
        let p = plan(&e, &m).unwrap();
        assert_eq!(p.scans.len(), 2);
        assert_eq!(p.scans[0].start(), b"0001");
        assert_eq!(p.scans[1].start(), b"0002");
        assert!(!p.requires_recognizer);
    }

    #[test]
    fn disjunct_without_constraint_forces_fallback() {
        let m = pads();
        let e = Expr::or(Expr::eq("f1", "1"), Expr::eq("title", "x"));
        assert!(plan(&e, &m).unwrap().fallback);
    }

    #[test]
    fn complete_keys_are_demoted_next_to_ranges() {
        let m = pads();
        let full = Expr::and(
            Expr::and(Expr::eq("f1", "1"), Expr::eq("f2", "2")),
            Expr::eq("f3", "3"),
        );
        let e = Expr::or(full, Expr::eq("f1", "9"));
        let p = plan(&e, &m).unwrap();
        assert!(!p.has_complete_keys());
        assert_eq!(p.scans[0].start(), b"000100020003");
        assert_eq!(p.scans[0].stop(), Some(&b"000100020003\0"[..]));
    }

    #[test]
    fn planning_errors() {
        let m = pads();
        let wildcard = Expr::eq("*/f1", "1");
        assert!(matches!(plan(&wildcard, &m), Err(Error::Planning(_))));
        let unknown = Expr::eq("nope", "1");
        assert!(matches!(plan(&unknown, &m), Err(Error::Planning(_))));
        let like_int = Expr::like("f2", "1*");
        assert!(matches!(plan(&like_int, &m), Err(Error::Planning(_))));
        let bad_literal = Expr::eq("f1", "abc");
        assert!(matches!(plan(&bad_literal, &m), Err(Error::Planning(_))));
        let bytes = Expr::eq("tags", "x");
        assert!(matches!(plan(&bytes, &m), Err(Error::Planning(_))));
        let fn_on_many = Expr::compare(
            Property::new("labels").with_function(ScalarFunction::Upper),
            RelationalOp::Equals,
            Literal::text("A"),
        );
        assert!(matches!(plan(&fn_on_many, &m), Err(Error::Planning(_))));
    }

    #[test]
    fn sample_applies_to_fallback_only() {
        let mut p = plan_scans(None, &root(), &catalog(), &pads()).unwrap();
        p.apply_sample(0.25);
        let ScanDescriptor::Partial(pk) = &p.scans[0] else {
            panic!("expected partial key");
        };
        assert_eq!(pk.sample, Some(0.25));
    }
}

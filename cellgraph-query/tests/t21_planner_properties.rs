//! T21: row key planning is deterministic and never drops a matching row.

use cellgraph_api::{Catalog, DataType, TypeDef, Value};
use cellgraph_query::ast::RelationalOp;
use cellgraph_query::{Expr, ExprRef, Literal, Property, plan_scans};
use cellgraph_storage::memtable::MemTable;
use cellgraph_storage::{
    ColumnFilter, KeyMappingProvider, ScanDescriptor, ScanExecutor, StoreMapping,
};
use proptest::prelude::*;

const MAPPING: &str = r#"{
    "tables": [{
        "name": "readings",
        "data_family": "f",
        "types": [{
            "type": "Reading",
            "row_key": [
                { "predefined": "type", "codec": "hash" },
                { "path": "site", "codec": "native" },
                { "path": "sensor", "codec": "pad", "max_length": 3 },
                { "path": "seq", "codec": "native" }
            ]
        }]
    }]
}"#;

fn reading() -> TypeDef {
    TypeDef::new("http://iot", "Reading")
        .data("site", DataType::Int)
        .data("sensor", DataType::Int)
        .data("seq", DataType::Int)
}

fn term(field: usize, op: usize, value: i64) -> ExprRef {
    let name = ["site", "sensor", "seq"][field];
    let op = [
        RelationalOp::Equals,
        RelationalOp::GreaterThan,
        RelationalOp::LessThanEquals,
    ][op];
    Expr::compare(Property::new(name), op, Literal::text(value.to_string()))
}

fn holds(expr: &ExprRef, row: [i64; 3]) -> bool {
    match expr.as_ref() {
        Expr::Logical { left, op, right } => match op {
            cellgraph_query::ast::LogicalOp::And => holds(left, row) && holds(right, row),
            cellgraph_query::ast::LogicalOp::Or => holds(left, row) || holds(right, row),
        },
        Expr::Relational {
            left,
            op,
            right: Literal::Text(text),
        } => {
            let Expr::Property(p) = left.as_ref() else {
                unreachable!()
            };
            let v = row[["site", "sensor", "seq"].iter().position(|n| *n == p.name).unwrap()];
            let lit: i64 = text.parse().unwrap();
            match op {
                RelationalOp::Equals => v == lit,
                RelationalOp::GreaterThan => v > lit,
                RelationalOp::LessThanEquals => v <= lit,
                _ => unreachable!(),
            }
        }
        _ => unreachable!(),
    }
}

fn arb_expr() -> impl Strategy<Value = ExprRef> {
    let leaf = (0usize..3, 0usize..3, -2i64..3).prop_map(|(f, o, v)| term(f, o, v));
    leaf.prop_recursive(3, 12, 2, |inner| {
        (inner.clone(), inner, any::<bool>())
            .prop_map(|(l, r, and)| if and { Expr::and(l, r) } else { Expr::or(l, r) })
    })
}

fn rows() -> Vec<[i64; 3]> {
    let mut out = Vec::new();
    for site in -2..3 {
        for sensor in -2..3 {
            for seq in -2..3 {
                out.push([site, sensor, seq]);
            }
        }
    }
    out
}

proptest! {
    #[test]
    fn t21_plans_are_deterministic(expr in arb_expr()) {
        let catalog = Catalog::new().with(reading());
        let mapping = StoreMapping::from_json(MAPPING, &catalog).unwrap();
        let m = mapping.require("Reading").unwrap();
        let a = plan_scans(Some(&expr), &reading(), &catalog, m).unwrap();
        let b = plan_scans(Some(&expr), &reading(), &catalog, m).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn t21_scans_cover_every_matching_row(expr in arb_expr()) {
        let catalog = Catalog::new().with(reading());
        let mapping = StoreMapping::from_json(MAPPING, &catalog).unwrap();
        let m = mapping.require("Reading").unwrap();

        let mut table = MemTable::new();
        for row in rows() {
            let key = m
                .row_key()
                .compose(&[
                    Value::String("Reading".into()),
                    Value::Int(row[0]),
                    Value::Int(row[1]),
                    Value::Int(row[2]),
                ])
                .unwrap();
            table.put(key, "f", "v", format!("{},{},{}", row[0], row[1], row[2]));
        }

        let plan = plan_scans(Some(&expr), &reading(), &catalog, m).unwrap();
        let mut covered = std::collections::HashSet::new();
        for scan in &plan.scans {
            match scan {
                ScanDescriptor::Complete(c) => {
                    if let Some(r) = table.get(&c.key, &ColumnFilter::all()).unwrap() {
                        covered.insert(r.row_key);
                    }
                }
                scan => {
                    for r in table.scan(scan, &ColumnFilter::all()).unwrap() {
                        covered.insert(r.unwrap().row_key);
                    }
                }
            }
        }

        for row in rows() {
            let key = m
                .row_key()
                .compose(&[
                    Value::String("Reading".into()),
                    Value::Int(row[0]),
                    Value::Int(row[1]),
                    Value::Int(row[2]),
                ])
                .unwrap();
            if holds(&expr, row) {
                prop_assert!(
                    covered.contains(&key),
                    "row {:?} not covered by {:?}",
                    row,
                    plan.scans
                );
            } else if !plan.requires_recognizer {
                prop_assert!(!covered.contains(&key), "row {:?} wrongly covered", row);
            }
        }
    }
}

//! Composite row keys.
//!
//! A row key is the concatenation of its encoded key fields in sequence
//! order. Every field but the last must encode to a fixed width so that
//! field boundaries can be recovered without delimiters.

use crate::key_field::KeyFieldMapping;
use crate::{Error, Result};
use cellgraph_api::Value;

/// Mask byte for a template position that must match exactly.
pub const FUZZY_FIXED: u8 = 0;
/// Mask byte for a template position that matches any byte.
pub const FUZZY_ANY: u8 = 1;

#[derive(Debug, Clone, Copy)]
pub struct RowKey<'a> {
    fields: &'a [KeyFieldMapping],
}

impl<'a> RowKey<'a> {
    pub fn new(fields: &'a [KeyFieldMapping]) -> Self {
        Self { fields }
    }

    /// Checks that only the last field has a variable width.
    pub fn validate(&self) -> Result<()> {
        let Some((_, leading)) = self.fields.split_last() else {
            return Err(Error::InvalidMapping("row key has no fields".into()));
        };
        for field in leading {
            if field.codec().fixed_width().is_none() {
                return Err(Error::InvalidMapping(format!(
                    "key field {} has a variable width but is not the last field",
                    field.seq_num()
                )));
            }
        }
        Ok(())
    }

    /// Encodes every field.
    pub fn compose(&self, values: &[Value]) -> Result<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(Error::MalformedKey(format!(
                "expected {} key values, found {}",
                self.fields.len(),
                values.len()
            )));
        }
        self.compose_prefix(values)
    }

    /// Encodes the leading `values.len()` fields.
    pub fn compose_prefix(&self, values: &[Value]) -> Result<Vec<u8>> {
        let mut key = Vec::new();
        for (field, value) in self.fields.iter().zip(values) {
            key.extend_from_slice(&field.encode(value)?);
        }
        Ok(key)
    }

    /// Splits a key into field values. Hashed fields decode to `None`.
    pub fn decompose(&self, key: &[u8]) -> Result<Vec<Option<Value>>> {
        let mut out = Vec::with_capacity(self.fields.len());
        let mut rest = key;
        for (i, field) in self.fields.iter().enumerate() {
            let codec = field.codec();
            let width = match codec.fixed_width() {
                Some(w) => w,
                None if i + 1 == self.fields.len() => rest.len(),
                None => {
                    return Err(Error::MalformedKey(format!(
                        "variable width field {i} before the last field"
                    )));
                }
            };
            if rest.len() < width {
                return Err(Error::MalformedKey(format!(
                    "key too short for field {i}: {} of {width} bytes",
                    rest.len()
                )));
            }
            let (bytes, tail) = rest.split_at(width);
            out.push(if codec.is_reversible() {
                Some(codec.decode(bytes)?)
            } else {
                None
            });
            rest = tail;
        }
        if !rest.is_empty() {
            return Err(Error::MalformedKey(format!(
                "{} trailing bytes after the last field",
                rest.len()
            )));
        }
        Ok(out)
    }

    /// Builds a fuzzy template and mask from per-field bound bytes.
    ///
    /// Unbound fields become wildcard runs and need a fixed width. Trailing
    /// unbound fields are left out of the template.
    pub fn fuzzy(&self, bound: &[Option<Vec<u8>>]) -> Result<(Vec<u8>, Vec<u8>)> {
        let last_bound = bound.iter().rposition(Option::is_some).ok_or_else(|| {
            Error::MalformedKey("fuzzy key needs at least one bound field".into())
        })?;
        let mut template = Vec::new();
        let mut mask = Vec::new();
        for (field, slot) in self.fields.iter().zip(bound).take(last_bound + 1) {
            match slot {
                Some(bytes) => {
                    template.extend_from_slice(bytes);
                    mask.resize(template.len(), FUZZY_FIXED);
                }
                None => {
                    let width = field.codec().fixed_width().ok_or_else(|| {
                        Error::MalformedKey(format!(
                            "unbound key field {} has no fixed width",
                            field.seq_num()
                        ))
                    })?;
                    template.resize(template.len() + width, 0);
                    mask.resize(template.len(), FUZZY_ANY);
                }
            }
        }
        Ok((template, mask))
    }
}

/// Smallest key greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty or all-0xFF prefix).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut out = prefix.to_vec();
    for idx in (0..out.len()).rev() {
        if out[idx] != 0xFF {
            out[idx] += 1;
            out.truncate(idx + 1);
            return Some(out);
        }
    }
    None
}

/// Whether `key` matches a fuzzy template under its mask.
pub fn fuzzy_matches(key: &[u8], template: &[u8], mask: &[u8]) -> bool {
    key.len() >= template.len()
        && template
            .iter()
            .zip(mask)
            .zip(key)
            .all(|((t, m), k)| *m == FUZZY_ANY || t == k)
}

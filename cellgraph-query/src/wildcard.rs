use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Translates a LIKE pattern into an anchored regex: `*` matches any run,
/// `?` any single character, everything else literally.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("(?s)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    out.push('$');
    out
}

/// Compiled LIKE patterns keyed by their literal. Shared across threads.
#[derive(Debug, Default)]
pub struct WildcardCache {
    patterns: RwLock<HashMap<String, Arc<Regex>>>,
}

impl WildcardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(re) = self
            .patterns
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(pattern)
        {
            return Ok(Arc::clone(re));
        }
        let re = Regex::new(&wildcard_to_regex(pattern))
            .map_err(|e| Error::Evaluation(format!("invalid wildcard '{pattern}': {e}")))?;
        let mut patterns = self.patterns.write().unwrap_or_else(|e| e.into_inner());
        let re = patterns
            .entry(pattern.to_string())
            .or_insert_with(|| Arc::new(re));
        Ok(Arc::clone(re))
    }

    pub fn matches(&self, pattern: &str, value: &str) -> Result<bool> {
        Ok(self.compile(pattern)?.is_match(value))
    }

    pub fn len(&self) -> usize {
        self.patterns.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_and_question_mark() {
        let cache = WildcardCache::new();
        assert!(cache.matches("ab*c?d", "abXXXcYd").unwrap());
        assert!(!cache.matches("ab*c?d", "abXXXcYYd").unwrap());
        assert!(cache.matches("*", "").unwrap());
    }

    #[test]
    fn metacharacters_are_literal() {
        let cache = WildcardCache::new();
        assert!(cache.matches("a.b(c)+", "a.b(c)+").unwrap());
        assert!(!cache.matches("a.b", "axb").unwrap());
        assert!(cache.matches("$1*", "$100").unwrap());
    }

    #[test]
    fn compiled_once_per_literal() {
        let cache = WildcardCache::new();
        let a = cache.compile("x*").unwrap();
        let b = cache.compile("x*").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        cache.compile("y*").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn shared_across_threads() {
        let cache = Arc::new(WildcardCache::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.matches("v?", &format!("v{i}")).unwrap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(cache.len(), 1);
    }
}

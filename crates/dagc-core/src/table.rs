//! Keyed side-tables (whole-input data) handed to units at construction.

use std::collections::HashMap;

use crate::hash::{hash_values, Hash256};
use crate::types::{Record, Value};

#[derive(Debug, Clone)]
pub struct DataTable {
    pub model: String,
    /// Property indices of the lookup key.
    pub key: Vec<usize>,
    rows: HashMap<Hash256, Vec<Record>>,
    len: usize,
}

impl DataTable {
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            key: vec![],
            rows: HashMap::new(),
            len: 0,
        }
    }

    /// Index `records` by the values at `key`; insertion order is kept per key.
    pub fn build(model: impl Into<String>, key: Vec<usize>, records: Vec<Record>) -> Self {
        let mut rows: HashMap<Hash256, Vec<Record>> = HashMap::new();
        let len = records.len();
        for r in records {
            let digest = hash_values(key.iter().map(|&i| r.get(i)));
            rows.entry(digest).or_default().push(r);
        }
        Self {
            model: model.into(),
            key,
            rows,
            len,
        }
    }

    /// Rows whose key equals `key`, in insertion order.
    pub fn find(&self, key: &[Value]) -> &[Record] {
        let digest = hash_values(key.iter());
        match self.rows.get(&digest) {
            Some(rows) => rows.as_slice(),
            None => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(k: i64, v: &str) -> Record {
        Record {
            model: "M".into(),
            values: vec![Value::Long(k), Value::Text(v.into())],
        }
    }

    #[test]
    fn find_by_key_keeps_order() {
        let t = DataTable::build("M", vec![0], vec![rec(1, "a"), rec(2, "b"), rec(1, "c")]);
        let hits = t.find(&[Value::Long(1)]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].get(1), &Value::Text("c".into()));
        assert!(t.find(&[Value::Long(9)]).is_empty());
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn empty_table_finds_nothing() {
        let t = DataTable::empty("M");
        assert!(t.is_empty());
        assert!(t.find(&[Value::Null]).is_empty());
    }
}

//! Stable hashing helpers for cache keys, unit names, manifests and table keys.

use blake3::Hasher;
use serde::Serialize;

use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }

    /// First `n` hex characters; used for readable unit names.
    pub fn short(&self, n: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(n.min(64));
        hex
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

/// Hash any serde-serializable value deterministically (via JSON).
/// NOTE: map-typed fields must be ordered (BTreeMap) for this to be stable.
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256, crate::error::Error> {
    let bytes = serde_json::to_vec(v).map_err(|e| crate::error::Error::Hash(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Hash a tuple of values (e.g. a join key) into one digest.
pub fn hash_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Hash256 {
    let mut hasher = Hasher::new();
    for v in values {
        hash_value(v, &mut hasher);
    }
    Hash256(hasher.finalize().into())
}

/// Feed one value into a hasher, discriminant first.
pub fn hash_value(value: &Value, hasher: &mut Hasher) {
    use Value::*;

    hasher.update(&[value.type_order()]);

    match value {
        Null => {}
        Boolean(b) => {
            hasher.update(&[*b as u8]);
        }
        Int(i) => {
            hasher.update(&i.to_le_bytes());
        }
        Long(i) => {
            hasher.update(&i.to_le_bytes());
        }
        Float(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Double(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        Text(s) => {
            // length prefix keeps ("ab","c") and ("a","bc") apart
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Date(d) => {
            hasher.update(&d.to_le_bytes());
        }
    }
}

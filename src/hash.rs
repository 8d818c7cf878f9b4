use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

pub fn stable_hash_with(f: impl FnOnce(&mut DefaultHasher)) -> u64 {
    let mut hasher = DefaultHasher::new();
    f(&mut hasher);
    hasher.finish()
}

/// Order-sensitive fingerprint over serialized rows.
pub fn rows_fingerprint(rows: &[Value]) -> u64 {
    stable_hash_with(|hasher| {
        rows.len().hash(hasher);
        for row in rows {
            row.to_string().hash(hasher);
        }
    })
}

pub fn fingerprint_hex(value: u64) -> String {
    format!("{value:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_depends_on_row_order() {
        let a = vec![json!({"text": "a"}), json!({"text": "b"})];
        let b = vec![json!({"text": "b"}), json!({"text": "a"})];
        assert_eq!(rows_fingerprint(&a), rows_fingerprint(&a.clone()));
        assert_ne!(rows_fingerprint(&a), rows_fingerprint(&b));
        assert_eq!(fingerprint_hex(0xab).len(), 16);
    }
}

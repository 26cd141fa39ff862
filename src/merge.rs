//! Sparse field-map merge.
//!
//! Declarations and annotations are sparse maps: an absent key means
//! "no opinion, keep whatever was there", while an explicit `null`
//! clears a previously-set value. JSON has no `undefined`, so key
//! absence is the only way to express "no opinion".

use serde_json::{Map, Value};

/// Sparse field-id → value map used for declarations and annotations.
pub type FieldMap = Map<String, Value>;

/// Merge `overlay` onto `base`, returning a new map.
///
/// Every key present in `overlay` wins, including explicit `null`,
/// `false`, `0`, and `""`. Keys absent from `overlay` keep their base
/// value. Nested objects are merged recursively key-by-key; arrays and
/// scalars are replaced wholesale. Neither input is mutated.
pub fn deep_merge(base: &FieldMap, overlay: &FieldMap) -> FieldMap {
    let mut merged = base.clone();
    deep_merge_into(&mut merged, overlay);
    merged
}

/// In-place variant of [`deep_merge`].
///
/// The projection fold calls this once per accepted action; mutating the
/// accumulator avoids re-cloning it for every log entry.
pub fn deep_merge_into(base: &mut FieldMap, overlay: &FieldMap) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge_into(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

//! Shared proptest generators.

use proptest::prelude::*;
use serde_json::{Map, Value};

/// Generate a path segment that is never the literal `data`.
pub fn path_segment_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}".prop_filter("`data` is reserved by KV v2", |s| s != "data")
}

/// Generate a KV mount name.
pub fn mount_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("secret".to_string()),
        Just("kv".to_string()),
        path_segment_strategy(),
    ]
}

/// Generate a logical path `mount/seg[/seg...]` with no `data` segment.
pub fn logical_path_strategy() -> impl Strategy<Value = (String, Vec<String>)> {
    (
        mount_strategy(),
        prop::collection::vec(path_segment_strategy(), 1..4),
    )
}

/// Generate a scalar JSON value of the kinds a schema can describe.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[A-Za-z0-9 !@#$%^&*]{0,32}".prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
    ]
}

/// Generate a secret payload.
pub fn payload_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,16}", scalar_value_strategy(), 0..8)
        .prop_map(|fields| fields.into_iter().collect())
}

/// Generate a schema type name.
pub fn field_type_name_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("str"), Just("int"), Just("bool")]
}

/// Generate a schema as a JSON object of `field: "type"` entries.
pub fn schema_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,16}", field_type_name_strategy(), 1..6).prop_map(
        |fields| {
            fields
                .into_iter()
                .map(|(name, ty)| (name, Value::from(ty)))
                .collect()
        },
    )
}

/// Generate a Vault-style token.
pub fn token_strategy() -> impl Strategy<Value = String> {
    "hvs\\.[A-Za-z0-9]{24}"
}

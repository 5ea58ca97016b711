//! Property tests for the URL rewriter.

use proptest::prelude::*;
use serde_json::Value;
use serde_json::json;

use prism_rewrite::rewrite_value;

const UPSTREAM: &str = "https://registry.npmjs.org";
const BRIDGE: &str = "https://bridge.example";

/// Arbitrary JSON trees whose strings sometimes carry the upstream origin
/// and whose object keys sometimes collide with the reserved `xid` name.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,12}".prop_map(Value::from),
        "[a-z/]{0,12}".prop_map(|suffix| json!(format!("{UPSTREAM}/{suffix}"))),
    ];
    leaf.prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::from),
            prop::collection::vec(
                ("(xid|self|name|url|tarball)", inner),
                0..6
            )
            .prop_map(|pairs| {
                let mut map = serde_json::Map::new();
                for (key, value) in pairs {
                    map.insert(key, value);
                }
                Value::Object(map)
            }),
        ]
    })
}

/// Collect every string reachable under a non-`xid` key.
fn rewritable_strings(value: &Value, under_xid: bool, out: &mut Vec<(bool, String)>) {
    match value {
        Value::String(s) => out.push((under_xid, s.clone())),
        Value::Array(items) => {
            for item in items {
                rewritable_strings(item, under_xid, out);
            }
        }
        Value::Object(map) => {
            for (key, inner) in map {
                rewritable_strings(inner, key == "xid", out);
            }
        }
        _ => {}
    }
}

proptest! {
    #[test]
    fn rewriting_is_idempotent(mut value in arb_json()) {
        rewrite_value(&mut value, UPSTREAM, BRIDGE);
        let once = value.clone();
        let second_pass = rewrite_value(&mut value, UPSTREAM, BRIDGE);
        prop_assert_eq!(second_pass, 0);
        prop_assert_eq!(value, once);
    }

    #[test]
    fn no_rewritable_string_keeps_the_upstream_prefix(mut value in arb_json()) {
        rewrite_value(&mut value, UPSTREAM, BRIDGE);
        let mut strings = Vec::new();
        rewritable_strings(&value, false, &mut strings);
        for (under_xid, s) in strings {
            if !under_xid {
                prop_assert!(!s.starts_with(UPSTREAM), "unrewritten string survived: {s}");
            }
        }
    }

    #[test]
    fn xid_values_survive_byte_for_byte(suffix in "[a-z/]{0,16}") {
        let original = format!("{UPSTREAM}/{suffix}");
        let mut value = json!({"xid": original.clone(), "self": original.clone()});
        rewrite_value(&mut value, UPSTREAM, BRIDGE);
        prop_assert_eq!(value["xid"].as_str().unwrap(), original.as_str());
        prop_assert_eq!(value["self"].as_str().unwrap(), format!("{BRIDGE}/{suffix}").as_str());
    }

    #[test]
    fn replacement_count_matches_prefixed_strings(suffixes in prop::collection::vec("[a-z]{0,8}", 0..10)) {
        let items: Vec<Value> = suffixes
            .iter()
            .map(|s| json!(format!("{UPSTREAM}/{s}")))
            .collect();
        let mut value = Value::Array(items);
        let replaced = rewrite_value(&mut value, UPSTREAM, BRIDGE);
        prop_assert_eq!(replaced, suffixes.len());
    }
}

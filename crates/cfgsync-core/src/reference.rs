//! Reference fields
//!
//! A reference is any string value shaped `{base_url}/{type_plural}/{id}`
//! where the plural names a known [`ObjectType`]. References are found by
//! scanning every string in a payload, so no per-type field list exists.
//! Top-level volatile fields (notably the object's own `url`) are never
//! treated as references.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::mapping::IdMapping;
use crate::model::{ObjectRef, ObjectType, is_volatile};

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let plurals = ObjectType::ALL
        .iter()
        .map(|t| t.plural())
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"^(?P<base>https?://.+?)/(?P<plural>{plurals})/(?P<id>\d+)/?$"
    ))
    .expect("reference pattern is a valid regex")
});

/// A reference string split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference<'a> {
    pub base_url: &'a str,
    pub target: ObjectRef,
}

/// Parse a reference URL. Returns `None` for anything else, including
/// URLs to types the engine does not manage (users, organizations).
pub fn parse_reference(value: &str) -> Option<ParsedReference<'_>> {
    let captures = REFERENCE_PATTERN.captures(value)?;
    let object_type = ObjectType::from_plural(captures.name("plural")?.as_str())?;
    let id = captures.name("id")?.as_str().parse().ok()?;
    Some(ParsedReference {
        base_url: captures.name("base")?.as_str(),
        target: ObjectRef::new(object_type, id),
    })
}

/// Build the canonical URL of `target` under `base_url`.
pub fn reference_url(base_url: &str, target: ObjectRef) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        target.object_type.plural(),
        target.id
    )
}

/// Every distinct reference in `content`, sorted.
pub fn references(content: &Map<String, Value>) -> Vec<ObjectRef> {
    let mut found = BTreeSet::new();
    for (key, value) in content {
        if !is_volatile(key) {
            collect(value, &mut found);
        }
    }
    found.into_iter().collect()
}

fn collect(value: &Value, found: &mut BTreeSet<ObjectRef>) {
    match value {
        Value::String(s) => {
            if let Some(parsed) = parse_reference(s) {
                found.insert(parsed.target);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, found)),
        Value::Object(map) => map.values().for_each(|v| collect(v, found)),
        _ => {}
    }
}

/// Rewrite every mapped reference to point at its target-tenant object.
///
/// References without a mapping entry are left exactly as they are; they
/// keep pointing at the source tenant.
pub fn rewrite_references(
    content: &Map<String, Value>,
    mapping: &IdMapping,
    target_base_url: &str,
) -> Map<String, Value> {
    retarget_references(content, target_base_url, |r| {
        mapping
            .get(r.object_type, r.id)
            .map_or(Retarget::Keep, Retarget::To)
    })
}

/// Drop references for which `keep` returns false.
///
/// Array elements are removed; scalar fields become `null`.
pub fn retain_references(
    content: &Map<String, Value>,
    mut keep: impl FnMut(ObjectRef) -> bool,
) -> Map<String, Value> {
    transform_content(content, &mut |s| match parse_reference(s) {
        Some(parsed) if !keep(parsed.target) => Rewrite::Drop,
        _ => Rewrite::Keep,
    })
}

/// Replace references by base-less `plural/id` tokens.
///
/// With a mapping, source ids are translated first so that two tenants'
/// copies of the same graph normalize identically.
pub fn normalize_references(
    content: &Map<String, Value>,
    mapping: Option<&IdMapping>,
) -> Map<String, Value> {
    transform_content(content, &mut |s| match parse_reference(s) {
        Some(parsed) => {
            let t = parsed.target.object_type;
            let id = mapping
                .and_then(|m| m.get(t, parsed.target.id))
                .unwrap_or(parsed.target.id);
            Rewrite::Replace(format!("{}/{}", t.plural(), id))
        }
        None => Rewrite::Keep,
    })
}

/// What happens to one reference when content moves to another tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retarget {
    /// Leave the URL as it is
    Keep,
    /// Point at this id under the target base URL
    To(u64),
    /// Remove it (array item dropped, scalar set to null)
    Drop,
}

/// Carry every reference into `target_base_url` as `decide` says.
///
/// [`rewrite_references`] and [`retain_references`] are the two common
/// special cases.
pub fn retarget_references(
    content: &Map<String, Value>,
    target_base_url: &str,
    mut decide: impl FnMut(ObjectRef) -> Retarget,
) -> Map<String, Value> {
    transform_content(content, &mut |s| match parse_reference(s) {
        Some(parsed) => match decide(parsed.target) {
            Retarget::Keep => Rewrite::Keep,
            Retarget::To(id) => Rewrite::Replace(reference_url(
                target_base_url,
                ObjectRef::new(parsed.target.object_type, id),
            )),
            Retarget::Drop => Rewrite::Drop,
        },
        None => Rewrite::Keep,
    })
}

enum Rewrite {
    Keep,
    Replace(String),
    Drop,
}

fn transform_content(
    content: &Map<String, Value>,
    f: &mut dyn FnMut(&str) -> Rewrite,
) -> Map<String, Value> {
    content
        .iter()
        .map(|(key, value)| {
            let value = if is_volatile(key) {
                value.clone()
            } else {
                transform(value, f).unwrap_or(Value::Null)
            };
            (key.clone(), value)
        })
        .collect()
}

fn transform(value: &Value, f: &mut dyn FnMut(&str) -> Rewrite) -> Option<Value> {
    match value {
        Value::String(s) => match f(s) {
            Rewrite::Keep => Some(value.clone()),
            Rewrite::Replace(new) => Some(Value::String(new)),
            Rewrite::Drop => None,
        },
        Value::Array(items) => Some(Value::Array(
            items.iter().filter_map(|v| transform(v, f)).collect(),
        )),
        Value::Object(map) => Some(Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), transform(v, f).unwrap_or(Value::Null)))
                .collect(),
        )),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    const SRC: &str = "https://source.example.com/api/v1";
    const TGT: &str = "https://target.example.com/api/v1";

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[rstest]
    #[case("https://a.io/api/v1/queues/12", Some((ObjectType::Queue, 12)))]
    #[case("https://a.io/api/v1/email_templates/3/", Some((ObjectType::EmailTemplate, 3)))]
    #[case("http://localhost:8080/engine_fields/9", Some((ObjectType::EngineField, 9)))]
    #[case("https://a.io/api/v1/engines/4", Some((ObjectType::Engine, 4)))]
    #[case("https://a.io/api/v1/users/12", None)]
    #[case("https://a.io/api/v1/queues/abc", None)]
    #[case("queues/12", None)]
    #[case("see https://a.io/queues/1 for details", None)]
    fn parses_known_reference_shapes(
        #[case] input: &str,
        #[case] expected: Option<(ObjectType, u64)>,
    ) {
        let parsed = parse_reference(input).map(|p| (p.target.object_type, p.target.id));
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parse_keeps_base_url() {
        let parsed = parse_reference("https://a.io/api/v1/schemas/200").unwrap();
        assert_eq!(parsed.base_url, "https://a.io/api/v1");
        assert_eq!(
            reference_url(parsed.base_url, parsed.target),
            "https://a.io/api/v1/schemas/200"
        );
    }

    #[test]
    fn references_scan_nested_values_but_not_own_url() {
        let content = map(json!({
            "id": 100,
            "url": format!("{SRC}/queues/100"),
            "schema": format!("{SRC}/schemas/200"),
            "hooks": [format!("{SRC}/hooks/300"), format!("{SRC}/hooks/301")],
            "settings": {"inbox": format!("{SRC}/inboxes/5")},
            "owner": format!("{SRC}/users/1")
        }));
        assert_eq!(
            references(&content),
            vec![
                ObjectRef::new(ObjectType::Schema, 200),
                ObjectRef::new(ObjectType::Hook, 300),
                ObjectRef::new(ObjectType::Hook, 301),
                ObjectRef::new(ObjectType::Inbox, 5),
            ]
        );
    }

    #[test]
    fn rewrite_only_touches_mapped_references() {
        let mut mapping = IdMapping::new("src", "tgt");
        mapping.put(ObjectType::Schema, 200, 9200).unwrap();
        let content = map(json!({
            "schema": format!("{SRC}/schemas/200"),
            "hooks": [format!("{SRC}/hooks/300")],
            "token_owner": format!("{SRC}/users/1"),
            "name": "Invoices"
        }));

        let rewritten = rewrite_references(&content, &mapping, TGT);
        assert_eq!(rewritten["schema"], json!(format!("{TGT}/schemas/9200")));
        assert_eq!(rewritten["hooks"], json!([format!("{SRC}/hooks/300")]));
        assert_eq!(rewritten["token_owner"], json!(format!("{SRC}/users/1")));
        assert_eq!(rewritten["name"], json!("Invoices"));
    }

    #[test]
    fn retain_drops_array_items_and_nulls_scalars() {
        let content = map(json!({
            "queue": format!("{SRC}/queues/1"),
            "queues": [format!("{SRC}/queues/1"), format!("{SRC}/queues/2")]
        }));
        let kept = retain_references(&content, |r| r.id == 2);
        assert_eq!(kept["queue"], Value::Null);
        assert_eq!(kept["queues"], json!([format!("{SRC}/queues/2")]));
    }

    #[test]
    fn retarget_points_drops_and_keeps() {
        let content = map(json!({
            "schema": format!("{SRC}/schemas/200"),
            "hooks": [format!("{SRC}/hooks/300"), format!("{SRC}/hooks/301")],
            "owner": format!("{SRC}/users/1")
        }));
        let moved = retarget_references(&content, TGT, |r| match r.object_type {
            ObjectType::Schema => Retarget::To(7),
            _ if r.id == 300 => Retarget::Drop,
            _ => Retarget::Keep,
        });
        assert_eq!(moved["schema"], json!(format!("{TGT}/schemas/7")));
        assert_eq!(moved["hooks"], json!([format!("{SRC}/hooks/301")]));
        assert_eq!(moved["owner"], json!(format!("{SRC}/users/1")));
    }

    #[test]
    fn normalization_aligns_two_tenants_through_mapping() {
        let mut mapping = IdMapping::new("src", "tgt");
        mapping.put(ObjectType::Schema, 200, 9200).unwrap();
        let source = map(json!({"schema": format!("{SRC}/schemas/200")}));
        let target = map(json!({"schema": format!("{TGT}/schemas/9200")}));

        assert_eq!(
            normalize_references(&source, Some(&mapping)),
            normalize_references(&target, None)
        );
        assert_eq!(
            normalize_references(&source, None)["schema"],
            json!("schemas/200")
        );
    }
}

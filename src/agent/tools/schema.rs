//! Parameter schema normalization for model function-calling.
//!
//! Tool servers may declare schema fields the model backend's function
//! format rejects (numeric bounds, string patterns, custom formats).
//! [`normalize_schema`] strips every field outside a small allow-list,
//! recursively, so the exported catalog is always accepted. This is lossy:
//! validation of the stripped constraints must happen inside the tool
//! server itself.

/// Schema keys preserved by normalization. Everything else is dropped.
const ALLOWED_KEYS: [&str; 6] = [
    "type",
    "properties",
    "required",
    "items",
    "enum",
    "description",
];

/// Strip unsupported fields from a parameter schema, recursively.
///
/// `properties` values and `items` are normalized in turn; `required` and
/// `enum` arrays pass through untouched. Non-object inputs are returned
/// as-is.
pub fn normalize_schema(schema: &serde_json::Value) -> serde_json::Value {
    let Some(obj) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = serde_json::Map::new();
    for key in ALLOWED_KEYS {
        let Some(value) = obj.get(key) else {
            continue;
        };
        let normalized = match key {
            "properties" => {
                let props = value.as_object().map(|props| {
                    props
                        .iter()
                        .map(|(name, sub)| (name.clone(), normalize_schema(sub)))
                        .collect::<serde_json::Map<_, _>>()
                });
                match props {
                    Some(p) => serde_json::Value::Object(p),
                    None => value.clone(),
                }
            }
            "items" => normalize_schema(value),
            _ => value.clone(),
        };
        out.insert(key.to_string(), normalized);
    }

    serde_json::Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passes_allow_listed_keys() {
        let schema = json!({
            "type": "object",
            "description": "Create a note",
            "properties": {
                "title": { "type": "string", "description": "Note title" }
            },
            "required": ["title"]
        });
        let normalized = normalize_schema(&schema);
        assert_eq!(normalized, schema);
    }

    #[test]
    fn strips_top_level_extras() {
        let schema = json!({
            "type": "object",
            "additionalProperties": false,
            "$schema": "http://json-schema.org/draft-07/schema#",
            "properties": {}
        });
        let normalized = normalize_schema(&schema);
        assert!(normalized.get("additionalProperties").is_none());
        assert!(normalized.get("$schema").is_none());
        assert_eq!(normalized["type"], "object");
    }

    #[test]
    fn strips_nested_constraints() {
        let schema = json!({
            "type": "object",
            "properties": {
                "count": { "type": "integer", "minimum": 1, "maximum": 50 },
                "email": { "type": "string", "format": "email", "pattern": ".+@.+" }
            }
        });
        let normalized = normalize_schema(&schema);
        assert_eq!(normalized["properties"]["count"], json!({"type": "integer"}));
        assert_eq!(normalized["properties"]["email"], json!({"type": "string"}));
    }

    #[test]
    fn normalizes_array_items_recursively() {
        let schema = json!({
            "type": "object",
            "properties": {
                "tags": {
                    "type": "array",
                    "minItems": 1,
                    "items": { "type": "string", "maxLength": 32 }
                }
            }
        });
        let normalized = normalize_schema(&schema);
        let tags = &normalized["properties"]["tags"];
        assert!(tags.get("minItems").is_none());
        assert_eq!(tags["items"], json!({"type": "string"}));
    }

    #[test]
    fn keeps_enum_values() {
        let schema = json!({
            "type": "string",
            "enum": ["asc", "desc"],
            "default": "asc"
        });
        let normalized = normalize_schema(&schema);
        assert_eq!(normalized["enum"], json!(["asc", "desc"]));
        assert!(normalized.get("default").is_none());
    }

    #[test]
    fn deeply_nested_objects() {
        let schema = json!({
            "type": "object",
            "properties": {
                "filter": {
                    "type": "object",
                    "additionalProperties": false,
                    "properties": {
                        "range": {
                            "type": "object",
                            "properties": {
                                "start": { "type": "string", "format": "date-time" }
                            }
                        }
                    }
                }
            }
        });
        let normalized = normalize_schema(&schema);
        let filter = &normalized["properties"]["filter"];
        assert!(filter.get("additionalProperties").is_none());
        assert_eq!(
            filter["properties"]["range"]["properties"]["start"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn non_object_input_passes_through() {
        let schema = json!("string");
        assert_eq!(normalize_schema(&schema), schema);
        assert_eq!(normalize_schema(&json!(null)), json!(null));
    }
}

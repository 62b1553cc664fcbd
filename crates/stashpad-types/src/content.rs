use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of body characters kept in a stash preview.
pub const DEFAULT_PREVIEW_LENGTH: usize = 100;

/// Appended to a preview when the body was cut.
pub const PREVIEW_ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    pub done: bool,
}

/// Build the preview for a stash body.
///
/// Bodies of at most `limit` characters are returned unchanged; longer ones
/// keep their first `limit` characters followed by [`PREVIEW_ELLIPSIS`].
/// Counts chars, not bytes, so multi-byte text is never split.
pub fn make_preview(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &body[..cut], PREVIEW_ELLIPSIS),
        None => body.to_string(),
    }
}

/// Normalise raw checklist items.
///
/// Objects contribute their `text` and `done` fields; any other value is taken
/// as the item text with `done = false`. Text is trimmed and items left empty
/// are dropped. `done` follows JSON truthiness. Order is preserved.
pub fn normalize_checklist(items: &[Value]) -> Vec<ChecklistItem> {
    items
        .iter()
        .filter_map(|item| {
            let (text, done) = match item {
                Value::Object(fields) => (
                    fields.get("text").map(value_text).unwrap_or_default(),
                    fields.get("done").is_some_and(truthy),
                ),
                other => (value_text(other), false),
            };
            let text = text.trim();
            (!text.is_empty()).then(|| ChecklistItem {
                text: text.to_string(),
                done,
            })
        })
        .collect()
}

/// Checklist from an optional JSON field; anything but an array is empty.
pub fn checklist_from_value(value: Option<&Value>) -> Vec<ChecklistItem> {
    match value {
        Some(Value::Array(items)) => normalize_checklist(items),
        _ => Vec::new(),
    }
}

/// Decode a stored checklist column. Unreadable data reads as empty.
pub fn parse_checklist(raw: Option<&str>) -> Vec<ChecklistItem> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => checklist_from_value(Some(&value)),
        Err(_) => Vec::new(),
    }
}

/// Re-normalise already typed items (drops blanks, trims text).
pub fn clean_checklist(items: &[ChecklistItem]) -> Vec<ChecklistItem> {
    items
        .iter()
        .filter_map(|item| {
            let text = item.text.trim();
            (!text.is_empty()).then(|| ChecklistItem {
                text: text.to_string(),
                done: item.done,
            })
        })
        .collect()
}

/// Lower-case, trimmed tag name, or `None` when blank.
pub fn normalize_tag_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_lowercase();
    (!name.is_empty()).then_some(name)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn short_body_is_its_own_preview() {
        assert_eq!(make_preview("hello", 5), "hello");
        assert_eq!(make_preview("", 10), "");
    }

    #[test]
    fn long_body_is_cut_with_ellipsis() {
        assert_eq!(make_preview("hello world", 5), "hello...");
    }

    #[test]
    fn preview_counts_characters() {
        let body = "ééééé€€";
        assert_eq!(make_preview(body, 5), "ééééé...");
        assert_eq!(make_preview(body, 7), body);
    }

    #[test]
    fn blank_items_are_dropped_and_order_kept() {
        let items = normalize_checklist(&[
            json!({"text": " ", "done": true}),
            json!({"text": "ok", "done": false}),
            json!({"text": "  second ", "done": 1}),
            json!("plain"),
            json!({"done": true}),
        ]);
        assert_eq!(
            items,
            vec![
                ChecklistItem { text: "ok".into(), done: false },
                ChecklistItem { text: "second".into(), done: true },
                ChecklistItem { text: "plain".into(), done: false },
            ]
        );
    }

    #[test]
    fn done_uses_json_truthiness() {
        let items = normalize_checklist(&[
            json!({"text": "a", "done": "yes"}),
            json!({"text": "b", "done": ""}),
            json!({"text": "c", "done": 0}),
            json!({"text": "d", "done": null}),
        ]);
        let done: Vec<bool> = items.iter().map(|i| i.done).collect();
        assert_eq!(done, vec![true, false, false, false]);
    }

    #[test]
    fn non_list_checklist_is_empty() {
        assert!(checklist_from_value(Some(&json!({"text": "x"}))).is_empty());
        assert!(checklist_from_value(Some(&json!("x"))).is_empty());
        assert!(checklist_from_value(None).is_empty());
    }

    #[test]
    fn stored_checklist_tolerates_garbage() {
        assert!(parse_checklist(Some("not json")).is_empty());
        assert!(parse_checklist(None).is_empty());
        assert_eq!(
            parse_checklist(Some(r#"[{"text":"x","done":true}]"#)),
            vec![ChecklistItem { text: "x".into(), done: true }]
        );
    }

    #[test]
    fn tag_names_are_lowercased() {
        assert_eq!(normalize_tag_name("  Rust "), Some("rust".to_string()));
        assert_eq!(normalize_tag_name("   "), None);
    }
}

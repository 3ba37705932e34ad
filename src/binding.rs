//! Data binding against a JSON data context.
//!
//! Paths use dots for object members and either dots or brackets for array
//! indices: `customer.name`, `lines[2].total`, `lines.2.total`. The empty
//! path and `.` refer to the context itself.
//!
//! Text binds with `{Path}` placeholders. A placeholder whose path does not
//! resolve is left in the text unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

/// The value a document is bound against.
pub type DataContext = Value;

/// Binding name for the 1-based page number.
pub const PAGE_NUMBER: &str = "PageNumber";
/// Binding name for the number of pages in the document.
pub const TOTAL_PAGES: &str = "TotalNumberOfPages";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("valid regex"));

/// Page numbering visible to page-level bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub page_number: usize,
    pub total_pages: usize,
}

/// Resolve `path` inside `context`.
pub fn resolve<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() || path == "." {
        return Some(context);
    }
    let mut current = context;
    for segment in path.split('.') {
        let (name, indices) = split_indices(segment)?;
        if !name.is_empty() {
            current = match current {
                Value::Object(map) => map.get(name)?,
                Value::Array(items) => items.get(name.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Split `name[1][2]` into `("name", [1, 2])`.
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let name = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse().ok()?);
        rest = &inner[close + 1..];
    }
    Some((name, indices))
}

/// Display text for a bound value. `null` renders as nothing.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truthiness used by conditional content.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

/// Replace every `{Path}` placeholder using `lookup`.
pub fn interpolate_with<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !text.contains('{') {
        return text.to_string();
    }
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let path = caps[1].trim();
            lookup(path).unwrap_or_else(|| {
                log::debug!("binding path '{path}' did not resolve");
                caps[0].to_string()
            })
        })
        .into_owned()
}

/// Replace `{Path}` placeholders with values from `context`.
pub fn interpolate(text: &str, context: &Value) -> String {
    interpolate_with(text, |path| resolve(context, path).map(value_to_text))
}

/// Like [`interpolate`], with the page-level bindings available as well.
pub fn interpolate_page(text: &str, context: &Value, page: PageInfo) -> String {
    interpolate_with(text, |path| match path {
        PAGE_NUMBER => Some(page.page_number.to_string()),
        TOTAL_PAGES => Some(page.total_pages.to_string()),
        _ => resolve(context, path).map(value_to_text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_members_and_indices() {
        let ctx = json!({"a": {"b": [10, {"c": "x"}]}});
        assert_eq!(resolve(&ctx, "a.b[0]"), Some(&json!(10)));
        assert_eq!(resolve(&ctx, "a.b.1.c"), Some(&json!("x")));
        assert_eq!(resolve(&ctx, "a.b[1].c"), Some(&json!("x")));
        assert_eq!(resolve(&ctx, ""), Some(&ctx));
        assert_eq!(resolve(&ctx, "a.missing"), None);
        assert_eq!(resolve(&ctx, "a.b[9]"), None);
        assert_eq!(resolve(&ctx, "a.b[x]"), None);
    }

    #[test]
    fn interpolation_leaves_unknown_placeholders() {
        let ctx = json!({"name": "Ada", "count": 3, "none": null});
        assert_eq!(
            interpolate("{name} has {count} items{none} {unknown}", &ctx),
            "Ada has 3 items {unknown}"
        );
        assert_eq!(interpolate("no placeholders", &ctx), "no placeholders");
    }

    #[test]
    fn page_bindings_take_precedence() {
        let ctx = json!({"PageNumber": "shadowed", "title": "Report"});
        let info = PageInfo {
            page_number: 2,
            total_pages: 5,
        };
        assert_eq!(
            interpolate_page("{title}: {PageNumber}/{TotalNumberOfPages}", &ctx, info),
            "Report: 2/5"
        );
    }

    #[test]
    fn truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(null))));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!([]))));
        assert!(is_truthy(Some(&json!(true))));
        assert!(is_truthy(Some(&json!({}))));
        assert!(is_truthy(Some(&json!("x"))));
    }
}

//! Seams to the external query evaluators.
//!
//! Structured lookups go through the `jmespath` crate; HTML selection goes
//! through `scraper`. Both are kept behind small functions so the rest of
//! the crate never touches evaluator types directly.

use crate::error::{Error, Result};
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Map, Value};

/// Evaluate a query expression against a JSON value. A miss is `Null`,
/// never an error; only a bad expression or unserializable input fails.
pub fn search(data: &Value, expr: &str) -> Result<Value> {
    let compiled = jmespath::compile(expr).map_err(|e| Error::Query {
        expr: expr.to_string(),
        message: e.to_string(),
    })?;
    let input = jmespath::Variable::from_json(&data.to_string()).map_err(|message| {
        Error::Query {
            expr: expr.to_string(),
            message,
        }
    })?;
    let found = compiled.search(input).map_err(|e| Error::Query {
        expr: expr.to_string(),
        message: e.to_string(),
    })?;
    serde_json::to_value(found.as_ref()).map_err(|e| Error::Query {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// Run a CSS selector over a raw HTML document and serialize the matched
/// elements into JSON objects for subsequent query evaluation.
///
/// Each element becomes `{tag, text, html, attrs}`.
pub fn select_html(document: &str, selector: &str) -> Result<Value> {
    let selector =
        Selector::parse(selector).map_err(|e| Error::Selector(format!("{selector}: {e:?}")))?;
    let document = Html::parse_document(document);
    let nodes: Vec<Value> = document.select(&selector).map(element_to_value).collect();
    Ok(Value::Array(nodes))
}

fn element_to_value(element: ElementRef<'_>) -> Value {
    let attrs: Map<String, Value> = element
        .value()
        .attrs()
        .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
        .collect();
    json!({
        "tag": element.value().name(),
        "text": element.text().collect::<String>(),
        "html": element.inner_html(),
        "attrs": attrs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_scalar() {
        let data = json!({ "state": { "current": 0 } });
        assert_eq!(search(&data, "state.current").unwrap(), json!(0));
    }

    #[test]
    fn test_search_projection() {
        let data = json!({ "items": [ { "id": 1 }, { "id": 2 } ] });
        assert_eq!(search(&data, "items[*].id").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_search_miss_is_null() {
        let data = json!({ "a": 1 });
        assert_eq!(search(&data, "b").unwrap(), Value::Null);
        assert_eq!(search(&Value::Null, "anything").unwrap(), Value::Null);
    }

    #[test]
    fn test_search_bad_expression() {
        let err = search(&json!({}), "[invalid").unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[test]
    fn test_select_html_text_and_attrs() {
        let html = r#"<ul><li class="x" data-id="7">Alpha</li><li>Beta</li></ul>"#;
        let nodes = select_html(html, "li").unwrap();
        assert_eq!(search(&nodes, "[*].text").unwrap(), json!(["Alpha", "Beta"]));
        assert_eq!(
            search(&nodes, "[0].attrs.\"data-id\"").unwrap(),
            json!("7")
        );
    }

    #[test]
    fn test_select_html_bad_selector() {
        let err = select_html("<p></p>", ":::nope").unwrap_err();
        assert!(matches!(err, Error::Selector(_)));
    }
}

//! Fan-out of rendered templates into single-valued variants.
//!
//! A rendered tree may hold parallel arrays at the paths its directives
//! flagged. Expansion zips those arrays: variant *i* takes element *i*
//! from every flagged array. The variant count is the maximum length
//! across all flagged arrays, computed before any element is taken;
//! shorter arrays are padded by repeating their last element, and arrays
//! of length <= 1 act as constants.

use crate::directive::Rendered;
use crate::tree::{self, Path};
use serde_json::Value;

/// Expand a rendered tree into its variants. With no flagged paths the
/// output is exactly one variant, identical to the input.
pub fn expand(rendered: &Rendered) -> Vec<Value> {
    let base = &rendered.value;

    // Only flagged paths that actually rendered to arrays participate.
    let columns: Vec<(&Path, &Vec<Value>)> = rendered
        .flagged
        .iter()
        .filter_map(|path| match tree::get_path(base, path) {
            Some(Value::Array(items)) => Some((path, items)),
            _ => None,
        })
        .collect();

    let max_len = columns
        .iter()
        .map(|(_, items)| items.len())
        .max()
        .unwrap_or(0)
        .max(1);

    let mut variants = Vec::with_capacity(max_len);
    for i in 0..max_len {
        let mut variant = base.clone();
        for (path, items) in &columns {
            let item = match items.len() {
                // An empty array has nothing to contribute; leave it.
                0 => continue,
                1 => items[0].clone(),
                len => items[i.min(len - 1)].clone(),
            };
            tree::set_path(&mut variant, path, item);
        }
        variants.push(variant);
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rendered(value: Value, flagged: &[&str]) -> Rendered {
        // Build key-only paths; index segments are covered in tree tests.
        let flagged = flagged
            .iter()
            .map(|key| {
                key.split('.')
                    .fold(Path::root(), |path, segment| path.child_key(segment))
            })
            .collect();
        Rendered { value, flagged }
    }

    #[test]
    fn test_no_flags_yields_single_variant() {
        let input = json!({ "a": [1, 2, 3], "b": "x" });
        let variants = expand(&rendered(input.clone(), &[]));
        assert_eq!(variants, vec![input]);
    }

    #[test]
    fn test_zip_equal_lengths() {
        let input = json!({ "p1": [1, 2], "p2": ["a", "b"] });
        let variants = expand(&rendered(input, &["p1", "p2"]));
        assert_eq!(
            variants,
            vec![json!({ "p1": 1, "p2": "a" }), json!({ "p1": 2, "p2": "b" })]
        );
    }

    #[test]
    fn test_shorter_array_pads_with_last_element() {
        let input = json!({ "long": [1, 2, 3], "short": ["a", "b"] });
        let variants = expand(&rendered(input, &["long", "short"]));
        assert_eq!(
            variants,
            vec![
                json!({ "long": 1, "short": "a" }),
                json!({ "long": 2, "short": "b" }),
                json!({ "long": 3, "short": "b" }),
            ]
        );
    }

    #[test]
    fn test_single_element_array_is_constant() {
        let input = json!({ "many": [1, 2], "one": ["k"] });
        let variants = expand(&rendered(input, &["many", "one"]));
        assert_eq!(
            variants,
            vec![json!({ "many": 1, "one": "k" }), json!({ "many": 2, "one": "k" })]
        );
    }

    #[test]
    fn test_scalar_at_flagged_path_is_left_alone() {
        // A path can be flagged even when rendering produced one value
        // that stayed scalar; it must not break expansion.
        let input = json!({ "a": "only", "b": [1, 2] });
        let variants = expand(&rendered(input, &["a", "b"]));
        assert_eq!(
            variants,
            vec![json!({ "a": "only", "b": 1 }), json!({ "a": "only", "b": 2 })]
        );
    }

    #[test]
    fn test_nested_flagged_path() {
        let input = json!({ "params": { "id": ["x", "y"] }, "url": "u" });
        let variants = expand(&rendered(input, &["params.id"]));
        assert_eq!(
            variants,
            vec![
                json!({ "params": { "id": "x" }, "url": "u" }),
                json!({ "params": { "id": "y" }, "url": "u" }),
            ]
        );
    }

    #[test]
    fn test_empty_array_stays_in_every_variant() {
        let input = json!({ "empty": [], "b": [1, 2] });
        let variants = expand(&rendered(input, &["empty", "b"]));
        assert_eq!(
            variants,
            vec![json!({ "empty": [], "b": 1 }), json!({ "empty": [], "b": 2 })]
        );
    }
}

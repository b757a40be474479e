//! Deep traversal over JSON trees with structured paths.
//!
//! `walk` descends maps by key and sequences by index, applies a transform
//! to every non-container leaf, and rebuilds an isomorphic tree with fresh
//! containers. Paths are kept structured internally and rendered to the
//! query-evaluator's `key.key[0].key` syntax only at the call boundary, so
//! keys containing dots or brackets stay unambiguous.

use serde_json::{Map, Value};
use std::fmt;

/// One path segment: a map key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A structured path from the root of a tree to one of its nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(Vec<Segment>);

impl Path {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// A new path extended by a map key.
    pub fn child_key(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.to_string()));
        Self(segments)
    }

    /// A new path extended by a sequence index.
    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }
}

impl fmt::Display for Path {
    /// Renders as `key.key[0].key` — dot before a map key, bracket index
    /// after a sequence element.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Walk a tree, applying `transform` to every non-container leaf, and
/// rebuild an isomorphic tree. The input containers are never mutated;
/// under the identity transform this is a deep clone.
pub fn walk<F>(value: &Value, transform: &mut F) -> crate::Result<Value>
where
    F: FnMut(&Value, &Path) -> crate::Result<Value>,
{
    walk_at(value, transform, &Path::root())
}

fn walk_at<F>(value: &Value, transform: &mut F, path: &Path) -> crate::Result<Value>
where
    F: FnMut(&Value, &Path) -> crate::Result<Value>,
{
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), walk_at(item, transform, &path.child_key(key))?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                out.push(walk_at(item, transform, &path.child_index(index))?);
            }
            Ok(Value::Array(out))
        }
        leaf => transform(leaf, path),
    }
}

/// Read the node at `path`, or `None` if any segment is missing.
pub fn get_path<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut node = value;
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => node.get(key)?,
            Segment::Index(index) => node.get(index)?,
        };
    }
    Some(node)
}

/// Overwrite the node at `path`. Returns false if the path does not exist;
/// no intermediate containers are created.
pub fn set_path(value: &mut Value, path: &Path, new: Value) -> bool {
    let mut node = value;
    for segment in path.segments() {
        node = match segment {
            Segment::Key(key) => match node.get_mut(key) {
                Some(next) => next,
                None => return false,
            },
            Segment::Index(index) => match node.get_mut(index) {
                Some(next) => next,
                None => return false,
            },
        };
    }
    *node = new;
    true
}

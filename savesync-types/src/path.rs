//! Field paths into a payload tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A path identifying one node of a payload, e.g. `progress.highScore`.
///
/// A path is a list of object keys, so keys that contain dots or are empty
/// stay distinct. The dotted text form escapes `.` and `\` inside a key
/// with a backslash (`keybind\.jump`). On the wire a path is the JSON array
/// of its keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parses the dotted text form. The empty string is the root path.
    pub fn new(dotted: impl AsRef<str>) -> Self {
        let dotted = dotted.as_ref();
        if dotted.is_empty() {
            return Self::root_path();
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = dotted.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => current.push(chars.next().unwrap_or('\\')),
                '.' => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        Self(segments)
    }

    /// The empty path, addressing the payload itself.
    #[must_use]
    pub fn root_path() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from raw keys, taken verbatim.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns the path extended by one key.
    #[must_use]
    pub fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }

    /// Returns the raw keys.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the first key (the sub-document name).
    #[must_use]
    pub fn root(&self) -> Option<&str> {
        self.segments().next()
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            for c in segment.chars() {
                if c == '.' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Looks up the node at `path`, walking nested objects. The root path
/// addresses no single node and yields `None`.
pub fn get_path<'a>(root: &'a Map<String, Value>, path: &FieldPath) -> Option<&'a Value> {
    let mut segments = path.segments();
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at `path`, creating (or replacing non-object) intermediate
/// nodes as needed. The root path is a no-op.
pub fn set_path(root: &mut Map<String, Value>, path: &FieldPath, value: Value) {
    let Some((last, parents)) = path.0.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let node = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(map) => current = map,
            _ => return,
        }
    }
    current.insert(last.clone(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_of_root_is_key() {
        assert_eq!(FieldPath::root_path().child("progress").to_string(), "progress");
        assert_eq!(
            FieldPath::new("progress").child("highScore").to_string(),
            "progress.highScore"
        );
    }

    #[test]
    fn dotted_form_escapes_keys() {
        let path = FieldPath::new("settings").child("keybind.jump");
        assert_eq!(path.to_string(), r"settings.keybind\.jump");
        assert_eq!(FieldPath::new(path.to_string()), path);

        let odd = FieldPath::from_segments(["a\\b", "", "c"]);
        assert_eq!(FieldPath::new(odd.to_string()), odd);
    }

    #[test]
    fn trailing_dot_is_an_empty_key() {
        let path = FieldPath::new("settings.");
        assert_eq!(path.segments().collect::<Vec<_>>(), vec!["settings", ""]);
        assert_ne!(path, FieldPath::new("settings"));
    }

    #[test]
    fn set_path_replaces_scalar_parent() {
        let mut root = json!({"settings": 3}).as_object().cloned().unwrap();
        set_path(&mut root, &"settings.volume".into(), json!(0.5));
        assert_eq!(root["settings"], json!({"volume": 0.5}));
    }

    #[test]
    fn set_path_writes_dotted_key_in_place() {
        let mut root = json!({"settings": {"keybind.jump": "space"}})
            .as_object()
            .cloned()
            .unwrap();
        let path = FieldPath::from_segments(["settings", "keybind.jump"]);
        set_path(&mut root, &path, json!("w"));
        assert_eq!(root["settings"], json!({"keybind.jump": "w"}));
        assert_eq!(get_path(&root, &path), Some(&json!("w")));
    }

    #[test]
    fn serializes_as_key_list() {
        let path = FieldPath::from_segments(["settings", ""]);
        assert_eq!(serde_json::to_value(&path).unwrap(), json!(["settings", ""]));
        let back: FieldPath = serde_json::from_value(json!(["settings", ""])).unwrap();
        assert_eq!(back, path);
    }
}

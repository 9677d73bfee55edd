//! Hierarchical string configuration tree.
//!
//! A node has a name, an optional explicit value, an optional default value,
//! and an ordered list of children whose names are unique among siblings.
//! The root's name is always empty. Paths address descendants with `.` as
//! the separator; a literal `.` in a name is written `\.`.

use std::fmt::Write as _;

/// One node of the tree. Cheap to clone; intended to be built once at
/// startup and then read from many threads behind an `Arc` if needed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    name: String,
    value: Option<String>,
    default_value: Option<String>,
    children: Vec<Properties>,
}

fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                current.push('.');
                chars.next();
            }
            '.' => {
                segments.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    segments.push(current);
    segments.into_iter().filter(|s| !s.is_empty()).collect()
}

fn escape_segment(segment: &str) -> String {
    segment.replace('.', "\\.")
}

impl Properties {
    /// A fresh, unnamed root node.
    pub fn new_root() -> Self {
        Properties::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Properties {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Properties] {
        &self.children
    }

    fn find_node(&self, path: &str) -> Option<&Properties> {
        let segments = split_path(path);
        let mut node = self;
        for segment in &segments {
            node = node.children.iter().find(|c| c.name == *segment)?;
        }
        Some(node)
    }

    fn find_or_create_node(&mut self, path: &str) -> &mut Properties {
        let segments = split_path(path);
        let mut node = self;
        for segment in &segments {
            let idx = match node.children.iter().position(|c| c.name == *segment) {
                Some(idx) => idx,
                None => {
                    node.children.push(Properties::named(segment.clone()));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }
        node
    }

    /// Resolve `path` following the fallback chain: explicit value on the
    /// node itself, then its default value, then the nearest existing
    /// ancestor's default value, then empty.
    pub fn get(&self, path: &str) -> String {
        if let Some(node) = self.find_node(path) {
            if let Some(v) = &node.value {
                return v.clone();
            }
            if let Some(d) = &node.default_value {
                return d.clone();
            }
        }
        let segments = split_path(path);
        for depth in (0..segments.len()).rev() {
            let ancestor_path = segments[..depth].join(".");
            if let Some(node) = self.find_node(&ancestor_path) {
                if let Some(d) = &node.default_value {
                    return d.clone();
                }
            }
        }
        String::new()
    }

    /// Set the explicit value at `path`, creating intermediate nodes as
    /// needed.
    pub fn set(&mut self, path: &str, value: impl Into<String>) {
        self.find_or_create_node(path).value = Some(value.into());
    }

    /// Set the default value at `path`, creating intermediate nodes as
    /// needed.
    pub fn set_default(&mut self, path: &str, value: impl Into<String>) {
        self.find_or_create_node(path).default_value = Some(value.into());
    }

    pub fn has(&self, path: &str) -> bool {
        self.find_node(path).is_some()
    }

    /// Recursively overlay `other` onto `self`. Existing children keep their
    /// position; children only present in `other` are appended in `other`'s
    /// order.
    pub fn merge(&mut self, other: &Properties) {
        if let Some(v) = &other.value {
            self.value = Some(v.clone());
        }
        if let Some(d) = &other.default_value {
            self.default_value = Some(d.clone());
        }
        for other_child in &other.children {
            match self.children.iter_mut().find(|c| c.name == other_child.name) {
                Some(existing) => existing.merge(other_child),
                None => self.children.push(other_child.clone()),
            }
        }
    }

    /// Depth-first enumeration of every leaf-bearing path and its resolved
    /// value (root excluded from the path).
    pub fn leaves(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.collect_leaves(String::new(), &mut out);
        out
    }

    fn collect_leaves(&self, prefix: String, out: &mut Vec<(String, String)>) {
        if !prefix.is_empty() {
            if let Some(v) = &self.value {
                out.push((prefix.clone(), v.clone()));
            } else if let Some(d) = &self.default_value {
                out.push((prefix.clone(), d.clone()));
            }
        }
        for child in &self.children {
            let child_prefix = if prefix.is_empty() {
                escape_segment(&child.name)
            } else {
                format!("{prefix}.{}", escape_segment(&child.name))
            };
            child.collect_leaves(child_prefix, out);
        }
    }

    /// Parse the `key.path = value` grammar: `#` starts a line comment, a
    /// trailing `\` continues the value onto the next line, blank lines are
    /// ignored separators. Always produces a fresh root.
    pub fn load(text: &str) -> Properties {
        let mut root = Properties::new_root();
        let mut pending: Option<(String, String)> = None;

        for raw_line in text.lines() {
            if let Some((key, mut acc)) = pending.take() {
                acc.push_str(raw_line.trim_start());
                if acc.ends_with('\\') {
                    acc.pop();
                    pending = Some((key, acc));
                } else {
                    root.set(&key, acc);
                }
                continue;
            }

            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let Some(eq_idx) = trimmed.find('=') else {
                continue;
            };
            let key = trimmed[..eq_idx].trim().to_string();
            let mut value = trimmed[eq_idx + 1..].trim().to_string();
            if value.ends_with('\\') {
                value.pop();
                pending = Some((key, value));
            } else {
                root.set(&key, value);
            }
        }
        if let Some((key, value)) = pending {
            root.set(&key, value);
        }
        root
    }

    /// Serialize in the same grammar `load` accepts. `save(load(text))`
    /// round-trips modulo line ordering and whitespace.
    pub fn save(&self) -> String {
        let mut out = String::new();
        for (path, value) in self.leaves() {
            let _ = writeln!(out, "{path} = {value}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn get_after_set_round_trips() {
        let mut p = Properties::new_root();
        p.set("a.b.c", "42");
        assert_eq!(p.get("a.b.c"), "42");
    }

    #[test]
    fn get_falls_back_to_default_then_ancestor_default() {
        let mut p = Properties::new_root();
        p.set_default("a", "ancestor-default");
        p.set_default("a.b", "node-default");
        assert_eq!(p.get("a.b"), "node-default");
        assert_eq!(p.get("a.missing"), "ancestor-default");
        assert_eq!(p.get("missing.entirely"), "");
    }

    #[test]
    fn set_creates_intermediate_nodes() {
        let mut p = Properties::new_root();
        p.set("x.y.z", "1");
        assert!(p.has("x"));
        assert!(p.has("x.y"));
        assert!(p.has("x.y.z"));
    }

    #[test]
    fn merge_is_identity_with_empty_other() {
        let mut p = Properties::new_root();
        p.set("a.b", "1");
        p.set("a.c", "2");
        let before = p.clone();
        p.merge(&Properties::new_root());
        assert_eq!(p, before);
    }

    #[test]
    fn merge_overwrites_overlapping_paths_and_appends_new_siblings() {
        let mut base = Properties::new_root();
        base.set("a", "1");
        base.set("b", "2");

        let mut overlay = Properties::new_root();
        overlay.set("b", "20");
        overlay.set("c", "3");

        base.merge(&overlay);
        assert_eq!(base.get("a"), "1");
        assert_eq!(base.get("b"), "20");
        assert_eq!(base.get("c"), "3");
    }

    #[test]
    fn escaped_dot_is_a_single_path_segment() {
        let mut p = Properties::new_root();
        p.set("a\\.b.c", "v");
        assert_eq!(p.children().len(), 1);
        assert_eq!(p.children()[0].name(), "a.b");
    }

    #[test]
    fn load_parses_comments_and_continuations() {
        let text = "# a comment\nfoo.bar = hello \\\nworld\nbaz = 1\n";
        let p = Properties::load(text);
        assert_eq!(p.get("foo.bar"), "hello world");
        assert_eq!(p.get("baz"), "1");
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut p = Properties::new_root();
        p.set("manager.modules.preload", "Echo");
        p.set("manager.components.preconnect", "a:b");
        p.set("logger.enable", "YES");
        let text = p.save();
        let reparsed = Properties::load(&text);
        for (path, value) in p.leaves() {
            assert_eq!(reparsed.get(&path), value);
        }
    }

    proptest! {
        #[test]
        fn get_set_round_trips_arbitrary_values(
            segments in proptest::collection::vec("[a-z]{1,6}", 1..4),
            value in "[a-zA-Z0-9_]{0,12}",
        ) {
            let path = segments.join(".");
            let mut p = Properties::new_root();
            p.set(&path, value.clone());
            prop_assert_eq!(p.get(&path), value);
        }
    }
}

//! GNS paths: hierarchical object identifiers.
//!
//! A GNS path is a `/`-separated string naming a file or directory, optionally
//! carrying a `gns://` scheme or a leading `/`. Its depth is the number of
//! non-empty segments, and its ancestor chain is the sequence of prefixes at
//! depth `1..=depth` (inclusive of the path itself).
//!
//! Parsing never fails. A malformed path (empty, or only separators) simply
//! has depth 0 and an empty ancestor chain.

use serde::{Deserialize, Serialize};
use std::fmt;

/// URI scheme used by canonical GNS paths.
pub const GNS_SCHEME: &str = "gns://";

/// Segment separator.
pub const SEPARATOR: char = '/';

/// A hierarchical object identifier.
///
/// The original text is kept verbatim because stores match on exact path
/// text; derived prefixes are rebuilt from the non-empty segments and keep
/// the original leading form (`gns://`, `/`, or nothing).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GnsPath(String);

impl GnsPath {
    /// Wrap a path string.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The namespace root (depth 0).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// The raw path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw path text.
    pub fn into_string(self) -> String {
        self.0
    }

    fn lead_and_rest(&self) -> (&str, &str) {
        if let Some(rest) = self.0.strip_prefix(GNS_SCHEME) {
            (GNS_SCHEME, rest)
        } else if self.0.starts_with(SEPARATOR) {
            ("/", &self.0[1..])
        } else {
            ("", self.0.as_str())
        }
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.lead_and_rest()
            .1
            .split(SEPARATOR)
            .filter(|s| !s.is_empty())
    }

    /// Number of non-empty segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The ancestor prefix at depth `d` (1-indexed, inclusive).
    ///
    /// Returns `None` for `d == 0` or `d > depth()`.
    pub fn prefix_at_depth(&self, d: usize) -> Option<GnsPath> {
        if d == 0 {
            return None;
        }
        let (lead, _) = self.lead_and_rest();
        let segments: Vec<&str> = self.segments().take(d).collect();
        if segments.len() < d {
            return None;
        }
        Some(GnsPath(format!("{}{}", lead, segments.join("/"))))
    }

    /// All ancestor prefixes from depth 1 up to and including this path.
    pub fn ancestors(&self) -> Vec<GnsPath> {
        let (lead, _) = self.lead_and_rest();
        let mut out = Vec::new();
        let mut acc = String::from(lead);
        for (i, segment) in self.segments().enumerate() {
            if i > 0 {
                acc.push(SEPARATOR);
            }
            acc.push_str(segment);
            out.push(GnsPath(acc.clone()));
        }
        out
    }

    /// The path with redundant separators removed.
    pub fn normalized(&self) -> GnsPath {
        match self.depth() {
            0 => GnsPath::root(),
            d => self.prefix_at_depth(d).unwrap_or_default(),
        }
    }

    /// Whether this is the namespace root (depth 0).
    pub fn is_root(&self) -> bool {
        self.depth() == 0
    }

    /// Whether this is a top-level container such as a document library.
    pub fn is_root_container(&self) -> bool {
        self.depth() == 1
    }

    /// The immediate parent, or `None` for the root and top-level containers.
    pub fn parent(&self) -> Option<GnsPath> {
        match self.depth() {
            0 | 1 => None,
            d => self.prefix_at_depth(d - 1),
        }
    }

    /// The text every strict descendant starts with (`path + "/"`).
    pub fn subtree_prefix(&self) -> String {
        format!("{}{}", self.0.trim_end_matches(SEPARATOR), SEPARATOR)
    }

    /// Whether `self` lies strictly below `ancestor`.
    ///
    /// Every path is a descendant of the root except the root itself.
    pub fn is_descendant_of(&self, ancestor: &GnsPath) -> bool {
        let depth = ancestor.depth();
        if depth >= self.depth() {
            return false;
        }
        if depth == 0 {
            return true;
        }
        self.prefix_at_depth(depth) == Some(ancestor.normalized())
    }
}

impl fmt::Debug for GnsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GnsPath({:?})", self.0)
    }
}

impl fmt::Display for GnsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GnsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for GnsPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GnsPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_depth() {
        assert_eq!(GnsPath::from("/A/B/C").depth(), 3);
        assert_eq!(GnsPath::from("gns://A/B").depth(), 2);
        assert_eq!(GnsPath::from("A").depth(), 1);
        assert_eq!(GnsPath::from("").depth(), 0);
        assert_eq!(GnsPath::from("///").depth(), 0);
        assert_eq!(GnsPath::from("/A//B/").depth(), 2);
    }

    #[test]
    fn test_prefix_at_depth_keeps_leading_form() {
        let p = GnsPath::from("/A/B/C");
        assert_eq!(p.prefix_at_depth(1), Some(GnsPath::from("/A")));
        assert_eq!(p.prefix_at_depth(2), Some(GnsPath::from("/A/B")));
        assert_eq!(p.prefix_at_depth(3), Some(GnsPath::from("/A/B/C")));
        assert_eq!(p.prefix_at_depth(0), None);
        assert_eq!(p.prefix_at_depth(4), None);

        let g = GnsPath::from("gns://X/Y");
        assert_eq!(g.prefix_at_depth(1), Some(GnsPath::from("gns://X")));
    }

    #[test]
    fn test_ancestors() {
        let chain = GnsPath::from("gns://A/B/C").ancestors();
        assert_eq!(
            chain,
            vec![
                GnsPath::from("gns://A"),
                GnsPath::from("gns://A/B"),
                GnsPath::from("gns://A/B/C"),
            ]
        );
        assert!(GnsPath::root().ancestors().is_empty());
    }

    #[test]
    fn test_root_and_container() {
        assert!(GnsPath::from("/").is_root());
        assert!(GnsPath::from("gns://").is_root());
        assert!(GnsPath::from("gns://LIB").is_root_container());
        assert!(!GnsPath::from("gns://LIB/doc").is_root_container());
    }

    #[test]
    fn test_parent() {
        assert_eq!(GnsPath::from("/A/B").parent(), Some(GnsPath::from("/A")));
        assert_eq!(GnsPath::from("/A").parent(), None);
        assert_eq!(GnsPath::root().parent(), None);
    }

    #[test]
    fn test_subtree_prefix() {
        assert_eq!(GnsPath::from("/A").subtree_prefix(), "/A/");
        assert_eq!(GnsPath::from("/A/").subtree_prefix(), "/A/");
    }

    #[test]
    fn test_is_descendant_of() {
        let a = GnsPath::from("/A");
        assert!(GnsPath::from("/A/B").is_descendant_of(&a));
        assert!(!GnsPath::from("/AB").is_descendant_of(&a));
        assert!(!a.is_descendant_of(&a));
        assert!(a.is_descendant_of(&GnsPath::root()));
    }

    #[test]
    fn test_serde_transparent() {
        let p = GnsPath::from("gns://A/B");
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"gns://A/B\"");
    }

    proptest! {
        #[test]
        fn ancestors_match_prefixes(segments in prop::collection::vec("[a-zA-Z0-9]{1,6}", 0..8)) {
            let p = GnsPath::new(format!("gns://{}", segments.join("/")));
            let chain = p.ancestors();
            prop_assert_eq!(chain.len(), p.depth());
            for (i, prefix) in chain.iter().enumerate() {
                prop_assert_eq!(Some(prefix.clone()), p.prefix_at_depth(i + 1));
                prop_assert_eq!(prefix.depth(), i + 1);
            }
        }
    }
}

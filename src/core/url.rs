//! URL type for type-safe scene addressing.
//!
//! - Internal representation: the string exactly as written or resolved
//! - Equality and hashing are byte-wise on that string; this is the identity
//!   used by the import map and the asset registry

use std::borrow::Borrow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A scene URL (scene document, texture, font, data source, or bundle).
///
/// Invariants:
/// - Never contains leading/trailing whitespace
/// - `resolve` output is absolute whenever the base is absolute
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneUrl(Arc<str>);

impl SceneUrl {
    /// Create from a string as written in a scene document.
    pub fn new(s: impl AsRef<str>) -> Self {
        Self(Arc::from(s.as_ref().trim()))
    }

    /// The empty URL. Used as the "no base" marker for root assets.
    pub fn empty() -> Self {
        Self(Arc::from(""))
    }

    /// Get the URL as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the URL is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Extract the scheme, if the URL has one.
    ///
    /// `http://host/a` -> `Some("http")`, `scenes/a.yaml` -> `None`
    pub fn scheme(&self) -> Option<&str> {
        let s: &str = &self.0;
        let colon = s.find(':')?;
        let candidate = &s[..colon];
        if candidate.is_empty() || candidate.contains(['/', '?', '#']) {
            return None;
        }
        let mut chars = candidate.chars();
        if !chars.next()?.is_ascii_alphabetic() {
            return None;
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            Some(candidate)
        } else {
            None
        }
    }

    /// Check if the URL carries a scheme.
    #[inline]
    pub fn has_scheme(&self) -> bool {
        self.scheme().is_some()
    }

    /// Check if the URL is absolute (has a scheme or is rooted at `/`).
    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.has_scheme() || self.0.starts_with('/')
    }

    /// Check if the URL scheme is `http` or `https`.
    pub fn has_http_scheme(&self) -> bool {
        self.scheme().is_some_and(|s| {
            s.eq_ignore_ascii_case("http") || s.eq_ignore_ascii_case("https")
        })
    }

    /// Check if the URL points at a zip bundle.
    #[inline]
    pub fn has_zip_extension(&self) -> bool {
        self.0.ends_with(".zip")
    }

    /// Resolve this URL against a base URL.
    ///
    /// Standard relative-reference resolution: an absolute URL resolves to
    /// itself; otherwise the reference is merged with the base and dot
    /// segments are removed.
    ///
    /// Examples:
    /// - `"b.yaml"` against `"http://host/scene/a.yaml"` -> `"http://host/scene/b.yaml"`
    /// - `"../x.yaml"` against `"/data/scenes/a.yaml"` -> `"/data/x.yaml"`
    pub fn resolve(&self, base: &SceneUrl) -> SceneUrl {
        if self.is_empty() {
            return base.clone();
        }
        if self.has_scheme() || base.is_empty() {
            return self.clone();
        }

        // Bases with a scheme go through the url crate, which handles
        // authority components and rooted references.
        if base.has_scheme() {
            if let Ok(parsed) = url::Url::parse(base.as_str()) {
                if let Ok(joined) = parsed.join(self.as_str()) {
                    return SceneUrl::new(joined.as_str());
                }
            }
        }

        // Scheme-less base: plain path merge.
        if self.0.starts_with('/') {
            return SceneUrl::new(remove_dot_segments(&self.0));
        }
        let base_dir = match base.as_str().rfind('/') {
            Some(idx) => &base.as_str()[..=idx],
            None => "",
        };
        SceneUrl::new(remove_dot_segments(&format!("{}{}", base_dir, self.0)))
    }

    /// Derive the in-bundle root document path for a `.zip` URL.
    ///
    /// `http://host/pkg.zip` -> `/pkg.yaml`. Returns `None` for non-bundle
    /// URLs.
    pub fn bundle_root_path(&self) -> Option<SceneUrl> {
        let stripped = self.0.strip_suffix(".zip")?;
        let stem = stripped.rsplit('/').next().unwrap_or(stripped);
        Some(SceneUrl::new(format!("/{stem}.yaml")))
    }

    /// Synthesize the URL under which a bundled root scene is keyed.
    ///
    /// The trailing `.zip` is replaced by the in-bundle root path:
    /// `http://host/pkg.zip` -> `http://host/pkg/pkg.yaml`.
    pub fn bundled_scene_url(&self) -> Option<SceneUrl> {
        let stripped = self.0.strip_suffix(".zip")?;
        let root = self.bundle_root_path()?;
        Some(SceneUrl::new(format!("{}{}", stripped, root.as_str())))
    }
}

/// Remove `.` and `..` segments from a path, preserving a leading slash.
fn remove_dot_segments(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            _ => segments.push(part),
        }
    }

    let joined = segments.join("/");
    if rooted {
        format!("/{joined}")
    } else {
        joined
    }
}

impl std::fmt::Display for SceneUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for SceneUrl {
    fn default() -> Self {
        Self::empty()
    }
}

impl AsRef<str> for SceneUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SceneUrl {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SceneUrl {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SceneUrl {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl PartialEq<str> for SceneUrl {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for SceneUrl {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl Serialize for SceneUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SceneUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme() {
        assert_eq!(SceneUrl::new("http://host/a.yaml").scheme(), Some("http"));
        assert_eq!(SceneUrl::new("file:///a.yaml").scheme(), Some("file"));
        assert_eq!(SceneUrl::new("scenes/a.yaml").scheme(), None);
        assert_eq!(SceneUrl::new("/scenes/a.yaml").scheme(), None);
        // A colon inside a path segment is not a scheme delimiter
        assert_eq!(SceneUrl::new("a/b:c.yaml").scheme(), None);
    }

    #[test]
    fn test_is_absolute() {
        assert!(SceneUrl::new("http://host/a.yaml").is_absolute());
        assert!(SceneUrl::new("/scenes/a.yaml").is_absolute());
        assert!(!SceneUrl::new("scenes/a.yaml").is_absolute());
        assert!(!SceneUrl::new("a.yaml").is_absolute());
    }

    #[test]
    fn test_has_http_scheme() {
        assert!(SceneUrl::new("http://host/a.yaml").has_http_scheme());
        assert!(SceneUrl::new("https://host/a.yaml").has_http_scheme());
        assert!(!SceneUrl::new("file:///a.yaml").has_http_scheme());
        assert!(!SceneUrl::new("/a.yaml").has_http_scheme());
    }

    #[test]
    fn test_resolve_relative_against_http_base() {
        let base = SceneUrl::new("http://host/scene/a.yaml");
        assert_eq!(
            SceneUrl::new("b.yaml").resolve(&base),
            "http://host/scene/b.yaml"
        );
        assert_eq!(
            SceneUrl::new("sub/c.yaml").resolve(&base),
            "http://host/scene/sub/c.yaml"
        );
        assert_eq!(
            SceneUrl::new("../d.yaml").resolve(&base),
            "http://host/d.yaml"
        );
    }

    #[test]
    fn test_resolve_rooted_against_http_base() {
        let base = SceneUrl::new("http://host/scene/a.yaml");
        assert_eq!(
            SceneUrl::new("/top.yaml").resolve(&base),
            "http://host/top.yaml"
        );
    }

    #[test]
    fn test_resolve_absolute_is_identity() {
        let base = SceneUrl::new("http://host/scene/a.yaml");
        assert_eq!(
            SceneUrl::new("http://other/x.yaml").resolve(&base),
            "http://other/x.yaml"
        );
    }

    #[test]
    fn test_resolve_against_path_base() {
        let base = SceneUrl::new("/data/scenes/a.yaml");
        assert_eq!(SceneUrl::new("b.yaml").resolve(&base), "/data/scenes/b.yaml");
        assert_eq!(SceneUrl::new("../x.yaml").resolve(&base), "/data/x.yaml");
        assert_eq!(SceneUrl::new("./y.yaml").resolve(&base), "/data/scenes/y.yaml");
    }

    #[test]
    fn test_resolve_against_relative_base() {
        let base = SceneUrl::new("scenes/a.yaml");
        assert_eq!(SceneUrl::new("b.yaml").resolve(&base), "scenes/b.yaml");
        assert_eq!(SceneUrl::new("../b.yaml").resolve(&base), "b.yaml");
    }

    #[test]
    fn test_resolve_empty_reference() {
        let base = SceneUrl::new("http://host/a.yaml");
        assert_eq!(SceneUrl::empty().resolve(&base), base);
    }

    #[test]
    fn test_resolve_against_empty_base() {
        assert_eq!(SceneUrl::new("a.yaml").resolve(&SceneUrl::empty()), "a.yaml");
    }

    #[test]
    fn test_resolve_idempotent_on_absolute() {
        let base = SceneUrl::new("http://host/scene/a.yaml");
        let once = SceneUrl::new("sub/p.png").resolve(&base);
        let twice = once.resolve(&base);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_bundle_root_path() {
        let url = SceneUrl::new("http://host/pkg.zip");
        assert_eq!(url.bundle_root_path().unwrap(), "/pkg.yaml");
        assert!(SceneUrl::new("http://host/a.yaml").bundle_root_path().is_none());
    }

    #[test]
    fn test_bundle_root_path_without_slash() {
        // An archive named without any directory component still derives
        // a rooted in-bundle path
        let url = SceneUrl::new("pkg.zip");
        assert_eq!(url.bundle_root_path().unwrap(), "/pkg.yaml");
    }

    #[test]
    fn test_bundled_scene_url() {
        let url = SceneUrl::new("http://host/pkg.zip");
        assert_eq!(url.bundled_scene_url().unwrap(), "http://host/pkg/pkg.yaml");
    }

    #[test]
    fn test_equality_and_hash() {
        use rustc_hash::FxHashSet;

        let mut set = FxHashSet::default();
        set.insert(SceneUrl::new("http://host/a.yaml"));
        set.insert(SceneUrl::new("http://host/a.yaml"));
        assert_eq!(set.len(), 1);
        assert!(set.contains("http://host/a.yaml"));
    }

    #[test]
    fn test_display() {
        let url = SceneUrl::new("http://host/a.yaml");
        assert_eq!(format!("{}", url), "http://host/a.yaml");
    }
}

//! Install-time asset manifest.

use crate::SwError;

/// The fixed, ordered set of root-relative paths cached at install time.
///
/// One member is the distinguished offline fallback page, served when both
/// the cache and the network fail for a request. Because the fallback is a
/// manifest member, a successful install always leaves it cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    paths: Vec<String>,
    fallback: String,
}

impl Manifest {
    /// Build a manifest from root-relative paths and the fallback page.
    ///
    /// Fails if any path does not start with `/`, if a path repeats, or if
    /// the fallback is not itself a manifest member.
    pub fn new<I, S>(paths: I, fallback: impl Into<String>) -> Result<Self, SwError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        let fallback = fallback.into();

        if paths.is_empty() {
            return Err(SwError::Manifest("manifest is empty".into()));
        }
        for path in &paths {
            if !path.starts_with('/') {
                return Err(SwError::Manifest(format!(
                    "path {path:?} is not root-relative"
                )));
            }
        }
        for (i, path) in paths.iter().enumerate() {
            if paths[..i].contains(path) {
                return Err(SwError::Manifest(format!("duplicate path {path:?}")));
            }
        }
        if !paths.contains(&fallback) {
            return Err(SwError::Manifest(format!(
                "fallback page {fallback:?} is not in the manifest"
            )));
        }

        Ok(Self { paths, fallback })
    }

    /// The manifest paths, in declaration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// The offline fallback page.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Check whether a path is a manifest member.
    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Number of manifest entries.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

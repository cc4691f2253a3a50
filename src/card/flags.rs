use std::path::{Path, PathBuf};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagShape {
    Square,
    /// Roughly 5:3.
    Wide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagAsset {
    pub path: PathBuf,
    pub shape: FlagShape,
}

/// Country name → flag image lookup.
pub trait FlagResolver: Sync {
    /// `None` when the country has no registered flag or its file is missing.
    fn resolve(&self, country: &str) -> Option<FlagAsset>;
}

/// Closed set of known flags, relative to the asset root.
const KNOWN_FLAGS: &[(&str, &str, FlagShape)] = &[
    ("Luxembourg", "flags/luxembourg.png", FlagShape::Wide),
    ("Ireland", "flags/ireland.png", FlagShape::Wide),
    ("UK", "flags/uk.png", FlagShape::Wide),
    ("Switzerland", "flags/switzerland.png", FlagShape::Square),
    ("European Union", "flags/european_union.png", FlagShape::Wide),
];

/// Flag table backed by image files under `root`.
pub struct FlagTable {
    root: PathBuf,
}

impl FlagTable {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FlagResolver for FlagTable {
    fn resolve(&self, country: &str) -> Option<FlagAsset> {
        let Some(&(_, rel, shape)) = KNOWN_FLAGS.iter().find(|(name, _, _)| *name == country) else {
            debug!("No flag registered for country '{}'", country);
            return None;
        };
        let path = self.root.join(rel);
        if !path.is_file() {
            debug!("No flag image found for country '{}' at '{}'", country, path.display());
            return None;
        }
        Some(FlagAsset { path, shape })
    }
}

/// Resolver that never finds a flag.
#[cfg(test)]
pub struct NoFlags;

#[cfg(test)]
impl FlagResolver for NoFlags {
    fn resolve(&self, _country: &str) -> Option<FlagAsset> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(files: &[&str]) -> (tempfile::TempDir, FlagTable) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("flags")).unwrap();
        for f in files {
            std::fs::write(dir.path().join("flags").join(f), b"png").unwrap();
        }
        let table = FlagTable::new(dir.path());
        (dir, table)
    }

    #[test]
    fn known_and_present() {
        let (_dir, table) = table_with(&["ireland.png", "switzerland.png"]);
        let ie = table.resolve("Ireland").unwrap();
        assert_eq!(ie.shape, FlagShape::Wide);
        assert!(ie.path.ends_with("flags/ireland.png"));
        assert_eq!(table.resolve("Switzerland").unwrap().shape, FlagShape::Square);
    }

    #[test]
    fn known_but_missing_file() {
        let (_dir, table) = table_with(&[]);
        assert!(table.resolve("UK").is_none());
    }

    #[test]
    fn unknown_country() {
        let (_dir, table) = table_with(&["uk.png"]);
        assert!(table.resolve("Testland").is_none());
        // Lookup is exact
        assert!(table.resolve("uk").is_none());
    }
}

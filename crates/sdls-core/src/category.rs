//! Document categories.
//!
//! A category is the relative path of one moddable data file with its
//! extension removed, e.g. `entities/qualities` or `constants/combatconstants`.
//! The last path segment names the category's mold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::DocumentShape;

/// One moddable document category.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Create a category from its relative path. Backslashes are normalized
    /// to forward slashes.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().replace('\\', "/"))
    }

    /// The relative path, e.g. `geography/Tiles`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.0
    }

    /// The mold name: the last path segment, e.g. `Tiles`.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Whether documents in this category are a single bare object.
    #[must_use]
    pub fn is_constants(&self) -> bool {
        self.0.contains("constants")
    }

    /// How documents of this category are framed on disk.
    #[must_use]
    pub fn shape(&self) -> DocumentShape {
        if self.is_constants() {
            DocumentShape::Constants
        } else {
            DocumentShape::Array
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_last_segment() {
        assert_eq!(Category::new("geography/Tiles").name(), "Tiles");
        assert_eq!(Category::new("qualities").name(), "qualities");
        assert_eq!(Category::new("entities\\events").name(), "events");
    }

    #[test]
    fn constants_detection() {
        assert!(Category::new("constants/combatconstants").is_constants());
        assert_eq!(
            Category::new("constants/x").shape(),
            DocumentShape::Constants
        );
        assert_eq!(
            Category::new("entities/qualities").shape(),
            DocumentShape::Array
        );
    }
}

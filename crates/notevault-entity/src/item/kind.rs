//! Item kind enum.

use serde::{Deserialize, Serialize};

/// The closed set of item kinds.
///
/// The kind determines whether the content and version fields are
/// meaningful: folders never carry a blob or a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ItemKind {
    /// A markdown/plain text document with versioned content.
    Document = 1,
    /// A folder grouping other items. No content, no version.
    Folder = 2,
    /// An opaque binary attachment. Has content but no text version.
    Binary = 3,
}

impl ItemKind {
    /// Whether items of this kind own a content blob.
    pub fn has_content(&self) -> bool {
        !matches!(self, Self::Folder)
    }

    /// Whether items of this kind carry a text content-hash version.
    pub fn is_versioned(&self) -> bool {
        matches!(self, Self::Document)
    }

    /// MIME type used when storing the item's blob.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Document => "text/markdown",
            Self::Folder => "inode/directory",
            Self::Binary => "application/octet-stream",
        }
    }

    /// Stable lowercase name, as exposed in listings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Folder => "folder",
            Self::Binary => "binary",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

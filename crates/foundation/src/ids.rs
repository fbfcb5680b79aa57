//! Unique identifiers for model entities
//!
//! Blocks, attributes and scenarios are identified by typed string
//! wrappers. These ensure type safety and consistent serialization.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A hierarchical path of dot-separated segments.
///
/// Attribute identities are qualified paths (e.g. "costs.material_cost"
/// is the attribute `material_cost` inside the block `costs`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path {
    /// Ordered segments of the hierarchical path.
    pub segments: Vec<String>,
}

impl Path {
    /// Creates a new Path from a list of segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Creates a new Path from a dot-separated string.
    pub fn from_path_str(s: &str) -> Self {
        Self {
            segments: s.split('.').map(String::from).collect(),
        }
    }

    /// Get the path segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Get the first segment (namespace or root).
    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// Get the last segment (leaf name).
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Append a segment to create a new path.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self::new(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Self::from_path_str(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Self::from_path_str(&s)
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Path);

        impl $name {
            /// Creates a new identifier from a path.
            pub fn new(p: impl Into<Path>) -> Self {
                Self(p.into())
            }

            /// Returns the identifier as a string.
            pub fn as_str(&self) -> String {
                self.0.to_string()
            }

            /// Returns a reference to the underlying path.
            pub fn path(&self) -> &Path {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(Path::from_path_str(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Path::from_path_str(&s))
            }
        }

        impl From<Path> for $name {
            fn from(p: Path) -> Self {
                Self(p)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a block (attribute namespace)
    BlockId
);

define_id!(
    /// Unique identifier for an attribute, qualified as `block.attribute`
    AttributeId
);

define_id!(
    /// Unique identifier for a scenario (named input-override set)
    ScenarioId
);

impl AttributeId {
    /// Qualify an attribute name under its block.
    pub fn qualified(block: &BlockId, name: &str) -> Self {
        Self(block.0.append(name))
    }

    /// The block this attribute belongs to, if the identity is qualified.
    pub fn block(&self) -> Option<BlockId> {
        if self.0.segments.len() < 2 {
            return None;
        }
        Some(BlockId(Path::new(
            self.0.segments[..self.0.segments.len() - 1].to_vec(),
        )))
    }
}

//! Queue keys: `namespace/name`, where the namespace of an addon is its cluster's name.

use std::fmt;

/// Identity of one addon instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddonKey {
    pub cluster: String,
    pub addon: String,
}

impl AddonKey {
    pub fn new(cluster: impl Into<String>, addon: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            addon: addon.into(),
        }
    }

    /// Split a `cluster/addon` key. A bare name is accepted with an empty
    /// cluster; anything else is malformed and yields `None`.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) if !name.is_empty() => Some(Self::new("", name)),
            (Some(cluster), Some(name), None) if !name.is_empty() => {
                Some(Self::new(cluster, name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AddonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cluster.is_empty() {
            write!(f, "{}", self.addon)
        } else {
            write!(f, "{}/{}", self.cluster, self.addon)
        }
    }
}

//! Version tags and the partition names derived from them.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Error;

/// Deployment generation identifier. Every partition name is suffixed with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, Error> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("version tag must not be empty".into()));
        }
        if trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(Error::InvalidInput(format!("version tag contains whitespace or '/': {tag:?}")));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for VersionTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionTag> for String {
    fn from(tag: VersionTag) -> Self {
        tag.0
    }
}

/// Resource class a partition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// App-shell resources enumerated at build time.
    Precache,
    /// Scripts, styles and other same-origin runtime resources.
    Assets,
    /// Images and fonts.
    Media,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [PartitionKind::Precache, PartitionKind::Assets, PartitionKind::Media];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Precache => "precache",
            Self::Assets => "assets",
            Self::Media => "media",
        }
    }

    /// Kind of a partition name such as `media-v61`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| {
            name.strip_prefix(kind.prefix()).and_then(|rest| rest.strip_prefix('-')).is_some_and(|tag| !tag.is_empty())
        })
    }
}

/// The three partition names of one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    pub precache: String,
    pub assets: String,
    pub media: String,
}

impl PartitionNames {
    pub fn for_version(tag: &VersionTag) -> Self {
        Self {
            precache: format!("{}-{tag}", PartitionKind::Precache.prefix()),
            assets: format!("{}-{tag}", PartitionKind::Assets.prefix()),
            media: format!("{}-{tag}", PartitionKind::Media.prefix()),
        }
    }

    pub fn get(&self, kind: PartitionKind) -> &str {
        match kind {
            PartitionKind::Precache => &self.precache,
            PartitionKind::Assets => &self.assets,
            PartitionKind::Media => &self.media,
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.precache, &self.assets, &self.media]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

//! Repository targets, the unit of work

use std::str::FromStr;

use serde::Deserialize;

/// One repository to harvest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Target {
    pub owner: String,
    #[serde(alias = "repo")]
    pub name: String,
}

impl Target {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`, as stored in every record's `project_name`
    pub fn project_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Filename stem shared by all of this target's shards
    pub fn shard_stem(&self) -> String {
        format!("{}_{}", self.owner, self.name)
    }

    /// Reject owners/names that would escape the API path or output dir
    pub fn validate(&self) -> Result<(), String> {
        if !valid_segment(&self.owner) {
            return Err(format!("invalid owner {:?}", self.owner));
        }
        if !valid_segment(&self.name) {
            return Err(format!("invalid repository name {:?}", self.name));
        }
        Ok(())
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Segment must be usable both in an API path and a filename
fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl FromStr for Target {
    type Err = String;

    /// Parse `owner/name`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("expected owner/name, got {s:?}"))?;
        let target = Self::new(owner, name);
        target.validate()?;
        Ok(target)
    }
}

//! Value types exchanged with the remote build server.

use std::fmt;

use serde::Deserialize;

use crate::backend::BuildId;

/// Name of the remote job backing one build.
///
/// Derived from the build id alone, which is what makes create-or-update
/// idempotent.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct JobName(String);

impl JobName {
    /// Builds the job name `<prefix><build_id>`.
    #[must_use]
    pub fn for_build(prefix: &str, build_id: &BuildId) -> Self {
        Self(format!("{prefix}{build_id}"))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a numbered build of a job.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub struct BuildRef {
    /// Sequential build number assigned by the server.
    pub number: u64,
}

/// Subset of the job status document the lifecycle relies on.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    /// Most recently started build, if any build ever ran.
    #[serde(default)]
    pub last_build: Option<BuildRef>,
    /// Most recently finished build.
    #[serde(default)]
    pub last_completed_build: Option<BuildRef>,
}

impl JobInfo {
    /// Returns the number of the most recent build.
    #[must_use]
    pub fn last_build_number(&self) -> Option<u64> {
        self.last_build.map(|build| build.number)
    }

    /// Reports whether build `number` (or a later one) has finished.
    #[must_use]
    pub fn has_completed(&self, number: u64) -> bool {
        self.last_completed_build
            .is_some_and(|build| build.number >= number)
    }
}

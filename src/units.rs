//! Typed identifiers for the work units of a batch run.

use std::fmt;
use std::str::FromStr;

/// Identifies one subject from the partition manifest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        SubjectId(value.to_string())
    }
}

/// One of the four resting-state acquisition conditions.
///
/// The `as_str`/`FromStr` pair round-trips the on-disk spelling used in
/// result and timeseries filenames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Run {
    Rest1Lr,
    Rest1Rl,
    Rest2Lr,
    Rest2Rl,
}

impl Run {
    /// All acquisition conditions, in the fixed enumeration order the
    /// runner iterates them in.
    pub const ALL: [Run; 4] = [Run::Rest1Lr, Run::Rest1Rl, Run::Rest2Lr, Run::Rest2Rl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Run::Rest1Lr => "REST1_LR",
            Run::Rest1Rl => "REST1_RL",
            Run::Rest2Lr => "REST2_LR",
            Run::Rest2Rl => "REST2_RL",
        }
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Run {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REST1_LR" => Ok(Run::Rest1Lr),
            "REST1_RL" => Ok(Run::Rest1Rl),
            "REST2_LR" => Ok(Run::Rest2Lr),
            "REST2_RL" => Ok(Run::Rest2Rl),
            other => Err(format!("unknown acquisition run name: {:?}", other)),
        }
    }
}

/// One (subject, acquisition run) pair to process.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubjectRun {
    pub subject: SubjectId,
    pub run: Run,
}

impl SubjectRun {
    pub fn new(subject: impl Into<String>, run: Run) -> Self {
        SubjectRun {
            subject: SubjectId(subject.into()),
            run,
        }
    }
}

impl fmt::Display for SubjectRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.subject, self.run)
    }
}

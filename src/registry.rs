//! Completed-output registry.
//!
//! Derived by listing the result directory once at startup and parsing each
//! filename into its (subject, run) unit. Used as a set membership check by
//! the completion filter.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::bundle::parse_bundle_file_name;
use crate::units::SubjectRun;
use crate::ThreadSafeStdError;

/// The set of units whose SVD bundle already exists.
#[derive(Clone, Debug, Default)]
pub struct CompletedRegistry {
    completed: HashSet<SubjectRun>,
}

impl CompletedRegistry {
    /// Scans the result directory. A missing directory is an empty
    /// registry; filenames that do not parse as bundles are ignored.
    pub fn scan(svd_dir: &Path) -> Result<Self, ThreadSafeStdError> {
        let mut completed = HashSet::new();
        if !svd_dir.exists() {
            return Ok(CompletedRegistry { completed });
        }
        let entries = fs::read_dir(svd_dir)
            .map_err(|e| format!("failed to list result directory {:?}: {}", svd_dir, e))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| format!("failed to read result directory entry: {}", e))?;
            if let Some(unit) = parse_bundle_file_name(&entry.file_name().to_string_lossy()) {
                completed.insert(unit);
            }
        }
        Ok(CompletedRegistry { completed })
    }

    pub fn contains(&self, unit: &SubjectRun) -> bool {
        self.completed.contains(unit)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

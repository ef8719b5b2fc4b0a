//! Partition manifest parsing and work-list resolution.
//!
//! The manifest assigns subjects to shards positionally: line N (1-indexed)
//! is the work assignment for shard N. Blank lines still occupy a shard
//! slot so the numbering stays aligned with the batch scheduler.

use std::fs;
use std::path::Path;

use crate::units::{Run, SubjectId, SubjectRun};
use crate::ThreadSafeStdError;

/// The parsed partition manifest: one subject list per shard.
#[derive(Clone, Debug)]
pub struct PartitionManifest {
    shards: Vec<Vec<SubjectId>>,
}

impl PartitionManifest {
    /// Reads and parses the manifest file. Each line is split on tabs;
    /// empty tokens (e.g. from doubled tabs) are dropped.
    pub fn load(path: &Path) -> Result<Self, ThreadSafeStdError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read partition manifest at {:?}: {}", path, e))?;
        Ok(Self::parse(&contents))
    }

    /// Parses manifest text. Split out of `load` so tests can feed strings.
    pub fn parse(contents: &str) -> Self {
        let shards = contents
            .lines()
            .map(|line| {
                line.trim()
                    .split('\t')
                    .filter(|token| !token.is_empty())
                    .map(SubjectId::from)
                    .collect()
            })
            .collect();
        PartitionManifest { shards }
    }

    /// Number of shards the manifest assigns work for.
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// The subjects assigned to a 1-indexed shard.
    pub fn shard_subjects(&self, shard_index: usize) -> Result<&[SubjectId], ThreadSafeStdError> {
        if shard_index == 0 {
            return Err("shard index must be a positive integer".into());
        }
        self.shards
            .get(shard_index - 1)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                format!(
                    "shard index {} exceeds the manifest's {} lines",
                    shard_index,
                    self.shards.len()
                )
                .into()
            })
    }

    /// Resolves the candidate unit list for a shard: the cross product of
    /// its subjects with `runs`, outer loop over subjects in manifest
    /// order, inner loop over runs in enumeration order.
    pub fn resolve_work_list(
        &self,
        shard_index: usize,
        runs: &[Run],
    ) -> Result<Vec<SubjectRun>, ThreadSafeStdError> {
        let subjects = self.shard_subjects(shard_index)?;
        Ok(subjects
            .iter()
            .flat_map(|subject| {
                runs.iter().map(move |&run| SubjectRun {
                    subject: subject.clone(),
                    run,
                })
            })
            .collect())
    }
}

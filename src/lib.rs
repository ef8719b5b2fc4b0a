// Sharded batch SVD of preprocessed dense timeseries matrices.

#![doc = include_str!("../README.md")]

pub mod bundle;
pub mod center;
pub mod config;
pub mod manifest;
pub mod registry;
pub mod runner;
pub mod svd;
pub mod timeseries;
pub mod units;

use std::error::Error;

/// A thread-safe wrapper for standard dynamic errors,
/// so they implement `Send` and `Sync`.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

pub use bundle::{bundle_file_name, parse_bundle_file_name, SvdBundle, SVD_ARTIFACT_SUFFIX};
pub use center::doubly_center;
pub use config::RunnerConfig;
pub use manifest::PartitionManifest;
pub use registry::CompletedRegistry;
pub use runner::{BatchSvdRunner, RunOptions, RunSummary};
pub use svd::{BlockedSvd, SvdFactors};
pub use timeseries::{DiskTimeseriesSource, FetchOptions, TimeseriesSource};
pub use units::{Run, SubjectId, SubjectRun};

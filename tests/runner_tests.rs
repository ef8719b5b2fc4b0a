// End-to-end tests of the batch loop against an on-disk fixture layout.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ndarray::{array, Array2, Axis};
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tempfile::TempDir;

use dtseries_svd::{
    bundle_file_name, doubly_center, BatchSvdRunner, FetchOptions, Run, RunOptions, RunSummary,
    RunnerConfig, SubjectRun, SvdBundle, ThreadSafeStdError, TimeseriesSource,
};

const RECONSTRUCTION_TOLERANCE: f64 = 1e-8;

/// Serves matrices from memory; anything absent behaves like a run that
/// does not exist for the subject.
struct InMemorySource {
    matrices: HashMap<SubjectRun, Array2<f64>>,
}

impl InMemorySource {
    fn new() -> Self {
        InMemorySource {
            matrices: HashMap::new(),
        }
    }

    fn insert(&mut self, unit: SubjectRun, matrix: Array2<f64>) {
        self.matrices.insert(unit, matrix);
    }
}

impl TimeseriesSource for InMemorySource {
    fn fetch(
        &self,
        unit: &SubjectRun,
        _options: &FetchOptions,
    ) -> Result<Array2<f64>, ThreadSafeStdError> {
        self.matrices
            .get(unit)
            .cloned()
            .ok_or_else(|| format!("no dense timeseries recorded for {}", unit).into())
    }
}

fn random_matrix(num_rows: usize, num_cols: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::random_using((num_rows, num_cols), Uniform::new(-1.0, 1.0), &mut rng)
}

/// A config rooted at the temp dir, with block extents small enough that
/// the fixtures exercise the blocked path.
fn test_config(data_root: &Path) -> RunnerConfig {
    let mut config = RunnerConfig::from_data_root(data_root);
    config.row_block_extent = 8;
    config.col_block_extent = 6;
    config
}

fn write_manifest(config: &RunnerConfig, contents: &str) {
    fs::write(&config.manifest_path, contents).unwrap();
}

/// A source holding one random matrix for every run of the given subjects.
fn source_covering(subjects: &[&str], seed_base: u64) -> InMemorySource {
    let mut source = InMemorySource::new();
    for (subject_idx, subject) in subjects.iter().enumerate() {
        for (run_idx, run) in Run::ALL.iter().enumerate() {
            let seed = seed_base + (subject_idx * Run::ALL.len() + run_idx) as u64;
            source.insert(SubjectRun::new(*subject, *run), random_matrix(20, 5, seed));
        }
    }
    source
}

#[test]
fn shard_with_existing_bundle_processes_the_rest_and_skips_it() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    // The scenario from the shard-resolution contract: the line at
    // 0-indexed position 2 holds subjects A and B, selected by shard 3.
    write_manifest(&config, "X\nY\nA\tB\n");

    fs::create_dir_all(&config.svd_dir).unwrap();
    let existing_unit = SubjectRun::new("A", Run::Rest1Lr);
    let existing_path = config.svd_dir.join(bundle_file_name(&existing_unit));
    SvdBundle {
        u: array![[1.0], [0.0]],
        s: array![1.0],
        vt: array![[1.0, 0.0]],
    }
    .save(&existing_path)
    .unwrap();
    let bytes_before = fs::read(&existing_path).unwrap();
    let modified_before = fs::metadata(&existing_path).unwrap().modified().unwrap();

    let source = source_covering(&["A", "B"], 100);
    let runner = BatchSvdRunner::new(&config, &source);
    let summary = runner.run(3, &RunOptions::default()).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 7,
            skipped: 1,
            fetch_failures: 0
        }
    );
    // The skipped bundle was not touched.
    assert_eq!(fs::read(&existing_path).unwrap(), bytes_before);
    assert_eq!(
        fs::metadata(&existing_path).unwrap().modified().unwrap(),
        modified_before
    );
    // Every other unit got a bundle.
    for subject in ["A", "B"] {
        for run in Run::ALL {
            let path = config.svd_dir.join(bundle_file_name(&SubjectRun::new(subject, run)));
            assert!(path.exists(), "missing bundle for {}-{}", subject, run);
        }
    }
}

#[test]
fn allow_recomputing_overwrites_the_existing_bundle() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_manifest(&config, "A\n");

    fs::create_dir_all(&config.svd_dir).unwrap();
    let unit = SubjectRun::new("A", Run::Rest1Lr);
    let bundle_path = config.svd_dir.join(bundle_file_name(&unit));
    SvdBundle {
        u: array![[1.0], [0.0]],
        s: array![1.0],
        vt: array![[1.0, 0.0]],
    }
    .save(&bundle_path)
    .unwrap();
    let bytes_before = fs::read(&bundle_path).unwrap();

    let source = source_covering(&["A"], 200);
    let runner = BatchSvdRunner::new(&config, &source);
    let options = RunOptions {
        allow_recomputing: true,
        ..RunOptions::default()
    };
    let summary = runner.run(1, &options).unwrap();

    assert_eq!(summary.processed, 4);
    assert_eq!(summary.skipped, 0);
    assert_ne!(fs::read(&bundle_path).unwrap(), bytes_before);
    // The overwritten bundle is a valid decomposition of the centered input.
    let bundle = SvdBundle::load(&bundle_path).unwrap();
    let mut expected = source.matrices[&unit].clone();
    doubly_center(&mut expected).unwrap();
    let reconstructed = bundle.reconstruct();
    for ((row, col), value) in expected.indexed_iter() {
        assert!(
            (value - reconstructed[[row, col]]).abs() < RECONSTRUCTION_TOLERANCE,
            "reconstruction mismatch at ({}, {})",
            row,
            col
        );
    }
}

#[test]
fn missing_runs_are_tolerated_per_unit() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_manifest(&config, "A\n");

    // Only two of the four runs exist for this subject.
    let mut source = InMemorySource::new();
    source.insert(SubjectRun::new("A", Run::Rest1Lr), random_matrix(20, 5, 1));
    source.insert(SubjectRun::new("A", Run::Rest2Rl), random_matrix(20, 5, 2));

    let runner = BatchSvdRunner::new(&config, &source);
    let summary = runner.run(1, &RunOptions::default()).unwrap();

    assert_eq!(
        summary,
        RunSummary {
            processed: 2,
            skipped: 0,
            fetch_failures: 2
        }
    );
}

#[test]
fn a_bad_matrix_aborts_the_shard() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_manifest(&config, "A\n");

    // The first unit fetches fine but cannot be centered; unlike a fetch
    // failure this is fatal to the whole run.
    let mut source = InMemorySource::new();
    source.insert(SubjectRun::new("A", Run::Rest1Lr), Array2::<f64>::zeros((4, 0)));
    source.insert(SubjectRun::new("A", Run::Rest1Rl), random_matrix(20, 5, 3));

    let runner = BatchSvdRunner::new(&config, &source);
    assert!(runner.run(1, &RunOptions::default()).is_err());
    // The later, healthy unit was never reached.
    let later = config
        .svd_dir
        .join(bundle_file_name(&SubjectRun::new("A", Run::Rest1Rl)));
    assert!(!later.exists());
}

#[test]
fn out_of_range_shard_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_manifest(&config, "A\nB\n");

    let source = InMemorySource::new();
    let runner = BatchSvdRunner::new(&config, &source);
    assert!(runner.run(3, &RunOptions::default()).is_err());
}

#[test]
fn persisted_bundles_reconstruct_the_centered_matrix() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    write_manifest(&config, "A\n");

    let mut source = InMemorySource::new();
    let unit = SubjectRun::new("A", Run::Rest1Lr);
    // Tall enough to take the blocked path with the test extents.
    let matrix = random_matrix(30, 5, 42);
    source.insert(unit.clone(), matrix.clone());
    for run in [Run::Rest1Rl, Run::Rest2Lr, Run::Rest2Rl] {
        source.insert(SubjectRun::new("A", run), random_matrix(30, 5, run as u64 + 50));
    }

    let runner = BatchSvdRunner::new(&config, &source);
    runner.run(1, &RunOptions::default()).unwrap();

    let bundle = SvdBundle::load(config.svd_dir.join(bundle_file_name(&unit))).unwrap();
    let mut centered = matrix;
    doubly_center(&mut centered).unwrap();

    // Row and column means of the decomposed matrix were removed.
    for mean in centered.mean_axis(Axis(0)).unwrap() {
        assert!(mean.abs() < 1e-10);
    }
    let reconstructed = bundle.reconstruct();
    for ((row, col), value) in centered.indexed_iter() {
        assert!(
            (value - reconstructed[[row, col]]).abs() < RECONSTRUCTION_TOLERANCE,
            "reconstruction mismatch at ({}, {})",
            row,
            col
        );
    }
}

//! Runs the bundled process fixtures end to end against the in-process backends.

use std::path::PathBuf;

use proctest_runner::{CaseResult, CaseStatus, Phase, RunnerConfig, RunnerKind, Session, SuiteResult};
use tempfile::TempDir;

fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("processes")
}

fn config(runner: RunnerKind) -> RunnerConfig {
    RunnerConfig {
        runner,
        fixtures_root: fixtures_root(),
        ..Default::default()
    }
}

fn run(config: RunnerConfig) -> SuiteResult {
    let session = Session::initialize(config).expect("session initializes");
    session.runner().run_all()
}

fn case<'a>(suite: &'a SuiteResult, process_id: &str, index: usize) -> &'a CaseResult {
    suite
        .results
        .iter()
        .find(|r| r.process_id == process_id && r.case_index == index)
        .unwrap_or_else(|| panic!("no result for {}[{}]", process_id, index))
}

fn failures(suite: &SuiteResult) -> Vec<String> {
    suite
        .results
        .iter()
        .filter(|r| r.status == CaseStatus::Failed)
        .map(|r| format!("{}: {}", r.name(), r.reason.as_deref().unwrap_or_default()))
        .collect()
}

#[test]
fn local_backend_passes_all_fixtures() {
    let suite = run(config(RunnerKind::Local));

    assert!(failures(&suite).is_empty(), "unexpected failures: {:#?}", failures(&suite));
    assert_eq!(suite.total, suite.passed + suite.failed + suite.skipped);
    assert!(suite.passed > 0);
}

#[test]
fn add_of_zeros_is_exactly_zero() {
    let suite = run(config(RunnerKind::Local));
    let result = case(&suite, "add", 0);
    assert_eq!(result.status, CaseStatus::Passed);
    assert_eq!(result.phase, Phase::Checking);
}

#[test]
fn division_by_zero_accepts_infinity() {
    let suite = run(config(RunnerKind::Local));
    let result = case(&suite, "divide", 2);
    assert_eq!(result.status, CaseStatus::Passed, "{:?}", result.reason);
    assert!(result.warnings.is_empty());
}

#[test]
fn experimental_process_is_excluded_at_level_l1() {
    let session = Session::initialize(RunnerConfig {
        process_levels: Some("L1".to_string()),
        ..config(RunnerKind::Local)
    })
    .unwrap();

    let selected: Vec<&str> = session
        .selected_processes()
        .iter()
        .map(|p| p.process_id.as_str())
        .collect();
    assert!(selected.contains(&"add"));
    assert!(!selected.contains(&"sqrt"));
    assert!(!selected.contains(&"mean"));

    let suite = session.runner().run_all();
    let sqrt = case(&suite, "sqrt", 0);
    assert_eq!(sqrt.status, CaseStatus::Skipped);
    assert_eq!(sqrt.phase, Phase::Selecting);
}

#[test]
fn explicit_selection_includes_experimental_process() {
    let suite = run(RunnerConfig {
        processes: Some("sqrt, add".to_string()),
        ..config(RunnerKind::Local)
    });

    assert_eq!(case(&suite, "sqrt", 0).status, CaseStatus::Passed);
    assert_eq!(case(&suite, "sqrt", 1).status, CaseStatus::Passed);
    assert_eq!(case(&suite, "mean", 0).status, CaseStatus::Skipped);
}

#[test]
fn mismatched_fixture_id_is_not_loaded() {
    let session = Session::initialize(config(RunnerKind::Local)).unwrap();
    assert!(session.registry().get_process("pow").is_err());
    assert!(session.registry().get_process("power").is_err());
    assert!(session.registry().get_process("add").is_ok());
}

#[test]
fn unsupported_processes_are_skipped() {
    let suite = run(config(RunnerKind::Local));

    let fft = case(&suite, "fft", 0);
    assert_eq!(fft.status, CaseStatus::Skipped);
    assert_eq!(fft.phase, Phase::Preparing);
    assert!(fft.reason.as_deref().unwrap_or_default().contains("fft"));

    let nested = case(&suite, "reduce_dimension", 2);
    assert_eq!(nested.status, CaseStatus::Skipped);
    assert_eq!(nested.phase, Phase::Preparing);
}

#[test]
fn cases_without_expectation_are_skipped() {
    let suite = run(config(RunnerKind::Local));
    let result = case(&suite, "absolute", 4);
    assert_eq!(result.status, CaseStatus::Skipped);
    assert_eq!(result.phase, Phase::Checking);
}

#[test]
fn datacube_results_ignore_missing_data() {
    let suite = run(config(RunnerKind::Local));
    assert_eq!(case(&suite, "reduce_dimension", 0).status, CaseStatus::Passed);
    assert_eq!(case(&suite, "reduce_dimension", 1).status, CaseStatus::Passed);
    assert_eq!(case(&suite, "apply", 0).status, CaseStatus::Passed);
}

#[test]
fn nodata_argument_is_recognized_by_the_local_backend() {
    let suite = run(RunnerConfig {
        processes: Some("is_nodata".to_string()),
        ..config(RunnerKind::Local)
    });
    for index in 0..3 {
        let result = case(&suite, "is_nodata", index);
        assert_eq!(result.status, CaseStatus::Passed, "{}: {:?}", result.name(), result.reason);
    }
}

#[test]
fn skip_backend_never_fails() {
    let suite = run(config(RunnerKind::Skip));
    assert_eq!(suite.failed, 0);
    assert_eq!(suite.passed, 0);
    assert_eq!(suite.skipped, suite.total);
}

#[test]
fn results_are_written_as_json() {
    let out = TempDir::new().unwrap();
    let session = Session::initialize(RunnerConfig {
        processes: Some("add".to_string()),
        output_dir: out.path().to_path_buf(),
        ..config(RunnerKind::Local)
    })
    .unwrap();
    let runner = session.runner();
    let suite = runner.run_all();
    let path = runner.write_results(&suite).unwrap();

    assert_eq!(path, out.path().join("test-results.json"));
    let written: SuiteResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written.total, suite.total);
    assert_eq!(written.passed, 5);
}

//! Test driver
//!
//! Each test case moves through four phases and stops at the first one that
//! reaches a decision:
//!
//! - selecting: level, experimental flag and explicit process selection
//! - preparing: backend support for all involved processes, argument transcoding
//! - executing: the process call, capturing the value or the error
//! - checking: expected exception and/or expected return value
//!
//! Constructs a backend cannot handle end in a skip, never in a failure.

use proctest_common::{graph::nested_process_ids, Level, ProcessDefinition, Selection, TestCase, Throws, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::compare::{check_exception, check_return_value, Verdict};
use crate::error::{RunnerError, RunnerResult};
use crate::native::{NativeMap, NativeValue};
use crate::session::Session;
use crate::transcode::prepare_arguments;

/// Phase in which a test case was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Selecting,
    Preparing,
    Executing,
    Checking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub process_id: String,
    pub case_index: usize,
    pub path: PathBuf,
    pub level: Level,
    pub phase: Phase,
    pub status: CaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl CaseResult {
    pub fn name(&self) -> String {
        format!("{}[{}]", self.process_id, self.case_index)
    }
}

/// Result of running all test cases
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteResult {
    fn from_results(results: Vec<CaseResult>, duration_ms: u64) -> Self {
        let count = |status| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            duration_ms,
            results,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Final decision of a phase
struct Decision {
    status: CaseStatus,
    reason: Option<String>,
}

impl Decision {
    fn pass() -> Self {
        Self {
            status: CaseStatus::Passed,
            reason: None,
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: CaseStatus::Failed,
            reason: Some(reason.into()),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            status: CaseStatus::Skipped,
            reason: Some(reason.into()),
        }
    }

    /// Unsupported constructs skip; anything else fails
    fn from_error(error: RunnerError) -> Self {
        if error.is_unsupported() {
            Self::skip(error.to_string())
        } else {
            Self::fail(error.to_string())
        }
    }

    fn from_verdict(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Match => Self::pass(),
            Verdict::Mismatch(reason) => Self::fail(reason),
        }
    }
}

/// State of one test case moving through the phases
struct CaseRun<'a> {
    session: &'a Session,
    process: &'a ProcessDefinition,
    case: &'a TestCase,
    phase: Phase,
    warnings: Vec<String>,
}

impl<'a> CaseRun<'a> {
    fn new(session: &'a Session, process: &'a ProcessDefinition, case: &'a TestCase) -> Self {
        Self {
            session,
            process,
            case,
            phase: Phase::Selecting,
            warnings: Vec::new(),
        }
    }

    fn run(&mut self) -> Decision {
        match self.advance() {
            Ok(decision) | Err(decision) => decision,
        }
    }

    fn advance(&mut self) -> Result<Decision, Decision> {
        self.phase = Phase::Selecting;
        self.select()?;

        self.phase = Phase::Preparing;
        let arguments = self.prepare()?;

        self.phase = Phase::Executing;
        let outcome = self.execute(arguments)?;

        self.phase = Phase::Checking;
        Ok(self.check(outcome))
    }

    fn select(&self) -> Result<(), Decision> {
        let level = self.process.case_level(self.case);
        let experimental = self.process.case_experimental(self.case);
        match self
            .session
            .filters()
            .selects(&self.process.process_id, level, experimental)
        {
            Selection::Included => Ok(()),
            other => Err(Decision::skip(format!("Deselected: {}", other))),
        }
    }

    /// Processes that must be supported: the process itself, declared
    /// companions and everything used in callback arguments
    fn required_processes(&self) -> BTreeSet<String> {
        let mut required: BTreeSet<String> = std::iter::once(self.process.process_id.clone())
            .chain(self.case.required.iter().cloned())
            .collect();
        for argument in self.case.arguments.values() {
            required.extend(nested_process_ids(argument));
        }
        required
    }

    fn prepare(&self) -> Result<NativeMap, Decision> {
        let backend = self.session.backend();
        match self
            .session
            .skipper()
            .skip_if_unsupported_process(backend, &self.required_processes())
        {
            Ok(None) => {}
            Ok(Some(reason)) => return Err(Decision::skip(reason)),
            Err(e) => return Err(Decision::from_error(e)),
        }

        prepare_arguments(
            &self.case.arguments,
            &self.process.process_id,
            backend,
            &self.process.path,
        )
        .map_err(Decision::from_error)
    }

    fn execute(&self, arguments: NativeMap) -> Result<RunnerResult<NativeValue>, Decision> {
        match self
            .session
            .backend()
            .execute(&self.process.process_id, arguments)
        {
            Err(e) if e.is_unsupported() => Err(Decision::skip(e.to_string())),
            outcome => Ok(outcome),
        }
    }

    fn check(&mut self, outcome: RunnerResult<NativeValue>) -> Decision {
        let case = self.case;
        let throws = case.throws.as_ref().filter(|t| t.expects_exception());
        match (throws, &case.returns) {
            (Some(throws), Some(expected)) => {
                if outcome.is_err() {
                    self.check_exception(throws, &outcome)
                } else {
                    debug!(
                        "{}: expects an exception or a return value, checking the returned value",
                        self.process.process_id
                    );
                    self.check_return(expected, outcome)
                }
            }
            (Some(throws), None) => self.check_exception(throws, &outcome),
            (None, Some(expected)) => self.check_return(expected, outcome),
            (None, None) => Decision::skip("Test doesn't provide an expected result"),
        }
    }

    fn check_exception(
        &mut self,
        throws: &Throws,
        outcome: &RunnerResult<NativeValue>,
    ) -> Decision {
        let (verdict, warning) = check_exception(throws, outcome);
        self.warnings.extend(warning);
        Decision::from_verdict(verdict)
    }

    fn check_return(&self, expected: &Value, outcome: RunnerResult<NativeValue>) -> Decision {
        let value = match outcome {
            Ok(value) => value,
            Err(e) => return Decision::fail(format!("Unexpected exception: {}", e)),
        };
        match check_return_value(
            expected,
            self.case.delta(),
            value,
            self.session.backend(),
            &self.process.path,
        ) {
            Ok(verdict) => Decision::from_verdict(verdict),
            Err(e) => Decision::from_error(e),
        }
    }
}

/// Runs the test cases of a session
pub struct TestRunner<'a> {
    session: &'a Session,
}

impl<'a> TestRunner<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Run every test case of every loaded process
    pub fn run_all(&self) -> SuiteResult {
        let start = Instant::now();
        let processes = self.session.registry().processes();
        let cases: usize = processes.iter().map(|p| p.tests.len()).sum();

        info!(
            "Running {} test case(s) against the {} backend...",
            cases,
            self.session.backend().name()
        );

        let results: Vec<CaseResult> = processes.iter().flat_map(|p| self.run_process(p)).collect();
        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Run all test cases of one process
    pub fn run_process(&self, process: &ProcessDefinition) -> Vec<CaseResult> {
        (0..process.tests.len())
            .filter_map(|index| self.run_case(process, index))
            .collect()
    }

    /// Run a single test case; `None` if the index is out of range
    pub fn run_case(&self, process: &ProcessDefinition, index: usize) -> Option<CaseResult> {
        let case = process.tests.get(index)?;
        let start = Instant::now();

        let mut run = CaseRun::new(self.session, process, case);
        let decision = run.run();

        let result = CaseResult {
            process_id: process.process_id.clone(),
            case_index: index,
            path: process.path.clone(),
            level: process.case_level(case),
            phase: run.phase,
            status: decision.status,
            reason: decision.reason,
            warnings: run.warnings,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let reason = result.reason.as_deref().unwrap_or("unknown error");
        match (result.status, result.phase) {
            (CaseStatus::Passed, _) => info!("✓ {} ({} ms)", result.name(), result.duration_ms),
            (CaseStatus::Failed, _) => error!("✗ {} - {}", result.name(), reason),
            (CaseStatus::Skipped, Phase::Selecting) => debug!("- {} skipped: {}", result.name(), reason),
            (CaseStatus::Skipped, _) => info!("- {} skipped: {}", result.name(), reason),
        }
        Some(result)
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> RunnerResult<PathBuf> {
        let output_dir = &self.session.config().output_dir;
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendAdapter, LocalBackend, RunnerKind, SkippingBackend};
    use crate::config::RunnerConfig;
    use proctest_common::ProcessSpec;
    use tempfile::TempDir;
    use test_case::test_case;

    fn session_with(fixture: &str, backend: Box<dyn BackendAdapter>, levels: Option<&str>) -> (TempDir, Session) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("case.json5"), fixture).unwrap();
        let config = RunnerConfig {
            runner: RunnerKind::Local,
            fixtures_root: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            process_levels: levels.map(str::to_string),
            ..Default::default()
        };
        let session = Session::with_backend(config, backend).unwrap();
        (dir, session)
    }

    fn run_single(case: &str) -> CaseResult {
        let fixture = format!("{{id: 'case', tests: [{}]}}", case);
        let (_dir, session) = session_with(&fixture, Box::new(AliasBackend::default()), None);
        let process = &session.registry().processes()[0];
        session.runner().run_case(process, 0).unwrap()
    }

    /// Local backend exposing `divide` under the fixture id `case`
    #[derive(Default)]
    struct AliasBackend {
        local: LocalBackend,
    }

    impl BackendAdapter for AliasBackend {
        fn name(&self) -> &'static str {
            "alias"
        }

        fn list_processes(&self) -> RunnerResult<Vec<ProcessSpec>> {
            let mut processes = self.local.list_processes()?;
            processes.push(ProcessSpec {
                id: "case".to_string(),
                summary: None,
                parameters: vec![],
                experimental: None,
            });
            Ok(processes)
        }

        fn execute(&self, process_id: &str, arguments: NativeMap) -> RunnerResult<NativeValue> {
            let target = if process_id == "case" { "divide" } else { process_id };
            self.local.execute(target, arguments)
        }
    }

    #[test_case("{arguments: {x: 6, y: 3}, returns: 2}", CaseStatus::Passed, Phase::Checking ; "return matches")]
    #[test_case("{arguments: {x: 6, y: 3}, returns: 3}", CaseStatus::Failed, Phase::Checking ; "return differs")]
    #[test_case("{arguments: {x: 1, y: 0}, returns: Infinity, throws: 'DivisionByZero'}", CaseStatus::Passed, Phase::Checking ; "throws or returns")]
    #[test_case("{arguments: {x: 1}, throws: true}", CaseStatus::Passed, Phase::Checking ; "expected exception")]
    #[test_case("{arguments: {x: 1}, returns: 1}", CaseStatus::Failed, Phase::Checking ; "unexpected exception")]
    #[test_case("{arguments: {x: 6, y: 3}, throws: true}", CaseStatus::Failed, Phase::Checking ; "missing exception")]
    #[test_case("{arguments: {x: 6, y: 3}}", CaseStatus::Skipped, Phase::Checking ; "no expectation")]
    #[test_case("{arguments: {x: 6, y: 3}, throws: false}", CaseStatus::Skipped, Phase::Checking ; "throws false only")]
    #[test_case("{arguments: {x: {'$ref': 'data.bin'}, y: 1}, returns: 1}", CaseStatus::Failed, Phase::Preparing ; "bad reference")]
    #[test_case("{arguments: {x: 1, y: 2}, returns: 0.5, required: ['fft']}", CaseStatus::Skipped, Phase::Preparing ; "unsupported companion")]
    #[test_case("{arguments: {x: 1, y: 2}, returns: 0.5, experimental: true}", CaseStatus::Skipped, Phase::Selecting ; "experimental case")]
    fn test_case_outcomes(case: &str, status: CaseStatus, phase: Phase) {
        let result = run_single(case);
        assert_eq!(result.status, status, "{:?}", result.reason);
        assert_eq!(result.phase, phase);
        if status != CaseStatus::Passed {
            assert!(result.reason.is_some());
        }
    }

    #[test]
    fn test_exception_kind_mismatch_is_a_warning() {
        let result = run_single("{arguments: {x: 1}, throws: 'DivisionByZero'}");
        assert_eq!(result.status, CaseStatus::Passed);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("ProcessParameterMissing"));
    }

    #[test]
    fn test_level_mismatch_is_skipped() {
        let fixture = "{id: 'case', level: 'L3', tests: [{arguments: {x: 1, y: 2}, returns: 0.5}]}";
        let (_dir, session) = session_with(fixture, Box::new(AliasBackend::default()), Some("L1"));
        let suite = session.runner().run_all();
        assert_eq!(suite.skipped, 1);
        assert_eq!(suite.results[0].phase, Phase::Selecting);
    }

    #[test]
    fn test_case_level_overrides_process_level() {
        let fixture = "{id: 'case', level: 'L3', tests: [{arguments: {x: 1, y: 2}, returns: 0.5, level: 'L1'}]}";
        let (_dir, session) = session_with(fixture, Box::new(AliasBackend::default()), Some("L1"));
        let suite = session.runner().run_all();
        assert_eq!(suite.passed, 1);
        assert_eq!(suite.results[0].level, Level::L1);
    }

    #[test]
    fn test_skipping_backend_skips_everything() {
        let fixture = "{id: 'case', tests: [{arguments: {x: 1, y: 2}, returns: 0.5}, {arguments: {}, throws: true}]}";
        let (_dir, session) = session_with(fixture, Box::new(SkippingBackend), None);
        let suite = session.runner().run_all();
        assert_eq!(suite.total, 2);
        assert_eq!(suite.skipped, 2);
        assert!(!suite.has_failures());
    }

    #[test]
    fn test_run_case_out_of_range() {
        let (_dir, session) = session_with("{id: 'case', tests: []}", Box::new(SkippingBackend), None);
        let process = &session.registry().processes()[0];
        assert!(session.runner().run_case(process, 0).is_none());
    }

    #[test]
    fn test_write_results() {
        let fixture = "{id: 'case', tests: [{arguments: {x: 1, y: 2}, returns: 0.5}]}";
        let (_dir, session) = session_with(fixture, Box::new(AliasBackend::default()), None);
        let runner = session.runner();
        let suite = runner.run_all();
        let path = runner.write_results(&suite).unwrap();

        let written: SuiteResult = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written.total, 1);
        assert_eq!(written.passed, 1);
        assert_eq!(written.results[0].status, CaseStatus::Passed);
    }
}

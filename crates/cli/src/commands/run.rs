//! Run Command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use proctest_runner::{CaseResult, CaseStatus, Phase, Session, SuiteResult};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use super::SessionArgs;
use crate::output::{print_document, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Directory for test-results.json
    #[arg(long, env = "PROCTEST_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Do not write test-results.json
    #[arg(long)]
    pub no_report: bool,

    /// Also list passed and deselected cases
    #[arg(short, long)]
    pub all: bool,
}

/// Test case display wrapper for serialization
#[derive(Serialize)]
pub struct CaseDisplay {
    pub case: String,
    pub level: String,
    pub status: String,
    pub phase: String,
    pub reason: String,
}

impl From<&CaseResult> for CaseDisplay {
    fn from(result: &CaseResult) -> Self {
        let mut reason = result.reason.clone().unwrap_or_default();
        for warning in &result.warnings {
            if !reason.is_empty() {
                reason.push_str("; ");
            }
            reason.push_str(warning);
        }
        Self {
            case: result.name(),
            level: result.level.to_string(),
            status: status_label(result.status).to_string(),
            phase: format!("{:?}", result.phase).to_lowercase(),
            reason,
        }
    }
}

impl TableDisplay for CaseDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["CASE", "LEVEL", "STATUS", "PHASE", "REASON"]
    }

    fn row(&self) -> Vec<String> {
        let status = match self.status.as_str() {
            "passed" => self.status.green().to_string(),
            "failed" => self.status.red().to_string(),
            _ => self.status.yellow().to_string(),
        };
        vec![
            self.case.clone(),
            self.level.clone(),
            status,
            self.phase.clone(),
            self.reason.clone(),
        ]
    }
}

fn status_label(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Passed => "passed",
        CaseStatus::Failed => "failed",
        CaseStatus::Skipped => "skipped",
    }
}

/// Cases worth showing: failures and skips, or everything with `all`
fn visible(suite: &SuiteResult, all: bool) -> Vec<CaseDisplay> {
    suite
        .results
        .iter()
        .filter(|r| all || (r.status != CaseStatus::Passed && r.phase != Phase::Selecting))
        .map(CaseDisplay::from)
        .collect()
}

/// Run the selected test cases; `Ok(true)` when nothing failed
pub fn execute(args: RunArgs, format: OutputFormat) -> Result<bool> {
    let mut config = args.session.runner_config()?;
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    debug!(
        runner = %config.runner,
        fixtures = %config.fixtures_root.display(),
        "Starting test run"
    );

    let session = Session::initialize(config).context("Failed to initialize test session")?;
    let runner = session.runner();
    let suite = runner.run_all();

    if !args.no_report {
        runner.write_results(&suite).context("Failed to write test results")?;
    }

    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_document(&suite, format),
        _ => {
            let cases = visible(&suite, args.all);
            if !cases.is_empty() {
                print_list(&cases, format);
            }
            let summary = format!(
                "{} passed, {} failed, {} skipped ({} ms)",
                suite.passed, suite.failed, suite.skipped, suite.duration_ms
            );
            if suite.has_failures() {
                print_warning(&summary);
            } else {
                print_success(&summary);
            }
        }
    }

    Ok(!suite.has_failures())
}

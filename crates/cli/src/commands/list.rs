//! List Commands

use anyhow::{Context, Result};
use clap::Subcommand;
use proctest_common::{ProcessDefinition, ProcessFilters, ProcessRegistry, ProcessSpec, Selection};
use serde::Serialize;

use super::SessionArgs;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Subcommand, Debug, Clone)]
pub enum ListCommands {
    /// List process fixtures and whether they are selected
    Fixtures {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// List the processes advertised by the backend
    Backend {
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Fixture display wrapper for serialization
#[derive(Serialize)]
pub struct FixtureDisplay {
    pub id: String,
    pub level: String,
    pub experimental: bool,
    pub cases: usize,
    pub selection: String,
}

impl FixtureDisplay {
    fn new(process: &ProcessDefinition, filters: &ProcessFilters) -> Self {
        let selection = filters.selects(&process.process_id, process.level, process.experimental);
        Self {
            id: process.process_id.clone(),
            level: process.level.to_string(),
            experimental: process.experimental,
            cases: process.tests.len(),
            selection: match selection {
                Selection::Included => "selected".to_string(),
                other => other.to_string(),
            },
        }
    }
}

impl TableDisplay for FixtureDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "LEVEL", "EXPERIMENTAL", "CASES", "SELECTION"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.level.clone(),
            if self.experimental { "yes" } else { "" }.to_string(),
            self.cases.to_string(),
            self.selection.clone(),
        ]
    }
}

/// Backend process display wrapper for serialization
#[derive(Serialize)]
pub struct ProcessDisplay {
    pub id: String,
    pub summary: String,
    pub parameters: Vec<String>,
}

impl From<ProcessSpec> for ProcessDisplay {
    fn from(spec: ProcessSpec) -> Self {
        Self {
            id: spec.id,
            summary: spec.summary.unwrap_or_default(),
            parameters: spec
                .parameters
                .into_iter()
                .map(|p| if p.optional { format!("{}?", p.name) } else { p.name })
                .collect(),
        }
    }
}

impl TableDisplay for ProcessDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "SUMMARY", "PARAMETERS"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.summary.clone(), self.parameters.join(", ")]
    }
}

pub fn execute(cmd: ListCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ListCommands::Fixtures { session } => {
            let config = session.runner_config()?;
            let filters = config.filters()?;
            let registry = ProcessRegistry::load(config.fixtures_root.clone())
                .context("Failed to load process fixtures")?;

            let items: Vec<FixtureDisplay> = registry
                .processes()
                .iter()
                .map(|p| FixtureDisplay::new(p, &filters))
                .collect();
            print_list(&items, format);
        }
        ListCommands::Backend { session } => {
            let backend = session.runner_config()?.backend()?;
            let mut processes = backend
                .list_processes()
                .with_context(|| format!("Failed to list processes of the {} backend", backend.name()))?;
            processes.sort_by(|a, b| a.id.cmp(&b.id));

            let items: Vec<ProcessDisplay> = processes.into_iter().map(ProcessDisplay::from).collect();
            print_list(&items, format);
        }
    }

    Ok(())
}

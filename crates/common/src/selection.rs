//! Process selection filters

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Level, ProcessDefinition};

/// Selection criteria, built once per run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessFilters {
    /// Allow list of process ids (None = no restriction)
    pub process_ids: Option<Vec<String>>,
    /// Allow list of levels (None = no restriction)
    pub process_levels: Option<Vec<Level>>,
    /// Whether experimental processes and cases are allowed
    pub experimental: bool,
}

impl ProcessFilters {
    pub fn new(
        process_ids: Option<Vec<String>>,
        process_levels: Option<Vec<Level>>,
        experimental: bool,
    ) -> Self {
        Self {
            process_ids: process_ids.filter(|ids| !ids.is_empty()),
            process_levels: process_levels.filter(|levels| !levels.is_empty()),
            experimental,
        }
    }

    /// Build filters from comma-separated option values
    pub fn from_csv(processes: Option<&str>, levels: Option<&str>, experimental: bool) -> Result<Self> {
        let process_ids = csv_to_list(processes, true);
        let process_levels = csv_to_list(levels, true)
            .map(|items| {
                items
                    .iter()
                    .map(|item| item.parse::<Level>())
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Ok(Self::new(process_ids, process_levels, experimental))
    }

    /// Whether the process id is explicitly allow-listed
    pub fn is_explicit(&self, process_id: &str) -> bool {
        self.process_ids
            .as_ref()
            .is_some_and(|ids| ids.iter().any(|id| id == process_id))
    }

    pub fn level_matches(&self, level: Level) -> bool {
        self.process_levels
            .as_ref()
            .is_some_and(|levels| levels.contains(&level))
    }

    /// Decide whether a process with this id, level and experimental flag is selected.
    ///
    /// Explicit id selection wins over the experimental gate. Level-based and
    /// unfiltered selection exclude experimental entries unless allowed.
    pub fn selects(&self, process_id: &str, level: Level, experimental: bool) -> Selection {
        if self.is_explicit(process_id) {
            return Selection::Included;
        }

        let unfiltered = self.process_ids.is_none() && self.process_levels.is_none();
        if self.level_matches(level) || unfiltered {
            if experimental && !self.experimental {
                return Selection::Experimental;
            }
            return Selection::Included;
        }

        if self.process_levels.is_some() {
            Selection::LevelMismatch
        } else {
            Selection::NotListed
        }
    }

    /// Apply the filters to a list of processes, keeping input order
    pub fn select<'a>(&self, processes: &'a [ProcessDefinition]) -> Vec<&'a ProcessDefinition> {
        processes
            .iter()
            .filter(|process| {
                let pid = &process.process_id;
                match self.selects(pid, process.level, process.experimental) {
                    Selection::Included => true,
                    other => {
                        debug!("Skipping process {:?}: {}", pid, other);
                        false
                    }
                }
            })
            .collect()
    }
}

/// Outcome of a selection decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Included,
    Experimental,
    LevelMismatch,
    NotListed,
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::Included => write!(f, "included"),
            Selection::Experimental => write!(f, "experimental"),
            Selection::LevelMismatch => write!(f, "level not in selected process levels"),
            Selection::NotListed => write!(f, "not in selected processes"),
        }
    }
}

/// Split a comma-separated string, trimming items and dropping empty ones
pub fn csv_to_list(csv: Option<&str>, none_on_empty: bool) -> Option<Vec<String>> {
    let items: Vec<String> = csv
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() && none_on_empty {
        return None;
    }
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::path::PathBuf;
    use test_case::test_case;

    fn process(id: &str, level: Level, experimental: bool) -> ProcessDefinition {
        ProcessDefinition {
            process_id: id.to_string(),
            level,
            experimental,
            metadata: Value::Null,
            tests: vec![],
            path: PathBuf::from(format!("{}.json5", id)),
        }
    }

    fn registry() -> Vec<ProcessDefinition> {
        vec![
            process("add", Level::L1, false),
            process("divide", Level::L1, false),
            process("min", Level::L1, false),
            process("max", Level::L1, false),
            process("aggregate_temporal", Level::L2, false),
            process("merge_cubes", Level::L3, false),
            process("apply_polygon", Level::L1, true),
            process("fancy", Level::L4, true),
        ]
    }

    fn ids(selected: Vec<&ProcessDefinition>) -> Vec<String> {
        let mut ids: Vec<String> = selected.iter().map(|p| p.process_id.clone()).collect();
        ids.sort();
        ids
    }

    #[test_case(None, vec![] ; "none")]
    #[test_case(Some(""), vec![] ; "empty")]
    #[test_case(Some("   "), vec![] ; "blank")]
    #[test_case(Some(" ,  "), vec![] ; "only separators")]
    #[test_case(Some("foo"), vec!["foo"] ; "single")]
    #[test_case(Some("foo,bar,baz"), vec!["foo", "bar", "baz"] ; "plain")]
    #[test_case(Some(",foo,bar,baz,"), vec!["foo", "bar", "baz"] ; "edge separators")]
    #[test_case(Some("  ,foo ,,, bar, , baz , "), vec!["foo", "bar", "baz"] ; "messy")]
    fn test_csv_to_list(csv: Option<&str>, expected: Vec<&str>) {
        assert_eq!(csv_to_list(csv, false), Some(expected.iter().map(|s| s.to_string()).collect()));
    }

    #[test]
    fn test_csv_to_list_none_on_empty() {
        assert_eq!(csv_to_list(None, true), None);
        assert_eq!(csv_to_list(Some(""), true), None);
        assert_eq!(csv_to_list(Some(" ,  "), true), None);
    }

    #[test]
    fn test_default_excludes_experimental() {
        let all = registry();
        let selected = ids(ProcessFilters::default().select(&all));
        assert!(!selected.contains(&"apply_polygon".to_string()));
        assert!(!selected.contains(&"fancy".to_string()));
        assert_eq!(selected.len(), 6);
    }

    #[test]
    fn test_explicit_ids_exact() {
        let all = registry();
        let filters = ProcessFilters::new(Some(vec!["divide".into(), "add".into()]), None, false);
        assert_eq!(ids(filters.select(&all)), vec!["add", "divide"]);
    }

    #[test]
    fn test_explicit_ids_override_experimental_gate() {
        let all = registry();
        for experimental in [false, true] {
            for levels in [None, Some(vec![Level::L2]), Some(vec![Level::L1])] {
                let filters =
                    ProcessFilters::new(Some(vec!["apply_polygon".into()]), levels, experimental);
                assert!(ids(filters.select(&all)).contains(&"apply_polygon".to_string()));
            }
        }
    }

    #[test]
    fn test_levels_exclude_experimental_by_default() {
        let all = registry();
        let filters = ProcessFilters::new(None, Some(vec![Level::L1]), false);
        assert_eq!(ids(filters.select(&all)), vec!["add", "divide", "max", "min"]);

        let filters = ProcessFilters::new(None, Some(vec![Level::L1]), true);
        assert!(ids(filters.select(&all)).contains(&"apply_polygon".to_string()));
    }

    #[test]
    fn test_ids_and_levels_combine() {
        let all = registry();
        let filters = ProcessFilters::new(Some(vec!["min".into()]), Some(vec![Level::L2]), false);
        assert_eq!(ids(filters.select(&all)), vec!["aggregate_temporal", "min"]);
    }

    #[test]
    fn test_from_csv() {
        let filters = ProcessFilters::from_csv(Some("add, divide"), Some("L1,l2a"), true).unwrap();
        assert_eq!(filters.process_ids, Some(vec!["add".to_string(), "divide".to_string()]));
        assert_eq!(filters.process_levels, Some(vec![Level::L1, Level::L2A]));
        assert!(filters.experimental);

        let empty = ProcessFilters::from_csv(Some(" , "), None, false).unwrap();
        assert_eq!(empty, ProcessFilters::default());

        assert!(matches!(
            ProcessFilters::from_csv(None, Some("L9"), false),
            Err(Error::InvalidConfig(_))
        ));
    }
}

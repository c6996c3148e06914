//! Process registry: fixture discovery and loading
//!
//! Two layouts are supported:
//!
//! ```text
//! unified                      split
//! {root}/add.json5             {root}/add.json              (definition)
//!   { id, level, tests }       {root}/proposals/foo.json    (definition)
//!                              {root}/tests/add.json5       (level, tests)
//! ```
//!
//! A file that fails to parse, or whose declared `id` differs from its file
//! stem, is logged and left out. It never aborts loading of the rest.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::selection::ProcessFilters;
use crate::types::{Level, ProcessDefinition, TestCase};
use crate::value::Value;

/// Typed view on the keys of a fixture document the loader cares about
#[derive(Debug, Default, Deserialize)]
struct FixtureDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    level: Option<Level>,
    #[serde(default)]
    experimental: Option<bool>,
    #[serde(default)]
    tests: Option<Vec<TestCase>>,
}

/// Where a process definition comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSource {
    /// One JSON5 file with definition, level and tests
    Unified(PathBuf),
    /// JSON definition plus optional JSON5 test metadata
    Split {
        definition: PathBuf,
        metadata: Option<PathBuf>,
    },
}

impl FixtureSource {
    pub fn path(&self) -> &Path {
        match self {
            FixtureSource::Unified(path) => path,
            FixtureSource::Split { definition, .. } => definition,
        }
    }
}

/// Registry of processes and their test cases, loaded once
#[derive(Debug, Clone)]
pub struct ProcessRegistry {
    root: PathBuf,
    processes: Vec<ProcessDefinition>,
}

impl ProcessRegistry {
    /// Load all process definitions below `root`
    pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "Invalid process test root directory: {}",
                root.display()
            )));
        }
        info!("Loading process definitions from {}", root.display());

        let processes: Vec<ProcessDefinition> = discover(&root)
            .into_iter()
            .filter_map(|source| match load_definition(&source) {
                Ok(process) => Some(process),
                Err(e) => {
                    error!(
                        "Failed to load process data from {}: {}",
                        source.path().display(),
                        e
                    );
                    None
                }
            })
            .collect();

        info!("Loaded {} process definition(s)", processes.len());
        Ok(Self { root, processes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn processes(&self) -> &[ProcessDefinition] {
        &self.processes
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn get_process(&self, process_id: &str) -> Result<&ProcessDefinition> {
        self.processes
            .iter()
            .find(|p| p.process_id == process_id)
            .ok_or_else(|| Error::ProcessNotFound(process_id.to_string()))
    }

    pub fn get_processes_filtered(&self, filters: &ProcessFilters) -> Vec<&ProcessDefinition> {
        filters.select(&self.processes)
    }
}

/// Find fixture sources below `root`, in file name order
pub fn discover(root: &Path) -> Vec<FixtureSource> {
    let tests_dir = root.join("tests");
    let definitions: Vec<PathBuf> = files_with_extension(root, "json")
        .into_iter()
        .chain(files_with_extension(&root.join("proposals"), "json"))
        .collect();

    let mut claimed = BTreeSet::new();
    let mut sources = Vec::new();

    for definition in definitions {
        let Some(stem) = file_stem(&definition) else {
            continue;
        };
        let metadata = [
            tests_dir.join(format!("{}.json5", stem)),
            definition.with_extension("json5"),
        ]
        .into_iter()
        .find(|candidate| candidate.is_file());

        if let Some(path) = &metadata {
            claimed.insert(path.clone());
        }
        debug!("Found split definition {} (metadata: {:?})", definition.display(), metadata);
        sources.push(FixtureSource::Split {
            definition,
            metadata,
        });
    }

    for path in files_with_extension(root, "json5") {
        if !claimed.contains(&path) {
            sources.push(FixtureSource::Unified(path));
        }
    }

    sources
}

/// Load a single process definition
pub fn load_definition(source: &FixtureSource) -> Result<ProcessDefinition> {
    match source {
        FixtureSource::Unified(path) => {
            let (metadata, document) = read_document(path)?;
            let process_id = resolve_id(path, document.id.as_deref())?;
            Ok(ProcessDefinition {
                process_id,
                level: document.level.unwrap_or_default(),
                experimental: document.experimental.unwrap_or(false),
                metadata,
                tests: document.tests.unwrap_or_default(),
                path: path.clone(),
            })
        }
        FixtureSource::Split {
            definition,
            metadata: test_metadata,
        } => {
            let (metadata, spec) = read_document(definition)?;
            let process_id = resolve_id(definition, spec.id.as_deref())?;
            let tests_doc = match test_metadata {
                Some(path) => read_document(path)?.1,
                None => FixtureDocument::default(),
            };

            Ok(ProcessDefinition {
                process_id,
                level: tests_doc.level.or(spec.level).unwrap_or_default(),
                experimental: spec.experimental.unwrap_or(false)
                    || tests_doc.experimental.unwrap_or(false),
                metadata,
                tests: tests_doc.tests.or(spec.tests).unwrap_or_default(),
                path: definition.clone(),
            })
        }
    }
}

fn read_document(path: &Path) -> Result<(Value, FixtureDocument)> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::fixture(path, e))?;
    let value = Value::from_json5_str(&content).map_err(|e| Error::fixture(path, e))?;
    let document: FixtureDocument = value
        .clone()
        .deserialize_into()
        .map_err(|e| Error::fixture(path, e))?;
    Ok((value, document))
}

fn resolve_id(path: &Path, declared: Option<&str>) -> Result<String> {
    let stem = file_stem(path).ok_or_else(|| Error::fixture(path, "file name has no stem"))?;
    match declared {
        Some(id) if id != stem => Err(Error::IdMismatch {
            id: id.to_string(),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        }),
        _ => Ok(stem),
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().to_string())
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|path| path.extension().map(|ext| ext == extension).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_unified() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "add.json5",
            r#"{
                id: "add",
                level: "L1",
                tests: [
                    {arguments: {x: 0, y: 0}, returns: 0},
                    {arguments: {x: 1, y: null}, returns: null},
                ],
            }"#,
        );
        write(
            tmp.path(),
            "divide.json5",
            r#"{id: "divide", level: "L1", tests: [{arguments: {x: 1, y: 0}, returns: Infinity, throws: "DivisionByZero"}]}"#,
        );

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);

        let add = registry.get_process("add").unwrap();
        assert_eq!(add.level, Level::L1);
        assert!(!add.experimental);
        assert_eq!(add.path.file_name().unwrap(), "add.json5");
        let add00: TestCase = json5::from_str("{arguments: {x: 0, y: 0}, returns: 0}").unwrap();
        assert!(add.tests.contains(&add00));

        let divide = registry.get_process("divide").unwrap();
        assert_eq!(divide.tests[0].returns, Some(Value::Float(f64::INFINITY)));
    }

    #[test]
    fn test_level_defaults_to_l4() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "foo.json5", r#"{id: "foo", tests: []}"#);
        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert_eq!(registry.get_process("foo").unwrap().level, Level::L4);
    }

    #[test]
    fn test_id_mismatch_is_dropped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "add.json5", r#"{id: "add", tests: []}"#);
        write(tmp.path(), "subtract.json5", r#"{id: "sub", tests: []}"#);

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(matches!(
            registry.get_process("subtract"),
            Err(Error::ProcessNotFound(_))
        ));
        assert!(matches!(
            load_definition(&FixtureSource::Unified(tmp.path().join("subtract.json5"))),
            Err(Error::IdMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_dropped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "ok.json5", r#"{id: "ok", tests: []}"#);
        write(tmp.path(), "broken.json5", r#"{id: "broken", tests: [ "#);
        write(tmp.path(), "badlevel.json5", r#"{id: "badlevel", level: "L9"}"#);

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        let ids: Vec<&str> = registry.processes().iter().map(|p| p.process_id.as_str()).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn test_typed_view_shares_parsed_document() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "absolute.json5",
            r#"{id: "absolute", level: "L1", summary: "Absolute value", tests: [{arguments: {x: -Infinity}, returns: Infinity}, {arguments: {x: NaN}, returns: NaN}]}"#,
        );
        write(tmp.path(), "broken.json5", r#"{id: "broken", tests: {arguments: {}}}"#);

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert!(registry.get_process("broken").is_err());

        let absolute = registry.get_process("absolute").unwrap();
        assert_eq!(absolute.metadata.get("summary"), Some(&Value::from("Absolute value")));
        assert_eq!(absolute.tests[0].arguments["x"], Value::Float(f64::NEG_INFINITY));
        assert_eq!(absolute.tests[0].returns, Some(Value::Float(f64::INFINITY)));
        assert!(absolute.tests[1].returns.as_ref().unwrap().is_nan());
    }

    #[test]
    fn test_missing_id_uses_stem() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "absolute.json5", r#"{level: "L1", tests: []}"#);
        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert!(registry.get_process("absolute").is_ok());
    }

    #[test]
    fn test_load_split_layout() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "add.json",
            r#"{"id": "add", "summary": "Addition", "parameters": []}"#,
        );
        write(
            tmp.path(),
            "tests/add.json5",
            r#"{level: "L1", tests: [{arguments: {x: 1, y: 2}, returns: 3}]}"#,
        );
        write(
            tmp.path(),
            "proposals/apply_polygon.json",
            r#"{"id": "apply_polygon", "experimental": true}"#,
        );

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        assert_eq!(registry.len(), 2);

        let add = registry.get_process("add").unwrap();
        assert_eq!(add.level, Level::L1);
        assert_eq!(add.tests.len(), 1);
        assert_eq!(add.metadata.get("summary"), Some(&Value::from("Addition")));
        assert_eq!(add.path.file_name().unwrap(), "add.json");

        let polygon = registry.get_process("apply_polygon").unwrap();
        assert!(polygon.experimental);
        assert_eq!(polygon.level, Level::L4);
        assert!(polygon.tests.is_empty());
    }

    #[test]
    fn test_invalid_root() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            ProcessRegistry::load(tmp.path().join("missing")),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_filtered() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "add.json5", r#"{id: "add", level: "L1"}"#);
        write(tmp.path(), "apply_polygon.json5", r#"{id: "apply_polygon", level: "L1", experimental: true}"#);
        write(tmp.path(), "merge_cubes.json5", r#"{id: "merge_cubes", level: "L3"}"#);

        let registry = ProcessRegistry::load(tmp.path()).unwrap();
        let filters = ProcessFilters::new(None, Some(vec![Level::L1]), false);
        let ids: Vec<&str> = registry
            .get_processes_filtered(&filters)
            .iter()
            .map(|p| p.process_id.as_str())
            .collect();
        assert_eq!(ids, vec!["add"]);
    }
}

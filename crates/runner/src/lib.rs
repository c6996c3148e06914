//! Proctest Runner
//!
//! Runs the example invocations recorded in process fixtures against a
//! processing backend and checks the results:
//! - Transcodes backend-agnostic arguments into backend-native values
//! - Executes processes through a pluggable backend adapter
//! - Compares results with tolerance-aware structural diffs
//! - Reports every case as passed, failed or skipped
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Process Test Engine (Rust)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session::initialize(RunnerConfig)                          │
//! │    ├── ProcessRegistry (fixtures, loaded once)              │
//! │    ├── ProcessFilters (ids, levels, experimental)           │
//! │    ├── Box<dyn BackendAdapter>                              │
//! │    │     ├── HttpBackend  (JSON over HTTP, sync jobs)       │
//! │    │     ├── LocalBackend (in-process reference processes)  │
//! │    │     └── SkippingBackend                                │
//! │    └── Skipper (cached process listing)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner (per case)                                      │
//! │    selecting ─► preparing ─► executing ─► checking          │
//! │        │            │            │            │             │
//! │        └── skip ────┴── skip ────┘     pass / fail / skip   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod compare;
pub mod config;
pub mod driver;
pub mod error;
pub mod native;
pub mod session;
pub mod skipper;
pub mod transcode;

pub use backend::{BackendAdapter, HttpBackend, HttpConfig, LocalBackend, RunnerKind, SkippingBackend};
pub use compare::Verdict;
pub use config::RunnerConfig;
pub use driver::{CaseResult, CaseStatus, Phase, SuiteResult, TestRunner};
pub use error::{RunnerError, RunnerResult};
pub use native::{DataCube, LabeledArray, NativeMap, NativeValue};
pub use session::Session;
pub use skipper::Skipper;

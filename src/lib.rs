//! # osworkflow
//!
//! Bookkeeping for OpenStudio workflows (OSW files): the measure steps a
//! workflow runs, their arguments and results, run options, path
//! resolution, and the runner that records each measure's outcome.
//!
//! ## Modules
//!
//! - `variant` - Scalar values used for step arguments and result values
//! - `workflow` - The OSW document, its steps, results and run options
//! - `runner` - Execution-time driver collecting per-step results
//! - `config` - Runner defaults loaded from TOML and the environment
//! - `app` - Process-level configuration and logging setup
//! - `error` - Error types and codes
pub mod app;
pub mod config;
pub mod error;
pub mod runner;
pub mod variant;
pub mod workflow;

pub use error::{OswError, Result};
pub use runner::OsRunner;
pub use variant::{Variant, VariantType};
pub use workflow::{
    BclMeasure, CompletedStatus, CustomOutputAdapter, MeasureStep, MeasureType, RunOptions,
    StepResult, WorkflowJson, WorkflowStep, WorkflowStepResult, WorkflowStepValue,
};

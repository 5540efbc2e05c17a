//! OSW workflow documents and their parts.
//!
//! A [`WorkflowJson`] owns an ordered list of [`WorkflowStep`]s, optional
//! [`RunOptions`], path configuration and a cursor used while a runner
//! walks the steps. Each step may carry a [`WorkflowStepResult`].

pub mod json;
pub mod measure;
pub mod paths;
pub mod run_options;
pub mod step;
pub mod step_result;
pub mod timestamp;
pub mod workflow_json;

pub use measure::{BclMeasure, MeasureLoader, MeasureType, XmlMeasureLoader, MEASURE_XML};
pub use run_options::{CustomOutputAdapter, RunOptions};
pub use step::{MeasureStep, StepId, StepKind, WorkflowStep};
pub use step_result::{MeasureMetadata, StepResult, WorkflowStepResult, WorkflowStepValue};
pub use workflow_json::{CompletedStatus, WorkflowJson};

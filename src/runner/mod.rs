//! Execution-time driver that folds measure output into step results.
//!
//! An [`OsRunner`] walks a [`WorkflowJson`] one step at a time. For each
//! step the caller invokes [`OsRunner::prepare_for_measure_run`], runs the
//! measure (which reports through the `register_*` methods and writes its
//! console output through [`OsRunner::stdout`] and [`OsRunner::stderr`]),
//! then calls [`OsRunner::increment_step`] to attach the finished result
//! and advance the cursor.

pub mod arguments;
pub mod artifacts;
pub mod capture;
pub mod value_name;

pub use arguments::{argument_map, ArgumentMap, ArgumentType, OsArgument};
pub use artifacts::{ArtifactFile, ArtifactLoader, FileArtifactLoader, LazyArtifact};
pub use capture::{CaptureWriter, OutputCapture, Stream};
pub use value_name::clean_value_name;

use crate::app::AppConfig;
use crate::config::RunnerConfig;
use crate::error::{ErrorCode, OswError, Result};
use crate::variant::Variant;
use crate::workflow::paths::{canonical_or_absolute, current_dir};
use crate::workflow::{
    BclMeasure, CompletedStatus, StepResult, WorkflowJson, WorkflowStepResult, WorkflowStepValue,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, trace, warn};
use walkdir::WalkDir;

const DEFAULT_UNITS_PREFERENCE: &str = "IP";
const DEFAULT_LANGUAGE_PREFERENCE: &str = "en";

pub struct OsRunner<L: ArtifactLoader = FileArtifactLoader> {
    workflow: WorkflowJson,
    units_preference: String,
    language_preference: String,
    register_msg_also_logs: bool,
    halted: bool,
    started_step: bool,
    result: WorkflowStepResult,
    capture: OutputCapture,
    working_dir: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    snapshot_files: BTreeSet<PathBuf>,
    loader: L,
    last_model: LazyArtifact<L::Model>,
    last_workspace: LazyArtifact<L::Workspace>,
    last_sql_file: LazyArtifact<L::SqlFile>,
    last_epw_file: LazyArtifact<L::EpwFile>,
}

impl OsRunner {
    pub fn new(workflow: WorkflowJson) -> Self {
        Self::with_config(workflow, &RunnerConfig::default())
    }

    pub fn with_config(workflow: WorkflowJson, config: &RunnerConfig) -> Self {
        Self::with_loader(workflow, FileArtifactLoader, config)
    }

    /// Runner using the process-level runner defaults and working directory
    pub fn from_app_config(workflow: WorkflowJson, app: &AppConfig) -> Self {
        Self::with_config(workflow, &app.runner).with_working_dir(app.working_dir.clone())
    }
}

impl<L: ArtifactLoader> OsRunner<L> {
    pub fn with_loader(workflow: WorkflowJson, loader: L, config: &RunnerConfig) -> Self {
        Self {
            workflow,
            units_preference: config.units_preference.clone(),
            language_preference: config.language_preference.clone(),
            register_msg_also_logs: config.register_msg_also_logs,
            halted: false,
            started_step: false,
            result: WorkflowStepResult::new(),
            capture: OutputCapture::new(config.echo_captured_output),
            working_dir: None,
            snapshot_dir: None,
            snapshot_files: BTreeSet::new(),
            loader,
            last_model: LazyArtifact::new(),
            last_workspace: LazyArtifact::new(),
            last_sql_file: LazyArtifact::new(),
            last_epw_file: LazyArtifact::new(),
        }
    }

    /// Snapshot produced files from `dir` instead of the process working directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = Some(dir.into());
    }

    pub fn working_dir(&self) -> PathBuf {
        let dir = self.working_dir.clone().unwrap_or_else(current_dir);
        canonical_or_absolute(&dir, &current_dir())
    }

    pub fn workflow(&self) -> &WorkflowJson {
        &self.workflow
    }

    pub fn workflow_mut(&mut self) -> &mut WorkflowJson {
        &mut self.workflow
    }

    pub fn into_workflow(self) -> WorkflowJson {
        self.workflow
    }

    /// The in-progress result
    pub fn result(&self) -> &WorkflowStepResult {
        &self.result
    }

    pub fn halted(&self) -> bool {
        self.halted
    }

    pub fn step_in_progress(&self) -> bool {
        self.started_step
    }

    pub fn units_preference(&self) -> &str {
        &self.units_preference
    }

    pub fn set_units_preference(&mut self, units: impl Into<String>) -> bool {
        self.units_preference = units.into();
        true
    }

    pub fn reset_units_preference(&mut self) {
        self.units_preference = DEFAULT_UNITS_PREFERENCE.to_string();
    }

    pub fn language_preference(&self) -> &str {
        &self.language_preference
    }

    pub fn set_language_preference(&mut self, language: impl Into<String>) -> bool {
        self.language_preference = language.into();
        true
    }

    pub fn reset_language_preference(&mut self) {
        self.language_preference = DEFAULT_LANGUAGE_PREFERENCE.to_string();
    }

    pub fn register_msg_also_logs(&self) -> bool {
        self.register_msg_also_logs
    }

    pub fn set_register_msg_also_logs(&mut self, also_logs: bool) {
        self.register_msg_also_logs = also_logs;
    }

    /// Writer for measure standard output
    pub fn stdout(&mut self) -> CaptureWriter<'_> {
        self.capture.writer(Stream::Stdout)
    }

    /// Writer for measure standard error
    pub fn stderr(&mut self) -> CaptureWriter<'_> {
        self.capture.writer(Stream::Stderr)
    }

    /// Clear all per-run state; units and language preferences are kept
    pub fn reset(&mut self) {
        self.workflow.reset();
        self.started_step = false;
        self.capture.release();
        self.halted = false;
        self.result = WorkflowStepResult::new();
        self.last_model.reset();
        self.last_workspace.reset();
        self.last_sql_file.reset();
        self.last_epw_file.reset();
        self.snapshot_dir = None;
        self.snapshot_files.clear();
    }

    /// Begin a step: fresh result, output capture and a working directory snapshot.
    ///
    /// Returns false without changing anything if the workflow is halted, a
    /// step is already in progress or the cursor is past the last step.
    pub fn prepare_for_measure_run(&mut self) -> bool {
        match self.try_prepare_for_measure_run() {
            Ok(()) => true,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// [`OsRunner::prepare_for_measure_run`] reporting why a step cannot start
    pub fn try_prepare_for_measure_run(&mut self) -> Result<()> {
        let index = self.workflow.current_step_index();
        if self.halted {
            return Err(OswError::workflow_with_code(
                ErrorCode::WORKFLOW_HALTED,
                "Workflow halted, cannot prepare for measure run",
            )
            .with_step(index.to_string()));
        }
        if self.started_step {
            return Err(OswError::workflow_with_code(
                ErrorCode::WORKFLOW_STEP_IN_PROGRESS,
                "Step already started",
            )
            .with_step(index.to_string()));
        }
        if self.workflow.current_step().is_none() {
            return Err(no_current_step(index));
        }

        self.started_step = true;
        self.result = WorkflowStepResult::new();
        self.result.set_started_at(Utc::now());
        self.result.set_step_result(StepResult::Success);

        self.capture.start();

        let dir = self.working_dir();
        self.snapshot_files = regular_files(&dir);
        debug!(
            "Step {} started, {} files in {}",
            index,
            self.snapshot_files.len(),
            dir.display()
        );
        self.snapshot_dir = Some(dir);
        Ok(())
    }

    /// [`OsRunner::prepare_for_measure_run`], recording `measure` in the result
    pub fn prepare_for_measure_run_with(&mut self, measure: &BclMeasure) -> bool {
        if !self.prepare_for_measure_run() {
            return false;
        }
        self.result.set_measure_descriptor(measure);
        true
    }

    /// Finish the current step and advance the cursor.
    ///
    /// Returns whether another step follows.
    pub fn increment_step(&mut self) -> bool {
        match self.try_increment_step() {
            Ok(more) => more,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    /// [`OsRunner::increment_step`] reporting why the step cannot finish
    pub fn try_increment_step(&mut self) -> Result<bool> {
        let index = self.workflow.current_step_index();
        if !self.started_step {
            return Err(OswError::workflow_with_code(
                ErrorCode::WORKFLOW_NO_STEP_IN_PROGRESS,
                "Not prepared for step",
            )
            .with_step(index.to_string()));
        }
        let Some(step_id) = self.workflow.current_step().map(|s| s.id()) else {
            return Err(no_current_step(index));
        };

        if self.result.step_result().is_none() {
            self.result.set_step_result(StepResult::Skip);
        }

        let (stdout, stderr) = self.capture.stop();
        self.result.set_stdout(stdout);
        self.result.set_stderr(stderr);

        if let Some(dir) = self.snapshot_dir.take() {
            for file in regular_files(&dir) {
                if !self.snapshot_files.contains(&file) {
                    trace!("Step produced {}", file.display());
                    self.result.add_step_file(file);
                }
            }
        }
        self.snapshot_files.clear();

        self.result.set_completed_at(Utc::now());

        let result = std::mem::take(&mut self.result);
        if let Some(status) = result.step_result() {
            info!(
                "Step {} finished: {}",
                self.workflow.current_step_index(),
                status
            );
        }
        self.workflow.update_step(step_id, |step| step.set_result(result));
        self.started_step = false;

        Ok(self.workflow.increment_step())
    }

    /// Stop the workflow with `status`; the current step result is left alone
    pub fn halt_workflow(&mut self, status: CompletedStatus) {
        info!("Workflow halted with status {}", status);
        self.halted = true;
        self.workflow.set_completed_status(status);
    }

    pub fn register_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.register_msg_also_logs {
            error!("{}", message);
        }
        self.result.set_step_result(StepResult::Fail);
        self.result.add_step_error(message);
    }

    pub fn register_warning(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.register_msg_also_logs {
            warn!("{}", message);
        }
        self.result.add_step_warning(message);
        true
    }

    pub fn register_info(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.register_msg_also_logs {
            info!("{}", message);
        }
        self.result.add_step_info(message);
        true
    }

    pub fn register_as_not_applicable(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.register_msg_also_logs {
            warn!("{}", message);
        }
        self.result.set_step_result(StepResult::NotApplicable);
        self.result.add_step_info(message);
    }

    pub fn register_initial_condition(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.register_msg_also_logs {
            info!("{}", message);
        }
        self.result.set_initial_condition(message);
    }

    pub fn register_final_condition(&mut self, message: impl Into<String>) {
        let message = message.into();
        if self.register_msg_also_logs {
            info!("{}", message);
        }
        self.result.set_final_condition(message);
    }

    /// Append a value under the cleaned `name`; repeated names append again
    pub fn register_value(&mut self, name: &str, value: impl Into<Variant>) {
        self.register_value_with(name, None, value, None);
    }

    pub fn register_value_with(
        &mut self,
        name: &str,
        display_name: Option<&str>,
        value: impl Into<Variant>,
        units: Option<&str>,
    ) {
        let mut step_value = WorkflowStepValue::new(clean_value_name(name), value);
        if let Some(display_name) = display_name {
            step_value = step_value.with_display_name(display_name);
        }
        if let Some(units) = units {
            step_value = step_value.with_units(units);
        }
        if let Err(e) = self.result.add_step_value(step_value) {
            self.register_warning(format!("{}; value not recorded", e.message()));
        }
    }

    /// Values of the first successful step whose measure matches `measure_name`.
    ///
    /// The directory name, step name and recorded measure name are compared
    /// case-insensitively.
    pub fn get_past_step_values_for_measure(&self, measure_name: &str) -> Map<String, Value> {
        let mut values = Map::new();
        for step in self.workflow.workflow_steps() {
            let (Some(measure_step), Some(result)) = (step.as_measure(), step.result()) else {
                continue;
            };
            if result.step_result() != Some(StepResult::Success) {
                continue;
            }
            let matches = [
                Some(measure_step.measure_dir_name()),
                measure_step.name(),
                result.measure().name.as_deref(),
            ]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.eq_ignore_ascii_case(measure_name));
            if !matches {
                continue;
            }

            for step_value in result.step_values() {
                values.insert(step_value.name.clone(), step_value.value.to_json());
            }
            break;
        }
        values
    }

    /// Values named `value_name` from every successful step, keyed by step name
    pub fn get_past_step_values_for_name(&self, value_name: &str) -> Map<String, Value> {
        let mut values = Map::new();
        for step in self.workflow.workflow_steps() {
            let (Some(measure_step), Some(result)) = (step.as_measure(), step.result()) else {
                continue;
            };
            if result.step_result() != Some(StepResult::Success) {
                continue;
            }
            let measure_name = measure_step
                .name()
                .unwrap_or_else(|| measure_step.measure_dir_name());
            for step_value in result.step_values() {
                if step_value.name.eq_ignore_ascii_case(value_name) {
                    values.insert(measure_name.to_string(), step_value.value.to_json());
                }
            }
        }
        values
    }

    pub fn last_model(&self) -> Option<&L::Model> {
        self.last_model
            .get_or_load(|path| self.loader.load_model(path))
    }

    pub fn last_model_path(&self) -> Option<&Path> {
        self.last_model.path()
    }

    pub fn set_last_model(&mut self, model: L::Model) {
        self.last_model.set_value(model);
    }

    pub fn set_last_model_path(&mut self, path: impl AsRef<Path>) {
        self.last_model.set_path(path);
    }

    pub fn reset_last_model(&mut self) {
        self.last_model.reset();
    }

    pub fn last_workspace(&self) -> Option<&L::Workspace> {
        self.last_workspace
            .get_or_load(|path| self.loader.load_workspace(path))
    }

    pub fn last_workspace_path(&self) -> Option<&Path> {
        self.last_workspace.path()
    }

    pub fn set_last_workspace(&mut self, workspace: L::Workspace) {
        self.last_workspace.set_value(workspace);
    }

    pub fn set_last_workspace_path(&mut self, path: impl AsRef<Path>) {
        self.last_workspace.set_path(path);
    }

    pub fn reset_last_workspace(&mut self) {
        self.last_workspace.reset();
    }

    pub fn last_sql_file(&self) -> Option<&L::SqlFile> {
        self.last_sql_file
            .get_or_load(|path| self.loader.load_sql_file(path))
    }

    pub fn last_sql_file_path(&self) -> Option<&Path> {
        self.last_sql_file.path()
    }

    pub fn set_last_sql_file(&mut self, sql_file: L::SqlFile) {
        self.last_sql_file.set_value(sql_file);
    }

    pub fn set_last_sql_file_path(&mut self, path: impl AsRef<Path>) {
        self.last_sql_file.set_path(path);
    }

    pub fn reset_last_sql_file(&mut self) {
        self.last_sql_file.reset();
    }

    pub fn last_epw_file(&self) -> Option<&L::EpwFile> {
        self.last_epw_file
            .get_or_load(|path| self.loader.load_epw_file(path))
    }

    pub fn last_epw_file_path(&self) -> Option<&Path> {
        self.last_epw_file.path()
    }

    pub fn set_last_epw_file(&mut self, epw_file: L::EpwFile) {
        self.last_epw_file.set_value(epw_file);
    }

    pub fn set_last_epw_file_path(&mut self, path: impl AsRef<Path>) {
        self.last_epw_file.set_path(path);
    }

    pub fn reset_last_epw_file(&mut self) {
        self.last_epw_file.reset();
    }
}

impl<L: ArtifactLoader> std::fmt::Debug for OsRunner<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsRunner")
            .field("workflow", &self.workflow)
            .field("halted", &self.halted)
            .field("started_step", &self.started_step)
            .field("units_preference", &self.units_preference)
            .field("language_preference", &self.language_preference)
            .finish_non_exhaustive()
    }
}

fn no_current_step(index: usize) -> OswError {
    OswError::workflow_with_code(
        ErrorCode::WORKFLOW_NO_CURRENT_STEP,
        "Cannot find current Workflow Step",
    )
    .with_step(index.to_string())
}

/// Absolute paths of the regular files directly inside `dir`, symlinks
/// to regular files included
fn regular_files(dir: &Path) -> BTreeSet<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests;

use super::*;
use crate::workflow::{MeasureStep, WorkflowStep};
use std::fs;
use std::io::Write;
use tempfile::TempDir;

fn workflow_with_steps(names: &[&str]) -> WorkflowJson {
    let mut workflow = WorkflowJson::new();
    workflow.set_workflow_steps(
        names
            .iter()
            .map(|name| WorkflowStep::from(MeasureStep::new(*name)))
            .collect(),
    );
    workflow
}

fn quiet_config() -> RunnerConfig {
    RunnerConfig {
        echo_captured_output: false,
        ..RunnerConfig::default()
    }
}

fn runner_in(temp: &TempDir, names: &[&str]) -> OsRunner {
    let mut workflow = workflow_with_steps(names);
    workflow.start();
    OsRunner::with_config(workflow, &quiet_config()).with_working_dir(temp.path())
}

#[test]
fn test_defaults() {
    let runner = OsRunner::new(WorkflowJson::new());
    assert_eq!(runner.units_preference(), "IP");
    assert_eq!(runner.language_preference(), "en");
    assert!(!runner.register_msg_also_logs());
    assert!(!runner.halted());
    assert!(!runner.step_in_progress());
}

#[test]
fn test_from_app_config() {
    let temp = TempDir::new().unwrap();
    let app = AppConfig::default()
        .with_working_dir(temp.path().to_path_buf())
        .with_runner_config(RunnerConfig {
            units_preference: "SI".to_string(),
            ..quiet_config()
        });

    let mut workflow = workflow_with_steps(&["A"]);
    workflow.start();
    let mut runner = OsRunner::from_app_config(workflow, &app);
    assert_eq!(runner.units_preference(), "SI");
    assert_eq!(runner.working_dir(), fs::canonicalize(temp.path()).unwrap());

    runner.prepare_for_measure_run();
    fs::write(temp.path().join("report.html"), "<html/>").unwrap();
    runner.increment_step();
    let result = runner.workflow().workflow_steps()[0].result().unwrap();
    assert_eq!(result.step_files().len(), 1);
}

#[test]
fn test_prepare_requires_current_step() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &[]);
    assert!(!runner.prepare_for_measure_run());
    assert!(!runner.step_in_progress());
}

#[test]
fn test_prepare_twice_is_rejected() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    assert!(runner.prepare_for_measure_run());
    runner.register_info("first");
    assert!(!runner.prepare_for_measure_run());
    assert_eq!(runner.result().step_info(), ["first"]);
}

#[test]
fn test_increment_without_prepare_fails() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    assert!(!runner.increment_step());
    assert_eq!(runner.workflow().current_step_index(), 0);
}

#[test]
fn test_try_variants_report_the_reason() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);

    let err = runner.try_increment_step().unwrap_err();
    assert!(err.is_workflow());
    assert_eq!(err.code(), ErrorCode::WORKFLOW_NO_STEP_IN_PROGRESS);
    assert_eq!(err.user_message(), "Workflow error at step '0': Not prepared for step");

    runner.try_prepare_for_measure_run().unwrap();
    let err = runner.try_prepare_for_measure_run().unwrap_err();
    assert_eq!(err.code(), ErrorCode::WORKFLOW_STEP_IN_PROGRESS);

    assert!(!runner.try_increment_step().unwrap());
    let err = runner.try_prepare_for_measure_run().unwrap_err();
    assert_eq!(err.code(), ErrorCode::WORKFLOW_NO_CURRENT_STEP);

    runner.halt_workflow(CompletedStatus::Cancel);
    let err = runner.try_prepare_for_measure_run().unwrap_err();
    assert_eq!(err.code(), ErrorCode::WORKFLOW_HALTED);
}

#[cfg(unix)]
#[test]
fn test_symlinked_outputs_are_recorded() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("eplusout.sql"), "sql").unwrap();
    let mut runner = runner_in(&temp, &["A"]);

    runner.prepare_for_measure_run();
    std::os::unix::fs::symlink(
        temp.path().join("eplusout.sql"),
        temp.path().join("results.sql"),
    )
    .unwrap();
    runner.increment_step();

    let result = runner.workflow().workflow_steps()[0].result().unwrap();
    let expected = fs::canonicalize(temp.path()).unwrap().join("results.sql");
    assert_eq!(result.step_files(), [expected]);
}

#[test]
fn test_step_lifecycle() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("existing.txt"), "old").unwrap();
    let mut runner = runner_in(&temp, &["A", "B"]);

    assert!(runner.prepare_for_measure_run());
    assert_eq!(runner.result().step_result(), Some(StepResult::Success));
    assert!(runner.result().started_at().is_some());

    writeln!(runner.stdout(), "building geometry").unwrap();
    write!(runner.stderr(), "warning: slow").unwrap();
    fs::write(temp.path().join("report.html"), "<html/>").unwrap();
    fs::create_dir(temp.path().join("subdir")).unwrap();
    runner.register_value("Total Floor Area", 1200.5);

    assert!(runner.increment_step());
    assert!(!runner.step_in_progress());
    assert_eq!(runner.workflow().current_step_index(), 1);

    let result = runner.workflow().workflow_steps()[0].result().unwrap();
    assert_eq!(result.stdout(), Some("building geometry\n"));
    assert_eq!(result.stderr(), Some("warning: slow"));
    assert!(result.completed_at().is_some());
    assert_eq!(result.step_values()[0].name, "total_floor_area");

    let expected = fs::canonicalize(temp.path()).unwrap().join("report.html");
    assert_eq!(result.step_files(), [expected]);

    assert!(runner.prepare_for_measure_run());
    assert!(!runner.increment_step());
    assert!(runner.workflow().current_step().is_none());
}

#[test]
fn test_unset_status_defaults_to_skip() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();
    runner.result.reset_step_result();
    runner.increment_step();

    let result = runner.workflow().workflow_steps()[0].result().unwrap();
    assert_eq!(result.step_result(), Some(StepResult::Skip));
}

#[test]
fn test_register_methods() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    assert!(runner.register_warning("careful"));
    assert!(runner.register_info("fyi"));
    runner.register_initial_condition("start 1");
    runner.register_initial_condition("start 2");
    runner.register_final_condition("done");
    assert_eq!(runner.result().step_result(), Some(StepResult::Success));

    runner.register_as_not_applicable("nothing to do");
    assert_eq!(runner.result().step_result(), Some(StepResult::NotApplicable));

    runner.register_error("broken");
    assert_eq!(runner.result().step_result(), Some(StepResult::Fail));

    let result = runner.result();
    assert_eq!(result.step_warnings(), ["careful"]);
    assert_eq!(result.step_info(), ["fyi", "nothing to do"]);
    assert_eq!(result.step_errors(), ["broken"]);
    assert_eq!(result.initial_condition(), Some("start 2"));
    assert_eq!(result.final_condition(), Some("done"));
}

#[test]
fn test_register_value_appends_duplicates() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    runner.register_value("Count", 1);
    runner.register_value_with("Count", Some("Object Count"), 2, Some("ea"));

    let values = runner.result().step_values();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1].name, "count");
    assert_eq!(values[1].display_name.as_deref(), Some("Object Count"));
    assert_eq!(values[1].units.as_deref(), Some("ea"));
    assert_eq!(values[1].value, Variant::Integer(2));
}

#[test]
fn test_register_value_skips_non_finite() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    runner.register_value("EUI", f64::NAN);

    assert!(runner.result().step_values().is_empty());
    assert!(runner.result().step_warnings()[0].contains("not a finite number"));
    assert!(runner.result().step_errors().is_empty());
}

#[test]
fn test_validate_user_arguments_rejects_non_finite() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let script_ratio = OsArgument::double("ratio", true);
    let mut user_ratio = script_ratio.clone();
    user_ratio.set_value(f64::INFINITY);

    assert!(!runner.validate_user_arguments(&[script_ratio], &argument_map([user_ratio])));
    assert!(runner.result().step_values().is_empty());
    assert!(runner.result().step_errors()[0].contains("not a finite number"));
}

#[test]
fn test_halt_blocks_prepare() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A", "B"]);
    runner.halt_workflow(CompletedStatus::Cancel);

    assert!(runner.halted());
    assert_eq!(runner.workflow().completed_status(), Some("Cancel"));
    assert!(!runner.prepare_for_measure_run());
    assert!(runner.workflow().workflow_steps()[0].result().is_none());
}

#[test]
fn test_reset_keeps_preferences() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.set_units_preference("SI");
    runner.set_language_preference("fr");
    runner.set_last_model_path(temp.path().join("in.osm"));
    runner.halt_workflow(CompletedStatus::Fail);

    runner.reset();
    assert!(!runner.halted());
    assert!(runner.workflow().completed_status().is_none());
    assert!(runner.last_model_path().is_none());
    assert_eq!(runner.units_preference(), "SI");
    assert_eq!(runner.language_preference(), "fr");

    runner.reset_units_preference();
    runner.reset_language_preference();
    assert_eq!(runner.units_preference(), "IP");
    assert_eq!(runner.language_preference(), "en");
}

#[test]
fn test_writers_pass_through_when_idle() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    write!(runner.stdout(), "").unwrap();

    runner.prepare_for_measure_run();
    write!(runner.stdout(), "captured").unwrap();
    runner.increment_step();

    let result = runner.workflow().workflow_steps()[0].result().unwrap();
    assert_eq!(result.stdout(), Some("captured"));
}

#[test]
fn test_validate_user_arguments_is_all_or_nothing() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let script = vec![
        OsArgument::double("r_value", true),
        OsArgument::string("label", true),
    ];
    let mut label = OsArgument::string("label", true);
    label.set_value("north wall");
    let user = argument_map([label]);

    assert!(!runner.validate_user_arguments(&script, &user));
    assert!(runner.result().step_values().is_empty());
    assert_eq!(runner.result().step_errors().len(), 1);
    assert_eq!(runner.result().step_result(), Some(StepResult::Fail));
}

#[test]
fn test_validate_user_arguments_records_values() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let mut script_ratio = OsArgument::double("wwr", true);
    script_ratio.set_default_value(0.4);
    let mut user_ratio = script_ratio.clone();
    user_ratio.set_value(0.3);
    let optional = OsArgument::boolean("verbose", false);

    let script = vec![script_ratio, optional];
    let user = argument_map([user_ratio]);

    assert!(runner.validate_user_arguments(&script, &user));
    let values = runner.result().step_values();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].name, "wwr");
    assert_eq!(values[0].value, Variant::Double(0.3));
    assert!(runner.result().step_warnings().is_empty());
}

#[test]
fn test_validate_user_arguments_checks_domain() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let mut script_stories = OsArgument::integer("stories", true);
    script_stories.set_min_max(1, 5);
    let mut user_stories = script_stories.clone();
    user_stories.set_value(9);

    assert!(!runner.validate_user_arguments(&[script_stories], &argument_map([user_stories])));
    assert!(runner.result().step_errors()[0].contains("not in the domain [1, 5]"));
}

#[test]
fn test_validate_user_arguments_warns_on_mismatch() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let mut script_arg = OsArgument::integer("count", false);
    script_arg.set_default_value(1);
    let mut user_arg = OsArgument::integer("count", false);
    user_arg.set_value(3);

    assert!(runner.validate_user_arguments(&[script_arg], &argument_map([user_arg])));
    assert_eq!(runner.result().step_warnings().len(), 1);

    let user_wrong_type = argument_map([OsArgument::string("count", false)]);
    let script_arg = OsArgument::integer("count", false);
    assert!(!runner.validate_user_arguments(&[script_arg], &user_wrong_type));
    assert!(runner.result().step_errors()[0].contains("does not match script argument type"));
}

#[test]
fn test_typed_argument_accessors() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let mut flag = OsArgument::boolean("flag", true);
    flag.set_default_value(true);
    let mut ratio = OsArgument::double("ratio", true);
    ratio.set_value(2);
    let mut weather = OsArgument::path("weather", true);
    weather.set_value("files/in.epw");
    let user = argument_map([flag, ratio, weather]);

    assert!(runner.get_bool_argument_value("flag", &user).unwrap());
    assert_eq!(runner.get_double_argument_value("ratio", &user).unwrap(), 2.0);
    assert_eq!(runner.get_string_argument_value("ratio", &user).unwrap(), "2");
    assert_eq!(
        runner.get_path_argument_value("weather", &user).unwrap(),
        PathBuf::from("files/in.epw")
    );
    assert!(runner.result().step_errors().is_empty());

    assert_eq!(runner.get_optional_integer_argument_value("missing", &user), None);
    assert_eq!(runner.get_optional_bool_argument_value("flag", &user), Some(true));
    assert!(runner.result().step_errors().is_empty());

    let err = runner.get_integer_argument_value("missing", &user).unwrap_err();
    assert_eq!(err.code(), crate::error::ErrorCode::VALIDATION_MISSING_ARGUMENT);
    assert_eq!(runner.result().step_errors(), ["No value found for argument 'missing'."]);

    let err = runner.get_integer_argument_value("flag", &user).unwrap_err();
    assert_eq!(err.code(), crate::error::ErrorCode::VALIDATION_INVALID_TYPE);
    assert_eq!(runner.result().step_errors().len(), 2);
}

#[test]
fn test_get_argument_values() {
    let temp = TempDir::new().unwrap();
    let mut runner = runner_in(&temp, &["A"]);
    runner.prepare_for_measure_run();

    let mut script_name = OsArgument::string("name", false);
    script_name.set_default_value("Zone");
    let mut user_name = script_name.clone();
    user_name.clear_value();

    let values = runner
        .get_argument_values(&[script_name], &argument_map([user_name]))
        .unwrap();
    assert_eq!(values["name"], "Zone");

    let missing = OsArgument::double("required", true);
    assert!(runner
        .get_argument_values(&[missing], &ArgumentMap::new())
        .is_err());
    assert!(runner
        .result()
        .step_errors()
        .iter()
        .any(|e| e == "Invalid argument values."));
}

#[test]
fn test_past_step_values() {
    let mut first = MeasureStep::new("IncreaseWallRValue");
    first.set_name("Walls");
    let second = MeasureStep::new("ReportingMeasure");
    let mut workflow = WorkflowJson::new();
    workflow.set_workflow_steps(vec![first.into(), second.into()]);

    let ids: Vec<_> = workflow.workflow_steps().iter().map(|s| s.id()).collect();
    let mut ok = WorkflowStepResult::new();
    ok.set_step_result(StepResult::Success);
    ok.add_step_value(WorkflowStepValue::new("r_value", 13.0)).unwrap();
    ok.measure_mut().name = Some("increase_r_value".to_string());
    workflow.update_step(ids[0], |s| s.set_result(ok));

    let mut failed = WorkflowStepResult::new();
    failed.set_step_result(StepResult::Fail);
    failed.add_step_value(WorkflowStepValue::new("r_value", 99.0)).unwrap();
    workflow.update_step(ids[1], |s| s.set_result(failed));

    let runner = OsRunner::new(workflow);
    for key in ["increasewallrvalue", "WALLS", "Increase_R_Value"] {
        let values = runner.get_past_step_values_for_measure(key);
        assert_eq!(values["r_value"], 13.0, "matching on {}", key);
    }
    assert!(runner.get_past_step_values_for_measure("ReportingMeasure").is_empty());

    let by_name = runner.get_past_step_values_for_name("R_VALUE");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name["Walls"], 13.0);
}

#[test]
fn test_last_artifacts_load_lazily() {
    let temp = TempDir::new().unwrap();
    let model_path = temp.path().join("out.osm");
    fs::write(&model_path, "OS:Version,3.7.0;").unwrap();

    let mut runner = OsRunner::new(WorkflowJson::new());
    assert!(runner.last_model().is_none());

    runner.set_last_model_path(&model_path);
    assert_eq!(
        runner.last_model_path(),
        Some(fs::canonicalize(&model_path).unwrap().as_path())
    );
    assert_eq!(runner.last_model().unwrap().text(), "OS:Version,3.7.0;");

    runner.set_last_epw_file(ArtifactFile {
        path: PathBuf::from("in.epw"),
        contents: b"LOCATION".to_vec(),
    });
    assert!(runner.last_epw_file_path().is_none());
    assert_eq!(runner.last_epw_file().unwrap().text(), "LOCATION");

    runner.set_last_sql_file_path(temp.path().join("missing.sql"));
    assert!(runner.last_sql_file().is_none());

    runner.reset_last_model();
    assert!(runner.last_model().is_none());
}

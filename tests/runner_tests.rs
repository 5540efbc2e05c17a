mod common;

use common::{WorkflowFixtureBuilder, SAMPLE_OSW};
use osworkflow::config::RunnerConfig;
use osworkflow::runner::{argument_map, OsArgument};
use osworkflow::workflow::{
    CompletedStatus, MeasureStep, MeasureType, StepResult, WorkflowJson, WorkflowStep,
};
use osworkflow::OsRunner;
use std::fs;
use std::io::Write;

fn quiet() -> RunnerConfig {
    RunnerConfig {
        echo_captured_output: false,
        ..RunnerConfig::default()
    }
}

#[test]
fn test_minimal_workflow_scenario() {
    let fixture = WorkflowFixtureBuilder::new().unwrap().build().unwrap();
    let mut workflow = WorkflowJson::new();
    workflow.set_workflow_steps(vec![WorkflowStep::from(MeasureStep::new("dummy"))]);
    let step_id = workflow.workflow_steps()[0].id();

    let mut runner = OsRunner::with_config(workflow, &quiet()).with_working_dir(fixture.path());
    assert!(runner.prepare_for_measure_run());
    runner.register_initial_condition("x");
    runner.register_final_condition("y");
    assert!(!runner.increment_step());

    let workflow = runner.into_workflow();
    assert!(workflow.current_step().is_none());
    let result = workflow.step(step_id).unwrap().result().unwrap();
    assert_eq!(result.step_result(), Some(StepResult::Success));
    assert_eq!(result.initial_condition(), Some("x"));
    assert_eq!(result.final_condition(), Some("y"));
}

#[test]
fn test_captured_output_lands_in_result() {
    let fixture = WorkflowFixtureBuilder::new().unwrap().build().unwrap();
    let mut workflow = WorkflowJson::new();
    workflow.set_workflow_steps(vec![
        WorkflowStep::from(MeasureStep::new("first")),
        WorkflowStep::from(MeasureStep::new("second")),
    ]);
    let mut runner = OsRunner::with_config(workflow, &quiet()).with_working_dir(fixture.path());

    runner.prepare_for_measure_run();
    writeln!(runner.stdout(), "line one").unwrap();
    writeln!(runner.stderr(), "err one").unwrap();
    runner.increment_step();

    runner.prepare_for_measure_run();
    write!(runner.stdout(), "line two").unwrap();
    runner.increment_step();

    let steps = runner.workflow().workflow_steps();
    assert_eq!(steps[0].result().unwrap().stdout(), Some("line one\n"));
    assert_eq!(steps[0].result().unwrap().stderr(), Some("err one\n"));
    assert_eq!(steps[1].result().unwrap().stdout(), Some("line two"));
    assert_eq!(steps[1].result().unwrap().stderr(), Some(""));
}

#[test]
fn test_two_runners_capture_independently() {
    let fixture = WorkflowFixtureBuilder::new().unwrap().build().unwrap();
    let make = || {
        let mut workflow = WorkflowJson::new();
        workflow.set_workflow_steps(vec![WorkflowStep::from(MeasureStep::new("m"))]);
        OsRunner::with_config(workflow, &quiet()).with_working_dir(fixture.path())
    };
    let mut a = make();
    let mut b = make();

    a.prepare_for_measure_run();
    b.prepare_for_measure_run();
    write!(a.stdout(), "from a").unwrap();
    write!(b.stdout(), "from b").unwrap();
    a.increment_step();
    b.increment_step();

    let out = |r: &OsRunner| {
        r.workflow().workflow_steps()[0]
            .result()
            .unwrap()
            .stdout()
            .map(str::to_string)
    };
    assert_eq!(out(&a).as_deref(), Some("from a"));
    assert_eq!(out(&b).as_deref(), Some("from b"));
}

#[test]
fn test_run_and_save_workflow() {
    let fixture = WorkflowFixtureBuilder::new()
        .unwrap()
        .with_measure("SetWindowToWallRatioByFacade", MeasureType::ModelMeasure)
        .with_measure("ReportingMeasure", MeasureType::ReportingMeasure)
        .build()
        .unwrap();
    let osw = fixture.create_file("in.osw", SAMPLE_OSW).unwrap();
    let run_dir = fixture.join("run");
    fs::create_dir_all(&run_dir).unwrap();

    let mut workflow = WorkflowJson::from_path(&osw).unwrap();
    assert!(workflow.validate_measures());
    workflow.start();

    let mut runner = OsRunner::with_config(workflow, &quiet()).with_working_dir(&run_dir);
    let mut step = 0;
    loop {
        let measure_step = runner.workflow().current_step().unwrap().as_measure().unwrap().clone();
        let measure = runner.workflow().get_bcl_measure(&measure_step).unwrap();
        assert!(runner.prepare_for_measure_run_with(&measure));

        if step == 0 {
            let mut wwr = OsArgument::double("wwr", true);
            wwr.set_min_max(0.0, 1.0);
            let mut user_wwr = wwr.clone();
            user_wwr.set_value(0.4);
            assert!(runner.validate_user_arguments(&[wwr], &argument_map([user_wwr])));
            fs::write(run_dir.join("in.osm"), "OS:Version").unwrap();
            runner.set_last_model_path(run_dir.join("in.osm"));
        } else {
            let wwr = runner.get_past_step_values_for_measure("SetWindowToWallRatioByFacade");
            assert_eq!(wwr["wwr"], 0.4);
            runner.register_as_not_applicable("No report requested");
        }

        step += 1;
        if !runner.increment_step() {
            break;
        }
    }
    assert_eq!(step, 2);
    assert!(runner.last_model().is_some());

    runner.workflow_mut().set_completed_status(CompletedStatus::Success);
    let mut workflow = runner.into_workflow();
    let out = workflow.absolute_out_path();
    workflow.save_as(&out).unwrap();

    let saved = WorkflowJson::from_path(fixture.join("out.osw")).unwrap();
    assert_eq!(saved.completed_status(), Some("Success"));
    assert_eq!(saved.current_step_index(), 2);

    let first = saved.workflow_steps()[0].result().unwrap();
    assert_eq!(first.step_result(), Some(StepResult::Success));
    assert_eq!(
        first.measure().class_name.as_deref(),
        Some("SetWindowToWallRatioByFacade")
    );
    assert_eq!(first.step_files(), [run_dir.join("in.osm")]);

    let second = saved.workflow_steps()[1].result().unwrap();
    assert_eq!(second.step_result(), Some(StepResult::NotApplicable));
    assert_eq!(second.step_info(), ["No report requested"]);
    assert!(second.step_files().is_empty());
}

#[test]
fn test_config_applies_to_runner() {
    let config = RunnerConfig {
        units_preference: "SI".to_string(),
        language_preference: "de".to_string(),
        register_msg_also_logs: true,
        echo_captured_output: false,
    };
    let runner = OsRunner::with_config(WorkflowJson::new(), &config);
    assert_eq!(runner.units_preference(), "SI");
    assert_eq!(runner.language_preference(), "de");
    assert!(runner.register_msg_also_logs());
}

// tests/flow_execution_tests.rs
mod common;

use common::*;
use kartflow::{ContextData, Flow, FlowControl, FlowError, FlowResult};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn test_flow_runs_steps_in_order() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "ordered",
    &[("step1", false, None), ("step2", false, None), ("step3", false, None)],
  );

  flow.on_root("step1", create_simple_handler("step1", " S1"));
  flow.on_root("step2", create_simple_handler("step2", " S2"));
  flow.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), FlowResult::Completed);
  let guard = ctx.read();
  assert_eq!(guard.counter, 3);
  assert_eq!(guard.message, " S1 S2 S3");
  assert_eq!(guard.steps_executed, vec!["step1", "step2", "step3"]);
}

#[tokio::test]
#[serial]
async fn test_before_on_after_run_in_phase_order() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("phases", &[("only", false, None)]);

  flow.after_root("only", create_simple_handler("after", "c"));
  flow.on_root("only", create_simple_handler("on", "b"));
  flow.before_root("only", create_simple_handler("before", "a"));

  let ctx = ContextData::new(TestContext::default());
  flow.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().message, "abc");
  assert_eq!(ctx.read().steps_executed, vec!["before", "on", "after"]);
}

#[tokio::test]
#[serial]
async fn test_flow_stops_on_flow_control_stop() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "stopping",
    &[("stepA", false, None), ("stopStep", false, None), ("stepC", false, None)],
  );

  flow.on_root("stepA", create_simple_handler("stepA", "A"));
  flow.on_root("stopStep", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push("stopStep".to_string());
      Ok::<FlowControl, FlowError>(FlowControl::Stop)
    })
  });
  flow.on_root("stepC", create_simple_handler("stepC", "C"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap(), FlowResult::Stopped);
  let guard = ctx.read();
  assert_eq!(guard.message, "A");
  assert_eq!(guard.steps_executed, vec!["stepA", "stopStep"]);
}

#[tokio::test]
#[serial]
async fn test_flow_propagates_handler_error() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "failing",
    &[("good_step", false, None), ("bad_step", false, None), ("another_step", false, None)],
  );

  flow.on_root("good_step", create_simple_handler("good_step", "Good"));
  flow.on_root("bad_step", create_failing_handler("bad_step", "I am a bad step!"));
  flow.on_root("another_step", create_simple_handler("another_step", "NeverRun"));

  let ctx = ContextData::new(TestContext::default());
  let result = flow.run(ctx.clone()).await;

  assert_eq!(result.unwrap_err(), TestError::Handler("I am a bad step!".to_string()));
  let guard = ctx.read();
  assert_eq!(guard.counter, 1);
  assert_eq!(guard.steps_executed, vec!["good_step", "bad_step"]);
}

#[tokio::test]
#[serial]
async fn test_flow_skips_step_if_condition_met() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "skipping",
    &[
      ("step1", false, None),
      (
        "step_to_skip",
        false,
        Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().counter > 0)),
      ),
      ("step3", false, None),
    ],
  );

  flow.on_root("step1", create_simple_handler("step1", " S1"));
  flow.on_root("step_to_skip", create_simple_handler("step_to_skip", " SKIPPED_THIS"));
  flow.on_root("step3", create_simple_handler("step3", " S3"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx.read().message, " S1 S3");
}

#[tokio::test]
#[serial]
async fn test_skip_condition_can_be_set_and_cleared_after_definition() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("late_skip", &[("first", false, None), ("second", false, None)]);
  flow.on_root("first", create_simple_handler("first", "1"));
  flow.on_root("second", create_simple_handler("second", "2"));

  flow.set_skip_condition(
    "second",
    Some(Arc::new(|ctx: ContextData<TestContext>| ctx.read().counter >= 1)),
  );
  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["first"]);

  flow.set_skip_condition("second", None);
  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["first", "second"]);
}

#[test]
#[should_panic(expected = "is not defined")]
fn test_skip_condition_for_unknown_step_panics() {
  let mut flow = Flow::<TestContext, TestError>::new("late_skip_typo", &[("real", false, None)]);
  flow.set_skip_condition("reel", None);
}

#[tokio::test]
#[serial]
async fn test_non_optional_step_without_handlers_fails() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("missing", &[("step1", false, None), ("empty", false, None)]);
  flow.on_root("step1", create_simple_handler("step1", "x"));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  match err {
    TestError::Flow(msg) => assert!(msg.contains("HandlerMissing"), "unexpected message: {msg}"),
    other => panic!("Expected TestError::Flow, got {other:?}"),
  }
}

#[tokio::test]
#[serial]
async fn test_optional_step_without_handlers_is_skipped() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("optional", &[("maybe", true, None), ("step2", false, None)]);
  flow.on_root("step2", create_simple_handler("step2", "2"));

  let ctx = ContextData::new(TestContext::default());
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx.read().steps_executed, vec!["step2"]);
}

#[test]
#[should_panic(expected = "is not defined")]
fn test_registering_handler_for_unknown_step_panics() {
  let mut flow = Flow::<TestContext, TestError>::new("typo", &[("real", false, None)]);
  flow.on_root("reel", create_simple_handler("reel", ""));
}

#[test]
fn test_step_names_preserve_definition_order() {
  let flow = Flow::<TestContext, TestError>::new("named", &[("b", false, None), ("a", true, None)]);
  assert_eq!(flow.name(), "named");
  assert_eq!(flow.step_names(), vec!["b", "a"]);
}

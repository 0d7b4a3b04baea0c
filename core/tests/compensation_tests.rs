// tests/compensation_tests.rs
mod common;

use common::*;
use kartflow::{ContextData, Flow, FlowControl, FlowError, FlowResult};
use serial_test::serial;
use std::sync::Arc;

fn three_step_flow() -> Flow<TestContext, TestError> {
  let mut flow = Flow::<TestContext, TestError>::new(
    "saga",
    &[("reserve", false, None), ("charge", false, None), ("ship", false, None)],
  );
  flow.on_root("reserve", create_simple_handler("reserve", "R"));
  flow.compensate_root("reserve", create_recording_compensator("release"));
  flow.on_root("charge", create_simple_handler("charge", "C"));
  flow.compensate_root("charge", create_recording_compensator("refund"));
  flow
}

#[tokio::test]
#[serial]
async fn test_compensators_run_in_reverse_on_failure() {
  setup_tracing();
  let mut flow = three_step_flow();
  flow.on_root("ship", create_failing_handler("ship", "carrier down"));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("carrier down".to_string()));
  assert_eq!(ctx.read().compensated, vec!["refund", "release"]);
}

#[tokio::test]
#[serial]
async fn test_failing_step_compensates_itself() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("partial", &[("first", false, None), ("second", false, None)]);
  flow.on_root("first", create_simple_handler("first", "1"));
  flow.compensate_root("first", create_recording_compensator("undo_first"));
  // A step that fails halfway still gets its compensator called.
  flow.on_root("second", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().counter += 10;
      Err::<FlowControl, TestError>(TestError::Handler("halfway".to_string()))
    })
  });
  flow.compensate_root("second", |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter -= 10;
      guard.compensated.push("undo_second".to_string());
      Ok::<(), TestError>(())
    })
  });

  let ctx = ContextData::new(TestContext::default());
  assert!(flow.run(ctx.clone()).await.is_err());

  let guard = ctx.read();
  assert_eq!(guard.counter, 1);
  assert_eq!(guard.compensated, vec!["undo_second", "undo_first"]);
}

#[tokio::test]
#[serial]
async fn test_steps_after_failure_are_not_compensated() {
  setup_tracing();
  let mut flow = three_step_flow();
  flow.on_root("ship", create_simple_handler("ship", "S"));
  flow.compensate_root("ship", create_recording_compensator("unship"));
  flow.before_root("charge", create_failing_handler("charge_check", "card declined"));

  let ctx = ContextData::new(TestContext::default());
  assert!(flow.run(ctx.clone()).await.is_err());

  let guard = ctx.read();
  assert_eq!(guard.message, "R");
  assert_eq!(guard.compensated, vec!["refund", "release"]);
}

#[tokio::test]
#[serial]
async fn test_skipped_steps_are_not_compensated() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "skip",
    &[
      ("reserve", false, None),
      ("coupon", false, Some(Arc::new(|_ctx: ContextData<TestContext>| true))),
      ("pay", false, None),
    ],
  );
  flow.on_root("reserve", create_simple_handler("reserve", "R"));
  flow.compensate_root("reserve", create_recording_compensator("release"));
  flow.on_root("coupon", create_simple_handler("coupon", "X"));
  flow.compensate_root("coupon", create_recording_compensator("unhold"));
  flow.on_root("pay", create_failing_handler("pay", "gateway down"));

  let ctx = ContextData::new(TestContext::default());
  assert!(flow.run(ctx.clone()).await.is_err());
  assert_eq!(ctx.read().compensated, vec!["release"]);
}

#[tokio::test]
#[serial]
async fn test_stop_does_not_compensate() {
  setup_tracing();
  let mut flow = three_step_flow();
  flow.on_root("ship", create_simple_handler("ship", "S"));

  let ctx = ContextData::new(TestContext {
    should_stop_at: Some("charge".to_string()),
    ..Default::default()
  });
  assert_eq!(flow.run(ctx.clone()).await.unwrap(), FlowResult::Stopped);
  assert!(ctx.read().compensated.is_empty());
  assert_eq!(ctx.read().message, "RC");
}

#[tokio::test]
#[serial]
async fn test_compensator_failure_does_not_block_others_and_keeps_original_error() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new(
    "sticky",
    &[("a", false, None), ("b", false, None), ("c", false, None)],
  );
  flow.on_root("a", create_simple_handler("a", "a"));
  flow.compensate_root("a", create_recording_compensator("undo_a"));
  flow.on_root("b", create_simple_handler("b", "b"));
  flow.compensate_root("b", create_failing_compensator("undo_b"));
  flow.on_root("c", create_failing_handler("c", "boom"));

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TestError::Handler("boom".to_string()));
  assert_eq!(ctx.read().compensated, vec!["undo_b", "undo_a"]);
}

#[tokio::test]
#[serial]
async fn test_multiple_compensators_on_one_step_run_newest_first() {
  setup_tracing();
  let mut flow = Flow::<TestContext, TestError>::new("multi", &[("step", false, None), ("fail", false, None)]);
  flow.on_root("step", create_simple_handler("step", "s"));
  flow.compensate_root("step", create_recording_compensator("first_registered"));
  flow.compensate_root("step", create_recording_compensator("second_registered"));
  flow.on_root("fail", |_ctx: ContextData<TestContext>| {
    Box::pin(async move { Err::<FlowControl, FlowError>(anyhow::anyhow!("wrapped").into()) })
  });

  let ctx = ContextData::new(TestContext::default());
  let err = flow.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(err, TestError::Flow(ref m) if m.contains("wrapped")));
  assert_eq!(ctx.read().compensated, vec!["second_registered", "first_registered"]);
}

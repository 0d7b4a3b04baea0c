// tests/registry_tests.rs
mod common;

use common::*;
use kartflow::{ContextData, Flow, FlowControl, FlowError, FlowResult, Flows};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextAlpha {
  val: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct RegistryContextBeta {
  num: i32,
}

fn alpha_flow(tag: &'static str) -> Flow<RegistryContextAlpha, TestError> {
  let mut flow = Flow::<RegistryContextAlpha, TestError>::new(format!("alpha_{tag}"), &[("alpha_task", false, None)]);
  flow.on_root("alpha_task", move |ctx: ContextData<RegistryContextAlpha>| {
    Box::pin(async move {
      ctx.write().val = format!("alpha_{tag}");
      Ok::<FlowControl, FlowError>(FlowControl::Continue)
    })
  });
  flow
}

#[tokio::test]
async fn test_registry_runs_flow_for_context_type() {
  setup_tracing();
  let flows = Flows::<TestError>::new();
  flows.register(alpha_flow("v1"));

  let mut beta = Flow::<RegistryContextBeta, TestError>::new("beta", &[("beta_task", false, None)]);
  beta.on_root("beta_task", |ctx: ContextData<RegistryContextBeta>| {
    Box::pin(async move {
      ctx.write().num = 100;
      Ok::<FlowControl, TestError>(FlowControl::Continue)
    })
  });
  flows.register(beta);

  let ctx_alpha = ContextData::new(RegistryContextAlpha::default());
  assert_eq!(flows.run(ctx_alpha.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx_alpha.read().val, "alpha_v1");

  let ctx_beta = ContextData::new(RegistryContextBeta::default());
  assert_eq!(flows.run(ctx_beta.clone()).await.unwrap(), FlowResult::Completed);
  assert_eq!(ctx_beta.read().num, 100);

  assert_eq!(flows.flow_names(), vec!["alpha_v1", "beta"]);
}

#[tokio::test]
async fn test_registry_unknown_context_type() {
  setup_tracing();
  let flows = Flows::<TestError>::new();
  assert!(!flows.is_registered::<RegistryContextAlpha>());

  let result = flows.run(ContextData::new(RegistryContextAlpha::default())).await;
  match result {
    Err(TestError::Flow(msg)) => assert!(msg.contains("NotRegistered"), "unexpected: {msg}"),
    other => panic!("Expected NotRegistered, got {other:?}"),
  }
}

#[tokio::test]
async fn test_registry_later_registration_replaces_earlier() {
  setup_tracing();
  let flows = Flows::<TestError>::new();
  flows.register(alpha_flow("old"));
  flows.register(alpha_flow("new"));

  let ctx = ContextData::new(RegistryContextAlpha::default());
  flows.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().val, "alpha_new");
  assert_eq!(flows.flow_names().len(), 1);
}

#[tokio::test]
async fn test_registry_with_flow_error_as_app_error() {
  setup_tracing();
  let flows: Flows = Flows::default();
  let mut flow = Flow::<RegistryContextBeta, FlowError>::new("plain", &[("t", false, None)]);
  flow.on_root("t", |_ctx: ContextData<RegistryContextBeta>| {
    Box::pin(async move { Err::<FlowControl, FlowError>(FlowError::Internal("nope".to_string())) })
  });
  flows.register(flow);

  let err = flows.run(ContextData::new(RegistryContextBeta::default())).await.unwrap_err();
  assert!(matches!(err, FlowError::Internal(ref m) if m == "nope"));
}

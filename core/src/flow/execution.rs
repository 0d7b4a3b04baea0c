// kartflow/src/flow/execution.rs

//! `Flow::run`: step execution and reverse-order compensation.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{FlowControl, FlowResult};
use crate::error::FlowError;
use crate::flow::definition::Flow;
use tracing::{event, info_span, instrument, Instrument, Level};

enum Phase {
  Continue,
  Stop,
}

impl<TData, Err> Flow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step in order against `ctx_data`.
  ///
  /// On the first handler error, the compensators of all entered steps run
  /// newest-first and the handler's error is returned. Compensator failures
  /// are logged and do not stop the remaining compensators.
  #[instrument(
    name = "Flow::run",
    skip_all,
    fields(flow = %self.name, num_steps = self.steps.len()),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<FlowResult, Err> {
    event!(Level::DEBUG, "Flow starting.");
    let mut entered: Vec<&str> = Vec::with_capacity(self.steps.len());

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_if) = &step_def.skip_if {
        if skip_if(ctx_data.clone()) {
          event!(Level::DEBUG, step = step_name, "Step skipped by condition.");
          continue;
        }
      }

      let has_handlers = [&self.before, &self.on, &self.after]
        .iter()
        .any(|phase| phase.get(step_name).is_some_and(|v| !v.is_empty()));
      if !has_handlers {
        if step_def.optional {
          event!(Level::DEBUG, step = step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step = step_name, "Non-optional step has no handlers.");
        let err = Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        });
        self.compensate(&entered, &ctx_data).await;
        return Err(err);
      }

      entered.push(step_name);
      let step_span = info_span!("flow_step", step = step_name, step_index = step_idx);

      let outcome = async {
        for (phase_name, phase) in [("before", &self.before), ("on", &self.on), ("after", &self.after)] {
          if let Some(handlers) = phase.get(step_name) {
            if let Phase::Stop = Self::run_phase(phase_name, handlers, &ctx_data).await? {
              return Ok(Phase::Stop);
            }
          }
        }
        Ok::<_, Err>(Phase::Continue)
      }
      .instrument(step_span)
      .await;

      match outcome {
        Ok(Phase::Continue) => {}
        Ok(Phase::Stop) => {
          event!(Level::INFO, step = step_name, "Flow stopped by handler.");
          return Ok(FlowResult::Stopped);
        }
        Err(e) => {
          event!(Level::WARN, step = step_name, error = %e, "Step failed, compensating.");
          self.compensate(&entered, &ctx_data).await;
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Flow completed.");
    Ok(FlowResult::Completed)
  }

  async fn run_phase(
    phase_name: &'static str,
    handlers: &[Handler<TData, Err>],
    ctx_data: &ContextData<TData>,
  ) -> Result<Phase, Err> {
    for (handler_idx, handler_fn) in handlers.iter().enumerate() {
      match handler_fn(ctx_data.clone()).await {
        Ok(FlowControl::Continue) => {}
        Ok(FlowControl::Stop) => return Ok(Phase::Stop),
        Err(e) => {
          event!(Level::DEBUG, phase = phase_name, handler_index = handler_idx, error = %e, "Handler failed.");
          return Err(e);
        }
      }
    }
    Ok(Phase::Continue)
  }

  async fn compensate(&self, entered: &[&str], ctx_data: &ContextData<TData>) {
    for step_name in entered.iter().rev() {
      let Some(compensators) = self.compensators.get(*step_name) else {
        continue;
      };
      for compensator in compensators.iter().rev() {
        if let Err(e) = compensator(ctx_data.clone()).await {
          event!(
            Level::ERROR,
            flow = %self.name,
            step = *step_name,
            error = %e,
            "Compensation failed; state may need manual reconciliation."
          );
        }
      }
      event!(Level::DEBUG, step = *step_name, "Step compensated.");
    }
  }
}

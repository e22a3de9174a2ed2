// marketplace/src/pipeline/execution.rs

use super::context_data::ContextData;
use super::control::{PipelineControl, PipelineResult};
use super::definition::{Pipeline, PipelineError};
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// Runs the steps in declaration order against `ctx_data`.
  ///
  /// The first error from a required step aborts the run and is returned.
  /// Errors from best-effort steps are logged at `warn` and the remaining
  /// handlers of that step are skipped.
  #[instrument(name = "Pipeline::run", skip_all, fields(pipeline = self.name, num_steps = self.steps.len()), err(Display))]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    for (step_index, step) in self.steps.iter().enumerate() {
      let step_span = span!(
        Level::DEBUG,
        "pipeline_step",
        step_name = step.name.as_str(),
        step_index,
        best_effort = step.best_effort
      );

      let handlers = match self.handlers.get(&step.name) {
        Some(handlers) if !handlers.is_empty() => handlers,
        _ if step.best_effort => {
          event!(Level::DEBUG, step = %step.name, "Best-effort step has no handlers, skipping.");
          continue;
        }
        _ => {
          return Err(Err::from(PipelineError::HandlerMissing {
            pipeline: self.name,
            step_name: step.name.clone(),
          }))
        }
      };

      for handler in handlers {
        match handler(ctx_data.clone()).instrument(step_span.clone()).await {
          Ok(PipelineControl::Continue) => {}
          Ok(PipelineControl::Stop) => {
            event!(Level::INFO, step = %step.name, "Pipeline stopped by handler.");
            return Ok(PipelineResult::Stopped);
          }
          Err(e) if step.best_effort => {
            event!(Level::WARN, step = %step.name, error = %e, "Best-effort step failed, continuing.");
            break;
          }
          Err(e) => {
            event!(Level::ERROR, step = %step.name, error = %e, "Step failed.");
            return Err(e);
          }
        }
      }
    }

    event!(Level::DEBUG, "Pipeline completed.");
    Ok(PipelineResult::Completed)
  }
}

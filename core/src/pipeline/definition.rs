// marketplace/src/pipeline/definition.rs

use super::context_data::ContextData;
use super::control::PipelineControl;
use crate::error::MarketError;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A step handler: takes a clone of the shared context and resolves to the
/// control signal for the run.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>> + Send + Sync,
>;

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("Pipeline '{pipeline}': no handler registered for required step '{step_name}'")]
  HandlerMissing { pipeline: &'static str, step_name: String },
}

impl From<PipelineError> for MarketError {
  fn from(err: PipelineError) -> Self {
    MarketError::Internal(err.to_string())
  }
}

#[derive(Debug, Clone)]
pub struct StepDef {
  pub name: String,
  /// A failing best-effort step is logged and the run moves on.
  pub best_effort: bool,
}

pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  pub(crate) name: &'static str,
  pub(crate) steps: Vec<StepDef>,
  pub(crate) handlers: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<PipelineError> + Send + Sync + 'static,
{
  /// `steps` lists `(name, best_effort)` in execution order.
  pub fn new(name: &'static str, steps: &[(&str, bool)]) -> Self {
    Pipeline {
      name,
      steps: steps
        .iter()
        .map(|(step, best_effort)| StepDef {
          name: (*step).to_string(),
          best_effort: *best_effort,
        })
        .collect(),
      handlers: HashMap::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn step_names(&self) -> impl Iterator<Item = &str> {
    self.steps.iter().map(|s| s.name.as_str())
  }

  /// Registers a handler for `step_name`.
  ///
  /// # Panics
  /// If the step was not declared in [`Pipeline::new`]; that is a wiring
  /// mistake, not a runtime condition.
  pub fn on_step<F>(&mut self, step_name: &str, handler: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static)
  where
    F: Future<Output = Result<PipelineControl, Err>> + Send + 'static,
  {
    assert!(
      self.steps.iter().any(|s| s.name == step_name),
      "pipeline '{}' has no step named '{}'",
      self.name,
      step_name
    );
    let boxed: Handler<TData, Err> = Box::new(move |ctx| Box::pin(handler(ctx)));
    self.handlers.entry(step_name.to_string()).or_default().push(boxed);
  }
}

use crate::error::StageError;

use super::traits::Stage;
use super::types::ExitOutcome;

/// Whether `start` succeeded for a stage.
#[derive(Debug, Clone)]
pub(crate) enum Launch {
    Started,
    Failed(String),
}

/// Starts every stage in chain order. A failure is recorded and the rest are still started.
pub(crate) async fn start_all(stages: &mut [Box<dyn Stage>]) -> (Vec<Launch>, Vec<StageError>) {
    let mut launches = Vec::with_capacity(stages.len());
    let mut errors = Vec::new();

    for (index, stage) in stages.iter_mut().enumerate() {
        match stage.start().await {
            Ok(()) => {
                tracing::debug!(index, stage = stage.name(), "stage started");
                launches.push(Launch::Started);
            }
            Err(e) => {
                let message = format!("{e:#}");
                tracing::warn!(index, stage = stage.name(), error = %message, "stage failed to start");
                errors.push(StageError::Start {
                    index,
                    name: stage.name().to_string(),
                    message: message.clone(),
                });
                launches.push(Launch::Failed(message));
            }
        }
    }

    (launches, errors)
}

/// Collects every stage's exit outcome in chain order.
///
/// Must only run once every stream of every stage has been drained. Stages that never
/// started are failed with their start error and are not waited on.
pub(crate) async fn wait_all(
    stages: &mut [Box<dyn Stage>],
    launches: &[Launch],
) -> (Vec<ExitOutcome>, Vec<StageError>) {
    let mut outcomes = Vec::with_capacity(stages.len());
    let mut errors = Vec::new();

    for (index, (stage, launch)) in stages.iter_mut().zip(launches).enumerate() {
        let outcome = match launch {
            Launch::Failed(message) => ExitOutcome::Failed(message.clone()),
            Launch::Started => match stage.wait().await {
                Ok(()) => ExitOutcome::Succeeded,
                Err(e) => {
                    let message = format!("{e:#}");
                    tracing::warn!(index, stage = stage.name(), error = %message, "stage failed");
                    errors.push(StageError::Exit {
                        index,
                        name: stage.name().to_string(),
                        message: message.clone(),
                    });
                    ExitOutcome::Failed(message)
                }
            },
        };
        outcomes.push(outcome);
    }

    (outcomes, errors)
}

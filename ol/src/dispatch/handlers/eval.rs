//! Partial evaluation runs requested mid-iteration

use async_trait::async_trait;
use tracing::{debug, error};

use super::unsupported;
use crate::command::Command;
use crate::dispatch::{ExecutionContext, Handler};
use crate::eval::EvalRunner;
use crate::outcome::Outcome;

/// Runs `run_eval_suite` and stores the results under the current iteration
pub struct EvalHandler {
    runner: EvalRunner,
}

impl EvalHandler {
    pub fn new(runner: EvalRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Handler for EvalHandler {
    fn name(&self) -> &'static str {
        "eval"
    }

    async fn handle(&self, command: &Command, ctx: &mut ExecutionContext) -> Outcome {
        let Command::RunEvalSuite(run) = command else {
            return unsupported(self.name(), command);
        };
        debug!(evals = ?run.evals_to_run, attempts = %run.num_attempts, "EvalHandler::handle: called");

        match self
            .runner
            .run(&ctx.run_id, ctx.iteration, &run.evals_to_run, run.num_attempts)
            .await
        {
            Ok(result) => Outcome::success(result.to_formatted_string(ctx.iteration)).wrapped("eval"),
            Err(e) => {
                error!(error = %e, "Eval suite execution failed");
                Outcome::error(format!("Error during eval suite execution: {}", e)).wrapped("eval")
            }
        }
    }
}

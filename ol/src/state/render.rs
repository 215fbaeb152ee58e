//! Resume context rendered after each collapse

use super::OptimisationState;

const INSTRUCTIONS: &str = "Continue optimizing the system to improve evaluation results. When you have made changes and are ready to test them, use the `end_iteration` action to run evaluations and proceed to the next iteration.\n";

impl OptimisationState {
    /// Markdown summary of everything the optimiser needs to carry on
    pub fn to_context(&self) -> String {
        let mut out = String::from("# Optimization State\n\n");
        let initial = self.initial_result().map(|r| r.score_lines()).unwrap_or_default();

        if self.history().is_empty() {
            out.push_str("## Initial State\n\n");
            out.push_str("This is the first iteration. Initial evaluation results:\n");
            out.push_str(&initial);
            out.push_str("\n\n");
        } else {
            out.push_str("## Optimization History\n\n");
            out.push_str("### Initial State (Before Iteration 0)\n");
            out.push_str(&initial);
            out.push_str("\n\n");
            for entry in self.history() {
                out.push_str(&entry.to_str());
            }
        }

        if let Some(warning) = self.regression() {
            out.push_str("## Regression Detected\n\n");
            let best_label = match warning.best_iteration {
                Some(iteration) => format!("iteration {}", iteration),
                None => "initial state".to_string(),
            };
            out.push_str(&format!(
                "Pass rate dropped from {:.1}% to {:.1}% (iteration {}).\n",
                warning.best, warning.current, warning.regression_iteration
            ));
            out.push_str(&format!(
                "Best recorded state: {} ({:.1}%), saved as snapshot {}\n\n",
                best_label,
                warning.best,
                warning.best_snapshot()
            ));
            out.push_str(&format!(
                "**Consider using `reset_to_iteration` with iteration_number {} to revert to that state before making more changes.**\n\n",
                warning.best_snapshot()
            ));
        }

        let limitations = &self.breakdown().known_limitations;
        if !limitations.is_empty() {
            out.push_str("## Known Limitations\n\n");
            out.push_str("The following evals have been marked as not worth pursuing further:\n");
            for limitation in limitations.values() {
                out.push_str(&format!("- **{}**: {}\n", limitation.eval_name, limitation.reason));
            }
            out.push_str("\n**Do not spend time trying to fix these evals.**\n\n");
        }

        out.push_str("## Current Project Breakdown\n\n");
        out.push_str(&self.breakdown().to_str());
        out.push('\n');

        out.push_str("## Instructions\n\n");
        out.push_str(INSTRUCTIONS);
        out
    }
}

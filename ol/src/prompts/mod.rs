//! Prompt rendering

pub mod embedded;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::extract::ExtractionStrategy;

#[derive(Serialize)]
struct SystemContext<'a> {
    kind_field: &'a str,
    tagged: bool,
}

#[derive(Serialize)]
struct DispatchContext<'a> {
    initial_message: &'a str,
    actions: &'a str,
    attempt_number: u32,
    trajectory: String,
}

/// Renders the embedded templates
pub struct Prompts {
    hbs: Handlebars<'static>,
    kind_field: String,
}

impl Prompts {
    pub fn new(kind_field: impl Into<String>) -> Self {
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);
        Self {
            hbs,
            kind_field: kind_field.into(),
        }
    }

    fn render<T: Serialize>(&self, name: &str, template: &str, context: &T) -> Result<String> {
        debug!(%name, "Prompts::render: called");
        self.hbs
            .render_template(template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", name, e))
    }

    pub fn optimiser_system(&self, strategy: ExtractionStrategy) -> Result<String> {
        self.render(
            "optimiser-system",
            embedded::OPTIMISER_SYSTEM,
            &SystemContext {
                kind_field: &self.kind_field,
                tagged: strategy == ExtractionStrategy::Tagged,
            },
        )
    }

    pub fn trajectory_analysis_system(&self) -> Result<String> {
        self.render(
            "trajectory-analysis-system",
            embedded::TRAJECTORY_ANALYSIS_SYSTEM,
            &SystemContext {
                kind_field: &self.kind_field,
                tagged: false,
            },
        )
    }

    pub fn report_required(&self) -> Result<String> {
        self.render(
            "report-required",
            embedded::REPORT_REQUIRED_MESSAGE,
            &SystemContext {
                kind_field: &self.kind_field,
                tagged: false,
            },
        )
    }

    /// First message for a trajectory analysis agent
    pub fn dispatch_message(
        &self,
        initial_message: &str,
        actions: &str,
        attempt_number: u32,
        trajectory: &[Value],
    ) -> Result<String> {
        let trajectory = serde_json::to_string_pretty(trajectory)?;
        self.render(
            "dispatch",
            embedded::DISPATCH_MESSAGE,
            &DispatchContext {
                initial_message,
                actions,
                attempt_number,
                trajectory,
            },
        )
    }
}

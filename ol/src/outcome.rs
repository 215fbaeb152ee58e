//! Outcome - the `(text, is_error)` pair every operation reports back

use tracing::debug;

/// Result of executing a command or a workspace operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub content: String,
    pub is_error: bool,
}

impl Outcome {
    /// Create a successful outcome
    pub fn success(content: impl Into<String>) -> Self {
        debug!("Outcome::success: called");
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error outcome
    pub fn error(content: impl Into<String>) -> Self {
        debug!("Outcome::error: called");
        Self {
            content: content.into(),
            is_error: true,
        }
    }

    /// Wrap the content in the `<name_output>` block, keeping the error flag
    pub fn wrapped(self, name: &str) -> Self {
        Self {
            content: format_output(name, &self.content),
            is_error: self.is_error,
        }
    }
}

/// Wrap handler output in the uniform tagged block
pub fn format_output(name: &str, content: &str) -> String {
    let tag = format!("{}_output", name);
    format!("<{tag}>\n{content}\n</{tag}>")
}

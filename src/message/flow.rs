use super::ReusableMessage;
use std::fmt::{self, Write};

/// Builds method entry and exit trace messages
///
/// One instance is shared by every logger of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowMessageFactory {
    entry_text: String,
    exit_text: String,
}

impl FlowMessageFactory {
    pub const NAME: &'static str = "default_flow";

    pub fn new() -> Self {
        Self::with_labels("Enter", "Exit")
    }

    pub fn with_labels(entry_text: impl Into<String>, exit_text: impl Into<String>) -> Self {
        Self {
            entry_text: entry_text.into(),
            exit_text: exit_text.into(),
        }
    }

    pub fn entry_text(&self) -> &str {
        &self.entry_text
    }

    pub fn exit_text(&self) -> &str {
        &self.exit_text
    }

    /// `Enter name(a, b)`
    pub fn entry_message(
        &self,
        message: &mut ReusableMessage,
        name: &str,
        params: &[&dyn fmt::Display],
    ) {
        message.set_with(name, |out| {
            let _ = write!(out, "{} {}(", self.entry_text, name);
            for (i, param) in params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", param);
            }
            out.push(')');
        });
    }

    /// `Exit name: result`, or `Exit name` without a result
    pub fn exit_message(
        &self,
        message: &mut ReusableMessage,
        name: &str,
        result: Option<&dyn fmt::Display>,
    ) {
        message.set_with(name, |out| {
            let _ = write!(out, "{} {}", self.exit_text, name);
            if let Some(result) = result {
                let _ = write!(out, ": {}", result);
            }
        });
    }
}

impl Default for FlowMessageFactory {
    fn default() -> Self {
        Self::new()
    }
}

//! CLI error type with context and fix suggestions.

use std::fmt;
use std::path::Path;

/// An error with context and suggestions for fixing it.
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// wp-config.php is not where --wp-root points.
    pub fn wp_config_not_found(path: &Path) -> Self {
        Self::new(format!("wp-config.php not found: {}", path.display()))
            .with_context("--wp-root must point at the WordPress installation root")
            .with_suggestion(format!(
                "TRY: ls {}",
                path.parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ))
    }

    /// The uploads directory is missing or not a directory.
    pub fn uploads_dir_not_found(path: &Path) -> Self {
        Self::new(format!("Uploads directory not found: {}", path.display()))
            .with_context("Attachment files are expected under wp-content/uploads")
            .with_suggestion("TRY: pass --uploads-dir if the site keeps uploads elsewhere")
    }

    /// A size argument did not parse.
    pub fn invalid_size_format(detail: &str) -> Self {
        Self::new(format!("Invalid size: {}", detail))
            .with_suggestion("TRY: a plain byte count (10240) or a unit suffix (10KB, 2MB)")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

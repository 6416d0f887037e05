//! Audiogate Core - Session-validity inference for gated remote audio
//!
//! This crate decides when a failing media element on a page should be
//! explained by a login prompt: it classifies sources against the protected
//! host, binds failure observers, attributes failures, and drives the
//! prompt state machine through to the authentication redirect.

pub mod binder;
pub mod classifier;
pub mod config;
pub mod interpreter;
pub mod page;
pub mod prompt;
pub mod redirect;
pub mod session;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use binder::{BindReport, MediaBinder, TrackedElement};
pub use classifier::{MediaSource, SourceClassifier};
pub use config::GateConfig;
pub use interpreter::{Attribution, FailureInterpreter};
pub use page::{ElementId, FailureEvent, FailureSink, FailureTarget, MediaPage, Navigator, PromptSurface};
pub use prompt::{PromptController, PromptState, Transition};
pub use redirect::{LoginEndpoint, RedirectIntent};
pub use session::{GateEvent, GateSession};

/// Errors surfaced by the gate while setting up or driving a page session.
///
/// Media failures are not errors here: an attributable failure is the
/// expected trigger for the prompt and an unattributable one is ignored.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Presentation layer unavailable: {reason}")]
    PresentationUnavailable { reason: String },

    #[error("Host page error: {reason}")]
    Page { reason: String },

    #[error("URL parsing error: {0}")]
    UrlParsing(#[from] url::ParseError),
}

impl GateError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            GateError::Configuration { reason } => format!("Invalid gate configuration: {reason}"),
            GateError::PresentationUnavailable { .. } => {
                "Login prompt could not be set up on this page".to_string()
            }
            GateError::Page { .. } => "Media elements could not be observed".to_string(),
            GateError::UrlParsing(_) => "Invalid URL".to_string(),
        }
    }

    /// Checks if this error stems from operator-supplied settings.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GateError::Configuration { .. } | GateError::UrlParsing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

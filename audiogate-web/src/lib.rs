//! Audiogate Web - Presentation layer and page tooling
//!
//! Renders the login prompt overlay, models a static HTML page as a host
//! for the gate, and maintains the podcast episode cards the pages carry.

pub mod document;
pub mod episodes;
pub mod prompt;

pub use document::HtmlDocument;
pub use episodes::{Episode, EpisodeBlock, extract_episodes, insert_episode, render_episode_card};
pub use prompt::{OverlaySurface, PromptCopy, click_event};

/// Errors raised by page and catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Missing '{marker}' in page")]
    MissingMarker { marker: String },

    #[error("No episode at position {index} (page has {count})")]
    EpisodeNotFound { index: usize, count: usize },

    #[error("Unknown media target: {reason}")]
    UnknownTarget { reason: String },

    #[error("Invalid episode: {reason}")]
    InvalidEpisode { reason: String },
}

impl From<WebError> for audiogate_core::GateError {
    fn from(error: WebError) -> Self {
        audiogate_core::GateError::Page {
            reason: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

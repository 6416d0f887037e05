//! Host-page abstractions.
//!
//! The gate never touches a DOM directly. A host page exposes its media
//! elements and failure notifications through [`MediaPage`], the login prompt
//! through [`PromptSurface`] and navigation through [`Navigator`]. Browser
//! bindings, static documents and test doubles all plug in at these seams.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::GateError;
use crate::session::GateEvent;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

/// Page-scoped identifier of a media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(u32);

impl ElementId {
    /// Creates an identifier from its raw value.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// A media element as discovered by the one-time page scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredElement {
    pub id: ElementId,
    /// Candidate source URLs in document order
    pub sources: Vec<String>,
}

/// Where a failure observer is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureTarget {
    /// The media element itself, for engines that only surface source
    /// failures at element level
    Element(ElementId),
    /// One candidate source of an element, by position
    Source { element: ElementId, index: usize },
}

impl FailureTarget {
    /// Element the observed target belongs to.
    pub fn element(&self) -> ElementId {
        match self {
            FailureTarget::Element(element) => *element,
            FailureTarget::Source { element, .. } => *element,
        }
    }
}

/// Failure notification from a media element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvent {
    pub element_id: ElementId,
    /// The engine's current source at failure time, if it reports one
    pub reported_source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    /// Creates a failure event stamped with the current time.
    ///
    /// Engines report an empty string when no source is current; that is
    /// normalized to `None`.
    pub fn new(element_id: ElementId, reported_source_url: Option<String>) -> Self {
        Self {
            element_id,
            reported_source_url: reported_source_url.filter(|url| !url.trim().is_empty()),
            timestamp: Utc::now(),
        }
    }
}

/// Observer handed to the host page for one [`FailureTarget`].
///
/// The host calls [`FailureSink::notify`] from its error handler; the event
/// is queued for the owning session and processed in emission order. Sinks
/// hold the channel weakly, so a page full of observers never keeps a
/// closed session's channel alive.
#[derive(Debug, Clone)]
pub struct FailureSink {
    target: FailureTarget,
    sender: mpsc::WeakUnboundedSender<GateEvent>,
}

impl FailureSink {
    pub(crate) fn new(target: FailureTarget, sender: &mpsc::UnboundedSender<GateEvent>) -> Self {
        Self {
            target,
            sender: sender.downgrade(),
        }
    }

    /// Target this sink observes.
    pub fn target(&self) -> FailureTarget {
        self.target
    }

    /// Reports a failure with the engine's current source.
    ///
    /// Returns false when the session or its channel is gone and the event
    /// was dropped.
    pub fn notify(&self, current_source: Option<&str>) -> bool {
        let Some(sender) = self.sender.upgrade() else {
            return false;
        };
        let event = FailureEvent::new(self.target.element(), current_source.map(str::to_string));
        sender.send(GateEvent::MediaFailed(event)).is_ok()
    }
}

/// Playback control over a page's media elements.
pub trait PlaybackControl {
    /// Pauses the element, stopping any buffering indicator.
    fn pause(&mut self, element: ElementId);
}

/// A page hosting media elements.
pub trait MediaPage: PlaybackControl {
    /// Returns every media element currently on the page.
    fn media_elements(&self) -> Vec<DiscoveredElement>;

    /// Attaches a persistent failure observer for the sink's target.
    ///
    /// # Errors
    ///
    /// - `GateError::Page` - The target does not exist or cannot be observed
    fn observe_failures(&mut self, sink: FailureSink) -> Result<(), GateError>;
}

/// The external login prompt surface.
///
/// Both operations must be idempotent: presenting an already visible prompt
/// or dismissing a hidden one has no effect.
pub trait PromptSurface {
    /// Verifies the surface can be shown on this page.
    ///
    /// # Errors
    ///
    /// - `GateError::PresentationUnavailable` - The prompt cannot be rendered
    fn ensure_ready(&self) -> Result<(), GateError> {
        Ok(())
    }

    /// Makes the prompt visible.
    fn present(&mut self);

    /// Hides the prompt.
    fn dismiss(&mut self);
}

/// Navigation to the authentication provider.
pub trait Navigator {
    /// Fully qualified location of the current page.
    fn current_location(&self) -> String;

    /// Leaves the page for the given URL.
    fn navigate(&mut self, url: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_event_normalizes_empty_source() {
        let element = ElementId::new(3);

        assert_eq!(FailureEvent::new(element, Some(String::new())).reported_source_url, None);
        assert_eq!(FailureEvent::new(element, Some("  ".to_string())).reported_source_url, None);
        assert_eq!(
            FailureEvent::new(element, Some("https://a.example/x.mp3".to_string()))
                .reported_source_url
                .as_deref(),
            Some("https://a.example/x.mp3")
        );
    }

    #[test]
    fn test_sink_reports_target_element() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let target = FailureTarget::Source {
            element: ElementId::new(7),
            index: 1,
        };
        let sink = FailureSink::new(target, &sender);

        assert!(sink.notify(Some("https://moodle.ksasz.ch/b.mp3")));

        match receiver.try_recv() {
            Ok(GateEvent::MediaFailed(event)) => {
                assert_eq!(event.element_id, ElementId::new(7));
                assert_eq!(
                    event.reported_source_url.as_deref(),
                    Some("https://moodle.ksasz.ch/b.mp3")
                );
            }
            other => panic!("unexpected event: {other:?}"),
        }

        drop(receiver);
        assert!(!sink.notify(None));
    }

    #[test]
    fn test_sink_does_not_keep_channel_open() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = FailureSink::new(FailureTarget::Element(ElementId::new(0)), &sender);

        drop(sender);

        assert!(!sink.notify(Some("https://moodle.ksasz.ch/b.mp3")));
        assert!(matches!(
            receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }
}

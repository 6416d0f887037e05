//! Failure attribution.
//!
//! Cross-origin responses cannot be inspected, so any load failure on a
//! protected source is taken to mean "authentication required": an HTML
//! login page served in place of audio and an access-denied response look
//! the same from here.

use crate::binder::TrackedElement;
use crate::classifier::SourceClassifier;
use crate::page::FailureEvent;

/// Outcome of attributing one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    /// The engine reported a protected current source.
    Reported { source: String },
    /// No current source was reported; the element's first protected source
    /// is assumed.
    Fallback { source: String },
    /// The failure is not caused by the protected host.
    Unattributed { source: Option<String> },
}

impl Attribution {
    /// Returns true when the failure is attributable to the protected host.
    pub fn is_protected(&self) -> bool {
        !matches!(self, Attribution::Unattributed { .. })
    }

    /// The source the failure was attributed to, if one was resolved.
    pub fn source(&self) -> Option<&str> {
        match self {
            Attribution::Reported { source } | Attribution::Fallback { source } => Some(source),
            Attribution::Unattributed { source } => source.as_deref(),
        }
    }
}

/// Decides whether failures are attributable to the protected host.
#[derive(Debug, Clone)]
pub struct FailureInterpreter {
    classifier: SourceClassifier,
}

impl FailureInterpreter {
    pub fn new(classifier: SourceClassifier) -> Self {
        Self { classifier }
    }

    /// Protected host failures are attributed to, if any.
    pub fn protected_host(&self) -> Option<&str> {
        self.classifier.protected_host()
    }

    /// Resolves the failing source and classifies it.
    pub fn attribute(&self, event: &FailureEvent, element: &TrackedElement) -> Attribution {
        if let Some(reported) = event.reported_source_url.as_deref() {
            return if self.classifier.is_protected(reported) {
                Attribution::Reported {
                    source: reported.to_string(),
                }
            } else {
                Attribution::Unattributed {
                    source: Some(reported.to_string()),
                }
            };
        }

        match element.first_protected_source() {
            Some(source) if self.classifier.is_protected(&source.url) => Attribution::Fallback {
                source: source.url.clone(),
            },
            _ => Attribution::Unattributed { source: None },
        }
    }

    /// Returns true iff the failure is attributable to the protected host.
    pub fn interpret(&self, event: &FailureEvent, element: &TrackedElement) -> bool {
        self.attribute(event, element).is_protected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::page::ElementId;

    const HOST: &str = "moodle.ksasz.ch";

    fn interpreter() -> FailureInterpreter {
        FailureInterpreter::new(SourceClassifier::new(Some(HOST)))
    }

    fn element(sources: &[&str]) -> TrackedElement {
        TrackedElement::new(ElementId::new(1), classify(sources, Some(HOST)))
    }

    #[test]
    fn test_reported_protected_source_is_attributed() {
        let element = element(&["https://archive.org/a.mp3", "https://moodle.ksasz.ch/b.mp3"]);
        let event = FailureEvent::new(element.id, Some("https://moodle.ksasz.ch/b.mp3".to_string()));

        let attribution = interpreter().attribute(&event, &element);

        assert_eq!(
            attribution,
            Attribution::Reported {
                source: "https://moodle.ksasz.ch/b.mp3".to_string()
            }
        );
        assert!(interpreter().interpret(&event, &element));
    }

    #[test]
    fn test_reported_public_source_is_not_attributed() {
        let element = element(&["https://archive.org/a.mp3", "https://moodle.ksasz.ch/b.mp3"]);
        let event = FailureEvent::new(element.id, Some("https://archive.org/a.mp3".to_string()));

        assert!(!interpreter().interpret(&event, &element));
        assert_eq!(
            interpreter().attribute(&event, &element).source(),
            Some("https://archive.org/a.mp3")
        );
    }

    #[test]
    fn test_missing_current_source_falls_back_to_first_protected() {
        let element = element(&[
            "https://archive.org/a.mp3",
            "https://moodle.ksasz.ch/first.mp3",
            "https://moodle.ksasz.ch/second.mp3",
        ]);
        let event = FailureEvent::new(element.id, Some(String::new()));

        assert_eq!(
            interpreter().attribute(&event, &element),
            Attribution::Fallback {
                source: "https://moodle.ksasz.ch/first.mp3".to_string()
            }
        );
    }

    #[test]
    fn test_missing_current_source_without_protected_sources() {
        let element = element(&["https://archive.org/a.mp3"]);
        let event = FailureEvent::new(element.id, None);

        assert_eq!(
            interpreter().attribute(&event, &element),
            Attribution::Unattributed { source: None }
        );
    }
}

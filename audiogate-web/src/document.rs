//! Static HTML page acting as a gate host.
//!
//! Discovers `<audio>` elements and their candidate sources in document
//! order and simulates the media engine's failure notifications, so a page
//! can be checked offline exactly as the gate would see it in a browser.

use std::sync::LazyLock;

use audiogate_core::page::{DiscoveredElement, PlaybackControl};
use audiogate_core::{ElementId, FailureSink, FailureTarget, GateError, MediaPage};
use regex::Regex;

use crate::{Result, WebError};

static AUDIO_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<audio\b([^>]*)>(.*?)</audio>").expect("valid regex"));
static SOURCE_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<source\b([^>]*)>").expect("valid regex"));
static SRC_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
});

/// One `<audio>` element of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioElement {
    pub id: ElementId,
    /// Candidate sources: the element's own `src`, then `<source>` children
    pub sources: Vec<String>,
    /// Source the simulated engine currently plays
    pub current_source: Option<String>,
    pub paused: bool,
}

/// An HTML page with its audio elements and attached observers.
#[derive(Debug)]
pub struct HtmlDocument {
    html: String,
    elements: Vec<AudioElement>,
    observers: Vec<FailureSink>,
    overlay_mounted: bool,
}

impl HtmlDocument {
    /// Parses a page and discovers its audio elements.
    pub fn parse(html: impl Into<String>) -> Self {
        let html = html.into();
        let elements = AUDIO_ELEMENT
            .captures_iter(&html)
            .enumerate()
            .filter_map(|(position, captures)| {
                let Ok(position) = u32::try_from(position) else {
                    tracing::warn!(position, "Audio element beyond the id range skipped");
                    return None;
                };
                let attributes = captures.get(1).map_or("", |m| m.as_str());
                let body = captures.get(2).map_or("", |m| m.as_str());

                let mut sources: Vec<String> = src_attribute(attributes).into_iter().collect();
                sources.extend(
                    SOURCE_ELEMENT
                        .captures_iter(body)
                        .filter_map(|source| src_attribute(source.get(1)?.as_str())),
                );

                Some(AudioElement {
                    id: ElementId::new(position),
                    current_source: sources.first().cloned(),
                    sources,
                    paused: true,
                })
            })
            .collect();

        Self {
            html,
            elements,
            observers: Vec::new(),
            overlay_mounted: false,
        }
    }

    /// Page markup, including a mounted overlay.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn elements(&self) -> &[AudioElement] {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&AudioElement> {
        self.elements.iter().find(|element| element.id == id)
    }

    /// Inserts the overlay markup at the end of `<body>`, once.
    ///
    /// Returns false when an overlay was already mounted.
    pub fn mount_overlay(&mut self, markup: &str) -> bool {
        if self.overlay_mounted {
            return false;
        }

        match self.html.to_ascii_lowercase().rfind("</body>") {
            Some(position) => self.html.insert_str(position, &format!("{markup}\n")),
            None => {
                self.html.push('\n');
                self.html.push_str(markup);
            }
        }
        self.overlay_mounted = true;
        true
    }

    /// Starts playback, making the engine try the element's first source.
    ///
    /// # Errors
    ///
    /// - `WebError::UnknownTarget` - No such element
    pub fn play(&mut self, id: ElementId) -> Result<()> {
        let element = self.element_mut(id)?;
        element.paused = false;
        element.current_source = element.sources.first().cloned();
        Ok(())
    }

    /// Overrides the source the engine reports as current.
    ///
    /// # Errors
    ///
    /// - `WebError::UnknownTarget` - No such element
    pub fn set_current_source(&mut self, id: ElementId, source: Option<&str>) -> Result<()> {
        self.element_mut(id)?.current_source = source.map(str::to_string);
        Ok(())
    }

    /// Simulates a load failure of one candidate source.
    ///
    /// The engine switches its current source to the failing one; the error
    /// reaches source observers and, through capture, element observers.
    /// Returns how many observers were notified.
    ///
    /// # Errors
    ///
    /// - `WebError::UnknownTarget` - No such element or source
    pub fn fail_source(&mut self, id: ElementId, index: usize) -> Result<usize> {
        let element = self.element_mut(id)?;
        let source = element
            .sources
            .get(index)
            .cloned()
            .ok_or_else(|| WebError::UnknownTarget {
                reason: format!("{id} has no source {index}"),
            })?;
        element.current_source = Some(source.clone());

        let notified = self.notify(
            |target| {
                target == FailureTarget::Source { element: id, index }
                    || target == FailureTarget::Element(id)
            },
            Some(&source),
        );
        tracing::debug!(element = %id, source = %source, notified, "Simulated source failure");
        Ok(notified)
    }

    /// Simulates an element-level failure with the engine's current source.
    ///
    /// # Errors
    ///
    /// - `WebError::UnknownTarget` - No such element
    pub fn fail_element(&mut self, id: ElementId) -> Result<usize> {
        let current = self.element_mut(id)?.current_source.clone();
        Ok(self.notify(
            |target| target == FailureTarget::Element(id),
            current.as_deref(),
        ))
    }

    /// Number of observers attached to the page.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn notify(&self, matches: impl Fn(FailureTarget) -> bool, current: Option<&str>) -> usize {
        self.observers
            .iter()
            .filter(|sink| matches(sink.target()))
            .map(|sink| sink.notify(current))
            .filter(|delivered| *delivered)
            .count()
    }

    fn element_mut(&mut self, id: ElementId) -> Result<&mut AudioElement> {
        self.elements
            .iter_mut()
            .find(|element| element.id == id)
            .ok_or_else(|| WebError::UnknownTarget {
                reason: format!("no element {id}"),
            })
    }
}

impl PlaybackControl for HtmlDocument {
    fn pause(&mut self, element: ElementId) {
        if let Ok(element) = self.element_mut(element) {
            element.paused = true;
        }
    }
}

impl MediaPage for HtmlDocument {
    fn media_elements(&self) -> Vec<DiscoveredElement> {
        self.elements
            .iter()
            .map(|element| DiscoveredElement {
                id: element.id,
                sources: element.sources.clone(),
            })
            .collect()
    }

    fn observe_failures(&mut self, sink: FailureSink) -> std::result::Result<(), GateError> {
        let target = sink.target();
        let element = self
            .element(target.element())
            .ok_or_else(|| WebError::UnknownTarget {
                reason: format!("no element {}", target.element()),
            })?;

        if let FailureTarget::Source { index, .. } = target {
            if index >= element.sources.len() {
                return Err(WebError::UnknownTarget {
                    reason: format!("{} has no source {index}", element.id),
                }
                .into());
            }
        }

        self.observers.push(sink);
        Ok(())
    }
}

fn src_attribute(attributes: &str) -> Option<String> {
    let captures = SRC_ATTRIBUTE.captures(attributes)?;
    let value = captures.get(1).or_else(|| captures.get(2))?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

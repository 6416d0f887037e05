//! Mock host-page implementations for testing the gate.

use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    DiscoveredElement, ElementId, FailureSink, FailureTarget, MediaPage, Navigator,
    PlaybackControl, PromptSurface,
};
use crate::GateError;

/// Mock page holding media elements and their attached observers.
#[derive(Debug, Default)]
pub struct MockPage {
    elements: Vec<DiscoveredElement>,
    observers: Vec<FailureSink>,
    paused: Vec<ElementId>,
    refuse_observers: bool,
}

impl MockPage {
    /// Creates an empty page.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element with the given candidate sources.
    pub fn add_element(&mut self, sources: &[&str]) -> ElementId {
        let position = u32::try_from(self.elements.len()).expect("mock page element count fits in u32");
        let id = ElementId::new(position);
        self.elements.push(DiscoveredElement {
            id,
            sources: sources.iter().map(|source| source.to_string()).collect(),
        });
        id
    }

    /// Makes every subsequent `observe_failures` call fail.
    pub fn refuse_observers(&mut self, refuse: bool) {
        self.refuse_observers = refuse;
    }

    /// Targets of all attached observers, in attachment order.
    pub fn observed_targets(&self) -> Vec<FailureTarget> {
        self.observers.iter().map(FailureSink::target).collect()
    }

    /// Fires a source-level failure; returns how many observers were notified.
    pub fn fail_source(&self, element: ElementId, index: usize, current_source: Option<&str>) -> usize {
        self.fire(FailureTarget::Source { element, index }, current_source)
    }

    /// Fires an element-level failure; returns how many observers were notified.
    pub fn fail_element(&self, element: ElementId, current_source: Option<&str>) -> usize {
        self.fire(FailureTarget::Element(element), current_source)
    }

    /// Elements paused so far, in call order.
    pub fn paused(&self) -> &[ElementId] {
        &self.paused
    }

    fn fire(&self, target: FailureTarget, current_source: Option<&str>) -> usize {
        self.observers
            .iter()
            .filter(|sink| sink.target() == target)
            .filter(|sink| sink.notify(current_source))
            .count()
    }
}

impl PlaybackControl for MockPage {
    fn pause(&mut self, element: ElementId) {
        self.paused.push(element);
    }
}

impl MediaPage for MockPage {
    fn media_elements(&self) -> Vec<DiscoveredElement> {
        self.elements.clone()
    }

    fn observe_failures(&mut self, sink: FailureSink) -> Result<(), GateError> {
        if self.refuse_observers {
            return Err(GateError::Page {
                reason: "Mock observer refusal".to_string(),
            });
        }

        self.observers.push(sink);
        Ok(())
    }
}

/// Calls recorded by a [`MockSurface`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceLog {
    pub present_calls: usize,
    pub dismiss_calls: usize,
    pub visible: bool,
}

/// Mock prompt surface sharing its call log with the test.
#[derive(Debug, Clone)]
pub struct MockSurface {
    log: Arc<Mutex<SurfaceLog>>,
    available: bool,
}

impl MockSurface {
    /// Creates an available surface.
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(SurfaceLog::default())),
            available: true,
        }
    }

    /// Creates a surface that fails its readiness check.
    pub fn new_unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Snapshot of the calls recorded so far.
    pub fn log(&self) -> SurfaceLog {
        self.log.lock().clone()
    }
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptSurface for MockSurface {
    fn ensure_ready(&self) -> Result<(), GateError> {
        if self.available {
            Ok(())
        } else {
            Err(GateError::PresentationUnavailable {
                reason: "Mock surface unavailable".to_string(),
            })
        }
    }

    fn present(&mut self) {
        let mut log = self.log.lock();
        log.present_calls += 1;
        log.visible = true;
    }

    fn dismiss(&mut self) {
        let mut log = self.log.lock();
        log.dismiss_calls += 1;
        log.visible = false;
    }
}

/// Mock navigator recording every navigation.
#[derive(Debug, Clone)]
pub struct MockNavigator {
    location: String,
    navigations: Arc<Mutex<Vec<String>>>,
}

impl MockNavigator {
    /// Creates a navigator positioned at the given location.
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            navigations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// URLs navigated to so far.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }
}

impl Navigator for MockNavigator {
    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn navigate(&mut self, url: &str) {
        self.navigations.lock().push(url.to_string());
    }
}

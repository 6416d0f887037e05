//! Page-lifetime gate session.
//!
//! Failure observers and prompt buttons feed [`GateEvent`]s into one
//! unbounded channel. The session drains it in emission order, so every
//! handler runs to completion against a single owned prompt state and no
//! locking is needed.
//!
//! Observers on the page hold the channel weakly. The session keeps it open
//! itself until [`GateSession::run_until_handoff`] starts; from then on the
//! channel closes once every sender from [`GateSession::sender`] is dropped.

use tokio::sync::mpsc;

use crate::Result;
use crate::binder::{BindReport, MediaBinder};
use crate::classifier::SourceClassifier;
use crate::config::GateConfig;
use crate::interpreter::FailureInterpreter;
use crate::page::{FailureEvent, MediaPage, Navigator, PromptSurface};
use crate::prompt::{PromptController, PromptState, Transition};
use crate::redirect::LoginEndpoint;

/// Events processed by a [`GateSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A bound media element or one of its sources failed to load.
    MediaFailed(FailureEvent),
    /// The prompt's cancel button was pressed.
    CancelRequested,
    /// The overlay was clicked, inside or outside its content region.
    OverlayClicked { inside_content: bool },
    /// The prompt's login button was pressed.
    LoginConfirmed,
}

/// Owns every gate component for one page.
pub struct GateSession<P, S, N> {
    page: P,
    navigator: N,
    binder: MediaBinder,
    interpreter: FailureInterpreter,
    controller: PromptController<S>,
    keep_alive: Option<mpsc::UnboundedSender<GateEvent>>,
    weak_sender: mpsc::WeakUnboundedSender<GateEvent>,
    receiver: mpsc::UnboundedReceiver<GateEvent>,
}

impl<P, S, N> GateSession<P, S, N>
where
    P: MediaPage,
    S: PromptSurface,
    N: Navigator,
{
    /// Creates a session for a page.
    ///
    /// Without a protected host the session is inert: nothing is bound and
    /// the prompt never appears.
    ///
    /// # Errors
    ///
    /// - `GateError::Configuration` - The login endpoint cannot be formed
    pub fn new(config: &GateConfig, page: P, surface: S, navigator: N) -> Result<Self> {
        let host = config.normalized_host();
        let endpoint = match host {
            Some(_) => Some(LoginEndpoint::from_config(config)?),
            None => {
                tracing::warn!("No protected host configured, media gating is inert");
                None
            }
        };

        let classifier = SourceClassifier::new(host.as_deref());
        let (sender, receiver) = mpsc::unbounded_channel();

        Ok(Self {
            page,
            navigator,
            binder: MediaBinder::new(classifier.clone()),
            interpreter: FailureInterpreter::new(classifier),
            controller: PromptController::new(surface, endpoint),
            weak_sender: sender.downgrade(),
            keep_alive: Some(sender),
            receiver,
        })
    }

    /// Binds failure observers to every gating candidate on the page.
    ///
    /// # Errors
    ///
    /// - `GateError::PresentationUnavailable` - Gating is active but the
    ///   prompt surface cannot be shown
    /// - `GateError::Page` - The page refused an observer
    pub fn bind_all(&mut self) -> Result<BindReport> {
        if self.is_active() {
            self.controller.surface().ensure_ready()?;
        }

        let sender = self.sender();
        let report = self.binder.bind_all(&mut self.page, &sender)?;
        tracing::info!(
            scanned = report.scanned,
            bound = report.newly_bound,
            observers = report.observers_attached,
            "Media elements bound"
        );
        Ok(report)
    }

    /// Sender for prompt surfaces and other event sources.
    ///
    /// Once the channel has closed the returned sender is disconnected and
    /// every send fails.
    pub fn sender(&self) -> mpsc::UnboundedSender<GateEvent> {
        self.keep_alive
            .clone()
            .or_else(|| self.weak_sender.upgrade())
            .unwrap_or_else(|| mpsc::unbounded_channel().0)
    }

    /// Handles one event.
    pub fn dispatch(&mut self, event: GateEvent) -> Transition {
        match event {
            GateEvent::MediaFailed(failure) => self.handle_failure(&failure),
            GateEvent::CancelRequested => self.controller.cancel(),
            GateEvent::OverlayClicked { inside_content } => {
                self.controller.overlay_clicked(inside_content)
            }
            GateEvent::LoginConfirmed => self.controller.confirm_login(&mut self.navigator),
        }
    }

    /// Handles every queued event in emission order.
    pub fn process_pending(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            transitions.push(self.dispatch(event));
        }
        transitions
    }

    /// Processes events as they arrive until navigation is handed off or
    /// the channel closes.
    ///
    /// The session releases its own sender first, so the loop also returns
    /// once every sender handed out by [`sender`](Self::sender) is dropped
    /// and the queue is drained.
    pub async fn run_until_handoff(&mut self) {
        self.keep_alive = None;

        while !self.controller.is_handed_off() {
            match self.receiver.recv().await {
                Some(event) => {
                    self.dispatch(event);
                }
                None => {
                    tracing::debug!("Gate event channel closed");
                    break;
                }
            }
        }
    }

    fn handle_failure(&mut self, failure: &FailureEvent) -> Transition {
        let Some(element) = self.binder.element(failure.element_id) else {
            tracing::warn!(element = %failure.element_id, "Failure from unknown element");
            return Transition::Ignored;
        };

        if !element.bound {
            return Transition::Ignored;
        }

        let attribution = self.interpreter.attribute(failure, element);
        if !attribution.is_protected() {
            tracing::debug!(
                element = %failure.element_id,
                source = ?attribution.source(),
                "Media failure not attributable to protected host"
            );
            return Transition::Ignored;
        }

        tracing::debug!(
            element = %failure.element_id,
            source = ?attribution.source(),
            "Media failure attributed to protected host"
        );
        self.controller
            .on_protected_failure(failure.element_id, &mut self.page)
    }

    /// Returns true when a protected host is configured.
    pub fn is_active(&self) -> bool {
        self.interpreter.protected_host().is_some()
    }

    pub fn state(&self) -> PromptState {
        self.controller.state()
    }

    pub fn controller(&self) -> &PromptController<S> {
        &self.controller
    }

    pub fn binder(&self) -> &MediaBinder {
        &self.binder
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ElementId;
    use crate::page::test_mocks::{MockNavigator, MockPage, MockSurface};

    type MockSession = GateSession<MockPage, MockSurface, MockNavigator>;

    fn session(page: MockPage, surface: MockSurface) -> MockSession {
        let navigator = MockNavigator::new("https://site.example/episode/12");
        GateSession::new(&GateConfig::for_testing(), page, surface, navigator).unwrap()
    }

    #[test]
    fn test_unavailable_surface_fails_binding() {
        let mut page = MockPage::new();
        page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let mut session = session(page, MockSurface::new_unavailable());

        let result = session.bind_all();

        assert!(matches!(result, Err(crate::GateError::PresentationUnavailable { .. })));
        assert!(session.page().observed_targets().is_empty());
    }

    #[test]
    fn test_inert_session_ignores_unavailable_surface() {
        let mut page = MockPage::new();
        page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let navigator = MockNavigator::new("https://site.example/");
        let mut session = GateSession::new(
            &GateConfig::inert(),
            page,
            MockSurface::new_unavailable(),
            navigator,
        )
        .unwrap();

        let report = session.bind_all().unwrap();

        assert!(!session.is_active());
        assert_eq!(report.newly_bound, 0);
    }

    #[test]
    fn test_failure_from_unknown_element_is_ignored() {
        let surface = MockSurface::new();
        let mut session = session(MockPage::new(), surface.clone());

        let event = FailureEvent::new(ElementId::new(99), Some("https://moodle.ksasz.ch/a.mp3".to_string()));
        assert_eq!(session.dispatch(GateEvent::MediaFailed(event)), Transition::Ignored);
        assert_eq!(surface.log().present_calls, 0);
    }

    #[test]
    fn test_pending_events_processed_in_order() {
        let mut page = MockPage::new();
        let element = page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let surface = MockSurface::new();
        let mut session = session(page, surface.clone());
        session.bind_all().unwrap();

        session.page().fail_source(element, 0, Some("https://moodle.ksasz.ch/a.mp3"));
        session.page().fail_element(element, Some("https://moodle.ksasz.ch/a.mp3"));
        session.sender().send(GateEvent::CancelRequested).unwrap();

        let transitions = session.process_pending();

        assert_eq!(
            transitions,
            vec![
                Transition::Shown { element },
                Transition::Ignored,
                Transition::Dismissed { element },
            ]
        );
        assert_eq!(surface.log().present_calls, 1);
        assert_eq!(surface.log().dismiss_calls, 1);
        assert_eq!(session.state(), PromptState::Hidden);
    }

    #[tokio::test]
    async fn test_run_until_handoff() {
        let mut page = MockPage::new();
        let element = page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let mut session = session(page, MockSurface::new());
        session.bind_all().unwrap();

        session.page().fail_element(element, None);
        session.sender().send(GateEvent::LoginConfirmed).unwrap();
        session.sender().send(GateEvent::CancelRequested).unwrap();

        session.run_until_handoff().await;

        assert!(session.controller().is_handed_off());
        assert_eq!(
            session.navigator().navigations(),
            vec!["https://moodle.ksasz.ch/login/index.php?wantsurl=https%3A%2F%2Fsite.example%2Fepisode%2F12".to_string()]
        );
        assert_eq!(session.state().active_element(), Some(element));
    }

    #[tokio::test]
    async fn test_run_returns_when_senders_are_gone() {
        let mut page = MockPage::new();
        let element = page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let surface = MockSurface::new();
        let mut session = session(page, surface.clone());
        session.bind_all().unwrap();

        let sender = session.sender();
        sender.send(GateEvent::OverlayClicked { inside_content: true }).unwrap();
        drop(sender);

        tokio::time::timeout(std::time::Duration::from_secs(1), session.run_until_handoff())
            .await
            .expect("run loop returns once the channel closes");

        assert!(!session.controller().is_handed_off());
        assert_eq!(session.page().fail_element(element, None), 0);
        assert!(session.sender().send(GateEvent::CancelRequested).is_err());
        assert_eq!(surface.log().present_calls, 0);
    }
}

//! Listener-facing scenarios against a mock page

use audiogate_core::page::test_mocks::{MockNavigator, MockPage, MockSurface};
use audiogate_core::{ElementId, FailureEvent, GateConfig, GateEvent, GateSession, PromptState, Transition};

const MOODLE_SOURCE: &str = "https://moodle.ksasz.ch/b.mp3";
const ARCHIVE_SOURCE: &str = "https://archive.org/a.mp3";
const EPISODE_URL: &str = "https://site.example/episode/12";
const LOGIN_REDIRECT: &str =
    "https://moodle.ksasz.ch/login/index.php?wantsurl=https%3A%2F%2Fsite.example%2Fepisode%2F12";

type MockSession = GateSession<MockPage, MockSurface, MockNavigator>;

fn bound_session(page: MockPage) -> (MockSession, MockSurface, MockNavigator) {
    let surface = MockSurface::new();
    let navigator = MockNavigator::new(EPISODE_URL);
    let mut session = GateSession::new(
        &GateConfig::for_testing(),
        page,
        surface.clone(),
        navigator.clone(),
    )
    .unwrap();
    session.bind_all().unwrap();
    (session, surface, navigator)
}

/// Session with one mixed-source element whose prompt is already shown.
fn shown_session() -> (MockSession, MockSurface, MockNavigator, ElementId) {
    let mut page = MockPage::new();
    let element = page.add_element(&[ARCHIVE_SOURCE, MOODLE_SOURCE]);
    let (mut session, surface, navigator) = bound_session(page);

    session.page().fail_source(element, 1, Some(MOODLE_SOURCE));
    assert_eq!(session.process_pending(), vec![Transition::Shown { element }]);

    (session, surface, navigator, element)
}

#[test]
fn test_protected_source_failure_shows_prompt() {
    let mut page = MockPage::new();
    let element = page.add_element(&[ARCHIVE_SOURCE, MOODLE_SOURCE]);
    let (mut session, surface, _) = bound_session(page);

    assert_eq!(session.page().fail_source(element, 1, Some(MOODLE_SOURCE)), 1);
    let transitions = session.process_pending();

    assert_eq!(transitions, vec![Transition::Shown { element }]);
    assert_eq!(session.state(), PromptState::Shown { active_element: element });
    assert_eq!(surface.log().present_calls, 1);
    assert!(surface.log().visible);
    assert_eq!(session.page().paused(), &[element]);
}

#[test]
fn test_element_failure_without_reported_source_falls_back_to_protected() {
    let mut page = MockPage::new();
    let element = page.add_element(&[ARCHIVE_SOURCE, MOODLE_SOURCE]);
    let (mut session, surface, _) = bound_session(page);

    session.page().fail_element(element, None);

    assert_eq!(session.process_pending(), vec![Transition::Shown { element }]);
    assert_eq!(surface.log().present_calls, 1);
}

#[test]
fn test_unprotected_reported_source_keeps_prompt_hidden() {
    let mut page = MockPage::new();
    let element = page.add_element(&[ARCHIVE_SOURCE, MOODLE_SOURCE]);
    let (mut session, surface, _) = bound_session(page);

    session.page().fail_element(element, Some(ARCHIVE_SOURCE));

    assert_eq!(session.process_pending(), vec![Transition::Ignored]);
    assert_eq!(session.state(), PromptState::Hidden);
    assert_eq!(surface.log().present_calls, 0);
}

#[test]
fn test_unprotected_element_never_prompts() {
    let mut page = MockPage::new();
    let element = page.add_element(&[ARCHIVE_SOURCE]);
    let (mut session, surface, _) = bound_session(page);

    assert!(session.page().observed_targets().is_empty());
    assert_eq!(session.page().fail_element(element, Some(ARCHIVE_SOURCE)), 0);
    assert!(session.process_pending().is_empty());

    // Even a failure injected past the page stays ignored for an unbound element.
    let injected = FailureEvent::new(element, Some(MOODLE_SOURCE.to_string()));
    assert_eq!(session.dispatch(GateEvent::MediaFailed(injected)), Transition::Ignored);

    assert_eq!(session.state(), PromptState::Hidden);
    assert_eq!(surface.log().present_calls, 0);
}

#[test]
fn test_cancel_dismisses_once() {
    let (mut session, surface, _, element) = shown_session();

    assert_eq!(
        session.dispatch(GateEvent::CancelRequested),
        Transition::Dismissed { element }
    );
    assert_eq!(session.dispatch(GateEvent::CancelRequested), Transition::Ignored);

    assert_eq!(session.state(), PromptState::Hidden);
    assert_eq!(session.controller().active_element(), None);
    assert_eq!(surface.log().dismiss_calls, 1);
    assert!(!surface.log().visible);
}

#[test]
fn test_overlay_clicks() {
    let (mut session, surface, _, element) = shown_session();

    assert_eq!(
        session.dispatch(GateEvent::OverlayClicked { inside_content: true }),
        Transition::Ignored
    );
    assert!(session.state().is_shown());

    assert_eq!(
        session.dispatch(GateEvent::OverlayClicked { inside_content: false }),
        Transition::Dismissed { element }
    );
    assert_eq!(surface.log().dismiss_calls, 1);
}

#[test]
fn test_confirm_redirects_with_return_url() {
    let (mut session, _, navigator, element) = shown_session();

    let transition = session.dispatch(GateEvent::LoginConfirmed);

    let Transition::HandedOff { element: handed, intent } = transition else {
        panic!("expected handoff, got {transition:?}");
    };
    assert_eq!(handed, element);
    assert_eq!(intent.return_url, EPISODE_URL);
    assert_eq!(intent.url(), LOGIN_REDIRECT);
    assert_eq!(navigator.navigations(), vec![LOGIN_REDIRECT.to_string()]);
}

#[test]
fn test_handoff_is_terminal() {
    let (mut session, surface, navigator, element) = shown_session();
    session.dispatch(GateEvent::LoginConfirmed);

    session.page().fail_source(element, 1, Some(MOODLE_SOURCE));
    session.sender().send(GateEvent::CancelRequested).unwrap();
    session.sender().send(GateEvent::LoginConfirmed).unwrap();

    assert!(
        session
            .process_pending()
            .iter()
            .all(|transition| *transition == Transition::Ignored)
    );
    assert_eq!(navigator.navigations().len(), 1);
    assert_eq!(surface.log().dismiss_calls, 0);
}

#[test]
fn test_second_protected_element_reattributes_without_restacking() {
    let mut page = MockPage::new();
    let first = page.add_element(&[MOODLE_SOURCE]);
    let second = page.add_element(&["https://moodle.ksasz.ch/c.m4a"]);
    let (mut session, surface, _) = bound_session(page);

    session.page().fail_element(first, Some(MOODLE_SOURCE));
    session.page().fail_element(second, Some("https://moodle.ksasz.ch/c.m4a"));

    assert_eq!(
        session.process_pending(),
        vec![
            Transition::Shown { element: first },
            Transition::ActiveUpdated {
                previous: first,
                element: second,
            },
        ]
    );
    assert_eq!(session.controller().active_element(), Some(second));
    assert_eq!(surface.log().present_calls, 1);
}

#[test]
fn test_prompt_can_reopen_after_cancel() {
    let (mut session, surface, _, element) = shown_session();
    session.dispatch(GateEvent::CancelRequested);

    session.page().fail_source(element, 1, Some(MOODLE_SOURCE));

    assert_eq!(session.process_pending(), vec![Transition::Shown { element }]);
    assert_eq!(surface.log().present_calls, 2);
    assert_eq!(session.page().paused(), &[element, element]);
}

#[tokio::test]
async fn test_async_loop_stops_at_handoff() {
    let (mut session, _, navigator, _) = shown_session();
    let sender = session.sender();

    let feeder = tokio::spawn(async move {
        sender.send(GateEvent::OverlayClicked { inside_content: true }).unwrap();
        sender.send(GateEvent::LoginConfirmed).unwrap();
    });

    session.run_until_handoff().await;
    feeder.await.unwrap();

    assert!(session.controller().is_handed_off());
    assert_eq!(navigator.navigations(), vec![LOGIN_REDIRECT.to_string()]);
}

//! End-to-end tests for Audiogate
//!
//! Build a section page from episode cards, load it as a gate host with the
//! real overlay surface and walk a listener through the prompt.

use audiogate_core::page::test_mocks::MockNavigator;
use audiogate_core::{ElementId, GateConfig, GateError, GateSession, SourceClassifier, Transition};
use audiogate_web::prompt::{CANCEL_BUTTON_ID, LOGIN_BUTTON_ID, OVERLAY_ID};
use audiogate_web::{
    Episode, HtmlDocument, OverlaySurface, click_event, extract_episodes, insert_episode,
    render_episode_card,
};

const SKELETON: &str = "<!DOCTYPE html>\n<html><body>\n<main>\n</main>\n</body></html>";
const PAGE_URL: &str = "https://site.example/podcasts/m2a/";

fn section_page(episodes: &[Episode]) -> String {
    let classifier = SourceClassifier::new(Some("moodle.ksasz.ch"));
    episodes.iter().fold(SKELETON.to_string(), |page, episode| {
        insert_episode(&page, &render_episode_card(episode, &classifier)).unwrap()
    })
}

fn episode(title: &str, link: &str) -> Episode {
    Episode {
        title: title.to_string(),
        details: "Folge über Gezeiten".to_string(),
        link: link.to_string(),
        authors: vec!["Ana".to_string()],
        sources: Vec::new(),
    }
}

fn load(html: &str) -> (GateSession<HtmlDocument, OverlaySurface, MockNavigator>, MockNavigator) {
    let mut document = HtmlDocument::parse(html);
    let mut surface = OverlaySurface::default();
    assert!(document.mount_overlay(&surface.mount()));

    let navigator = MockNavigator::new(PAGE_URL);
    let session =
        GateSession::new(&GateConfig::for_testing(), document, surface, navigator.clone()).unwrap();
    (session, navigator)
}

#[test]
fn test_listener_logs_in_from_protected_episode() {
    let html = section_page(&[
        episode("Offen", "https://archive.org/download/offen.mp3"),
        episode("Geschützt", "https://moodle.ksasz.ch/pluginfile.php/7/folge.m4a"),
    ]);
    assert_eq!(extract_episodes(&html).len(), 2);
    let (mut session, navigator) = load(&html);

    let report = session.bind_all().unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.newly_bound, 1);

    let protected = ElementId::new(1);
    session.page_mut().play(protected).unwrap();
    assert_eq!(session.page_mut().fail_source(protected, 0).unwrap(), 2);

    let transitions = session.process_pending();
    assert_eq!(transitions[0], Transition::Shown { element: protected });
    assert!(session.page().element(protected).unwrap().paused);
    assert!(session.controller().surface().render().contains("modal-overlay show"));

    session.sender().send(click_event(Some(LOGIN_BUTTON_ID))).unwrap();
    let transitions = session.process_pending();

    assert!(matches!(transitions.as_slice(), [Transition::HandedOff { .. }]));
    assert_eq!(
        navigator.navigations(),
        vec![
            "https://moodle.ksasz.ch/login/index.php?wantsurl=https%3A%2F%2Fsite.example%2Fpodcasts%2Fm2a%2F"
                .to_string()
        ]
    );
}

#[test]
fn test_public_episode_failure_is_left_alone() {
    let html = section_page(&[episode("Offen", "https://archive.org/download/offen.mp3")]);
    let (mut session, navigator) = load(&html);
    session.bind_all().unwrap();

    let element = ElementId::new(0);
    session.page_mut().play(element).unwrap();
    assert_eq!(session.page_mut().fail_element(element).unwrap(), 0);

    assert!(session.process_pending().is_empty());
    assert!(!session.controller().surface().is_visible());
    assert!(!session.page().element(element).unwrap().paused);
    assert!(navigator.navigations().is_empty());
}

#[test]
fn test_backdrop_and_cancel_dismiss() {
    let html = section_page(&[episode("Geschützt", "https://moodle.ksasz.ch/pluginfile.php/7/folge.mp3")]);
    let (mut session, _) = load(&html);
    session.bind_all().unwrap();
    let element = ElementId::new(0);

    session.page_mut().fail_element(element).unwrap();
    session.sender().send(click_event(Some("audiogate-heading"))).unwrap();
    session.sender().send(click_event(Some(OVERLAY_ID))).unwrap();
    assert_eq!(
        session.process_pending(),
        vec![
            Transition::Shown { element },
            Transition::Ignored,
            Transition::Dismissed { element },
        ]
    );

    session.page_mut().fail_element(element).unwrap();
    session.sender().send(click_event(Some(CANCEL_BUTTON_ID))).unwrap();
    session.process_pending();

    let surface = session.controller().surface();
    assert!(!surface.is_visible());
    assert_eq!(surface.present_count(), 2);
    assert_eq!(surface.dismiss_count(), 2);
}

#[test]
fn test_unmounted_overlay_blocks_gating() {
    let html = section_page(&[episode("Geschützt", "https://moodle.ksasz.ch/pluginfile.php/7/folge.mp3")]);
    let document = HtmlDocument::parse(html);
    let mut session = GateSession::new(
        &GateConfig::for_testing(),
        document,
        OverlaySurface::default(),
        MockNavigator::new(PAGE_URL),
    )
    .unwrap();

    assert!(matches!(
        session.bind_all(),
        Err(GateError::PresentationUnavailable { .. })
    ));
    assert_eq!(session.page().observer_count(), 0);
}

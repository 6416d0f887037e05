//! Observer binding across rescans

use audiogate_core::page::test_mocks::{MockNavigator, MockPage, MockSurface};
use audiogate_core::{FailureTarget, GateConfig, GateError, GateSession, PromptState};

fn session(config: &GateConfig, page: MockPage) -> GateSession<MockPage, MockSurface, MockNavigator> {
    GateSession::new(
        config,
        page,
        MockSurface::new(),
        MockNavigator::new("https://site.example/"),
    )
    .unwrap()
}

#[test]
fn test_rescan_binds_each_protected_source_once() {
    let mut page = MockPage::new();
    let element = page.add_element(&[
        "https://moodle.ksasz.ch/a.m4a",
        "https://archive.org/a.mp3",
        "https://MOODLE.ksasz.ch/a.mp3",
    ]);
    let mut session = session(&GateConfig::for_testing(), page);

    let first = session.bind_all().unwrap();
    let second = session.bind_all().unwrap();

    assert_eq!(first.newly_bound, 1);
    assert_eq!(first.observers_attached, 3);
    assert_eq!(second.newly_bound, 0);
    assert_eq!(second.already_bound, 1);
    assert_eq!(second.observers_attached, 0);

    let targets = session.page().observed_targets();
    assert_eq!(
        targets,
        vec![
            FailureTarget::Source { element, index: 0 },
            FailureTarget::Source { element, index: 2 },
            FailureTarget::Element(element),
        ]
    );
}

#[test]
fn test_rescan_picks_up_late_elements() {
    let mut page = MockPage::new();
    page.add_element(&["https://moodle.ksasz.ch/a.m4a"]);
    let mut session = session(&GateConfig::for_testing(), page);
    session.bind_all().unwrap();

    let late = session.page_mut().add_element(&["https://moodle.ksasz.ch/late.m4a"]);
    let report = session.bind_all().unwrap();

    assert_eq!(report.newly_bound, 1);
    assert!(session.binder().element(late).is_some_and(|tracked| tracked.bound));
    assert_eq!(session.binder().bound_count(), 2);
}

#[test]
fn test_subdomain_is_not_protected() {
    let mut page = MockPage::new();
    page.add_element(&["https://cdn.moodle.ksasz.ch/a.m4a", "https://moodle.ksasz.ch.evil.example/a.m4a"]);
    let mut session = session(&GateConfig::for_testing(), page);

    let report = session.bind_all().unwrap();

    assert_eq!(report.newly_bound, 0);
    assert_eq!(report.skipped, 1);
    assert!(session.page().observed_targets().is_empty());
}

#[test]
fn test_refused_observer_is_reported() {
    let mut page = MockPage::new();
    page.add_element(&["https://moodle.ksasz.ch/a.m4a"]);
    page.refuse_observers(true);
    let mut session = session(&GateConfig::for_testing(), page);

    assert!(matches!(session.bind_all(), Err(GateError::Page { .. })));
    assert_eq!(session.state(), PromptState::Hidden);
}

#[test]
fn test_inert_configuration_binds_nothing() {
    let mut page = MockPage::new();
    let element = page.add_element(&["https://moodle.ksasz.ch/a.m4a"]);
    let mut session = session(&GateConfig::inert(), page);

    let report = session.bind_all().unwrap();
    session.page().fail_element(element, Some("https://moodle.ksasz.ch/a.m4a"));

    assert!(!session.is_active());
    assert_eq!(report.newly_bound, 0);
    assert!(session.process_pending().is_empty());
    assert_eq!(session.state(), PromptState::Hidden);
}

#[test]
fn test_custom_host_gates_its_own_sources() {
    let mut page = MockPage::new();
    let element = page.add_element(&["https://lms.example.org/audio.mp3"]);
    let mut session = session(&GateConfig::for_host("LMS.example.org"), page);
    session.bind_all().unwrap();

    session.page().fail_element(element, None);

    assert_eq!(session.process_pending().len(), 1);
    assert_eq!(session.state().active_element(), Some(element));
}

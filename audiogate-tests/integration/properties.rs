//! Prompt state invariants under arbitrary event sequences

use audiogate_core::page::test_mocks::{MockNavigator, MockPage, MockSurface};
use audiogate_core::{ElementId, GateConfig, GateEvent, GateSession, Transition};
use proptest::prelude::*;

const ELEMENTS: u32 = 3;

#[derive(Debug, Clone)]
enum Step {
    Fail { element: u32, protected: bool },
    Cancel,
    Click { inside_content: bool },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0..ELEMENTS, any::<bool>())
            .prop_map(|(element, protected)| Step::Fail { element, protected }),
        1 => Just(Step::Cancel),
        1 => any::<bool>().prop_map(|inside_content| Step::Click { inside_content }),
    ]
}

fn mixed_page() -> MockPage {
    let mut page = MockPage::new();
    for _ in 0..ELEMENTS {
        page.add_element(&["https://archive.org/a.mp3", "https://moodle.ksasz.ch/a.m4a"]);
    }
    page
}

proptest! {
    #[test]
    fn prompt_invariants_hold(steps in prop::collection::vec(step(), 0..40)) {
        let surface = MockSurface::new();
        let mut session = GateSession::new(
            &GateConfig::for_testing(),
            mixed_page(),
            surface.clone(),
            MockNavigator::new("https://site.example/"),
        )
        .unwrap();
        session.bind_all().unwrap();

        for step in steps {
            match step {
                Step::Fail { element, protected: true } => {
                    session.page().fail_source(ElementId::new(element), 1, Some("https://moodle.ksasz.ch/a.m4a"));
                }
                Step::Fail { element, protected: false } => {
                    session.page().fail_element(ElementId::new(element), Some("https://archive.org/a.mp3"));
                }
                Step::Cancel => {
                    session.sender().send(GateEvent::CancelRequested).unwrap();
                }
                Step::Click { inside_content } => {
                    session.sender().send(GateEvent::OverlayClicked { inside_content }).unwrap();
                }
            }
            session.process_pending();

            let state = session.state();
            let log = surface.log();
            prop_assert_eq!(state.is_shown(), state.active_element().is_some());
            prop_assert_eq!(log.visible, state.is_shown());
            prop_assert_eq!(log.present_calls - log.dismiss_calls, usize::from(state.is_shown()));
        }
    }

    #[test]
    fn recurring_failures_show_prompt_once(repeats in 1usize..20) {
        let surface = MockSurface::new();
        let mut session = GateSession::new(
            &GateConfig::for_testing(),
            mixed_page(),
            surface.clone(),
            MockNavigator::new("https://site.example/"),
        )
        .unwrap();
        session.bind_all().unwrap();
        let element = ElementId::new(0);

        for _ in 0..repeats {
            session.page().fail_source(element, 1, Some("https://moodle.ksasz.ch/a.m4a"));
            session.page().fail_element(element, None);
        }
        let transitions = session.process_pending();

        prop_assert_eq!(transitions.len(), repeats * 2);
        prop_assert_eq!(&transitions[0], &Transition::Shown { element });
        prop_assert!(transitions[1..].iter().all(|t| *t == Transition::Ignored));
        prop_assert_eq!(surface.log().present_calls, 1);
    }

    #[test]
    fn rebinding_never_duplicates_observers(passes in 1usize..6) {
        let mut session = GateSession::new(
            &GateConfig::for_testing(),
            mixed_page(),
            MockSurface::new(),
            MockNavigator::new("https://site.example/"),
        )
        .unwrap();

        for _ in 0..passes {
            session.bind_all().unwrap();
        }

        // One source observer and one element observer per element.
        prop_assert_eq!(session.page().observed_targets().len(), ELEMENTS as usize * 2);
    }
}

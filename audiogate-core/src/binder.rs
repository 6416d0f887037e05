//! Binding failure observers to gating candidates.
//!
//! Each page element is classified once and bound at most once. Binding
//! attaches one observer per protected source plus one on the element itself,
//! since some engines surface source-level failures only at element level.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::Result;
use crate::classifier::{MediaSource, SourceClassifier, is_gating_candidate};
use crate::page::{ElementId, FailureSink, FailureTarget, MediaPage};
use crate::session::GateEvent;

/// A media element known to the binder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedElement {
    pub id: ElementId,
    pub sources: Vec<MediaSource>,
    /// Set once when observers are attached, never unset
    pub bound: bool,
}

impl TrackedElement {
    pub fn new(id: ElementId, sources: Vec<MediaSource>) -> Self {
        Self {
            id,
            sources,
            bound: false,
        }
    }

    /// Returns true when at least one source is protected.
    pub fn is_gating_candidate(&self) -> bool {
        is_gating_candidate(&self.sources)
    }

    /// Protected sources with their position among all sources.
    pub fn protected_sources(&self) -> impl Iterator<Item = (usize, &MediaSource)> {
        self.sources
            .iter()
            .enumerate()
            .filter(|(_, source)| source.is_protected)
    }

    /// First protected source in document order.
    pub fn first_protected_source(&self) -> Option<&MediaSource> {
        self.protected_sources().map(|(_, source)| source).next()
    }
}

/// Summary of one `bind_all` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BindReport {
    /// Elements found on the page
    pub scanned: usize,
    /// Elements bound during this pass
    pub newly_bound: usize,
    /// Elements bound by an earlier pass
    pub already_bound: usize,
    /// Elements with no protected source
    pub skipped: usize,
    /// Observers attached during this pass
    pub observers_attached: usize,
}

/// Tracks page elements and attaches failure observers exactly once.
#[derive(Debug)]
pub struct MediaBinder {
    classifier: SourceClassifier,
    elements: BTreeMap<ElementId, TrackedElement>,
}

impl MediaBinder {
    pub fn new(classifier: SourceClassifier) -> Self {
        Self {
            classifier,
            elements: BTreeMap::new(),
        }
    }

    /// Scans the page and binds every unbound gating candidate.
    ///
    /// Calling this again never attaches a second observer to an element;
    /// elements that appeared since the last pass are bound normally.
    ///
    /// # Errors
    ///
    /// - `GateError::Page` - The page refused an observer. The element stays
    ///   marked as bound so a later pass does not attach duplicates.
    pub fn bind_all<P: MediaPage>(
        &mut self,
        page: &mut P,
        sender: &mpsc::UnboundedSender<GateEvent>,
    ) -> Result<BindReport> {
        let mut report = BindReport::default();

        for discovered in page.media_elements() {
            report.scanned += 1;

            let classifier = &self.classifier;
            let tracked = self.elements.entry(discovered.id).or_insert_with(|| {
                TrackedElement::new(discovered.id, classifier.classify(discovered.sources.as_slice()))
            });

            if tracked.bound {
                report.already_bound += 1;
                continue;
            }

            if !tracked.is_gating_candidate() {
                tracing::trace!(element = %tracked.id, "No protected source, not binding");
                report.skipped += 1;
                continue;
            }

            tracked.bound = true;

            let mut targets: Vec<FailureTarget> = tracked
                .protected_sources()
                .map(|(index, _)| FailureTarget::Source {
                    element: tracked.id,
                    index,
                })
                .collect();
            targets.push(FailureTarget::Element(tracked.id));

            for target in targets {
                page.observe_failures(FailureSink::new(target, sender))?;
                report.observers_attached += 1;
            }

            report.newly_bound += 1;
            tracing::debug!(
                element = %tracked.id,
                protected_sources = tracked.protected_sources().count(),
                "Bound failure observers"
            );
        }

        Ok(report)
    }

    /// Looks up a tracked element.
    pub fn element(&self, id: ElementId) -> Option<&TrackedElement> {
        self.elements.get(&id)
    }

    /// All tracked elements in id order.
    pub fn elements(&self) -> impl Iterator<Item = &TrackedElement> {
        self.elements.values()
    }

    /// Number of bound elements.
    pub fn bound_count(&self) -> usize {
        self.elements.values().filter(|element| element.bound).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::test_mocks::MockPage;

    const HOST: &str = "moodle.ksasz.ch";

    fn binder() -> MediaBinder {
        MediaBinder::new(SourceClassifier::new(Some(HOST)))
    }

    #[test]
    fn test_binds_protected_sources_and_element() {
        let mut page = MockPage::new();
        let mixed = page.add_element(&["https://archive.org/a.mp3", "https://moodle.ksasz.ch/b.mp3"]);
        let public = page.add_element(&["https://archive.org/c.mp3"]);
        let (sender, _receiver) = mpsc::unbounded_channel();

        let mut binder = binder();
        let report = binder.bind_all(&mut page, &sender).unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.newly_bound, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.observers_attached, 2);

        assert_eq!(
            page.observed_targets(),
            vec![
                FailureTarget::Source {
                    element: mixed,
                    index: 1
                },
                FailureTarget::Element(mixed),
            ]
        );
        assert!(binder.element(mixed).unwrap().bound);
        assert!(!binder.element(public).unwrap().bound);
    }

    #[test]
    fn test_rebinding_is_idempotent() {
        let mut page = MockPage::new();
        page.add_element(&["https://moodle.ksasz.ch/a.mp3", "https://moodle.ksasz.ch/b.ogg"]);
        let (sender, _receiver) = mpsc::unbounded_channel();

        let mut binder = binder();
        let first = binder.bind_all(&mut page, &sender).unwrap();
        let second = binder.bind_all(&mut page, &sender).unwrap();

        assert_eq!(first.observers_attached, 3);
        assert_eq!(second.observers_attached, 0);
        assert_eq!(second.already_bound, 1);
        assert_eq!(page.observed_targets().len(), 3);
        assert_eq!(binder.bound_count(), 1);
    }

    #[test]
    fn test_late_elements_are_bound_on_next_pass() {
        let mut page = MockPage::new();
        page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let (sender, _receiver) = mpsc::unbounded_channel();

        let mut binder = binder();
        binder.bind_all(&mut page, &sender).unwrap();
        let late = page.add_element(&["https://moodle.ksasz.ch/late.mp3"]);
        let report = binder.bind_all(&mut page, &sender).unwrap();

        assert_eq!(report.newly_bound, 1);
        assert_eq!(report.already_bound, 1);
        assert!(binder.element(late).unwrap().bound);
    }

    #[test]
    fn test_refused_observer_keeps_element_bound() {
        let mut page = MockPage::new();
        let element = page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        page.refuse_observers(true);
        let (sender, _receiver) = mpsc::unbounded_channel();

        let mut binder = binder();
        assert!(binder.bind_all(&mut page, &sender).is_err());
        assert!(binder.element(element).unwrap().bound);

        page.refuse_observers(false);
        let report = binder.bind_all(&mut page, &sender).unwrap();
        assert_eq!(report.observers_attached, 0);
    }

    #[test]
    fn test_inert_binder_binds_nothing() {
        let mut page = MockPage::new();
        page.add_element(&["https://moodle.ksasz.ch/a.mp3"]);
        let (sender, _receiver) = mpsc::unbounded_channel();

        let mut binder = MediaBinder::new(SourceClassifier::new(None));
        let report = binder.bind_all(&mut page, &sender).unwrap();

        assert_eq!(report.newly_bound, 0);
        assert_eq!(report.skipped, 1);
        assert!(page.observed_targets().is_empty());
    }
}

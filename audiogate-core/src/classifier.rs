//! Source classification against the protected host.

use serde::Serialize;
use url::Url;

/// A candidate source of a media element, classified once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaSource {
    pub url: String,
    pub is_protected: bool,
}

/// Classifies source URLs by exact host match.
///
/// With no protected host every source is unprotected, which keeps the whole
/// gate inert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceClassifier {
    protected_host: Option<String>,
}

impl SourceClassifier {
    /// Creates a classifier for the given host, lowercased and trimmed.
    pub fn new(protected_host: Option<&str>) -> Self {
        let protected_host = protected_host
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .map(str::to_ascii_lowercase);
        Self { protected_host }
    }

    /// Normalized protected host, if any.
    pub fn protected_host(&self) -> Option<&str> {
        self.protected_host.as_deref()
    }

    /// Returns true iff the URL's host equals the protected host.
    ///
    /// Subdomains and suffixes do not match. Relative or unparseable URLs are
    /// never protected.
    pub fn is_protected(&self, url: &str) -> bool {
        match (&self.protected_host, host_of(url)) {
            (Some(protected), Some(host)) => host == *protected,
            _ => false,
        }
    }

    /// Classifies every candidate source, preserving order.
    pub fn classify<S: AsRef<str>>(&self, sources: &[S]) -> Vec<MediaSource> {
        sources
            .iter()
            .map(|source| {
                let url = source.as_ref().trim().to_string();
                let is_protected = self.is_protected(&url);
                MediaSource { url, is_protected }
            })
            .collect()
    }
}

/// Convenience wrapper over [`SourceClassifier::classify`].
pub fn classify<S: AsRef<str>>(sources: &[S], protected_host: Option<&str>) -> Vec<MediaSource> {
    SourceClassifier::new(protected_host).classify(sources)
}

/// An element is a gating candidate iff any of its sources is protected.
pub fn is_gating_candidate(sources: &[MediaSource]) -> bool {
    sources.iter().any(|source| source.is_protected)
}

/// Lowercased host of an absolute URL.
pub(crate) fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    parsed.host_str().map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const HOST: &str = "moodle.ksasz.ch";

    #[test]
    fn test_exact_host_match() {
        let classifier = SourceClassifier::new(Some(HOST));

        assert!(classifier.is_protected("https://moodle.ksasz.ch/pluginfile.php/12/b.mp3"));
        assert!(classifier.is_protected("http://MOODLE.ksasz.ch/b.mp3"));
        assert!(classifier.is_protected("https://moodle.ksasz.ch:8443/b.mp3"));
        assert!(!classifier.is_protected("https://archive.org/a.mp3"));
        assert!(!classifier.is_protected("https://cdn.moodle.ksasz.ch/b.mp3"));
        assert!(!classifier.is_protected("https://moodle.ksasz.ch.evil.example/b.mp3"));
        assert!(!classifier.is_protected("https://archive.org/moodle.ksasz.ch/a.mp3"));
        assert!(!classifier.is_protected("/local/b.mp3"));
        assert!(!classifier.is_protected(""));
    }

    #[test]
    fn test_classify_preserves_order() {
        let sources = classify(
            &["https://archive.org/a.mp3", "https://moodle.ksasz.ch/b.mp3"],
            Some(HOST),
        );

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].url, "https://archive.org/a.mp3");
        assert!(!sources[0].is_protected);
        assert_eq!(sources[1].url, "https://moodle.ksasz.ch/b.mp3");
        assert!(sources[1].is_protected);
        assert!(is_gating_candidate(&sources));
    }

    #[test]
    fn test_missing_host_is_inert() {
        let sources = classify(&["https://moodle.ksasz.ch/b.mp3"], None);
        assert!(!sources[0].is_protected);
        assert!(!is_gating_candidate(&sources));

        let blank = SourceClassifier::new(Some("  "));
        assert_eq!(blank.protected_host(), None);
    }

    proptest! {
        #[test]
        fn prop_protected_iff_host_equal(
            label in "[a-z]{1,10}",
            other in "[a-z]{1,10}",
            path in "[a-z0-9/]{0,16}",
        ) {
            let protected = format!("{label}.example");
            let classifier = SourceClassifier::new(Some(&protected));

            let same = format!("https://{protected}/{path}");
            prop_assert!(classifier.is_protected(&same));

            let sub = format!("https://{other}.{protected}/{path}");
            prop_assert!(!classifier.is_protected(&sub));

            let different = format!("https://{other}.test/{path}");
            prop_assert!(!classifier.is_protected(&different));
        }
    }
}

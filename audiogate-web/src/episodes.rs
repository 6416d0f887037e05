//! Podcast episode cards.
//!
//! Section pages list episodes as `<article class="podcast-card">` blocks
//! inside `<main>`, each preceded by a `<!-- NEUE EPISODE: ... -->` marker.
//! Cards whose audio lives on the protected host carry a lock indicator so
//! listeners know a login will be asked for.

use std::ops::Range;
use std::sync::LazyLock;

use audiogate_core::SourceClassifier;
use regex::Regex;
use serde::Serialize;

use crate::{Result, WebError};

const MAIN_END: &str = "</main>";
const ANONYMOUS: &str = "Anonym";

static CARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(<!-- NEUE EPISODE: .*? -->\s*)?<article class="podcast-card">(.*?)</article>"#)
        .expect("valid regex")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h3>(.*?)</h3>").expect("valid regex"));
static LOCK_INDICATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<span class="moodle-indicator"[^>]*>.*?</span>"#).expect("valid regex")
});
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<p class="podcast-description">(.*?)</p>"#).expect("valid regex")
});
static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p>(.*?)</p>").expect("valid regex"));
static SOURCE_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<source src="(.*?)""#).expect("valid regex"));
static AUTHOR_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<p class="podcast-author">(.*?)</p>"#).expect("valid regex")
});
static AUTHOR_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<ul class="author-list">(.*?)</ul>"#).expect("valid regex")
});
static AUTHOR_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<li class="podcast-item"><strong>Autoren:</strong> (.*?)</li>"#)
        .expect("valid regex")
});
static SOURCE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<ul class="source-list">(.*?)</ul>"#).expect("valid regex")
});
static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<li>(.*?)</li>").expect("valid regex"));
static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(.*?)""#).expect("valid regex"));
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n").expect("valid regex"));

/// One podcast episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Episode {
    pub title: String,
    pub details: String,
    /// Audio file URL
    pub link: String,
    /// Empty means anonymous
    pub authors: Vec<String>,
    /// References, shown as links when they are URLs
    pub sources: Vec<String>,
}

impl Episode {
    /// Checks the fields a card cannot be rendered without.
    ///
    /// # Errors
    ///
    /// - `WebError::InvalidEpisode` - Empty title or audio link
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(WebError::InvalidEpisode {
                reason: "title must not be empty".to_string(),
            });
        }
        if self.link.trim().is_empty() {
            return Err(WebError::InvalidEpisode {
                reason: "audio link must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// An episode card found in a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpisodeBlock {
    /// Position among the page's cards
    pub index: usize,
    pub episode: Episode,
    /// Byte range of the card, marker comment included
    pub span: Range<usize>,
}

/// Author line: "Anonym", "von A" or "von A, B und C".
pub fn authors_text(authors: &[String]) -> String {
    match authors {
        [] => ANONYMOUS.to_string(),
        [single] => format!("von {single}"),
        [rest @ .., last] => format!("von {} und {last}", rest.join(", ")),
    }
}

/// MIME types offered for an audio link, by file extension.
///
/// Several aliases per format keep older engines able to pick a source.
pub fn mime_types_for(link: &str) -> &'static [&'static str] {
    let path = link.split(['?', '#']).next().unwrap_or(link).to_ascii_lowercase();

    if path.ends_with(".m4a") {
        &["audio/mp4", "audio/x-m4a", "audio/aac"]
    } else if path.ends_with(".mp3") {
        &["audio/mpeg", "audio/mp3"]
    } else if path.ends_with(".ogg") || path.ends_with(".oga") {
        &["audio/ogg", "audio/vorbis"]
    } else if path.ends_with(".wav") {
        &["audio/wav", "audio/x-wav"]
    } else {
        &["audio/mpeg", "audio/mp4"]
    }
}

/// Renders an episode card.
///
/// Links on the classifier's protected host get the lock indicator.
pub fn render_episode_card(episode: &Episode, classifier: &SourceClassifier) -> String {
    let Episode {
        title,
        details,
        link,
        authors,
        sources,
    } = episode;

    let indicator = if classifier.is_protected(link) {
        r#" <span class="moodle-indicator" title="Requires Moodle Login">🔒 MOODLE</span>"#
    } else {
        ""
    };

    let audio_sources = mime_types_for(link)
        .iter()
        .map(|mime| format!(r#"<source src="{link}" type="{mime}">"#))
        .collect::<Vec<_>>()
        .join("\n        ");

    let sources_block = if sources.is_empty() {
        String::new()
    } else {
        let items: String = sources
            .iter()
            .map(|source| {
                if source.starts_with("http") {
                    format!(r#"<li><a href="{source}" target="_blank">{source}</a></li>"#)
                } else {
                    format!("<li>{source}</li>")
                }
            })
            .collect();
        format!(
            r#"
                <div class="podcast-extra">
                    <strong>Quellen:</strong>
                    <ul class="source-list">{items}</ul>
                </div>"#
        )
    };

    let authors_line = authors_text(authors);

    format!(
        r#"<!-- NEUE EPISODE: {title} -->
<article class="podcast-card">
    <h3>{title}{indicator}</h3>
    <p class="podcast-description">{details}</p>

    <audio controls preload="metadata">
        {audio_sources}
        Your browser does not support the audio element.
    </audio>

    <p class="podcast-author">{authors_line}</p>

    <details>
        <summary>Details & Infos</summary>
        <div class="details-content">
            <ul class="podcast-details">
                <li class="podcast-item"><strong>Titel:</strong> {title}</li>
                <li class="podcast-item"><strong>Info:</strong> {details}</li>
            </ul>{sources_block}
        </div>
    </details>
</article>"#
    )
}

/// Finds every episode card in a page.
pub fn extract_episodes(html: &str) -> Vec<EpisodeBlock> {
    CARD.captures_iter(html)
        .enumerate()
        .filter_map(|(index, captures)| {
            let whole = captures.get(0)?;
            let inner = captures.get(2).map_or("", |m| m.as_str());
            Some(EpisodeBlock {
                index,
                episode: parse_card(inner),
                span: whole.range(),
            })
        })
        .collect()
}

/// Inserts a card before the page's last `</main>`.
///
/// # Errors
///
/// - `WebError::MissingMarker` - The page has no `</main>`
pub fn insert_episode(html: &str, card: &str) -> Result<String> {
    let position = html.rfind(MAIN_END).ok_or_else(|| WebError::MissingMarker {
        marker: MAIN_END.to_string(),
    })?;

    let (before, after) = html.split_at(position);
    Ok(format!("{before}{card}\n{after}"))
}

/// Replaces one card with new markup.
pub fn replace_episode(html: &str, block: &EpisodeBlock, card: &str) -> String {
    let mut updated = String::with_capacity(html.len() + card.len());
    updated.push_str(&html[..block.span.start]);
    updated.push_str(card);
    updated.push_str(&html[block.span.end..]);
    updated
}

/// Removes one card, collapsing the blank lines it leaves behind.
pub fn remove_episode(html: &str, block: &EpisodeBlock) -> String {
    let removed = replace_episode(html, block, "");
    BLANK_RUN.replace_all(&removed, "\n\n").into_owned()
}

/// Looks up the card at a position.
///
/// # Errors
///
/// - `WebError::EpisodeNotFound` - No card at `index`
pub fn episode_at(html: &str, index: usize) -> Result<EpisodeBlock> {
    let mut blocks = extract_episodes(html);
    let count = blocks.len();
    if index >= count {
        return Err(WebError::EpisodeNotFound { index, count });
    }
    Ok(blocks.swap_remove(index))
}

fn parse_card(inner: &str) -> Episode {
    let title = first_group(&TITLE, inner)
        .map(|title| LOCK_INDICATOR.replace_all(&title, "").trim().to_string())
        .unwrap_or_else(|| "Unknown Title".to_string());

    let details = first_group(&DESCRIPTION, inner)
        .or_else(|| first_group(&PARAGRAPH, inner).filter(|text| !text.contains("Hier klicken")))
        .unwrap_or_default();

    let link = first_group(&SOURCE_SRC, inner).unwrap_or_default();

    Episode {
        title,
        details,
        link,
        authors: parse_authors(inner),
        sources: parse_sources(inner),
    }
}

fn parse_authors(inner: &str) -> Vec<String> {
    let names = if let Some(line) = first_group(&AUTHOR_LINE, inner) {
        split_author_line(&line)
    } else if let Some(list) = first_group(&AUTHOR_LIST, inner) {
        LIST_ITEM
            .captures_iter(&list)
            .filter_map(|item| Some(item.get(1)?.as_str().trim().to_string()))
            .collect()
    } else if let Some(item) = first_group(&AUTHOR_ITEM, inner).filter(|item| !item.contains("<ul")) {
        vec![item]
    } else {
        Vec::new()
    };

    names
        .into_iter()
        .filter(|name| !name.is_empty() && name != ANONYMOUS)
        .collect()
}

fn split_author_line(line: &str) -> Vec<String> {
    let text = line.trim();
    let text = text.strip_prefix("von ").unwrap_or(text);

    match text.rsplit_once(" und ") {
        Some((rest, last)) => rest
            .split(',')
            .chain(std::iter::once(last))
            .map(|name| name.trim().to_string())
            .collect(),
        None => vec![text.trim().to_string()],
    }
}

fn parse_sources(inner: &str) -> Vec<String> {
    let Some(list) = first_group(&SOURCE_LIST, inner) else {
        return Vec::new();
    };

    LIST_ITEM
        .captures_iter(&list)
        .filter_map(|item| {
            let item = item.get(1)?.as_str();
            let source = first_group(&HREF, item).unwrap_or_else(|| item.trim().to_string());
            Some(source)
        })
        .collect()
}

fn first_group(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> SourceClassifier {
        SourceClassifier::new(Some("moodle.ksasz.ch"))
    }

    fn episode() -> Episode {
        Episode {
            title: "Folge 3".to_string(),
            details: "Über Gezeiten".to_string(),
            link: "https://moodle.ksasz.ch/pluginfile.php/9/folge3.m4a".to_string(),
            authors: vec!["Ana".to_string(), "Ben".to_string(), "Caro".to_string()],
            sources: vec!["https://example.org/paper".to_string(), "Lehrbuch S. 12".to_string()],
        }
    }

    #[test]
    fn test_authors_text() {
        assert_eq!(authors_text(&[]), "Anonym");
        assert_eq!(authors_text(&["Ana".to_string()]), "von Ana");
        assert_eq!(
            authors_text(&["Ana".to_string(), "Ben".to_string(), "Caro".to_string()]),
            "von Ana, Ben und Caro"
        );
    }

    #[test]
    fn test_mime_types_by_extension() {
        assert_eq!(mime_types_for("https://a/x.M4A"), &["audio/mp4", "audio/x-m4a", "audio/aac"]);
        assert_eq!(mime_types_for("https://a/x.mp3?download=1"), &["audio/mpeg", "audio/mp3"]);
        assert_eq!(mime_types_for("https://a/x.oga"), &["audio/ogg", "audio/vorbis"]);
        assert_eq!(mime_types_for("https://a/x.wav"), &["audio/wav", "audio/x-wav"]);
        assert_eq!(mime_types_for("https://a/stream"), &["audio/mpeg", "audio/mp4"]);
    }

    #[test]
    fn test_protected_card_has_lock_indicator() {
        let card = render_episode_card(&episode(), &classifier());

        assert!(card.starts_with("<!-- NEUE EPISODE: Folge 3 -->"));
        assert!(card.contains(r#"<h3>Folge 3 <span class="moodle-indicator""#));
        assert_eq!(card.matches("<source src=").count(), 3);
        assert!(card.contains(r#"<p class="podcast-author">von Ana, Ben und Caro</p>"#));
        assert!(card.contains(
            r#"<li><a href="https://example.org/paper" target="_blank">https://example.org/paper</a></li><li>Lehrbuch S. 12</li>"#
        ));

        let public = Episode {
            link: "https://archive.org/download/x/folge.mp3".to_string(),
            ..episode()
        };
        assert!(!render_episode_card(&public, &classifier()).contains("moodle-indicator"));
    }

    #[test]
    fn test_extract_rendered_card() {
        let card = render_episode_card(&episode(), &classifier());
        let page = format!("<main>\n{card}\n</main>");

        let blocks = extract_episodes(&page);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].episode, episode());
        assert_eq!(&page[blocks[0].span.clone()], card);
    }

    #[test]
    fn test_extract_legacy_card() {
        let page = r#"<main>
    <!-- NEUE EPISODE: Alt -->
    <article class="podcast-card">
        <h3>Alt</h3>
        <p>Erste Folge</p>
        <audio controls preload="none">
            <source src="https://archive.org/alt.mp3" type="audio/mpeg">
        </audio>
        <details>
            <ul class="podcast-details">
                <li class="podcast-item"><strong>Autoren:</strong> Dora</li>
            </ul>
        </details>
    </article>
</main>"#;

        let blocks = extract_episodes(page);

        assert_eq!(blocks.len(), 1);
        let episode = &blocks[0].episode;
        assert_eq!(episode.title, "Alt");
        assert_eq!(episode.details, "Erste Folge");
        assert_eq!(episode.link, "https://archive.org/alt.mp3");
        assert_eq!(episode.authors, vec!["Dora".to_string()]);
        assert!(episode.sources.is_empty());
    }

    #[test]
    fn test_anonymous_author_line_parses_empty() {
        let anonymous = Episode {
            authors: Vec::new(),
            ..episode()
        };
        let page = format!("<main>{}</main>", render_episode_card(&anonymous, &classifier()));

        assert!(extract_episodes(&page)[0].episode.authors.is_empty());
    }

    #[test]
    fn test_insert_replace_remove() {
        let page = "<body><main>\n</main><footer></footer></body>";
        assert!(matches!(
            insert_episode("<body></body>", "x"),
            Err(WebError::MissingMarker { .. })
        ));

        let first = render_episode_card(&episode(), &classifier());
        let page = insert_episode(page, &first).unwrap();
        let second_episode = Episode {
            title: "Folge 4".to_string(),
            ..episode()
        };
        let page = insert_episode(&page, &render_episode_card(&second_episode, &classifier())).unwrap();

        let blocks = extract_episodes(&page);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].episode.title, "Folge 4");
        assert!(page.ends_with("</main><footer></footer></body>"));

        let renamed = Episode {
            title: "Folge 3 (neu)".to_string(),
            ..episode()
        };
        let page = replace_episode(&page, &blocks[0], &render_episode_card(&renamed, &classifier()));
        assert_eq!(extract_episodes(&page)[0].episode.title, "Folge 3 (neu)");

        let block = episode_at(&page, 1).unwrap();
        let page = remove_episode(&page, &block);
        let remaining = extract_episodes(&page);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].episode.title, "Folge 3 (neu)");

        assert!(matches!(
            episode_at(&page, 3),
            Err(WebError::EpisodeNotFound { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_repeated_removal_leaves_no_blank_runs() {
        let mut page = "<main>\n</main>".to_string();
        for title in ["Eins", "Zwei", "Drei"] {
            let episode = Episode {
                title: title.to_string(),
                ..episode()
            };
            page = insert_episode(&page, &format!("\n{}\n", render_episode_card(&episode, &classifier())))
                .unwrap();
        }

        for _ in 0..2 {
            let block = episode_at(&page, 0).unwrap();
            page = remove_episode(&page, &block);
        }

        assert!(!page.contains("\n\n\n"));
        assert_eq!(extract_episodes(&page).len(), 1);
        assert_eq!(extract_episodes(&page)[0].episode.title, "Drei");
    }

    #[test]
    fn test_validate() {
        assert!(episode().validate().is_ok());
        let untitled = Episode {
            title: " ".to_string(),
            ..episode()
        };
        assert!(untitled.validate().is_err());
    }
}

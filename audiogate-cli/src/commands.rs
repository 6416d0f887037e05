//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use audiogate_core::{
    ElementId, GateConfig, GateEvent, GateSession, LoginEndpoint, MediaSource, Navigator,
    SourceClassifier, Transition,
};
use audiogate_web::episodes::{self, Episode, EpisodeBlock};
use audiogate_web::{HtmlDocument, OverlaySurface};
use clap::{Args, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::fs;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List a page's audio elements and which sources are protected
    Scan {
        /// HTML page to inspect
        page: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the login URL that returns to a location
    LoginUrl {
        /// Location the user should come back to
        location: String,
    },
    /// Run the gate against a page and fail one of its elements
    Simulate {
        /// HTML page to load
        page: PathBuf,
        /// Position of the audio element in the page, from 0
        #[arg(long)]
        element: u32,
        /// Fail this candidate source instead of the whole element
        #[arg(long)]
        source_index: Option<usize>,
        /// Location the page is served from
        #[arg(long, default_value = "https://site.example/")]
        location: String,
        /// Press the login button once the prompt is shown
        #[arg(long)]
        confirm: bool,
    },
    /// Manage the episode cards of a section page
    Episodes {
        #[command(flatten)]
        target: PageTarget,
        #[command(subcommand)]
        action: EpisodeCommand,
    },
}

/// Site sections carrying podcast pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Section {
    M2a,
    S2a,
}

impl Section {
    fn directory(self) -> &'static str {
        match self {
            Section::M2a => "m2a",
            Section::S2a => "s2a",
        }
    }
}

/// Which page an episode command edits.
#[derive(Debug, Clone, Args)]
pub struct PageTarget {
    /// Section whose `podcasts/<section>/index.html` is edited
    #[arg(long, value_enum, required_unless_present = "page")]
    section: Option<Section>,
    /// Root of the site checkout
    #[arg(long, default_value = ".")]
    site_root: PathBuf,
    /// Explicit page, instead of a section
    #[arg(long, conflicts_with = "section")]
    page: Option<PathBuf>,
}

impl PageTarget {
    /// Path of the page this target addresses.
    pub fn path(&self) -> PathBuf {
        match (&self.page, self.section) {
            (Some(page), _) => page.clone(),
            (None, Some(section)) => self
                .site_root
                .join("podcasts")
                .join(section.directory())
                .join("index.html"),
            (None, None) => self.site_root.join("index.html"),
        }
    }
}

/// Episode card operations. Positions are 1-based as printed by `list`.
#[derive(Subcommand)]
pub enum EpisodeCommand {
    /// List the episodes of the page
    List,
    /// Append a new episode card
    Add {
        #[command(flatten)]
        fields: EpisodeFields,
    },
    /// Change fields of an existing episode
    Edit {
        /// Position of the episode
        position: usize,
        #[command(flatten)]
        fields: EpisodeFields,
    },
    /// Remove an episode card
    Delete {
        /// Position of the episode
        position: usize,
    },
}

/// Episode fields given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct EpisodeFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    details: Option<String>,
    /// Audio file URL
    #[arg(long)]
    link: Option<String>,
    /// Author, repeatable; replaces all authors
    #[arg(long = "author")]
    authors: Vec<String>,
    /// Reference, repeatable; replaces all sources
    #[arg(long = "source")]
    sources: Vec<String>,
    /// Remove all authors, leaving the episode anonymous
    #[arg(long, conflicts_with = "authors")]
    clear_authors: bool,
    /// Remove all sources
    #[arg(long, conflicts_with = "sources")]
    clear_sources: bool,
}

impl EpisodeFields {
    /// Applies the given fields over an existing episode.
    fn apply(self, mut episode: Episode) -> Episode {
        if let Some(title) = self.title {
            episode.title = title;
        }
        if let Some(details) = self.details {
            episode.details = details;
        }
        if let Some(link) = self.link {
            episode.link = link;
        }
        if self.clear_authors {
            episode.authors.clear();
        } else if !self.authors.is_empty() {
            episode.authors = self.authors;
        }
        if self.clear_sources {
            episode.sources.clear();
        } else if !self.sources.is_empty() {
            episode.sources = self.sources;
        }
        episode
    }
}

/// Builds the gate configuration from the environment and CLI overrides.
pub fn resolve_config(protected_host: Option<&str>) -> GateConfig {
    let mut config = GateConfig::from_env();
    if let Some(host) = protected_host {
        config.protected_host = Some(host.to_string()).filter(|host| !host.trim().is_empty());
    }
    tracing::debug!(host = ?config.normalized_host(), "Resolved gate configuration");
    config
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that fails
pub async fn handle_command(command: Commands, config: &GateConfig) -> anyhow::Result<()> {
    match command {
        Commands::Scan { page, json } => {
            let report = scan_page(&read_page(&page).await?, config);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_scan(&report);
            }
            Ok(())
        }
        Commands::LoginUrl { location } => {
            println!("{}", login_url(config, &location)?);
            Ok(())
        }
        Commands::Simulate {
            page,
            element,
            source_index,
            location,
            confirm,
        } => {
            let request = SimulationRequest {
                element: ElementId::new(element),
                source_index,
                location,
                confirm,
            };
            let report = simulate(&read_page(&page).await?, config, &request)?;
            print_simulation(&report);
            Ok(())
        }
        Commands::Episodes { target, action } => {
            let classifier = SourceClassifier::new(config.normalized_host().as_deref());
            run_episode_command(&target.path(), action, &classifier).await
        }
    }
}

/// Audio elements of a page as classified by the gate.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub protected_host: Option<String>,
    pub elements: Vec<ScannedElement>,
}

#[derive(Debug, Serialize)]
pub struct ScannedElement {
    pub id: ElementId,
    pub sources: Vec<MediaSource>,
    pub gated: bool,
}

/// Classifies every audio element of a page.
pub fn scan_page(html: &str, config: &GateConfig) -> ScanReport {
    let protected_host = config.normalized_host();
    let classifier = SourceClassifier::new(protected_host.as_deref());
    let document = HtmlDocument::parse(html);

    let elements = document
        .elements()
        .iter()
        .map(|element| {
            let sources = classifier.classify(element.sources.as_slice());
            ScannedElement {
                id: element.id,
                gated: audiogate_core::classifier::is_gating_candidate(&sources),
                sources,
            }
        })
        .collect();

    ScanReport {
        protected_host,
        elements,
    }
}

fn print_scan(report: &ScanReport) {
    match &report.protected_host {
        Some(host) => println!("Protected host: {host}"),
        None => println!("Protected host: none (gating disabled)"),
    }
    println!("{:-<60}", "");

    if report.elements.is_empty() {
        println!("No audio elements found.");
        return;
    }

    for element in &report.elements {
        let marker = if element.gated { "gated" } else { "open" };
        println!("{} [{marker}]", element.id);
        for source in &element.sources {
            let lock = if source.is_protected { "🔒" } else { "  " };
            println!("  {lock} {}", source.url);
        }
    }
}

/// Login URL returning to `location`.
///
/// # Errors
/// - `GateError::Configuration` - No protected host or an unusable endpoint
pub fn login_url(config: &GateConfig, location: &str) -> anyhow::Result<String> {
    let endpoint = LoginEndpoint::from_config(config)?;
    Ok(endpoint.build(location).url())
}

/// A simulated failure to run against a page.
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    pub element: ElementId,
    pub source_index: Option<usize>,
    pub location: String,
    pub confirm: bool,
}

/// What the gate did during a simulation.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub gated_elements: usize,
    pub observers_notified: usize,
    pub transitions: Vec<Transition>,
    pub overlay_visible: bool,
    pub navigated_to: Option<String>,
}

/// Navigator recording the one navigation a session may perform.
#[derive(Debug)]
struct RecordingNavigator {
    location: String,
    navigated_to: Option<String>,
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn navigate(&mut self, url: &str) {
        self.navigated_to = Some(url.to_string());
    }
}

/// Loads a page into a gate session and fails one element or source.
///
/// # Errors
/// - `GateError::Configuration` - The login endpoint cannot be formed
/// - `WebError::UnknownTarget` - No such element or source
pub fn simulate(
    html: &str,
    config: &GateConfig,
    request: &SimulationRequest,
) -> anyhow::Result<SimulationReport> {
    let mut document = HtmlDocument::parse(html);
    let mut surface = OverlaySurface::default();
    document.mount_overlay(&surface.mount());

    let navigator = RecordingNavigator {
        location: request.location.clone(),
        navigated_to: None,
    };
    let mut session = GateSession::new(config, document, surface, navigator)?;
    let report = session.bind_all()?;

    let document = session.page_mut();
    document.play(request.element)?;
    let observers_notified = match request.source_index {
        Some(index) => document.fail_source(request.element, index)?,
        None => document.fail_element(request.element)?,
    };

    let mut transitions = session.process_pending();
    if request.confirm && session.state().is_shown() {
        session.sender().send(GateEvent::LoginConfirmed)?;
        transitions.extend(session.process_pending());
    }

    Ok(SimulationReport {
        gated_elements: report.newly_bound,
        observers_notified,
        transitions,
        overlay_visible: session.controller().surface().is_visible(),
        navigated_to: session.navigator().navigated_to.clone(),
    })
}

fn print_simulation(report: &SimulationReport) {
    println!("Gated elements: {}", report.gated_elements);
    println!("Observers notified: {}", report.observers_notified);
    for transition in &report.transitions {
        println!("  {transition:?}");
    }
    println!(
        "Prompt: {}",
        if report.overlay_visible { "shown" } else { "hidden" }
    );
    if let Some(url) = &report.navigated_to {
        println!("Navigated to: {url}");
    }
}

/// Runs an episode command against a page file.
///
/// # Errors
/// - The page cannot be read or written
/// - `WebError::EpisodeNotFound` - No episode at the given position
/// - `WebError::InvalidEpisode` - A card would lack its title or link
pub async fn run_episode_command(
    path: &Path,
    command: EpisodeCommand,
    classifier: &SourceClassifier,
) -> anyhow::Result<()> {
    let html = read_page(path).await?;

    match command {
        EpisodeCommand::List => {
            let blocks = episodes::extract_episodes(&html);
            if blocks.is_empty() {
                println!("No podcasts found in {}.", path.display());
            }
            for block in &blocks {
                println!("{}", list_line(block, classifier));
            }
            Ok(())
        }
        EpisodeCommand::Add { fields } => {
            let updated = add_episode(&html, fields, classifier)?;
            write_page(path, &updated).await?;
            println!("Episode added to {}", path.display());
            Ok(())
        }
        EpisodeCommand::Edit { position, fields } => {
            let updated = edit_episode(&html, position, fields, classifier)?;
            write_page(path, &updated).await?;
            println!("Episode {position} updated");
            Ok(())
        }
        EpisodeCommand::Delete { position } => {
            let block = episodes::episode_at(&html, zero_based(position)?)?;
            write_page(path, &episodes::remove_episode(&html, &block)).await?;
            println!("Episode {position} '{}' deleted", block.episode.title);
            Ok(())
        }
    }
}

fn list_line(block: &EpisodeBlock, classifier: &SourceClassifier) -> String {
    let lock = if classifier.is_protected(&block.episode.link) {
        " 🔒"
    } else {
        ""
    };
    format!(
        "{}. {}{lock} ({})",
        block.index + 1,
        block.episode.title,
        episodes::authors_text(&block.episode.authors)
    )
}

/// Page markup with a new card for `fields` appended.
///
/// # Errors
/// - `WebError::InvalidEpisode` - Title or link missing
/// - `WebError::MissingMarker` - The page has no `</main>`
pub fn add_episode(
    html: &str,
    fields: EpisodeFields,
    classifier: &SourceClassifier,
) -> anyhow::Result<String> {
    let episode = fields.apply(Episode::default());
    episode.validate()?;
    let card = episodes::render_episode_card(&episode, classifier);
    Ok(episodes::insert_episode(html, &card)?)
}

/// Page markup with the card at `position` re-rendered from its edited fields.
///
/// # Errors
/// - `WebError::EpisodeNotFound` - No episode at `position`
/// - `WebError::InvalidEpisode` - An edit cleared the title or link
pub fn edit_episode(
    html: &str,
    position: usize,
    fields: EpisodeFields,
    classifier: &SourceClassifier,
) -> anyhow::Result<String> {
    let block = episodes::episode_at(html, zero_based(position)?)?;
    let episode = fields.apply(block.episode.clone());
    episode.validate()?;
    let card = episodes::render_episode_card(&episode, classifier);
    Ok(episodes::replace_episode(html, &block, &card))
}

fn zero_based(position: usize) -> anyhow::Result<usize> {
    if position == 0 {
        bail!("episode positions start at 1");
    }
    Ok(position - 1)
}

async fn read_page(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("File not found at {}", path.display()))
}

async fn write_page(path: &Path, html: &str) -> anyhow::Result<()> {
    fs::write(path, html)
        .await
        .with_context(|| format!("Cannot write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = html.len(), "Page updated");
    Ok(())
}

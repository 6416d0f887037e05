//! Login prompt overlay markup and surface.

use audiogate_core::{GateError, GateEvent, PromptSurface};

/// Id of the overlay container.
pub const OVERLAY_ID: &str = "audiogate-auth-modal";
/// Id of the confirm button.
pub const LOGIN_BUTTON_ID: &str = "audiogate-login-btn";
/// Id of the cancel button.
pub const CANCEL_BUTTON_ID: &str = "audiogate-cancel-btn";
/// Class toggled on the overlay while it is visible.
pub const SHOW_CLASS: &str = "show";

/// Text shown in the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptCopy {
    pub heading: String,
    pub paragraphs: Vec<String>,
    pub login_label: String,
    pub cancel_label: String,
}

impl Default for PromptCopy {
    fn default() -> Self {
        Self {
            heading: "Anmeldung erforderlich".to_string(),
            paragraphs: vec![
                "Dieser Podcast wird auf Moodle gehostet.".to_string(),
                "Um ihn anzuhören, ist eine Anmeldung erforderlich.".to_string(),
                "Nach erfolgreichem Login wirst du automatisch auf diese Seite zurückgeleitet."
                    .to_string(),
            ],
            login_label: "Weiter zu Moodle".to_string(),
            cancel_label: "Abbrechen".to_string(),
        }
    }
}

/// Renders the overlay markup, visible or not.
pub fn render_overlay(copy: &PromptCopy, visible: bool) -> String {
    let paragraphs: String = copy
        .paragraphs
        .iter()
        .map(|p| format!("\n        <p>{p}</p>"))
        .collect();
    let show = if visible {
        format!(" {SHOW_CLASS}")
    } else {
        String::new()
    };

    format!(
        r#"<div id="{OVERLAY_ID}" class="modal-overlay{show}">
    <div class="modal-content">
        <h3>{heading}</h3>{paragraphs}
        <button id="{LOGIN_BUTTON_ID}" class="btn-modal">{login}</button>
        <button id="{CANCEL_BUTTON_ID}" class="btn-modal btn-secondary">{cancel}</button>
    </div>
</div>"#,
        heading = copy.heading,
        login = copy.login_label,
        cancel = copy.cancel_label,
    )
}

/// Maps a click on the overlay to a gate event.
///
/// `target_id` is the id of the clicked element, `None` for an element
/// without one. Clicks on the overlay container itself land outside the
/// content region.
pub fn click_event(target_id: Option<&str>) -> GateEvent {
    match target_id {
        Some(LOGIN_BUTTON_ID) => GateEvent::LoginConfirmed,
        Some(CANCEL_BUTTON_ID) => GateEvent::CancelRequested,
        Some(OVERLAY_ID) => GateEvent::OverlayClicked {
            inside_content: false,
        },
        _ => GateEvent::OverlayClicked {
            inside_content: true,
        },
    }
}

/// Prompt surface rendering the overlay by toggling its `show` class.
#[derive(Debug, Clone)]
pub struct OverlaySurface {
    copy: PromptCopy,
    mounted: bool,
    visible: bool,
    present_count: usize,
    dismiss_count: usize,
}

impl OverlaySurface {
    /// Creates an unmounted surface.
    pub fn new(copy: PromptCopy) -> Self {
        Self {
            copy,
            mounted: false,
            visible: false,
            present_count: 0,
            dismiss_count: 0,
        }
    }

    /// Marks the overlay as inserted into the page and returns its markup.
    pub fn mount(&mut self) -> String {
        self.mounted = true;
        self.render()
    }

    /// Current overlay markup.
    pub fn render(&self) -> String {
        render_overlay(&self.copy, self.visible)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hidden-to-visible changes so far.
    pub fn present_count(&self) -> usize {
        self.present_count
    }

    /// Visible-to-hidden changes so far.
    pub fn dismiss_count(&self) -> usize {
        self.dismiss_count
    }
}

impl Default for OverlaySurface {
    fn default() -> Self {
        Self::new(PromptCopy::default())
    }
}

impl PromptSurface for OverlaySurface {
    fn ensure_ready(&self) -> Result<(), GateError> {
        if self.mounted {
            Ok(())
        } else {
            Err(GateError::PresentationUnavailable {
                reason: format!("overlay #{OVERLAY_ID} is not mounted"),
            })
        }
    }

    fn present(&mut self) {
        if !self.visible {
            self.visible = true;
            self.present_count += 1;
        }
    }

    fn dismiss(&mut self) {
        if self.visible {
            self.visible = false;
            self.dismiss_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_markup() {
        let hidden = render_overlay(&PromptCopy::default(), false);

        assert!(hidden.contains(r#"<div id="audiogate-auth-modal" class="modal-overlay">"#));
        assert!(hidden.contains("<h3>Anmeldung erforderlich</h3>"));
        assert!(hidden.contains(r#"id="audiogate-login-btn""#));
        assert!(hidden.contains(">Abbrechen</button>"));

        let shown = render_overlay(&PromptCopy::default(), true);
        assert!(shown.contains(r#"class="modal-overlay show""#));
    }

    #[test]
    fn test_click_mapping() {
        assert_eq!(click_event(Some(LOGIN_BUTTON_ID)), GateEvent::LoginConfirmed);
        assert_eq!(click_event(Some(CANCEL_BUTTON_ID)), GateEvent::CancelRequested);
        assert_eq!(
            click_event(Some(OVERLAY_ID)),
            GateEvent::OverlayClicked {
                inside_content: false
            }
        );
        assert_eq!(
            click_event(None),
            GateEvent::OverlayClicked {
                inside_content: true
            }
        );
    }

    #[test]
    fn test_surface_is_idempotent() {
        let mut surface = OverlaySurface::default();
        assert!(surface.ensure_ready().is_err());
        surface.mount();
        assert!(surface.ensure_ready().is_ok());

        surface.dismiss();
        surface.present();
        surface.present();
        assert!(surface.is_visible());
        assert!(surface.render().contains("modal-overlay show"));

        surface.dismiss();
        surface.dismiss();
        assert_eq!(surface.present_count(), 1);
        assert_eq!(surface.dismiss_count(), 1);
        assert!(!surface.is_visible());
    }
}

//! Login prompt state machine.
//!
//! ```text
//! Hidden --attributable failure(E)--> Shown(E)       present(), pause(E)
//! Shown(E) --failure(F)-------------> Shown(F)       most recent failure wins
//! Shown(E) --cancel / outside click-> Hidden         dismiss()
//! Shown(E) --confirm----------------> handed off     navigate(login URL)
//! ```
//!
//! A handed-off controller is terminal: the page is navigating away and
//! every further event is ignored.

use serde::Serialize;

use crate::page::{ElementId, Navigator, PlaybackControl, PromptSurface};
use crate::redirect::{LoginEndpoint, RedirectIntent};

/// Visibility of the login prompt.
///
/// The active element exists exactly when the prompt is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PromptState {
    #[default]
    Hidden,
    Shown {
        active_element: ElementId,
    },
}

impl PromptState {
    /// Returns true when the prompt is visible.
    pub fn is_shown(&self) -> bool {
        matches!(self, PromptState::Shown { .. })
    }

    /// Element that triggered the visible prompt.
    pub fn active_element(&self) -> Option<ElementId> {
        match self {
            PromptState::Hidden => None,
            PromptState::Shown { active_element } => Some(*active_element),
        }
    }
}

/// What a controller call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Transition {
    /// `Hidden -> Shown`
    Shown { element: ElementId },
    /// Still shown, now attributed to a newer failing element
    ActiveUpdated {
        previous: ElementId,
        element: ElementId,
    },
    /// `Shown -> Hidden`
    Dismissed { element: ElementId },
    /// Navigation to the login endpoint was handed off
    HandedOff {
        element: ElementId,
        intent: RedirectIntent,
    },
    /// Nothing changed
    Ignored,
}

/// Owns the prompt state and the surface it drives.
#[derive(Debug)]
pub struct PromptController<S> {
    surface: S,
    endpoint: Option<LoginEndpoint>,
    state: PromptState,
    handed_off: bool,
}

impl<S: PromptSurface> PromptController<S> {
    /// Creates a hidden controller.
    ///
    /// Without an endpoint, login confirmation is ignored.
    pub fn new(surface: S, endpoint: Option<LoginEndpoint>) -> Self {
        Self {
            surface,
            endpoint,
            state: PromptState::Hidden,
            handed_off: false,
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    pub fn active_element(&self) -> Option<ElementId> {
        self.state.active_element()
    }

    /// Returns true once navigation to the login endpoint was handed off.
    pub fn is_handed_off(&self) -> bool {
        self.handed_off
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Handles a failure already attributed to the protected host.
    pub fn on_protected_failure<P: PlaybackControl + ?Sized>(
        &mut self,
        element: ElementId,
        playback: &mut P,
    ) -> Transition {
        if self.handed_off {
            return Transition::Ignored;
        }

        match self.state {
            PromptState::Hidden => {
                self.state = PromptState::Shown {
                    active_element: element,
                };
                self.surface.present();
                playback.pause(element);
                tracing::info!(element = %element, "Login prompt shown");
                Transition::Shown { element }
            }
            PromptState::Shown { active_element } if active_element == element => {
                Transition::Ignored
            }
            PromptState::Shown { active_element } => {
                self.state = PromptState::Shown {
                    active_element: element,
                };
                tracing::debug!(
                    previous = %active_element,
                    element = %element,
                    "Login prompt reattributed"
                );
                Transition::ActiveUpdated {
                    previous: active_element,
                    element,
                }
            }
        }
    }

    /// Handles the cancel action.
    pub fn cancel(&mut self) -> Transition {
        if self.handed_off {
            return Transition::Ignored;
        }

        match self.state {
            PromptState::Hidden => Transition::Ignored,
            PromptState::Shown { active_element } => {
                self.state = PromptState::Hidden;
                self.surface.dismiss();
                tracing::info!(element = %active_element, "Login prompt dismissed");
                Transition::Dismissed {
                    element: active_element,
                }
            }
        }
    }

    /// Handles a click on the overlay; only clicks outside the content
    /// region dismiss.
    pub fn overlay_clicked(&mut self, inside_content: bool) -> Transition {
        if inside_content {
            return Transition::Ignored;
        }
        self.cancel()
    }

    /// Handles login confirmation by handing navigation to the provider.
    pub fn confirm_login<N: Navigator + ?Sized>(&mut self, navigator: &mut N) -> Transition {
        if self.handed_off {
            return Transition::Ignored;
        }

        let PromptState::Shown { active_element } = self.state else {
            return Transition::Ignored;
        };

        let Some(endpoint) = &self.endpoint else {
            tracing::warn!("Login confirmed without a configured endpoint");
            return Transition::Ignored;
        };

        let intent = endpoint.build(&navigator.current_location());
        let url = intent.url();
        self.handed_off = true;
        tracing::info!(element = %active_element, url = %url, "Redirecting to login");
        navigator.navigate(&url);

        Transition::HandedOff {
            element: active_element,
            intent,
        }
    }
}

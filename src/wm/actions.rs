//! Window actions
//!
//! Per-window operations exposed to menus, key bindings and decoration
//! buttons. A button stores its action when the decoration is built; the
//! event path only hands that action to [`WindowManager::perform`].

use tracing::{debug, warn};
use x11rb::protocol::xproto::Window;

use crate::wm::client::MaximizeMode;
use crate::wm::server::XServer;
use crate::wm::WindowManager;

/// Operation on one managed window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Iconify,
    Deiconify,
    Close,
    Kill,
    Maximize(MaximizeMode),
    Shade,
    Stick,
    Raise,
    Lower,
    Focus,
    SendToWorkspace(u32),
    NextTab,
    PrevTab,
    DetachTab,
    /// Join the tab group of the given client
    JoinTab(Window),
}

impl WindowAction {
    /// The same action as triggered by a pointer button; maximize buttons
    /// pick their mode from the button
    pub fn for_button(self, button: u8) -> Self {
        match self {
            Self::Maximize(_) => Self::Maximize(MaximizeMode::from_button(button)),
            other => other,
        }
    }
}

impl<S: XServer> WindowManager<S> {
    /// Apply `action` to a managed client. Returns whether anything changed.
    pub fn perform(&mut self, window: Window, action: WindowAction) -> bool {
        if !self.registry.contains(window) {
            return false;
        }
        debug!("Action {:?} on 0x{:x}", action, window);
        let result = match action {
            WindowAction::Iconify => self.iconify(window),
            WindowAction::Deiconify => self.deiconify(window),
            WindowAction::Close => self.close(window),
            WindowAction::Kill => self.kill(window),
            WindowAction::Maximize(mode) => self.maximize(window, mode),
            WindowAction::Shade => self.shade(window),
            WindowAction::Stick => self.stick(window),
            WindowAction::Raise => self.raise(window),
            WindowAction::Lower => self.lower(window),
            WindowAction::Focus => self.request_focus(window),
            WindowAction::SendToWorkspace(workspace) => self.send_to_workspace(window, workspace),
            WindowAction::NextTab => self.cycle_tab(window, true),
            WindowAction::PrevTab => self.cycle_tab(window, false),
            WindowAction::DetachTab => self.detach_tab(window),
            WindowAction::JoinTab(target) => self.join_tabs(target, window),
        };
        match result {
            Ok(changed) => changed,
            Err(e) => {
                warn!("Action {:?} on 0x{:x} failed: {:#}", action, window, e);
                false
            }
        }
    }
}

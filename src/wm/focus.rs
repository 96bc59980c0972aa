//! Focus Module
//!
//! Input focus following the ICCCM input models, focus history for
//! fallback, and the auto-raise timer.
//!
//! Focus is requested from the server but only recorded when the FocusIn
//! arrives; until then the previous window keeps its focused look.

use std::collections::VecDeque;
use std::time::Instant;

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::wm::hints::FocusModel;
use crate::wm::server::{Protocol, RootProperty, XServer};
use crate::wm::timer::Timer;
use crate::wm::{TimerAction, WindowManager};

/// Maximum focus history size
const MAX_HISTORY: usize = 32;

/// Focus bookkeeping
#[derive(Debug, Default)]
pub struct FocusState {
    /// Window holding input focus, as last reported by FocusIn
    pub focused: Option<Window>,

    /// Most recently focused first
    history: VecDeque<Window>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, window: Window) {
        self.history.retain(|w| *w != window);
        self.history.push_front(window);
        self.history.truncate(MAX_HISTORY);
    }

    /// Forget a window that left management
    pub fn forget(&mut self, window: Window) {
        self.history.retain(|w| *w != window);
        if self.focused == Some(window) {
            self.focused = None;
        }
    }

    pub fn history(&self) -> impl Iterator<Item = Window> + '_ {
        self.history.iter().copied()
    }
}

impl<S: XServer> WindowManager<S> {
    /// Ask for input focus on `window` according to its input model.
    ///
    /// Returns false when nothing was sent: the window is unknown, already
    /// focused, not visible, gone, or takes no input.
    pub fn request_focus(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.focused {
            return Ok(false);
        }
        if !self.is_visible(window) || !self.server.validate_window(window) {
            return Ok(false);
        }

        match w.focus_model {
            FocusModel::NoInput => {
                debug!("0x{:x} takes no input", window);
                return Ok(false);
            }
            FocusModel::Passive => self.server.set_input_focus(window)?,
            FocusModel::LocallyActive => {
                self.server.set_input_focus(window)?;
                self.server.send_protocol(window, Protocol::TakeFocus)?;
            }
            FocusModel::GloballyActive => {
                self.server.send_protocol(window, Protocol::TakeFocus)?;
            }
        }
        debug!("Requested focus for 0x{:x} ({:?})", window, w.focus_model);
        Ok(true)
    }

    /// FocusIn on a client
    pub fn focus_in(&mut self, window: Window) -> Result<bool> {
        match self.registry.get(window) {
            Some(w) if !w.focused => {}
            _ => return Ok(false),
        }
        if let Some(previous) = self.focus.focused.filter(|p| *p != window) {
            self.unfocus(previous)?;
        }

        if let Some(w) = self.registry.get_mut(window) {
            w.focused = true;
        }
        self.focus.focused = Some(window);
        self.focus.push(window);
        self.repaint(window)?;
        self.server.publish(RootProperty::ActiveWindow(Some(window)))?;

        let focus = &self.config.focus;
        if focus.policy.follows_pointer() && focus.auto_raise {
            self.arm_auto_raise(window);
        }
        Ok(true)
    }

    /// FocusOut from a client
    pub fn focus_out(&mut self, window: Window) -> Result<bool> {
        if !self.registry.get(window).is_some_and(|w| w.focused) {
            return Ok(false);
        }
        self.unfocus(window)?;
        if self.focus.focused.is_none() {
            self.server.publish(RootProperty::ActiveWindow(None))?;
        }
        Ok(true)
    }

    fn unfocus(&mut self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        w.focused = false;
        if let Some(timer) = w.auto_raise.take() {
            self.timers.disarm(timer);
        }
        if self.focus.focused == Some(window) {
            self.focus.focused = None;
        }
        self.cancel_drag(Some(window))?;
        self.repaint(window)
    }

    /// Focus moves away from `leaving`: pick the most recently focused
    /// window that can take it, else the root
    pub(crate) fn focus_fallback(&mut self, leaving: Window) -> Result<()> {
        let candidates: Vec<Window> = self.focus.history().filter(|w| *w != leaving).collect();
        for candidate in candidates {
            if self.request_focus(candidate)? {
                debug!("Focus falls back from 0x{:x} to 0x{:x}", leaving, candidate);
                return Ok(());
            }
        }
        debug!("Focus falls back from 0x{:x} to the root", leaving);
        self.server.focus_root()
    }

    fn arm_auto_raise(&mut self, window: Window) {
        let delay = self.config.focus.auto_raise_delay();
        let id = self
            .timers
            .arm(Timer::once(Instant::now(), delay, TimerAction::AutoRaise(window)));
        if let Some(w) = self.registry.get_mut(window) {
            if let Some(previous) = w.auto_raise.replace(id) {
                self.timers.disarm(previous);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FocusPolicy};
    use crate::shared::Geometry;
    use crate::wm::hints::Protocols;
    use crate::wm::server::testing::Request;
    use crate::wm::server::ClientInfo;
    use crate::wm::testing::{adopt_plain, manager, manager_with};

    const A: Window = 0x400001;
    const B: Window = 0x400002;

    fn with_input(input: bool, take_focus: bool) -> ClientInfo {
        let mut info = ClientInfo {
            geometry: Geometry::new(0, 0, 100, 100),
            ..ClientInfo::default()
        };
        info.hints.wm.input = input;
        info.hints.protocols = Protocols { delete_window: false, take_focus };
        info
    }

    #[test]
    fn test_focus_follows_input_model() {
        let mut wm = manager();
        let cases = [
            (0x400011, true, false, true, false),
            (0x400012, true, true, true, true),
            (0x400013, false, true, false, true),
            (0x400014, false, false, false, false),
        ];
        for (window, input, take_focus, set_focus, message) in cases {
            wm.server.add_client(window, with_input(input, take_focus));
            assert!(wm.adopt(window).unwrap());
            wm.server.take_requests();
            assert_eq!(wm.request_focus(window).unwrap(), set_focus || message);
            assert_eq!(wm.server.has_request(&Request::Focus(window)), set_focus);
            assert_eq!(
                wm.server.has_request(&Request::Protocol { window, protocol: Protocol::TakeFocus }),
                message
            );
        }
    }

    #[test]
    fn test_focus_in_moves_focused_look() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        adopt_plain(&mut wm, B, Geometry::new(0, 0, 100, 100));

        assert!(wm.focus_in(A).unwrap());
        assert!(!wm.focus_in(A).unwrap());
        assert!(!wm.request_focus(A).unwrap());
        assert!(wm.focus_in(B).unwrap());

        assert!(!wm.registry.get(A).unwrap().focused);
        assert!(wm.registry.get(B).unwrap().focused);
        assert_eq!(wm.focus.focused, Some(B));
        assert!(wm.server.has_request(&Request::Publish(RootProperty::ActiveWindow(Some(B)))));
        assert_eq!(wm.focus.history().collect::<Vec<_>>(), vec![B, A]);
    }

    #[test]
    fn test_focus_out_clears_active_window() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        assert!(wm.focus_in(A).unwrap());
        wm.server.take_requests();
        assert!(wm.focus_out(A).unwrap());
        assert!(!wm.focus_out(A).unwrap());
        assert_eq!(wm.focus.focused, None);
        assert!(wm.server.has_request(&Request::Publish(RootProperty::ActiveWindow(None))));
    }

    #[test]
    fn test_auto_raise_only_with_pointer_focus() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        assert!(wm.focus_in(A).unwrap());
        assert!(wm.registry.get(A).unwrap().auto_raise.is_none());

        let mut config = Config::default();
        config.focus.policy = FocusPolicy::Sloppy;
        let mut wm = manager_with(config);
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        assert!(wm.focus_in(A).unwrap());
        let timer = wm.registry.get(A).unwrap().auto_raise.unwrap();
        assert!(wm.timers.is_armed(timer));

        assert!(wm.focus_out(A).unwrap());
        assert!(!wm.timers.is_armed(timer));
        assert!(wm.registry.get(A).unwrap().auto_raise.is_none());
    }

    #[test]
    fn test_fallback_uses_history_then_root() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        adopt_plain(&mut wm, B, Geometry::new(0, 0, 100, 100));
        assert!(wm.focus_in(A).unwrap());
        assert!(wm.focus_in(B).unwrap());
        wm.server.take_requests();

        assert!(wm.iconify(B).unwrap());
        assert!(wm.server.has_request(&Request::Focus(A)));

        assert!(wm.focus_in(A).unwrap());
        wm.server.take_requests();
        assert!(wm.iconify(A).unwrap());
        assert!(wm.server.has_request(&Request::FocusRoot));
    }
}

//! Workspace Module
//!
//! Virtual desktops: which one is shown, switching between them, and
//! moving windows (with their tab group) from one to another. Stuck
//! windows are shown on every workspace.

use anyhow::Result;
use tracing::{debug, info, warn};
use x11rb::protocol::xproto::Window;

use crate::wm::client::WindowState;
use crate::wm::server::{RootProperty, XServer};
use crate::wm::WindowManager;

/// `_NET_WM_DESKTOP` value meaning every desktop
pub const ALL_WORKSPACES: u32 = 0xFFFF_FFFF;

/// Workspace bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workspaces {
    /// Current workspace index (0-based)
    pub current: u32,

    /// Number of workspaces; at least one
    pub count: u32,
}

impl Workspaces {
    pub fn new(count: u32) -> Self {
        Self {
            current: 0,
            count: count.max(1),
        }
    }

    /// Change the workspace count, pulling the current index into range
    pub fn resize(&mut self, count: u32) {
        self.count = count.max(1);
        self.current = self.current.min(self.count - 1);
    }

    /// Whether a window on `workspace` is visible right now
    pub fn shows(&self, workspace: u32, stuck: bool) -> bool {
        stuck || workspace == self.current
    }

    pub fn contains(&self, workspace: u32) -> bool {
        workspace < self.count
    }
}

impl<S: XServer> WindowManager<S> {
    /// Show workspace `target`, hiding the windows of the current one
    pub fn switch_workspace(&mut self, target: u32) -> Result<bool> {
        if !self.workspaces.contains(target) {
            warn!(
                "Invalid workspace index: {} (max: {})",
                target,
                self.workspaces.count - 1
            );
            return Ok(false);
        }
        let leaving = self.workspaces.current;
        if target == leaving {
            debug!("Already on workspace {}", target);
            return Ok(false);
        }
        info!("Switching from workspace {} to {}", leaving, target);

        self.cancel_drag(None)?;
        self.workspaces.current = target;
        for client in self.registry.clients().to_vec() {
            let Some(w) = self.registry.get(client) else {
                continue;
            };
            if w.stuck || w.state != WindowState::Normal {
                continue;
            }
            if w.workspace == leaving {
                self.hide_frame(client)?;
            } else if w.workspace == target {
                self.show_frame(client)?;
            }
        }
        self.server.publish(RootProperty::CurrentDesktop(target))?;

        if let Some(focused) = self.focus.focused {
            if !self.is_visible(focused) {
                self.focus_fallback(focused)?;
            }
        }
        Ok(true)
    }

    /// Move a window and its tab group to `workspace`
    pub fn send_to_workspace(&mut self, window: Window, workspace: u32) -> Result<bool> {
        if !self.workspaces.contains(workspace) {
            return Ok(false);
        }
        match self.registry.get(window) {
            Some(w) if w.workspace != workspace || w.stuck => {}
            _ => return Ok(false),
        }
        debug!("Sending 0x{:x} to workspace {}", window, workspace);

        let was_visible = self.is_visible(window);
        for member in crate::wm::tabs::members(&self.registry, window) {
            let Some(w) = self.registry.get_mut(member) else {
                continue;
            };
            w.workspace = workspace;
            w.stuck = false;
            let state = w.state;
            if state == WindowState::Normal {
                if self.workspaces.shows(workspace, false) {
                    self.show_frame(member)?;
                } else {
                    self.hide_frame(member)?;
                }
            }
            self.persist(member)?;
        }

        if was_visible && !self.is_visible(window) && self.focus.focused == Some(window) {
            self.focus_fallback(window)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::server::testing::Request;
    use crate::wm::testing::{adopt_plain, manager};

    const A: Window = 0x400001;
    const B: Window = 0x400002;

    #[test]
    fn test_resize_clamps_current() {
        let mut workspaces = Workspaces::new(4);
        workspaces.current = 3;
        workspaces.resize(2);
        assert_eq!(workspaces.current, 1);
        workspaces.resize(0);
        assert_eq!((workspaces.current, workspaces.count), (0, 1));
    }

    #[test]
    fn test_stuck_windows_show_everywhere() {
        let workspaces = Workspaces::new(4);
        assert!(workspaces.shows(0, false));
        assert!(!workspaces.shows(2, false));
        assert!(workspaces.shows(2, true));
    }

    #[test]
    fn test_switch_hides_and_shows_frames() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        adopt_plain(&mut wm, B, Geometry::new(0, 0, 100, 100));
        assert!(wm.stick(B).unwrap());
        let frame_a = wm.registry.get(A).unwrap().windows.frame;
        let frame_b = wm.registry.get(B).unwrap().windows.frame;
        wm.server.take_requests();

        assert!(wm.switch_workspace(1).unwrap());
        assert!(wm.server.has_request(&Request::Unmap(frame_a)));
        assert!(!wm.server.has_request(&Request::Unmap(frame_b)));
        assert!(wm.server.has_request(&Request::Publish(RootProperty::CurrentDesktop(1))));
        assert!(!wm.is_visible(A));
        assert!(wm.is_visible(B));

        wm.server.take_requests();
        assert!(wm.switch_workspace(0).unwrap());
        assert!(wm.server.has_request(&Request::Map(frame_a)));
        assert!(!wm.switch_workspace(0).unwrap());
        assert!(!wm.switch_workspace(9).unwrap());
    }

    #[test]
    fn test_send_to_workspace_moves_tab_group() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        adopt_plain(&mut wm, B, Geometry::new(200, 200, 100, 100));
        assert!(wm.join_tabs(A, B).unwrap());

        assert!(wm.send_to_workspace(B, 3).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().workspace, 3);
        assert_eq!(wm.registry.get(B).unwrap().workspace, 3);
        assert!(!wm.is_visible(A));
        assert!(wm.server.has_request(&Request::Desktop { window: A, desktop: Some(3) }));
        assert!(!wm.send_to_workspace(B, 3).unwrap());
    }
}

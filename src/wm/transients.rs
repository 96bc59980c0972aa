//! Transients Module
//!
//! Transient-for relationships between managed windows. The child records
//! its owner in its hints; the owner keeps the list of its children.
//! Links that would close a cycle are refused, so the relation is a
//! forest and walking it always terminates.

use anyhow::Result;
use tracing::{debug, warn};
use x11rb::protocol::xproto::Window;

use crate::wm::client::WindowState;
use crate::wm::server::XServer;
use crate::wm::WindowManager;

impl<S: XServer> WindowManager<S> {
    /// Record `client` as a child of the window it is transient for
    pub(crate) fn link_transient(&mut self, client: Window) {
        let Some(owner) = self.registry.get(client).and_then(|w| w.transient_for()) else {
            return;
        };
        if owner == client || self.is_transient_ancestor(client, owner) {
            warn!("Ignoring cyclic transient 0x{:x} -> 0x{:x}", client, owner);
            if let Some(w) = self.registry.get_mut(client) {
                w.hints.transient_for = None;
            }
            return;
        }
        let Some(parent) = self.registry.get_mut(owner) else {
            debug!("0x{:x} is transient for unmanaged 0x{:x}", client, owner);
            return;
        };
        if !parent.transients.contains(&client) {
            parent.transients.push(client);
        }
        debug!("0x{:x} is transient for 0x{:x}", client, owner);
    }

    /// Drop `client` from its owner's children
    pub(crate) fn unlink_transient(&mut self, client: Window, owner: Option<Window>) {
        if let Some(parent) = owner.and_then(|o| self.registry.get_mut(o)) {
            parent.transients.retain(|w| *w != client);
        }
    }

    /// The owner is gone; its children stay managed without one
    pub(crate) fn orphan_transients(&mut self, children: &[Window]) {
        for child in children {
            if let Some(w) = self.registry.get_mut(*child) {
                w.hints.transient_for = None;
            }
        }
    }

    /// Whether `ancestor` is reached by following transient-for links
    /// up from `window`
    fn is_transient_ancestor(&self, ancestor: Window, window: Window) -> bool {
        let mut current = Some(window);
        for _ in 0..=self.registry.len() {
            match current {
                Some(w) if w == ancestor => return true,
                Some(w) => current = self.registry.get(w).and_then(|w| w.transient_for()),
                None => return false,
            }
        }
        false
    }

    /// Raise the visible transients of `owner` above it, recursively
    pub(crate) fn raise_transients(&self, owner: Window) -> Result<()> {
        let Some(w) = self.registry.get(owner) else {
            return Ok(());
        };
        for child in &w.transients {
            let Some(c) = self.registry.get(*child) else {
                continue;
            };
            if c.state == WindowState::Normal {
                self.server.raise_window(c.windows.frame)?;
                self.raise_transients(*child)?;
            }
        }
        Ok(())
    }
}

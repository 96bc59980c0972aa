//! Tab groups
//!
//! Windows grouped into one tab strip form a ring: each record holds the
//! ids of its previous and next neighbours, a singleton points at itself.
//! The ring functions below only touch links; the [`WindowManager`]
//! methods keep frames, tab windows and shared state in line with them.
//!
//! Members share one frame geometry and are stacked on top of each other;
//! the one raised last is the one seen. Each member keeps its own
//! lifecycle state. Iconic members stay in the ring but lose their slot in
//! the visible tab order.

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::wm::client::{ManagedWindow, Registry, WindowState};
use crate::wm::client_flags::Decorations;
use crate::wm::decorations::Part;
use crate::wm::server::{WindowRole, XServer};
use crate::wm::WindowManager;

/// Ring members starting at `start`, in `next` order.
///
/// Bounded by the registry size, so a corrupted ring cannot loop forever.
pub fn members(registry: &Registry, start: Window) -> Vec<Window> {
    let Some(first) = registry.get(start) else {
        return Vec::new();
    };
    let mut members = vec![start];
    let mut current = first.tab_next;
    while current != start && members.len() < registry.len() {
        let Some(w) = registry.get(current) else {
            break;
        };
        members.push(current);
        current = w.tab_next;
    }
    members
}

/// Ring members that own a slot in the visible tab order
pub fn visible_members(registry: &Registry, start: Window) -> Vec<Window> {
    members(registry, start)
        .into_iter()
        .filter(|w| registry.get(*w).is_some_and(|m| m.state != WindowState::Iconic))
        .collect()
}

fn link(registry: &mut Registry, prev: Window, next: Window) {
    if let Some(p) = registry.get_mut(prev) {
        p.tab_next = next;
    }
    if let Some(n) = registry.get_mut(next) {
        n.tab_prev = prev;
    }
}

/// Splice the ring of `window` into the ring of `target`, right after
/// `target`. False if either is unknown or they already share a ring.
pub fn join(registry: &mut Registry, target: Window, window: Window) -> bool {
    if !registry.contains(target) || !registry.contains(window) {
        return false;
    }
    if members(registry, target).contains(&window) {
        return false;
    }
    let (Some(after), Some(last)) = (
        registry.get(target).map(|t| t.tab_next),
        registry.get(window).map(|w| w.tab_prev),
    ) else {
        return false;
    };
    link(registry, target, window);
    link(registry, last, after);
    true
}

/// Take `window` out of its ring; returns a former neighbour.
/// `None` if it was a singleton already.
pub fn detach(registry: &mut Registry, window: Window) -> Option<Window> {
    let w = registry.get_mut(window)?;
    let (prev, next) = (w.tab_prev, w.tab_next);
    if next == window {
        return None;
    }
    w.tab_prev = window;
    w.tab_next = window;
    link(registry, prev, next);
    Some(next)
}

/// Heal the ring around a record already removed from the registry
pub fn unlink_removed(registry: &mut Registry, removed: &ManagedWindow) -> Option<Window> {
    let (prev, next) = (removed.tab_prev, removed.tab_next);
    if next == removed.client {
        return None;
    }
    // with two members prev == next and the survivor links to itself
    link(registry, prev, next);
    registry.contains(next).then_some(next)
}

impl<S: XServer> WindowManager<S> {
    /// Every other member of the ring holding `window`
    pub fn tab_peers(&self, window: Window) -> Vec<Window> {
        members(&self.registry, window)
            .into_iter()
            .skip(1)
            .collect()
    }

    /// `window` (with its own group) joins the group of `target`, taking
    /// on its geometry, workspace and modifiers
    pub fn join_tabs(&mut self, target: Window, window: Window) -> Result<bool> {
        if !join(&mut self.registry, target, window) {
            return Ok(false);
        }
        debug!("Tab 0x{:x} joins group of 0x{:x}", window, target);
        let Some(t) = self.registry.get(target) else {
            return Ok(false);
        };
        let (workspace, stuck, shaded) = (t.workspace, t.stuck, t.shaded);

        for peer in self.tab_peers(target) {
            if let Some(w) = self.registry.get_mut(peer) {
                w.workspace = workspace;
                w.stuck = stuck;
            }
            self.set_shaded(peer, shaded)?;
            match self.registry.get(peer).map(|w| w.state) {
                Some(WindowState::Normal) if self.is_visible(peer) => self.show_frame(peer)?,
                Some(WindowState::Normal) => self.hide_frame(peer)?,
                _ => {}
            }
            self.persist(peer)?;
        }
        self.sync_group_geometry(target)?;
        self.update_tabs(target)?;
        self.raise(window)?;
        Ok(true)
    }

    /// Take `window` out of its group; it keeps its place on screen
    pub fn detach_tab(&mut self, window: Window) -> Result<bool> {
        let Some(neighbour) = detach(&mut self.registry, window) else {
            return Ok(false);
        };
        debug!("Tab 0x{:x} leaves group of 0x{:x}", window, neighbour);
        self.update_tabs(window)?;
        self.update_tabs(neighbour)?;
        Ok(true)
    }

    /// Bring the next (or previous) visible member of the group to front
    pub fn cycle_tab(&mut self, window: Window, forward: bool) -> Result<bool> {
        let others: Vec<Window> = visible_members(&self.registry, window)
            .into_iter()
            .filter(|w| *w != window)
            .collect();
        let target = if forward { others.first() } else { others.last() };
        let Some(&target) = target else {
            return Ok(false);
        };
        self.raise(target)?;
        self.request_focus(target)?;
        Ok(true)
    }

    /// Move every peer onto the frame geometry of `window`
    pub(crate) fn sync_group_geometry(&mut self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get(window).filter(|w| w.is_tabbed()) else {
            return Ok(());
        };
        let (x, y, size) = (w.frame.x, w.frame.y, w.client_size);
        for peer in self.tab_peers(window) {
            let Some(p) = self.registry.get(peer) else {
                continue;
            };
            let peer_size = p.hints.size.constrain(size.0, size.1);
            if (p.frame.x, p.frame.y, p.client_size) != (x, y, peer_size) {
                self.apply_geometry(peer, x, y, peer_size)?;
            }
        }
        Ok(())
    }

    /// Create, place, show or drop the tab windows of a group
    pub(crate) fn update_tabs(&mut self, window: Window) -> Result<()> {
        let group = members(&self.registry, window);
        let show = group.len() > 1 || self.config.tabs.always_show;
        let tab_width = self.config.decorations.tab_width.max(1);
        let mut slot = 0;

        for member in group {
            let Some(w) = self.registry.get(member) else {
                continue;
            };
            let existing = w.windows.tab;
            if !show {
                if let Some(tab) = existing {
                    self.server.destroy_window(tab)?;
                    self.registry.unregister_part(tab);
                    if let Some(w) = self.registry.get_mut(member) {
                        w.windows.tab = None;
                        w.capabilities.decorations.remove(Decorations::TAB);
                    }
                }
                continue;
            }

            let geometry = w.layout.tab(&w.frame, slot, tab_width);
            let (state, decorations, focused) = (w.state, w.decorations(), w.focused);
            let tab = match existing {
                Some(tab) => tab,
                None => {
                    let tab = self
                        .server
                        .create_window(self.root(), geometry, WindowRole::Tab)?;
                    self.registry.register_part(tab, member, Part::Tab);
                    if let Some(w) = self.registry.get_mut(member) {
                        w.windows.tab = Some(tab);
                        w.capabilities.decorations.insert(Decorations::TAB);
                    }
                    let background = self.renderer.background(Part::Tab, decorations, focused, false);
                    self.server.set_background(tab, background)?;
                    tab
                }
            };

            if state == WindowState::Iconic {
                self.server.unmap_window(tab)?;
                continue;
            }
            self.server.configure_window(tab, geometry)?;
            if self.is_visible(member) {
                self.server.map_window(tab)?;
            } else {
                self.server.unmap_window(tab)?;
            }
            slot += 1;
        }
        Ok(())
    }
}

//! Window lifecycle
//!
//! Transitions of a managed window: adopt, iconify, deiconify, withdraw,
//! release, destroy, plus the orthogonal modifiers (shade, maximize,
//! stick) and stacking. Every transition writes the persisted state back
//! onto the client window; the client is the durable copy of the state,
//! the registry record is a cache of it.

use anyhow::Result;
use tracing::{debug, info};
use x11rb::protocol::xproto::{ConfigWindow, ConfigureRequestEvent, StackMode, Window};

use crate::shared::{Geometry, Strut};
use crate::wm::client::{ManagedWindow, MaximizeMode, WindowState};
use crate::wm::client_flags::{Capabilities, Decorations, Functions};
use crate::wm::decorations::{
    build_decorations, create_frame, destroy_decorations, paint, place_decorations, FrameLayout,
};
use crate::wm::hints::{ClientHints, IcccmState, VendorAttributes};
use crate::wm::placement;
use crate::wm::server::{ClientInfo, HintProperty, Protocol, RootProperty, XServer};
use crate::wm::WindowManager;

/// Why a window leaves management
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unmanage {
    /// The client window is gone
    Destroyed,
    /// The client withdrew itself
    Withdrawn,
    /// The manager is shutting down
    Released,
}

impl<S: XServer> WindowManager<S> {
    /// Take a top-level window under management.
    ///
    /// Returns `Ok(false)` when the window is not ours to manage or
    /// vanished while we were setting it up.
    pub fn adopt(&mut self, window: Window) -> Result<bool> {
        if self.registry.find(window).is_some() || self.docks.contains_key(&window) {
            return Ok(false);
        }
        self.server.grab_server()?;
        let result = self.adopt_grabbed(window);
        self.server.ungrab_server()?;
        let adopted = result?;
        if adopted {
            self.publish_client_list()?;
        }
        Ok(adopted)
    }

    fn adopt_grabbed(&mut self, window: Window) -> Result<bool> {
        let Some(info) = self.server.fetch_client(window)? else {
            debug!("Window 0x{:x} vanished before adoption", window);
            return Ok(false);
        };
        if info.override_redirect {
            return Ok(false);
        }
        if info.hints.dock {
            return self.adopt_dock(window, &info);
        }

        let starting = self.server.is_starting();
        let hints = info.hints.clone();
        let capabilities = Capabilities::derive(&hints);
        let layout = FrameLayout::new(capabilities.decorations, &self.config.decorations);
        let extents = layout.extents();
        let client_size = hints
            .size
            .constrain(info.geometry.width, info.geometry.height);
        let (frame_width, frame_height) = layout.frame_size(client_size.0, client_size.1, false);
        let (x, y) = self.initial_position(&info, &layout, (frame_width, frame_height), starting);
        let frame = Geometry::new(x, y, frame_width, frame_height);

        let mut windows = create_frame(&self.server, self.root(), frame, &layout, client_size)?;
        build_decorations(
            &self.server,
            &mut windows,
            capabilities.decorations,
            &layout,
            client_size.1,
            frame_width,
        )?;

        self.server.change_save_set(window, true)?;
        self.server.set_border_width(window, 0)?;
        self.server.select_client_input(window)?;
        self.server.reparent_window(window, windows.plate, 0, 0)?;

        if !self.server.validate_window(window) || self.server.last_bad_window() == Some(window) {
            debug!("Window 0x{:x} vanished during adoption", window);
            self.server.destroy_window(windows.frame)?;
            return Ok(false);
        }

        let mut managed = ManagedWindow::new(window, windows, layout, frame, client_size, hints);
        managed.original_border = info.border_width;
        managed.workspace = self.workspaces.current;
        if let Some(owner) = managed.transient_for().and_then(|o| self.registry.get(o)) {
            managed.workspace = owner.workspace;
        }
        if let Some(vendor) = managed.hints.vendor {
            managed.restore_attributes(&VendorAttributes {
                flags: vendor.flags,
                attrib: vendor.attrib,
                workspace: vendor.workspace,
                stack: vendor.stack,
                premax: Geometry::default(),
            });
        }
        if starting {
            if let Some(saved) = info.saved {
                managed.restore_attributes(&saved);
            }
        }
        managed.workspace = managed.workspace.min(self.workspaces.count - 1);
        if !managed.decorations().contains(Decorations::TITLEBAR) {
            managed.shaded = false;
        }
        // reparenting a viewable window unmaps it once
        if info.viewable {
            managed.ignore_unmaps += 1;
        }

        let initial = match info.wm_state.filter(|_| starting) {
            Some(state) => state,
            None => managed.hints.wm.initial_state,
        };
        managed.state = match initial {
            IcccmState::Iconic => WindowState::Iconic,
            IcccmState::Normal | IcccmState::Withdrawn => WindowState::Normal,
        };

        self.server
            .configure_window(window, Geometry::new(0, 0, client_size.0, client_size.1))?;
        self.server.set_frame_extents(window, extents)?;
        self.server.map_window(window)?;
        self.server.set_wm_state(window, managed.state.into())?;

        info!(
            "Managing 0x{:x} {:?} as {:?} at {:?}",
            window, managed.hints.title, managed.state, managed.frame
        );
        self.registry.insert(managed);
        self.link_transient(window);
        let waiting: Vec<Window> = self
            .registry
            .clients()
            .iter()
            .copied()
            .filter(|c| self.registry.get(*c).and_then(|w| w.transient_for()) == Some(window))
            .collect();
        for child in waiting {
            self.link_transient(child);
        }

        if self.registry.get(window).is_some_and(|w| w.shaded) {
            let client_size = self.client_size(window);
            self.apply_geometry(window, x, y, client_size)?;
        }
        self.repaint(window)?;
        if self.is_visible(window) {
            self.show_frame(window)?;
        }
        self.update_tabs(window)?;
        self.persist(window)?;

        if !starting && self.config.focus.focus_new && self.is_visible(window) {
            self.request_focus(window)?;
        }
        Ok(true)
    }

    /// Frame position for a new window
    fn initial_position(
        &mut self,
        info: &ClientInfo,
        layout: &FrameLayout,
        frame_size: (u32, u32),
        starting: bool,
    ) -> (i32, i32) {
        let size = &info.hints.size;
        if starting || size.has_position {
            return size
                .gravity
                .frame_position(info.geometry.x, info.geometry.y, &layout.extents());
        }
        let outer = (
            frame_size.0 + 2 * layout.border,
            frame_size.1 + 2 * layout.border,
        );
        let area = self.usable_area(&info.geometry);
        let owner = info.hints.transient_for.and_then(|o| self.registry.get(o));
        match owner {
            Some(owner) => placement::center_over(&owner.frame, outer, &area),
            None => self
                .placement
                .place(self.config.behavior.placement, &area, outer),
        }
    }

    /// Docks are mapped unframed; their strut feeds the usable area
    fn adopt_dock(&mut self, window: Window, info: &ClientInfo) -> Result<bool> {
        let strut = info
            .strut
            .unwrap_or_default()
            .clamped(self.screen.width, self.screen.height);
        debug!("Dock 0x{:x} reserves {:?}", window, strut);
        self.server.select_client_input(window)?;
        self.server.map_window(window)?;
        self.docks.insert(window, strut);
        self.publish_workarea()?;
        Ok(true)
    }

    /// Forget a dock; returns false if `window` is not one
    pub(crate) fn remove_dock(&mut self, window: Window) -> Result<bool> {
        if self.docks.remove(&window).is_none() {
            return Ok(false);
        }
        debug!("Dock 0x{:x} gone", window);
        self.publish_workarea()?;
        Ok(true)
    }

    pub(crate) fn update_dock_strut(&mut self, window: Window, strut: Strut) -> Result<()> {
        let strut = strut.clamped(self.screen.width, self.screen.height);
        if let Some(reserved) = self.docks.get_mut(&window) {
            *reserved = strut;
            self.publish_workarea()?;
        }
        Ok(())
    }

    pub fn is_dock(&self, window: Window) -> bool {
        self.docks.contains_key(&window)
    }

    /// Hide the window; transients follow. No-op when already iconic.
    pub fn iconify(&mut self, window: Window) -> Result<bool> {
        match self.registry.get(window).map(|w| w.state) {
            Some(WindowState::Normal) => {}
            _ => return Ok(false),
        }
        self.iconify_one(window)?;
        if self.config.tabs.iconify_group {
            for peer in self.tab_peers(window) {
                self.iconify_one(peer)?;
            }
        }
        self.update_tabs(window)?;
        Ok(true)
    }

    fn iconify_one(&mut self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        if w.state == WindowState::Iconic {
            return Ok(());
        }
        debug!("Iconify 0x{:x}", window);
        w.state = WindowState::Iconic;
        let was_focused = w.focused || self.focus.focused == Some(window);
        let transients = w.transients.clone();

        self.cancel_drag(Some(window))?;
        self.hide_frame(window)?;
        self.server.set_wm_state(window, IcccmState::Iconic)?;
        self.persist(window)?;

        for child in transients {
            self.iconify_one(child)?;
        }
        if was_focused {
            self.focus_fallback(window)?;
        }
        Ok(())
    }

    /// Show an iconic window again on the current workspace
    pub fn deiconify(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.state == WindowState::Normal && self.workspaces.shows(w.workspace, w.stuck) {
            return Ok(false);
        }
        self.deiconify_one(window)?;
        if self.config.tabs.iconify_group {
            for peer in self.tab_peers(window) {
                self.deiconify_one(peer)?;
            }
        }
        self.update_tabs(window)?;
        self.raise(window)?;
        self.request_focus(window)?;
        Ok(true)
    }

    fn deiconify_one(&mut self, window: Window) -> Result<()> {
        let current = self.workspaces.current;
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        debug!("Deiconify 0x{:x}", window);
        if !w.stuck && w.workspace != current {
            w.workspace = current;
        }
        w.state = WindowState::Normal;
        let transients = w.transients.clone();

        self.show_frame(window)?;
        self.server.set_wm_state(window, IcccmState::Normal)?;
        self.persist(window)?;

        for child in transients {
            if self.registry.get(child).map(|c| c.state) == Some(WindowState::Iconic) {
                self.deiconify_one(child)?;
            }
        }
        Ok(())
    }

    /// The client unmapped itself: stop managing it and erase our state
    pub fn withdraw(&mut self, window: Window) -> Result<bool> {
        self.unmanage(window, Unmanage::Withdrawn)
    }

    /// Give the client back to the root, keeping the persisted state
    pub fn release(&mut self, window: Window) -> Result<bool> {
        self.unmanage(window, Unmanage::Released)
    }

    /// The client window was destroyed
    pub fn destroy(&mut self, window: Window) -> Result<bool> {
        self.unmanage(window, Unmanage::Destroyed)
    }

    fn unmanage(&mut self, window: Window, reason: Unmanage) -> Result<bool> {
        if reason == Unmanage::Released {
            self.persist(window)?;
        }
        let Some(w) = self.registry.remove(window) else {
            return Ok(false);
        };
        debug!("Unmanage 0x{:x} ({:?})", window, reason);

        for timer in [w.auto_raise, w.double_click].into_iter().flatten() {
            self.timers.disarm(timer);
        }
        self.cancel_drag(Some(window))?;

        let neighbour = crate::wm::tabs::unlink_removed(&mut self.registry, &w);
        self.unlink_transient(window, w.transient_for());
        self.orphan_transients(&w.transients);

        let was_focused = w.focused || self.focus.focused == Some(window);
        self.focus.forget(window);

        self.server.grab_server()?;
        let result = self.restore_client(&w, reason);
        self.server.ungrab_server()?;
        result?;

        if let Some(neighbour) = neighbour {
            self.update_tabs(neighbour)?;
        }
        if was_focused {
            self.server.publish(RootProperty::ActiveWindow(None))?;
            if reason != Unmanage::Released {
                self.focus_fallback(window)?;
            }
        }
        self.publish_client_list()?;
        Ok(true)
    }

    /// Undo the reparenting and destroy every window we created
    fn restore_client(&self, w: &ManagedWindow, reason: Unmanage) -> Result<()> {
        let client = w.client;
        self.server.unmap_window(w.windows.frame)?;
        if reason != Unmanage::Destroyed && self.server.validate_window(client) {
            let (x, y) = w
                .hints
                .size
                .gravity
                .client_position(w.frame.x, w.frame.y, &w.extents());
            match reason {
                Unmanage::Withdrawn => {
                    self.server.unmap_window(client)?;
                    self.server.clear_state_properties(client)?;
                    self.server.set_wm_state(client, IcccmState::Withdrawn)?;
                }
                Unmanage::Released if w.state == WindowState::Iconic => {
                    self.server.unmap_window(client)?;
                }
                _ => {}
            }
            self.server.reparent_window(client, self.root(), x, y)?;
            self.server.set_border_width(client, w.original_border)?;
            self.server.change_save_set(client, false)?;
        }
        if let Some(tab) = w.windows.tab {
            self.server.destroy_window(tab)?;
        }
        self.server.destroy_window(w.windows.frame)?;
        Ok(())
    }

    /// Toggle between full height and titlebar only
    pub fn shade(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if !w.decorations().contains(Decorations::TITLEBAR) {
            return Ok(false);
        }
        let shaded = !w.shaded;
        self.set_shaded(window, shaded)?;
        for peer in self.tab_peers(window) {
            self.set_shaded(peer, shaded)?;
        }
        Ok(true)
    }

    pub(crate) fn set_shaded(&mut self, window: Window, shaded: bool) -> Result<()> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        if w.shaded == shaded || !w.decorations().contains(Decorations::TITLEBAR) {
            return Ok(());
        }
        debug!("Shade 0x{:x}: {}", window, shaded);
        w.shaded = shaded;
        let (x, y, size) = (w.frame.x, w.frame.y, w.client_size);
        self.apply_geometry(window, x, y, size)?;
        self.persist(window)
    }

    /// Toggle maximization. Restoring puts back exactly the geometry
    /// recorded by the maximize; shaded windows are left alone.
    pub fn maximize(&mut self, window: Window, mode: MaximizeMode) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.shaded || !w.capabilities.functions.contains(Functions::MAXIMIZE) {
            return Ok(false);
        }

        if w.maximized != MaximizeMode::None {
            let premax = w.premax.unwrap_or(w.frame);
            let client_size = w.layout.client_size(premax.width, premax.height);
            debug!("Restore 0x{:x} to {:?}", window, premax);
            if let Some(w) = self.registry.get_mut(window) {
                w.maximized = MaximizeMode::None;
                w.premax = None;
            }
            self.apply_geometry(window, premax.x, premax.y, client_size)?;
        } else {
            if mode == MaximizeMode::None {
                return Ok(false);
            }
            let area = self.usable_area(&w.frame);
            let (x, y, client_size) = maximized_geometry(w, mode, &area);
            debug!("Maximize 0x{:x} {:?} within {:?}", window, mode, area);
            if let Some(w) = self.registry.get_mut(window) {
                w.premax = Some(w.frame);
                w.maximized = mode;
            }
            self.apply_geometry(window, x, y, client_size)?;
        }
        self.sync_group_geometry(window)?;
        self.persist(window)?;
        Ok(true)
    }

    /// Toggle omnipresence for the window and its tab group
    pub fn stick(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        let stuck = !w.stuck;
        self.set_stuck(window, stuck)?;
        for peer in self.tab_peers(window) {
            self.set_stuck(peer, stuck)?;
        }
        Ok(true)
    }

    pub(crate) fn set_stuck(&mut self, window: Window, stuck: bool) -> Result<()> {
        let current = self.workspaces.current;
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        debug!("Stick 0x{:x}: {}", window, stuck);
        w.stuck = stuck;
        // a window unstuck where it is seen stays there
        if !stuck {
            w.workspace = current;
        }
        self.persist(window)
    }

    /// Ask the client to close, or kill it if it cannot be asked
    pub fn close(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if !w.capabilities.functions.contains(Functions::CLOSE) {
            return Ok(false);
        }
        if w.hints.protocols.delete_window {
            debug!("Sending WM_DELETE_WINDOW to 0x{:x}", window);
            self.server.send_protocol(window, Protocol::DeleteWindow)?;
        } else {
            self.kill(window)?;
        }
        Ok(true)
    }

    pub fn kill(&mut self, window: Window) -> Result<bool> {
        if !self.registry.contains(window) {
            return Ok(false);
        }
        debug!("Killing client 0x{:x}", window);
        self.server.kill_client(window)?;
        Ok(true)
    }

    /// Frame and tab strip on top, transients above their owner
    pub fn raise(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.state != WindowState::Normal {
            return Ok(false);
        }
        self.server.raise_window(w.windows.frame)?;
        for member in crate::wm::tabs::members(&self.registry, window) {
            if let Some(tab) = self.registry.get(member).and_then(|m| m.windows.tab) {
                self.server.raise_window(tab)?;
            }
        }
        self.raise_transients(window)?;
        Ok(true)
    }

    pub fn lower(&mut self, window: Window) -> Result<bool> {
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.state != WindowState::Normal {
            return Ok(false);
        }
        // transients first so they end up above the owner
        for child in w.transients.clone() {
            if let Some(frame) = self.registry.get(child).map(|c| c.windows.frame) {
                self.server.lower_window(frame)?;
            }
        }
        self.server.lower_window(w.windows.frame)?;
        Ok(true)
    }

    /// Client asked for a new geometry or stacking position
    pub fn configure_request(&mut self, request: &ConfigureRequestEvent) -> Result<()> {
        let window = request.window;
        let Some(w) = self.registry.get(window) else {
            return self.server.forward_configure(request);
        };
        let mask = request.value_mask;
        let extents = w.extents();
        let gravity = w.hints.size.gravity;
        let (client_x, client_y) = gravity.client_position(w.frame.x, w.frame.y, &extents);

        let mut size = w.client_size;
        if mask.contains(ConfigWindow::WIDTH) {
            size.0 = request.width as u32;
        }
        if mask.contains(ConfigWindow::HEIGHT) {
            size.1 = request.height as u32;
        }
        let size = w.hints.size.constrain(size.0, size.1);
        let x = if mask.contains(ConfigWindow::X) { request.x as i32 } else { client_x };
        let y = if mask.contains(ConfigWindow::Y) { request.y as i32 } else { client_y };
        let (frame_x, frame_y) = gravity.frame_position(x, y, &extents);

        debug!("Configure request 0x{:x}: {:?} at ({}, {})", window, size, frame_x, frame_y);
        self.apply_geometry(window, frame_x, frame_y, size)?;
        self.sync_group_geometry(window)?;

        if mask.contains(ConfigWindow::STACK_MODE) {
            match request.stack_mode {
                StackMode::ABOVE => {
                    self.raise(window)?;
                }
                StackMode::BELOW => {
                    self.lower(window)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// A hint property changed on a client or dock
    pub fn update_hints(&mut self, window: Window, property: HintProperty) -> Result<bool> {
        if property == HintProperty::Strut {
            if self.is_dock(window) {
                let strut = self.server.read_strut(window)?.unwrap_or_default();
                self.update_dock_strut(window, strut)?;
                return Ok(true);
            }
            return Ok(false);
        }
        if !self.registry.contains(window) {
            return Ok(false);
        }
        let Some(hints) = self.server.read_hints(window)? else {
            debug!("Window 0x{:x} vanished while reading hints", window);
            return Ok(false);
        };

        match property {
            HintProperty::Title => {
                if let Some(w) = self.registry.get_mut(window) {
                    w.hints.title = hints.title;
                }
                Ok(true)
            }
            HintProperty::TransientFor => {
                let old = self.registry.get(window).and_then(|w| w.transient_for());
                self.unlink_transient(window, old);
                self.replace_hints(window, hints)?;
                self.link_transient(window);
                Ok(true)
            }
            _ => self.replace_hints(window, hints),
        }
    }

    /// Cache new hints and redo whatever depends on them
    fn replace_hints(&mut self, window: Window, hints: ClientHints) -> Result<bool> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(false);
        };
        let old_capabilities = w.capabilities;
        let mut capabilities = Capabilities::derive(&hints);
        capabilities.decorations.set(
            Decorations::TAB,
            old_capabilities.decorations.contains(Decorations::TAB),
        );
        let size = hints.size.constrain(w.client_size.0, w.client_size.1);
        let resized = size != w.client_size;
        w.focus_model = hints.focus_model();
        w.hints = hints;
        w.capabilities = capabilities;
        if !capabilities.functions.contains(Functions::MAXIMIZE) {
            w.maximized = MaximizeMode::None;
            w.premax = None;
        }

        if capabilities.decorations != old_capabilities.decorations {
            debug!("Decorations of 0x{:x} now {:?}", window, capabilities.decorations);
            if let Some(w) = self.registry.get_mut(window) {
                w.client_size = size;
            }
            self.redecorate(window)?;
        } else if resized {
            let (x, y) = self.registry.get(window).map_or((0, 0), |w| (w.frame.x, w.frame.y));
            self.apply_geometry(window, x, y, size)?;
        }
        self.persist(window)?;
        Ok(true)
    }

    /// Rebuild decorations for the current capabilities and configuration,
    /// keeping the client where it is on screen
    pub(crate) fn redecorate(&mut self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        let client_geometry = w.client_geometry();
        let removed = destroy_decorations(&self.server, &mut w.windows)?;

        w.layout = FrameLayout::new(w.capabilities.decorations, &self.config.decorations);
        if !w.decorations().contains(Decorations::TITLEBAR) {
            w.shaded = false;
        }
        let extents = w.layout.extents();
        let (client_width, client_height) = w.client_size;
        let (frame_width, _) = w.layout.frame_size(client_width, client_height, false);
        build_decorations(
            &self.server,
            &mut w.windows,
            w.capabilities.decorations,
            &w.layout,
            client_height,
            frame_width,
        )?;
        self.server.set_border_width(w.windows.frame, w.layout.border)?;
        let added = w.windows.decoration_parts();

        for part in removed {
            self.registry.unregister_part(part);
        }
        for (part_window, part) in added {
            self.registry.register_part(part_window, window, part);
        }
        self.server.set_frame_extents(window, extents)?;
        self.apply_geometry(
            window,
            client_geometry.x - extents.left as i32,
            client_geometry.y - extents.top as i32,
            (client_width, client_height),
        )?;
        self.repaint(window)
    }

    /// Move and size the frame for a client size; the client gets a
    /// synthetic ConfigureNotify with its root position
    pub(crate) fn apply_geometry(
        &mut self,
        window: Window,
        x: i32,
        y: i32,
        client_size: (u32, u32),
    ) -> Result<()> {
        let Some(w) = self.registry.get_mut(window) else {
            return Ok(());
        };
        let (width, height) = w.layout.frame_size(client_size.0, client_size.1, w.shaded);
        w.client_size = client_size;
        w.frame = Geometry::new(x, y, width, height);

        self.server.configure_window(w.windows.frame, w.frame)?;
        place_decorations(&self.server, &w.windows, &w.layout, client_size)?;
        self.server
            .configure_window(window, Geometry::new(0, 0, client_size.0, client_size.1))?;
        self.server
            .send_configure_notify(window, w.client_geometry())?;
        if w.windows.tab.is_some() {
            self.update_tabs(window)?;
        }
        Ok(())
    }

    pub(crate) fn client_size(&self, window: Window) -> (u32, u32) {
        self.registry.get(window).map_or((1, 1), |w| w.client_size)
    }

    /// Map the frame and tab of a visible window
    pub(crate) fn show_frame(&self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get(window) else {
            return Ok(());
        };
        self.server.map_window(w.windows.frame)?;
        if let Some(tab) = w.windows.tab {
            self.server.map_window(tab)?;
        }
        Ok(())
    }

    pub(crate) fn hide_frame(&self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get(window) else {
            return Ok(());
        };
        self.server.unmap_window(w.windows.frame)?;
        if let Some(tab) = w.windows.tab {
            self.server.unmap_window(tab)?;
        }
        Ok(())
    }

    /// Paint every decoration part for the current focus state
    pub(crate) fn repaint(&self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get(window) else {
            return Ok(());
        };
        paint(
            &self.server,
            self.renderer.as_ref(),
            &w.windows,
            w.decorations(),
            w.focused,
        )
    }

    /// Write the persisted state back onto the client
    pub(crate) fn persist(&self, window: Window) -> Result<()> {
        let Some(w) = self.registry.get(window) else {
            return Ok(());
        };
        self.server.set_attributes(window, &w.attributes())?;
        self.server.set_net_wm_state(window, w.net_state())?;
        self.server
            .set_desktop(window, if w.stuck { None } else { Some(w.workspace) })
    }
}

/// Frame position and client size filling `area` along the axes of `mode`
fn maximized_geometry(w: &ManagedWindow, mode: MaximizeMode, area: &Geometry) -> (i32, i32, (u32, u32)) {
    let extents = w.extents();
    let (mut x, mut y) = (w.frame.x, w.frame.y);
    let (mut width, mut height) = w.client_size;
    if mode.horizontal() {
        x = area.x;
        width = area.width.saturating_sub(extents.horizontal());
    }
    if mode.vertical() {
        y = area.y;
        height = area.height.saturating_sub(extents.vertical());
    }
    (x, y, w.hints.size.constrain(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::wm::hints::{AttribFlags, Gravity, Protocols, SizeHints, MAX_DIMENSION};
    use crate::wm::server::testing::{FakeServer, Request, ROOT};
    use crate::wm::testing::{adopt_plain, manager, manager_with};

    const A: Window = 0x400001;
    const B: Window = 0x400002;

    fn positioned(geometry: Geometry, gravity: Gravity) -> ClientInfo {
        ClientInfo {
            geometry,
            hints: ClientHints {
                size: SizeHints {
                    has_position: true,
                    gravity,
                    ..SizeHints::default()
                },
                ..ClientHints::default()
            },
            ..ClientInfo::default()
        }
    }

    fn frame_of(wm: &WindowManager<FakeServer>, window: Window) -> Window {
        wm.registry.get(window).unwrap().windows.frame
    }

    #[test]
    fn test_adopt_reparents_and_maps() {
        let mut wm = manager();
        wm.server.add_client(A, positioned(Geometry::new(100, 100, 400, 300), Gravity::NorthWest));
        assert!(wm.adopt(A).unwrap());

        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.state, WindowState::Normal);
        assert_eq!(w.frame, Geometry::new(100, 100, 400, 326));
        assert_eq!(w.client_geometry(), Geometry::new(101, 121, 400, 300));
        let (frame, plate) = (w.windows.frame, w.windows.plate);

        assert!(wm.server.has_request(&Request::Reparent { window: A, parent: plate, x: 0, y: 0 }));
        assert!(wm.server.has_request(&Request::SaveSet { window: A, insert: true }));
        assert!(wm.server.has_request(&Request::Map(frame)));
        assert!(wm.server.has_request(&Request::WmState { window: A, state: IcccmState::Normal }));
        assert!(wm.server.has_request(&Request::Publish(RootProperty::ClientList(vec![A]))));
        assert_eq!(wm.server.grab_depth(), 0);
        // adopting twice is refused
        assert!(!wm.adopt(A).unwrap());
    }

    #[test]
    fn test_fixed_size_window_gets_no_handle_or_maximize() {
        let mut wm = manager();
        let fixed = SizeHints {
            min: (300, 200),
            max: Some((300, 200)),
            ..SizeHints::default()
        };
        wm.server.add_client(
            A,
            ClientInfo {
                geometry: Geometry::new(0, 0, 300, 200),
                hints: ClientHints { size: fixed, ..ClientHints::default() },
                ..ClientInfo::default()
            },
        );
        assert!(wm.adopt(A).unwrap());

        let w = wm.registry.get(A).unwrap();
        assert!(!w.decorations().contains(Decorations::HANDLE));
        assert!(!w.decorations().contains(Decorations::MAXIMIZE));
        assert!(w.windows.handle.is_none());
        assert!(w.windows.buttons.iter().all(|b| b.kind != crate::wm::decorations::ButtonKind::Maximize));
        assert!(!wm.maximize(A, MaximizeMode::Full).unwrap());
    }

    #[test]
    fn test_adopt_vanished_window_is_silently_dropped() {
        let mut wm = manager();
        wm.server.add_plain_client(A, Geometry::new(0, 0, 100, 100));
        wm.server.vanish(A);
        assert!(!wm.adopt(A).unwrap());
        assert!(wm.registry.is_empty());
        assert!(!wm.server.requests().iter().any(|r| matches!(r, Request::Create { .. })));
        assert_eq!(wm.server.grab_depth(), 0);
    }

    #[test]
    fn test_adopt_aborts_when_window_dies_midway() {
        let mut wm = manager();
        wm.server.add_plain_client(A, Geometry::new(0, 0, 100, 100));
        wm.server.bad_window.set(Some(A));
        assert!(!wm.adopt(A).unwrap());
        assert!(wm.registry.is_empty());

        let frame = wm
            .server
            .requests()
            .iter()
            .find_map(|r| match r {
                Request::Create { window, parent: ROOT, .. } => Some(*window),
                _ => None,
            })
            .unwrap();
        assert!(wm.server.has_request(&Request::Destroy(frame)));
        assert_eq!(wm.server.grab_depth(), 0);
    }

    #[test]
    fn test_override_redirect_is_not_managed() {
        let mut wm = manager();
        wm.server.add_client(
            A,
            ClientInfo {
                geometry: Geometry::new(0, 0, 100, 100),
                override_redirect: true,
                ..ClientInfo::default()
            },
        );
        assert!(!wm.adopt(A).unwrap());
        assert!(wm.registry.is_empty());
    }

    #[test]
    fn test_initial_iconic_state() {
        let mut wm = manager();
        let mut info = positioned(Geometry::new(0, 0, 100, 100), Gravity::NorthWest);
        info.hints.wm.initial_state = IcccmState::Iconic;
        wm.server.add_client(A, info);
        assert!(wm.adopt(A).unwrap());

        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Iconic);
        assert!(!wm.server.has_request(&Request::Map(frame_of(&wm, A))));
        assert!(wm.server.has_request(&Request::Map(A)));
    }

    #[test]
    fn test_iconify_and_deiconify_are_idempotent() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        let frame = frame_of(&wm, A);

        assert!(!wm.deiconify(A).unwrap());
        assert!(wm.iconify(A).unwrap());
        assert!(wm.server.has_request(&Request::Unmap(frame)));
        assert!(wm.server.has_request(&Request::WmState { window: A, state: IcccmState::Iconic }));

        wm.server.take_requests();
        assert!(!wm.iconify(A).unwrap());
        assert!(wm.server.requests().is_empty());

        assert!(wm.deiconify(A).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Normal);
        assert!(wm.server.has_request(&Request::Map(frame)));
        wm.server.take_requests();
        assert!(!wm.deiconify(A).unwrap());
        assert!(wm.server.requests().is_empty());
    }

    #[test]
    fn test_iconify_takes_transients_along() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 400, 300));
        let mut dialog = ClientInfo {
            geometry: Geometry::new(0, 0, 100, 50),
            ..ClientInfo::default()
        };
        dialog.hints.transient_for = Some(A);
        wm.server.add_client(B, dialog);
        assert!(wm.adopt(B).unwrap());

        assert!(wm.iconify(A).unwrap());
        assert_eq!(wm.registry.get(B).unwrap().state, WindowState::Iconic);
        assert!(wm.deiconify(A).unwrap());
        assert_eq!(wm.registry.get(B).unwrap().state, WindowState::Normal);
    }

    #[test]
    fn test_deiconify_moves_to_current_workspace() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        assert!(wm.iconify(A).unwrap());
        assert!(wm.switch_workspace(2).unwrap());
        assert!(wm.deiconify(A).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().workspace, 2);
        assert!(wm.is_visible(A));
    }

    #[test]
    fn test_maximize_round_trip_restores_exact_geometry() {
        let mut wm = manager();
        wm.server.add_client(A, positioned(Geometry::new(33, 44, 500, 300), Gravity::NorthWest));
        assert!(wm.adopt(A).unwrap());
        let before = wm.registry.get(A).unwrap().frame;

        assert!(wm.maximize(A, MaximizeMode::Full).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.maximized, MaximizeMode::Full);
        assert_eq!(w.premax, Some(before));
        // 1920x1080 minus border 2 and title/handle/border 28
        assert_eq!(w.frame, Geometry::new(0, 0, 1918, 1078));
        assert_eq!(w.client_size, (1918, 1052));

        assert!(wm.maximize(A, MaximizeMode::Full).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.frame, before);
        assert_eq!(w.maximized, MaximizeMode::None);
        assert_eq!(w.premax, None);
    }

    #[test]
    fn test_maximize_respects_struts_and_increments() {
        let mut wm = manager();
        let mut info = positioned(Geometry::new(100, 100, 484, 324), Gravity::NorthWest);
        info.hints.size.base = (4, 4);
        info.hints.size.increment = (8, 16);
        wm.server.add_client(A, info);
        assert!(wm.adopt(A).unwrap());

        let mut panel = ClientInfo {
            geometry: Geometry::new(0, 0, 1920, 30),
            strut: Some(Strut { top: 30, ..Strut::default() }),
            ..ClientInfo::default()
        };
        panel.hints.dock = true;
        wm.server.add_client(B, panel);
        assert!(wm.adopt(B).unwrap());
        assert!(wm.is_dock(B));
        assert!(!wm.registry.contains(B));

        assert!(wm.maximize(A, MaximizeMode::Vertical).unwrap());
        let w = wm.registry.get(A).unwrap();
        // width untouched, height fills 1050 - 28 then snaps to the grid
        assert_eq!((w.frame.x, w.frame.y), (100, 30));
        assert_eq!(w.client_size, (484, 1012));
    }

    #[test]
    fn test_garbage_dock_strut_is_clamped() {
        let mut wm = manager();
        let mut dock = ClientInfo {
            geometry: Geometry::new(0, 0, 1920, 30),
            strut: Some(Strut { left: u32::MAX, right: 1, ..Strut::default() }),
            ..ClientInfo::default()
        };
        dock.hints.dock = true;
        wm.server.add_client(B, dock);
        assert!(wm.adopt(B).unwrap());
        assert_eq!(wm.strut().left, 1920);

        let area = wm.usable_area(&Geometry::new(0, 0, 100, 100));
        assert!(area.width >= 1 && area.height == 1080);
        assert!(area.x >= 0 && area.right() <= 1920);

        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        assert!(wm.maximize(A, MaximizeMode::Full).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert!(w.client_size.0 >= 1 && w.client_size.1 >= 1);
    }

    #[test]
    fn test_maximize_rejected_while_shaded() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        assert!(wm.shade(A).unwrap());
        wm.server.take_requests();
        assert!(!wm.maximize(A, MaximizeMode::Full).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().maximized, MaximizeMode::None);
        assert!(wm.server.requests().is_empty());
    }

    #[test]
    fn test_shade_is_persisted() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        assert!(wm.shade(A).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.frame.height, 20);
        assert_eq!(w.state, WindowState::Normal);

        let persisted = wm.server.requests().iter().rev().find_map(|r| match r {
            Request::Attributes { window: A, attributes } => Some(*attributes),
            _ => None,
        });
        assert!(persisted.unwrap().has(AttribFlags::SHADED));

        assert!(wm.shade(A).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().frame.height, 126);
    }

    #[test]
    fn test_withdraw_reverses_gravity() {
        let mut wm = manager();
        wm.server.add_client(A, positioned(Geometry::new(100, 100, 200, 100), Gravity::SouthEast));
        assert!(wm.adopt(A).unwrap());
        // border 1, title 20, handle 6: offsets 2 and 28
        assert_eq!(wm.registry.get(A).unwrap().frame.x, 98);
        assert_eq!(wm.registry.get(A).unwrap().frame.y, 72);

        assert!(wm.withdraw(A).unwrap());
        assert!(!wm.registry.contains(A));
        assert!(wm.server.has_request(&Request::Reparent { window: A, parent: ROOT, x: 100, y: 100 }));
        assert!(wm.server.has_request(&Request::ClearState(A)));
        assert!(wm.server.has_request(&Request::WmState { window: A, state: IcccmState::Withdrawn }));
        assert!(wm.server.has_request(&Request::SaveSet { window: A, insert: false }));
        assert_eq!(wm.server.grab_depth(), 0);
    }

    #[test]
    fn test_release_keeps_persisted_state() {
        let mut wm = manager();
        wm.server.add_client(A, positioned(Geometry::new(10, 10, 200, 100), Gravity::Static));
        assert!(wm.adopt(A).unwrap());
        assert!(wm.release(A).unwrap());
        assert!(wm.server.has_request(&Request::Reparent { window: A, parent: ROOT, x: 10, y: 10 }));
        assert!(!wm.server.has_request(&Request::ClearState(A)));
        assert!(!wm.server.has_request(&Request::Unmap(A)));
    }

    #[test]
    fn test_startup_restores_saved_attributes() {
        let mut wm = manager();
        let saved = VendorAttributes {
            flags: AttribFlags::SHADED | AttribFlags::OMNIPRESENT | AttribFlags::WORKSPACE,
            attrib: AttribFlags::SHADED | AttribFlags::OMNIPRESENT,
            workspace: 2,
            ..VendorAttributes::default()
        };
        wm.server.add_client(
            A,
            ClientInfo {
                geometry: Geometry::new(10, 10, 200, 100),
                viewable: true,
                saved: Some(saved),
                ..ClientInfo::default()
            },
        );
        wm.server.set_starting(true);
        assert!(wm.adopt(A).unwrap());
        wm.server.set_starting(false);

        let w = wm.registry.get(A).unwrap();
        assert!(w.shaded && w.stuck);
        assert_eq!(w.workspace, 2);
        assert_eq!(w.ignore_unmaps, 1);
        assert_eq!(w.frame.height, 20);
        assert!(wm.is_visible(A));
    }

    #[test]
    fn test_startup_restores_maximized_state_and_premax() {
        let mut wm = manager();
        let premax = Geometry::new(100, 100, 400, 326);
        let saved = VendorAttributes {
            flags: AttribFlags::MAX_HORIZ | AttribFlags::MAX_VERT | AttribFlags::WORKSPACE,
            attrib: AttribFlags::MAX_HORIZ | AttribFlags::MAX_VERT,
            workspace: 0,
            stack: 0,
            premax,
        };
        let raw = VendorAttributes::from_raw(&saved.to_raw()).unwrap();
        wm.server.add_client(
            A,
            ClientInfo {
                geometry: Geometry::new(1, 21, 1918, 1052),
                viewable: true,
                saved: Some(raw),
                ..ClientInfo::default()
            },
        );
        wm.server.set_starting(true);
        assert!(wm.adopt(A).unwrap());
        wm.server.set_starting(false);

        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.maximized, MaximizeMode::Full);
        assert_eq!(w.premax, Some(premax));
        let persisted = w.attributes();
        assert!(persisted.has(AttribFlags::MAX_HORIZ) && persisted.has(AttribFlags::MAX_VERT));
        assert_eq!(persisted.premax, premax);

        assert!(wm.maximize(A, MaximizeMode::Full).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.frame, premax);
        assert_eq!(w.client_size, (400, 300));
        assert_eq!(w.maximized, MaximizeMode::None);
        assert_eq!(w.premax, None);
    }

    #[test]
    fn test_adopt_survives_absurd_size_hints() {
        let mut wm = manager();
        // PMinSize | PMaxSize with every dimension at the CARD32 limit
        let mut raw = vec![0; 18];
        raw[0] = (1 << 4) | (1 << 5);
        raw[5..9].copy_from_slice(&[u32::MAX; 4]);
        let mut info = ClientInfo {
            geometry: Geometry::new(0, 0, 200, 100),
            ..ClientInfo::default()
        };
        info.hints.size = SizeHints::from_raw(&raw).unwrap();
        wm.server.add_client(A, info);

        assert!(wm.adopt(A).unwrap());
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.client_size, (MAX_DIMENSION, MAX_DIMENSION));
        assert_eq!(w.frame.height, 20 + MAX_DIMENSION + 6);
    }

    #[test]
    fn test_destroyed_owner_orphans_transient() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 400, 300));
        let mut dialog = ClientInfo {
            geometry: Geometry::new(0, 0, 100, 50),
            ..ClientInfo::default()
        };
        dialog.hints.transient_for = Some(A);
        wm.server.add_client(B, dialog);
        assert!(wm.adopt(B).unwrap());
        assert_eq!(wm.registry.get(A).unwrap().transients, vec![B]);

        let frame = frame_of(&wm, A);
        wm.server.vanish(A);
        assert!(wm.destroy(A).unwrap());
        assert!(wm.server.has_request(&Request::Destroy(frame)));
        assert!(!wm.server.has_request(&Request::Reparent { window: A, parent: ROOT, x: 0, y: 0 }));

        let child = wm.registry.get(B).unwrap();
        assert_eq!(child.transient_for(), None);
        assert_eq!(child.state, WindowState::Normal);
    }

    #[test]
    fn test_close_prefers_delete_protocol() {
        let mut wm = manager();
        let mut polite = ClientInfo {
            geometry: Geometry::new(0, 0, 100, 100),
            ..ClientInfo::default()
        };
        polite.hints.protocols = Protocols { delete_window: true, take_focus: false };
        wm.server.add_client(A, polite);
        assert!(wm.adopt(A).unwrap());
        adopt_plain(&mut wm, B, Geometry::new(0, 0, 100, 100));

        assert!(wm.close(A).unwrap());
        assert!(wm.server.has_request(&Request::Protocol { window: A, protocol: Protocol::DeleteWindow }));
        assert!(!wm.server.has_request(&Request::Kill(A)));
        assert!(wm.close(B).unwrap());
        assert!(wm.server.has_request(&Request::Kill(B)));
    }

    #[test]
    fn test_configure_request_constrains_and_notifies() {
        let mut wm = manager();
        let mut info = positioned(Geometry::new(0, 0, 200, 100), Gravity::NorthWest);
        info.hints.size.max = Some((300, 300));
        wm.server.add_client(A, info);
        assert!(wm.adopt(A).unwrap());

        let request = ConfigureRequestEvent {
            window: A,
            x: 50,
            y: 60,
            width: 800,
            height: 250,
            value_mask: ConfigWindow::X | ConfigWindow::Y | ConfigWindow::WIDTH | ConfigWindow::HEIGHT,
            ..ConfigureRequestEvent::default()
        };
        wm.configure_request(&request).unwrap();
        let w = wm.registry.get(A).unwrap();
        assert_eq!(w.client_size, (300, 250));
        assert_eq!(w.frame, Geometry::new(50, 60, 300, 276));
        assert!(wm.server.has_request(&Request::ConfigureNotify {
            window: A,
            geometry: Geometry::new(51, 81, 300, 250),
        }));

        let unmanaged = ConfigureRequestEvent { window: B, ..request };
        wm.configure_request(&unmanaged).unwrap();
        assert!(wm.server.has_request(&Request::Forward(B)));
    }

    #[test]
    fn test_new_fixed_size_hints_rebuild_decorations() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 300, 200));
        let handle = wm.registry.get(A).unwrap().windows.handle.unwrap();

        wm.server.clients.borrow_mut().get_mut(&A).unwrap().hints.size = SizeHints {
            min: (300, 200),
            max: Some((300, 200)),
            ..SizeHints::default()
        };
        assert!(wm.update_hints(A, HintProperty::NormalHints).unwrap());

        let w = wm.registry.get(A).unwrap();
        assert!(w.windows.handle.is_none());
        assert!(wm.server.has_request(&Request::Destroy(handle)));
        assert_eq!(wm.registry.find(handle), None);
        assert_eq!(w.frame.height, 220);
    }

    #[test]
    fn test_focus_new_windows_by_config() {
        let mut config = Config::default();
        config.focus.focus_new = false;
        let mut wm = manager_with(config);
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        assert!(!wm.server.has_request(&Request::Focus(A)));

        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        assert!(wm.server.has_request(&Request::Focus(A)));
    }
}

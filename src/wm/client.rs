//! Client Module
//!
//! The managed window record and the registry that owns every record.
//!
//! Relationships between windows (transient-for, transient children, tab
//! neighbours) are stored as client window ids and resolved through the
//! [`Registry`]. A record is removed from the registry before any of its
//! relationships are unlinked, so a lookup never sees a half-destroyed
//! window.

use std::collections::HashMap;

use x11rb::protocol::xproto::Window;

use crate::shared::{Extents, Geometry};
use crate::wm::client_flags::{Capabilities, Decorations};
use crate::wm::decorations::{FrameLayout, FrameWindows, Part};
use crate::wm::ewmh::NetWmState;
use crate::wm::hints::{AttribFlags, ClientHints, FocusModel, IcccmState, VendorAttributes};
use crate::wm::timer::TimerId;

/// Lifecycle state; exactly one at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Withdrawn,
    Iconic,
    Normal,
}

impl From<WindowState> for IcccmState {
    fn from(state: WindowState) -> Self {
        match state {
            WindowState::Withdrawn => IcccmState::Withdrawn,
            WindowState::Iconic => IcccmState::Iconic,
            WindowState::Normal => IcccmState::Normal,
        }
    }
}

/// Maximize modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaximizeMode {
    #[default]
    None,
    Vertical,
    Horizontal,
    Full,
}

impl MaximizeMode {
    /// Mode selected by the pointer button that pressed a maximize button
    pub fn from_button(button: u8) -> Self {
        match button {
            2 => Self::Vertical,
            3 => Self::Horizontal,
            _ => Self::Full,
        }
    }

    pub fn horizontal(self) -> bool {
        matches!(self, Self::Horizontal | Self::Full)
    }

    pub fn vertical(self) -> bool {
        matches!(self, Self::Vertical | Self::Full)
    }

    fn from_attrib(attributes: &VendorAttributes) -> Self {
        match (
            attributes.has(AttribFlags::MAX_HORIZ),
            attributes.has(AttribFlags::MAX_VERT),
        ) {
            (true, true) => Self::Full,
            (true, false) => Self::Horizontal,
            (false, true) => Self::Vertical,
            (false, false) => Self::None,
        }
    }
}

/// Pointer interaction in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interaction {
    #[default]
    Idle,
    Moving,
    Resizing,
}

/// A top-level client window accepted for management
#[derive(Debug)]
pub struct ManagedWindow {
    /// Client window id; the registry key
    pub client: Window,

    /// Frame, plate and decoration sub-windows
    pub windows: FrameWindows,

    /// Decoration sizes for the current capability set
    pub layout: FrameLayout,

    /// Frame geometry: outer position, inner size
    pub frame: Geometry,

    /// Client size inside the plate
    pub client_size: (u32, u32),

    /// Border width the client had before we framed it
    pub original_border: u32,

    pub hints: ClientHints,
    pub capabilities: Capabilities,
    pub focus_model: FocusModel,

    pub state: WindowState,
    pub shaded: bool,
    pub maximized: MaximizeMode,
    /// Omnipresent: visible on every workspace
    pub stuck: bool,
    pub focused: bool,
    pub interaction: Interaction,

    /// Frame geometry before maximizing; set once, cleared on restore
    pub premax: Option<Geometry>,

    pub workspace: u32,

    /// Managed windows that are transient for this one
    pub transients: Vec<Window>,

    /// Tab ring neighbours; both point at `client` for a singleton
    pub tab_prev: Window,
    pub tab_next: Window,

    pub auto_raise: Option<TimerId>,
    pub double_click: Option<TimerId>,

    /// UnmapNotify events caused by our own requests
    pub ignore_unmaps: u32,
}

impl ManagedWindow {
    pub fn new(
        client: Window,
        windows: FrameWindows,
        layout: FrameLayout,
        frame: Geometry,
        client_size: (u32, u32),
        hints: ClientHints,
    ) -> Self {
        let capabilities = Capabilities::derive(&hints);
        let focus_model = hints.focus_model();
        Self {
            client,
            windows,
            layout,
            frame,
            client_size,
            original_border: 0,
            hints,
            capabilities,
            focus_model,
            state: WindowState::Withdrawn,
            shaded: false,
            maximized: MaximizeMode::None,
            stuck: false,
            focused: false,
            interaction: Interaction::Idle,
            premax: None,
            workspace: 0,
            transients: Vec::new(),
            tab_prev: client,
            tab_next: client,
            auto_raise: None,
            double_click: None,
            ignore_unmaps: 0,
        }
    }

    pub fn extents(&self) -> Extents {
        self.layout.extents()
    }

    /// Root-relative client geometry implied by the frame
    pub fn client_geometry(&self) -> Geometry {
        let extents = self.extents();
        Geometry::new(
            self.frame.x + extents.left as i32,
            self.frame.y + extents.top as i32,
            self.client_size.0,
            self.client_size.1,
        )
    }

    pub fn decorations(&self) -> Decorations {
        self.capabilities.decorations
    }

    pub fn is_tabbed(&self) -> bool {
        self.tab_next != self.client
    }

    pub fn transient_for(&self) -> Option<Window> {
        self.hints.transient_for
    }

    /// Manager-private state to persist on the client
    pub fn attributes(&self) -> VendorAttributes {
        let mut attrib = AttribFlags::empty();
        attrib.set(AttribFlags::SHADED, self.shaded);
        attrib.set(AttribFlags::MAX_HORIZ, self.maximized.horizontal());
        attrib.set(AttribFlags::MAX_VERT, self.maximized.vertical());
        attrib.set(AttribFlags::OMNIPRESENT, self.stuck);
        VendorAttributes {
            flags: AttribFlags::SHADED
                | AttribFlags::MAX_HORIZ
                | AttribFlags::MAX_VERT
                | AttribFlags::OMNIPRESENT
                | AttribFlags::WORKSPACE,
            attrib,
            workspace: self.workspace,
            stack: 0,
            premax: self.premax.unwrap_or_default(),
        }
    }

    /// Modifiers recorded by a previous run
    pub fn restore_attributes(&mut self, saved: &VendorAttributes) {
        self.shaded = saved.has(AttribFlags::SHADED);
        self.stuck = saved.has(AttribFlags::OMNIPRESENT);
        if let Some(workspace) = saved.workspace() {
            self.workspace = workspace;
        }
        let maximized = MaximizeMode::from_attrib(saved);
        if maximized != MaximizeMode::None {
            if let Some(premax) = saved.premax() {
                self.maximized = maximized;
                self.premax = Some(premax);
            }
        }
    }

    pub fn net_state(&self) -> NetWmState {
        let mut state = NetWmState::empty();
        state.set(NetWmState::SHADED, self.shaded);
        state.set(NetWmState::STICKY, self.stuck);
        state.set(NetWmState::MAX_VERT, self.maximized.vertical());
        state.set(NetWmState::MAX_HORZ, self.maximized.horizontal());
        state.set(NetWmState::HIDDEN, self.state == WindowState::Iconic);
        state
    }
}

/// Owner of every managed window, keyed by client id
#[derive(Debug, Default)]
pub struct Registry {
    windows: HashMap<Window, ManagedWindow>,
    /// Frame and decoration sub-windows back to their client
    parts: HashMap<Window, (Window, Part)>,
    /// Adoption order (`_NET_CLIENT_LIST`)
    order: Vec<Window>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, window: ManagedWindow) {
        let client = window.client;
        for (id, part) in window.windows.parts() {
            self.parts.insert(id, (client, part));
        }
        self.order.retain(|w| *w != client);
        self.order.push(client);
        self.windows.insert(client, window);
    }

    /// Remove a record and all of its sub-window mappings
    pub fn remove(&mut self, client: Window) -> Option<ManagedWindow> {
        let window = self.windows.remove(&client)?;
        self.parts.retain(|_, (owner, _)| *owner != client);
        self.order.retain(|w| *w != client);
        Some(window)
    }

    pub fn get(&self, client: Window) -> Option<&ManagedWindow> {
        self.windows.get(&client)
    }

    pub fn get_mut(&mut self, client: Window) -> Option<&mut ManagedWindow> {
        self.windows.get_mut(&client)
    }

    pub fn contains(&self, client: Window) -> bool {
        self.windows.contains_key(&client)
    }

    /// Resolve any window we know of (client, frame or decoration part)
    pub fn find(&self, window: Window) -> Option<(Window, Part)> {
        if self.windows.contains_key(&window) {
            return Some((window, Part::Client));
        }
        self.parts.get(&window).copied()
    }

    /// Client owning `window`, whichever part it is
    pub fn owner(&self, window: Window) -> Option<Window> {
        self.find(window).map(|(client, _)| client)
    }

    pub fn register_part(&mut self, window: Window, client: Window, part: Part) {
        self.parts.insert(window, (client, part));
    }

    pub fn unregister_part(&mut self, window: Window) {
        self.parts.remove(&window);
    }

    /// Managed clients in adoption order
    pub fn clients(&self) -> &[Window] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

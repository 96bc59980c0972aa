//! Display Module
//!
//! The single connection to the X server: screens, atoms, cursors, the
//! nested server-grab counter, bad-window tracking and the shutdown/reload
//! request flags. Implements [`XServer`] for the window manager.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::time::Duration;

use anyhow::Result;
use nix::fcntl::{fcntl, FcntlArg, FdFlag};
use thiserror::Error;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::randr::ConnectionExt as _;
use x11rb::protocol::xproto::*;
use x11rb::protocol::{ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{CURRENT_TIME, NONE};

use crate::shared::{Extents, Geometry, Strut};
use crate::wm::decorations::Background;
use crate::wm::ewmh::{Atoms, NetWmState};
use crate::wm::hints::{
    ClientHints, IcccmState, MwmHints, Protocols, SizeHints, VendorAttributes, VendorHints,
    WmHints, MWM_HINTS_ELEMENTS, VENDOR_ATTRIBUTES_ELEMENTS, VENDOR_HINTS_ELEMENTS,
};
use crate::wm::screen::ScreenInfo;
use crate::wm::server::{
    ClientInfo, ClientRequest, CursorShape, HintProperty, Protocol, RootProperty, StateAction,
    WindowRole, XServer,
};

/// Connection-fatal startup errors
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot open display: {0}")]
    Connect(#[from] x11rb::errors::ConnectError),

    #[error("cannot mark the display connection close-on-exec: {0}")]
    CloseOnExec(#[from] nix::errno::Errno),

    #[error("another window manager is running on screen {0}")]
    AnotherWindowManager(usize),
}

/// Nesting counter for server grabs.
///
/// Only the outermost grab and the matching ungrab reach the wire. An
/// ungrab without a grab is ignored instead of going negative.
#[derive(Debug, Default)]
pub struct GrabCounter {
    depth: Cell<u32>,
}

impl GrabCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the server grab must be sent
    pub fn grab(&self) -> bool {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        depth == 0
    }

    /// Returns true when the server ungrab must be sent
    pub fn ungrab(&self) -> bool {
        match self.depth.get() {
            0 => false,
            depth => {
                self.depth.set(depth - 1);
                depth == 1
            }
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }
}

/// Cursor management
#[derive(Debug)]
pub struct Cursors {
    pub normal: Cursor,
    pub move_cursor: Cursor,
    /// In [`ResizeDirection`](crate::wm::server::ResizeDirection) order
    pub resize: [Cursor; 8],
}

impl Cursors {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        let font = conn.generate_id()?;
        conn.open_font(font, b"cursor")?;

        let create_cursor = |glyph_id: u16| -> Result<Cursor> {
            let cursor_id = conn.generate_id()?;
            conn.create_glyph_cursor(
                cursor_id,
                font,
                font,
                glyph_id,
                glyph_id + 1,
                0,
                0,
                0,
                0xffff,
                0xffff,
                0xffff,
            )?;
            Ok(cursor_id)
        };

        // cursor font glyphs: left_ptr 68, fleur 52, then the eight resize shapes
        let normal = create_cursor(68)?;
        let move_cursor = create_cursor(52)?;
        let resize = [
            create_cursor(134)?, // top_left_corner
            create_cursor(138)?, // top_side
            create_cursor(136)?, // top_right_corner
            create_cursor(96)?,  // right_side
            create_cursor(14)?,  // bottom_right_corner
            create_cursor(16)?,  // bottom_side
            create_cursor(12)?,  // bottom_left_corner
            create_cursor(70)?,  // left_side
        ];

        conn.close_font(font)?;

        Ok(Self {
            normal,
            move_cursor,
            resize,
        })
    }

    fn get(&self, shape: CursorShape) -> Cursor {
        match shape {
            CursorShape::Normal => self.normal,
            CursorShape::Move => self.move_cursor,
            CursorShape::Resize(direction) => self.resize[direction as usize],
        }
    }
}

/// DisplayConnection - the one connection to the X server
pub struct DisplayConnection {
    /// X11 connection
    conn: RustConnection,

    /// Managed screens
    screens: Vec<ScreenInfo>,

    /// All EWMH/ICCCM atoms
    pub atoms: Atoms,

    /// Cursor set
    cursors: Cursors,

    /// Selection owner and `_NET_SUPPORTING_WM_CHECK` window
    check_window: Window,

    grabs: GrabCounter,

    /// Events pulled off the connection by `validate_window`, served first
    pending: RefCell<VecDeque<Event>>,

    bad_window: Cell<Option<Window>>,

    shutdown: Cell<bool>,
    reload: Cell<bool>,
    starting: Cell<bool>,
}

fn root_event_mask() -> EventMask {
    EventMask::SUBSTRUCTURE_REDIRECT
        | EventMask::SUBSTRUCTURE_NOTIFY
        | EventMask::PROPERTY_CHANGE
        | EventMask::BUTTON_PRESS
}

impl DisplayConnection {
    /// Open the display and become its window manager
    pub fn connect(display_name: Option<&str>, replace: bool) -> Result<Self> {
        info!("Connecting to display {:?}", display_name);
        let (conn, screen_num) =
            RustConnection::connect(display_name).map_err(ConnectionError::from)?;

        fcntl(
            conn.stream().as_fd(),
            FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC),
        )
        .map_err(ConnectionError::from)?;

        let atoms = Atoms::new(&conn)?;
        let cursors = Cursors::new(&conn)?;

        let xscreen = conn.setup().roots[screen_num].clone();
        let root = xscreen.root;
        let heads = Self::query_heads(&conn, &xscreen)?;
        info!("Screen {}: {}x{}, {} head(s)", screen_num, xscreen.width_in_pixels, xscreen.height_in_pixels, heads.len());
        let screen = ScreenInfo {
            number: screen_num,
            root,
            visual: xscreen.root_visual,
            colormap: xscreen.default_colormap,
            depth: xscreen.root_depth,
            width: xscreen.width_in_pixels as u32,
            height: xscreen.height_in_pixels as u32,
            heads,
        };

        let check_window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            check_window,
            root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new().override_redirect(1),
        )?;

        Self::acquire_selection(&conn, screen_num, check_window, replace)?;

        let redirect = conn.change_window_attributes(
            root,
            &ChangeWindowAttributesAux::new()
                .event_mask(root_event_mask())
                .cursor(cursors.normal),
        )?;
        if redirect.check().is_err() {
            return Err(ConnectionError::AnotherWindowManager(screen_num).into());
        }

        conn.change_property32(
            PropMode::REPLACE,
            root,
            atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[check_window],
        )?;
        conn.change_property32(
            PropMode::REPLACE,
            check_window,
            atoms.net_supporting_wm_check,
            AtomEnum::WINDOW,
            &[check_window],
        )?;
        conn.change_property8(
            PropMode::REPLACE,
            check_window,
            atoms.net_wm_name,
            atoms.utf8_string,
            b"fluxwm",
        )?;
        atoms.setup_supported(&conn, root)?;
        conn.flush()?;

        Ok(Self {
            conn,
            screens: vec![screen],
            atoms,
            cursors,
            check_window,
            grabs: GrabCounter::new(),
            pending: RefCell::new(VecDeque::new()),
            bad_window: Cell::new(None),
            shutdown: Cell::new(false),
            reload: Cell::new(false),
            starting: Cell::new(false),
        })
    }

    /// RandR monitors, or the whole screen as one head
    fn query_heads(conn: &RustConnection, screen: &Screen) -> Result<Vec<Geometry>> {
        let whole = vec![Geometry::new(
            0,
            0,
            screen.width_in_pixels as u32,
            screen.height_in_pixels as u32,
        )];
        let monitors = match conn.randr_get_monitors(screen.root, true) {
            Ok(cookie) => match cookie.reply() {
                Ok(reply) => reply.monitors,
                Err(e) => {
                    debug!("RandR monitors unavailable: {}", e);
                    return Ok(whole);
                }
            },
            Err(e) => {
                debug!("RandR not present: {}", e);
                return Ok(whole);
            }
        };
        let heads: Vec<Geometry> = monitors
            .iter()
            .map(|m| Geometry::new(m.x as i32, m.y as i32, m.width as u32, m.height as u32))
            .collect();
        Ok(if heads.is_empty() { whole } else { heads })
    }

    /// Own `WM_S<n>`; with `replace`, wait for the previous owner to leave
    fn acquire_selection(
        conn: &RustConnection,
        screen_num: usize,
        owner: Window,
        replace: bool,
    ) -> Result<()> {
        let selection = conn
            .intern_atom(false, format!("WM_S{}", screen_num).as_bytes())?
            .reply()?
            .atom;
        let previous = conn.get_selection_owner(selection)?.reply()?.owner;
        if previous != NONE {
            if !replace {
                return Err(ConnectionError::AnotherWindowManager(screen_num).into());
            }
            info!("Replacing window manager owning 0x{:x}", previous);
            conn.change_window_attributes(
                previous,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
            )?;
        }

        conn.set_selection_owner(owner, selection, CURRENT_TIME)?;
        if conn.get_selection_owner(selection)?.reply()?.owner != owner {
            return Err(ConnectionError::AnotherWindowManager(screen_num).into());
        }

        if previous != NONE {
            conn.flush()?;
            let mut gone = false;
            for _ in 0..50 {
                while let Some(event) = conn.poll_for_event()? {
                    if let Event::DestroyNotify(e) = event {
                        gone |= e.window == previous;
                    }
                }
                if gone {
                    break;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            if !gone {
                warn!("Previous window manager did not exit; continuing");
            }
        }
        Ok(())
    }

    /// Socket descriptor for readiness polling
    pub fn raw_fd(&self) -> RawFd {
        self.conn.stream().as_raw_fd()
    }

    /// Next event: re-queued events first, then the connection.
    /// X errors are consumed here; BadWindow errors are remembered.
    pub fn poll_event(&self) -> Result<Option<Event>> {
        if let Some(event) = self.pending.borrow_mut().pop_front() {
            return Ok(Some(event));
        }
        loop {
            match self.conn.poll_for_event()? {
                Some(Event::Error(error)) => self.record_error(&error),
                other => return Ok(other),
            }
        }
    }

    fn record_error(&self, error: &x11rb::x11_utils::X11Error) {
        if error.error_kind == ErrorKind::Window {
            self.bad_window.set(Some(error.bad_value));
        }
        debug!(
            "X error {:?} on 0x{:x} (request {:?})",
            error.error_kind, error.bad_value, error.request_name
        );
    }

    pub fn request_shutdown(&self) {
        self.shutdown.set(true);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.get()
    }

    pub fn request_reload(&self) {
        self.reload.set(true);
    }

    /// Consume a pending reload request
    pub fn take_reload(&self) -> bool {
        self.reload.replace(false)
    }

    fn root(&self) -> Window {
        self.screens[0].root
    }

    /// 32-bit property of the expected type; `None` if absent, malformed
    /// or the window is gone
    fn property32(
        &self,
        window: Window,
        property: Atom,
        type_: impl Into<Atom>,
        length: u32,
    ) -> Result<Option<Vec<u32>>> {
        let reply = match self
            .conn
            .get_property(false, window, property, type_, 0, length)?
            .reply()
        {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(ReplyError::ConnectionError(e)) => return Err(e.into()),
        };
        Ok(reply.value32().map(|values| values.collect()))
    }

    fn text_property(&self, window: Window, property: Atom) -> Result<Option<String>> {
        let reply = match self
            .conn
            .get_property(false, window, property, AtomEnum::ANY, 0, 256)?
            .reply()
        {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(ReplyError::ConnectionError(e)) => return Err(e.into()),
        };
        if reply.format != 8 || reply.value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&reply.value).into_owned()))
    }

    fn read_client_hints(&self, window: Window) -> Result<ClientHints> {
        let atoms = &self.atoms;
        let mut hints = ClientHints::default();

        if let Some(raw) = self.property32(window, atoms.wm_normal_hints, AtomEnum::WM_SIZE_HINTS, 18)? {
            match SizeHints::from_raw(&raw) {
                Some(size) => hints.size = size,
                None => debug!("Ignoring malformed WM_NORMAL_HINTS on 0x{:x}", window),
            }
        }
        if let Some(raw) = self.property32(window, atoms.wm_hints, AtomEnum::WM_HINTS, 9)? {
            match WmHints::from_raw(&raw) {
                Some(wm) => hints.wm = wm,
                None => debug!("Ignoring malformed WM_HINTS on 0x{:x}", window),
            }
        }
        if let Some(raw) = self.property32(window, atoms.wm_protocols, AtomEnum::ATOM, 32)? {
            hints.protocols = Protocols::from_atoms(&raw, atoms.wm_delete_window, atoms.wm_take_focus);
        }
        if let Some(raw) = self.property32(window, atoms.motif_wm_hints, atoms.motif_wm_hints, 5)? {
            hints.mwm = MwmHints::from_raw(&raw[..raw.len().min(MWM_HINTS_ELEMENTS)]);
        }
        if let Some(raw) = self.property32(
            window,
            atoms.blackbox_hints,
            atoms.blackbox_hints,
            VENDOR_HINTS_ELEMENTS as u32,
        )? {
            hints.vendor = VendorHints::from_raw(&raw);
        }
        if let Some(raw) = self.property32(window, atoms.wm_transient_for, AtomEnum::WINDOW, 1)? {
            hints.transient_for = raw
                .first()
                .copied()
                .filter(|owner| *owner != NONE && *owner != window);
        }
        if let Some(raw) = self.property32(window, atoms.net_wm_window_type, AtomEnum::ATOM, 16)? {
            hints.dock = raw.contains(&atoms.net_wm_window_type_dock);
        }
        hints.title = match self.text_property(window, atoms.net_wm_name)? {
            Some(title) => title,
            None => self.text_property(window, atoms.wm_name)?.unwrap_or_default(),
        };
        Ok(hints)
    }

    fn send_event_to(&self, window: Window, mask: EventMask, event: impl Into<[u8; 32]>) -> Result<()> {
        self.conn.send_event(false, window, mask, event)?;
        Ok(())
    }
}

impl XServer for DisplayConnection {
    fn screens(&self) -> &[ScreenInfo] {
        &self.screens
    }

    fn top_level_windows(&self) -> Result<Vec<Window>> {
        let tree = self.conn.query_tree(self.root())?.reply()?;
        Ok(tree
            .children
            .into_iter()
            .filter(|w| *w != self.check_window)
            .collect())
    }

    fn fetch_client(&self, window: Window) -> Result<Option<ClientInfo>> {
        let attributes = match self.conn.get_window_attributes(window)?.reply() {
            Ok(attributes) => attributes,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(ReplyError::ConnectionError(e)) => return Err(e.into()),
        };
        let geometry = match self.conn.get_geometry(window)?.reply() {
            Ok(geometry) => geometry,
            Err(ReplyError::X11Error(_)) => return Ok(None),
            Err(ReplyError::ConnectionError(e)) => return Err(e.into()),
        };

        let hints = self.read_client_hints(window)?;
        let saved = self
            .property32(
                window,
                self.atoms.blackbox_attributes,
                self.atoms.blackbox_attributes,
                VENDOR_ATTRIBUTES_ELEMENTS as u32,
            )?
            .and_then(|raw| VendorAttributes::from_raw(&raw));
        let wm_state = self
            .property32(window, self.atoms.wm_state, self.atoms.wm_state, 2)?
            .and_then(|raw| raw.first().copied())
            .and_then(IcccmState::from_raw);
        let strut = if hints.dock { self.read_strut(window)? } else { None };

        Ok(Some(ClientInfo {
            geometry: Geometry::new(
                geometry.x as i32,
                geometry.y as i32,
                geometry.width as u32,
                geometry.height as u32,
            ),
            border_width: geometry.border_width as u32,
            override_redirect: attributes.override_redirect,
            viewable: attributes.map_state == MapState::VIEWABLE,
            hints,
            saved,
            wm_state,
            strut,
        }))
    }

    fn read_hints(&self, window: Window) -> Result<Option<ClientHints>> {
        if !self.validate_window(window) {
            return Ok(None);
        }
        self.read_client_hints(window).map(Some)
    }

    fn read_strut(&self, window: Window) -> Result<Option<Strut>> {
        let raw = match self.property32(window, self.atoms.net_wm_strut_partial, AtomEnum::CARDINAL, 12)? {
            Some(raw) if raw.len() >= 4 => raw,
            _ => match self.property32(window, self.atoms.net_wm_strut, AtomEnum::CARDINAL, 4)? {
                Some(raw) if raw.len() >= 4 => raw,
                _ => return Ok(None),
            },
        };
        Ok(Some(Strut {
            left: raw[0],
            right: raw[1],
            top: raw[2],
            bottom: raw[3],
        }))
    }

    fn property_kind(&self, atom: Atom) -> Option<HintProperty> {
        let atoms = &self.atoms;
        match atom {
            a if a == atoms.wm_normal_hints => Some(HintProperty::NormalHints),
            a if a == atoms.wm_hints => Some(HintProperty::WmHints),
            a if a == atoms.wm_protocols => Some(HintProperty::Protocols),
            a if a == atoms.motif_wm_hints => Some(HintProperty::Motif),
            a if a == atoms.blackbox_hints => Some(HintProperty::Vendor),
            a if a == atoms.wm_transient_for => Some(HintProperty::TransientFor),
            a if a == atoms.wm_name || a == atoms.net_wm_name => Some(HintProperty::Title),
            a if a == atoms.net_wm_strut || a == atoms.net_wm_strut_partial => Some(HintProperty::Strut),
            _ => None,
        }
    }

    fn decode_client_message(&self, event: &ClientMessageEvent) -> Option<ClientRequest> {
        if event.format != 32 {
            return None;
        }
        let atoms = &self.atoms;
        let data = event.data.as_data32();
        match event.type_ {
            t if t == atoms.wm_change_state => IcccmState::from_raw(data[0]).map(ClientRequest::ChangeState),
            t if t == atoms.net_active_window => Some(ClientRequest::Activate),
            t if t == atoms.net_close_window => Some(ClientRequest::Close),
            t if t == atoms.net_wm_desktop => Some(ClientRequest::SetDesktop(data[0])),
            t if t == atoms.net_current_desktop => Some(ClientRequest::CurrentDesktop(data[0])),
            t if t == atoms.net_wm_state => {
                let action = match data[0] {
                    0 => StateAction::Remove,
                    1 => StateAction::Add,
                    2 => StateAction::Toggle,
                    _ => return None,
                };
                let states = atoms.decode_state(data[1]) | atoms.decode_state(data[2]);
                Some(ClientRequest::NetState(action, states))
            }
            _ => None,
        }
    }

    fn create_window(&self, parent: Window, geometry: Geometry, role: WindowRole) -> Result<Window> {
        let window = self.conn.generate_id()?;
        let aux = match role {
            WindowRole::Frame => CreateWindowAux::new().override_redirect(1).event_mask(
                EventMask::ENTER_WINDOW
                    | EventMask::LEAVE_WINDOW
                    | EventMask::BUTTON_PRESS
                    | EventMask::BUTTON_RELEASE
                    | EventMask::BUTTON_MOTION
                    | EventMask::EXPOSURE,
            ),
            WindowRole::Plate => CreateWindowAux::new()
                .override_redirect(1)
                .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY),
            WindowRole::Decoration | WindowRole::Tab => CreateWindowAux::new()
                .override_redirect(1)
                .event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON_MOTION
                        | EventMask::EXPOSURE,
                ),
        };
        self.conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            parent,
            geometry.x as i16,
            geometry.y as i16,
            geometry.width.max(1) as u16,
            geometry.height.max(1) as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &aux,
        )?;
        Ok(window)
    }

    fn destroy_window(&self, window: Window) -> Result<()> {
        self.conn.destroy_window(window)?;
        Ok(())
    }

    fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
        self.conn.reparent_window(window, parent, x as i16, y as i16)?;
        Ok(())
    }

    fn map_window(&self, window: Window) -> Result<()> {
        self.conn.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&self, window: Window) -> Result<()> {
        self.conn.unmap_window(window)?;
        Ok(())
    }

    fn configure_window(&self, window: Window, geometry: Geometry) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(geometry.x)
                .y(geometry.y)
                .width(geometry.width.max(1))
                .height(geometry.height.max(1)),
        )?;
        Ok(())
    }

    fn set_border_width(&self, window: Window, width: u32) -> Result<()> {
        self.conn
            .configure_window(window, &ConfigureWindowAux::new().border_width(width))?;
        Ok(())
    }

    fn raise_window(&self, window: Window) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn lower_window(&self, window: Window) -> Result<()> {
        self.conn.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
        )?;
        Ok(())
    }

    fn forward_configure(&self, request: &ConfigureRequestEvent) -> Result<()> {
        self.conn.configure_window(
            request.window,
            &ConfigureWindowAux::from_configure_request(request),
        )?;
        Ok(())
    }

    fn change_save_set(&self, window: Window, insert: bool) -> Result<()> {
        let mode = if insert { SetMode::INSERT } else { SetMode::DELETE };
        self.conn.change_save_set(mode, window)?;
        Ok(())
    }

    fn select_client_input(&self, window: Window) -> Result<()> {
        self.conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::PROPERTY_CHANGE
                    | EventMask::STRUCTURE_NOTIFY
                    | EventMask::FOCUS_CHANGE
                    | EventMask::ENTER_WINDOW,
            ),
        )?;
        Ok(())
    }

    fn set_wm_state(&self, window: Window, state: IcccmState) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.wm_state,
            self.atoms.wm_state,
            &[state as u32, NONE],
        )?;
        Ok(())
    }

    fn set_attributes(&self, window: Window, attributes: &VendorAttributes) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.blackbox_attributes,
            self.atoms.blackbox_attributes,
            &attributes.to_raw(),
        )?;
        Ok(())
    }

    fn set_net_wm_state(&self, window: Window, state: NetWmState) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_state,
            AtomEnum::ATOM,
            &self.atoms.encode_state(state),
        )?;
        Ok(())
    }

    fn set_desktop(&self, window: Window, desktop: Option<u32>) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_wm_desktop,
            AtomEnum::CARDINAL,
            &[desktop.unwrap_or(u32::MAX)],
        )?;
        Ok(())
    }

    fn set_frame_extents(&self, window: Window, extents: Extents) -> Result<()> {
        self.conn.change_property32(
            PropMode::REPLACE,
            window,
            self.atoms.net_frame_extents,
            AtomEnum::CARDINAL,
            &[extents.left, extents.right, extents.top, extents.bottom],
        )?;
        Ok(())
    }

    fn clear_state_properties(&self, window: Window) -> Result<()> {
        for property in [
            self.atoms.blackbox_attributes,
            self.atoms.net_wm_state,
            self.atoms.net_wm_desktop,
        ] {
            self.conn.delete_property(window, property)?;
        }
        Ok(())
    }

    fn set_input_focus(&self, window: Window) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn focus_root(&self) -> Result<()> {
        self.conn
            .set_input_focus(InputFocus::POINTER_ROOT, self.root(), CURRENT_TIME)?;
        Ok(())
    }

    fn send_protocol(&self, window: Window, protocol: Protocol) -> Result<()> {
        let atom = match protocol {
            Protocol::DeleteWindow => self.atoms.wm_delete_window,
            Protocol::TakeFocus => self.atoms.wm_take_focus,
        };
        let event = ClientMessageEvent::new(
            32,
            window,
            self.atoms.wm_protocols,
            [atom, CURRENT_TIME, 0, 0, 0],
        );
        self.send_event_to(window, EventMask::NO_EVENT, event)
    }

    fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()> {
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: geometry.x as i16,
            y: geometry.y as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.send_event_to(window, EventMask::STRUCTURE_NOTIFY, event)
    }

    fn kill_client(&self, window: Window) -> Result<()> {
        self.conn.kill_client(window)?;
        Ok(())
    }

    fn grab_server(&self) -> Result<()> {
        if self.grabs.grab() {
            self.conn.grab_server()?;
        }
        Ok(())
    }

    fn ungrab_server(&self) -> Result<()> {
        if self.grabs.ungrab() {
            self.conn.ungrab_server()?;
        }
        Ok(())
    }

    fn grab_pointer(&self, window: Window, cursor: CursorShape) -> Result<bool> {
        let reply = self
            .conn
            .grab_pointer(
                false,
                window,
                EventMask::BUTTON_RELEASE | EventMask::BUTTON_MOTION | EventMask::POINTER_MOTION,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                NONE,
                self.cursors.get(cursor),
                CURRENT_TIME,
            )?
            .reply();
        match reply {
            Ok(reply) => Ok(reply.status == GrabStatus::SUCCESS),
            Err(ReplyError::X11Error(_)) => Ok(false),
            Err(ReplyError::ConnectionError(e)) => Err(e.into()),
        }
    }

    fn ungrab_pointer(&self) -> Result<()> {
        self.conn.ungrab_pointer(CURRENT_TIME)?;
        Ok(())
    }

    fn set_background(&self, window: Window, background: Background) -> Result<()> {
        let aux = match background {
            Background::Solid(pixel) => ChangeWindowAttributesAux::new().background_pixel(pixel),
            Background::Pixmap(pixmap) => ChangeWindowAttributesAux::new().background_pixmap(pixmap),
            Background::ParentRelative => {
                ChangeWindowAttributesAux::new().background_pixmap(BackPixmap::PARENT_RELATIVE)
            }
        };
        self.conn.change_window_attributes(window, &aux)?;
        self.conn.clear_area(false, window, 0, 0, 0, 0)?;
        Ok(())
    }

    fn validate_window(&self, window: Window) -> bool {
        let mut pending = self.pending.borrow_mut();
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(Event::Error(error))) => self.record_error(&error),
                Ok(Some(event)) => pending.push_back(event),
                Ok(None) => break,
                Err(e) => {
                    debug!("Connection error while validating 0x{:x}: {}", window, e);
                    return false;
                }
            }
        }
        let destroyed = pending
            .iter()
            .any(|event| matches!(event, Event::DestroyNotify(e) if e.window == window));
        if destroyed {
            debug!("Window 0x{:x} already destroyed", window);
        }
        !destroyed
    }

    fn last_bad_window(&self) -> Option<Window> {
        self.bad_window.get()
    }

    fn publish(&self, property: RootProperty) -> Result<()> {
        let root = self.root();
        let atoms = &self.atoms;
        match property {
            RootProperty::ActiveWindow(window) => self.conn.change_property32(
                PropMode::REPLACE,
                root,
                atoms.net_active_window,
                AtomEnum::WINDOW,
                &[window.unwrap_or(NONE)],
            )?,
            RootProperty::ClientList(windows) => self.conn.change_property32(
                PropMode::REPLACE,
                root,
                atoms.net_client_list,
                AtomEnum::WINDOW,
                &windows,
            )?,
            RootProperty::CurrentDesktop(desktop) => self.conn.change_property32(
                PropMode::REPLACE,
                root,
                atoms.net_current_desktop,
                AtomEnum::CARDINAL,
                &[desktop],
            )?,
            RootProperty::DesktopCount(count) => self.conn.change_property32(
                PropMode::REPLACE,
                root,
                atoms.net_number_of_desktops,
                AtomEnum::CARDINAL,
                &[count],
            )?,
            RootProperty::WorkArea(area) => self.conn.change_property32(
                PropMode::REPLACE,
                root,
                atoms.net_workarea,
                AtomEnum::CARDINAL,
                &[area.x as u32, area.y as u32, area.width, area.height],
            )?,
        };
        Ok(())
    }

    fn is_starting(&self) -> bool {
        self.starting.get()
    }

    fn set_starting(&self, starting: bool) {
        self.starting.set(starting);
    }

    fn flush(&self) -> Result<()> {
        self.conn.flush()?;
        Ok(())
    }
}

impl Drop for DisplayConnection {
    fn drop(&mut self) {
        for cursor in std::iter::once(self.cursors.normal)
            .chain(std::iter::once(self.cursors.move_cursor))
            .chain(self.cursors.resize)
        {
            let _ = self.conn.free_cursor(cursor);
        }
        let _ = self.conn.destroy_window(self.check_window);
        let _ = self.conn.flush();
    }
}

//! Server Module
//!
//! The request seam between the window manager and the display server.
//! [`DisplayConnection`](crate::wm::display::DisplayConnection) is the real
//! implementation; tests drive the state machine through
//! [`testing::FakeServer`].
//!
//! Transient races (a window destroyed while we talk to it) never surface as
//! errors: lookups answer `Ok(None)` and requests on dead windows are
//! dropped by the server. An `Err` means the connection itself is gone.

use anyhow::Result;
use x11rb::protocol::xproto::{Atom, ClientMessageEvent, ConfigureRequestEvent, Window};

use crate::shared::{Extents, Geometry, Strut};
use crate::wm::decorations::Background;
use crate::wm::ewmh::NetWmState;
use crate::wm::hints::{ClientHints, IcccmState, VendorAttributes};
use crate::wm::screen::ScreenInfo;

/// What a manager-created window is used for; decides its event mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowRole {
    /// Outer frame, child of the root
    Frame,
    /// Reparenting buffer holding the client, child of the frame
    Plate,
    /// Titlebar, handle, grips and buttons, children of the frame
    Decoration,
    /// Tab, child of the root
    Tab,
}

/// ICCCM protocol messages sent to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    DeleteWindow,
    TakeFocus,
}

/// Resize direction, in cursor table order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeDirection {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

/// Pointer shapes from the cursor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Normal,
    Move,
    Resize(ResizeDirection),
}

/// Root window properties the manager publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootProperty {
    ActiveWindow(Option<Window>),
    ClientList(Vec<Window>),
    CurrentDesktop(u32),
    DesktopCount(u32),
    WorkArea(Geometry),
}

/// Client window properties the manager watches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintProperty {
    NormalHints,
    WmHints,
    Protocols,
    Motif,
    Vendor,
    TransientFor,
    Title,
    Strut,
}

/// `_NET_WM_STATE` client message action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

/// Client messages the manager honours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    /// `WM_CHANGE_STATE`
    ChangeState(IcccmState),
    /// `_NET_ACTIVE_WINDOW`
    Activate,
    /// `_NET_CLOSE_WINDOW`
    Close,
    /// `_NET_WM_DESKTOP`
    SetDesktop(u32),
    /// `_NET_CURRENT_DESKTOP`, sent to the root
    CurrentDesktop(u32),
    /// `_NET_WM_STATE`
    NetState(StateAction, NetWmState),
}

/// Snapshot of a client window taken at adoption time
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    /// Root-relative position and size
    pub geometry: Geometry,
    pub border_width: u32,
    pub override_redirect: bool,
    /// Currently mapped on screen (startup scan)
    pub viewable: bool,
    pub hints: ClientHints,
    /// Persisted manager state left by a previous run
    pub saved: Option<VendorAttributes>,
    /// Existing `WM_STATE`
    pub wm_state: Option<IcccmState>,
    /// `_NET_WM_STRUT(_PARTIAL)` of dock windows
    pub strut: Option<Strut>,
}

/// Requests the window manager issues against the display server
pub trait XServer {
    fn screens(&self) -> &[ScreenInfo];

    /// Top-level children of the root, bottom to top
    fn top_level_windows(&self) -> Result<Vec<Window>>;

    /// Attributes, geometry and hints of a client; `None` if it vanished
    fn fetch_client(&self, window: Window) -> Result<Option<ClientInfo>>;

    /// Re-read the hint properties of a client; `None` if it vanished
    fn read_hints(&self, window: Window) -> Result<Option<ClientHints>>;

    fn read_strut(&self, window: Window) -> Result<Option<Strut>>;

    fn property_kind(&self, atom: Atom) -> Option<HintProperty>;
    /// Client requests we act on; anything else is `None`
    fn decode_client_message(&self, event: &ClientMessageEvent) -> Option<ClientRequest>;

    fn create_window(&self, parent: Window, geometry: Geometry, role: WindowRole) -> Result<Window>;
    fn destroy_window(&self, window: Window) -> Result<()>;
    fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()>;
    fn map_window(&self, window: Window) -> Result<()>;
    fn unmap_window(&self, window: Window) -> Result<()>;
    fn configure_window(&self, window: Window, geometry: Geometry) -> Result<()>;
    fn set_border_width(&self, window: Window, width: u32) -> Result<()>;
    fn raise_window(&self, window: Window) -> Result<()>;
    fn lower_window(&self, window: Window) -> Result<()>;

    /// Honour a configure request from a window we do not manage
    fn forward_configure(&self, request: &ConfigureRequestEvent) -> Result<()>;

    fn change_save_set(&self, window: Window, insert: bool) -> Result<()>;

    /// Select the events we track on a managed client
    fn select_client_input(&self, window: Window) -> Result<()>;

    fn set_wm_state(&self, window: Window, state: IcccmState) -> Result<()>;
    fn set_attributes(&self, window: Window, attributes: &VendorAttributes) -> Result<()>;
    fn set_net_wm_state(&self, window: Window, state: NetWmState) -> Result<()>;

    /// `_NET_WM_DESKTOP`; `None` means all desktops
    fn set_desktop(&self, window: Window, desktop: Option<u32>) -> Result<()>;
    fn set_frame_extents(&self, window: Window, extents: Extents) -> Result<()>;

    /// Delete the manager-private state properties from a client
    fn clear_state_properties(&self, window: Window) -> Result<()>;

    fn set_input_focus(&self, window: Window) -> Result<()>;
    fn focus_root(&self) -> Result<()>;
    fn send_protocol(&self, window: Window, protocol: Protocol) -> Result<()>;

    /// Synthetic ConfigureNotify telling a client where it really is
    fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()>;
    fn kill_client(&self, window: Window) -> Result<()>;

    /// Nested server grab; only the outermost grab reaches the wire
    fn grab_server(&self) -> Result<()>;
    /// Balanced with [`XServer::grab_server`]; extra calls are ignored
    fn ungrab_server(&self) -> Result<()>;

    fn grab_pointer(&self, window: Window, cursor: CursorShape) -> Result<bool>;
    fn ungrab_pointer(&self) -> Result<()>;

    fn set_background(&self, window: Window, background: Background) -> Result<()>;

    /// False if a DestroyNotify for `window` is already waiting; the event
    /// stays queued
    fn validate_window(&self, window: Window) -> bool;

    /// Last window an X error reported as bad
    fn last_bad_window(&self) -> Option<Window>;

    fn publish(&self, property: RootProperty) -> Result<()>;

    /// Initial scan in progress
    fn is_starting(&self) -> bool;
    fn set_starting(&self, starting: bool);

    fn flush(&self) -> Result<()>;
}

#[cfg(test)]
pub mod testing {
    //! Recording fake of the display server

    use std::cell::{Cell, RefCell};
    use std::collections::{HashMap, HashSet};

    use super::*;
    use crate::wm::display::GrabCounter;

    /// A request as the fake recorded it
    #[derive(Debug, Clone, PartialEq)]
    pub enum Request {
        Create { window: Window, parent: Window, role: WindowRole },
        Destroy(Window),
        Reparent { window: Window, parent: Window, x: i32, y: i32 },
        Map(Window),
        Unmap(Window),
        Configure { window: Window, geometry: Geometry },
        BorderWidth { window: Window, width: u32 },
        Raise(Window),
        Lower(Window),
        Forward(Window),
        SaveSet { window: Window, insert: bool },
        SelectInput(Window),
        WmState { window: Window, state: IcccmState },
        Attributes { window: Window, attributes: VendorAttributes },
        NetState { window: Window, state: NetWmState },
        Desktop { window: Window, desktop: Option<u32> },
        FrameExtents { window: Window, extents: Extents },
        ClearState(Window),
        Focus(Window),
        FocusRoot,
        Protocol { window: Window, protocol: Protocol },
        ConfigureNotify { window: Window, geometry: Geometry },
        Kill(Window),
        GrabServer,
        UngrabServer,
        GrabPointer(Window),
        UngrabPointer,
        Background { window: Window, background: Background },
        Publish(RootProperty),
    }

    pub const ROOT: Window = 0x100;

    pub struct FakeServer {
        pub requests: RefCell<Vec<Request>>,
        pub clients: RefCell<HashMap<Window, ClientInfo>>,
        pub destroyed: RefCell<HashSet<Window>>,
        pub top_level: RefCell<Vec<Window>>,
        pub bad_window: Cell<Option<Window>>,
        screens: Vec<ScreenInfo>,
        grabs: GrabCounter,
        next_id: Cell<Window>,
        starting: Cell<bool>,
        disconnected: Cell<bool>,
    }

    impl FakeServer {
        pub fn new() -> Self {
            Self {
                requests: RefCell::new(Vec::new()),
                clients: RefCell::new(HashMap::new()),
                destroyed: RefCell::new(HashSet::new()),
                top_level: RefCell::new(Vec::new()),
                bad_window: Cell::new(None),
                screens: vec![ScreenInfo {
                    number: 0,
                    root: ROOT,
                    visual: 0x21,
                    colormap: 0x20,
                    depth: 24,
                    width: 1920,
                    height: 1080,
                    heads: vec![Geometry::new(0, 0, 1920, 1080)],
                }],
                grabs: GrabCounter::new(),
                next_id: Cell::new(0x0100_0000),
                starting: Cell::new(false),
                disconnected: Cell::new(false),
            }
        }

        /// Serve `info` for `window`
        pub fn add_client(&self, window: Window, info: ClientInfo) {
            self.clients.borrow_mut().insert(window, info);
        }

        /// Simple client at `geometry` with default hints
        pub fn add_plain_client(&self, window: Window, geometry: Geometry) {
            self.add_client(
                window,
                ClientInfo {
                    geometry,
                    ..ClientInfo::default()
                },
            );
        }

        /// The client went away on the server side
        pub fn vanish(&self, window: Window) {
            self.destroyed.borrow_mut().insert(window);
        }

        pub fn take_requests(&self) -> Vec<Request> {
            self.requests.borrow_mut().drain(..).collect()
        }

        pub fn requests(&self) -> Vec<Request> {
            self.requests.borrow().clone()
        }

        pub fn has_request(&self, request: &Request) -> bool {
            self.requests.borrow().contains(request)
        }

        pub fn grab_depth(&self) -> u32 {
            self.grabs.depth()
        }

        /// Every request from now on fails
        pub fn disconnect(&self) {
            self.disconnected.set(true);
        }

        fn record(&self, request: Request) -> Result<()> {
            if self.disconnected.get() {
                anyhow::bail!("connection closed");
            }
            self.requests.borrow_mut().push(request);
            Ok(())
        }
    }

    impl XServer for FakeServer {
        fn screens(&self) -> &[ScreenInfo] {
            &self.screens
        }

        fn top_level_windows(&self) -> Result<Vec<Window>> {
            Ok(self.top_level.borrow().clone())
        }

        fn fetch_client(&self, window: Window) -> Result<Option<ClientInfo>> {
            if self.destroyed.borrow().contains(&window) {
                return Ok(None);
            }
            Ok(self.clients.borrow().get(&window).cloned())
        }

        fn read_hints(&self, window: Window) -> Result<Option<ClientHints>> {
            Ok(self.fetch_client(window)?.map(|info| info.hints))
        }

        fn read_strut(&self, window: Window) -> Result<Option<Strut>> {
            Ok(self.fetch_client(window)?.and_then(|info| info.strut))
        }

        fn property_kind(&self, _atom: Atom) -> Option<HintProperty> {
            None
        }

        fn decode_client_message(&self, _event: &ClientMessageEvent) -> Option<ClientRequest> {
            None
        }

        fn create_window(&self, parent: Window, _geometry: Geometry, role: WindowRole) -> Result<Window> {
            let window = self.next_id.get();
            self.next_id.set(window + 1);
            self.record(Request::Create { window, parent, role })?;
            Ok(window)
        }

        fn destroy_window(&self, window: Window) -> Result<()> {
            self.record(Request::Destroy(window))
        }

        fn reparent_window(&self, window: Window, parent: Window, x: i32, y: i32) -> Result<()> {
            self.record(Request::Reparent { window, parent, x, y })
        }

        fn map_window(&self, window: Window) -> Result<()> {
            self.record(Request::Map(window))
        }

        fn unmap_window(&self, window: Window) -> Result<()> {
            self.record(Request::Unmap(window))
        }

        fn configure_window(&self, window: Window, geometry: Geometry) -> Result<()> {
            self.record(Request::Configure { window, geometry })
        }

        fn set_border_width(&self, window: Window, width: u32) -> Result<()> {
            self.record(Request::BorderWidth { window, width })
        }

        fn raise_window(&self, window: Window) -> Result<()> {
            self.record(Request::Raise(window))
        }

        fn lower_window(&self, window: Window) -> Result<()> {
            self.record(Request::Lower(window))
        }

        fn forward_configure(&self, request: &ConfigureRequestEvent) -> Result<()> {
            self.record(Request::Forward(request.window))
        }

        fn change_save_set(&self, window: Window, insert: bool) -> Result<()> {
            self.record(Request::SaveSet { window, insert })
        }

        fn select_client_input(&self, window: Window) -> Result<()> {
            self.record(Request::SelectInput(window))
        }

        fn set_wm_state(&self, window: Window, state: IcccmState) -> Result<()> {
            self.record(Request::WmState { window, state })
        }

        fn set_attributes(&self, window: Window, attributes: &VendorAttributes) -> Result<()> {
            self.record(Request::Attributes { window, attributes: *attributes })
        }

        fn set_net_wm_state(&self, window: Window, state: NetWmState) -> Result<()> {
            self.record(Request::NetState { window, state })
        }

        fn set_desktop(&self, window: Window, desktop: Option<u32>) -> Result<()> {
            self.record(Request::Desktop { window, desktop })
        }

        fn set_frame_extents(&self, window: Window, extents: Extents) -> Result<()> {
            self.record(Request::FrameExtents { window, extents })
        }

        fn clear_state_properties(&self, window: Window) -> Result<()> {
            self.record(Request::ClearState(window))
        }

        fn set_input_focus(&self, window: Window) -> Result<()> {
            self.record(Request::Focus(window))
        }

        fn focus_root(&self) -> Result<()> {
            self.record(Request::FocusRoot)
        }

        fn send_protocol(&self, window: Window, protocol: Protocol) -> Result<()> {
            self.record(Request::Protocol { window, protocol })
        }

        fn send_configure_notify(&self, window: Window, geometry: Geometry) -> Result<()> {
            self.record(Request::ConfigureNotify { window, geometry })
        }

        fn kill_client(&self, window: Window) -> Result<()> {
            self.record(Request::Kill(window))
        }

        fn grab_server(&self) -> Result<()> {
            if self.grabs.grab() {
                self.record(Request::GrabServer)?;
            }
            Ok(())
        }

        fn ungrab_server(&self) -> Result<()> {
            if self.grabs.ungrab() {
                self.record(Request::UngrabServer)?;
            }
            Ok(())
        }

        fn grab_pointer(&self, window: Window, _cursor: CursorShape) -> Result<bool> {
            self.record(Request::GrabPointer(window))?;
            Ok(true)
        }

        fn ungrab_pointer(&self) -> Result<()> {
            self.record(Request::UngrabPointer)
        }

        fn set_background(&self, window: Window, background: Background) -> Result<()> {
            self.record(Request::Background { window, background })
        }

        fn validate_window(&self, window: Window) -> bool {
            !self.destroyed.borrow().contains(&window)
        }

        fn last_bad_window(&self) -> Option<Window> {
            self.bad_window.get()
        }

        fn publish(&self, property: RootProperty) -> Result<()> {
            self.record(Request::Publish(property))
        }

        fn is_starting(&self) -> bool {
            self.starting.get()
        }

        fn set_starting(&self, starting: bool) {
            self.starting.set(starting);
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }
}

//! EWMH / ICCCM atoms
//!
//! The interned atom table, the subset of EWMH the manager advertises, and
//! the `_NET_WM_STATE` encoding.

use anyhow::Result;
use bitflags::bitflags;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;
use x11rb::wrapper::ConnectionExt as _;

bitflags! {
    /// `_NET_WM_STATE` values the manager maintains
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetWmState: u32 {
        const SHADED    = 1 << 0;
        const STICKY    = 1 << 1;
        const MAX_VERT  = 1 << 2;
        const MAX_HORZ  = 1 << 3;
        const HIDDEN    = 1 << 4;
    }
}

/// Holds all interned atoms
#[derive(Debug)]
pub struct Atoms {
    // ICCCM
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_normal_hints: Atom,
    pub wm_hints: Atom,
    pub wm_transient_for: Atom,
    pub wm_name: Atom,
    pub utf8_string: Atom,
    // vendor
    pub motif_wm_hints: Atom,
    pub blackbox_hints: Atom,
    pub blackbox_attributes: Atom,
    // EWMH root
    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_client_list: Atom,
    pub net_active_window: Atom,
    pub net_number_of_desktops: Atom,
    pub net_current_desktop: Atom,
    pub net_workarea: Atom,
    // EWMH client
    pub net_wm_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_shaded: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_frame_extents: Atom,
    pub net_close_window: Atom,
    pub net_wm_window_type: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom)
        };

        Ok(Self {
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            wm_normal_hints: AtomEnum::WM_NORMAL_HINTS.into(),
            wm_hints: AtomEnum::WM_HINTS.into(),
            wm_transient_for: AtomEnum::WM_TRANSIENT_FOR.into(),
            wm_name: AtomEnum::WM_NAME.into(),
            utf8_string: intern("UTF8_STRING")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,
            blackbox_hints: intern("_BLACKBOX_HINTS")?,
            blackbox_attributes: intern("_BLACKBOX_ATTRIBUTES")?,
            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_workarea: intern("_NET_WORKAREA")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_shaded: intern("_NET_WM_STATE_SHADED")?,
            net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_state_hidden: intern("_NET_WM_STATE_HIDDEN")?,
            net_frame_extents: intern("_NET_FRAME_EXTENTS")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_strut: intern("_NET_WM_STRUT")?,
            net_wm_strut_partial: intern("_NET_WM_STRUT_PARTIAL")?,
        })
    }

    /// Set up _NET_SUPPORTED on root window
    pub fn setup_supported<C: Connection>(&self, conn: &C, root: Window) -> Result<()> {
        let supported = [
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_client_list,
            self.net_active_window,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_workarea,
            self.net_wm_desktop,
            self.net_wm_state,
            self.net_wm_state_shaded,
            self.net_wm_state_sticky,
            self.net_wm_state_maximized_vert,
            self.net_wm_state_maximized_horz,
            self.net_wm_state_hidden,
            self.net_frame_extents,
            self.net_close_window,
            self.net_wm_window_type,
            self.net_wm_window_type_dock,
            self.net_wm_strut,
            self.net_wm_strut_partial,
        ];

        conn.change_property32(
            PropMode::REPLACE,
            root,
            self.net_supported,
            AtomEnum::ATOM,
            &supported,
        )?;
        Ok(())
    }

    fn state_table(&self) -> [(NetWmState, Atom); 5] {
        [
            (NetWmState::SHADED, self.net_wm_state_shaded),
            (NetWmState::STICKY, self.net_wm_state_sticky),
            (NetWmState::MAX_VERT, self.net_wm_state_maximized_vert),
            (NetWmState::MAX_HORZ, self.net_wm_state_maximized_horz),
            (NetWmState::HIDDEN, self.net_wm_state_hidden),
        ]
    }

    /// Atom list for a `_NET_WM_STATE` value
    pub fn encode_state(&self, state: NetWmState) -> Vec<Atom> {
        self.state_table()
            .into_iter()
            .filter(|(flag, _)| state.contains(*flag))
            .map(|(_, atom)| atom)
            .collect()
    }

    /// State flag of a single `_NET_WM_STATE_*` atom; unknown atoms are empty
    pub fn decode_state(&self, atom: Atom) -> NetWmState {
        self.state_table()
            .into_iter()
            .find(|(_, a)| *a == atom)
            .map(|(flag, _)| flag)
            .unwrap_or_default()
    }
}

//! Hints Module
//!
//! Window hints reading and application: ICCCM size hints, WM hints and
//! protocols, MWM hints, and the vendor hint/attribute structures.
//!
//! Every parser takes the raw CARD32 payload of a property. Payloads that
//! are shorter than the fixed element count are treated as absent, so a
//! malformed property falls back to defaults instead of failing.

use bitflags::bitflags;
use x11rb::protocol::xproto::Window;

use crate::shared::{Extents, Geometry};

// WM_SIZE_HINTS flags
const US_POSITION: u32 = 1 << 0;
const P_POSITION: u32 = 1 << 2;
const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;
const P_WIN_GRAVITY: u32 = 1 << 9;

/// Pre-ICCCM clients send 15 elements (no base size / gravity)
const SIZE_HINTS_MIN_ELEMENTS: usize = 15;
const SIZE_HINTS_ELEMENTS: usize = 18;

/// Largest window dimension the protocol can express
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

// WM_HINTS flags
const INPUT_HINT: u32 = 1 << 0;
const STATE_HINT: u32 = 1 << 1;

/// Fixed element count of `_MOTIF_WM_HINTS` that we read
pub const MWM_HINTS_ELEMENTS: usize = 3;
/// Fixed element count of `_BLACKBOX_HINTS`
pub const VENDOR_HINTS_ELEMENTS: usize = 5;
/// Fixed element count of `_BLACKBOX_ATTRIBUTES`
pub const VENDOR_ATTRIBUTES_ELEMENTS: usize = 8;

pub const MWM_HINTS_FUNCTIONS: u32 = 1 << 0;
pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

pub const MWM_FUNC_ALL: u32 = 1 << 0;
pub const MWM_FUNC_RESIZE: u32 = 1 << 1;
pub const MWM_FUNC_MOVE: u32 = 1 << 2;
pub const MWM_FUNC_ICONIFY: u32 = 1 << 3;
pub const MWM_FUNC_MAXIMIZE: u32 = 1 << 4;
pub const MWM_FUNC_CLOSE: u32 = 1 << 5;

pub const MWM_DECOR_ALL: u32 = 1 << 0;
pub const MWM_DECOR_BORDER: u32 = 1 << 1;
pub const MWM_DECOR_HANDLE: u32 = 1 << 2;
pub const MWM_DECOR_TITLE: u32 = 1 << 3;
pub const MWM_DECOR_MENU: u32 = 1 << 4;
pub const MWM_DECOR_ICONIFY: u32 = 1 << 5;
pub const MWM_DECOR_MAXIMIZE: u32 = 1 << 6;

/// ICCCM window state (`WM_STATE` / `WM_HINTS.initial_state`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcccmState {
    Withdrawn = 0,
    Normal = 1,
    Iconic = 3,
}

impl IcccmState {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Withdrawn),
            1 => Some(Self::Normal),
            3 => Some(Self::Iconic),
            _ => None,
        }
    }
}

/// Window gravity (ICCCM `win_gravity`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    Forget,
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
    Static,
}

impl Gravity {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::Forget,
            2 => Self::North,
            3 => Self::NorthEast,
            4 => Self::West,
            5 => Self::Center,
            6 => Self::East,
            7 => Self::SouthWest,
            8 => Self::South,
            9 => Self::SouthEast,
            10 => Self::Static,
            _ => Self::NorthWest,
        }
    }

    /// Horizontal offset from client to frame: frame_x = client_x - offset
    fn x_offset(self, extents: &Extents) -> i32 {
        match self {
            Self::NorthWest | Self::West | Self::SouthWest | Self::Forget => 0,
            Self::NorthEast | Self::East | Self::SouthEast => extents.horizontal() as i32,
            Self::North | Self::Center | Self::South => extents.horizontal() as i32 / 2,
            Self::Static => extents.left as i32,
        }
    }

    fn y_offset(self, extents: &Extents) -> i32 {
        match self {
            Self::NorthWest | Self::North | Self::NorthEast | Self::Forget => 0,
            Self::SouthWest | Self::South | Self::SouthEast => extents.vertical() as i32,
            Self::West | Self::Center | Self::East => extents.vertical() as i32 / 2,
            Self::Static => extents.top as i32,
        }
    }

    /// Frame position for a client that asked to be at `(x, y)`
    pub fn frame_position(self, x: i32, y: i32, extents: &Extents) -> (i32, i32) {
        (x - self.x_offset(extents), y - self.y_offset(extents))
    }

    /// Inverse of [`Gravity::frame_position`]: where the client would be
    /// had it never been framed
    pub fn client_position(self, frame_x: i32, frame_y: i32, extents: &Extents) -> (i32, i32) {
        (frame_x + self.x_offset(extents), frame_y + self.y_offset(extents))
    }
}

/// Size hints (WM_NORMAL_HINTS), normalised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeHints {
    /// Position was given by the user or the program
    pub has_position: bool,
    pub min: (u32, u32),
    pub max: Option<(u32, u32)>,
    pub increment: (u32, u32),
    pub base: (u32, u32),
    pub min_aspect: Option<(u32, u32)>,
    pub max_aspect: Option<(u32, u32)>,
    pub gravity: Gravity,
}

impl Default for SizeHints {
    fn default() -> Self {
        Self {
            has_position: false,
            min: (1, 1),
            max: None,
            increment: (1, 1),
            base: (0, 0),
            min_aspect: None,
            max_aspect: None,
            gravity: Gravity::NorthWest,
        }
    }
}

impl SizeHints {
    /// Parse a WM_SIZE_HINTS payload
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < SIZE_HINTS_MIN_ELEMENTS {
            return None;
        }
        let flags = values[0];
        let mut hints = Self {
            has_position: flags & (US_POSITION | P_POSITION) != 0,
            ..Self::default()
        };

        let size = |w: u32, h: u32| (w.min(MAX_DIMENSION), h.min(MAX_DIMENSION));
        let min = (flags & P_MIN_SIZE != 0).then(|| size(values[5], values[6]));
        let base = (values.len() >= SIZE_HINTS_ELEMENTS && flags & P_BASE_SIZE != 0)
            .then(|| size(values[15], values[16]));

        // ICCCM: base falls back to min and min falls back to base
        if let Some(min) = min.or(base) {
            hints.min = (min.0.max(1), min.1.max(1));
        }
        if let Some(base) = base.or(min) {
            hints.base = base;
        }
        if flags & P_MAX_SIZE != 0 && values[7] > 0 && values[8] > 0 {
            let (max_w, max_h) = size(values[7], values[8]);
            hints.max = Some((max_w.max(hints.min.0), max_h.max(hints.min.1)));
        }
        if flags & P_RESIZE_INC != 0 {
            let (inc_w, inc_h) = size(values[9], values[10]);
            hints.increment = (inc_w.max(1), inc_h.max(1));
        }
        if flags & P_ASPECT != 0 {
            if values[11] > 0 && values[12] > 0 {
                hints.min_aspect = Some((values[11], values[12]));
            }
            if values[13] > 0 && values[14] > 0 {
                hints.max_aspect = Some((values[13], values[14]));
            }
        }
        if values.len() >= SIZE_HINTS_ELEMENTS && flags & P_WIN_GRAVITY != 0 {
            hints.gravity = Gravity::from_raw(values[17]);
        }
        Some(hints)
    }

    /// Minimum equals maximum: the client cannot be resized
    pub fn is_fixed(&self) -> bool {
        self.max == Some(self.min)
    }

    /// Constrain a client size to min/max, aspect and increments.
    ///
    /// The result is aligned to the increment grid starting at the base
    /// size and never drops below the minimum.
    pub fn constrain(&self, width: u32, height: u32) -> (u32, u32) {
        let (mut w, mut h) = (width.max(self.min.0), height.max(self.min.1));
        if let Some((max_w, max_h)) = self.max {
            w = w.min(max_w);
            h = h.min(max_h);
        }

        let (base_w, base_h) = self.base;
        let (dw, dh) = (w.saturating_sub(base_w) as u64, h.saturating_sub(base_h) as u64);
        if dw > 0 && dh > 0 {
            let (mut nw, mut nh) = (dw, dh);
            if let Some((num, den)) = self.min_aspect {
                // w/h >= num/den
                if nw * (den as u64) < nh * (num as u64) {
                    nh = nw * den as u64 / num as u64;
                }
            }
            if let Some((num, den)) = self.max_aspect {
                // w/h <= num/den
                if nw * (den as u64) > nh * (num as u64) {
                    nw = nh * num as u64 / den as u64;
                }
            }
            w = base_w + nw as u32;
            h = base_h + nh as u32;
        }

        let align = |value: u32, base: u32, inc: u32, min: u32| -> u32 {
            if inc <= 1 || value <= base {
                return value.max(min);
            }
            let mut aligned = base + (value - base) / inc * inc;
            while aligned < min {
                aligned = aligned.saturating_add(inc);
            }
            aligned
        };
        w = align(w, base_w, self.increment.0, self.min.0);
        h = align(h, base_h, self.increment.1, self.min.1);
        (w, h)
    }
}

/// WM hints (WM_HINTS), normalised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    /// Client relies on the window manager to get keyboard input
    pub input: bool,
    pub initial_state: IcccmState,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            input: true,
            initial_state: IcccmState::Normal,
        }
    }
}

impl WmHints {
    /// Parse a WM_HINTS payload
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < 8 {
            return None;
        }
        let flags = values[0];
        let mut hints = Self::default();
        if flags & INPUT_HINT != 0 {
            hints.input = values[1] != 0;
        }
        if flags & STATE_HINT != 0 {
            hints.initial_state = IcccmState::from_raw(values[2]).unwrap_or(IcccmState::Normal);
        }
        Some(hints)
    }
}

/// WM_PROTOCOLS the client takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protocols {
    pub delete_window: bool,
    pub take_focus: bool,
}

impl Protocols {
    pub fn from_atoms(atoms: &[u32], delete_window: u32, take_focus: u32) -> Self {
        Self {
            delete_window: atoms.contains(&delete_window),
            take_focus: atoms.contains(&take_focus),
        }
    }
}

/// ICCCM input model, from the input hint and WM_TAKE_FOCUS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusModel {
    /// Input hint, no WM_TAKE_FOCUS: the manager sets focus
    Passive,
    /// Input hint and WM_TAKE_FOCUS: set focus and tell the client
    LocallyActive,
    /// WM_TAKE_FOCUS only: the client sets focus itself
    GloballyActive,
    /// Neither: never focused
    NoInput,
}

impl FocusModel {
    pub fn new(wm_hints: &WmHints, protocols: &Protocols) -> Self {
        match (wm_hints.input, protocols.take_focus) {
            (true, false) => Self::Passive,
            (true, true) => Self::LocallyActive,
            (false, true) => Self::GloballyActive,
            (false, false) => Self::NoInput,
        }
    }
}

/// `_MOTIF_WM_HINTS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MwmHints {
    pub functions: Option<u32>,
    pub decorations: Option<u32>,
}

impl MwmHints {
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < MWM_HINTS_ELEMENTS {
            return None;
        }
        let flags = values[0];
        Some(Self {
            functions: (flags & MWM_HINTS_FUNCTIONS != 0).then_some(values[1]),
            decorations: (flags & MWM_HINTS_DECORATIONS != 0).then_some(values[2]),
        })
    }
}

bitflags! {
    /// Attribute bits shared by `_BLACKBOX_HINTS` and `_BLACKBOX_ATTRIBUTES`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AttribFlags: u32 {
        const SHADED      = 0x01;
        const MAX_HORIZ   = 0x02;
        const MAX_VERT    = 0x04;
        const OMNIPRESENT = 0x08;
        const WORKSPACE   = 0x10;
        const STACK       = 0x20;
        const DECORATION  = 0x40;
    }
}

/// Vendor decoration style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationStyle {
    None = 0,
    Normal = 1,
    Tiny = 2,
    Tool = 3,
}

impl DecorationStyle {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::None,
            2 => Self::Tiny,
            3 => Self::Tool,
            _ => Self::Normal,
        }
    }
}

/// Client-provided vendor hints (`_BLACKBOX_HINTS`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VendorHints {
    /// Which of the other fields are meaningful
    pub flags: AttribFlags,
    pub attrib: AttribFlags,
    pub workspace: u32,
    pub stack: u32,
    pub decoration: DecorationStyle,
}

impl VendorHints {
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < VENDOR_HINTS_ELEMENTS {
            return None;
        }
        Some(Self {
            flags: AttribFlags::from_bits_truncate(values[0]),
            attrib: AttribFlags::from_bits_truncate(values[1]),
            workspace: values[2],
            stack: values[3],
            decoration: DecorationStyle::from_raw(values[4]),
        })
    }

    /// Decoration style, if the client asked for one
    pub fn decoration(&self) -> Option<DecorationStyle> {
        self.flags
            .contains(AttribFlags::DECORATION)
            .then_some(self.decoration)
    }
}

/// Manager-private persisted state (`_BLACKBOX_ATTRIBUTES`)
///
/// Written on every state transition; read back at adoption so a restarted
/// manager reconstructs shade, maximize, stick and workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VendorAttributes {
    pub flags: AttribFlags,
    pub attrib: AttribFlags,
    pub workspace: u32,
    pub stack: u32,
    /// Pre-maximize frame geometry; all zero when not maximized
    pub premax: Geometry,
}

impl VendorAttributes {
    pub fn from_raw(values: &[u32]) -> Option<Self> {
        if values.len() < VENDOR_ATTRIBUTES_ELEMENTS {
            return None;
        }
        Some(Self {
            flags: AttribFlags::from_bits_truncate(values[0]),
            attrib: AttribFlags::from_bits_truncate(values[1]),
            workspace: values[2],
            stack: values[3],
            premax: Geometry::new(values[4] as i32, values[5] as i32, values[6], values[7]),
        })
    }

    pub fn to_raw(&self) -> [u32; VENDOR_ATTRIBUTES_ELEMENTS] {
        [
            self.flags.bits(),
            self.attrib.bits(),
            self.workspace,
            self.stack,
            self.premax.x as u32,
            self.premax.y as u32,
            self.premax.width,
            self.premax.height,
        ]
    }

    /// Attribute bit that is both flagged as meaningful and set
    pub fn has(&self, attrib: AttribFlags) -> bool {
        self.flags.contains(attrib) && self.attrib.contains(attrib)
    }

    /// Workspace, if one was recorded
    pub fn workspace(&self) -> Option<u32> {
        self.flags
            .contains(AttribFlags::WORKSPACE)
            .then_some(self.workspace)
    }

    /// Pre-maximize geometry, if one was recorded
    pub fn premax(&self) -> Option<Geometry> {
        (self.premax.width > 0 && self.premax.height > 0).then_some(self.premax)
    }
}

/// Everything the manager caches about a client's declared intentions
#[derive(Debug, Clone, Default)]
pub struct ClientHints {
    pub size: SizeHints,
    pub wm: WmHints,
    pub protocols: Protocols,
    pub mwm: Option<MwmHints>,
    pub vendor: Option<VendorHints>,
    pub transient_for: Option<Window>,
    /// `_NET_WM_WINDOW_TYPE_DOCK`
    pub dock: bool,
    pub title: String,
}

impl ClientHints {
    pub fn focus_model(&self) -> FocusModel {
        FocusModel::new(&self.wm, &self.protocols)
    }
}

//! Client Flags
//!
//! Decoration-capability and function bit sets, and their derivation from
//! MWM hints, vendor hints, size hints and transience.

use bitflags::bitflags;

use super::hints::{
    ClientHints, DecorationStyle, MWM_DECOR_ALL, MWM_DECOR_BORDER, MWM_DECOR_HANDLE,
    MWM_DECOR_ICONIFY, MWM_DECOR_MAXIMIZE, MWM_DECOR_MENU, MWM_DECOR_TITLE, MWM_FUNC_ALL,
    MWM_FUNC_CLOSE, MWM_FUNC_ICONIFY, MWM_FUNC_MAXIMIZE, MWM_FUNC_MOVE, MWM_FUNC_RESIZE,
};

bitflags! {
    /// Which decoration parts a window shows
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Decorations: u32 {
        const TITLEBAR = 1 << 0;
        const HANDLE   = 1 << 1;
        const BORDER   = 1 << 2;
        const ICONIFY  = 1 << 3;
        const MAXIMIZE = 1 << 4;
        const CLOSE    = 1 << 5;
        const STICKY   = 1 << 6;
        const MENU     = 1 << 7;
        /// Tab strip; only set while the window is part of a tab group
        const TAB      = 1 << 8;
    }
}

impl Default for Decorations {
    fn default() -> Self {
        Self::all() - Self::TAB
    }
}

bitflags! {
    /// What the user may do with a window
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Functions: u32 {
        const RESIZE   = 1 << 0;
        const MOVE     = 1 << 1;
        const ICONIFY  = 1 << 2;
        const MAXIMIZE = 1 << 3;
        const CLOSE    = 1 << 4;
    }
}

impl Default for Functions {
    fn default() -> Self {
        Self::all()
    }
}

const MWM_DECORATION_MAP: [(u32, Decorations); 6] = [
    (MWM_DECOR_BORDER, Decorations::BORDER),
    (MWM_DECOR_HANDLE, Decorations::HANDLE),
    (MWM_DECOR_TITLE, Decorations::TITLEBAR),
    (MWM_DECOR_MENU, Decorations::MENU),
    (MWM_DECOR_ICONIFY, Decorations::ICONIFY),
    (MWM_DECOR_MAXIMIZE, Decorations::MAXIMIZE),
];

const MWM_FUNCTION_MAP: [(u32, Functions); 5] = [
    (MWM_FUNC_RESIZE, Functions::RESIZE),
    (MWM_FUNC_MOVE, Functions::MOVE),
    (MWM_FUNC_ICONIFY, Functions::ICONIFY),
    (MWM_FUNC_MAXIMIZE, Functions::MAXIMIZE),
    (MWM_FUNC_CLOSE, Functions::CLOSE),
];

/// Motif semantics: with the ALL bit set the listed bits are removed,
/// otherwise only the listed bits are kept.
fn from_mwm<F: bitflags::Flags + Copy>(value: u32, all_bit: u32, map: &[(u32, F)]) -> F {
    let listed = map
        .iter()
        .filter(|(bit, _)| value & bit != 0)
        .fold(F::empty(), |acc, (_, flag)| acc.union(*flag));
    if value & all_bit != 0 {
        F::all().difference(listed)
    } else {
        listed
    }
}

/// Capabilities of a window, derived once at adoption and again whenever
/// the hints they depend on change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub decorations: Decorations,
    pub functions: Functions,
}

impl Capabilities {
    pub fn derive(hints: &ClientHints) -> Self {
        let mut decorations = Decorations::default();
        let mut functions = Functions::default();

        if let Some(mwm) = hints.mwm {
            if let Some(value) = mwm.decorations {
                decorations &= from_mwm(value, MWM_DECOR_ALL, &MWM_DECORATION_MAP)
                    | Decorations::CLOSE
                    | Decorations::STICKY;
                if !decorations.contains(Decorations::TITLEBAR) {
                    decorations -= Decorations::CLOSE | Decorations::STICKY;
                }
            }
            if let Some(value) = mwm.functions {
                functions = from_mwm(value, MWM_FUNC_ALL, &MWM_FUNCTION_MAP);
            }
        }

        match hints.vendor.and_then(|vendor| vendor.decoration()) {
            Some(DecorationStyle::None) => decorations = Decorations::empty(),
            Some(DecorationStyle::Tiny) => {
                decorations &= Decorations::TITLEBAR | Decorations::ICONIFY | Decorations::MENU
            }
            Some(DecorationStyle::Tool) => {
                decorations &= Decorations::TITLEBAR | Decorations::MENU;
                functions -= Functions::ICONIFY;
            }
            Some(DecorationStyle::Normal) | None => {}
        }

        if hints.size.is_fixed() {
            decorations -= Decorations::HANDLE | Decorations::MAXIMIZE;
            functions -= Functions::RESIZE | Functions::MAXIMIZE;
        }

        if hints.transient_for.is_some() {
            decorations -= Decorations::HANDLE | Decorations::MAXIMIZE;
            functions -= Functions::RESIZE | Functions::MAXIMIZE;
        }

        // buttons follow the functions they trigger
        if !functions.contains(Functions::ICONIFY) {
            decorations -= Decorations::ICONIFY;
        }
        if !functions.contains(Functions::MAXIMIZE) {
            decorations -= Decorations::MAXIMIZE;
        }
        if !functions.contains(Functions::CLOSE) {
            decorations -= Decorations::CLOSE;
        }
        if !functions.contains(Functions::RESIZE) {
            decorations -= Decorations::HANDLE;
        }

        Self {
            decorations,
            functions,
        }
    }
}

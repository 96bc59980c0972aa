//! Screen Module
//!
//! Per-screen metadata (root, visual, colormap, depth, dimensions), the heads
//! that make up the screen, and the usable area left once reserved strips
//! are taken out.

use x11rb::protocol::xproto::{Colormap, Visualid, Window};

use crate::config::ReservedMargins;
use crate::shared::{Geometry, Strut};

/// ScreenInfo - one per X screen
#[derive(Debug, Clone)]
pub struct ScreenInfo {
    /// Screen number
    pub number: usize,

    /// Root window
    pub root: Window,

    /// Root visual
    pub visual: Visualid,

    /// Default colormap (may be reinstalled)
    pub colormap: Colormap,

    /// Root depth
    pub depth: u8,

    /// Screen width (all heads combined)
    pub width: u32,

    /// Screen height (all heads combined)
    pub height: u32,

    /// Physical outputs; a single head covering the screen without RandR
    pub heads: Vec<Geometry>,
}

impl ScreenInfo {
    pub fn bounds(&self) -> Geometry {
        Geometry::new(0, 0, self.width, self.height)
    }

    /// Head containing a point, falling back to the first head
    pub fn head_at(&self, x: i32, y: i32) -> Geometry {
        self.heads
            .iter()
            .copied()
            .find(|head| head.contains_point(x, y))
            .or_else(|| self.heads.first().copied())
            .unwrap_or_else(|| self.bounds())
    }

    /// Head a window belongs to: the one containing its center
    pub fn head_for(&self, geometry: &Geometry) -> Geometry {
        let (x, y) = geometry.center();
        self.head_at(x, y)
    }

    /// Usable part of `head`: the screen-wide reserved strips and margins
    /// removed, clipped to the head.
    ///
    /// Struts are expressed relative to the screen edges, so they only
    /// shrink a head that touches the corresponding edge.
    pub fn usable_area(&self, head: Geometry, strut: Strut, margins: &ReservedMargins) -> Geometry {
        let reserved = strut.union(Strut {
            left: margins.left,
            right: margins.right,
            top: margins.top,
            bottom: margins.bottom,
        });
        let screen_area = reserved.shrink(self.bounds());
        head.intersection(&screen_area).unwrap_or(head)
    }
}

//! Geometry primitives
//!
//! Rectangles, frame extents and reserved screen strips.

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Area shared with `other`, if any
    pub fn intersection(&self, other: &Geometry) -> Option<Geometry> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Geometry::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }
}

/// Space taken by decorations around a client, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extents {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Extents {
    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

/// Reserved strips along the screen edges (`_NET_WM_STRUT` order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Strut {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Strut {
    /// Edge-wise maximum of two struts
    pub fn union(self, other: Strut) -> Strut {
        Strut {
            left: self.left.max(other.left),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Each edge limited to the screen dimension it runs across
    pub fn clamped(self, width: u32, height: u32) -> Strut {
        Strut {
            left: self.left.min(width),
            right: self.right.min(width),
            top: self.top.min(height),
            bottom: self.bottom.min(height),
        }
    }

    /// Shrink `area` by this strut; never produces an empty rectangle
    /// and never moves its origin past the far edge
    pub fn shrink(&self, area: Geometry) -> Geometry {
        let left = self.left.min(area.width.saturating_sub(1));
        let top = self.top.min(area.height.saturating_sub(1));
        let width = area.width.saturating_sub(left.saturating_add(self.right)).max(1);
        let height = area.height.saturating_sub(top.saturating_add(self.bottom)).max(1);
        Geometry::new(area.x + left as i32, area.y + top as i32, width, height)
    }
}

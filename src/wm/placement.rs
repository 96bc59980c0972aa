//! Placement Module
//!
//! Initial position for windows that did not ask for one. Positions are
//! frame positions; sizes passed in are outer frame sizes (border included).

use tracing::debug;

use crate::config::PlacementPolicy;
use crate::shared::Geometry;

/// Offset between successive cascaded windows
const CASCADE_STEP: i32 = 32;

/// Placement state carried between windows
#[derive(Debug, Default)]
pub struct Placement {
    /// Offset of the next cascaded window from the area origin
    cascade: i32,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame position for an outer size of `size` inside `area`
    pub fn place(&mut self, policy: PlacementPolicy, area: &Geometry, size: (u32, u32)) -> (i32, i32) {
        let position = match policy {
            PlacementPolicy::Center => center(area, size),
            PlacementPolicy::Cascade => self.cascade(area, size),
        };
        debug!("Placing {:?} window of {:?} at {:?}", policy, size, position);
        position
    }

    /// Top-left diagonal cascade; starts over once a window would not fit
    fn cascade(&mut self, area: &Geometry, size: (u32, u32)) -> (i32, i32) {
        let fits = |offset: i32| {
            offset + size.0 as i32 <= area.width as i32 && offset + size.1 as i32 <= area.height as i32
        };
        if self.cascade > 0 && !fits(self.cascade) {
            self.cascade = 0;
        }
        let offset = self.cascade;
        self.cascade += CASCADE_STEP;
        (area.x + offset, area.y + offset)
    }
}

/// Centre of `area`; oversized windows are pinned to its top-left corner
pub fn center(area: &Geometry, size: (u32, u32)) -> (i32, i32) {
    (
        area.x + (area.width as i32 - size.0 as i32).max(0) / 2,
        area.y + (area.height as i32 - size.1 as i32).max(0) / 2,
    )
}

/// Centre over `owner`, kept inside `area`
pub fn center_over(owner: &Geometry, size: (u32, u32), area: &Geometry) -> (i32, i32) {
    let x = owner.x + (owner.width as i32 - size.0 as i32) / 2;
    let y = owner.y + (owner.height as i32 - size.1 as i32) / 2;
    (
        x.min(area.right() - size.0 as i32).max(area.x),
        y.min(area.bottom() - size.1 as i32).max(area.y),
    )
}

//! MoveResize Module
//!
//! Interactive move (titlebar drag) and resize (handle or grip drag).
//! Only one drag runs at a time; the pointer is grabbed on the frame for
//! its whole duration. A resize keeps the edges opposite the dragged ones
//! in place and honours the client's size hints.

use anyhow::Result;
use tracing::debug;
use x11rb::protocol::xproto::Window;

use crate::shared::Geometry;
use crate::wm::client::{Interaction, MaximizeMode, WindowState};
use crate::wm::client_flags::Functions;
use crate::wm::hints::SizeHints;
use crate::wm::server::{CursorShape, ResizeDirection, XServer};
use crate::wm::WindowManager;

/// Drag operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(ResizeDirection),
}

/// Drag in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drag {
    /// Client being dragged
    pub window: Window,
    pub kind: DragKind,

    /// Pointer position at the start (root coordinates)
    start_x: i32,
    start_y: i32,

    /// Frame geometry and client size at the start
    start_frame: Geometry,
    start_client: (u32, u32),
}

/// Horizontal and vertical edge moved by a resize direction:
/// -1 for left/top, 1 for right/bottom, 0 for neither
fn edges(direction: ResizeDirection) -> (i32, i32) {
    match direction {
        ResizeDirection::TopLeft => (-1, -1),
        ResizeDirection::Top => (0, -1),
        ResizeDirection::TopRight => (1, -1),
        ResizeDirection::Right => (1, 0),
        ResizeDirection::BottomRight => (1, 1),
        ResizeDirection::Bottom => (0, 1),
        ResizeDirection::BottomLeft => (-1, 1),
        ResizeDirection::Left => (-1, 0),
    }
}

/// Frame position and client size after dragging `direction` by
/// `(dx, dy)` from the start geometry
pub fn resize_geometry(
    direction: ResizeDirection,
    start_frame: &Geometry,
    start_client: (u32, u32),
    dx: i32,
    dy: i32,
    hints: &SizeHints,
) -> (i32, i32, (u32, u32)) {
    let (horizontal, vertical) = edges(direction);
    let width = (start_client.0 as i32 + horizontal * dx).max(1) as u32;
    let height = (start_client.1 as i32 + vertical * dy).max(1) as u32;
    let (width, height) = hints.constrain(width, height);

    let x = if horizontal < 0 {
        start_frame.x + start_client.0 as i32 - width as i32
    } else {
        start_frame.x
    };
    let y = if vertical < 0 {
        start_frame.y + start_client.1 as i32 - height as i32
    } else {
        start_frame.y
    };
    (x, y, (width, height))
}

impl<S: XServer> WindowManager<S> {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start moving `window` with the pointer at `(x, y)`
    pub fn start_move(&mut self, window: Window, x: i32, y: i32) -> Result<bool> {
        self.start_drag(window, DragKind::Move, x, y)
    }

    /// Start resizing `window` from the `direction` edge or corner
    pub fn start_resize(&mut self, window: Window, direction: ResizeDirection, x: i32, y: i32) -> Result<bool> {
        self.start_drag(window, DragKind::Resize(direction), x, y)
    }

    fn start_drag(&mut self, window: Window, kind: DragKind, x: i32, y: i32) -> Result<bool> {
        if self.drag.is_some() {
            return Ok(false);
        }
        let Some(w) = self.registry.get(window) else {
            return Ok(false);
        };
        if w.state != WindowState::Normal {
            return Ok(false);
        }
        let (function, cursor) = match kind {
            DragKind::Move => (Functions::MOVE, CursorShape::Move),
            DragKind::Resize(direction) => (Functions::RESIZE, CursorShape::Resize(direction)),
        };
        if !w.capabilities.functions.contains(function) {
            return Ok(false);
        }
        if matches!(kind, DragKind::Resize(_)) && w.shaded {
            return Ok(false);
        }
        if !self.server.grab_pointer(w.windows.frame, cursor)? {
            debug!("Pointer grab for 0x{:x} refused", window);
            return Ok(false);
        }

        debug!("Starting {:?} of 0x{:x}", kind, window);
        self.drag = Some(Drag {
            window,
            kind,
            start_x: x,
            start_y: y,
            start_frame: w.frame,
            start_client: w.client_size,
        });
        if let Some(w) = self.registry.get_mut(window) {
            w.interaction = match kind {
                DragKind::Move => Interaction::Moving,
                DragKind::Resize(_) => Interaction::Resizing,
            };
        }
        Ok(true)
    }

    /// Pointer moved to `(x, y)` during a drag
    pub fn drag_motion(&mut self, x: i32, y: i32) -> Result<bool> {
        let Some(drag) = self.drag else {
            return Ok(false);
        };
        let Some(w) = self.registry.get(drag.window) else {
            return Ok(false);
        };
        let (dx, dy) = (x - drag.start_x, y - drag.start_y);
        let (frame_x, frame_y, size) = match drag.kind {
            DragKind::Move => (
                drag.start_frame.x + dx,
                drag.start_frame.y + dy,
                w.client_size,
            ),
            DragKind::Resize(direction) => resize_geometry(
                direction,
                &drag.start_frame,
                drag.start_client,
                dx,
                dy,
                &w.hints.size,
            ),
        };
        if (frame_x, frame_y, size) == (w.frame.x, w.frame.y, w.client_size) {
            return Ok(false);
        }
        self.apply_geometry(drag.window, frame_x, frame_y, size)?;
        self.sync_group_geometry(drag.window)?;
        Ok(true)
    }

    /// Button released: keep the new geometry
    pub fn finish_drag(&mut self) -> Result<bool> {
        let Some(drag) = self.drag.take() else {
            return Ok(false);
        };
        self.server.ungrab_pointer()?;
        if let Some(w) = self.registry.get_mut(drag.window) {
            w.interaction = Interaction::Idle;
            // a dragged window is no longer maximized
            if w.frame != drag.start_frame && w.maximized != MaximizeMode::None {
                w.maximized = MaximizeMode::None;
                w.premax = None;
            }
        }
        debug!("Finished {:?} of 0x{:x}", drag.kind, drag.window);
        self.persist(drag.window)?;
        Ok(true)
    }

    /// Abort the drag in progress; with `window`, only if it drags that
    /// window. The geometry reached so far is kept.
    pub fn cancel_drag(&mut self, window: Option<Window>) -> Result<bool> {
        match self.drag {
            Some(drag) if window.is_none_or(|w| w == drag.window) => {}
            _ => return Ok(false),
        }
        debug!("Cancelling drag");
        self.finish_drag()
    }
}

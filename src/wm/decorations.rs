//! Window decorations
//!
//! Frame, plate and decoration sub-window construction and layout, and the
//! rendering interface that decides what each part looks like.
//!
//! Frame layout, top to bottom: titlebar, plate (holding the client),
//! handle. Buttons sit on the titlebar, grips on both ends of the handle.
//! The frame's X border surrounds everything.

use anyhow::Result;
use x11rb::protocol::xproto::{Pixmap, Window};

use crate::config::{DecorationConfig, WindowColors};
use crate::shared::{Extents, Geometry};
use crate::wm::actions::WindowAction;
use crate::wm::client::MaximizeMode;
use crate::wm::client_flags::Decorations;
use crate::wm::server::{ResizeDirection, WindowRole, XServer};

const BUTTON_MARGIN: u32 = 2;

/// Titlebar buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Stick,
    Iconify,
    Maximize,
    Close,
}

impl ButtonKind {
    /// Right-aligned buttons, left to right
    const RIGHT: [ButtonKind; 3] = [ButtonKind::Iconify, ButtonKind::Maximize, ButtonKind::Close];

    fn decoration(self) -> Decorations {
        match self {
            Self::Stick => Decorations::STICKY,
            Self::Iconify => Decorations::ICONIFY,
            Self::Maximize => Decorations::MAXIMIZE,
            Self::Close => Decorations::CLOSE,
        }
    }

    /// Action bound to the button when it is built
    pub fn action(self) -> WindowAction {
        match self {
            Self::Stick => WindowAction::Stick,
            Self::Iconify => WindowAction::Iconify,
            Self::Maximize => WindowAction::Maximize(MaximizeMode::Full),
            Self::Close => WindowAction::Close,
        }
    }
}

/// Which part of a managed window an X window is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Client,
    Frame,
    Plate,
    Titlebar,
    Handle,
    Grip(ResizeDirection),
    Button(ButtonKind, WindowAction),
    Tab,
}

/// Background for a decoration part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Solid(u32),
    Pixmap(Pixmap),
    ParentRelative,
}

/// Rendering collaborator: picks the background of each decorated part.
///
/// Called when decorations are built, when focus changes and when the
/// configuration is reloaded.
pub trait DecorationRenderer {
    fn background(&self, part: Part, decorations: Decorations, focused: bool, pressed: bool) -> Background;
}

/// Flat colours from the `[colors]` configuration section
#[derive(Debug, Clone)]
pub struct SolidRenderer {
    colors: WindowColors,
}

impl SolidRenderer {
    pub fn new(colors: WindowColors) -> Self {
        Self { colors }
    }
}

impl DecorationRenderer for SolidRenderer {
    fn background(&self, part: Part, _decorations: Decorations, focused: bool, pressed: bool) -> Background {
        let c = &self.colors;
        let pick = |on: u32, off: u32| Background::Solid(if focused { on } else { off });
        match part {
            Part::Titlebar => pick(c.title_focused, c.title_unfocused),
            Part::Handle | Part::Grip(_) => pick(c.handle_focused, c.handle_unfocused),
            Part::Tab => pick(c.tab_focused, c.tab_unfocused),
            Part::Button(..) if pressed => Background::Solid(c.button_pressed),
            Part::Button(..) => Background::Solid(c.button),
            Part::Frame => Background::Solid(c.border),
            Part::Client | Part::Plate => Background::ParentRelative,
        }
    }
}

/// Decoration sizes for one capability set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// X border of the frame
    pub border: u32,
    pub title_height: u32,
    pub handle_height: u32,
    pub button_size: u32,
    pub grip_width: u32,
}

impl FrameLayout {
    pub fn new(decorations: Decorations, config: &DecorationConfig) -> Self {
        let title_height = if decorations.contains(Decorations::TITLEBAR) {
            config.titlebar_height
        } else {
            0
        };
        Self {
            border: if decorations.contains(Decorations::BORDER) {
                config.border_width
            } else {
                0
            },
            title_height,
            handle_height: if decorations.contains(Decorations::HANDLE) {
                config.handle_height
            } else {
                0
            },
            button_size: config
                .button_size
                .min(title_height.saturating_sub(2 * BUTTON_MARGIN)),
            grip_width: config.grip_width,
        }
    }

    pub fn extents(&self) -> Extents {
        Extents {
            left: self.border,
            right: self.border,
            top: self.border + self.title_height,
            bottom: self.border + self.handle_height,
        }
    }

    /// Inner frame size for a client size
    pub fn frame_size(&self, client_width: u32, client_height: u32, shaded: bool) -> (u32, u32) {
        if shaded && self.title_height > 0 {
            return (client_width, self.title_height);
        }
        (
            client_width,
            self.title_height
                .saturating_add(client_height)
                .saturating_add(self.handle_height),
        )
    }

    /// Client size fitting an inner frame size (unshaded)
    pub fn client_size(&self, frame_width: u32, frame_height: u32) -> (u32, u32) {
        (
            frame_width.max(1),
            frame_height
                .saturating_sub(self.title_height + self.handle_height)
                .max(1),
        )
    }

    /// Plate position inside the frame
    pub fn plate(&self, client_width: u32, client_height: u32) -> Geometry {
        Geometry::new(0, self.title_height as i32, client_width, client_height)
    }

    pub fn titlebar(&self, frame_width: u32) -> Geometry {
        Geometry::new(0, 0, frame_width, self.title_height.max(1))
    }

    pub fn handle(&self, frame_width: u32, client_height: u32) -> Geometry {
        Geometry::new(
            0,
            (self.title_height + client_height) as i32,
            frame_width,
            self.handle_height.max(1),
        )
    }

    pub fn grip(&self, direction: ResizeDirection, frame_width: u32, client_height: u32) -> Geometry {
        let handle = self.handle(frame_width, client_height);
        let width = self.grip_width.min(frame_width / 2).max(1);
        let x = match direction {
            ResizeDirection::BottomRight => frame_width.saturating_sub(width) as i32,
            _ => 0,
        };
        Geometry::new(x, handle.y, width, handle.height)
    }

    /// Button positions on the titlebar, in `kinds` order
    pub fn buttons(&self, frame_width: u32, kinds: &[ButtonKind]) -> Vec<Geometry> {
        let size = self.button_size.max(1);
        let step = (size + BUTTON_MARGIN) as i32;
        let y = (self.title_height.saturating_sub(size) / 2) as i32;
        let right: Vec<ButtonKind> = ButtonKind::RIGHT
            .into_iter()
            .filter(|kind| kinds.contains(kind))
            .collect();
        let right_start = frame_width as i32 - right.len() as i32 * step;

        kinds
            .iter()
            .map(|kind| {
                let x = match right.iter().position(|k| k == kind) {
                    Some(index) => right_start + index as i32 * step,
                    None => BUTTON_MARGIN as i32,
                };
                Geometry::new(x, y, size, size)
            })
            .collect()
    }

    /// Tab above the frame, `index` slots from its left edge
    pub fn tab(&self, frame: &Geometry, index: usize, tab_width: u32) -> Geometry {
        let height = self.title_height.max(1);
        Geometry::new(
            frame.x + (index as u32 * tab_width) as i32,
            frame.y - height as i32,
            tab_width,
            height,
        )
    }
}

/// A titlebar button and the action chosen for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Button {
    pub window: Window,
    pub kind: ButtonKind,
    pub action: WindowAction,
}

/// Server-side windows owned by one managed window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWindows {
    pub frame: Window,
    pub plate: Window,
    pub titlebar: Option<Window>,
    pub handle: Option<Window>,
    pub grips: Vec<(Window, ResizeDirection)>,
    pub buttons: Vec<Button>,
    pub tab: Option<Window>,
}

impl FrameWindows {
    /// Frame and plate without decorations
    pub fn bare(frame: Window, plate: Window) -> Self {
        Self {
            frame,
            plate,
            titlebar: None,
            handle: None,
            grips: Vec::new(),
            buttons: Vec::new(),
            tab: None,
        }
    }

    /// Every owned window with its part
    pub fn parts(&self) -> Vec<(Window, Part)> {
        let mut parts = vec![(self.frame, Part::Frame), (self.plate, Part::Plate)];
        parts.extend(self.decoration_parts());
        parts.extend(self.tab.map(|tab| (tab, Part::Tab)));
        parts
    }

    /// Titlebar, handle, grips and buttons
    pub fn decoration_parts(&self) -> Vec<(Window, Part)> {
        let mut parts = Vec::new();
        parts.extend(self.titlebar.map(|w| (w, Part::Titlebar)));
        parts.extend(self.handle.map(|w| (w, Part::Handle)));
        parts.extend(self.grips.iter().map(|(w, d)| (*w, Part::Grip(*d))));
        parts.extend(
            self.buttons
                .iter()
                .map(|b| (b.window, Part::Button(b.kind, b.action))),
        );
        parts
    }
}

/// Create the frame (unmapped) and the plate inside it
pub fn create_frame<S: XServer>(
    server: &S,
    root: Window,
    frame: Geometry,
    layout: &FrameLayout,
    client_size: (u32, u32),
) -> Result<FrameWindows> {
    let frame_window = server.create_window(root, frame, WindowRole::Frame)?;
    server.set_border_width(frame_window, layout.border)?;
    let plate = server.create_window(
        frame_window,
        layout.plate(client_size.0, client_size.1),
        WindowRole::Plate,
    )?;
    server.map_window(plate)?;
    Ok(FrameWindows::bare(frame_window, plate))
}

/// Create and map the sub-windows the capability set asks for
pub fn build_decorations<S: XServer>(
    server: &S,
    windows: &mut FrameWindows,
    decorations: Decorations,
    layout: &FrameLayout,
    client_height: u32,
    frame_width: u32,
) -> Result<()> {
    let frame = windows.frame;
    let create = |geometry: Geometry| -> Result<Window> {
        let window = server.create_window(frame, geometry, WindowRole::Decoration)?;
        server.map_window(window)?;
        Ok(window)
    };

    if decorations.contains(Decorations::TITLEBAR) {
        windows.titlebar = Some(create(layout.titlebar(frame_width))?);

        let kinds: Vec<ButtonKind> = [
            ButtonKind::Stick,
            ButtonKind::Iconify,
            ButtonKind::Maximize,
            ButtonKind::Close,
        ]
        .into_iter()
        .filter(|kind| decorations.contains(kind.decoration()))
        .collect();
        let positions = layout.buttons(frame_width, &kinds);
        for (kind, geometry) in kinds.into_iter().zip(positions) {
            windows.buttons.push(Button {
                window: create(geometry)?,
                kind,
                action: kind.action(),
            });
        }
    }

    if decorations.contains(Decorations::HANDLE) {
        windows.handle = Some(create(layout.handle(frame_width, client_height))?);
        for direction in [ResizeDirection::BottomLeft, ResizeDirection::BottomRight] {
            let grip = create(layout.grip(direction, frame_width, client_height))?;
            windows.grips.push((grip, direction));
        }
    }
    Ok(())
}

/// Destroy every decoration sub-window; returns the destroyed ids
pub fn destroy_decorations<S: XServer>(server: &S, windows: &mut FrameWindows) -> Result<Vec<Window>> {
    let destroyed: Vec<Window> = windows
        .decoration_parts()
        .into_iter()
        .map(|(window, _)| window)
        .collect();
    for window in &destroyed {
        server.destroy_window(*window)?;
    }
    windows.titlebar = None;
    windows.handle = None;
    windows.grips.clear();
    windows.buttons.clear();
    Ok(destroyed)
}

/// Move every sub-window to its place for the current frame size
pub fn place_decorations<S: XServer>(
    server: &S,
    windows: &FrameWindows,
    layout: &FrameLayout,
    client_size: (u32, u32),
) -> Result<()> {
    let (frame_width, client_height) = (client_size.0, client_size.1);
    server.configure_window(windows.plate, layout.plate(client_size.0, client_size.1))?;
    if let Some(titlebar) = windows.titlebar {
        server.configure_window(titlebar, layout.titlebar(frame_width))?;
    }
    let kinds: Vec<ButtonKind> = windows.buttons.iter().map(|b| b.kind).collect();
    for (button, geometry) in windows
        .buttons
        .iter()
        .zip(layout.buttons(frame_width, &kinds))
    {
        server.configure_window(button.window, geometry)?;
    }
    if let Some(handle) = windows.handle {
        server.configure_window(handle, layout.handle(frame_width, client_height))?;
    }
    for (grip, direction) in &windows.grips {
        server.configure_window(*grip, layout.grip(*direction, frame_width, client_height))?;
    }
    Ok(())
}

/// Ask the renderer for every part's background and apply it
pub fn paint<S: XServer>(
    server: &S,
    renderer: &dyn DecorationRenderer,
    windows: &FrameWindows,
    decorations: Decorations,
    focused: bool,
) -> Result<()> {
    for (window, part) in windows.parts() {
        if part == Part::Plate {
            continue;
        }
        server.set_background(window, renderer.background(part, decorations, focused, false))?;
    }
    Ok(())
}

//! Window Manager Module
//!
//! The [`WindowManager`] context: registry of managed windows, timer queue,
//! focus, workspaces and the decoration renderer, all driven through one
//! [`XServer`]. Components reach each other only through this context.

pub mod actions;
pub mod client;
pub mod client_flags;
pub mod decorations;
pub mod display;
pub mod events;
pub mod ewmh;
pub mod focus;
pub mod hints;
pub mod lifecycle;
pub mod moveresize;
pub mod placement;
pub mod screen;
pub mod server;
pub mod tabs;
pub mod timer;
pub mod transients;
pub mod workspace;

use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::{debug, info};
use x11rb::protocol::xproto::Window;

use crate::config::Config;
use crate::shared::{Geometry, Strut};
use crate::wm::client::{Registry, WindowState};
use crate::wm::decorations::{DecorationRenderer, SolidRenderer};
use crate::wm::focus::FocusState;
use crate::wm::moveresize::Drag;
use crate::wm::placement::Placement;
use crate::wm::screen::ScreenInfo;
use crate::wm::server::{RootProperty, XServer};
use crate::wm::timer::TimerQueue;
use crate::wm::workspace::Workspaces;

/// What an armed timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Raise the window if it still has focus
    AutoRaise(Window),
    /// End of the double-click window on a titlebar
    DoubleClick(Window),
}

pub struct WindowManager<S: XServer> {
    pub server: S,
    pub config: Config,

    /// Managed screen
    screen: ScreenInfo,

    /// Every managed window, keyed by client id
    pub registry: Registry,

    pub timers: TimerQueue<TimerAction>,
    pub focus: FocusState,
    pub workspaces: Workspaces,

    /// Unframed dock windows and the strips they reserve
    docks: HashMap<Window, Strut>,

    /// Interactive move/resize in progress
    drag: Option<Drag>,

    placement: Placement,
    renderer: Box<dyn DecorationRenderer>,
}

impl<S: XServer> WindowManager<S> {
    /// Create the manager for the first screen of `server`
    pub fn new(server: S, config: Config) -> Result<Self> {
        let screen = server
            .screens()
            .first()
            .cloned()
            .context("Display has no screens")?;
        info!(
            "Managing screen {} (root 0x{:x}, {}x{})",
            screen.number, screen.root, screen.width, screen.height
        );

        let workspaces = Workspaces::new(config.workspaces.count);
        let renderer = Box::new(SolidRenderer::new(config.colors.clone()));
        let wm = Self {
            server,
            config,
            screen,
            registry: Registry::new(),
            timers: TimerQueue::new(),
            focus: FocusState::new(),
            workspaces,
            docks: HashMap::new(),
            drag: None,
            placement: Placement::new(),
            renderer,
        };

        wm.server
            .publish(RootProperty::DesktopCount(wm.workspaces.count))?;
        wm.server
            .publish(RootProperty::CurrentDesktop(wm.workspaces.current))?;
        wm.server.publish(RootProperty::ActiveWindow(None))?;
        wm.publish_client_list()?;
        wm.publish_workarea()?;
        Ok(wm)
    }

    pub fn screen(&self) -> &ScreenInfo {
        &self.screen
    }

    pub fn root(&self) -> Window {
        self.screen.root
    }

    /// Adopt the top-level windows that existed before we started.
    ///
    /// Viewable windows and windows a previous manager left iconic are
    /// adopted with their persisted state restored.
    pub fn scan_existing_windows(&mut self) -> Result<()> {
        self.server.set_starting(true);
        let result = self.scan_top_level();
        self.server.set_starting(false);
        result?;
        self.server.flush()
    }

    fn scan_top_level(&mut self) -> Result<()> {
        let windows = self.server.top_level_windows()?;
        info!("Scanning {} existing top-level windows", windows.len());
        for window in windows {
            let Some(info) = self.server.fetch_client(window)? else {
                continue;
            };
            let iconic = info.wm_state == Some(hints::IcccmState::Iconic);
            if info.override_redirect || !(info.viewable || iconic) {
                continue;
            }
            if self.adopt(window)? {
                debug!("Adopted existing window 0x{:x}", window);
            }
        }
        Ok(())
    }

    /// Give every client back to the root, keeping its persisted state
    pub fn shutdown(&mut self) -> Result<()> {
        info!("Releasing {} managed windows", self.registry.len());
        let clients = self.registry.clients().to_vec();
        for client in clients {
            self.release(client)?;
        }
        self.server.focus_root()?;
        self.server.publish(RootProperty::ActiveWindow(None))?;
        self.server.flush()
    }

    /// Apply a reloaded configuration: renderer colours and decorations
    pub fn reload(&mut self, config: Config) -> Result<()> {
        info!("Reloading configuration");
        self.renderer = Box::new(SolidRenderer::new(config.colors.clone()));
        if config.workspaces.count != self.workspaces.count {
            self.workspaces.resize(config.workspaces.count);
            self.server
                .publish(RootProperty::DesktopCount(self.workspaces.count))?;
        }
        self.config = config;
        let clients = self.registry.clients().to_vec();
        for client in clients {
            self.redecorate(client)?;
        }
        self.server.flush()
    }

    /// Union of every dock's reserved strip
    pub fn strut(&self) -> Strut {
        self.docks
            .values()
            .fold(Strut::default(), |acc, strut| acc.union(*strut))
    }

    /// Usable area of the head holding `geometry`
    pub fn usable_area(&self, geometry: &Geometry) -> Geometry {
        let head = self.screen.head_for(geometry);
        self.screen
            .usable_area(head, self.strut(), &self.config.screen)
    }

    fn publish_client_list(&self) -> Result<()> {
        self.server
            .publish(RootProperty::ClientList(self.registry.clients().to_vec()))
    }

    fn publish_workarea(&self) -> Result<()> {
        let area = self
            .screen
            .usable_area(self.screen.bounds(), self.strut(), &self.config.screen);
        self.server.publish(RootProperty::WorkArea(area))
    }

    /// Normal window on the current workspace (or stuck)
    pub fn is_visible(&self, client: Window) -> bool {
        self.registry.get(client).is_some_and(|w| {
            w.state == WindowState::Normal && self.workspaces.shows(w.workspace, w.stuck)
        })
    }
}

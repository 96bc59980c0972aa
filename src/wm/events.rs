//! Events Module
//!
//! Routes display events to the window state machine and runs the
//! actions of expired timers. Handler errors only mean the connection is
//! gone; races with clients are absorbed inside the handlers.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, trace};
use x11rb::protocol::xproto::{
    ButtonPressEvent, ButtonReleaseEvent, EnterNotifyEvent, NotifyDetail, NotifyMode, Window,
};
use x11rb::protocol::Event;

use crate::wm::client::{MaximizeMode, WindowState};
use crate::wm::decorations::Part;
use crate::wm::ewmh::NetWmState;
use crate::wm::hints::IcccmState;
use crate::wm::server::{ClientRequest, ResizeDirection, StateAction, XServer};
use crate::wm::timer::Timer;
use crate::wm::workspace::ALL_WORKSPACES;
use crate::wm::{TimerAction, WindowManager};

/// Primary pointer button
const BUTTON_PRIMARY: u8 = 1;
const BUTTON_MIDDLE: u8 = 2;

/// Window an event is about
fn event_window(event: &Event) -> Option<Window> {
    match event {
        Event::MapRequest(e) => Some(e.window),
        Event::UnmapNotify(e) => Some(e.window),
        Event::ConfigureRequest(e) => Some(e.window),
        Event::PropertyNotify(e) => Some(e.window),
        Event::ClientMessage(e) => Some(e.window),
        Event::FocusIn(e) | Event::FocusOut(e) => Some(e.event),
        Event::EnterNotify(e) => Some(e.event),
        Event::ButtonPress(e) | Event::ButtonRelease(e) => Some(e.event),
        Event::MotionNotify(e) => Some(e.event),
        _ => None,
    }
}

impl<S: XServer> WindowManager<S> {
    /// Dispatch one display event
    pub fn handle_event(&mut self, event: &Event) -> Result<()> {
        if !matches!(event, Event::DestroyNotify(_)) {
            if let Some(window) = event_window(event) {
                if self.server.last_bad_window() == Some(window) {
                    trace!("Dropping event for destroyed window 0x{:x}", window);
                    return Ok(());
                }
            }
        }

        match event {
            Event::MapRequest(e) => {
                if self.registry.contains(e.window) {
                    self.deiconify(e.window)?;
                } else if !self.adopt(e.window)? && !self.is_dock(e.window) {
                    debug!("Not managing 0x{:x}", e.window);
                }
            }
            Event::UnmapNotify(e) => {
                // the client's own StructureNotify copy; the plate and root
                // copies report the same unmap
                if e.event != e.window {
                    return Ok(());
                }
                if self.remove_dock(e.window)? {
                    return Ok(());
                }
                let Some(w) = self.registry.get_mut(e.window) else {
                    return Ok(());
                };
                if w.ignore_unmaps > 0 {
                    w.ignore_unmaps -= 1;
                    return Ok(());
                }
                self.withdraw(e.window)?;
            }
            Event::DestroyNotify(e) => {
                if !self.remove_dock(e.window)? {
                    self.destroy(e.window)?;
                }
            }
            Event::ConfigureRequest(e) => self.configure_request(e)?,
            Event::PropertyNotify(e) => {
                if let Some(property) = self.server.property_kind(e.atom) {
                    self.update_hints(e.window, property)?;
                }
            }
            Event::ClientMessage(e) => {
                if let Some(request) = self.server.decode_client_message(e) {
                    self.handle_client_request(e.window, request)?;
                }
            }
            Event::FocusIn(e) => {
                if e.mode == NotifyMode::GRAB || e.mode == NotifyMode::UNGRAB || e.detail == NotifyDetail::POINTER {
                    return Ok(());
                }
                self.focus_in(e.event)?;
            }
            Event::FocusOut(e) => {
                if e.mode == NotifyMode::GRAB || e.mode == NotifyMode::UNGRAB || e.detail == NotifyDetail::POINTER {
                    return Ok(());
                }
                self.focus_out(e.event)?;
            }
            Event::EnterNotify(e) => self.handle_enter(e)?,
            Event::ButtonPress(e) => self.handle_button_press(e)?,
            Event::ButtonRelease(e) => self.handle_button_release(e)?,
            Event::MotionNotify(e) => {
                self.drag_motion(e.root_x as i32, e.root_y as i32)?;
            }
            other => trace!("Ignoring {:?}", other),
        }
        Ok(())
    }

    fn handle_enter(&mut self, e: &EnterNotifyEvent) -> Result<()> {
        if !self.config.focus.policy.follows_pointer()
            || e.mode != NotifyMode::NORMAL
            || e.detail == NotifyDetail::INFERIOR
            || self.is_dragging()
        {
            return Ok(());
        }
        if let Some(client) = self.registry.owner(e.event) {
            self.request_focus(client)?;
        }
        Ok(())
    }

    fn handle_button_press(&mut self, e: &ButtonPressEvent) -> Result<()> {
        let Some((client, part)) = self.registry.find(e.event) else {
            return Ok(());
        };
        let (x, y) = (e.root_x as i32, e.root_y as i32);

        if self.config.behavior.raise_on_click && e.detail == BUTTON_PRIMARY {
            self.raise(client)?;
        }
        if !matches!(part, Part::Button(..)) {
            self.request_focus(client)?;
        }

        match part {
            Part::Titlebar if e.detail == BUTTON_MIDDLE => {
                self.lower(client)?;
            }
            Part::Titlebar if e.detail == BUTTON_PRIMARY => {
                if self.take_double_click(client) {
                    self.shade(client)?;
                } else {
                    self.start_move(client, x, y)?;
                }
            }
            Part::Handle => {
                self.start_resize(client, ResizeDirection::Bottom, x, y)?;
            }
            Part::Grip(direction) => {
                self.start_resize(client, direction, x, y)?;
            }
            Part::Button(kind, action) => {
                if let Some(w) = self.registry.get(client) {
                    let background = self.renderer.background(part, w.decorations(), w.focused, true);
                    self.server.set_background(e.event, background)?;
                }
                debug!("Pressed {:?} button ({:?}) of 0x{:x}", kind, action, client);
            }
            Part::Tab => {
                self.raise(client)?;
            }
            Part::Client | Part::Frame | Part::Plate | Part::Titlebar => {}
        }
        Ok(())
    }

    fn handle_button_release(&mut self, e: &ButtonReleaseEvent) -> Result<()> {
        if self.is_dragging() {
            self.finish_drag()?;
            return Ok(());
        }
        let Some((client, Part::Button(_, action))) = self.registry.find(e.event) else {
            return Ok(());
        };
        self.repaint(client)?;
        // released outside the button: no action
        if e.event_x < 0 || e.event_y < 0 {
            return Ok(());
        }
        let size = self
            .registry
            .get(client)
            .map_or(0, |w| w.layout.button_size) as i16;
        if e.event_x >= size || e.event_y >= size {
            return Ok(());
        }
        self.perform(client, action.for_button(e.detail));
        Ok(())
    }

    /// Second primary click inside the double-click interval; otherwise
    /// open a new interval
    fn take_double_click(&mut self, client: Window) -> bool {
        let Some(w) = self.registry.get_mut(client) else {
            return false;
        };
        if let Some(id) = w.double_click.take() {
            if self.timers.disarm(id) {
                return true;
            }
        }
        let interval = self.config.behavior.double_click_interval();
        let id = self
            .timers
            .arm(Timer::once(Instant::now(), interval, TimerAction::DoubleClick(client)));
        if let Some(w) = self.registry.get_mut(client) {
            w.double_click = Some(id);
        }
        false
    }

    /// Run the actions of every timer due at `now`
    pub fn fire_timers(&mut self, now: Instant) -> Result<()> {
        for (id, action) in self.timers.fire_due(now) {
            match action {
                TimerAction::AutoRaise(window) => {
                    let Some(w) = self.registry.get_mut(window) else {
                        continue;
                    };
                    if w.auto_raise != Some(id) {
                        continue;
                    }
                    w.auto_raise = None;
                    if w.focused {
                        debug!("Auto-raising 0x{:x}", window);
                        self.raise(window)?;
                    }
                }
                TimerAction::DoubleClick(window) => {
                    if let Some(w) = self.registry.get_mut(window) {
                        if w.double_click == Some(id) {
                            w.double_click = None;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Requests clients and pagers send as client messages
    pub fn handle_client_request(&mut self, window: Window, request: ClientRequest) -> Result<()> {
        debug!("Client request {:?} for 0x{:x}", request, window);
        match request {
            ClientRequest::CurrentDesktop(workspace) => {
                self.switch_workspace(workspace)?;
                return Ok(());
            }
            _ if !self.registry.contains(window) => return Ok(()),
            ClientRequest::ChangeState(IcccmState::Iconic) => {
                self.iconify(window)?;
            }
            ClientRequest::ChangeState(_) => {}
            ClientRequest::Activate => {
                let visible_elsewhere = self
                    .registry
                    .get(window)
                    .is_some_and(|w| w.state == WindowState::Normal && !self.is_visible(window));
                if visible_elsewhere {
                    let workspace = self.registry.get(window).map_or(0, |w| w.workspace);
                    self.switch_workspace(workspace)?;
                }
                if !self.deiconify(window)? {
                    self.raise(window)?;
                    self.request_focus(window)?;
                }
            }
            ClientRequest::Close => {
                self.close(window)?;
            }
            ClientRequest::SetDesktop(ALL_WORKSPACES) => {
                if self.registry.get(window).is_some_and(|w| !w.stuck) {
                    self.stick(window)?;
                }
            }
            ClientRequest::SetDesktop(workspace) => {
                self.send_to_workspace(window, workspace)?;
            }
            ClientRequest::NetState(action, states) => self.change_net_state(window, action, states)?,
        }
        Ok(())
    }

    fn change_net_state(&mut self, window: Window, action: StateAction, states: NetWmState) -> Result<()> {
        let Some(w) = self.registry.get(window) else {
            return Ok(());
        };
        let wanted = |flag: NetWmState, current: bool| -> Option<bool> {
            if !states.contains(flag) {
                return None;
            }
            let target = match action {
                StateAction::Add => true,
                StateAction::Remove => false,
                StateAction::Toggle => !current,
            };
            (target != current).then_some(target)
        };

        let shade = wanted(NetWmState::SHADED, w.shaded);
        let stick = wanted(NetWmState::STICKY, w.stuck);
        let hidden = wanted(NetWmState::HIDDEN, w.state == WindowState::Iconic);
        let vertical = wanted(NetWmState::MAX_VERT, w.maximized.vertical());
        let horizontal = wanted(NetWmState::MAX_HORZ, w.maximized.horizontal());
        let current = w.maximized;

        if shade.is_some() {
            self.shade(window)?;
        }
        if stick.is_some() {
            self.stick(window)?;
        }
        if vertical.is_some() || horizontal.is_some() {
            let vertical = vertical.unwrap_or(current.vertical());
            let horizontal = horizontal.unwrap_or(current.horizontal());
            let mode = match (horizontal, vertical) {
                (true, true) => MaximizeMode::Full,
                (true, false) => MaximizeMode::Horizontal,
                (false, true) => MaximizeMode::Vertical,
                (false, false) => MaximizeMode::None,
            };
            // restore first, then maximize along the remaining axes
            if current != MaximizeMode::None {
                self.maximize(window, current)?;
            }
            if mode != MaximizeMode::None {
                self.maximize(window, mode)?;
            }
        }
        match hidden {
            Some(true) => {
                self.iconify(window)?;
            }
            Some(false) => {
                self.deiconify(window)?;
            }
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, FocusPolicy};
    use crate::shared::Geometry;
    use crate::wm::server::testing::Request;
    use crate::wm::testing::{adopt_plain, manager, manager_with};
    use std::time::Duration;
    use x11rb::protocol::xproto::{
        DestroyNotifyEvent, FocusInEvent, MapRequestEvent, UnmapNotifyEvent,
    };

    const A: Window = 0x400001;

    fn press(window: Window, detail: u8) -> ButtonPressEvent {
        ButtonPressEvent {
            detail,
            event: window,
            root_x: 100,
            root_y: 100,
            event_x: 3,
            event_y: 3,
            ..ButtonPressEvent::default()
        }
    }

    fn unmap(window: Window) -> Event {
        Event::UnmapNotify(UnmapNotifyEvent {
            event: window,
            window,
            ..UnmapNotifyEvent::default()
        })
    }

    #[test]
    fn test_map_request_adopts_then_deiconifies() {
        let mut wm = manager();
        wm.server.add_plain_client(A, Geometry::new(0, 0, 100, 100));
        let request = Event::MapRequest(MapRequestEvent { window: A, ..MapRequestEvent::default() });
        wm.handle_event(&request).unwrap();
        assert!(wm.registry.contains(A));

        assert!(wm.iconify(A).unwrap());
        wm.handle_event(&request).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Normal);
    }

    #[test]
    fn test_unmap_after_reparent_is_ignored_once() {
        let mut wm = manager();
        wm.server.add_client(
            A,
            crate::wm::server::ClientInfo {
                geometry: Geometry::new(0, 0, 100, 100),
                viewable: true,
                ..Default::default()
            },
        );
        assert!(wm.adopt(A).unwrap());
        wm.handle_event(&unmap(A)).unwrap();
        assert!(wm.registry.contains(A));

        // the plate's copy of the next unmap is skipped, the client's withdraws
        let plate = wm.registry.get(A).unwrap().windows.plate;
        wm.handle_event(&Event::UnmapNotify(UnmapNotifyEvent {
            event: plate,
            window: A,
            ..UnmapNotifyEvent::default()
        }))
        .unwrap();
        assert!(wm.registry.contains(A));
        wm.handle_event(&unmap(A)).unwrap();
        assert!(!wm.registry.contains(A));
        assert!(wm.server.has_request(&Request::WmState { window: A, state: IcccmState::Withdrawn }));
    }

    #[test]
    fn test_events_for_bad_window_are_dropped() {
        let mut wm = manager();
        wm.server.add_plain_client(A, Geometry::new(0, 0, 100, 100));
        wm.server.bad_window.set(Some(A));
        let request = Event::MapRequest(MapRequestEvent { window: A, ..MapRequestEvent::default() });
        wm.handle_event(&request).unwrap();
        assert!(!wm.registry.contains(A));
        assert!(wm.server.requests().is_empty());
    }

    #[test]
    fn test_destroy_notify_unmanages() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        wm.server.vanish(A);
        let destroyed = Event::DestroyNotify(DestroyNotifyEvent { event: A, window: A, ..DestroyNotifyEvent::default() });
        wm.handle_event(&destroyed).unwrap();
        assert!(!wm.registry.contains(A));
        // a second copy is harmless
        wm.handle_event(&destroyed).unwrap();
    }

    #[test]
    fn test_grab_focus_events_are_filtered() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 100, 100));
        let grab = FocusInEvent {
            event: A,
            mode: NotifyMode::GRAB,
            detail: NotifyDetail::NONLINEAR,
            ..FocusInEvent::default()
        };
        wm.handle_event(&Event::FocusIn(grab)).unwrap();
        assert!(!wm.registry.get(A).unwrap().focused);

        let normal = FocusInEvent { mode: NotifyMode::NORMAL, ..grab };
        wm.handle_event(&Event::FocusIn(normal)).unwrap();
        assert!(wm.registry.get(A).unwrap().focused);
    }

    #[test]
    fn test_titlebar_double_click_shades() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        let titlebar = wm.registry.get(A).unwrap().windows.titlebar.unwrap();

        wm.handle_event(&Event::ButtonPress(press(titlebar, 1))).unwrap();
        assert!(wm.is_dragging());
        wm.handle_event(&Event::ButtonRelease(press(titlebar, 1))).unwrap();
        assert!(!wm.is_dragging());

        wm.handle_event(&Event::ButtonPress(press(titlebar, 1))).unwrap();
        assert!(wm.registry.get(A).unwrap().shaded);
        assert!(!wm.is_dragging());
    }

    #[test]
    fn test_expired_double_click_starts_a_move() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        let titlebar = wm.registry.get(A).unwrap().windows.titlebar.unwrap();

        wm.handle_event(&Event::ButtonPress(press(titlebar, 1))).unwrap();
        wm.handle_event(&Event::ButtonRelease(press(titlebar, 1))).unwrap();
        wm.fire_timers(Instant::now() + Duration::from_secs(1)).unwrap();
        assert!(wm.registry.get(A).unwrap().double_click.is_none());

        wm.handle_event(&Event::ButtonPress(press(titlebar, 1))).unwrap();
        assert!(!wm.registry.get(A).unwrap().shaded);
        assert!(wm.is_dragging());
    }

    #[test]
    fn test_button_release_performs_stored_action() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        let button = wm
            .registry
            .get(A)
            .unwrap()
            .windows
            .buttons
            .iter()
            .find(|b| b.kind == crate::wm::decorations::ButtonKind::Iconify)
            .map(|b| b.window)
            .unwrap();

        wm.handle_event(&Event::ButtonPress(press(button, 1))).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Normal);
        let mut outside = press(button, 1);
        outside.event_x = -4;
        wm.handle_event(&Event::ButtonRelease(outside)).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Normal);

        wm.handle_event(&Event::ButtonRelease(press(button, 1))).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Iconic);
    }

    #[test]
    fn test_auto_raise_fires_for_focused_window() {
        let mut config = Config::default();
        config.focus.policy = FocusPolicy::FollowsMouse;
        let mut wm = manager_with(config);
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));
        assert!(wm.focus_in(A).unwrap());
        let frame = wm.registry.get(A).unwrap().windows.frame;
        wm.server.take_requests();

        wm.fire_timers(Instant::now()).unwrap();
        assert!(!wm.server.has_request(&Request::Raise(frame)));
        wm.fire_timers(Instant::now() + Duration::from_secs(1)).unwrap();
        assert!(wm.server.has_request(&Request::Raise(frame)));
        assert!(wm.registry.get(A).unwrap().auto_raise.is_none());
    }

    #[test]
    fn test_client_requests() {
        let mut wm = manager();
        adopt_plain(&mut wm, A, Geometry::new(0, 0, 200, 100));

        wm.handle_client_request(A, ClientRequest::NetState(StateAction::Add, NetWmState::SHADED))
            .unwrap();
        assert!(wm.registry.get(A).unwrap().shaded);
        wm.handle_client_request(A, ClientRequest::NetState(StateAction::Add, NetWmState::SHADED))
            .unwrap();
        assert!(wm.registry.get(A).unwrap().shaded);
        wm.handle_client_request(A, ClientRequest::NetState(StateAction::Toggle, NetWmState::SHADED))
            .unwrap();
        assert!(!wm.registry.get(A).unwrap().shaded);

        wm.handle_client_request(
            A,
            ClientRequest::NetState(StateAction::Add, NetWmState::MAX_VERT | NetWmState::MAX_HORZ),
        )
        .unwrap();
        assert_eq!(wm.registry.get(A).unwrap().maximized, MaximizeMode::Full);
        wm.handle_client_request(A, ClientRequest::NetState(StateAction::Remove, NetWmState::MAX_HORZ))
            .unwrap();
        assert_eq!(wm.registry.get(A).unwrap().maximized, MaximizeMode::Vertical);

        wm.handle_client_request(A, ClientRequest::SetDesktop(ALL_WORKSPACES)).unwrap();
        assert!(wm.registry.get(A).unwrap().stuck);
        wm.handle_client_request(A, ClientRequest::SetDesktop(2)).unwrap();
        assert!(!wm.registry.get(A).unwrap().stuck);
        assert_eq!(wm.registry.get(A).unwrap().workspace, 2);

        wm.handle_client_request(A, ClientRequest::Activate).unwrap();
        assert_eq!(wm.workspaces.current, 2);

        wm.handle_client_request(A, ClientRequest::ChangeState(IcccmState::Iconic)).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Iconic);
        wm.handle_client_request(A, ClientRequest::Activate).unwrap();
        assert_eq!(wm.registry.get(A).unwrap().state, WindowState::Normal);
    }
}

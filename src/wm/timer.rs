//! Timer Module
//!
//! Ordered queue of armed timers consulted by the event loop to bound its
//! wait. Used for auto-raise delays and double-click windows.
//!
//! The queue only orders entries; what a timer does when it fires is
//! decided by whoever armed it, through the `target` value handed back by
//! [`TimerQueue::fire_due`].

use std::time::{Duration, Instant};

/// Handle to an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A timer description, armed with [`TimerQueue::arm`]
#[derive(Debug, Clone)]
pub struct Timer<T> {
    /// Absolute deadline of the next fire
    pub deadline: Instant,
    /// Repeat interval; `None` for one-shot timers
    pub interval: Option<Duration>,
    /// Fire once even if an interval is set
    pub once: bool,
    pub target: T,
}

impl<T> Timer<T> {
    /// One-shot timer firing `delay` after `now`
    pub fn once(now: Instant, delay: Duration, target: T) -> Self {
        Self {
            deadline: now + delay,
            interval: None,
            once: true,
            target,
        }
    }

    /// Repeating timer whose first fire is one `interval` after `now`
    pub fn repeating(now: Instant, interval: Duration, target: T) -> Self {
        Self {
            deadline: now + interval,
            interval: Some(interval),
            once: false,
            target,
        }
    }

    fn repeats(&self) -> Option<Duration> {
        match self.interval {
            // a zero interval could never move past `now`
            Some(interval) if !self.once && !interval.is_zero() => Some(interval),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    timer: Timer<T>,
}

/// Armed timers, soonest deadline first
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T: Clone> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Arm a timer. Equal deadlines keep insertion order.
    pub fn arm(&mut self, timer: Timer<T>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.insert(Entry { id, timer });
        id
    }

    fn insert(&mut self, entry: Entry<T>) {
        let deadline = entry.timer.deadline;
        let index = self
            .entries
            .partition_point(|e| e.timer.deadline <= deadline);
        self.entries.insert(index, entry);
    }

    /// Remove a timer. Removing a timer that is not armed does nothing.
    pub fn disarm(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|e| e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Deadline of an armed timer
    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.timer.deadline)
    }

    /// Soonest deadline, or `None` when nothing is armed (no timeout)
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.first().map(|e| e.timer.deadline)
    }

    /// Time left until the soonest deadline, clamped at zero
    pub fn timeout(&self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop every timer whose deadline has elapsed, in deadline order.
    ///
    /// A repeating timer is re-armed at its previous deadline plus its
    /// interval, so a late call does not shift later fires. If the new
    /// deadline has also elapsed it fires again in the same call.
    pub fn fire_due(&mut self, now: Instant) -> Vec<(TimerId, T)> {
        let mut fired = Vec::new();
        while self
            .entries
            .first()
            .is_some_and(|e| e.timer.deadline <= now)
        {
            let mut entry = self.entries.remove(0);
            fired.push((entry.id, entry.timer.target.clone()));
            if let Some(interval) = entry.timer.repeats() {
                entry.timer.deadline += interval;
                self.insert(entry);
            }
        }
        fired
    }
}

impl<T: Clone> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_orders_by_deadline_then_insertion() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.arm(Timer::once(t0, ms(30), "late"));
        queue.arm(Timer::once(t0, ms(10), "first"));
        queue.arm(Timer::once(t0, ms(10), "second"));

        assert_eq!(queue.next_deadline(), Some(t0 + ms(10)));
        let fired: Vec<_> = queue.fire_due(t0 + ms(30)).into_iter().map(|(_, t)| t).collect();
        assert_eq!(fired, vec!["first", "second", "late"]);
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_nothing_fires_before_deadline() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.arm(Timer::once(t0, ms(50), 1));
        assert!(queue.fire_due(t0 + ms(49)).is_empty());
        assert_eq!(queue.timeout(t0 + ms(20)), Some(ms(30)));
        assert_eq!(queue.timeout(t0 + ms(80)), Some(Duration::ZERO));
    }

    #[test]
    fn test_disarm_unknown_timer_is_noop() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.arm(Timer::once(t0, ms(5), ()));
        assert!(queue.disarm(id));
        assert!(!queue.disarm(id));
        assert!(!queue.is_armed(id));
        assert!(queue.fire_due(t0 + ms(10)).is_empty());
    }

    #[test]
    fn test_repeating_timer_does_not_drift() {
        let t0 = Instant::now();
        let interval = ms(100);
        let mut queue = TimerQueue::new();
        let id = queue.arm(Timer::repeating(t0, interval, "tick"));

        // each call is late but still within one interval of the deadline
        let lateness = [30, 99, 1, 64, 0, 45];
        for (k, late) in lateness.iter().enumerate() {
            let k = k as u32 + 1;
            let due = t0 + interval * k;
            assert_eq!(queue.deadline(id), Some(due));
            let fired = queue.fire_due(due + ms(*late));
            assert_eq!(fired.len(), 1);
            assert_eq!(queue.deadline(id), Some(t0 + interval * (k + 1)));
        }
    }

    #[test]
    fn test_repeating_timer_catches_up_and_terminates() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        let id = queue.arm(Timer::repeating(t0, ms(10), ()));
        let fired = queue.fire_due(t0 + ms(35));
        assert_eq!(fired.len(), 3);
        assert_eq!(queue.deadline(id), Some(t0 + ms(40)));
    }

    #[test]
    fn test_once_flag_overrides_interval() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        let mut timer = Timer::repeating(t0, ms(10), ());
        timer.once = true;
        queue.arm(timer);
        assert_eq!(queue.fire_due(t0 + ms(100)).len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_zero_interval_fires_once() {
        let t0 = Instant::now();
        let mut queue = TimerQueue::new();
        queue.arm(Timer::repeating(t0, Duration::ZERO, ()));
        assert_eq!(queue.fire_due(t0).len(), 1);
        assert!(queue.is_empty());
    }
}

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Identifies one scheduled timer. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerHandle(u64);

struct Scheduled<T> {
    /// `None` when the deadline lies past what `Instant` can represent.
    deadline: Option<Instant>,
    payload: T,
}

/// One-shot timers polled from the main loop.
///
/// Nothing fires on its own: `fire_due` hands back the payloads whose deadline
/// has passed, so delivery always happens on the thread that owns the state.
pub struct TimerScheduler<T> {
    next_id: u64,
    pending: BTreeMap<TimerHandle, Scheduled<T>>,
}

impl<T> Default for TimerScheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
        }
    }
}

impl<T> TimerScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, now: Instant, after: Duration, payload: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            handle,
            Scheduled {
                deadline: now.checked_add(after),
                payload,
            },
        );
        handle
    }

    /// No-op for handles that already fired or were canceled.
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(&handle);
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn armed_count(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().filter_map(|s| s.deadline).min()
    }

    /// Removes and returns every timer due at `now`, earliest deadline first.
    pub fn fire_due(&mut self, now: Instant) -> Vec<(TimerHandle, T)> {
        let mut due: Vec<(Instant, TimerHandle)> = self
            .pending
            .iter()
            .filter_map(|(h, s)| s.deadline.filter(|d| *d <= now).map(|d| (d, *h)))
            .collect();
        due.sort();

        let mut out = Vec::with_capacity(due.len());
        for (_, handle) in due {
            let Some(s) = self.pending.remove(&handle) else { continue };
            out.push((handle, s.payload));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::new();
        let late = timers.schedule(t0, Duration::from_secs(10), "late");
        let early = timers.schedule(t0, Duration::from_secs(5), "early");

        assert!(timers.fire_due(t0 + Duration::from_secs(4)).is_empty());
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(5)));

        let fired = timers.fire_due(t0 + Duration::from_secs(10));
        assert_eq!(fired, vec![(early, "early"), (late, "late")]);
        assert!(timers.fire_due(t0 + Duration::from_secs(60)).is_empty());
        assert_eq!(timers.armed_count(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::new();
        let h = timers.schedule(t0, Duration::from_secs(1), ());
        timers.cancel(h);
        timers.cancel(h);
        assert_eq!(timers.armed_count(), 0);
        assert!(timers.fire_due(t0 + Duration::from_secs(2)).is_empty());

        let fired = timers.schedule(t0, Duration::ZERO, ());
        assert_eq!(timers.fire_due(t0).len(), 1);
        timers.cancel(fired);
    }

    #[test]
    fn unrepresentable_deadline_never_fires() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::new();
        let h = timers.schedule(t0, Duration::MAX, ());
        assert_eq!(timers.next_deadline(), None);
        assert!(timers.fire_due(t0 + Duration::from_secs(86_400)).is_empty());
        assert_eq!(timers.armed_count(), 1);
        timers.cancel(h);
        assert_eq!(timers.armed_count(), 0);
    }

    #[test]
    fn handles_are_not_reused() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::new();
        let a = timers.schedule(t0, Duration::ZERO, ());
        timers.cancel(a);
        let b = timers.schedule(t0, Duration::ZERO, ());
        assert_ne!(a, b);
    }
}

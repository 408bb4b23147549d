use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// One-shot timers on a logical clock that only moves when the owner says so.
#[derive(Clone, Debug)]
pub struct TimerQueue<T> {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<TimerId, (Duration, T)>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            pending: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.insert(id, (self.now + delay, task));
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.pending.remove(&id).map(|(_, task)| task)
    }

    /// Moves the clock forward to `now` and hands back every task that came
    /// due, earliest first. The clock never runs backwards.
    pub fn advance_to(&mut self, now: Duration) -> Vec<(TimerId, T)> {
        self.now = self.now.max(now);
        let mut due: Vec<(Duration, TimerId)> = self
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= self.now)
            .map(|(id, (at, _))| (*at, *id))
            .collect();
        due.sort();
        due.into_iter()
            .filter_map(|(_, id)| self.pending.remove(&id).map(|(_, task)| (id, task)))
            .collect()
    }
}

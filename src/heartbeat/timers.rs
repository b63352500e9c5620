//! Countdown table of active heartbeat timers, indexed by slot.

/// Remaining time per slot plus the list of slots whose countdown is running
#[derive(Debug, Clone)]
pub(crate) struct TimerTable {
    remaining_ms: Vec<u64>,
    active: Vec<usize>,
}

impl TimerTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            remaining_ms: vec![0; capacity],
            active: Vec::with_capacity(capacity),
        }
    }

    /// Start (or restart) the countdown of `slot`; a slot is never listed twice
    pub fn arm(&mut self, slot: usize, period_ms: u64) {
        if slot >= self.remaining_ms.len() {
            return;
        }
        self.remaining_ms[slot] = period_ms;
        if !self.active.contains(&slot) {
            self.active.push(slot);
        }
    }

    /// Stop the countdown of `slot`; returns whether it was running
    pub fn remove(&mut self, slot: usize) -> bool {
        match self.active.iter().position(|&s| s == slot) {
            Some(pos) => {
                self.active.swap_remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.active.contains(&slot)
    }

    pub fn remaining_ms(&self, slot: usize) -> Option<u64> {
        if self.is_active(slot) {
            self.remaining_ms.get(slot).copied()
        } else {
            None
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Count every active timer down by `elapsed_ms`; expired slots are removed and returned
    pub fn elapse(&mut self, elapsed_ms: u64) -> Vec<usize> {
        let mut expired = Vec::new();
        let remaining = &mut self.remaining_ms;
        self.active.retain(|&slot| {
            let left = remaining[slot].saturating_sub(elapsed_ms);
            remaining[slot] = left;
            if left == 0 {
                expired.push(slot);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

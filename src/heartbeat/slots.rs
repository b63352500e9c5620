//! Thumper slot arena.
//!
//! Fixed number of slots, allocated first-fit. A slot holds a weak link to the context it
//! heartbeats for and owns the clone context that sends the heartbeats.

use crate::context::{Context, ContextShared};
use std::sync::Weak;

/// Heartbeat bookkeeping for one auto-heartbeat context
pub(crate) struct Thumper {
    pub owner: Weak<ContextShared>,
    pub heartbeat: Context,
    pub period_sec: u64,
    /// Consecutive failed heartbeats since the last success
    pub failures: u32,
    /// Set while a subscribe runs on the owner; cleared when its timer is armed again
    pub paused: bool,
}

impl Thumper {
    pub fn is_owned_by(&self, owner: *const ContextShared) -> bool {
        std::ptr::eq(self.owner.as_ptr(), owner)
    }
}

pub(crate) struct SlotTable {
    slots: Vec<Option<Thumper>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Place `thumper` in the first free slot; gives it back when the arena is full
    pub fn allocate(&mut self, thumper: Thumper) -> Result<usize, Thumper> {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(thumper);
                Ok(index)
            }
            None => Err(thumper),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Thumper> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Thumper> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    pub fn release(&mut self, index: usize) -> Option<Thumper> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Slot whose clone is `heartbeat`
    pub fn find_by_heartbeat(&self, heartbeat: &Context) -> Option<usize> {
        self.slots.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|thumper| thumper.heartbeat.ptr_eq(heartbeat))
        })
    }

    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Empty every slot, returning what was in them
    pub fn drain(&mut self) -> Vec<(usize, Thumper)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.take().map(|thumper| (index, thumper)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, ContextSettings};
    use crate::transport::ScriptedTransportFactory;
    use std::sync::Arc;

    fn thumper() -> Thumper {
        Thumper {
            owner: Weak::new(),
            heartbeat: Context::with_options(
                ContextSettings::new("pub", "sub"),
                ContextOptions::default().with_transport(Arc::new(ScriptedTransportFactory::new())),
            ),
            period_sec: 60,
            failures: 0,
            paused: false,
        }
    }

    #[test]
    fn test_first_fit_reuses_released_slots() {
        let mut slots = SlotTable::new(3);
        assert_eq!(slots.allocate(thumper()).ok(), Some(0));
        assert_eq!(slots.allocate(thumper()).ok(), Some(1));
        assert_eq!(slots.allocate(thumper()).ok(), Some(2));
        assert!(slots.allocate(thumper()).is_err());
        assert!(slots.release(1).is_some());
        assert_eq!(slots.in_use(), 2);
        assert_eq!(slots.allocate(thumper()).ok(), Some(1));
    }

    #[test]
    fn test_find_by_heartbeat() {
        let mut slots = SlotTable::new(2);
        let t = thumper();
        let heartbeat = t.heartbeat.clone();
        slots.allocate(thumper()).ok();
        slots.allocate(t).ok();
        assert_eq!(slots.find_by_heartbeat(&heartbeat), Some(1));
        assert_eq!(slots.drain().len(), 2);
        assert_eq!(slots.find_by_heartbeat(&heartbeat), None);
    }
}

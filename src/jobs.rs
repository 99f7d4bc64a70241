use nix::unistd::Pid;

/// Fixed-capacity set of background process ids.
///
/// Slots are reused in any order; only membership and count are meaningful.
#[derive(Debug)]
pub struct JobTable {
    slots: Vec<Option<Pid>>,
}

impl JobTable {
    pub fn new(capacity: usize) -> Self {
        JobTable {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn has_capacity(&self) -> bool {
        self.count() < self.capacity()
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.slots.iter().any(|slot| *slot == Some(pid))
    }

    /// Store `pid` in the first free slot. Does nothing when the table is
    /// full or already holds `pid`.
    pub fn register(&mut self, pid: Pid) {
        if self.contains(pid) {
            return;
        }
        match self.slots.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(pid),
            None => log::warn!("job table full, dropping pid {}", pid),
        }
    }

    /// Forget `pid`. Only call once its exit has been confirmed.
    pub fn remove_if_present(&mut self, pid: Pid) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| **slot == Some(pid)) {
            *slot = None;
        }
    }

    /// Snapshot of the live ids, so callers can mutate the table while walking it.
    pub fn pids(&self) -> Vec<Pid> {
        self.slots.iter().flatten().copied().collect()
    }
}

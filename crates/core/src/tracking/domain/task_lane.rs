use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The two kinds of enrichment work a track can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Identity,
    Attributes,
}

impl std::fmt::Display for LaneKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaneKind::Identity => write!(f, "identity"),
            LaneKind::Attributes => write!(f, "attributes"),
        }
    }
}

/// Single-slot work lane for one track.
///
/// At most one [`LaneTicket`] exists per lane at any time. Cancellation is
/// sticky: once cancelled, a lane stays cancelled and every outstanding or
/// future ticket observes it.
#[derive(Debug, Default)]
pub struct TaskLane {
    busy: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl TaskLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the slot. `None` while a previous ticket is still alive.
    pub fn try_acquire(&self) -> Option<LaneTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(LaneTicket {
            busy: self.busy.clone(),
            cancelled: self.cancelled.clone(),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Proof of a claimed lane slot. Dropping it frees the slot, whether the
/// job finished, failed, or never reached a worker.
#[derive(Debug)]
pub struct LaneTicket {
    busy: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl LaneTicket {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for LaneTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_ticket_alive() {
        let lane = TaskLane::new();
        let ticket = lane.try_acquire();

        assert!(ticket.is_some());
        assert!(lane.is_busy());
        assert!(lane.try_acquire().is_none());
    }

    #[test]
    fn test_dropping_ticket_frees_lane() {
        let lane = TaskLane::new();
        drop(lane.try_acquire());

        assert!(!lane.is_busy());
        assert!(lane.try_acquire().is_some());
    }

    #[test]
    fn test_ticket_sees_later_cancel() {
        let lane = TaskLane::new();
        let ticket = lane.try_acquire().unwrap();
        assert!(!ticket.is_cancelled());

        lane.cancel();

        assert!(ticket.is_cancelled());
        assert!(lane.is_cancelled());
    }

    #[test]
    fn test_ticket_dropped_on_other_thread_frees_lane() {
        let lane = TaskLane::new();
        let ticket = lane.try_acquire().unwrap();
        std::thread::spawn(move || drop(ticket)).join().unwrap();
        assert!(!lane.is_busy());
    }

    #[test]
    fn test_concurrent_acquire_grants_one_ticket() {
        let lane = Arc::new(TaskLane::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lane = lane.clone();
                std::thread::spawn(move || lane.try_acquire().map(std::mem::forget).is_some())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|g| *g)
            .count();
        assert_eq!(granted, 1);
    }
}

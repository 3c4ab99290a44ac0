//! Stale-result rejection for long-running operations.
//!
//! Each operation family has one "current" slot. Starting an operation mints
//! a fresh token and overwrites the slot, which silently supersedes whatever
//! was running before. Nothing is cancelled; the superseded work keeps going
//! until its next resumption point, where [`OperationToken::is_current`]
//! returns false and it bails out with [`Outcome::Superseded`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Operation kinds that supersede each other only within their own family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationFamily {
    SnapshotLoad,
    PlanAndEdit,
    AskQuestion,
}

impl std::fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationFamily::SnapshotLoad => "snapshot-load",
            OperationFamily::PlanAndEdit => "plan-and-edit",
            OperationFamily::AskQuestion => "ask-question",
        };
        f.write_str(name)
    }
}

/// Result of an operation that may have been overtaken by a newer one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Completed(T),
    Superseded,
}

impl<T> Outcome<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Superseded => None,
        }
    }
}

/// Latest id minted for a family. The id outlives completion so that tokens
/// older than it stay stale.
#[derive(Debug, Clone, Copy)]
struct Slot {
    id: Uuid,
    completed: bool,
}

type Slots = Arc<Mutex<HashMap<OperationFamily, Slot>>>;

fn lock(slots: &Slots) -> MutexGuard<'_, HashMap<OperationFamily, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the current token of every operation family.
///
/// Cloning shares the slots, so a clone handed to a spawned task observes the
/// same supersession as the coordinator it came from.
#[derive(Debug, Clone, Default)]
pub struct OperationCoordinator {
    slots: Slots,
}

/// Identity of one operation run. Passed down the call chain and checked
/// after every await that crosses a stage boundary.
#[derive(Debug, Clone)]
pub struct OperationToken {
    id: Uuid,
    family: OperationFamily,
    slots: Slots,
}

impl OperationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an operation, superseding any in-flight one of the same family.
    pub fn begin(&self, family: OperationFamily) -> OperationToken {
        let id = Uuid::new_v4();
        let previous = lock(&self.slots).insert(
            family,
            Slot {
                id,
                completed: false,
            },
        );
        match previous {
            Some(previous) if !previous.completed => {
                debug!("Operation {} ({}) superseded by {}", previous.id, family, id)
            }
            _ => debug!("Operation {} ({}) started", id, family),
        }
        OperationToken {
            id,
            family,
            slots: self.slots.clone(),
        }
    }

    pub fn is_current(&self, token: &OperationToken) -> bool {
        token.is_current()
    }

    /// Mark the operation finished. A no-op if it was already superseded.
    /// The id stays in the slot, so older tokens never become current again.
    pub fn complete(&self, token: &OperationToken) {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get_mut(&token.family) {
            if slot.id == token.id && !slot.completed {
                slot.completed = true;
                debug!("Operation {} ({}) completed", token.id, token.family);
            }
        }
    }

    /// Id of the in-flight operation of `family`, if one is running.
    pub fn current(&self, family: OperationFamily) -> Option<Uuid> {
        lock(&self.slots)
            .get(&family)
            .filter(|slot| !slot.completed)
            .map(|slot| slot.id)
    }
}

impl OperationToken {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn family(&self) -> OperationFamily {
        self.family
    }

    /// True while no newer operation of this family has begun. Completion
    /// does not change the answer for any token.
    pub fn is_current(&self) -> bool {
        lock(&self.slots)
            .get(&self.family)
            .map_or(false, |slot| slot.id == self.id)
    }

    /// `Some(Outcome::Superseded)` when the token has gone stale, for the
    /// early-return pattern at resumption points.
    pub fn check<T>(&self) -> Option<Outcome<T>> {
        if self.is_current() {
            None
        } else {
            debug!("Discarding result of superseded operation {}", self.id);
            Some(Outcome::Superseded)
        }
    }
}

//! Slot-level comparison of two snapshots.

use crate::model::{ScheduleSnapshot, StatusCode};

/// How one sub-queue compares to its previous observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubQueueChange {
    pub queue: u32,
    pub subqueue: u32,
    /// The new slots.
    pub slots: Vec<StatusCode>,
    /// Parallel to `slots`: whether each slot differs from before.
    pub changed: Vec<bool>,
    /// The previous slots, or `None` on first observation.
    pub previous: Option<Vec<StatusCode>>,
}

impl SubQueueChange {
    /// Notification routing key, `"{queue}.{subqueue}"`.
    pub fn routing_key(&self) -> String {
        format!("{}.{}", self.queue, self.subqueue)
    }

    /// Whether the new slots differ from the previous ones.
    ///
    /// A first observation is compared against an empty baseline, so it
    /// counts as changed unless it has no slots at all.
    pub fn is_changed(&self) -> bool {
        let previous = self.previous.as_deref().unwrap_or_default();
        previous != self.slots.as_slice()
    }

    /// Whether any individual slot is flagged.
    pub fn has_flagged_slots(&self) -> bool {
        self.changed.iter().any(|&c| c)
    }
}

/// Per-sub-queue comparison of `new` against `old`, in `new`'s order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub entries: Vec<SubQueueChange>,
}

impl ChangeSet {
    /// Entries whose slots differ from the previous observation.
    pub fn changed(&self) -> impl Iterator<Item = &SubQueueChange> {
        self.entries.iter().filter(|e| e.is_changed())
    }
}

/// Compare every sub-queue of `new` with the matching one in `old`.
///
/// Matching is by both ids; the first match wins. Without a match no slot
/// is flagged. With a match, slot `i` is flagged when the old slot differs
/// or does not exist.
pub fn diff(old: Option<&ScheduleSnapshot>, new: &ScheduleSnapshot) -> ChangeSet {
    let entries = new
        .subqueues()
        .map(|(queue, sq)| {
            let previous = old.and_then(|o| o.slots(queue.id, sq.id));
            let changed = match previous {
                Some(prev) => sq
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(i, slot)| prev.get(i) != Some(slot))
                    .collect(),
                None => vec![false; sq.slots.len()],
            };
            SubQueueChange {
                queue: queue.id,
                subqueue: sq.id,
                slots: sq.slots.clone(),
                changed,
                previous: previous.map(<[StatusCode]>::to_vec),
            }
        })
        .collect();
    ChangeSet { entries }
}

//! Core data model for the outage schedule.
//!
//! A snapshot is the whole schedule for one date: queues, each with its
//! sub-queues, each with one status per half-hour slot.

mod schedule;
mod status;

pub use schedule::{InfoBlock, Queue, SLOT_MINUTES, ScheduleDate, ScheduleSnapshot, SubQueue};
pub use status::StatusCode;

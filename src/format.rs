//! Notification text: slot sequences rendered as time ranges.
//!
//! Consecutive slots with the same status collapse into one range. A range
//! that contains a changed slot is wrapped in `<b>…</b>`, which the
//! notification channel renders as bold.

use std::fmt::Write as _;

use crate::model::{InfoBlock, SLOT_MINUTES, ScheduleSnapshot, StatusCode};

const EMPHASIS_OPEN: &str = "<b>";
const EMPHASIS_CLOSE: &str = "</b>";
const INFO_HEADING: &str = "Notes (as of the last slot change; later note-only edits are not stored):";

/// A maximal run of identical statuses, `start..end` in slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRange {
    pub start: usize,
    pub end: usize,
    pub status: StatusCode,
    pub emphasized: bool,
}

impl SlotRange {
    fn line(&self) -> String {
        let text = format!(
            "{} - {} - {}",
            clock(self.start),
            clock(self.end),
            self.status.symbol()
        );
        if self.emphasized {
            format!("{EMPHASIS_OPEN}{text}{EMPHASIS_CLOSE}")
        } else {
            text
        }
    }
}

/// Run-length encode `slots`.
///
/// A range is emphasized when any of its slots is flagged in `changed`.
/// Missing flags count as unchanged.
pub fn ranges(slots: &[StatusCode], changed: &[bool]) -> Vec<SlotRange> {
    let mut out: Vec<SlotRange> = Vec::new();
    for (i, &status) in slots.iter().enumerate() {
        let flagged = changed.get(i).copied().unwrap_or(false);
        match out.last_mut() {
            Some(run) if run.status == status => {
                run.end = i + 1;
                run.emphasized |= flagged;
            }
            _ => out.push(SlotRange {
                start: i,
                end: i + 1,
                status,
                emphasized: flagged,
            }),
        }
    }
    out
}

/// Build the message for one sub-queue: a header line, then one line per range.
pub fn format_message(
    queue: u32,
    subqueue: u32,
    slots: &[StatusCode],
    changed: &[bool],
) -> String {
    let mut msg = header(queue, subqueue);
    for range in ranges(slots, changed) {
        msg.push('\n');
        msg.push_str(&range.line());
    }
    msg
}

/// Render a whole snapshot, optionally limited to one `(queue, sub-queue)`.
///
/// No emphasis; used to display stored schedules. Info blocks are only
/// stored when the slots change, so they are labelled with that caveat.
pub fn format_snapshot(snapshot: &ScheduleSnapshot, only: Option<(u32, u32)>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Schedule for {}", snapshot.date);

    if only.is_none() && !snapshot.info.is_empty() {
        out.push('\n');
        out.push_str(INFO_HEADING);
        out.push('\n');
        for block in &snapshot.info {
            let _ = writeln!(out, "{}", info_line(block));
        }
    }

    for (queue, sq) in snapshot.subqueues() {
        if only.is_some_and(|pair| pair != (queue.id, sq.id)) {
            continue;
        }
        out.push('\n');
        out.push_str(&format_message(queue.id, sq.id, &sq.slots, &[]));
        out.push('\n');
    }
    out
}

fn info_line(block: &InfoBlock) -> String {
    format!("{} - {} ({} queues)", block.from, block.to, block.volume)
}

fn header(queue: u32, subqueue: u32) -> String {
    format!("Queue {queue}.{subqueue}")
}

/// `HH:MM` at the start of slot `index`.
fn clock(index: usize) -> String {
    let minutes = index * SLOT_MINUTES as usize;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

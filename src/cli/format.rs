//! Output formatting for CLI display.

use crate::model::ScheduleDate;
use crate::pipeline::RunOutcome;

/// Format a run outcome for human-readable display.
pub(super) fn describe_outcome(date: ScheduleDate, outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Unchanged => format!("{date}: no changes"),
        RunOutcome::Updated {
            sent,
            failed,
            persisted,
        } => {
            let mut lines = vec![format!("{date}: schedule changed")];
            if sent.is_empty() && failed.is_empty() {
                lines.push("  no sub-queue slots changed".to_string());
            }
            if !sent.is_empty() {
                lines.push(format!("  notified: {}", sent.join(", ")));
            }
            if !failed.is_empty() {
                lines.push(format!("  failed:   {}", failed.join(", ")));
            }
            if !persisted {
                lines.push("  warning: snapshot was not stored".to_string());
            }
            lines.join("\n")
        }
    }
}

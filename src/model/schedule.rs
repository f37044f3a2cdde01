//! Schedule types: queues, sub-queues, and the per-date snapshot.

use std::fmt;
use std::str::FromStr;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};

use super::StatusCode;

/// Length of one slot in minutes.
pub const SLOT_MINUTES: u32 = 30;

/// A calendar day, written `dd-MM-yyyy` on the wire and on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleDate(Date);

impl ScheduleDate {
    const FORMAT: &'static str = "%d-%m-%Y";

    pub fn new(date: Date) -> Self {
        Self(date)
    }
}

impl fmt::Display for ScheduleDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.strftime(Self::FORMAT))
    }
}

impl FromStr for ScheduleDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Date::strptime(Self::FORMAT, s.trim())
            .map(Self)
            .map_err(|e| format!("invalid date '{s}' (expected dd-MM-yyyy): {e}"))
    }
}

impl TryFrom<String> for ScheduleDate {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleDate> for String {
    fn from(value: ScheduleDate) -> Self {
        value.to_string()
    }
}

/// One sub-queue row: its id and the status of every slot of the day.
///
/// Slot `i` covers `i * 30` to `i * 30 + 30` minutes after midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQueue {
    #[serde(rename = "subqueue")]
    pub id: u32,
    #[serde(rename = "hours")]
    pub slots: Vec<StatusCode>,
}

/// A queue and its sub-queues, in source order.
///
/// Only complete queues (ending with sub-queue 2) ever reach a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Queue {
    #[serde(rename = "queue")]
    pub id: u32,
    pub subqueues: Vec<SubQueue>,
}

impl Queue {
    /// Sub-queue id that closes a queue.
    pub const TERMINAL_SUBQUEUE: u32 = 2;

    /// Whether the last sub-queue is the terminal one.
    pub fn is_complete(&self) -> bool {
        self.subqueues
            .last()
            .is_some_and(|sq| sq.id == Self::TERMINAL_SUBQUEUE)
    }
}

/// A free-text outage window published next to the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoBlock {
    pub from: String,
    pub to: String,
    pub volume: f64,
}

/// The parsed schedule for one date.
///
/// Equality covers the date and the queue tree only. Info blocks travel with
/// the snapshot but never make two snapshots differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub date: ScheduleDate,
    #[serde(default)]
    pub info: Vec<InfoBlock>,
    #[serde(rename = "schedule")]
    pub queues: Vec<Queue>,
}

impl ScheduleSnapshot {
    /// Slots of the first sub-queue matching both ids.
    pub fn slots(&self, queue: u32, subqueue: u32) -> Option<&[StatusCode]> {
        self.queues
            .iter()
            .filter(|q| q.id == queue)
            .flat_map(|q| &q.subqueues)
            .find(|sq| sq.id == subqueue)
            .map(|sq| sq.slots.as_slice())
    }

    /// Every `(queue, sub-queue)` pair in source order.
    pub fn subqueues(&self) -> impl Iterator<Item = (&Queue, &SubQueue)> {
        self.queues
            .iter()
            .flat_map(|q| q.subqueues.iter().map(move |sq| (q, sq)))
    }
}

impl PartialEq for ScheduleSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date && self.queues == other.queues
    }
}

impl Eq for ScheduleSnapshot {}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::civil::date;

    fn snapshot(slots: Vec<StatusCode>) -> ScheduleSnapshot {
        ScheduleSnapshot {
            date: ScheduleDate::new(date(2025, 11, 3)),
            info: vec![],
            queues: vec![Queue {
                id: 1,
                subqueues: vec![
                    SubQueue { id: 1, slots: slots.clone() },
                    SubQueue { id: 2, slots },
                ],
            }],
        }
    }

    #[test]
    fn date_round_trips_through_source_format() {
        let d: ScheduleDate = "03-11-2025".parse().unwrap();
        assert_eq!(d, ScheduleDate::new(date(2025, 11, 3)));
        assert_eq!(d.to_string(), "03-11-2025");
    }

    #[test]
    fn date_rejects_iso_format() {
        assert!("2025-11-03".parse::<ScheduleDate>().is_err());
    }

    #[test]
    fn info_blocks_do_not_affect_equality() {
        let a = snapshot(vec![StatusCode::Outage]);
        let mut b = a.clone();
        b.info.push(InfoBlock {
            from: "08:00".into(),
            to: "12:00".into(),
            volume: 1.5,
        });
        assert_eq!(a, b);
    }

    #[test]
    fn slot_change_breaks_equality() {
        let a = snapshot(vec![StatusCode::Outage]);
        let b = snapshot(vec![StatusCode::Warning]);
        assert_ne!(a, b);
    }

    #[test]
    fn lookup_by_ids() {
        let s = snapshot(vec![StatusCode::Outage, StatusCode::Available]);
        assert_eq!(
            s.slots(1, 2),
            Some([StatusCode::Outage, StatusCode::Available].as_slice())
        );
        assert_eq!(s.slots(1, 3), None);
        assert_eq!(s.slots(2, 1), None);
    }

    #[test]
    fn json_shape_preserves_order() {
        let s = snapshot(vec![StatusCode::Available, StatusCode::Outage]);
        let json = serde_json::to_value(&s).unwrap();

        assert_eq!(json["date"], "03-11-2025");
        assert_eq!(json["schedule"][0]["queue"], 1);
        assert_eq!(json["schedule"][0]["subqueues"][1]["subqueue"], 2);
        assert_eq!(json["schedule"][0]["subqueues"][1]["hours"][1], "light_2");

        let back: ScheduleSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn completeness() {
        let mut q = Queue {
            id: 4,
            subqueues: vec![SubQueue { id: 1, slots: vec![] }],
        };
        assert!(!q.is_complete());
        q.subqueues.push(SubQueue { id: 2, slots: vec![] });
        assert!(q.is_complete());
    }
}

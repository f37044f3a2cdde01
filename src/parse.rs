//! Schedule page parsing: markup in, [`ScheduleSnapshot`] out.
//!
//! The table groups rows by queue. A queue's first row carries the queue
//! cell (class `turnoff-scheduleui-table-queue`) followed by the sub-queue id
//! and the slot cells; the rows after it carry only the sub-queue id and
//! slots. A queue is closed by its sub-queue 2 row.
//!
//! Only the first schedule table in the page is read.

mod markup;

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{InfoBlock, Queue, ScheduleDate, ScheduleSnapshot, StatusCode, SubQueue};

use markup::Token;

const TABLE_CLASS: &str = "turnoff-scheduleui-table";
const QUEUE_CELL_CLASS: &str = "turnoff-scheduleui-table-queue";
const INFO_CLASS: &str = "gpvinfodetail";

static INFO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"з (\d{2}:\d{2}) по (\d{2}:\d{2}).+?обсязі (\d+(?:\.\d+)?)")
        .expect("info pattern is a valid regex")
});

/// Errors that can occur while parsing a schedule page.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no schedule table in page")]
    NoScheduleTable,

    #[error("schedule for {0} has no complete queues")]
    EmptySchedule(ScheduleDate),
}

/// One table cell: its class attribute and normalized text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Cell {
    pub class: String,
    pub text: String,
}

impl Cell {
    fn is_queue_header(&self) -> bool {
        self.class.split_whitespace().any(|c| c == QUEUE_CELL_CLASS)
    }
}

/// Parse a schedule page for `date`.
///
/// Fails when the page has no schedule table, or when the table yields no
/// complete queue.
pub fn parse_schedule(date: ScheduleDate, markup: &str) -> Result<ScheduleSnapshot, ParseError> {
    let rows = schedule_rows(markup).ok_or(ParseError::NoScheduleTable)?;
    let queues = fold_rows(rows);
    if queues.is_empty() {
        return Err(ParseError::EmptySchedule(date));
    }
    Ok(ScheduleSnapshot {
        date,
        info: parse_info(markup),
        queues,
    })
}

/// Row-state carried across the fold: finished queues plus the open one.
#[derive(Default)]
struct RowState {
    done: Vec<Queue>,
    open: Option<Queue>,
}

/// Group table rows into complete queues.
///
/// A queue row opens a new queue, silently dropping any queue still open.
/// Only a follow-up row with sub-queue 2 closes a queue. A follow-up row
/// with no open queue is ignored.
pub(crate) fn fold_rows(rows: impl IntoIterator<Item = Vec<Cell>>) -> Vec<Queue> {
    let state = rows
        .into_iter()
        .filter(|cells| !cells.is_empty())
        .fold(RowState::default(), |state, cells| {
            let RowState { done, open } = state;

            if cells[0].is_queue_header() {
                if let Some(dropped) = open {
                    tracing::debug!(queue = dropped.id, "dropping queue without sub-queue 2");
                }
                let queue = Queue {
                    id: lenient_id(&cells[0].text),
                    subqueues: vec![sub_queue(&cells[1..])],
                };
                return RowState {
                    done,
                    open: Some(queue),
                };
            }

            if let Some(mut queue) = open {
                queue.subqueues.push(sub_queue(&cells));
                close_if_complete(done, queue)
            } else {
                tracing::debug!("ignoring sub-queue row outside a queue");
                RowState { done, open: None }
            }
        });
    state.done
}

/// Move `queue` to `done` if the follow-up row just appended is the terminal one.
fn close_if_complete(mut done: Vec<Queue>, queue: Queue) -> RowState {
    if queue.is_complete() {
        done.push(queue);
        RowState { done, open: None }
    } else {
        RowState {
            done,
            open: Some(queue),
        }
    }
}

/// Build a sub-queue from its id cell followed by slot cells.
fn sub_queue(cells: &[Cell]) -> SubQueue {
    let Some((id, slots)) = cells.split_first() else {
        return SubQueue {
            id: 0,
            slots: Vec::new(),
        };
    };
    SubQueue {
        id: lenient_id(&id.text),
        slots: slots.iter().map(|c| StatusCode::classify(&c.class)).collect(),
    }
}

/// Keep only the digits and parse them. No digits (or overflow) gives 0.
pub(crate) fn lenient_id(text: &str) -> u32 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Cells of every body row of the first schedule table.
///
/// Returns `None` if the page has no schedule table. Rows in `thead` and
/// `tfoot` are skipped, as are `th` cells.
pub(crate) fn schedule_rows(markup: &str) -> Option<Vec<Vec<Cell>>> {
    let mut toks = markup::tokens(markup);

    toks.by_ref().find(|t| {
        matches!(t, Token::Open { name, attrs } if name == "table" && markup::has_class(attrs, TABLE_CLASS))
    })?;

    let mut rows = Vec::new();
    let mut row: Option<Vec<Cell>> = None;
    let mut cell: Option<Cell> = None;
    let mut nested = 0usize;
    let mut in_head = false;

    for tok in toks {
        match tok {
            Token::Open { name, .. } if name == "table" => nested += 1,
            Token::Close { name } if name == "table" => {
                if nested == 0 {
                    break;
                }
                nested -= 1;
            }
            _ if nested > 0 => {
                if let (Token::Text(text), Some(c)) = (&tok, cell.as_mut()) {
                    c.text.push_str(text);
                }
            }
            Token::Open { name, .. } if name == "thead" || name == "tfoot" => in_head = true,
            Token::Open { name, .. } if name == "tbody" => in_head = false,
            Token::Close { name } if name == "thead" || name == "tfoot" => in_head = false,
            Token::Open { name, .. } if name == "tr" => {
                finish_row(&mut rows, &mut row, &mut cell);
                if !in_head {
                    row = Some(Vec::new());
                }
            }
            Token::Close { name } if name == "tr" => finish_row(&mut rows, &mut row, &mut cell),
            Token::Open { name, attrs } if name == "td" || name == "th" => {
                finish_cell(&mut row, &mut cell);
                if name == "td" && row.is_some() {
                    cell = Some(Cell {
                        class: markup::attr(attrs, "class").unwrap_or_default(),
                        text: String::new(),
                    });
                }
            }
            Token::Close { name } if name == "td" || name == "th" => finish_cell(&mut row, &mut cell),
            Token::Text(text) => {
                if let Some(c) = cell.as_mut() {
                    c.text.push_str(text);
                }
            }
            _ => {}
        }
    }
    finish_row(&mut rows, &mut row, &mut cell);

    Some(rows)
}

fn finish_cell(row: &mut Option<Vec<Cell>>, cell: &mut Option<Cell>) {
    if let (Some(r), Some(mut c)) = (row.as_mut(), cell.take()) {
        c.text = markup::normalize_ws(&markup::decode_entities(&c.text));
        r.push(c);
    }
}

fn finish_row(rows: &mut Vec<Vec<Cell>>, row: &mut Option<Vec<Cell>>, cell: &mut Option<Cell>) {
    finish_cell(row, cell);
    if let Some(r) = row.take() {
        rows.push(r);
    }
}

/// Outage windows from the free-text info blocks, in page order.
pub(crate) fn parse_info(markup: &str) -> Vec<InfoBlock> {
    let text = info_text(markup);
    INFO_PATTERN
        .captures_iter(&text)
        .filter_map(|caps| {
            Some(InfoBlock {
                from: caps[1].to_string(),
                to: caps[2].to_string(),
                volume: caps[3].parse().ok()?,
            })
        })
        .collect()
}

/// Text of every info `div`, joined with spaces.
fn info_text(markup: &str) -> String {
    let mut parts = Vec::new();
    let mut current = String::new();
    // Depth of open divs inside the current info block; 0 = outside.
    let mut depth = 0usize;

    for tok in markup::tokens(markup) {
        match tok {
            Token::Open { name, attrs } if name == "div" => {
                if depth > 0 {
                    depth += 1;
                } else if markup::has_class(attrs, INFO_CLASS) {
                    depth = 1;
                }
            }
            Token::Close { name } if name == "div" && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    parts.push(markup::normalize_ws(&markup::decode_entities(&current)));
                    current.clear();
                }
            }
            Token::Text(text) if depth > 0 => {
                current.push_str(text);
                current.push(' ');
            }
            _ => {}
        }
    }

    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

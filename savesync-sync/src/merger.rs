//! No-conflict reconciliation of two snapshots.
//!
//! Used whenever detection reports nothing to resolve. It still has to
//! reconcile fields that exist on only one side, using per-section rules:
//!
//! | section | rule |
//! |---|---|
//! | `achievements` | union keyed by `id`, higher `progress` wins |
//! | `progress` | counters take the maximum, other keys as below |
//! | everything else | remote is the base, local keys overlay it |

use crate::values::{cmp_numbers, max_number, overlay, same};
use savesync_types::{Payload, Snapshot, section};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Progress counters that must never regress.
pub const PROGRESS_COUNTERS: [&str; 4] = ["totalScore", "highScore", "gamesPlayed", "gamesWon"];

/// Combines `local` with an optional `remote`.
///
/// With no remote the local snapshot is returned unchanged. Identity fields
/// (user, device, platform, last sync) are kept from `local`.
#[must_use]
pub fn merge(local: &Snapshot, remote: Option<&Snapshot>) -> Snapshot {
    let Some(remote) = remote else {
        return local.clone();
    };

    let mut sections = Map::new();
    for (name, remote_value) in remote.payload.sections() {
        if local.payload.section(name).is_none() {
            sections.insert(name.clone(), remote_value.clone());
        }
    }
    for (name, local_value) in local.payload.sections() {
        let value = match remote.payload.section(name) {
            Some(remote_value) => merge_section(name, local_value, remote_value),
            None => local_value.clone(),
        };
        sections.insert(name.clone(), value);
    }

    let mut merged = local.clone();
    merged.schema_version = local.schema_version.max(remote.schema_version);
    merged.payload = Payload::from(sections);
    merged
}

fn merge_section(name: &str, local: &Value, remote: &Value) -> Value {
    match name {
        section::ACHIEVEMENTS => merge_achievements(local, remote),
        section::PROGRESS => merge_progress(local, remote),
        _ => overlay_value(remote, local),
    }
}

fn overlay_value(base: &Value, top: &Value) -> Value {
    match (base, top) {
        (Value::Object(base), Value::Object(top)) => Value::Object(overlay(base, top)),
        _ => top.clone(),
    }
}

fn merge_progress(local: &Value, remote: &Value) -> Value {
    let (Value::Object(l), Value::Object(r)) = (local, remote) else {
        return local.clone();
    };

    let mut out = overlay(r, l);
    for counter in PROGRESS_COUNTERS {
        if let (Some(Value::Number(a)), Some(Value::Number(b))) = (l.get(counter), r.get(counter)) {
            out.insert(counter.to_string(), Value::Number(max_number(a, b).clone()));
        }
    }
    Value::Object(out)
}

/// Union keyed by achievement `id`. Each id appears once; on collision the
/// entry with the higher `progress` is kept (local on ties). Entries without
/// an id are deduplicated by value.
fn merge_achievements(local: &Value, remote: &Value) -> Value {
    let (Value::Array(l), Value::Array(r)) = (local, remote) else {
        return local.clone();
    };

    let mut out: Vec<Value> = Vec::with_capacity(l.len() + r.len());
    for entry in l.iter().chain(r) {
        let position = match entry.get("id") {
            Some(id) => out
                .iter()
                .position(|existing| existing.get("id").is_some_and(|other| same(other, id))),
            None => out.iter().position(|existing| same(existing, entry)),
        };
        match position {
            Some(index) => {
                if progress_of(entry).cmp_to(progress_of(&out[index])) == Ordering::Greater {
                    out[index] = entry.clone();
                }
            }
            None => out.push(entry.clone()),
        }
    }
    Value::Array(out)
}

struct Progress<'a>(Option<&'a serde_json::Number>);

impl Progress<'_> {
    fn cmp_to(&self, other: Progress<'_>) -> Ordering {
        match (self.0, other.0) {
            (Some(a), Some(b)) => cmp_numbers(a, b),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

fn progress_of(entry: &Value) -> Progress<'_> {
    Progress(entry.get("progress").and_then(Value::as_number))
}

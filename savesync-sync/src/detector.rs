//! Structural conflict detection between two snapshots.

use crate::values::same;
use chrono::{DateTime, Utc};
use savesync_types::{Conflict, FieldPath, Snapshot};
use serde_json::{Map, Value};

/// Lists every path where `local` and `remote` hold different values.
///
/// Only paths present on both sides are compared. Objects are walked
/// recursively; arrays and scalars are compared as whole values at their
/// path. An absent remote yields no conflicts. Paths are key lists, so each
/// differing leaf gets its own path even when keys contain dots.
pub fn detect(local: &Snapshot, remote: Option<&Snapshot>, now: DateTime<Utc>) -> Vec<Conflict> {
    let Some(remote) = remote else {
        return Vec::new();
    };

    let mut conflicts = Vec::new();
    walk(
        local.payload.as_map(),
        remote.payload.as_map(),
        &FieldPath::root_path(),
        now,
        &mut conflicts,
    );
    conflicts
}

fn walk(
    local: &Map<String, Value>,
    remote: &Map<String, Value>,
    prefix: &FieldPath,
    now: DateTime<Utc>,
    out: &mut Vec<Conflict>,
) {
    for (key, local_value) in local {
        let Some(remote_value) = remote.get(key) else {
            continue;
        };
        let path = prefix.child(key);

        match (local_value, remote_value) {
            (Value::Object(l), Value::Object(r)) => walk(l, r, &path, now, out),
            _ if !same(local_value, remote_value) => out.push(Conflict::new(
                path,
                local_value.clone(),
                remote_value.clone(),
                now,
            )),
            _ => {}
        }
    }
}

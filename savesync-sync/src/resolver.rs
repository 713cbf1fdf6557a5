//! Policy-driven conflict resolution.

use crate::merger;
use crate::values::combine;
use savesync_types::{Conflict, ConflictId, Resolution, ResolutionPolicy, Snapshot};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// A resolved snapshot together with the conflicts it settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub snapshot: Snapshot,
    /// Input conflicts with `resolution` filled in.
    pub conflicts: Vec<Conflict>,
}

/// Applies `policy` to every conflict and returns the resolved snapshot.
///
/// Paths outside `conflicts` are reconciled with [`merger::merge`], so
/// fields present on only one side survive. Each conflicting path then
/// receives the local value, the remote value, or their combination.
///
/// `Prompt` cannot be decided here; it falls back to `Local` and logs a
/// warning. Deferred decisions go through [`apply_decisions`] instead.
#[must_use]
pub fn resolve(
    local: &Snapshot,
    remote: Option<&Snapshot>,
    conflicts: &[Conflict],
    policy: ResolutionPolicy,
) -> Snapshot {
    resolve_recorded(local, remote, conflicts, policy).snapshot
}

/// Like [`resolve`], also returning the settled conflicts.
#[must_use]
pub fn resolve_recorded(
    local: &Snapshot,
    remote: Option<&Snapshot>,
    conflicts: &[Conflict],
    policy: ResolutionPolicy,
) -> Resolved {
    let resolution = match policy {
        ResolutionPolicy::Local => Resolution::Local,
        ResolutionPolicy::Remote => Resolution::Remote,
        ResolutionPolicy::Merge => Resolution::Merge,
        ResolutionPolicy::Prompt => {
            if !conflicts.is_empty() {
                warn!(
                    "Prompt policy reached the resolver with {} conflict(s), keeping local values",
                    conflicts.len()
                );
            }
            Resolution::Local
        }
    };

    settle(local, remote, conflicts, |_| resolution.clone())
}

/// Resolves parked conflicts with per-conflict user decisions.
///
/// Conflicts missing from `decisions` keep their local value.
#[must_use]
pub fn apply_decisions(
    local: &Snapshot,
    remote: Option<&Snapshot>,
    conflicts: &[Conflict],
    decisions: &HashMap<ConflictId, Resolution>,
) -> Resolved {
    let undecided = conflicts
        .iter()
        .filter(|c| !decisions.contains_key(&c.id))
        .count();
    if undecided > 0 {
        warn!("{} conflict(s) left undecided, keeping local values", undecided);
    }

    settle(local, remote, conflicts, |conflict| {
        decisions
            .get(&conflict.id)
            .cloned()
            .unwrap_or(Resolution::Local)
    })
}

fn settle(
    local: &Snapshot,
    remote: Option<&Snapshot>,
    conflicts: &[Conflict],
    mut decide: impl FnMut(&Conflict) -> Resolution,
) -> Resolved {
    // Base is the no-conflict merge rather than a bare copy of `local`, so
    // remote-only fields are kept; each conflicting path is then overwritten.
    let mut snapshot = merger::merge(local, remote);
    let mut settled = Vec::with_capacity(conflicts.len());

    for conflict in conflicts {
        let resolution = decide(conflict);
        snapshot
            .payload
            .set_path(&conflict.field_path, value_for(conflict, &resolution));

        let mut conflict = conflict.clone();
        conflict.resolution = Some(resolution);
        settled.push(conflict);
    }

    Resolved {
        snapshot,
        conflicts: settled,
    }
}

fn value_for(conflict: &Conflict, resolution: &Resolution) -> Value {
    match resolution {
        Resolution::Local => conflict.local_value.clone(),
        Resolution::Remote => conflict.remote_value.clone(),
        Resolution::Merge => combine(&conflict.local_value, &conflict.remote_value),
        Resolution::Custom(value) => value.clone(),
    }
}

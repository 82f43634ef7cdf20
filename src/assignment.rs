//! Static batch ownership for horizontal sharding (spec §4.2).
//!
//! No rebalancing, no coordination: replicas own batch indices via a simple
//! modulus. Ported from `original_source/pkg/scaling.go`.

/// Parse the replica's shard index from an assignment id string ending in
/// `-<index>`, e.g. `"check-senergy-3"` -> `3`.
pub fn parse_assignment_index(assignment_id: &str) -> Result<u32, crate::error::ReconcileError> {
    let last = assignment_id
        .rsplit('-')
        .next()
        .ok_or_else(|| invalid(assignment_id))?;
    last.parse::<u32>().map_err(|_| invalid(assignment_id))
}

fn invalid(assignment_id: &str) -> crate::error::ReconcileError {
    crate::error::ReconcileError::Config(format!(
        "unparseable assignment id '{assignment_id}': expected a '-<index>' suffix"
    ))
}

/// `scaling < 1` is corrected to `1` with a warning (spec §4.2).
fn normalized_scaling(scaling: u32) -> u32 {
    if scaling < 1 {
        tracing::warn!(scaling, "configured scaling < 1, using scaling 1");
        1
    } else {
        scaling
    }
}

/// `IsAssignedBatch(batch_size, offset, scaling, index)` — batch `b =
/// offset / batch_size` is owned by replica `index` iff `(b mod scaling) ==
/// index`.
pub fn is_assigned_batch(batch_size: u32, offset: u32, scaling: u32, assignment_index: u32) -> bool {
    let scaling = normalized_scaling(scaling);
    let batch_index = offset / batch_size;
    (batch_index % scaling) == assignment_index
}

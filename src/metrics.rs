use tracing::trace;

// Trace-level counters; a recorder can be attached later without touching call sites.

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target: "loader.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn batch_uploaded(index: usize, size: usize, success: bool) {
    trace!(
        target: "loader.metrics",
        batch = index,
        size = size,
        success = success,
        "batch_uploaded"
    );
}

pub fn variant_rejected(reason: &'static str) {
    trace!(
        target: "loader.metrics",
        reason = reason,
        "variant_rejected_total_inc"
    );
}

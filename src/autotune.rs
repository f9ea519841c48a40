/// Default worker count for the copy pool. Folder-level copying is
/// I/O-bound, so half the logical cores is plenty; more workers only
/// add seek pressure.
pub fn default_workers() -> usize {
    let cores = num_cpus::get().max(1);
    (cores / 2).clamp(1, 8)
}

/// Final pool size: user cap if given, clamped by the number of
/// directory groups (extra workers would just idle).
pub fn effective_workers(requested: Option<usize>, groups: usize) -> usize {
    let base = requested.unwrap_or_else(default_workers);
    base.min(groups.max(1)).max(1)
}

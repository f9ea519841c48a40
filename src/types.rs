use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RegionalMode {
    Consolidated,
    Regional,
}

/// Which matcher tier produced a classification. Diagnostic only:
/// routing never depends on it once a match exists.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    Specialized,
    Preprocessed,
    Standard,
}

/// Pure output of classifying one top-level directory name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Classification {
    pub shortcode: String,
    pub display_name: String,
    pub tier: ConfidenceTier,

    /// Format qualifier found in the folder name (e.g. "bigendian",
    /// "encrypted"). Becomes one extra subfolder level in the target.
    pub variant_tag: Option<String>,

    /// Regional token (e.g. "famicom") consumed by the regional resolver.
    pub region_hint: Option<String>,
}

/// One detected platform grouping, aggregated over all source
/// directories that resolved to the same shortcode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlatformRecord {
    pub shortcode: String,
    pub display_name: String,

    /// Contributing directories in discovery order.
    pub source_directories: Vec<PathBuf>,

    /// Format qualifiers observed across the contributing directories
    /// (each one is a subfolder under the platform directory).
    pub variant_tags: Vec<String>,

    pub file_count: usize,
    pub byte_count: u64,
}

/// A directory that produced no platform match. Not an error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnmatchedDirectory {
    pub name: String,
    pub file_count: usize,
}

/// A directory excluded by the unsupported-platform table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExcludedDirectory {
    pub name: String,
    pub reason: String,
    pub file_count: usize,
}

/// Per-run aggregate counters. The reconciliation invariant is that
/// every discovered file lands in exactly one resolution bucket;
/// `unprocessed` is only ever nonzero after a stop request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub discovered: usize,
    pub copied: usize,
    pub skipped_duplicate: usize,
    pub renamed_collision: usize,
    pub failed: usize,

    /// Files never attempted because a stop was requested.
    pub unprocessed: usize,

    pub platforms_found: Vec<PlatformRecord>,
    pub unmatched_directories: Vec<UnmatchedDirectory>,
    pub excluded_directories: Vec<ExcludedDirectory>,
    pub empty_directories: Vec<String>,
}

impl Statistics {
    pub fn reconciles(&self) -> bool {
        self.discovered
            == self.copied
                + self.skipped_duplicate
                + self.renamed_collision
                + self.failed
                + self.unprocessed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_accounts_for_unprocessed_files() {
        let stats = Statistics {
            discovered: 5,
            copied: 2,
            unprocessed: 3,
            ..Default::default()
        };
        assert!(stats.reconciles());

        let leak = Statistics {
            discovered: 5,
            copied: 2,
            ..Default::default()
        };
        assert!(!leak.reconciles());
    }
}

use crate::classify::FolderClassifier;
use crate::config::OrganizerConfig;
use crate::copy_engine::{CopyEngine, CopyTask, FailureRecord, FolderRun};
use crate::extensions::ExtensionFilter;
use crate::regional::RegionalResolver;
use crate::types::{
    ExcludedDirectory, PlatformRecord, RegionalMode, Statistics, UnmatchedDirectory,
};
use crate::{autotune, scan};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Machine-readable result of one run, written as JSON when
/// `--report` is given.
#[derive(Serialize)]
pub struct RunReport {
    pub generated_at: String,
    pub source_root: PathBuf,
    pub target_root: PathBuf,
    pub regional_mode: RegionalMode,
    pub dry_run: bool,
    pub cancelled: bool,
    pub statistics: Statistics,
    pub failures: Vec<FailureRecord>,
    pub folder_runs: Vec<FolderRun>,
}

/* =========================
   Orchestrator
   ========================= */

pub fn organize(cfg: &OrganizerConfig, cancel: &Arc<AtomicBool>) -> Result<RunReport> {
    if !cfg.source_root.is_dir() {
        return Err(anyhow!(
            "source root is not a directory: {}",
            cfg.source_root.display()
        ));
    }
    if !cfg.dry_run {
        fs::create_dir_all(&cfg.target_root)
            .with_context(|| format!("create target root {}", cfg.target_root.display()))?;
    }

    let filter = match &cfg.extension_allowlist {
        Some(list) => ExtensionFilter::from_allowlist(list),
        None => ExtensionFilter::new(),
    };
    let classifier = FolderClassifier::new(!cfg.disable_subcategory_processing)?;
    let resolver = RegionalResolver::new(cfg.regional_mode)?;

    println!("=== ROM ORGANIZER ===");
    println!("Source : {}", cfg.source_root.display());
    println!("Target : {}", cfg.target_root.display());
    println!("Mode   : {:?}", cfg.regional_mode);
    if cfg.dry_run {
        println!("Dry run: no files will be written");
    }

    /* ===== Discovery ===== */

    let mut stats = Statistics::default();
    let mut tasks: Vec<CopyTask> = Vec::new();
    // shortcode -> index into stats.platforms_found, preserving
    // discovery order in the list itself.
    let mut platform_index: HashMap<String, usize> = HashMap::new();

    // The target tree may live inside the source root; compare
    // resolved paths so spelling differences or symlinks cannot turn
    // the output tree into a source folder.
    let target_resolved = cfg.target_root.canonicalize().ok();

    println!("\n=== DISCOVERY ===");
    for dir in scan::top_level_dirs(&cfg.source_root)? {
        if dir == cfg.target_root
            || (target_resolved.is_some() && dir.canonicalize().ok() == target_resolved)
        {
            continue;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(reason) = classifier.exclusion_reason(&name) {
            let dir_scan = scan::scan_directory(&dir, &filter)?;
            println!("  {name} -> EXCLUDED ({reason})");
            stats.excluded_directories.push(ExcludedDirectory {
                name,
                reason: reason.to_string(),
                file_count: dir_scan.files.len(),
            });
            continue;
        }

        let dir_scan = scan::scan_directory(&dir, &filter)?;
        if dir_scan.files.is_empty() {
            println!("  {name} -> empty, skipped");
            stats.empty_directories.push(name);
            continue;
        }

        let Some(classification) = classifier.classify(&name) else {
            println!("  {name} -> no platform match");
            stats.unmatched_directories.push(UnmatchedDirectory {
                name,
                file_count: dir_scan.files.len(),
            });
            continue;
        };

        let (shortcode, display_name) = resolver.resolve(&name, &classification);
        println!(
            "  {name} -> {shortcode} ({display_name}) [{:?}]",
            classification.tier
        );

        let mut platform_dir = cfg.target_root.join(&shortcode);
        if let Some(tag) = &classification.variant_tag {
            platform_dir = platform_dir.join(tag);
        }

        let idx = *platform_index.entry(shortcode.clone()).or_insert_with(|| {
            stats.platforms_found.push(PlatformRecord {
                shortcode: shortcode.clone(),
                display_name: display_name.clone(),
                source_directories: Vec::new(),
                variant_tags: Vec::new(),
                file_count: 0,
                byte_count: 0,
            });
            stats.platforms_found.len() - 1
        });
        let record = &mut stats.platforms_found[idx];
        record.source_directories.push(dir.clone());
        if let Some(tag) = &classification.variant_tag {
            if !record.variant_tags.contains(tag) {
                record.variant_tags.push(tag.clone());
            }
        }
        record.file_count += dir_scan.files.len();
        record.byte_count += dir_scan.total_bytes();

        for file in dir_scan.files {
            tasks.push(CopyTask {
                source_path: file.path,
                source_dir: dir.clone(),
                target_dir: platform_dir.clone(),
                size: file.size,
            });
        }
    }

    println!(
        "\nPlatforms: {}  Unmatched: {}  Excluded: {}  Empty: {}",
        stats.platforms_found.len(),
        stats.unmatched_directories.len(),
        stats.excluded_directories.len(),
        stats.empty_directories.len()
    );

    /* ===== Copy ===== */

    let group_count = {
        let mut dirs: Vec<&PathBuf> = tasks.iter().map(|t| &t.source_dir).collect();
        dirs.sort();
        dirs.dedup();
        dirs.len()
    };
    let workers = autotune::effective_workers(cfg.max_workers, group_count);

    let target_before = if cfg.dry_run {
        0
    } else {
        scan::count_relevant_files(&cfg.target_root, &filter)?
    };

    println!("\n=== COPY ===");
    println!("Files: {}  Folders: {group_count}  Workers: {workers}", tasks.len());

    let engine = CopyEngine::new(workers, cfg.dry_run)?;
    let report = engine.execute(tasks, cancel)?;

    stats.discovered = report.totals.discovered;
    stats.copied = report.totals.copied;
    stats.skipped_duplicate = report.totals.skipped_duplicate;
    stats.renamed_collision = report.totals.renamed_collision;
    stats.failed = report.totals.failed;
    stats.unprocessed = report.totals.unprocessed;

    /* ===== Reconciliation ===== */

    if !report.totals.reconciles(report.cancelled) {
        println!(
            "WARNING: counters do not reconcile (discovered={} copied={} skipped={} renamed={} failed={} unprocessed={})",
            stats.discovered,
            stats.copied,
            stats.skipped_duplicate,
            stats.renamed_collision,
            stats.failed,
            stats.unprocessed
        );
    }

    if !cfg.dry_run && !report.cancelled {
        let target_after = scan::count_relevant_files(&cfg.target_root, &filter)?;
        let expected = stats.copied + stats.renamed_collision;
        let actual = target_after.saturating_sub(target_before);
        if actual != expected {
            println!(
                "WARNING: on-disk verification mismatch: expected {expected} new files, found {actual}"
            );
        }
    }

    /* ===== Summary ===== */

    println!("\n=== SUMMARY ===");
    println!("Discovered : {}", stats.discovered);
    println!("Copied     : {}", stats.copied);
    println!("Skipped    : {} (identical duplicates)", stats.skipped_duplicate);
    println!("Renamed    : {} (name collisions)", stats.renamed_collision);
    println!("Failed     : {}", stats.failed);
    if report.cancelled {
        println!("Unprocessed: {} (stop requested)", stats.unprocessed);
    }
    for failure in &report.failures {
        println!(
            "  FAILED {} -> {}: {}",
            failure.source.display(),
            failure.target.display(),
            failure.error
        );
    }

    let generated_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let run_report = RunReport {
        generated_at,
        source_root: cfg.source_root.clone(),
        target_root: cfg.target_root.clone(),
        regional_mode: cfg.regional_mode,
        dry_run: cfg.dry_run,
        cancelled: report.cancelled,
        statistics: stats,
        failures: report.failures,
        folder_runs: report.folder_runs,
    };

    if let Some(path) = &cfg.report_path {
        let json = serde_json::to_string_pretty(&run_report).context("serialize run report")?;
        fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
        println!("\nReport written: {}", path.display());
    }

    Ok(run_report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn base_config(source: PathBuf, target: PathBuf) -> OrganizerConfig {
        OrganizerConfig {
            source_root: source,
            target_root: target,
            regional_mode: RegionalMode::Consolidated,
            disable_subcategory_processing: false,
            max_workers: Some(2),
            extension_allowlist: None,
            dry_run: false,
            report_path: None,
        }
    }

    #[test]
    fn missing_source_root_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = base_config(tmp.path().join("nope"), tmp.path().join("out"));
        let cancel = Arc::new(AtomicBool::new(false));
        assert!(organize(&cfg, &cancel).is_err());
    }

    #[test]
    fn dry_run_plans_without_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src");
        let dir = source.join("Nintendo - Nintendo 64 (BigEndian)");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("game.z64"), b"rom").unwrap();

        let mut cfg = base_config(source, tmp.path().join("out"));
        cfg.dry_run = true;
        let cancel = Arc::new(AtomicBool::new(false));
        let report = organize(&cfg, &cancel).unwrap();

        assert_eq!(report.statistics.copied, 1);
        assert!(!tmp.path().join("out").exists());
        // Variant tag shows up in the platform grouping.
        let record = &report.statistics.platforms_found[0];
        assert_eq!(record.shortcode, "n64");
        assert_eq!(record.variant_tags, ["bigendian"]);
    }

    #[test]
    fn empty_and_unmatched_directories_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("src");
        fs::create_dir_all(source.join("Nintendo - Game Boy")).unwrap();
        let junk = source.join("Holiday Photos");
        fs::create_dir_all(&junk).unwrap();
        fs::write(junk.join("a.nes"), b"not a rom really").unwrap();

        let cfg = base_config(source, tmp.path().join("out"));
        let cancel = Arc::new(AtomicBool::new(false));
        let report = organize(&cfg, &cancel).unwrap();

        assert_eq!(report.statistics.empty_directories.len(), 1);
        assert_eq!(report.statistics.unmatched_directories.len(), 1);
        assert_eq!(report.statistics.unmatched_directories[0].file_count, 1);
    }
}

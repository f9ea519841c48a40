use anyhow::{Context, Result, anyhow};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

const MAX_ATTEMPTS: usize = 3;
const RETRY_DELAYS_MS: [u64; 3] = [100, 300, 700];
const COPY_BUF: usize = 64 * 1024;

/// One file scheduled for copying. `source_dir` is the top-level
/// source directory the file came from; it is the scheduling group key
/// and the hint source for collision renames.
#[derive(Clone, Debug)]
pub struct CopyTask {
    pub source_path: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub size: u64,
}

/// Permanent failure for one file. Collected, never propagated.
#[derive(Clone, Debug, Serialize)]
pub struct FailureRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub error: String,
}

/// Work actually performed for one source directory. Each directory
/// appears exactly once per run.
#[derive(Clone, Debug, Serialize)]
pub struct FolderRun {
    pub source_dir: PathBuf,
    pub files: usize,
    /// Highest number of workers observed inside this directory at
    /// once. The scheduling contract keeps this at 1.
    pub peak_workers: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EngineTotals {
    pub discovered: usize,
    pub copied: usize,
    pub skipped_duplicate: usize,
    pub renamed_collision: usize,
    pub failed: usize,
    pub unprocessed: usize,
}

impl EngineTotals {
    /// Every discovered file must land in exactly one resolution
    /// bucket; `unprocessed` only participates after a stop request.
    pub fn reconciles(&self, cancelled: bool) -> bool {
        let mut sum = self.copied + self.skipped_duplicate + self.renamed_collision + self.failed;
        if cancelled {
            sum += self.unprocessed;
        }
        self.discovered == sum
    }

    fn merge(&mut self, other: &EngineTotals) {
        self.discovered += other.discovered;
        self.copied += other.copied;
        self.skipped_duplicate += other.skipped_duplicate;
        self.renamed_collision += other.renamed_collision;
        self.failed += other.failed;
        self.unprocessed += other.unprocessed;
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EngineReport {
    pub totals: EngineTotals,
    pub failures: Vec<FailureRecord>,
    pub folder_runs: Vec<FolderRun>,
    pub cancelled: bool,
}

/* =========================
   Target path registry
   ========================= */

/// A claimed target path: who claimed it and, once known, the content
/// hash that will live there. The hash is memoized so N collisions on
/// one popular name cost one hashing pass, not N.
pub struct ClaimEntry {
    source_path: PathBuf,
    size: Option<u64>,
    hash: OnceLock<String>,
}

impl ClaimEntry {
    /// Content hash of the claimed file, computed on first use. Reads
    /// the claimant's SOURCE file, never the in-flight target, so a
    /// collider can compare against an owner that is still copying.
    fn content_hash(&self) -> Result<String> {
        if let Some(h) = self.hash.get() {
            return Ok(h.clone());
        }
        let h = hash_file(&self.source_path)?;
        let _ = self.hash.set(h.clone());
        Ok(h)
    }

    fn record_hash(&self, hash: &str) {
        let _ = self.hash.set(hash.to_string());
    }

    /// Cheap pre-hash gate: files of different sizes cannot be
    /// identical. Unknown size never rules a match out.
    fn could_match(&self, size: u64) -> bool {
        self.size.is_none_or(|s| s == size)
    }
}

pub enum ClaimOutcome {
    /// Caller owns the path and must produce the file there.
    Owner(Arc<ClaimEntry>),
    /// Someone else (or a file already on disk) holds the path.
    Contested(Arc<ClaimEntry>),
}

/// Run-wide map of claimed target paths. One lock around a plain map:
/// claims are tiny compared to the copies they serialize.
#[derive(Default)]
pub struct TargetPathRegistry {
    claims: Mutex<HashMap<PathBuf, Arc<ClaimEntry>>>,
}

impl TargetPathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, target: &Path, source: &Path, size: u64) -> ClaimOutcome {
        let mut map = self.claims.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = map.get(target) {
            return ClaimOutcome::Contested(existing.clone());
        }
        // A file left by an earlier run counts as a standing claim
        // whose content is the file itself.
        if target.exists() {
            let entry = Arc::new(ClaimEntry {
                source_path: target.to_path_buf(),
                size: fs::metadata(target).map(|m| m.len()).ok(),
                hash: OnceLock::new(),
            });
            map.insert(target.to_path_buf(), entry.clone());
            return ClaimOutcome::Contested(entry);
        }
        let entry = Arc::new(ClaimEntry {
            source_path: source.to_path_buf(),
            size: Some(size),
            hash: OnceLock::new(),
        });
        map.insert(target.to_path_buf(), entry.clone());
        ClaimOutcome::Owner(entry)
    }
}

/* =========================
   Collision hints
   ========================= */

/// Derives a short rename suffix from a source folder name, e.g.
/// "NES-USA" -> "USA", "NES (Alt)" -> "Alt", "NES_v2" -> "v2".
pub struct HintExtractor {
    patterns: Vec<Regex>,
}

const HINT_STOP_WORDS: &[&str] = &["the", "and", "or", "of", "in", "at", "to", "for"];

impl HintExtractor {
    pub fn new() -> Result<Self> {
        // Preference order matters: explicit suffixes beat bracketed
        // text, which beats loose short words.
        let sources = [
            r"(?i)-(\w{1,8})$",
            r"(?i)_(\w{1,8})$",
            r"(?i)\(([^)]{1,8})\)",
            r"(?i)\[([^\]]{1,8})\]",
            r"(?i)(?:^|\s)v(\d+)",
            r"(?i)(?:^|\s)(\d{1,3})$",
            r"(?i)(?:^|\s)(\w{2,4})(?:\s|$)",
        ];
        let patterns = sources
            .iter()
            .map(|p| Regex::new(p).map_err(|e| anyhow!("invalid hint pattern {p:?}: {e}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn hint_for(&self, folder_name: &str) -> Option<String> {
        let folder_name = folder_name.trim();
        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(folder_name) {
                let hint = caps[1].trim().to_string();
                if !hint.is_empty()
                    && hint.len() <= 8
                    && !HINT_STOP_WORDS.contains(&hint.to_lowercase().as_str())
                {
                    return Some(hint);
                }
            }
        }
        None
    }
}

/* =========================
   Single-file copy
   ========================= */

/// Outcome of one copy attempt. Retryable covers transient I/O;
/// Fatal means further attempts cannot succeed (source gone).
enum CopyAttempt {
    Done { hash: String },
    Retryable(String),
    Fatal(String),
}

pub fn hash_file(path: &Path) -> Result<String> {
    let mut f = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_BUF];
    loop {
        let n = f.read(&mut buf).with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Copy via a hidden temp sibling, hashing the stream on the way
/// through, then verify the byte count and rename into place. The
/// target path never holds a partial file.
fn copy_once(source: &Path, target: &Path) -> CopyAttempt {
    let parent = match target.parent() {
        Some(p) => p,
        None => return CopyAttempt::Fatal(format!("target has no parent: {}", target.display())),
    };
    if let Err(e) = fs::create_dir_all(parent) {
        return CopyAttempt::Retryable(format!("create {}: {e}", parent.display()));
    }

    let expected = match fs::metadata(source) {
        Ok(m) => m.len(),
        Err(e) => return CopyAttempt::Fatal(format!("source unreadable: {e}")),
    };

    let file_name = match target.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return CopyAttempt::Fatal(format!("target has no file name: {}", target.display())),
    };
    let temp = parent.join(format!(".{file_name}.part"));

    let result = stream_copy(source, &temp);
    match result {
        Ok((written, hash)) => {
            if written != expected {
                let _ = fs::remove_file(&temp);
                return CopyAttempt::Retryable(format!(
                    "size mismatch: wrote {written}, expected {expected}"
                ));
            }
            if let Err(e) = fs::rename(&temp, target) {
                let _ = fs::remove_file(&temp);
                return CopyAttempt::Retryable(format!("rename into place: {e}"));
            }
            CopyAttempt::Done { hash }
        }
        Err(e) => {
            let _ = fs::remove_file(&temp);
            if source.exists() {
                CopyAttempt::Retryable(e.to_string())
            } else {
                CopyAttempt::Fatal(format!("source disappeared: {e}"))
            }
        }
    }
}

fn stream_copy(source: &Path, temp: &Path) -> Result<(u64, String)> {
    let mut src = fs::File::open(source).with_context(|| format!("open {}", source.display()))?;
    let mut dst = fs::File::create(temp).with_context(|| format!("create {}", temp.display()))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_BUF];
    let mut written: u64 = 0;
    loop {
        let n = src.read(&mut buf).with_context(|| format!("read {}", source.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        dst.write_all(&buf[..n]).with_context(|| format!("write {}", temp.display()))?;
        written += n as u64;
    }
    dst.flush().with_context(|| format!("flush {}", temp.display()))?;
    Ok((written, hasher.finalize().to_hex().to_string()))
}

/// Bounded retry loop around `copy_once`. `expected_hash` adds a
/// content check when the source's hash is already known.
fn copy_with_retry(
    source: &Path,
    target: &Path,
    expected_hash: Option<&str>,
) -> std::result::Result<String, String> {
    let mut last_error = String::new();
    for attempt in 0..MAX_ATTEMPTS {
        let outcome = copy_once(source, target);
        let outcome = match outcome {
            CopyAttempt::Done { hash } => match expected_hash {
                Some(expected) if expected != hash => {
                    let _ = fs::remove_file(target);
                    CopyAttempt::Retryable(format!("hash mismatch after copy of {}", source.display()))
                }
                _ => CopyAttempt::Done { hash },
            },
            other => other,
        };
        match outcome {
            CopyAttempt::Done { hash } => return Ok(hash),
            CopyAttempt::Fatal(e) => return Err(e),
            CopyAttempt::Retryable(e) => last_error = e,
        }
        if attempt + 1 < MAX_ATTEMPTS {
            let delay = RETRY_DELAYS_MS[attempt.min(RETRY_DELAYS_MS.len() - 1)];
            thread::sleep(Duration::from_millis(delay));
        }
    }
    Err(format!("failed after {MAX_ATTEMPTS} attempts: {last_error}"))
}

/* =========================
   Engine
   ========================= */

enum Resolution {
    Copied,
    SkippedDuplicate,
    RenamedCollision,
    Failed(String, PathBuf),
}

/// Whether `task`'s content matches the claim holder's. The size gate
/// runs first; the source hash is computed at most once per task and
/// cached in `source_hash` across repeated holder checks.
fn is_duplicate(
    task: &CopyTask,
    source_hash: &mut Option<String>,
    other: &ClaimEntry,
) -> Result<bool> {
    if !other.could_match(task.size) {
        return Ok(false);
    }
    let ours = match source_hash {
        Some(h) => h.clone(),
        None => {
            let h = hash_file(&task.source_path)?;
            *source_hash = Some(h.clone());
            h
        }
    };
    Ok(ours == other.content_hash()?)
}

/// Per-directory occupancy gauge. `peak` records the highest number
/// of workers ever active in the directory at the same time.
#[derive(Default)]
struct DirGauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

pub struct CopyEngine {
    workers: usize,
    dry_run: bool,
    hints: HintExtractor,
}

impl CopyEngine {
    pub fn new(workers: usize, dry_run: bool) -> Result<Self> {
        Ok(Self {
            workers: workers.max(1),
            dry_run,
            hints: HintExtractor::new()?,
        })
    }

    /// Group tasks by source directory. BTreeMap keeps group order
    /// deterministic across runs.
    pub fn group_tasks(tasks: Vec<CopyTask>) -> BTreeMap<PathBuf, Vec<CopyTask>> {
        let mut groups: BTreeMap<PathBuf, Vec<CopyTask>> = BTreeMap::new();
        for task in tasks {
            groups.entry(task.source_dir.clone()).or_default().push(task);
        }
        groups
    }

    /// Run every task to a resolution. One worker handles one source
    /// directory at a time, so two workers never interleave inside the
    /// same directory; cross-directory name collisions are resolved by
    /// the registry claim protocol.
    pub fn execute(&self, tasks: Vec<CopyTask>, cancel: &Arc<AtomicBool>) -> Result<EngineReport> {
        let groups: Vec<(PathBuf, Vec<CopyTask>)> = Self::group_tasks(tasks).into_iter().collect();
        let total_groups = groups.len();
        let workers = self.workers.min(total_groups.max(1));

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .context("build copy worker pool")?;

        let registry = TargetPathRegistry::new();
        let done = AtomicUsize::new(0);
        let gauges: HashMap<&PathBuf, DirGauge> = groups
            .iter()
            .map(|(dir, _)| (dir, DirGauge::default()))
            .collect();

        let group_reports: Vec<(EngineTotals, Vec<FailureRecord>, FolderRun)> =
            pool.install(|| {
                groups
                    .par_iter()
                    .map(|(dir, tasks)| {
                        let out = self.run_group(dir, tasks, &registry, &gauges[dir], cancel);
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        println!(
                            "  [{n}/{total_groups}] {} ({} files)",
                            dir.display(),
                            out.2.files
                        );
                        out
                    })
                    .collect()
            });

        let mut report = EngineReport {
            cancelled: cancel.load(Ordering::Relaxed),
            ..Default::default()
        };
        for (totals, failures, run) in group_reports {
            report.totals.merge(&totals);
            report.failures.extend(failures);
            report.folder_runs.push(run);
        }
        Ok(report)
    }

    fn run_group(
        &self,
        dir: &Path,
        tasks: &[CopyTask],
        registry: &TargetPathRegistry,
        gauge: &DirGauge,
        cancel: &Arc<AtomicBool>,
    ) -> (EngineTotals, Vec<FailureRecord>, FolderRun) {
        let active = gauge.active.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(active, Ordering::SeqCst);

        let mut totals = EngineTotals {
            discovered: tasks.len(),
            ..Default::default()
        };
        let mut failures = Vec::new();
        let mut attempted = 0;

        let folder_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for task in tasks {
            if cancel.load(Ordering::Relaxed) {
                totals.unprocessed += tasks.len() - attempted;
                break;
            }
            attempted += 1;
            match self.run_task(task, &folder_name, registry) {
                Resolution::Copied => totals.copied += 1,
                Resolution::SkippedDuplicate => totals.skipped_duplicate += 1,
                Resolution::RenamedCollision => totals.renamed_collision += 1,
                Resolution::Failed(error, target) => {
                    totals.failed += 1;
                    failures.push(FailureRecord {
                        source: task.source_path.clone(),
                        target,
                        error,
                    });
                }
            }
        }

        gauge.active.fetch_sub(1, Ordering::SeqCst);
        let run = FolderRun {
            source_dir: dir.to_path_buf(),
            files: attempted,
            peak_workers: gauge.peak.load(Ordering::SeqCst),
        };
        (totals, failures, run)
    }

    fn run_task(
        &self,
        task: &CopyTask,
        folder_name: &str,
        registry: &TargetPathRegistry,
    ) -> Resolution {
        let file_name = match task.source_path.file_name() {
            Some(n) => n.to_os_string(),
            None => {
                return Resolution::Failed(
                    "source path has no file name".into(),
                    task.target_dir.clone(),
                );
            }
        };
        let base_target = task.target_dir.join(&file_name);

        match registry.claim(&base_target, &task.source_path, task.size) {
            ClaimOutcome::Owner(entry) => self.perform_copy(task, &base_target, &entry, None),
            ClaimOutcome::Contested(holder) => {
                self.resolve_collision(task, folder_name, &base_target, &holder, registry)
            }
        }
    }

    /// Same name, contested path: identical content is a skip, anything
    /// else gets a renamed target.
    fn resolve_collision(
        &self,
        task: &CopyTask,
        folder_name: &str,
        base_target: &Path,
        holder: &ClaimEntry,
        registry: &TargetPathRegistry,
    ) -> Resolution {
        let mut source_hash: Option<String> = None;
        match is_duplicate(task, &mut source_hash, holder) {
            Ok(true) => return Resolution::SkippedDuplicate,
            Ok(false) => {}
            Err(e) => return Resolution::Failed(e.to_string(), base_target.to_path_buf()),
        }

        let stem = task
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = task
            .source_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        // Hint-based rename first, numbered fallback after.
        let mut candidates: Vec<String> = Vec::new();
        if let Some(hint) = self.hints.hint_for(folder_name) {
            candidates.push(format!("{stem} ({hint}){suffix}"));
        }
        for counter in 2..100 {
            candidates.push(format!("{stem} ({counter}){suffix}"));
        }

        for candidate in candidates {
            let target = task.target_dir.join(&candidate);
            match registry.claim(&target, &task.source_path, task.size) {
                ClaimOutcome::Owner(entry) => {
                    return match self.perform_copy(task, &target, &entry, source_hash.as_deref()) {
                        Resolution::Copied => Resolution::RenamedCollision,
                        other => other,
                    };
                }
                ClaimOutcome::Contested(other) => {
                    // A renamed slot holding identical content also
                    // counts as a duplicate.
                    if let Ok(true) = is_duplicate(task, &mut source_hash, &other) {
                        return Resolution::SkippedDuplicate;
                    }
                }
            }
        }

        Resolution::Failed(
            "no unique target name available (exhausted numbered suffixes)".into(),
            base_target.to_path_buf(),
        )
    }

    fn perform_copy(
        &self,
        task: &CopyTask,
        target: &Path,
        entry: &ClaimEntry,
        expected_hash: Option<&str>,
    ) -> Resolution {
        if self.dry_run {
            if let Some(h) = expected_hash {
                entry.record_hash(h);
            }
            return Resolution::Copied;
        }
        match copy_with_retry(&task.source_path, target, expected_hash) {
            Ok(hash) => {
                entry.record_hash(&hash);
                Resolution::Copied
            }
            Err(e) => Resolution::Failed(e, target.to_path_buf()),
        }
    }
}

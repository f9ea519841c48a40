use clap::Parser;
use rom_shortcode_organizer::types::RegionalMode;
use rom_shortcode_organizer::{app, config};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[derive(Parser, Debug)]
#[command(author, version, about = "ROM collection shortcode organizer")]
struct Cli {
    /// Root directory holding the verbose source folders
    source: PathBuf,

    /// Root directory for the organized shortcode layout
    target: PathBuf,

    /// Keep regional siblings separate (famicom vs nes, sfc vs snes)
    #[arg(long)]
    regional: bool,

    /// Disable subcategory consolidation during classification
    #[arg(long)]
    no_subcategory: bool,

    /// Copy worker count (default: derived from CPU count)
    #[arg(long)]
    workers: Option<usize>,

    /// Plan and classify only, write nothing
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Optional YAML config file (CLI flags win)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let yaml = cli
        .config
        .as_deref()
        .and_then(config::load_yaml)
        .unwrap_or_default();

    let regional = cli.regional || yaml.regional.unwrap_or(false);
    let no_subcategory = cli.no_subcategory || yaml.no_subcategory.unwrap_or(false);

    let cfg = config::OrganizerConfig {
        source_root: cli.source,
        target_root: cli.target,
        regional_mode: if regional {
            RegionalMode::Regional
        } else {
            RegionalMode::Consolidated
        },
        disable_subcategory_processing: no_subcategory,
        max_workers: cli.workers.or(yaml.workers),
        extension_allowlist: yaml.extensions,
        dry_run: cli.dry_run,
        report_path: cli.report,
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let report = app::organize(&cfg, &cancel)?;

    if report.statistics.failed > 0 {
        anyhow::bail!("{} file(s) failed to copy", report.statistics.failed);
    }
    Ok(())
}

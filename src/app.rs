//! Command dispatch.
//!
//! [`run_app`] resolves the configuration once (file, environment, then CLI
//! flags), installs the Ctrl+C handler and hands the command to the library
//! managers. Reports go to stdout, logs and prompts to stderr, so
//! `--output json` always yields one clean JSON document.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, Commands, DupesArgs, ListArgs, OutputFormat, RestoreArgs, ScanArgs, WatchArgs};
use crate::config::Config;
use crate::duplicates::{relocate_duplicates, DuplicateFinder, DuplicateGroup, FinderConfig, ScanSummary};
use crate::error::ExitCode;
use crate::logging;
use crate::output::{
    text, JsonBatchList, JsonDuplicatesReport, JsonQuarantineReport, JsonReport, JsonRestoreReport,
    JsonScanReport,
};
use crate::progress::{Progress, ProgressCallback};
use crate::quarantine::{summarize_batches, QuarantineConfig, QuarantineManager, QuarantineReport};
use crate::restore::{BatchSelector, RestoreConfig, RestoreManager};
use crate::scanner::{EmptyFile, WalkerConfig};
use crate::scheduler::{RunGuard, Scheduler};
use crate::signal::{self, ShutdownHandler};

/// Run the command described by `cli`.
///
/// # Errors
///
/// Configuration errors and failures that abort the whole command. Per-file
/// failures are reported and reflected in the returned [`ExitCode`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, !cli.no_color);
    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref())?;
    config.merge_command(&cli.command);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let shutdown = signal::install_handler()?;
    let app = App {
        config,
        shutdown,
        quiet: cli.quiet,
    };

    match &cli.command {
        Commands::Scan(args) => app.scan(args),
        Commands::Restore(args) => app.restore(args),
        Commands::List(args) => app.list(args),
        Commands::Dupes(args) => app.dupes(args),
        Commands::Watch(args) => app.watch(args),
        Commands::Config => {
            print!("{}", app.config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

/// Result of the duplicate pass.
struct DupesOutcome {
    groups: Vec<DuplicateGroup>,
    summary: ScanSummary,
    separated: Option<QuarantineReport>,
}

impl DupesOutcome {
    fn all_succeeded(&self) -> bool {
        self.summary.scan_errors.is_empty()
            && self
                .separated
                .as_ref()
                .map_or(true, QuarantineReport::all_succeeded)
    }

    fn interrupted(&self) -> bool {
        self.separated.as_ref().is_some_and(|r| r.interrupted)
    }

    fn exit_code(&self) -> ExitCode {
        ExitCode::from_outcome(
            self.interrupted(),
            self.all_succeeded(),
            self.groups.is_empty(),
        )
    }
}

/// Result of one `scan`.
struct ScanOutcome {
    quarantine: QuarantineReport,
    duplicates: Option<DupesOutcome>,
}

impl ScanOutcome {
    fn exit_code(&self) -> ExitCode {
        let dupes = self.duplicates.as_ref();
        ExitCode::from_outcome(
            self.quarantine.interrupted || dupes.is_some_and(DupesOutcome::interrupted),
            self.quarantine.all_succeeded() && dupes.map_or(true, DupesOutcome::all_succeeded),
            self.quarantine.records.is_empty() && dupes.map_or(true, |d| d.groups.is_empty()),
        )
    }
}

struct App {
    config: Config,
    shutdown: ShutdownHandler,
    quiet: bool,
}

impl App {
    fn show_text(&self, output: OutputFormat) -> bool {
        output == OutputFormat::Text && !self.quiet
    }

    fn progress(&self, output: OutputFormat) -> Option<Arc<dyn ProgressCallback>> {
        self.show_text(output)
            .then(|| Arc::new(Progress::new(false)) as Arc<dyn ProgressCallback>)
    }

    fn quarantine_manager(&self, base: &Path, dry_run: bool, output: OutputFormat) -> QuarantineManager {
        let config = QuarantineConfig::new(base)
            .with_preserve_structure(self.config.preserve_structure)
            .with_dry_run(dry_run);
        let mut manager = QuarantineManager::new(config).with_shutdown_flag(self.shutdown.get_flag());
        if let Some(progress) = self.progress(output) {
            manager = manager.with_progress_callback(progress);
        }
        manager
    }

    /// Traversal settings with the duplicates directory pruned.
    fn walker_config(&self) -> WalkerConfig {
        self.config
            .walker_config()
            .with_excluded_dir(self.config.duplicates_dir())
    }

    /// Lock the quarantine base for a run that moves files.
    fn guard(&self, dry_run: bool) -> Result<Option<RunGuard>> {
        if dry_run {
            return Ok(None);
        }
        Ok(Some(RunGuard::try_acquire(&self.config.quarantine_base)?))
    }

    fn scan(&self, args: &ScanArgs) -> Result<ExitCode> {
        let _guard = self.guard(args.dry_run)?;
        let Some(outcome) = self.scan_once(&args.path, args.dry_run, !args.yes, args.output)? else {
            eprintln!("Aborted by user.");
            return Ok(ExitCode::NothingToDo);
        };
        self.emit_scan(&outcome, args.output)
    }

    /// Quarantine empty files under `root`, then run the duplicate pass when
    /// enabled. Returns `None` when the user declined the confirmation.
    fn scan_once(
        &self,
        root: &Path,
        dry_run: bool,
        interactive: bool,
        output: OutputFormat,
    ) -> Result<Option<ScanOutcome>> {
        let manager = self.quarantine_manager(&self.config.quarantine_base, dry_run, output);
        let candidates = manager.collect(root, self.walker_config(), EmptyFile)?;

        let report = if dry_run || !interactive || candidates.files.is_empty() {
            manager.run(&candidates.root, candidates.files)?
        } else {
            let plan = manager.plan(&candidates.root, candidates.files)?;
            match output {
                OutputFormat::Text => text::write_plan(&mut io::stdout().lock(), &plan)?,
                OutputFormat::Json => text::write_plan(&mut io::stderr().lock(), &plan)?,
            }
            if !confirm("Move these files to quarantine?")? {
                return Ok(None);
            }
            manager.execute(plan)?
        };
        let quarantine = manager.finish(report, candidates.scan_errors);

        let duplicates = if self.config.duplicates.enabled && !quarantine.interrupted {
            let (groups, summary) = self.find_duplicates(root, output)?;
            let separated = if groups.is_empty() {
                None
            } else if interactive && !dry_run && !confirm_separation(&groups, &self.config)? {
                eprintln!("Duplicates left in place.");
                None
            } else {
                Some(self.separate_duplicates(&groups, root, dry_run, output)?)
            };
            Some(DupesOutcome {
                groups,
                summary,
                separated,
            })
        } else {
            None
        };

        Ok(Some(ScanOutcome {
            quarantine,
            duplicates,
        }))
    }

    fn emit_scan(&self, outcome: &ScanOutcome, output: OutputFormat) -> Result<ExitCode> {
        let code = outcome.exit_code();
        match output {
            OutputFormat::Text => {
                if self.show_text(output) {
                    let mut out = io::stdout().lock();
                    text::write_quarantine_report(&mut out, &outcome.quarantine)?;
                    if let Some(ref dupes) = outcome.duplicates {
                        text::write_duplicates(&mut out, &dupes.groups, &dupes.summary)?;
                        if let Some(ref separated) = dupes.separated {
                            text::write_quarantine_report(&mut out, separated)?;
                        }
                    }
                }
            }
            OutputFormat::Json => {
                let report = JsonScanReport {
                    quarantine: JsonQuarantineReport::new(&outcome.quarantine, code),
                    duplicates: outcome.duplicates.as_ref().map(|d| {
                        JsonDuplicatesReport::new(&d.groups, &d.summary, d.separated.as_ref(), code)
                    }),
                };
                report.write_to(&mut io::stdout().lock(), true)?;
            }
        }
        Ok(code)
    }

    fn find_duplicates(
        &self,
        root: &Path,
        output: OutputFormat,
    ) -> Result<(Vec<DuplicateGroup>, ScanSummary)> {
        let batches = QuarantineManager::new(QuarantineConfig::new(&self.config.quarantine_base));
        let mut walker_config = self.walker_config();
        walker_config.exclude_dirs.extend(batches.exclusions()?);

        let mut finder_config = FinderConfig::default()
            .with_min_size(self.config.duplicates.min_size)
            .with_walker_config(walker_config)
            .with_shutdown_flag(self.shutdown.get_flag());
        if let Some(progress) = self.progress(output) {
            finder_config = finder_config.with_progress_callback(progress);
        }
        Ok(DuplicateFinder::new(finder_config).find_duplicates(root)?)
    }

    fn separate_duplicates(
        &self,
        groups: &[DuplicateGroup],
        root: &Path,
        dry_run: bool,
        output: OutputFormat,
    ) -> Result<QuarantineReport> {
        let manager = self.quarantine_manager(&self.config.duplicates_dir(), dry_run, output);
        Ok(relocate_duplicates(groups, root, &manager)?)
    }

    fn dupes(&self, args: &DupesArgs) -> Result<ExitCode> {
        let (groups, summary) = self.find_duplicates(&args.path, args.output)?;
        if self.show_text(args.output) {
            text::write_duplicates(&mut io::stdout().lock(), &groups, &summary)?;
        }

        let separated = if !args.move_duplicates || groups.is_empty() {
            None
        } else if !args.yes && !args.dry_run && !confirm_separation(&groups, &self.config)? {
            eprintln!("Aborted by user.");
            None
        } else {
            let _guard = self.guard(args.dry_run)?;
            Some(self.separate_duplicates(&groups, &args.path, args.dry_run, args.output)?)
        };

        let outcome = DupesOutcome {
            groups,
            summary,
            separated,
        };
        let code = outcome.exit_code();
        match args.output {
            OutputFormat::Text => {
                match outcome.separated {
                    Some(ref separated) if self.show_text(args.output) => {
                        text::write_quarantine_report(&mut io::stdout().lock(), separated)?;
                    }
                    _ => {}
                }
            }
            OutputFormat::Json => {
                JsonDuplicatesReport::new(
                    &outcome.groups,
                    &outcome.summary,
                    outcome.separated.as_ref(),
                    code,
                )
                .write_to(&mut io::stdout().lock(), true)?;
            }
        }
        Ok(code)
    }

    fn restore(&self, args: &RestoreArgs) -> Result<ExitCode> {
        let config = RestoreConfig::new(&self.config.quarantine_base).with_dry_run(args.dry_run);
        let mut manager = RestoreManager::new(config).with_shutdown_flag(self.shutdown.get_flag());
        if let Some(progress) = self.progress(args.output) {
            manager = manager.with_progress_callback(progress);
        }

        let selector = args
            .batch
            .clone()
            .map_or(BatchSelector::Latest, BatchSelector::Explicit);
        let batch = manager.resolve(&selector)?;
        if !args.yes
            && !args.dry_run
            && !confirm(&format!("Restore files from {}?", batch.root.display()))?
        {
            eprintln!("Aborted by user.");
            return Ok(ExitCode::NothingToDo);
        }

        let _guard = self.guard(args.dry_run)?;
        let report = manager.restore(&BatchSelector::Explicit(batch.root))?;
        let code = ExitCode::from_outcome(report.interrupted, report.all_succeeded(), report.is_noop());
        match args.output {
            OutputFormat::Text => {
                if self.show_text(args.output) {
                    text::write_restore_report(&mut io::stdout().lock(), &report)?;
                }
            }
            OutputFormat::Json => {
                JsonRestoreReport::new(&report, code).write_to(&mut io::stdout().lock(), true)?;
            }
        }
        Ok(code)
    }

    fn list(&self, args: &ListArgs) -> Result<ExitCode> {
        let base = &self.config.quarantine_base;
        let summaries = if base.is_dir() {
            summarize_batches(base).with_context(|| format!("failed to list {}", base.display()))?
        } else {
            Vec::new()
        };
        match args.output {
            OutputFormat::Text => {
                if self.show_text(args.output) {
                    text::write_batch_list(&mut io::stdout().lock(), base, &summaries)?;
                }
            }
            OutputFormat::Json => {
                JsonBatchList::new(base, &summaries).write_to(&mut io::stdout().lock(), true)?;
            }
        }
        Ok(ExitCode::Success)
    }

    fn watch(&self, args: &WatchArgs) -> Result<ExitCode> {
        let mut scheduler = Scheduler::new(
            self.config.schedule_interval(),
            &self.config.quarantine_base,
            self.shutdown.clone(),
        );
        if let Some(max) = args.max_runs {
            scheduler = scheduler.with_max_ticks(usize::try_from(max).unwrap_or(usize::MAX));
        }

        scheduler.run(|| -> Result<()> {
            if let Some(outcome) = self.scan_once(&args.path, args.dry_run, false, OutputFormat::Text)? {
                self.emit_scan(&outcome, OutputFormat::Text)?;
            }
            Ok(())
        });

        if self.shutdown.is_shutdown_requested() {
            Ok(ExitCode::Interrupted)
        } else {
            Ok(ExitCode::Success)
        }
    }
}

fn confirm_separation(groups: &[DuplicateGroup], config: &Config) -> Result<bool> {
    let count: usize = groups.iter().map(|g| g.duplicates().len()).sum();
    confirm(&format!(
        "Move {count} duplicate file(s) into {}?",
        config.duplicates_dir().display()
    ))
}

/// Ask on stderr and read the answer from stdin. Only `yes` confirms.
fn confirm(question: &str) -> Result<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "\n{question} Type 'yes' to confirm: ")?;
    stderr.flush()?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

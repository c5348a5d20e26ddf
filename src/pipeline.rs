//! Batch orchestration.
//!
//! A [`Pipeline`] owns the configuration and the mold registry and runs one
//! batch over every discovered mod document:
//!
//! 1. discover `<addon_dir>/<mod>/<category>.sdls` inputs;
//! 2. normalize each document into `addon/<mod>/`, or fold them all into
//!    `addon/SDLS_MERGED/` with conflict detection;
//! 3. write the conflict log, clean up stale outputs, save the manifest.
//!
//! Failures confined to an entry or a file are logged and collected in the
//! [`RunReport`]; the batch carries on. Only problems that make the whole run
//! meaningless (no molds, no addon directory, unwritable manifest) are
//! returned as [`SdlsError`].
//!
//! [`Pipeline::spawn`] runs the batch on a worker thread and hands back a
//! [`ProcessingHandle`], the single "all categories processed" signal.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use sdls_core::{
    Accumulator, Category, DirMoldSource, EntryError, MoldEngine, Registry,
};
use tracing::instrument;

use crate::config::SdlsConfig;
use crate::discovery::{self, SourceFile, category_file};
use crate::error::SdlsError;
use crate::output::{self, Manifest, OutputLayout, Removal};

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// A file that could not be read, written or removed.
#[derive(Debug)]
pub struct FileFailure {
    /// The file.
    pub path: PathBuf,
    /// What went wrong.
    pub error: io::Error,
}

/// Summary of one batch.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Whether merge mode was on.
    pub merge: bool,
    /// Input documents discovered.
    pub sources: usize,
    /// Entries written across all output documents.
    pub entries: usize,
    /// Output documents written, in write order.
    pub written: Vec<PathBuf>,
    /// Entries copied through unprocessed because they failed to parse.
    pub passthrough: Vec<EntryError>,
    /// Entries dropped in merge mode (unparseable or without identity).
    pub rejected: Vec<EntryError>,
    /// Per-file I/O failures.
    pub io_failures: Vec<FileFailure>,
    /// Field-level merge conflicts.
    pub conflicts: usize,
    /// Where the conflict log was written, if it was.
    pub conflict_log: Option<PathBuf>,
    /// Stale outputs of a previous run that were removed.
    pub cleaned: Vec<PathBuf>,
    /// Wall time of the batch.
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether every entry and file was processed without trouble.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.passthrough.is_empty() && self.rejected.is_empty() && self.io_failures.is_empty()
    }

    fn io_failure(&mut self, path: &Path, error: io::Error) {
        tracing::error!(path = %path.display(), "{error}");
        self.io_failures.push(FileFailure {
            path: path.to_path_buf(),
            error,
        });
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.merge { "merge" } else { "normalize" };
        writeln!(
            f,
            "{mode}: {} document(s) in, {} file(s) written, {} entr{} in {}ms",
            self.sources,
            self.written.len(),
            self.entries,
            if self.entries == 1 { "y" } else { "ies" },
            self.elapsed.as_millis()
        )?;
        if self.merge {
            write!(f, "  conflicts: {}", self.conflicts)?;
            if let Some(path) = &self.conflict_log {
                write!(f, " (see {})", path.display())?;
            }
            writeln!(f)?;
        }
        if !self.cleaned.is_empty() {
            writeln!(f, "  stale outputs removed: {}", self.cleaned.len())?;
        }
        for err in &self.passthrough {
            writeln!(f, "  passed through: {err}")?;
        }
        for err in &self.rejected {
            writeln!(f, "  rejected: {err}")?;
        }
        for failure in &self.io_failures {
            writeln!(f, "  I/O failure: {}: {}", failure.path.display(), failure.error)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One configured batch.
#[derive(Debug)]
pub struct Pipeline {
    config: SdlsConfig,
    registry: Registry,
    layout: OutputLayout,
}

impl Pipeline {
    /// Build a pipeline reading molds from `config.paths.molds_dir`.
    ///
    /// # Errors
    /// Returns [`SdlsError::Registry`] when no molds can be loaded.
    pub fn new(config: SdlsConfig) -> Result<Self, SdlsError> {
        let molds_dir = config.paths.molds_dir.clone();
        let registry = Registry::new(DirMoldSource::new(&molds_dir))
            .map_err(|source| SdlsError::Registry { molds_dir, source })?;
        Ok(Self::with_registry(config, registry))
    }

    /// Build a pipeline over an existing registry.
    #[must_use]
    pub fn with_registry(config: SdlsConfig, registry: Registry) -> Self {
        let layout = OutputLayout::new(&config.paths.output_dir);
        Self {
            config,
            registry,
            layout,
        }
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &SdlsConfig {
        &self.config
    }

    /// The mold registry.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Where outputs go.
    #[must_use]
    pub const fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Run the batch on the current thread.
    ///
    /// # Errors
    /// Returns an error when the addon directory is missing or unreadable, or
    /// when the manifest cannot be saved. Everything else is reported.
    #[instrument(name = "pipeline.run", skip_all, fields(merge = self.config.merge.enabled))]
    pub fn run(&self) -> Result<RunReport, SdlsError> {
        let started = Instant::now();
        let addon_dir = &self.config.paths.addon_dir;
        if !addon_dir.is_dir() {
            return Err(SdlsError::AddonDirMissing {
                path: addon_dir.clone(),
            });
        }

        let categories = self.config.category_list();
        let sources = discovery::discover(addon_dir, &categories, &self.config.ignore_patterns())
            .map_err(|source| SdlsError::Read {
                path: addon_dir.clone(),
                source,
            })?;
        tracing::info!(
            documents = sources.len(),
            categories = categories.len(),
            addon_dir = %addon_dir.display(),
            "processing mod documents"
        );

        let mut report = RunReport {
            merge: self.config.merge.enabled,
            sources: sources.len(),
            ..RunReport::default()
        };
        let mut manifest = Manifest::default();

        if self.config.merge.enabled {
            self.run_merge(&sources, &mut report, &mut manifest);
        } else {
            self.run_normalize(&sources, &mut report, &mut manifest);
        }
        self.finish_outputs(&mut report, manifest)?;

        report.elapsed = started.elapsed();
        tracing::info!(
            written = report.written.len(),
            entries = report.entries,
            conflicts = report.conflicts,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "all categories processed"
        );
        Ok(report)
    }

    /// Run the batch on a worker thread.
    #[must_use]
    pub fn spawn(self) -> ProcessingHandle {
        let (sender, receiver) = mpsc::channel();
        let parent = tracing::Span::current();
        let worker = thread::Builder::new()
            .name("sdls-pipeline".to_owned())
            .spawn(move || {
                let _entered = parent.enter();
                // The receiver may already be gone if the caller dropped the handle.
                let _ = sender.send(self.run());
            });
        match worker {
            Ok(worker) => ProcessingHandle {
                receiver,
                finished: None,
                worker: Some(worker),
            },
            Err(e) => {
                tracing::error!("could not start processing thread: {e}");
                ProcessingHandle {
                    receiver,
                    finished: Some(Err(SdlsError::WorkerLost)),
                    worker: None,
                }
            }
        }
    }

    /// Normalize one document file of `category` and return the framed text.
    ///
    /// Entries that fail to parse are passed through and logged.
    ///
    /// # Errors
    /// Returns [`SdlsError::Read`] when the file cannot be read.
    pub fn normalize_file(&self, category: &Category, path: &Path) -> Result<String, SdlsError> {
        let text = fs::read_to_string(path).map_err(|source| SdlsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let shape = category.shape();
        let document =
            MoldEngine::new(&self.registry).normalize_document(category, shape.unwrap(&text));
        Ok(shape.wrap(&document.body))
    }

    // -- normalize mode --

    #[instrument(name = "pipeline.normalize", skip_all)]
    fn run_normalize(
        &self,
        sources: &[SourceFile],
        report: &mut RunReport,
        manifest: &mut Manifest,
    ) {
        let merged_dir = self.layout.merged_dir();
        match output::remove_dir_if_present(&merged_dir) {
            Ok(true) => tracing::warn!(
                path = %merged_dir.display(),
                "removed merged output since merge mode is off"
            ),
            Ok(false) => {}
            Err(e) => report.io_failure(&merged_dir, e),
        }

        let engine = MoldEngine::new(&self.registry);
        for source in sources {
            let span = tracing::info_span!(
                "pipeline.document",
                mod_name = %source.mod_name,
                category = %source.category
            );
            let _entered = span.enter();
            let timer = self.timer();

            let Some(text) = Self::read_source(&source.path, report) else {
                continue;
            };
            let shape = source.category.shape();
            let document = engine.normalize_document(&source.category, shape.unwrap(&text));
            report.entries += document.entries;
            report.passthrough.extend(document.passthrough);

            let target = self.layout.normalized_path(&source.mod_name, &source.category);
            self.write(&target, &shape.wrap(&document.body), report, manifest);
            Self::lap(timer, "document normalized");
        }
    }

    // -- merge mode --

    #[instrument(name = "pipeline.merge", skip_all)]
    fn run_merge(&self, sources: &[SourceFile], report: &mut RunReport, manifest: &mut Manifest) {
        let mut accumulator = Accumulator::new(MoldEngine::new(&self.registry));

        if self.config.merge.with_base_data {
            let touched: BTreeSet<&Category> = sources.iter().map(|s| &s.category).collect();
            self.seed_base_data(&mut accumulator, &touched, report);
        }

        for source in sources {
            let timer = self.timer();
            let Some(text) = Self::read_source(&source.path, report) else {
                continue;
            };

            // A per-mod output from an earlier normalize run would be loaded
            // alongside the merged one.
            let unmerged = self.layout.normalized_path(&source.mod_name, &source.category);
            match output::remove_file_if_present(&unmerged) {
                Ok(true) => tracing::warn!(
                    path = %unmerged.display(),
                    "removed per-mod output before merging mods"
                ),
                Ok(false) => {}
                Err(e) => report.io_failure(&unmerged, e),
            }

            let outcome = accumulator.accumulate(&source.category, &text, &source.mod_name);
            report.rejected.extend(outcome.rejected);
            Self::lap(timer, "document accumulated");
        }

        let result = accumulator.finish();
        if !result.documents.is_empty() {
            tracing::warn!(
                "DO NOT DISTRIBUTE MERGED JSON. It contains every installed mod, which belong to their respective authors"
            );
        }
        for merged in result.documents {
            report.entries += merged.document.entries;
            report.passthrough.extend(merged.document.passthrough);
            let target = self.layout.merged_path(&merged.category);
            let text = merged.category.shape().wrap(&merged.document.body);
            self.write(&target, &text, report, manifest);
        }

        report.conflicts = result.conflicts.len();
        if report.conflicts > 0 {
            tracing::warn!(conflicts = report.conflicts, "merge conflicts detected");
        }
        let path = self.layout.conflict_log_path(&self.config.merge.conflict_log);
        let written = if self.config.merge.log_conflicts {
            result.conflicts.flush_to(&path)
        } else {
            Ok(false)
        };
        match written {
            Ok(true) => {
                tracing::info!(path = %path.display(), "conflict log written");
                manifest.insert(&self.layout, &path);
                report.conflict_log = Some(path);
            }
            // A log left by an earlier run describes conflicts that no longer exist.
            Ok(false) => match output::remove_file_if_present(&path) {
                Ok(true) => tracing::info!(path = %path.display(), "removed previous conflict log"),
                Ok(false) => {}
                Err(e) => report.io_failure(&path, e),
            },
            Err(e) => report.io_failure(&path, e),
        }
    }

    fn seed_base_data(
        &self,
        accumulator: &mut Accumulator<'_>,
        categories: &BTreeSet<&Category>,
        report: &mut RunReport,
    ) {
        let Some(base_dir) = &self.config.paths.base_data_dir else {
            tracing::warn!("merge.with_base_data is set but paths.base_data_dir is not; merging against mold defaults");
            return;
        };
        for &category in categories {
            let path = category_file(base_dir, category, ".json");
            if !path.is_file() {
                tracing::debug!(%category, path = %path.display(), "no base data for category");
                continue;
            }
            let Some(text) = Self::read_source(&path, report) else {
                continue;
            };
            let outcome = accumulator.seed_baseline(category, &text);
            tracing::debug!(%category, entries = outcome.inserted, "base data seeded");
            report.rejected.extend(outcome.rejected);
        }
    }

    // -- shared steps --

    fn read_source(path: &Path, report: &mut RunReport) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(text) => Some(text),
            Err(e) => {
                report.io_failure(path, e);
                None
            }
        }
    }

    fn write(&self, path: &Path, contents: &str, report: &mut RunReport, manifest: &mut Manifest) {
        match output::write_document(path, contents) {
            Ok(()) => {
                tracing::info!(path = %self.layout.relative(path).display(), "created file");
                manifest.insert(&self.layout, path);
                report.written.push(path.to_path_buf());
            }
            Err(e) => report.io_failure(path, e),
        }
    }

    /// Apply cleanup-on-exit and save the manifest for the next run.
    fn finish_outputs(
        &self,
        report: &mut RunReport,
        mut manifest: Manifest,
    ) -> Result<(), SdlsError> {
        let manifest_path = self.layout.manifest_path();
        let previous = Manifest::load(&manifest_path).unwrap_or_else(|e| {
            tracing::warn!(path = %manifest_path.display(), "could not read previous manifest: {e}");
            Manifest::default()
        });

        let stale = previous.stale_against(&manifest);
        if self.config.run.cleanup_on_exit && !stale.is_empty() {
            let Removal { removed, failed } = Manifest::remove_files(&self.layout, &stale);
            report.cleaned = removed;
            for (path, error) in failed {
                report.io_failure(&path, error);
            }
        }
        // Whatever is still on disk stays tracked so `sdls clean` can find it.
        for relative in stale {
            if self.layout.root().join(&relative).exists() {
                manifest.files.insert(relative);
            }
        }

        manifest.save(&manifest_path).map_err(|source| SdlsError::Write {
            path: manifest_path,
            source,
        })
    }

    fn timer(&self) -> Option<Instant> {
        self.config.run.debug_timing.then(Instant::now)
    }

    fn lap(timer: Option<Instant>, what: &str) {
        if let Some(started) = timer {
            let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            tracing::info!(elapsed_us, "{what}");
        }
    }
}

/// Remove every output recorded in the manifest under `layout`, then the
/// manifest itself.
///
/// # Errors
/// Returns an error when the manifest cannot be read or removed.
pub fn clean(layout: &OutputLayout) -> Result<Removal, SdlsError> {
    let manifest_path = layout.manifest_path();
    let manifest = Manifest::load(&manifest_path).map_err(|source| SdlsError::Read {
        path: manifest_path.clone(),
        source,
    })?;
    let files: Vec<PathBuf> = manifest.files.into_iter().collect();
    let removal = Manifest::remove_files(layout, &files);
    if removal.failed.is_empty() {
        output::remove_file_if_present(&manifest_path).map_err(|source| SdlsError::Write {
            path: manifest_path,
            source,
        })?;
    }
    Ok(removal)
}

// ---------------------------------------------------------------------------
// ProcessingHandle
// ---------------------------------------------------------------------------

/// Completion signal for a batch started with [`Pipeline::spawn`].
#[derive(Debug)]
pub struct ProcessingHandle {
    receiver: Receiver<Result<RunReport, SdlsError>>,
    finished: Option<Result<RunReport, SdlsError>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ProcessingHandle {
    /// Whether the batch has finished, without blocking.
    pub fn is_complete(&mut self) -> bool {
        if self.finished.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.finished = Some(outcome),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => self.finished = Some(Err(SdlsError::WorkerLost)),
            }
        }
        true
    }

    /// Block for up to `timeout`. Returns whether the batch has finished.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        if self.finished.is_some() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => self.finished = Some(outcome),
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => self.finished = Some(Err(SdlsError::WorkerLost)),
        }
        true
    }

    /// Block until the batch finishes and return its outcome.
    ///
    /// # Errors
    /// Returns the batch's error, or [`SdlsError::WorkerLost`] if the worker
    /// thread died without reporting.
    pub fn wait(mut self) -> Result<RunReport, SdlsError> {
        let outcome = match self.finished.take() {
            Some(outcome) => outcome,
            None => self.receiver.recv().unwrap_or(Err(SdlsError::WorkerLost)),
        };
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::error!("processing thread panicked");
        }
        outcome
    }
}

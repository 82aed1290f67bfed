//! Sequential capture across a batch of documents
//!
//! `BatchRunner` opens one document at a time, resolves its slide selector
//! and writes one image per matched element. Slide numbers come from a
//! single counter that runs across the whole batch; failures are folded into
//! the per-document report and never stop the remaining documents.

use crate::resolve::{self, ResolvedSelector, Strategy};
use crate::{
    CaptureConfig, CapturePolicy, DocumentSession, Error, ImageFormat, RenderingSurface, Result,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Batch-wide slide numbering. Starts at zero, hands out 1, 2, 3, ...
#[derive(Debug, Default, Clone)]
pub struct SlideCounter {
    value: usize,
}

impl SlideCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance and return the new number
    pub fn next_number(&mut self) -> usize {
        self.value += 1;
        self.value
    }

    /// Last number handed out (0 before the first slide)
    pub fn value(&self) -> usize {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0;
    }
}

/// File name for slide `number`, zero-padded to at least `width` digits
pub fn slide_file_name(number: usize, width: usize, format: ImageFormat) -> String {
    format!("{:0width$}.{}", number, format.extension(), width = width)
}

/// Outcome of one document
#[derive(Debug)]
pub enum DocumentStatus {
    /// Every matched slide was handled (captured, planned, or skipped by policy)
    Completed { selector: String, strategy: Strategy },
    /// No strategy matched anything
    NoSlides,
    /// Processing stopped early; files written before the failure are kept
    Failed(Error),
}

#[derive(Debug)]
pub struct DocumentReport {
    pub source: PathBuf,
    pub status: DocumentStatus,
    /// Images written (or planned, for dry runs) in capture order
    pub files: Vec<PathBuf>,
    /// Slides whose number was consumed without producing an image
    pub failed_slides: usize,
}

impl DocumentReport {
    fn new(source: &Path, status: DocumentStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            status,
            files: Vec::new(),
            failed_slides: 0,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, DocumentStatus::Failed(_))
    }
}

/// Result of a whole batch
#[derive(Debug)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub output_dir: PathBuf,
    pub elapsed: Duration,
    total_slides: usize,
}

impl BatchReport {
    /// Final counter value: slide numbers handed out across the batch
    pub fn total_slides(&self) -> usize {
        self.total_slides
    }

    /// Images actually written (or planned)
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.documents.iter().flat_map(|d| d.files.iter())
    }

    pub fn failed_slides(&self) -> usize {
        self.documents.iter().map(|d| d.failed_slides).sum()
    }

    pub fn failed_documents(&self) -> usize {
        self.documents.iter().filter(|d| d.is_failed()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Capture,
    Plan,
}

/// Drives a batch through a rendering surface, one document at a time.
pub struct BatchRunner<'a, S: RenderingSurface> {
    surface: &'a S,
    config: CaptureConfig,
    counter: SlideCounter,
}

impl<'a, S: RenderingSurface> BatchRunner<'a, S> {
    pub fn new(surface: &'a S, config: CaptureConfig) -> Self {
        Self {
            surface,
            config,
            counter: SlideCounter::new(),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn counter(&self) -> &SlideCounter {
        &self.counter
    }

    /// Capture every slide of every document into `output_dir`.
    ///
    /// The only error returned is failure to create `output_dir`; document
    /// level failures are reported in the `BatchReport`.
    pub fn run_batch(
        &mut self,
        documents: &[PathBuf],
        output_dir: &Path,
        user_selector: Option<&str>,
    ) -> Result<BatchReport> {
        std::fs::create_dir_all(output_dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot create output directory {}: {}", output_dir.display(), e),
            ))
        })?;
        Ok(self.run(documents, output_dir, user_selector, Mode::Capture))
    }

    /// Resolve every document and report the files a capture run would write.
    ///
    /// Nothing is written and `output_dir` is not created.
    pub fn plan_batch(
        &mut self,
        documents: &[PathBuf],
        output_dir: &Path,
        user_selector: Option<&str>,
    ) -> BatchReport {
        self.run(documents, output_dir, user_selector, Mode::Plan)
    }

    fn run(
        &mut self,
        documents: &[PathBuf],
        output_dir: &Path,
        user_selector: Option<&str>,
        mode: Mode,
    ) -> BatchReport {
        let started = Instant::now();
        self.counter.reset();

        let mut reports = Vec::with_capacity(documents.len());
        for (idx, path) in documents.iter().enumerate() {
            info!(
                "[File {}/{}] Processing: {}",
                idx + 1,
                documents.len(),
                path.display()
            );
            let report = self.process_document(path, output_dir, user_selector, mode);
            if let DocumentStatus::Failed(e) = &report.status {
                warn!(
                    "ERROR processing {} during {}: {}",
                    path.display(),
                    e.stage(),
                    e
                );
            }
            reports.push(report);
        }

        BatchReport {
            documents: reports,
            output_dir: output_dir.to_path_buf(),
            elapsed: started.elapsed(),
            total_slides: self.counter.value(),
        }
    }

    /// Open, process and always close one document.
    fn process_document(
        &mut self,
        path: &Path,
        output_dir: &Path,
        user_selector: Option<&str>,
        mode: Mode,
    ) -> DocumentReport {
        let mut session = match self.surface.open(path) {
            Ok(session) => session,
            Err(e) => return DocumentReport::new(path, DocumentStatus::Failed(e)),
        };

        let report = self.process_session(&mut session, path, output_dir, user_selector, mode);

        if let Err(e) = session.close() {
            warn!("Failed to close session for {}: {}", path.display(), e);
        }
        report
    }

    fn process_session(
        &mut self,
        session: &mut S::Session,
        path: &Path,
        output_dir: &Path,
        user_selector: Option<&str>,
        mode: Mode,
    ) -> DocumentReport {
        let settle = self.config.settle_duration();
        if !settle.is_zero() {
            info!("Waiting for page to render ({} ms)...", self.config.settle_ms);
        }
        if let Err(e) = session.settle(settle) {
            return DocumentReport::new(path, DocumentStatus::Failed(e));
        }

        let resolved = match resolve::resolve(&*session, user_selector) {
            Some(resolved) => resolved,
            None => {
                warn!("No slides found in {}", path.display());
                return DocumentReport::new(path, DocumentStatus::NoSlides);
            }
        };

        info!(
            "Found {} slide(s) with '{}' ({})",
            resolved.match_count(),
            resolved.selector,
            resolved.strategy
        );
        self.emit_slides(&*session, path, output_dir, resolved, mode)
    }

    fn emit_slides(
        &mut self,
        session: &S::Session,
        path: &Path,
        output_dir: &Path,
        resolved: ResolvedSelector,
        mode: Mode,
    ) -> DocumentReport {
        let ResolvedSelector {
            selector,
            strategy,
            slides,
        } = resolved;
        let total = slides.len();
        let mut report = DocumentReport::new(
            path,
            DocumentStatus::Completed {
                selector: selector.clone(),
                strategy,
            },
        );

        for (i, slide) in slides.iter().enumerate() {
            let number = self.counter.next_number();
            let name = slide_file_name(number, self.config.number_width, self.config.image_format);
            let dest = output_dir.join(&name);

            if mode == Mode::Plan {
                info!("  [{}/{}] Would capture: {}", i + 1, total, name);
                report.files.push(dest);
                continue;
            }

            match session.capture(slide, &dest) {
                Ok(()) => {
                    info!("  [{}/{}] Captured: {}", i + 1, total, name);
                    report.files.push(dest);
                }
                Err(e) => {
                    report.failed_slides += 1;
                    match self.config.capture_policy {
                        CapturePolicy::AbortDocument => {
                            report.status = DocumentStatus::Failed(e);
                            return report;
                        }
                        CapturePolicy::SkipSlide => {
                            warn!("  [{}/{}] Skipped {}: {}", i + 1, total, name, e);
                        }
                    }
                }
            }
        }

        if report.files.is_empty() && report.failed_slides > 0 {
            report.status = DocumentStatus::Failed(Error::CaptureError(format!(
                "all {} slide capture(s) failed",
                report.failed_slides
            )));
            return report;
        }

        info!(
            "Completed: {} ({} slide(s))",
            path.display(),
            report.files.len()
        );
        report
    }
}

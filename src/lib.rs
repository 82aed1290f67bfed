//! slidecap
//!
//! Batch-renders HTML slide decks in a headless browser and exports every
//! slide element as a standalone image. Slides are numbered with a single
//! counter shared across all input documents, so a run over `a.html` and
//! `b.html` produces `01.png, 02.png, ...` in document order.
//!
//! # Features
//!
//! - **CDP Backend** (default): headless Chrome via `headless_chrome`
//! - **Static Backend** (default): `scraper`-based surface for dry runs
//!   without a browser; it can resolve selectors but cannot rasterize
//! - **Selector detection**: finds the repeated top-level element that
//!   represents one slide without being told its class name
//!
//! # Example
//!
//! ```no_run
//! use slidecap::{BatchRunner, CaptureConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig::default();
//! let documents = slidecap::discovery::discover_documents("decks".as_ref(), &config.input_extension)?;
//!
//! let surface = slidecap::new_surface(config.clone())?;
//! let mut runner = BatchRunner::new(&surface, config);
//! let report = runner.run_batch(&documents, "output_images".as_ref(), None)?;
//! println!("captured {} slides", report.total_slides());
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod detect;
pub mod discovery;
pub mod resolve;

#[cfg(feature = "cdp")]
pub mod cdp;

// Static HTML backend (no JS, no screenshots)
#[cfg(feature = "simple")]
pub mod simple;

pub use capture::{BatchReport, BatchRunner, DocumentReport, DocumentStatus, SlideCounter};
pub use detect::{CandidateClass, CandidateElement, DetectedSelector};
pub use resolve::{ResolvedSelector, Strategy};

/// Configuration for a capture run
///
/// The defaults reproduce the behaviour of the classic slide export setup:
/// a 1280x720 viewport rendered at 2x, a three second settle period and
/// two-digit PNG file names.
///
/// # Examples
///
/// ```
/// let cfg = slidecap::CaptureConfig::default();
/// assert_eq!(cfg.settle_ms, 3000);
/// assert_eq!(cfg.number_width, 2);
/// ```
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Pixel density of the produced images
    pub device_scale_factor: f64,
    /// Time to wait after load before measuring or capturing
    pub settle_ms: u64,
    /// Transport timeout for individual backend calls in milliseconds
    pub timeout_ms: u64,
    /// Encoding of the written images
    pub image_format: ImageFormat,
    /// Minimum number of digits in output file names
    pub number_width: usize,
    /// Extension of input documents, without the dot
    pub input_extension: String,
    /// What to do when a single slide fails to capture
    pub capture_policy: CapturePolicy,
    /// Run the browser without a window
    pub headless: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            device_scale_factor: 2.0,
            settle_ms: 3000,
            timeout_ms: 30000,
            image_format: ImageFormat::Png,
            number_width: 2,
            input_extension: "html".to_string(),
            capture_policy: CapturePolicy::AbortDocument,
            headless: true,
        }
    }
}

impl CaptureConfig {
    /// Settle period as a `Duration`
    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Reject configurations no backend can honour.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if !(self.device_scale_factor > 0.0) {
            return Err(Error::ConfigError(format!(
                "device scale factor must be positive, got {}",
                self.device_scale_factor
            )));
        }
        if self.number_width == 0 {
            return Err(Error::ConfigError("number width must be at least 1".into()));
        }
        if self.input_extension.trim_start_matches('.').is_empty() {
            return Err(Error::ConfigError("input extension must not be empty".into()));
        }
        Ok(())
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Image encoding used for captured slides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(Error::ConfigError(format!("unsupported image format '{}'", other))),
        }
    }
}

/// Behaviour when one slide of a document cannot be captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    /// Stop capturing the document, keep what was already written
    AbortDocument,
    /// Skip only the failing slide and carry on
    SkipSlide,
}

/// Owned handle to one element matched by a selector.
///
/// `index` is the element's position in DOM query order. Backends resolve the
/// handle again when capturing, so it stays valid for the lifetime of the
/// session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRef {
    pub selector: String,
    pub index: usize,
}

impl SlideRef {
    pub fn new(selector: impl Into<String>, index: usize) -> Self {
        Self {
            selector: selector.into(),
            index,
        }
    }

    /// Handles for the first `count` matches of `selector`
    pub fn all(selector: &str, count: usize) -> Vec<SlideRef> {
        (0..count).map(|i| SlideRef::new(selector, i)).collect()
    }
}

/// One loaded document inside a rendering surface
pub trait DocumentSession {
    /// Path the session was opened from
    fn source(&self) -> &Path;

    /// Wait for deferred rendering (fonts, scripts, images) to finish.
    fn settle(&mut self, duration: Duration) -> Result<()> {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
        Ok(())
    }

    /// Evaluate a selector and return handles to the matches in DOM order
    fn query(&self, selector: &str) -> Result<Vec<SlideRef>>;

    /// Run the read-only detection probe: first class token and rendered
    /// size of every direct child `div` of `body`, in DOM order.
    fn collect_candidates(&self) -> Result<Vec<CandidateElement>>;

    /// Write an image of exactly the element's box to `dest`
    fn capture(&self, slide: &SlideRef, dest: &Path) -> Result<()>;

    /// Release all resources held by the session
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// A backend that can open documents for inspection and capture
pub trait RenderingSurface {
    type Session: DocumentSession;

    /// Load a local document and return a fresh session for it
    fn open(&self, source: &Path) -> Result<Self::Session>;
}

/// Create the default rendering surface
///
/// This prefers the CDP backend when the `cdp` feature is enabled (default).
/// Without it, the static backend is used, which can plan but not capture.
#[cfg(feature = "cdp")]
pub fn new_surface(config: CaptureConfig) -> Result<impl RenderingSurface> {
    cdp::CdpSurface::new(config)
}

#[cfg(all(not(feature = "cdp"), feature = "simple"))]
pub fn new_surface(config: CaptureConfig) -> Result<impl RenderingSurface> {
    simple::StaticSurface::new(config)
}

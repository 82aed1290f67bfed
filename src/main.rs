use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use slidecap::{
    discovery, BatchReport, BatchRunner, CaptureConfig, CapturePolicy, DocumentStatus,
    ImageFormat, RenderingSurface, Viewport,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    /// Headless Chrome over the DevTools protocol
    Chrome,
    /// Static HTML parsing, dry runs only
    Static,
}

#[derive(Parser)]
#[command(name = "slidecap")]
#[command(version)]
#[command(about = "Capture every slide of a folder of HTML decks as numbered images", long_about = None)]
struct Cli {
    /// Directory containing the HTML decks
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output directory for the images
    #[arg(short, long, default_value = "output_images")]
    output: PathBuf,

    /// CSS selector for slide elements (auto-detected when omitted)
    #[arg(short, long)]
    selector: Option<String>,

    /// Milliseconds to wait after load before capturing
    #[arg(long, default_value_t = 3000)]
    settle_ms: u64,

    /// Device scale factor of the captured images
    #[arg(long, default_value_t = 2.0)]
    scale: f64,

    /// Viewport width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Image format (png, jpeg)
    #[arg(short, long, default_value = "png")]
    format: ImageFormat,

    /// Minimum digits in output file names
    #[arg(long, default_value_t = 2)]
    digits: usize,

    /// Extension of the input documents
    #[arg(long, default_value = "html")]
    extension: String,

    /// Keep going within a document when one slide fails to capture
    #[arg(long)]
    skip_failed_slides: bool,

    /// Resolve selectors and list the files that would be written
    #[arg(long)]
    dry_run: bool,

    /// Rendering backend
    #[arg(long, value_enum, default_value = "chrome")]
    backend: Backend,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> CaptureConfig {
        CaptureConfig {
            viewport: Viewport {
                width: self.width,
                height: self.height,
            },
            device_scale_factor: self.scale,
            settle_ms: self.settle_ms,
            image_format: self.format,
            number_width: self.digits,
            input_extension: self.extension.clone(),
            capture_policy: if self.skip_failed_slides {
                CapturePolicy::SkipSlide
            } else {
                CapturePolicy::AbortDocument
            },
            headless: !self.headed,
            ..Default::default()
        }
    }
}

fn execute<S: RenderingSurface>(
    surface: &S,
    config: CaptureConfig,
    documents: &[PathBuf],
    output: &Path,
    selector: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<BatchReport> {
    let mut runner = BatchRunner::new(surface, config);
    if dry_run {
        return Ok(runner.plan_batch(documents, output, selector));
    }
    runner
        .run_batch(documents, output, selector)
        .context("batch aborted before capture")
}

fn print_summary(report: &BatchReport, dry_run: bool) {
    let rule = "=".repeat(60);
    println!("\n{}", rule);
    println!(
        "{}",
        if dry_run {
            "DRY RUN COMPLETED"
        } else {
            "BATCH PROCESSING COMPLETED"
        }
    );
    println!("{}", rule);

    for doc in &report.documents {
        let name = doc
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| doc.source.display().to_string());
        match &doc.status {
            DocumentStatus::Completed { selector, strategy } => {
                println!("  {}: {} slide(s) via '{}' ({})", name, doc.files.len(), selector, strategy)
            }
            DocumentStatus::NoSlides => println!("  {}: no slides found", name),
            DocumentStatus::Failed(e) => println!(
                "  {}: failed during {} after {} slide(s): {}",
                name,
                e.stage(),
                doc.files.len(),
                e
            ),
        }
    }

    println!("Total HTML files processed: {}", report.documents.len());
    println!("Total slides captured: {}", report.total_slides());
    if report.failed_slides() > 0 {
        println!("Slides that failed to capture: {}", report.failed_slides());
    }
    println!("Output directory: {}", report.output_dir.display());
    let mut files = report.files();
    if let Some(first) = files.next() {
        let last = files.last().unwrap_or(first);
        let short = |p: &PathBuf| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        println!("Files: {} -> {}", short(first), short(last));
    }
    println!("Time elapsed: {:.2} seconds", report.elapsed.as_secs_f64());
    println!("{}\n", rule);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = cli.config();
    config.validate()?;

    if !cli.input.is_dir() {
        bail!(
            "input directory {} does not exist or is not a directory",
            cli.input.display()
        );
    }
    let documents = match discovery::discover_documents(&cli.input, &config.input_extension) {
        Ok(documents) => documents,
        Err(e) => {
            // An empty directory is reported, not treated as a failure.
            println!("{}", e);
            return Ok(());
        }
    };

    let selector = cli.selector.as_deref();
    let report = match cli.backend {
        #[cfg(feature = "cdp")]
        Backend::Chrome => {
            log::info!("Launching Chromium browser...");
            let surface = slidecap::cdp::CdpSurface::new(config.clone())
                .context("could not start headless Chrome")?;
            execute(&surface, config, &documents, &cli.output, selector, cli.dry_run)?
        }
        #[cfg(not(feature = "cdp"))]
        Backend::Chrome => bail!("slidecap was built without the `cdp` feature"),

        #[cfg(feature = "simple")]
        Backend::Static => {
            if !cli.dry_run {
                bail!("the static backend cannot rasterize; use it with --dry-run");
            }
            let surface = slidecap::simple::StaticSurface::new(config.clone())?;
            execute(&surface, config, &documents, &cli.output, selector, true)?
        }
        #[cfg(not(feature = "simple"))]
        Backend::Static => bail!("slidecap was built without the `simple` feature"),
    };

    print_summary(&report, cli.dry_run);
    Ok(())
}

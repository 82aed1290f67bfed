//! Chrome DevTools Protocol rendering surface

use crate::{
    CandidateElement, CaptureConfig, DocumentSession, Error, ImageFormat, RenderingSurface,
    Result, SlideRef,
};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::{Browser, Element, LaunchOptions};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const JPEG_QUALITY: u32 = 90;

// Both probes return a JSON string so the value comes back by value over CDP.
const CANDIDATE_PROBE: &str = r#"
(function() {
    try {
        const out = [];
        for (const el of document.querySelectorAll('body > div')) {
            if (el.classList.length === 0) continue;
            const rect = el.getBoundingClientRect();
            out.push({ token: el.classList[0], width: rect.width, height: rect.height });
        }
        return JSON.stringify({ candidates: out });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()
"#;

const QUERY_TEMPLATE: &str = r#"
(function() {
    try {
        return JSON.stringify({ count: document.querySelectorAll({{SELECTOR}}).length });
    } catch (e) {
        return JSON.stringify({ error: String(e) });
    }
})()
"#;

#[derive(Deserialize)]
struct CandidateReply {
    #[serde(default)]
    candidates: Vec<CandidateElement>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct QueryReply {
    #[serde(default)]
    count: usize,
    error: Option<String>,
}

/// Convert a local path into the `file://` URL Chrome navigates to.
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::fs::canonicalize(path)
        .map_err(|e| Error::LoadError(format!("Cannot resolve {}: {}", path.display(), e)))?;
    Url::from_file_path(&absolute).map_err(|_| {
        Error::LoadError(format!("Cannot convert {} to a file URL", absolute.display()))
    })
}

/// CDP-based rendering surface (uses the `headless_chrome` crate)
///
/// Launches one headless Chrome for the whole batch and opens a fresh tab
/// per document.
pub struct CdpSurface {
    browser: Browser,
    config: CaptureConfig,
}

impl CdpSurface {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;

        // The transport must survive the settle sleep without events.
        let idle = Duration::from_millis(config.timeout_ms + config.settle_ms);
        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(idle)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        Ok(Self { browser, config })
    }
}

impl RenderingSurface for CdpSurface {
    type Session = CdpSession;

    fn open(&self, source: &Path) -> Result<CdpSession> {
        let url = file_url(source)?;
        debug!("Loading: {}", url);

        let tab = self
            .browser
            .new_tab()
            .map_err(|e| Error::LoadError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(self.config.timeout_ms));

        let session = CdpSession {
            tab,
            nodes: RefCell::new(HashMap::new()),
            source: source.to_path_buf(),
            image_format: self.config.image_format,
            scale: self.config.device_scale_factor,
        };

        if let Err(e) = session.navigate(url.as_str()) {
            // The tab is already open; release it before reporting.
            if let Err(close_err) = session.close() {
                warn!("Failed to close tab for {}: {}", source.display(), close_err);
            }
            return Err(e);
        }
        Ok(session)
    }
}

/// One Chrome tab holding a loaded document
pub struct CdpSession {
    tab: Arc<Tab>,
    /// DOM node ids per selector, looked up once on first capture
    nodes: RefCell<HashMap<String, Vec<NodeId>>>,
    source: PathBuf,
    image_format: ImageFormat,
    scale: f64,
}

impl CdpSession {
    fn navigate(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn evaluate_json<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::ScriptError(format!("Evaluation failed: {}", e)))?;

        let value = remote
            .value
            .ok_or_else(|| Error::ScriptError("No value returned from evaluation".into()))?;
        let text = value
            .as_str()
            .ok_or_else(|| Error::ScriptError(format!("Expected a JSON string, got {}", value)))?;

        serde_json::from_str(text)
            .map_err(|e| Error::ScriptError(format!("Malformed probe result: {}", e)))
    }

    /// Handle for the `index`-th match of `selector`.
    fn element(&self, selector: &str, index: usize) -> Result<Element<'_>> {
        let node_id = {
            let mut nodes = self.nodes.borrow_mut();
            if !nodes.contains_key(selector) {
                let found = self.tab.find_elements(selector).map_err(|e| {
                    Error::CaptureError(format!("'{}' no longer matches: {}", selector, e))
                })?;
                debug!("'{}' resolved to {} element(s)", selector, found.len());
                nodes.insert(selector.to_string(), found.iter().map(|el| el.node_id).collect());
            }
            let node_id = nodes.get(selector).and_then(|ids| ids.get(index).copied());
            node_id.ok_or_else(|| {
                Error::CaptureError(format!(
                    "element {} of '{}' is no longer attached",
                    index, selector
                ))
            })?
        };

        Element::new(&self.tab, node_id)
            .map_err(|e| Error::CaptureError(format!("Stale element {} of '{}': {}", index, selector, e)))
    }

    fn screenshot_format(&self) -> (Page::CaptureScreenshotFormatOption, Option<u32>) {
        match self.image_format {
            ImageFormat::Png => (Page::CaptureScreenshotFormatOption::Png, None),
            ImageFormat::Jpeg => (Page::CaptureScreenshotFormatOption::Jpeg, Some(JPEG_QUALITY)),
        }
    }
}

impl DocumentSession for CdpSession {
    fn source(&self) -> &Path {
        &self.source
    }

    fn query(&self, selector: &str) -> Result<Vec<SlideRef>> {
        let literal = serde_json::to_string(selector)
            .map_err(|e| Error::QueryError(format!("Cannot encode selector: {}", e)))?;
        let script = QUERY_TEMPLATE.replace("{{SELECTOR}}", &literal);

        let reply: QueryReply = self.evaluate_json(&script)?;
        if let Some(err) = reply.error {
            return Err(Error::QueryError(format!("'{}': {}", selector, err)));
        }
        Ok(SlideRef::all(selector, reply.count))
    }

    fn collect_candidates(&self) -> Result<Vec<CandidateElement>> {
        let reply: CandidateReply = self.evaluate_json(CANDIDATE_PROBE)?;
        if let Some(err) = reply.error {
            return Err(Error::QueryError(format!("Candidate probe threw: {}", err)));
        }
        Ok(reply.candidates)
    }

    fn capture(&self, slide: &SlideRef, dest: &Path) -> Result<()> {
        let element = self.element(&slide.selector, slide.index)?;

        element
            .scroll_into_view()
            .map_err(|e| Error::CaptureError(format!("Failed to scroll into view: {}", e)))?;
        let mut clip = element
            .get_box_model()
            .map_err(|e| Error::CaptureError(format!("Element has no box: {}", e)))?
            .border_viewport();
        clip.scale = self.scale;

        let (format, quality) = self.screenshot_format();
        let data = self
            .tab
            .capture_screenshot(format, quality, Some(clip), true)
            .map_err(|e| Error::CaptureError(format!("Screenshot failed: {}", e)))?;

        std::fs::write(dest, data)?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.tab
            .close(true)
            .map_err(|e| Error::CdpError(format!("Failed to close tab: {}", e)))?;
        Ok(())
    }
}

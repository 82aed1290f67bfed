//! A browser-less surface that parses documents with `scraper`.
//!
//! This surface is intentionally minimal: it reads the file from disk,
//! answers selector queries and runs the candidate probe against the parsed
//! tree, which is enough to plan a batch without Chrome. There is no layout
//! engine, so element sizes come from inline `width`/`height` pixel styles
//! and are 0 otherwise. Rasterization is not supported.

use crate::detect::CANDIDATE_SCOPE;
use crate::{
    CandidateElement, CaptureConfig, DocumentSession, Error, RenderingSurface, Result, SlideRef,
};
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Surface backed by static HTML parsing
pub struct StaticSurface {
    config: CaptureConfig,
}

impl StaticSurface {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }
}

impl RenderingSurface for StaticSurface {
    type Session = StaticSession;

    fn open(&self, source: &Path) -> Result<StaticSession> {
        let html = std::fs::read_to_string(source)
            .map_err(|e| Error::LoadError(format!("Cannot read {}: {}", source.display(), e)))?;
        Ok(StaticSession {
            document: Html::parse_document(&html),
            source: source.to_path_buf(),
        })
    }
}

/// A parsed document
pub struct StaticSession {
    document: Html,
    source: PathBuf,
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::QueryError(format!("'{}': {:?}", selector, e)))
}

/// Pixel value of `property` in an inline style attribute, if present.
fn inline_px(style: &str, property: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case(property) {
            return None;
        }
        value.trim().strip_suffix("px")?.trim().parse().ok()
    })
}

impl DocumentSession for StaticSession {
    fn source(&self) -> &Path {
        &self.source
    }

    // Nothing renders asynchronously without a browser.
    fn settle(&mut self, _duration: Duration) -> Result<()> {
        Ok(())
    }

    fn query(&self, selector: &str) -> Result<Vec<SlideRef>> {
        let parsed = parse_selector(selector)?;
        let count = self.document.select(&parsed).count();
        Ok(SlideRef::all(selector, count))
    }

    fn collect_candidates(&self) -> Result<Vec<CandidateElement>> {
        let direct = parse_selector(CANDIDATE_SCOPE)?;
        let candidates = self
            .document
            .select(&direct)
            .filter_map(|el| {
                let token = el.value().attr("class")?.split_whitespace().next()?;
                let style = el.value().attr("style").unwrap_or("");
                Some(CandidateElement::new(
                    token,
                    inline_px(style, "width").unwrap_or(0.0),
                    inline_px(style, "height").unwrap_or(0.0),
                ))
            })
            .collect();
        Ok(candidates)
    }

    fn capture(&self, slide: &SlideRef, _dest: &Path) -> Result<()> {
        Err(Error::CaptureError(format!(
            "static surface cannot rasterize element {} of '{}'",
            slide.index, slide.selector
        )))
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

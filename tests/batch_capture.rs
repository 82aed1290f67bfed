//! Batch capture behaviour against a scripted in-memory surface

use slidecap::{
    BatchRunner, CandidateElement, CaptureConfig, CapturePolicy, DocumentSession, DocumentStatus,
    Error, RenderingSurface, Result, SlideRef, Strategy,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

#[derive(Clone, Default)]
struct DocScript {
    matches: HashMap<String, usize>,
    candidates: Vec<CandidateElement>,
    fail_open: bool,
    fail_settle: bool,
    fail_capture_at: Option<usize>,
}

impl DocScript {
    fn with_class(token: &str, count: usize, size: f64) -> Self {
        let mut script = DocScript::default();
        script.matches.insert(format!(".{}", token), count);
        script.matches.insert(format!("body > div.{}", token), count);
        script.candidates = vec![CandidateElement::new(token, size, size); count];
        script
    }

    fn matching(mut self, selector: &str, count: usize) -> Self {
        self.matches.insert(selector.to_string(), count);
        self
    }
}

type EventLog = Rc<RefCell<Vec<String>>>;

struct ScriptedSurface {
    scripts: HashMap<PathBuf, DocScript>,
    events: EventLog,
}

impl ScriptedSurface {
    fn new(scripts: Vec<(&str, DocScript)>) -> Self {
        Self {
            scripts: scripts
                .into_iter()
                .map(|(name, s)| (PathBuf::from(name), s))
                .collect(),
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    fn documents(&self) -> Vec<PathBuf> {
        let mut docs: Vec<PathBuf> = self.scripts.keys().cloned().collect();
        docs.sort();
        docs
    }
}

struct ScriptedSession {
    path: PathBuf,
    script: DocScript,
    events: EventLog,
    captures: Cell<usize>,
}

impl ScriptedSession {
    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

impl RenderingSurface for ScriptedSurface {
    type Session = ScriptedSession;

    fn open(&self, source: &Path) -> Result<ScriptedSession> {
        self.events
            .borrow_mut()
            .push(format!("open {}", source.display()));
        let script = self.scripts.get(source).cloned().unwrap_or_default();
        if script.fail_open {
            return Err(Error::LoadError(format!("cannot open {}", source.display())));
        }
        Ok(ScriptedSession {
            path: source.to_path_buf(),
            script,
            events: self.events.clone(),
            captures: Cell::new(0),
        })
    }
}

impl DocumentSession for ScriptedSession {
    fn source(&self) -> &Path {
        &self.path
    }

    fn settle(&mut self, duration: Duration) -> Result<()> {
        self.events
            .borrow_mut()
            .push(format!("settle {} {}", self.name(), duration.as_millis()));
        if self.script.fail_settle {
            return Err(Error::ScriptError("renderer crashed".into()));
        }
        Ok(())
    }

    fn query(&self, selector: &str) -> Result<Vec<SlideRef>> {
        self.events
            .borrow_mut()
            .push(format!("query {} {}", self.name(), selector));
        let n = self.script.matches.get(selector).copied().unwrap_or(0);
        Ok(SlideRef::all(selector, n))
    }

    fn collect_candidates(&self) -> Result<Vec<CandidateElement>> {
        self.events.borrow_mut().push(format!("probe {}", self.name()));
        Ok(self.script.candidates.clone())
    }

    fn capture(&self, slide: &SlideRef, dest: &Path) -> Result<()> {
        let nth = self.captures.get();
        self.captures.set(nth + 1);
        if self.script.fail_capture_at == Some(nth) {
            return Err(Error::CaptureError("element detached".into()));
        }
        let file = dest.file_name().unwrap().to_string_lossy().into_owned();
        self.events
            .borrow_mut()
            .push(format!("capture {} {}", self.name(), file));
        std::fs::write(dest, format!("{}#{}", slide.selector, slide.index))?;
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.events.borrow_mut().push(format!("close {}", self.name()));
        Ok(())
    }
}

fn quick_config() -> CaptureConfig {
    CaptureConfig {
        settle_ms: 0,
        ..Default::default()
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn numbering_runs_across_documents() {
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("out");
    let surface = ScriptedSurface::new(vec![
        ("a.html", DocScript::with_class("slide-a", 3, 1280.0)),
        ("b.html", DocScript::with_class("page-b", 2, 1280.0)),
    ]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.run_batch(&surface.documents(), &out, None).unwrap();

    assert_eq!(report.total_slides(), 5);
    assert_eq!(
        file_names(&out),
        vec!["01.png", "02.png", "03.png", "04.png", "05.png"]
    );
    assert_eq!(std::fs::read_to_string(out.join("04.png")).unwrap(), "body > div.page-b#0");

    let events = surface.events();
    let a_caps: Vec<_> = events
        .iter()
        .filter(|e| e.starts_with("capture a.html"))
        .collect();
    assert_eq!(a_caps, vec!["capture a.html 01.png", "capture a.html 02.png", "capture a.html 03.png"]);

    match &report.documents[1].status {
        DocumentStatus::Completed { selector, strategy } => {
            assert_eq!(selector, ".page-b");
            assert_eq!(*strategy, Strategy::Detected);
        }
        other => panic!("unexpected status {:?}", other),
    }
}

#[test]
fn counter_resets_between_batches() {
    let temp = tempfile::TempDir::new().unwrap();
    let surface = ScriptedSurface::new(vec![("a.html", DocScript::with_class("slide", 2, 900.0))]);
    let mut runner = BatchRunner::new(&surface, quick_config());

    let first = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();
    let second = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();
    assert_eq!(first.total_slides(), 2);
    assert_eq!(second.total_slides(), 2);
    assert_eq!(file_names(temp.path()), vec!["01.png", "02.png"]);
}

#[test]
fn user_selector_skips_detection_and_sweep() {
    let temp = tempfile::TempDir::new().unwrap();
    let script = DocScript::with_class("slide", 4, 1280.0).matching(".mine", 2);
    let surface = ScriptedSurface::new(vec![("a.html", script)]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner
        .run_batch(&surface.documents(), temp.path(), Some(".mine"))
        .unwrap();

    assert_eq!(report.total_slides(), 2);
    let events = surface.events();
    assert!(!events.iter().any(|e| e.starts_with("probe")));
    let queries: Vec<_> = events.iter().filter(|e| e.starts_with("query")).collect();
    assert_eq!(queries, vec!["query a.html .mine"]);
}

#[test]
fn blacklisted_only_document_falls_back_to_sweep() {
    let temp = tempfile::TempDir::new().unwrap();
    let script = DocScript::with_class("modal-wrapper", 5, 1280.0).matching("section", 3);
    let surface = ScriptedSurface::new(vec![("a.html", script)]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    assert_eq!(report.total_slides(), 3);
    match &report.documents[0].status {
        DocumentStatus::Completed { selector, strategy } => {
            assert_eq!(selector, "section");
            assert_eq!(*strategy, Strategy::CommonSweep);
        }
        other => panic!("unexpected status {:?}", other),
    }
    assert!(!surface
        .events()
        .iter()
        .any(|e| e == "query a.html .modal-wrapper"));
}

#[test]
fn empty_and_broken_documents_do_not_stop_the_batch() {
    let temp = tempfile::TempDir::new().unwrap();
    let broken = DocScript {
        fail_open: true,
        ..Default::default()
    };
    let surface = ScriptedSurface::new(vec![
        ("a.html", DocScript::with_class("slide", 2, 1280.0)),
        ("b.html", DocScript::default()),
        ("c.html", broken),
        ("d.html", DocScript::with_class("card", 2, 400.0)),
    ]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    assert_eq!(report.total_slides(), 4);
    assert!(matches!(report.documents[1].status, DocumentStatus::NoSlides));
    assert!(matches!(
        report.documents[2].status,
        DocumentStatus::Failed(Error::LoadError(_))
    ));
    assert_eq!(report.failed_documents(), 1);
    assert_eq!(file_names(temp.path()), vec!["01.png", "02.png", "03.png", "04.png"]);

    // Every opened session is closed; the failed open never had one.
    let events = surface.events();
    for doc in ["a.html", "b.html", "d.html"] {
        assert!(events.contains(&format!("close {}", doc)));
    }
    assert!(!events.contains(&"close c.html".to_string()));
}

#[test]
fn capture_failure_aborts_document_but_keeps_progress() {
    let temp = tempfile::TempDir::new().unwrap();
    let failing = DocScript {
        fail_capture_at: Some(1),
        ..DocScript::with_class("slide", 3, 1280.0)
    };
    let surface = ScriptedSurface::new(vec![
        ("a.html", failing),
        ("b.html", DocScript::with_class("slide", 2, 1280.0)),
    ]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    let first = &report.documents[0];
    assert!(matches!(first.status, DocumentStatus::Failed(Error::CaptureError(_))));
    assert_eq!(first.files.len(), 1);
    assert_eq!(first.failed_slides, 1);

    // 02 was consumed by the failed capture and stays a gap.
    assert_eq!(file_names(temp.path()), vec!["01.png", "03.png", "04.png"]);
    assert_eq!(report.total_slides(), 4);
    assert!(surface.events().contains(&"close a.html".to_string()));
}

#[test]
fn skip_policy_isolates_single_slides() {
    let temp = tempfile::TempDir::new().unwrap();
    let failing = DocScript {
        fail_capture_at: Some(0),
        ..DocScript::with_class("slide", 3, 1280.0)
    };
    let surface = ScriptedSurface::new(vec![("a.html", failing)]);
    let config = CaptureConfig {
        capture_policy: CapturePolicy::SkipSlide,
        ..quick_config()
    };

    let mut runner = BatchRunner::new(&surface, config);
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    assert!(matches!(report.documents[0].status, DocumentStatus::Completed { .. }));
    assert_eq!(report.failed_slides(), 1);
    assert_eq!(file_names(temp.path()), vec!["02.png", "03.png"]);
}

#[test]
fn output_directory_is_created_idempotently() {
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("nested").join("images");
    let surface = ScriptedSurface::new(vec![("a.html", DocScript::with_class("slide", 2, 1280.0))]);
    let mut runner = BatchRunner::new(&surface, quick_config());

    runner.run_batch(&surface.documents(), &out, None).unwrap();
    assert!(out.is_dir());
    runner.run_batch(&surface.documents(), &out, None).unwrap();
    assert_eq!(file_names(&out), vec!["01.png", "02.png"]);
}

#[test]
fn plan_writes_nothing() {
    let temp = tempfile::TempDir::new().unwrap();
    let out = temp.path().join("planned");
    let surface = ScriptedSurface::new(vec![
        ("a.html", DocScript::with_class("slide", 2, 1280.0)),
        ("b.html", DocScript::with_class("slide", 1, 1280.0).matching(".slide", 1)),
    ]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.plan_batch(&surface.documents(), &out, None);

    let planned: Vec<_> = report
        .files()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(planned, vec!["01.png", "02.png", "03.png"]);
    assert!(!out.exists());
    assert!(!surface.events().iter().any(|e| e.starts_with("capture")));
}

#[test]
fn settle_runs_after_open_and_before_resolution() {
    let temp = tempfile::TempDir::new().unwrap();
    let surface = ScriptedSurface::new(vec![("a.html", DocScript::with_class("slide", 2, 1280.0))]);
    let config = CaptureConfig {
        settle_ms: 25,
        ..Default::default()
    };

    let mut runner = BatchRunner::new(&surface, config);
    runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    let events = surface.events();
    let position = |prefix: &str| events.iter().position(|e| e.starts_with(prefix)).unwrap();
    assert_eq!(events[position("settle")], "settle a.html 25");
    assert!(position("open") < position("settle"));
    assert!(position("settle") < position("probe"));
    assert!(position("settle") < position("query"));
}

#[test]
fn settle_failure_fails_document_and_closes_session() {
    let temp = tempfile::TempDir::new().unwrap();
    let crashing = DocScript {
        fail_settle: true,
        ..DocScript::with_class("slide", 2, 1280.0)
    };
    let surface = ScriptedSurface::new(vec![
        ("a.html", crashing),
        ("b.html", DocScript::with_class("slide", 2, 1280.0)),
    ]);

    let mut runner = BatchRunner::new(&surface, quick_config());
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    assert!(matches!(
        report.documents[0].status,
        DocumentStatus::Failed(Error::ScriptError(_))
    ));
    let events = surface.events();
    assert!(!events.iter().any(|e| e == "probe a.html" || e.starts_with("query a.html")));
    assert!(events.contains(&"close a.html".to_string()));
    assert_eq!(file_names(temp.path()), vec!["01.png", "02.png"]);
}

#[test]
fn skip_policy_with_no_successful_capture_fails_document() {
    let temp = tempfile::TempDir::new().unwrap();
    // A single `.slide` is not trusted by detection; the sweep finds it.
    let failing = DocScript {
        fail_capture_at: Some(0),
        ..DocScript::with_class("slide", 1, 1280.0)
    };
    let surface = ScriptedSurface::new(vec![
        ("a.html", failing),
        ("b.html", DocScript::with_class("slide", 2, 1280.0)),
    ]);
    let config = CaptureConfig {
        capture_policy: CapturePolicy::SkipSlide,
        ..quick_config()
    };

    let mut runner = BatchRunner::new(&surface, config);
    let report = runner.run_batch(&surface.documents(), temp.path(), None).unwrap();

    assert!(matches!(
        report.documents[0].status,
        DocumentStatus::Failed(Error::CaptureError(_))
    ));
    assert_eq!(report.failed_documents(), 1);
    assert_eq!(report.failed_slides(), 1);
    assert_eq!(file_names(temp.path()), vec!["02.png", "03.png"]);
}

//! Recording test double for the rendering engine capability.
#![allow(dead_code)]

use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pagepress::core::engine::{EngineStatus, PageEngine, RenderSession};
use pagepress::core::pipeline::ExportOptions;
use pagepress::error::ConvertError;

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake artifact";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SessionOpened,
    Loaded,
    Settled,
    Exported,
    Closed,
}

/// Engine double that records every lifecycle call instead of launching a
/// real browser. Failure injection is per stage.
pub struct FakeEngine {
    pub events: Arc<Mutex<Vec<Event>>>,
    pub fail_open: bool,
    pub fail_load: bool,
    pub fail_export: bool,
    failed_opens: AtomicU64,
}

impl FakeEngine {
    pub fn ok() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            fail_open: false,
            fail_load: false,
            fail_export: false,
            failed_opens: AtomicU64::new(0),
        }
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::ok()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::ok()
        }
    }

    pub fn failing_export() -> Self {
        Self {
            fail_export: true,
            ..Self::ok()
        }
    }

    pub fn recorded(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl PageEngine for FakeEngine {
    fn open_session(&self) -> Result<Box<dyn RenderSession>, ConvertError> {
        if self.fail_open {
            self.failed_opens.fetch_add(1, Ordering::SeqCst);
            return Err(ConvertError::SessionAcquisition(anyhow!(
                "engine refused to start"
            )));
        }
        self.events.lock().push(Event::SessionOpened);
        Ok(Box::new(FakeSession {
            events: Arc::clone(&self.events),
            fail_load: self.fail_load,
            fail_export: self.fail_export,
        }))
    }

    fn status(&self) -> EngineStatus {
        let events = self.events.lock();
        let opened = events.iter().filter(|e| **e == Event::SessionOpened).count() as u64;
        let closed = events.iter().filter(|e| **e == Event::Closed).count() as u64;
        EngineStatus {
            sessions_opened: opened,
            sessions_failed: self.failed_opens.load(Ordering::SeqCst),
            active_sessions: opened - closed,
        }
    }
}

struct FakeSession {
    events: Arc<Mutex<Vec<Event>>>,
    fail_load: bool,
    fail_export: bool,
}

impl RenderSession for FakeSession {
    fn load_markup(&mut self, _markup: &str) -> Result<()> {
        if self.fail_load {
            return Err(anyhow!("navigation failed"));
        }
        self.events.lock().push(Event::Loaded);
        Ok(())
    }

    fn wait_until_settled(&mut self) -> Result<()> {
        self.events.lock().push(Event::Settled);
        Ok(())
    }

    fn export_pdf(&mut self, _options: &ExportOptions) -> Result<Vec<u8>> {
        if self.fail_export {
            return Err(anyhow!("print failed"));
        }
        self.events.lock().push(Event::Exported);
        Ok(FAKE_PDF.to_vec())
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.events.lock().push(Event::Closed);
    }
}

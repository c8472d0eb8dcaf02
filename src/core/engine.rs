//! The external rendering engine as an opaque capability with an explicit
//! session lifecycle, plus the headless Chromium implementation of it.

use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use parking_lot::Mutex;
use serde::Serialize;
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::core::formats;
use crate::core::pipeline::ExportOptions;
use crate::core::units::MM_PER_INCH;
use crate::error::ConvertError;

/// One isolated, single-use rendering session. Loading and export happen in
/// order; the session is released when the value is dropped, on every exit
/// path.
pub trait RenderSession {
    /// Loads markup text into the session's viewport.
    fn load_markup(&mut self, markup: &str) -> Result<()>;

    /// Suspends until the loaded content has settled, or fails once the
    /// configured readiness timeout elapses.
    fn wait_until_settled(&mut self) -> Result<()>;

    /// Exports the rendered state as PDF bytes.
    fn export_pdf(&mut self, options: &ExportOptions) -> Result<Vec<u8>>;
}

/// Factory for rendering sessions. Implementations hold no per-request
/// state; every conversion request gets a fresh session.
pub trait PageEngine: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn RenderSession>, ConvertError>;

    /// Session counters for the health surface.
    fn status(&self) -> EngineStatus;
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct EngineStatus {
    pub sessions_opened: u64,
    pub sessions_failed: u64,
    pub active_sessions: u64,
}

/// Readiness polling knobs for the Chromium session.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub load_timeout_ms: u64,
    /// Quiescence window applied after the document reports complete, so
    /// late-settling sub-resources are flushed before export.
    pub settle_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            load_timeout_ms: 10_000,
            settle_ms: 500,
        }
    }
}

/// Headless Chromium behind the [`PageEngine`] capability. One browser
/// process per session, torn down with the session.
pub struct ChromiumEngine {
    launch_options: LaunchOptions<'static>,
    config: EngineConfig,
    status: Arc<Mutex<EngineStatus>>,
}

impl ChromiumEngine {
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, ConvertError> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-software-rasterizer"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-networking"),
                OsStr::new("--disable-sync"),
                OsStr::new("--metrics-recording-only"),
                OsStr::new("--mute-audio"),
                OsStr::new("--no-first-run"),
                OsStr::new("--disable-default-apps"),
            ])
            .build()
            .map_err(|_| {
                ConvertError::SessionAcquisition(anyhow!("Could not find Chrome/Chromium binary"))
            })?;

        Ok(Self {
            launch_options,
            config,
            status: Arc::new(Mutex::new(EngineStatus::default())),
        })
    }
}

impl PageEngine for ChromiumEngine {
    fn open_session(&self) -> Result<Box<dyn RenderSession>, ConvertError> {
        let opened = Browser::new(self.launch_options.clone())
            .and_then(|browser| browser.new_tab().map(|tab| (browser, tab)));

        let (browser, tab) = match opened {
            Ok(pair) => pair,
            Err(e) => {
                self.status.lock().sessions_failed += 1;
                return Err(ConvertError::SessionAcquisition(e));
            }
        };

        {
            let mut status = self.status.lock();
            status.sessions_opened += 1;
            status.active_sessions += 1;
        }
        tracing::debug!("Chromium session opened");

        Ok(Box::new(ChromiumSession {
            _browser: browser,
            tab,
            config: self.config,
            status: Arc::clone(&self.status),
        }))
    }

    fn status(&self) -> EngineStatus {
        *self.status.lock()
    }
}

struct ChromiumSession {
    // Owns the browser process; dropping it kills Chromium.
    _browser: Browser,
    tab: Arc<Tab>,
    config: EngineConfig,
    status: Arc<Mutex<EngineStatus>>,
}

impl RenderSession for ChromiumSession {
    fn load_markup(&mut self, markup: &str) -> Result<()> {
        let data_url = format!(
            "data:text/html;base64,{}",
            general_purpose::STANDARD.encode(markup)
        );
        self.tab.navigate_to(&data_url)?;
        Ok(())
    }

    fn wait_until_settled(&mut self) -> Result<()> {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_attempts = self.config.load_timeout_ms / self.config.poll_interval_ms.max(1);
        let mut attempts = 0;

        while attempts < max_attempts {
            let ready: bool = self
                .tab
                .evaluate("document.readyState === \"complete\"", false)?
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

            if ready {
                tracing::debug!("Document complete after {} attempts", attempts);
                break;
            }

            sleep(poll_interval);
            attempts += 1;
        }

        if attempts >= max_attempts {
            return Err(anyhow!(
                "Timeout waiting for content to settle after {}ms",
                self.config.load_timeout_ms
            ));
        }

        // Quiescence window for sub-resources that land after readyState.
        sleep(Duration::from_millis(self.config.settle_ms));

        Ok(())
    }

    fn export_pdf(&mut self, options: &ExportOptions) -> Result<Vec<u8>> {
        let pdf = self.tab.print_to_pdf(Some(print_options(options)?))?;
        Ok(pdf)
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            tracing::warn!("Failed to close tab during cleanup: {}", e);
        } else {
            tracing::debug!("Chromium session closed");
        }
        self.status.lock().active_sessions -= 1;
    }
}

/// Translates export options into the CDP print call, which takes paper
/// dimensions and margins in inches.
fn print_options(options: &ExportOptions) -> Result<PrintToPdfOptions> {
    let format = formats::lookup(&options.format)
        .ok_or_else(|| anyhow!("unknown page format: {}", options.format))?;
    let inches = |mm: f64| mm / MM_PER_INCH;

    Ok(PrintToPdfOptions {
        landscape: Some(options.landscape),
        print_background: Some(options.print_background),
        paper_width: Some(inches(format.width_mm)),
        paper_height: Some(inches(format.height_mm)),
        margin_top: Some(inches(options.margins.top)),
        margin_bottom: Some(inches(options.margins.bottom)),
        margin_left: Some(inches(options.margins.left)),
        margin_right: Some(inches(options.margins.right)),
        ..PrintToPdfOptions::default()
    })
}

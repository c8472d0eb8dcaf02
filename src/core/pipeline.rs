//! Conversion pipeline: resolve a content source, run it through a
//! single-use rendering session and write the page-accurate artifact.
//!
//! Per request the pipeline walks Idle -> SessionOpen -> ContentLoaded ->
//! Exported -> Closed; any failure wraps the originating cause with its
//! stage and still releases the session. No retries, no session reuse.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::engine::{EngineStatus, PageEngine};
use crate::core::formats;
use crate::core::geometry::{Margins, Orientation};
use crate::error::ConvertError;

/// A content source: markup stored at a location, or an inline payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSource {
    File(PathBuf),
    Inline(String),
}

impl ContentSource {
    /// Produces the markup text. Missing files are rejected here, before any
    /// session is acquired.
    pub fn resolve_markup(&self) -> Result<String, ConvertError> {
        match self {
            ContentSource::File(path) => {
                if !path.is_file() {
                    return Err(ConvertError::SourceNotFound(path.clone()));
                }
                fs::read_to_string(path).map_err(|e| {
                    ConvertError::Load(anyhow!("failed to read {}: {e}", path.display()))
                })
            }
            ContentSource::Inline(markup) => Ok(markup.clone()),
        }
    }
}

/// Page export options applied by the rendering session. Immutable value
/// object constructed per call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Named physical page size, see [`crate::core::formats`].
    pub format: String,
    pub landscape: bool,
    /// Margins in millimetres.
    pub margins: Margins,
    pub print_background: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: "A4".to_string(),
            landscape: false,
            margins: Margins::zero(),
            print_background: true,
        }
    }
}

impl ExportOptions {
    /// Rejects unknown formats and margins that leave no printable area.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let format = formats::lookup(&self.format).ok_or_else(|| {
            ConvertError::Configuration(format!("unknown page format: {}", self.format))
        })?;

        let m = &self.margins;
        if [m.top, m.right, m.bottom, m.left]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(ConvertError::Configuration(
                "margins must be non-negative".to_string(),
            ));
        }

        let orientation = if self.landscape {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        };
        let (page_w, page_h) = format.oriented(orientation);
        if m.horizontal() >= page_w || m.vertical() >= page_h {
            return Err(ConvertError::Configuration(format!(
                "margins leave no printable area on a {page_w}x{page_h}mm page"
            )));
        }

        Ok(())
    }
}

/// Runs conversion requests against a [`PageEngine`]. Holds no per-request
/// state; requests may run concurrently, each with its own session.
#[derive(Clone)]
pub struct Converter {
    engine: Arc<dyn PageEngine>,
}

impl Converter {
    pub fn new(engine: Arc<dyn PageEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_status(&self) -> EngineStatus {
        self.engine.status()
    }

    /// Renders a content source and writes the PDF artifact to
    /// `destination`, creating intermediate directories as needed.
    pub async fn convert(
        &self,
        source: ContentSource,
        destination: PathBuf,
        options: ExportOptions,
    ) -> Result<(), ConvertError> {
        let converter = self.clone();

        tokio::task::spawn_blocking(move || {
            converter.convert_sync(&source, &destination, &options)
        })
        .await
        .map_err(|e| ConvertError::Export(anyhow!("task join error: {e}")))?
    }

    /// Renders a content source and returns the PDF bytes.
    pub async fn render_pdf(
        &self,
        source: ContentSource,
        options: ExportOptions,
    ) -> Result<Vec<u8>, ConvertError> {
        let converter = self.clone();

        tokio::task::spawn_blocking(move || converter.render_sync(&source, &options))
            .await
            .map_err(|e| ConvertError::Export(anyhow!("task join error: {e}")))?
    }

    pub fn convert_sync(
        &self,
        source: &ContentSource,
        destination: &Path,
        options: &ExportOptions,
    ) -> Result<(), ConvertError> {
        options.validate()?;
        let markup = source.resolve_markup()?;

        // Destination structure is prepared before a session is acquired;
        // creation is idempotent.
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ConvertError::Export(anyhow!(
                        "failed to create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let pdf = self.render_markup(&markup, options)?;
        write_artifact(destination, &pdf)?;

        tracing::info!("PDF written to {}", destination.display());
        Ok(())
    }

    pub fn render_sync(
        &self,
        source: &ContentSource,
        options: &ExportOptions,
    ) -> Result<Vec<u8>, ConvertError> {
        options.validate()?;
        let markup = source.resolve_markup()?;
        self.render_markup(&markup, options)
    }

    fn render_markup(&self, markup: &str, options: &ExportOptions) -> Result<Vec<u8>, ConvertError> {
        let mut session = self.engine.open_session()?;

        session.load_markup(markup).map_err(ConvertError::Load)?;
        session.wait_until_settled().map_err(ConvertError::Load)?;

        let pdf = session.export_pdf(options).map_err(ConvertError::Export)?;

        tracing::info!("Rendered {} bytes of PDF", pdf.len());
        Ok(pdf)
        // Session drops here; release also runs on the error paths above.
    }
}

/// Writes to a sibling temp file and renames it onto the destination, so a
/// failed export never leaves a partial artifact behind.
fn write_artifact(destination: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let mut part = destination.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    fs::write(&part, bytes).map_err(|e| {
        ConvertError::Export(anyhow!("failed to write {}: {e}", part.display()))
    })?;
    fs::rename(&part, destination).map_err(|e| {
        let _ = fs::remove_file(&part);
        ConvertError::Export(anyhow!(
            "failed to move artifact to {}: {e}",
            destination.display()
        ))
    })
}

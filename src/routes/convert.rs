use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use poem::web::Data;
use poem_openapi::{
    OpenApi, Tags,
    payload::{Attachment, Json},
};

use crate::{
    AppState,
    core::{formats, pipeline::ContentSource},
    schemas::{
        common::{BadRequestResponse, InternalServerErrorResponse},
        convert::{Base64Pdf, ConvertRequest, ConvertResponse, FormatInfo, ListFormatsResponse},
    },
};

#[derive(Tags)]
enum ApiConvertTags {
    Convert,
}

pub struct ApiConvert;

#[OpenApi()]
impl ApiConvert {
    /// Convert
    ///
    /// Render HTML markup into a page-accurate PDF using a headless browser.
    ///
    /// # Example Request
    /// ```json
    /// {
    ///   "html": "<html><body><h1>Sample Report</h1></body></html>",
    ///   "options": {
    ///     "format": "A4",
    ///     "landscape": false,
    ///     "margin_top": 20,
    ///     "margin_bottom": 20
    ///   }
    /// }
    /// ```
    #[oai(path = "/convert", method = "post", tag = "ApiConvertTags::Convert")]
    async fn convert(
        &self,
        Json(json): Json<ConvertRequest>,
        state: Data<&Arc<AppState>>,
    ) -> ConvertResponse {
        let options = json
            .options
            .as_ref()
            .map(|o| o.to_export_options())
            .unwrap_or_default();
        let return_base64 = json
            .options
            .as_ref()
            .and_then(|o| o.return_base64)
            .unwrap_or(false);

        tracing::info!(
            "Converting: format={}, landscape={}, {} bytes of markup",
            options.format,
            options.landscape,
            json.html.len()
        );

        let source = ContentSource::Inline(json.html);
        let result = match state.converter.render_pdf(source, options).await {
            Ok(pdf) => pdf,
            Err(e) if e.is_caller_error() => {
                return ConvertResponse::BadRequest(Json(BadRequestResponse::new(e.to_string())));
            }
            Err(e) => {
                tracing::error!("Conversion failed at stage {}: {}", e.stage(), e);
                return ConvertResponse::InternalServerError(Json(
                    InternalServerErrorResponse::new(
                        "route.convert",
                        "convert",
                        e.stage(),
                        &e.to_string(),
                    ),
                ));
            }
        };

        tracing::info!("Conversion completed, size: {} bytes", result.len());

        if return_base64 {
            ConvertResponse::Base64(Json(Base64Pdf {
                data: general_purpose::STANDARD.encode(&result),
                mime_type: "application/pdf".to_string(),
            }))
        } else {
            ConvertResponse::Pdf(Attachment::new(result))
        }
    }

    /// List Page Formats
    ///
    /// Get all named page formats accepted by the convert endpoint
    #[oai(path = "/formats", method = "get")]
    async fn list_formats(&self) -> ListFormatsResponse {
        let formats = formats::all()
            .into_iter()
            .map(|(name, format)| FormatInfo {
                name: name.to_string(),
                width_mm: format.width_mm,
                height_mm: format.height_mm,
            })
            .collect();

        ListFormatsResponse::Ok(Json(formats))
    }

    #[oai(path = "/health", method = "get")]
    async fn health(&self, state: Data<&Arc<AppState>>) -> Json<serde_json::Value> {
        let status = state.converter.engine_status();

        Json(serde_json::json!({
            "status": "healthy",
            "sessions": {
                "opened": status.sessions_opened,
                "failed": status.sessions_failed,
                "active": status.active_sessions
            }
        }))
    }
}

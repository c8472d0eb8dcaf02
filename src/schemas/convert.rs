use poem_openapi::{
    ApiResponse, Object,
    payload::{Attachment, Json},
};
use serde::{Deserialize, Serialize};

use crate::core::geometry::Margins;
use crate::core::pipeline::ExportOptions;

use super::common::{BadRequestResponse, InternalServerErrorResponse};

#[derive(Object, Deserialize, Clone)]
pub struct PdfOptions {
    /// Named page format (A0-A5, Letter, Legal, Tabloid, Ledger).
    /// Default: A4
    pub format: Option<String>,

    /// Landscape orientation. Default: false
    pub landscape: Option<bool>,

    /// Top margin in millimetres. Default: 0
    #[oai(validator(minimum(value = "0"), maximum(value = "500")))]
    pub margin_top: Option<f64>,

    /// Right margin in millimetres. Default: 0
    #[oai(validator(minimum(value = "0"), maximum(value = "500")))]
    pub margin_right: Option<f64>,

    /// Bottom margin in millimetres. Default: 0
    #[oai(validator(minimum(value = "0"), maximum(value = "500")))]
    pub margin_bottom: Option<f64>,

    /// Left margin in millimetres. Default: 0
    #[oai(validator(minimum(value = "0"), maximum(value = "500")))]
    pub margin_left: Option<f64>,

    /// Render element backgrounds into the PDF. Default: true
    pub print_background: Option<bool>,

    /// Return base64 encoded string instead of binary
    pub return_base64: Option<bool>,
}

impl PdfOptions {
    pub fn to_export_options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        ExportOptions {
            format: self.format.clone().unwrap_or(defaults.format),
            landscape: self.landscape.unwrap_or(defaults.landscape),
            margins: Margins {
                top: self.margin_top.unwrap_or(0.0),
                right: self.margin_right.unwrap_or(0.0),
                bottom: self.margin_bottom.unwrap_or(0.0),
                left: self.margin_left.unwrap_or(0.0),
            },
            print_background: self.print_background.unwrap_or(defaults.print_background),
        }
    }
}

#[derive(Object, Deserialize, Clone)]
pub struct ConvertRequest {
    /// Markup to render.
    pub html: String,

    /// Page export options.
    pub options: Option<PdfOptions>,
}

#[derive(Object, Serialize)]
pub struct Base64Pdf {
    /// Base64 encoded PDF data
    pub data: String,

    /// MIME type of the artifact
    pub mime_type: String,
}

#[derive(Object, Serialize)]
pub struct FormatInfo {
    pub name: String,
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(ApiResponse)]
pub enum ConvertResponse {
    /// PDF Document
    #[oai(status = 200, content_type = "application/pdf")]
    Pdf(Attachment<Vec<u8>>),

    #[oai(status = 200, content_type = "application/json")]
    Base64(Json<Base64Pdf>),

    #[oai(status = 400)]
    BadRequest(Json<BadRequestResponse>),

    #[oai(status = 500)]
    InternalServerError(Json<InternalServerErrorResponse>),
}

#[derive(ApiResponse)]
pub enum ListFormatsResponse {
    #[oai(status = 200, content_type = "application/json")]
    Ok(Json<Vec<FormatInfo>>),
}

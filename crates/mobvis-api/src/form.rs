use std::collections::HashMap;
use std::io::Cursor;

use axum::body::Bytes;
use axum::extract::Multipart;
use mobvis_core::{ExtractionError, ExtractionRequest};

/// Field names the frontend and older clients use for the uploaded CSV.
pub const UPLOAD_FIELDS: [&str; 2] = ["csvFile", "file"];

#[derive(Debug, Clone)]
pub struct UploadedCsv {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedCsv {
    pub fn digest(&self) -> String {
        blake3::hash(&self.bytes).to_hex().to_string()
    }

    pub fn into_reader(self) -> Cursor<Bytes> {
        Cursor::new(self.bytes)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionForm {
    pub name: String,
    pub description: String,
    pub public: Option<bool>,
    pub request: ExtractionRequest,
    pub upload: UploadedCsv,
}

pub(crate) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

struct Fields(HashMap<String, String>);

impl Fields {
    fn required(&self, name: &str) -> Result<&str, ExtractionError> {
        self.0
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ExtractionError::Validation(format!("missing form field '{name}'")))
    }

    fn float(&self, name: &str) -> Result<f64, ExtractionError> {
        let raw = self.required(name)?;
        raw.trim().parse().map_err(|_| {
            ExtractionError::Validation(format!("form field '{name}' must be a number, got '{raw}'"))
        })
    }

    fn integer(&self, name: &str) -> Result<i64, ExtractionError> {
        let raw = self.required(name)?;
        raw.trim().parse().map_err(|_| {
            ExtractionError::Validation(format!(
                "form field '{name}' must be an integer, got '{raw}'"
            ))
        })
    }

    fn boolean(&self, name: &str) -> Result<bool, ExtractionError> {
        let raw = self.required(name)?;
        parse_bool(raw).ok_or_else(|| {
            ExtractionError::Validation(format!(
                "form field '{name}' must be a boolean, got '{raw}'"
            ))
        })
    }
}

/// Reads the extraction form. Every field is required; `public` only when
/// the route asks for it.
pub async fn read_form(
    multipart: &mut Multipart,
    include_public_flag: bool,
) -> Result<ExtractionForm, ExtractionError> {
    let mut fields = HashMap::new();
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ExtractionError::Validation(format!("malformed form data: {}", err.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if UPLOAD_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(|err| {
                ExtractionError::Validation(format!("failed to read upload: {}", err.body_text()))
            })?;
            upload = Some(UploadedCsv { file_name, bytes });
        } else {
            let value = field.text().await.map_err(|err| {
                ExtractionError::Validation(format!(
                    "failed to read form field '{name}': {}",
                    err.body_text()
                ))
            })?;
            fields.insert(name, value);
        }
    }

    let upload = upload.ok_or_else(|| {
        ExtractionError::Validation("missing CSV upload in form field 'csvFile'".to_string())
    })?;
    let fields = Fields(fields);

    let public = if include_public_flag {
        Some(fields.boolean("public")?)
    } else {
        None
    };

    Ok(ExtractionForm {
        name: fields.required("name")?.to_string(),
        description: fields.required("description")?.to_string(),
        public,
        request: ExtractionRequest {
            sampling_rate_hz: fields.integer("samplingRate")?,
            sensor_height_m: fields.float("sensorHeight")?,
            height_m: fields.float("patientHeight")?,
            measurement_condition: fields.required("setting")?.to_string(),
            convert_to_ms: fields.boolean("convertToMs")?,
        },
        upload,
    })
}

use std::collections::HashMap;

use axum::extract::Multipart;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppError;

/// A file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body split into text fields and file parts.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl UploadForm {
    /// Drain a multipart request. Parts with a file name are files, the rest
    /// are text. Later parts with the same name replace earlier ones.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Failed to read file: {e}")))?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Invalid field '{name}': {e}")))?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed text field; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn required_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("Field '{name}' is required")))
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|f| !f.bytes.is_empty())
    }

    #[cfg(test)]
    pub fn with_fields(fields: &[(&str, &str)]) -> Self {
        UploadForm {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.files.insert(name.to_string(), file);
        self
    }
}

/// Parse a user-supplied date: Unix milliseconds, RFC 3339, or `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_date(value: &str) -> Result<DateTime<Utc>, AppError> {
    let value = value.trim();

    if let Ok(millis) = value.parse::<i64>() {
        return DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| AppError::BadRequest(format!("Timestamp out of range: {value}")));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    Err(AppError::BadRequest(format!(
        "Invalid date '{value}'. Expected Unix milliseconds, RFC 3339 or YYYY-MM-DD"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2025-03-14").unwrap(), expected);
        assert_eq!(parse_date("2025-03-14T00:00:00Z").unwrap(), expected);
        assert_eq!(parse_date("2025-03-14T01:00:00+01:00").unwrap(), expected);
        assert_eq!(
            parse_date(&expected.timestamp_millis().to_string()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(parse_date("14/03/2025"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_date(""), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_form_text_accessors() {
        let form = UploadForm::with_fields(&[("title", "  Fall  "), ("zone", "   ")]);
        assert_eq!(form.text("title").as_deref(), Some("Fall"));
        assert!(form.text("zone").is_none());
        assert!(matches!(form.required_text("zone"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_empty_file_is_absent() {
        let mut form = UploadForm::default().with_file(
            "file",
            UploadedFile {
                file_name: "empty.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                bytes: vec![],
            },
        );
        assert!(form.take_file("file").is_none());
    }
}

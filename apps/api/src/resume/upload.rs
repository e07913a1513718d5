//! Multipart form reading shared by the resume and editor endpoints.
//!
//! Recognised parts:
//! * `resume`: JSON body (resume endpoints only)
//! * `photo`: the image file
//! * `photo_last_modified`: client-reported mtime of the file, epoch millis

use axum::extract::multipart::{Field, Multipart};
use bytes::Bytes;

use crate::errors::AppError;
use crate::resume::document::PendingPhoto;

#[derive(Debug, Default)]
pub struct UploadForm {
    pub resume_json: Option<String>,
    pub photo: Option<PendingPhoto>,
}

struct PhotoPart {
    name: String,
    content_type: String,
    bytes: Bytes,
}

fn bad_multipart(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {e}"))
}

async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field.text().await.map_err(bad_multipart)
}

pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut resume_json = None;
    let mut photo_part = None;
    let mut last_modified = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let part_name = field.name().unwrap_or_default().to_string();
        match part_name.as_str() {
            "resume" => resume_json = Some(read_text(field).await?),
            "photo" => {
                let name = field.file_name().unwrap_or("photo").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                photo_part = Some(PhotoPart {
                    name,
                    content_type,
                    bytes,
                });
            }
            "photo_last_modified" => {
                let raw = read_text(field).await?;
                last_modified = Some(raw.trim().parse::<i64>().map_err(|_| {
                    AppError::Validation("photo_last_modified must be epoch milliseconds".into())
                })?);
            }
            _ => {}
        }
    }

    let photo = match photo_part {
        // Browsers send an empty part when no file was picked.
        Some(part) if !part.bytes.is_empty() => {
            let photo = PendingPhoto::new(part.name, part.content_type, last_modified, part.bytes);
            photo.validate()?;
            Some(photo)
        }
        _ => None,
    };

    Ok(UploadForm { resume_json, photo })
}

//! In-memory resume document, as authored through the multi-step editor.

use std::fmt;

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRecord;

/// Largest photo accepted for upload.
pub const MAX_PHOTO_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    Square,
    Circle,
    Squircle,
}

impl BorderStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorderStyle::Square => "square",
            BorderStyle::Circle => "circle",
            BorderStyle::Squircle => "squircle",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "square" => Some(BorderStyle::Square),
            "circle" => Some(BorderStyle::Circle),
            "squircle" => Some(BorderStyle::Squircle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkExperience {
    pub position: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Education {
    pub institution: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Award {
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub date_received: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Certificate {
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub title: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub publication_url: Option<String>,
    pub description: Option<String>,
}

/// An entry with every field empty is a placeholder the editor added but the
/// user never filled in. Placeholders are stored but never rendered.
pub trait Entry {
    fn is_placeholder(&self) -> bool;
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

impl Entry for WorkExperience {
    fn is_placeholder(&self) -> bool {
        blank(&self.position)
            && blank(&self.company)
            && self.start_date.is_none()
            && self.end_date.is_none()
            && blank(&self.description)
    }
}

impl Entry for Education {
    fn is_placeholder(&self) -> bool {
        blank(&self.institution)
            && blank(&self.field_of_study)
            && self.start_date.is_none()
            && self.end_date.is_none()
            && blank(&self.description)
    }
}

impl Entry for Award {
    fn is_placeholder(&self) -> bool {
        blank(&self.title)
            && blank(&self.issuer)
            && self.date_received.is_none()
            && blank(&self.description)
    }
}

impl Entry for Certificate {
    fn is_placeholder(&self) -> bool {
        blank(&self.title)
            && blank(&self.issuer)
            && self.issue_date.is_none()
            && blank(&self.credential_id)
            && blank(&self.credential_url)
            && blank(&self.description)
    }
}

impl Entry for Project {
    fn is_placeholder(&self) -> bool {
        blank(&self.title)
            && self.publication_date.is_none()
            && blank(&self.publication_url)
            && blank(&self.description)
    }
}

/// Iterates the entries of a collection that would actually be rendered.
pub fn rendered<T: Entry>(entries: &[T]) -> impl Iterator<Item = &T> {
    entries.iter().filter(|e| !e.is_placeholder())
}

/// Everything the form edits except the photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeContent {
    pub title: Option<String>,
    pub description: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub summary: Option<String>,
    pub color_hex: Option<String>,
    pub border_style: Option<BorderStyle>,
    pub work_experiences: Vec<WorkExperience>,
    pub educations: Vec<Education>,
    pub awards: Vec<Award>,
    pub certificates: Vec<Certificate>,
    pub projects: Vec<Project>,
    pub skills: Vec<String>,
}

impl ResumeContent {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(hex) = self.color_hex.as_deref() {
            if !is_hex_color(hex) {
                return Err(AppError::Validation(format!(
                    "color_hex must look like #RRGGBB, got '{hex}'"
                )));
            }
        }
        if let Some(email) = self.email.as_deref() {
            if !email.trim().is_empty() && !email.contains('@') {
                return Err(AppError::Validation("email must be a valid address".into()));
            }
        }
        Ok(())
    }
}

fn is_hex_color(raw: &str) -> bool {
    raw.len() == 7
        && raw.starts_with('#')
        && raw[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Trims, drops empty values and removes duplicates while keeping first-seen order.
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        let skill = skill.trim();
        if skill.is_empty() || out.iter().any(|s| s == skill) {
            continue;
        }
        out.push(skill.to_string());
    }
    out
}

/// A photo picked locally but not yet uploaded.
///
/// Equality only looks at the descriptive metadata, so re-reading the same
/// file does not register as a change.
#[derive(Clone, Serialize)]
pub struct PendingPhoto {
    pub name: String,
    pub size: usize,
    pub content_type: String,
    /// Milliseconds since the epoch, as reported by the client.
    pub last_modified: Option<i64>,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl PendingPhoto {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        last_modified: Option<i64>,
        bytes: Bytes,
    ) -> Self {
        Self {
            name: name.into(),
            size: bytes.len(),
            content_type: content_type.into(),
            last_modified,
            bytes,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if !self.content_type.starts_with("image/") {
            return Err(AppError::Validation("photo must be an image file".into()));
        }
        if self.size > MAX_PHOTO_BYTES {
            return Err(AppError::Validation("photo must be less than 4MB".into()));
        }
        Ok(())
    }

    /// File extension including the dot, taken from the uploaded file name.
    pub fn extension(&self) -> &str {
        match self.name.rfind('.') {
            Some(idx) if idx > 0 => &self.name[idx..],
            _ => "",
        }
    }
}

impl PartialEq for PendingPhoto {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.size == other.size
            && self.content_type == other.content_type
            && self.last_modified == other.last_modified
    }
}

impl fmt::Debug for PendingPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingPhoto")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .field("last_modified", &self.last_modified)
            .finish()
    }
}

/// State of the resume photo. Exactly one holds at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PhotoRef {
    #[default]
    Absent,
    Stored { url: String },
    Pending(PendingPhoto),
    /// The user removed the photo; the stored object is deleted on next save.
    Remove,
}

impl PhotoRef {
    /// What the reference becomes once a save that carried it has succeeded.
    pub fn settled(&self, photo_url: Option<&str>) -> PhotoRef {
        match self {
            PhotoRef::Pending(_) | PhotoRef::Stored { .. } => match photo_url {
                Some(url) => PhotoRef::Stored {
                    url: url.to_string(),
                },
                None => PhotoRef::Absent,
            },
            PhotoRef::Remove | PhotoRef::Absent => PhotoRef::Absent,
        }
    }
}

/// One resume as held by an editing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResumeDocument {
    /// Absent until the first successful save.
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub content: ResumeContent,
    pub photo: PhotoRef,
}

impl ResumeDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(record: ResumeRecord) -> Self {
        let ResumeRecord {
            resume,
            work_experiences,
            educations,
            awards,
            certificates,
            projects,
        } = record;

        let photo = match resume.photo_url {
            Some(url) => PhotoRef::Stored { url },
            None => PhotoRef::Absent,
        };

        ResumeDocument {
            id: Some(resume.id),
            content: ResumeContent {
                title: resume.title,
                description: resume.description,
                first_name: resume.first_name,
                last_name: resume.last_name,
                job_title: resume.job_title,
                city: resume.city,
                country: resume.country,
                phone: resume.phone,
                email: resume.email,
                summary: resume.summary,
                color_hex: resume.color_hex,
                border_style: resume.border_style.as_deref().and_then(BorderStyle::parse),
                work_experiences: work_experiences
                    .into_iter()
                    .map(|row| WorkExperience {
                        position: row.position,
                        company: row.company,
                        start_date: row.start_date,
                        end_date: row.end_date,
                        description: row.description,
                    })
                    .collect(),
                educations: educations
                    .into_iter()
                    .map(|row| Education {
                        institution: row.institution,
                        field_of_study: row.field_of_study,
                        start_date: row.start_date,
                        end_date: row.end_date,
                        description: row.description,
                    })
                    .collect(),
                awards: awards
                    .into_iter()
                    .map(|row| Award {
                        title: row.title,
                        issuer: row.issuer,
                        date_received: row.date_received,
                        description: row.description,
                    })
                    .collect(),
                certificates: certificates
                    .into_iter()
                    .map(|row| Certificate {
                        title: row.title,
                        issuer: row.issuer,
                        issue_date: row.issue_date,
                        credential_id: row.credential_id,
                        credential_url: row.credential_url,
                        description: row.description,
                    })
                    .collect(),
                projects: projects
                    .into_iter()
                    .map(|row| Project {
                        title: row.title,
                        publication_date: row.publication_date,
                        publication_url: row.publication_url,
                        description: row.description,
                    })
                    .collect(),
                skills: resume.skills,
            },
            photo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(name: &str, bytes: &'static [u8]) -> PendingPhoto {
        PendingPhoto::new(name, "image/png", Some(1_700_000_000_000), Bytes::from_static(bytes))
    }

    #[test]
    fn test_empty_entry_is_placeholder() {
        assert!(WorkExperience::default().is_placeholder());
        assert!(Certificate {
            title: Some("   ".into()),
            ..Default::default()
        }
        .is_placeholder());
    }

    #[test]
    fn test_any_field_makes_entry_real() {
        let award = Award {
            date_received: NaiveDate::from_ymd_opt(2023, 5, 1),
            ..Default::default()
        };
        assert!(!award.is_placeholder());
    }

    #[test]
    fn test_rendered_skips_placeholders_but_keeps_order() {
        let projects = vec![
            Project {
                title: Some("First".into()),
                ..Default::default()
            },
            Project::default(),
            Project {
                title: Some("Second".into()),
                ..Default::default()
            },
        ];
        let titles: Vec<_> = rendered(&projects)
            .map(|p| p.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn test_pending_photo_equality_ignores_bytes() {
        assert_eq!(photo("me.png", b"one"), photo("me.png", b"two"));
        assert_ne!(photo("me.png", b"one"), photo("you.png", b"one"));
    }

    #[test]
    fn test_photo_validation() {
        assert!(photo("me.png", b"data").validate().is_ok());
        let pdf = PendingPhoto::new("cv.pdf", "application/pdf", None, Bytes::from_static(b"x"));
        assert!(pdf.validate().is_err());
        let huge = PendingPhoto::new(
            "big.png",
            "image/png",
            None,
            Bytes::from(vec![0u8; MAX_PHOTO_BYTES + 1]),
        );
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_extension() {
        assert_eq!(photo("me.final.jpeg", b"x").extension(), ".jpeg");
        assert_eq!(photo("noext", b"x").extension(), "");
        assert_eq!(photo(".hidden", b"x").extension(), "");
    }

    #[test]
    fn test_color_hex_validation() {
        let mut content = ResumeContent {
            color_hex: Some("#1a2B3c".into()),
            ..Default::default()
        };
        assert!(content.validate().is_ok());
        content.color_hex = Some("red".into());
        assert!(content.validate().is_err());
    }

    #[test]
    fn test_normalize_skills() {
        let skills = vec![
            " Rust ".to_string(),
            "".to_string(),
            "SQL".to_string(),
            "Rust".to_string(),
        ];
        assert_eq!(normalize_skills(&skills), vec!["Rust", "SQL"]);
    }

    #[test]
    fn test_settled_photo() {
        let pending = PhotoRef::Pending(photo("me.png", b"x"));
        assert_eq!(
            pending.settled(Some("https://cdn/x.png")),
            PhotoRef::Stored {
                url: "https://cdn/x.png".into()
            }
        );
        assert_eq!(PhotoRef::Remove.settled(None), PhotoRef::Absent);
    }

    #[test]
    fn test_content_deserializes_partial_json() {
        let content: ResumeContent = serde_json::from_str(
            r#"{"title":"Backend","border_style":"squircle","work_experiences":[{"company":"Acme","start_date":"2021-03-01"}]}"#,
        )
        .unwrap();
        assert_eq!(content.border_style, Some(BorderStyle::Squircle));
        assert_eq!(
            content.work_experiences[0].start_date,
            NaiveDate::from_ymd_opt(2021, 3, 1)
        );
        assert!(content.skills.is_empty());
    }
}

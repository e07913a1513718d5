use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub color_hex: Option<String>,
    pub border_style: Option<String>,
    pub summary: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub skills: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkExperienceRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub position: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EducationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub institution: Option<String>,
    pub field_of_study: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AwardRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub date_received: Option<NaiveDate>,
    pub description: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CertificateRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: Option<String>,
    pub issuer: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub credential_id: Option<String>,
    pub credential_url: Option<String>,
    pub description: Option<String>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub title: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub publication_url: Option<String>,
    pub description: Option<String>,
    pub sort_order: i32,
}

/// A resume row together with its child collections, in stored order.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeRecord {
    #[serde(flatten)]
    pub resume: ResumeRow,
    pub work_experiences: Vec<WorkExperienceRow>,
    pub educations: Vec<EducationRow>,
    pub awards: Vec<AwardRow>,
    pub certificates: Vec<CertificateRow>,
    pub projects: Vec<ProjectRow>,
}

//! Postgres storage for resumes and their child collections.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::info;
use uuid::Uuid;

use crate::errors::SaveError;
use crate::models::resume::{
    AwardRow, CertificateRow, EducationRow, ProjectRow, ResumeRecord, ResumeRow,
    WorkExperienceRow,
};
use crate::resume::document::ResumeContent;

/// How a write treats the stored photo URL.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoColumn {
    /// Leave the stored URL as it is.
    Unchanged,
    Set(Option<String>),
}

pub struct ResumeWrite<'a> {
    pub content: &'a ResumeContent,
    pub photo_url: PhotoColumn,
}

/// Storage contract used by the gateway and the read endpoints.
/// Every lookup is scoped to the owning user.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn count_by_owner(&self, user_id: &str) -> Result<i64, SaveError>;

    async fn find_owned(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError>;

    async fn load_owned(&self, id: Uuid, user_id: &str)
        -> Result<Option<ResumeRecord>, SaveError>;

    /// Newest first.
    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<ResumeRecord>, SaveError>;

    async fn create(&self, user_id: &str, write: &ResumeWrite<'_>) -> Result<ResumeRow, SaveError>;

    /// Updates scalar fields and replaces all five child collections wholesale.
    async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        write: &ResumeWrite<'_>,
    ) -> Result<ResumeRow, SaveError>;

    /// Returns the deleted row, or `None` when nothing owned matched.
    async fn delete(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError>;
}

pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

type ResumeQuery<'q> = QueryAs<'q, Postgres, ResumeRow, PgArguments>;

/// Binds the scalar content columns, in the order `$3..=$15`.
fn bind_content<'q>(query: ResumeQuery<'q>, content: &'q ResumeContent) -> ResumeQuery<'q> {
    query
        .bind(&content.title)
        .bind(&content.description)
        .bind(&content.first_name)
        .bind(&content.last_name)
        .bind(&content.job_title)
        .bind(&content.city)
        .bind(&content.country)
        .bind(&content.phone)
        .bind(&content.email)
        .bind(&content.summary)
        .bind(&content.color_hex)
        .bind(content.border_style.map(|b| b.as_str()))
        .bind(&content.skills)
}

const CHILD_TABLES: [&str; 5] = [
    "work_experiences",
    "educations",
    "awards",
    "certificates",
    "projects",
];

async fn insert_children(
    conn: &mut PgConnection,
    resume_id: Uuid,
    content: &ResumeContent,
) -> Result<(), sqlx::Error> {
    for (idx, exp) in content.work_experiences.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO work_experiences
                (id, resume_id, position, company, start_date, end_date, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(&exp.position)
        .bind(&exp.company)
        .bind(exp.start_date)
        .bind(exp.end_date)
        .bind(&exp.description)
        .bind(idx as i32)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, edu) in content.educations.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO educations
                (id, resume_id, institution, field_of_study, start_date, end_date, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(&edu.institution)
        .bind(&edu.field_of_study)
        .bind(edu.start_date)
        .bind(edu.end_date)
        .bind(&edu.description)
        .bind(idx as i32)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, award) in content.awards.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO awards
                (id, resume_id, title, issuer, date_received, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(&award.title)
        .bind(&award.issuer)
        .bind(award.date_received)
        .bind(&award.description)
        .bind(idx as i32)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, cert) in content.certificates.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO certificates
                (id, resume_id, title, issuer, issue_date, credential_id, credential_url,
                 description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(&cert.title)
        .bind(&cert.issuer)
        .bind(cert.issue_date)
        .bind(&cert.credential_id)
        .bind(&cert.credential_url)
        .bind(&cert.description)
        .bind(idx as i32)
        .execute(&mut *conn)
        .await?;
    }

    for (idx, project) in content.projects.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO projects
                (id, resume_id, title, publication_date, publication_url, description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(resume_id)
        .bind(&project.title)
        .bind(project.publication_date)
        .bind(&project.publication_url)
        .bind(&project.description)
        .bind(idx as i32)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn fetch_children<T>(pool: &PgPool, table: &str, ids: &[Uuid]) -> Result<Vec<T>, sqlx::Error>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT * FROM {table} WHERE resume_id = ANY($1) ORDER BY resume_id, sort_order"
    );
    sqlx::query_as::<_, T>(&sql).bind(ids).fetch_all(pool).await
}

fn group_by_resume<T>(rows: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, Vec<T>> {
    let mut grouped: HashMap<Uuid, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

/// Attaches child collections to a batch of resume rows, keeping row order.
async fn with_children(pool: &PgPool, rows: Vec<ResumeRow>) -> Result<Vec<ResumeRecord>, sqlx::Error> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let mut work = group_by_resume(
        fetch_children::<WorkExperienceRow>(pool, "work_experiences", &ids).await?,
        |r| r.resume_id,
    );
    let mut educations = group_by_resume(
        fetch_children::<EducationRow>(pool, "educations", &ids).await?,
        |r| r.resume_id,
    );
    let mut awards = group_by_resume(
        fetch_children::<AwardRow>(pool, "awards", &ids).await?,
        |r| r.resume_id,
    );
    let mut certificates = group_by_resume(
        fetch_children::<CertificateRow>(pool, "certificates", &ids).await?,
        |r| r.resume_id,
    );
    let mut projects = group_by_resume(
        fetch_children::<ProjectRow>(pool, "projects", &ids).await?,
        |r| r.resume_id,
    );

    Ok(rows
        .into_iter()
        .map(|resume| {
            let id = resume.id;
            ResumeRecord {
                resume,
                work_experiences: work.remove(&id).unwrap_or_default(),
                educations: educations.remove(&id).unwrap_or_default(),
                awards: awards.remove(&id).unwrap_or_default(),
                certificates: certificates.remove(&id).unwrap_or_default(),
                projects: projects.remove(&id).unwrap_or_default(),
            }
        })
        .collect())
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn count_by_owner(&self, user_id: &str) -> Result<i64, SaveError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM resumes WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn find_owned(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn load_owned(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> Result<Option<ResumeRecord>, SaveError> {
        let Some(row) = self.find_owned(id, user_id).await? else {
            return Ok(None);
        };
        Ok(with_children(&self.pool, vec![row]).await?.pop())
    }

    async fn list_by_owner(&self, user_id: &str) -> Result<Vec<ResumeRecord>, SaveError> {
        let rows = sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(with_children(&self.pool, rows).await?)
    }

    async fn create(&self, user_id: &str, write: &ResumeWrite<'_>) -> Result<ResumeRow, SaveError> {
        let photo_url = match &write.photo_url {
            PhotoColumn::Set(url) => url.clone(),
            PhotoColumn::Unchanged => None,
        };

        let mut tx = self.pool.begin().await?;

        let query = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes
                (id, user_id, title, description, first_name, last_name, job_title, city,
                 country, phone, email, summary, color_hex, border_style, skills, photo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id);
        let row = bind_content(query, write.content)
            .bind(photo_url)
            .fetch_one(&mut *tx)
            .await?;

        insert_children(&mut tx, row.id, write.content).await?;
        tx.commit().await?;

        info!("Created resume {} for user {}", row.id, user_id);
        Ok(row)
    }

    async fn update(
        &self,
        id: Uuid,
        user_id: &str,
        write: &ResumeWrite<'_>,
    ) -> Result<ResumeRow, SaveError> {
        let (set_photo, photo_url) = match &write.photo_url {
            PhotoColumn::Set(url) => (true, url.clone()),
            PhotoColumn::Unchanged => (false, None),
        };

        let mut tx = self.pool.begin().await?;

        let query = sqlx::query_as::<_, ResumeRow>(
            r#"
            UPDATE resumes SET
                title = $3, description = $4, first_name = $5, last_name = $6,
                job_title = $7, city = $8, country = $9, phone = $10, email = $11,
                summary = $12, color_hex = $13, border_style = $14, skills = $15,
                photo_url = CASE WHEN $16 THEN $17 ELSE photo_url END,
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id);
        let row = bind_content(query, write.content)
            .bind(set_photo)
            .bind(photo_url)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(SaveError::NotFound(id))?;

        for table in CHILD_TABLES {
            sqlx::query(&format!("DELETE FROM {table} WHERE resume_id = $1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        insert_children(&mut tx, id, write.content).await?;
        tx.commit().await?;

        info!("Updated resume {} for user {}", id, user_id);
        Ok(row)
    }

    async fn delete(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError> {
        // Child rows go with it through ON DELETE CASCADE.
        Ok(sqlx::query_as::<_, ResumeRow>(
            "DELETE FROM resumes WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}

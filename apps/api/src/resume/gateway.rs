//! Persistence gateway: the single create-or-update path for resumes.
//!
//! Order of work for `save_resume`:
//! 1. resolve the subscription level (fresh, never cached)
//! 2. quota gate on create, ownership lookup on update
//! 3. customization gate
//! 4. upload of a replacement photo
//! 5. create, or update with wholesale child replacement, in one transaction
//! 6. deletion of the photo object the row no longer references
//!
//! Gates run before any side effect, so a rejected save never writes. A failed
//! write deletes the object uploaded in step 4 and leaves the old one in place.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::subscription::SubscriptionLookup;
use crate::errors::SaveError;
use crate::models::resume::ResumeRow;
use crate::resume::document::{normalize_skills, PendingPhoto, ResumeContent};
use crate::resume::entitlement::{can_create_resume, can_use_customizations};
use crate::resume::store::{PhotoColumn, ResumeStore, ResumeWrite};
use crate::storage::BlobStore;

/// Explicit instruction for the stored photo. Never inferred from absence.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoUpdate {
    Keep,
    Replace(PendingPhoto),
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveResumeRequest {
    /// `None` creates a new resume.
    pub id: Option<Uuid>,
    pub content: ResumeContent,
    pub photo: PhotoUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedResume {
    pub id: Uuid,
    pub photo_url: Option<String>,
}

/// Seam between the autosave scheduler and storage.
#[async_trait]
pub trait ResumePersister: Send + Sync {
    async fn persist(
        &self,
        user_id: &str,
        request: SaveResumeRequest,
    ) -> Result<SavedResume, SaveError>;
}

pub struct ResumeGateway {
    store: Arc<dyn ResumeStore>,
    blobs: Arc<dyn BlobStore>,
    subscriptions: Arc<dyn SubscriptionLookup>,
}

impl ResumeGateway {
    pub fn new(
        store: Arc<dyn ResumeStore>,
        blobs: Arc<dyn BlobStore>,
        subscriptions: Arc<dyn SubscriptionLookup>,
    ) -> Self {
        Self {
            store,
            blobs,
            subscriptions,
        }
    }

    pub async fn save_resume(
        &self,
        user_id: &str,
        request: SaveResumeRequest,
    ) -> Result<SavedResume, SaveError> {
        if user_id.trim().is_empty() {
            return Err(SaveError::Unauthorized);
        }

        let SaveResumeRequest { id, content, photo } = request;
        let level = self.subscriptions.resolve(user_id).await?;

        let existing = match id {
            None => {
                let count = self.store.count_by_owner(user_id).await?;
                if !can_create_resume(level, count) {
                    warn!("User {user_id} at {level:?} hit the resume quota ({count} existing)");
                    return Err(SaveError::QuotaExceeded);
                }
                None
            }
            Some(id) => Some(
                self.store
                    .find_owned(id, user_id)
                    .await?
                    .ok_or(SaveError::NotFound(id))?,
            ),
        };

        if has_customizations(&content, existing.as_ref()) && !can_use_customizations(level) {
            warn!("User {user_id} at {level:?} attempted a styling change");
            return Err(SaveError::CustomizationNotAllowed);
        }

        let old_photo_url = existing.as_ref().and_then(|r| r.photo_url.clone());
        let (photo_url, uploaded) = match photo {
            PhotoUpdate::Keep => (PhotoColumn::Unchanged, None),
            PhotoUpdate::Replace(photo) => {
                let key = format!("resume_photos/{}{}", Uuid::new_v4(), photo.extension());
                let url = self
                    .blobs
                    .put(&key, photo.bytes.clone(), &photo.content_type)
                    .await?;
                (PhotoColumn::Set(Some(url.clone())), Some(url))
            }
            PhotoUpdate::Remove => (PhotoColumn::Set(None), None),
        };
        let replaces_stored = matches!(photo_url, PhotoColumn::Set(_));

        let content = ResumeContent {
            skills: normalize_skills(&content.skills),
            ..content
        };
        let write = ResumeWrite {
            content: &content,
            photo_url,
        };

        let written = match existing {
            None => self.store.create(user_id, &write).await,
            Some(row) => self.store.update(row.id, user_id, &write).await,
        };
        let row = match written {
            Ok(row) => row,
            Err(e) => {
                if let Some(url) = uploaded {
                    self.discard_object(&url).await;
                }
                return Err(e);
            }
        };

        // The row no longer references the old object.
        if replaces_stored {
            if let Some(old) = old_photo_url {
                self.discard_object(&old).await;
            }
        }

        Ok(SavedResume {
            id: row.id,
            photo_url: row.photo_url,
        })
    }

    /// Best-effort delete of an object no row references. A failure only
    /// leaves an orphan behind, so it is logged rather than surfaced.
    async fn discard_object(&self, url: &str) {
        if let Err(e) = self.blobs.delete(url).await {
            warn!("Failed to delete unreferenced photo {url}: {e}");
        }
    }

    /// Deletes a resume and then its stored photo.
    pub async fn delete_resume(&self, user_id: &str, id: Uuid) -> Result<(), SaveError> {
        let row = self
            .store
            .delete(id, user_id)
            .await?
            .ok_or(SaveError::NotFound(id))?;

        if let Some(url) = row.photo_url.as_deref() {
            self.blobs.delete(url).await?;
        }

        info!("Deleted resume {id} for user {user_id}");
        Ok(())
    }
}

#[async_trait]
impl ResumePersister for ResumeGateway {
    async fn persist(
        &self,
        user_id: &str,
        request: SaveResumeRequest,
    ) -> Result<SavedResume, SaveError> {
        self.save_resume(user_id, request).await
    }
}

/// A styling value that is set and differs from what is stored.
fn has_customizations(content: &ResumeContent, existing: Option<&ResumeRow>) -> bool {
    let stored_border = existing.and_then(|r| r.border_style.as_deref());
    let stored_color = existing.and_then(|r| r.color_hex.as_deref());

    let border_changed = content
        .border_style
        .is_some_and(|b| stored_border != Some(b.as_str()));
    let color_changed = content
        .color_hex
        .as_deref()
        .is_some_and(|c| stored_color != Some(c));

    border_changed || color_changed
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory collaborators shared by the gateway and autosave tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use bytes::Bytes;
    use chrono::Utc;

    use super::*;
    use crate::models::resume::ResumeRecord;
    use crate::resume::entitlement::SubscriptionLevel;

    #[derive(Default)]
    pub struct MemoryStore {
        pub rows: Mutex<HashMap<Uuid, (ResumeRow, ResumeContent)>>,
        pub child_writes: Mutex<usize>,
        pub creates: Mutex<usize>,
        pub updates: Mutex<usize>,
        /// When set, `create` and `update` fail with this error.
        pub fail_writes: Mutex<Option<SaveError>>,
    }

    impl MemoryStore {
        pub fn content_of(&self, id: Uuid) -> Option<ResumeContent> {
            self.rows.lock().unwrap().get(&id).map(|(_, c)| c.clone())
        }

        pub fn photo_url_of(&self, id: Uuid) -> Option<String> {
            self.rows
                .lock()
                .unwrap()
                .get(&id)
                .and_then(|(r, _)| r.photo_url.clone())
        }

        pub fn insert(&self, user_id: &str, content: ResumeContent, photo_url: Option<&str>) -> Uuid {
            let row = row_for(Uuid::new_v4(), user_id, &content, photo_url.map(String::from));
            let id = row.id;
            self.rows.lock().unwrap().insert(id, (row, content));
            id
        }

        fn write_failure(&self) -> Result<(), SaveError> {
            match self.fail_writes.lock().unwrap().clone() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        fn children(content: &ResumeContent) -> usize {
            content.work_experiences.len()
                + content.educations.len()
                + content.awards.len()
                + content.certificates.len()
                + content.projects.len()
        }
    }

    fn row_for(id: Uuid, user_id: &str, content: &ResumeContent, photo_url: Option<String>) -> ResumeRow {
        ResumeRow {
            id,
            user_id: user_id.to_string(),
            title: content.title.clone(),
            description: content.description.clone(),
            photo_url,
            color_hex: content.color_hex.clone(),
            border_style: content.border_style.map(|b| b.as_str().to_string()),
            summary: content.summary.clone(),
            first_name: content.first_name.clone(),
            last_name: content.last_name.clone(),
            job_title: content.job_title.clone(),
            city: content.city.clone(),
            country: content.country.clone(),
            phone: content.phone.clone(),
            email: content.email.clone(),
            skills: content.skills.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bare_record(resume: ResumeRow) -> ResumeRecord {
        ResumeRecord {
            resume,
            work_experiences: Vec::new(),
            educations: Vec::new(),
            awards: Vec::new(),
            certificates: Vec::new(),
            projects: Vec::new(),
        }
    }

    #[async_trait]
    impl ResumeStore for MemoryStore {
        async fn count_by_owner(&self, user_id: &str) -> Result<i64, SaveError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|(r, _)| r.user_id == user_id)
                .count() as i64)
        }

        async fn find_owned(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .get(&id)
                .filter(|(r, _)| r.user_id == user_id)
                .map(|(r, _)| r.clone()))
        }

        async fn load_owned(
            &self,
            id: Uuid,
            user_id: &str,
        ) -> Result<Option<ResumeRecord>, SaveError> {
            Ok(self.find_owned(id, user_id).await?.map(bare_record))
        }

        async fn list_by_owner(&self, user_id: &str) -> Result<Vec<ResumeRecord>, SaveError> {
            let mut rows: Vec<ResumeRow> = self
                .rows
                .lock()
                .unwrap()
                .values()
                .filter(|(r, _)| r.user_id == user_id)
                .map(|(r, _)| r.clone())
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows.into_iter().map(bare_record).collect())
        }

        async fn create(&self, user_id: &str, write: &ResumeWrite<'_>) -> Result<ResumeRow, SaveError> {
            self.write_failure()?;
            let photo_url = match &write.photo_url {
                PhotoColumn::Set(url) => url.clone(),
                PhotoColumn::Unchanged => None,
            };
            let row = row_for(Uuid::new_v4(), user_id, write.content, photo_url);
            *self.creates.lock().unwrap() += 1;
            *self.child_writes.lock().unwrap() += Self::children(write.content);
            self.rows
                .lock()
                .unwrap()
                .insert(row.id, (row.clone(), write.content.clone()));
            Ok(row)
        }

        async fn update(
            &self,
            id: Uuid,
            user_id: &str,
            write: &ResumeWrite<'_>,
        ) -> Result<ResumeRow, SaveError> {
            self.write_failure()?;
            let mut rows = self.rows.lock().unwrap();
            let (old, _) = rows
                .get(&id)
                .filter(|(r, _)| r.user_id == user_id)
                .cloned()
                .ok_or(SaveError::NotFound(id))?;
            let photo_url = match &write.photo_url {
                PhotoColumn::Set(url) => url.clone(),
                PhotoColumn::Unchanged => old.photo_url.clone(),
            };
            let row = row_for(id, user_id, write.content, photo_url);
            *self.updates.lock().unwrap() += 1;
            *self.child_writes.lock().unwrap() += Self::children(write.content);
            rows.insert(id, (row.clone(), write.content.clone()));
            Ok(row)
        }

        async fn delete(&self, id: Uuid, user_id: &str) -> Result<Option<ResumeRow>, SaveError> {
            let mut rows = self.rows.lock().unwrap();
            let owned = rows.get(&id).is_some_and(|(r, _)| r.user_id == user_id);
            Ok(if owned { rows.remove(&id).map(|(r, _)| r) } else { None })
        }
    }

    #[derive(Default)]
    pub struct MemoryBlobs {
        pub objects: Mutex<HashMap<String, Bytes>>,
        pub deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobs {
        async fn put(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<String, SaveError> {
            let url = format!("https://blobs.test/{key}");
            self.objects.lock().unwrap().insert(url.clone(), bytes);
            Ok(url)
        }

        async fn delete(&self, url: &str) -> Result<(), SaveError> {
            self.objects.lock().unwrap().remove(url);
            self.deleted.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    pub struct FixedLevel(pub Mutex<SubscriptionLevel>);

    impl FixedLevel {
        pub fn new(level: SubscriptionLevel) -> Self {
            Self(Mutex::new(level))
        }

        pub fn set(&self, level: SubscriptionLevel) {
            *self.0.lock().unwrap() = level;
        }
    }

    #[async_trait]
    impl SubscriptionLookup for FixedLevel {
        async fn resolve(&self, _user_id: &str) -> Result<SubscriptionLevel, SaveError> {
            Ok(*self.0.lock().unwrap())
        }
    }

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub blobs: Arc<MemoryBlobs>,
        pub level: Arc<FixedLevel>,
        pub gateway: Arc<ResumeGateway>,
    }

    pub fn harness(level: SubscriptionLevel) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(MemoryBlobs::default());
        let level = Arc::new(FixedLevel::new(level));
        let gateway = Arc::new(ResumeGateway::new(
            store.clone(),
            blobs.clone(),
            level.clone(),
        ));
        Harness {
            store,
            blobs,
            level,
            gateway,
        }
    }

    pub fn photo(name: &str) -> PendingPhoto {
        PendingPhoto::new(name, "image/png", Some(7), Bytes::from_static(b"\x89PNG"))
    }
}

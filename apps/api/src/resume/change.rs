//! Change detection between the live document and the last saved snapshot.

use crate::resume::document::{PhotoRef, ResumeDocument};
use crate::resume::gateway::{PhotoUpdate, SaveResumeRequest};

/// True when `current` differs from the last confirmed `snapshot`.
///
/// Pending photos compare by metadata only (see `PendingPhoto`'s `PartialEq`).
pub fn is_dirty(current: &ResumeDocument, snapshot: &ResumeDocument) -> bool {
    current != snapshot
}

/// Derives the explicit photo directive for a save.
///
/// An unchanged photo is always `Keep`, so the stored URL is never cleared
/// just because no new file accompanies the save.
pub fn photo_update(current: &PhotoRef, snapshot: &PhotoRef) -> PhotoUpdate {
    if current == snapshot {
        return PhotoUpdate::Keep;
    }
    match current {
        PhotoRef::Pending(photo) => PhotoUpdate::Replace(photo.clone()),
        PhotoRef::Remove | PhotoRef::Absent => PhotoUpdate::Remove,
        PhotoRef::Stored { .. } => PhotoUpdate::Keep,
    }
}

/// Builds the gateway request for persisting `current` on top of `snapshot`.
pub fn save_request(current: &ResumeDocument, snapshot: &ResumeDocument) -> SaveResumeRequest {
    SaveResumeRequest {
        id: current.id,
        content: current.content.clone(),
        photo: photo_update(&current.photo, &snapshot.photo),
    }
}

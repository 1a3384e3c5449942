//! Domain models mirroring the backend JSON representations.
//!
//! These are pure data. A `User` carries denormalized copies of the refuges it
//! favourites and has visited plus its uploaded photo counter, which is why
//! those mutations patch the user's cached views directly.

use crate::identity::{
    AnswerId, DoubtId, ExperienceId, MediaId, RefugeId, RenovationId, Timestamp, UserId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub favourite_refuges: Vec<RefugeId>,
    #[serde(default)]
    pub visited_refuges: Vec<RefugeId>,
    #[serde(default)]
    pub uploaded_photos_count: u32,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

/// Partial update of the editable user fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl UserUpdate {
    /// Apply the present fields onto a cached user.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username = username.clone();
        }
        if let Some(avatar) = &self.avatar {
            user.avatar = Some(avatar.clone());
        }
        if let Some(language) = &self.language {
            user.language = Some(language.clone());
        }
    }
}

// ============================================================================
// REFUGES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refuge {
    pub id: RefugeId,
    pub name: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub altitude: Option<i32>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub media_count: u32,
    #[serde(default)]
    pub visitors_count: u32,
}

/// Filters accepted by the refuge list/search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefugeQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl RefugeQuery {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.region.is_none() && self.page.is_none()
    }
}

// ============================================================================
// MEDIA & EXPERIENCES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub key: MediaId,
    pub url: String,
    pub refuge_id: RefugeId,
    pub creator_uid: UserId,
    #[serde(default)]
    pub experience_id: Option<ExperienceId>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<Timestamp>,
}

/// A file selected for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Backend answer to a media upload: the stored items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedMedia {
    pub uploaded: Vec<MediaItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub id: ExperienceId,
    pub refuge_id: RefugeId,
    pub creator_uid: UserId,
    pub comment: String,
    #[serde(default)]
    pub media_ids: Vec<MediaId>,
    #[serde(default)]
    pub modified_at: Option<Timestamp>,
}

/// Payload for creating or editing an experience.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceDraft {
    pub comment: Option<String>,
    pub files: Vec<UploadFile>,
}

// ============================================================================
// RENOVATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Renovation {
    pub id: RenovationId,
    pub refuge_id: RefugeId,
    pub creator_uid: UserId,
    pub ini_date: NaiveDate,
    pub fin_date: NaiveDate,
    pub description: String,
    #[serde(default)]
    pub materials_needed: Option<String>,
    #[serde(default)]
    pub group_link: Option<String>,
    #[serde(default)]
    pub participants_uids: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenovationDraft {
    pub refuge_id: RefugeId,
    pub ini_date: NaiveDate,
    pub fin_date: NaiveDate,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials_needed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenovationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ini_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fin_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materials_needed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_link: Option<String>,
}

impl RenovationUpdate {
    pub fn apply_to(&self, renovation: &mut Renovation) {
        if let Some(ini_date) = self.ini_date {
            renovation.ini_date = ini_date;
        }
        if let Some(fin_date) = self.fin_date {
            renovation.fin_date = fin_date;
        }
        if let Some(description) = &self.description {
            renovation.description = description.clone();
        }
        if let Some(materials) = &self.materials_needed {
            renovation.materials_needed = Some(materials.clone());
        }
        if let Some(link) = &self.group_link {
            renovation.group_link = Some(link.clone());
        }
    }
}

// ============================================================================
// DOUBTS & ANSWERS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doubt {
    pub id: DoubtId,
    pub refuge_id: RefugeId,
    pub creator_uid: UserId,
    pub message: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub answers: Vec<Answer>,
    #[serde(default)]
    pub answers_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub id: AnswerId,
    pub doubt_id: DoubtId,
    pub creator_uid: UserId,
    pub message: String,
    #[serde(default)]
    pub parent_answer_id: Option<AnswerId>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerDraft {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_answer_id: Option<AnswerId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_defaults_missing_denormalized_fields() {
        let user: User = serde_json::from_value(json!({
            "uid": "u1",
            "username": "marta"
        }))
        .unwrap();
        assert!(user.favourite_refuges.is_empty());
        assert_eq!(user.uploaded_photos_count, 0);
    }

    #[test]
    fn test_user_update_applies_only_present_fields() {
        let mut user: User = serde_json::from_value(json!({
            "uid": "u1",
            "username": "marta",
            "language": "ca"
        }))
        .unwrap();
        UserUpdate {
            username: Some("marta.p".to_string()),
            ..UserUpdate::default()
        }
        .apply_to(&mut user);
        assert_eq!(user.username, "marta.p");
        assert_eq!(user.language.as_deref(), Some("ca"));
    }

    #[test]
    fn test_upload_file_debug_hides_bytes() {
        let file = UploadFile {
            file_name: "hut.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xFF; 2048],
        };
        let debug = format!("{:?}", file);
        assert!(debug.contains("2048"));
        assert!(!debug.contains("255"));
    }

    #[test]
    fn test_renovation_update_apply() {
        let mut renovation: Renovation = serde_json::from_value(json!({
            "id": "n1",
            "refuge_id": "r9",
            "creator_uid": "u1",
            "ini_date": "2026-07-01",
            "fin_date": "2026-07-03",
            "description": "Roof repair"
        }))
        .unwrap();
        RenovationUpdate {
            description: Some("Roof and chimney".to_string()),
            ..RenovationUpdate::default()
        }
        .apply_to(&mut renovation);
        assert_eq!(renovation.description, "Roof and chimney");
        assert_eq!(renovation.ini_date.to_string(), "2026-07-01");
    }
}

use refugio_core::{EntityIdType, Experience, ExperienceDraft, ExperienceId, RefugeId};

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::{ApiRequest, MultipartField};

impl RefugioApi {
    pub async fn list_refuge_experiences(
        &self,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<Experience>> {
        let path = format!("/refuges/{}/experiences/", refuge_id.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    pub async fn create_experience(
        &self,
        refuge_id: &RefugeId,
        draft: &ExperienceDraft,
    ) -> ClientResult<Experience> {
        let path = format!("/refuges/{}/experiences/", refuge_id.as_str());
        self.send_multipart(ApiRequest::post(path), experience_fields(draft))
            .await
    }

    pub async fn update_experience(
        &self,
        experience_id: &ExperienceId,
        draft: &ExperienceDraft,
    ) -> ClientResult<Experience> {
        let path = format!("/experiences/{}/", experience_id.as_str());
        self.send_multipart(ApiRequest::patch(path), experience_fields(draft))
            .await
    }

    pub async fn delete_experience(&self, experience_id: &ExperienceId) -> ClientResult<()> {
        let path = format!("/experiences/{}/", experience_id.as_str());
        self.send_empty(ApiRequest::delete(path)).await
    }
}

fn experience_fields(draft: &ExperienceDraft) -> Vec<MultipartField> {
    let mut fields = Vec::with_capacity(draft.files.len() + 1);
    if let Some(comment) = &draft.comment {
        fields.push(MultipartField::text("comment", comment.clone()));
    }
    fields.extend(
        draft
            .files
            .iter()
            .cloned()
            .map(|file| MultipartField::file("files", file)),
    );
    fields
}

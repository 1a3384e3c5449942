use refugio_core::{Answer, AnswerDraft, AnswerId, Doubt, DoubtId, EntityIdType, RefugeId};
use serde_json::json;

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::ApiRequest;

impl RefugioApi {
    pub async fn list_refuge_doubts(&self, refuge_id: &RefugeId) -> ClientResult<Vec<Doubt>> {
        let path = format!("/refuges/{}/doubts/", refuge_id.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    pub async fn create_doubt(&self, refuge_id: &RefugeId, message: &str) -> ClientResult<Doubt> {
        let path = format!("/refuges/{}/doubts/", refuge_id.as_str());
        self.send_json(ApiRequest::post(path), &json!({ "message": message }))
            .await
    }

    pub async fn delete_doubt(&self, doubt_id: &DoubtId) -> ClientResult<()> {
        let path = format!("/doubts/{}/", doubt_id.as_str());
        self.send_empty(ApiRequest::delete(path)).await
    }

    pub async fn create_answer(&self, doubt_id: &DoubtId, draft: &AnswerDraft) -> ClientResult<Answer> {
        let path = format!("/doubts/{}/answers/", doubt_id.as_str());
        self.send_json(ApiRequest::post(path), draft).await
    }

    pub async fn delete_answer(&self, answer_id: &AnswerId) -> ClientResult<()> {
        let path = format!("/answers/{}/", answer_id.as_str());
        self.send_empty(ApiRequest::delete(path)).await
    }
}

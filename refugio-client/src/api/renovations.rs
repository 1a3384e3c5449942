use refugio_core::{
    EntityIdType, RefugeId, Renovation, RenovationDraft, RenovationId, RenovationUpdate,
};

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::{ApiRequest, ExecuteOptions};

impl RefugioApi {
    pub async fn list_renovations(&self) -> ClientResult<Vec<Renovation>> {
        self.get_json(ApiRequest::get("/renovations/")).await
    }

    pub async fn list_refuge_renovations(
        &self,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<Renovation>> {
        let path = format!("/refuges/{}/renovations/", refuge_id.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    /// Fetch one renovation. A 404 is `Ok(None)`.
    pub async fn get_renovation(
        &self,
        renovation_id: &RenovationId,
    ) -> ClientResult<Option<Renovation>> {
        let path = format!("/renovations/{}/", renovation_id.as_str());
        self.send(ApiRequest::get(path), ExecuteOptions::default())
            .await?
            .into_optional_json()
    }

    /// Create a renovation. A scheduling overlap fails with a 409 whose
    /// error carries the overlapping renovation.
    pub async fn create_renovation(&self, draft: &RenovationDraft) -> ClientResult<Renovation> {
        self.send_json(ApiRequest::post("/renovations/"), draft).await
    }

    pub async fn update_renovation(
        &self,
        renovation_id: &RenovationId,
        update: &RenovationUpdate,
    ) -> ClientResult<Renovation> {
        let path = format!("/renovations/{}/", renovation_id.as_str());
        self.send_json(ApiRequest::patch(path), update).await
    }

    pub async fn delete_renovation(&self, renovation_id: &RenovationId) -> ClientResult<()> {
        let path = format!("/renovations/{}/", renovation_id.as_str());
        self.send_empty(ApiRequest::delete(path)).await
    }

    pub async fn join_renovation(&self, renovation_id: &RenovationId) -> ClientResult<Renovation> {
        let path = format!("/renovations/{}/participants/", renovation_id.as_str());
        self.get_json(ApiRequest::post(path)).await
    }

    pub async fn leave_renovation(&self, renovation_id: &RenovationId) -> ClientResult<Renovation> {
        let path = format!("/renovations/{}/participants/", renovation_id.as_str());
        self.get_json(ApiRequest::delete(path)).await
    }
}

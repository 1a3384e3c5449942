use refugio_core::{EntityIdType, Refuge, RefugeId, RefugeQuery};

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::{ApiRequest, ExecuteOptions};

impl RefugioApi {
    /// List or search refuges. Public endpoint.
    pub async fn list_refuges(&self, query: &RefugeQuery) -> ClientResult<Vec<Refuge>> {
        let mut request = ApiRequest::get("/refuges/");
        if let Some(name) = &query.name {
            request = request.query("name", name);
        }
        if let Some(region) = &query.region {
            request = request.query("region", region);
        }
        if let Some(page) = query.page {
            request = request.query("page", page);
        }
        self.get_public_json(request).await
    }

    /// Fetch one refuge. Public endpoint; a 404 is `Ok(None)`.
    pub async fn get_refuge(&self, refuge_id: &RefugeId) -> ClientResult<Option<Refuge>> {
        let path = format!("/refuges/{}/", refuge_id.as_str());
        self.send(ApiRequest::get(path), ExecuteOptions::public())
            .await?
            .into_optional_json()
    }
}

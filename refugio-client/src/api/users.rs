use refugio_core::{EntityIdType, MediaItem, RefugeId, Renovation, User, UserId, UserUpdate};

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::{ApiRequest, ExecuteOptions};

impl RefugioApi {
    /// Fetch one user. A 404 is `Ok(None)`.
    pub async fn get_user(&self, uid: &UserId) -> ClientResult<Option<User>> {
        let path = format!("/users/{}/", uid.as_str());
        self.send(ApiRequest::get(path), ExecuteOptions::default())
            .await?
            .into_optional_json()
    }

    pub async fn update_user(&self, uid: &UserId, update: &UserUpdate) -> ClientResult<User> {
        let path = format!("/users/{}/", uid.as_str());
        self.send_json(ApiRequest::patch(path), update).await
    }

    /// Returns the user's favourite refuge ids after the change.
    pub async fn add_favourite_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/favorite-refuges/{}/", uid.as_str(), refuge_id.as_str());
        self.get_json(ApiRequest::post(path)).await
    }

    pub async fn remove_favourite_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/favorite-refuges/{}/", uid.as_str(), refuge_id.as_str());
        self.get_json(ApiRequest::delete(path)).await
    }

    pub async fn list_favourite_refuges(&self, uid: &UserId) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/favorite-refuges/", uid.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    /// Returns the user's visited refuge ids after the change.
    pub async fn add_visited_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/visited-refuges/{}/", uid.as_str(), refuge_id.as_str());
        self.get_json(ApiRequest::post(path)).await
    }

    pub async fn remove_visited_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/visited-refuges/{}/", uid.as_str(), refuge_id.as_str());
        self.get_json(ApiRequest::delete(path)).await
    }

    pub async fn list_visited_refuges(&self, uid: &UserId) -> ClientResult<Vec<RefugeId>> {
        let path = format!("/users/{}/visited-refuges/", uid.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    pub async fn list_user_media(&self, uid: &UserId) -> ClientResult<Vec<MediaItem>> {
        let path = format!("/users/{}/media/", uid.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    pub async fn list_user_renovations(&self, uid: &UserId) -> ClientResult<Vec<Renovation>> {
        let path = format!("/users/{}/renovations/", uid.as_str());
        self.get_json(ApiRequest::get(path)).await
    }
}

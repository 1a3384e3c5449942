use refugio_core::{EntityIdType, MediaId, MediaItem, RefugeId, UploadFile, UploadedMedia};

use super::RefugioApi;
use crate::error::ClientResult;
use crate::request::{ApiRequest, MultipartField};

impl RefugioApi {
    pub async fn list_refuge_media(&self, refuge_id: &RefugeId) -> ClientResult<Vec<MediaItem>> {
        let path = format!("/refuges/{}/media/", refuge_id.as_str());
        self.get_json(ApiRequest::get(path)).await
    }

    /// Upload files to a refuge as one multipart request.
    pub async fn upload_refuge_media(
        &self,
        refuge_id: &RefugeId,
        files: &[UploadFile],
    ) -> ClientResult<UploadedMedia> {
        let path = format!("/refuges/{}/media/", refuge_id.as_str());
        let fields = files
            .iter()
            .cloned()
            .map(|file| MultipartField::file("files", file))
            .collect();
        self.send_multipart(ApiRequest::post(path), fields).await
    }

    pub async fn delete_refuge_media(
        &self,
        refuge_id: &RefugeId,
        media_id: &MediaId,
    ) -> ClientResult<()> {
        let path = format!("/refuges/{}/media/{}/", refuge_id.as_str(), media_id.as_str());
        self.send_empty(ApiRequest::delete(path)).await
    }
}

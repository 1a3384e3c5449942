//! Refuge media keys and the upload/delete mutations.
//!
//! Photo counters live on both the refuge and the uploader's profile, so
//! every media write patches those details provisionally and leaves them
//! invalidated for the server's count.

use refugio_core::{
    cache_key, CacheKey, EntityIdType, Experience, MediaItem, MutationKind, Refuge, RefugeId,
    UploadFile, UploadedMedia, User, UserId,
};
use std::future::Future;

use super::experiences::refuge_experiences;
use super::refuges::refuge_detail;
use super::users::{user_detail, user_media};
use super::{patch_detail, EntityStore};
use crate::entry::ReadOutcome;
use crate::error::CacheResult;
use crate::invalidation::EdgeParam;
use crate::mutation::Mutation;

pub fn refuge_media(refuge_id: &RefugeId) -> CacheKey {
    cache_key!["media", "refuge", refuge_id.as_str()]
}

impl EntityStore {
    pub async fn read_refuge_media(&self, refuge_id: &RefugeId) -> CacheResult<ReadOutcome<Vec<MediaItem>>> {
        let refuge_id = refuge_id.clone();
        self.read_with(refuge_media(&refuge_id), move |api| async move {
            api.list_refuge_media(&refuge_id).await
        })
        .await
    }

    /// Upload photos to a refuge as `uid`.
    ///
    /// The new items are appended to a cached media list once the server
    /// returns their URLs.
    pub fn upload_refuge_media(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
        files: Vec<UploadFile>,
    ) -> impl Future<Output = CacheResult<UploadedMedia>> + Send + 'static {
        let added = u32::try_from(files.len()).unwrap_or(u32::MAX);
        let mutation = Mutation::<UploadedMedia>::new(MutationKind::UploadRefugeMedia)
            .param(EdgeParam::User, uid)
            .param(EdgeParam::Refuge, refuge_id)
            .affect::<Vec<MediaItem>, _, _>(
                refuge_media(refuge_id),
                |_| None,
                |server, current| {
                    current.map(|mut items| {
                        items.extend(server.uploaded.iter().cloned());
                        items
                    })
                },
            )
            .affect::<Option<User>, _, _>(
                user_detail(uid),
                move |current| {
                    patch_detail(current, |user| {
                        user.uploaded_photos_count = user.uploaded_photos_count.saturating_add(added)
                    })
                },
                |_, _| None,
            )
            .affect::<Option<Refuge>, _, _>(
                refuge_detail(refuge_id),
                move |current| {
                    patch_detail(current, |refuge| {
                        refuge.media_count = refuge.media_count.saturating_add(added)
                    })
                },
                |_, _| None,
            );

        let refuge_id = refuge_id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.upload_refuge_media(&refuge_id, &files).await
        })
    }

    /// Delete one media item. Media attached to an experience also leaves
    /// that experience's cached media ids.
    pub fn delete_refuge_media(&self, item: &MediaItem) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let mutation = delete_media_mutation(item);
        let (refuge_id, media_id) = (item.refuge_id.clone(), item.key.clone());
        self.mutate_with(mutation, move |api| async move {
            api.delete_refuge_media(&refuge_id, &media_id).await
        })
    }
}

fn delete_media_mutation(item: &MediaItem) -> Mutation<()> {
    let in_refuge = item.key.clone();
    let in_user = item.key.clone();
    let mut mutation = Mutation::<()>::new(MutationKind::DeleteRefugeMedia)
        .param(EdgeParam::User, &item.creator_uid)
        .param(EdgeParam::Refuge, &item.refuge_id)
        .param(EdgeParam::Media, &item.key)
        .param_opt(EdgeParam::Experience, item.experience_id.as_ref())
        .affect::<Vec<MediaItem>, _, _>(
            refuge_media(&item.refuge_id),
            move |current| {
                current.map(|mut items| {
                    items.retain(|media| media.key != in_refuge);
                    items
                })
            },
            |_, _| None,
        )
        .affect::<Vec<MediaItem>, _, _>(
            user_media(&item.creator_uid),
            move |current| {
                current.map(|mut items| {
                    items.retain(|media| media.key != in_user);
                    items
                })
            },
            |_, _| None,
        )
        .affect::<Option<User>, _, _>(
            user_detail(&item.creator_uid),
            |current| {
                patch_detail(current, |user| {
                    user.uploaded_photos_count = user.uploaded_photos_count.saturating_sub(1)
                })
            },
            |_, _| None,
        )
        .affect::<Option<Refuge>, _, _>(
            refuge_detail(&item.refuge_id),
            |current| {
                patch_detail(current, |refuge| {
                    refuge.media_count = refuge.media_count.saturating_sub(1)
                })
            },
            |_, _| None,
        );

    if let Some(experience_id) = item.experience_id.clone() {
        let media_id = item.key.clone();
        mutation = mutation.affect::<Vec<Experience>, _, _>(
            refuge_experiences(&item.refuge_id),
            move |current| {
                current.map(|mut experiences| {
                    for experience in experiences.iter_mut().filter(|e| e.id == experience_id) {
                        experience.media_ids.retain(|id| *id != media_id);
                    }
                    experiences
                })
            },
            |_, _| None,
        );
    }
    mutation
}

use refugio_core::{
    cache_key, CacheKey, EntityIdType, Experience, ExperienceDraft, MutationKind, RefugeId, User,
    UserId,
};
use std::future::Future;

use super::users::user_detail;
use super::{patch_detail, EntityStore};
use crate::entry::ReadOutcome;
use crate::error::CacheResult;
use crate::invalidation::EdgeParam;
use crate::mutation::Mutation;

pub fn refuge_experiences(refuge_id: &RefugeId) -> CacheKey {
    cache_key!["experiences", "refuge", refuge_id.as_str()]
}

impl EntityStore {
    pub async fn read_refuge_experiences(
        &self,
        refuge_id: &RefugeId,
    ) -> CacheResult<ReadOutcome<Vec<Experience>>> {
        let refuge_id = refuge_id.clone();
        self.read_with(refuge_experiences(&refuge_id), move |api| async move {
            api.list_refuge_experiences(&refuge_id).await
        })
        .await
    }

    /// Post an experience with photos. The new experience is prepended to a
    /// cached list once the server assigns its id.
    pub fn create_experience(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
        draft: ExperienceDraft,
    ) -> impl Future<Output = CacheResult<Experience>> + Send + 'static {
        let added = u32::try_from(draft.files.len()).unwrap_or(u32::MAX);
        let mutation = Mutation::<Experience>::new(MutationKind::CreateExperience)
            .param(EdgeParam::User, uid)
            .param(EdgeParam::Refuge, refuge_id)
            .affect::<Vec<Experience>, _, _>(
                refuge_experiences(refuge_id),
                |_| None,
                |server, current| {
                    current.map(|mut experiences| {
                        experiences.insert(0, server.clone());
                        experiences
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
            );

        let refuge_id = refuge_id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.create_experience(&refuge_id, &draft).await
        })
    }

    pub fn update_experience(
        &self,
        experience: &Experience,
        draft: ExperienceDraft,
    ) -> impl Future<Output = CacheResult<Experience>> + Send + 'static {
        let target = experience.id.clone();
        let comment = draft.comment.clone();
        let mutation = Mutation::<Experience>::new(MutationKind::UpdateExperience)
            .param(EdgeParam::User, &experience.creator_uid)
            .param(EdgeParam::Refuge, &experience.refuge_id)
            .param(EdgeParam::Experience, &experience.id)
            .affect::<Vec<Experience>, _, _>(
                refuge_experiences(&experience.refuge_id),
                move |current| {
                    let comment = comment?;
                    current.map(|mut experiences| {
                        for entry in experiences.iter_mut().filter(|e| e.id == target) {
                            entry.comment = comment.clone();
                        }
                        experiences
                    })
                },
                |server, current| {
                    current.map(|mut experiences| {
                        for entry in experiences.iter_mut().filter(|e| e.id == server.id) {
                            *entry = server.clone();
                        }
                        experiences
                    })
                },
            );

        let experience_id = experience.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.update_experience(&experience_id, &draft).await
        })
    }

    pub fn delete_experience(&self, experience: &Experience) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let target = experience.id.clone();
        let removed = u32::try_from(experience.media_ids.len()).unwrap_or(u32::MAX);
        let mutation = Mutation::<()>::new(MutationKind::DeleteExperience)
            .param(EdgeParam::User, &experience.creator_uid)
            .param(EdgeParam::Refuge, &experience.refuge_id)
            .param(EdgeParam::Experience, &experience.id)
            .affect::<Vec<Experience>, _, _>(
                refuge_experiences(&experience.refuge_id),
                move |current| {
                    current.map(|mut experiences| {
                        experiences.retain(|e| e.id != target);
                        experiences
                    })
                },
                |_, _| None,
            )
            .affect::<Option<User>, _, _>(
                user_detail(&experience.creator_uid),
                move |current| {
                    patch_detail(current, |user| {
                        user.uploaded_photos_count = user.uploaded_photos_count.saturating_sub(removed)
                    })
                },
                |_, _| None,
            );

        let experience_id = experience.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.delete_experience(&experience_id).await
        })
    }
}

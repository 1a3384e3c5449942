//! User keys and the favourite/visited/profile mutations.
//!
//! Favourite and visited refuges are denormalized onto the user record, so
//! membership changes write both the id list and the cached user detail and
//! declare no cross-entity edges.

use refugio_core::{
    cache_key, CacheKey, EntityIdType, MediaItem, MutationKind, RefugeId, Renovation, User,
    UserId, UserUpdate,
};
use std::future::Future;

use super::{patch_detail, EntityStore};
use crate::entry::ReadOutcome;
use crate::error::CacheResult;
use crate::invalidation::EdgeParam;
use crate::mutation::Mutation;

// ============================================================================
// KEYS
// ============================================================================

pub fn user_detail(uid: &UserId) -> CacheKey {
    cache_key!["users", "detail", uid.as_str()]
}

pub fn user_favourites(uid: &UserId) -> CacheKey {
    cache_key!["users", "favourites", uid.as_str()]
}

pub fn user_visited(uid: &UserId) -> CacheKey {
    cache_key!["users", "visited", uid.as_str()]
}

pub fn user_media(uid: &UserId) -> CacheKey {
    cache_key!["users", "media", uid.as_str()]
}

pub fn user_renovations(uid: &UserId) -> CacheKey {
    cache_key!["users", "renovations", uid.as_str()]
}

// ============================================================================
// READS & MUTATIONS
// ============================================================================

impl EntityStore {
    /// Read a user profile. Idle until the uid is known; `None` when the
    /// user does not exist.
    pub async fn read_user(&self, uid: Option<&UserId>) -> CacheResult<ReadOutcome<Option<User>>> {
        let Some(uid) = uid.cloned() else {
            return Ok(ReadOutcome::Idle);
        };
        self.read_with(user_detail(&uid), move |api| async move {
            api.get_user(&uid).await
        })
        .await
    }

    pub async fn read_favourite_refuges(&self, uid: &UserId) -> CacheResult<ReadOutcome<Vec<RefugeId>>> {
        let uid = uid.clone();
        self.read_with(user_favourites(&uid), move |api| async move {
            api.list_favourite_refuges(&uid).await
        })
        .await
    }

    pub async fn read_visited_refuges(&self, uid: &UserId) -> CacheResult<ReadOutcome<Vec<RefugeId>>> {
        let uid = uid.clone();
        self.read_with(user_visited(&uid), move |api| async move {
            api.list_visited_refuges(&uid).await
        })
        .await
    }

    pub async fn read_user_media(&self, uid: &UserId) -> CacheResult<ReadOutcome<Vec<MediaItem>>> {
        let uid = uid.clone();
        self.read_with(user_media(&uid), move |api| async move {
            api.list_user_media(&uid).await
        })
        .await
    }

    pub async fn read_user_renovations(&self, uid: &UserId) -> CacheResult<ReadOutcome<Vec<Renovation>>> {
        let uid = uid.clone();
        self.read_with(user_renovations(&uid), move |api| async move {
            api.list_user_renovations(&uid).await
        })
        .await
    }

    pub fn add_favourite_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> impl Future<Output = CacheResult<Vec<RefugeId>>> + Send + 'static {
        let mutation = membership_mutation(
            MutationKind::AddFavouriteRefuge,
            user_favourites(uid),
            uid,
            refuge_id,
            true,
            favourites_of,
        );
        let (uid, refuge_id) = (uid.clone(), refuge_id.clone());
        self.mutate_with(mutation, move |api| async move {
            api.add_favourite_refuge(&uid, &refuge_id).await
        })
    }

    pub fn remove_favourite_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> impl Future<Output = CacheResult<Vec<RefugeId>>> + Send + 'static {
        let mutation = membership_mutation(
            MutationKind::RemoveFavouriteRefuge,
            user_favourites(uid),
            uid,
            refuge_id,
            false,
            favourites_of,
        );
        let (uid, refuge_id) = (uid.clone(), refuge_id.clone());
        self.mutate_with(mutation, move |api| async move {
            api.remove_favourite_refuge(&uid, &refuge_id).await
        })
    }

    pub fn add_visited_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> impl Future<Output = CacheResult<Vec<RefugeId>>> + Send + 'static {
        let mutation = membership_mutation(
            MutationKind::AddVisitedRefuge,
            user_visited(uid),
            uid,
            refuge_id,
            true,
            visited_of,
        );
        let (uid, refuge_id) = (uid.clone(), refuge_id.clone());
        self.mutate_with(mutation, move |api| async move {
            api.add_visited_refuge(&uid, &refuge_id).await
        })
    }

    pub fn remove_visited_refuge(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
    ) -> impl Future<Output = CacheResult<Vec<RefugeId>>> + Send + 'static {
        let mutation = membership_mutation(
            MutationKind::RemoveVisitedRefuge,
            user_visited(uid),
            uid,
            refuge_id,
            false,
            visited_of,
        );
        let (uid, refuge_id) = (uid.clone(), refuge_id.clone());
        self.mutate_with(mutation, move |api| async move {
            api.remove_visited_refuge(&uid, &refuge_id).await
        })
    }

    /// Patch the profile; the server's user replaces the cached detail.
    pub fn update_user(
        &self,
        uid: &UserId,
        update: UserUpdate,
    ) -> impl Future<Output = CacheResult<User>> + Send + 'static {
        let provisional_update = update.clone();
        let mutation = Mutation::<User>::new(MutationKind::UpdateUser)
            .param(EdgeParam::User, uid)
            .affect::<Option<User>, _, _>(
                user_detail(uid),
                move |current| patch_detail(current, |user| provisional_update.apply_to(user)),
                |server, _| Some(Some(server.clone())),
            );
        let uid = uid.clone();
        self.mutate_with(mutation, move |api| async move {
            api.update_user(&uid, &update).await
        })
    }
}

fn favourites_of(user: &mut User) -> &mut Vec<RefugeId> {
    &mut user.favourite_refuges
}

fn visited_of(user: &mut User) -> &mut Vec<RefugeId> {
    &mut user.visited_refuges
}

fn set_membership(ids: &mut Vec<RefugeId>, refuge_id: &RefugeId, member: bool) {
    if member {
        if !ids.contains(refuge_id) {
            ids.push(refuge_id.clone());
        }
    } else {
        ids.retain(|id| id != refuge_id);
    }
}

/// Toggle one refuge in an id list and in the matching field of the user
/// detail. The server answers with the complete list.
fn membership_mutation(
    kind: MutationKind,
    list_key: CacheKey,
    uid: &UserId,
    refuge_id: &RefugeId,
    member: bool,
    field: fn(&mut User) -> &mut Vec<RefugeId>,
) -> Mutation<Vec<RefugeId>> {
    let list_refuge = refuge_id.clone();
    let detail_refuge = refuge_id.clone();
    Mutation::<Vec<RefugeId>>::new(kind)
        .param(EdgeParam::User, uid)
        .param(EdgeParam::Refuge, refuge_id)
        .affect::<Vec<RefugeId>, _, _>(
            list_key,
            move |current| {
                current.map(|mut ids| {
                    set_membership(&mut ids, &list_refuge, member);
                    ids
                })
            },
            |server, _| Some(server.clone()),
        )
        .affect::<Option<User>, _, _>(
            user_detail(uid),
            move |current| {
                patch_detail(current, |user| set_membership(field(user), &detail_refuge, member))
            },
            move |server, current| patch_detail(current, |user| *field(user) = server.clone()),
        )
}

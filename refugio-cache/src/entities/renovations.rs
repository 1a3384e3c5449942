//! Renovation keys and mutations.
//!
//! Creating or rescheduling a renovation can collide with another one on the
//! same refuge; the backend answers 409 with the overlapping renovation,
//! which [`conflicting_renovation`] extracts from the failed mutation.

use refugio_core::{
    cache_key, CacheKey, EntityIdType, MutationKind, RefugeId, Renovation, RenovationDraft,
    RenovationId, RenovationUpdate, UserId,
};
use std::future::Future;

use super::users::user_renovations;
use super::{patch_detail, EntityStore};
use crate::entry::ReadOutcome;
use crate::error::{CacheError, CacheResult};
use crate::invalidation::EdgeParam;
use crate::mutation::Mutation;

// ============================================================================
// KEYS
// ============================================================================

pub fn renovations_list() -> CacheKey {
    cache_key!["renovations", "list"]
}

pub fn renovation_detail(renovation_id: &RenovationId) -> CacheKey {
    cache_key!["renovations", "detail", renovation_id.as_str()]
}

pub fn refuge_renovations(refuge_id: &RefugeId) -> CacheKey {
    cache_key!["renovations", "refuge", refuge_id.as_str()]
}

/// The renovation a 409 response reported as overlapping, if any.
pub fn conflicting_renovation(err: &CacheError) -> Option<Renovation> {
    let conflicting = err.client_error()?.api_error()?.conflicting()?;
    match serde_json::from_value(conflicting.clone()) {
        Ok(renovation) => Some(renovation),
        Err(err) => {
            tracing::debug!(error = %err, "Conflict body is not a renovation");
            None
        }
    }
}

// ============================================================================
// READS & MUTATIONS
// ============================================================================

impl EntityStore {
    pub async fn read_renovations(&self) -> CacheResult<ReadOutcome<Vec<Renovation>>> {
        self.read_with(renovations_list(), |api| async move {
            api.list_renovations().await
        })
        .await
    }

    pub async fn read_renovation(
        &self,
        renovation_id: Option<&RenovationId>,
    ) -> CacheResult<ReadOutcome<Option<Renovation>>> {
        let Some(renovation_id) = renovation_id.cloned() else {
            return Ok(ReadOutcome::Idle);
        };
        self.read_with(renovation_detail(&renovation_id), move |api| async move {
            api.get_renovation(&renovation_id).await
        })
        .await
    }

    pub async fn read_refuge_renovations(
        &self,
        refuge_id: &RefugeId,
    ) -> CacheResult<ReadOutcome<Vec<Renovation>>> {
        let refuge_id = refuge_id.clone();
        self.read_with(refuge_renovations(&refuge_id), move |api| async move {
            api.list_refuge_renovations(&refuge_id).await
        })
        .await
    }

    /// Schedule a renovation. A 409 leaves the cache untouched; use
    /// [`conflicting_renovation`] on the error to show the overlap.
    pub fn create_renovation(
        &self,
        uid: &UserId,
        draft: RenovationDraft,
    ) -> impl Future<Output = CacheResult<Renovation>> + Send + 'static {
        let mutation = Mutation::<Renovation>::new(MutationKind::CreateRenovation)
            .param(EdgeParam::User, uid)
            .param(EdgeParam::Refuge, &draft.refuge_id)
            .affect::<Vec<Renovation>, _, _>(renovations_list(), |_| None, append_renovation)
            .affect::<Vec<Renovation>, _, _>(
                refuge_renovations(&draft.refuge_id),
                |_| None,
                append_renovation,
            );

        self.mutate_with(mutation, move |api| async move {
            api.create_renovation(&draft).await
        })
    }

    pub fn update_renovation(
        &self,
        renovation: &Renovation,
        update: RenovationUpdate,
    ) -> impl Future<Output = CacheResult<Renovation>> + Send + 'static {
        let detail_update = update.clone();
        let list_update = update.clone();
        let target = renovation.id.clone();
        let mutation = Mutation::<Renovation>::new(MutationKind::UpdateRenovation)
            .param(EdgeParam::User, &renovation.creator_uid)
            .param(EdgeParam::Refuge, &renovation.refuge_id)
            .param(EdgeParam::Renovation, &renovation.id)
            .affect::<Option<Renovation>, _, _>(
                renovation_detail(&renovation.id),
                move |current| patch_detail(current, |renovation| detail_update.apply_to(renovation)),
                |server, _| Some(Some(server.clone())),
            )
            .affect::<Vec<Renovation>, _, _>(
                refuge_renovations(&renovation.refuge_id),
                move |current| {
                    current.map(|mut renovations| {
                        for entry in renovations.iter_mut().filter(|r| r.id == target) {
                            list_update.apply_to(entry);
                        }
                        renovations
                    })
                },
                replace_renovation,
            );

        let renovation_id = renovation.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.update_renovation(&renovation_id, &update).await
        })
    }

    pub fn delete_renovation(&self, renovation: &Renovation) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let mut mutation = Mutation::<()>::new(MutationKind::DeleteRenovation)
            .param(EdgeParam::User, &renovation.creator_uid)
            .param(EdgeParam::Refuge, &renovation.refuge_id)
            .param(EdgeParam::Renovation, &renovation.id)
            .affect::<Option<Renovation>, _, _>(
                renovation_detail(&renovation.id),
                |_| Some(None),
                |_, _| Some(None),
            );
        for key in [
            renovations_list(),
            refuge_renovations(&renovation.refuge_id),
            user_renovations(&renovation.creator_uid),
        ] {
            let target = renovation.id.clone();
            mutation = mutation.affect::<Vec<Renovation>, _, _>(
                key,
                move |current| {
                    current.map(|mut renovations| {
                        renovations.retain(|r| r.id != target);
                        renovations
                    })
                },
                |_, _| None,
            );
        }

        let renovation_id = renovation.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.delete_renovation(&renovation_id).await
        })
    }

    pub fn join_renovation(
        &self,
        uid: &UserId,
        renovation_id: &RenovationId,
    ) -> impl Future<Output = CacheResult<Renovation>> + Send + 'static {
        self.participation(MutationKind::JoinRenovation, uid, renovation_id, true)
    }

    pub fn leave_renovation(
        &self,
        uid: &UserId,
        renovation_id: &RenovationId,
    ) -> impl Future<Output = CacheResult<Renovation>> + Send + 'static {
        self.participation(MutationKind::LeaveRenovation, uid, renovation_id, false)
    }

    fn participation(
        &self,
        kind: MutationKind,
        uid: &UserId,
        renovation_id: &RenovationId,
        joining: bool,
    ) -> impl Future<Output = CacheResult<Renovation>> + Send + 'static {
        let participant = uid.clone();
        let mutation = Mutation::<Renovation>::new(kind)
            .param(EdgeParam::User, uid)
            .param(EdgeParam::Renovation, renovation_id)
            .affect::<Option<Renovation>, _, _>(
                renovation_detail(renovation_id),
                move |current| {
                    patch_detail(current, |renovation| {
                        let participants = &mut renovation.participants_uids;
                        if !joining {
                            participants.retain(|uid| *uid != participant);
                        } else if !participants.contains(&participant) {
                            participants.push(participant);
                        }
                    })
                },
                |server, _| Some(Some(server.clone())),
            );

        let renovation_id = renovation_id.clone();
        self.mutate_with(mutation, move |api| async move {
            if joining {
                api.join_renovation(&renovation_id).await
            } else {
                api.leave_renovation(&renovation_id).await
            }
        })
    }
}

fn append_renovation(server: &Renovation, current: Option<Vec<Renovation>>) -> Option<Vec<Renovation>> {
    current.map(|mut renovations| {
        renovations.retain(|r| r.id != server.id);
        renovations.push(server.clone());
        renovations
    })
}

fn replace_renovation(server: &Renovation, current: Option<Vec<Renovation>>) -> Option<Vec<Renovation>> {
    current.map(|mut renovations| {
        for entry in renovations.iter_mut().filter(|r| r.id == server.id) {
            *entry = server.clone();
        }
        renovations
    })
}

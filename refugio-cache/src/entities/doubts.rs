use refugio_core::{
    cache_key, Answer, AnswerDraft, CacheKey, Doubt, EntityIdType, MutationKind, RefugeId, UserId,
};
use std::future::Future;

use super::EntityStore;
use crate::entry::ReadOutcome;
use crate::error::CacheResult;
use crate::invalidation::EdgeParam;
use crate::mutation::Mutation;

pub fn refuge_doubts(refuge_id: &RefugeId) -> CacheKey {
    cache_key!["doubts", "refuge", refuge_id.as_str()]
}

impl EntityStore {
    pub async fn read_refuge_doubts(&self, refuge_id: &RefugeId) -> CacheResult<ReadOutcome<Vec<Doubt>>> {
        let refuge_id = refuge_id.clone();
        self.read_with(refuge_doubts(&refuge_id), move |api| async move {
            api.list_refuge_doubts(&refuge_id).await
        })
        .await
    }

    pub fn create_doubt(
        &self,
        uid: &UserId,
        refuge_id: &RefugeId,
        message: &str,
    ) -> impl Future<Output = CacheResult<Doubt>> + Send + 'static {
        let mutation = Mutation::<Doubt>::new(MutationKind::CreateDoubt)
            .param(EdgeParam::User, uid)
            .param(EdgeParam::Refuge, refuge_id)
            .affect::<Vec<Doubt>, _, _>(refuge_doubts(refuge_id), |_| None, |server, current| {
                current.map(|mut doubts| {
                    doubts.insert(0, server.clone());
                    doubts
                })
            });

        let (refuge_id, message) = (refuge_id.clone(), message.to_string());
        self.mutate_with(mutation, move |api| async move {
            api.create_doubt(&refuge_id, &message).await
        })
    }

    pub fn delete_doubt(&self, doubt: &Doubt) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let target = doubt.id.clone();
        let mutation = Mutation::<()>::new(MutationKind::DeleteDoubt)
            .param(EdgeParam::Refuge, &doubt.refuge_id)
            .param(EdgeParam::Doubt, &doubt.id)
            .affect::<Vec<Doubt>, _, _>(
                refuge_doubts(&doubt.refuge_id),
                move |current| {
                    current.map(|mut doubts| {
                        doubts.retain(|d| d.id != target);
                        doubts
                    })
                },
                |_, _| None,
            );

        let doubt_id = doubt.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.delete_doubt(&doubt_id).await
        })
    }

    /// Answer a doubt. The answer is appended to the cached doubt once the
    /// server assigns its id.
    pub fn create_answer(
        &self,
        doubt: &Doubt,
        draft: AnswerDraft,
    ) -> impl Future<Output = CacheResult<Answer>> + Send + 'static {
        let mutation = Mutation::<Answer>::new(MutationKind::CreateAnswer)
            .param(EdgeParam::Refuge, &doubt.refuge_id)
            .param(EdgeParam::Doubt, &doubt.id)
            .affect::<Vec<Doubt>, _, _>(refuge_doubts(&doubt.refuge_id), |_| None, |server, current| {
                current.map(|mut doubts| {
                    for doubt in doubts.iter_mut().filter(|d| d.id == server.doubt_id) {
                        doubt.answers.push(server.clone());
                        doubt.answers_count = doubt.answers_count.saturating_add(1);
                    }
                    doubts
                })
            });

        let doubt_id = doubt.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.create_answer(&doubt_id, &draft).await
        })
    }

    pub fn delete_answer(
        &self,
        refuge_id: &RefugeId,
        answer: &Answer,
    ) -> impl Future<Output = CacheResult<()>> + Send + 'static {
        let target = answer.clone();
        let mutation = Mutation::<()>::new(MutationKind::DeleteAnswer)
            .param(EdgeParam::Refuge, refuge_id)
            .param(EdgeParam::Doubt, &answer.doubt_id)
            .affect::<Vec<Doubt>, _, _>(
                refuge_doubts(refuge_id),
                move |current| {
                    current.map(|mut doubts| {
                        for doubt in doubts.iter_mut().filter(|d| d.id == target.doubt_id) {
                            let before = doubt.answers.len();
                            doubt.answers.retain(|a| a.id != target.id);
                            if doubt.answers.len() < before {
                                doubt.answers_count = doubt.answers_count.saturating_sub(1);
                            }
                        }
                        doubts
                    })
                },
                |_, _| None,
            );

        let answer_id = answer.id.clone();
        self.mutate_with(mutation, move |api| async move {
            api.delete_answer(&answer_id).await
        })
    }
}

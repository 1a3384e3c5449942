//! Refugio Core - Shared Types
//!
//! Pure data structures shared by the request pipeline and the cache
//! coordinator: hierarchical cache keys, entity and mutation kinds, the
//! bearer credential, domain models, and the API error taxonomy.
//! This crate contains no I/O.

pub mod enums;
pub mod error;
pub mod identity;
pub mod key;
pub mod models;

pub use enums::{EntityKind, MutationKind};
pub use error::{
    ApiError, ApiErrorKind, ErrorBody, ValidationDetails, FORBIDDEN_MESSAGE, SERVER_ERROR_MESSAGE,
};
pub use identity::{
    AnswerId, Credential, DoubtId, EntityIdType, ExperienceId, MediaId, RefugeId, RenovationId,
    Timestamp, UserId,
};
pub use key::CacheKey;
pub use models::{
    Answer, AnswerDraft, Coordinates, Doubt, Experience, ExperienceDraft, MediaItem, Refuge,
    RefugeQuery, Renovation, RenovationDraft, RenovationUpdate, UploadFile, UploadedMedia, User,
    UserUpdate,
};

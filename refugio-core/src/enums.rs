//! Enum types for Refugio entities and mutations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-owned entity kinds that have cached views on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Refuge,
    RefugeMedia,
    Experience,
    Renovation,
    Doubt,
    Answer,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::User,
        EntityKind::Refuge,
        EntityKind::RefugeMedia,
        EntityKind::Experience,
        EntityKind::Renovation,
        EntityKind::Doubt,
        EntityKind::Answer,
    ];

    /// First segment of every cache key describing this kind.
    pub fn key_root(&self) -> &'static str {
        match self {
            EntityKind::User => "users",
            EntityKind::Refuge => "refuges",
            EntityKind::RefugeMedia => "media",
            EntityKind::Experience => "experiences",
            EntityKind::Renovation => "renovations",
            EntityKind::Doubt => "doubts",
            EntityKind::Answer => "answers",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EntityKind::User => "User",
            EntityKind::Refuge => "Refuge",
            EntityKind::RefugeMedia => "RefugeMedia",
            EntityKind::Experience => "Experience",
            EntityKind::Renovation => "Renovation",
            EntityKind::Doubt => "Doubt",
            EntityKind::Answer => "Answer",
        };
        write!(f, "{}", value)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "user" | "users" => Ok(EntityKind::User),
            "refuge" | "refuges" => Ok(EntityKind::Refuge),
            "refugemedia" | "media" => Ok(EntityKind::RefugeMedia),
            "experience" | "experiences" => Ok(EntityKind::Experience),
            "renovation" | "renovations" => Ok(EntityKind::Renovation),
            "doubt" | "doubts" => Ok(EntityKind::Doubt),
            "answer" | "answers" => Ok(EntityKind::Answer),
            _ => Err(format!("Invalid EntityKind: {}", s)),
        }
    }
}

/// Mutations known to the invalidation table.
///
/// Each variant names one remote write whose success may stale-mark cached
/// views owned by other entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    AddFavouriteRefuge,
    RemoveFavouriteRefuge,
    AddVisitedRefuge,
    RemoveVisitedRefuge,
    UpdateUser,
    UploadRefugeMedia,
    DeleteRefugeMedia,
    CreateExperience,
    UpdateExperience,
    DeleteExperience,
    CreateRenovation,
    UpdateRenovation,
    DeleteRenovation,
    JoinRenovation,
    LeaveRenovation,
    CreateDoubt,
    DeleteDoubt,
    CreateAnswer,
    DeleteAnswer,
}

impl MutationKind {
    pub const ALL: [MutationKind; 19] = [
        MutationKind::AddFavouriteRefuge,
        MutationKind::RemoveFavouriteRefuge,
        MutationKind::AddVisitedRefuge,
        MutationKind::RemoveVisitedRefuge,
        MutationKind::UpdateUser,
        MutationKind::UploadRefugeMedia,
        MutationKind::DeleteRefugeMedia,
        MutationKind::CreateExperience,
        MutationKind::UpdateExperience,
        MutationKind::DeleteExperience,
        MutationKind::CreateRenovation,
        MutationKind::UpdateRenovation,
        MutationKind::DeleteRenovation,
        MutationKind::JoinRenovation,
        MutationKind::LeaveRenovation,
        MutationKind::CreateDoubt,
        MutationKind::DeleteDoubt,
        MutationKind::CreateAnswer,
        MutationKind::DeleteAnswer,
    ];

    /// The entity kind written by this mutation.
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            MutationKind::AddFavouriteRefuge
            | MutationKind::RemoveFavouriteRefuge
            | MutationKind::AddVisitedRefuge
            | MutationKind::RemoveVisitedRefuge
            | MutationKind::UpdateUser => EntityKind::User,
            MutationKind::UploadRefugeMedia | MutationKind::DeleteRefugeMedia => {
                EntityKind::RefugeMedia
            }
            MutationKind::CreateExperience
            | MutationKind::UpdateExperience
            | MutationKind::DeleteExperience => EntityKind::Experience,
            MutationKind::CreateRenovation
            | MutationKind::UpdateRenovation
            | MutationKind::DeleteRenovation
            | MutationKind::JoinRenovation
            | MutationKind::LeaveRenovation => EntityKind::Renovation,
            MutationKind::CreateDoubt | MutationKind::DeleteDoubt => EntityKind::Doubt,
            MutationKind::CreateAnswer | MutationKind::DeleteAnswer => EntityKind::Answer,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            MutationKind::AddFavouriteRefuge => "add_favourite_refuge",
            MutationKind::RemoveFavouriteRefuge => "remove_favourite_refuge",
            MutationKind::AddVisitedRefuge => "add_visited_refuge",
            MutationKind::RemoveVisitedRefuge => "remove_visited_refuge",
            MutationKind::UpdateUser => "update_user",
            MutationKind::UploadRefugeMedia => "upload_refuge_media",
            MutationKind::DeleteRefugeMedia => "delete_refuge_media",
            MutationKind::CreateExperience => "create_experience",
            MutationKind::UpdateExperience => "update_experience",
            MutationKind::DeleteExperience => "delete_experience",
            MutationKind::CreateRenovation => "create_renovation",
            MutationKind::UpdateRenovation => "update_renovation",
            MutationKind::DeleteRenovation => "delete_renovation",
            MutationKind::JoinRenovation => "join_renovation",
            MutationKind::LeaveRenovation => "leave_renovation",
            MutationKind::CreateDoubt => "create_doubt",
            MutationKind::DeleteDoubt => "delete_doubt",
            MutationKind::CreateAnswer => "create_answer",
            MutationKind::DeleteAnswer => "delete_answer",
        };
        write!(f, "{}", value)
    }
}

fn normalize_token(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_from_str_accepts_key_roots() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.key_root().parse::<EntityKind>(), Ok(kind));
            assert_eq!(kind.to_string().parse::<EntityKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_entity_kind_from_str_rejects_unknown() {
        assert!("hut".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_mutation_kind_entity_kind() {
        assert_eq!(
            MutationKind::DeleteRefugeMedia.entity_kind(),
            EntityKind::RefugeMedia
        );
        assert_eq!(MutationKind::AddFavouriteRefuge.entity_kind(), EntityKind::User);
        assert_eq!(MutationKind::CreateAnswer.entity_kind(), EntityKind::Answer);
    }
}

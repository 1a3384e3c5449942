//! Declared invalidation edges.
//!
//! A static table from [`MutationKind`] to the key families whose displayed
//! value derives from the mutated entity. The coordinator consults it once,
//! on the success path of a mutation, and marks every entry under each
//! resolved prefix as invalidated.

use refugio_core::{CacheKey, MutationKind};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Identifier slots an edge template can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeParam {
    User,
    Refuge,
    Experience,
    Media,
    Renovation,
    Doubt,
}

impl fmt::Display for EdgeParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            EdgeParam::User => "user",
            EdgeParam::Refuge => "refuge",
            EdgeParam::Experience => "experience",
            EdgeParam::Media => "media",
            EdgeParam::Renovation => "renovation",
            EdgeParam::Doubt => "doubt",
        };
        write!(f, "{}", value)
    }
}

/// Identifiers supplied by one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeParams(HashMap<EdgeParam, String>);

impl EdgeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, param: EdgeParam, value: impl Into<String>) {
        self.0.insert(param, value.into());
    }

    pub fn get(&self, param: EdgeParam) -> Option<&str> {
        self.0.get(&param).map(String::as_str)
    }

    pub fn contains(&self, param: EdgeParam) -> bool {
        self.0.contains_key(&param)
    }
}

// ============================================================================
// EDGES
// ============================================================================

/// One segment of an edge key template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Lit(&'static str),
    Param(EdgeParam),
}

/// A dependent key family, described as a prefix template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeTarget {
    pub template: &'static [Segment],
    /// The edge only fires when the mutation supplied this parameter.
    pub requires: Option<EdgeParam>,
}

impl EdgeTarget {
    pub const fn new(template: &'static [Segment]) -> Self {
        Self {
            template,
            requires: None,
        }
    }

    pub const fn requiring(template: &'static [Segment], param: EdgeParam) -> Self {
        Self {
            template,
            requires: Some(param),
        }
    }

    /// Resolve the template against the mutation's parameters.
    ///
    /// Returns `None` when the edge's condition is not met or a referenced
    /// parameter is missing.
    pub fn resolve(&self, params: &EdgeParams) -> Option<CacheKey> {
        if let Some(required) = self.requires {
            if !params.contains(required) {
                return None;
            }
        }
        self.template
            .iter()
            .map(|segment| match segment {
                Segment::Lit(literal) => Some((*literal).to_string()),
                Segment::Param(param) => params.get(*param).map(str::to_string),
            })
            .collect::<Option<Vec<_>>>()
            .map(CacheKey::new)
    }
}

use EdgeParam as P;
use Segment::{Lit, Param};

const REFUGE_DETAIL: EdgeTarget = EdgeTarget::new(&[Lit("refuges"), Lit("detail"), Param(P::Refuge)]);
const REFUGE_LISTS: EdgeTarget = EdgeTarget::new(&[Lit("refuges"), Lit("list")]);
const REFUGE_SEARCHES: EdgeTarget = EdgeTarget::new(&[Lit("refuges"), Lit("search")]);
const REFUGE_MEDIA: EdgeTarget = EdgeTarget::new(&[Lit("media"), Lit("refuge"), Param(P::Refuge)]);
const REFUGE_EXPERIENCES: EdgeTarget =
    EdgeTarget::new(&[Lit("experiences"), Lit("refuge"), Param(P::Refuge)]);
const EXPERIENCE_LINKED_REFUGE_EXPERIENCES: EdgeTarget = EdgeTarget::requiring(
    &[Lit("experiences"), Lit("refuge"), Param(P::Refuge)],
    P::Experience,
);
const USER_DETAIL: EdgeTarget = EdgeTarget::new(&[Lit("users"), Lit("detail"), Param(P::User)]);
const USER_MEDIA: EdgeTarget = EdgeTarget::new(&[Lit("users"), Lit("media"), Param(P::User)]);
const USER_RENOVATIONS: EdgeTarget =
    EdgeTarget::new(&[Lit("users"), Lit("renovations"), Param(P::User)]);
const RENOVATION_LISTS: EdgeTarget = EdgeTarget::new(&[Lit("renovations"), Lit("list")]);
const RENOVATION_DETAIL: EdgeTarget =
    EdgeTarget::new(&[Lit("renovations"), Lit("detail"), Param(P::Renovation)]);
const REFUGE_RENOVATIONS: EdgeTarget =
    EdgeTarget::new(&[Lit("renovations"), Lit("refuge"), Param(P::Refuge)]);
const REFUGE_DOUBTS: EdgeTarget = EdgeTarget::new(&[Lit("doubts"), Lit("refuge"), Param(P::Refuge)]);

/// Everything that displays media or photo counters for a refuge and user.
const MEDIA_VIEWS: [EdgeTarget; 6] = [
    REFUGE_DETAIL,
    REFUGE_MEDIA,
    REFUGE_LISTS,
    REFUGE_SEARCHES,
    USER_DETAIL,
    USER_MEDIA,
];

/// Lookup table from mutation kind to dependent key families.
#[derive(Debug, Clone)]
pub struct InvalidationTable {
    edges: HashMap<MutationKind, Vec<EdgeTarget>>,
}

impl Default for InvalidationTable {
    fn default() -> Self {
        let mut edges: HashMap<MutationKind, Vec<EdgeTarget>> = HashMap::new();

        // Favourites and visits are denormalized onto the user record.
        edges.insert(MutationKind::AddFavouriteRefuge, Vec::new());
        edges.insert(MutationKind::RemoveFavouriteRefuge, Vec::new());
        edges.insert(MutationKind::AddVisitedRefuge, Vec::new());
        edges.insert(MutationKind::RemoveVisitedRefuge, Vec::new());
        edges.insert(MutationKind::UpdateUser, vec![USER_DETAIL]);

        edges.insert(MutationKind::UploadRefugeMedia, MEDIA_VIEWS.to_vec());
        let mut delete_media = MEDIA_VIEWS.to_vec();
        delete_media.push(EXPERIENCE_LINKED_REFUGE_EXPERIENCES);
        edges.insert(MutationKind::DeleteRefugeMedia, delete_media);

        let mut experience = MEDIA_VIEWS.to_vec();
        experience.push(REFUGE_EXPERIENCES);
        for kind in [
            MutationKind::CreateExperience,
            MutationKind::UpdateExperience,
            MutationKind::DeleteExperience,
        ] {
            edges.insert(kind, experience.clone());
        }

        for kind in [
            MutationKind::CreateRenovation,
            MutationKind::UpdateRenovation,
            MutationKind::DeleteRenovation,
        ] {
            edges.insert(kind, vec![RENOVATION_LISTS, REFUGE_RENOVATIONS, USER_RENOVATIONS]);
        }
        for kind in [MutationKind::JoinRenovation, MutationKind::LeaveRenovation] {
            edges.insert(kind, vec![RENOVATION_DETAIL, USER_RENOVATIONS]);
        }

        for kind in [
            MutationKind::CreateDoubt,
            MutationKind::DeleteDoubt,
            MutationKind::CreateAnswer,
            MutationKind::DeleteAnswer,
        ] {
            edges.insert(kind, vec![REFUGE_DOUBTS]);
        }

        Self { edges }
    }
}

impl InvalidationTable {
    /// A table with no edges at all.
    pub fn empty() -> Self {
        Self {
            edges: HashMap::new(),
        }
    }

    /// Declare an additional edge for `kind`.
    pub fn with_edge(mut self, kind: MutationKind, target: EdgeTarget) -> Self {
        self.edges.entry(kind).or_default().push(target);
        self
    }

    pub fn targets(&self, kind: MutationKind) -> &[EdgeTarget] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_entry(&self, kind: MutationKind) -> bool {
        self.edges.contains_key(&kind)
    }

    /// Resolve every edge of `kind` into a key prefix.
    pub fn resolve(&self, kind: MutationKind, params: &EdgeParams) -> Vec<CacheKey> {
        let mut prefixes = Vec::new();
        for target in self.targets(kind) {
            match target.resolve(params) {
                Some(prefix) => {
                    if !prefixes.contains(&prefix) {
                        prefixes.push(prefix);
                    }
                }
                None => {
                    tracing::debug!(
                        mutation = %kind,
                        requires = ?target.requires,
                        "Skipping invalidation edge with unmet parameters"
                    );
                }
            }
        }
        prefixes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refugio_core::cache_key;

    fn params(pairs: &[(EdgeParam, &str)]) -> EdgeParams {
        let mut params = EdgeParams::new();
        for (param, value) in pairs {
            params.insert(*param, *value);
        }
        params
    }

    #[test]
    fn test_every_mutation_kind_is_declared() {
        let table = InvalidationTable::default();
        for kind in MutationKind::ALL {
            assert!(table.has_entry(kind), "missing edges for {}", kind);
        }
    }

    #[test]
    fn test_favourites_invalidate_nothing() {
        let table = InvalidationTable::default();
        let params = params(&[(P::User, "u1"), (P::Refuge, "r9")]);
        assert!(table.resolve(MutationKind::AddFavouriteRefuge, &params).is_empty());
        assert!(table.resolve(MutationKind::RemoveVisitedRefuge, &params).is_empty());
    }

    #[test]
    fn test_upload_media_edges() {
        let table = InvalidationTable::default();
        let prefixes = table.resolve(
            MutationKind::UploadRefugeMedia,
            &params(&[(P::User, "u1"), (P::Refuge, "r1")]),
        );
        assert_eq!(
            prefixes,
            vec![
                cache_key!["refuges", "detail", "r1"],
                cache_key!["media", "refuge", "r1"],
                cache_key!["refuges", "list"],
                cache_key!["refuges", "search"],
                cache_key!["users", "detail", "u1"],
                cache_key!["users", "media", "u1"],
            ]
        );
    }

    #[test]
    fn test_media_delete_reaches_experiences_only_when_linked() {
        let table = InvalidationTable::default();
        let experiences = cache_key!["experiences", "refuge", "r1"];

        let unlinked = table.resolve(
            MutationKind::DeleteRefugeMedia,
            &params(&[(P::User, "u1"), (P::Refuge, "r1"), (P::Media, "m1")]),
        );
        assert!(!unlinked.contains(&experiences));

        let linked = table.resolve(
            MutationKind::DeleteRefugeMedia,
            &params(&[
                (P::User, "u1"),
                (P::Refuge, "r1"),
                (P::Media, "m1"),
                (P::Experience, "e1"),
            ]),
        );
        assert!(linked.contains(&experiences));
        assert!(linked.contains(&cache_key!["media", "refuge", "r1"]));
        assert!(linked.contains(&cache_key!["refuges", "detail", "r1"]));
    }

    #[test]
    fn test_missing_parameter_skips_edge() {
        let table = InvalidationTable::default();
        let prefixes = table.resolve(MutationKind::CreateRenovation, &params(&[(P::Refuge, "r1")]));
        assert_eq!(
            prefixes,
            vec![
                cache_key!["renovations", "list"],
                cache_key!["renovations", "refuge", "r1"],
            ]
        );
    }

    #[test]
    fn test_custom_edge() {
        let table = InvalidationTable::empty().with_edge(
            MutationKind::CreateAnswer,
            EdgeTarget::new(&[Segment::Lit("answers")]),
        );
        assert_eq!(
            table.resolve(MutationKind::CreateAnswer, &EdgeParams::new()),
            vec![cache_key!["answers"]]
        );
        assert!(table.targets(MutationKind::CreateDoubt).is_empty());
    }
}

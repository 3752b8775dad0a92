use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown meal type '{0}', expected breakfast, lunch, dinner or all")]
pub struct MealTypeParseError(pub String);

/// Errors surfaced by `ComboGenerator::generate`.
///
/// Only caller mistakes and collaborator failures end up here. Thin catalogs,
/// bad tag payloads and zero targets degrade inside the pipeline instead.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("meal request has no members")]
    EmptyMembers,
    #[error("member {0} is not part of this household")]
    UnknownMember(u64),
    #[error("data source failed: {0:#}")]
    Source(#[from] anyhow::Error),
}

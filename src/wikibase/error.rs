use super::{claim::ClaimRole, id::EntityId, id::EntityKind, repository::RepositoryError};
use crate::link::LinkError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityIdError {
    #[error("{id:?} is not a valid {} id", .kind.map_or("entity", |kind| kind.entity_type()))]
    Invalid {
        id: String,
        kind: Option<EntityKind>,
    },
    #[error("expected a {expected} id, found {found}")]
    KindMismatch { expected: EntityKind, found: EntityId },
}

/// Malformed entity data, in API payloads as well as in caller supplied data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    #[error("`{field}` must be {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("missing field `{0}`")]
    MissingField(String),
    #[error("`{key}` does not belong to site `{site}`")]
    SiteMismatch { key: String, site: String },
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },
    #[error("{kind} entities have no `{attribute}`")]
    UnsupportedAttribute {
        kind: EntityKind,
        attribute: &'static str,
    },
}

impl DataError {
    /// Prefix the offending field with the attribute it was found in.
    pub fn within(self, attribute: &str) -> Self {
        let prefixed = |field: String| {
            if field.is_empty() {
                attribute.to_string()
            } else {
                format!("{attribute}.{field}")
            }
        };
        match self {
            DataError::TypeMismatch {
                field,
                expected,
                found,
            } => DataError::TypeMismatch {
                field: prefixed(field),
                expected,
                found,
            },
            DataError::MissingField(field) => DataError::MissingField(prefixed(field)),
            DataError::InvalidValue { field, message } => DataError::InvalidValue {
                field: prefixed(field),
                message,
            },
            other => other,
        }
    }
}

/// A server-routed claim operation that is not allowed in the claim's current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimStateError {
    #[error("the claim is not attached to an entity")]
    Unattached,
    #[error("the claim has been removed from its entity")]
    Detached,
    #[error("the claim is a {0}, not a statement")]
    NotAStatement(ClaimRole),
    #[error("the claim is already attached to {0}")]
    AlreadyAttached(EntityId),
    #[error("the claim is already a {0}")]
    RoleConflict(ClaimRole),
    #[error("the entity has not been created yet")]
    EntityNotCreated,
    #[error("the same claim was given more than once")]
    DuplicateHandle,
}

#[derive(Debug, thiserror::Error)]
pub enum WikibaseError {
    #[error(transparent)]
    EntityId(#[from] EntityIdError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    ClaimState(#[from] ClaimStateError),
    #[error("repository error")]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("entity {0} does not exist")]
    NoSuchEntity(EntityId),
}

//! The Wikibase entity model: entities, their data attributes and statements, and the
//! diff against the last fetched state that `wbeditentity` expects.
//!
//! Reads and writes go through a [`Repository`], which is implemented outside this crate.

pub mod claim;
pub mod collections;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod repository;
pub mod value;

pub use claim::{Claim, ClaimHandle, ClaimRole, PropertyMap, Rank, Reference, SameAs, SnakType};
pub use collections::{AliasesDict, ClaimCollection, LanguageDict, SiteLink, SiteLinkCollection};
pub use entity::{EntityData, WikibaseEntity};
pub use error::{ClaimStateError, DataError, EntityIdError, WikibaseError};
pub use id::{DataAttribute, EntityId, EntityKind};
pub use page::WikibasePage;
pub use repository::{EditOptions, EntityEdit, Repository, RepositoryError};
pub use value::{Coordinate, MonolingualText, Target, ValueKind, WbQuantity, WbTime, WbUnknown};

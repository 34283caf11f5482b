use std::fmt::Debug;

use serde::Serialize;
use serde_json::Value;

use super::id::{EntityId, EntityKind};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("API error `{code}`: {info}")]
    Api { code: String, info: String },
    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Parameters shared by all write calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Revision the edit is based on, for edit conflict detection.
    pub baserevid: Option<u64>,
    pub summary: Option<String>,
    pub bot: bool,
}

impl EditOptions {
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    /// Mark the edit as a bot edit.
    pub fn as_bot(mut self) -> Self {
        self.bot = true;
        self
    }

    /// The request parameters for these options, to be sent along with the action
    /// parameters of a write call.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(baserevid) = self.baserevid {
            params.push(("baserevid", baserevid.to_string()));
        }
        if let Some(summary) = &self.summary {
            params.push(("summary", summary.clone()));
        }
        if self.bot {
            params.push(("bot", "1".to_string()));
        }
        params
    }
}

/// A `wbeditentity` request: either `id` or `new` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<&'static str>,
    pub data: Value,
}

impl EntityEdit {
    pub fn new(id: &EntityId, data: Value) -> Self {
        if id.is_new() {
            Self {
                id: None,
                new: Some(id.kind().entity_type()),
                data,
            }
        } else {
            Self {
                id: Some(id.clone()),
                new: None,
                data,
            }
        }
    }

    pub fn kind(&self) -> Option<EntityKind> {
        match (&self.id, self.new) {
            (Some(id), _) => Some(id.kind()),
            (None, Some(new)) => EntityKind::from_entity_type(new),
            (None, None) => None,
        }
    }
}

/// The write and read calls of the Wikibase API, made by an HTTP client outside this crate.
///
/// Responses are the decoded JSON the API returns:
/// - `load_entity`: the `wbgetentities` response, `{"entities": {"Q1": {...}}}`
/// - `edit_entity`: `{"entity": {...}}` holding the saved entity with its `lastrevid`
/// - claim, reference and qualifier calls: at least `{"pageinfo": {"lastrevid": ..}}`,
///   plus the saved `claim` or `reference` where the API returns one
pub trait Repository: Debug + Send + Sync {
    /// Prefix of concept URIs, e.g. `http://www.wikidata.org/entity/`.
    fn concept_base_uri(&self) -> &str;

    fn load_entity(&self, id: &EntityId) -> Result<Value, RepositoryError>;

    fn edit_entity(&self, edit: &EntityEdit, options: &EditOptions) -> Result<Value, RepositoryError>;

    /// `wbsetclaim` for a statement without GUID.
    fn add_claim(
        &self,
        entity: &EntityId,
        claim: &Value,
        options: &EditOptions,
    ) -> Result<Value, RepositoryError>;

    /// `wbsetclaim` for an existing statement.
    fn set_claim(&self, claim: &Value, options: &EditOptions) -> Result<Value, RepositoryError>;

    fn remove_claims(&self, guids: &[&str], options: &EditOptions) -> Result<Value, RepositoryError>;

    /// `wbsetreference` with `{"snaks": .., "snaks-order": ..}`, replacing the reference
    /// `hash` if given.
    fn set_reference(
        &self,
        statement: &str,
        reference: &Value,
        hash: Option<&str>,
        options: &EditOptions,
    ) -> Result<Value, RepositoryError>;

    fn remove_references(
        &self,
        statement: &str,
        hashes: &[&str],
        options: &EditOptions,
    ) -> Result<Value, RepositoryError>;

    /// `wbsetqualifier` with a single snak.
    fn set_qualifier(
        &self,
        statement: &str,
        snak: &Value,
        options: &EditOptions,
    ) -> Result<Value, RepositoryError>;

    fn remove_qualifiers(
        &self,
        statement: &str,
        hashes: &[&str],
        options: &EditOptions,
    ) -> Result<Value, RepositoryError>;
}

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{
    claim::{Claim, ClaimHandle, ClaimRole, Rank, Reference},
    collections::{AliasesDict, ClaimCollection, LanguageDict, SiteLinkCollection},
    error::{ClaimStateError, DataError, WikibaseError},
    id::{DataAttribute, EntityId, EntityKind},
    repository::{EditOptions, EntityEdit, Repository, RepositoryError},
    value::Target,
};

/// The data attributes of an entity. Only the attributes of the entity's kind are used.
#[derive(Debug, Clone)]
pub struct EntityData {
    pub labels: LanguageDict,
    pub descriptions: LanguageDict,
    pub aliases: AliasesDict,
    /// `claims`, or `statements` for media info.
    pub claims: ClaimCollection,
    pub sitelinks: SiteLinkCollection,
    pub lemmas: LanguageDict,
    pub representations: LanguageDict,
    pub glosses: LanguageDict,
    /// Datatype of a property.
    pub datatype: Option<String>,
}

impl EntityData {
    fn empty(owner: &EntityId) -> Self {
        Self {
            labels: LanguageDict::new(),
            descriptions: LanguageDict::new(),
            aliases: AliasesDict::new(),
            claims: ClaimCollection::new(owner.clone()),
            sitelinks: SiteLinkCollection::new(),
            lemmas: LanguageDict::new(),
            representations: LanguageDict::new(),
            glosses: LanguageDict::new(),
            datatype: None,
        }
    }

    fn from_json(id: &EntityId, json: &Value) -> Result<Self, DataError> {
        let mut data = Self::empty(id);
        for attribute in id.kind().data_attributes() {
            if let Some(value) = json.get(attribute.key()) {
                data.replace(*attribute, id, value)
                    .map_err(|e| e.within(attribute.key()))?;
            }
        }
        data.datatype = json
            .get("datatype")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(data)
    }

    fn replace(&mut self, attribute: DataAttribute, owner: &EntityId, json: &Value) -> Result<(), DataError> {
        match attribute {
            DataAttribute::Labels => self.labels = LanguageDict::from_json(json)?,
            DataAttribute::Descriptions => self.descriptions = LanguageDict::from_json(json)?,
            DataAttribute::Aliases => self.aliases = AliasesDict::from_json(json)?,
            DataAttribute::Claims | DataAttribute::Statements => {
                self.claims = ClaimCollection::from_json(owner.clone(), json)?
            }
            DataAttribute::SiteLinks => self.sitelinks = SiteLinkCollection::from_json(json)?,
            DataAttribute::Lemmas => self.lemmas = LanguageDict::from_json(json)?,
            DataAttribute::Representations => {
                self.representations = LanguageDict::from_json(json)?
            }
            DataAttribute::Glosses => self.glosses = LanguageDict::from_json(json)?,
        }
        Ok(())
    }

    fn attribute_to_json(&self, attribute: DataAttribute, diffto: Option<&Value>) -> Result<Value, DataError> {
        match attribute {
            DataAttribute::Labels => self.labels.to_json(diffto),
            DataAttribute::Descriptions => self.descriptions.to_json(diffto),
            DataAttribute::Aliases => self.aliases.to_json(diffto),
            DataAttribute::Claims | DataAttribute::Statements => self.claims.to_json(diffto),
            DataAttribute::SiteLinks => self.sitelinks.to_json(diffto),
            DataAttribute::Lemmas => self.lemmas.to_json(diffto),
            DataAttribute::Representations => self.representations.to_json(diffto),
            DataAttribute::Glosses => self.glosses.to_json(diffto),
        }
    }

    /// Serialise the attributes of `kind`; attributes without content are left out.
    pub fn to_json(&self, kind: EntityKind, diffto: Option<&Value>) -> Result<Value, DataError> {
        let mut json = Map::new();
        for attribute in kind.data_attributes() {
            let key = attribute.key();
            // an attribute missing from the baseline is empty there
            let before = diffto.map(|baseline| baseline.get(key).unwrap_or(&Value::Null));
            let value = self
                .attribute_to_json(*attribute, before)
                .map_err(|e| e.within(key))?;
            if value.as_object().is_some_and(|o| !o.is_empty()) {
                json.insert(key.to_string(), value);
            }
        }
        Ok(Value::Object(json))
    }
}

/// What was fetched, and the copy of it the diff is computed against.
#[derive(Debug, Clone)]
struct LoadedEntity {
    data: EntityData,
    baseline: Value,
    missing: bool,
    latest_revision_id: Option<u64>,
    modified: Option<DateTime<Utc>>,
}

fn revision_of(response: &Value) -> Option<u64> {
    response
        .pointer("/pageinfo/lastrevid")
        .or_else(|| response.get("lastrevid"))
        .and_then(Value::as_u64)
}

impl LoadedEntity {
    fn empty(id: &EntityId) -> Self {
        Self {
            data: EntityData::empty(id),
            baseline: json!({}),
            missing: false,
            latest_revision_id: None,
            modified: None,
        }
    }

    fn from_json(id: &EntityId, json: &Value) -> Result<Self, DataError> {
        Ok(Self {
            data: EntityData::from_json(id, json)?,
            baseline: json.clone(),
            missing: json.get("missing").is_some(),
            latest_revision_id: revision_of(json),
            modified: json
                .get("modified")
                .and_then(Value::as_str)
                .and_then(|modified| DateTime::parse_from_rfc3339(modified).ok())
                .map(|modified| modified.with_timezone(&Utc)),
        })
    }

    fn update_revision(&mut self, response: &Value) {
        if let Some(revision) = revision_of(response) {
            self.latest_revision_id = Some(revision);
        }
    }

    fn baseline_attribute(&mut self, key: &str) -> Option<&mut Map<String, Value>> {
        let baseline = self.baseline.as_object_mut()?;
        let attribute = baseline.entry(key).or_insert_with(|| json!({}));
        if !attribute.is_object() {
            *attribute = json!({});
        }
        attribute.as_object_mut()
    }

    /// Record a statement the server has saved in the baseline.
    fn sync_claim(&mut self, key: &str, handle: &ClaimHandle) -> Result<(), ClaimStateError> {
        let claim = self.data.claims.get(handle)?;
        let Some(id) = claim.id().map(str::to_string) else {
            return Ok(());
        };
        let property = claim.property().to_string();
        let json = claim.to_json();

        let Some(claims) = self.baseline_attribute(key) else {
            return Ok(());
        };
        let list = claims.entry(property).or_insert_with(|| json!([]));
        if !list.is_array() {
            *list = json!([]);
        }
        if let Value::Array(list) = list {
            match list
                .iter_mut()
                .find(|saved| saved.get("id").and_then(Value::as_str) == Some(id.as_str()))
            {
                Some(saved) => *saved = json,
                None => list.push(json),
            }
        }
        Ok(())
    }

    fn forget_claims(&mut self, key: &str, guids: &[String]) {
        let Some(claims) = self.baseline_attribute(key) else {
            return;
        };
        for list in claims.values_mut() {
            if let Value::Array(list) = list {
                list.retain(|saved| {
                    !saved
                        .get("id")
                        .and_then(Value::as_str)
                        .is_some_and(|id| guids.iter().any(|guid| guid == id))
                });
            }
        }
        claims.retain(|_, list| list.as_array().map_or(true, |list| !list.is_empty()));
    }
}

macro_rules! attribute_accessors {
    ($($attribute:ident: $ty:ty => $field:ident, $field_mut:ident;)*) => {
        $(
            pub fn $field(&self) -> Result<&$ty, WikibaseError> {
                Ok(&self.data_for(DataAttribute::$attribute)?.$field)
            }

            pub fn $field_mut(&mut self) -> Result<&mut $ty, WikibaseError> {
                Ok(&mut self.data_for_mut(DataAttribute::$attribute)?.$field)
            }
        )*
    };
}

/// An entity of a Wikibase repository.
///
/// Creating an entity does not touch the repository. The first access to a data attribute
/// loads it and remembers the fetched JSON as the baseline; [`WikibaseEntity::edit_entity`]
/// sends the difference between the current attributes and that baseline.
///
/// Entities with the id `-1` have not been created yet. They start empty and are never
/// loaded.
#[derive(Debug)]
pub struct WikibaseEntity {
    repo: Arc<dyn Repository>,
    id: EntityId,
    loaded: OnceLock<LoadedEntity>,
}

impl WikibaseEntity {
    pub fn new(repo: Arc<dyn Repository>, id: EntityId) -> Self {
        Self {
            repo,
            id,
            loaded: OnceLock::new(),
        }
    }

    /// An entity that will be created by the first [`WikibaseEntity::edit_entity`].
    pub fn new_entity(repo: Arc<dyn Repository>, kind: EntityKind) -> Self {
        Self::new(repo, EntityId::new_entity(kind))
    }

    /// An entity from an already fetched entity object (one value of the `entities` map of
    /// `wbgetentities`).
    pub fn from_json(repo: Arc<dyn Repository>, json: &Value) -> Result<Self, WikibaseError> {
        let id = json
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DataError::MissingField("id".into()))?;
        let id = match json.get("type").and_then(Value::as_str) {
            Some(entity_type) => {
                let kind = EntityKind::from_entity_type(entity_type).ok_or_else(|| {
                    DataError::InvalidValue {
                        field: "type".into(),
                        message: format!("unknown entity type {entity_type:?}"),
                    }
                })?;
                EntityId::parse_as(id, kind)?
            }
            None => EntityId::parse(id)?,
        };
        let loaded = LoadedEntity::from_json(&id, json)?;
        Ok(Self {
            repo,
            id,
            loaded: OnceLock::from(loaded),
        })
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind()
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    fn fetch(&self) -> Result<LoadedEntity, WikibaseError> {
        if self.id.is_new() {
            return Ok(LoadedEntity::empty(&self.id));
        }

        tracing::debug!(message = "Loading entity", id = %self.id);
        let response = self.repo.load_entity(&self.id)?;
        let entities = response
            .get("entities")
            .and_then(Value::as_object)
            .ok_or_else(|| RepositoryError::UnexpectedResponse("missing `entities`".into()))?;
        // a redirect is keyed by its target
        let entity = entities
            .get(self.id.as_str())
            .or_else(|| match entities.len() {
                1 => entities.values().next(),
                _ => None,
            })
            .ok_or_else(|| RepositoryError::UnexpectedResponse(format!("no entity {}", self.id)))?;
        Ok(LoadedEntity::from_json(&self.id, entity)?)
    }

    /// Load the entity unless that already happened.
    pub fn ensure_loaded(&self) -> Result<(), WikibaseError> {
        if self.loaded.get().is_none() {
            let loaded = self.fetch()?;
            self.loaded.get_or_init(|| loaded);
        }
        Ok(())
    }

    fn loaded(&self) -> Result<&LoadedEntity, WikibaseError> {
        self.ensure_loaded()?;
        match self.loaded.get() {
            Some(loaded) if !loaded.missing => Ok(loaded),
            _ => Err(WikibaseError::NoSuchEntity(self.id.clone())),
        }
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedEntity, WikibaseError> {
        self.ensure_loaded()?;
        let id = self.id.clone();
        match self.loaded.get_mut() {
            Some(loaded) if !loaded.missing => Ok(loaded),
            _ => Err(WikibaseError::NoSuchEntity(id)),
        }
    }

    /// The data attributes, loading them if needed. `force` discards the loaded state,
    /// including local changes, and loads again.
    pub fn get(&mut self, force: bool) -> Result<&EntityData, WikibaseError> {
        if force {
            self.loaded.take();
        }
        Ok(&self.loaded()?.data)
    }

    pub fn exists(&self) -> Result<bool, WikibaseError> {
        if self.id.is_new() {
            return Ok(false);
        }
        self.ensure_loaded()?;
        Ok(self.loaded.get().is_some_and(|loaded| !loaded.missing))
    }

    pub fn latest_revision_id(&self) -> Result<Option<u64>, WikibaseError> {
        Ok(self.loaded()?.latest_revision_id)
    }

    /// Time of the last edit.
    pub fn modified(&self) -> Result<Option<DateTime<Utc>>, WikibaseError> {
        Ok(self.loaded()?.modified)
    }

    /// `http://www.wikidata.org/entity/Q42` and the like.
    pub fn concept_uri(&self) -> Result<String, WikibaseError> {
        if self.id.is_new() {
            return Err(ClaimStateError::EntityNotCreated.into());
        }
        Ok(format!("{}{}", self.repo.concept_base_uri(), self.id))
    }

    fn check_attribute(&self, attribute: DataAttribute) -> Result<(), DataError> {
        if self.kind().data_attributes().contains(&attribute) {
            Ok(())
        } else {
            Err(DataError::UnsupportedAttribute {
                kind: self.kind(),
                attribute: attribute.key(),
            })
        }
    }

    fn data_for(&self, attribute: DataAttribute) -> Result<&EntityData, WikibaseError> {
        self.check_attribute(attribute)?;
        Ok(&self.loaded()?.data)
    }

    fn data_for_mut(&mut self, attribute: DataAttribute) -> Result<&mut EntityData, WikibaseError> {
        self.check_attribute(attribute)?;
        Ok(&mut self.loaded_mut()?.data)
    }

    attribute_accessors! {
        Labels: LanguageDict => labels, labels_mut;
        Descriptions: LanguageDict => descriptions, descriptions_mut;
        Aliases: AliasesDict => aliases, aliases_mut;
        SiteLinks: SiteLinkCollection => sitelinks, sitelinks_mut;
        Lemmas: LanguageDict => lemmas, lemmas_mut;
        Representations: LanguageDict => representations, representations_mut;
        Glosses: LanguageDict => glosses, glosses_mut;
    }

    /// The statements, stored as `claims` or (media info) `statements`.
    pub fn claims(&self) -> Result<&ClaimCollection, WikibaseError> {
        Ok(&self.data_for(self.kind().claims_attribute())?.claims)
    }

    pub fn claims_mut(&mut self) -> Result<&mut ClaimCollection, WikibaseError> {
        let attribute = self.kind().claims_attribute();
        Ok(&mut self.data_for_mut(attribute)?.claims)
    }

    fn check_property(&self) -> Result<(), DataError> {
        match self.kind() {
            EntityKind::Property => Ok(()),
            kind => Err(DataError::UnsupportedAttribute {
                kind,
                attribute: "datatype",
            }),
        }
    }

    pub fn datatype(&self) -> Result<Option<&str>, WikibaseError> {
        self.check_property()?;
        Ok(self.loaded()?.data.datatype.as_deref())
    }

    /// Set the datatype of a property that has not been created yet.
    pub fn set_datatype(&mut self, datatype: &str) -> Result<(), WikibaseError> {
        self.check_property()?;
        self.loaded_mut()?.data.datatype = Some(datatype.to_string());
        Ok(())
    }

    /// Serialise the data attributes, as a difference to `diffto` if given.
    pub fn to_json(&self, diffto: Option<&Value>) -> Result<Value, WikibaseError> {
        Ok(self.loaded()?.data.to_json(self.kind(), diffto)?)
    }

    /// The changes since the entity was loaded or last saved.
    pub fn diff(&self) -> Result<Value, WikibaseError> {
        let loaded = self.loaded()?;
        Ok(loaded.data.to_json(self.kind(), Some(&loaded.baseline))?)
    }

    /// Expand caller supplied entity data into the wire format, attribute by attribute.
    /// Keys that are not data attributes are passed through.
    pub fn normalize_data(kind: EntityKind, data: &Value) -> Result<Value, DataError> {
        let Value::Object(data) = data else {
            return Err(DataError::TypeMismatch {
                field: "data".into(),
                expected: "an object",
                found: super::claim::json_type_name(data),
            });
        };

        let mut normalized = Map::new();
        for (key, value) in data {
            let value = match DataAttribute::from_key(key) {
                Some(attribute) if !kind.data_attributes().contains(&attribute) => {
                    return Err(DataError::UnsupportedAttribute {
                        kind,
                        attribute: attribute.key(),
                    })
                }
                Some(attribute) => normalize_attribute(attribute, value).map_err(|e| e.within(key))?,
                None => value.clone(),
            };
            normalized.insert(key.clone(), value);
        }
        Ok(Value::Object(normalized))
    }

    /// Data that must accompany the creation of an entity: the datatype of a property.
    pub fn get_data_for_new_entity(&self) -> Result<Value, WikibaseError> {
        match self.kind() {
            EntityKind::Property => {
                let datatype = self
                    .datatype()?
                    .ok_or_else(|| DataError::MissingField("datatype".into()))?;
                Ok(json!({ "datatype": datatype }))
            }
            _ => Ok(json!({})),
        }
    }

    fn edit_options(&self, mut options: EditOptions) -> EditOptions {
        if options.baserevid.is_none() {
            options.baserevid = self.loaded.get().and_then(|loaded| loaded.latest_revision_id);
        }
        options
    }

    /// Save the entity with `wbeditentity`: `data` if given, otherwise the difference to the
    /// baseline. Creates the entity if it is new.
    ///
    /// Afterwards the baseline is what the server returned, and for attributes the server did
    /// not return, what was saved. Attributes returned by the server are reloaded, which
    /// invalidates the handles of reloaded claims.
    pub fn edit_entity(&mut self, data: Option<&Value>, options: EditOptions) -> Result<(), WikibaseError> {
        let kind = self.kind();
        let mut payload = match data {
            Some(data) => Self::normalize_data(kind, data)?,
            None => self.diff()?,
        };
        if self.id.is_new() {
            if let (Value::Object(payload), Value::Object(extra)) =
                (&mut payload, self.get_data_for_new_entity()?)
            {
                for (key, value) in extra {
                    payload.entry(key).or_insert(value);
                }
            }
        }

        let options = self.edit_options(options);
        let edit = EntityEdit::new(&self.id, payload);
        tracing::debug!(message = "Editing entity", id = %self.id, data = %edit.data);
        let response = self.repo.edit_entity(&edit, &options)?;
        let entity = response
            .get("entity")
            .ok_or_else(|| RepositoryError::UnexpectedResponse("missing `entity`".into()))?;

        if self.id.is_new() {
            let id = entity
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| RepositoryError::UnexpectedResponse("missing `entity.id`".into()))?;
            self.id = EntityId::parse_as(id, kind)?;
        }

        let id = self.id.clone();
        let loaded = self.loaded_mut()?;
        let saved = loaded.data.to_json(kind, None)?;
        loaded.data.claims.set_owner(id.clone());

        let mut baseline = Map::new();
        for attribute in kind.data_attributes() {
            let key = attribute.key();
            match entity.get(key) {
                Some(returned) => {
                    loaded
                        .data
                        .replace(*attribute, &id, returned)
                        .map_err(|e| e.within(key))?;
                    baseline.insert(key.to_string(), returned.clone());
                }
                None => {
                    let value = saved.get(key).cloned().unwrap_or_else(|| json!({}));
                    baseline.insert(key.to_string(), value);
                }
            }
        }
        for key in ["id", "type", "datatype", "lastrevid", "modified"] {
            if let Some(value) = entity.get(key) {
                baseline.insert(key.to_string(), value.clone());
            }
        }
        loaded.baseline = Value::Object(baseline);
        loaded.update_revision(entity);
        Ok(())
    }

    /// GUID of a statement that exists on the server.
    fn saved_statement(&self, handle: &ClaimHandle) -> Result<String, WikibaseError> {
        if self.id.is_new() {
            return Err(ClaimStateError::EntityNotCreated.into());
        }
        let claim = self.claims()?.get(handle)?;
        match claim.id() {
            Some(id) => Ok(id.to_string()),
            None => Err(ClaimStateError::Unattached.into()),
        }
    }

    fn claims_key(&self) -> &'static str {
        self.kind().claims_attribute().key()
    }

    /// Save a new statement with `wbsetclaim` and attach it.
    pub fn add_claim(&mut self, mut claim: Claim, options: EditOptions) -> Result<ClaimHandle, WikibaseError> {
        if self.id.is_new() {
            return Err(ClaimStateError::EntityNotCreated.into());
        }
        if claim.role() != ClaimRole::Statement {
            return Err(ClaimStateError::NotAStatement(claim.role()).into());
        }
        if let Some(on_item) = claim.on_item() {
            return Err(ClaimStateError::AlreadyAttached(on_item.clone()).into());
        }

        self.ensure_loaded()?;
        let options = self.edit_options(options);
        let response = self.repo.add_claim(&self.id, &claim.to_json(), &options)?;
        tracing::debug!(message = "Added claim", entity = %self.id, property = %claim.property());

        if let Some(saved) = response.get("claim") {
            let saved = Claim::from_json(saved)?;
            claim.set_id(saved.id().map(str::to_string));
            claim.set_hash(saved.hash().map(str::to_string));
        }

        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        let handle = loaded.data.claims.insert(claim)?;
        loaded.sync_claim(key, &handle)?;
        loaded.update_revision(&response);
        Ok(handle)
    }

    /// Remove statements with `wbremoveclaims` and hand them back detached. Statements that
    /// were never saved are only removed locally.
    pub fn remove_claims(&mut self, handles: &[ClaimHandle], options: EditOptions) -> Result<Vec<Claim>, WikibaseError> {
        if self.id.is_new() {
            return Err(ClaimStateError::EntityNotCreated.into());
        }
        let claims = self.claims()?;
        let mut guids = Vec::new();
        for (i, handle) in handles.iter().enumerate() {
            if handles[..i].contains(handle) {
                return Err(ClaimStateError::DuplicateHandle.into());
            }
            if let Some(id) = claims.get(handle)?.id() {
                guids.push(id.to_string());
            }
        }

        let response = if guids.is_empty() {
            None
        } else {
            let options = self.edit_options(options);
            let refs: Vec<&str> = guids.iter().map(String::as_str).collect();
            let response = self.repo.remove_claims(&refs, &options)?;
            tracing::debug!(message = "Removed claims", entity = %self.id, guids = ?guids);
            Some(response)
        };

        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        let mut removed = Vec::with_capacity(handles.len());
        for handle in handles {
            removed.push(loaded.data.claims.remove(handle)?);
        }
        loaded.forget_claims(key, &guids);
        if let Some(response) = response {
            loaded.update_revision(&response);
        }
        Ok(removed)
    }

    /// Add a reference group made of a single snak.
    pub fn add_source(&mut self, handle: &ClaimHandle, source: Claim, options: EditOptions) -> Result<(), WikibaseError> {
        self.add_sources(handle, vec![source], options)
    }

    /// Add one reference group with `wbsetreference`.
    pub fn add_sources(&mut self, handle: &ClaimHandle, sources: Vec<Claim>, options: EditOptions) -> Result<(), WikibaseError> {
        let guid = self.saved_statement(handle)?;
        let reference = Reference::new(sources)?;

        let options = self.edit_options(options);
        let response = self
            .repo
            .set_reference(&guid, &reference.to_json(), None, &options)?;
        tracing::debug!(message = "Added reference", statement = %guid);

        let reference = match response.get("reference") {
            Some(saved) => Reference::from_json(saved)?,
            None => reference,
        };
        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        loaded.data.claims.get_mut(handle)?.push_source(reference)?;
        loaded.sync_claim(key, handle)?;
        loaded.update_revision(&response);
        Ok(())
    }

    /// Remove reference groups by hash with `wbremovereferences`.
    pub fn remove_sources(&mut self, handle: &ClaimHandle, hashes: &[&str], options: EditOptions) -> Result<(), WikibaseError> {
        let guid = self.saved_statement(handle)?;
        let options = self.edit_options(options);
        let response = self.repo.remove_references(&guid, hashes, &options)?;
        tracing::debug!(message = "Removed references", statement = %guid, ?hashes);

        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        loaded
            .data
            .claims
            .get_mut(handle)?
            .sources_mut()
            .retain(|source| !source.hash.as_deref().is_some_and(|hash| hashes.contains(&hash)));
        loaded.sync_claim(key, handle)?;
        loaded.update_revision(&response);
        Ok(())
    }

    /// Add a qualifier with `wbsetqualifier`.
    pub fn add_qualifier(&mut self, handle: &ClaimHandle, qualifier: Claim, options: EditOptions) -> Result<(), WikibaseError> {
        let guid = self.saved_statement(handle)?;
        let qualifier = qualifier.into_qualifier()?;

        let options = self.edit_options(options);
        let response = self.repo.set_qualifier(&guid, &qualifier.to_json(), &options)?;
        tracing::debug!(message = "Added qualifier", statement = %guid, property = %qualifier.property());

        let saved = response.get("claim").map(Claim::from_json).transpose()?;
        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        let claim = loaded.data.claims.get_mut(handle)?;
        match saved {
            Some(saved) => *claim.qualifiers_mut() = saved.qualifiers().clone(),
            None => claim.push_qualifier(qualifier)?,
        }
        loaded.sync_claim(key, handle)?;
        loaded.update_revision(&response);
        Ok(())
    }

    /// Remove qualifiers by hash with `wbremovequalifiers`.
    pub fn remove_qualifiers(&mut self, handle: &ClaimHandle, hashes: &[&str], options: EditOptions) -> Result<(), WikibaseError> {
        let guid = self.saved_statement(handle)?;
        let options = self.edit_options(options);
        let response = self.repo.remove_qualifiers(&guid, hashes, &options)?;
        tracing::debug!(message = "Removed qualifiers", statement = %guid, ?hashes);

        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        let qualifiers = loaded.data.claims.get_mut(handle)?.qualifiers_mut();
        for (_, values) in qualifiers.iter_mut() {
            values.retain(|q| !q.hash().is_some_and(|hash| hashes.contains(&hash)));
        }
        qualifiers.prune();
        loaded.sync_claim(key, handle)?;
        loaded.update_revision(&response);
        Ok(())
    }

    fn save_claim(&mut self, handle: &ClaimHandle, change: impl FnOnce(&mut Claim) -> Result<(), WikibaseError>) -> Result<(), WikibaseError> {
        self.saved_statement(handle)?;
        let mut claim = self.claims()?.get(handle)?.clone();
        change(&mut claim)?;

        let options = self.edit_options(EditOptions::default());
        let response = self.repo.set_claim(&claim.to_json(), &options)?;
        tracing::debug!(message = "Saved claim", statement = claim.id());

        let key = self.claims_key();
        let loaded = self.loaded_mut()?;
        *loaded.data.claims.get_mut(handle)? = claim;
        loaded.sync_claim(key, handle)?;
        loaded.update_revision(&response);
        Ok(())
    }

    /// Change the rank of a saved statement with `wbsetclaim`.
    pub fn change_rank(&mut self, handle: &ClaimHandle, rank: Rank) -> Result<(), WikibaseError> {
        self.save_claim(handle, |claim| {
            claim.set_rank(rank);
            Ok(())
        })
    }

    /// Change the value of a saved statement with `wbsetclaim`.
    pub fn change_target(&mut self, handle: &ClaimHandle, target: Target) -> Result<(), WikibaseError> {
        self.save_claim(handle, |claim| Ok(claim.set_target(target)?))
    }
}

fn normalize_attribute(attribute: DataAttribute, value: &Value) -> Result<Value, DataError> {
    match attribute {
        DataAttribute::Labels
        | DataAttribute::Descriptions
        | DataAttribute::Lemmas
        | DataAttribute::Representations
        | DataAttribute::Glosses => LanguageDict::normalize_data(value),
        DataAttribute::Aliases => AliasesDict::normalize_data(value),
        DataAttribute::Claims | DataAttribute::Statements => ClaimCollection::normalize_data(value),
        DataAttribute::SiteLinks => SiteLinkCollection::normalize_data(value),
    }
}

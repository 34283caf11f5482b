//! The data attributes of an entity.
//!
//! Every collection can be built from the entity JSON (`from_json`), expand shorthand input
//! into the wire format (`normalize_data`) and serialise itself, either completely or as the
//! difference to a previously fetched baseline of the same attribute (`to_json`).

use std::{
    ops::{Index, IndexMut},
    sync::atomic::{AtomicU64, Ordering},
};

use compact_str::CompactString;
use rustc_hash::FxHashSet;
use serde_json::{json, Map, Value};

use super::{
    claim::{json_type_name, Claim, ClaimHandle, ClaimRole, PropertyMap, SameAs},
    error::{ClaimStateError, DataError, WikibaseError},
    id::{EntityId, EntityKind},
};
use crate::{
    link::{Link, LinkError},
    site::Site,
    siteinfo::family_and_code_from_dbname,
};

fn type_mismatch(field: &str, expected: &'static str, found: &Value) -> DataError {
    DataError::TypeMismatch {
        field: field.to_string(),
        expected,
        found: json_type_name(found),
    }
}

/// An attribute object, where a missing attribute, `null` and the `[]` PHP emits for empty
/// maps all count as empty.
pub(crate) fn object_or_empty<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, DataError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(a)) if a.is_empty() => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(type_mismatch(field, "an object", other)),
    }
}

fn string_field<'a>(value: &'a Value, key: &str, field: &str) -> Result<&'a str, DataError> {
    match value.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(type_mismatch(&format!("{field}.{key}"), "a string", other)),
        None => Err(DataError::MissingField(format!("{field}.{key}"))),
    }
}

/// Ordered string map keyed by language code: labels, descriptions, lemmas, representations
/// and glosses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LanguageDict {
    entries: Vec<(CompactString, String)>,
}

impl LanguageDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &Value) -> Result<Self, DataError> {
        let mut dict = Self::new();
        let Some(map) = object_or_empty(Some(json), "")? else {
            return Ok(dict);
        };
        for (language, entry) in map {
            let value = string_field(entry, "value", language)?;
            dict.insert(language, value);
        }
        Ok(dict)
    }

    pub fn get(&self, language: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == language)
            .map(|(_, value)| value.as_str())
    }

    /// Set the value of a language and return the previous one.
    pub fn insert(&mut self, language: &str, value: &str) -> Option<String> {
        match self.entries.iter_mut().find(|(key, _)| key == language) {
            Some((_, old)) => Some(std::mem::replace(old, value.to_string())),
            None => {
                self.entries.push((language.into(), value.to_string()));
                None
            }
        }
    }

    pub fn remove(&mut self, language: &str) -> Option<String> {
        let position = self.entries.iter().position(|(key, _)| key == language)?;
        Some(self.entries.remove(position).1)
    }

    /// The value in the language of `site`.
    pub fn get_for_site(&self, site: &Site) -> Option<&str> {
        self.get(site.lang())
    }

    pub fn insert_for_site(&mut self, site: &Site, value: &str) -> Option<String> {
        self.insert(site.lang(), value)
    }

    pub fn contains(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expand `{"en": "Foo"}` into `{"en": {"language": "en", "value": "Foo"}}`.
    pub fn normalize_data(data: &Value) -> Result<Value, DataError> {
        let mut normalized = Map::new();
        for (language, value) in object_or_empty(Some(data), "")?.into_iter().flatten() {
            let entry = match value {
                Value::String(s) => json!({ "language": language, "value": s }),
                Value::Object(_) => value.clone(),
                other => return Err(type_mismatch(language, "a string or an object", other)),
            };
            normalized.insert(language.clone(), entry);
        }
        Ok(Value::Object(normalized))
    }

    /// Without a baseline, every entry. With one, changed and added entries plus
    /// `{"language": .., "value": ""}` for every removed language.
    pub fn to_json(&self, diffto: Option<&Value>) -> Result<Value, DataError> {
        let entry = |language: &str, value: &str| json!({ "language": language, "value": value });
        let mut data = Map::new();

        let Some(diffto) = diffto else {
            for (language, value) in self.iter() {
                data.insert(language.to_string(), entry(language, value));
            }
            return Ok(Value::Object(data));
        };

        let baseline = object_or_empty(Some(diffto), "")?;
        let baseline_value = |language: &str| {
            baseline
                .and_then(|b| b.get(language))
                .and_then(|e| e.get("value"))
                .and_then(Value::as_str)
        };

        for (language, value) in self.iter() {
            if baseline_value(language) != Some(value) {
                data.insert(language.to_string(), entry(language, value));
            }
        }
        for language in baseline.into_iter().flat_map(|b| b.keys()) {
            if !self.contains(language) {
                data.insert(language.clone(), entry(language, ""));
            }
        }
        Ok(Value::Object(data))
    }
}

/// Language code -> ordered alias list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AliasesDict {
    entries: Vec<(CompactString, Vec<String>)>,
}

impl AliasesDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &Value) -> Result<Self, DataError> {
        let mut dict = Self::new();
        for (language, aliases) in object_or_empty(Some(json), "")?.into_iter().flatten() {
            let Value::Array(aliases) = aliases else {
                return Err(type_mismatch(language, "an array", aliases));
            };
            let values = aliases
                .iter()
                .map(|alias| string_field(alias, "value", language).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            dict.set(language, values);
        }
        Ok(dict)
    }

    pub fn get(&self, language: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(key, _)| key == language)
            .map(|(_, aliases)| aliases.as_slice())
    }

    /// The aliases of `language`, created empty if missing.
    pub fn get_mut(&mut self, language: &str) -> &mut Vec<String> {
        let position = match self.entries.iter().position(|(key, _)| key == language) {
            Some(position) => position,
            None => {
                self.entries.push((language.into(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[position].1
    }

    pub fn set(&mut self, language: &str, aliases: Vec<String>) -> Option<Vec<String>> {
        let slot = self.get_mut(language);
        let old = std::mem::replace(slot, aliases);
        (!old.is_empty()).then_some(old)
    }

    pub fn push(&mut self, language: &str, alias: &str) {
        self.get_mut(language).push(alias.to_string());
    }

    /// Removing a language is the same as emptying it.
    pub fn remove(&mut self, language: &str) -> Option<Vec<String>> {
        let position = self.entries.iter().position(|(key, _)| key == language)?;
        Some(self.entries.remove(position).1)
    }

    pub fn get_for_site(&self, site: &Site) -> Option<&[String]> {
        self.get(site.lang())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(key, aliases)| (key.as_str(), aliases.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, aliases)| aliases.is_empty())
    }

    /// Expand `{"en": ["Foo", ...]}` into lists of `{"language", "value"}` objects.
    /// Anything but a list per language is rejected.
    pub fn normalize_data(data: &Value) -> Result<Value, DataError> {
        let mut normalized = Map::new();
        for (language, aliases) in object_or_empty(Some(data), "")?.into_iter().flatten() {
            let Value::Array(aliases) = aliases else {
                return Err(type_mismatch(language, "an array", aliases));
            };
            let aliases = aliases
                .iter()
                .map(|alias| match alias {
                    Value::String(s) => Ok(json!({ "language": language, "value": s })),
                    Value::Object(_) => Ok(alias.clone()),
                    other => Err(type_mismatch(language, "an array of strings or objects", other)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            normalized.insert(language.clone(), Value::Array(aliases));
        }
        Ok(Value::Object(normalized))
    }

    /// A changed language is sent with its complete current list. An emptied language sends
    /// every baseline alias with a `remove` marker.
    pub fn to_json(&self, diffto: Option<&Value>) -> Result<Value, DataError> {
        let full = |language: &str, aliases: &[String]| {
            Value::Array(
                aliases
                    .iter()
                    .map(|alias| json!({ "language": language, "value": alias }))
                    .collect(),
            )
        };
        let mut data = Map::new();

        let Some(diffto) = diffto else {
            for (language, aliases) in self.iter().filter(|(_, a)| !a.is_empty()) {
                data.insert(language.to_string(), full(language, aliases));
            }
            return Ok(Value::Object(data));
        };

        let baseline = Self::from_json(diffto)?;
        let removed = |language: &str| {
            Value::Array(
                baseline
                    .get(language)
                    .unwrap_or_default()
                    .iter()
                    .map(|alias| json!({ "language": language, "value": alias, "remove": "" }))
                    .collect(),
            )
        };

        for (language, aliases) in self.iter() {
            let before = baseline.get(language).unwrap_or_default();
            if aliases == before {
                continue;
            }
            if aliases.is_empty() {
                data.insert(language.to_string(), removed(language));
            } else {
                data.insert(language.to_string(), full(language, aliases));
            }
        }
        for (language, aliases) in baseline.iter() {
            if self.get(language).is_none() && !aliases.is_empty() {
                data.insert(language.to_string(), removed(language));
            }
        }
        Ok(Value::Object(data))
    }
}

static GENERATION: AtomicU64 = AtomicU64::new(0);

/// The statements of an entity.
///
/// The collection owns its claims; callers refer to them by [`ClaimHandle`]. Removing a
/// claim hands it back detached and invalidates its handle.
#[derive(Debug, Clone)]
pub struct ClaimCollection {
    owner: EntityId,
    generation: u64,
    slots: Vec<Option<Claim>>,
    order: PropertyMap<usize>,
}

impl ClaimCollection {
    pub fn new(owner: EntityId) -> Self {
        Self {
            owner,
            generation: GENERATION.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
            order: PropertyMap::new(),
        }
    }

    pub fn from_json(owner: EntityId, json: &Value) -> Result<Self, DataError> {
        let mut collection = Self::new(owner);
        for (property, claims) in object_or_empty(Some(json), "")?.into_iter().flatten() {
            let Value::Array(claims) = claims else {
                return Err(type_mismatch(property, "an array", claims));
            };
            for claim in claims {
                let claim = Claim::from_json(claim).map_err(|e| e.within(property))?;
                collection.attach(claim);
            }
        }
        Ok(collection)
    }

    pub fn owner(&self) -> &EntityId {
        &self.owner
    }

    /// Called once a new entity has been created and got its id.
    pub(crate) fn set_owner(&mut self, owner: EntityId) {
        for claim in self.slots.iter_mut().flatten() {
            claim.on_item = Some(owner.clone());
        }
        self.owner = owner;
    }

    fn attach(&mut self, mut claim: Claim) -> ClaimHandle {
        let handle = ClaimHandle {
            index: self.slots.len(),
            generation: self.generation,
        };
        claim.on_item = Some(self.owner.clone());
        claim.handle = Some(handle);
        let property = claim.property().clone();
        self.slots.push(Some(claim));
        self.order.push(&property, handle.index);
        handle
    }

    /// Attach a statement to this entity.
    pub fn insert(&mut self, claim: Claim) -> Result<ClaimHandle, ClaimStateError> {
        if claim.role() != ClaimRole::Statement {
            return Err(ClaimStateError::NotAStatement(claim.role()));
        }
        if let Some(on_item) = claim.on_item() {
            return Err(ClaimStateError::AlreadyAttached(on_item.clone()));
        }
        Ok(self.attach(claim))
    }

    fn check(&self, handle: &ClaimHandle) -> Result<(), ClaimStateError> {
        match self.slots.get(handle.index) {
            Some(Some(_)) if handle.generation == self.generation => Ok(()),
            _ => Err(ClaimStateError::Detached),
        }
    }

    pub fn contains(&self, handle: &ClaimHandle) -> bool {
        self.check(handle).is_ok()
    }

    pub fn get(&self, handle: &ClaimHandle) -> Result<&Claim, ClaimStateError> {
        self.check(handle)?;
        self.slots[handle.index]
            .as_ref()
            .ok_or(ClaimStateError::Detached)
    }

    pub fn get_mut(&mut self, handle: &ClaimHandle) -> Result<&mut Claim, ClaimStateError> {
        self.check(handle)?;
        self.slots[handle.index]
            .as_mut()
            .ok_or(ClaimStateError::Detached)
    }

    /// Detach a claim. The returned claim can be added to an entity again.
    pub fn remove(&mut self, handle: &ClaimHandle) -> Result<Claim, ClaimStateError> {
        self.check(handle)?;
        let mut claim = self.slots[handle.index]
            .take()
            .ok_or(ClaimStateError::Detached)?;
        if let Some(indices) = self.order.get_mut(claim.property()) {
            indices.retain(|index| *index != handle.index);
        }
        self.order.prune();
        claim.on_item = None;
        claim.handle = None;
        Ok(claim)
    }

    /// The handle of the statement with the given GUID.
    pub fn find_by_id(&self, guid: &str) -> Option<ClaimHandle> {
        self.iter()
            .find(|(_, claim)| claim.id() == Some(guid))
            .map(|(handle, _)| handle)
    }

    pub fn handles(&self, property: &EntityId) -> Vec<ClaimHandle> {
        self.order
            .get(property)
            .unwrap_or_default()
            .iter()
            .map(|&index| ClaimHandle {
                index,
                generation: self.generation,
            })
            .collect()
    }

    pub fn by_property<'a>(&'a self, property: &EntityId) -> impl Iterator<Item = &'a Claim> + 'a {
        self.order
            .get(property)
            .unwrap_or_default()
            .iter()
            .filter_map(|&index| self.slots[index].as_ref())
    }

    pub fn properties(&self) -> impl Iterator<Item = &EntityId> {
        self.order.keys()
    }

    /// All claims, property by property.
    pub fn iter(&self) -> impl Iterator<Item = (ClaimHandle, &Claim)> {
        self.order.values().filter_map(|&index| {
            self.slots[index].as_ref().map(|claim| {
                (
                    ClaimHandle {
                        index,
                        generation: self.generation,
                    },
                    claim,
                )
            })
        })
    }

    /// Number of claims.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check the shape: a property -> list of statement objects map.
    pub fn normalize_data(data: &Value) -> Result<Value, DataError> {
        for (property, claims) in object_or_empty(Some(data), "")?.into_iter().flatten() {
            let Value::Array(claims) = claims else {
                return Err(type_mismatch(property, "an array", claims));
            };
            if let Some(claim) = claims.iter().find(|claim| !claim.is_object()) {
                return Err(type_mismatch(property, "an array of objects", claim));
            }
        }
        Ok(data.clone())
    }

    /// With a baseline: new statements in full, statements that differ from their baseline
    /// version (rank and references included, qualifier order ignored) in full, and an
    /// `{"id": .., "remove": ""}` stub for every statement that is gone.
    pub fn to_json(&self, diffto: Option<&Value>) -> Result<Value, DataError> {
        let mut data = Map::new();
        for property in self.order.keys() {
            let claims: Vec<Value> = self.by_property(property).map(Claim::to_json).collect();
            if !claims.is_empty() {
                data.insert(property.to_string(), Value::Array(claims));
            }
        }

        let Some(diffto) = diffto else {
            return Ok(Value::Object(data));
        };

        let baseline = object_or_empty(Some(diffto), "")?;
        let mut diff = Map::new();

        for property in self.order.keys() {
            let key = property.as_str();
            let Some(Value::Array(before)) = baseline.and_then(|b| b.get(key)) else {
                if let Some(claims) = data.remove(key) {
                    diff.insert(key.to_string(), claims);
                }
                continue;
            };

            let mut changed = Vec::new();
            let mut seen = FxHashSet::default();
            for claim in self.by_property(property) {
                let Some(id) = claim.id() else {
                    changed.push(claim.to_json());
                    continue;
                };
                seen.insert(id.to_string());
                let unchanged = before
                    .iter()
                    .find(|json| json.get("id").and_then(Value::as_str) == Some(id))
                    .map(|json| Claim::from_json(json).map_err(|e| e.within(key)))
                    .transpose()?
                    .is_some_and(|old| claim.same_as_with(&old, SameAs::ALL));
                if unchanged {
                    continue;
                }
                tracing::debug!(message = "Statement changed", id);
                changed.push(claim.to_json());
            }
            for json in before {
                let id = string_field(json, "id", key)?;
                if !seen.contains(id) {
                    changed.push(json!({ "id": id, "remove": "" }));
                }
            }
            if !changed.is_empty() {
                diff.insert(key.to_string(), Value::Array(changed));
            }
        }

        for (key, before) in baseline.into_iter().flatten() {
            let still_present = EntityId::parse_as(key, EntityKind::Property)
                .is_ok_and(|property| self.order.get(&property).is_some_and(|c| !c.is_empty()));
            if still_present {
                continue;
            }
            let Value::Array(before) = before else {
                return Err(type_mismatch(key, "an array", before));
            };
            let removed = before
                .iter()
                .map(|json| string_field(json, "id", key).map(|id| json!({ "id": id, "remove": "" })))
                .collect::<Result<Vec<_>, _>>()?;
            if !removed.is_empty() {
                diff.insert(key.clone(), Value::Array(removed));
            }
        }

        Ok(Value::Object(diff))
    }
}

/// Panics on a stale handle; use [`ClaimCollection::get`] to check.
impl Index<&ClaimHandle> for ClaimCollection {
    type Output = Claim;

    fn index(&self, handle: &ClaimHandle) -> &Self::Output {
        match self.get(handle) {
            Ok(claim) => claim,
            Err(e) => panic!("invalid claim handle {handle:?}: {e}"),
        }
    }
}

impl IndexMut<&ClaimHandle> for ClaimCollection {
    fn index_mut(&mut self, handle: &ClaimHandle) -> &mut Self::Output {
        match self.get_mut(handle) {
            Ok(claim) => claim,
            Err(e) => panic!("invalid claim handle {handle:?}: {e}"),
        }
    }
}

/// A page on a client wiki connected to an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLink {
    /// Database name of the client wiki, e.g. `enwiki`.
    pub site: CompactString,
    pub title: String,
    pub badges: Vec<EntityId>,
    /// Badges that are not item ids, kept as they were read.
    pub invalid_badges: Vec<Value>,
}

impl SiteLink {
    pub fn new(site: &str, title: &str) -> Self {
        Self {
            site: site.into(),
            title: title.to_string(),
            badges: Vec::new(),
            invalid_badges: Vec::new(),
        }
    }

    pub fn for_site(site: &Site, title: &str) -> Self {
        Self::new(site.dbname(), title)
    }

    pub fn from_json(json: &Value) -> Result<Self, DataError> {
        let site = string_field(json, "site", "sitelink")?;
        let title = string_field(json, "title", site)?;
        let mut badges = Vec::new();
        let mut invalid_badges = Vec::new();
        if let Some(Value::Array(values)) = json.get("badges") {
            for badge in values {
                match badge.as_str().map(|b| EntityId::parse_as(b, EntityKind::Item)) {
                    Some(Ok(id)) => badges.push(id),
                    _ => {
                        tracing::warn!(message = "Badge is not an item id", site, badge = %badge);
                        invalid_badges.push(badge.clone());
                    }
                }
            }
        }
        Ok(Self {
            site: site.into(),
            title: title.to_string(),
            badges,
            invalid_badges,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({ "site": self.site.as_str(), "title": self.title, "badges": self.badge_values() })
    }

    fn badge_values(&self) -> Vec<Value> {
        self.badges
            .iter()
            .map(|badge| json!(badge.as_str()))
            .chain(self.invalid_badges.iter().cloned())
            .collect()
    }

    /// The linked page. `repo` is any site known to the same site oracle.
    pub fn to_link(&self, repo: &Site) -> Result<Link, WikibaseError> {
        let (family, code) = family_and_code_from_dbname(&self.site).ok_or_else(|| DataError::InvalidValue {
            field: "site".into(),
            message: format!("unknown database name {:?}", self.site),
        })?;
        let client = repo
            .sibling(&family, &code)
            .map_err(|source| LinkError::UnknownSite {
                text: self.title.clone(),
                source,
            })?;
        Ok(Link::new(&self.title, &client))
    }
}

/// Sitelinks keyed by database name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteLinkCollection {
    links: Vec<SiteLink>,
}

impl SiteLinkCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &Value) -> Result<Self, DataError> {
        let mut collection = Self::new();
        for (dbname, entry) in object_or_empty(Some(json), "")?.into_iter().flatten() {
            let link = SiteLink::from_json(entry)?;
            if link.site != dbname.as_str() {
                return Err(DataError::SiteMismatch {
                    key: dbname.clone(),
                    site: link.site.to_string(),
                });
            }
            collection.insert(link);
        }
        Ok(collection)
    }

    pub fn get(&self, dbname: &str) -> Option<&SiteLink> {
        self.links.iter().find(|link| link.site == dbname)
    }

    pub fn get_mut(&mut self, dbname: &str) -> Option<&mut SiteLink> {
        self.links.iter_mut().find(|link| link.site == dbname)
    }

    pub fn get_for_site(&self, site: &Site) -> Option<&SiteLink> {
        self.get(site.dbname())
    }

    /// Add or replace the link to the sitelink's wiki.
    pub fn insert(&mut self, link: SiteLink) -> Option<SiteLink> {
        match self.get_mut(&link.site) {
            Some(old) => Some(std::mem::replace(old, link)),
            None => {
                self.links.push(link);
                None
            }
        }
    }

    pub fn insert_for_site(&mut self, site: &Site, title: &str) -> Option<SiteLink> {
        self.insert(SiteLink::for_site(site, title))
    }

    pub fn remove(&mut self, dbname: &str) -> Option<SiteLink> {
        let position = self.links.iter().position(|link| link.site == dbname)?;
        Some(self.links.remove(position))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteLink> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Expand `{"enwiki": "Title"}` into `{"enwiki": {"site": "enwiki", "title": "Title"}}`.
    pub fn normalize_data(data: &Value) -> Result<Value, DataError> {
        let mut normalized = Map::new();
        for (dbname, entry) in object_or_empty(Some(data), "")?.into_iter().flatten() {
            let entry = match entry {
                Value::String(title) => json!({ "site": dbname, "title": title }),
                Value::Object(object) => {
                    match object.get("site").and_then(Value::as_str) {
                        Some(site) if site != dbname => {
                            return Err(DataError::SiteMismatch {
                                key: dbname.clone(),
                                site: site.to_string(),
                            })
                        }
                        _ => {}
                    }
                    let mut object = object.clone();
                    object.insert("site".into(), json!(dbname));
                    Value::Object(object)
                }
                other => return Err(type_mismatch(dbname, "a string or an object", other)),
            };
            normalized.insert(dbname.clone(), entry);
        }
        Ok(Value::Object(normalized))
    }

    /// With a baseline: a changed title sends the whole sitelink. A change of badges only
    /// sends the badge delta, `""` per removed and the id per added badge. A removed
    /// sitelink sends an empty title and an empty badge per baseline badge.
    pub fn to_json(&self, diffto: Option<&Value>) -> Result<Value, DataError> {
        let mut data = Map::new();

        let Some(diffto) = diffto else {
            for link in &self.links {
                data.insert(link.site.to_string(), link.to_json());
            }
            return Ok(Value::Object(data));
        };

        let baseline = Self::from_json(diffto)?;
        for link in &self.links {
            let Some(before) = baseline.get(&link.site) else {
                data.insert(link.site.to_string(), link.to_json());
                continue;
            };
            if before.title != link.title {
                data.insert(link.site.to_string(), link.to_json());
                continue;
            }

            let current = link.badge_values();
            let previous = before.badge_values();
            let mut badges: Vec<Value> = previous
                .iter()
                .filter(|badge| !current.contains(badge))
                .map(|_| json!(""))
                .collect();
            badges.extend(current.iter().filter(|badge| !previous.contains(badge)).cloned());
            if !badges.is_empty() {
                data.insert(
                    link.site.to_string(),
                    json!({ "site": link.site.as_str(), "title": link.title, "badges": badges }),
                );
            }
        }

        for before in baseline.iter() {
            if self.get(&before.site).is_some() {
                continue;
            }
            let mut removed = json!({ "site": before.site.as_str(), "title": "" });
            let badges = before.badge_values();
            if !badges.is_empty() {
                removed["badges"] = Value::Array(badges.iter().map(|_| json!("")).collect());
            }
            data.insert(before.site.to_string(), removed);
        }

        Ok(Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::prelude::*;

    fn q(id: &str) -> EntityId {
        EntityId::parse(id).unwrap()
    }

    #[test]
    fn test_labels_diff() {
        let baseline = json!({"labels": {"en": {"language": "en", "value": "Foo"}}});
        let mut labels = LanguageDict::from_json(&baseline["labels"]).unwrap();
        labels.insert("en", "Bar");
        labels.insert("de", "Baz");

        assert_eq!(
            labels.to_json(Some(&baseline["labels"])).unwrap(),
            json!({
                "en": {"language": "en", "value": "Bar"},
                "de": {"language": "de", "value": "Baz"}
            })
        );
    }

    #[test]
    fn test_labels_removal() {
        let baseline = json!({
            "en": {"language": "en", "value": "Foo"},
            "fr": {"language": "fr", "value": "Le Foo"}
        });
        let mut labels = LanguageDict::from_json(&baseline).unwrap();
        assert_eq!(labels.to_json(Some(&baseline)).unwrap(), json!({}));

        let old = labels.remove("fr").unwrap();
        assert_eq!(
            labels.to_json(Some(&baseline)).unwrap(),
            json!({"fr": {"language": "fr", "value": ""}})
        );

        labels.insert("fr", &old);
        assert_eq!(labels.to_json(Some(&baseline)).unwrap(), json!({}));
    }

    #[test]
    fn test_labels_normalize() {
        assert_eq!(
            LanguageDict::normalize_data(&json!({"en": "Foo", "de": {"language": "de", "value": "X"}}))
                .unwrap(),
            json!({
                "en": {"language": "en", "value": "Foo"},
                "de": {"language": "de", "value": "X"}
            })
        );
        assert!(matches!(
            LanguageDict::normalize_data(&json!({"en": 5})),
            Err(DataError::TypeMismatch { .. })
        ));
        // PHP serialises an empty map as []
        assert_eq!(LanguageDict::from_json(&json!([])).unwrap(), LanguageDict::new());
    }

    #[test]
    fn test_aliases_diff() {
        let baseline = json!({
            "en": [{"language": "en", "value": "A"}, {"language": "en", "value": "B"}],
            "de": [{"language": "de", "value": "C"}]
        });
        let mut aliases = AliasesDict::from_json(&baseline).unwrap();
        assert_eq!(aliases.to_json(Some(&baseline)).unwrap(), json!({}));

        aliases.push("en", "D");
        aliases.get_mut("de").clear();
        assert_eq!(
            aliases.to_json(Some(&baseline)).unwrap(),
            json!({
                "en": [
                    {"language": "en", "value": "A"},
                    {"language": "en", "value": "B"},
                    {"language": "en", "value": "D"}
                ],
                "de": [{"language": "de", "value": "C", "remove": ""}]
            })
        );

        aliases.remove("de");
        assert_eq!(
            aliases.to_json(Some(&baseline)).unwrap()["de"],
            json!([{"language": "de", "value": "C", "remove": ""}])
        );
    }

    #[test]
    fn test_aliases_normalize() {
        assert_eq!(
            AliasesDict::normalize_data(&json!({"en": ["A", {"language": "en", "value": "B"}]}))
                .unwrap(),
            json!({"en": [{"language": "en", "value": "A"}, {"language": "en", "value": "B"}]})
        );
        assert_eq!(
            AliasesDict::normalize_data(&json!({"en": "A"})),
            Err(DataError::TypeMismatch {
                field: "en".into(),
                expected: "an array",
                found: "a string"
            })
        );
    }

    #[test]
    fn test_claims_diff() {
        let baseline = item_fixture()["claims"].clone();
        let mut claims = ClaimCollection::from_json(q("Q42"), &baseline).unwrap();
        assert_eq!(claims.to_json(Some(&baseline)).unwrap(), json!({}));

        let p31 = claims.handles(&q("P31"))[0];
        claims[&p31].set_rank(Rank::Deprecated);

        let p21 = claims.handles(&q("P21"))[0];
        let removed = claims.remove(&p21).unwrap();
        let removed_id = removed.id().unwrap().to_string();

        let new = Claim::new(q("P1082"), "quantity")
            .with_target(Target::Quantity(WbQuantity::unitless("+5")))
            .unwrap();
        claims.insert(new.clone()).unwrap();

        let diff = claims.to_json(Some(&baseline)).unwrap();
        assert_eq!(diff["P31"][0]["rank"], "deprecated");
        assert_eq!(diff["P21"], json!([{"id": removed_id, "remove": ""}]));
        assert_eq!(diff["P1082"], json!([new.to_json()]));
        assert_eq!(diff.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_claims_qualifier_order_is_no_change() {
        let baseline = item_fixture()["claims"].clone();
        let mut claims = ClaimCollection::from_json(q("Q42"), &baseline).unwrap();
        let handle = claims.handles(&q("P31"))[0];
        let qualifiers = claims[&handle].qualifiers_mut();
        let first = qualifiers.remove(&q("P580")).unwrap();
        for qualifier in first {
            qualifiers.push(&q("P580"), qualifier);
        }
        assert_eq!(claims.to_json(Some(&baseline)).unwrap(), json!({}));
    }

    #[test]
    fn test_claim_handles() {
        let mut claims = ClaimCollection::new(q("Q1"));
        let handle = claims
            .insert(Claim::new(q("P31"), "wikibase-item").with_target(q("Q5")).unwrap())
            .unwrap();
        assert_eq!(claims[&handle].on_item(), Some(&q("Q1")));
        assert_eq!(claims[&handle].handle(), Ok(handle));

        let claim = claims.remove(&handle).unwrap();
        assert_eq!(claim.handle(), Err(ClaimStateError::Unattached));
        assert_eq!(claims.get(&handle), Err(ClaimStateError::Detached));
        assert_eq!(claims.remove(&handle), Err(ClaimStateError::Detached));
        assert!(claims.is_empty());
        assert_eq!(claims.properties().count(), 0);

        // a handle of another collection
        let other = ClaimCollection::new(q("Q1"));
        assert!(!other.contains(&handle));

        let qualifier = Claim::new(q("P642"), "wikibase-item").into_qualifier().unwrap();
        assert_eq!(
            claims.insert(qualifier),
            Err(ClaimStateError::NotAStatement(ClaimRole::Qualifier))
        );

        let handle = claims.insert(claim).unwrap();
        let attached = claims[&handle].clone();
        assert_eq!(
            claims.insert(attached),
            Err(ClaimStateError::AlreadyAttached(q("Q1")))
        );
    }

    #[test]
    fn test_sitelinks_diff() {
        let baseline = json!({
            "enwiki": {"site": "enwiki", "title": "Foo", "badges": ["Q17437796"]},
            "dewiki": {"site": "dewiki", "title": "Foo", "badges": []},
            "frwiki": {"site": "frwiki", "title": "Foo", "badges": ["Q17437798"]}
        });
        let mut sitelinks = SiteLinkCollection::from_json(&baseline).unwrap();
        assert_eq!(sitelinks.to_json(Some(&baseline)).unwrap(), json!({}));

        let enwiki = sitelinks.get_mut("enwiki").unwrap();
        enwiki.badges = vec![q("Q17437798")];
        sitelinks.get_mut("dewiki").unwrap().title = "Bar".into();
        sitelinks.remove("frwiki");
        sitelinks.insert(SiteLink::new("nlwiki", "Foo"));

        assert_eq!(
            sitelinks.to_json(Some(&baseline)).unwrap(),
            json!({
                "enwiki": {"site": "enwiki", "title": "Foo", "badges": ["", "Q17437798"]},
                "dewiki": {"site": "dewiki", "title": "Bar", "badges": []},
                "nlwiki": {"site": "nlwiki", "title": "Foo", "badges": []},
                "frwiki": {"site": "frwiki", "title": "", "badges": [""]}
            })
        );
    }

    #[test]
    fn test_sitelinks_invalid_badges() {
        let baseline = json!({
            "enwiki": {"site": "enwiki", "title": "Foo", "badges": ["Q17437796", "bogus"]},
            "dewiki": {"site": "dewiki", "title": "Foo", "badges": ["bogus"]}
        });
        let mut sitelinks = SiteLinkCollection::from_json(&baseline).unwrap();
        assert_eq!(sitelinks.get("enwiki").unwrap().invalid_badges, vec![json!("bogus")]);
        assert_eq!(sitelinks.to_json(None).unwrap(), baseline);
        assert_eq!(sitelinks.to_json(Some(&baseline)).unwrap(), json!({}));

        sitelinks.get_mut("enwiki").unwrap().invalid_badges.clear();
        sitelinks.remove("dewiki");
        assert_eq!(
            sitelinks.to_json(Some(&baseline)).unwrap(),
            json!({
                "enwiki": {"site": "enwiki", "title": "Foo", "badges": [""]},
                "dewiki": {"site": "dewiki", "title": "", "badges": [""]}
            })
        );
    }

    #[test]
    fn test_sitelinks_normalize() {
        assert_eq!(
            SiteLinkCollection::normalize_data(&json!({"enwiki": "Foo"})).unwrap(),
            json!({"enwiki": {"site": "enwiki", "title": "Foo"}})
        );
        assert_eq!(
            SiteLinkCollection::normalize_data(&json!({"enwiki": {"site": "dewiki", "title": "Foo"}})),
            Err(DataError::SiteMismatch {
                key: "enwiki".into(),
                site: "dewiki".into()
            })
        );
        assert!(matches!(
            SiteLinkCollection::from_json(&json!({"enwiki": {"site": "dewiki", "title": "X"}})),
            Err(DataError::SiteMismatch { .. })
        ));
    }

    #[test]
    fn test_site_keys() {
        let sites = fixture_sites();
        let de = site(&sites, "wikipedia", "de");
        let wikt = site(&sites, "wiktionary", "en");

        let mut labels = LanguageDict::new();
        labels.insert_for_site(&de, "Haus");
        assert_eq!(labels.get("de"), Some("Haus"));
        assert_eq!(labels.get_for_site(&de), Some("Haus"));

        let mut sitelinks = SiteLinkCollection::new();
        sitelinks.insert_for_site(&wikt, "house");
        assert_eq!(sitelinks.get("enwiktionary").unwrap().title, "house");

        let link = sitelinks.get_for_site(&wikt).unwrap().to_link(&de).unwrap();
        assert_eq!(link.site().unwrap(), &wikt);
        assert_eq!(link.title().unwrap(), "house");

        assert!(SiteLink::new("xxwiki", "Foo").to_link(&de).is_err());
    }
}

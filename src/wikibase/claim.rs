use std::fmt::{self, Display};

use compact_str::CompactString;
use serde_json::{json, Map, Value};

use super::{
    error::{ClaimStateError, DataError},
    id::{EntityId, EntityKind},
    value::{infer_datatype, Target},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rank {
    Preferred,
    #[default]
    Normal,
    Deprecated,
}

impl Rank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Preferred => "preferred",
            Rank::Normal => "normal",
            Rank::Deprecated => "deprecated",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "preferred" => Some(Rank::Preferred),
            "normal" => Some(Rank::Normal),
            "deprecated" => Some(Rank::Deprecated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SnakType {
    #[default]
    Value,
    SomeValue,
    NoValue,
}

impl SnakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnakType::Value => "value",
            SnakType::SomeValue => "somevalue",
            SnakType::NoValue => "novalue",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "value" => Some(SnakType::Value),
            "somevalue" => Some(SnakType::SomeValue),
            "novalue" => Some(SnakType::NoValue),
            _ => None,
        }
    }
}

/// What a claim is used as. A claim is exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ClaimRole {
    #[default]
    Statement,
    Qualifier,
    Reference,
}

impl Display for ClaimRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClaimRole::Statement => "statement",
            ClaimRole::Qualifier => "qualifier",
            ClaimRole::Reference => "reference",
        })
    }
}

/// Index of a statement inside the claim table of its entity.
///
/// Handles are invalidated when the claim is removed and when the entity is reloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimHandle {
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

/// Property id -> values, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap<T>(Vec<(EntityId, Vec<T>)>);

impl<T> Default for PropertyMap<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> PropertyMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: &EntityId) -> Option<&[T]> {
        self.0
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, values)| values.as_slice())
    }

    pub fn get_mut(&mut self, property: &EntityId) -> Option<&mut Vec<T>> {
        self.0
            .iter_mut()
            .find(|(key, _)| key == property)
            .map(|(_, values)| values)
    }

    /// The values of `property`, created empty at the end if missing.
    pub fn entry(&mut self, property: &EntityId) -> &mut Vec<T> {
        let position = match self.0.iter().position(|(key, _)| key == property) {
            Some(position) => position,
            None => {
                self.0.push((property.clone(), Vec::new()));
                self.0.len() - 1
            }
        };
        &mut self.0[position].1
    }

    pub fn push(&mut self, property: &EntityId, value: T) {
        self.entry(property).push(value);
    }

    pub fn remove(&mut self, property: &EntityId) -> Option<Vec<T>> {
        let position = self.0.iter().position(|(key, _)| key == property)?;
        Some(self.0.remove(position).1)
    }

    /// Drop properties without values.
    pub fn prune(&mut self) {
        self.0.retain(|(_, values)| !values.is_empty());
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntityId> {
        self.0.iter().map(|(key, _)| key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &[T])> {
        self.0.iter().map(|(key, values)| (key, values.as_slice()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Vec<T>)> {
        self.0.iter_mut().map(|(key, values)| (&*key, values))
    }

    /// All values, property by property.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter().flat_map(|(_, values)| values.iter())
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One reference group of a statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    pub hash: Option<String>,
    pub snaks: PropertyMap<Claim>,
}

impl Reference {
    pub fn new(snaks: impl IntoIterator<Item = Claim>) -> Result<Self, ClaimStateError> {
        let mut reference = Self::default();
        for snak in snaks {
            let snak = snak.into_reference()?;
            let property = snak.property.clone();
            reference.snaks.push(&property, snak);
        }
        Ok(reference)
    }

    pub fn from_json(json: &Value) -> Result<Self, DataError> {
        let hash = optional_str(json, "hash", "reference.hash")?.map(str::to_string);
        let snaks = snak_map_from_json(
            json.get("snaks"),
            json.get("snaks-order"),
            "reference.snaks",
            ClaimRole::Reference,
        )?;
        Ok(Self { hash, snaks })
    }

    pub fn to_json(&self) -> Value {
        let mut json = Map::new();
        if let Some(hash) = &self.hash {
            json.insert("hash".into(), json!(hash));
        }
        let (snaks, order) = snak_map_to_json(&self.snaks);
        json.insert("snaks".into(), snaks);
        json.insert("snaks-order".into(), order);
        Value::Object(json)
    }
}

/// Which parts of two claims [`Claim::same_as_with`] compares. Property, snak type and
/// value are always compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SameAs {
    pub ignore_rank: bool,
    pub ignore_qualifiers: bool,
    pub ignore_references: bool,
}

impl Default for SameAs {
    fn default() -> Self {
        Self {
            ignore_rank: true,
            ignore_qualifiers: false,
            ignore_references: true,
        }
    }
}

impl SameAs {
    /// Compare everything, used when diffing against the baseline.
    pub const ALL: SameAs = SameAs {
        ignore_rank: false,
        ignore_qualifiers: false,
        ignore_references: false,
    };
}

/// A statement, or a snak used as qualifier or inside a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    property: EntityId,
    snak_type: SnakType,
    datatype: Option<CompactString>,
    target: Option<Target>,
    hash: Option<String>,
    role: ClaimRole,
    id: Option<String>,
    rank: Rank,
    qualifiers: PropertyMap<Claim>,
    sources: Vec<Reference>,
    pub(crate) on_item: Option<EntityId>,
    pub(crate) handle: Option<ClaimHandle>,
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn optional_str<'a>(json: &'a Value, key: &str, field: &str) -> Result<Option<&'a str>, DataError> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(DataError::TypeMismatch {
            field: field.to_string(),
            expected: "a string",
            found: json_type_name(other),
        }),
    }
}

fn required_str<'a>(json: &'a Value, key: &str, field: &str) -> Result<&'a str, DataError> {
    optional_str(json, key, field)?.ok_or_else(|| DataError::MissingField(field.to_string()))
}

fn parse_property(id: &str, field: &str) -> Result<EntityId, DataError> {
    EntityId::parse_as(id, EntityKind::Property).map_err(|e| DataError::InvalidValue {
        field: field.to_string(),
        message: e.to_string(),
    })
}

/// Read a `{property: [snak, ...]}` map in the order given by `order`, or in document
/// order if there is none.
fn snak_map_from_json(
    snaks: Option<&Value>,
    order: Option<&Value>,
    field: &str,
    role: ClaimRole,
) -> Result<PropertyMap<Claim>, DataError> {
    let mut map = PropertyMap::new();
    let snaks = match snaks {
        None | Some(Value::Null) => return Ok(map),
        // PHP serialises empty maps as []
        Some(Value::Array(a)) if a.is_empty() => return Ok(map),
        Some(Value::Object(snaks)) => snaks,
        Some(other) => {
            return Err(DataError::TypeMismatch {
                field: field.to_string(),
                expected: "an object",
                found: json_type_name(other),
            })
        }
    };

    let keys: Vec<&str> = match order {
        None | Some(Value::Null) => snaks.keys().map(String::as_str).collect(),
        Some(Value::Array(order)) => order
            .iter()
            .map(|key| {
                key.as_str().ok_or_else(|| DataError::TypeMismatch {
                    field: format!("{field}-order"),
                    expected: "an array of strings",
                    found: json_type_name(key),
                })
            })
            .collect::<Result<_, _>>()?,
        Some(other) => {
            return Err(DataError::TypeMismatch {
                field: format!("{field}-order"),
                expected: "an array",
                found: json_type_name(other),
            })
        }
    };

    for key in keys {
        let property = parse_property(key, field)?;
        let Some(values) = snaks.get(key) else {
            return Err(DataError::MissingField(format!("{field}.{key}")));
        };
        let Value::Array(values) = values else {
            return Err(DataError::TypeMismatch {
                field: format!("{field}.{key}"),
                expected: "an array",
                found: json_type_name(values),
            });
        };
        let entry = map.entry(&property);
        for value in values {
            entry.push(Claim::snak_from_json(value, role)?);
        }
    }

    Ok(map)
}

fn snak_map_to_json(map: &PropertyMap<Claim>) -> (Value, Value) {
    let mut snaks = Map::new();
    let mut order = Vec::new();
    for (property, values) in map.iter() {
        if values.is_empty() {
            continue;
        }
        order.push(json!(property.as_str()));
        snaks.insert(
            property.to_string(),
            Value::Array(values.iter().map(Claim::snak_to_json).collect()),
        );
    }
    (Value::Object(snaks), Value::Array(order))
}

impl Claim {
    /// A new, unattached statement with an unset value.
    pub fn new(property: EntityId, datatype: &str) -> Self {
        Self {
            property,
            snak_type: SnakType::Value,
            datatype: Some(datatype.into()),
            target: None,
            hash: None,
            role: ClaimRole::Statement,
            id: None,
            rank: Rank::Normal,
            qualifiers: PropertyMap::new(),
            sources: Vec::new(),
            on_item: None,
            handle: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<Target>) -> Result<Self, DataError> {
        self.set_target(target.into())?;
        Ok(self)
    }

    pub fn property(&self) -> &EntityId {
        &self.property
    }

    pub fn snak_type(&self) -> SnakType {
        self.snak_type
    }

    pub fn datatype(&self) -> Option<&str> {
        self.datatype.as_deref()
    }

    /// `None` unless the snak type is [`SnakType::Value`].
    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub fn role(&self) -> ClaimRole {
        self.role
    }

    pub fn is_qualifier(&self) -> bool {
        self.role == ClaimRole::Qualifier
    }

    pub fn is_reference(&self) -> bool {
        self.role == ClaimRole::Reference
    }

    /// The statement GUID, `None` until the statement has been saved.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn qualifiers(&self) -> &PropertyMap<Claim> {
        &self.qualifiers
    }

    pub fn sources(&self) -> &[Reference] {
        &self.sources
    }

    pub fn on_item(&self) -> Option<&EntityId> {
        self.on_item.as_ref()
    }

    /// The handle to route server writes for this statement through its entity.
    pub fn handle(&self) -> Result<ClaimHandle, ClaimStateError> {
        if self.role != ClaimRole::Statement {
            return Err(ClaimStateError::NotAStatement(self.role));
        }
        match (&self.on_item, self.handle) {
            (Some(_), Some(handle)) => Ok(handle),
            _ => Err(ClaimStateError::Unattached),
        }
    }

    /// Set the value; the snak type becomes `value`.
    pub fn set_target(&mut self, target: Target) -> Result<(), DataError> {
        if let Some(datatype) = &self.datatype {
            if !target.matches_datatype(datatype) {
                return Err(DataError::InvalidValue {
                    field: self.property.to_string(),
                    message: format!("{target:?} is not a valid {datatype} value"),
                });
            }
        }
        self.target = Some(target);
        self.snak_type = SnakType::Value;
        Ok(())
    }

    pub fn set_snak_type(&mut self, snak_type: SnakType) {
        self.snak_type = snak_type;
        if snak_type != SnakType::Value {
            self.target = None;
        }
    }

    /// Local change only, see `WikibaseEntity::change_rank` for attached statements.
    pub fn set_rank(&mut self, rank: Rank) {
        self.rank = rank;
    }

    pub(crate) fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub(crate) fn set_hash(&mut self, hash: Option<String>) {
        self.hash = hash;
    }

    pub fn target_equals(&self, value: &Target) -> bool {
        self.target.as_ref() == Some(value)
    }

    pub fn has_qualifier(&self, property: &EntityId, value: &Target) -> bool {
        self.qualifiers
            .get(property)
            .is_some_and(|qualifiers| qualifiers.iter().any(|q| q.target_equals(value)))
    }

    /// Add a qualifier locally. Saved with the next entity edit.
    pub fn push_qualifier(&mut self, qualifier: Claim) -> Result<(), ClaimStateError> {
        if self.role != ClaimRole::Statement {
            return Err(ClaimStateError::NotAStatement(self.role));
        }
        let qualifier = qualifier.into_qualifier()?;
        let property = qualifier.property.clone();
        self.qualifiers.push(&property, qualifier);
        Ok(())
    }

    /// Add a reference group locally. Saved with the next entity edit.
    pub fn push_source(&mut self, source: Reference) -> Result<(), ClaimStateError> {
        if self.role != ClaimRole::Statement {
            return Err(ClaimStateError::NotAStatement(self.role));
        }
        self.sources.push(source);
        Ok(())
    }

    pub fn qualifiers_mut(&mut self) -> &mut PropertyMap<Claim> {
        &mut self.qualifiers
    }

    pub fn sources_mut(&mut self) -> &mut Vec<Reference> {
        &mut self.sources
    }

    /// Turn an unattached statement into a qualifier.
    pub fn into_qualifier(self) -> Result<Claim, ClaimStateError> {
        self.into_role(ClaimRole::Qualifier)
    }

    /// Turn an unattached statement into a reference snak.
    pub fn into_reference(self) -> Result<Claim, ClaimStateError> {
        self.into_role(ClaimRole::Reference)
    }

    fn into_role(mut self, role: ClaimRole) -> Result<Claim, ClaimStateError> {
        if self.role == role {
            return Ok(self);
        }
        if self.role != ClaimRole::Statement {
            return Err(ClaimStateError::RoleConflict(self.role));
        }
        if let Some(on_item) = &self.on_item {
            return Err(ClaimStateError::AlreadyAttached(on_item.clone()));
        }
        self.role = role;
        self.id = None;
        self.rank = Rank::Normal;
        self.qualifiers = PropertyMap::new();
        self.sources = Vec::new();
        Ok(self)
    }

    /// An unattached copy without id and hashes, for adding the same statement elsewhere.
    pub fn copy(&self) -> Claim {
        let mut copy = self.clone();
        copy.id = None;
        copy.hash = None;
        copy.on_item = None;
        copy.handle = None;
        for (_, qualifiers) in copy.qualifiers.iter_mut() {
            for qualifier in qualifiers {
                qualifier.hash = None;
            }
        }
        for source in &mut copy.sources {
            source.hash = None;
            for (_, snaks) in source.snaks.iter_mut() {
                for snak in snaks {
                    snak.hash = None;
                }
            }
        }
        copy
    }

    // property, snak type and value
    fn snak_equals(&self, other: &Claim) -> bool {
        self.property == other.property
            && self.snak_type == other.snak_type
            && self.target == other.target
    }

    // unordered comparison of the flattened values
    fn snak_maps_equal(this: &PropertyMap<Claim>, other: &PropertyMap<Claim>) -> bool {
        let non_empty = |map: &PropertyMap<Claim>| map.iter().filter(|(_, v)| !v.is_empty()).count();
        if non_empty(this) != non_empty(other) {
            return false;
        }
        let mine: Vec<&Claim> = this.values().collect();
        let theirs: Vec<&Claim> = other.values().collect();
        mine.len() == theirs.len()
            && mine.iter().all(|a| theirs.iter().any(|b| a.snak_equals(b)))
            && theirs.iter().all(|b| mine.iter().any(|a| a.snak_equals(b)))
    }

    fn sources_equal(this: &[Reference], other: &[Reference]) -> bool {
        this.len() == other.len()
            && this.iter().all(|source| {
                other
                    .iter()
                    .any(|other_source| Self::snak_maps_equal(&source.snaks, &other_source.snaks))
            })
    }

    /// Compare property, snak type, value and qualifiers. Rank and references are ignored.
    pub fn same_as(&self, other: &Claim) -> bool {
        self.same_as_with(other, SameAs::default())
    }

    /// Qualifiers and references are compared regardless of their order.
    pub fn same_as_with(&self, other: &Claim, options: SameAs) -> bool {
        self.snak_equals(other)
            && (options.ignore_rank || self.rank == other.rank)
            && (options.ignore_qualifiers
                || Self::snak_maps_equal(&self.qualifiers, &other.qualifiers))
            && (options.ignore_references || Self::sources_equal(&self.sources, &other.sources))
    }

    fn snak_from_json(json: &Value, role: ClaimRole) -> Result<Claim, DataError> {
        if !json.is_object() {
            return Err(DataError::TypeMismatch {
                field: "snak".into(),
                expected: "an object",
                found: json_type_name(json),
            });
        }

        let property = parse_property(required_str(json, "property", "snak.property")?, "snak.property")?;
        let snak_type_name = required_str(json, "snaktype", "snak.snaktype")?;
        let snak_type = SnakType::from_name(snak_type_name).ok_or_else(|| DataError::InvalidValue {
            field: "snak.snaktype".into(),
            message: format!("unknown snak type {snak_type_name:?}"),
        })?;
        let datatype = optional_str(json, "datatype", "snak.datatype")?;

        let target = match (snak_type, json.get("datavalue")) {
            (SnakType::Value, Some(datavalue)) => Some(Target::from_datavalue(datatype, datavalue)),
            (SnakType::Value, None) => {
                return Err(DataError::MissingField("snak.datavalue".into()));
            }
            _ => None,
        };
        // keep what we could infer so the value survives a change of target
        let datatype = datatype
            .or_else(|| json.get("datavalue").and_then(infer_datatype))
            .map(CompactString::from);

        Ok(Claim {
            property,
            snak_type,
            datatype,
            target,
            hash: optional_str(json, "hash", "snak.hash")?.map(str::to_string),
            role,
            id: None,
            rank: Rank::Normal,
            qualifiers: PropertyMap::new(),
            sources: Vec::new(),
            on_item: None,
            handle: None,
        })
    }

    fn snak_to_json(&self) -> Value {
        let mut json = Map::new();
        json.insert("snaktype".into(), json!(self.snak_type.as_str()));
        json.insert("property".into(), json!(self.property.as_str()));
        if let Some(hash) = &self.hash {
            json.insert("hash".into(), json!(hash));
        }
        if let (SnakType::Value, Some(target)) = (self.snak_type, &self.target) {
            json.insert("datavalue".into(), target.to_datavalue());
        }
        if let Some(datatype) = &self.datatype {
            json.insert("datatype".into(), json!(datatype.as_str()));
        }
        Value::Object(json)
    }

    /// Read a statement as returned by `wbgetentities`.
    pub fn from_json(json: &Value) -> Result<Claim, DataError> {
        let mainsnak = json
            .get("mainsnak")
            .ok_or_else(|| DataError::MissingField("mainsnak".into()))?;
        let mut claim = Self::snak_from_json(mainsnak, ClaimRole::Statement)?;

        claim.id = optional_str(json, "id", "id")?.map(str::to_string);
        if let Some(rank) = optional_str(json, "rank", "rank")? {
            claim.rank = Rank::from_name(rank).ok_or_else(|| DataError::InvalidValue {
                field: "rank".into(),
                message: format!("unknown rank {rank:?}"),
            })?;
        }

        claim.qualifiers = snak_map_from_json(
            json.get("qualifiers"),
            json.get("qualifiers-order"),
            "qualifiers",
            ClaimRole::Qualifier,
        )?;

        match json.get("references") {
            None | Some(Value::Null) => {}
            Some(Value::Array(references)) => {
                for reference in references {
                    claim.sources.push(Reference::from_json(reference)?);
                }
            }
            Some(other) => {
                return Err(DataError::TypeMismatch {
                    field: "references".into(),
                    expected: "an array",
                    found: json_type_name(other),
                })
            }
        }

        Ok(claim)
    }

    /// Read a bare snak used as qualifier or reference.
    pub fn from_snak_json(json: &Value, role: ClaimRole) -> Result<Claim, DataError> {
        Self::snak_from_json(json, role)
    }

    /// Statements serialise with `mainsnak`, qualifiers and references; qualifiers and
    /// reference snaks serialise as bare snaks.
    pub fn to_json(&self) -> Value {
        if self.role != ClaimRole::Statement {
            return self.snak_to_json();
        }

        let mut json = Map::new();
        json.insert("mainsnak".into(), self.snak_to_json());
        json.insert("type".into(), json!("statement"));
        if let Some(id) = &self.id {
            json.insert("id".into(), json!(id));
        }
        json.insert("rank".into(), json!(self.rank.as_str()));

        if self.qualifiers.values().next().is_some() {
            let (qualifiers, order) = snak_map_to_json(&self.qualifiers);
            json.insert("qualifiers".into(), qualifiers);
            json.insert("qualifiers-order".into(), order);
        }
        if !self.sources.is_empty() {
            json.insert(
                "references".into(),
                Value::Array(self.sources.iter().map(Reference::to_json).collect()),
            );
        }
        Value::Object(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::prelude::*;

    fn p(id: &str) -> EntityId {
        EntityId::parse(id).unwrap()
    }

    fn item_claim(property: &str, value: &str) -> Claim {
        Claim::new(p(property), "wikibase-item")
            .with_target(p(value))
            .unwrap()
    }

    #[test]
    fn test_round_trip() {
        for fixture in [statement_fixture(), statement_without_extras_fixture()] {
            let claim = Claim::from_json(&fixture).unwrap();
            assert_eq!(claim.to_json(), fixture);
        }
    }

    #[test]
    fn test_from_json_fields() {
        let claim = Claim::from_json(&statement_fixture()).unwrap();
        assert_eq!(claim.property().as_str(), "P31");
        assert_eq!(claim.rank(), Rank::Preferred);
        assert_eq!(claim.id(), Some("Q42$F078E5B3-F9A8-480E-B7AC-D97778CBBEF9"));
        assert!(claim.target_equals(&Target::Entity(p("Q5"))));
        assert!(claim.has_qualifier(&p("P580"), &Target::Time(crate::wikibase::WbTime::from_date(2001, 1, 1, 11))));

        let keys: Vec<&str> = claim.qualifiers().keys().map(EntityId::as_str).collect();
        assert_eq!(keys, ["P580", "P582"]);
        assert!(claim.qualifiers().values().all(Claim::is_qualifier));
        assert_eq!(claim.sources().len(), 1);
        assert!(claim.sources()[0].snaks.values().all(Claim::is_reference));
    }

    #[test]
    fn test_references_without_order() {
        let mut fixture = statement_fixture();
        let reference = &mut fixture["references"][0];
        reference.as_object_mut().unwrap().remove("snaks-order");

        let claim = Claim::from_json(&fixture).unwrap();
        let keys: Vec<&str> = claim.sources()[0].snaks.keys().map(EntityId::as_str).collect();
        // document order
        assert_eq!(keys, ["P248", "P813"]);
    }

    #[test]
    fn test_special_snaks() {
        let json = json!({
            "mainsnak": {"snaktype": "somevalue", "property": "P1", "datatype": "string"},
            "type": "statement",
            "rank": "normal"
        });
        let claim = Claim::from_json(&json).unwrap();
        assert_eq!(claim.snak_type(), SnakType::SomeValue);
        assert_eq!(claim.target(), None);
        assert_eq!(claim.to_json(), json);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            Claim::from_json(&json!({"type": "statement"})),
            Err(DataError::MissingField("mainsnak".into()))
        );
        assert!(matches!(
            Claim::from_json(&json!({"mainsnak": {"snaktype": "value", "property": 31}})),
            Err(DataError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Claim::from_json(&json!({
                "mainsnak": {"snaktype": "novalue", "property": "P31"},
                "references": {"snaks": {}}
            })),
            Err(DataError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_qualifier_serialises_as_snak() {
        let qualifier = item_claim("P642", "Q1").into_qualifier().unwrap();
        let json = qualifier.to_json();
        assert!(json.get("mainsnak").is_none());
        assert!(json.get("type").is_none());
        assert_eq!(json["property"], "P642");
    }

    #[test]
    fn test_roles_are_exclusive() {
        let qualifier = item_claim("P642", "Q1").into_qualifier().unwrap();
        assert_eq!(
            qualifier.clone().into_reference(),
            Err(ClaimStateError::RoleConflict(ClaimRole::Qualifier))
        );
        assert_eq!(
            qualifier.handle(),
            Err(ClaimStateError::NotAStatement(ClaimRole::Qualifier))
        );

        let mut statement = item_claim("P31", "Q5");
        let reference = item_claim("P248", "Q36578").into_reference().unwrap();
        assert_eq!(
            statement.push_qualifier(reference),
            Err(ClaimStateError::RoleConflict(ClaimRole::Reference))
        );
    }

    #[test]
    fn test_set_target_checks_datatype() {
        let mut claim = Claim::new(p("P31"), "wikibase-item");
        assert!(claim.set_target(Target::from("text")).is_err());
        assert!(claim.set_target(Target::Entity(p("P1"))).is_err());
        claim.set_target(Target::Entity(p("Q1"))).unwrap();

        claim.set_snak_type(SnakType::NoValue);
        assert_eq!(claim.target(), None);
    }

    #[test]
    fn test_same_as() {
        let mut a = item_claim("P31", "Q5");
        a.push_qualifier(item_claim("P642", "Q1")).unwrap();
        a.push_qualifier(item_claim("P642", "Q2")).unwrap();

        let mut b = item_claim("P31", "Q5");
        b.push_qualifier(item_claim("P642", "Q2")).unwrap();
        b.push_qualifier(item_claim("P642", "Q1")).unwrap();
        b.set_rank(Rank::Deprecated);
        b.push_source(Reference::new([item_claim("P248", "Q36578")]).unwrap())
            .unwrap();

        // qualifier order, rank and references are ignored by default
        assert!(a.same_as(&b));
        assert!(!a.same_as_with(&b, SameAs { ignore_rank: false, ..SameAs::default() }));
        assert!(!a.same_as_with(&b, SameAs { ignore_references: false, ..SameAs::default() }));

        let mut c = item_claim("P31", "Q5");
        c.push_qualifier(item_claim("P642", "Q1")).unwrap();
        assert!(!a.same_as(&c));
        assert!(a.same_as_with(&c, SameAs { ignore_qualifiers: true, ..SameAs::default() }));

        assert!(!a.same_as(&item_claim("P31", "Q6")));
    }

    #[test]
    fn test_copy() {
        let claim = Claim::from_json(&statement_fixture()).unwrap();
        let copy = claim.copy();
        assert_eq!(copy.id(), None);
        assert_eq!(copy.hash(), None);
        assert!(copy.qualifiers().values().all(|q| q.hash().is_none()));
        assert!(copy.sources().iter().all(|s| s.hash.is_none()));
        assert!(copy.same_as_with(&claim, SameAs::ALL));
    }
}

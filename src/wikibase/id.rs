use std::{
    fmt::{self, Display},
    str::FromStr,
    sync::LazyLock,
};

use compact_str::{format_compact, CompactString, ToCompactString};
use regex::Regex;
use serde::{Serialize, Serializer};

use super::error::EntityIdError;
use crate::site::Namespace;

/// The kinds of Wikibase entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Item,
    Property,
    Lexeme,
    Form,
    Sense,
    MediaInfo,
}

/// The named data attributes of an entity, keyed like in the entity JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataAttribute {
    Labels,
    Descriptions,
    Aliases,
    Claims,
    Statements,
    SiteLinks,
    Lemmas,
    Representations,
    Glosses,
}

impl DataAttribute {
    pub fn key(&self) -> &'static str {
        match self {
            DataAttribute::Labels => "labels",
            DataAttribute::Descriptions => "descriptions",
            DataAttribute::Aliases => "aliases",
            DataAttribute::Claims => "claims",
            DataAttribute::Statements => "statements",
            DataAttribute::SiteLinks => "sitelinks",
            DataAttribute::Lemmas => "lemmas",
            DataAttribute::Representations => "representations",
            DataAttribute::Glosses => "glosses",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "labels" => DataAttribute::Labels,
            "descriptions" => DataAttribute::Descriptions,
            "aliases" => DataAttribute::Aliases,
            "claims" => DataAttribute::Claims,
            "statements" => DataAttribute::Statements,
            "sitelinks" => DataAttribute::SiteLinks,
            "lemmas" => DataAttribute::Lemmas,
            "representations" => DataAttribute::Representations,
            "glosses" => DataAttribute::Glosses,
            _ => return None,
        })
    }
}

impl Display for DataAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

static ID_PATTERNS: LazyLock<[(EntityKind, Regex); 6]> = LazyLock::new(|| {
    [
        (EntityKind::Form, Regex::new(r"^L[1-9][0-9]*-F[1-9][0-9]*$").unwrap()),
        (EntityKind::Sense, Regex::new(r"^L[1-9][0-9]*-S[1-9][0-9]*$").unwrap()),
        (EntityKind::Item, Regex::new(r"^Q[1-9][0-9]*$").unwrap()),
        (EntityKind::Property, Regex::new(r"^P[1-9][0-9]*$").unwrap()),
        (EntityKind::Lexeme, Regex::new(r"^L[1-9][0-9]*$").unwrap()),
        (EntityKind::MediaInfo, Regex::new(r"^M[1-9][0-9]*$").unwrap()),
    ]
});

impl EntityKind {
    /// The `type` / `entity-type` value used in JSON.
    pub fn entity_type(&self) -> &'static str {
        match self {
            EntityKind::Item => "item",
            EntityKind::Property => "property",
            EntityKind::Lexeme => "lexeme",
            EntityKind::Form => "form",
            EntityKind::Sense => "sense",
            EntityKind::MediaInfo => "mediainfo",
        }
    }

    pub fn from_entity_type(entity_type: &str) -> Option<Self> {
        Some(match entity_type {
            "item" => EntityKind::Item,
            "property" => EntityKind::Property,
            "lexeme" => EntityKind::Lexeme,
            "form" => EntityKind::Form,
            "sense" => EntityKind::Sense,
            "mediainfo" => EntityKind::MediaInfo,
            _ => return None,
        })
    }

    pub fn data_attributes(&self) -> &'static [DataAttribute] {
        use DataAttribute::*;

        match self {
            EntityKind::Item => &[Labels, Descriptions, Aliases, Claims, SiteLinks],
            EntityKind::Property => &[Labels, Descriptions, Aliases, Claims],
            EntityKind::Lexeme => &[Lemmas, Claims],
            EntityKind::Form => &[Representations, Claims],
            EntityKind::Sense => &[Glosses, Claims],
            EntityKind::MediaInfo => &[Labels, Statements],
        }
    }

    /// The attribute holding the statements, `claims` or (for media info) `statements`.
    pub fn claims_attribute(&self) -> DataAttribute {
        match self {
            EntityKind::MediaInfo => DataAttribute::Statements,
            _ => DataAttribute::Claims,
        }
    }

    /// Namespace of the pages storing entities of this kind. Forms and senses live on their
    /// lexeme's page.
    pub fn namespace(&self) -> Option<i32> {
        match self {
            EntityKind::Item => Some(Namespace::MAIN),
            EntityKind::Property => Some(120),
            EntityKind::Lexeme => Some(146),
            EntityKind::MediaInfo => Some(Namespace::FILE),
            EntityKind::Form | EntityKind::Sense => None,
        }
    }

    /// The kind whose entity ids are page titles in `namespace`. Media info pages are
    /// titled after their file, so they are not listed.
    pub fn for_namespace(namespace: i32) -> Option<Self> {
        match namespace {
            Namespace::MAIN => Some(EntityKind::Item),
            120 => Some(EntityKind::Property),
            146 => Some(EntityKind::Lexeme),
            _ => None,
        }
    }

    fn pattern(&self) -> &'static Regex {
        let index = match self {
            EntityKind::Form => 0,
            EntityKind::Sense => 1,
            EntityKind::Item => 2,
            EntityKind::Property => 3,
            EntityKind::Lexeme => 4,
            EntityKind::MediaInfo => 5,
        };
        &ID_PATTERNS[index].1
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_type())
    }
}

/// A validated entity id such as `Q60`, `P21` or `L2-F1`.
///
/// Entities that have not been created yet carry the id `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    kind: EntityKind,
    id: CompactString,
}

impl EntityId {
    pub const NEW: &'static str = "-1";

    /// The placeholder id of an entity that does not exist yet.
    pub fn new_entity(kind: EntityKind) -> Self {
        Self {
            kind,
            id: Self::NEW.into(),
        }
    }

    /// Parse an id of any kind. Lowercase input is accepted.
    pub fn parse(id: &str) -> Result<Self, EntityIdError> {
        let normalized = id.trim().to_uppercase();
        ID_PATTERNS
            .iter()
            .find(|(_, pattern)| pattern.is_match(&normalized))
            .map(|(kind, _)| Self {
                kind: *kind,
                id: normalized.to_compact_string(),
            })
            .ok_or_else(|| EntityIdError::Invalid {
                id: id.to_string(),
                kind: None,
            })
    }

    /// Parse an id that must be of the given kind. `-1` is accepted as a new entity.
    pub fn parse_as(id: &str, kind: EntityKind) -> Result<Self, EntityIdError> {
        let normalized = id.trim().to_uppercase();
        if normalized == Self::NEW {
            return Ok(Self::new_entity(kind));
        }
        if kind.pattern().is_match(&normalized) {
            return Ok(Self {
                kind,
                id: normalized.to_compact_string(),
            });
        }
        match Self::parse(&normalized) {
            Ok(found) => Err(EntityIdError::KindMismatch {
                expected: kind,
                found,
            }),
            Err(_) => Err(EntityIdError::Invalid {
                id: id.to_string(),
                kind: Some(kind),
            }),
        }
    }

    /// Build an id from the `numeric-id` of an entity value.
    pub fn from_numeric(kind: EntityKind, numeric_id: u64) -> Result<Self, EntityIdError> {
        let prefix = match kind {
            EntityKind::Item => 'Q',
            EntityKind::Property => 'P',
            EntityKind::Lexeme => 'L',
            EntityKind::MediaInfo => 'M',
            EntityKind::Form | EntityKind::Sense => {
                return Err(EntityIdError::Invalid {
                    id: numeric_id.to_string(),
                    kind: Some(kind),
                })
            }
        };
        Self::parse_as(&format_compact!("{prefix}{numeric_id}"), kind)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_new(&self) -> bool {
        self.id == Self::NEW
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// The number of a `Q`/`P`/`L`/`M` id. `None` for new entities, forms and senses.
    pub fn numeric_id(&self) -> Option<u64> {
        match self.kind {
            EntityKind::Form | EntityKind::Sense => None,
            _ => self.id.get(1..).and_then(|n| n.parse().ok()),
        }
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

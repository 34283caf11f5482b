use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use serde_json::{json, Value};

use crate::{
    site::{InterwikiEntry, Namespace, NamespaceCase, Site, SiteInfo, SiteRegistry, Sites},
    wikibase::{EditOptions, EntityEdit, EntityId, Repository, RepositoryError},
};

pub mod prelude {
    pub(crate) use super::proptest as proptest_support;
    pub(crate) use super::{
        fixture_sites, item_fixture, site, statement_fixture, statement_without_extras_fixture,
        MockCall, MockRepository,
    };
    pub(crate) use crate::wikibase::*;
    pub(crate) use proptest::prelude::*;
    pub(crate) use serde_json::json;
}

const WIKIDATA_URL: &str = "https://www.wikidata.org/wiki/$1";
const MEMORY_ALPHA_URL: &str = "https://memory-alpha.fandom.com/wiki/$1";

/// A small wiki farm:
/// - `wikipedia:en` and `wikipedia:de`, with `fr` declared but not configured
/// - `wiktionary:en` with a case sensitive main namespace, `de` declared only
/// - `commons:commons`, `wikidata:wikidata` and an external `memoryalpha:en`
pub fn fixture_sites() -> Arc<dyn Sites> {
    let memory_alpha = InterwikiEntry::to_url("memoryalpha", MEMORY_ALPHA_URL, false);

    let mut registry = SiteRegistry::new();
    registry
        .register_family("wikipedia", ["en", "de", "fr"])
        .register_family("wiktionary", ["en", "de"])
        .register(
            SiteInfo::new("wikipedia", "en")
                .with_article_url("https://en.wikipedia.org/wiki/$1")
                .with_interwiki(InterwikiEntry::to_site("wikipedia", "wikipedia", "en"))
                .with_interwiki(InterwikiEntry::to_site("wikt", "wiktionary", "en"))
                .with_interwiki(InterwikiEntry::to_site("c", "commons", "commons"))
                .with_interwiki(InterwikiEntry::to_url("d", WIKIDATA_URL, true))
                .with_interwiki(InterwikiEntry::to_url(
                    "google",
                    "https://www.google.com/search?q=$1",
                    false,
                ))
                .with_interwiki(memory_alpha.clone()),
        )
        .register(
            SiteInfo::new("wikipedia", "de")
                .with_article_url("https://de.wikipedia.org/wiki/$1")
                .with_namespace(Namespace::new(2, "Benutzer").with_canonical_name("User"))
                .with_namespace(
                    Namespace::new(3, "Benutzer Diskussion").with_canonical_name("User talk"),
                )
                .with_namespace(Namespace::new(6, "Datei").with_canonical_name("File"))
                .with_interwiki(InterwikiEntry::to_site("wikt", "wiktionary", "de"))
                .with_interwiki(InterwikiEntry::to_url("d", WIKIDATA_URL, true)),
        )
        .register(
            SiteInfo::new("wiktionary", "en")
                .with_article_url("https://en.wiktionary.org/wiki/$1")
                .with_namespace(Namespace::new(0, "").with_case(NamespaceCase::CaseSensitive))
                .with_interwiki(InterwikiEntry::to_site("w", "wikipedia", "en"))
                .with_interwiki(memory_alpha),
        )
        .register(
            SiteInfo::new("commons", "commons")
                .with_article_url("https://commons.wikimedia.org/wiki/$1"),
        )
        .register(
            SiteInfo::new("wikidata", "wikidata")
                .with_article_url(WIKIDATA_URL)
                .with_namespace(Namespace::new(120, "Property"))
                .with_namespace(Namespace::new(121, "Property talk"))
                .with_namespace(Namespace::new(146, "Lexeme"))
                .with_namespace(Namespace::new(147, "Lexeme talk")),
        )
        .register(SiteInfo::new("memoryalpha", "en").with_article_url(MEMORY_ALPHA_URL));

    Arc::new(registry)
}

pub fn site(sites: &Arc<dyn Sites>, family: &str, code: &str) -> Site {
    Site::load(sites, family, code).unwrap()
}

fn entity_value(id: &str) -> Value {
    let numeric: u64 = id[1..].parse().unwrap();
    json!({
        "value": {"entity-type": "item", "numeric-id": numeric, "id": id},
        "type": "wikibase-entityid"
    })
}

fn time_value(time: &str) -> Value {
    json!({
        "value": {
            "time": time,
            "timezone": 0,
            "before": 0,
            "after": 0,
            "precision": 11,
            "calendarmodel": "http://www.wikidata.org/entity/Q1985727"
        },
        "type": "time"
    })
}

/// `P31: Q5` with two qualifiers and one reference, every field filled in.
pub fn statement_fixture() -> Value {
    json!({
        "mainsnak": {
            "snaktype": "value",
            "property": "P31",
            "hash": "ad7d38a03cdd40cdc373de0dc4e7b7fcbccb31d9",
            "datavalue": entity_value("Q5"),
            "datatype": "wikibase-item"
        },
        "type": "statement",
        "id": "Q42$F078E5B3-F9A8-480E-B7AC-D97778CBBEF9",
        "rank": "preferred",
        "qualifiers": {
            "P580": [{
                "snaktype": "value",
                "property": "P580",
                "hash": "9cb0e6b2d8ec9c7d8bdc22cc4a9e3bc1af5da2a6",
                "datavalue": time_value("+2001-01-01T00:00:00Z"),
                "datatype": "time"
            }],
            "P582": [{
                "snaktype": "somevalue",
                "property": "P582",
                "hash": "24d1e1e4a5bc06bc6c4b45fa1a03d7bd6fa8fd6e",
                "datatype": "time"
            }]
        },
        "qualifiers-order": ["P580", "P582"],
        "references": [{
            "hash": "fa278ebfc458360e5aed63d5058cca83c46134f1",
            "snaks": {
                "P248": [{
                    "snaktype": "value",
                    "property": "P248",
                    "hash": "3a12f1e7e8bde4bb2c3f8d3e1f5d8d9a2c3b4e5f",
                    "datavalue": entity_value("Q36578"),
                    "datatype": "wikibase-item"
                }],
                "P813": [{
                    "snaktype": "value",
                    "property": "P813",
                    "hash": "b4e7ae05c6ea9f4b7a6bd7d0cb6a0a5aa7a4c1e2",
                    "datavalue": time_value("+2013-12-07T00:00:00Z"),
                    "datatype": "time"
                }]
            },
            "snaks-order": ["P248", "P813"]
        }]
    })
}

/// A statement as sent by a client: no id, hashes, qualifiers or references.
pub fn statement_without_extras_fixture() -> Value {
    json!({
        "mainsnak": {
            "snaktype": "value",
            "property": "P1082",
            "datavalue": {
                "value": {"amount": "+42", "unit": "1"},
                "type": "quantity"
            },
            "datatype": "quantity"
        },
        "type": "statement",
        "rank": "normal"
    })
}

/// Q42 as returned by `wbgetentities`.
pub fn item_fixture() -> Value {
    json!({
        "type": "item",
        "id": "Q42",
        "lastrevid": 1000,
        "modified": "2024-03-01T12:00:00Z",
        "labels": {"en": {"language": "en", "value": "Douglas Adams"}},
        "descriptions": {"en": {"language": "en", "value": "English writer and humourist"}},
        "aliases": {
            "en": [
                {"language": "en", "value": "Douglas Noel Adams"},
                {"language": "en", "value": "DNA"}
            ]
        },
        "claims": {
            "P31": [statement_fixture()],
            "P21": [{
                "mainsnak": {
                    "snaktype": "value",
                    "property": "P21",
                    "hash": "85561b4bdd7b8b1c6e4e7bd6e9fbc9d8e7f1c2a3",
                    "datavalue": entity_value("Q6581097"),
                    "datatype": "wikibase-item"
                },
                "type": "statement",
                "id": "Q42$39F4DE4F-C277-449C-9F99-512350971B5B",
                "rank": "normal"
            }]
        },
        "sitelinks": {
            "enwiki": {"site": "enwiki", "title": "Douglas Adams", "badges": []}
        }
    })
}

/// A recorded [`Repository`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: &'static str,
    pub params: Value,
    pub options: Option<EditOptions>,
    /// What a real client would send for `options`.
    pub option_params: Vec<(&'static str, String)>,
}

#[derive(Debug, Default)]
struct MockState {
    entities: Vec<Value>,
    calls: Vec<MockCall>,
    responses: VecDeque<Result<Value, RepositoryError>>,
    revision: u64,
    counter: u64,
}

/// An in-memory repository answering the way the Wikibase API does.
///
/// Every write bumps the revision id, starting after 1000. Queued responses are returned
/// before any default answer.
#[derive(Debug)]
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                revision: 1000,
                ..MockState::default()
            }),
        }
    }

    pub fn with_entity(entity: Value) -> Self {
        let repo = Self::new();
        repo.state.lock().unwrap().entities.push(entity);
        repo
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn push_response(&self, response: Result<Value, RepositoryError>) {
        self.state.lock().unwrap().responses.push_back(response);
    }

    fn call(
        &self,
        method: &'static str,
        params: Value,
        options: Option<&EditOptions>,
        default: impl FnOnce(&mut MockState) -> Result<Value, RepositoryError>,
    ) -> Result<Value, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall {
            method,
            params,
            options: options.cloned(),
            option_params: options.map(EditOptions::to_params).unwrap_or_default(),
        });
        if let Some(response) = state.responses.pop_front() {
            return response;
        }
        if options.is_some() {
            state.revision += 1;
        }
        default(&mut state)
    }
}

fn pageinfo(state: &MockState) -> Value {
    json!({"pageinfo": {"lastrevid": state.revision}, "success": 1})
}

fn new_id(entity_type: &str) -> Result<&'static str, RepositoryError> {
    match entity_type {
        "item" => Ok("Q999"),
        "property" => Ok("P999"),
        "lexeme" => Ok("L999"),
        "mediainfo" => Ok("M999"),
        other => Err(RepositoryError::UnexpectedResponse(format!(
            "cannot create {other}"
        ))),
    }
}

impl Repository for MockRepository {
    fn concept_base_uri(&self) -> &str {
        "http://www.wikidata.org/entity/"
    }

    fn load_entity(&self, id: &EntityId) -> Result<Value, RepositoryError> {
        self.call("load_entity", json!({"id": id.as_str()}), None, |state| {
            let entity = state
                .entities
                .iter()
                .find(|entity| entity["id"] == id.as_str())
                .cloned()
                .unwrap_or_else(|| json!({"id": id.as_str(), "missing": ""}));
            let mut entities = serde_json::Map::new();
            entities.insert(id.to_string(), entity);
            Ok(json!({ "entities": entities }))
        })
    }

    fn edit_entity(&self, edit: &EntityEdit, options: &EditOptions) -> Result<Value, RepositoryError> {
        let params = serde_json::to_value(edit).unwrap();
        self.call("edit_entity", params, Some(options), |state| {
            let (id, entity_type) = match (&edit.id, edit.new) {
                (Some(id), _) => (id.as_str(), id.kind().entity_type()),
                (None, Some(new)) => (new_id(new)?, new),
                (None, None) => {
                    return Err(RepositoryError::UnexpectedResponse("no id".into()));
                }
            };
            Ok(json!({
                "entity": {"id": id, "type": entity_type, "lastrevid": state.revision},
                "success": 1
            }))
        })
    }

    fn add_claim(&self, entity: &EntityId, claim: &Value, options: &EditOptions) -> Result<Value, RepositoryError> {
        let params = json!({"entity": entity.as_str(), "claim": claim});
        self.call("add_claim", params, Some(options), |state| {
            state.counter += 1;
            let mut saved = claim.clone();
            saved["id"] = json!(format!("{entity}$mock-{}", state.counter));
            let mut response = pageinfo(state);
            response["claim"] = saved;
            Ok(response)
        })
    }

    fn set_claim(&self, claim: &Value, options: &EditOptions) -> Result<Value, RepositoryError> {
        self.call("set_claim", json!({"claim": claim}), Some(options), |state| {
            let mut response = pageinfo(state);
            response["claim"] = claim.clone();
            Ok(response)
        })
    }

    fn remove_claims(&self, guids: &[&str], options: &EditOptions) -> Result<Value, RepositoryError> {
        self.call("remove_claims", json!({"guids": guids}), Some(options), |state| {
            let mut response = pageinfo(state);
            response["claims"] = json!(guids);
            Ok(response)
        })
    }

    fn set_reference(
        &self,
        statement: &str,
        reference: &Value,
        hash: Option<&str>,
        options: &EditOptions,
    ) -> Result<Value, RepositoryError> {
        let params = json!({"statement": statement, "reference": reference, "hash": hash});
        self.call("set_reference", params, Some(options), |state| {
            state.counter += 1;
            let mut saved = reference.clone();
            saved["hash"] = json!(format!("mockhash-{}", state.counter));
            let mut response = pageinfo(state);
            response["reference"] = saved;
            Ok(response)
        })
    }

    fn remove_references(&self, statement: &str, hashes: &[&str], options: &EditOptions) -> Result<Value, RepositoryError> {
        let params = json!({"statement": statement, "references": hashes});
        self.call("remove_references", params, Some(options), |state| Ok(pageinfo(state)))
    }

    fn set_qualifier(&self, statement: &str, snak: &Value, options: &EditOptions) -> Result<Value, RepositoryError> {
        let params = json!({"claim": statement, "snak": snak});
        self.call("set_qualifier", params, Some(options), |state| Ok(pageinfo(state)))
    }

    fn remove_qualifiers(&self, statement: &str, hashes: &[&str], options: &EditOptions) -> Result<Value, RepositoryError> {
        let params = json!({"claim": statement, "qualifiers": hashes});
        self.call("remove_qualifiers", params, Some(options), |state| Ok(pageinfo(state)))
    }
}

pub mod proptest {
    use proptest::prelude::*;
    use proptest::strategy::Strategy;

    /// Characters that survive title normalisation unchanged, plus some that do not.
    const TITLE_CHARS: &str = "[a-zA-Z0-9 _äöüßéЖ()',.!-]";

    pub fn title_text() -> impl Strategy<Value = String> {
        proptest::string::string_regex(&format!("{TITLE_CHARS}{{1,40}}")).unwrap()
    }

    /// A title that is valid on any site of the fixture farm: starts with a letter, no
    /// leading or trailing whitespace and no namespace-like prefix.
    pub fn valid_title() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[A-Z][a-z0-9äöü]{0,10}( [a-z0-9äöü]{1,10}){0,3}").unwrap()
    }

    pub fn language_code() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("en".to_string()),
            Just("de".to_string()),
            Just("fr".to_string()),
            Just("nl".to_string()),
            Just("zh-hans".to_string()),
        ]
    }

    /// Label or description maps, language to text.
    pub fn language_values() -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::vec((language_code(), valid_title()), 0..5).prop_map(|mut values| {
            values.sort_by(|a, b| a.0.cmp(&b.0));
            values.dedup_by(|a, b| a.0 == b.0);
            values
        })
    }
}

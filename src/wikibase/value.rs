use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Number, Value};

use super::id::{EntityId, EntityKind};

pub const GREGORIAN_CALENDAR: &str = "http://www.wikidata.org/entity/Q1985727";
pub const EARTH: &str = "http://www.wikidata.org/entity/Q2";

/// A point in time, as stored by Wikibase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WbTime {
    /// `+YYYY-MM-DDThh:mm:ssZ`, unknown components are zero.
    pub time: String,
    pub timezone: i64,
    pub before: u64,
    pub after: u64,
    /// 0 (billion years) ..= 14 (second), 11 is day, 9 is year.
    pub precision: u8,
    pub calendarmodel: String,
}

impl WbTime {
    pub const PRECISION_YEAR: u8 = 9;
    pub const PRECISION_MONTH: u8 = 10;
    pub const PRECISION_DAY: u8 = 11;
    pub const PRECISION_SECOND: u8 = 14;

    /// A proleptic gregorian date; `month` and `day` may be 0 for lower precisions.
    pub fn from_date(year: i64, month: u8, day: u8, precision: u8) -> Self {
        let sign = if year < 0 { '-' } else { '+' };
        Self {
            time: format!("{sign}{:04}-{month:02}-{day:02}T00:00:00Z", year.unsigned_abs()),
            timezone: 0,
            before: 0,
            after: 0,
            precision,
            calendarmodel: GREGORIAN_CALENDAR.to_string(),
        }
    }

    pub fn from_datetime(timestamp: DateTime<Utc>) -> Self {
        let sign = if timestamp.year() < 0 { '-' } else { '+' };
        Self {
            time: format!(
                "{sign}{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                timestamp.year().unsigned_abs(),
                timestamp.month(),
                timestamp.day(),
                timestamp.hour(),
                timestamp.minute(),
                timestamp.second()
            ),
            timezone: 0,
            before: 0,
            after: 0,
            precision: Self::PRECISION_SECOND,
            calendarmodel: GREGORIAN_CALENDAR.to_string(),
        }
    }

    /// The year, including its sign.
    pub fn year(&self) -> Option<i64> {
        let (sign, rest) = self.time.split_at_checked(1)?;
        let year: i64 = rest.split('-').next()?.parse().ok()?;
        Some(if sign == "-" { -year } else { year })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WbQuantity {
    /// Signed decimal string, e.g. `+10.5`.
    pub amount: String,
    /// `1` for unitless quantities, otherwise the concept URI of the unit item.
    pub unit: String,
    #[serde(
        rename = "upperBound",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub upper_bound: Option<String>,
    #[serde(
        rename = "lowerBound",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub lower_bound: Option<String>,
}

impl WbQuantity {
    pub fn unitless(amount: &str) -> Self {
        Self {
            amount: amount.to_string(),
            unit: "1".to_string(),
            upper_bound: None,
            lower_bound: None,
        }
    }
}

/// Numbers are kept as they were written (`52` stays an integer, `52.0` a float).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: Number,
    pub longitude: Number,
    #[serde(default)]
    pub altitude: Option<Number>,
    #[serde(default)]
    pub precision: Option<Number>,
    pub globe: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonolingualText {
    pub text: String,
    pub language: String,
}

/// A value that could not be converted, kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct WbUnknown {
    pub json: Value,
    pub value_type: Option<String>,
    pub warning: String,
}

/// The value of a snak.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Entity(EntityId),
    String(String),
    Time(WbTime),
    Quantity(WbQuantity),
    Coordinate(Coordinate),
    MonolingualText(MonolingualText),
    Unknown(WbUnknown),
}

/// The value shape a datatype converts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Entity(EntityKind),
    String,
    Time,
    Quantity,
    Coordinate,
    MonolingualText,
}

impl ValueKind {
    /// The conversion table from property datatypes to value shapes.
    pub fn for_datatype(datatype: &str) -> Option<Self> {
        Some(match datatype {
            "wikibase-item" => ValueKind::Entity(EntityKind::Item),
            "wikibase-property" => ValueKind::Entity(EntityKind::Property),
            "wikibase-lexeme" => ValueKind::Entity(EntityKind::Lexeme),
            "wikibase-form" => ValueKind::Entity(EntityKind::Form),
            "wikibase-sense" => ValueKind::Entity(EntityKind::Sense),
            "string" | "url" | "external-id" | "math" | "musical-notation" | "commonsMedia"
            | "geo-shape" | "tabular-data" => ValueKind::String,
            "time" => ValueKind::Time,
            "quantity" => ValueKind::Quantity,
            "globe-coordinate" => ValueKind::Coordinate,
            "monolingualtext" => ValueKind::MonolingualText,
            _ => return None,
        })
    }

    /// The `type` of the datavalue.
    pub fn value_type(&self) -> &'static str {
        match self {
            ValueKind::Entity(_) => "wikibase-entityid",
            ValueKind::String => "string",
            ValueKind::Time => "time",
            ValueKind::Quantity => "quantity",
            ValueKind::Coordinate => "globecoordinate",
            ValueKind::MonolingualText => "monolingualtext",
        }
    }
}

/// Guess the datatype of a snak that came without one from its datavalue.
pub fn infer_datatype(datavalue: &Value) -> Option<&'static str> {
    Some(match datavalue.get("type")?.as_str()? {
        "wikibase-entityid" => {
            let entity_type = datavalue
                .get("value")
                .and_then(|value| value.get("entity-type"))
                .and_then(Value::as_str)
                .unwrap_or("item");
            match EntityKind::from_entity_type(entity_type)? {
                EntityKind::Item => "wikibase-item",
                EntityKind::Property => "wikibase-property",
                EntityKind::Lexeme => "wikibase-lexeme",
                EntityKind::Form => "wikibase-form",
                EntityKind::Sense => "wikibase-sense",
                EntityKind::MediaInfo => return None,
            }
        }
        "string" => "string",
        "time" => "time",
        "quantity" => "quantity",
        "globecoordinate" => "globe-coordinate",
        "monolingualtext" => "monolingualtext",
        _ => return None,
    })
}

fn entity_from_value(kind: EntityKind, value: &Value) -> Option<EntityId> {
    if let Some(id) = value.get("id").and_then(Value::as_str) {
        return EntityId::parse_as(id, kind).ok();
    }
    let numeric_id = value.get("numeric-id").and_then(Value::as_u64)?;
    EntityId::from_numeric(kind, numeric_id).ok()
}

impl Target {
    /// Convert a datavalue (`{"value": ..., "type": ...}`).
    ///
    /// Never fails: values of unknown datatypes and values that do not have the shape their
    /// datatype promises become [`Target::Unknown`].
    pub fn from_datavalue(datatype: Option<&str>, datavalue: &Value) -> Target {
        let value = datavalue.get("value").cloned().unwrap_or(Value::Null);
        let value_type = datavalue
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        let datatype = datatype.or_else(|| infer_datatype(datavalue));
        let Some(kind) = datatype.and_then(ValueKind::for_datatype) else {
            tracing::warn!(
                message = "Unknown datatype, keeping the raw value",
                datatype,
                value_type = value_type.as_deref()
            );
            return Target::Unknown(WbUnknown {
                json: value,
                value_type,
                warning: format!("unknown datatype {:?}", datatype.unwrap_or("")),
            });
        };

        let converted = match kind {
            ValueKind::Entity(entity_kind) => entity_from_value(entity_kind, &value).map(Target::Entity),
            ValueKind::String => value.as_str().map(|s| Target::String(s.to_string())),
            ValueKind::Time => serde_json::from_value(value.clone()).ok().map(Target::Time),
            ValueKind::Quantity => serde_json::from_value(value.clone()).ok().map(Target::Quantity),
            ValueKind::Coordinate => serde_json::from_value(value.clone())
                .ok()
                .map(Target::Coordinate),
            ValueKind::MonolingualText => serde_json::from_value(value.clone())
                .ok()
                .map(Target::MonolingualText),
        };

        converted.unwrap_or_else(|| {
            tracing::warn!(
                message = "Value does not match its datatype, keeping the raw value",
                datatype,
                value_type = value_type.as_deref()
            );
            Target::Unknown(WbUnknown {
                warning: format!("value is not a valid {:?} value", datatype.unwrap_or("")),
                json: value,
                value_type,
            })
        })
    }

    pub fn to_datavalue(&self) -> Value {
        let (value, value_type) = match self {
            Target::Entity(id) => {
                let mut value = json!({ "entity-type": id.kind().entity_type() });
                if let Some(numeric_id) = id.numeric_id() {
                    value["numeric-id"] = json!(numeric_id);
                }
                value["id"] = json!(id.as_str());
                (value, "wikibase-entityid")
            }
            Target::String(s) => (json!(s), "string"),
            Target::Time(time) => (json!(time), "time"),
            Target::Quantity(quantity) => (json!(quantity), "quantity"),
            Target::Coordinate(coordinate) => (json!(coordinate), "globecoordinate"),
            Target::MonolingualText(text) => (json!(text), "monolingualtext"),
            Target::Unknown(unknown) => {
                return match &unknown.value_type {
                    Some(value_type) => json!({ "value": unknown.json, "type": value_type }),
                    None => json!({ "value": unknown.json }),
                };
            }
        };
        json!({ "value": value, "type": value_type })
    }

    /// Whether this value may be used for a property of `datatype`.
    pub fn matches_datatype(&self, datatype: &str) -> bool {
        match (self, ValueKind::for_datatype(datatype)) {
            (Target::Entity(id), Some(ValueKind::Entity(kind))) => id.kind() == kind,
            (Target::String(_), Some(ValueKind::String)) => true,
            (Target::Time(_), Some(ValueKind::Time)) => true,
            (Target::Quantity(_), Some(ValueKind::Quantity)) => true,
            (Target::Coordinate(_), Some(ValueKind::Coordinate)) => true,
            (Target::MonolingualText(_), Some(ValueKind::MonolingualText)) => true,
            (Target::Unknown(_), None) => true,
            _ => false,
        }
    }
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Target::Entity(id)
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Target::String(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_value() {
        let datavalue = json!({
            "value": {"entity-type": "item", "numeric-id": 5, "id": "Q5"},
            "type": "wikibase-entityid"
        });
        let target = Target::from_datavalue(Some("wikibase-item"), &datavalue);
        assert_eq!(target, Target::Entity(EntityId::parse("Q5").unwrap()));
        assert_eq!(target.to_datavalue(), datavalue);

        // legacy values without id
        let legacy = json!({"value": {"entity-type": "item", "numeric-id": 5}, "type": "wikibase-entityid"});
        assert_eq!(Target::from_datavalue(Some("wikibase-item"), &legacy), target);

        let form = json!({
            "value": {"entity-type": "form", "id": "L3-F2"},
            "type": "wikibase-entityid"
        });
        let target = Target::from_datavalue(Some("wikibase-form"), &form);
        assert_eq!(target.to_datavalue(), form);
    }

    #[test]
    fn test_structured_values() {
        let time = json!({
            "value": {
                "time": "+2001-01-15T00:00:00Z", "timezone": 0, "before": 0, "after": 0,
                "precision": 11, "calendarmodel": GREGORIAN_CALENDAR
            },
            "type": "time"
        });
        let target = Target::from_datavalue(Some("time"), &time);
        assert_eq!(target, Target::Time(WbTime::from_date(2001, 1, 15, WbTime::PRECISION_DAY)));
        assert_eq!(target.to_datavalue(), time);

        let coordinate = json!({
            "value": {"latitude": 52.5, "longitude": 13.4, "altitude": null, "precision": 0.0001, "globe": EARTH},
            "type": "globecoordinate"
        });
        assert_eq!(
            Target::from_datavalue(Some("globe-coordinate"), &coordinate).to_datavalue(),
            coordinate
        );

        // whole degrees
        let coordinate = json!({
            "value": {"latitude": 52, "longitude": -13, "altitude": null, "precision": 1, "globe": EARTH},
            "type": "globecoordinate"
        });
        let target = Target::from_datavalue(Some("globe-coordinate"), &coordinate);
        assert!(matches!(&target, Target::Coordinate(c) if c.latitude.is_i64()));
        assert_eq!(target.to_datavalue(), coordinate);

        let quantity = json!({"value": {"amount": "+10", "unit": "1"}, "type": "quantity"});
        let target = Target::from_datavalue(None, &quantity);
        assert_eq!(target, Target::Quantity(WbQuantity::unitless("+10")));
        assert_eq!(target.to_datavalue(), quantity);
    }

    #[test]
    fn test_unknown_datatype() {
        let datavalue = json!({"value": {"foo": 1}, "type": "fancy"});
        let Target::Unknown(unknown) = Target::from_datavalue(Some("wikibase-fancy"), &datavalue)
        else {
            panic!("expected an unknown value");
        };
        assert!(unknown.warning.contains("wikibase-fancy"));
        assert_eq!(Target::Unknown(unknown).to_datavalue(), datavalue);
    }

    #[test]
    fn test_malformed_value() {
        let datavalue = json!({"value": 12, "type": "string"});
        let target = Target::from_datavalue(Some("string"), &datavalue);
        assert!(matches!(target, Target::Unknown(_)));
        assert_eq!(target.to_datavalue(), datavalue);
    }

    #[test]
    fn test_matches_datatype() {
        let item = Target::Entity(EntityId::parse("Q1").unwrap());
        assert!(item.matches_datatype("wikibase-item"));
        assert!(!item.matches_datatype("wikibase-property"));
        assert!(Target::from("x").matches_datatype("external-id"));
        assert!(!Target::from("x").matches_datatype("time"));
    }

    #[test]
    fn test_time() {
        let time = WbTime::from_date(-500, 0, 0, WbTime::PRECISION_YEAR);
        assert_eq!(time.time, "-0500-00-00T00:00:00Z");
        assert_eq!(time.year(), Some(-500));

        let timestamp = DateTime::from_timestamp(1_000_000_000, 0).unwrap();
        assert_eq!(WbTime::from_datetime(timestamp).time, "+2001-09-09T01:46:40Z");
    }
}

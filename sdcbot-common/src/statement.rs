//! Wikibase statement JSON model
//!
//! The structured-data API accepts and returns statements ("claims") in
//! Wikibase JSON. This module models the subset the bots read and write:
//! snaks with five datavalue kinds, qualifiers with their order list,
//! references, rank, and the statement id that marks an edit of an
//! existing statement.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Proleptic Gregorian calendar, the only calendar model the bots emit.
pub const CALENDAR_GREGORIAN: &str = "http://www.wikidata.org/entity/Q1985727";
/// Earth, the only globe the bots emit coordinates for.
pub const GLOBE_EARTH: &str = "http://www.wikidata.org/entity/Q2";

/// Wikibase time precision: year.
pub const PRECISION_YEAR: u8 = 9;
/// Wikibase time precision: month.
pub const PRECISION_MONTH: u8 = 10;
/// Wikibase time precision: day (the finest the bots ever emit).
pub const PRECISION_DAY: u8 = 11;

/// How a snak carries its value. `SomeValue` is the explicit
/// "unknown value" marker, distinct from the absence of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnakType {
    Value,
    SomeValue,
    NoValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityIdValue {
    #[serde(rename = "entity-type")]
    pub entity_type: String,
    #[serde(rename = "numeric-id", default, skip_serializing_if = "Option::is_none")]
    pub numeric_id: Option<u64>,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeValue {
    /// `+YYYY-MM-DDT00:00:00Z`; month and day are zero when the precision
    /// is coarser than that component.
    pub time: String,
    pub timezone: i32,
    pub before: u32,
    pub after: u32,
    pub precision: u8,
    pub calendarmodel: String,
}

impl TimeValue {
    /// Build a time value, zeroing the month and day components that the
    /// given precision does not cover.
    pub fn from_date(year: i32, month: u32, day: u32, precision: u8) -> Self {
        let month = if precision < PRECISION_MONTH { 0 } else { month };
        let day = if precision < PRECISION_DAY { 0 } else { day };

        TimeValue {
            time: format!("+{:04}-{:02}-{:02}T00:00:00Z", year, month, day),
            timezone: 0,
            before: 0,
            after: 0,
            precision,
            calendarmodel: CALENDAR_GREGORIAN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateValue {
    pub latitude: f64,
    pub longitude: f64,
    /// Always serialized, as `null`; the API rejects a missing key.
    pub altitude: Option<f64>,
    pub precision: f64,
    pub globe: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonolingualTextValue {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum DataValue {
    String(String),
    #[serde(rename = "wikibase-entityid")]
    EntityId(EntityIdValue),
    #[serde(rename = "globecoordinate")]
    GlobeCoordinate(CoordinateValue),
    Time(TimeValue),
    #[serde(rename = "monolingualtext")]
    MonolingualText(MonolingualTextValue),
}

/// A property/value pair, the building block of statements, qualifiers
/// and references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snak {
    pub snaktype: SnakType,
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datavalue: Option<DataValue>,
}

impl Snak {
    pub fn string(property: &str, value: &str) -> Self {
        Snak {
            snaktype: SnakType::Value,
            property: property.to_string(),
            datavalue: Some(DataValue::String(value.to_string())),
        }
    }

    pub fn item(property: &str, item_id: &str) -> Self {
        // The numeric id is redundant with the Q-id; omit it rather than
        // fail when the id has an unexpected shape.
        let numeric_id = item_id.strip_prefix('Q').and_then(|n| n.parse().ok());

        Snak {
            snaktype: SnakType::Value,
            property: property.to_string(),
            datavalue: Some(DataValue::EntityId(EntityIdValue {
                entity_type: "item".to_string(),
                numeric_id,
                id: item_id.to_string(),
            })),
        }
    }

    pub fn time(property: &str, value: TimeValue) -> Self {
        Snak {
            snaktype: SnakType::Value,
            property: property.to_string(),
            datavalue: Some(DataValue::Time(value)),
        }
    }

    pub fn coordinate(property: &str, latitude: f64, longitude: f64, precision: f64) -> Self {
        Snak {
            snaktype: SnakType::Value,
            property: property.to_string(),
            datavalue: Some(DataValue::GlobeCoordinate(CoordinateValue {
                latitude,
                longitude,
                altitude: None,
                precision,
                globe: GLOBE_EARTH.to_string(),
            })),
        }
    }

    pub fn monolingual(property: &str, text: &str, language: &str) -> Self {
        Snak {
            snaktype: SnakType::Value,
            property: property.to_string(),
            datavalue: Some(DataValue::MonolingualText(MonolingualTextValue {
                text: text.to_string(),
                language: language.to_string(),
            })),
        }
    }

    pub fn somevalue(property: &str) -> Self {
        Snak {
            snaktype: SnakType::SomeValue,
            property: property.to_string(),
            datavalue: None,
        }
    }
}

/// Provenance annotation on a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub snaks: BTreeMap<String, Vec<Snak>>,
    #[serde(rename = "snaks-order")]
    pub snaks_order: Vec<String>,
}

/// One structured-data statement, serializable to the exact JSON the
/// edit API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub mainsnak: Snak,
    #[serde(rename = "type")]
    pub statement_type: String,
    pub rank: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub qualifiers: BTreeMap<String, Vec<Snak>>,
    #[serde(
        rename = "qualifiers-order",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub qualifiers_order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    /// Present only when re-submitting an existing statement; the API
    /// treats a statement with an id as an edit rather than an addition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Statement {
    pub fn new(mainsnak: Snak) -> Self {
        Statement {
            mainsnak,
            statement_type: "statement".to_string(),
            rank: "normal".to_string(),
            qualifiers: BTreeMap::new(),
            qualifiers_order: Vec::new(),
            references: Vec::new(),
            id: None,
        }
    }

    pub fn property(&self) -> &str {
        &self.mainsnak.property
    }

    pub fn add_qualifier(&mut self, snak: Snak) {
        let property = snak.property.clone();
        if !self.qualifiers_order.contains(&property) {
            self.qualifiers_order.push(property.clone());
        }
        self.qualifiers.entry(property).or_default().push(snak);
    }

    pub fn has_qualifier(&self, property: &str) -> bool {
        self.qualifiers.contains_key(property)
    }

    pub fn add_reference(&mut self, snaks: Vec<Snak>) {
        let mut reference = Reference {
            snaks: BTreeMap::new(),
            snaks_order: Vec::new(),
        };

        for snak in snaks {
            let property = snak.property.clone();
            if !reference.snaks_order.contains(&property) {
                reference.snaks_order.push(property.clone());
            }
            reference.snaks.entry(property).or_default().push(snak);
        }

        self.references.push(reference);
    }
}

/// A record's existing statements, keyed by property.
///
/// Statements are held as raw JSON: the lookup that gates emission only
/// needs the property keys, and a malformed statement must not prevent
/// processing the rest of the record. Typed decoding is done on demand.
#[derive(Debug, Clone, Default)]
pub struct StatementIndex {
    by_property: HashMap<String, Vec<serde_json::Value>>,
}

impl StatementIndex {
    pub fn empty() -> Self {
        StatementIndex::default()
    }

    /// Build the index from the API's `statements` payload. An entity
    /// with no statements serializes them as `[]` instead of `{}`, so
    /// any non-object payload yields an empty index.
    pub fn from_json(value: serde_json::Value) -> Self {
        let mut by_property = HashMap::new();

        if let serde_json::Value::Object(map) = value {
            for (property, statements) in map {
                if let serde_json::Value::Array(list) = statements {
                    by_property.insert(property, list);
                }
            }
        }

        StatementIndex { by_property }
    }

    pub fn has(&self, property: &str) -> bool {
        self.by_property.contains_key(property)
    }

    pub fn count(&self, property: &str) -> usize {
        self.by_property.get(property).map_or(0, Vec::len)
    }

    pub fn raw(&self, property: &str) -> &[serde_json::Value] {
        self.by_property.get(property).map_or(&[], Vec::as_slice)
    }

    /// The sole statement for `property`, decoded. `None` when there is
    /// not exactly one statement or it does not decode cleanly.
    pub fn single(&self, property: &str) -> Option<Statement> {
        match self.raw(property) {
            [statement] => serde_json::from_value(statement.clone()).ok(),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_snak_serialization() {
        let snak = Snak::string("P1651", "dQw4w9WgXcQ");
        let value = serde_json::to_value(&snak).unwrap();
        assert_eq!(
            value,
            json!({
                "snaktype": "value",
                "property": "P1651",
                "datavalue": {"value": "dQw4w9WgXcQ", "type": "string"}
            })
        );
    }

    #[test]
    fn test_somevalue_snak_serialization() {
        let snak = Snak::somevalue("P170");
        let value = serde_json::to_value(&snak).unwrap();
        assert_eq!(value, json!({"snaktype": "somevalue", "property": "P170"}));
    }

    #[test]
    fn test_item_snak_carries_numeric_id() {
        let snak = Snak::item("P1433", "Q866");
        let value = serde_json::to_value(&snak).unwrap();
        assert_eq!(
            value["datavalue"],
            json!({
                "value": {"entity-type": "item", "numeric-id": 866, "id": "Q866"},
                "type": "wikibase-entityid"
            })
        );
    }

    #[test]
    fn test_coordinate_snak_serializes_null_altitude() {
        let snak = Snak::coordinate("P1259", 51.5, -0.1, 0.001);
        let value = serde_json::to_value(&snak).unwrap();
        assert_eq!(value["datavalue"]["value"]["altitude"], json!(null));
        assert_eq!(value["datavalue"]["value"]["precision"], json!(0.001));
        assert_eq!(
            value["datavalue"]["value"]["globe"],
            json!("http://www.wikidata.org/entity/Q2")
        );
    }

    #[test]
    fn test_time_value_zeroes_components_beyond_precision() {
        let year = TimeValue::from_date(2014, 5, 17, PRECISION_YEAR);
        assert_eq!(year.time, "+2014-00-00T00:00:00Z");

        let month = TimeValue::from_date(2014, 5, 17, PRECISION_MONTH);
        assert_eq!(month.time, "+2014-05-00T00:00:00Z");

        let day = TimeValue::from_date(2014, 5, 17, PRECISION_DAY);
        assert_eq!(day.time, "+2014-05-17T00:00:00Z");
    }

    #[test]
    fn test_qualifier_order_tracks_insertion() {
        let mut statement = Statement::new(Snak::somevalue("P170"));
        statement.add_qualifier(Snak::string("P2093", "Somebody"));
        statement.add_qualifier(Snak::string("P2699", "https://example.org/u/1"));
        statement.add_qualifier(Snak::string("P2093", "Somebody Else"));

        assert_eq!(statement.qualifiers_order, vec!["P2093", "P2699"]);
        assert_eq!(statement.qualifiers["P2093"].len(), 2);
        assert!(statement.has_qualifier("P2699"));
        assert!(!statement.has_qualifier("P577"));
    }

    #[test]
    fn test_statement_roundtrip_keeps_id() {
        let payload = json!({
            "mainsnak": {
                "snaktype": "value",
                "property": "P275",
                "datavalue": {"value": {"entity-type": "item", "numeric-id": 20007257, "id": "Q20007257"}, "type": "wikibase-entityid"}
            },
            "type": "statement",
            "rank": "normal",
            "id": "M123$AAAA-BBBB"
        });

        let statement: Statement = serde_json::from_value(payload).unwrap();
        assert_eq!(statement.id.as_deref(), Some("M123$AAAA-BBBB"));
        assert_eq!(statement.property(), "P275");
        assert!(statement.qualifiers.is_empty());

        let out = serde_json::to_value(&statement).unwrap();
        assert_eq!(out["id"], json!("M123$AAAA-BBBB"));
        assert!(out.get("qualifiers").is_none());
    }

    #[test]
    fn test_index_from_object() {
        let index = StatementIndex::from_json(json!({
            "P180": [{"mainsnak": {"snaktype": "value", "property": "P180"}}],
            "P571": [{}, {}]
        }));

        assert!(index.has("P180"));
        assert_eq!(index.count("P571"), 2);
        assert!(!index.has("P1651"));
    }

    #[test]
    fn test_index_from_empty_array_quirk() {
        let index = StatementIndex::from_json(json!([]));
        assert!(!index.has("P180"));
        assert_eq!(index.count("P180"), 0);
    }

    #[test]
    fn test_single_requires_exactly_one() {
        let statement = json!({
            "mainsnak": {"snaktype": "value", "property": "P275"},
            "type": "statement",
            "rank": "normal"
        });

        let one = StatementIndex::from_json(json!({ "P275": [statement.clone()] }));
        assert!(one.single("P275").is_some());

        let two = StatementIndex::from_json(json!({ "P275": [statement.clone(), statement] }));
        assert!(two.single("P275").is_none());

        let none = StatementIndex::empty();
        assert!(none.single("P275").is_none());
    }
}

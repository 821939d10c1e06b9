//! Statement construction rules
//!
//! `StatementBuilder` turns normalized platform metadata into the delta
//! of statements to submit for one record. Every emission first checks
//! the record's existing statements and no-ops when the property already
//! has a value, so the pipeline is additive-only. The one documented
//! exception is [`StatementBuilder::complete_license_qualifiers`], which
//! re-submits a single pre-existing statement with qualifiers added.

use chrono::{Datelike, NaiveDate};

use crate::statement::{
    Snak, Statement, StatementIndex, TimeValue, PRECISION_DAY, PRECISION_MONTH, PRECISION_YEAR,
};
use crate::wikidata::{entities, properties};

/// Per-platform customization points invoked while statements are built.
///
/// Each stage receives the statement after its common qualifiers are in
/// place and may attach platform-specific qualifiers or references. The
/// defaults do nothing.
pub trait StatementHooks {
    fn on_build_creator(&self, _statement: &mut Statement) {}
    fn on_build_source(&self, _statement: &mut Statement) {}
    fn on_build_depicts(&self, _statement: &mut Statement) {}
}

/// Hook set for platforms with no customizations.
pub struct NoHooks;

impl StatementHooks for NoHooks {}

/// Attribution data for the creator statement.
#[derive(Debug, Clone)]
pub struct Creator {
    /// Display name, real name preferred over handle by the platform
    /// client.
    pub display_name: String,
    pub profile_url: Option<String>,
    /// Item representing this exact person, when the per-run resolver
    /// found exactly one. `None` keeps the explicit unknown-value slot.
    pub item: Option<String>,
}

/// Camera position as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Platform accuracy level, 1 (world) to 16 (street).
    pub accuracy: u8,
}

/// Reported precision of a capture date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGranularity {
    Second,
    Month,
    Year,
    /// "Circa": the year is an estimate.
    Approximate,
}

/// Capture timestamp with its reported granularity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureDate {
    pub date: NaiveDate,
    pub granularity: DateGranularity,
}

/// Map a platform accuracy level to the knowledge base's coordinate
/// precision value. Levels outside the table yield `None`.
pub fn precision_for_accuracy(accuracy: u8) -> Option<f64> {
    match accuracy {
        16 => Some(1e-05),
        // 1/10 of an arcsecond
        15 | 14 => Some(2.777777777777778e-05),
        13 | 12 => Some(0.0001),
        // an arcsecond
        11 => Some(0.0002777777777777778),
        10 | 9 | 8 | 7 => Some(0.001),
        6 => Some(0.01),
        // an arcminute
        5 | 4 => Some(0.016666666666666666),
        3 | 2 | 1 => Some(0.1),
        _ => None,
    }
}

/// Builds the statement delta for one record.
pub struct StatementBuilder<'a> {
    index: &'a StatementIndex,
    hooks: &'a dyn StatementHooks,
    statements: Vec<Statement>,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(index: &'a StatementIndex, hooks: &'a dyn StatementHooks) -> Self {
        StatementBuilder {
            index,
            hooks,
            statements: Vec::new(),
        }
    }

    /// External identifier statement: emitted iff the property is absent.
    pub fn id_statement(&mut self, property: &str, value: &str) {
        if self.index.has(property) {
            return;
        }

        self.statements.push(Statement::new(Snak::string(property, value)));
    }

    /// Creator statement. The main slot is the resolved person item when
    /// one is known, otherwise the explicit unknown-value marker; the
    /// attribution lives in the qualifiers either way.
    pub fn creator_statement(&mut self, creator: &Creator) {
        if self.index.has(properties::CREATOR) {
            return;
        }

        let mut statement = match &creator.item {
            Some(item) => Statement::new(Snak::item(properties::CREATOR, item)),
            None => Statement::new(Snak::somevalue(properties::CREATOR)),
        };

        let name = creator.display_name.trim();
        if !name.is_empty() {
            statement.add_qualifier(Snak::string(properties::AUTHOR_NAME_STRING, name));
        }

        if let Some(url) = &creator.profile_url {
            statement.add_qualifier(Snak::string(properties::URL, url));
        }

        self.hooks.on_build_creator(&mut statement);
        self.statements.push(statement);
    }

    /// Source-of-file statement: "available on the internet" with the
    /// described-at URL and the operator of the hosting platform.
    pub fn source_statement(&mut self, url: &str, operator: &str) {
        if self.index.has(properties::SOURCE_OF_FILE) {
            return;
        }

        let mut statement = Statement::new(Snak::item(
            properties::SOURCE_OF_FILE,
            entities::FILE_AVAILABLE_ON_INTERNET,
        ));
        statement.add_qualifier(Snak::string(properties::DESCRIBED_AT_URL, url));
        statement.add_qualifier(Snak::item(properties::OPERATOR, operator));

        self.hooks.on_build_source(&mut statement);
        self.statements.push(statement);
    }

    /// Camera location. `(0, 0)` is the platforms' null-island sentinel
    /// for "no location" and never produces a statement; an accuracy
    /// level outside the mapping table drops this statement only.
    pub fn location_statement(&mut self, location: &CameraLocation) {
        if self.index.has(properties::COORDINATES_OF_POINT_OF_VIEW) {
            return;
        }

        if location.latitude == 0.0 && location.longitude == 0.0 {
            tracing::debug!("Suppressing null-island coordinates");
            return;
        }

        let Some(precision) = precision_for_accuracy(location.accuracy) else {
            tracing::error!(
                accuracy = location.accuracy,
                "Unrecognised location accuracy, dropping the coordinate statement"
            );
            return;
        };

        self.statements.push(Statement::new(Snak::coordinate(
            properties::COORDINATES_OF_POINT_OF_VIEW,
            location.latitude,
            location.longitude,
            precision,
        )));
    }

    /// Capture-date statement from a granularity-coded date.
    pub fn inception_statement(&mut self, capture: &CaptureDate) {
        let (precision, circa) = match capture.granularity {
            DateGranularity::Second => (PRECISION_DAY, false),
            DateGranularity::Month => (PRECISION_MONTH, false),
            DateGranularity::Year => (PRECISION_YEAR, false),
            DateGranularity::Approximate => (PRECISION_YEAR, true),
        };

        self.inception_with_precision(capture.date, precision, circa);
    }

    /// Capture-date statement from explicit parts, for sources that carry
    /// a textual date rather than a granularity code.
    pub fn inception_with_precision(&mut self, date: NaiveDate, precision: u8, circa: bool) {
        if self.index.has(properties::INCEPTION) {
            return;
        }

        let time = TimeValue::from_date(date.year(), date.month(), date.day(), precision);
        let mut statement = Statement::new(Snak::time(properties::INCEPTION, time));

        if circa {
            statement.add_qualifier(Snak::item(
                properties::SOURCING_CIRCUMSTANCES,
                entities::CIRCA,
            ));
        }

        self.statements.push(statement);
    }

    /// Published-in statement pointing at the platform item, with a
    /// day-precision publication-date qualifier when a timestamp exists.
    pub fn published_in_statement(&mut self, platform: &str, published: Option<NaiveDate>) {
        if self.index.has(properties::PUBLISHED_IN) {
            return;
        }

        let mut statement = Statement::new(Snak::item(properties::PUBLISHED_IN, platform));

        if let Some(date) = published {
            let time = TimeValue::from_date(date.year(), date.month(), date.day(), PRECISION_DAY);
            statement.add_qualifier(Snak::time(properties::PUBLICATION_DATE, time));
        }

        self.statements.push(statement);
    }

    /// Depicts statement for a resolved item, if any.
    pub fn depicts_statement(&mut self, item: Option<&str>) {
        if self.index.has(properties::DEPICTS) {
            return;
        }

        let Some(item) = item else {
            return;
        };

        let mut statement = Statement::new(Snak::item(properties::DEPICTS, item));
        self.hooks.on_build_depicts(&mut statement);
        self.statements.push(statement);
    }

    /// Qualifier-completion pass on the copyright-license statement.
    ///
    /// Applies only when the record already carries exactly one license
    /// statement: missing title and author-name qualifiers are added and
    /// the statement is re-submitted under its existing id. A title with
    /// no detectable language is skipped; the author qualifier is still
    /// added. This is the sole place the pipeline touches a pre-existing
    /// statement.
    pub fn complete_license_qualifiers(
        &mut self,
        title: Option<(&str, &str)>,
        author_name: &str,
    ) {
        let Some(mut statement) = self.index.single(properties::COPYRIGHT_LICENSE) else {
            return;
        };

        let mut edited = false;

        if !statement.has_qualifier(properties::TITLE) {
            if let Some((text, language)) = title {
                statement.add_qualifier(Snak::monolingual(properties::TITLE, text, language));
                edited = true;
            }
        }

        if !statement.has_qualifier(properties::AUTHOR_NAME_STRING) {
            statement.add_qualifier(Snak::string(properties::AUTHOR_NAME_STRING, author_name));
            edited = true;
        }

        if edited {
            self.statements.push(statement);
        }
    }

    /// The accumulated delta.
    pub fn finish(self) -> Vec<Statement> {
        self.statements
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{DataValue, SnakType};
    use serde_json::json;

    fn empty_index() -> StatementIndex {
        StatementIndex::empty()
    }

    fn creator() -> Creator {
        Creator {
            display_name: " Ada Example ".to_string(),
            profile_url: Some("https://example.org/people/ada/".to_string()),
            item: None,
        }
    }

    #[test]
    fn test_id_statement_suppressed_when_property_present() {
        let index = StatementIndex::from_json(json!({"P1651": [{}]}));
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.id_statement("P1651", "abc");
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_creator_unknown_value_with_trimmed_name() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.creator_statement(&creator());

        let statements = builder.finish();
        assert_eq!(statements.len(), 1);
        let statement = &statements[0];

        assert_eq!(statement.mainsnak.snaktype, SnakType::SomeValue);
        assert_eq!(
            statement.qualifiers[properties::AUTHOR_NAME_STRING][0].datavalue,
            Some(DataValue::String("Ada Example".to_string()))
        );
        assert!(statement.has_qualifier(properties::URL));
    }

    #[test]
    fn test_creator_resolved_item_becomes_main_value() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.creator_statement(&Creator {
            item: Some("Q42".to_string()),
            ..creator()
        });

        let statements = builder.finish();
        assert_eq!(statements[0].mainsnak.snaktype, SnakType::Value);
        assert_eq!(
            statements[0].mainsnak.datavalue,
            Some(DataValue::EntityId(crate::statement::EntityIdValue {
                entity_type: "item".to_string(),
                numeric_id: Some(42),
                id: "Q42".to_string(),
            }))
        );
    }

    #[test]
    fn test_creator_hook_runs() {
        struct UserIdHook;
        impl StatementHooks for UserIdHook {
            fn on_build_creator(&self, statement: &mut Statement) {
                statement.add_qualifier(Snak::string(properties::FLICKR_USER_ID, "12037949754@N01"));
            }
        }

        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &UserIdHook);
        builder.creator_statement(&creator());

        let statements = builder.finish();
        assert!(statements[0].has_qualifier(properties::FLICKR_USER_ID));
        // Hook qualifiers come after the common ones.
        assert_eq!(
            statements[0].qualifiers_order.last().map(String::as_str),
            Some(properties::FLICKR_USER_ID)
        );
    }

    #[test]
    fn test_location_precision_table_ends() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.location_statement(&CameraLocation {
            latitude: 51.5,
            longitude: -0.1,
            accuracy: 16,
        });

        let statements = builder.finish();
        match &statements[0].mainsnak.datavalue {
            Some(DataValue::GlobeCoordinate(value)) => assert_eq!(value.precision, 1e-05),
            other => panic!("unexpected datavalue: {:?}", other),
        }

        assert_eq!(precision_for_accuracy(1), Some(0.1));
        assert_eq!(precision_for_accuracy(10), Some(0.001));
        assert_eq!(precision_for_accuracy(0), None);
        assert_eq!(precision_for_accuracy(17), None);
    }

    #[test]
    fn test_location_unknown_accuracy_drops_statement() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.location_statement(&CameraLocation {
            latitude: 51.5,
            longitude: -0.1,
            accuracy: 17,
        });
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_location_null_island_suppressed() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.location_statement(&CameraLocation {
            latitude: 0.0,
            longitude: 0.0,
            accuracy: 16,
        });
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_inception_year_granularity_zeroes_month_and_day() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.inception_statement(&CaptureDate {
            date: NaiveDate::from_ymd_opt(2014, 5, 17).unwrap(),
            granularity: DateGranularity::Year,
        });

        let statements = builder.finish();
        match &statements[0].mainsnak.datavalue {
            Some(DataValue::Time(value)) => {
                assert_eq!(value.time, "+2014-00-00T00:00:00Z");
                assert_eq!(value.precision, PRECISION_YEAR);
            }
            other => panic!("unexpected datavalue: {:?}", other),
        }
        assert!(!statements[0].has_qualifier(properties::SOURCING_CIRCUMSTANCES));
    }

    #[test]
    fn test_inception_approximate_gets_circa_qualifier() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.inception_statement(&CaptureDate {
            date: NaiveDate::from_ymd_opt(1941, 1, 1).unwrap(),
            granularity: DateGranularity::Approximate,
        });

        let statements = builder.finish();
        let qualifier = &statements[0].qualifiers[properties::SOURCING_CIRCUMSTANCES][0];
        assert_eq!(
            qualifier.datavalue,
            Some(DataValue::EntityId(crate::statement::EntityIdValue {
                entity_type: "item".to_string(),
                numeric_id: Some(5727902),
                id: entities::CIRCA.to_string(),
            }))
        );
    }

    #[test]
    fn test_inception_second_granularity_keeps_day() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.inception_statement(&CaptureDate {
            date: NaiveDate::from_ymd_opt(2004, 11, 19).unwrap(),
            granularity: DateGranularity::Second,
        });

        let statements = builder.finish();
        match &statements[0].mainsnak.datavalue {
            Some(DataValue::Time(value)) => {
                assert_eq!(value.time, "+2004-11-19T00:00:00Z");
                assert_eq!(value.precision, PRECISION_DAY);
            }
            other => panic!("unexpected datavalue: {:?}", other),
        }
    }

    #[test]
    fn test_published_in_with_and_without_date() {
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.published_in_statement(
            entities::FLICKR,
            Some(NaiveDate::from_ymd_opt(2004, 11, 19).unwrap()),
        );

        let statements = builder.finish();
        assert!(statements[0].has_qualifier(properties::PUBLICATION_DATE));

        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.published_in_statement(entities::YOUTUBE, None);
        let statements = builder.finish();
        assert!(!statements[0].has_qualifier(properties::PUBLICATION_DATE));
    }

    #[test]
    fn test_depicts_hook_adds_reference() {
        struct StatedInHook;
        impl StatementHooks for StatedInHook {
            fn on_build_depicts(&self, statement: &mut Statement) {
                statement.add_reference(vec![Snak::item(
                    properties::STATED_IN,
                    entities::INATURALIST,
                )]);
            }
        }

        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &StatedInHook);
        builder.depicts_statement(Some("Q158942"));

        let statements = builder.finish();
        assert_eq!(statements[0].references.len(), 1);
        assert_eq!(
            statements[0].references[0].snaks_order,
            vec![properties::STATED_IN.to_string()]
        );

        // No item, no statement.
        let index = empty_index();
        let mut builder = StatementBuilder::new(&index, &StatedInHook);
        builder.depicts_statement(None);
        assert!(builder.finish().is_empty());
    }

    fn license_statement(qualifiers: serde_json::Value) -> serde_json::Value {
        let order: Vec<String> = qualifiers
            .as_object()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        json!({
            "mainsnak": {
                "snaktype": "value",
                "property": "P275",
                "datavalue": {
                    "value": {"entity-type": "item", "numeric-id": 20007257, "id": "Q20007257"},
                    "type": "wikibase-entityid"
                }
            },
            "type": "statement",
            "rank": "normal",
            "qualifiers": qualifiers,
            "qualifiers-order": order,
            "id": "M77$0000-1111"
        })
    }

    #[test]
    fn test_license_completion_adds_missing_qualifiers() {
        let index =
            StatementIndex::from_json(json!({"P275": [license_statement(json!({}))]}));
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.complete_license_qualifiers(Some(("A video title", "en")), "Some Channel");

        let statements = builder.finish();
        assert_eq!(statements.len(), 1);
        let statement = &statements[0];
        assert_eq!(statement.id.as_deref(), Some("M77$0000-1111"));
        assert!(statement.has_qualifier(properties::TITLE));
        assert!(statement.has_qualifier(properties::AUTHOR_NAME_STRING));
    }

    #[test]
    fn test_license_completion_skips_title_without_language() {
        let index =
            StatementIndex::from_json(json!({"P275": [license_statement(json!({}))]}));
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.complete_license_qualifiers(None, "Some Channel");

        let statements = builder.finish();
        assert!(!statements[0].has_qualifier(properties::TITLE));
        assert!(statements[0].has_qualifier(properties::AUTHOR_NAME_STRING));
    }

    #[test]
    fn test_license_completion_noop_when_qualifiers_present() {
        let qualifiers = json!({
            "P1476": [{"snaktype": "value", "property": "P1476",
                       "datavalue": {"value": {"text": "t", "language": "en"}, "type": "monolingualtext"}}],
            "P2093": [{"snaktype": "value", "property": "P2093",
                       "datavalue": {"value": "someone", "type": "string"}}]
        });
        let index =
            StatementIndex::from_json(json!({"P275": [license_statement(qualifiers)]}));
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.complete_license_qualifiers(Some(("t2", "en")), "someone else");
        assert!(builder.finish().is_empty());
    }

    #[test]
    fn test_license_completion_requires_exactly_one_statement() {
        let statement = license_statement(json!({}));
        let index = StatementIndex::from_json(
            json!({"P275": [statement.clone(), statement]}),
        );
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.complete_license_qualifiers(Some(("t", "en")), "author");
        assert!(builder.finish().is_empty());

        let index = StatementIndex::empty();
        let mut builder = StatementBuilder::new(&index, &NoHooks);
        builder.complete_license_qualifiers(Some(("t", "en")), "author");
        assert!(builder.finish().is_empty());
    }
}

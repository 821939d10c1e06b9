//! End-to-end tests for the USACE bot
//!
//! Runs the bot through the shared pipeline against fakes and checks
//! the inception and source statements, the uploader pre-gate and the
//! settling of records whose description fields are unusable.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use sdcbot_common::cache::{record_key, MemorySkipCache, SkipCache};
use sdcbot_common::pipeline::{BotRunner, RunOptions};
use sdcbot_common::resolver::ItemResolver;
use sdcbot_common::statement::{DataValue, PRECISION_DAY, PRECISION_MONTH, PRECISION_YEAR};
use sdcbot_common::testing::{FakeCommons, FakeWikidata, Submission};
use sdcbot_common::wikidata::{entities, properties};

use sdcbot_usace::UsaceBot;

const SOURCE_URL: &str = "https://usace.contentdm.oclc.org/digital/collection/p16021coll2/id/2653";

struct Harness {
    commons: Arc<FakeCommons>,
    cache: Arc<MemorySkipCache>,
}

impl Harness {
    fn new() -> Self {
        Harness {
            commons: Arc::new(FakeCommons::new()),
            cache: Arc::new(MemorySkipCache::new()),
        }
    }

    /// One record uploaded by the transfer account.
    fn seed_transfer(&self, pageid: u64, title: &str, wikitext: &str) {
        self.commons.add_file(pageid, title);
        self.commons.set_uploader(title, "CuratorBot");
        self.commons.set_wikitext(title, wikitext);
    }

    async fn run(&self) -> Vec<Submission> {
        let bot = UsaceBot::new();
        let runner = BotRunner::new(
            self.commons.clone(),
            self.cache.clone(),
            Arc::new(ItemResolver::new(Arc::new(FakeWikidata::new()))),
            RunOptions {
                dry_run: false,
                limit: None,
                delay: Duration::from_millis(0),
            },
        );
        runner.run(&bot).await.unwrap();
        self.commons.submissions()
    }
}

fn properties_of(submission: &Submission) -> Vec<String> {
    submission
        .statements
        .iter()
        .map(|s| s.property().to_string())
        .collect()
}

#[tokio::test]
async fn test_transferred_record_gets_inception_and_source() {
    let h = Harness::new();
    h.seed_transfer(
        501,
        "File:Fort Peck spillway.jpg",
        &format!(
            "{{{{Photograph\n|photographer=US Army Corps of Engineers\n\
             |title=Construction of the Fort Peck spillway\n\
             |date=1943-05-21\n|source={}\n}}}}",
            SOURCE_URL
        ),
    );

    let submissions = h.run().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].mid, "M501");
    assert!(submissions[0].summary.contains("Task #3"));
    assert_eq!(
        properties_of(&submissions[0]),
        vec![
            properties::INCEPTION.to_string(),
            properties::SOURCE_OF_FILE.to_string()
        ]
    );

    let inception = &submissions[0].statements[0];
    match &inception.mainsnak.datavalue {
        Some(DataValue::Time(value)) => {
            assert_eq!(value.time, "+1943-05-21T00:00:00Z");
            assert_eq!(value.precision, PRECISION_DAY);
        }
        other => panic!("unexpected datavalue: {:?}", other),
    }
    assert!(!inception.has_qualifier(properties::SOURCING_CIRCUMSTANCES));

    let source = &submissions[0].statements[1];
    match &source.mainsnak.datavalue {
        Some(DataValue::EntityId(value)) => {
            assert_eq!(value.id, entities::FILE_AVAILABLE_ON_INTERNET);
        }
        other => panic!("unexpected datavalue: {:?}", other),
    }
    assert_eq!(
        source.qualifiers[properties::DESCRIBED_AT_URL][0].datavalue,
        Some(DataValue::String(SOURCE_URL.to_string()))
    );
    match &source.qualifiers[properties::OPERATOR][0].datavalue {
        Some(DataValue::EntityId(value)) => assert_eq!(value.id, entities::USACE),
        other => panic!("unexpected datavalue: {:?}", other),
    }

    // The edit settles the record for future runs.
    assert!(h
        .cache
        .is_marked(&record_key("usace", "M501"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_circa_date_keeps_precision_and_adds_the_qualifier() {
    let h = Harness::new();
    h.seed_transfer(
        502,
        "File:Old lock.jpg",
        "{{Photograph|date={{complex date|ca|1910-06}}|source=}}",
    );

    let submissions = h.run().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        properties_of(&submissions[0]),
        vec![properties::INCEPTION.to_string()]
    );

    let inception = &submissions[0].statements[0];
    match &inception.mainsnak.datavalue {
        Some(DataValue::Time(value)) => {
            assert_eq!(value.time, "+1910-06-00T00:00:00Z");
            assert_eq!(value.precision, PRECISION_MONTH);
        }
        other => panic!("unexpected datavalue: {:?}", other),
    }
    match &inception.qualifiers[properties::SOURCING_CIRCUMSTANCES][0].datavalue {
        Some(DataValue::EntityId(value)) => assert_eq!(value.id, entities::CIRCA),
        other => panic!("unexpected datavalue: {:?}", other),
    }
}

#[tokio::test]
async fn test_book_template_and_year_date_are_accepted() {
    let h = Harness::new();
    h.seed_transfer(
        503,
        "File:Annual report.pdf",
        &format!("{{{{Book|title=Annual report|date=1936|source={}}}}}", SOURCE_URL),
    );

    let submissions = h.run().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].statements.len(), 2);

    match &submissions[0].statements[0].mainsnak.datavalue {
        Some(DataValue::Time(value)) => {
            assert_eq!(value.time, "+1936-00-00T00:00:00Z");
            assert_eq!(value.precision, PRECISION_YEAR);
        }
        other => panic!("unexpected datavalue: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_date_still_writes_the_source() {
    let h = Harness::new();
    h.seed_transfer(
        504,
        "File:Undated.jpg",
        &format!("{{{{Photograph|source={}}}}}", SOURCE_URL),
    );

    let submissions = h.run().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        properties_of(&submissions[0]),
        vec![properties::SOURCE_OF_FILE.to_string()]
    );
}

#[tokio::test]
async fn test_unusable_fields_settle_the_record() {
    let h = Harness::new();
    h.seed_transfer(
        505,
        "File:Vague.jpg",
        "{{Photograph|date=sometime in 1944|source=https://example.org/elsewhere}}",
    );

    let submissions = h.run().await;
    assert!(submissions.is_empty());
    assert!(h
        .cache
        .is_marked(&record_key("usace", "M505"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_hand_uploaded_file_is_left_alone() {
    let h = Harness::new();
    h.commons.add_file(506, "File:Hand upload.jpg");
    h.commons.set_uploader("File:Hand upload.jpg", "Lt. Col. Example");
    h.commons.set_wikitext(
        "File:Hand upload.jpg",
        &format!("{{{{Photograph|date=1943|source={}}}}}", SOURCE_URL),
    );

    let submissions = h.run().await;
    assert!(submissions.is_empty());
    assert!(!h
        .cache
        .is_marked(&record_key("usace", "M506"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_record_without_metadata_template_is_settled() {
    let h = Harness::new();
    h.seed_transfer(
        507,
        "File:Plain description.jpg",
        "{{Information|description=A dam somewhere}}",
    );

    let submissions = h.run().await;
    assert!(submissions.is_empty());
    assert!(h
        .cache
        .is_marked(&record_key("usace", "M507"))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_existing_inception_suppresses_only_itself() {
    let h = Harness::new();
    h.seed_transfer(
        508,
        "File:Half done.jpg",
        &format!("{{{{Photograph|date=1943-05-21|source={}}}}}", SOURCE_URL),
    );
    h.commons.set_statements("M508", json!({ "P571": [{}] }));

    let submissions = h.run().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(
        properties_of(&submissions[0]),
        vec![properties::SOURCE_OF_FILE.to_string()]
    );
}

//! In-memory test doubles for the API clients
//!
//! The bot crates exercise their treatment logic against these fakes
//! instead of the network. Seed them with pages and platform data, run
//! the bot, then inspect what would have been submitted.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::commons::{CommonsApi, SearchHit};
use crate::error::{Error, Result};
use crate::statement::{Statement, StatementIndex};
use crate::wikidata::WikidataApi;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// Knowledge base fake
// ============================================================================

/// Scriptable [`CommonsApi`] double.
#[derive(Default)]
pub struct FakeCommons {
    hits: Mutex<Vec<SearchHit>>,
    wikitexts: Mutex<HashMap<String, String>>,
    categories: Mutex<HashMap<String, Vec<String>>>,
    contributors: Mutex<HashMap<String, Vec<String>>>,
    uploaders: Mutex<HashMap<String, String>>,
    sha1s: Mutex<HashMap<String, String>>,
    statements: Mutex<HashMap<String, serde_json::Value>>,
    submissions: Mutex<Vec<Submission>>,
    fail_submissions: AtomicBool,
    username: String,
}

/// One recorded call to `submit_statements`.
#[derive(Debug, Clone)]
pub struct Submission {
    pub mid: String,
    pub statements: Vec<Statement>,
    pub summary: String,
}

impl FakeCommons {
    pub fn new() -> Self {
        FakeCommons {
            username: "TestBot".to_string(),
            ..FakeCommons::default()
        }
    }

    pub fn with_username(username: &str) -> Self {
        FakeCommons {
            username: username.to_string(),
            ..FakeCommons::default()
        }
    }

    /// Add a file returned by every listing call.
    pub fn add_file(&self, pageid: u64, title: &str) {
        lock(&self.hits).push(SearchHit {
            pageid,
            title: title.to_string(),
        });
    }

    pub fn set_wikitext(&self, title: &str, text: &str) {
        lock(&self.wikitexts).insert(title.to_string(), text.to_string());
    }

    pub fn set_categories(&self, title: &str, categories: &[&str]) {
        lock(&self.categories).insert(
            title.to_string(),
            categories.iter().map(|c| c.to_string()).collect(),
        );
    }

    pub fn set_contributors(&self, title: &str, names: &[&str]) {
        lock(&self.contributors).insert(
            title.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
    }

    pub fn set_uploader(&self, title: &str, name: &str) {
        lock(&self.uploaders).insert(title.to_string(), name.to_string());
    }

    pub fn set_sha1(&self, title: &str, sha1: &str) {
        lock(&self.sha1s).insert(title.to_string(), sha1.to_string());
    }

    /// Seed the existing statements of a media entity, in API JSON shape.
    pub fn set_statements(&self, mid: &str, statements: serde_json::Value) {
        lock(&self.statements).insert(mid.to_string(), statements);
    }

    /// Make every submission fail with an API error.
    pub fn fail_submissions(&self) {
        self.fail_submissions.store(true, Ordering::SeqCst);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        lock(&self.submissions).clone()
    }
}

#[async_trait]
impl CommonsApi for FakeCommons {
    async fn search_files(&self, _query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let hits = lock(&self.hits);
        Ok(hits
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn category_members(
        &self,
        _category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.search_files("", limit).await
    }

    async fn wikitext(&self, title: &str) -> Result<String> {
        lock(&self.wikitexts)
            .get(title)
            .cloned()
            .ok_or_else(|| Error::NotFound(title.to_string()))
    }

    async fn categories(&self, title: &str) -> Result<Vec<String>> {
        Ok(lock(&self.categories).get(title).cloned().unwrap_or_default())
    }

    async fn contributors(&self, title: &str) -> Result<Vec<String>> {
        Ok(lock(&self.contributors)
            .get(title)
            .cloned()
            .unwrap_or_default())
    }

    async fn first_uploader(&self, title: &str) -> Result<Option<String>> {
        Ok(lock(&self.uploaders).get(title).cloned())
    }

    async fn file_sha1(&self, title: &str) -> Result<Option<String>> {
        Ok(lock(&self.sha1s).get(title).cloned())
    }

    async fn statements(&self, mid: &str) -> Result<StatementIndex> {
        let stored = lock(&self.statements).get(mid).cloned();
        Ok(stored.map(StatementIndex::from_json).unwrap_or_default())
    }

    async fn submit_statements(
        &self,
        mid: &str,
        statements: &[Statement],
        summary: &str,
    ) -> Result<()> {
        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(Error::Api {
                code: "maxlag".to_string(),
                info: "Waiting for replication".to_string(),
            });
        }

        lock(&self.submissions).push(Submission {
            mid: mid.to_string(),
            statements: statements.to_vec(),
            summary: summary.to_string(),
        });
        Ok(())
    }

    fn username(&self) -> &str {
        &self.username
    }
}

// ============================================================================
// Item lookup fake
// ============================================================================

/// Scriptable [`WikidataApi`] double with a call counter.
#[derive(Default)]
pub struct FakeWikidata {
    responses: Mutex<HashMap<String, Vec<String>>>,
    calls: AtomicUsize,
}

impl FakeWikidata {
    pub fn new() -> Self {
        FakeWikidata::default()
    }

    pub fn set(&self, property: &str, value: &str, items: &[&str]) {
        lock(&self.responses).insert(
            format!("{}:{}", property, value),
            items.iter().map(|i| i.to_string()).collect(),
        );
    }

    /// Number of lookups that reached this fake.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WikidataApi for FakeWikidata {
    async fn items_with_external_id(&self, property: &str, value: &str) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(lock(&self.responses)
            .get(&format!("{}:{}", property, value))
            .cloned()
            .unwrap_or_default())
    }
}

//! Wikimedia Commons Action API client
//!
//! One client per run: logs in with a bot password, keeps session cookies
//! in the HTTP client's jar, caches the CSRF token and refreshes it once
//! when the API rejects it. All structured-data edits go through
//! [`CommonsApi::submit_statements`], which tags them and asserts bot
//! rights.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::statement::{Statement, StatementIndex};

/// Production API endpoint.
pub const COMMONS_API_URL: &str = "https://commons.wikimedia.org/w/api.php";

/// Change tag applied to every edit.
const EDIT_TAG: &str = "BotSDC";

/// A file found by a search or category listing.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub pageid: u64,
    pub title: String,
}

/// The knowledge-base operations the bots need.
#[async_trait]
pub trait CommonsApi: Send + Sync {
    /// Files matching a CirrusSearch query, in namespace 6.
    async fn search_files(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>>;

    /// Files in a category. `category` is the bare name, without the
    /// namespace prefix.
    async fn category_members(&self, category: &str, limit: Option<usize>)
        -> Result<Vec<SearchHit>>;

    /// Current wikitext of a page.
    async fn wikitext(&self, title: &str) -> Result<String>;

    /// Category names (without namespace prefix) the page is in.
    async fn categories(&self, title: &str) -> Result<Vec<String>>;

    /// Usernames that have edited the page.
    async fn contributors(&self, title: &str) -> Result<Vec<String>>;

    /// Username that made the page's first revision.
    async fn first_uploader(&self, title: &str) -> Result<Option<String>>;

    /// SHA-1 of the current file revision, lowercase hex.
    async fn file_sha1(&self, title: &str) -> Result<Option<String>>;

    /// Existing structured-data statements of a media entity.
    async fn statements(&self, mid: &str) -> Result<StatementIndex>;

    /// Append statements to a media entity in one edit.
    async fn submit_statements(
        &self,
        mid: &str,
        statements: &[Statement],
        summary: &str,
    ) -> Result<()>;

    /// Account name this client operates as.
    fn username(&self) -> &str;
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct PagesResponse {
    query: Option<Pages>,
}

#[derive(Debug, Deserialize)]
struct Pages {
    #[serde(default)]
    pages: Vec<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    revisions: Vec<Revision>,
    #[serde(default)]
    categories: Vec<TitledEntry>,
    #[serde(default)]
    contributors: Vec<NamedEntry>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize)]
struct Revision {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    slots: Option<Slots>,
}

#[derive(Debug, Deserialize)]
struct Slots {
    main: SlotContent,
}

#[derive(Debug, Deserialize)]
struct SlotContent {
    content: String,
}

#[derive(Debug, Deserialize)]
struct TitledEntry {
    title: String,
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ImageInfo {
    sha1: String,
}

// ============================================================================
// Client
// ============================================================================

/// Authenticated Action API client.
pub struct CommonsClient {
    http_client: reqwest::Client,
    api_url: String,
    username: String,
    csrf: RwLock<Option<String>>,
}

impl CommonsClient {
    pub fn new(api_url: &str, username: &str, user_agent: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(CommonsClient {
            http_client,
            api_url: api_url.to_string(),
            username: username.to_string(),
            csrf: RwLock::new(None),
        })
    }

    /// Log in with a bot password. Session cookies land in the client's
    /// jar; the CSRF token is fetched lazily on the first edit.
    pub async fn login(&self, password: &str) -> Result<()> {
        let value = self
            .get(&params(&[
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "login"),
            ]))
            .await?;

        let token = value
            .pointer("/query/tokens/logintoken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth("login token missing from response".into()))?
            .to_string();

        let mut form = params(&[("action", "login")]);
        form.push(("lgname".to_string(), self.username.clone()));
        form.push(("lgpassword".to_string(), password.to_string()));
        form.push(("lgtoken".to_string(), token));

        let value = self.post(&form).await?;
        let result = value
            .pointer("/login/result")
            .and_then(Value::as_str)
            .unwrap_or("");

        if result != "Success" {
            let reason = value
                .pointer("/login/reason")
                .and_then(Value::as_str)
                .unwrap_or(result);
            return Err(Error::Auth(format!("login failed: {}", reason)));
        }

        info!(username = %self.username, "Logged in");
        Ok(())
    }

    async fn get(&self, query: &[(String, String)]) -> Result<Value> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(query)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn post(&self, form: &[(String, String)]) -> Result<Value> {
        let response = self
            .http_client
            .post(&self.api_url)
            .form(form)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                code: status.as_u16().to_string(),
                info: response.text().await.unwrap_or_default(),
            });
        }

        let value: Value = response.json().await?;
        check_api_error(&value)?;
        Ok(value)
    }

    /// Cached CSRF token, fetching one on first use.
    async fn csrf_token(&self) -> Result<String> {
        {
            let cached = self.csrf.read().await;
            if let Some(token) = cached.as_ref() {
                return Ok(token.clone());
            }
        }

        let value = self
            .get(&params(&[
                ("action", "query"),
                ("meta", "tokens"),
                ("type", "csrf"),
            ]))
            .await?;

        let token = value
            .pointer("/query/tokens/csrftoken")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Auth("CSRF token missing from response".into()))?
            .to_string();

        *self.csrf.write().await = Some(token.clone());
        Ok(token)
    }

    async fn clear_csrf_token(&self) {
        *self.csrf.write().await = None;
    }

    /// One page-prop query; errors if the page does not exist.
    async fn page_query(&self, title: &str, extra: &[(&str, &str)]) -> Result<PageInfo> {
        let mut query = params(&[("action", "query")]);
        query.push(("titles".to_string(), title.to_string()));
        query.extend(params(extra));

        let value = self.get(&query).await?;
        let response: PagesResponse = serde_json::from_value(value)?;

        let page = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or_else(|| Error::NotFound(title.to_string()))?;

        if page.missing {
            return Err(Error::NotFound(title.to_string()));
        }

        Ok(page)
    }

    /// One batched list query, following continuation until `limit` hits
    /// are collected or the listing is exhausted.
    async fn list_query(
        &self,
        base: Vec<(String, String)>,
        result_pointer: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut continuation: Vec<(String, String)> = Vec::new();

        loop {
            let mut query = base.clone();
            query.extend(continuation.iter().cloned());

            let value = self.get(&query).await?;

            let batch: Vec<SearchHit> = value
                .pointer(result_pointer)
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();

            debug!(batch = batch.len(), total = hits.len(), "Listing batch");
            hits.extend(batch);

            if let Some(limit) = limit {
                if hits.len() >= limit {
                    hits.truncate(limit);
                    break;
                }
            }

            continuation = continuation_params(&value);
            if continuation.is_empty() {
                break;
            }
        }

        Ok(hits)
    }

    async fn edit_entity(&self, mid: &str, data: &str, summary: &str) -> Result<()> {
        let token = self.csrf_token().await?;

        let mut form = params(&[
            ("action", "wbeditentity"),
            ("tags", EDIT_TAG),
            ("bot", "1"),
            ("maxlag", "5"),
        ]);
        form.push(("id".to_string(), mid.to_string()));
        form.push(("data".to_string(), data.to_string()));
        form.push(("summary".to_string(), summary.to_string()));
        form.push(("token".to_string(), token));

        let value = self.post(&form).await?;

        if value.get("success").and_then(Value::as_i64) != Some(1) {
            return Err(Error::Api {
                code: "editfailed".to_string(),
                info: format!("wbeditentity returned no success flag for {}", mid),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl CommonsApi for CommonsClient {
    async fn search_files(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let mut base = params(&[
            ("action", "query"),
            ("list", "search"),
            ("srnamespace", "6"),
            ("srlimit", "max"),
        ]);
        base.push(("srsearch".to_string(), query.to_string()));

        self.list_query(base, "/query/search", limit).await
    }

    async fn category_members(
        &self,
        category: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        let mut base = params(&[
            ("action", "query"),
            ("list", "categorymembers"),
            ("cmtype", "file"),
            ("cmlimit", "max"),
        ]);
        base.push(("cmtitle".to_string(), format!("Category:{}", category)));

        self.list_query(base, "/query/categorymembers", limit).await
    }

    async fn wikitext(&self, title: &str) -> Result<String> {
        let page = self
            .page_query(
                title,
                &[
                    ("prop", "revisions"),
                    ("rvprop", "content"),
                    ("rvslots", "main"),
                    ("rvlimit", "1"),
                ],
            )
            .await?;

        page.revisions
            .into_iter()
            .next()
            .and_then(|r| r.slots)
            .map(|s| s.main.content)
            .ok_or_else(|| Error::NotFound(format!("{} has no readable revision", title)))
    }

    async fn categories(&self, title: &str) -> Result<Vec<String>> {
        let page = self
            .page_query(title, &[("prop", "categories"), ("cllimit", "max")])
            .await?;

        Ok(page
            .categories
            .into_iter()
            .map(|c| {
                c.title
                    .strip_prefix("Category:")
                    .map(str::to_string)
                    .unwrap_or(c.title)
            })
            .collect())
    }

    async fn contributors(&self, title: &str) -> Result<Vec<String>> {
        let page = self
            .page_query(title, &[("prop", "contributors"), ("pclimit", "max")])
            .await?;

        Ok(page.contributors.into_iter().map(|c| c.name).collect())
    }

    async fn first_uploader(&self, title: &str) -> Result<Option<String>> {
        let page = self
            .page_query(
                title,
                &[
                    ("prop", "revisions"),
                    ("rvprop", "user"),
                    ("rvdir", "newer"),
                    ("rvlimit", "1"),
                ],
            )
            .await?;

        Ok(page.revisions.into_iter().next().and_then(|r| r.user))
    }

    async fn file_sha1(&self, title: &str) -> Result<Option<String>> {
        let page = self
            .page_query(title, &[("prop", "imageinfo"), ("iiprop", "sha1")])
            .await?;

        Ok(page.imageinfo.into_iter().next().map(|i| i.sha1))
    }

    async fn statements(&self, mid: &str) -> Result<StatementIndex> {
        let mut query = params(&[("action", "wbgetentities")]);
        query.push(("ids".to_string(), mid.to_string()));

        let value = self.get(&query).await?;
        entity_statements(&value, mid)
    }

    async fn submit_statements(
        &self,
        mid: &str,
        statements: &[Statement],
        summary: &str,
    ) -> Result<()> {
        if statements.is_empty() {
            info!(mid, "No statements to submit");
            return Ok(());
        }

        let data = serde_json::to_string(&serde_json::json!({ "claims": statements }))?;
        debug!(mid, delta = %data, "Submitting statements");

        let start = Instant::now();
        if let Err(err) = self.edit_entity(mid, &data, summary).await {
            match err {
                Error::Api { ref code, .. } if code == "badtoken" => {
                    debug!("CSRF token rejected, fetching a fresh one");
                    self.clear_csrf_token().await;
                    self.edit_entity(mid, &data, summary).await?;
                }
                other => return Err(other),
            }
        }

        info!(
            mid,
            statements = statements.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Updated entity"
        );
        Ok(())
    }

    fn username(&self) -> &str {
        &self.username
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Static parameter pairs plus the JSON envelope every call wants.
fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if pairs.iter().any(|(k, _)| *k == "action") {
        out.push(("format".to_string(), "json".to_string()));
        out.push(("formatversion".to_string(), "2".to_string()));
    }

    out
}

/// Error envelope check; the API replaces the whole body on failure.
fn check_api_error(value: &Value) -> Result<()> {
    if let Some(error) = value.get("error") {
        return Err(Error::Api {
            code: error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            info: error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    Ok(())
}

/// Continuation parameters to echo back, empty when the listing is done.
fn continuation_params(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();

    if let Some(Value::Object(map)) = value.get("continue") {
        for (key, val) in map {
            let val = match val {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push((key.clone(), val));
        }
    }

    out
}

/// Statements of one entity out of a `wbgetentities` response. An entity
/// that exists but has no structured data comes back with its statements
/// absent or as `[]`; both yield an empty index.
fn entity_statements(value: &Value, mid: &str) -> Result<StatementIndex> {
    let entity = value
        .pointer(&format!("/entities/{}", mid))
        .ok_or_else(|| Error::NotFound(mid.to_string()))?;

    if entity.get("missing").is_some() {
        return Err(Error::NotFound(mid.to_string()));
    }

    let statements = entity.get("statements").cloned().unwrap_or(Value::Null);
    Ok(StatementIndex::from_json(statements))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = CommonsClient::new(COMMONS_API_URL, "ExampleBot", "ExampleBot / test");
        assert!(client.is_ok());
        assert_eq!(client.unwrap().username(), "ExampleBot");
    }

    #[test]
    fn test_params_add_json_envelope_for_actions() {
        let with_action = params(&[("action", "query"), ("meta", "tokens")]);
        assert!(with_action.contains(&("format".to_string(), "json".to_string())));
        assert!(with_action.contains(&("formatversion".to_string(), "2".to_string())));

        let without_action = params(&[("prop", "revisions")]);
        assert!(!without_action.iter().any(|(k, _)| k == "format"));
    }

    #[test]
    fn test_check_api_error() {
        assert!(check_api_error(&json!({"query": {}})).is_ok());

        let err = check_api_error(&json!({
            "error": {"code": "maxlag", "info": "Waiting for replication"}
        }))
        .unwrap_err();

        match err {
            Error::Api { code, info } => {
                assert_eq!(code, "maxlag");
                assert_eq!(info, "Waiting for replication");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_continuation_params() {
        let value = json!({
            "continue": {"sroffset": 50, "continue": "-||"},
            "query": {"search": []}
        });

        let mut cont = continuation_params(&value);
        cont.sort();
        assert_eq!(
            cont,
            vec![
                ("continue".to_string(), "-||".to_string()),
                ("sroffset".to_string(), "50".to_string()),
            ]
        );

        assert!(continuation_params(&json!({"query": {}})).is_empty());
    }

    #[test]
    fn test_entity_statements_shapes() {
        let populated = json!({
            "entities": {
                "M77": {
                    "id": "M77",
                    "statements": {"P180": [{"mainsnak": {"snaktype": "value", "property": "P180"}}]}
                }
            }
        });
        let index = entity_statements(&populated, "M77").unwrap();
        assert!(index.has("P180"));

        // No structured data serializes the statements as an empty array.
        let quirk = json!({"entities": {"M77": {"id": "M77", "statements": []}}});
        let index = entity_statements(&quirk, "M77").unwrap();
        assert!(!index.has("P180"));

        let missing = json!({"entities": {"M77": {"missing": ""}}});
        assert!(entity_statements(&missing, "M77").is_err());
    }

    #[test]
    fn test_page_response_decodes() {
        let value = json!({
            "query": {
                "pages": [{
                    "pageid": 123,
                    "title": "File:Example.jpg",
                    "revisions": [{
                        "user": "Uploader",
                        "slots": {"main": {"content": "== Summary =="}}
                    }],
                    "categories": [{"ns": 14, "title": "Category:Example"}],
                    "imageinfo": [{"sha1": "abc123"}]
                }]
            }
        });

        let response: PagesResponse = serde_json::from_value(value).unwrap();
        let page = response.query.unwrap().pages.into_iter().next().unwrap();
        assert!(!page.missing);
        assert_eq!(page.revisions[0].user.as_deref(), Some("Uploader"));
        assert_eq!(page.categories[0].title, "Category:Example");
        assert_eq!(page.imageinfo[0].sha1, "abc123");
    }

    #[test]
    fn test_missing_page_decodes() {
        let value = json!({
            "query": {"pages": [{"title": "File:Gone.jpg", "missing": true}]}
        });

        let response: PagesResponse = serde_json::from_value(value).unwrap();
        let page = response.query.unwrap().pages.into_iter().next().unwrap();
        assert!(page.missing);
    }
}

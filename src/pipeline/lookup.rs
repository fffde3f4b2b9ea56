//! External gene-identifier lookup.
//!
//! CG numbers are resolved to a gene symbol, FlyBase ID and Entrez ID by a
//! batch query service. The default client speaks the mygene.info `/v3/query`
//! protocol; tests and offline runs plug in their own [`GeneLookup`].
//!
//! ## Retry Strategy
//!
//! Each batch is retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`). A batch that still fails is reported
//! as [`RowIssue::BatchFailed`] and its identifiers end up unmapped; only when
//! every batch fails does the run abort.

use crate::config::PipelineConfig;
use crate::error::{CleanError, RowIssue};
use crate::records::GeneAnnotation;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Resolves a batch of identifiers to gene annotations.
///
/// Implementations return at most one annotation per query; identifiers with
/// no hit are simply absent from the result.
#[async_trait]
pub trait GeneLookup: Send + Sync {
    async fn lookup(&self, ids: &[String]) -> Result<Vec<GeneAnnotation>, CleanError>;
}

/// HTTP client for a mygene.info-compatible query endpoint.
#[derive(Debug, Clone)]
pub struct MyGeneClient {
    client: reqwest::Client,
    url: String,
    species: String,
    scopes: String,
}

const FIELDS: &str = "symbol,name,FLYBASE,entrezgene";

impl MyGeneClient {
    pub fn new(
        url: impl Into<String>,
        species: impl Into<String>,
        scopes: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, CleanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CleanError::LookupFailed {
                message: format!("building HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            url: url.into(),
            species: species.into(),
            scopes: scopes.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, CleanError> {
        Self::new(
            &config.lookup_url,
            &config.species,
            &config.scopes,
            config.api_timeout_secs,
        )
    }
}

#[async_trait]
impl GeneLookup for MyGeneClient {
    async fn lookup(&self, ids: &[String]) -> Result<Vec<GeneAnnotation>, CleanError> {
        let q = ids.join(",");
        let params = [
            ("q", q.as_str()),
            ("scopes", self.scopes.as_str()),
            ("fields", FIELDS),
            ("species", self.species.as_str()),
        ];

        let failed = |message: String| CleanError::LookupFailed { message };

        let response = self
            .client
            .post(&self.url)
            .form(&params)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {status}: {}", body.trim())));
        }

        let hits: Vec<MyGeneHit> = response
            .json()
            .await
            .map_err(|e| failed(format!("malformed response: {e}")))?;
        Ok(hits_to_annotations(hits))
    }
}

/// One element of a `/v3/query` batch response.
#[derive(Debug, Deserialize)]
struct MyGeneHit {
    query: String,
    #[serde(default)]
    notfound: bool,
    symbol: Option<String>,
    name: Option<String>,
    #[serde(rename = "FLYBASE")]
    flybase: Option<OneOrMany>,
    entrezgene: Option<TextOrNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> Option<String> {
        match self {
            OneOrMany::One(s) => Some(s),
            OneOrMany::Many(v) => v.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Number(u64),
    Text(String),
}

impl TextOrNumber {
    fn into_string(self) -> String {
        match self {
            TextOrNumber::Number(n) => n.to_string(),
            TextOrNumber::Text(s) => s,
        }
    }
}

fn hits_to_annotations(hits: Vec<MyGeneHit>) -> Vec<GeneAnnotation> {
    let mut seen = BTreeSet::new();
    hits.into_iter()
        .filter(|h| !h.notfound)
        // the service returns every match; the first is the best-scored
        .filter(|h| seen.insert(h.query.clone()))
        .map(|h| GeneAnnotation {
            query: h.query,
            symbol: h.symbol,
            name: h.name,
            flybase_id: h.flybase.and_then(OneOrMany::first),
            entrez_id: h.entrezgene.map(TextOrNumber::into_string),
        })
        .collect()
}

/// Everything the lookup stage produced.
#[derive(Debug, Default)]
pub struct LookupOutcome {
    /// Annotation per queried identifier that resolved.
    pub annotations: HashMap<String, GeneAnnotation>,
    /// Distinct identifiers sent.
    pub queries: usize,
    pub issues: Vec<RowIssue>,
}

/// Resolve every identifier, in batches, with bounded concurrency.
///
/// Identifiers are de-duplicated and sorted first so batches are stable
/// between runs. An empty input makes no requests.
pub async fn lookup_all(
    lookup: &Arc<dyn GeneLookup>,
    ids: &[String],
    config: &PipelineConfig,
) -> Result<LookupOutcome, CleanError> {
    let unique: Vec<String> = ids
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if unique.is_empty() {
        return Ok(LookupOutcome::default());
    }

    let batches: Vec<Vec<String>> = unique
        .chunks(config.batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();
    let total = batches.len();
    info!(
        "Looking up {} identifiers in {} batch(es), concurrency {}",
        unique.len(),
        total,
        config.concurrency
    );

    let results: Vec<(usize, Result<Vec<GeneAnnotation>, String>)> =
        stream::iter(batches.into_iter().enumerate().map(|(i, batch)| {
            let lookup = Arc::clone(lookup);
            async move {
                let batch_num = i + 1;
                let result = lookup_batch(&lookup, batch_num, &batch, config).await;
                if let Some(ref cb) = config.progress_callback {
                    let hits = result.as_ref().map(Vec::len).unwrap_or(0);
                    cb.on_batch_complete(batch_num, total, hits);
                }
                (batch_num, result)
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut outcome = LookupOutcome {
        queries: unique.len(),
        ..Default::default()
    };
    let mut failures: Vec<(usize, String)> = Vec::new();

    for (batch_num, result) in results {
        match result {
            Ok(annotations) => {
                for a in annotations {
                    outcome.annotations.entry(a.query.clone()).or_insert(a);
                }
            }
            Err(detail) => failures.push((batch_num, detail)),
        }
    }

    failures.sort_by_key(|(n, _)| *n);
    if failures.len() == total {
        return Err(CleanError::AllBatchesFailed {
            total,
            retries: config.max_retries,
            first_error: failures
                .into_iter()
                .next()
                .map(|(_, d)| d)
                .unwrap_or_default(),
        });
    }

    outcome.issues = failures
        .into_iter()
        .map(|(batch, detail)| RowIssue::BatchFailed {
            batch,
            retries: config.max_retries,
            detail,
        })
        .collect();

    info!(
        "Lookup resolved {}/{} identifiers",
        outcome.annotations.len(),
        outcome.queries
    );
    Ok(outcome)
}

async fn lookup_batch(
    lookup: &Arc<dyn GeneLookup>,
    batch_num: usize,
    ids: &[String],
    config: &PipelineConfig,
) -> Result<Vec<GeneAnnotation>, String> {
    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Batch {}: retry {}/{} after {}ms",
                batch_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match lookup.lookup(ids).await {
            Ok(annotations) => {
                debug!(
                    "Batch {}: {}/{} resolved",
                    batch_num,
                    annotations.len(),
                    ids.len()
                );
                return Ok(annotations);
            }
            Err(e) => {
                let err_msg = e.to_string();
                warn!("Batch {}: attempt {} failed: {}", batch_num, attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| "Unknown error".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Resolves every id to a symbol derived from it, failing the first
    /// `fail_first` calls.
    struct FakeLookup {
        calls: AtomicUsize,
        fail_first: usize,
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl FakeLookup {
        fn new(fail_first: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first,
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GeneLookup for FakeLookup {
        async fn lookup(&self, ids: &[String]) -> Result<Vec<GeneAnnotation>, CleanError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(ids.to_vec());
            if n < self.fail_first {
                return Err(CleanError::LookupFailed {
                    message: "HTTP 503".into(),
                });
            }
            Ok(ids
                .iter()
                .filter(|id| !id.starts_with("CR"))
                .map(|id| GeneAnnotation {
                    query: id.clone(),
                    symbol: Some(id.to_lowercase()),
                    ..Default::default()
                })
                .collect())
        }
    }

    fn config(batch_size: usize, max_retries: u32) -> PipelineConfig {
        PipelineConfig {
            batch_size,
            concurrency: 1,
            max_retries,
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn dedups_sorts_and_batches() {
        let fake = Arc::new(FakeLookup::new(0));
        let lookup: Arc<dyn GeneLookup> = fake.clone();
        let out = lookup_all(
            &lookup,
            &ids(&["CG3", "CG1", "CG3", " ", "CG2", "CR9"]),
            &config(2, 0),
        )
        .await
        .unwrap();

        assert_eq!(out.queries, 4);
        assert_eq!(out.annotations.len(), 3);
        assert_eq!(out.annotations["CG2"].symbol.as_deref(), Some("cg2"));
        assert!(out.issues.is_empty());
        let batches = fake.batches.lock().unwrap();
        assert_eq!(*batches, vec![ids(&["CG1", "CG2"]), ids(&["CG3", "CR9"])]);
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let lookup: Arc<dyn GeneLookup> = Arc::new(FakeLookup::new(2));
        let out = lookup_all(&lookup, &ids(&["CG1"]), &config(10, 2)).await.unwrap();
        assert_eq!(out.annotations.len(), 1);
        assert!(out.issues.is_empty());
    }

    #[tokio::test]
    async fn one_failed_batch_is_non_fatal() {
        let lookup: Arc<dyn GeneLookup> = Arc::new(FakeLookup::new(1));
        let out = lookup_all(&lookup, &ids(&["CG1", "CG2"]), &config(1, 0))
            .await
            .unwrap();
        assert_eq!(out.annotations.len(), 1);
        assert_eq!(
            out.issues,
            vec![RowIssue::BatchFailed {
                batch: 1,
                retries: 0,
                detail: "Gene lookup error: HTTP 503".into()
            }]
        );
    }

    #[tokio::test]
    async fn every_batch_failing_is_fatal() {
        let lookup: Arc<dyn GeneLookup> = Arc::new(FakeLookup::new(usize::MAX));
        let err = lookup_all(&lookup, &ids(&["CG1", "CG2"]), &config(1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CleanError::AllBatchesFailed { total: 2, retries: 1, .. }));
    }

    #[tokio::test]
    async fn empty_input_makes_no_requests() {
        let fake = Arc::new(FakeLookup::new(0));
        let lookup: Arc<dyn GeneLookup> = fake.clone();
        let out = lookup_all(&lookup, &[], &config(10, 0)).await.unwrap();
        assert_eq!(out.queries, 0);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parses_mygene_hits() {
        let body = r#"[
            {"query": "CG9533", "_id": "40296", "symbol": "rut", "name": "rutabaga",
             "FLYBASE": "FBgn0003301", "entrezgene": 40296},
            {"query": "CG9533", "_id": "99", "symbol": "other"},
            {"query": "CG1234", "symbol": "x", "FLYBASE": ["FBgn0000001", "FBgn0000002"],
             "entrezgene": "12345"},
            {"query": "CG0000", "notfound": true}
        ]"#;
        let hits: Vec<MyGeneHit> = serde_json::from_str(body).unwrap();
        let out = hits_to_annotations(hits);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].symbol.as_deref(), Some("rut"));
        assert_eq!(out[0].flybase_id.as_deref(), Some("FBgn0003301"));
        assert_eq!(out[0].entrez_id.as_deref(), Some("40296"));
        assert_eq!(out[1].flybase_id.as_deref(), Some("FBgn0000001"));
        assert_eq!(out[1].entrez_id.as_deref(), Some("12345"));
    }
}

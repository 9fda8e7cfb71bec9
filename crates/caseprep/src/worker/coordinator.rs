use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::case::{EnrichedDocument, MaintenanceCase};
use crate::db::CaseRepository;
use crate::error::BatchError;
use crate::pipeline::{
    CaseEnricher, CaseFailure, CaseOutcome, EnrichedCase, EnrichmentError, Stage,
};

/// Whether documents whose description was not persisted are still published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishUnpersisted {
    #[default]
    Yes,
    No,
}

impl From<bool> for PublishUnpersisted {
    fn from(value: bool) -> Self {
        if value {
            PublishUnpersisted::Yes
        } else {
            PublishUnpersisted::No
        }
    }
}

/// Everything one batch produced, in completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub documents: Vec<EnrichedDocument>,
    pub failures: Vec<CaseFailure>,
    /// Case ids whose document was assembled but whose row update failed.
    pub unpersisted: Vec<String>,
    pub missing_vectors: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: CaseOutcome) {
        match outcome {
            CaseOutcome::Assembled(EnrichedCase {
                document,
                persistence,
                ..
            }) => {
                if !persistence.is_persisted() {
                    self.unpersisted.push(document.case_id.clone());
                }
                if document.vector.is_none() {
                    self.missing_vectors += 1;
                }
                self.documents.push(document);
            }
            CaseOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    pub fn processed(&self) -> usize {
        self.documents.len() + self.failures.len()
    }

    pub fn failures_by_stage(&self) -> BTreeMap<Stage, usize> {
        let mut counts = BTreeMap::new();
        for failure in &self.failures {
            *counts.entry(failure.stage).or_insert(0) += 1;
        }
        counts
    }

    /// Documents to send to the index under the given policy.
    pub fn publishable(&self, policy: PublishUnpersisted) -> Cow<'_, [EnrichedDocument]> {
        match policy {
            PublishUnpersisted::Yes => Cow::Borrowed(&self.documents),
            PublishUnpersisted::No if self.unpersisted.is_empty() => {
                Cow::Borrowed(&self.documents)
            }
            PublishUnpersisted::No => Cow::Owned(
                self.documents
                    .iter()
                    .filter(|d| !self.unpersisted.contains(&d.case_id))
                    .cloned()
                    .collect(),
            ),
        }
    }

    fn log_summary(&self) {
        info!(
            documents = self.documents.len(),
            failures = self.failures.len(),
            unpersisted = self.unpersisted.len(),
            missing_vectors = self.missing_vectors,
            "Batch finished"
        );
        for (stage, count) in self.failures_by_stage() {
            warn!(stage = %stage, count, "Cases failed");
        }
        for case_id in &self.unpersisted {
            warn!(case_id = %case_id, "Case enriched but not persisted");
        }
    }
}

/// Fans pending cases out to enrichment workers under a concurrency bound.
pub struct BatchCoordinator {
    cases: CaseRepository,
    enricher: CaseEnricher,
    max_concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(cases: CaseRepository, enricher: CaseEnricher, max_concurrency: usize) -> Self {
        Self {
            cases,
            enricher,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Lists pending cases and enriches all of them.
    pub async fn run(&self) -> Result<BatchReport, BatchError> {
        let pending = self
            .cases
            .list_pending()
            .await
            .map_err(BatchError::ListCases)?;
        info!(
            pending = pending.len(),
            max_concurrency = self.max_concurrency,
            "Processing cases for indexing"
        );
        Ok(self.run_cases(pending).await)
    }

    /// Runs one worker per case. A failing or panicking case never affects
    /// its siblings.
    pub async fn run_cases(&self, cases: Vec<MaintenanceCase>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for case in cases {
            let enricher = self.enricher.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let case_id = case.case_id.clone();
                let file_name = case.file_name.clone();

                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return aborted(case_id, file_name, Stage::Fetching, "semaphore closed")
                    }
                };

                match AssertUnwindSafe(enricher.enrich(case)).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(
                            case_id = %case_id,
                            file_name = %file_name,
                            panic = %message,
                            "Worker panicked"
                        );
                        aborted(case_id, file_name, Stage::Unknown, &message)
                    }
                }
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Worker task did not complete");
                    report.record(aborted(
                        String::new(),
                        String::new(),
                        Stage::Unknown,
                        &e.to_string(),
                    ));
                }
            }
        }

        report.log_summary();
        report
    }
}

fn aborted(case_id: String, file_name: String, stage: Stage, reason: &str) -> CaseOutcome {
    CaseOutcome::Failed(CaseFailure {
        case_id,
        file_name,
        stage,
        error: EnrichmentError::Aborted(reason.to_string()),
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{EmbeddingError, EmbeddingModel, VisionError, VisionModel};
    use crate::case::JobAssigned;
    use crate::storage::BlobStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use object_store::memory::InMemory;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    /// Describes images by their bytes: `b"fail"` errors, `b"panic"` panics.
    /// Tracks the highest number of concurrent calls.
    #[derive(Default)]
    struct ScriptedVision {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl VisionModel for ScriptedVision {
        async fn describe(&self, image: &[u8]) -> Result<String, VisionError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match image {
                b"fail" => Err(VisionError::Status {
                    status: 500,
                    body: "boom".into(),
                }),
                b"panic" => panic!("vision stub exploded"),
                _ => Ok("Mould Status: MOULD DETECTED".into()),
            }
        }
    }

    struct UnitEmbedder;

    #[async_trait]
    impl EmbeddingModel for UnitEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0])
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        blobs: BlobStore,
        cases: CaseRepository,
        vision: Arc<ScriptedVision>,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let url = format!("sqlite://{}?mode=rwc", dir.path().join("cases.db").display());
            Self {
                cases: CaseRepository::new(crate::db::connect(&url, 1, 4).await.unwrap()),
                blobs: BlobStore::new(
                    Arc::new(InMemory::new()),
                    Url::parse("https://acct.blob.core.windows.net/images").unwrap(),
                ),
                vision: Arc::new(ScriptedVision::default()),
                _dir: dir,
            }
        }

        async fn add_case(&self, case_id: &str, image: Option<&[u8]>) {
            let name = format!("{case_id}.jpg");
            if let Some(bytes) = image {
                self.blobs.upload(&name, bytes.to_vec()).await.unwrap();
            }
            let case = MaintenanceCase::new_pending(
                "1000",
                case_id,
                self.blobs.url_for(&name).unwrap(),
                name,
                Utc::now(),
                JobAssigned::No,
            );
            self.cases.insert(&case).await.unwrap();
        }

        fn coordinator(&self, max_concurrency: usize) -> BatchCoordinator {
            let enricher = CaseEnricher::new(
                self.blobs.clone(),
                self.cases.clone(),
                self.vision.clone(),
                Arc::new(UnitEmbedder),
            );
            BatchCoordinator::new(self.cases.clone(), enricher, max_concurrency)
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_affect_siblings() {
        let f = Fixture::new().await;
        for i in 0..6 {
            let image: &[u8] = if i % 3 == 0 { b"fail" } else { b"ok" };
            f.add_case(&format!("10000{i}"), Some(image)).await;
        }

        let report = f.coordinator(4).run().await.unwrap();

        assert_eq!(report.documents.len(), 4);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures_by_stage().get(&Stage::Describing), Some(&2));
        assert_eq!(report.processed(), 6);
        assert_eq!(f.cases.list_pending().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_is_bounded() {
        let f = Fixture::new().await;
        for i in 0..12 {
            f.add_case(&format!("2000{i:02}"), Some(b"ok")).await;
        }

        let report = f.coordinator(3).run().await.unwrap();

        assert_eq!(report.documents.len(), 12);
        let peak = f.vision.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency was {peak}");
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_contained() {
        let f = Fixture::new().await;
        f.add_case("300001", Some(b"ok")).await;
        f.add_case("300002", Some(b"panic")).await;

        let report = f.coordinator(2).run().await.unwrap();

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.case_id, "300002");
        assert_eq!(failure.stage, Stage::Unknown);
        assert!(failure.error.to_string().contains("vision stub exploded"));
    }

    #[tokio::test]
    async fn test_missing_blob_counts_as_fetch_failure() {
        let f = Fixture::new().await;
        f.add_case("400001", Some(b"ok")).await;
        f.add_case("400002", None).await;

        let report = f.coordinator(2).run().await.unwrap();

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].case_id, "400001");
        assert_eq!(report.failures[0].stage, Stage::Fetching);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let f = Fixture::new().await;
        let report = f.coordinator(2).run().await.unwrap();
        assert_eq!(report.processed(), 0);
        assert!(report.publishable(PublishUnpersisted::Yes).is_empty());
    }

    #[tokio::test]
    async fn test_unpersisted_documents_follow_policy() {
        let f = Fixture::new().await;
        f.add_case("500001", Some(b"ok")).await;
        // Not in the table: enrichment succeeds but the update finds no row.
        f.blobs.upload("500002.jpg", b"ok".to_vec()).await.unwrap();
        let stray = MaintenanceCase::new_pending(
            "1000",
            "500002",
            f.blobs.url_for("500002.jpg").unwrap(),
            "500002.jpg",
            Utc::now(),
            JobAssigned::Yes,
        );
        let mut cases = f.cases.list_pending().await.unwrap();
        cases.push(stray);

        let report = f.coordinator(2).run_cases(cases).await;

        assert_eq!(report.documents.len(), 2);
        assert_eq!(report.unpersisted, vec!["500002".to_string()]);
        assert_eq!(report.publishable(PublishUnpersisted::Yes).len(), 2);

        let strict = report.publishable(PublishUnpersisted::No);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].case_id, "500001");
    }

    #[test]
    fn test_policy_from_bool() {
        assert_eq!(PublishUnpersisted::from(true), PublishUnpersisted::Yes);
        assert_eq!(PublishUnpersisted::from(false), PublishUnpersisted::No);
        assert_eq!(PublishUnpersisted::default(), PublishUnpersisted::Yes);
    }
}

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::ai::{EmbeddingModel, VisionModel};
use crate::case::{EnrichedDocument, MaintenanceCase};
use crate::classifier;
use crate::db::CaseRepository;
use crate::storage::BlobStore;

use super::context::EnrichmentContext;
use super::error::{EnrichmentError, EnrichmentWarning, Stage};

/// Whether the description reached the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceStatus {
    Persisted,
    Failed(String),
}

impl PersistenceStatus {
    pub fn is_persisted(&self) -> bool {
        matches!(self, PersistenceStatus::Persisted)
    }
}

/// A case that made it to the end of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedCase {
    pub document: EnrichedDocument,
    pub persistence: PersistenceStatus,
    pub warnings: Vec<EnrichmentWarning>,
}

/// A case that stopped early.
#[derive(Debug)]
pub struct CaseFailure {
    pub case_id: String,
    pub file_name: String,
    pub stage: Stage,
    pub error: EnrichmentError,
}

#[derive(Debug)]
pub enum CaseOutcome {
    Assembled(EnrichedCase),
    Failed(CaseFailure),
}

impl CaseOutcome {
    pub fn case_id(&self) -> &str {
        match self {
            CaseOutcome::Assembled(c) => &c.document.case_id,
            CaseOutcome::Failed(f) => &f.case_id,
        }
    }
}

/// Runs one case through fetch, describe, classify, persist and embed.
///
/// Cloning shares every handle, so one enricher is built per run and a clone
/// is moved into each worker task.
#[derive(Clone)]
pub struct CaseEnricher {
    blobs: BlobStore,
    cases: CaseRepository,
    vision: Arc<dyn VisionModel>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl CaseEnricher {
    pub fn new(
        blobs: BlobStore,
        cases: CaseRepository,
        vision: Arc<dyn VisionModel>,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Self {
        Self {
            blobs,
            cases,
            vision,
            embedder,
        }
    }

    pub async fn enrich(&self, case: MaintenanceCase) -> CaseOutcome {
        let span = info_span!("case",
            case_id = %case.case_id,
            file_name = %case.file_name,
        );
        self.run(EnrichmentContext::new(case)).instrument(span).await
    }

    async fn run(&self, mut ctx: EnrichmentContext) -> CaseOutcome {
        // Step 1: Fetch image bytes
        ctx.enter(Stage::Fetching);
        let image = match self.step_fetch(&ctx).instrument(info_span!("fetch")).await {
            Ok(image) => image,
            Err(e) => return fail(ctx, e),
        };

        // Step 2: Describe
        ctx.enter(Stage::Describing);
        let description = match self
            .step_describe(image)
            .instrument(info_span!("describe"))
            .await
        {
            Ok(description) => description,
            Err(e) => return fail(ctx, e),
        };

        // Step 3: Classify
        ctx.enter(Stage::Classifying);
        let mould_detected = classifier::mould_detected(&description);
        info!(
            case_id = %ctx.case.case_id,
            mould_detected,
            "Mould status classified"
        );

        // Step 4: Persist (failure is recorded, not fatal)
        ctx.enter(Stage::Persisting);
        let persistence = self
            .step_persist(&mut ctx, &description, mould_detected)
            .instrument(info_span!("persist"))
            .await;

        // Step 5: Embed (failure leaves the vector empty)
        ctx.enter(Stage::Embedding);
        let vector = self
            .step_embed(&mut ctx, &description)
            .instrument(info_span!("embed"))
            .await;

        // Step 6: Assemble
        ctx.enter(Stage::Assembled);
        let document = EnrichedDocument::assemble(&ctx.case, description, mould_detected, vector);

        debug!(
            case_id = %ctx.case.case_id,
            elapsed_ms = ctx.started.elapsed().as_millis() as u64,
            warnings = ctx.warnings.len(),
            "Processed case for indexing"
        );

        CaseOutcome::Assembled(EnrichedCase {
            document,
            persistence,
            warnings: ctx.warnings,
        })
    }

    async fn step_fetch(&self, ctx: &EnrichmentContext) -> Result<Vec<u8>, EnrichmentError> {
        let name =
            BlobStore::blob_name_from_ref(&ctx.case.image_url).map_err(EnrichmentError::Fetch)?;
        let image = self
            .blobs
            .download(&name)
            .await
            .map_err(EnrichmentError::Fetch)?;
        debug!(blob = %name, bytes = image.len(), "Fetched image");
        Ok(image)
    }

    /// Takes the image by value so the bytes are released as soon as the
    /// model has answered.
    async fn step_describe(&self, image: Vec<u8>) -> Result<String, EnrichmentError> {
        self.vision
            .describe(&image)
            .await
            .map_err(EnrichmentError::Describe)
    }

    async fn step_persist(
        &self,
        ctx: &mut EnrichmentContext,
        description: &str,
        mould_detected: bool,
    ) -> PersistenceStatus {
        match self
            .cases
            .apply_enrichment(&ctx.case.case_id, description, mould_detected)
            .await
        {
            Ok(()) => PersistenceStatus::Persisted,
            Err(e) => {
                warn!(
                    case_id = %ctx.case.case_id,
                    file_name = %ctx.case.file_name,
                    stage = %Stage::Persisting,
                    error = %e,
                    "Failed to persist enrichment; continuing"
                );
                let error = e.to_string();
                ctx.warn(EnrichmentWarning::NotPersisted {
                    error: error.clone(),
                });
                PersistenceStatus::Failed(error)
            }
        }
    }

    async fn step_embed(
        &self,
        ctx: &mut EnrichmentContext,
        description: &str,
    ) -> Option<Vec<f32>> {
        match self.embedder.embed(description).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(
                    case_id = %ctx.case.case_id,
                    file_name = %ctx.case.file_name,
                    stage = %Stage::Embedding,
                    error = %e,
                    "Failed to generate vector; publishing without one"
                );
                ctx.warn(EnrichmentWarning::NoVector {
                    error: e.to_string(),
                });
                None
            }
        }
    }
}

fn fail(ctx: EnrichmentContext, error: EnrichmentError) -> CaseOutcome {
    warn!(
        case_id = %ctx.case.case_id,
        file_name = %ctx.case.file_name,
        stage = %ctx.stage,
        error = %error,
        "Case failed"
    );
    CaseOutcome::Failed(CaseFailure {
        case_id: ctx.case.case_id,
        file_name: ctx.case.file_name,
        stage: ctx.stage,
        error,
    })
}

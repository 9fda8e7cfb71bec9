//! Run sequencing: builds every service from [`Settings`] and runs the
//! preparation steps in order.

use std::path::PathBuf;
use std::sync::Arc;

use rand::Rng;
use tracing::{info, info_span, warn, Instrument};

use crate::ai::{
    AzureEmbeddingClient, AzureVisionClient, Deployment, EmbeddingModel, VisionModel,
};
use crate::config::Settings;
use crate::db::{self, CaseRepository};
use crate::error::{BatchError, CaseprepError, ConfigError, Result};
use crate::output;
use crate::pipeline::CaseEnricher;
use crate::search::{AzureSearchClient, IndexDefinition, PublishReport, SearchIndex, VectorizerSource};
use crate::seed::{DummyCaseGenerator, SeedReport, Seeder};
use crate::storage::BlobStore;
use crate::worker::{BatchCoordinator, BatchReport, PublishUnpersisted};

/// Handles shared by every step of a run. Built once and injected.
pub struct Services {
    pub cases: CaseRepository,
    pub blobs: BlobStore,
    pub vision: Arc<dyn VisionModel>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub search: Arc<dyn SearchIndex>,
}

impl Services {
    /// Connects to the record store and builds the Azure clients.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let http = crate::http::build_client(settings.http_timeout())?;
        let oai_base = settings.oai_base_url()?;
        let oai_key = settings.oai_api_key()?;

        let vision = AzureVisionClient::new(
            http.clone(),
            Deployment {
                base_url: oai_base.clone(),
                name: settings.vision_deployment.clone(),
                api_version: settings.vision_api_version.clone(),
                api_key: oai_key.clone(),
            },
        )
        .map_err(|e| {
            invalid_url(
                "AZURE_OAI_GPTVISION_DEPLOYMENT_NAME",
                &settings.vision_deployment,
                e,
            )
        })?;

        let embedder = AzureEmbeddingClient::new(
            http.clone(),
            Deployment {
                base_url: oai_base,
                name: settings.embed_deployment.clone(),
                api_version: settings.embed_api_version.clone(),
                api_key: oai_key,
            },
            settings.embed_dimensions,
        )
        .map_err(|e| {
            invalid_url(
                "AZURE_OAI_EMBED_DEPLOYMENT_NAME",
                &settings.embed_deployment,
                e,
            )
        })?;

        let search = AzureSearchClient::new(
            http.clone(),
            settings.search_base_url()?,
            settings.search_index_name.clone(),
            settings.search_api_version.clone(),
            settings.search_api_key()?,
        );

        let blobs = BlobStore::from_connection_string(
            &settings.blob_connection_string,
            &settings.storage_container,
            http,
        )?;

        let connection = db::connect(
            &settings.database_url,
            settings.db_min_connections,
            settings.db_max_connections,
        )
        .await?;

        Ok(Self {
            cases: CaseRepository::new(connection),
            blobs,
            vision: Arc::new(vision),
            embedder: Arc::new(embedder),
            search: Arc::new(search),
        })
    }

    /// Closes the record store pool. Call once every worker has finished.
    pub async fn close(self) -> Result<()> {
        self.cases.close().await?;
        Ok(())
    }
}

/// Inputs of one run that are not services.
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub output_path: PathBuf,
    pub max_concurrency: usize,
    pub publish_policy: PublishUnpersisted,
    pub index: IndexDefinition,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let vectorizer = VectorizerSource {
            resource_uri: settings.oai_base_url()?.to_string(),
            deployment_id: settings.embed_deployment.clone(),
            model_name: settings.embed_deployment.clone(),
            api_key: settings.oai_api_key()?,
        };

        Ok(Self {
            data_dir: settings.data_dir.clone(),
            output_path: settings.output_path.clone(),
            max_concurrency: settings.effective_concurrency(),
            publish_policy: settings.publish_policy(),
            index: IndexDefinition::maintenance_requests(
                settings.search_index_name.clone(),
                settings.embed_dimensions,
                vectorizer,
            ),
        })
    }
}

/// What a completed run did.
#[derive(Debug)]
pub struct RunSummary {
    pub seed: SeedReport,
    pub batch: BatchReport,
    pub publish: PublishReport,
}

/// Runs every step: ensure the blob container, reset the table, seed,
/// provision the index, enrich all pending cases, write the JSON artifact
/// and publish.
///
/// Per-case failures are reported in the summary. Anything else stops the
/// run with an error.
pub async fn run<R: Rng + Send>(
    services: &Services,
    options: &RunOptions,
    generator: &mut DummyCaseGenerator<R>,
) -> Result<RunSummary> {
    // Step 0: Make sure uploads have somewhere to go
    services
        .blobs
        .ensure_container()
        .instrument(info_span!("ensure_container"))
        .await
        .map_err(BatchError::EnsureContainer)?;

    // Step 1: Reset the case table
    services
        .cases
        .reset_table()
        .instrument(info_span!("reset_table"))
        .await
        .map_err(BatchError::ResetTable)?;

    // Step 2: Seed from the data folder
    let seeder = Seeder::new(
        services.blobs.clone(),
        services.cases.clone(),
        options.max_concurrency,
    );
    let seed = seeder
        .seed(&options.data_dir, generator)
        .instrument(info_span!("seed"))
        .await?;
    if seed.inserted == 0 && !seed.skipped.is_empty() {
        return Err(BatchError::NothingSeeded {
            found: seed.skipped.len(),
        }
        .into());
    }

    // Step 3: Provision the search index
    services
        .search
        .recreate_index(&options.index)
        .instrument(info_span!("provision_index"))
        .await
        .map_err(BatchError::ProvisionIndex)?;

    // Step 4: Enrich pending cases
    let enricher = CaseEnricher::new(
        services.blobs.clone(),
        services.cases.clone(),
        Arc::clone(&services.vision),
        Arc::clone(&services.embedder),
    );
    let coordinator =
        BatchCoordinator::new(services.cases.clone(), enricher, options.max_concurrency);
    let batch = coordinator.run().instrument(info_span!("enrich")).await?;

    // Step 5: Write the JSON artifact
    output::write_documents(&options.output_path, &batch.documents).await?;

    // Step 6: Publish
    let publishable = batch.publishable(options.publish_policy);
    if publishable.len() < batch.documents.len() {
        warn!(
            withheld = batch.documents.len() - publishable.len(),
            "Withholding unpersisted documents from the index"
        );
    }
    let publish = services
        .search
        .upload_documents(&publishable)
        .instrument(info_span!("publish"))
        .await
        .map_err(BatchError::Publish)?;

    info!(
        seeded = seed.inserted,
        documents = batch.documents.len(),
        failures = batch.failures.len(),
        published = publish.succeeded,
        rejected = publish.failed.len(),
        "Run complete"
    );

    Ok(RunSummary {
        seed,
        batch,
        publish,
    })
}

/// Builds every service from `settings` and performs one full run with
/// randomly generated case attributes.
pub async fn execute(settings: &Settings) -> Result<RunSummary> {
    let options = RunOptions::from_settings(settings)?;
    let services = Services::from_settings(settings).await?;

    let mut generator = DummyCaseGenerator::from_entropy();
    let outcome = run(&services, &options, &mut generator).await;

    if let Err(e) = services.close().await {
        warn!(error = %e, "Failed to close database pool");
    }
    outcome
}

fn invalid_url(name: &'static str, value: &str, source: url::ParseError) -> CaseprepError {
    CaseprepError::Config(ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}

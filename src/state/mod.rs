use std::sync::Arc;
use std::time::Duration;

use crate::agent::{ResearchConfig, ResearchService};
use crate::core::config::{AppPaths, Settings};
use crate::llm::{build_embedder, ChatModel, Embedder, OpenAiProvider};
use crate::rag::{ChunkerConfig, IngestionPipeline, KnowledgeBase, SqliteRagStore};
use crate::tools::{RetrievalTool, ToolRegistry};

pub mod error;

use error::InitializationError;

/// Shared state behind every route.
///
/// Holds the resolved configuration, the knowledge base (shared by queries
/// and ingestion), the research service and the ingestion pipeline.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub knowledge: Arc<KnowledgeBase>,
    pub research: Arc<ResearchService>,
    pub ingestion: Arc<IngestionPipeline>,
}

impl AppState {
    /// Builds the state for a running service:
    /// 1. creates the data, store and log directories
    /// 2. opens the SQLite knowledge store
    /// 3. connects the embedding provider and the chat model
    pub async fn initialize(
        paths: AppPaths,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        paths
            .ensure_dirs()
            .map_err(|e| InitializationError::Directories(e.into()))?;

        let model: Arc<dyn ChatModel> = Arc::new(
            OpenAiProvider::from_settings(&settings.llm)
                .map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let knowledge = open_knowledge_base(&paths, &settings).await?;

        Ok(Self::from_parts(paths, settings, knowledge, model))
    }

    /// Assembles the state around an existing knowledge base and model.
    pub fn from_parts(
        paths: AppPaths,
        settings: Settings,
        knowledge: Arc<KnowledgeBase>,
        model: Arc<dyn ChatModel>,
    ) -> Arc<Self> {
        let retrieval = RetrievalTool::new(
            knowledge.clone(),
            settings.agent.top_k,
            Duration::from_secs(settings.agent.tool_timeout_secs),
        );
        let tools = Arc::new(ToolRegistry::new().with_tool(Arc::new(retrieval)));
        let research = Arc::new(ResearchService::new(
            model,
            tools,
            ResearchConfig::from_settings(&settings),
        ));
        let ingestion = Arc::new(IngestionPipeline::new(
            knowledge.clone(),
            paths.data_dir.clone(),
            ChunkerConfig::from(&settings.rag),
            settings.rag.embed_batch_size,
        ));

        Arc::new(AppState {
            paths: Arc::new(paths),
            settings: Arc::new(settings),
            knowledge,
            research,
            ingestion,
        })
    }
}

/// Opens the knowledge store with the configured embedder. Needs no chat
/// model, so ingestion can run without one.
pub async fn open_knowledge_base(
    paths: &AppPaths,
    settings: &Settings,
) -> Result<Arc<KnowledgeBase>, InitializationError> {
    let embedder: Arc<dyn Embedder> =
        build_embedder(settings).map_err(|e| InitializationError::Embedder(e.into()))?;
    let store = SqliteRagStore::new(paths)
        .await
        .map_err(|e| InitializationError::Knowledge(e.into()))?;

    let knowledge = Arc::new(KnowledgeBase::new(Arc::new(store), embedder));
    if let Err(err) = knowledge.check_embedder().await {
        tracing::warn!("Could not read knowledge store metadata: {}", err);
    }
    Ok(knowledge)
}

use anyhow::Context;
use axum::Router;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use research_agent::agent::ResearchRequest;
use research_agent::client::ResearchClient;
use research_agent::core::{self, config::ConfigError};
use research_agent::server;
use research_agent::state::{open_knowledge_base, AppState};

#[derive(Parser)]
#[command(name = "research-agent")]
#[command(about = "Retrieval-augmented research assistant over a PDF library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Rebuild the knowledge store from the PDFs in the data directory
    Ingest,
    /// Answer a question locally, without the HTTP API
    Research {
        question: String,
        #[arg(long)]
        max_turns: Option<usize>,
    },
    /// Ask a running service (`API_URL`)
    Ask { question: String },
    /// Trigger ingestion on a running service (`API_URL`)
    Reindex,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (paths, mut settings) = core::config::load()?;
    core::logging::init(&paths, settings.app.debug);

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            serve(paths, settings).await
        }
        Command::Ingest => {
            paths.ensure_dirs().context("Failed to create data directories")?;
            let knowledge = open_knowledge_base(&paths, &settings).await?;
            let pipeline = research_agent::rag::IngestionPipeline::new(
                knowledge,
                paths.data_dir.clone(),
                (&settings.rag).into(),
                settings.rag.embed_batch_size,
            );
            let report = pipeline.run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Research {
            question,
            max_turns,
        } => {
            require_token(&settings)?;
            let state = AppState::initialize(paths, settings).await?;
            let outcome = state
                .research
                .run(ResearchRequest::new(question).with_max_turns(max_turns))
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", outcome.answer);
            Ok(())
        }
        Command::Ask { question } => {
            let client = ResearchClient::from_settings(&settings.client)?;
            println!("{}", client.research(&question).await?);
            Ok(())
        }
        Command::Reindex => {
            let client = ResearchClient::from_settings(&settings.client)?;
            let report = client.ingest().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn require_token(settings: &core::config::Settings) -> Result<(), ConfigError> {
    if settings.api_token().is_none() {
        return Err(ConfigError::MissingCredential);
    }
    Ok(())
}

async fn serve(
    paths: core::config::AppPaths,
    settings: core::config::Settings,
) -> anyhow::Result<()> {
    require_token(&settings)?;

    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);
    if !settings.sandbox.use_docker {
        tracing::warn!("USE_DOCKER is disabled; no sandboxed tools are registered either way");
    }

    let state = AppState::initialize(paths, settings).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

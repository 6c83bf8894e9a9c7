use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::assistant::{AnswerPolicy, AnswerSettings};
use crate::config::{Config, EmbedderKind};
use crate::documents;
use crate::embeddings::{OllamaClient, build_embedder};
use crate::generation::{ChatMessage, build_completer};
use crate::locations::{LocationIngestReport, LocationStore};
use crate::retrieval::{BuildReport, RetrievalStore};

/// The wired-up assistant: retrieval store, answer policy and locations
pub struct App {
    pub config: Config,
    pub store: Arc<RetrievalStore>,
    pub policy: AnswerPolicy,
    pub locations: LocationStore,
}

impl App {
    /// Build backends from the configuration. The knowledge base is not loaded yet.
    #[inline]
    pub fn new(config: Config) -> Result<Self> {
        let embedder = build_embedder(&config)?;
        let completer = build_completer(&config)?;
        let store = Arc::new(RetrievalStore::from_config(&config, embedder));
        let policy = AnswerPolicy::new(
            Arc::clone(&store),
            completer,
            AnswerSettings::from_config(&config),
        );

        Ok(Self {
            config,
            store,
            policy,
            locations: LocationStore::new(),
        })
    }

    #[inline]
    pub fn load() -> Result<Self> {
        let config = Config::load_default().context("Failed to load configuration")?;
        Self::new(config)
    }

    /// Index the document folder and load the locations folder
    #[inline]
    pub async fn load_knowledge_base(&self) -> Result<BuildReport> {
        let report = self.store.build_index(&self.config.docs_dir()).await;

        let locations = self
            .locations
            .load_folder(&self.config.locations_dir())
            .await
            .context("Failed to load locations")?;
        info!("Loaded {} locations", locations.locations_added);

        Ok(report)
    }
}

/// Rebuild the index from the document folder and report what happened
#[inline]
pub async fn index_documents() -> Result<()> {
    let app = App::load()?;
    check_embedding_backend(&app.config).await;

    println!(
        "Indexing documents in {}",
        style(app.config.docs_dir().display()).cyan()
    );
    let report = app.store.build_index(&app.config.docs_dir()).await;
    print_build_report(&report);

    Ok(())
}

/// Answer one question and print the reply
#[inline]
pub async fn ask(question: &str) -> Result<()> {
    let app = App::load()?;
    let report = app.load_knowledge_base().await?;
    if let Some(reason) = &report.degraded {
        warn!("Answering without documents: {}", reason);
    }

    let reply = app.policy.answer(&[ChatMessage::user(question)]).await;
    println!("{reply}");

    Ok(())
}

/// Interactive chat that keeps the conversation history
#[inline]
pub async fn chat() -> Result<()> {
    let app = App::load()?;
    let report = app.load_knowledge_base().await?;

    eprintln!("{}", style("🎓 Campus Assistant").bold().cyan());
    print_build_report(&report);
    eprintln!(
        "{}",
        style("Commands: /reload, /reset, /clear, /locations, /quit").dim()
    );
    eprintln!();

    let mut history: Vec<ChatMessage> = Vec::new();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                history.clear();
                eprintln!("{}", style("Conversation cleared.").dim());
            }
            "/reload" => {
                let report = app.store.build_index(&app.config.docs_dir()).await;
                print_build_report(&report);
            }
            "/reset" => {
                let removed = documents::clear_folder(&app.config.docs_dir())?;
                app.store.clear().await;
                eprintln!(
                    "{}",
                    style(format!("Removed {removed} documents, index cleared.")).yellow()
                );
            }
            "/locations" => print_locations(&app.locations).await,
            question => {
                history.push(ChatMessage::user(question));
                let reply = app.policy.answer(&history).await;
                println!("{} {}", style("Assistant:").bold().green(), reply);
                history.push(ChatMessage::assistant(reply));
            }
        }
    }

    Ok(())
}

/// Copy documents into the knowledge base and rebuild the index
#[inline]
pub async fn add_documents(files: &[PathBuf]) -> Result<()> {
    let app = App::load()?;
    let docs_dir = app.config.docs_dir();

    let stored = documents::store_files(&docs_dir, files)
        .with_context(|| format!("Failed to copy documents into {}", docs_dir.display()))?;
    println!(
        "Added {} documents to {}",
        stored.len(),
        style(docs_dir.display()).cyan()
    );

    check_embedding_backend(&app.config).await;
    let report = app.store.build_index(&docs_dir).await;
    print_build_report(&report);

    Ok(())
}

/// Delete every stored document
#[inline]
pub fn reset_documents() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let removed = documents::clear_folder(&config.docs_dir())?;
    println!("✓ Removed {removed} documents. The index is empty until new documents are added.");
    Ok(())
}

/// Copy location CSVs into the knowledge base and report what was added
#[inline]
pub async fn add_locations(files: &[PathBuf]) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let locations_dir = config.locations_dir();

    let store = LocationStore::new();
    store
        .load_folder(&locations_dir)
        .await
        .context("Failed to load existing locations")?;

    let report = store
        .ingest_files(files)
        .await
        .context("Failed to read location files")?;
    store
        .save(&locations_dir)
        .await
        .with_context(|| format!("Failed to save locations to {}", locations_dir.display()))?;

    print_location_report(&report);
    println!("Total locations: {}", store.len().await);

    Ok(())
}

/// Print every known location, as text or JSON
#[inline]
pub async fn list_locations(json: bool) -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let store = LocationStore::new();
    store
        .load_folder(&config.locations_dir())
        .await
        .context("Failed to load locations")?;

    if json {
        let locations = store.snapshot().await;
        println!(
            "{}",
            serde_json::to_string_pretty(&locations).context("Failed to serialize locations")?
        );
    } else {
        print_locations(&store).await;
    }

    Ok(())
}

/// Delete every stored location file
#[inline]
pub fn reset_locations() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;
    let removed = documents::clear_folder(&config.locations_dir())?;
    println!("✓ All locations reset ({removed} files removed).");
    Ok(())
}

async fn check_embedding_backend(config: &Config) {
    if config.retrieval.embedder != EmbedderKind::Ollama {
        return;
    }

    let client = match OllamaClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            warn!("Cannot create Ollama client: {:#}", e);
            return;
        }
    };

    match tokio::task::spawn_blocking(move || client.health_check()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => eprintln!(
            "{} {:#}",
            style("⚠ Embedding server is not ready:").yellow(),
            e
        ),
        Err(e) => warn!("Health check task failed: {}", e),
    }
}

fn print_build_report(report: &BuildReport) {
    if report.is_ready() {
        eprintln!(
            "{} {} passages from {} documents",
            style("✓ Indexed").green(),
            report.chunks,
            report.documents_extracted
        );
    } else {
        eprintln!("{}", style("Index is empty.").yellow());
    }

    if report.documents_skipped > 0 {
        eprintln!("  Unsupported files skipped: {}", report.documents_skipped);
    }
    if report.documents_failed > 0 {
        eprintln!("  Files that could not be read: {}", report.documents_failed);
    }
    if let Some(reason) = &report.degraded {
        eprintln!("  {} {}", style("Problem:").red(), reason);
    }
}

fn print_location_report(report: &LocationIngestReport) {
    println!("Files uploaded: {}", report.files_uploaded);
    println!("Locations added: {}", report.locations_added);
    if report.rows_skipped > 0 {
        println!("Invalid rows skipped: {}", report.rows_skipped);
    }
}

async fn print_locations(store: &LocationStore) {
    let locations = store.snapshot().await;

    if locations.is_empty() {
        println!("No locations have been added yet.");
        println!("Use 'campus-rag locations add <file.csv>' to add some.");
        return;
    }

    println!("Campus Locations ({} total):", locations.len());
    for location in &locations {
        println!(
            "📍 {} ({:.5}, {:.5})",
            style(&location.name).bold(),
            location.lat,
            location.lon
        );
        if !location.details.is_empty() {
            println!("   {}", location.details);
        }
    }
}

use clap::{Parser, Subcommand};
use campus_rag::Result;
use campus_rag::commands::{
    add_documents, add_locations, ask, chat, index_documents, list_locations, reset_documents,
    reset_locations,
};
use campus_rag::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "campus-rag")]
#[command(about = "A campus information assistant that answers from your own documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure embedding and answer backends
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Rebuild the search index from the document folder
    Index,
    /// Ask a single question
    Ask {
        /// The question to answer
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Start an interactive chat
    Chat,
    /// Manage knowledge-base documents
    Documents {
        #[command(subcommand)]
        action: DocumentsAction,
    },
    /// Manage campus map locations
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },
}

#[derive(Subcommand)]
enum DocumentsAction {
    /// Copy PDF, spreadsheet or text files into the knowledge base and re-index
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Remove every document
    Reset,
}

#[derive(Subcommand)]
enum LocationsAction {
    /// Import locations from CSV files with name, details, lat and lon columns
    Add {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List known locations
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every location
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Index => {
            index_documents().await?;
        }
        Commands::Ask { question } => {
            ask(&question.join(" ")).await?;
        }
        Commands::Chat => {
            chat().await?;
        }
        Commands::Documents { action } => match action {
            DocumentsAction::Add { files } => add_documents(&files).await?,
            DocumentsAction::Reset => reset_documents()?,
        },
        Commands::Locations { action } => match action {
            LocationsAction::Add { files } => add_locations(&files).await?,
            LocationsAction::List { json } => list_locations(json).await?,
            LocationsAction::Reset => reset_locations()?,
        },
    }

    Ok(())
}

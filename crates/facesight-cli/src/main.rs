use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "facesight", about = "FaceSight face recognition CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect faces in one image (path or URL)
    Detect {
        /// Image reference
        reference: String,
    },
    /// Detect faces across several images
    Batch {
        /// Image references
        references: Vec<String>,
    },
    /// Compare the strongest face of two images
    Compare {
        reference_a: String,
        reference_b: String,
    },
    /// Rank stored candidates against the strongest face of an image
    Match {
        /// Probe image reference
        reference: String,
        /// Path to a JSON file with [{"id", "embedding": {"values": [...]}}]
        candidates_file: String,
    },
    /// Show model and backend information
    Info,
    /// Show processing statistics
    Stats,
    /// Show daemon status
    Status,
}

#[zbus::proxy(
    interface = "org.freedesktop.FaceSight1",
    default_service = "org.freedesktop.FaceSight1",
    default_path = "/org/freedesktop/FaceSight1"
)]
trait FaceSight {
    async fn detect_photo(&self, reference: &str) -> zbus::Result<String>;
    async fn detect_batch(&self, references: Vec<String>) -> zbus::Result<String>;
    async fn compare_faces(&self, reference_a: &str, reference_b: &str) -> zbus::Result<String>;
    async fn match_face(&self, reference: &str, candidates: &str) -> zbus::Result<String>;
    async fn model_info(&self) -> zbus::Result<String>;
    async fn performance_stats(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let connection = zbus::Connection::session()
        .await
        .context("could not connect to the session bus — is facesightd running?")?;
    let proxy = FaceSightProxy::new(&connection).await?;

    let reply = match cli.command {
        Commands::Detect { reference } => proxy.detect_photo(&reference).await?,
        Commands::Batch { references } => proxy.detect_batch(references).await?,
        Commands::Compare {
            reference_a,
            reference_b,
        } => proxy.compare_faces(&reference_a, &reference_b).await?,
        Commands::Match {
            reference,
            candidates_file,
        } => {
            let candidates = std::fs::read_to_string(&candidates_file)
                .with_context(|| format!("could not read {candidates_file}"))?;
            proxy.match_face(&reference, &candidates).await?
        }
        Commands::Info => proxy.model_info().await?,
        Commands::Stats => proxy.performance_stats().await?,
        Commands::Status => proxy.status().await?,
    };

    print_json(&reply);
    Ok(())
}

/// Pretty-print when the reply parses as JSON, raw otherwise.
fn print_json(reply: &str) {
    match serde_json::from_str::<serde_json::Value>(reply) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{reply}"),
        },
        Err(_) => println!("{reply}"),
    }
}

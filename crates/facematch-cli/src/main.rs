use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facematch_core::{scorer, Embedding, DEFAULT_TOLERANCE};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[zbus::proxy(
    interface = "org.facematch.Identity1",
    default_service = "org.facematch.Identity1",
    default_path = "/org/facematch/Identity1"
)]
trait Identity {
    fn register(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        department: &str,
        notes: &str,
        image: &[u8],
    ) -> zbus::Result<String>;
    fn recognize(&self, image: &[u8], tolerance: f64) -> zbus::Result<String>;
    fn encode(&self, image: &[u8]) -> zbus::Result<Vec<f64>>;
    fn detect(&self, image: &[u8]) -> zbus::Result<u32>;
    fn get_identity(&self, id: &str) -> zbus::Result<String>;
    fn list_identities(&self) -> zbus::Result<String>;
    fn update_identity(&self, id: &str, fields: HashMap<&str, &str>) -> zbus::Result<String>;
    fn delete_identity(&self, id: &str) -> zbus::Result<()>;
    fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facematch", about = "facematch identity CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new identity from a photo with exactly one face
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Image file
        image: PathBuf,
    },
    /// Identify the person in a photo
    Recognize {
        image: PathBuf,
        /// Maximum distance for a match (daemon default when omitted)
        #[arg(short, long)]
        tolerance: Option<f64>,
    },
    /// Print the embedding of the face in a photo
    Encode { image: PathBuf },
    /// Count the faces in a photo
    Detect { image: PathBuf },
    /// List registered identities
    List,
    /// Show one identity
    Show { id: String },
    /// Update profile fields of an identity
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete an identity
    Delete { id: String },
    /// Show daemon status
    Status,
    /// Compare two embeddings stored as JSON arrays (no daemon needed)
    Compare {
        a: PathBuf,
        b: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
        tolerance: f64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let system = cli.system;

    match cli.command {
        Commands::Register {
            name,
            email,
            phone,
            department,
            notes,
            image,
        } => {
            let image = read_image(&image)?;
            let json = connect(system)
                .await?
                .register(
                    &name,
                    &email,
                    phone.as_deref().unwrap_or(""),
                    department.as_deref().unwrap_or(""),
                    notes.as_deref().unwrap_or(""),
                    &image,
                )
                .await?;
            print_json(&json)?;
        }
        Commands::Recognize { image, tolerance } => {
            let image = read_image(&image)?;
            let json = connect(system)
                .await?
                .recognize(&image, tolerance.unwrap_or(0.0))
                .await?;
            print_json(&json)?;
        }
        Commands::Encode { image } => {
            let image = read_image(&image)?;
            let values = connect(system).await?.encode(&image).await?;
            println!("{}", serde_json::to_string(&values)?);
        }
        Commands::Detect { image } => {
            let image = read_image(&image)?;
            println!("{}", connect(system).await?.detect(&image).await?);
        }
        Commands::List => {
            print_json(&connect(system).await?.list_identities().await?)?;
        }
        Commands::Show { id } => {
            print_json(&connect(system).await?.get_identity(&id).await?)?;
        }
        Commands::Update {
            id,
            name,
            email,
            phone,
            department,
            notes,
        } => {
            let mut fields = HashMap::new();
            for (key, value) in [
                ("name", &name),
                ("email", &email),
                ("phone", &phone),
                ("department", &department),
                ("notes", &notes),
            ] {
                if let Some(v) = value {
                    fields.insert(key, v.as_str());
                }
            }
            if fields.is_empty() {
                anyhow::bail!("nothing to update; pass at least one field");
            }
            print_json(&connect(system).await?.update_identity(&id, fields).await?)?;
        }
        Commands::Delete { id } => {
            connect(system).await?.delete_identity(&id).await?;
            println!("Deleted {id}");
        }
        Commands::Status => {
            print_json(&connect(system).await?.status().await?)?;
        }
        Commands::Compare { a, b, tolerance } => {
            let a = read_embedding(&a)?;
            let b = read_embedding(&b)?;
            let comparison = scorer::compare(&a, &b, tolerance)?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
    }

    Ok(())
}

async fn connect(system: bool) -> Result<IdentityProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await?
    } else {
        zbus::Connection::session().await?
    };
    IdentityProxy::new(&conn)
        .await
        .context("facematchd is not reachable on D-Bus")
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn read_embedding(path: &Path) -> Result<Embedding> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let values: Vec<f64> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of numbers", path.display()))?;
    Ok(Embedding::new(values))
}

/// Re-indent a JSON reply from the daemon.
fn print_json(raw: &str) -> Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

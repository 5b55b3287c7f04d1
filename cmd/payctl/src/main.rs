//! payctl - Operator CLI for the paylens point-of-sale service.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use paylens_encoder::{EncodeError, EncoderConfig, FaceEncoder, HttpEncoder};
use paylens_kv::RedbStore;
use paylens_pos::{Pos, PosConfig, PosError, PurchaseRequest};

/// Operator CLI for the paylens point-of-sale service.
///
/// Enrolls customers from photos, runs face-matched payments, and manages
/// inventory against a local database. Photo commands need the embedding
/// sidecar reachable at --encoder-url.
#[derive(Parser)]
#[command(name = "payctl")]
#[command(about = "Face-match point-of-sale CLI")]
#[command(version)]
struct Cli {
    /// Database file
    #[arg(long, global = true, default_value = "paylens.redb")]
    db: PathBuf,

    /// Embedding sidecar base URL
    #[arg(long, global = true)]
    encoder_url: Option<String>,

    /// Embedding dimensionality
    #[arg(long, global = true, default_value_t = paylens_pos::DEFAULT_DIMENSION)]
    dimension: usize,

    /// Match threshold (maximum face distance)
    #[arg(long, global = true, default_value_t = paylens_pos::DEFAULT_MATCH_THRESHOLD)]
    threshold: f32,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new customer from a photo
    Enroll {
        /// Display name
        #[arg(long)]
        name: String,

        /// Photo file (jpeg/png)
        #[arg(long)]
        photo: PathBuf,
    },

    /// Charge a purchase authenticated by a photo
    Pay {
        /// Photo file (jpeg/png)
        #[arg(long)]
        photo: PathBuf,

        /// Purchase request JSON file:
        /// {"description", "total_amount", "items": [{"item_id", "quantity", "price"}]}
        #[arg(long)]
        request: PathBuf,
    },

    /// Show who a photo matches and their balance
    Identify {
        /// Photo file (jpeg/png)
        #[arg(long)]
        photo: PathBuf,
    },

    /// List enrolled identities
    Identities,

    /// List inventory
    Inventory,

    /// Set an item's sellable quantity
    Stock {
        /// Item id
        #[arg(long)]
        item: u32,

        /// Quantity remaining
        #[arg(long)]
        qty: u32,
    },

    /// List committed transactions for one identity
    Transactions {
        /// Identity id
        #[arg(long)]
        identity: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_target(false)
            .init();
    }

    let store = RedbStore::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;
    let pos = Pos::open(
        Box::new(store),
        PosConfig::default()
            .with_dimension(cli.dimension)
            .with_threshold(cli.threshold),
    )?;

    match &cli.command {
        Commands::Enroll { name, photo } => {
            let embedding = encode_photo(&cli, photo).await?;
            let identity = pos.enroll(name, &embedding)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&identity)?);
            } else {
                println!(
                    "enrolled {} ({}) with balance {:.2}",
                    identity.name, identity.id, identity.balance
                );
            }
        }

        Commands::Pay { photo, request } => {
            let data = std::fs::read(request)
                .with_context(|| format!("reading request {}", request.display()))?;
            let request: PurchaseRequest =
                serde_json::from_slice(&data).context("parsing purchase request")?;

            let embedding = encode_photo(&cli, photo).await?;
            let receipt = pos.charge(&embedding, &request)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!(
                    "charged {} {:.2} for {} items ({})",
                    receipt.identity_name,
                    receipt.transaction.amount,
                    receipt.transaction.total_quantity,
                    receipt.transaction.description,
                );
                println!(
                    "transaction {}, remaining balance {:.2}",
                    receipt.transaction.id, receipt.transaction.balance
                );
            }
        }

        Commands::Identify { photo } => {
            let embedding = encode_photo(&cli, photo).await?;
            match pos.identify(&embedding)? {
                Some((identity, distance)) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&identity)?);
                    } else {
                        println!(
                            "{} ({}) balance {:.2}, distance {distance:.3}",
                            identity.name, identity.id, identity.balance
                        );
                    }
                }
                None => println!("no match"),
            }
        }

        Commands::Identities => {
            let identities = pos.identities()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&identities)?);
            } else {
                for identity in identities {
                    println!(
                        "{}  {}  balance {:.2}",
                        identity.id, identity.name, identity.balance
                    );
                }
            }
        }

        Commands::Inventory => {
            let entries = pos.inventory()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!("item {:>6}  remaining {}", entry.item_id, entry.quantity_remaining);
                }
            }
        }

        Commands::Stock { item, qty } => {
            let entry = pos.stock_item(*item, *qty)?;
            println!("item {} stocked at {}", entry.item_id, entry.quantity_remaining);
        }

        Commands::Transactions { identity } => {
            let transactions = pos.transactions_for(*identity)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&transactions)?);
            } else {
                for txn in transactions {
                    println!(
                        "{}  {}  amount {:.2}  qty {}  balance {:.2}  {}",
                        txn.created_at.format("%Y-%m-%d %H:%M:%S"),
                        txn.id,
                        txn.amount,
                        txn.total_quantity,
                        txn.balance,
                        txn.description,
                    );
                }
            }
        }
    }

    Ok(())
}

/// Read a photo and reduce it to an embedding via the sidecar, mapping
/// extraction failures to the service's error kinds.
async fn encode_photo(cli: &Cli, photo: &PathBuf) -> Result<Vec<f32>> {
    let image = std::fs::read(photo)
        .with_context(|| format!("reading photo {}", photo.display()))?;

    let mut cfg = EncoderConfig::default().with_dimension(cli.dimension);
    if let Some(url) = &cli.encoder_url {
        cfg = cfg.with_base_url(url);
    }
    let encoder = HttpEncoder::with_config(cfg);

    match encoder.encode(&image).await {
        Ok(embedding) => Ok(embedding),
        Err(EncodeError::NoFace) => Err(PosError::NoFaceDetected.into()),
        Err(e @ (EncodeError::EmptyImage | EncodeError::InvalidImage(_))) => {
            Err(PosError::InvalidInput(e.to_string()).into())
        }
        Err(e) => Err(e).context("embedding sidecar request failed"),
    }
}

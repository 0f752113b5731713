use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use parceltrack::application::finance::FinanceService;
use parceltrack::application::seed::seed_demo;
use parceltrack::application::shipments::{NewShipment, ShipmentService};
use parceltrack::domain::fee::NewFeeLine;
use parceltrack::domain::money::Money;
use parceltrack::domain::payment::CardDetails;
use parceltrack::domain::ports::StoreBox;
use parceltrack::domain::shipment::{ShipmentStatus, TrackingId};
use parceltrack::infrastructure::in_memory::InMemoryLedger;
#[cfg(feature = "storage-rocksdb")]
use parceltrack::infrastructure::rocksdb::RocksStore;
use parceltrack::interfaces::csv::manifest_reader::ManifestReader;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB;
    /// otherwise state lives only for this invocation.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Enforce the forward status transition table instead of accepting any
    /// operator-driven transition.
    #[arg(long, global = true)]
    strict_transitions: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the demo shipments and print their fee breakdowns
    Seed,
    /// Import shipments and fee lines from a CSV manifest
    Import { input: PathBuf },
    /// List all shipments
    List,
    /// Show a shipment with its transition history
    Track { tracking_id: String },
    /// Show the fee breakdown for a shipment
    Fees { tracking_id: String },
    /// Attach a fee line to a shipment
    AddFee {
        tracking_id: String,
        name: String,
        amount: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove a fee line from a shipment
    RemoveFee { tracking_id: String, fee_id: u64 },
    /// Pay a shipment's outstanding fees (simulated)
    Pay {
        tracking_id: String,
        #[arg(long)]
        cardholder: String,
        #[arg(long)]
        card_number: String,
        #[arg(long)]
        expiry: Option<String>,
        #[arg(long)]
        cvv: Option<String>,
    },
    /// Move a shipment to a new status
    Advance {
        tracking_id: String,
        status: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a shipment and everything attached to it
    Delete { tracking_id: String },
}

fn open_store(db_path: &Option<PathBuf>) -> Result<(StoreBox, StoreBox)> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksStore::open(path).into_diagnostic()?;
            Ok((Box::new(store.clone()), Box::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette!(
            "--db-path requires a build with the storage-rocksdb feature"
        )),
        None => {
            let store = InMemoryLedger::new();
            Ok((Box::new(store.clone()), Box::new(store)))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let (shipment_store, finance_store) = open_store(&cli.db_path)?;
    let mut shipments = ShipmentService::new(shipment_store);
    if cli.strict_transitions {
        shipments = shipments.with_strict_transitions();
    }
    let finance = FinanceService::new(finance_store);

    match cli.command {
        Command::Seed => {
            let ids = seed_demo(&shipments, &finance).await.into_diagnostic()?;
            for id in ids {
                print_json(&finance.breakdown(&id).await.into_diagnostic()?)?;
            }
        }
        Command::Import { input } => {
            let file = File::open(&input).into_diagnostic()?;
            let touched = import_manifest(&shipments, &finance, file).await?;
            for id in touched {
                print_json(&finance.breakdown(&id).await.into_diagnostic()?)?;
            }
        }
        Command::List => {
            print_json(&shipments.list().await.into_diagnostic()?)?;
        }
        Command::Track { tracking_id } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            print_json(&shipments.track(&id).await.into_diagnostic()?)?;
        }
        Command::Fees { tracking_id } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            print_json(&finance.breakdown(&id).await.into_diagnostic()?)?;
        }
        Command::AddFee {
            tracking_id,
            name,
            amount,
            description,
        } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            let amount: Money = amount.parse().into_diagnostic()?;
            let fee = finance
                .add_fee(
                    &id,
                    NewFeeLine {
                        name,
                        amount,
                        description,
                    },
                )
                .await
                .into_diagnostic()?;
            print_json(&fee)?;
        }
        Command::RemoveFee {
            tracking_id,
            fee_id,
        } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            finance.remove_fee(&id, fee_id).await.into_diagnostic()?;
            print_json(&finance.breakdown(&id).await.into_diagnostic()?)?;
        }
        Command::Pay {
            tracking_id,
            cardholder,
            card_number,
            expiry,
            cvv,
        } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            let payment = finance
                .process_payment(
                    &id,
                    CardDetails {
                        cardholder_name: cardholder,
                        card_number,
                        expiry,
                        cvv,
                        card_type: None,
                    },
                )
                .await
                .into_diagnostic()?;
            print_json(&payment)?;
        }
        Command::Advance {
            tracking_id,
            status,
            location,
            note,
        } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            let status: ShipmentStatus = status.parse().into_diagnostic()?;
            let shipment = shipments
                .advance_status(&id, status, location, note)
                .await
                .into_diagnostic()?;
            print_json(&shipment)?;
        }
        Command::Delete { tracking_id } => {
            let id = TrackingId::parse(&tracking_id).into_diagnostic()?;
            shipments.delete_shipment(&id).await.into_diagnostic()?;
            println!("Deleted {id}");
        }
    }

    Ok(())
}

/// Replays a manifest through the services: the first row for a tracking id
/// creates the shipment, fee columns append fee lines (each reconciling the
/// owner's total). Rows without a tracking id create a fresh shipment with a
/// generated one. Returns the set of touched tracking ids.
async fn import_manifest(
    shipments: &ShipmentService,
    finance: &FinanceService,
    source: File,
) -> Result<BTreeSet<TrackingId>> {
    let mut touched: BTreeSet<TrackingId> = BTreeSet::new();
    let reader = ManifestReader::new(source);

    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                eprintln!("Error reading manifest row: {e}");
                continue;
            }
        };

        let id = match &record.tracking_id {
            Some(raw) => {
                let id = TrackingId::parse(raw).into_diagnostic()?;
                if shipments.shipment(&id).await.is_err() {
                    shipments
                        .create_shipment(NewShipment {
                            tracking_id: Some(id.clone()),
                            owner_name: record.owner_name.clone(),
                            destination: record.destination.clone(),
                            current_location: record.location.clone(),
                            ..Default::default()
                        })
                        .await
                        .into_diagnostic()?;
                }
                id
            }
            None => {
                shipments
                    .create_shipment(NewShipment {
                        owner_name: record.owner_name.clone(),
                        destination: record.destination.clone(),
                        current_location: record.location.clone(),
                        ..Default::default()
                    })
                    .await
                    .into_diagnostic()?
                    .tracking_id
            }
        };

        if let Some(fee_name) = record.fee_name {
            let amount = record
                .fee_amount
                .ok_or_else(|| miette!("Fee {fee_name} is missing an amount"))?;
            finance
                .add_fee(
                    &id,
                    NewFeeLine {
                        name: fee_name,
                        amount: Money::new(amount).into_diagnostic()?,
                        description: record.fee_description,
                    },
                )
                .await
                .into_diagnostic()?;
        }

        touched.insert(id);
    }

    Ok(touched)
}

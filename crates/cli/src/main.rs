//! Agência Check CLI - Operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Hash the bootstrap admin password for AGENCIA_ADMIN_PASSWORD_HASH
//! ac-cli hash-password 'Vx9!kq2#Lm'
//!
//! # Check a downloaded backup file
//! ac-cli backup verify backup-full-20240601-120000.json
//!
//! # Preview when a schedule would fire next
//! ac-cli schedule next --frequency weekly --time 02:00
//! ```
//!
//! # Commands
//!
//! - `hash-password` - Print an argon2 hash
//! - `backup verify` - Validate a backup file and print its section counts
//! - `schedule next` - Print the next run of a backup schedule

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};

use agencia_check_core::BackupFrequency;

mod commands;

#[derive(Parser)]
#[command(name = "ac-cli")]
#[command(author, version, about = "Agência Check CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an argon2 hash of a password
    HashPassword {
        /// Password to hash
        password: String,
    },
    /// Work with backup files
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Backup schedule arithmetic
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Validate a backup file (version, checksum, sections)
    Verify {
        /// Path to the downloaded backup JSON
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Print the next run of a schedule
    Next {
        /// Recurrence
        #[arg(short, long, value_enum)]
        frequency: Frequency,

        /// Local time of day (HH:MM or HH:MM:SS)
        #[arg(short, long, value_parser = parse_time)]
        time: NaiveTime,

        /// Compute from this instant (RFC 3339) instead of now
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// UTC offset of the schedule
        #[arg(long, default_value = "-03:00", allow_hyphen_values = true)]
        offset: FixedOffset,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl From<Frequency> for BackupFrequency {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => Self::Daily,
            Frequency::Weekly => Self::Weekly,
            Frequency::Monthly => Self::Monthly,
        }
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| format!("invalid time '{s}': {e}"))
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::HashPassword { password } => {
            let password = SecretString::from(password);
            commands::password::hash(password.expose_secret())?;
        }
        Commands::Backup { action } => match action {
            BackupAction::Verify { file } => {
                commands::backup::verify(&file).await?;
            }
        },
        Commands::Schedule { action } => match action {
            ScheduleAction::Next {
                frequency,
                time,
                from,
                offset,
            } => {
                commands::schedule::next(frequency.into(), time, from, offset);
            }
        },
    }
    Ok(())
}

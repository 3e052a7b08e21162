use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::{env, fs, sync::Arc};

use clap::{Parser, Subcommand};
use serde_json::Value;
use shared::types::{EmploymentStatus, StaffDraft, StaffId, StaffRecord};
use staff_sync::{
    config::{BASE_URL_ENV, ClientConfig, ConfigError},
    domain::{
        account::{AccountService, NewAccount, PasswordReset, RegisterRequest, ResetRequest},
        client::Download,
        payload::{Document, merge_draft},
        search::{SearchCriteria, SearchOutcome},
        service::StaffDirectory,
        session::{Credential, InMemorySession, SessionGuard},
    },
    error::StaffSyncError,
    infrastructure::client::HttpStaffClient,
};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "staff-sync")]
#[command(about = "Command-line client for the staff records API")]
#[command(version)]
struct Cli {
    /// Base URL of the staff API
    #[arg(long, global = true, env = BASE_URL_ENV)]
    api_url: Option<String>,

    /// Bearer token from a previous `login`
    #[arg(long, global = true, env = "STAFF_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an employer account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STAFF_API_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        confirm_password: String,
        #[arg(long)]
        company_name: String,
        #[arg(long)]
        firstname: String,
        #[arg(long)]
        lastname: String,
    },
    /// Log in and print the issued token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "STAFF_API_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Request a password reset code by email
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using an emailed code
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    /// Show the company overview and head counts
    Dashboard,
    /// List every staff record
    List {
        #[arg(long)]
        status: Option<EmploymentStatus>,
    },
    /// Show one staff record as JSON
    Show { id: String },
    /// Search by name, telephone or NI number
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long)]
        status: Option<EmploymentStatus>,
    },
    /// Add a staff record from a JSON file
    Add {
        #[arg(long)]
        record: PathBuf,
        /// Proof of identity (PDF, PNG, JPG or JPEG)
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// Update a staff record; fields missing from the JSON file keep their current values
    Edit {
        id: String,
        #[arg(long)]
        record: PathBuf,
        #[arg(long)]
        document: Option<PathBuf>,
    },
    /// Delete a staff record
    Delete { id: String },
    /// Download the staff list as a spreadsheet
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Download a staff member's proof of identity
    DownloadId {
        id: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Staff(#[from] StaffSyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid staff record in {}: {source}", path.display())]
    Record {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            Self::Staff(e) => e.user_message(),
            other => other.to_string(),
        }
    }

    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = shared::telemetry::init_telemetry("staff-sync", "warn");
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config_path =
        env::var("STAFF_SYNC_CONFIG_PATH").unwrap_or_else(|_| "staff-sync.toml".to_string());
    let config = ClientConfig::load(&config_path)?.with_base_url_override(cli.api_url);

    let session = Arc::new(match cli.token.filter(|token| !token.trim().is_empty()) {
        Some(token) => InMemorySession::with_credential(Credential::new(token)),
        None => InMemorySession::new(),
    });
    let client = Arc::new(HttpStaffClient::new(&config, session.clone())?);
    let accounts = AccountService::new(client.clone(), session.clone());
    let directory = StaffDirectory::new(client, config.search_breaker.clone());

    match cli.command {
        Command::Register {
            email,
            password,
            confirm_password,
            company_name,
            firstname,
            lastname,
        } => {
            let ack = accounts
                .register(RegisterRequest {
                    account: NewAccount {
                        email,
                        password,
                        company_name,
                        firstname,
                        lastname,
                    },
                    confirm_password,
                })
                .await?;
            print_ack(ack.message, "Registration successful");
        }
        Command::Login { email, password } => {
            let account = accounts.login(&email, &password).await?;
            if !account.company_name.is_empty() {
                eprintln!(
                    "Logged in as {} {} ({})",
                    account.firstname, account.lastname, account.company_name
                );
            }
            if let Some(credential) = session.get() {
                println!("{}", credential.token());
            }
        }
        Command::Logout => {
            accounts.logout().await?;
            println!("Logged out");
        }
        Command::ForgotPassword { email } => {
            let ack = accounts.forgot_password(&email).await?;
            print_ack(ack.message, "Reset code sent");
        }
        Command::ResetPassword {
            email,
            code,
            password,
            confirm_password,
        } => {
            let ack = accounts
                .reset_password(ResetRequest {
                    reset: PasswordReset {
                        email,
                        code,
                        password,
                    },
                    confirm_password,
                })
                .await?;
            print_ack(ack.message, "Password reset successful");
        }
        Command::Dashboard => {
            let summary = directory.dashboard().await?;
            if let Some(company) = &summary.company_name {
                println!("{company}");
            }
            println!("Total staff: {}", summary.total_staff);
            let statistics = &summary.statistics;
            for (title, breakdown) in [
                ("Employment status", &statistics.employment_status_breakdown),
                ("Immigration status", &statistics.immigration_status_breakdown),
                ("Sex", &statistics.gender_breakdown),
            ] {
                if breakdown.is_empty() {
                    continue;
                }
                println!("{title}:");
                for (label, count) in breakdown {
                    println!("  {label}\t{count}");
                }
            }
            summary.staff.iter().for_each(print_row);
        }
        Command::List { status } => {
            directory.refresh().await?;
            directory
                .records()
                .await
                .iter()
                .filter(|record| status.is_none_or(|s| record.employment_status == Some(s)))
                .for_each(print_row);
        }
        Command::Show { id } => {
            let record = directory.fetch(&StaffId::new(id)).await?;
            let json = serde_json::to_string_pretty(&record).map_err(|e| {
                StaffSyncError::Transport(format!("Failed to encode staff record: {e}"))
            })?;
            println!("{json}");
        }
        Command::Search { query, status } => {
            directory.refresh().await?;
            let outcome = directory
                .search(&SearchCriteria::new(query, status))
                .await?;
            if let SearchOutcome::Fallback { cause, .. } = &outcome {
                eprintln!("{} Showing local matches.", cause.user_message());
            }
            directory.filtered().await.iter().for_each(print_row);
        }
        Command::Add { record, document } => {
            let draft = read_draft(&record)?;
            let document = document.as_deref().map(read_document).transpose()?;
            let ack = directory.create(draft, document).await?;
            print_ack(ack.message, "Staff added");
            if let Some(id) = ack.staff_id {
                println!("{id}");
            }
        }
        Command::Edit {
            id,
            record,
            document,
        } => {
            let id = StaffId::new(id);
            let current = directory.fetch(&id).await?;
            let draft = read_changes(current.to_draft(), &record)?;
            let document = document.as_deref().map(read_document).transpose()?;
            let ack = directory.update(id, draft, document).await?;
            print_ack(ack.message, "Staff updated");
        }
        Command::Delete { id } => {
            directory.refresh().await?;
            let ack = directory.delete(StaffId::new(id)).await?;
            print_ack(ack.message, "Staff deleted");
        }
        Command::Export { out } => {
            let download = directory.export_excel().await?;
            save(download, out)?;
        }
        Command::DownloadId { id, out } => {
            let download = directory.download_proof_of_id(&StaffId::new(id)).await?;
            save(download, out)?;
        }
    }

    Ok(())
}

fn print_row(record: &StaffRecord) {
    let status = record
        .employment_status
        .map(|s| s.as_str())
        .unwrap_or("-");
    println!(
        "{}\t{}\t{}\t{}",
        record.id,
        record.full_name(),
        status,
        record.telephone_number
    );
}

fn print_ack(message: Option<String>, fallback: &str) {
    println!("{}", message.as_deref().unwrap_or(fallback));
}

fn read_draft(path: &Path) -> Result<StaffDraft, CliError> {
    let content = fs::read(path).map_err(CliError::io(path))?;
    serde_json::from_slice(&content).map_err(|source| CliError::Record {
        path: path.to_path_buf(),
        source,
    })
}

fn read_changes(current: Option<StaffDraft>, path: &Path) -> Result<StaffDraft, CliError> {
    let invalid = |source| CliError::Record {
        path: path.to_path_buf(),
        source,
    };
    let content = fs::read(path).map_err(CliError::io(path))?;
    let changes: Value = serde_json::from_slice(&content).map_err(invalid)?;
    merge_draft(current, changes).map_err(invalid)
}

fn read_document(path: &Path) -> Result<Document, CliError> {
    let bytes = fs::read(path).map_err(CliError::io(path))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Document::new(filename, bytes)?)
}

fn save(download: Download, out: Option<PathBuf>) -> Result<(), CliError> {
    let path = out
        .or_else(|| download.filename.map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("download"));
    fs::write(&path, &download.bytes).map_err(CliError::io(&path))?;
    println!("Saved {} bytes to {}", download.bytes.len(), path.display());
    Ok(())
}

//! sheets_client CLI - Work with Google Drive files and spreadsheets.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use sheets_client::client::{DEFAULT_EXPORT_MIME_TYPE, DEFAULT_ID_COUNT};
use sheets_client::models::{format_size, Metadata, MIME_TYPE_SPREADSHEET};
use sheets_client::{
    extract_id, Authenticator, ClientConfig, Credentials, ReqwestTransport, SheetsClient,
};

/// CLI tool for Google Drive files and Google Sheets values.
#[derive(Parser)]
#[command(name = "sheets_client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON credentials file.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// OAuth2 access token, used instead of service account credentials.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// User to impersonate with the service account (domain-wide delegation).
    #[arg(long, env = "GOOGLE_IMPERSONATE_SUBJECT")]
    subject: Option<String>,

    /// Include shared drives in Drive requests.
    #[arg(long, env = "SHEETS_CLIENT_ALL_DRIVES")]
    all_drives: bool,

    /// Comma-separated fields to request for files (replaces the defaults).
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show file metadata.
    Get {
        /// File URL or ID.
        file: String,
    },

    /// List files, optionally filtered with a Drive query.
    List {
        /// Drive query, e.g. "name contains 'report'".
        #[arg(long, short = 'q', default_value = "")]
        query: String,
    },

    /// Check whether a file exists.
    Exists {
        /// File URL or ID.
        file: String,
    },

    /// Upload files (supports glob patterns like *.csv, file_{1,2,3}.csv).
    Upload {
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder URL or ID.
        #[arg(long, short = 'p')]
        parent: Option<String>,

        /// Convert uploads into native spreadsheets.
        #[arg(long)]
        convert: bool,
    },

    /// Export a native document to a local file.
    Export {
        /// File URL or ID.
        file: String,

        #[arg(long, default_value = DEFAULT_EXPORT_MIME_TYPE)]
        mime_type: String,

        /// Local destination path.
        #[arg(long, short = 't')]
        to: PathBuf,
    },

    /// Delete a file.
    Delete {
        /// File URL or ID.
        file: String,
    },

    /// Reserve file IDs.
    Ids {
        #[arg(long, default_value_t = DEFAULT_ID_COUNT)]
        count: u32,
    },

    /// Show spreadsheet properties and sheets.
    Spreadsheet {
        /// Spreadsheet URL or ID.
        spreadsheet: String,
    },

    /// Print the values of a range.
    Values {
        /// Spreadsheet URL or ID.
        spreadsheet: String,
        /// Sheet title or A1 range.
        range: String,
    },

    /// Append rows given as a JSON array of arrays, or @path to a JSON file.
    Append {
        spreadsheet: String,
        range: String,
        rows: String,
    },

    /// Clear a range.
    Clear {
        spreadsheet: String,
        range: String,
    },

    /// List revisions of a file.
    Revisions {
        /// File URL or ID.
        file: String,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheets_client=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn credentials(cli: &Cli) -> Result<Credentials> {
    if let Some(token) = &cli.access_token {
        return Ok(Credentials::Bearer(token.clone()));
    }
    let path = cli
        .credentials
        .as_ref()
        .context("Either --access-token or --credentials is required")?;
    let mut auth = Authenticator::from_file(path)
        .with_context(|| format!("Failed to load credentials from {:?}", path))?;
    if let Some(subject) = &cli.subject {
        auth = auth.with_subject(subject.clone());
    }
    Ok(Credentials::ServiceAccount(auth))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let transport = ReqwestTransport::new(credentials(&cli)?);
    let mut config = ClientConfig::default().with_all_drives(cli.all_drives);
    if !cli.fields.is_empty() {
        config = config.with_default_fields(cli.fields.clone());
    }
    let client = SheetsClient::with_config(Arc::new(transport), config);

    match cli.command {
        Commands::Get { file } => {
            let file_id = parse_id(&file)?;
            let metadata = client
                .get_file(&file_id, &[])
                .await
                .with_context(|| format!("Failed to get file: {}", file_id))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }

        Commands::List { query } => {
            let list = client
                .list_files(&query)
                .await
                .context("Failed to list files")?;

            if list.files.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<44} {:<40} {}", "ID", "TYPE", "NAME");
                println!("{}", "-".repeat(100));
                for file in list.files {
                    println!("{}", file);
                }
            }
        }

        Commands::Exists { file } => {
            let file_id = parse_id(&file)?;
            let exists = client
                .file_exists(&file_id)
                .await
                .with_context(|| format!("Failed to check file: {}", file_id))?;
            println!("{}", exists);
        }

        Commands::Upload {
            patterns,
            parent,
            convert,
        } => {
            let files_to_upload = expand_patterns(&patterns)?;
            if files_to_upload.is_empty() {
                anyhow::bail!("No files to upload");
            }

            let mut metadata = Metadata::new();
            if let Some(parent) = parent {
                metadata.insert("parents".to_string(), json!([parse_id(&parent)?]));
            }
            if convert {
                metadata.insert("mimeType".to_string(), json!(MIME_TYPE_SPREADSHEET));
            }

            for (idx, file_path) in files_to_upload.iter().enumerate() {
                let title = file_path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                print!("[{}/{}] Uploading {}... ", idx + 1, files_to_upload.len(), title);

                match client.create_file(file_path, &title, metadata.clone()).await {
                    Ok(file) => println!("OK ({})", file.id.unwrap_or_default()),
                    Err(e) => {
                        println!("FAILED");
                        eprintln!("  Error: {}", e);
                    }
                }
            }

            println!("Done.");
        }

        Commands::Export {
            file,
            mime_type,
            to,
        } => {
            let file_id = parse_id(&file)?;
            let response = client
                .export_file(&file_id, &mime_type)
                .await
                .with_context(|| format!("Failed to export file: {}", file_id))?;
            tokio::fs::write(&to, &response.body)
                .await
                .with_context(|| format!("Failed to write {:?}", to))?;
            println!(
                "Saved {} to {:?}",
                format_size(response.body.len() as u64),
                to
            );
        }

        Commands::Delete { file } => {
            let file_id = parse_id(&file)?;
            let response = client
                .delete_file(&file_id)
                .await
                .with_context(|| format!("Failed to delete file: {}", file_id))?;
            println!("Deleted {} (status {})", file_id, response.status);
        }

        Commands::Ids { count } => {
            let ids = client
                .generate_ids(count)
                .await
                .context("Failed to generate ids")?;
            for id in ids.ids {
                println!("{}", id);
            }
        }

        Commands::Spreadsheet { spreadsheet } => {
            let spreadsheet_id = parse_id(&spreadsheet)?;
            let spreadsheet = client
                .get_spreadsheet(&spreadsheet_id)
                .await
                .with_context(|| format!("Failed to get spreadsheet: {}", spreadsheet_id))?;
            println!(
                "{}",
                spreadsheet.properties.title.as_deref().unwrap_or("-")
            );
            for sheet in spreadsheet.sheets {
                println!(
                    "  {}\t{}",
                    sheet
                        .properties
                        .sheet_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                    sheet.properties.title.unwrap_or_default()
                );
            }
        }

        Commands::Values { spreadsheet, range } => {
            let spreadsheet_id = parse_id(&spreadsheet)?;
            let values = client
                .get_spreadsheet_values(&spreadsheet_id, &range, &[])
                .await
                .with_context(|| format!("Failed to read range: {}", range))?;
            for row in values.rows() {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                println!("{}", cells.join("\t"));
            }
        }

        Commands::Append {
            spreadsheet,
            range,
            rows,
        } => {
            let spreadsheet_id = parse_id(&spreadsheet)?;
            let rows = parse_rows(&rows)?;
            let response = client
                .append_spreadsheet_values(&spreadsheet_id, &range, rows)
                .await
                .with_context(|| format!("Failed to append to range: {}", range))?;
            let updated = response
                .updates
                .and_then(|u| u.updated_range)
                .unwrap_or_default();
            println!("Appended to {}", updated);
        }

        Commands::Clear { spreadsheet, range } => {
            let spreadsheet_id = parse_id(&spreadsheet)?;
            let response = client
                .clear_spreadsheet_values(&spreadsheet_id, &range)
                .await
                .with_context(|| format!("Failed to clear range: {}", range))?;
            println!("Cleared {}", response.cleared_range.unwrap_or(range));
        }

        Commands::Revisions { file } => {
            let file_id = parse_id(&file)?;
            let revisions = client
                .list_revisions(&file_id, &[])
                .await
                .with_context(|| format!("Failed to list revisions: {}", file_id))?;
            for revision in revisions.revisions {
                println!(
                    "{}\t{}\t{}",
                    revision.id.unwrap_or_default(),
                    revision.modified_time.unwrap_or_default(),
                    revision.mime_type.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn parse_id(url_or_id: &str) -> Result<String> {
    extract_id(url_or_id).with_context(|| format!("Invalid URL or ID: {}", url_or_id))
}

/// Parse rows from inline JSON or from a file when prefixed with `@`.
fn parse_rows(arg: &str) -> Result<Vec<Vec<Value>>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rows from {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("Rows must be a JSON array of arrays")
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve upload arguments to files: braces first, then globs. A pattern
/// that globs to nothing is kept if it names an existing file.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for pattern in patterns.iter().flat_map(|p| expand_braces(p)) {
        let before = files.len();
        for entry in glob(&pattern).with_context(|| format!("Invalid glob pattern: {}", pattern))? {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "Skipping unreadable path"),
            }
        }

        if files.len() == before {
            let literal = PathBuf::from(&pattern);
            if literal.is_file() {
                files.insert(literal);
            } else {
                tracing::warn!(%pattern, "No files matched pattern");
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// `data_{a,b}_{1,2}.csv` becomes four patterns, leftmost group varying slowest.
fn expand_braces(pattern: &str) -> Vec<String> {
    let group = pattern
        .find('{')
        .and_then(|open| pattern[open..].find('}').map(|len| (open, open + len)));

    let Some((open, close)) = group else {
        return vec![pattern.to_string()];
    };

    let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
    pattern[open + 1..close]
        .split(',')
        .flat_map(|choice| expand_braces(&format!("{head}{}{tail}", choice.trim())))
        .collect()
}

//! DocShield CLI: run the pipeline's checks and redactions against local files.
//!
//! Reputation lookups read the same environment as the services
//! (`REPUTATION_PROVIDER`, `CLAMAV_HOST`, ...). Redaction uses `pdftoppm`
//! unless `--blank` is given.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docshield_cli::{
    init_tracing, load_areas, print_json, read_document, rule_selection, style_from_args,
    write_document,
};
use docshield_core::{PatternConfig, RedactionConfig, ReputationConfig};
use docshield_processing::BlankRasterizer;
use docshield_services::{
    extract_text, hash_access_password, verify_grant, ContentScanner, PatternLibrary,
    RedactionEngine, ReputationGate, StructuralValidator,
};
use uuid::Uuid;

const MIN_ACCESS_PASSWORD_LEN: usize = 8;

#[derive(Parser)]
#[command(name = "docshield", about = "DocShield document safety and redaction CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List redaction templates, or the rule catalog with --rules
    Templates {
        #[arg(long)]
        rules: bool,
    },
    /// Find and replace sensitive data in text
    ScanText {
        /// Text to scan (reads --file when omitted)
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Rule ids, or template:rule pairs
        #[arg(long, value_delimiter = ',')]
        rules: Vec<String>,
        #[arg(long)]
        template: Option<String>,
    },
    /// Structural validation of a document
    Validate {
        file: PathBuf,
        /// Declared MIME type to check the content against
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Page count and page sizes
    Info { file: PathBuf },
    /// Structural validation plus reputation lookup
    Gate { file: PathBuf },
    /// Draw redaction boxes without removing content
    Preview {
        input: PathBuf,
        output: PathBuf,
        /// JSON array of areas, or @path to a JSON file
        #[arg(long)]
        areas: String,
        /// Fill color as #RRGGBB
        #[arg(long)]
        fill: Option<String>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Permanently redact areas, rasterizing the affected pages
    Redact {
        input: PathBuf,
        output: PathBuf,
        /// JSON array of areas, or @path to a JSON file
        #[arg(long)]
        areas: String,
        #[arg(long)]
        fill: Option<String>,
        /// Override REDACTION_DPI
        #[arg(long)]
        dpi: Option<u32>,
        /// Replace affected pages with blank pixels instead of rendering them
        #[arg(long)]
        blank: bool,
    },
    /// Text recovered from each PDF page
    ExtractText { file: PathBuf },
    /// Hash an access password (reads stdin when --password is omitted)
    HashPassword {
        #[arg(long)]
        password: Option<String>,
    },
    /// Check an access grant against ACCESS_GRANT_SECRET
    VerifyGrant {
        token: String,
        #[arg(long)]
        document: Uuid,
    },
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn read_password_line() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Templates { rules } => {
            let library = PatternLibrary::from_config(&PatternConfig::from_env())?;
            if rules {
                print_json(&library.system_rules())?;
            } else {
                print_json(&library.list_templates())?;
            }
        }
        Commands::ScanText {
            text,
            file,
            rules,
            template,
        } => {
            let text = match (text, file) {
                (Some(text), None) => text,
                (None, Some(path)) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                _ => bail!("Provide either TEXT or --file"),
            };
            let selection = rule_selection(&rules, template)?;
            let library = PatternLibrary::from_config(&PatternConfig::from_env())?;
            let scanner = ContentScanner::new(Arc::new(library));
            print_json(&scanner.scan(&text, &selection)?)?;
        }
        Commands::Validate { file, content_type } => {
            let data = read_document(&file).await?;
            let validator = StructuralValidator::new();
            let report = match content_type {
                Some(mime) => validator.validate_declared(&data, &mime),
                None => validator.validate(&data),
            };
            print_json(&report)?;
        }
        Commands::Info { file } => {
            let data = read_document(&file).await?;
            let engine = RedactionEngine::from_config(&RedactionConfig::from_env());
            print_json(&engine.get_info(&data)?)?;
        }
        Commands::Gate { file } => {
            let data = read_document(&file).await?;
            let gate = ReputationGate::from_config(&ReputationConfig::from_env()?)?;
            let scan = gate.scan(&data, &file_name(&file)).await;
            print_json(&scan)?;
        }
        Commands::Preview {
            input,
            output,
            areas,
            fill,
            label,
        } => {
            let data = read_document(&input).await?;
            let areas = load_areas(&areas).await?;
            let style = style_from_args(fill.as_deref(), label)?;
            let engine = RedactionEngine::from_config(&RedactionConfig::from_env());

            let preview = engine.preview(&data, &areas, &style)?;
            write_document(&output, preview.as_bytes()).await?;
            print_json(&serde_json::json!({
                "output": output,
                "size": preview.as_bytes().len(),
                "areas": areas.len(),
                "permanent": false,
            }))?;
        }
        Commands::Redact {
            input,
            output,
            areas,
            fill,
            dpi,
            blank,
        } => {
            let data = read_document(&input).await?;
            let areas = load_areas(&areas).await?;
            let style = style_from_args(fill.as_deref(), None)?;

            let mut config = RedactionConfig::from_env();
            if let Some(dpi) = dpi {
                config.dpi = dpi;
            }
            let engine = if blank {
                RedactionEngine::new(Arc::new(BlankRasterizer), config.dpi)
            } else {
                RedactionEngine::from_config(&config)
            };

            let redacted = engine
                .apply_permanent(&data, &areas, &style)
                .await?
                .into_permanent()
                .context("Redaction engine returned a preview")?;
            write_document(&output, &redacted.bytes).await?;
            print_json(&serde_json::json!({
                "output": output,
                "format": redacted.format,
                "size": redacted.bytes.len(),
                "redaction_count": redacted.redaction_count,
                "pages_flattened": redacted.pages_flattened,
                "flattened": redacted.flattened,
                "permanent": true,
            }))?;
        }
        Commands::ExtractText { file } => {
            let data = read_document(&file).await?;
            print_json(&extract_text(&data)?)?;
        }
        Commands::HashPassword { password } => {
            let password = match password {
                Some(password) => password,
                None => read_password_line()?,
            };
            if password.chars().count() < MIN_ACCESS_PASSWORD_LEN {
                bail!(
                    "Access passwords must be at least {} characters",
                    MIN_ACCESS_PASSWORD_LEN
                );
            }
            print_json(&serde_json::json!({ "hash": hash_access_password(&password)? }))?;
        }
        Commands::VerifyGrant { token, document } => {
            let secret = std::env::var("ACCESS_GRANT_SECRET")
                .context("ACCESS_GRANT_SECRET must be set to verify grants")?;
            print_json(&verify_grant(&secret, &token, document)?)?;
        }
    }

    Ok(())
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};

const DEFAULT_URL: &str = "http://localhost:8000";
const DEFAULT_API_PREFIX: &str = "/api/v1";

#[derive(Parser)]
#[command(name = "facecmp", about = "Face comparison client for facecmpd")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the faces in two images
    Compare {
        /// Image containing the reference face (JPEG or PNG)
        #[arg(short, long)]
        source: PathBuf,
        /// Image to search for the reference face
        #[arg(short, long)]
        target: PathBuf,
        /// Minimum similarity (0-100) for a face to count as a match
        #[arg(long)]
        threshold: Option<f64>,
        /// Base URL of the daemon
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
        /// Versioned API prefix the daemon serves (FACECMP_API_V1_STR)
        #[arg(long, default_value = DEFAULT_API_PREFIX)]
        api_prefix: String,
    },
    /// Check that the daemon is up
    Health {
        #[arg(long, default_value = DEFAULT_URL)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let http = reqwest::Client::new();

    match cli.command {
        Commands::Compare {
            source,
            target,
            threshold,
            url,
            api_prefix,
        } => {
            let mut form = Form::new()
                .part("image_source", file_part(&source).await?)
                .part("image_target", file_part(&target).await?);
            if let Some(t) = threshold {
                form = form.text("similarity_threshold", t.to_string());
            }

            let endpoint = compare_endpoint(&url, &api_prefix);
            tracing::debug!(%endpoint, "uploading images");
            let resp = http
                .post(&endpoint)
                .multipart(form)
                .send()
                .await
                .with_context(|| format!("cannot reach {endpoint}"))?;
            print_response(resp).await?;
        }
        Commands::Health { url } => {
            let endpoint = format!("{}/health", url.trim_end_matches('/'));
            let resp = http
                .get(&endpoint)
                .send()
                .await
                .with_context(|| format!("cannot reach {endpoint}"))?;
            print_response(resp).await?;
        }
    }

    Ok(())
}

fn compare_endpoint(url: &str, api_prefix: &str) -> String {
    let prefix = api_prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/compare-faces/", url.trim_end_matches('/'))
    } else {
        format!("{}/{prefix}/compare-faces/", url.trim_end_matches('/'))
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(Part::bytes(bytes)
        .file_name(filename)
        .mime_str(content_type_for(path))?)
}

/// MIME type from the file extension. Unknown extensions are sent as-is so
/// the daemon reports the rejection.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

async fn print_response(resp: reqwest::Response) -> Result<()> {
    let status = resp.status();
    let body = resp.text().await?;
    let json: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("HTTP {status}: response is not JSON: {body}"))?;

    if !status.is_success() {
        let detail = json
            .get("detail")
            .and_then(|d| d.as_str())
            .unwrap_or("no detail");
        bail!("HTTP {}: {detail}", status.as_u16());
    }

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pdf_ocr::client::{ClientOptions, PendingFile, UploadClient, DEFAULT_ENDPOINT};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Upload a PDF to the OCR service and print the extracted text.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// PDF file to upload.
    pdf: PathBuf,

    /// OCR endpoint.
    #[arg(long, env = "OCR_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    url: String,

    /// Where archive downloads are written.
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Accept ZIP archive replies from older servers.
    #[arg(long)]
    legacy_archives: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let file = PendingFile::from_path(&args.pdf)
        .await
        .with_context(|| format!("cannot read {}", args.pdf.display()))?;
    eprintln!("Selected: {} ({:.2} MB)", file.name, file.size_mb());

    let mut client = UploadClient::new(ClientOptions {
        endpoint: args.url,
        download_dir: args.download_dir,
        legacy_archives: args.legacy_archives,
    });
    client.select_file(file);
    eprintln!("Processing your PDF...");
    client.submit().await;

    eprintln!("{}", client.message());
    if let Some(path) = client.download() {
        eprintln!("Saved {}", path.display());
    }
    if !client.extracted_text().is_empty() {
        println!("{}", client.extracted_text());
    }

    if client.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

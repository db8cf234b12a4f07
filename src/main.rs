//! pdfscoop CLI - downloads every PDF linked from the seed page.

use anyhow::{Context, Result};
use clap::Parser;
use pdfscoop::config::Config;
use pdfscoop::console::Console;
use pdfscoop::driver::{ChromeSession, PageDriver};
use pdfscoop::harvester;
use std::path::PathBuf;

/// Downloads the PDF documents linked from a web page.
#[derive(Parser, Debug)]
#[command(name = "pdfscoop")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Read settings from this TOML file instead of the default location.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show the browser window instead of rendering headless.
    #[arg(long)]
    headed: bool,

    /// Fetch the seed page again even if a cached copy exists.
    #[arg(long)]
    refresh: bool,

    /// Print debug output.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let console = Console::new();

    console.section("pdfscoop - PDF Harvester");

    // Load configuration
    console.step("Loading configuration...");
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };

    if args.headed {
        config.browser.headless = false;
    }
    if args.debug {
        config.scraping.debug = true;
    }

    config.validate().context("Invalid configuration")?;
    let console = console.with_debug(config.scraping.debug);
    console.success("Configuration loaded");

    let download_dir = config.paths.download_directory.clone();
    std::fs::create_dir_all(&download_dir).with_context(|| {
        format!("Failed to create download folder {}", download_dir.display())
    })?;

    // Launch browser
    console.step("Launching browser...");
    console.debug(&format!("Chrome profile: {}", config.profile_dir().display()));
    let session = ChromeSession::launch(&config, &download_dir, &console)
        .await
        .context("Failed to launch browser")?;
    console.success(&format!(
        "{} ready (headless: {})",
        session.name(),
        config.browser.headless
    ));

    let outcome = harvester::run(&config, &session, &console, args.refresh).await;

    if let Err(e) = session.close().await {
        console.warning(&e.to_string());
    }

    match outcome {
        Ok(summary) => {
            console.section("Done!");
            console.info(&summary.to_string());
        }
        Err(e) => console.error(&format!("{e:#}")),
    }

    console.info(&format!(
        "All downloads attempted. Check the '{}' folder for results.",
        download_dir.display()
    ));
    Ok(())
}

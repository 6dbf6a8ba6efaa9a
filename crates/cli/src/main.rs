//! Loose Gallery CLI - Operator tools for the design lifecycle.
//!
//! # Usage
//!
//! ```bash
//! # Check that an API key works
//! lg-cli test-connection --credential default
//!
//! # Build an editor link by hand
//! lg-cli editor-url --domain dom-1 --template TPL0001 --product 42
//!
//! # Inspect a design
//! lg-cli preview DSX123456 --size large
//! lg-cli info DSX123456
//!
//! # High-resolution renders
//! lg-cli render request DSX123456 --width 3000 --height 2000 --format png --dpi 300
//! lg-cli render poll DSX123456 --width 3000 --height 2000 --format png --dpi 300
//!
//! # Lock a design after a manual order
//! lg-cli lock DSX123456
//!
//! # Durable store maintenance
//! lg-cli migrate
//! lg-cli reap --account 17 --days 30
//!
//! # Validate a product catalog file
//! lg-cli catalog products.json
//! ```
//!
//! # Environment Variables
//!
//! See `DesignConfig::from_env`; additionally `SENTRY_DSN` enables error
//! reporting.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use loose_gallery_core::{ImageFormat, PreviewSize};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "lg-cli")]
#[command(author, version, about = "Loose Gallery design tools")]
struct Cli {
    /// API credential to use (defaults to the first configured key)
    #[arg(long, global = true)]
    credential: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify an API key against the Loose Gallery API
    TestConnection,
    /// Print an editor deep link
    EditorUrl {
        /// Domain id the template belongs to
        #[arg(long)]
        domain: String,

        /// Template serial
        #[arg(long)]
        template: String,

        /// Existing design to reopen
        #[arg(long)]
        design: Option<String>,

        /// Storefront product id
        #[arg(long)]
        product: Option<i64>,
    },
    /// Fetch preview URLs of a design
    Preview {
        serial: String,

        /// Preview size (`thumbnail`, `small`, `medium`, `large`)
        #[arg(long, default_value = "medium")]
        size: PreviewSize,
    },
    /// Show the remote state of a design
    Info { serial: String },
    /// Request or poll a high-resolution render
    Render {
        #[command(subcommand)]
        action: RenderAction,
    },
    /// Lock a design against further edits
    Lock { serial: String },
    /// Run durable store migrations
    Migrate,
    /// Discard old designs of an account
    Reap {
        /// Account id
        #[arg(long)]
        account: i64,

        /// Maximum age in days
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Validate a product catalog JSON file
    Catalog { path: String },
}

#[derive(Subcommand)]
enum RenderAction {
    /// Ask the API to start a render
    Request(RenderArgs),
    /// Check a previously requested render
    Poll(RenderArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    serial: String,

    #[arg(long)]
    width: u32,

    #[arg(long)]
    height: u32,

    /// Output format (`png`, `jpg`, `pdf`)
    #[arg(long, default_value = "png")]
    format: ImageFormat,

    #[arg(long, default_value_t = 300)]
    dpi: u32,
}

/// Initialize Sentry when `SENTRY_DSN` is set; the guard must be kept alive.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok().filter(|d| !d.is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load .env before Sentry reads SENTRY_DSN
    let _ = dotenvy::dotenv();
    let _sentry_guard = init_sentry();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "loose_gallery_designs=info,loose_gallery_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    let credential = cli.credential.as_deref();

    match cli.command {
        Commands::TestConnection => commands::api::test_connection(credential).await?,
        Commands::EditorUrl {
            domain,
            template,
            design,
            product,
        } => commands::api::editor_url(credential, &domain, &template, design.as_deref(), product)?,
        Commands::Preview { serial, size } => {
            commands::api::preview(credential, &serial, size).await?;
        }
        Commands::Info { serial } => commands::api::info(credential, &serial).await?,
        Commands::Render { action } => match action {
            RenderAction::Request(args) => {
                commands::api::render_request(credential, &args.serial, args.spec()).await?;
            }
            RenderAction::Poll(args) => {
                commands::api::render_poll(credential, &args.serial, args.spec()).await?;
            }
        },
        Commands::Lock { serial } => commands::api::lock(credential, &serial).await?,
        Commands::Migrate => commands::store::migrate().await?,
        Commands::Reap { account, days } => commands::store::reap(account, days).await?,
        Commands::Catalog { path } => commands::store::catalog(&path)?,
    }
    Ok(())
}

impl RenderArgs {
    const fn spec(&self) -> loose_gallery_designs::api::ImageSpec {
        loose_gallery_designs::api::ImageSpec {
            width: self.width,
            height: self.height,
            format: self.format,
            dpi: self.dpi,
        }
    }
}

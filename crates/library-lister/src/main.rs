//! Library lister CLI application.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use library_lister::{
    AccountSession, BrowserSession, HttpSession, ItemReporter, LibraryLister, ListerReport,
    LogReporter, PagedCatalogScanner, StdoutReporter,
};
use shared::{Category, Config, LogConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "List the ebooks, audiobooks and courses of a helion.pl account", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Account login email (prompted when missing)
    #[arg(long, env = "HELION_EMAIL")]
    email: Option<String>,

    /// Account password (prompted without echo when missing)
    #[arg(long, env = "HELION_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Existing session cookie (`name=value; ...`), used instead of logging in
    #[arg(long, env = "HELION_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Category to list (ebooks, audiobooks, courses); repeatable, defaults to all
    #[arg(long = "category", value_name = "CATEGORY")]
    categories: Vec<Category>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// How pages are loaded
    #[arg(long, value_enum, default_value_t = Backend::Browser)]
    backend: Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Headless Chromium, renders client-side content
    Browser,
    /// Plain HTTP requests with a cookie jar
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// `<author> - <title>` lines grouped by category
    Text,
    /// JSON report
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config = LogConfig::from_config(&config.logging, "library-lister");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!("Library lister starting");
    info!(config_file = %args.config.display(), "Loaded configuration");

    let report = match args.backend {
        Backend::Browser => {
            let session = BrowserSession::launch(&config.site, &config.browser)
                .await
                .context("Failed to launch browser")?;
            list_library(session, &config, &args).await?
        }
        Backend::Http => {
            let session = HttpSession::new(&config.site).context("Failed to create HTTP session")?;
            list_library(session, &config, &args).await?
        }
    };

    if args.format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    }

    info!(
        categories = report.categories.len(),
        items = report.total_items(),
        "Library lister finished"
    );

    if !report.failed.is_empty() {
        let failed: Vec<String> = report.failed.iter().map(Category::to_string).collect();
        bail!("Failed to list categories: {}", failed.join(", "));
    }

    Ok(())
}

/// Authenticate, list the library and close the session whatever the outcome
async fn list_library<S: AccountSession>(
    mut session: S,
    config: &Config,
    args: &Args,
) -> Result<ListerReport> {
    if let Err(e) = authenticate(&mut session, config, args).await {
        close_session(session).await;
        return Err(e);
    }

    let reporter: Arc<dyn ItemReporter> = match args.format {
        OutputFormat::Text => Arc::new(StdoutReporter),
        OutputFormat::Json => Arc::new(LogReporter),
    };
    let scanner = PagedCatalogScanner::from_config(&config.scanner).with_reporter(reporter);
    let mut lister = LibraryLister::new(session, scanner, config.site.clone());

    let outcome = lister.run(&args.categories).await;
    close_session(lister.into_session()).await;

    outcome.context("Library listing failed")
}

async fn close_session<S: AccountSession>(session: S) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close session");
    }
}

/// Log in with credentials, or reuse a session cookie when one is given
async fn authenticate<S: AccountSession>(session: &mut S, config: &Config, args: &Args) -> Result<()> {
    if let Some(cookie) = &args.cookie {
        info!("Using provided session cookie");
        session
            .add_cookie(&config.site.base_url, cookie)
            .await
            .context("Failed to add session cookie")?;
        return Ok(());
    }

    let email = match &args.email {
        Some(email) => email.clone(),
        None => prompt("E-mail")?,
    };
    let password = resolve_password(args.password.clone(), || {
        rpassword::prompt_password("Hasło: ")
    })?;

    session
        .login(&config.site.login_url(), &email, &password)
        .await
        .context("Login failed")
}

/// The password from the command line or environment, else read from the
/// terminal without echo
fn resolve_password(
    given: Option<String>,
    read_hidden: impl FnOnce() -> io::Result<String>,
) -> Result<String> {
    let password = match given {
        Some(password) => password,
        None => read_hidden().context("Failed to read password")?,
    };

    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush().context("Failed to write prompt")?;

    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;

    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("{} is required", label);
    }
    Ok(value)
}

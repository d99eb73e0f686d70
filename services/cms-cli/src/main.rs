//! CMS client command line
//!
//! Single binary that:
//! 1. Lists, shows and creates articles on a headless CMS backend
//! 2. Logs in with username/password and completes the OAuth
//!    authorization-code flow on a loopback callback listener
//! 3. Persists the session (tokens, CSRF, user data) between runs

mod callback;
mod config;
mod error;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cms_auth::{AuthService, CallbackFlow, LoginAction, LoginFlow, LogoutOutcome, TokenStore};
use cms_client::{ApiClient, ArticleCard, ArticleDetail, SessionRecovery};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Headless CMS client with OAuth session management
#[derive(Parser, Debug)]
#[command(name = "cms-client")]
#[command(about = "Headless CMS client with OAuth session management", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (default: CONFIG_PATH or ./cms-client.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Human-readable logs instead of JSON
    #[arg(long, global = true)]
    pretty: bool,

    /// Print command output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List articles
    Articles,

    /// Show a single article
    Article {
        /// Article UUID
        id: String,
    },

    /// Create an article
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,
    },

    /// Log in and start the OAuth authorization flow
    Login {
        #[arg(long)]
        username: String,

        /// Password (prefer the CMS_PASSWORD env var)
        #[arg(long, env = "CMS_PASSWORD", hide_env_values = true)]
        password: String,

        /// Print the authorization URL without waiting for the callback
        #[arg(long)]
        no_wait: bool,

        /// Seconds to wait for the OAuth callback
        #[arg(long, default_value_t = 300)]
        timeout: u64,
    },

    /// Complete the OAuth flow with a code and state copied from the callback URL
    Callback {
        #[arg(long)]
        code: String,

        #[arg(long)]
        state: String,
    },

    /// End the session and clear stored tokens
    Logout,

    /// Show which credentials are stored
    Status,

    /// Show the profile of the logged-in user
    Whoami,
}

/// Everything a command needs, built once from the config.
struct App {
    config: Config,
    auth: Arc<AuthService>,
    api: ApiClient,
}

impl App {
    async fn build(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;

        let token_path = config.storage.token_path.clone();
        let store = Arc::new(
            TokenStore::load(token_path.clone())
                .await
                .with_context(|| format!("failed to load session from {}", token_path.display()))?,
        );

        let auth = Arc::new(AuthService::new(
            http.clone(),
            config.auth_config(),
            Arc::clone(&store),
        ));
        let recovery: Arc<dyn SessionRecovery> = auth.clone();
        let api = ApiClient::new(http, config.backend.api_url.clone(), store, recovery);

        Ok(Self { config, auth, api })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            cli.pretty
                .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        )
        .with((!cli.pretty).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .init();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        api_url = %config.backend.api_url,
        callback_origin = %config.oauth.callback_origin,
        token_path = %config.storage.token_path.display(),
        "configuration loaded"
    );

    let app = App::build(config).await?;
    run(&app, cli.command, cli.json).await
}

async fn run(app: &App, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Articles => {
            let articles = cms_client::list_articles(&app.api)
                .await
                .context("failed to load articles")?;
            let cards: Vec<ArticleCard> = articles.iter().map(ArticleCard::from_article).collect();
            if json {
                print_json(&cards)?;
            } else if cards.is_empty() {
                println!("No articles found.");
            } else {
                for card in &cards {
                    println!("{}  {}  {}", card.date, card.id, card.title);
                    if !card.excerpt.is_empty() {
                        println!("    {}", card.excerpt);
                    }
                }
            }
        }

        Commands::Article { id } => {
            let article = cms_client::get_article(&app.api, &id)
                .await
                .context("failed to load article")?;
            let detail = ArticleDetail::from_article(&article);
            if json {
                print_json(&detail)?;
            } else {
                println!("{}", detail.title);
                if !detail.date.is_empty() {
                    println!("Published on {}", detail.date);
                }
                println!();
                println!("{}", detail.content);
            }
        }

        Commands::Create { title, body } => {
            let article = cms_client::create_article(&app.api, &title, &body).await?;
            if json {
                print_json(&article)?;
            } else {
                println!("Article created successfully! ({})", article.id);
            }
        }

        Commands::Login {
            username,
            password,
            no_wait,
            timeout,
        } => {
            let mut flow = LoginFlow::new();
            match flow.submit(&app.auth, &username, &password).await {
                LoginAction::Navigate { url } => {
                    println!("Open this URL in a browser to authorize access:\n\n  {url}\n");
                    if no_wait {
                        println!(
                            "Then run `cms-client callback --code <code> --state <state>` with the values from the redirect."
                        );
                    } else {
                        callback::wait_for_callback(
                            Arc::clone(&app.auth),
                            &app.config.oauth.callback_origin,
                            Duration::from_secs(timeout),
                        )
                        .await?;
                        println!("Logged in as {username}.");
                    }
                }
                LoginAction::Finish => println!("Logged in as {username}."),
                LoginAction::ShowError(message) => bail!(message),
                LoginAction::Login { .. } | LoginAction::None => bail!("login did not complete"),
            }
        }

        Commands::Callback { code, state } => {
            let mut flow = CallbackFlow::new();
            flow.complete(&app.auth, Some(&code), Some(&state))
                .await
                .context("OAuth callback failed; run `cms-client login` to try again")?;
            println!("Authentication successful.");
        }

        Commands::Logout => match app.auth.logout().await {
            LogoutOutcome::ServerConfirmed => println!("Logged out."),
            LogoutOutcome::LocalOnly => println!("Local session cleared."),
        },

        Commands::Status => {
            let status = app.auth.status().await;
            if json {
                print_json(&status)?;
            } else {
                println!("logged in:     {}", status.is_logged_in);
                println!("access token:  {}", status.has_access_token);
                println!("refresh token: {}", status.has_refresh_token);
                println!("CSRF token:    {}", status.has_csrf_token);
                println!("logout token:  {}", status.has_logout_token);
            }
        }

        Commands::Whoami => {
            let Some(access_token) = app.auth.store().access_token().await else {
                bail!("not logged in; run `cms-client login` first");
            };
            let user = app.auth.fetch_user(&access_token).await?;
            print_json(&user)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}

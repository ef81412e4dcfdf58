use clap::{Parser, Subcommand};
use dotenv::dotenv;
use portfolio_client::auth::StorageError;
use portfolio_client::auth::jwt::UserProfile;
use portfolio_client::auth::oidc::CallbackParams;
use portfolio_client::loadtest::{LoadTest, LoadTestConfig, Scenario, ScenarioKind};
use portfolio_client::models::PageQuery;
use portfolio_client::{ClientConfig, PortfolioClient};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "portfolio-client", version, about = "Portfolio backend client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password, or through the identity provider with --oidc.
    Login {
        #[arg(long, env = "PORTFOLIO_EMAIL", required_unless_present = "oidc")]
        email: Option<String>,
        #[arg(
            long,
            env = "PORTFOLIO_PASSWORD",
            hide_env_values = true,
            required_unless_present = "oidc"
        )]
        password: Option<String>,
        /// Ignores any email or password, including ones from the environment.
        #[arg(long)]
        oidc: bool,
    },
    /// Create an account on the auth service and sign in.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, hide_env_values = true, env = "PORTFOLIO_PASSWORD")]
        password: String,
    },
    /// Show the signed-in user.
    Whoami,
    /// Forget the stored session.
    Logout,
    /// List your own portfolios.
    Portfolios {
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long, default_value_t = 10)]
        limit: u64,
    },
    /// Run a staged load test against the backend.
    Loadtest {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        #[arg(long)]
        skip_auth: bool,
        /// Multiply every think-time pause, 0 disables them.
        #[arg(long)]
        think_scale: Option<f64>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> CliResult {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    run(Cli::parse().command).await
}

fn open_client() -> Result<PortfolioClient, StorageError> {
    PortfolioClient::with_session_file(ClientConfig::from_env())
}

async fn run(command: Command) -> CliResult {
    match command {
        Command::Login { oidc: true, .. } => oidc_login(&open_client()?).await,
        Command::Login {
            email: Some(email),
            password: Some(password),
            ..
        } => {
            let client = open_client()?;
            let response = client.password_auth().login(&email, &password).await?;
            println!("Signed in as {}", display_name(&response.user));
            Ok(())
        }
        Command::Login { .. } => Err("email and password are required".into()),
        Command::Register {
            username,
            email,
            password,
        } => {
            let client = open_client()?;
            let response = client
                .password_auth()
                .register(&username, &email, &password)
                .await?;
            println!("Registered and signed in as {}", display_name(&response.user));
            Ok(())
        }
        Command::Whoami => {
            let client = open_client()?;
            let state = client.session.state();
            match state.user() {
                Some(user) if client.session.ensure_auth() => {
                    println!("{}", serde_json::to_string_pretty(user)?);
                }
                _ => println!("Not signed in"),
            }
            Ok(())
        }
        Command::Logout => {
            let client = open_client()?;
            match client.oidc() {
                Some(oidc) => {
                    if let Some(url) = oidc.logout() {
                        println!("Finish signing out at: {url}");
                    }
                }
                None => client.password_auth().logout(),
            }
            println!("Signed out");
            Ok(())
        }
        Command::Portfolios { page, limit } => {
            let client = open_client()?;
            let portfolios = client.portfolios.get_own(PageQuery::new(page, limit)).await?;
            for portfolio in &portfolios {
                println!("{:>6}  {}", portfolio.id, portfolio.title);
            }
            if portfolios.is_empty() {
                println!("No portfolios");
            }
            Ok(())
        }
        Command::Loadtest {
            scenario,
            skip_auth,
            think_scale,
            json,
        } => loadtest(scenario, skip_auth, think_scale, json).await,
    }
}

async fn oidc_login(client: &PortfolioClient) -> CliResult {
    let oidc = client
        .oidc()
        .ok_or("OIDC_ISSUER and OIDC_CLIENT_ID must be set for --oidc")?;
    let request = oidc.begin_login()?;
    println!("Open this URL in a browser and sign in:\n\n  {}\n", request.url);
    println!("Then paste the URL you were redirected to:");

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await?;
    let params = CallbackParams::from_url(line.trim())?;

    let user = oidc.handle_callback(params).await?;
    println!("Signed in as {}", display_name(&user));
    Ok(())
}

async fn loadtest(
    kind: ScenarioKind,
    skip_auth: bool,
    think_scale: Option<f64>,
    json: bool,
) -> CliResult {
    let mut config = LoadTestConfig::from_env();
    config.skip_auth |= skip_auth;
    if let Some(scale) = think_scale {
        config.think_scale = scale.max(0.0);
    }

    let report = LoadTest::new(config, Scenario::for_kind(kind)).run().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn display_name(user: &UserProfile) -> &str {
    user.username
        .as_deref()
        .or(user.email.as_deref())
        .unwrap_or(&user.id)
}

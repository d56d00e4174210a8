use std::sync::Arc;

use authgate::{
    ActionCodeSettings, AuthError, GatewayConfig, GatewayError, RestGateway, SessionManager, User,
    is_sign_in_with_email_link,
};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("gateway setup failed: {0}")]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("not a sign-in link: {0}")]
    NotSignInLink(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "authgate-cli", about = "Drive an identity service session from the command line")]
struct Cli {
    #[arg(long, env = "AUTH_PROJECT_ID")]
    project_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password.
    SignIn { email: String, password: String },
    /// Create a password account.
    SignUp { email: String, password: String },
    /// Create an anonymous account.
    Anonymous,
    /// List sign-in methods registered for an email.
    Methods { email: String },
    /// Send a password reset email.
    Reset { email: String },
    /// Send a passwordless sign-in link.
    SendLink {
        email: String,
        #[arg(long)]
        url: Option<String>,
    },
    /// Complete a passwordless sign-in from a received link.
    LinkSignIn { email: String, link: String },
    /// Check that an auth emulator is reachable.
    EmulatorCheck { host: String, port: u16 },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env()?;
    if let Some(project_id) = cli.project_id {
        config.project_id = project_id;
    }
    let gateway = RestGateway::new(&config)?;
    let auth = SessionManager::new(Arc::new(gateway), config.project_id.clone());
    auth.auth_state_changes().subscribe(|user: &Option<User>| match user {
        Some(user) => tracing::info!(uid = user.uid(), provider = %user.provider_id(), "auth state: signed in"),
        None => tracing::info!("auth state: signed out"),
    });

    let output = run(&auth, cli.command).await?;
    print_json(&output)
}

async fn run(auth: &SessionManager, command: Command) -> Result<Value, CliError> {
    match command {
        Command::SignIn { email, password } => {
            let cred = auth.sign_in_with_email_and_password(&email, &password).await?;
            Ok(serde_json::to_value(cred)?)
        }
        Command::SignUp { email, password } => {
            let cred = auth.create_user_with_email_and_password(&email, &password).await?;
            Ok(serde_json::to_value(cred)?)
        }
        Command::Anonymous => {
            let cred = auth.sign_in_anonymously().await?;
            Ok(serde_json::to_value(cred)?)
        }
        Command::Methods { email } => {
            let methods = auth.fetch_sign_in_methods_for_email(&email).await?;
            Ok(serde_json::to_value(methods)?)
        }
        Command::Reset { email } => {
            let echoed = auth.send_password_reset_email(&email).await?;
            Ok(json!({ "email": echoed }))
        }
        Command::SendLink { email, url } => {
            let echoed = auth.send_sign_in_link_to_email(&email, &ActionCodeSettings { url }).await?;
            Ok(json!({ "email": echoed }))
        }
        Command::LinkSignIn { email, link } => {
            if !is_sign_in_with_email_link(&link) {
                return Err(CliError::NotSignInLink(link));
            }
            let cred = auth.sign_in_with_email_link(&email, &link).await?;
            Ok(serde_json::to_value(cred)?)
        }
        Command::EmulatorCheck { host, port } => {
            auth.use_auth_emulator(&host, port).await?;
            Ok(json!({ "reachable": true, "host": host, "port": port }))
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

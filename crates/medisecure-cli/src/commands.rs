//! Command handlers.

use crate::Commands;
use api_client::{
    AuthenticatedHttpClient, ClientConfig, FnNavigator, Method, RequestBody, RequestOptions,
};
use auth_session::{AuthSession, LoginCredentials};
use client_config_and_utils::{Config, Paths};
use credential_storage::create_file_credential_store;
use std::sync::Arc;
use tracing::debug;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) async fn run(command: Commands, config: &Config, paths: &Paths) -> CommandResult {
    let session = open_session(config, paths)?;

    match command {
        Commands::Login { username, password } => {
            let password = password.ok_or("password required: pass -p or set MEDISECURE_PASSWORD")?;
            let response = session
                .login(&LoginCredentials::new(username, password))
                .await?;
            println!("Logged in as {} ({})", response.user.display_name(), response.user.role);
        }
        Commands::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
        Commands::Status => {
            print_json(&serde_json::to_value(session.status()?)?)?;
        }
        Commands::ResetPassword { email } => {
            session.reset_password(&email).await?;
            println!("Password reset requested for {email}");
        }
        Commands::Get { path } => call(&session, Method::GET, &path, None).await?,
        Commands::Delete { path } => call(&session, Method::DELETE, &path, None).await?,
        Commands::Post { path, data } => call(&session, Method::POST, &path, data).await?,
        Commands::Put { path, data } => call(&session, Method::PUT, &path, data).await?,
        Commands::Patch { path, data } => call(&session, Method::PATCH, &path, data).await?,
    }

    Ok(())
}

fn open_session(config: &Config, paths: &Paths) -> Result<AuthSession, Box<dyn std::error::Error>> {
    let store = create_file_credential_store(&paths.session_file())?;
    let navigator = FnNavigator::new(|| {
        eprintln!("Session expired. Run `medisecure login` to sign in again.");
    });
    let client = AuthenticatedHttpClient::with_reqwest(
        ClientConfig::from_config(config)?,
        Arc::new(store),
        Arc::new(navigator),
    )?;
    debug!(api_url = %config.api_url, "Client ready");
    Ok(AuthSession::new(Arc::new(client)))
}

async fn call(
    session: &AuthSession,
    method: Method,
    path: &str,
    data: Option<String>,
) -> CommandResult {
    let body = parse_body(data.as_deref())?;
    let value = session
        .client()
        .request(method, path, body, RequestOptions::default())
        .await?;
    print_json(&value)
}

/// Parse `--data` as JSON. No data means no body.
fn parse_body(data: Option<&str>) -> Result<RequestBody, serde_json::Error> {
    match data {
        Some(raw) => Ok(RequestBody::Json(serde_json::from_str(raw)?)),
        None => Ok(RequestBody::Empty),
    }
}

fn print_json(value: &serde_json::Value) -> CommandResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! authenticate command - run one login through the orchestrator

use super::CommandContext;
use crate::utils::read_secret;
use adgate_auth::{AuthOutcome, EmailPopulator};
use anyhow::{bail, Result};
use colored::Colorize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct AuthenticateResult<'a> {
    identifier: &'a str,
    authenticated: bool,
    identity: Option<&'a adgate_core::types::Identity>,
}

pub async fn execute(
    ctx: &CommandContext,
    identifier: &str,
    password: Option<String>,
    populate_email: bool,
) -> Result<()> {
    let secret = read_secret(password, "Password")?;

    let mut orchestrator = ctx.orchestrator().await?;
    if populate_email {
        orchestrator = orchestrator.with_populate_hook(Arc::new(EmailPopulator));
    }
    orchestrator = orchestrator.with_error_hook(Arc::new(
        |context: &str, username: &str, error: &adgate_core::Error| {
            tracing::debug!(context, username, "Directory error: {}", error.root_cause());
        },
    ));

    let outcome = orchestrator.authenticate(identifier, &secret).await?;

    if ctx.is_json() {
        let result = AuthenticateResult {
            identifier,
            authenticated: outcome.is_authenticated(),
            identity: outcome.identity(),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &outcome {
            AuthOutcome::Authenticated(identity) => {
                println!("{} {}", "Authenticated".green().bold(), identity);
                println!("  {}: {}", "Id".cyan(), identity.id);
                if let Some(email) = &identity.email {
                    println!("  {}: {}", "Email".cyan(), email);
                }
                if let Some(dn) = &identity.distinguished_name {
                    println!("  {}: {}", "DN".cyan(), dn);
                }
                if !identity.permissions.is_empty() {
                    println!("  {}: {}", "Permissions".cyan(), identity.permissions.join(", "));
                }
            }
            AuthOutcome::Denied => println!("{} {}", "Denied".red().bold(), identifier),
        }
    }

    if !outcome.is_authenticated() {
        bail!("Authentication denied");
    }
    Ok(())
}

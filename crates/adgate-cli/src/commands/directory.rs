//! Directory commands - probe, whoami, search and passwd

use super::CommandContext;
use crate::utils::{read_secret, sorted_names};
use adgate_auth::{DirectoryEntry, DirectoryUser};
use anyhow::{bail, Result};
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct WhoamiResult<'a> {
    username: &'a str,
    dn: &'a str,
    email: Option<String>,
    account_control: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<&'a DirectoryEntry>,
}

pub async fn probe(ctx: &CommandContext, username: &str, password: Option<String>) -> Result<()> {
    let secret = ctx.directory_secret(password, "Password")?;
    let pool = ctx.pool()?;

    pool.probe(username, &secret).await?;

    if ctx.is_json() {
        println!("{}", serde_json::json!({ "username": username, "valid": true }));
    } else {
        println!(
            "{} {} ({})",
            "Valid".green().bold(),
            pool.principal(username),
            pool.base_dn()
        );
    }
    Ok(())
}

pub async fn whoami(
    ctx: &CommandContext,
    username: &str,
    password: Option<String>,
    all: bool,
) -> Result<()> {
    let secret = ctx.directory_secret(password, "Password")?;
    let mut user = DirectoryUser::new(ctx.pool()?, username);

    user.login(&secret).await?;
    let result = show_user(ctx, &mut user, all).await;
    user.logout().await;
    result
}

async fn show_user(ctx: &CommandContext, user: &mut DirectoryUser, all: bool) -> Result<()> {
    let email = user.email().await?;
    let flags = user.account_control().await?;
    let entry = user.entry().await?;

    if ctx.is_json() {
        let result = WhoamiResult {
            username: user_name(entry),
            dn: &entry.dn,
            email,
            account_control: flags.map(|f| f.names()),
            entry: all.then_some(entry),
        };
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", entry.dn.blue().bold());
    println!();
    if let Some(email) = &email {
        println!("  {}: {}", "Email".cyan(), email);
    }
    if let Some(flags) = flags {
        let mut line = flags.to_string();
        if flags.is_disabled() || flags.is_locked() || flags.password_expired() {
            line = line.yellow().to_string();
        }
        println!("  {}: {} ({})", "Account".cyan(), line, flags.raw());
    }
    if all {
        print_attributes(entry);
    }
    Ok(())
}

fn user_name(entry: &DirectoryEntry) -> &str {
    entry.first("sAMAccountName").unwrap_or(entry.dn.as_str())
}

fn print_attributes(entry: &DirectoryEntry) {
    for name in sorted_names(entry.attributes.keys()) {
        for value in entry.values(name) {
            println!("  {}: {}", name.cyan(), value);
        }
    }
}

pub async fn search(
    ctx: &CommandContext,
    username: &str,
    password: Option<String>,
    filter: &str,
    base: Option<&str>,
    attrs: &[String],
) -> Result<()> {
    let secret = ctx.directory_secret(password, "Password")?;
    let mut user = DirectoryUser::new(ctx.pool()?, username);

    user.login(&secret).await?;
    ctx.debug(&format!("Searching {} under {:?}", filter, base));
    let found = user.search(filter, base).await;
    user.logout().await;

    let mut entries = found?;
    if !attrs.is_empty() {
        for entry in &mut entries {
            entry
                .attributes
                .retain(|name, _| attrs.iter().any(|a| a.eq_ignore_ascii_case(name)));
        }
    }

    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!("{}", entry.dn.blue().bold());
        print_attributes(entry);
        println!();
    }
    ctx.info(&format!("{} entries", entries.len()));
    Ok(())
}

pub async fn passwd(
    ctx: &CommandContext,
    username: &str,
    password: Option<String>,
    new_password: Option<String>,
) -> Result<()> {
    let current = ctx.directory_secret(password, "Current password")?;
    let new_secret = read_secret(new_password, "New password")?;
    if new_secret.is_empty() {
        bail!("New password must not be empty");
    }

    let mut user = DirectoryUser::new(ctx.pool()?, username);
    user.login(&current).await?;
    let changed = user.change_password(&new_secret, None).await;
    user.logout().await;

    let change = changed?;
    if ctx.is_json() {
        println!("{}", serde_json::to_string_pretty(&change)?);
    } else if change.success {
        println!("{} for {}", "Password changed".green().bold(), username);
    } else {
        println!("{}: {}", "Password change refused".red().bold(), change.detail);
    }

    if !change.success {
        bail!("Password change refused: {}", change.detail);
    }
    Ok(())
}

//! uac command - decode a userAccountControl value

use super::CommandContext;
use adgate_auth::ldap::ACCOUNT_CONTROL_FLAGS;
use adgate_auth::AccountControlFlags;
use anyhow::Result;
use colored::Colorize;

pub fn execute(ctx: &CommandContext, value: &str) -> Result<()> {
    let flags: AccountControlFlags = value.parse()?;

    if ctx.is_json() {
        println!(
            "{}",
            serde_json::json!({ "value": flags.raw(), "flags": flags.names() })
        );
        return Ok(());
    }

    ctx.info(&format!("{}", flags.raw().to_string().bold()));
    for (name, bit) in ACCOUNT_CONTROL_FLAGS {
        if flags.contains(name) {
            println!("  {} {:>10}  {}", "+".green(), bit, name);
        } else if ctx.verbose {
            println!("  {} {:>10}  {}", "-".dimmed(), bit, name.dimmed());
        }
    }
    Ok(())
}

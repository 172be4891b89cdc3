//! hash-password command - produce a credential hash for the users file

use super::CommandContext;
use crate::utils::read_secret;
use adgate_crypto::CredentialHasher;
use anyhow::{bail, Result};

pub fn execute(ctx: &CommandContext, password: Option<String>) -> Result<()> {
    let secret = read_secret(password, "Password")?;
    if secret.is_empty() {
        bail!("Refusing to hash an empty password");
    }

    let hash = CredentialHasher::new()?.hash(&secret)?;

    if ctx.is_json() {
        println!("{}", serde_json::json!({ "credential_hash": hash }));
    } else {
        ctx.info("Add this to the user's entry in the users file:");
        println!("credential_hash = \"{}\"", hash);
    }
    Ok(())
}

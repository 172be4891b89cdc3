//! Utility functions for Adgate CLI

use anyhow::{bail, Context, Result};
use std::io::{self, BufRead, Write};

/// Use the provided secret, or read one line from stdin
pub fn read_secret(provided: Option<String>, prompt: &str) -> Result<String> {
    if let Some(secret) = provided {
        return Ok(secret);
    }

    eprint!("{}: ", prompt);
    io::stderr().flush().ok();

    read_line(io::stdin().lock())
}

fn read_line(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("Failed to read secret from stdin")?;
    if read == 0 {
        bail!("No secret provided on stdin");
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Attribute names sorted case-insensitively for stable display
pub fn sorted_names<'a>(names: impl Iterator<Item = &'a String>) -> Vec<&'a String> {
    let mut names: Vec<_> = names.collect();
    names.sort_by_key(|name| name.to_ascii_lowercase());
    names
}

use std::process::Command;

use anyhow::{Context, Result, bail};

const TOKEN_VARS: [&str; 2] = ["GH_TOKEN", "GITHUB_TOKEN"];

/// Resolve a GitHub auth token for `host`.
///
/// Tries `gh auth token --hostname {host}` first, then `GH_TOKEN`, then
/// `GITHUB_TOKEN`.
pub fn resolve_token(host: &str) -> Result<String> {
    match token_from_gh_cli(host) {
        Ok(token) => return Ok(token),
        Err(e) => tracing::debug!("gh CLI token unavailable for {host}: {e:#}"),
    }

    if let Some(token) = token_from_env(|var| std::env::var(var).ok()) {
        return Ok(token);
    }

    bail!(
        "no GitHub token found for host \"{host}\". \
         Run `gh auth login` or set GH_TOKEN / GITHUB_TOKEN."
    )
}

/// First non-blank token among the supported environment variables.
fn token_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    TOKEN_VARS.iter().find_map(|var| {
        let token = lookup(var)?.trim().to_owned();
        (!token.is_empty()).then_some(token)
    })
}

fn token_from_gh_cli(host: &str) -> Result<String> {
    let output = Command::new("gh")
        .args(["auth", "token", "--hostname", host])
        .output()
        .context("failed to run `gh auth token`")?;

    if !output.status.success() {
        bail!("gh auth token exited with non-zero status");
    }

    let token = String::from_utf8(output.stdout)
        .context("gh auth token produced non-UTF-8 output")?
        .trim()
        .to_owned();

    if token.is_empty() {
        bail!("gh auth token returned empty string");
    }

    Ok(token)
}

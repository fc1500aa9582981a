//! Local repository glue: project slug detection, preview argument parsing
//! and the confirmation prompt.

use std::io::BufRead;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Reads the git `origin` remote in the current directory and extracts the
/// last path segment as the project slug.
///
/// `git@gitlab.com:preview-tests/drupal-test.git` and
/// `https://gitlab.com/preview-tests/drupal-test` both yield `drupal-test`.
pub fn detect_project_slug() -> Result<String> {
    let out = Command::new("git")
        .args(["remote", "get-url", "origin"])
        .output()
        .context("could not run git; make sure it is installed")?;
    if !out.status.success() {
        bail!("could not detect git remote; make sure you are in a git repository with an 'origin' remote");
    }

    let remote = String::from_utf8_lossy(&out.stdout).trim().to_string();
    let slug = slug_from_remote(&remote);
    if slug.is_empty() {
        bail!("could not determine project slug from remote {remote:?}");
    }

    debug!(remote, slug, "detected project from git remote");
    eprintln!("Detected project: {slug}");
    Ok(slug)
}

fn slug_from_remote(remote: &str) -> String {
    let remote = remote.trim_end_matches(".git");
    let last = remote.rsplit('/').next().unwrap_or(remote);
    // SSH form without a path separator: git@host:slug
    let slug = last.rsplit(':').next().unwrap_or(last);
    slug.to_string()
}

/// Parses `project/mr-ID` (the `mr-` prefix is optional) into its parts.
pub fn parse_preview_arg(arg: &str) -> Result<(String, u32)> {
    let arg = arg.trim_end_matches('/');
    let Some((project, mr_part)) = arg.split_once('/') else {
        bail!("expected format: project/mr-ID (e.g. drupal-test/mr-5)");
    };
    if project.is_empty() {
        bail!("expected format: project/mr-ID (e.g. drupal-test/mr-5)");
    }

    let digits = mr_part.strip_prefix("mr-").unwrap_or(mr_part);
    let mr_id: u32 = digits
        .parse()
        .with_context(|| format!("invalid MR ID {mr_part:?}"))?;

    Ok((project.to_string(), mr_id))
}

/// Asks the operator `prompt [Y/n]` on stderr; `auto_yes` skips the prompt.
/// Anything other than an explicit no counts as yes.
pub fn confirm(prompt: &str, auto_yes: bool) -> bool {
    if auto_yes {
        return true;
    }
    eprint!("{prompt} [Y/n] ");
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return true;
    }
    let answer = answer.trim().to_lowercase();
    answer != "n" && answer != "no"
}

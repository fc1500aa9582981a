//! `preview push db|files` — package a payload locally and upload it as the
//! project's base database or base files archive.
//!
//! The db path pipes `ddev drush sql-dump` through the gzip stage; the files
//! path pipes `tar` through it. Both then hand the combined stream to the
//! transfer core, which stages it and picks single-shot or chunked upload.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::client::ApiClient;
use crate::pipeline::{gzip_compressor, Pipeline, DEFAULT_COMPRESSION_LEVEL};
use crate::progress;
use crate::project::{confirm, detect_project_slug};
use crate::transfer::{self, TransferConfig, TransferKind};

/// Uncompressed source size above which we nudge gzip users towards pigz.
const PIGZ_HINT_THRESHOLD: u64 = 500 * 1024 * 1024;

pub async fn push_db(
    client: &ApiClient,
    config: &TransferConfig,
    file: Option<PathBuf>,
    auto_yes: bool,
) -> Result<()> {
    let Some(slug) = preflight(client, TransferKind::Db, auto_yes).await? else {
        return Ok(());
    };

    match file {
        Some(path) => upload_existing_file(client, config, &slug, TransferKind::Db, &path).await,
        None => generate_and_upload_db(client, config, &slug).await,
    }
}

pub async fn push_files(
    client: &ApiClient,
    config: &TransferConfig,
    file: Option<PathBuf>,
    auto_yes: bool,
    strip_heavy_files: Option<String>,
) -> Result<()> {
    let Some(slug) = preflight(client, TransferKind::Files, auto_yes).await? else {
        return Ok(());
    };

    match file {
        Some(path) => upload_existing_file(client, config, &slug, TransferKind::Files, &path).await,
        None => {
            generate_and_upload_files(client, config, &slug, strip_heavy_files.as_deref()).await
        }
    }
}

/// Shows what the server currently holds and asks for confirmation.
/// Returns `None` when the operator aborts.
async fn preflight(
    client: &ApiClient,
    kind: TransferKind,
    auto_yes: bool,
) -> Result<Option<String>> {
    let slug = detect_project_slug()?;

    let status = client
        .get_base_files_status(&slug)
        .await
        .context("failed to check base files status")?;
    let current = match kind {
        TransferKind::Db => status.db,
        TransferKind::Files => status.files,
    };
    let label = match kind {
        TransferKind::Db => "base database",
        TransferKind::Files => "base files archive",
    };

    let exists = current.as_ref().is_some_and(|info| info.exists);
    match &current {
        Some(info) if info.exists => {
            eprintln!(
                "A {label} already exists for project {slug:?} ({} bytes).",
                info.size_bytes
            );
        }
        _ => eprintln!("No {label} exists yet for project {slug:?}."),
    }

    let action = if exists {
        "overwrite the existing"
    } else {
        "upload a new"
    };
    if !confirm(&format!("Do you want to {action} {label} for {slug:?}?"), auto_yes) {
        eprintln!("Aborted.");
        return Ok(None);
    }
    Ok(Some(slug))
}

/// Uploads an archive the operator already has instead of generating one.
async fn upload_existing_file(
    client: &ApiClient,
    config: &TransferConfig,
    slug: &str,
    kind: TransferKind,
    path: &Path,
) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("cannot open file {}", path.display()))?;
    let size = file.metadata().context("cannot stat file")?.len();
    eprintln!("Uploading {} ({size} bytes)...", path.display());

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{slug}-{kind}"));
    transfer::upload_stream(client, config, slug, kind, &filename, file)
        .await
        .context("upload failed")?;

    eprintln!("Done! Base {kind} for {slug:?} updated.");
    Ok(())
}

async fn generate_and_upload_db(
    client: &ApiClient,
    config: &TransferConfig,
    slug: &str,
) -> Result<()> {
    eprintln!("Generating database dump via ddev drush sql-dump...");

    // Make sure ddev is up before we pipe stdout, so startup chatter cannot
    // end up inside the SQL dump.
    ensure_ddev_running()?;

    let mut dump = Command::new("ddev");
    dump.args(["drush", "sql-dump"]);
    let (compressor_name, compressor) = gzip_compressor(DEFAULT_COMPRESSION_LEVEL);

    let (pipeline, output) = Pipeline::spawn(dump, Some(compressor))?;
    info!(slug, compressor = compressor_name, "db dump pipeline started");
    eprintln!("Uploading database dump (compressor: {compressor_name} -{DEFAULT_COMPRESSION_LEVEL})...");

    let filename = format!("{slug}-base.sql.gz");
    let upload = transfer::upload_stream(client, config, slug, TransferKind::Db, &filename, output).await;
    // Wait on the stages either way so no process is left orphaned; a
    // producer failure overrides downstream success.
    let waited = pipeline.wait();
    upload.context("upload failed")?;
    waited?;

    eprintln!("Done! Base database for {slug:?} updated.");
    Ok(())
}

async fn generate_and_upload_files(
    client: &ApiClient,
    config: &TransferConfig,
    slug: &str,
    strip_heavy_files: Option<&str>,
) -> Result<()> {
    ensure_ddev_running()?;

    let files_dir = drupal_files_dir().context("could not detect files directory")?;
    if !files_dir.exists() {
        bail!(
            "files directory {:?} not found; are you in the project root?",
            files_dir
        );
    }

    let source_size = dir_size(&files_dir).unwrap_or(0);
    if source_size > 0 {
        eprintln!(
            "Source: {} ({})",
            files_dir.display(),
            progress::format_bytes(source_size)
        );
    }

    let (compressor_name, compressor) = gzip_compressor(DEFAULT_COMPRESSION_LEVEL);
    if compressor_name == "gzip" && source_size > PIGZ_HINT_THRESHOLD {
        eprintln!("HINT: Install pigz to speed up compression using multiple cores: sudo apt install pigz");
    }

    // Uncompressed tar; compression happens in the dedicated stage.
    let mut tar_args: Vec<String> = ["cf", "-", "--exclude=./css", "--exclude=./js", "--exclude=./php"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    if let Some(limit) = strip_heavy_files {
        let max_bytes = parse_size_mb(limit)?;
        let heavy = find_heavy_files(&files_dir, max_bytes)?;
        if !heavy.is_empty() {
            eprintln!("Skipping {} files larger than {limit}", heavy.len());
        }
        tar_args.extend(heavy.iter().map(|f| format!("--exclude={f}")));
    }

    eprintln!(
        "Packaging {} (compressor: {compressor_name} -{DEFAULT_COMPRESSION_LEVEL})...",
        files_dir.display()
    );

    tar_args.push("-C".into());
    tar_args.push(files_dir.display().to_string());
    tar_args.push(".".into());
    let mut tar = Command::new("tar");
    tar.args(&tar_args);

    let (pipeline, output) = Pipeline::spawn(tar, Some(compressor))?;
    info!(slug, compressor = compressor_name, "files archive pipeline started");
    eprintln!("Uploading files archive...");

    let filename = format!("{slug}-files.tar.gz");
    let upload =
        transfer::upload_stream(client, config, slug, TransferKind::Files, &filename, output).await;
    let waited = pipeline.wait();
    upload.context("upload failed")?;
    waited?;

    eprintln!("Done! Base files for {slug:?} updated.");
    Ok(())
}

/// Starts ddev unless `ddev describe` says it is already running. All ddev
/// output goes to stderr so it can never pollute a payload pipe.
fn ensure_ddev_running() -> Result<()> {
    if let Ok(out) = Command::new("ddev").args(["describe", "-j"]).output() {
        if out.status.success() && String::from_utf8_lossy(&out.stdout).contains("\"running\"") {
            return Ok(());
        }
    }

    eprintln!("Starting ddev...");
    // A cold start can take minutes; its output must show up live.
    let status = run_attached(Command::new("ddev").arg("start"))?;
    if !status.success() {
        bail!("failed to start ddev: {status}");
    }
    Ok(())
}

/// Runs a command with stdout and stderr attached to the terminal, so
/// long-running startups stream their output as it happens.
fn run_attached(cmd: &mut Command) -> Result<ExitStatus> {
    cmd.stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .with_context(|| format!("failed to run {:?}", cmd.get_program()))
}

/// Detects the public files directory via `ddev drush status`, returned
/// relative to the project root (e.g. `docroot/sites/default/files`).
fn drupal_files_dir() -> Result<PathBuf> {
    let out = Command::new("ddev")
        .args(["drush", "status", "--format=json"])
        .output()
        .context("failed to run ddev drush status")?;
    if !out.status.success() {
        bail!("ddev drush status failed: {}", out.status);
    }

    let status: serde_json::Value =
        serde_json::from_slice(&out.stdout).context("failed to parse drush status")?;
    let root = status.get("root").and_then(|v| v.as_str()).unwrap_or("");
    let files = status.get("files").and_then(|v| v.as_str()).unwrap_or("");
    if files.is_empty() {
        bail!("drush status did not return a files path");
    }

    Ok(files_dir_from_status(root, files))
}

/// `root` is the Drupal root inside the container (e.g. `/var/www/html/docroot`),
/// `files` is relative to it (e.g. `sites/default/files`). The local path is
/// the docroot relative to the ddev mount point joined with `files`.
fn files_dir_from_status(root: &str, files: &str) -> PathBuf {
    const DDEV_MOUNT: &str = "/var/www/html";
    let docroot = root
        .strip_prefix(DDEV_MOUNT)
        .map(|d| d.trim_start_matches('/'))
        .unwrap_or("");
    if docroot.is_empty() {
        PathBuf::from(files)
    } else {
        Path::new(docroot).join(files)
    }
}

/// Total size of a directory in bytes, via `du -sb`.
fn dir_size(path: &Path) -> Result<u64> {
    let out = Command::new("du")
        .arg("-sb")
        .arg(path)
        .output()
        .context("failed to run du")?;
    if !out.status.success() {
        bail!("du failed: {}", out.status);
    }
    let text = String::from_utf8_lossy(&out.stdout);
    let field = text
        .split_whitespace()
        .next()
        .context("unexpected du output")?;
    field.parse().context("unexpected du output")
}

/// Files larger than `max_bytes` under `dir`, outside the standard excludes,
/// as `./relative` paths suitable for `tar --exclude`.
fn find_heavy_files(dir: &Path, max_bytes: u64) -> Result<Vec<String>> {
    let out = Command::new("find")
        .args([
            ".",
            "-type",
            "f",
            "-size",
            &format!("+{max_bytes}c"),
            "-not",
            "-path",
            "./css/*",
            "-not",
            "-path",
            "./js/*",
            "-not",
            "-path",
            "./php/*",
        ])
        .current_dir(dir)
        .output()
        .context("find failed")?;
    if !out.status.success() {
        bail!("find failed: {}", out.status);
    }

    Ok(String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Parses `"10mb"`, `"10MB"` or `"10"` (assumed MB) into bytes.
pub fn parse_size_mb(s: &str) -> Result<u64> {
    let normalised = s.trim().to_lowercase();
    let number = normalised.trim_end_matches("mb").trim();
    let mb: f64 = number
        .parse()
        .with_context(|| format!("invalid size {s:?}: expected format like '10mb' or '10'"))?;
    Ok((mb * 1024.0 * 1024.0) as u64)
}

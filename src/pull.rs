//! `preview pull db|files` — download a preview's database dump or files
//! archive to a local file.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::client::ApiClient;
use crate::project::parse_preview_arg;
use crate::transfer::{self, TransferKind};

pub async fn pull(
    client: &ApiClient,
    preview: &str,
    kind: TransferKind,
    output: Option<PathBuf>,
) -> Result<()> {
    let (project, mr_id) = parse_preview_arg(preview)?;
    let output = output.unwrap_or_else(|| default_output_name(&project, mr_id, kind).into());

    let label = match kind {
        TransferKind::Db => "database",
        TransferKind::Files => "files",
    };
    eprintln!(
        "Downloading {label} from {project}/mr-{mr_id} to {}...",
        output.display()
    );

    transfer::download_to_file(client, &project, mr_id, kind, &output)
        .await
        .context("download failed")?;

    eprintln!("Saved to {}", output.display());
    Ok(())
}

fn default_output_name(project: &str, mr_id: u32, kind: TransferKind) -> String {
    match kind {
        TransferKind::Db => format!("{project}-mr-{mr_id}.sql.gz"),
        TransferKind::Files => format!("{project}-mr-{mr_id}-files.tar.gz"),
    }
}

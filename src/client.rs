//! HTTP client for the preview server's API.
//!
//! [`ApiClient`] carries the base URL and bearer token and implements
//! [`BaseFileTransport`] over reqwest: the chunked upload endpoints, the
//! single-request multipart path with a byte-counting progress stream, and
//! the raw download stream. A 401 from any endpoint becomes
//! [`TransportError::AuthExpired`].

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::progress;
use crate::transfer::{BaseFileTransport, TransferKind, TransportError, UploadSession};

/// Server-side state of one stored base file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseFileInfo {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

/// What the server currently holds for a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseFilesStatus {
    pub db: Option<BaseFileInfo>,
    pub files: Option<BaseFileInfo>,
}

pub struct ApiClient {
    base_url: String,
    token: String,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http: Client::new(),
        }
    }

    fn base_files_url(&self, slug: &str, suffix: &str) -> String {
        format!("{}/api/projects/{}/base-files{}", self.base_url, slug, suffix)
    }

    fn download_url(&self, project: &str, mr_id: u32, kind: TransferKind) -> String {
        format!(
            "{}/api/previews/{}/mr-{}/{}/download",
            self.base_url, project, mr_id, kind
        )
    }

    /// Maps 401 to `AuthExpired` and any other non-2xx to `Status` with the
    /// response body as context.
    async fn check(&self, resp: Response) -> Result<Response, TransportError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TransportError::AuthExpired);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// `GET /api/projects/{slug}/base-files` — pre-flight status check.
    pub async fn get_base_files_status(&self, slug: &str) -> Result<BaseFilesStatus, TransportError> {
        let resp = self
            .http
            .get(self.base_files_url(slug, ""))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl BaseFileTransport for ApiClient {
    async fn init_upload(
        &self,
        slug: &str,
        kind: TransferKind,
        total_chunks: u64,
        total_size: u64,
    ) -> Result<UploadSession, TransportError> {
        debug!(slug, %kind, total_chunks, total_size, "initialising chunked upload");
        let resp = self
            .http
            .post(self.base_files_url(slug, &format!("/{kind}/upload/init")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "total_chunks": total_chunks,
                "total_size": total_size,
            }))
            .send()
            .await?;
        let resp = self.check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn upload_chunk(
        &self,
        slug: &str,
        kind: TransferKind,
        upload_id: &str,
        index: u64,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        let form = Form::new()
            .text("upload_id", upload_id.to_string())
            .text("chunk_index", index.to_string())
            .part("file", Part::bytes(payload).file_name(format!("chunk_{index}")));

        let resp = self
            .http
            .post(self.base_files_url(slug, &format!("/{kind}/upload/chunk")))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    async fn complete_upload(
        &self,
        slug: &str,
        kind: TransferKind,
        upload_id: &str,
    ) -> Result<(), TransportError> {
        debug!(slug, %kind, upload_id, "completing chunked upload");
        let resp = self
            .http
            .post(self.base_files_url(slug, &format!("/{kind}/upload/complete")))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "upload_id": upload_id }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    async fn upload_single(
        &self,
        slug: &str,
        kind: TransferKind,
        filename: &str,
        staged: &Path,
        total_size: u64,
    ) -> Result<(), TransportError> {
        let file = tokio::fs::File::open(staged).await?;

        let bar = progress::transfer_bar(total_size, "Uploading...");
        let counting = bar.clone();
        let stream = ReaderStream::new(file).inspect(move |chunk| {
            if let Ok(bytes) = chunk {
                counting.inc(bytes.len() as u64);
            }
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total_size)
            .file_name(filename.to_string());
        let form = Form::new().part("file", part);

        let resp = self
            .http
            .post(self.base_files_url(slug, &format!("/{kind}")))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;
        bar.finish();
        self.check(resp).await?;
        Ok(())
    }

    async fn download_base_file(
        &self,
        project: &str,
        mr_id: u32,
        kind: TransferKind,
        dest: &Path,
    ) -> Result<u64, TransportError> {
        let resp = self
            .http
            .get(self.download_url(project, mr_id, kind))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = self.check(resp).await?;

        // The server knows the size and serves one stream; copy it straight
        // to the destination with no intermediate staging.
        let mut out = tokio::fs::File::create(dest).await?;
        let mut body = resp.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

//! The whole run: validate, request the artifact, fetch it.
//!
//! The primary session and the transfer sub-session never share a
//! connection. The transfer starts only after the primary session has
//! closed, and only with the artifact it reported.

use std::path::{Path, PathBuf};

use log::info;

use crate::config::Config;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::request::{RawRequest, Request};
use crate::service::{self, Artifact};
use crate::transfer;

/// Validate `raw` and run it, producing the terminal [`Outcome`].
///
/// Validation and configuration errors are reported before any
/// connection is attempted.
pub async fn execute(raw: RawRequest, config: &Config) -> Outcome {
    Outcome::from_result(validate_and_run(raw, config).await)
}

async fn validate_and_run(raw: RawRequest, config: &Config) -> Result<PathBuf> {
    config.validate()?;
    let request = raw.validate()?;
    run(&request, config).await
}

/// Run a validated request and return the local path of the artifact.
pub async fn run(request: &Request, config: &Config) -> Result<PathBuf> {
    info!(
        "requesting {} SPK for {} ({} to {})",
        request.format, request.label, request.start, request.stop
    );
    let artifact = service::request_artifact(request, &config.primary).await?;

    let destination = destination(request.output.as_deref(), &artifact).await;
    transfer::fetch(&artifact, request.contact(), &destination, &config.transfer).await?;
    Ok(destination)
}

/// Where to save `artifact`: the caller's path, the default name inside
/// the caller's directory, or the default name in the working directory.
async fn destination(output: Option<&Path>, artifact: &Artifact) -> PathBuf {
    let default = artifact.default_file_name();
    match output {
        Some(path) if is_dir(path).await => path.join(default),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default),
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

//! The ephemeris service dialogue.
//!
//! Builds the primary [`Script`] for a [`Request`] from the configured
//! pattern table, drives it over a fresh connection, and turns the
//! transcript into an [`Artifact`] for the transfer sub-session.

mod patterns;

pub use patterns::{PatternTable, Patterns};

use log::info;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::PrimaryConfig;
use crate::driver::{Action, Input, Rejection, Script, Session, Step, Transcript};
use crate::error::{Error, Result};
use crate::request::{Format, Request};
use crate::transport::Connection;

/// The file the service produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Numeric object identifier reported by the service.
    pub id: String,

    /// Remote file name to fetch.
    pub file: String,

    /// Format that was requested.
    pub format: Format,
}

impl Artifact {
    /// Local file name used when the caller gives no output path.
    pub fn default_file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.suffix())
    }
}

/// Build the dialogue for `request`.
pub fn build_script(request: &Request, patterns: &Patterns, config: &PrimaryConfig) -> Script {
    let cancel = || Input::line(config.cancel_token.clone());

    let opening = if request.uses_elements() {
        ";".to_string()
    } else {
        request.label.clone()
    };
    let banner = Step::new("banner")
        .on(patterns.banner.clone(), Action::Send(Input::line(opening)))
        .with_timeout(config.banner_timeout());

    let selection: Vec<Step> = if request.uses_elements() {
        let mut lines = request.elements.clone();
        lines.push(String::new());
        vec![
            Step::new("object-name").on(
                patterns.object_name.clone(),
                Action::Send(Input::line(request.label.clone())),
            ),
            Step::new("elements").on(
                patterns.elements_prompt.clone(),
                Action::Send(Input::Lines(lines)),
            ),
            Step::new("elements-check")
                .on(
                    patterns.input_error.clone(),
                    Action::Fail(Rejection::new("elements rejected")),
                )
                .on(patterns.menu.clone(), Action::Send(Input::line("S"))),
        ]
    } else {
        vec![
            Step::new("lookup")
                .on(
                    patterns.not_found.clone(),
                    Action::Fail(Rejection::new("no such object")),
                )
                .on(
                    patterns.ambiguous.clone(),
                    Action::Fail(Rejection::new("object designation is not unique")),
                )
                .on(patterns.menu.clone(), Action::Send(Input::line("S"))),
        ]
    };

    let format_answer = match request.format {
        Format::Transfer => "YES",
        Format::Binary => "NO",
    };

    let spk = [
        Step::new("contact").on(
            patterns.contact_prompt.clone(),
            Action::Send(Input::hidden(request.contact())),
        ),
        Step::new("format").on(
            patterns.format_prompt.clone(),
            Action::Send(Input::line(format_answer)),
        ),
        Step::new("start").on(
            patterns.start_prompt.clone(),
            Action::Send(Input::line(request.start.clone())),
        ),
        Step::new("stop")
            .on(
                patterns.bad_date.clone(),
                Action::Fail(Rejection::new("start date not recognized")),
            )
            .on(
                patterns.out_of_range.clone(),
                Action::Fail(Rejection::new("start date outside supported range")),
            )
            .on(
                patterns.stop_prompt.clone(),
                Action::Send(Input::line(request.stop.clone())),
            ),
        Step::new("span-check")
            .on(
                patterns.bad_date.clone(),
                Action::Fail(Rejection::new("stop date not recognized")),
            )
            .on(
                patterns.out_of_range.clone(),
                Action::Fail(Rejection::new("stop date outside supported range")),
            )
            .on(
                patterns.span_too_small.clone(),
                Action::Fail(Rejection::new("time span below minimum")),
            )
            .on(patterns.more_objects.clone(), Action::Send(Input::line("NO"))),
        Step::new("generate")
            .on(patterns.generated.clone(), Action::CaptureAndSend(cancel()))
            .with_timeout(config.generate_timeout()),
    ];

    Script::new("spk-request")
        .step(banner)
        .steps(selection)
        .steps(spk)
}

/// Run the dialogue for `request` against the configured endpoint.
pub async fn request_artifact(request: &Request, config: &PrimaryConfig) -> Result<Artifact> {
    let patterns = config.patterns.compile()?;
    let script = build_script(request, &patterns, config);

    let connection = Connection::open(
        &config.endpoint,
        config.connect_timeout(),
        config.connection_options(),
    )
    .await?;
    info!("connected to {}", config.endpoint);

    let session = Session::new(connection, config.session_context());
    let transcript = session.drive(&script).await?;
    artifact_from(&transcript, request.format)
}

/// Run the dialogue over an already open connection.
pub async fn request_artifact_over<S>(
    connection: Connection<S>,
    request: &Request,
    config: &PrimaryConfig,
) -> Result<Artifact>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let patterns = config.patterns.compile()?;
    let script = build_script(request, &patterns, config);
    let session = Session::new(connection, config.session_context());
    let transcript = session.drive(&script).await?;
    artifact_from(&transcript, request.format)
}

fn artifact_from(transcript: &Transcript, format: Format) -> Result<Artifact> {
    let missing = |what: &str| {
        let last = transcript.last();
        Error::RemoteRejected {
            step: last.map(|r| r.step.clone()).unwrap_or_default(),
            index: last.map(|r| r.index).unwrap_or_default(),
            reason: format!("service did not report the {what}"),
            diagnostic: last.map(|r| r.matched.clone()).unwrap_or_default(),
        }
    };

    let artifact = Artifact {
        id: transcript
            .capture("id")
            .ok_or_else(|| missing("object identifier"))?
            .to_string(),
        file: transcript
            .capture("file")
            .ok_or_else(|| missing("file name"))?
            .to_string(),
        format,
    };
    info!(
        "service produced {} for object {}",
        artifact.file, artifact.id
    );
    Ok(artifact)
}

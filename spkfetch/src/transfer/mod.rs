//! The transfer sub-session: fetch a produced artifact over FTP.
//!
//! A second, smaller dialogue on its own control connection. Login and
//! directory selection are a [`Script`]; the fetch itself needs a data
//! connection set up between steps, so its steps are run one at a time.
//!
//! Active mode is tried first. A `425` reply to the fetch is the one
//! transient failure: the fetch is retried exactly once in passive mode.

mod data;
mod replies;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};

use self::replies::*;
use crate::channel::StepTimeout;
use crate::config::TransferConfig;
use crate::driver::{Action, Input, Rejection, Script, Session, Step};
use crate::error::{Error, Result, TransferError};
use crate::request::Format;
use crate::service::Artifact;
use crate::transport::Connection;

const LOGIN_REFUSED: &str = "login refused";
const NO_DIRECTORY: &str = "cannot enter directory";
const NOT_FOUND: &str = "file not found";
const DATA_CONNECTION: &str = "data connection failed";
const REFUSED: &str = "command refused";

const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Branch of the `user` step taken when the server needs no password.
const LOGGED_IN_WITHOUT_PASSWORD: usize = 1;

/// Fetch `artifact` into `destination`.
///
/// `contact` is the password for the anonymous login. The file is written
/// to `<destination>.part` and renamed once the server confirms the
/// transfer, so a failed fetch leaves nothing at `destination`. Returns
/// the number of bytes written.
pub async fn fetch(
    artifact: &Artifact,
    contact: &str,
    destination: &Path,
    config: &TransferConfig,
) -> Result<u64> {
    let connection = Connection::open(
        &config.endpoint,
        config.connect_timeout(),
        config.connection_options(),
    )
    .await?;
    info!("connected to {}", config.endpoint);

    let mut session = Session::new(connection, config.session_context());
    let part = part_path(destination);

    match transfer(&mut session, artifact, contact, &part, config).await {
        Ok(written) => {
            quit(session).await;
            if let Err(e) = tokio::fs::rename(&part, destination).await {
                discard(&part).await;
                return Err(e.into());
            }
            info!("saved {} ({written} bytes)", destination.display());
            Ok(written)
        }
        Err(e) => {
            discard(&part).await;
            let error = classify(e, artifact, config);
            Err(session.abort(error).await)
        }
    }
}

/// Login, directory change and fetch.
async fn transfer(
    session: &mut Session<TcpStream>,
    artifact: &Artifact,
    contact: &str,
    part: &Path,
    config: &TransferConfig,
) -> Result<u64> {
    login(session, artifact.format, contact, config).await?;

    if !config.passive {
        match retrieve_active(session, artifact, part, config).await? {
            Some(written) => return Ok(written),
            None => warn!("active data connection failed, retrying in passive mode"),
        }
    }
    retrieve_passive(session, artifact, part, config).await
}

/// Run the login script. A server that accepts the user without a
/// password has already been sent `TYPE`, so the password step is skipped.
async fn login<S>(
    session: &mut Session<S>,
    format: Format,
    contact: &str,
    config: &TransferConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let script = login_script(format, contact, config);
    let mut skip_password = false;
    for step in script.iter() {
        if std::mem::take(&mut skip_password) {
            debug!("logged in without a password");
            continue;
        }
        let record = session.run_step(step).await?;
        skip_password = step.name == "user" && record.branch == LOGGED_IN_WITHOUT_PASSWORD;
    }
    Ok(())
}

/// Steps from greeting to the remote directory.
pub fn login_script(format: Format, contact: &str, config: &TransferConfig) -> Script {
    let mode = match format {
        Format::Binary => "TYPE I",
        Format::Transfer => "TYPE A",
    };

    Script::new("ftp-login")
        .step(
            Step::new("greeting")
                .on(SERVICE_READY.clone(), send(format!("USER {}", config.user)))
                .on(SERVICE_UNAVAILABLE.clone(), fail(REFUSED))
                .on(NEGATIVE.clone(), fail(REFUSED)),
        )
        .step(
            Step::new("user")
                .on(
                    NEED_PASSWORD.clone(),
                    Action::Send(Input::hidden(format!("PASS {contact}"))),
                )
                .on(LOGGED_IN.clone(), send(mode))
                .on(NEGATIVE.clone(), fail(LOGIN_REFUSED)),
        )
        .step(
            Step::new("password")
                .on(LOGIN_COMPLETE.clone(), send(mode))
                .on(NEGATIVE.clone(), fail(LOGIN_REFUSED)),
        )
        .step(
            Step::new("type")
                .on(COMMAND_OK.clone(), send(format!("CWD {}", config.remote_dir)))
                .on(NEGATIVE.clone(), fail(REFUSED)),
        )
        .step(
            Step::new("cwd")
                .on(DIRECTORY_OK.clone(), Action::Advance)
                .on(NEGATIVE.clone(), fail(NO_DIRECTORY)),
        )
}

/// Fetch over an active-mode data connection.
///
/// Returns `None` when the server reports that it could not open the
/// data connection, so the caller can retry in passive mode.
async fn retrieve_active(
    session: &mut Session<TcpStream>,
    artifact: &Artifact,
    part: &Path,
    config: &TransferConfig,
) -> Result<Option<u64>> {
    let ip = match session.connection().local_addr().map(|addr| addr.ip()) {
        Some(IpAddr::V4(ip)) => ip,
        other => {
            debug!("no IPv4 control address ({other:?}), skipping active mode");
            return Ok(None);
        }
    };

    let listener = TcpListener::bind((ip, 0)).await?;
    let port = listener.local_addr()?.port();
    session
        .send_line(&format!("PORT {}", port_argument(ip, port)))
        .await?;

    let port_step = Step::new("port")
        .on(COMMAND_OK.clone(), send(format!("RETR {}", artifact.file)))
        .on(NEGATIVE.clone(), fail(DATA_CONNECTION));
    session.run_step(&port_step).await?;

    let retrieve = Step::new("retrieve")
        .on(DATA_OPENING.clone(), Action::Advance)
        .on(DATA_UNAVAILABLE.clone(), Action::Advance)
        .on(FILE_UNAVAILABLE.clone(), fail(NOT_FOUND))
        .on(NEGATIVE.clone(), fail(REFUSED));
    if session.run_step(&retrieve).await?.branch == 1 {
        return Ok(None);
    }

    // The server may still give up on connecting after announcing the
    // transfer, so the control connection is watched while accepting.
    let late_failure = Step::new("data-open")
        .on(DATA_UNAVAILABLE.clone(), Action::Advance)
        .on(NEGATIVE.clone(), fail(REFUSED))
        .with_timeout(StepTimeout::from(config.connect_timeout()));
    let stream = tokio::select! {
        biased;
        accepted = listener.accept() => {
            let (stream, peer) = accepted?;
            debug!("data connection from {peer}");
            stream
        }
        reply = session.run_step(&late_failure) => {
            reply?;
            return Ok(None);
        }
    };

    download(session, stream, part, artifact.format, config)
        .await
        .map(Some)
}

/// Fetch over a passive-mode data connection. No further retry.
async fn retrieve_passive(
    session: &mut Session<TcpStream>,
    artifact: &Artifact,
    part: &Path,
    config: &TransferConfig,
) -> Result<u64> {
    session.send_line("PASV").await?;
    let passive = Step::new("passive")
        .on(ENTERING_PASSIVE.clone(), Action::Advance)
        .on(NEGATIVE.clone(), fail(DATA_CONNECTION));
    let record = session.run_step(&passive).await?;
    let port = passive_port(&record.matched)?;

    let host = session
        .connection()
        .peer_addr()
        .map(|addr| addr.ip())
        .ok_or_else(|| data_connection_error("control connection has no peer address"))?;
    debug!("passive data connection to {host}:{port}");
    let stream = tokio::time::timeout(config.connect_timeout(), TcpStream::connect((host, port)))
        .await
        .map_err(|_| data_connection_error(&format!("connect to {host}:{port} timed out")))?
        .map_err(|e| data_connection_error(&format!("connect to {host}:{port}: {e}")))?;

    session
        .send_line(&format!("RETR {}", artifact.file))
        .await?;
    let retrieve = Step::new("retrieve-passive")
        .on(DATA_OPENING.clone(), Action::Advance)
        .on(FILE_UNAVAILABLE.clone(), fail(NOT_FOUND))
        .on(DATA_UNAVAILABLE.clone(), fail(DATA_CONNECTION))
        .on(NEGATIVE.clone(), fail(REFUSED));
    session.run_step(&retrieve).await?;

    download(session, stream, part, artifact.format, config).await
}

/// Stream the data connection to `part` and wait for the completion reply.
async fn download(
    session: &mut Session<TcpStream>,
    stream: TcpStream,
    part: &Path,
    format: Format,
    config: &TransferConfig,
) -> Result<u64> {
    let written = data::receive(stream, part, format, config.data_timeout()).await?;

    let complete = Step::new("complete")
        .on(TRANSFER_COMPLETE.clone(), Action::Advance)
        .on(NEGATIVE.clone(), fail(REFUSED));
    session.run_step(&complete).await?;
    Ok(written)
}

/// Say goodbye and close. Failures here cannot affect the outcome.
async fn quit(mut session: Session<TcpStream>) {
    if let Err(e) = session.send_line("QUIT").await {
        debug!("QUIT not sent: {e}");
    } else {
        let goodbye = Step::new("quit")
            .on(CLOSING.clone(), Action::Advance)
            .on(NEGATIVE.clone(), Action::Advance)
            .with_timeout(StepTimeout::from(QUIT_TIMEOUT));
        if let Err(e) = session.run_step(&goodbye).await {
            debug!("no reply to QUIT: {e}");
        }
    }
    session.finish().await;
}

/// Turn a rejected step into the matching transfer error. Other errors
/// pass through unchanged.
fn classify(error: Error, artifact: &Artifact, config: &TransferConfig) -> Error {
    let (reason, reply) = match error {
        Error::RemoteRejected {
            reason, diagnostic, ..
        } => (reason, diagnostic),
        other => return other,
    };

    let failure = match reason.as_str() {
        LOGIN_REFUSED => TransferError::LoginRefused { reply },
        NO_DIRECTORY => TransferError::Directory {
            dir: config.remote_dir.clone(),
            reply,
        },
        NOT_FOUND => TransferError::NotFound {
            file: artifact.file.clone(),
            reply,
        },
        DATA_CONNECTION => TransferError::DataConnection { reply },
        _ => TransferError::Remote { reply },
    };
    failure.into()
}

fn send(line: impl Into<String>) -> Action {
    Action::Send(Input::line(line))
}

fn fail(reason: &str) -> Action {
    Action::Fail(Rejection::new(reason))
}

fn data_connection_error(reply: &str) -> TransferError {
    TransferError::DataConnection {
        reply: reply.to_string(),
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn discard(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => debug!("removed partial file {}", part.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove partial file {}: {e}", part.display()),
    }
}

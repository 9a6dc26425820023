//! The session driver: walks a script over one connection.

use std::time::{Duration, Instant};

use indexmap::IndexMap;
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use super::StepTimeout;
use super::record::{StepRecord, Transcript};
use super::script::{Action, Input, Script, Step};
use crate::channel::PatternMatch;
use crate::error::{ChannelError, Error, Result};
use crate::transport::Connection;

/// Mutable state threaded through every step of one session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Number of step invocations that have resolved, by a match or an
    /// error. An invocation abandoned while waiting does not count.
    pub step_index: usize,

    /// Values captured by `CaptureAndSend` branches.
    pub captures: IndexMap<String, String>,

    /// Timeout for steps that do not set their own.
    pub default_timeout: StepTimeout,

    /// When set, overrides every step's timeout.
    pub timeout_override: Option<StepTimeout>,

    /// Sent before closing after a failure, to leave the peer clean.
    pub cancel_token: Option<String>,

    /// Maximum `Reply` actions per step before giving up.
    pub max_replies: usize,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            step_index: 0,
            captures: IndexMap::new(),
            default_timeout: StepTimeout::After(Duration::from_secs(60)),
            timeout_override: None,
            cancel_token: None,
            max_replies: 8,
        }
    }
}

impl SessionContext {
    /// Create a context with the given default timeout.
    pub fn new(default_timeout: StepTimeout) -> Self {
        Self {
            default_timeout,
            ..Default::default()
        }
    }

    /// Set the cancellation token.
    pub fn with_cancel_token(mut self, token: impl Into<String>) -> Self {
        self.cancel_token = Some(token.into());
        self
    }

    /// Set the reply limit.
    pub fn with_max_replies(mut self, max_replies: usize) -> Self {
        self.max_replies = max_replies;
        self
    }

    /// Timeout that applies to `step`.
    pub fn timeout_for(&self, step: &Step) -> StepTimeout {
        self.timeout_override
            .or(step.timeout)
            .unwrap_or(self.default_timeout)
    }
}

/// One dialogue with one remote peer.
///
/// Created at dialogue start and consumed when it reaches a terminal
/// state. Each step runs exactly once; only scripted `Reply` branches
/// re-run a step.
pub struct Session<S> {
    connection: Connection<S>,
    context: SessionContext,
    records: Vec<StepRecord>,
    started: Instant,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Start a session over an open connection.
    pub fn new(connection: Connection<S>, context: SessionContext) -> Self {
        Self {
            connection,
            context,
            records: Vec::new(),
            started: Instant::now(),
        }
    }

    /// The session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Mutable access to the session context.
    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection<S> {
        &self.connection
    }

    /// Drive `script` to a terminal state and consume the session.
    ///
    /// On success the connection is closed and the transcript returned. On
    /// failure the cancellation token is sent (when the peer can still
    /// hear it), the connection is closed, and the original error returned.
    pub async fn drive(mut self, script: &Script) -> Result<Transcript> {
        info!(
            "{}: running {} ({} steps)",
            self.connection.name(),
            script.name,
            script.len()
        );
        match self.run_script(script).await {
            Ok(()) => Ok(self.finish().await),
            Err(e) => Err(self.abort(e).await),
        }
    }

    /// Run every step of `script` in order without closing.
    pub async fn run_script(&mut self, script: &Script) -> Result<()> {
        for step in script.iter() {
            self.run_step(step).await?;
        }
        Ok(())
    }

    /// Run one step: wait for a branch, then take its action.
    ///
    /// Returns the record of the invocation that advanced past the step.
    pub async fn run_step(&mut self, step: &Step) -> Result<StepRecord> {
        let patterns = step.patterns();
        let timeout = self.context.timeout_for(step);
        let mut replies = 0;

        loop {
            let index = self.context.step_index + 1;
            let start = Instant::now();

            let received = self.connection.receive_until(&patterns, timeout).await;
            self.context.step_index = index;
            let found = received.map_err(|e| self.step_error(step, index, e))?;
            let branch = &step.branches[found.index];

            debug!(
                "{}: step {} ({}) matched branch {}: {:?}",
                self.connection.name(),
                index,
                step.name,
                found.index,
                found.matched.trim()
            );

            let (input, repeat) = match &branch.action {
                Action::Send(input) => (Some(input), false),
                Action::CaptureAndSend(input) => {
                    self.store_captures(&found);
                    (Some(input), false)
                }
                Action::Advance => (None, false),
                Action::Reply(input) => {
                    replies += 1;
                    if replies > self.context.max_replies {
                        return Err(Error::RemoteRejected {
                            step: step.name.clone(),
                            index,
                            reason: format!(
                                "prompt repeated more than {} times",
                                self.context.max_replies
                            ),
                            diagnostic: found.matched.trim().to_string(),
                        });
                    }
                    (Some(input), true)
                }
                Action::Fail(rejection) => {
                    let diagnostic = found.matched.trim().to_string();
                    self.record(step, index, &found, None, start);
                    return Err(Error::RemoteRejected {
                        step: step.name.clone(),
                        index,
                        reason: rejection.reason.clone(),
                        diagnostic,
                    });
                }
            };

            if let Some(input) = input {
                self.send_input(input).await?;
            }
            let record = self.record(step, index, &found, input, start);
            if !repeat {
                return Ok(record);
            }
        }
    }

    /// Send scripted input.
    pub async fn send_input(&mut self, input: &Input) -> Result<()> {
        debug!("{}: sending {input}", self.connection.name());
        for line in input.wire_lines() {
            self.connection
                .send_line(line)
                .await
                .map_err(channel_io_error)?;
        }
        Ok(())
    }

    /// Send a single plain line outside of any script.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.send_input(&Input::line(line)).await
    }

    /// Close cleanly and return the transcript.
    pub async fn finish(mut self) -> Transcript {
        self.connection.close().await;
        Transcript {
            steps: std::mem::take(&mut self.records),
            captures: std::mem::take(&mut self.context.captures),
            elapsed: self.started.elapsed(),
        }
    }

    /// Leave the peer in a clean state and close, returning `error`.
    ///
    /// A failure to send the cancellation token is logged, never returned:
    /// the original error is what the operator needs to see.
    pub async fn abort(mut self, error: Error) -> Error {
        let writable = self.connection.is_open() && !matches!(error, Error::Disconnected { .. });

        if let (true, Some(token)) = (writable, self.context.cancel_token.clone()) {
            debug!("{}: sending cancellation token", self.connection.name());
            if let Err(e) = self.connection.send_line(&token).await {
                warn!(
                    "{}: could not send cancellation token: {e}",
                    self.connection.name()
                );
            }
        }

        self.connection.close().await;
        debug!(
            "{}: transcript before failure:\n{}",
            self.connection.name(),
            self.records
                .iter()
                .map(|r| r.raw_output.as_str())
                .collect::<String>()
        );
        error
    }

    fn store_captures(&mut self, found: &PatternMatch) {
        for (name, value) in &found.named {
            debug!("{}: captured {name} = {value:?}", self.connection.name());
            self.context.captures.insert(name.clone(), value.clone());
        }
    }

    fn record(
        &mut self,
        step: &Step,
        index: usize,
        found: &PatternMatch,
        input: Option<&Input>,
        start: Instant,
    ) -> StepRecord {
        let record = StepRecord {
            step: step.name.clone(),
            index,
            branch: found.index,
            input: input.map(ToString::to_string),
            matched: found.matched.clone(),
            raw_output: found.raw.clone(),
            elapsed: start.elapsed(),
        };
        self.records.push(record.clone());
        record
    }

    fn step_error(&self, step: &Step, index: usize, error: ChannelError) -> Error {
        match error {
            ChannelError::TimedOut(timeout) => {
                warn!(
                    "{}: no response at step {index} ({}), pending: {:?}",
                    self.connection.name(),
                    step.name,
                    self.connection.pending()
                );
                Error::ProtocolTimeout {
                    step: step.name.clone(),
                    index,
                    timeout,
                }
            }
            ChannelError::Closed => Error::Disconnected {
                step: step.name.clone(),
                index,
            },
            ChannelError::Io(e) => Error::Io(e),
        }
    }
}

fn channel_io_error(error: ChannelError) -> Error {
    match error {
        ChannelError::Io(e) => Error::Io(e),
        other => Error::Io(std::io::Error::other(other.to_string())),
    }
}

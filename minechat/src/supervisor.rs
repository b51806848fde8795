//! Connect, handshake, run a session, and start over when the network fails.
//!
//! Each pass through the loop is one [`ConnectionAttempt`] whose result is
//! classified as success, retryable, or fatal. Retryable failures sleep for
//! the current backoff delay and reconnect from scratch; fatal ones return.
//! The caller's shutdown future is raced against both the attempt and the
//! sleep, and the transport of an interrupted attempt is dropped with it.

use std::{future::Future, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    select,
    time::{Instant, sleep},
};
use tracing::{debug, error, info, warn};

use crate::{
    codec::{AuthResult, Credential},
    error::ChatError,
    handshake::Handshake,
    session::Session,
    transport::{Connector, Endpoint, LineTransport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first failure, and after any failure that followed traffic.
    pub initial: Duration,
    /// Delay once failures keep happening without traffic in between.
    pub escalated: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            escalated: Duration::from_secs(15),
        }
    }
}

/// Backoff bookkeeping, owned by the supervisor alone.
///
/// Within one failure streak the delay never decreases; it returns to
/// [`RetryPolicy::initial`] only after a successful exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    delay: Duration,
    consecutive_failures: u32,
}

impl RetryState {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            delay: policy.initial,
            consecutive_failures: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Returns how long to wait before the next attempt, then escalates.
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Duration {
        let wait = self.delay;
        self.consecutive_failures += 1;
        self.delay = self.delay.max(policy.escalated);
        wait
    }

    pub fn record_exchange(&mut self, policy: &RetryPolicy) {
        self.delay = policy.initial;
        self.consecutive_failures = 0;
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct Completion<T> {
    /// The account record, when a handshake was performed.
    pub auth: Option<AuthResult>,
    pub output: T,
}

#[derive(Debug)]
pub enum Outcome<T> {
    Completed(Completion<T>),
    Cancelled,
}

enum Attempt<T> {
    Success(Completion<T>),
    Retryable { cause: ChatError, exchanged: bool },
    Fatal(ChatError),
}

impl<T> Attempt<T> {
    fn failed(cause: ChatError, exchanged: bool) -> Self {
        if cause.is_retryable() {
            Self::Retryable { cause, exchanged }
        } else {
            Self::Fatal(cause)
        }
    }
}

/// The single live connection of a supervisor, closed when the attempt ends.
struct ConnectionAttempt<S> {
    transport: LineTransport<S>,
    started_at: Instant,
}

impl<S> ConnectionAttempt<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(transport: LineTransport<S>) -> Self {
        Self {
            transport,
            started_at: Instant::now(),
        }
    }

    async fn exchange<Z>(
        &mut self,
        credential: Option<&Credential>,
        session: &mut Z,
    ) -> Result<Completion<Z::Output>, ChatError>
    where
        Z: Session,
    {
        session.on_connected().await?;

        let auth = match credential {
            Some(credential) => Some(Handshake::new(&mut self.transport).perform(credential).await?),
            None => None,
        };
        let output = session.run(&mut self.transport).await?;

        Ok(Completion { auth, output })
    }

    async fn finish(mut self) {
        self.transport.close().await;
        debug!(
            peer = %self.transport.peer(),
            elapsed = ?self.started_at.elapsed(),
            "connection closed"
        );
    }
}

pub struct Supervisor<C> {
    connector: C,
    endpoint: Endpoint,
    policy: RetryPolicy,
    retry: RetryState,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(connector: C, endpoint: Endpoint) -> Self {
        let policy = RetryPolicy::default();
        Self {
            connector,
            endpoint,
            retry: RetryState::new(&policy),
            policy,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryState::new(&policy);
        self.policy = policy;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    /// Keeps attempting until the session completes, a fatal error occurs, or
    /// `shutdown` resolves.
    pub async fn run_until<Z, F>(
        &mut self,
        credential: Option<&Credential>,
        session: &mut Z,
        shutdown: F,
    ) -> Result<Outcome<Z::Output>, ChatError>
    where
        Z: Session,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let attempt = select! {
                _ = &mut shutdown => {
                    info!(endpoint = %self.endpoint, "shutdown requested");
                    return Ok(Outcome::Cancelled);
                }
                attempt = self.attempt(credential, session) => attempt,
            };

            let (cause, exchanged) = match attempt {
                Attempt::Success(completion) => return Ok(Outcome::Completed(completion)),
                Attempt::Fatal(cause) => {
                    error!(endpoint = %self.endpoint, error = %cause, "giving up");
                    return Err(cause);
                }
                Attempt::Retryable { cause, exchanged } => (cause, exchanged),
            };

            if exchanged {
                self.retry.record_exchange(&self.policy);
            }
            let delay = self.retry.record_failure(&self.policy);
            warn!(
                endpoint = %self.endpoint,
                error = %cause,
                delay_secs = delay.as_secs_f64(),
                failures = self.retry.consecutive_failures(),
                "connection attempt failed, retrying"
            );
            session.on_retry(&cause).await?;

            select! {
                _ = &mut shutdown => {
                    info!(endpoint = %self.endpoint, "shutdown requested during backoff");
                    return Ok(Outcome::Cancelled);
                }
                _ = sleep(delay) => {}
            }
        }
    }

    pub async fn run_until_ctrl_c<Z>(
        &mut self,
        credential: Option<&Credential>,
        session: &mut Z,
    ) -> Result<Outcome<Z::Output>, ChatError>
    where
        Z: Session,
    {
        self.run_until(credential, session, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    async fn attempt<Z>(
        &mut self,
        credential: Option<&Credential>,
        session: &mut Z,
    ) -> Attempt<Z::Output>
    where
        Z: Session,
    {
        let transport = match self.connector.connect(&self.endpoint).await {
            Ok(transport) => transport,
            Err(cause) => return Attempt::failed(cause, false),
        };

        let mut attempt = ConnectionAttempt::new(transport);
        let result = attempt.exchange(credential, session).await;
        attempt.finish().await;

        match result {
            Ok(completion) => Attempt::Success(completion),
            Err(cause) => Attempt::failed(cause, session.made_progress()),
        }
    }
}

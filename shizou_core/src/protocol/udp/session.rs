//! Envelope shared by every UDP request
//!
//! `UdpSession::execute` owns the rate limiter, the ban short-circuit, the
//! session key, tag matching and the response codes every command can
//! return. Request kinds only encode parameters and classify their own codes.
//!
//! The session key is read, renewed and cleared only while the caller holds
//! the transport's limiter slot. The limiter gate admits one holder at a
//! time, so two requests can never race to log in.

use log::{debug, error, info, trace, warn};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use super::UdpConfig;
use super::auth::{AuthRequest, LogoutRequest};
use super::codec::{self, RawResponse};
use super::transport::DatagramTransport;
use crate::Result;
use crate::protocol::outcome::Interrupt;
use crate::protocol::{BanGate, Outcome, codes};
use crate::ratelimit::{RateLimitGuard, RateLimiter};

/// Response addressed to the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpResponse {
    pub code: u16,
    /// Text after the code on the first line
    pub text: String,
    pub body: String,
}

impl From<RawResponse> for UdpResponse {
    fn from(raw: RawResponse) -> Self {
        Self {
            code: raw.code,
            text: raw.text,
            body: raw.body,
        }
    }
}

/// One UDP API verb
pub trait UdpRequest: Send + Sync {
    type Output: Send;

    /// Command name, e.g. `FILE`
    fn command(&self) -> &'static str;

    /// Parameters in wire order, without `s` and `tag`
    fn params(&self) -> Vec<(String, String)>;

    /// Classify a code not handled by the session
    fn classify(&self, response: &UdpResponse) -> Outcome<Self::Output>;
}

#[derive(Debug, Clone)]
struct SessionInfo {
    key: String,
    image_server: Option<String>,
}

/// What the shared code table decided
enum Shared {
    Pass,
    Relogin,
    Stop(Interrupt),
}

/// Authenticated AniDB UDP session
pub struct UdpSession {
    config: UdpConfig,
    transport: Arc<dyn DatagramTransport>,
    limiter: RateLimiter,
    ban: BanGate,
    /// Written only under a limiter slot; never locked across an await
    session: Mutex<Option<SessionInfo>>,
    last_activity: Mutex<Option<Instant>>,
}

impl UdpSession {
    pub fn new(
        config: UdpConfig,
        transport: Arc<dyn DatagramTransport>,
        limiter: RateLimiter,
        ban: BanGate,
    ) -> Self {
        Self {
            config,
            transport,
            limiter,
            ban,
            session: Mutex::new(None),
            last_activity: Mutex::new(None),
        }
    }

    pub fn ban_gate(&self) -> &BanGate {
        &self.ban
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Whether a session key is held
    pub fn is_logged_in(&self) -> bool {
        self.session_cell().is_some()
    }

    /// Image server announced at login
    pub fn image_server(&self) -> Option<String> {
        self.session_cell()
            .as_ref()
            .and_then(|s| s.image_server.clone())
    }

    fn session_cell(&self) -> std::sync::MutexGuard<'_, Option<SessionInfo>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Perform a request, logging in first when needed
    ///
    /// A rejected session is renewed once and the request retried once.
    pub async fn execute<R: UdpRequest>(&self, request: &R) -> Result<Outcome<R::Output>> {
        let command = request.command();
        let mut retried = false;
        loop {
            let (guard, session) = match self
                .acquire_with_session(codec::requires_session(command))
                .await?
            {
                Ok(slot) => slot,
                Err(interrupt) => return Ok(interrupt.into()),
            };

            let response = match self
                .exchange(command, &request.params(), session.as_deref())
                .await?
            {
                Ok(response) => response,
                Err(interrupt) => {
                    if matches!(interrupt, Interrupt::Ban(_)) {
                        *self.session_cell() = None;
                    }
                    guard.release();
                    return Ok(interrupt.into());
                }
            };

            let shared = self.classify_shared(command, &response);
            if matches!(shared, Shared::Relogin | Shared::Stop(Interrupt::Ban(_))) {
                *self.session_cell() = None;
            }
            guard.release();

            match shared {
                Shared::Pass => return Ok(request.classify(&response)),
                Shared::Stop(interrupt) => return Ok(interrupt.into()),
                Shared::Relogin if !retried => {
                    debug!("Session renewed, retrying {command}");
                    retried = true;
                }
                Shared::Relogin => {
                    return Ok(Outcome::Fatal(format!(
                        "{command} rejected the session twice"
                    )));
                }
            }
        }
    }

    /// Log out if a session is held
    pub async fn logout(&self) -> Result<()> {
        if !self.is_logged_in() {
            return Ok(());
        }
        let guard = self.limiter.acquire().await;
        let Some(info) = self.session_cell().take() else {
            return Ok(());
        };
        if self.ban.is_banned() {
            return Ok(());
        }

        let request = LogoutRequest;
        match self
            .exchange(request.command(), &request.params(), Some(&info.key))
            .await?
        {
            Ok(response) => match request.classify(&response) {
                Outcome::Success(()) => info!("Logged out of AniDB"),
                other => warn!("Logout answered {}: {}", response.code, other.kind()),
            },
            Err(interrupt) => warn!("Logout failed: {interrupt:?}"),
        }
        guard.release();
        Ok(())
    }

    /// Log out when no request was sent for the idle period
    pub async fn logout_if_idle(&self) -> Result<()> {
        let idle = self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .map(|at| at.elapsed() >= self.config.idle_logout)
            .unwrap_or(false);
        if idle && self.is_logged_in() {
            debug!("UDP session idle, logging out");
            self.logout().await?;
        }
        Ok(())
    }

    /// Take a limiter slot, logging in first when the command needs a session
    ///
    /// AUTH uses a slot of its own, so a login costs one extra wait before the
    /// request itself goes out.
    async fn acquire_with_session(
        &self,
        needs_session: bool,
    ) -> Result<std::result::Result<(RateLimitGuard, Option<String>), Interrupt>> {
        let guard = self.limiter.acquire().await;
        if !needs_session {
            return Ok(Ok((guard, None)));
        }
        if let Some(info) = self.session_cell().as_ref() {
            return Ok(Ok((guard, Some(info.key.clone()))));
        }

        let login = self.login().await;
        guard.release();
        match login? {
            Ok(key) => Ok(Ok((self.limiter.acquire().await, Some(key)))),
            Err(interrupt) => Ok(Err(interrupt)),
        }
    }

    /// Send AUTH and store the session; the caller holds the limiter slot
    async fn login(&self) -> Result<std::result::Result<String, Interrupt>> {
        if let Err(e) = self.config.validate() {
            return Ok(Err(Interrupt::Fatal(e.to_string())));
        }

        let request = AuthRequest::new(&self.config);
        let response = match self.exchange(request.command(), &request.params(), None).await? {
            Ok(response) => response,
            Err(interrupt) => return Ok(Err(interrupt)),
        };
        match self.classify_shared(request.command(), &response) {
            Shared::Pass => {}
            Shared::Stop(interrupt) => return Ok(Err(interrupt)),
            Shared::Relogin => {
                return Ok(Err(Interrupt::Fatal(format!(
                    "AUTH answered {} {}",
                    response.code, response.text
                ))));
            }
        }

        match Interrupt::split(request.classify(&response)) {
            Ok(result) => {
                info!("Logged into AniDB");
                let key = result.session_key.clone();
                *self.session_cell() = Some(SessionInfo {
                    key: result.session_key,
                    image_server: result.image_server,
                });
                Ok(Ok(key))
            }
            Err(interrupt) => Ok(Err(interrupt)),
        }
    }

    /// Send one datagram and wait for the reply carrying its tag
    ///
    /// The caller holds the limiter slot for the whole exchange.
    async fn exchange(
        &self,
        command: &str,
        params: &[(String, String)],
        session: Option<&str>,
    ) -> Result<std::result::Result<UdpResponse, Interrupt>> {
        let result = self.exchange_locked(command, params, session).await;
        *self
            .last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Instant::now());
        result
    }

    async fn exchange_locked(
        &self,
        command: &str,
        params: &[(String, String)],
        session: Option<&str>,
    ) -> Result<std::result::Result<UdpResponse, Interrupt>> {
        if let Some(ban) = self.ban.current() {
            warn!("UDP banned, aborting {command} request");
            return Ok(Err(Interrupt::Ban(ban.reason)));
        }

        let tag = codec::generate_tag();
        let payload = codec::encode_request(command, params, session, &tag)?;
        debug!(
            "Sending AniDB UDP text: {}",
            codec::mask_secrets(&String::from_utf8_lossy(&payload))
        );
        if let Err(e) = self.transport.send(&payload).await {
            warn!("Failed to send {command} request: {e}");
            return Ok(Err(Interrupt::Transient(e.to_string())));
        }

        let deadline = Instant::now() + self.config.receive_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let datagram = match self.transport.recv(remaining).await {
                Ok(Some(datagram)) => datagram,
                Ok(None) => {
                    warn!(
                        "No response to {command} within {:?}",
                        self.config.receive_timeout
                    );
                    return Ok(Err(Interrupt::Fatal(
                        "No UDP response, may be banned".to_string(),
                    )));
                }
                Err(e) => {
                    warn!("Failed to receive {command} response: {e}");
                    return Ok(Err(Interrupt::Transient(e.to_string())));
                }
            };

            let raw = match codec::decode_datagram(&datagram) {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    error!(
                        "AniDB response was malformed: {}",
                        String::from_utf8_lossy(&datagram)
                    );
                    continue;
                }
                Err(e) => {
                    error!("{e}");
                    continue;
                }
            };
            debug!(
                "Received UDP response: {} {} {}\n{}",
                raw.tag, raw.code, raw.text, raw.body
            );

            if raw.tag == tag {
                return Ok(Ok(raw.into()));
            }
            if raw.code == codes::BANNED {
                let reason = ban_reason(&raw.text, &raw.body);
                self.ban.ban(&reason);
                return Ok(Err(Interrupt::Ban(reason)));
            }
            error!(
                "Tag {tag} did not match returned response: {} {} {}",
                raw.tag, raw.code, raw.text
            );
        }
    }

    /// Response codes any command can receive
    ///
    /// Session clearing is left to the caller, which may hold the session lock.
    fn classify_shared(&self, command: &str, response: &UdpResponse) -> Shared {
        trace!("Classifying {command} response {}", response.code);
        match response.code {
            codes::OUT_OF_SERVICE => {
                warn!("AniDB out of service or in maintenance");
                Shared::Stop(Interrupt::Fatal(
                    "AniDB out of service/maintenance".to_string(),
                ))
            }
            codes::SERVER_BUSY => {
                warn!("Server busy, try again later");
                Shared::Stop(Interrupt::Fatal("Server busy, try again later".to_string()))
            }
            codes::BANNED => {
                let reason = ban_reason(&response.text, &response.body);
                self.ban.ban(&reason);
                Shared::Stop(Interrupt::Ban(reason))
            }
            codes::LOGIN_FIRST | codes::INVALID_SESSION => {
                warn!("Session rejected ({}), logging in again", response.code);
                Shared::Relogin
            }
            codes::ACCESS_DENIED => {
                error!("Access denied for {command}");
                Shared::Stop(Interrupt::Fatal("Access was denied".to_string()))
            }
            codes::INTERNAL_SERVER_ERROR | 603..=699 => {
                error!(
                    "AniDB server critical error {} {}",
                    response.code, response.text
                );
                Shared::Stop(Interrupt::Fatal(format!(
                    "Critical error with server {} {}",
                    response.code, response.text
                )))
            }
            codes::UNKNOWN_COMMAND => {
                error!("Unknown command {command}");
                Shared::Stop(Interrupt::Fatal(
                    "Unknown AniDB command, check logs".to_string(),
                ))
            }
            codes::ILLEGAL_INPUT => {
                error!("Illegal input or access denied for {command}");
                Shared::Stop(Interrupt::Fatal(
                    "Illegal AniDB input, check logs".to_string(),
                ))
            }
            code if !codes::is_known(code) => {
                error!("Response code {code} is not known: {}", response.text);
                Shared::Stop(Interrupt::Fatal(format!(
                    "Unknown response code: {code}: {}",
                    response.text
                )))
            }
            _ => Shared::Pass,
        }
    }
}

fn ban_reason(text: &str, body: &str) -> String {
    if body.trim().is_empty() {
        text.to_string()
    } else {
        body.trim().to_string()
    }
}

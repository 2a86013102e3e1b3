//! AUTH, LOGOUT and PING

use super::UdpConfig;
use super::session::{UdpRequest, UdpResponse};
use crate::protocol::{Outcome, PROTOCOL_VERSION, codes};

/// Successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub session_key: String,
    /// Image server announced with `imgserver=1`
    pub image_server: Option<String>,
}

/// AUTH request
#[derive(Debug, Clone)]
pub struct AuthRequest {
    username: String,
    password: String,
    client_name: String,
    client_version: String,
}

impl AuthRequest {
    pub fn new(config: &UdpConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            client_name: config.client_name.clone(),
            client_version: config.client_version.clone(),
        }
    }
}

impl UdpRequest for AuthRequest {
    type Output = AuthResult;

    fn command(&self) -> &'static str {
        "AUTH"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![
            ("user".to_string(), self.username.clone()),
            ("pass".to_string(), self.password.clone()),
            ("protover".to_string(), PROTOCOL_VERSION.to_string()),
            ("client".to_string(), self.client_name.clone()),
            ("clientver".to_string(), self.client_version.clone()),
            ("nat".to_string(), "1".to_string()),
            ("comp".to_string(), "1".to_string()),
            ("enc".to_string(), "UTF-8".to_string()),
            ("mtu".to_string(), crate::protocol::MAX_PACKET_SIZE.to_string()),
            ("imgserver".to_string(), "1".to_string()),
        ]
    }

    fn classify(&self, response: &UdpResponse) -> Outcome<AuthResult> {
        match response.code {
            codes::LOGIN_ACCEPTED | codes::LOGIN_ACCEPTED_NEW_VERSION => {
                let Some(session_key) = response.text.split_whitespace().next() else {
                    return Outcome::Fatal("Login response carried no session key".to_string());
                };
                let image_server = Some(response.body.trim())
                    .filter(|host| !host.is_empty())
                    .map(str::to_string);
                Outcome::Success(AuthResult {
                    session_key: session_key.to_string(),
                    image_server,
                })
            }
            codes::LOGIN_FAILED => Outcome::Fatal("Login failed, change credentials".to_string()),
            codes::CLIENT_OUTDATED => Outcome::Fatal("Login failed, client outdated".to_string()),
            codes::CLIENT_BANNED => {
                Outcome::Fatal(format!("Login failed, client banned: {}", response.text))
            }
            code => Outcome::Fatal(format!("Unexpected AUTH response {code} {}", response.text)),
        }
    }
}

/// LOGOUT request
#[derive(Debug, Clone, Copy, Default)]
pub struct LogoutRequest;

impl UdpRequest for LogoutRequest {
    type Output = ();

    fn command(&self) -> &'static str {
        "LOGOUT"
    }

    fn params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn classify(&self, response: &UdpResponse) -> Outcome<()> {
        match response.code {
            codes::LOGGED_OUT | codes::NOT_LOGGED_IN => Outcome::Success(()),
            code => Outcome::Fatal(format!("Unexpected LOGOUT response {code} {}", response.text)),
        }
    }
}

/// PING request; answers with the client's public port
#[derive(Debug, Clone, Copy, Default)]
pub struct PingRequest;

impl UdpRequest for PingRequest {
    type Output = Option<u16>;

    fn command(&self) -> &'static str {
        "PING"
    }

    fn params(&self) -> Vec<(String, String)> {
        vec![("nat".to_string(), "1".to_string())]
    }

    fn classify(&self, response: &UdpResponse) -> Outcome<Option<u16>> {
        match response.code {
            codes::PONG => Outcome::Success(response.body.trim().parse().ok()),
            code => Outcome::Fatal(format!("Unexpected PING response {code} {}", response.text)),
        }
    }
}

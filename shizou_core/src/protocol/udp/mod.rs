//! AniDB UDP API
//!
//! - `codec`: datagram encoding and decoding
//! - `transport`: datagram I/O
//! - `session`: the envelope shared by every UDP request
//! - `auth`, `file`, `mylist`: request kinds

pub mod auth;
pub mod codec;
pub mod file;
pub mod mylist;
pub mod session;
pub mod transport;

pub use auth::{AuthRequest, AuthResult, LogoutRequest, PingRequest};
pub use file::{AMask, AnimeField, FMask, FileField, FileRequest, FileResult};
pub use mylist::{MyListAddRequest, MyListAddResult, MyListEntry, MyListState, MyListTarget};
pub use session::{UdpRequest, UdpResponse, UdpSession};
pub use transport::{DatagramTransport, UdpSocketTransport};

use std::time::Duration;

use crate::error::ValidationError;

/// AniDB UDP client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    pub host: String,
    pub port: u16,
    /// Local port; AniDB answers to the port a request came from
    pub local_port: u16,
    pub username: String,
    pub password: String,
    pub client_name: String,
    pub client_version: String,
    pub receive_timeout: Duration,
    /// Log out after this long without a request
    pub idle_logout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            host: crate::protocol::DEFAULT_SERVER.to_string(),
            port: crate::protocol::DEFAULT_UDP_PORT,
            local_port: 4556,
            username: String::new(),
            password: String::new(),
            client_name: "shizouudp".to_string(),
            client_version: "1".to_string(),
            receive_timeout: Duration::from_secs(10),
            idle_logout: Duration::from_secs(10 * 60),
        }
    }
}

impl UdpConfig {
    /// Reject settings that cannot produce a login
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::missing_field("anidb.username"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::missing_field("anidb.password"));
        }
        if self.client_name.is_empty() {
            return Err(ValidationError::missing_field("anidb.client_name"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UdpConfig::default();
        assert_eq!(config.host, "api.anidb.net");
        assert_eq!(config.port, 9000);
        assert_eq!(config.receive_timeout, Duration::from_secs(10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_password() {
        let config = UdpConfig {
            username: "user".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("anidb.password"));
    }
}

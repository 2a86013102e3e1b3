//! AniDB protocol clients
//!
//! - `udp`: the UDP API (session, codec, transport, request kinds)
//! - `http`: the HTTP XML API
//! - `image`: poster downloads from the image CDN
//! - `outcome`: classification shared by every remote call
//! - `ban`: per-transport ban deadlines

pub mod ban;
pub mod codes;
pub mod http;
pub mod image;
pub mod outcome;
pub mod udp;

pub use ban::{BanGate, BanInfo, DEFAULT_BAN_PERIOD, MAX_BAN_PERIOD};
pub use outcome::Outcome;

/// UDP protocol version supported by this implementation
pub const PROTOCOL_VERSION: &str = "3";

/// Maximum UDP packet size (considering PPPoE)
pub const MAX_PACKET_SIZE: usize = 1400;

/// Default AniDB server address
pub const DEFAULT_SERVER: &str = "api.anidb.net";

/// Default AniDB UDP port
pub const DEFAULT_UDP_PORT: u16 = 9000;

/// Default AniDB HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 9001;

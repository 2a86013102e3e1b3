//! Fixtures shared by the integration tests

use shizou_core::protocol::udp::UdpConfig;
use shizou_core::{Database, RateLimitConfig, RateLimiter};
use std::time::Duration;
use tempfile::TempDir;

/// Fresh database in a temporary directory
///
/// Keep the directory alive for as long as the database is used.
pub async fn temp_database() -> (TempDir, Database) {
    let dir = TempDir::new().expect("create temp dir");
    let db = Database::new(&dir.path().join("shizou.db"))
        .await
        .expect("open test database");
    (dir, db)
}

/// UDP settings with credentials and a short receive timeout
pub fn test_udp_config() -> UdpConfig {
    UdpConfig {
        host: "127.0.0.1".to_string(),
        username: "tester".to_string(),
        password: "secret".to_string(),
        receive_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

/// Limiter that never delays
pub fn instant_limiter(name: &str) -> RateLimiter {
    RateLimiter::new(name, RateLimitConfig::flat(Duration::ZERO))
}

/// `220 FILE` body for the default masks
///
/// Values are laid out in mask order: the file id, 24 file fields, then 9
/// anime fields. Unset values stay empty.
#[derive(Debug, Clone)]
pub struct FileBody {
    fid: u64,
    anime_id: Option<u64>,
    episode_id: Option<u64>,
    mylist_id: Option<u64>,
    size: Option<u64>,
    ed2k: Option<String>,
}

const FILE_FIELDS: usize = 24;
const ANIME_FIELDS: usize = 9;

impl FileBody {
    pub fn new(fid: u64) -> Self {
        Self {
            fid,
            anime_id: None,
            episode_id: None,
            mylist_id: None,
            size: None,
            ed2k: None,
        }
    }

    pub fn anime(mut self, aid: u64) -> Self {
        self.anime_id = Some(aid);
        self
    }

    pub fn episode(mut self, eid: u64) -> Self {
        self.episode_id = Some(eid);
        self
    }

    pub fn mylist(mut self, lid: u64) -> Self {
        self.mylist_id = Some(lid);
        self
    }

    pub fn hash(mut self, size: u64, ed2k: &str) -> Self {
        self.size = Some(size);
        self.ed2k = Some(ed2k.to_string());
        self
    }

    pub fn build(&self) -> String {
        let mut values = vec![String::new(); 1 + FILE_FIELDS + ANIME_FIELDS];
        values[0] = self.fid.to_string();
        let text = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();
        // anime id, episode id, group id, mylist id, ..., size, ed2k
        values[1] = text(self.anime_id);
        values[2] = text(self.episode_id);
        values[4] = text(self.mylist_id);
        values[8] = text(self.size);
        values[9] = self.ed2k.clone().unwrap_or_default();
        values.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shizou_core::protocol::udp::{AMask, FMask, FileResult};

    #[test]
    fn test_file_body_matches_default_masks() {
        let body = FileBody::new(312498)
            .anime(22)
            .episode(4567)
            .mylist(99)
            .hash(1024, "0123456789abcdef0123456789abcdef")
            .build();
        let result = FileResult::parse(&body, FMask::default(), AMask::default()).unwrap();
        assert_eq!(result.fid, 312498);
        assert_eq!(result.anime_id, Some(22));
        assert_eq!(result.episode_id, Some(4567));
        assert_eq!(result.mylist_id, Some(99));
        assert_eq!(result.size, Some(1024));
        assert_eq!(
            result.ed2k.as_deref(),
            Some("0123456789abcdef0123456789abcdef")
        );
    }
}

//! The closed set of queued command kinds
//!
//! `CommandArgs` is what the store holds (as JSON); `CommandContext` owns the
//! clients a command needs and maps each kind to its handler.

mod anime;
mod hash;
mod image;
mod mylist;
mod process;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::Result;
use crate::database::{NewCommandRequest, Priority, QueueType};
use crate::hashing::{Ed2kHashService, HashService};
use crate::protocol::Outcome;
use crate::protocol::http::HttpSession;
use crate::protocol::image::ImageClient;
use crate::protocol::udp::{MyListState, UdpSession};
use crate::service::CommandService;

/// How a FILE lookup identifies the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTarget {
    Fid(u64),
    Hash { size: u64, ed2k: String },
}

/// Arguments of every command kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandArgs {
    /// Does nothing; exercises the queue
    Noop { id: u64 },
    /// Look a file up and record the result
    Process { target: FileTarget },
    /// Fetch and cache the anime document
    Anime { aid: u64 },
    /// Add a file to mylist
    AddMyList {
        fid: u64,
        watched: Option<bool>,
        state: Option<MyListState>,
    },
    /// Edit a mylist entry
    UpdateMyList {
        lid: u64,
        watched: Option<bool>,
        watched_date: Option<DateTime<Utc>>,
        state: Option<MyListState>,
        /// Distinguishes concurrent edits of one entry
        nonce: u32,
    },
    /// Download an image
    GetImage { url: String, save_path: PathBuf },
    /// Hash a local file and look it up
    Hash { path: PathBuf },
}

impl CommandArgs {
    pub fn process_fid(fid: u64) -> Self {
        Self::Process {
            target: FileTarget::Fid(fid),
        }
    }

    pub fn process_hash(size: u64, ed2k: &str) -> Self {
        Self::Process {
            target: FileTarget::Hash {
                size,
                ed2k: ed2k.to_ascii_lowercase(),
            },
        }
    }

    /// Mylist edit with a fresh nonce
    pub fn update_mylist(
        lid: u64,
        watched: Option<bool>,
        watched_date: Option<DateTime<Utc>>,
        state: Option<MyListState>,
    ) -> Self {
        Self::UpdateMyList {
            lid,
            watched,
            watched_date,
            state,
            nonce: rand::random(),
        }
    }

    /// Dedupe key
    pub fn command_id(&self) -> String {
        match self {
            Self::Noop { id } => format!("NoopCommand_{id}"),
            Self::Process {
                target: FileTarget::Fid(fid),
            } => format!("ProcessCommand_fid={fid}"),
            Self::Process {
                target: FileTarget::Hash { size, ed2k },
            } => format!("ProcessCommand_size={size}_ed2k={ed2k}"),
            Self::Anime { aid } => format!("AnimeCommand_{aid}"),
            Self::AddMyList { fid, .. } => format!("AddMyListCommand_fid={fid}"),
            Self::UpdateMyList { lid, nonce, .. } => {
                format!("UpdateMyListCommand_{lid}_{nonce:08x}")
            }
            Self::GetImage { url, save_path } => {
                format!("GetImageCommand_url={url}_savePath={}", save_path.display())
            }
            Self::Hash { path } => format!("HashCommand_{}", path.display()),
        }
    }

    pub fn queue_type(&self) -> QueueType {
        match self {
            Self::Noop { .. } => QueueType::General,
            Self::Process { .. } | Self::AddMyList { .. } | Self::UpdateMyList { .. } => {
                QueueType::AniDbUdp
            }
            Self::Anime { .. } => QueueType::AniDbHttp,
            Self::GetImage { .. } => QueueType::Image,
            Self::Hash { .. } => QueueType::Hash,
        }
    }

    pub fn priority(&self) -> Priority {
        Priority::Normal
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Noop { .. } => "noop",
            Self::Process { .. } => "process",
            Self::Anime { .. } => "anime",
            Self::AddMyList { .. } => "add_my_list",
            Self::UpdateMyList { .. } => "update_my_list",
            Self::GetImage { .. } => "get_image",
            Self::Hash { .. } => "hash",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Queue row for these arguments
    pub fn to_request(&self, priority: Priority) -> Result<NewCommandRequest> {
        Ok(NewCommandRequest {
            command_id: self.command_id(),
            priority,
            queue_type: self.queue_type(),
            args: self.to_json()?,
        })
    }
}

/// Runs commands for the processors
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute one command
    ///
    /// `Err` is an unexpected fault; the processor logs it and moves on.
    async fn execute(&self, args: &CommandArgs) -> Result<Outcome<()>>;

    /// Called when a processor found nothing to do
    async fn on_idle(&self, _queue: QueueType) -> Result<()> {
        Ok(())
    }

    /// Called when a processor stops
    async fn on_shutdown(&self, _queue: QueueType) -> Result<()> {
        Ok(())
    }
}

/// Behavior switches for command handlers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSettings {
    /// Anime documents and images are written below this directory
    pub cache_dir: PathBuf,
    /// Add processed files that are not yet in mylist
    pub add_to_mylist: bool,
    /// State for files added to mylist
    pub mylist_state: MyListState,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            add_to_mylist: false,
            mylist_state: MyListState::Internal,
        }
    }
}

/// Clients and settings shared by every command handler
pub struct CommandContext {
    service: CommandService,
    settings: CommandSettings,
    udp: Option<Arc<UdpSession>>,
    http: Option<Arc<HttpSession>>,
    image: Option<Arc<ImageClient>>,
    hasher: Arc<dyn HashService>,
}

impl CommandContext {
    pub fn new(service: CommandService, settings: CommandSettings) -> Self {
        Self {
            service,
            settings,
            udp: None,
            http: None,
            image: None,
            hasher: Arc::new(Ed2kHashService),
        }
    }

    pub fn with_udp(mut self, udp: Arc<UdpSession>) -> Self {
        self.udp = Some(udp);
        self
    }

    pub fn with_http(mut self, http: Arc<HttpSession>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_image(mut self, image: Arc<ImageClient>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn HashService>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn settings(&self) -> &CommandSettings {
        &self.settings
    }

    pub fn service(&self) -> &CommandService {
        &self.service
    }

    fn udp(&self) -> std::result::Result<&UdpSession, Outcome<()>> {
        self.udp
            .as_deref()
            .ok_or_else(|| Outcome::Fatal("AniDB UDP client is not configured".to_string()))
    }

    fn http(&self) -> std::result::Result<&HttpSession, Outcome<()>> {
        self.http
            .as_deref()
            .ok_or_else(|| Outcome::Fatal("AniDB HTTP client is not configured".to_string()))
    }

    fn image(&self) -> std::result::Result<&ImageClient, Outcome<()>> {
        self.image
            .as_deref()
            .ok_or_else(|| Outcome::Fatal("Image client is not configured".to_string()))
    }
}

#[async_trait]
impl CommandExecutor for CommandContext {
    async fn execute(&self, args: &CommandArgs) -> Result<Outcome<()>> {
        match args {
            CommandArgs::Noop { id } => {
                info!("Noop command {id} executed");
                Ok(Outcome::Success(()))
            }
            CommandArgs::Process { target } => process::run(self, target).await,
            CommandArgs::Anime { aid } => anime::run(self, *aid).await,
            CommandArgs::AddMyList {
                fid,
                watched,
                state,
            } => mylist::add(self, *fid, *watched, *state).await,
            CommandArgs::UpdateMyList {
                lid,
                watched,
                watched_date,
                state,
                ..
            } => mylist::update(self, *lid, *watched, *watched_date, *state).await,
            CommandArgs::GetImage { url, save_path } => image::run(self, url, save_path).await,
            CommandArgs::Hash { path } => hash::run(self, path).await,
        }
    }

    async fn on_idle(&self, queue: QueueType) -> Result<()> {
        if queue == QueueType::AniDbUdp
            && let Some(udp) = &self.udp
        {
            udp.logout_if_idle().await?;
        }
        Ok(())
    }

    async fn on_shutdown(&self, queue: QueueType) -> Result<()> {
        if queue == QueueType::AniDbUdp
            && let Some(udp) = &self.udp
        {
            udp.logout().await?;
        }
        Ok(())
    }
}

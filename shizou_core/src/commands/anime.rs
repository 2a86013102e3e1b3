//! Anime: HTTP anime document, cached on disk

use log::{debug, info};

use super::{CommandArgs, CommandContext};
use crate::Result;
use crate::error::IoError;
use crate::protocol::Outcome;
use crate::protocol::http::AnimeRequest;
use crate::protocol::image::ImageConfig;

pub(super) async fn run(ctx: &CommandContext, aid: u64) -> Result<Outcome<()>> {
    let http = match ctx.http() {
        Ok(http) => http,
        Err(outcome) => return Ok(outcome),
    };

    let request = AnimeRequest::new(aid)?;
    let anime = match http.execute(&request).await? {
        Outcome::Success(anime) => anime,
        other => return Ok(other.discard()),
    };

    let dir = ctx.settings.cache_dir.join("anime");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| IoError::from_std(e).with_path(&dir))?;
    let path = dir.join(format!("{aid}.xml"));
    tokio::fs::write(&path, anime.xml.as_bytes())
        .await
        .map_err(|e| IoError::from_std(e).with_path(&path))?;
    info!(
        "Cached anime {aid} ({})",
        anime.title.as_deref().unwrap_or("untitled")
    );

    if let Some(picture) = anime.picture {
        let url = match ctx.image.as_deref() {
            Some(image) => image.config().picture_url(&picture),
            None => ImageConfig::default().picture_url(&picture),
        };
        let save_path = ctx.settings.cache_dir.join("images").join(&picture);
        debug!("Queueing poster {url}");
        ctx.service
            .dispatch(&CommandArgs::GetImage { url, save_path })
            .await?;
    }

    Ok(Outcome::Success(()))
}

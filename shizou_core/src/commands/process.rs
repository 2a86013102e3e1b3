//! Process: FILE lookup and its follow-up work

use chrono::Utc;
use log::{info, warn};

use super::{CommandArgs, CommandContext, FileTarget};
use crate::Result;
use crate::database::StoredFileResult;
use crate::protocol::Outcome;
use crate::protocol::udp::{FileRequest, FileResult};

pub(super) async fn run(ctx: &CommandContext, target: &FileTarget) -> Result<Outcome<()>> {
    let udp = match ctx.udp() {
        Ok(udp) => udp,
        Err(outcome) => return Ok(outcome),
    };

    let request = match target {
        FileTarget::Fid(fid) => FileRequest::by_id(*fid)?,
        FileTarget::Hash { size, ed2k } => FileRequest::by_hash(*size, ed2k)?,
    };

    let result = match udp.execute(&request).await? {
        Outcome::Success(result) => result,
        Outcome::Negative(reason) => {
            info!("FILE lookup for {target:?} found nothing: {reason}");
            return Ok(Outcome::Negative(reason));
        }
        other => return Ok(other.discard()),
    };

    store(ctx, &result).await?;
    info!(
        "Processed file {} (anime {:?}, mylist {:?})",
        result.fid, result.anime_id, result.mylist_id
    );

    let mut follow_ups = Vec::new();
    if let Some(aid) = result.anime_id {
        follow_ups.push(CommandArgs::Anime { aid });
    }
    if ctx.settings.add_to_mylist && result.mylist_id.is_none() {
        follow_ups.push(CommandArgs::AddMyList {
            fid: result.fid,
            watched: None,
            state: Some(ctx.settings.mylist_state),
        });
    }
    if !follow_ups.is_empty() {
        ctx.service.dispatch_range(&follow_ups).await?;
    }

    Ok(Outcome::Success(()))
}

async fn store(ctx: &CommandContext, result: &FileResult) -> Result<()> {
    let to_i64 = |value: u64| i64::try_from(value).ok();
    let Some(fid) = to_i64(result.fid) else {
        warn!("File id {} does not fit the cache", result.fid);
        return Ok(());
    };
    let stored = StoredFileResult {
        fid,
        anime_id: result.anime_id.and_then(to_i64),
        ed2k: result.ed2k.as_ref().map(|ed2k| ed2k.to_ascii_lowercase()),
        size: result.size.and_then(to_i64),
        mylist_id: result.mylist_id.and_then(to_i64),
        data: serde_json::to_string(result)?,
        fetched_at: Utc::now(),
    };
    ctx.service.database().file_results().upsert(&stored).await
}

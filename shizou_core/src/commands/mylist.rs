//! AddMyList and UpdateMyList

use chrono::{DateTime, Utc};
use log::info;

use super::CommandContext;
use crate::Result;
use crate::protocol::Outcome;
use crate::protocol::udp::{MyListAddRequest, MyListAddResult, MyListState, MyListTarget};

pub(super) async fn add(
    ctx: &CommandContext,
    fid: u64,
    watched: Option<bool>,
    state: Option<MyListState>,
) -> Result<Outcome<()>> {
    let udp = match ctx.udp() {
        Ok(udp) => udp,
        Err(outcome) => return Ok(outcome),
    };

    let mut request = MyListAddRequest::new(MyListTarget::File { fid, edit: false })?;
    if let Some(watched) = watched {
        request = request.viewed(watched);
    }
    if let Some(state) = state {
        request = request.state(state);
    }

    let lid = match udp.execute(&request).await? {
        Outcome::Success(MyListAddResult::Added { lid }) => {
            info!("Added file {fid} to mylist as {lid}");
            lid
        }
        Outcome::Success(MyListAddResult::AlreadyInList(entry)) => {
            info!("File {fid} already in mylist as {}", entry.lid);
            entry.lid
        }
        Outcome::Success(other) => {
            info!("MYLISTADD for file {fid}: {other:?}");
            return Ok(Outcome::Success(()));
        }
        other => return Ok(other.discard()),
    };

    if let (Ok(fid), Ok(lid)) = (i64::try_from(fid), i64::try_from(lid)) {
        ctx.service
            .database()
            .file_results()
            .set_mylist_id(fid, lid)
            .await?;
    }
    Ok(Outcome::Success(()))
}

pub(super) async fn update(
    ctx: &CommandContext,
    lid: u64,
    watched: Option<bool>,
    watched_date: Option<DateTime<Utc>>,
    state: Option<MyListState>,
) -> Result<Outcome<()>> {
    let udp = match ctx.udp() {
        Ok(udp) => udp,
        Err(outcome) => return Ok(outcome),
    };

    let mut request = MyListAddRequest::new(MyListTarget::Entry { lid })?;
    if let Some(watched) = watched {
        request = request.viewed(watched);
    }
    if let Some(date) = watched_date {
        request = request.view_date(date);
    }
    if let Some(state) = state {
        request = request.state(state);
    }

    let outcome = udp.execute(&request).await?;
    if let Outcome::Success(result) = &outcome {
        info!("Updated mylist entry {lid}: {result:?}");
    }
    Ok(outcome.discard())
}

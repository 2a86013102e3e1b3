//! Hash: digest a local file, then look it up by hash

use log::info;
use std::path::Path;

use super::{CommandArgs, CommandContext};
use crate::Result;
use crate::protocol::Outcome;

pub(super) async fn run(ctx: &CommandContext, path: &Path) -> Result<Outcome<()>> {
    let digest = ctx.hasher.digest(path).await?;
    info!(
        "Hashed {}: size {} ed2k {}",
        path.display(),
        digest.size,
        digest.ed2k
    );

    ctx.service
        .dispatch(&CommandArgs::process_hash(digest.size, &digest.ed2k))
        .await?;
    Ok(Outcome::Success(()))
}

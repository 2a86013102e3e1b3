//! GetImage

use log::info;
use std::path::Path;

use super::CommandContext;
use crate::Result;
use crate::protocol::Outcome;

pub(super) async fn run(ctx: &CommandContext, url: &str, save_path: &Path) -> Result<Outcome<()>> {
    let image = match ctx.image() {
        Ok(image) => image,
        Err(outcome) => return Ok(outcome),
    };

    let outcome = image.fetch(url, save_path).await?;
    if let Outcome::Success(bytes) = &outcome {
        info!("Saved image {url} ({bytes} bytes)");
    }
    Ok(outcome.discard())
}

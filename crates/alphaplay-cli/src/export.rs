//! Headless still-frame export through the software backend.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use alphaplay::{
    FrameSequence, ManualClock, ManualRefresh, Player, PlayerConfig, PlayerEvent, SoftwareBackend,
};

pub fn export_frame(mut config: PlayerConfig, output: &Path, at: f64) -> Result<()> {
    let src = config
        .src
        .clone()
        .ok_or_else(|| anyhow!("--export-frame needs a media source"))?;
    if !at.is_finite() || at < 0.0 {
        bail!("--at must be a non-negative number of seconds, got {at}");
    }
    // The exported frame is chosen by `at`, not by wall-clock playback.
    config.autoplay = false;

    let backend = SoftwareBackend::new();
    let surface = backend.surface();
    let stats = backend.stats();
    let element = FrameSequence::new(config.sequence_fps);
    let mut player = Player::with_media(
        config,
        backend,
        ManualRefresh::new(),
        Box::new(element),
        Arc::new(ManualClock::new()),
    );
    let events = player.events();

    player.seek(at);
    player.on_refresh();

    let mut seeked_to = None;
    for event in events.try_iter() {
        match event {
            PlayerEvent::Error { kind, message } => {
                bail!("failed to composite {src}: {message} ({kind})");
            }
            PlayerEvent::Seeked { current_time } => seeked_to = Some(current_time),
            _ => {}
        }
    }
    if stats.draws() == 0 {
        bail!("no frame was composited for {src}");
    }
    let current_time = seeked_to.unwrap_or(at);

    let image = surface.snapshot();
    player.destroy();
    image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    tracing::info!(
        output = %output.display(),
        time = current_time,
        width = image.width(),
        height = image.height(),
        "exported still frame"
    );
    Ok(())
}

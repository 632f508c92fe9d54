//! Transparent preview window driven by `winit`.
//!
//! The player asks for refreshes through [`WindowRefresh`], which maps onto
//! `Window::request_redraw`; every `RedrawRequested` becomes one
//! `Player::on_refresh`. The event loop itself only waits.

use std::sync::Arc;

use alphaplay::{PlaybackState, Player, PlayerConfig, PlayerEvent, RefreshSource, WgpuBackend};
use anyhow::{anyhow, Context, Result};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

const SEEK_STEP_SECONDS: f64 = 5.0;

/// Refresh requests land on the window's redraw queue.
struct WindowRefresh {
    window: Arc<Window>,
}

impl RefreshSource for WindowRefresh {
    fn request_refresh(&mut self) {
        self.window.request_redraw();
    }

    // winit coalesces redraws and has no way to withdraw one; the player
    // ignores the extra callback.
    fn cancel_refresh(&mut self) {}
}

type WindowPlayer = Player<WgpuBackend<Window>, WindowRefresh>;

pub fn run_window(config: PlayerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let title = match config.src.as_deref() {
        Some(src) => format!("alphaplay - {src}"),
        None => "alphaplay".to_string(),
    };
    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(LogicalSize::new(config.width, config.height))
        .with_transparent(true)
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let mut config = config;
    config.scale_factor = window.scale_factor();
    let backend = WgpuBackend::new(Arc::clone(&window), config.gpu_power);
    let refresh = WindowRefresh {
        window: Arc::clone(&window),
    };
    let mut player = Player::new(config, backend, refresh);
    let events = player.events();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        player.destroy();
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if handle_key(&mut player, &event) == KeyAction::Quit {
                            player.destroy();
                            elwt.exit();
                        }
                    }
                    WindowEvent::Resized(new_size) => {
                        let logical = new_size.to_logical::<f64>(window.scale_factor());
                        player.resize(
                            logical.width.round() as u32,
                            logical.height.round() as u32,
                        );
                    }
                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        player.set_scale_factor(scale_factor);
                    }
                    WindowEvent::RedrawRequested => {
                        player.on_refresh();
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    for event in events.try_iter() {
                        log_event(&event);
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
}

fn handle_key(player: &mut WindowPlayer, event: &KeyEvent) -> KeyAction {
    if event.state != ElementState::Pressed {
        return KeyAction::None;
    }
    match &event.logical_key {
        Key::Named(NamedKey::Escape) => return KeyAction::Quit,
        Key::Named(NamedKey::Space) if !event.repeat => toggle_playback(player),
        Key::Character(value) if value.as_str() == " " && !event.repeat => {
            toggle_playback(player)
        }
        Key::Named(NamedKey::ArrowLeft) => {
            player.seek((player.current_time() - SEEK_STEP_SECONDS).max(0.0));
        }
        Key::Named(NamedKey::ArrowRight) => {
            player.seek(player.current_time() + SEEK_STEP_SECONDS);
        }
        _ => {}
    }
    KeyAction::None
}

fn toggle_playback(player: &mut WindowPlayer) {
    if player.state() == PlaybackState::Playing {
        player.pause();
    } else {
        player.play();
    }
}

fn log_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::Loaded {
            duration,
            width,
            height,
        } => tracing::info!(duration, width, height, "media loaded"),
        PlayerEvent::Error { kind, message } if kind.is_fatal() => {
            tracing::error!(%kind, %message, "playback halted");
        }
        PlayerEvent::Error { kind, message } => tracing::warn!(%kind, %message, "player error"),
        PlayerEvent::Ended => tracing::info!("playback ended"),
        PlayerEvent::ContextRestored => tracing::info!("graphics context restored"),
        other => tracing::debug!(event = ?other, "player event"),
    }
}

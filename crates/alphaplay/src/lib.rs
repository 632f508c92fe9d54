//! Transparent video playback from dual-region frames.
//!
//! Each source frame carries color in one region and a grayscale mask in the
//! other. The player recombines them every display refresh:
//!
//! ```text
//!   MediaSource ──frame──▶ ShaderPipeline::upload ──▶ draw(CompositeUniforms)
//!        ▲                          ▲                          │
//!        │ play/pause/seek          │ FrameTick                ▼
//!   Player (commands) ──────▶ RenderLoop ◀── on_refresh ── host surface
//! ```
//!
//! `Player` owns every component and is driven from a single thread: commands
//! only touch playback state, and GPU work happens inside
//! [`Player::on_refresh`]. Rendering goes through the [`GraphicsBackend`]
//! seam: [`WgpuBackend`] draws into a window, [`SoftwareBackend`] evaluates
//! the same program on the CPU for headless export and tests.

pub mod backend;
pub mod clock;
pub mod compositor;
pub mod context;
pub mod error;
pub mod events;
pub mod gpu;
pub mod media;
pub mod pipeline;
pub mod player;
pub mod render_loop;
pub mod shader;
pub mod software;
pub mod state;
pub mod types;
pub mod uniforms;

pub use backend::{ContextStatus, GraphicsBackend};
pub use clock::{ManualClock, PlaybackClock, SharedClock, SystemClock};
pub use compositor::{CompositeOutcome, FrameCompositor, FrameTick};
pub use context::{ContextManager, ContextState};
pub use error::{ErrorKind, MediaError, PlayerError, PlayerResult};
pub use events::PlayerEvent;
pub use gpu::WgpuBackend;
pub use media::{Clip, ClipLibrary, FrameSequence, MediaElement, MediaInfo, MediaSource, VideoFrame};
pub use pipeline::ShaderPipeline;
pub use player::Player;
pub use render_loop::{LoopState, ManualRefresh, RefreshSource, RenderLoop};
pub use shader::ShaderProgram;
pub use software::{BackendStats, SoftwareBackend, SoftwareController, SoftwareSurface};
pub use state::PlaybackState;
pub use types::{
    AlphaChannel, AutoplayPolicy, FillMode, GpuPowerPreference, LayoutSpec, PlayerConfig,
    RegionOrder, RenderSurface, VideoLayout, MAX_SPLIT, MIN_SPLIT,
};
pub use uniforms::CompositeUniforms;

use crate::backend::{ContextStatus, GraphicsBackend};
use crate::error::{PlayerError, PlayerResult};
use crate::types::{FillMode, RenderSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No acquisition attempted yet.
    Unacquired,
    Active,
    /// Lost and waiting for a successful re-acquire.
    Lost,
    /// Acquisition failed fatally; never retried.
    Failed,
    Released,
}

/// Owns the backend's context and the [`RenderSurface`] it renders into.
///
/// Size changes are staged: [`resize`](Self::resize) only records the new
/// logical size, and [`apply_resize`](Self::apply_resize) pushes it to the
/// backend right before a draw, so a resize that lands mid-tick is never seen
/// half-applied.
pub struct ContextManager<B: GraphicsBackend> {
    backend: B,
    surface: RenderSurface,
    /// Physical size the backend was last configured with.
    configured: Option<(u32, u32)>,
    state: ContextState,
}

impl<B: GraphicsBackend> ContextManager<B> {
    pub fn new(backend: B, surface: RenderSurface) -> Self {
        Self {
            backend,
            surface,
            configured: None,
            state: ContextState::Unacquired,
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ContextState::Active
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Acquires (or re-acquires after loss) the context.
    pub fn acquire(&mut self) -> PlayerResult<()> {
        match self.state {
            ContextState::Active => return Ok(()),
            ContextState::Failed | ContextState::Released => {
                return Err(PlayerError::context_unavailable(
                    "context manager is no longer usable",
                ))
            }
            ContextState::Unacquired | ContextState::Lost => {}
        }
        match self.backend.acquire(&self.surface) {
            Ok(()) => {
                self.state = ContextState::Active;
                self.configured = Some(self.surface.physical_size());
                let (width, height) = self.surface.physical_size();
                tracing::debug!(width, height, "graphics context acquired");
                Ok(())
            }
            Err(PlayerError::ContextLost) => {
                self.state = ContextState::Lost;
                Err(PlayerError::ContextLost)
            }
            Err(err) => {
                tracing::error!(error = %err, "graphics context unavailable");
                self.state = ContextState::Failed;
                Err(err)
            }
        }
    }

    /// Checks for asynchronous loss. Returns `true` on the tick it happened.
    pub fn poll_lost(&mut self) -> bool {
        if self.state != ContextState::Active {
            return false;
        }
        match self.backend.poll_context() {
            ContextStatus::Unchanged => false,
            ContextStatus::Lost => {
                self.mark_lost();
                true
            }
        }
    }

    /// Records a loss detected while drawing.
    pub fn mark_lost(&mut self) {
        if self.state == ContextState::Active {
            tracing::warn!("graphics context lost; waiting for restore");
            self.state = ContextState::Lost;
            self.configured = None;
        }
    }

    /// Stages a new logical size. Unchanged sizes are ignored.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.surface.width == width && self.surface.height == height {
            return false;
        }
        self.surface.width = width;
        self.surface.height = height;
        true
    }

    pub fn set_scale_factor(&mut self, scale_factor: f64) -> bool {
        if self.surface.scale_factor == scale_factor {
            return false;
        }
        self.surface.scale_factor = scale_factor;
        true
    }

    pub fn set_fill_mode(&mut self, fill_mode: FillMode) -> bool {
        if self.surface.fill_mode == fill_mode {
            return false;
        }
        self.surface.fill_mode = fill_mode;
        true
    }

    /// Pushes a staged size to the backend. Returns the physical size.
    pub fn apply_resize(&mut self) -> (u32, u32) {
        let size = self.surface.physical_size();
        if self.is_active() && self.configured != Some(size) {
            tracing::debug!(width = size.0, height = size.1, "resizing drawing buffer");
            self.backend.resize(size.0, size.1);
            self.configured = Some(size);
        }
        size
    }

    /// Drops the context for good.
    pub fn release(&mut self) {
        if matches!(self.state, ContextState::Released) {
            return;
        }
        self.backend.release();
        self.configured = None;
        self.state = ContextState::Released;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareBackend;

    #[test]
    fn resize_is_idempotent_and_staged() {
        let backend = SoftwareBackend::new();
        let stats = backend.stats();
        let mut manager = ContextManager::new(backend, RenderSurface::new(8, 8));
        manager.acquire().unwrap();
        assert!(!manager.resize(8, 8));
        assert!(manager.resize(16, 4));
        assert_eq!(stats.resizes(), 0);
        assert_eq!(manager.apply_resize(), (16, 4));
        assert_eq!(manager.apply_resize(), (16, 4));
        assert_eq!(stats.resizes(), 1);
    }

    #[test]
    fn unavailable_context_is_not_retried() {
        let backend = SoftwareBackend::new();
        backend.controller().set_available(false);
        let mut manager = ContextManager::new(backend, RenderSurface::new(4, 4));
        let err = manager.acquire().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ContextUnavailable);
        assert_eq!(manager.state(), ContextState::Failed);
        manager.backend().controller().set_available(true);
        assert!(manager.acquire().is_err());
    }

    #[test]
    fn loss_is_reported_once_and_restore_reacquires() {
        let backend = SoftwareBackend::new();
        let controller = backend.controller();
        let mut manager = ContextManager::new(backend, RenderSurface::new(4, 4));
        manager.acquire().unwrap();
        controller.lose_context();
        assert!(manager.poll_lost());
        assert!(!manager.poll_lost());
        assert!(matches!(manager.acquire(), Err(PlayerError::ContextLost)));
        controller.restore_context();
        manager.acquire().unwrap();
        assert!(manager.is_active());
    }
}

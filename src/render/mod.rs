//! Image-graph renderer
//!
//! - Immutable crop/translate graph over a source buffer
//! - Render context bound to a compute device
//! - Process-wide shared context, created on first use

mod context;
mod graph;

pub use context::{ComputeDevice, RenderContext, RenderStatus};
pub use graph::ImageNode;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Lazily created render context that is rebuilt when its device is lost
pub struct SharedContext {
    slot: RwLock<Option<Arc<RenderContext>>>,
    generation: AtomicU64,
}

impl SharedContext {
    pub const fn new() -> Self {
        Self {
            slot: parking_lot::const_rwlock(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Current context, creating it if there is none or its device was lost.
    /// Concurrent callers racing on first use get the same context.
    pub fn get(&self) -> Arc<RenderContext> {
        if let Some(ctx) = self.slot.read().as_ref() {
            if !ctx.device().is_lost() {
                return ctx.clone();
            }
        }

        let mut slot = self.slot.write();
        if let Some(ctx) = slot.as_ref() {
            if !ctx.device().is_lost() {
                return ctx.clone();
            }
            tracing::warn!(
                "Compute device {} lost, rebuilding render context",
                ctx.device().name()
            );
        }

        let ctx = Arc::new(RenderContext::new());
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::info!(
            "Render context #{} created on {}",
            generation,
            ctx.device().name()
        );
        *slot = Some(ctx.clone());
        ctx
    }

    /// Drop the current context. The next [`get`](Self::get) builds a new one.
    pub fn reset(&self) {
        if self.slot.write().take().is_some() {
            tracing::debug!("Render context torn down");
        }
    }

    /// How many contexts have been created so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for SharedContext {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED: SharedContext = SharedContext::new();

/// The process-wide render context
pub fn shared_context() -> Arc<RenderContext> {
    SHARED.get()
}

/// Tear down the process-wide render context
pub fn reset_shared_context() {
    SHARED.reset();
}

/// Number of process-wide render contexts created so far
pub fn context_generation() -> u64 {
    SHARED.generation()
}

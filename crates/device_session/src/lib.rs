//! Session management for the companion device: a persistent WebSocket
//! connection that mirrors the active task on the device display and turns
//! device gestures back into application actions.

use async_trait::async_trait;

use shared::domain::Task;

pub mod codec;
pub mod dispatcher;
pub mod gesture;
pub mod supervisor;
pub mod transport;

pub use dispatcher::CommandDispatcher;
pub use gesture::GestureRouter;
pub use supervisor::{DeviceSession, RetryPolicy, SessionEvent, SessionStatus};
pub use transport::{resolve_endpoint, DeviceLink, DeviceTransport, WebSocketTransport};

/// Read-only view of the application's current task selection, taken at
/// call time. The session never caches one across calls.
#[derive(Debug, Clone, Default)]
pub struct SelectionSnapshot {
    pub tasks: Vec<Task>,
    pub index: usize,
    pub detail_open: bool,
}

impl SelectionSnapshot {
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.index)
    }
}

/// Application-side selection callbacks invoked by the gesture router.
/// Implementations own the selection state; `advance` wraps around the
/// task list and returns the newly active task.
#[async_trait]
pub trait SelectionHost: Send + Sync {
    fn snapshot(&self) -> SelectionSnapshot;
    async fn advance(&self, step: i64) -> Option<Task>;
    async fn open_detail(&self) -> Option<Task>;
    async fn complete(&self);
}

/// One-shot spoken-text facility. Fire and forget; failures stay inside
/// the implementation.
pub trait Announcer: Send + Sync {
    fn announce(&self, text: &str);
}

#[cfg(test)]
mod tests;

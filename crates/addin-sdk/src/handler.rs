//! Component notifications - error, event and status text
//!
//! A component raises three kinds of notifications while native code runs.
//! Each kind has its own subscriber list; raising a notification calls every
//! subscriber in subscription order, synchronously, on the raising thread.
//! Nothing is queued, coalesced or dropped.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::Severity;

// ============================================================================
// Payloads
// ============================================================================

/// Error reported by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    /// Normalized severity
    pub severity: Severity,
    /// Component-specific secondary code
    pub code: i32,
    /// Where the error came from
    pub source: String,
    /// Human-readable description
    pub description: String,
}

/// External event raised by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentEvent {
    /// Event source
    pub source: String,
    /// Event name
    pub message: String,
    /// Event payload
    pub data: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Subscriber for error notices
pub type ErrorHandler = Arc<dyn Fn(&ErrorNotice) + Send + Sync>;

/// Subscriber for component events
pub type EventHandler = Arc<dyn Fn(&ComponentEvent) + Send + Sync>;

/// Subscriber for status text
pub type StatusHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Subscriber registries for the three notification channels.
///
/// Subscribers are snapshotted before dispatch, so a subscriber may
/// subscribe further handlers (they see the next notification, not the
/// current one).
#[derive(Default)]
pub struct Notifications {
    error: RwLock<Vec<ErrorHandler>>,
    event: RwLock<Vec<EventHandler>>,
    status: RwLock<Vec<StatusHandler>>,
}

impl Notifications {
    /// Create empty registries
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to error notices
    pub fn subscribe_error(&self, handler: impl Fn(&ErrorNotice) + Send + Sync + 'static) {
        self.error.write().push(Arc::new(handler));
    }

    /// Subscribe to component events
    pub fn subscribe_event(&self, handler: impl Fn(&ComponentEvent) + Send + Sync + 'static) {
        self.event.write().push(Arc::new(handler));
    }

    /// Subscribe to status text
    pub fn subscribe_status(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.status.write().push(Arc::new(handler));
    }

    /// Deliver an error notice. Returns the number of subscribers reached.
    pub fn raise_error(&self, notice: &ErrorNotice) -> usize {
        let handlers = self.error.read().clone();
        for handler in &handlers {
            handler(notice);
        }
        handlers.len()
    }

    /// Deliver a component event. Returns the number of subscribers reached.
    pub fn raise_event(&self, event: &ComponentEvent) -> usize {
        let handlers = self.event.read().clone();
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Deliver status text. Returns the number of subscribers reached.
    pub fn raise_status(&self, status: &str) -> usize {
        let handlers = self.status.read().clone();
        for handler in &handlers {
            handler(status);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("error", &self.error.read().len())
            .field("event", &self.event.read().len())
            .field("status", &self.status.read().len())
            .finish()
    }
}

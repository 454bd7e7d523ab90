#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in kiln
//!
//! Library crates never print. Every stage of an install transaction
//! reports what it is doing through an [`AppEvent`] sent over an unbounded
//! channel; the CLI decides how to render and log each one.
//!
//! ## Architecture
//!
//! - **Domain events**: one enum per stage (recipe, resolver, fetch, build,
//!   install, verify, transaction) plus general and platform events
//! - **`EventEmitter` trait**: single API for emitting from anything that
//!   holds a sender
//! - **Tracing integration**: each event maps to a level and a log target

pub mod meta;
pub use meta::EventSource;

pub mod events;
pub use events::{
    AppEvent, BuildEvent, FailureContext, FetchEvent, GeneralEvent, InstallEvent, PlatformEvent,
    RecipeEvent, ResolverEvent, TransactionEvent, VerifyEvent,
};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for the event sender
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for the event receiver
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout kiln
///
/// Works the same whether you hold a raw `EventSender` or a struct that
/// contains an optional one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}

impl EventEmitter for Option<EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.as_ref()
    }
}

impl EventEmitter for Option<&EventSender> {
    fn event_sender(&self) -> Option<&EventSender> {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_errors::FetchError;

    #[tokio::test]
    async fn sender_emits_through_trait() {
        let (tx, mut rx) = channel();
        tx.emit_warning("disk almost full");
        drop(tx);

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            AppEvent::General(GeneralEvent::Warning { ref message, .. }) if message == "disk almost full"
        ));
        assert_eq!(event.log_level(), tracing::Level::WARN);
        assert_eq!(event.log_target(), "kiln::events::general");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn missing_sender_is_silent() {
        let none: Option<EventSender> = None;
        none.emit_debug("nobody listens");
    }

    #[test]
    fn failure_context_carries_error_taxonomy() {
        let err = FetchError::FetchUnavailable {
            uri: "https://example.invalid/src.tar.gz".into(),
            message: "connection refused".into(),
        };
        let failure = FailureContext::from_error(&err);
        assert_eq!(failure.code.as_deref(), Some("fetch.unavailable"));
        assert!(failure.retryable);
        assert!(failure.hint.is_some());
    }

    #[test]
    fn events_serialize_with_domain_tag() {
        let event = AppEvent::Verify(VerifyEvent::CheckPassed {
            recipe: "o2l".into(),
            check_index: 0,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "verify");
        assert_eq!(json["event"]["type"], "check_passed");
        assert_eq!(event.event_source(), EventSource::VERIFY);
    }
}

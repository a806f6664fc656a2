//! Request-scoped context
//!
//! Context carries the log fields identifying the RPC being served and a
//! cancellation signal shared by every clone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Context carries request-scoped values like cancellation signals and log fields
/// CRITICAL: Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    fields: LogFields,
    deadline: Option<Instant>,
    cancel: Arc<watch::Sender<bool>>,
}

/// Structured log fields attached to every tracing event of a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFields {
    pub rpc: Option<String>,
    pub resource_type: Option<String>,
    pub req_id: Option<u64>,
}

impl Context {
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            fields: LogFields::default(),
            deadline: None,
            cancel: Arc::new(cancel),
        }
    }

    /// Derive a context for one RPC; the request id is unique per process
    pub fn for_rpc(&self, rpc: &str) -> Self {
        let mut ctx = self.clone();
        ctx.fields.rpc = Some(rpc.to_string());
        ctx.fields.req_id = Some(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed));
        ctx.fields.resource_type = None;
        ctx
    }

    pub fn with_resource_type(mut self, type_name: &str) -> Self {
        self.fields.resource_type = Some(type_name.to_string());
        self
    }

    /// Cancel this context once the timeout elapses. Must be called within a
    /// tokio runtime
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(deadline);

        let cancel = Arc::clone(&self.cancel);
        tokio::spawn(async move {
            time::sleep_until(deadline.into()).await;
            cancel.send_replace(true);
        });

        self
    }

    pub fn fields(&self) -> &LogFields {
        &self.fields
    }

    pub fn rpc(&self) -> &str {
        self.fields.rpc.as_deref().unwrap_or("")
    }

    pub fn resource_type(&self) -> &str {
        self.fields.resource_type.as_deref().unwrap_or("")
    }

    pub fn req_id(&self) -> u64 {
        self.fields.req_id.unwrap_or(0)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Returns a receiver that flips to true when work done on behalf of this
    /// context should stop
    pub fn done(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("fields", &self.fields)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[test]
    fn rpc_contexts_carry_fields() {
        let root = Context::new();
        let first = root.for_rpc("PlanResourceChange").with_resource_type("corner_user");
        let second = root.for_rpc("ReadResource");

        assert_eq!(first.rpc(), "PlanResourceChange");
        assert_eq!(first.resource_type(), "corner_user");
        assert_eq!(second.resource_type(), "");
        assert_ne!(first.req_id(), second.req_id());
        assert_eq!(root.fields(), &LogFields::default());
    }

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50));
        assert!(!ctx.is_cancelled());
        assert!(ctx.deadline().is_some());

        sleep(Duration::from_millis(120)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_is_shared_between_clones() {
        let ctx = Context::new();
        let derived = ctx.for_rpc("StopProvider");
        let mut done = derived.done();

        ctx.cancel();

        assert!(derived.is_cancelled());
        done.changed().await.unwrap();
        assert!(*done.borrow());
    }
}

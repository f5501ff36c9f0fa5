//! What async dispatch does when its queue is full

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Policy for a full async queue
///
/// Error and Fatal events are never dropped: whatever the policy, they are
/// written synchronously on the calling thread once the queue is full.
///
/// # Example
///
/// ```
/// use recycling_logger::core::OverflowPolicy;
/// use std::time::Duration;
///
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::AlertAndDrop);
///
/// let patient = OverflowPolicy::BlockWithTimeout(Duration::from_millis(100));
/// assert_eq!(patient.to_string(), "BlockWithTimeout(100ms)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OverflowPolicy {
    /// Drop the new event, counting it in the metrics
    DropNewest,

    /// Wait for room in the queue
    ///
    /// Applies backpressure to every logging thread.
    Block,

    /// Wait up to the given time, then drop with an alert
    BlockWithTimeout(Duration),

    /// Drop the new event and alert on stderr and through the overflow callback
    #[default]
    AlertAndDrop,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::Block => write!(f, "Block"),
            OverflowPolicy::BlockWithTimeout(d) => write!(f, "BlockWithTimeout({:?})", d),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Called with the running total of dropped events
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;

/*!
 * Error taxonomy for device resolution and pairing
 */

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::bluetooth::BackendError;
use crate::device::Device;
use crate::picker::PickError;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// No matching device, or a picker was needed and none was usable.
    #[error("{}", not_found_message(.query))]
    NotFound { query: String },

    /// Several devices matched and nothing can disambiguate them.
    #[error("device selection is ambiguous: {query} ({count} matches)")]
    Ambiguous { query: String, count: usize },

    #[error("canceled")]
    Canceled,

    /// Backend failures pass through untouched, `DependencyMissing` included.
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{action} timed out after {}s", .after.as_secs())]
    TimedOut { action: &'static str, after: Duration },

    /// A local requirement of the operation was not met (TTY, picker, flags).
    #[error("{0}")]
    Precondition(String),

    #[error("device is not connected")]
    NotConnected,

    #[error("failed to connect")]
    ConnectFailed,

    #[error("selected device has empty address")]
    EmptyAddress,

    #[error("some {action}s failed: {}", join_failures(.failures))]
    Batch {
        action: &'static str,
        selected: Vec<Device>,
        failures: Vec<BatchFailure>,
    },

    /// Repair failed after a paired device had already been chosen.
    #[error("repair of {} ({}) failed: {source}", .from.name, .from.address)]
    Repair {
        from: Device,
        #[source]
        source: Box<CoreError>,
    },

    #[error("picker failed: {0}")]
    Picker(#[source] std::io::Error),
}

#[derive(Debug)]
pub struct BatchFailure {
    pub device: Device,
    pub error: CoreError,
}

impl CoreError {
    pub fn not_found(query: impl Into<String>) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// The underlying cause with any repair context peeled off.
    pub fn root(&self) -> &CoreError {
        match self {
            CoreError::Repair { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.root(), CoreError::Canceled)
    }
}

impl From<PickError> for CoreError {
    fn from(err: PickError) -> Self {
        match err {
            PickError::Canceled => CoreError::Canceled,
            PickError::Terminal(e) => CoreError::Picker(e),
        }
    }
}

/// Runs `fut` unless `cancel` fires first.
///
/// A failure that races with cancellation is reported as `Canceled`.
pub(crate) async fn or_canceled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CoreError::Canceled),
        res = fut => match res {
            Err(_) if cancel.is_cancelled() => Err(CoreError::Canceled),
            other => other,
        },
    }
}

fn not_found_message(query: &str) -> String {
    if query.is_empty() {
        "device not found".to_string()
    } else {
        format!("device not found: {query}")
    }
}

fn join_failures(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({}): {}", f.device.name, f.device.address, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

//! Per-call deadlines for collaborator operations

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Run one collaborator call under its own deadline.
///
/// Elapsed deadlines surface as `Error::Timeout` naming the operation.
pub(crate) async fn within<T, F>(operation: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, after)),
    }
}

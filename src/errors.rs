use std::error::Error as StdError;
use thiserror::Error;

/// Failure raised by an application handler.
///
/// The task observes it as the exceptional completion of the reactive
/// evaluation and answers the client with a bare `500` status. Errors
/// never propagate past the task.
///
/// # Examples
/// ```
/// use reactive_web::ServiceError;
///
/// let error = ServiceError::new("upstream unavailable");
/// assert_eq!(error.to_string(), "service failed: upstream unavailable");
/// ```
#[derive(Debug, Error)]
#[error("service failed: {0}")]
pub struct ServiceError(Box<dyn StdError + Send + Sync>);

impl ServiceError {
    /// Wraps any error (or message) as a service failure.
    #[inline]
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        ServiceError(source.into())
    }
}

/// Failure while converting a container request into a
/// [`Request`](crate::Request) value.
///
/// Conversion failures are fatal to the owning task; it terminates the
/// transaction without writing a response.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The container request URL (with its query appended) did not parse.
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod service_error_tests {
    use super::*;

    #[test]
    fn wraps_messages_and_errors() {
        let from_message = ServiceError::new("boom");
        assert_eq!(from_message.to_string(), "service failed: boom");

        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket gone");
        let from_error = ServiceError::new(io);
        assert_eq!(from_error.to_string(), "service failed: socket gone");
    }
}

// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::rpc::{Code, Status};
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The core error returned by all client libraries.
///
/// The client libraries report errors from multiple sources. For example, the
/// service may return an error, the transport may be unable to create the
/// necessary connection to make a request, the retry or polling policy may be
/// exhausted, or the application may cancel a pending operation.
///
/// Most applications will just return the error or log it, without any further
/// action. However, some applications may need to interrogate the error
/// details. This type offers a series of predicates to determine the error
/// kind, and [code()][Error::code] to map any error to a canonical status code.
///
/// # Example
/// ```
/// use gcloud_gax::error::Error;
/// match example_function() {
///     Err(e) if matches!(e.status(), Some(_)) => {
///         println!("service error {e}, debug using {:?}", e.status().unwrap());
///     },
///     Err(e) if e.is_exhausted() => { println!("gave up {e}"); },
///     Err(e) if e.is_cancelled() => { println!("cancelled {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # use gcloud_gax::error::rpc::{Code, Status};
///     # Err(Error::service(Status::default().set_code(Code::NotFound).set_message("NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the information returned by the service.
    ///
    /// # Example
    /// ```
    /// use gcloud_gax::error::Error;
    /// use gcloud_gax::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(status)),
            source: None,
        }
    }

    /// The [Status] returned by the service, if any.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use gcloud_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Some(source.into()),
        }
    }

    /// The request could not be completed before its deadline.
    ///
    /// This is always a client-side generated error.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// Typically the source is an [Exhausted] value, describing which limit
    /// was reached and the last error seen by the loop.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use gcloud_gax::error::Error;
    /// let error = Error::exhausted("too many retry attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Exhausted,
            source: Some(source.into()),
        }
    }

    /// The request could not complete before the retry or polling policy
    /// expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a transient problem that lasts
    /// longer than your retry policy. If your application can tolerate longer
    /// recovery times then extend the policy.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled operation.
    ///
    /// # Example
    /// ```
    /// use gcloud_gax::error::Error;
    /// use gcloud_gax::error::rpc::Code;
    /// let error = Error::cancelled("Operation cancelled");
    /// assert!(error.is_cancelled());
    /// assert_eq!(error.code(), Code::Cancelled);
    /// assert_eq!(error.to_string(), "Operation cancelled");
    /// ```
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Cancelled,
            source: Some(source.into()),
        }
    }

    /// The operation, or the timer it was waiting on, was cancelled.
    ///
    /// Cancellation is always requested by the application, either directly or
    /// by shutting down the completion queue.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing an I/O problem.
    ///
    /// These are errors detected before the service produced a response, for
    /// example, a dropped connection. They are treated as transient.
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Io,
            source: Some(source.into()),
        }
    }

    /// A problem reported by the transport layer.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Io)
    }

    /// Creates an unclassified error.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self {
            kind: ErrorKind::Other,
            source: Some(source.into()),
        }
    }

    /// The canonical code for this error.
    ///
    /// Errors returned by the service use the code in their [Status]. Errors
    /// generated by the client library are mapped as follows:
    /// * exhausted policies use the code of the last error seen by the loop,
    ///   or [Code::DeadlineExceeded] if the loop saw no errors.
    /// * timeouts map to [Code::DeadlineExceeded].
    /// * cancelled operations map to [Code::Cancelled].
    /// * I/O errors map to [Code::Unavailable].
    /// * all other errors map to [Code::Unknown].
    pub fn code(&self) -> Code {
        match &self.kind {
            ErrorKind::Service(s) => s.code,
            ErrorKind::Exhausted => self
                .source
                .as_ref()
                .and_then(|s| {
                    s.downcast_ref::<Exhausted>()
                        .and_then(Exhausted::last_error)
                        .or_else(|| s.downcast_ref::<Error>())
                })
                .map(Error::code)
                .unwrap_or(Code::DeadlineExceeded),
            ErrorKind::Timeout => Code::DeadlineExceeded,
            ErrorKind::Cancelled => Code::Cancelled,
            ErrorKind::Io => Code::Unavailable,
            ErrorKind::Other => Code::Unknown,
        }
    }

    /// Converts the error into a [Status].
    ///
    /// Service errors return the original status. Other errors synthesize a
    /// status using [code()][Error::code] and the error message.
    pub fn to_status(&self) -> Status {
        match &self.kind {
            ErrorKind::Service(s) => s.as_ref().clone(),
            _ => Status::default()
                .set_code(self.code())
                .set_message(self.to_string()),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Service(s), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    s.code, s.message
                )
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the request exceeded the request deadline {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => write!(f, "{e}"),
            (ErrorKind::Cancelled, Some(e)) => write!(f, "{e}"),
            (ErrorKind::Io, Some(e)) => {
                write!(f, "the transport reports an error: {e}")
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem making a request: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Service(Box<Status>),
    Timeout,
    Exhausted,
    Cancelled,
    Io,
    /// A uncategorized error.
    Other,
}

/// Indicates that a retry or polling loop has been exhausted.
///
/// Retry and polling policies return this type (wrapped in
/// [Error::exhausted]) when they stop a loop on an error that would otherwise
/// be retried.
#[derive(Debug)]
pub struct Exhausted {
    limit_name: &'static str,
    value: String,
    limit: String,
    last_error: Option<Box<Error>>,
}

impl Exhausted {
    /// Creates a new instance.
    ///
    /// # Parameters
    /// * `limit_name` - the name of the exhausted budget, e.g. "error count".
    /// * `value` - the value of the budget when the loop stopped.
    /// * `limit` - the configured limit.
    pub fn new(limit_name: &'static str, value: String, limit: String) -> Self {
        Self {
            limit_name,
            value,
            limit,
            last_error: None,
        }
    }

    /// Records the last error seen by the loop.
    pub fn with_last_error(mut self, error: Error) -> Self {
        self.last_error = Some(Box::new(error));
        self
    }

    /// The last error seen by the loop, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_deref()
    }
}

impl std::fmt::Display for Exhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "terminated because of policy: the {} ({}) reached the limit ({})",
            self.limit_name, self.value, self.limit
        )?;
        if let Some(e) = &self.last_error {
            write!(f, ", last error: {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Exhausted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn service() {
        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("NOT FOUND");
        let error = Error::service(status.clone());
        assert!(error.source().is_none(), "{error:?}");
        assert_eq!(error.status(), Some(&status));
        assert_eq!(error.code(), Code::NotFound);
        assert_eq!(error.to_status(), status);
        assert!(error.to_string().contains("NOT FOUND"), "{error}");
        assert!(!error.is_exhausted(), "{error:?}");
        assert!(!error.is_cancelled(), "{error:?}");
    }

    #[test]
    fn timeout() {
        let error = Error::timeout("simulated");
        assert!(error.is_timeout(), "{error:?}");
        assert!(error.source().is_some(), "{error:?}");
        assert!(error.status().is_none(), "{error:?}");
        assert_eq!(error.code(), Code::DeadlineExceeded);
        assert!(error.to_string().contains("simulated"), "{error}");
    }

    #[test]
    fn exhausted_without_last_error() {
        let error = Error::exhausted(Exhausted::new(
            "elapsed time",
            "5s".to_string(),
            "3s".to_string(),
        ));
        assert!(error.is_exhausted(), "{error:?}");
        assert_eq!(error.code(), Code::DeadlineExceeded);
        let msg = error.to_string();
        assert!(msg.contains("terminated because of policy"), "{msg}");
        assert!(msg.contains("elapsed time"), "{msg}");
    }

    #[test]
    fn exhausted_with_last_error() {
        let last = Error::service(
            Status::default()
                .set_code(Code::Unavailable)
                .set_message("try-again"),
        );
        let error = Error::exhausted(
            Exhausted::new("error count", "4".to_string(), "3".to_string())
                .with_last_error(last),
        );
        assert!(error.is_exhausted(), "{error:?}");
        assert_eq!(error.code(), Code::Unavailable);
        let status = error.to_status();
        assert_eq!(status.code, Code::Unavailable);
        assert!(
            status.message.contains("terminated because of policy"),
            "{status:?}"
        );
        assert!(status.message.contains("try-again"), "{status:?}");

        let source = error
            .source()
            .and_then(|e| e.downcast_ref::<Exhausted>())
            .and_then(Exhausted::last_error);
        assert!(source.is_some(), "{error:?}");
    }

    #[test]
    fn exhausted_wrapping_error() {
        let last = Error::io("connection reset");
        let error = Error::exhausted(last);
        assert_eq!(error.code(), Code::Unavailable);
    }

    #[test]
    fn cancelled() {
        let error = Error::cancelled("Operation cancelled");
        assert!(error.is_cancelled(), "{error:?}");
        assert_eq!(error.code(), Code::Cancelled);
        assert_eq!(
            error.to_status(),
            Status::default()
                .set_code(Code::Cancelled)
                .set_message("Operation cancelled")
        );
    }

    #[test]
    fn io_and_other() {
        let error = Error::io("connection reset");
        assert!(error.is_io(), "{error:?}");
        assert_eq!(error.code(), Code::Unavailable);

        let error = Error::other("something odd");
        assert!(!error.is_io(), "{error:?}");
        assert_eq!(error.code(), Code::Unknown);
        assert!(error.to_string().contains("something odd"), "{error}");
    }

    #[test]
    fn send_and_sync() {
        static_assertions::assert_impl_all!(Error: Send, Sync);
        static_assertions::assert_impl_all!(Exhausted: Send, Sync);
    }
}

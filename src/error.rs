use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Conditions that the capture pipeline treats as non-fatal are deliberately *not* part of
/// this enum: an uncapturable parameter degrades to
/// [`crate::classifier::BoxingInstruction::Unsupported`], starting while already capturing
/// yields [`crate::probes::StartOutcome::AlreadyCapturing`], and a full log queue yields
/// [`crate::logger::EnqueueOutcome::Dropped`].
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::Malformed`] - Corrupted signature blob or frame
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of a buffer
/// - [`Error::RecursionLimit`] - Signature nesting exceeded the decoder limit
///
/// ## Session Errors
/// - [`Error::UnresolvedMethods`] - One or more requested methods could not be found
/// - [`Error::InvalidRequest`] - A capture request failed validation
/// - [`Error::Native`] - The native instrumentation layer refused an install/uninstall
///
/// ## Protocol Errors
/// - [`Error::Protocol`] - Malformed or unexpected frame on the control channel
/// - [`Error::CommandFailed`] - The native side answered with a non-success result code
/// - [`Error::ChannelClosed`] - A queue or event channel was disconnected
///
/// ## External Errors
/// - [`Error::Io`] - Socket or stream I/O errors
/// - [`Error::Json`] - Payload (de)serialization errors
///
/// # Examples
///
/// ```rust,ignore
/// use callscope::{Error, session::CaptureRequest};
///
/// match CaptureRequest::from_json(payload, &config) {
///     Ok(request) => println!("{} methods", request.methods.len()),
///     Err(Error::InvalidRequest(reason)) => eprintln!("rejected: {reason}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while decoding.
    #[error("Out of Bound read would have occurred - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Recursion limit reached while decoding a nested signature.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// One or more method descriptions of a batch resolved to zero methods.
    ///
    /// Holds the indices (into the request's method list) that failed. The whole batch
    /// is rejected; nothing is instrumented.
    #[error("Unable to resolve requested methods at indices {0:?}")]
    UnresolvedMethods(Vec<usize>),

    /// A capture request did not pass validation.
    #[error("Invalid capture request - {0}")]
    InvalidRequest(String),

    /// The configuration is inconsistent.
    #[error("Invalid configuration - {0}")]
    Configuration(String),

    /// The native instrumentation layer refused an operation.
    #[error("Native instrumentation failure - {0}")]
    Native(String),

    /// Malformed or unexpected frame received on the control channel.
    #[error("Protocol error - {0}")]
    Protocol(String),

    /// The native side answered a command with a non-success result code.
    #[error("Command {message_type} failed with result code {result_code:#x}")]
    CommandFailed {
        /// Message type of the command that failed
        message_type: i16,
        /// Result code returned in the status frame
        result_code: i32,
    },

    /// A channel or queue was disconnected while an operation was pending.
    #[error("Channel closed")]
    ChannelClosed,

    /// Stream I/O error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON payload (de)serialization error.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

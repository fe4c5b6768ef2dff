//! Issuing commands over the control channel.

use std::io::{Read, Write};

use tracing::debug;

use crate::{
    protocol::{frame::StatusFrame, Command},
    session::RequestPayload,
    Error, Result,
};

/// Sends [`Command`]s over a byte stream and checks the native side's status replies.
///
/// Every command is answered by exactly one [`StatusFrame`]; the client does not pipeline.
pub struct CommandClient<S: Read + Write> {
    stream: S,
}

impl<S: Read + Write> CommandClient<S> {
    /// Wraps a connected stream.
    pub fn new(stream: S) -> Self {
        CommandClient { stream }
    }

    /// Sends `command` and waits for its status.
    ///
    /// # Errors
    /// Returns [`Error::CommandFailed`] for a non-zero result code, [`Error::Protocol`] for a
    /// malformed reply, and [`Error::Io`] on stream failure.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let frame = command.to_frame()?;
        frame.write_to(&mut self.stream)?;

        let status = StatusFrame::read_from(&mut self.stream)?;
        debug!(
            target: "callscope::protocol",
            message_type = frame.header.message_type,
            result_code = status.result_code,
            "command acknowledged"
        );

        if status.is_success() {
            Ok(())
        } else {
            Err(Error::CommandFailed {
                message_type: frame.header.message_type,
                result_code: status.result_code,
            })
        }
    }

    /// Requests a capture session.
    ///
    /// # Errors
    /// See [`CommandClient::send`].
    pub fn start_capturing(&mut self, payload: RequestPayload) -> Result<()> {
        self.send(&Command::StartCapturing(payload))
    }

    /// Requests the end of the active capture session.
    ///
    /// # Errors
    /// See [`CommandClient::send`].
    pub fn stop_capturing(&mut self) -> Result<()> {
        self.send(&Command::StopCapturing)
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

//! Serving commands read from the control channel.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::{
    protocol::{
        frame::{CommandFrame, StatusFrame},
        Command,
    },
    Error, Result,
};

/// Result code of a successful command.
pub const RESULT_SUCCESS: i32 = 0;
/// The command or its payload was invalid.
#[allow(clippy::cast_possible_wrap)]
pub const E_INVALIDARG: i32 = 0x8007_0057_u32 as i32;
/// The command was valid but could not be carried out.
#[allow(clippy::cast_possible_wrap)]
pub const E_FAIL: i32 = 0x8000_4005_u32 as i32;
/// The command is not valid in the current state.
#[allow(clippy::cast_possible_wrap)]
pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;

/// Maps an error to the result code reported in a status frame.
#[must_use]
pub fn result_code(error: &Error) -> i32 {
    match error {
        Error::InvalidRequest(_)
        | Error::UnresolvedMethods(_)
        | Error::Json(_)
        | Error::Protocol(_)
        | Error::Malformed { .. }
        | Error::OutOfBounds { .. }
        | Error::RecursionLimit(_) => E_INVALIDARG,
        Error::ChannelClosed => E_UNEXPECTED,
        _ => E_FAIL,
    }
}

/// Executes decoded commands.
pub trait CommandHandler: Send + Sync {
    /// Runs `command` and returns its result code.
    fn handle(&self, command: Command) -> i32;
}

impl<H: CommandHandler + ?Sized> CommandHandler for std::sync::Arc<H> {
    fn handle(&self, command: Command) -> i32 {
        (**self).handle(command)
    }
}

/// Reads command frames, hands them to a [`CommandHandler`] and writes status replies.
pub struct CommandDispatcher<H: CommandHandler> {
    handler: H,
}

impl<H: CommandHandler> CommandDispatcher<H> {
    /// Creates a dispatcher around `handler`.
    pub fn new(handler: H) -> Self {
        CommandDispatcher { handler }
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serves one command.
    ///
    /// Undecodable commands are answered with [`E_INVALIDARG`] and do not end the stream.
    /// Returns `false` once the peer closed the stream.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on stream failure and [`Error::Protocol`] for a truncated or
    /// oversized frame, after which the stream cannot be resynchronized.
    pub fn serve_one<S: Read + Write>(&self, stream: &mut S) -> Result<bool> {
        let Some(frame) = CommandFrame::read_from(stream)? else {
            return Ok(false);
        };

        let code = match Command::from_frame(&frame) {
            Ok(command) => {
                debug!(
                    target: "callscope::protocol",
                    message_type = frame.header.message_type,
                    payload_length = frame.header.payload_length,
                    "dispatching command"
                );
                self.handler.handle(command)
            }
            Err(error) => {
                warn!(target: "callscope::protocol", %error, "rejecting undecodable command");
                result_code(&error)
            }
        };

        StatusFrame::new(code).write_to(stream)?;
        Ok(true)
    }

    /// Serves commands until the peer closes the stream.
    ///
    /// # Errors
    /// See [`CommandDispatcher::serve_one`].
    pub fn serve<S: Read + Write>(&self, stream: &mut S) -> Result<()> {
        while self.serve_one(stream)? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use parking_lot::Mutex;

    use super::*;
    use crate::protocol::{MessageType, PayloadType};

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<Command>>,
    }

    impl CommandHandler for Recorder {
        fn handle(&self, command: Command) -> i32 {
            let code = match command {
                Command::StartCapturing(_) => RESULT_SUCCESS,
                Command::StopCapturing => E_UNEXPECTED,
            };
            self.commands.lock().push(command);
            code
        }
    }

    struct Loopback {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn statuses(output: &[u8]) -> Vec<i32> {
        output
            .chunks(crate::protocol::frame::STATUS_FRAME_SIZE)
            .map(|chunk| StatusFrame::parse(chunk).unwrap().result_code)
            .collect()
    }

    #[test]
    fn test_serves_until_eof() {
        let mut input = Vec::new();
        input.extend(
            CommandFrame::new(
                MessageType::StartCapturing,
                PayloadType::Utf8Json,
                br#"{"methods":[]}"#.to_vec(),
            )
            .unwrap()
            .to_bytes(),
        );
        input.extend(Command::StopCapturing.to_frame().unwrap().to_bytes());
        input.extend(
            CommandFrame::new(
                MessageType::StartCapturing,
                PayloadType::Utf8Json,
                b"not json".to_vec(),
            )
            .unwrap()
            .to_bytes(),
        );

        let dispatcher = CommandDispatcher::new(Recorder::default());
        let mut stream = Loopback {
            input: Cursor::new(input),
            output: Vec::new(),
        };
        dispatcher.serve(&mut stream).unwrap();

        assert_eq!(
            statuses(&stream.output),
            vec![RESULT_SUCCESS, E_UNEXPECTED, E_INVALIDARG]
        );
        assert_eq!(dispatcher.handler().commands.lock().len(), 2);
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(E_INVALIDARG, -2_147_024_809);
        assert_eq!(result_code(&Error::UnresolvedMethods(vec![0])), E_INVALIDARG);
        assert_eq!(result_code(&Error::Native("refused".into())), E_FAIL);
        assert_eq!(result_code(&Error::ChannelClosed), E_UNEXPECTED);
    }
}

//! Binary framing of the control channel.
//!
//! All integers are little-endian. A command frame is an 8 byte [`FrameHeader`] followed by
//! `payload_length` bytes; a status frame is a header with `payload_length == 4` followed by
//! the `i32` result code.

use std::io::{ErrorKind, Read, Write};

use crate::{
    file::parser::Parser,
    protocol::{MessageType, PayloadType},
    Error, Result,
};

/// Size of [`FrameHeader`] on the wire.
pub const HEADER_SIZE: usize = 8;
/// Size of a [`StatusFrame`] on the wire.
pub const STATUS_FRAME_SIZE: usize = HEADER_SIZE + 4;
/// Largest accepted payload.
pub const MAX_PAYLOAD_LENGTH: usize = 16 * 1024 * 1024;

/// Header shared by command and status frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw [`MessageType`]
    pub message_type: i16,
    /// Raw [`PayloadType`]
    pub payload_type: i16,
    /// Number of payload bytes following the header
    pub payload_length: i32,
}

impl FrameHeader {
    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `data`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `data` is too short.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut parser = Parser::new(data);
        Ok(FrameHeader {
            message_type: parser.read_le::<i16>()?,
            payload_type: parser.read_le::<i16>()?,
            payload_length: parser.read_le::<i32>()?,
        })
    }

    /// Encodes the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.message_type.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.payload_type.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.payload_length.to_le_bytes());
        bytes
    }

    /// `payload_length` as a size, rejecting negative and oversized values.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the length is out of range.
    pub fn payload_len(&self) -> Result<usize> {
        usize::try_from(self.payload_length)
            .ok()
            .filter(|length| *length <= MAX_PAYLOAD_LENGTH)
            .ok_or_else(|| {
                Error::Protocol(format!("invalid payload length {}", self.payload_length))
            })
    }
}

/// A command frame with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    /// The frame header
    pub header: FrameHeader,
    /// `header.payload_length` payload bytes
    pub payload: Vec<u8>,
}

impl CommandFrame {
    /// Builds a frame around `payload`.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the payload exceeds [`MAX_PAYLOAD_LENGTH`].
    pub fn new(
        message_type: MessageType,
        payload_type: PayloadType,
        payload: Vec<u8>,
    ) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LENGTH {
            return Err(Error::Protocol(format!(
                "payload of {} bytes exceeds the frame limit",
                payload.len()
            )));
        }

        Ok(CommandFrame {
            header: FrameHeader {
                message_type: message_type as i16,
                payload_type: payload_type as i16,
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                payload_length: payload.len() as i32,
            },
            payload,
        })
    }

    /// Encodes header and payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Writes the frame to `writer`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one frame from `reader`.
    ///
    /// Returns `Ok(None)` if the stream ended cleanly before a new frame started.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] for a truncated frame or an invalid payload length, and
    /// [`Error::Io`] on read failure.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let Some(header) = read_header(reader)? else {
            return Ok(None);
        };

        let mut payload = vec![0u8; header.payload_len()?];
        reader.read_exact(&mut payload).map_err(truncated)?;
        Ok(Some(CommandFrame { header, payload }))
    }
}

/// The native side's reply to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFrame {
    /// `0` on success, an HRESULT style failure code otherwise
    pub result_code: i32,
}

impl StatusFrame {
    /// Creates a status carrying `result_code`.
    #[must_use]
    pub fn new(result_code: i32) -> Self {
        StatusFrame { result_code }
    }

    /// Returns `true` for a zero result code.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// The header this frame is sent with.
    #[must_use]
    pub fn header() -> FrameHeader {
        FrameHeader {
            message_type: MessageType::Status as i16,
            payload_type: PayloadType::Int32 as i16,
            payload_length: 4,
        }
    }

    /// Decodes and validates a status frame.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `data` is shorter than [`STATUS_FRAME_SIZE`], and
    /// [`Error::Protocol`] if the header does not describe a status frame.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(data)?;
        Self::validate(&header)?;

        let mut parser = Parser::new(data);
        parser.advance_by(HEADER_SIZE)?;
        Ok(StatusFrame {
            result_code: parser.read_le::<i32>()?,
        })
    }

    /// Encodes the frame.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; STATUS_FRAME_SIZE] {
        let mut bytes = [0u8; STATUS_FRAME_SIZE];
        bytes[..HEADER_SIZE].copy_from_slice(&Self::header().to_bytes());
        bytes[HEADER_SIZE..].copy_from_slice(&self.result_code.to_le_bytes());
        bytes
    }

    /// Writes the frame to `writer`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on write failure.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Reads one status frame from `reader`.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the stream ended or the frame is not a valid status
    /// frame, and [`Error::Io`] on read failure.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let header = read_header(reader)?
            .ok_or_else(|| Error::Protocol("connection closed while awaiting status".into()))?;
        Self::validate(&header)?;

        let mut code = [0u8; 4];
        reader.read_exact(&mut code).map_err(truncated)?;
        Ok(StatusFrame {
            result_code: i32::from_le_bytes(code),
        })
    }

    fn validate(header: &FrameHeader) -> Result<()> {
        if header.message_type != MessageType::Status as i16 {
            return Err(Error::Protocol(format!(
                "expected a status frame, got message type {}",
                header.message_type
            )));
        }
        if header.payload_length != 4 {
            return Err(Error::Protocol(format!(
                "status frame declares {} payload bytes",
                header.payload_length
            )));
        }
        Ok(())
    }
}

/// Reads a header, distinguishing a clean end of stream from a truncated header.
fn read_header<R: Read>(reader: &mut R) -> Result<Option<FrameHeader>> {
    let mut bytes = [0u8; HEADER_SIZE];
    let mut filled = 0;

    while filled < HEADER_SIZE {
        match reader.read(&mut bytes[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(Error::Protocol(format!(
                    "truncated frame header ({filled} of {HEADER_SIZE} bytes)"
                )))
            }
            Ok(read) => filled += read,
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(error.into()),
        }
    }

    FrameHeader::parse(&bytes).map(Some)
}

fn truncated(error: std::io::Error) -> Error {
    if error.kind() == ErrorKind::UnexpectedEof {
        Error::Protocol("truncated frame payload".into())
    } else {
        Error::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_header_layout() {
        let header = FrameHeader {
            message_type: 2,
            payload_type: 2,
            payload_length: 0x0102,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x02, 0x00, 0x02, 0x00, 0x02, 0x01, 0x00, 0x00]);
        assert_eq!(FrameHeader::parse(&bytes).unwrap(), header);
        assert!(matches!(
            FrameHeader::parse(&bytes[..5]),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_command_frame_stream() {
        let first =
            CommandFrame::new(MessageType::StartCapturing, PayloadType::Utf8Json, b"{}".to_vec())
                .unwrap();
        let second =
            CommandFrame::new(MessageType::StopCapturing, PayloadType::None, Vec::new()).unwrap();

        let mut wire = Vec::new();
        first.write_to(&mut wire).unwrap();
        second.write_to(&mut wire).unwrap();

        let mut reader = Cursor::new(wire);
        assert_eq!(CommandFrame::read_from(&mut reader).unwrap(), Some(first));
        assert_eq!(CommandFrame::read_from(&mut reader).unwrap(), Some(second));
        assert_eq!(CommandFrame::read_from(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_command_frame_truncation() {
        let frame =
            CommandFrame::new(MessageType::StartCapturing, PayloadType::Utf8Json, b"{}".to_vec())
                .unwrap()
                .to_bytes();

        let mut short_header = Cursor::new(frame[..3].to_vec());
        assert!(matches!(
            CommandFrame::read_from(&mut short_header),
            Err(Error::Protocol(_))
        ));

        let mut short_payload = Cursor::new(frame[..HEADER_SIZE + 1].to_vec());
        assert!(matches!(
            CommandFrame::read_from(&mut short_payload),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn test_invalid_payload_length() {
        let negative = FrameHeader {
            message_type: 2,
            payload_type: 2,
            payload_length: -1,
        };
        let mut reader = Cursor::new(negative.to_bytes().to_vec());
        assert!(matches!(
            CommandFrame::read_from(&mut reader),
            Err(Error::Protocol(_))
        ));

        let oversized = FrameHeader {
            payload_length: i32::MAX,
            ..negative
        };
        assert!(oversized.payload_len().is_err());
    }

    #[test]
    fn test_status_frame() {
        let status = StatusFrame::new(-2_147_024_809);
        let bytes = status.to_bytes();
        assert_eq!(&bytes[..HEADER_SIZE], &[1, 0, 1, 0, 4, 0, 0, 0]);
        assert_eq!(StatusFrame::parse(&bytes).unwrap(), status);
        assert!(!status.is_success());
        assert!(StatusFrame::new(0).is_success());

        let mut reader = Cursor::new(bytes.to_vec());
        assert_eq!(StatusFrame::read_from(&mut reader).unwrap(), status);
    }

    #[test]
    fn test_status_frame_validation() {
        let mut wrong_type = StatusFrame::new(0).to_bytes();
        wrong_type[0] = MessageType::StopCapturing as u8;
        assert!(matches!(StatusFrame::parse(&wrong_type), Err(Error::Protocol(_))));

        let mut wrong_length = StatusFrame::new(0).to_bytes();
        wrong_length[4] = 8;
        assert!(matches!(StatusFrame::parse(&wrong_length), Err(Error::Protocol(_))));

        let mut closed = Cursor::new(Vec::new());
        assert!(matches!(StatusFrame::read_from(&mut closed), Err(Error::Protocol(_))));

        assert!(StatusFrame::parse(&StatusFrame::new(0).to_bytes()[..10]).is_err());
    }
}

//! Commands sent from the managed side to the native instrumentation component.

use strum::{EnumIter, FromRepr, IntoStaticStr};

use crate::{
    protocol::frame::CommandFrame,
    session::RequestPayload,
    Error, Result,
};

/// Discriminant of a control frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, IntoStaticStr)]
#[repr(i16)]
pub enum MessageType {
    /// Reserved, never sent
    Unknown = 0,
    /// Reply frame carrying a result code
    Status = 1,
    /// Install probes for a method list
    StartCapturing = 2,
    /// Remove every probe
    StopCapturing = 3,
}

impl MessageType {
    /// Decodes a wire value.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] for values without a message type.
    pub fn from_wire(value: i16) -> Result<Self> {
        Self::from_repr(value)
            .ok_or_else(|| Error::Protocol(format!("unknown message type {value}")))
    }
}

/// Encoding of a frame's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, IntoStaticStr)]
#[repr(i16)]
pub enum PayloadType {
    /// No payload bytes
    None = 0,
    /// One little-endian `i32`
    Int32 = 1,
    /// UTF-8 encoded JSON document
    Utf8Json = 2,
}

impl PayloadType {
    /// Decodes a wire value.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] for values without a payload type.
    pub fn from_wire(value: i16) -> Result<Self> {
        Self::from_repr(value)
            .ok_or_else(|| Error::Protocol(format!("unknown payload type {value}")))
    }
}

/// A decoded control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a capture session for the listed methods
    StartCapturing(RequestPayload),
    /// Stop the active capture session
    StopCapturing,
}

impl Command {
    /// Message type this command is sent with.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Command::StartCapturing(_) => MessageType::StartCapturing,
            Command::StopCapturing => MessageType::StopCapturing,
        }
    }

    /// Encodes the command.
    ///
    /// # Errors
    /// Returns [`Error::Json`] if the payload cannot be serialized, or [`Error::Protocol`]
    /// if it exceeds the frame size limit.
    pub fn to_frame(&self) -> Result<CommandFrame> {
        match self {
            Command::StartCapturing(payload) => CommandFrame::new(
                MessageType::StartCapturing,
                PayloadType::Utf8Json,
                serde_json::to_vec(payload)?,
            ),
            Command::StopCapturing => {
                CommandFrame::new(MessageType::StopCapturing, PayloadType::None, Vec::new())
            }
        }
    }

    /// Decodes a received frame.
    ///
    /// # Errors
    /// Returns [`Error::Protocol`] if the message or payload type is not valid for a
    /// command, and [`Error::Json`] for an unparsable payload.
    pub fn from_frame(frame: &CommandFrame) -> Result<Self> {
        let message_type = MessageType::from_wire(frame.header.message_type)?;
        let payload_type = PayloadType::from_wire(frame.header.payload_type)?;

        match (message_type, payload_type) {
            (MessageType::StartCapturing, PayloadType::Utf8Json) => {
                Ok(Command::StartCapturing(serde_json::from_slice(&frame.payload)?))
            }
            (MessageType::StopCapturing, PayloadType::None) => {
                if frame.payload.is_empty() {
                    Ok(Command::StopCapturing)
                } else {
                    Err(Error::Protocol(format!(
                        "StopCapturing carries {} unexpected payload bytes",
                        frame.payload.len()
                    )))
                }
            }
            (message_type, payload_type) => Err(Error::Protocol(format!(
                "{} is not a command with a {} payload",
                <&'static str>::from(message_type),
                <&'static str>::from(payload_type)
            ))),
        }
    }
}

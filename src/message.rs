use crate::error::{Error, ProtocolError};
use crate::frame::{close_code, Frame, OpCode};

/// Payload of a close frame: a status code plus a UTF-8 reason of at most
/// 123 bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseFrame {
    pub code: u16,
    pub reason: String,
}

impl CloseFrame {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Parses a close frame payload received from the peer.
    ///
    /// An empty payload means the peer supplied no status code. A one-byte
    /// payload, a reserved code or a non-UTF-8 reason fail the connection.
    pub(crate) fn parse(payload: &[u8]) -> Result<Option<CloseFrame>, Error> {
        if payload.is_empty() {
            return Ok(None);
        }
        if payload.len() == 1 {
            Err(ProtocolError::InvalidClosePayload)?;
        }

        let code = u16::from_be_bytes([payload[0], payload[1]]);
        if !close_code::is_allowed_on_wire(code) {
            Err(ProtocolError::InvalidCloseCode(code))?;
        }

        let reason = std::str::from_utf8(&payload[2..])?.to_owned();
        Ok(Some(CloseFrame { code, reason }))
    }

    /// First two bytes are the big-endian status code, the rest is the reason.
    pub(crate) fn into_payload(self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(2 + self.reason.len());
        payload.extend_from_slice(&self.code.to_be_bytes());
        payload.extend_from_slice(self.reason.as_bytes());
        payload
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close(Option<CloseFrame>),
}

impl Message {
    // Converts a whole (reassembled) data frame into a Message variant.
    // Control frames are mapped by the reader where the close payload has
    // already been parsed.
    pub(crate) fn from_data_frame(frame: Frame) -> Result<Self, Error> {
        match frame.opcode {
            OpCode::Text => Ok(Message::Text(String::from_utf8(frame.payload)?)),
            OpCode::Binary => Ok(Message::Binary(frame.payload)),
            other => Err(ProtocolError::InvalidOpcode(other.as_u8()))?,
        }
    }

    // Function to get the payload as binary (Vec<u8>)
    pub fn as_binary(&self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.as_bytes().to_vec(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data.clone(),
            Message::Close(Some(frame)) => frame.clone().into_payload(),
            Message::Close(None) => Vec::new(),
        }
    }

    // Function to get the payload as a String
    pub fn as_text(&self) -> Result<String, Error> {
        match self {
            Message::Text(text) => Ok(text.clone()),
            other => Ok(String::from_utf8(other.as_binary())?),
        }
    }

    pub(crate) fn opcode(&self) -> OpCode {
        match self {
            Message::Text(_) => OpCode::Text,
            Message::Binary(_) => OpCode::Binary,
            Message::Ping(_) => OpCode::Ping,
            Message::Pong(_) => OpCode::Pong,
            Message::Close(_) => OpCode::Close,
        }
    }

    pub(crate) fn into_payload(self) -> Vec<u8> {
        match self {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) | Message::Ping(data) | Message::Pong(data) => data,
            Message::Close(Some(frame)) => frame.into_payload(),
            Message::Close(None) => Vec::new(),
        }
    }
}

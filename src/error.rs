use crate::frame::close_code;
use httparse::Error as HttpParseError;
use pki_types::InvalidDnsNameError;
use std::io;
use std::str::Utf8Error;
use std::string::FromUtf8Error;
use thiserror::Error;
use url::ParseError;

#[derive(Error, Debug)]
pub enum Error {
    // Handshake Errors
    #[error("handshake failed: {source}")]
    Handshake {
        #[from]
        source: HandshakeError,
    },

    // Framing / protocol Errors
    #[error("protocol violation: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("IO Error happened: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },

    #[error("Max frame size reached")]
    MaxFrameSize,

    #[error("Max message size reached")]
    MaxMessageSize,

    #[error("fragment_size: `{0}` can't be greater than max_frame_size: `{1}`")]
    CustomFragmentSizeExceeded(usize, usize),

    #[error("fragment_size must be greater than zero")]
    InvalidFragmentSize,

    #[error("{source}")]
    Utf8Error {
        #[from]
        source: Utf8Error,
    },

    #[error("{source}")]
    FromUtf8Error {
        #[from]
        source: FromUtf8Error,
    },

    // Caller attempted to send while the connection is not open
    #[error("connection is not open")]
    NotOpen,

    // A send future was dropped between the first and the last byte of a
    // frame, the peer would otherwise see a truncated frame
    #[error("frame write cancelled mid-frame, connection aborted")]
    WriteInterrupted,

    #[error("channel communication error")]
    CommunicationError,

    // URL Errors
    #[error("{source}")]
    URLParseError {
        #[from]
        source: ParseError,
    },

    #[error("Invalid scheme in WebSocket URL")]
    InvalidSchemeURL,

    #[error("URL has no host")]
    URLNoHost,

    // Domain addr parsing error
    #[error("{source}")]
    DomainError {
        #[from]
        source: InvalidDnsNameError,
    },
}

impl Error {
    /// The close code the connection core queues when this error fails the
    /// connection. `None` for caller mistakes that don't touch the wire.
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Error::Protocol { source } => Some(source.close_code()),
            Error::MaxFrameSize | Error::MaxMessageSize => Some(close_code::MESSAGE_TOO_BIG),
            Error::Utf8Error { .. } | Error::FromUtf8Error { .. } => {
                Some(close_code::INVALID_PAYLOAD)
            }
            Error::IOError { .. } | Error::WriteInterrupted => Some(close_code::ABNORMAL),
            _ => None,
        }
    }
}

/// Failures of the opening handshake.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("timed out waiting for the server response")]
    Timeout,

    #[error("server rejected the upgrade with status {0}")]
    Rejected(u16),

    #[error("malformed handshake response")]
    MalformedResponse,

    #[error("server didn't send a valid Sec-WebSocket-Accept key")]
    BadAcceptKey,

    #[error("server selected subprotocol `{0}` which was never offered")]
    UnofferedSubprotocol(String),

    #[error("server accepted extension `{0}` which was never offered")]
    UnofferedExtension(String),

    #[error("{source}")]
    HttpParseError {
        #[from]
        source: HttpParseError,
    },
}

/// Violations of the RFC 6455 wire contract by the peer. Every variant
/// fails the connection with close code 1002.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("RSV not zero")]
    ReservedBitsNotZero,

    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("control frames must not be fragmented")]
    FragmentedControlFrame,

    #[error("control frame payload can't be greater than 125 bytes")]
    OversizedControlFrame,

    #[error("received a masked frame from the server")]
    MaskedFrameFromServer,

    #[error("64-bit payload length has the high bit set")]
    InvalidPayloadLength,

    #[error("invalid continuation frame: no fragmented message to continue")]
    InvalidContinuationFrame,

    #[error("incoming data frame while a fragmented message is in progress")]
    FragmentedInProgress,

    #[error("close frame with a one-byte payload")]
    InvalidClosePayload,

    #[error("close code {0} is not allowed on the wire")]
    InvalidCloseCode(u16),
}

impl ProtocolError {
    pub fn close_code(&self) -> u16 {
        close_code::PROTOCOL_ERROR
    }
}

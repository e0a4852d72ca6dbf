use crate::error::{Error, HandshakeError};
use crate::frame::Frame;
use std::fmt;

/// One entry of a `Sec-WebSocket-Extensions` header: the extension token
/// plus its parameters, e.g. `permessage-deflate; client_max_window_bits=15`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extension {
    pub name: String,
    pub params: Vec<(String, Option<String>)>,
}

impl Extension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((key.into(), value));
        self
    }

    // Parses a single header entry; parameters are separated by semicolons
    fn parse_one(entry: &str) -> Option<Extension> {
        let mut parts = entry.split(';').map(str::trim);
        let name = parts.next()?;
        if name.is_empty() {
            return None;
        }

        let mut extension = Extension::new(name);
        for param in parts {
            match param.split_once('=') {
                Some((key, value)) => extension.params.push((
                    key.trim().to_string(),
                    Some(value.trim().trim_matches('"').to_string()),
                )),
                None => extension.params.push((param.to_string(), None)),
            }
        }
        Some(extension)
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for (key, value) in &self.params {
            match value {
                Some(value) => write!(f, "; {}={}", key, value)?,
                None => write!(f, "; {}", key)?,
            }
        }
        Ok(())
    }
}

/// Parses a `Sec-WebSocket-Extensions` header value. Multiple extensions are
/// comma-separated; malformed entries are skipped.
pub fn parse_extensions(header_value: &str) -> Vec<Extension> {
    header_value
        .split(',')
        .filter_map(Extension::parse_one)
        .collect()
}

/// Formats the offer list for the request header.
pub(crate) fn format_extension_offers(offers: &[Extension]) -> String {
    offers
        .iter()
        .map(Extension::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every extension the server accepted must be one the client offered;
/// an unknown name fails the handshake.
pub(crate) fn validate_accepted(
    offered: &[Extension],
    accepted: &[Extension],
) -> Result<(), HandshakeError> {
    for extension in accepted {
        if !offered.iter().any(|offer| offer.name == extension.name) {
            return Err(HandshakeError::UnofferedExtension(extension.name.clone()));
        }
    }
    Ok(())
}

/// Per-frame transformation seam for negotiated extensions.
///
/// A permessage-deflate implementation would compress outgoing data frames,
/// decompress incoming ones and claim RSV1. Nothing in this crate sets RSV
/// bits; the default hook passes frames through untouched.
pub trait FrameHook: Send {
    /// RSV1 is only legal on ingress while the active hook claims it.
    fn claims_rsv1(&self) -> bool {
        false
    }

    fn process_incoming(&mut self, frame: Frame) -> Result<Frame, Error> {
        Ok(frame)
    }

    fn process_outgoing(&mut self, frame: Frame) -> Result<Frame, Error> {
        Ok(frame)
    }
}

#[derive(Debug, Default)]
pub struct NoopHook;

impl FrameHook for NoopHook {}

// One hook instance per direction, since a real codec keeps separate
// compression contexts for each. This is where a negotiated extension
// would be instantiated from the accepted list.
pub(crate) fn build_hooks(
    _accepted: &[Extension],
) -> (Box<dyn FrameHook + Send>, Box<dyn FrameHook + Send>) {
    (Box::new(NoopHook), Box::new(NoopHook))
}

use crate::error::Error;
use crate::extensions::Extension;
use crate::message::{CloseFrame, Message};
use crate::split::{WSReader, WSWriter};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Lifecycle of a connection. A connection spends its `Connecting` phase
/// inside [`connect_async`](crate::handshake::connect_async); the value
/// handed to the caller is already `Open`. Once `Closed` it is terminal
/// and the connection cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// What the server agreed to during the opening handshake.
#[derive(Debug, Clone, Default)]
pub struct Negotiated {
    pub protocol: Option<String>,
    pub extensions: Vec<Extension>,
}

/// An established client connection.
///
/// Implements `Stream` for inbound messages; the stream ends once the
/// close handshake completes or the transport dies. Can be split into
/// independent reader and writer halves so a reader task and a writer
/// task can drive the same connection concurrently.
pub struct WSConnection {
    reader: WSReader,
    writer: WSWriter,
    negotiated: Negotiated,
}

impl WSConnection {
    pub(crate) fn new(reader: WSReader, writer: WSWriter, negotiated: Negotiated) -> Self {
        Self {
            reader,
            writer,
            negotiated,
        }
    }

    /// Splitting the connection, so incoming messages can be monitored in
    /// a separate task while another one writes.
    pub fn split(self) -> (WSReader, WSWriter) {
        (self.reader, self.writer)
    }

    /// The subprotocol the server selected, if any was negotiated.
    pub fn protocol(&self) -> Option<&str> {
        self.negotiated.protocol.as_deref()
    }

    /// The extensions the server accepted.
    pub fn extensions(&self) -> &[Extension] {
        &self.negotiated.extensions
    }

    pub async fn state(&self) -> ConnectionState {
        self.writer.state().await
    }

    /// The close frame this side sent and the one the peer sent, if any.
    pub async fn close_record(&self) -> (Option<CloseFrame>, Option<CloseFrame>) {
        self.writer.close_record().await
    }

    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.writer.close_connection().await
    }

    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        self.writer.close(code, reason).await
    }

    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        self.writer.send_message(message).await
    }

    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send(data).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.writer.send_as_binary(data).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.writer.send_as_text(data).await
    }

    pub async fn send_ping(&mut self) -> Result<(), Error> {
        self.writer.send_ping().await
    }

    pub async fn send_large_data_fragmented(
        &mut self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        self.writer.send_large_data_fragmented(data, fragment_size).await
    }
}

impl Stream for WSConnection {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.reader).poll_next(cx)
    }
}

use crate::config::WebSocketConfig;
use crate::connection::ConnectionState;
use crate::error::{Error, ProtocolError};
use crate::extensions::FrameHook;
use crate::frame::{close_code, Frame, OpCode, MAX_CONTROL_PAYLOAD};
use crate::message::{CloseFrame, Message};
use crate::write::Writer;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Mutex;
use tokio_stream::wrappers::ReceiverStream;

/// The receiving half of a connection: a stream of whole messages in the
/// order their terminal fragment arrived. Yields `None` once the
/// connection is closed.
pub struct WSReader {
    read_rx: ReceiverStream<Result<Message, Error>>,
}

impl WSReader {
    pub(crate) fn new(read_rx: ReceiverStream<Result<Message, Error>>) -> Self {
        Self { read_rx }
    }
}

impl Stream for WSReader {
    type Item = Result<Message, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.read_rx).poll_next(cx)
    }
}

/// The sending half of a connection.
pub struct WSWriter {
    writer: Arc<Mutex<Writer>>,
    web_socket_config: WebSocketConfig,
    hook: Box<dyn FrameHook + Send>,
}

impl WSWriter {
    pub(crate) fn new(
        writer: Arc<Mutex<Writer>>,
        web_socket_config: WebSocketConfig,
        hook: Box<dyn FrameHook + Send>,
    ) -> Self {
        Self {
            writer,
            web_socket_config,
            hook,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.writer.lock().await.state()
    }

    /// The close frame this side sent and the one the peer sent, once the
    /// closing handshake has started. Synthetic codes (1005, 1006) never
    /// show up here; they are only surfaced through errors.
    pub async fn close_record(&self) -> (Option<CloseFrame>, Option<CloseFrame>) {
        let writer = self.writer.lock().await;
        (writer.local_close().cloned(), writer.peer_close().cloned())
    }

    /// Starts the closing handshake with code 1000. The connection keeps
    /// reading until the peer answers with its own close (or the transport
    /// goes down); only then does the message stream end.
    pub async fn close_connection(&mut self) -> Result<(), Error> {
        self.close(close_code::NORMAL, "").await
    }

    /// Starts the closing handshake with the given code and reason.
    pub async fn close(&mut self, code: u16, reason: &str) -> Result<(), Error> {
        if !close_code::is_allowed_on_wire(code) {
            Err(ProtocolError::InvalidCloseCode(code))?;
        }
        if reason.len() > MAX_CONTROL_PAYLOAD - 2 {
            Err(ProtocolError::OversizedControlFrame)?;
        }

        let mut writer = self.writer.lock().await;
        if writer.state() != ConnectionState::Open {
            return Err(Error::NotOpen);
        }
        writer.send_close(Some(CloseFrame::new(code, reason))).await?;
        writer.set_state(ConnectionState::Closing);
        Ok(())
    }

    /// Sends any message variant; data messages may be split into
    /// fragments, control messages always go out as one frame.
    pub async fn send_message(&mut self, message: Message) -> Result<(), Error> {
        match message {
            Message::Text(_) | Message::Binary(_) => self.write_message(message).await,
            Message::Ping(payload) => self.send_control(OpCode::Ping, payload).await,
            Message::Pong(payload) => self.send_control(OpCode::Pong, payload).await,
            Message::Close(Some(frame)) => self.close(frame.code, &frame.reason).await,
            Message::Close(None) => self.close_connection().await,
        }
    }

    // This function will be used to send general data as a vector of bytes,
    // and by default it will be sent with a text opcode
    pub async fn send(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Text(String::from_utf8(data)?)).await
    }

    pub async fn send_as_binary(&mut self, data: Vec<u8>) -> Result<(), Error> {
        self.write_message(Message::Binary(data)).await
    }

    pub async fn send_as_text(&mut self, data: String) -> Result<(), Error> {
        self.write_message(Message::Text(data)).await
    }

    /// Sends a ping with an empty payload.
    pub async fn send_ping(&mut self) -> Result<(), Error> {
        self.send_control(OpCode::Ping, Vec::new()).await
    }

    /// Sends a large payload divided into chunks of `fragment_size` using
    /// fragmented messages and the Continue opcode.
    pub async fn send_large_data_fragmented(
        &mut self,
        data: Vec<u8>,
        fragment_size: usize,
    ) -> Result<(), Error> {
        if fragment_size == 0 {
            return Err(Error::InvalidFragmentSize);
        }
        if let Some(max_frame_size) = self.web_socket_config.max_frame_size {
            if fragment_size > max_frame_size {
                return Err(Error::CustomFragmentSizeExceeded(
                    fragment_size,
                    max_frame_size,
                ));
            }
        }
        if let Some(max_message_size) = self.web_socket_config.max_message_size {
            if data.len() > max_message_size {
                return Err(Error::MaxMessageSize);
            }
        }

        let chunks = data.chunks(fragment_size);
        let total_chunks = chunks.len();

        for (i, chunk) in chunks.enumerate() {
            let is_final = i == total_chunks - 1;
            let opcode = if i == 0 { OpCode::Text } else { OpCode::Continue };

            self.write_frames(vec![Frame::new(is_final, opcode, Vec::from(chunk))])
                .await?;
        }

        Ok(())
    }

    // Control messages are sent as a single unfragmented frame and may be
    // interleaved between the fragments of a data message
    async fn send_control(&mut self, opcode: OpCode, payload: Vec<u8>) -> Result<(), Error> {
        if payload.len() > MAX_CONTROL_PAYLOAD {
            Err(ProtocolError::OversizedControlFrame)?;
        }
        self.write_frames(vec![Frame::new(true, opcode, payload)]).await
    }

    // Splits a data message into frames: the first one carries the data
    // opcode, the rest Continue, the last one the FIN bit
    pub(crate) fn convert_to_frames(&self, message: Message) -> Vec<Frame> {
        let opcode = message.opcode();
        let payload = message.into_payload();

        if payload.is_empty() {
            return vec![Frame::new(true, opcode, payload)];
        }

        // A zero max_frame_size from the caller's config would make
        // chunks() panic; one byte per frame is the smallest legal split
        let max_frame_size = self
            .web_socket_config
            .max_frame_size
            .unwrap_or(payload.len())
            .max(1);
        let mut frames = Vec::new();

        for chunk in payload.chunks(max_frame_size) {
            frames.push(Frame::new(
                false,
                if frames.is_empty() {
                    opcode
                } else {
                    OpCode::Continue
                },
                chunk.to_vec(),
            ));
        }

        if let Some(last_frame) = frames.last_mut() {
            last_frame.final_fragment = true;
        }

        frames
    }

    pub(crate) async fn write_message(&mut self, message: Message) -> Result<(), Error> {
        if let Some(max_message_size) = self.web_socket_config.max_message_size {
            if message.as_binary().len() > max_message_size {
                return Err(Error::MaxMessageSize);
            }
        }

        let frames = self.convert_to_frames(message);
        self.write_frames(frames).await
    }

    pub(crate) async fn write_frames(&mut self, frames: Vec<Frame>) -> Result<(), Error> {
        for frame in frames {
            let frame = if frame.opcode.is_control() {
                frame
            } else {
                self.hook.process_outgoing(frame)?
            };

            // The lock is taken per frame, so a concurrently queued control
            // frame may slip between two fragments without ever splitting
            // a frame's bytes
            let mut writer = self.writer.lock().await;
            match writer.state() {
                ConnectionState::Open => {}
                _ => return Err(Error::NotOpen),
            }
            writer.write_frame(frame).await?;
        }
        Ok(())
    }
}

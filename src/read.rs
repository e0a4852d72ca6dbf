use crate::config::WebSocketConfig;
use crate::connection::ConnectionState;
use crate::decoder::FrameDecoder;
use crate::error::{Error, ProtocolError};
use crate::extensions::FrameHook;
use crate::frame::{close_code, Frame, OpCode};
use crate::message::{CloseFrame, Message};
use crate::stream::SockWaveStream;
use crate::write::Writer;
use bytes::BytesMut;
use log::{debug, warn};
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, ReadHalf};
use tokio::sync::mpsc::Sender;
use tokio::sync::Mutex;

// An in-progress fragmented data message: the opcode of the first
// fragment, the growing payload, and for text the prefix already known to
// be valid UTF-8.
struct FragmentedMessage {
    op_code: OpCode,
    fragments: Vec<u8>,
    utf8_valid_len: usize,
}

impl FragmentedMessage {
    fn new(op_code: OpCode) -> Self {
        Self {
            op_code,
            fragments: Vec::new(),
            utf8_valid_len: 0,
        }
    }

    // Appends a fragment, validating text incrementally so an invalid
    // sequence fails the connection as early as possible. A sequence cut
    // off at the fragment boundary is fine until the terminal fragment.
    fn push(&mut self, payload: &[u8], final_fragment: bool) -> Result<(), Error> {
        self.fragments.extend_from_slice(payload);

        if self.op_code == OpCode::Text {
            match std::str::from_utf8(&self.fragments[self.utf8_valid_len..]) {
                Ok(_) => self.utf8_valid_len = self.fragments.len(),
                Err(err) => {
                    if err.error_len().is_some() || final_fragment {
                        Err(err)?;
                    }
                    self.utf8_valid_len += err.valid_up_to();
                }
            }
        }

        Ok(())
    }
}

/// The reading side of a connection. Owns the read half of the transport,
/// the ingress buffer and the frame decoder; decoded frames are assembled
/// into messages and delivered through the mpsc channel the caller's
/// stream drains.
pub(crate) struct ReadStream {
    read_half: ReadHalf<SockWaveStream>,
    // Append-only ingress buffer the streaming decoder consumes from. A
    // cancelled receive leaves any partial frame here for the next call.
    buffer: BytesMut,
    decoder: FrameDecoder,
    fragmented_message: Option<FragmentedMessage>,
    read_tx: Sender<Result<Message, Error>>,
    writer: Arc<Mutex<Writer>>,
    config: WebSocketConfig,
    hook: Box<dyn FrameHook + Send>,
}

impl ReadStream {
    pub fn new(
        read_half: ReadHalf<SockWaveStream>,
        leftover: BytesMut,
        read_tx: Sender<Result<Message, Error>>,
        writer: Arc<Mutex<Writer>>,
        config: WebSocketConfig,
        hook: Box<dyn FrameHook + Send>,
    ) -> Self {
        let decoder = FrameDecoder::new(config.max_frame_size, hook.claims_rsv1());
        Self {
            read_half,
            // The handshake response may already carry the first frames
            buffer: leftover,
            decoder,
            fragmented_message: None,
            read_tx,
            writer,
            config,
            hook,
        }
    }

    /// Drives the connection until the close handshake completes or it
    /// fails. Failures are converted into a best-effort close frame and a
    /// terminal error toward the caller.
    pub async fn run(mut self) {
        match self.poll_messages().await {
            Ok(()) => {
                let mut writer = self.writer.lock().await;
                writer.set_state(ConnectionState::Closed);
            }
            Err(err) => {
                {
                    let mut writer = self.writer.lock().await;
                    if writer.state() != ConnectionState::Closed {
                        match err.close_code() {
                            // 1006 means the transport itself died, there
                            // is nothing left to write a close frame to
                            Some(code) if code != close_code::ABNORMAL => {
                                if let Err(close_err) = writer
                                    .send_close(Some(CloseFrame::new(code, "")))
                                    .await
                                {
                                    debug!("failed to send close frame: {}", close_err);
                                }
                            }
                            _ => {}
                        }
                        writer.set_state(ConnectionState::Closed);
                    }
                }
                warn!("connection failed: {}", err);
                let _ = self.read_tx.send(Err(err)).await;
            }
        }
    }

    async fn poll_messages(&mut self) -> Result<(), Error> {
        // Now in websocket mode, read frames
        loop {
            let frame = match self.read_frame().await? {
                Some(frame) => frame,
                None => {
                    // EOF at a frame boundary. Fine when we already sent a
                    // close and were only waiting for the peer; abnormal
                    // closure otherwise
                    if self.writer.lock().await.close_sent() {
                        return Ok(());
                    }
                    return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
                }
            };

            let frame = if frame.opcode.is_control() {
                frame
            } else {
                self.hook.process_incoming(frame)?
            };

            match frame.opcode {
                // A fragmented message starts with a Text or Binary opcode
                // and the FIN bit clear
                OpCode::Text | OpCode::Binary if !frame.final_fragment => {
                    if self.fragmented_message.is_some() {
                        Err(ProtocolError::FragmentedInProgress)?;
                    }
                    let mut fragmented = FragmentedMessage::new(frame.opcode);
                    fragmented.push(&frame.payload, false)?;
                    self.check_message_size(fragmented.fragments.len())?;
                    self.fragmented_message = Some(fragmented);
                }
                // From the second frame to the last, the opcode is
                // Continue; the last one carries FIN set
                OpCode::Continue => match self.fragmented_message.take() {
                    Some(mut fragmented) => {
                        fragmented.push(&frame.payload, frame.final_fragment)?;
                        self.check_message_size(fragmented.fragments.len())?;

                        if frame.final_fragment {
                            self.transmit_data_frame(Frame::new(
                                true,
                                fragmented.op_code,
                                fragmented.fragments,
                            ))
                            .await?;
                        } else {
                            self.fragmented_message = Some(fragmented);
                        }
                    }
                    None => Err(ProtocolError::InvalidContinuationFrame)?,
                },
                OpCode::Text | OpCode::Binary => {
                    // A whole data frame while a fragmented message is in
                    // progress means the peer broke the continuation chain
                    if self.fragmented_message.is_some() {
                        Err(ProtocolError::FragmentedInProgress)?;
                    }
                    self.check_message_size(frame.payload.len())?;
                    self.transmit_data_frame(frame).await?;
                }
                OpCode::Close => {
                    self.handle_close(frame.payload).await?;
                    return Ok(());
                }
                OpCode::Ping => {
                    if self.config.auto_pong {
                        self.send_pong_frame(frame.payload.clone()).await?;
                    }
                    self.transmit(Message::Ping(frame.payload)).await?;
                }
                OpCode::Pong => {
                    self.transmit(Message::Pong(frame.payload)).await?;
                }
            }
        }
    }

    // Decodes the next frame out of the ingress buffer, reading more bytes
    // from the transport whenever the decoder reports it needs them.
    // `None` means the peer shut the transport down at a frame boundary.
    async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if let Some(frame) = self.decoder.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            let bytes_read = self.read_half.read_buf(&mut self.buffer).await?;
            if bytes_read == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                // EOF in the middle of a frame
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }
    }

    /// The peer started (or answered) the closing handshake. Echo a close
    /// with the matching code unless ours is already on the wire, deliver
    /// the close to the caller and finish.
    async fn handle_close(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        let close = CloseFrame::parse(&payload)?;
        debug!("received close frame: {:?}", close);

        {
            let mut writer = self.writer.lock().await;
            writer.record_peer_close(close.clone());
            if writer.state() == ConnectionState::Open {
                writer.set_state(ConnectionState::Closing);
            }

            let echo = match &close {
                Some(frame) => CloseFrame::new(frame.code, ""),
                None => CloseFrame::new(close_code::NORMAL, ""),
            };
            if let Err(err) = writer.send_close(Some(echo)).await {
                debug!("failed to send close echo: {}", err);
            }
            writer.set_state(ConnectionState::Closed);
        }

        self.transmit(Message::Close(close)).await
    }

    async fn send_pong_frame(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        let mut writer = self.writer.lock().await;
        // After a close is on the wire no further data may follow it
        if writer.state() == ConnectionState::Open && !writer.close_sent() {
            writer.write_frame(Frame::new(true, OpCode::Pong, payload)).await?;
        }
        Ok(())
    }

    fn check_message_size(&self, size: usize) -> Result<(), Error> {
        match self.config.max_message_size {
            Some(max_message_size) if size > max_message_size => Err(Error::MaxMessageSize),
            _ => Ok(()),
        }
    }

    async fn transmit_data_frame(&mut self, frame: Frame) -> Result<(), Error> {
        // The text opcode MUST carry well-formed UTF-8; from_data_frame
        // re-validates the assembled payload before it reaches the caller
        self.transmit(Message::from_data_frame(frame)?).await
    }

    async fn transmit(&mut self, message: Message) -> Result<(), Error> {
        self.read_tx
            .send(Ok(message))
            .await
            .map_err(|_| Error::CommunicationError)
    }
}

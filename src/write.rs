use crate::connection::ConnectionState;
use crate::encoder::encode_frame;
use crate::error::Error;
use crate::frame::{Frame, OpCode};
use crate::message::CloseFrame;
use crate::stream::SockWaveStream;
use crate::utils::generate_mask_key;
use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncWriteExt, WriteHalf};

/// Owns the write half of the transport plus the connection state and the
/// close record. Everything here is mutated under one `Mutex`, which also
/// serialises frame writes: the bytes of two frames never interleave on
/// the wire, and control frames slot in between data fragments.
pub(crate) struct Writer {
    write_half: WriteHalf<SockWaveStream>,
    // Reused encode buffer, one frame at a time
    buf: BytesMut,
    state: ConnectionState,
    close_sent: bool,
    local_close: Option<CloseFrame>,
    peer_close: Option<CloseFrame>,
    // Set for the duration of a frame write. Still set on entry means the
    // previous write future was dropped between the first and last byte,
    // so the peer may have seen a truncated frame.
    in_flight: bool,
}

impl Writer {
    pub fn new(write_half: WriteHalf<SockWaveStream>) -> Self {
        Self {
            write_half,
            buf: BytesMut::new(),
            state: ConnectionState::Open,
            close_sent: false,
            local_close: None,
            peer_close: None,
            in_flight: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    pub fn close_sent(&self) -> bool {
        self.close_sent
    }

    pub fn record_peer_close(&mut self, close: Option<CloseFrame>) {
        self.peer_close = close;
    }

    pub fn peer_close(&self) -> Option<&CloseFrame> {
        self.peer_close.as_ref()
    }

    pub fn local_close(&self) -> Option<&CloseFrame> {
        self.local_close.as_ref()
    }

    /// Masks and writes a single frame. All frames sent from the client
    /// need the payload masked with a fresh key.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        if self.state == ConnectionState::Closed {
            return Err(Error::NotOpen);
        }
        if self.in_flight {
            self.state = ConnectionState::Closed;
            return Err(Error::WriteInterrupted);
        }

        let mask = generate_mask_key();
        self.buf.clear();
        encode_frame(&frame, Some(mask), &mut self.buf);

        self.in_flight = true;
        if let Err(err) = self.write_half.write_all(&self.buf).await {
            self.state = ConnectionState::Closed;
            return Err(err.into());
        }
        if let Err(err) = self.write_half.flush().await {
            self.state = ConnectionState::Closed;
            return Err(err.into());
        }
        self.in_flight = false;

        Ok(())
    }

    /// Sends a close frame once; repeated calls are no-ops so the echo path
    /// and a caller-initiated close can't both hit the wire.
    pub async fn send_close(&mut self, close: Option<CloseFrame>) -> Result<(), Error> {
        if self.close_sent {
            return Ok(());
        }
        self.close_sent = true;
        self.local_close = close.clone();

        debug!("sending close frame: {:?}", close);
        let payload = close.map(CloseFrame::into_payload).unwrap_or_default();
        self.write_frame(Frame::new(true, OpCode::Close, payload)).await
    }
}

use crate::error::{Error, ProtocolError};
use crate::frame::{Frame, OpCode, MAX_CONTROL_PAYLOAD};
use crate::utils::apply_mask;
use bytes::{Buf, BytesMut};

// Fixed header, extended length and mask key of the frame currently in
// flight, kept between decode calls while its payload is still incomplete.
#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    final_fragment: bool,
    rsv1: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: usize,
    // Total bytes the header occupies in the ingress buffer
    header_len: usize,
}

/// Restartable streaming parser over an append-only ingress buffer.
///
/// Each call to [`decode`](FrameDecoder::decode) either yields one complete
/// frame, advancing the buffer past it, or returns `Ok(None)` without
/// consuming anything. Header validation happens as soon as the header
/// bytes are available, so an oversized or malformed frame is rejected
/// before its payload is ever buffered.
pub struct FrameDecoder {
    header: Option<FrameHeader>,
    max_frame_size: Option<usize>,
    // Set when a negotiated extension claims RSV1
    allow_rsv1: bool,
    // Frames with the mask bit are rejected, servers never mask. Lifted
    // when decoding client-originated traffic (tests, loopback tooling).
    reject_masked: bool,
}

impl FrameDecoder {
    pub fn new(max_frame_size: Option<usize>, allow_rsv1: bool) -> Self {
        Self {
            header: None,
            max_frame_size,
            allow_rsv1,
            reject_masked: true,
        }
    }

    pub fn allow_masked_frames(mut self) -> Self {
        self.reject_masked = false;
        self
    }

    /// Attempts to decode one frame from `buf`. `Ok(None)` means more bytes
    /// are needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, Error> {
        let header = match self.header {
            Some(header) => header,
            None => match self.parse_header(buf)? {
                Some(header) => {
                    self.header = Some(header);
                    header
                }
                None => return Ok(None),
            },
        };

        if buf.len() < header.header_len + header.payload_len {
            return Ok(None);
        }

        buf.advance(header.header_len);
        let mut payload = buf.split_to(header.payload_len).to_vec();
        if let Some(mask) = header.mask {
            apply_mask(&mut payload, mask);
        }

        self.header = None;
        Ok(Some(Frame {
            final_fragment: header.final_fragment,
            rsv1: header.rsv1,
            opcode: header.opcode,
            payload,
        }))
    }

    // Peeks at the header without consuming it, so a cancelled read leaves
    // the buffer intact for the next attempt.
    fn parse_header(&self, buf: &BytesMut) -> Result<Option<FrameHeader>, Error> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let final_fragment = (buf[0] & 0b10000000) != 0;
        let rsv1 = (buf[0] & 0b01000000) != 0;
        let rsv2 = (buf[0] & 0b00100000) != 0;
        let rsv3 = (buf[0] & 0b00010000) != 0;

        // RSV bits are only used when an extension of the protocol claims
        // them. If these bits are received as non-zero in the absence of
        // any negotiated extension, the connection needs to fail
        if rsv2 || rsv3 || (rsv1 && !self.allow_rsv1) {
            Err(ProtocolError::ReservedBitsNotZero)?;
        }

        let opcode = OpCode::from(buf[0] & 0b00001111)?;

        // Control opcodes (ping, pong, close) can't be fragmented
        if !final_fragment && opcode.is_control() {
            Err(ProtocolError::FragmentedControlFrame)?;
        }

        let masked = (buf[1] & 0b10000000) != 0;
        if masked && self.reject_masked {
            Err(ProtocolError::MaskedFrameFromServer)?;
        }

        let length7 = (buf[1] & 0b01111111) as usize;
        if length7 > MAX_CONTROL_PAYLOAD && opcode.is_control() {
            Err(ProtocolError::OversizedControlFrame)?;
        }

        let mut offset = 2;
        let payload_len = match length7 {
            126 => {
                if buf.len() < offset + 2 {
                    return Ok(None);
                }
                let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
                offset += 2;
                length
            }
            127 => {
                if buf.len() < offset + 8 {
                    return Ok(None);
                }
                let mut be_bytes = [0u8; 8];
                be_bytes.copy_from_slice(&buf[2..10]);
                let length = u64::from_be_bytes(be_bytes);
                if length & (1 << 63) != 0 {
                    Err(ProtocolError::InvalidPayloadLength)?;
                }
                offset += 8;
                usize::try_from(length).map_err(|_| ProtocolError::InvalidPayloadLength)?
            }
            length => length,
        };

        if let Some(max_frame_size) = self.max_frame_size {
            if payload_len > max_frame_size {
                return Err(Error::MaxFrameSize);
            }
        }

        let mask = if masked {
            if buf.len() < offset + 4 {
                return Ok(None);
            }
            let mut mask = [0u8; 4];
            mask.copy_from_slice(&buf[offset..offset + 4]);
            offset += 4;
            Some(mask)
        } else {
            None
        };

        Ok(Some(FrameHeader {
            final_fragment,
            rsv1,
            opcode,
            mask,
            payload_len,
            header_len: offset,
        }))
    }
}

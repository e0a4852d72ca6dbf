use crate::frame::Frame;
use crate::utils::apply_mask;
use bytes::{BufMut, BytesMut};

/// Serialises `frame` into `dst` in the canonical RFC 6455 layout.
///
/// The first byte carries the FIN bit, the RSV bits and the opcode. The
/// second byte carries the mask bit and the 7-bit length; payloads above
/// 125 bytes spill into a 16-bit extended length, above 65535 into a
/// 64-bit one, both big-endian. When a mask key is supplied it is written
/// after the length and the payload is XOR-masked with it.
pub fn encode_frame(frame: &Frame, mask: Option<[u8; 4]>, dst: &mut BytesMut) {
    let mut first_byte = (frame.final_fragment as u8) << 7 | frame.opcode.as_u8();
    if frame.rsv1 {
        first_byte |= 0x40;
    }

    let payload_len = frame.payload.len();
    let mask_bit = if mask.is_some() { 0b1000_0000u8 } else { 0 };

    dst.reserve(14 + payload_len);
    dst.put_u8(first_byte);

    if payload_len <= 125 {
        dst.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= 65535 {
        dst.put_u8(mask_bit | 126);
        dst.put_u16(payload_len as u16);
    } else {
        dst.put_u8(mask_bit | 127);
        dst.put_u64(payload_len as u64);
    }

    match mask {
        Some(key) => {
            dst.put_slice(&key);
            let mut masked = frame.payload.clone();
            apply_mask(&mut masked, key);
            dst.put_slice(&masked);
        }
        None => dst.put_slice(&frame.payload),
    }
}

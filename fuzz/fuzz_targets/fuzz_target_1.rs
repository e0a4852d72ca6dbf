#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use sockwave::decoder::FrameDecoder;

// Feeds arbitrary ingress bytes to the streaming frame parser. The parser
// must never panic: every input either yields frames, asks for more bytes,
// or fails with a typed protocol error.
fuzz_target!(|data: &[u8]| {
    // Bulk: the whole input at once
    let mut decoder = FrameDecoder::new(Some(1 << 20), false).allow_masked_frames();
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = decoder.decode(&mut buf) {}

    // Streaming: one byte at a time must behave the same way
    let mut decoder = FrameDecoder::new(Some(1 << 20), false).allow_masked_frames();
    let mut buf = BytesMut::new();
    for byte in data {
        buf.extend_from_slice(&[*byte]);
        loop {
            match decoder.decode(&mut buf) {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }
});

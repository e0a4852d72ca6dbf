use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::random;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha1::{Digest, Sha1};

pub(crate) const UUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) fn generate_websocket_accept_value(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(UUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

pub(crate) fn generate_websocket_key() -> String {
    let random_bytes: [u8; 16] = random();
    BASE64_STANDARD.encode(random_bytes)
}

// According to Websockets RFC, all frames sent from the client need to have
// the payload masked with a fresh unpredictable key, so masks come from the
// same CSPRNG the nonce does
pub(crate) fn generate_mask_key() -> [u8; 4] {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    rng.random::<[u8; 4]>()
}

// The mask is applied using a simple bitwise XOR operation. Each byte of the
// payload is XOR'd with the corresponding byte (modulo 4) of the 4-byte mask.
// Applying it twice with the same key recovers the original data.
pub(crate) fn apply_mask(payload: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

#![no_main]

use bytes::{Buf, BytesMut};
use libfuzzer_sys::fuzz_target;
use templog_db::protocol::{decode_packet, frame, MAX_HANDSHAKE_PAYLOAD};

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);

    // Several packets may arrive in one TCP segment
    while !buf.is_empty() {
        let (packet, consumed) = match decode_packet(&buf) {
            Ok(decoded) => decoded,
            Err(_) => break,
        };

        assert!(consumed >= 4, "a packet has at least its header");
        assert!(consumed <= buf.len(), "consumed past the buffer");
        assert!(packet.payload.len() <= MAX_HANDSHAKE_PAYLOAD);
        assert_eq!(packet.sequence, buf[3], "sequence comes from the header");

        // Re-framing the payload reproduces the bytes that were consumed
        let reframed = frame(&packet.payload, packet.sequence);
        assert_eq!(&reframed[..], &buf[..consumed]);

        buf.advance(consumed);
    }
});

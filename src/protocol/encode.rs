//! Protocol message encoding

use super::constants::{capabilities, commands, MAX_PACKET_SIZE, MAX_PAYLOAD_LEN};
use super::message::{FrontendMessage, HandshakeResponse};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a frontend message into one or more framed packets.
///
/// `sequence` is the id of the first packet; continuation packets (payloads
/// of 16 MiB or more) take the following ids.
pub fn encode_message(msg: &FrontendMessage, sequence: u8) -> io::Result<BytesMut> {
    let mut payload = BytesMut::new();

    match msg {
        FrontendMessage::SslRequest {
            capabilities,
            charset,
        } => {
            encode_login_prefix(&mut payload, *capabilities, *charset);
        }
        FrontendMessage::HandshakeResponse(response) => {
            encode_handshake_response(&mut payload, response)?;
        }
        FrontendMessage::AuthResponse(data) => {
            payload.put_slice(data);
        }
        FrontendMessage::Ping => {
            payload.put_u8(commands::PING);
        }
        FrontendMessage::Quit => {
            payload.put_u8(commands::QUIT);
        }
    }

    Ok(frame(&payload, sequence))
}

/// Split a payload into physical packets (3-byte length, 1-byte sequence id).
pub fn frame(payload: &[u8], mut sequence: u8) -> BytesMut {
    let mut buf = BytesMut::with_capacity(payload.len() + 4);
    let mut chunks = payload.chunks(MAX_PAYLOAD_LEN);

    loop {
        let chunk = chunks.next().unwrap_or(&[]);
        buf.put_uint_le(chunk.len() as u64, 3);
        buf.put_u8(sequence);
        buf.put_slice(chunk);
        sequence = sequence.wrapping_add(1);

        // A full-size packet must be followed by another (possibly empty) one
        if chunk.len() < MAX_PAYLOAD_LEN {
            break;
        }
    }

    buf
}

/// Fixed 32-byte prefix shared by SSLRequest and HandshakeResponse41
fn encode_login_prefix(buf: &mut BytesMut, capabilities: u32, charset: u8) {
    buf.put_u32_le(capabilities);
    buf.put_u32_le(MAX_PACKET_SIZE);
    buf.put_u8(charset);
    buf.put_bytes(0, 23);
}

fn encode_handshake_response(buf: &mut BytesMut, response: &HandshakeResponse) -> io::Result<()> {
    let caps = response.capabilities;
    encode_login_prefix(buf, caps, response.charset);

    put_null_terminated(buf, &response.user)?;

    if caps & capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
        put_lenenc_int(buf, response.auth_response.len() as u64);
        buf.put_slice(&response.auth_response);
    } else {
        let len = u8::try_from(response.auth_response.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "auth response too long")
        })?;
        buf.put_u8(len);
        buf.put_slice(&response.auth_response);
    }

    if caps & capabilities::CLIENT_CONNECT_WITH_DB != 0 {
        put_null_terminated(buf, response.database.as_deref().unwrap_or_default())?;
    }

    if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 {
        put_null_terminated(buf, &response.auth_plugin)?;
    }

    Ok(())
}

fn put_null_terminated(buf: &mut BytesMut, value: &str) -> io::Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "string field contains NUL byte",
        ));
    }
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// Length-encoded integer
pub fn put_lenenc_int(buf: &mut BytesMut, value: u64) {
    match value {
        0..=0xFA => buf.put_u8(value as u8),
        0xFB..=0xFFFF => {
            buf.put_u8(0xFC);
            buf.put_u16_le(value as u16);
        }
        0x1_0000..=0xFF_FFFF => {
            buf.put_u8(0xFD);
            buf.put_uint_le(value, 3);
        }
        _ => {
            buf.put_u8(0xFE);
            buf.put_u64_le(value);
        }
    }
}

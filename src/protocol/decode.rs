//! Protocol message decoding

use super::constants::{capabilities, headers, MAX_PAYLOAD_LEN, PROTOCOL_VERSION};
use super::message::{BackendMessage, ErrPacket, InitialHandshake, OkPacket, Packet};
use bytes::BytesMut;
use std::io;

/// Upper bound on a reassembled payload during the handshake phase.
///
/// Handshake packets are a few hundred bytes; anything larger is rejected
/// from its header, before the body is buffered.
pub const MAX_HANDSHAKE_PAYLOAD: usize = 64 * 1024;

fn eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, what.to_string())
}

fn invalid(what: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, what.into())
}

/// Decode one connection-phase packet from the front of `data`.
///
/// Same as [`decode_packet_within`] capped at [`MAX_HANDSHAKE_PAYLOAD`].
pub fn decode_packet(data: &BytesMut) -> io::Result<(Packet, usize)> {
    decode_packet_within(data, MAX_HANDSHAKE_PAYLOAD)
}

/// Decode one logical packet of at most `max_payload` bytes.
///
/// Physical packets carrying exactly `MAX_PAYLOAD_LEN` bytes are joined with
/// their successors. The buffer is not advanced; the caller advances by the
/// returned byte count.
///
/// # Returns
/// `Ok((packet, consumed))` - Packet and number of bytes consumed
/// `Err(e)` with `UnexpectedEof` - more bytes are needed
/// `Err(e)` with `InvalidData` - the stream is corrupt or the packet is too large
pub fn decode_packet_within(data: &BytesMut, max_payload: usize) -> io::Result<(Packet, usize)> {
    let mut offset = 0;
    let mut payload = BytesMut::new();

    loop {
        if data.len() < offset + 4 {
            return Err(eof("incomplete packet header"));
        }

        let header = &data[offset..offset + 4];
        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        let sequence = header[3];

        if payload.len() + len > max_payload {
            return Err(invalid(format!(
                "packet length {} exceeds maximum allowed {}",
                payload.len() + len,
                max_payload
            )));
        }

        if data.len() < offset + 4 + len {
            return Err(eof("incomplete packet body"));
        }

        payload.extend_from_slice(&data[offset + 4..offset + 4 + len]);
        offset += 4 + len;

        if len < MAX_PAYLOAD_LEN {
            return Ok((
                Packet {
                    sequence,
                    payload: payload.freeze(),
                },
                offset,
            ));
        }
    }
}

/// Cursor over a payload with the little-endian readers the protocol needs
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> io::Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(eof(what));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> io::Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> io::Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, what: &str) -> io::Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn null_terminated(&mut self, what: &str) -> io::Result<&'a [u8]> {
        let rest = &self.data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| invalid(format!("{} is not NUL-terminated", what)))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }

    fn lenenc_int(&mut self, what: &str) -> io::Result<u64> {
        let first = self.u8(what)?;
        let value = match first {
            0x00..=0xFA => u64::from(first),
            0xFC => u64::from(self.u16(what)?),
            0xFD => {
                let b = self.take(3, what)?;
                u64::from(u32::from_le_bytes([b[0], b[1], b[2], 0]))
            }
            0xFE => {
                let b = self.take(8, what)?;
                u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            }
            other => {
                return Err(invalid(format!(
                    "invalid length-encoded integer prefix 0x{:02X} in {}",
                    other, what
                )))
            }
        };
        Ok(value)
    }

    fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }
}

/// Decode the server's initial handshake (protocol 10).
///
/// An ERR payload in place of the handshake is surfaced as
/// `Err(ErrPacket)` through [`decode_greeting`] instead.
pub fn decode_handshake(payload: &[u8]) -> io::Result<InitialHandshake> {
    let mut r = Reader::new(payload);

    let protocol_version = r.u8("protocol version")?;
    if protocol_version != PROTOCOL_VERSION {
        return Err(invalid(format!(
            "unsupported handshake protocol version {}",
            protocol_version
        )));
    }

    let server_version = String::from_utf8_lossy(r.null_terminated("server version")?).into_owned();
    let connection_id = r.u32("connection id")?;
    let mut scramble = r.take(8, "auth plugin data part 1")?.to_vec();
    r.u8("filler")?;
    let mut caps = u32::from(r.u16("capability flags")?);

    let mut charset = 0;
    let mut status_flags = 0;
    let mut auth_plugin = None;

    if r.remaining() > 0 {
        charset = r.u8("character set")?;
        status_flags = r.u16("status flags")?;
        caps |= u32::from(r.u16("upper capability flags")?) << 16;
        let auth_data_len = r.u8("auth plugin data length")? as usize;
        r.take(10, "reserved")?;

        if caps & capabilities::CLIENT_SECURE_CONNECTION != 0 {
            let part2_len = auth_data_len.saturating_sub(8).max(13);
            let part2 = r.take(part2_len, "auth plugin data part 2")?;
            // Part 2 carries a trailing NUL that is not part of the nonce
            let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
            scramble.extend_from_slice(part2);
        }

        if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 && r.remaining() > 0 {
            let rest = r.rest();
            let name = rest.strip_suffix(&[0]).unwrap_or(rest);
            auth_plugin = Some(String::from_utf8_lossy(name).into_owned());
        }
    }

    Ok(InitialHandshake {
        protocol_version,
        server_version,
        connection_id,
        scramble,
        capabilities: caps,
        charset,
        status_flags,
        auth_plugin,
    })
}

/// Decode the first packet the server sends: a handshake, or an ERR when the
/// server refuses the client outright (host blocked, too many connections).
pub fn decode_greeting(payload: &[u8]) -> io::Result<Result<InitialHandshake, ErrPacket>> {
    match payload.first() {
        Some(&headers::ERR) => Ok(Err(decode_err(payload, false)?)),
        Some(_) => Ok(Ok(decode_handshake(payload)?)),
        None => Err(eof("empty greeting")),
    }
}

/// Decode a server response during or after authentication.
pub fn decode_response(payload: &[u8]) -> io::Result<BackendMessage> {
    let header = *payload.first().ok_or_else(|| eof("empty response"))?;

    match header {
        headers::OK => Ok(BackendMessage::Ok(decode_ok(payload)?)),
        headers::ERR => Ok(BackendMessage::Err(decode_err(payload, true)?)),
        headers::AUTH_SWITCH => {
            let mut r = Reader::new(&payload[1..]);
            if r.remaining() == 0 {
                // Old-style switch to mysql_old_password
                return Err(invalid("server requested unsupported mysql_old_password"));
            }
            let plugin = String::from_utf8_lossy(r.null_terminated("plugin name")?).into_owned();
            let data = r.rest();
            let data = data.strip_suffix(&[0]).unwrap_or(data).to_vec();
            Ok(BackendMessage::AuthSwitch { plugin, data })
        }
        headers::AUTH_MORE_DATA => Ok(BackendMessage::AuthMoreData(payload[1..].to_vec())),
        other => Err(invalid(format!(
            "unexpected response header 0x{:02X}",
            other
        ))),
    }
}

fn decode_ok(payload: &[u8]) -> io::Result<OkPacket> {
    let mut r = Reader::new(&payload[1..]);
    let affected_rows = r.lenenc_int("affected rows")?;
    let last_insert_id = r.lenenc_int("last insert id")?;

    let (status_flags, warnings) = if r.remaining() >= 4 {
        (r.u16("status flags")?, r.u16("warnings")?)
    } else {
        (0, 0)
    };
    let info = String::from_utf8_lossy(r.rest()).into_owned();

    Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status_flags,
        warnings,
        info,
    })
}

fn decode_err(payload: &[u8], protocol_41: bool) -> io::Result<ErrPacket> {
    let mut r = Reader::new(&payload[1..]);
    let code = r.u16("error code")?;

    let rest = r.rest();
    let (sql_state, message) = match rest {
        [b'#', state @ ..] if protocol_41 || state.len() >= 5 => {
            if state.len() < 5 {
                return Err(eof("sql state"));
            }
            (
                String::from_utf8_lossy(&state[..5]).into_owned(),
                &state[5..],
            )
        }
        _ => ("HY000".to_string(), rest),
    };

    Ok(ErrPacket {
        code,
        sql_state,
        message: String::from_utf8_lossy(message).into_owned(),
    })
}

//! MySQL client/server protocol
//!
//! Only the connection phase and the lifecycle commands are implemented:
//! initial handshake, SSLRequest, HandshakeResponse41, authentication
//! exchanges, COM_PING and COM_QUIT.

pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use decode::{
    decode_greeting, decode_handshake, decode_packet, decode_packet_within, decode_response,
    MAX_HANDSHAKE_PAYLOAD,
};
pub use encode::{encode_message, frame};
pub use message::{
    BackendMessage, ErrPacket, FrontendMessage, HandshakeResponse, InitialHandshake, OkPacket,
    Packet,
};

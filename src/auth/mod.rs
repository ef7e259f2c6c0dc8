//! Authentication plugins for the MySQL connection phase

mod scramble;

pub use scramble::{
    clear_password, scramble_caching_sha2, scramble_native, AuthPlugin, NONCE_LEN,
};

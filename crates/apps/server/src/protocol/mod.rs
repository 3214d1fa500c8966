pub mod handshake;
pub mod messages;

pub use handshake::{decode_fingerprint, encode_fingerprint};
pub use messages::{decode_admin_list, encode_admin_list, ADMIN_LIST, REQUEST_ADMIN_SYNC};

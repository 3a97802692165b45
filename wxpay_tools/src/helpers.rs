use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;

pub type HmacSha256 = Hmac<Sha256>;

pub const HEADER_TIMESTAMP: &str = "wechatpay-timestamp";
pub const HEADER_NONCE: &str = "wechatpay-nonce";
pub const HEADER_SIGNATURE: &str = "wechatpay-signature";
pub const HEADER_SERIAL: &str = "wechatpay-serial";

/// The string the gateway signs: every component terminated by a newline.
pub fn signing_message(parts: &[&[u8]]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.len() + 1).sum();
    let mut msg = Vec::with_capacity(len);
    for part in parts {
        msg.extend_from_slice(part);
        msg.push(b'\n');
    }
    msg
}

/// Notification signing string: `timestamp\nnonce\nbody\n`
pub fn notification_message(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    signing_message(&[timestamp.as_bytes(), nonce.as_bytes(), body])
}

/// Base64 HMAC-SHA256 of `message` under `key`
pub fn sign_message(key: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key).unwrap_or_else(|_| unreachable!());
    mac.update(message);
    BASE64.encode(mac.finalize().into_bytes())
}

/// A random alphanumeric nonce of the given length
pub fn random_nonce(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm,
    Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Duration, Utc};
use hmac::Mac;
use log::*;
use sponsor_common::Secret;

use crate::{
    config::{WxPayConfig, API_V3_KEY_LENGTH},
    data_objects::{DecryptedTransaction, EncryptedResource, NotificationEnvelope},
    helpers::{
        notification_message,
        HmacSha256,
        HEADER_NONCE,
        HEADER_SERIAL,
        HEADER_SIGNATURE,
        HEADER_TIMESTAMP,
    },
    NotificationError,
};

const GCM_NONCE_LENGTH: usize = 12;

/// Checks a gateway signature over a notification signing string.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, message: &[u8], signature: &str) -> Result<(), NotificationError>;
}

/// Verifies base64 HMAC-SHA256 signatures under a shared per-serial key. The comparison is constant time.
pub struct HmacSha256Verifier {
    key: Secret<String>,
}

impl HmacSha256Verifier {
    pub fn new(key: Secret<String>) -> Self {
        Self { key }
    }
}

impl SignatureVerifier for HmacSha256Verifier {
    fn verify(&self, message: &[u8], signature: &str) -> Result<(), NotificationError> {
        let expected = BASE64.decode(signature.trim()).map_err(|_| NotificationError::InvalidSignature)?;
        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.key.reveal().as_bytes())
            .map_err(|_| NotificationError::InvalidSignature)?;
        mac.update(message);
        mac.verify_slice(&expected).map_err(|_| NotificationError::InvalidSignature)
    }
}

/// The `wechatpay-*` headers that accompany every notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationHeaders {
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub serial: Option<String>,
}

struct RequiredHeaders<'a> {
    timestamp: &'a str,
    nonce: &'a str,
    signature: &'a str,
    serial: &'a str,
}

impl NotificationHeaders {
    /// Collects the headers using a case-insensitive lookup supplied by the caller's HTTP framework.
    pub fn from_lookup<F>(lookup: F) -> Self
    where F: Fn(&str) -> Option<String> {
        Self {
            timestamp: lookup(HEADER_TIMESTAMP),
            nonce: lookup(HEADER_NONCE),
            signature: lookup(HEADER_SIGNATURE),
            serial: lookup(HEADER_SERIAL),
        }
    }

    fn require(&self) -> Result<RequiredHeaders<'_>, NotificationError> {
        fn get<'a>(v: &'a Option<String>, name: &'static str) -> Result<&'a str, NotificationError> {
            v.as_deref().filter(|s| !s.is_empty()).ok_or(NotificationError::MissingHeader(name))
        }
        Ok(RequiredHeaders {
            timestamp: get(&self.timestamp, HEADER_TIMESTAMP)?,
            nonce: get(&self.nonce, HEADER_NONCE)?,
            signature: get(&self.signature, HEADER_SIGNATURE)?,
            serial: get(&self.serial, HEADER_SERIAL)?,
        })
    }
}

/// Authenticates and decrypts inbound payment notifications.
///
/// The checks run in a fixed order, and each one must pass before the next is attempted:
/// 1. all four `wechatpay-*` headers are present,
/// 2. the gateway is configured and a verifier is registered for the claimed serial,
/// 3. the timestamp lies within the tolerance window,
/// 4. the signature over `timestamp\nnonce\nbody\n` is valid,
/// 5. the body carries a complete encrypted resource, which decrypts (AES-256-GCM) and parses.
///
/// Nothing in the body is trusted until step 4 has succeeded.
#[derive(Clone)]
pub struct NotificationVerifier {
    api_v3_key: Secret<String>,
    configured: bool,
    tolerance: Duration,
    verifiers: HashMap<String, Arc<dyn SignatureVerifier>>,
}

impl Debug for NotificationVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationVerifier")
            .field("configured", &self.configured)
            .field("tolerance", &self.tolerance)
            .field("serials", &self.verifiers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NotificationVerifier {
    /// Registers an [`HmacSha256Verifier`] for every platform key in the configuration.
    pub fn from_config(config: &WxPayConfig) -> Self {
        let verifiers = config
            .platform_keys
            .iter()
            .map(|(serial, key)| {
                let v: Arc<dyn SignatureVerifier> = Arc::new(HmacSha256Verifier::new(key.clone()));
                (serial.clone(), v)
            })
            .collect::<HashMap<_, _>>();
        debug!("🔐️ Notification verifier ready with {} platform key(s)", verifiers.len());
        Self {
            api_v3_key: config.api_v3_key.clone(),
            configured: config.is_configured(),
            tolerance: config.notify_tolerance,
            verifiers,
        }
    }

    pub fn with_verifier<V: SignatureVerifier + 'static>(mut self, serial: &str, verifier: V) -> Self {
        self.verifiers.insert(serial.to_string(), Arc::new(verifier));
        self
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn verify_and_decrypt(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
    ) -> Result<DecryptedTransaction, NotificationError> {
        self.verify_and_decrypt_at(headers, body, Utc::now())
    }

    pub fn verify_and_decrypt_at(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<DecryptedTransaction, NotificationError> {
        self.verify_signature(headers, body, now)?;
        self.decrypt_body(body)
    }

    /// Steps 1 to 4: headers, configuration, serial, timestamp window and signature.
    pub fn verify_signature(
        &self,
        headers: &NotificationHeaders,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        let h = headers.require()?;
        if !self.configured {
            error!("🔐️ A payment notification arrived, but the gateway is not configured");
            return Err(NotificationError::NotConfigured);
        }
        let verifier = self.verifiers.get(h.serial).ok_or_else(|| {
            warn!("🔐️ Notification claims unknown serial {}", h.serial);
            NotificationError::UnknownSerial(h.serial.to_string())
        })?;
        let ts = h.timestamp.trim().parse::<i64>().map_err(|_| NotificationError::StaleTimestamp)?;
        // the header is untrusted until the signature is checked, so extreme values must not overflow
        let skew = now.timestamp().checked_sub(ts).and_then(i64::checked_abs);
        if skew.map_or(true, |skew| skew > self.tolerance.num_seconds()) {
            warn!("🔐️ Notification timestamp {ts} is outside the accepted window");
            return Err(NotificationError::StaleTimestamp);
        }
        let message = notification_message(h.timestamp, h.nonce, body);
        verifier.verify(&message, h.signature).map_err(|e| {
            warn!("🔐️ Notification signature check failed for serial {}", h.serial);
            e
        })?;
        trace!("🔐️ Notification signature verified");
        Ok(())
    }

    /// Step 5. Only call this on a body whose signature has been verified.
    pub fn decrypt_body(&self, body: &[u8]) -> Result<DecryptedTransaction, NotificationError> {
        let envelope: NotificationEnvelope =
            serde_json::from_slice(body).map_err(|e| NotificationError::MalformedBody(e.to_string()))?;
        let resource =
            envelope.resource.ok_or_else(|| NotificationError::MalformedBody("resource is missing".into()))?;
        let plaintext = decrypt_resource(self.api_v3_key.reveal().as_bytes(), &resource)?;
        let tx: DecryptedTransaction =
            serde_json::from_slice(&plaintext).map_err(|e| NotificationError::MalformedPayload(e.to_string()))?;
        debug!(
            "🔐️ Decrypted notification {} for order {}: {}",
            envelope.id.as_deref().unwrap_or("-"),
            tx.out_trade_no,
            tx.trade_state
        );
        Ok(tx)
    }
}

/// AES-256-GCM decryption of a notification resource. The key is the APIv3 secret.
pub fn decrypt_resource(key: &[u8], resource: &EncryptedResource) -> Result<Vec<u8>, NotificationError> {
    let missing = |field: &str| NotificationError::MalformedBody(format!("resource.{field} is missing"));
    let ciphertext = resource.ciphertext.as_deref().ok_or_else(|| missing("ciphertext"))?;
    let associated_data = resource.associated_data.as_deref().ok_or_else(|| missing("associated_data"))?;
    let nonce = resource.nonce.as_deref().ok_or_else(|| missing("nonce"))?;
    if key.len() != API_V3_KEY_LENGTH {
        return Err(NotificationError::NotConfigured);
    }
    if nonce.len() != GCM_NONCE_LENGTH {
        return Err(NotificationError::DecryptionFailed);
    }
    let ciphertext = BASE64.decode(ciphertext).map_err(|_| NotificationError::DecryptionFailed)?;
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| NotificationError::DecryptionFailed)?;
    let payload = Payload { msg: &ciphertext, aad: associated_data.as_bytes() };
    cipher.decrypt(Nonce::from_slice(nonce.as_bytes()), payload).map_err(|_| {
        warn!("🔐️ Notification payload failed authenticated decryption");
        NotificationError::DecryptionFailed
    })
}

/// The inverse of [`decrypt_resource`]. Used to construct genuine notifications in tests and tooling.
pub fn encrypt_resource(
    key: &str,
    nonce: &str,
    associated_data: &str,
    plaintext: &[u8],
) -> Result<EncryptedResource, NotificationError> {
    if key.len() != API_V3_KEY_LENGTH {
        return Err(NotificationError::NotConfigured);
    }
    if nonce.len() != GCM_NONCE_LENGTH {
        return Err(NotificationError::DecryptionFailed);
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| NotificationError::DecryptionFailed)?;
    let payload = Payload { msg: plaintext, aad: associated_data.as_bytes() };
    let ciphertext =
        cipher.encrypt(Nonce::from_slice(nonce.as_bytes()), payload).map_err(|_| NotificationError::DecryptionFailed)?;
    Ok(EncryptedResource {
        algorithm: Some("AEAD_AES_256_GCM".into()),
        ciphertext: Some(BASE64.encode(ciphertext)),
        associated_data: Some(associated_data.into()),
        nonce: Some(nonce.into()),
        original_type: Some("transaction".into()),
    })
}

use chrono::Duration;
use log::*;
use sponsor_common::Secret;

const DEFAULT_API_BASE: &str = "https://api.mch.weixin.qq.com";
const DEFAULT_NOTIFY_TOLERANCE: Duration = Duration::minutes(5);
/// AES-256-GCM needs exactly 32 bytes of key material
pub const API_V3_KEY_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct WxPayConfig {
    /// Merchant id issued by the gateway
    pub mch_id: String,
    /// The APIv3 secret. Decrypts notification payloads and signs outbound calls.
    pub api_v3_key: Secret<String>,
    /// Serial of the merchant's own key, sent with outbound requests
    pub merchant_serial: String,
    /// Verification keys for inbound notifications, keyed by the serial the gateway claims in `wechatpay-serial`
    pub platform_keys: Vec<(String, Secret<String>)>,
    pub api_base: String,
    /// Notifications whose timestamp is further than this from the local clock are rejected
    pub notify_tolerance: Duration,
}

impl Default for WxPayConfig {
    fn default() -> Self {
        Self {
            mch_id: String::default(),
            api_v3_key: Secret::default(),
            merchant_serial: String::default(),
            platform_keys: Vec::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            notify_tolerance: DEFAULT_NOTIFY_TOLERANCE,
        }
    }
}

impl WxPayConfig {
    pub fn new_from_env_or_default() -> Self {
        let mch_id = std::env::var("SPS_WXPAY_MCH_ID").unwrap_or_else(|_| {
            warn!("🪛️ SPS_WXPAY_MCH_ID not set. Paid orders cannot be settled or refunded through the gateway.");
            String::default()
        });
        let api_v3_key = Secret::new(std::env::var("SPS_WXPAY_API_V3_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SPS_WXPAY_API_V3_KEY not set. Payment notifications will be rejected.");
            String::default()
        }));
        if !api_v3_key.is_empty() && api_v3_key.reveal().len() != API_V3_KEY_LENGTH {
            error!("🪛️ SPS_WXPAY_API_V3_KEY must be exactly {API_V3_KEY_LENGTH} bytes long. The gateway is disabled.");
        }
        let merchant_serial = std::env::var("SPS_WXPAY_SERIAL").unwrap_or_default();
        let platform_keys = std::env::var("SPS_WXPAY_PLATFORM_KEYS")
            .map(|s| parse_platform_keys(&s))
            .unwrap_or_else(|_| {
                warn!("🪛️ SPS_WXPAY_PLATFORM_KEYS not set. No notification signature can be verified.");
                Vec::new()
            });
        let api_base = std::env::var("SPS_WXPAY_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let notify_tolerance = std::env::var("SPS_WXPAY_NOTIFY_TOLERANCE_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid value for SPS_WXPAY_NOTIFY_TOLERANCE_SECS. {e}"))
                    .ok()
            })
            .map(Duration::seconds)
            .unwrap_or(DEFAULT_NOTIFY_TOLERANCE);
        Self { mch_id, api_v3_key, merchant_serial, platform_keys, api_base, notify_tolerance }
    }

    /// The gateway is usable only once a merchant id and a well-formed APIv3 key are present.
    pub fn is_configured(&self) -> bool {
        !self.mch_id.is_empty() && self.api_v3_key.reveal().len() == API_V3_KEY_LENGTH
    }
}

/// Parses `serial=key,serial=key` pairs. Malformed entries are skipped with a warning.
fn parse_platform_keys(s: &str) -> Vec<(String, Secret<String>)> {
    s.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((serial, key)) if !serial.trim().is_empty() && !key.trim().is_empty() => {
                Some((serial.trim().to_string(), Secret::new(key.trim().to_string())))
            },
            _ => {
                warn!("🪛️ Ignoring malformed entry in SPS_WXPAY_PLATFORM_KEYS");
                None
            },
        })
        .collect()
}

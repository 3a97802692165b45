use serde::{Deserialize, Serialize};

pub const TRADE_STATE_SUCCESS: &str = "SUCCESS";

//--------------------------------------   Inbound notifications   ---------------------------------------------------
/// The outer, unencrypted body of a payment notification.
///
/// All the fields are optional at this level so that missing fields are reported as a malformed body rather than a
/// generic JSON error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub id: Option<String>,
    pub event_type: Option<String>,
    pub resource_type: Option<String>,
    pub resource: Option<EncryptedResource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub algorithm: Option<String>,
    pub ciphertext: Option<String>,
    pub associated_data: Option<String>,
    pub nonce: Option<String>,
    pub original_type: Option<String>,
}

/// The decrypted transaction carried by a payment notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptedTransaction {
    /// The merchant's order number, i.e. our `order_no`
    pub out_trade_no: String,
    /// The gateway's transaction id
    pub transaction_id: String,
    pub trade_state: String,
    #[serde(default)]
    pub trade_state_desc: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub amount: Option<TransactionAmount>,
}

impl DecryptedTransaction {
    pub fn is_success(&self) -> bool {
        self.trade_state == TRADE_STATE_SUCCESS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAmount {
    /// Minor units
    pub total: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

//--------------------------------------         Refunds         ---------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub out_trade_no: String,
    pub out_refund_no: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub amount: RefundAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundAmount {
    /// Amount to refund, in minor units
    pub refund: i64,
    /// Original order total, in minor units
    pub total: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refund_id: String,
    pub out_refund_no: String,
    pub status: RefundStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Success,
    /// The gateway accepted the refund and will settle it asynchronously
    Processing,
    Closed,
    Abnormal,
}

impl RefundStatus {
    /// True when the gateway has committed to returning the money
    pub fn is_accepted(&self) -> bool {
        matches!(self, RefundStatus::Success | RefundStatus::Processing)
    }
}

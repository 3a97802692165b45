use std::sync::Arc;

use chrono::Utc;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::WxPayConfig,
    data_objects::{RefundRequest, RefundResponse},
    helpers::{random_nonce, sign_message, signing_message},
    WxPayApiError,
};

const REFUND_PATH: &str = "/v3/refund/domestic/refunds";

#[derive(Clone)]
pub struct WxPayApi {
    config: WxPayConfig,
    client: Arc<Client>,
}

impl WxPayApi {
    pub fn new(config: WxPayConfig) -> Result<Self, WxPayApiError> {
        if !config.is_configured() {
            return Err(WxPayApiError::NotConfigured);
        }
        let mut headers = HeaderMap::with_capacity(2);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| WxPayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &WxPayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    /// Builds the `Authorization` header value for a request. The signed message is
    /// `METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n`.
    pub fn authorization(&self, method: &Method, path: &str, timestamp: i64, nonce: &str, body: &str) -> String {
        let ts = timestamp.to_string();
        let message = signing_message(&[
            method.as_str().as_bytes(),
            path.as_bytes(),
            ts.as_bytes(),
            nonce.as_bytes(),
            body.as_bytes(),
        ]);
        let signature = sign_message(self.config.api_v3_key.reveal().as_bytes(), &message);
        format!(
            "WECHATPAY2-SHA256 mchid=\"{}\",nonce_str=\"{nonce}\",signature=\"{signature}\",timestamp=\"{ts}\",serial_no=\"{}\"",
            self.config.mch_id, self.config.merchant_serial
        )
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, WxPayApiError> {
        let url = self.url(path);
        let body = match body {
            Some(b) => serde_json::to_string(&b).map_err(|e| WxPayApiError::RestRequestError(e.to_string()))?,
            None => String::new(),
        };
        let auth = self.authorization(&method, path, Utc::now().timestamp(), &random_nonce(32), &body);
        let auth = HeaderValue::from_str(&auth).map_err(|e| WxPayApiError::RestRequestError(e.to_string()))?;
        trace!("🔐️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url).header(AUTHORIZATION, auth);
        if !body.is_empty() {
            req = req.body(body);
        }
        let response = req.send().await.map_err(|e| WxPayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("🔐️ REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| WxPayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| WxPayApiError::RestResponseError(e.to_string()))?;
            Err(WxPayApiError::QueryError { status, message })
        }
    }

    /// Requests a refund for a settled transaction. A successful return only means the gateway accepted the
    /// request; check [`RefundResponse::status`] for the outcome.
    pub async fn refund(&self, request: &RefundRequest) -> Result<RefundResponse, WxPayApiError> {
        debug!("🔐️ Requesting refund {} for order {}", request.out_refund_no, request.out_trade_no);
        let result = self.rest_query::<RefundResponse, &RefundRequest>(Method::POST, REFUND_PATH, Some(request)).await?;
        info!("🔐️ Refund {} for order {} is {:?}", result.out_refund_no, request.out_trade_no, result.status);
        Ok(result)
    }
}

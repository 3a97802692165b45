//! Buyer e-mails.
//!
//! The order engine publishes an event when an order is paid or refunded. The hooks in this module turn those events
//! into e-mails and hand them to a [`Mailer`]. Sending happens on the event handler's tasks, never in the request that
//! changed the order, and a failed send is logged and dropped. An order is never affected by whether its e-mail
//! arrived.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use log::*;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use sponsor_common::Secret;
use sponsor_engine::{
    db_types::{DeliveryLinks, Order},
    events::{EventHooks, OrderPaidEvent, OrderRefundedEvent},
};
use thiserror::Error;

use crate::config::MailConfig;

/// Delays before each retry of a failed send (1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, Error)]
pub enum MailError {
    #[error("Could not reach the mail provider. {0}")]
    Transport(String),
    #[error("The mail provider rejected the message. Status {status}. {message}")]
    Rejected { status: u16, message: String },
}

impl MailError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<(), MailError>;
}

/// Writes e-mails to the log instead of sending them. Used when no mail provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        info!("📧️ [not sent] To: {}. Subject: {}\n{}", message.to, message.subject, message.text);
        Ok(())
    }
}

/// Posts e-mails as JSON to a transactional mail provider's HTTP endpoint.
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Secret<String>,
    from: String,
}

#[derive(Serialize)]
struct OutboundMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: Secret<String>, from: String) -> Result<Self, MailError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self { client, endpoint, api_key, from })
    }

    async fn post(&self, message: &MailMessage) -> Result<(), MailError> {
        let body = OutboundMail { from: &self.from, to: &message.to, subject: &message.subject, text: &message.text };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.reveal())
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(MailError::Rejected { status: status.as_u16(), message })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: MailMessage) -> Result<(), MailError> {
        let mut last_error = None;
        for (attempt, delay) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay > 0 {
                debug!("📧️ Retrying e-mail to {} in {delay}s (attempt {})", message.to, attempt + 1);
                tokio::time::sleep(Duration::from_secs(*delay)).await;
            }
            match self.post(&message).await {
                Ok(()) => {
                    info!("📧️ E-mail \"{}\" sent to {}", message.subject, message.to);
                    return Ok(());
                },
                Err(e) if e.is_transient() => {
                    warn!("📧️ Could not send e-mail to {}. {e}", message.to);
                    last_error = Some(e);
                },
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| MailError::Transport("no attempt was made".into())))
    }
}

/// The provider named in the configuration, or the [`LogMailer`] if there is none.
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.endpoint {
        Some(endpoint) => match HttpMailer::new(endpoint.clone(), config.api_key.clone(), config.from.clone()) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                error!("📧️ Could not create the mail client. E-mails will only be logged. {e}");
                Arc::new(LogMailer)
            },
        },
        None => Arc::new(LogMailer),
    }
}

//----------------------------------------------   Messages  ----------------------------------------------------
fn greeting(order: &Order) -> String {
    match order.buyer_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => format!("Hi {name},"),
        None => "Hi,".to_string(),
    }
}

pub fn order_paid_message(order: &Order, delivery: &DeliveryLinks, public_url: &str) -> MailMessage {
    let mut text = format!(
        "{}\n\nThank you for your order {}. Your sponsorship is confirmed.\n\n",
        greeting(order),
        order.order_no
    );
    if let Some(url) = &delivery.figma_url {
        text.push_str(&format!("Design file: {url}\n"));
    }
    if let Some(url) = &delivery.delivery_url {
        text.push_str(&format!("Download: {url}\n"));
    }
    if let Some(token) = &order.download_token {
        let url = format!("{public_url}/api/download/{token}");
        text.push_str(&format!("\nYou can fetch these links again at any time from {url}\n"));
    }
    let subject = format!("Your order {} is confirmed", order.order_no);
    MailMessage { to: order.buyer_email.clone(), subject, text }
}

pub fn order_refunded_message(order: &Order) -> MailMessage {
    let text = format!(
        "{}\n\nYour order {} has been refunded. The amount of {} will be returned to your original payment \
         method.\n\nThe delivery links for this order are no longer available.\n",
        greeting(order),
        order.order_no,
        order.amount
    );
    let subject = format!("Your order {} has been refunded", order.order_no);
    MailMessage { to: order.buyer_email.clone(), subject, text }
}

/// Event hooks that e-mail the buyer when their order is paid or refunded
pub fn notification_hooks(mailer: Arc<dyn Mailer>, public_url: String) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_mailer = Arc::clone(&mailer);
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let mailer = Arc::clone(&paid_mailer);
        let message = order_paid_message(&ev.order, &ev.delivery, &public_url);
        Box::pin(async move {
            if let Err(e) = mailer.send(message).await {
                error!("📧️ Could not e-mail the links for order {}. {e}", ev.order.order_no);
            }
        })
    });
    hooks.on_order_refunded(move |ev: OrderRefundedEvent| {
        let mailer = Arc::clone(&mailer);
        let message = order_refunded_message(&ev.order);
        Box::pin(async move {
            if let Err(e) = mailer.send(message).await {
                error!("📧️ Could not send the refund notice for order {}. {e}", ev.order.order_no);
            }
        })
    });
    hooks
}

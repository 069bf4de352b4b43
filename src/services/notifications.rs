//! Transactional email over SMTP.
//!
//! Messages are plain text and sent on a background task so a slow or
//! broken SMTP server never holds up a request. Without SMTP settings the
//! message is logged and dropped.

use std::fmt::Write as _;
use std::sync::Arc;

use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmtpConfig;
use crate::domain::aggregates::{OrderDetail, ReturnRequest};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

/// An email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

#[derive(Clone)]
pub struct Mailer {
    smtp: Option<Arc<SmtpSender>>,
    store_name: Arc<str>,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer").field("enabled", &self.smtp.is_some()).finish()
    }
}

impl Mailer {
    /// Builds a STARTTLS transport when SMTP is configured.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: Option<&SmtpConfig>, store_name: &str) -> Result<Self, EmailError> {
        let smtp = match config {
            Some(cfg) => {
                let credentials = Credentials::new(cfg.username.clone(), cfg.password.expose_secret().to_string());
                let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
                    .port(cfg.port)
                    .credentials(credentials)
                    .build();
                Some(Arc::new(SmtpSender { transport, from_address: cfg.from_address.clone() }))
            }
            None => None,
        };
        Ok(Self { smtp, store_name: Arc::from(store_name) })
    }

    pub fn is_enabled(&self) -> bool { self.smtp.is_some() }

    /// Queues the email on a background task.
    pub fn send_later(&self, email: Email) {
        let Some(smtp) = self.smtp.clone() else {
            tracing::info!(to = %email.to, subject = %email.subject, "SMTP not configured, email skipped");
            return;
        };
        tokio::spawn(async move {
            match smtp.send(&email).await {
                Ok(()) => tracing::debug!(to = %email.to, subject = %email.subject, "Email sent"),
                Err(e) => tracing::error!(to = %email.to, subject = %email.subject, error = %e, "Email delivery failed"),
            }
        });
    }

    pub fn order_confirmation(&self, detail: &OrderDetail) -> Email {
        let order = &detail.order;
        let mut body = format!("Thank you for shopping with {}.\n\nOrder {}\n\n", self.store_name, order.order_number);
        for item in &detail.items {
            let variant = [item.size.as_deref(), item.color.as_deref()].into_iter().flatten().collect::<Vec<_>>().join(" / ");
            let _ = write!(body, "{} x {}", item.quantity, item.name);
            if !variant.is_empty() {
                let _ = write!(body, " ({variant})");
            }
            let _ = writeln!(body, "  {} {}", order.currency, item.total);
        }
        let address = &order.shipping_address.0;
        let _ = write!(
            body,
            "\nSubtotal: {cur} {}\nShipping: {cur} {}\nTotal: {cur} {}\n\nShipping to:\n{}\n{}\n{} {}\n{}, {}\n",
            order.subtotal,
            order.shipping_total,
            order.total,
            address.full_name,
            address.line1,
            address.postcode,
            address.city,
            address.state,
            address.country,
            cur = order.currency,
        );
        Email {
            to: order.email.clone(),
            subject: format!("{} order {} confirmed", self.store_name, order.order_number),
            body,
        }
    }

    pub fn return_update(&self, to: &str, order_number: &str, request: &ReturnRequest) -> Email {
        let mut body = format!(
            "Your return for order {order_number} is now {}.\n",
            request.status.as_str().replace('_', " ")
        );
        if let Some(amount) = request.refund_amount {
            let _ = writeln!(body, "Refund amount: MYR {amount}");
        }
        if let Some(notes) = request.admin_notes.as_deref().filter(|n| !n.trim().is_empty()) {
            let _ = writeln!(body, "\n{notes}");
        }
        Email { to: to.to_string(), subject: format!("{} return update for {order_number}", self.store_name), body }
    }
}

impl SmtpSender {
    async fn send(&self, email: &Email) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(self.from_address.parse().map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?)
            .to(email.to.parse().map_err(|_| EmailError::InvalidAddress(email.to.clone()))?)
            .subject(&email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{
        FulfillmentStatus, GatewayKind, Order, OrderItem, OrderStatus, PaymentStatus, ReturnStatus, ShippingAddress,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn detail() -> OrderDetail {
        let order = Order {
            id: Uuid::new_v4(), order_number: "BW240615-042137".into(), user_id: Uuid::new_v4(),
            email: "aisyah@example.com".into(), status: OrderStatus::Processing, payment_status: PaymentStatus::Paid,
            fulfillment_status: FulfillmentStatus::Unfulfilled, payment_gateway: GatewayKind::Curlec,
            payment_reference: Some("order_1".into()), subtotal: Decimal::new(19900, 2),
            shipping_total: Decimal::new(800, 2), total: Decimal::new(20700, 2), amount_paid: Decimal::new(20700, 2),
            refunded_total: Decimal::ZERO, currency: "MYR".into(),
            shipping_address: sqlx::types::Json(ShippingAddress {
                full_name: "Nur Aisyah".into(), city: "Shah Alam".into(), state: "Selangor".into(),
                postcode: "40000".into(), country: "MY".into(), ..Default::default()
            }),
            shipping_rate_id: None, shipping_method: Some("Standard".into()), tracking_number: None, notes: None,
            delivered_at: None, created_at: Utc::now(), updated_at: Utc::now(),
        };
        let item = OrderItem {
            id: Uuid::new_v4(), order_id: order.id, product_id: None, variant_id: None, name: "Baju Kurung Moden".into(),
            sku: "BKM-M-NVY".into(), size: Some("M".into()), color: Some("Navy".into()), quantity: 1,
            stocked_quantity: 1, restocked_quantity: 0, unit_price: Decimal::new(19900, 2), total: Decimal::new(19900, 2),
        };
        OrderDetail { order, items: vec![item] }
    }

    #[test]
    fn test_order_confirmation_content() {
        let mailer = Mailer::new(None, "BINWAHAB").unwrap();
        let email = mailer.order_confirmation(&detail());
        assert_eq!(email.to, "aisyah@example.com");
        assert!(email.subject.contains("BW240615-042137"));
        assert!(email.body.contains("1 x Baju Kurung Moden (M / Navy)"));
        assert!(email.body.contains("Total: MYR 207.00"));
    }

    #[test]
    fn test_return_update_mentions_refund() {
        let mailer = Mailer::new(None, "BINWAHAB").unwrap();
        let request = ReturnRequest {
            id: Uuid::new_v4(), order_id: Uuid::new_v4(), user_id: Uuid::new_v4(), status: ReturnStatus::Refunded,
            reason: "Wrong size".into(), refund_amount: Some(Decimal::new(19900, 2)), admin_notes: None,
            created_at: Utc::now(), updated_at: Utc::now(),
        };
        let email = mailer.return_update("aisyah@example.com", "BW240615-042137", &request);
        assert!(email.body.contains("now refunded"));
        assert!(email.body.contains("MYR 199.00"));
    }

    #[tokio::test]
    async fn test_disabled_mailer_skips() {
        let mailer = Mailer::new(None, "BINWAHAB").unwrap();
        assert!(!mailer.is_enabled());
        mailer.send_later(mailer.order_confirmation(&detail()));
    }
}

//! Email service for order receipts.
//!
//! Uses SMTP via lettre for delivery with Askama HTML templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;

use greencart_core::{CurrencyCode, OrderId, PaymentType, Price};

use crate::config::EmailConfig;
use crate::models::OrderView;

/// One line of a rendered receipt, amounts already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub total: String,
}

/// Everything a receipt shows.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub order_id: OrderId,
    pub customer_name: String,
    pub payment_label: &'static str,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub address_lines: Vec<String>,
    pub orders_url: String,
}

impl OrderReceipt {
    /// Build a receipt from a populated order.
    ///
    /// The subtotal is recomputed from the captured unit prices; tax is the
    /// remainder of the stored amount.
    #[must_use]
    pub fn from_view(
        order: &OrderView,
        customer_name: &str,
        currency: CurrencyCode,
        frontend_url: &str,
    ) -> Self {
        let money = |amount: Decimal| Price::new(amount, currency).to_string();

        let lines: Vec<ReceiptLine> = order
            .items
            .iter()
            .map(|line| ReceiptLine {
                name: line.product.name.clone(),
                quantity: line.quantity,
                unit_price: money(line.unit_price),
                total: money(line.unit_price * Decimal::from(line.quantity)),
            })
            .collect();

        let subtotal: Decimal = order
            .items
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();

        Self {
            order_id: order.id,
            customer_name: customer_name.to_string(),
            payment_label: match order.payment_type {
                PaymentType::Cod => "Cash on delivery",
                PaymentType::Online => "Paid online",
            },
            lines,
            subtotal: money(subtotal),
            tax: money(order.amount - subtotal),
            total: money(order.amount),
            address_lines: order.address.lines(),
            orders_url: format!("{}/my-orders", frontend_url.trim_end_matches('/')),
        }
    }

    fn subject(&self) -> String {
        format!("Your GreenCart order #{}", self.order_id)
    }
}

/// HTML template for the order receipt.
#[derive(Template)]
#[template(path = "email/order_receipt.html")]
struct OrderReceiptHtml<'a> {
    order_id: OrderId,
    customer_name: &'a str,
    payment_label: &'a str,
    lines: &'a [ReceiptLine],
    subtotal: &'a str,
    tax: &'a str,
    total: &'a str,
    address_lines: &'a [String],
    orders_url: &'a str,
}

/// Plain text template for the order receipt.
#[derive(Template)]
#[template(path = "email/order_receipt.txt")]
struct OrderReceiptText<'a> {
    order_id: OrderId,
    customer_name: &'a str,
    payment_label: &'a str,
    lines: &'a [ReceiptLine],
    subtotal: &'a str,
    tax: &'a str,
    total: &'a str,
    address_lines: &'a [String],
    orders_url: &'a str,
}

impl<'a> From<&'a OrderReceipt> for OrderReceiptHtml<'a> {
    fn from(r: &'a OrderReceipt) -> Self {
        Self {
            order_id: r.order_id,
            customer_name: &r.customer_name,
            payment_label: r.payment_label,
            lines: &r.lines,
            subtotal: &r.subtotal,
            tax: &r.tax,
            total: &r.total,
            address_lines: &r.address_lines,
            orders_url: &r.orders_url,
        }
    }
}

impl<'a> From<&'a OrderReceipt> for OrderReceiptText<'a> {
    fn from(r: &'a OrderReceipt) -> Self {
        Self {
            order_id: r.order_id,
            customer_name: &r.customer_name,
            payment_label: r.payment_label,
            lines: &r.lines,
            subtotal: &r.subtotal,
            tax: &r.tax,
            total: &r.total,
            address_lines: &r.address_lines,
            orders_url: &r.orders_url,
        }
    }
}

/// Render both bodies of a receipt as `(text, html)`.
///
/// # Errors
///
/// Returns error if a template fails to render.
pub fn render_receipt(receipt: &OrderReceipt) -> Result<(String, String), EmailError> {
    let text = OrderReceiptText::from(receipt).render()?;
    let html = OrderReceiptHtml::from(receipt).render()?;
    Ok((text, html))
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send an order receipt.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_receipt(&self, to: &str, receipt: &OrderReceipt) -> Result<(), EmailError> {
        let (text, html) = render_receipt(receipt)?;
        self.send_multipart_email(to, &receipt.subject(), &text, &html)
            .await
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

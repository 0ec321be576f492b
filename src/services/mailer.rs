// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Outbound goal emails.
//!
//! [`SmtpMailer`] sends through an SMTP relay. Without SMTP configuration the
//! server uses [`OutboxMailer`], which logs each message and keeps the most
//! recent ones in memory.

use crate::config::SmtpConfig;
use crate::error::AppError;
use crate::models::FitbitMetrics;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::collections::VecDeque;
use std::sync::Mutex;

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError>;
}

/// Goal email for one day's metrics.
///
/// Reaching the step goal gets a congratulation; otherwise the message says
/// how many steps are left.
pub fn goal_email(to: &str, name: &str, metrics: &FitbitMetrics) -> OutgoingEmail {
    let name = if name.trim().is_empty() {
        "there"
    } else {
        name.trim()
    };

    if metrics.goal_reached() {
        OutgoingEmail {
            to: to.to_string(),
            subject: "You hit your step goal today!".to_string(),
            body: format!(
                "Congratulations {}!\n\nYou walked {} steps on {} and reached your daily goal. \
                 Keep the streak going tomorrow.\n\nFitTracker",
                name, metrics.steps, metrics.date
            ),
        }
    } else {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Keep moving, you're almost there".to_string(),
            body: format!(
                "Hi {},\n\nYou have {} steps so far on {}. Only {} more steps to reach \
                 your daily goal. A short walk will get you there!\n\nFitTracker",
                name,
                metrics.steps,
                metrics.date,
                metrics.steps_remaining()
            ),
        }
    }
}

/// SMTP relay mailer.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    /// Build the transport. Port 465 uses implicit TLS; other ports STARTTLS.
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| AppError::Internal(anyhow::anyhow!("SMTP relay setup failed: {}", e)))?;

        let transport = builder.credentials(creds).port(config.port).build();

        tracing::info!(host = %config.host, port = config.port, "SMTP mailer configured");

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid sender: {}", e)))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| AppError::validation(format!("Invalid recipient: {}", e)))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Upstream(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}

const OUTBOX_CAPACITY: usize = 100;

/// Mailer that only logs, keeping the last messages for inspection.
#[derive(Default)]
pub struct OutboxMailer {
    outbox: Mutex<VecDeque<OutgoingEmail>>,
}

impl OutboxMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        tracing::info!(to = %email.to, subject = %email.subject, "Email not sent (no SMTP configured)");

        let mut outbox = self
            .outbox
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if outbox.len() == OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(email.clone());
        Ok(())
    }
}

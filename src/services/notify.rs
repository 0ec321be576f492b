// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Goal email delivery for linked Fitbit accounts.

use crate::error::AppError;
use crate::models::ExternalLinkage;
use crate::services::fitbit::FitbitService;
use crate::services::mailer::{goal_email, Mailer};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::time::Duration;

/// Outcome of a single goal email.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyOutcome {
    pub provider_user_id: String,
    pub steps: u64,
    pub goal_reached: bool,
    pub sent_to: String,
}

/// Result of a bulk notify run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyReport {
    /// Emails sent.
    pub sent: u32,
    /// Linkages without an email address.
    pub skipped: u32,
    /// Linkages whose poll or send failed.
    pub failed: u32,
    /// Provider user IDs that failed.
    pub failed_ids: Vec<String>,
}

impl NotifyReport {
    /// Returns true if no linkage failed.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

/// Poll one linked account and email its goal status.
pub async fn notify_one(
    fitbit: &FitbitService,
    mailer: &dyn Mailer,
    linkage: &ExternalLinkage,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<NotifyOutcome, AppError> {
    let to = linkage
        .email
        .as_deref()
        .ok_or_else(|| AppError::validation("No email address on file for this Fitbit account"))?;

    let metrics = fitbit.poll(&linkage.provider_user_id, day, now).await?;
    mailer
        .send(&goal_email(to, &linkage.display_name, &metrics))
        .await?;

    tracing::info!(
        provider_user_id = %linkage.provider_user_id,
        steps = metrics.steps,
        goal_reached = metrics.goal_reached(),
        "Goal email sent"
    );

    Ok(NotifyOutcome {
        provider_user_id: linkage.provider_user_id.clone(),
        steps: metrics.steps,
        goal_reached: metrics.goal_reached(),
        sent_to: to.to_string(),
    })
}

/// Email every linked account, one at a time, pausing `delay` between sends.
///
/// A failure for one account is logged and counted; the run continues.
pub async fn notify_all(
    fitbit: &FitbitService,
    mailer: &dyn Mailer,
    day: NaiveDate,
    delay: Duration,
) -> Result<NotifyReport, AppError> {
    let linkages = fitbit.all_linkages().await?;
    let mut report = NotifyReport::default();
    let mut first = true;

    tracing::info!(count = linkages.len(), day = %day, "Starting bulk goal notification");

    for linkage in &linkages {
        if linkage.email.is_none() {
            report.skipped += 1;
            continue;
        }

        if !first && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        first = false;

        match notify_one(fitbit, mailer, linkage, day, Utc::now()).await {
            Ok(_) => report.sent += 1,
            Err(e) => {
                tracing::warn!(
                    provider_user_id = %linkage.provider_user_id,
                    error = %e,
                    "Goal notification failed, continuing"
                );
                report.failed += 1;
                report.failed_ids.push(linkage.provider_user_id.clone());
            }
        }
    }

    tracing::info!(
        sent = report.sent,
        skipped = report.skipped,
        failed = report.failed,
        "Bulk goal notification finished"
    );

    Ok(report)
}

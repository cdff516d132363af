use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::models::aoi::{AoiId, ChangeType, NotificationPreferences};
use crate::models::change::ImageryDescriptor;
use crate::services::detector::{DetectorError, ThumbnailRenderer};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// What an alert says about a detected change.
#[derive(Debug, Clone)]
pub struct ChangeAlert {
    pub record_id: Uuid,
    pub aoi_id: AoiId,
    pub aoi_name: String,
    pub change_type: ChangeType,
    pub area_sq_meters: f64,
    pub before: ImageryDescriptor,
    pub after: ImageryDescriptor,
    pub preferences: NotificationPreferences,
}

/// Whether a notifier actually delivered something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Skipped,
}

/// User-facing alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: Option<&str>, alert: &ChangeAlert) -> Result<Delivery, NotifyError>;
}

/// Email alerts through SendGrid, with before/after thumbnails rendered on demand.
pub struct EmailNotifier {
    http: Client,
    api_key: Option<String>,
    sender_email: String,
    renderer: Arc<dyn ThumbnailRenderer>,
}

impl EmailNotifier {
    pub fn new(
        api_key: Option<String>,
        sender_email: String,
        renderer: Arc<dyn ThumbnailRenderer>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("aoi-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_key,
            sender_email,
            renderer,
        })
    }
}

pub fn alert_subject(aoi_name: &str) -> String {
    format!("Change Detected in your Area of Interest: {}", aoi_name)
}

pub fn alert_html(alert: &ChangeAlert, before_url: &str, after_url: &str) -> String {
    format!(
        r#"
        <h2>Alert: Significant Change Detected!</h2>
        <p>Our system has detected a significant change in your monitored Area of Interest (AOI): <strong>{name}</strong>.</p>
        <h3>Details:</h3>
        <ul>
            <li><strong>Type of Change Analyzed:</strong> {kind}</li>
            <li><strong>Area of Change:</strong> {area:.2} square meters.</li>
            <li><strong>Baseline:</strong> {b_start} to {b_end}</li>
            <li><strong>Recent:</strong> {a_start} to {a_end}</li>
        </ul>
        <p>Please log in to the dashboard to review the changes.</p>
        <h3>Visual Comparison:</h3>
        <table style="width:100%;">
        <tr>
            <td style="text-align:center;"><strong>Before</strong></td>
            <td style="text-align:center;"><strong>After</strong></td>
        </tr>
        <tr>
            <td><img src="{before_url}" alt="Before Image" style="width:100%;"></td>
            <td><img src="{after_url}" alt="After Image" style="width:100%;"></td>
        </tr>
        </table>
        "#,
        name = alert.aoi_name,
        kind = alert.change_type.describe(),
        area = alert.area_sq_meters,
        b_start = alert.before.window.start,
        b_end = alert.before.window.end,
        a_start = alert.after.window.start,
        a_end = alert.after.window.end,
        before_url = before_url,
        after_url = after_url,
    )
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipient: Option<&str>, alert: &ChangeAlert) -> Result<Delivery, NotifyError> {
        if !alert.preferences.email_alerts {
            tracing::debug!(aoi_id = %alert.aoi_id, "Email alerts disabled for AOI");
            return Ok(Delivery::Skipped);
        }

        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(aoi_id = %alert.aoi_id, "SendGrid API key not configured, skipping email");
            return Ok(Delivery::Skipped);
        };

        let recipient = recipient.ok_or(NotifyError::NoRecipient(alert.aoi_id))?;

        let before_url = self.renderer.render_thumbnail(&alert.before).await?;
        let after_url = self.renderer.render_thumbnail(&alert.after).await?;

        let body = json!({
            "personalizations": [{ "to": [{ "email": recipient }] }],
            "from": { "email": self.sender_email },
            "subject": alert_subject(&alert.aoi_name),
            "content": [{
                "type": "text/html",
                "value": alert_html(alert, &before_url, &after_url),
            }],
        });

        let response = self
            .http
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_else(|_| "(no body)".to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message: text,
            });
        }

        tracing::info!(
            aoi_id = %alert.aoi_id,
            record_id = %alert.record_id,
            status = status.as_u16(),
            "Sent change alert email"
        );

        Ok(Delivery::Sent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Email provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to render thumbnail: {0}")]
    Thumbnail(#[from] DetectorError),

    #[error("No contact address for owner of AOI {0}")]
    NoRecipient(AoiId),
}

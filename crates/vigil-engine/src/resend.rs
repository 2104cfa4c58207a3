//! Resend HTTP email transport.
//!
//! Speaks the Resend `/emails` endpoint with bearer auth. Message content is
//! plain text; anything fancier is a different transport's problem.

use std::time::Duration;

use serde_json::json;
use vigil_core::policy::{Severity, format_duration};

use crate::transport::{AlertContext, AlertTransport, TransportError};

const DEFAULT_BASE_URL: &str = "https://api.resend.com";

pub struct ResendTransport {
  client:   reqwest::Client,
  api_key:  String,
  from:     String,
  base_url: String,
}

impl ResendTransport {
  pub fn new(api_key: String, from: String) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()?;
    Ok(Self {
      client,
      api_key,
      from,
      base_url: DEFAULT_BASE_URL.to_string(),
    })
  }

  /// Point at a different endpoint (local stub servers in tests).
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  fn subject_line(alert: &AlertContext) -> String {
    let tag = match alert.severity {
      Severity::Critical => "[urgent] ",
      Severity::Elevated => "[important] ",
      Severity::Standard => "",
    };
    format!(
      "{tag}{} missed their check-in — please check on them",
      alert.display_name
    )
  }

  fn body(alert: &AlertContext) -> String {
    let mut body = format!(
      "{name} hasn't checked in and is {overdue} past their grace window.\n\
       Their check-in cadence is every {cadence} day(s).\n\n\
       Please reach out to make sure they're okay.\n",
      name = alert.display_name,
      overdue = format_duration(alert.overdue_by),
      cadence = alert.cadence_days,
    );
    if alert.streak > 0 {
      body.push_str(&format!(
        "\nThey had a {}-check-in streak, so this is unusual.\n",
        alert.streak
      ));
    }
    body
  }
}

impl AlertTransport for ResendTransport {
  async fn send(
    &self,
    recipient: &str,
    alert: &AlertContext,
  ) -> Result<(), TransportError> {
    let response = self
      .client
      .post(format!("{}/emails", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&json!({
        "from": self.from,
        "to": [recipient],
        "subject": Self::subject_line(alert),
        "text": Self::body(alert),
      }))
      .send()
      .await?;

    let status = response.status();
    if status.is_success() {
      Ok(())
    } else {
      Err(TransportError::Rejected { status: status.as_u16() })
    }
  }
}

//! OTP mail delivery.
//!
//! Delivery runs after the passcode is stored. A failed delivery surfaces
//! to the caller but never rolls the stored record back, so a later resend
//! simply overwrites it.

use crate::members::MemberProfile;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use url::Url;
use verein_auth::AuthError;

/// Delivery channel for issued passcodes.
#[async_trait]
pub trait OtpMailer: Send + Sync {
    /// Send the passcode to the member it was issued for.
    async fn send_code(
        &self,
        member: &MemberProfile,
        code: &str,
        valid_for: Duration,
    ) -> Result<(), AuthError>;
}

#[derive(Debug, Serialize)]
struct MailMessage<'a> {
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Mailer that posts to the platform's mail relay.
pub struct HttpOtpMailer {
    endpoint: Url,
    api_key: SecretString,
    http: reqwest::Client,
}

impl HttpOtpMailer {
    /// Build a relay client with bounded timeouts.
    ///
    /// # Errors
    ///
    /// Configuration error when the HTTP client cannot be constructed.
    pub fn new(endpoint: Url, api_key: SecretString) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AuthError::config(format!("mail relay client: {e}")))?;

        Ok(Self {
            endpoint,
            api_key,
            http,
        })
    }
}

#[async_trait]
impl OtpMailer for HttpOtpMailer {
    async fn send_code(
        &self,
        member: &MemberProfile,
        code: &str,
        valid_for: Duration,
    ) -> Result<(), AuthError> {
        let minutes = valid_for.as_secs() / 60;
        let message = MailMessage {
            to: &member.email,
            subject: "Dein Anmeldecode",
            text: format!(
                "Hallo {},\n\nDein Anmeldecode lautet: {code}\n\n\
                 Der Code ist {minutes} Minuten gültig.\n\n\
                 Falls du dich nicht anmelden wolltest, kannst du diese \
                 Nachricht ignorieren.",
                member.vorname
            ),
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-api-key", self.api_key.expose_secret())
            .json(&message)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::upstream(format!(
                "mail relay returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn member() -> MemberProfile {
        MemberProfile {
            id: 42,
            vorname: "Maria".to_string(),
            nachname: "Beispiel".to_string(),
            email: "maria@example.org".to_string(),
            status: "Aktivmitglied".to_string(),
            funktion: None,
        }
    }

    #[tokio::test]
    async fn test_send_posts_code_to_relay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(body_partial_json(
                serde_json::json!({ "to": "maria@example.org" }),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpOtpMailer::new(
            Url::parse(&format!("{}/send", server.uri())).unwrap(),
            SecretString::from("internal-service-key"),
        )
        .unwrap();

        mailer
            .send_code(&member(), "123456", Duration::from_secs(600))
            .await
            .unwrap();

        server.verify().await;
    }

    #[tokio::test]
    async fn test_relay_failure_is_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mailer = HttpOtpMailer::new(
            Url::parse(&format!("{}/send", server.uri())).unwrap(),
            SecretString::from("internal-service-key"),
        )
        .unwrap();

        let err = mailer
            .send_code(&member(), "123456", Duration::from_secs(600))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Upstream(_)));
    }
}

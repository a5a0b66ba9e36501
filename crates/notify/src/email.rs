//! Email channel: SendGrid, SparkPost and Mailgun over HTTP, SMTP via `lettre`.
//!
//! Subject and HTML body are both the notification text. Sender and
//! recipient come from the resolved [`Addressing`].

use herald_core::{Addressing, ChannelConfig, ChannelKind, EmailProvider, ProviderEndpoints};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;

use crate::http::{require, send_checked};
use crate::strategy::MultiProvider;
use crate::traits::{Notifier, NotifyError, Provider};

/// An email ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EmailRequest {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sends notifications as emails through the configured providers.
pub struct EmailNotifier {
    sender: MultiProvider<EmailRequest>,
    addressing: Addressing,
}

impl EmailNotifier {
    pub fn new(sender: MultiProvider<EmailRequest>, addressing: Addressing) -> Self {
        Self { sender, addressing }
    }

    /// Build the notifier and one provider per configured backend.
    pub fn from_config(
        config: &ChannelConfig<EmailProvider>,
        addressing: &Addressing,
        endpoints: &ProviderEndpoints,
        client: &reqwest::Client,
    ) -> Self {
        let providers = config
            .providers
            .iter()
            .map(|spec| build_provider(spec, endpoints, client))
            .collect();
        Self::new(
            MultiProvider::new(ChannelKind::Email, config.strategy, providers),
            addressing.clone(),
        )
    }

    fn request(&self, text: &str) -> Result<EmailRequest, NotifyError> {
        Ok(EmailRequest {
            from: require(&self.addressing.from, "NOTIFICATION_EMAIL_FROM")?.to_string(),
            to: require(&self.addressing.to, "NOTIFICATION_EMAIL_TO")?.to_string(),
            subject: text.to_string(),
            html: text.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
        let request = self.request(text)?;
        self.sender.send(&request).await
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Email
    }
}

/// Map a configured backend onto its transport.
pub fn build_provider(
    spec: &EmailProvider,
    endpoints: &ProviderEndpoints,
    client: &reqwest::Client,
) -> Box<dyn Provider<EmailRequest>> {
    match spec.clone() {
        EmailProvider::Sendgrid { api_key } => Box::new(Sendgrid {
            url: format!("{}/v3/mail/send", endpoints.sendgrid),
            api_key,
            client: client.clone(),
        }),
        EmailProvider::Ses { .. } => Box::new(Ses),
        EmailProvider::Sparkpost { api_key } => Box::new(Sparkpost {
            url: format!("{}/api/v1/transmissions", endpoints.sparkpost),
            api_key,
            client: client.clone(),
        }),
        EmailProvider::Mailgun {
            api_key,
            domain_name,
        } => Box::new(Mailgun {
            base: format!("{}/v3", endpoints.mailgun),
            api_key,
            domain_name,
            client: client.clone(),
        }),
        EmailProvider::Smtp {
            host,
            port,
            username,
            password,
        } => Box::new(Smtp {
            host,
            port,
            username,
            password,
        }),
    }
}

// ── SendGrid ──────────────────────────────────────────────────

pub struct Sendgrid {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Sendgrid {
    fn request(&self, email: &EmailRequest) -> Result<reqwest::RequestBuilder, NotifyError> {
        let api_key = require(&self.api_key, "NOTIFICATION_EMAIL_SENDGRID_API_KEY")?;
        Ok(self.client.post(&self.url).bearer_auth(api_key).json(&json!({
            "personalizations": [{ "to": [{ "email": email.to }] }],
            "from": { "email": email.from },
            "subject": email.subject,
            "content": [{ "type": "text/html", "value": email.html }],
        })))
    }
}

#[async_trait::async_trait]
impl Provider<EmailRequest> for Sendgrid {
    fn id(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, email: &EmailRequest) -> Result<(), NotifyError> {
        send_checked(self.id(), self.request(email)?).await?;
        Ok(())
    }
}

// ── SES ───────────────────────────────────────────────────────

/// SES requires SigV4 request signing, which the built-in transport does not
/// implement. Kept in the provider list so strategies can fall past it.
pub struct Ses;

#[async_trait::async_trait]
impl Provider<EmailRequest> for Ses {
    fn id(&self) -> &'static str {
        "ses"
    }

    async fn send(&self, _email: &EmailRequest) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported("ses"))
    }
}

// ── SparkPost ─────────────────────────────────────────────────

pub struct Sparkpost {
    url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl Sparkpost {
    fn request(&self, email: &EmailRequest) -> Result<reqwest::RequestBuilder, NotifyError> {
        let api_key = require(&self.api_key, "NOTIFICATION_EMAIL_SPARKPOST_API_KEY")?;
        Ok(self
            .client
            .post(&self.url)
            .header(reqwest::header::AUTHORIZATION, api_key)
            .json(&json!({
                "content": {
                    "from": email.from,
                    "subject": email.subject,
                    "html": email.html,
                },
                "recipients": [{ "address": { "email": email.to } }],
            })))
    }
}

#[async_trait::async_trait]
impl Provider<EmailRequest> for Sparkpost {
    fn id(&self) -> &'static str {
        "sparkpost"
    }

    async fn send(&self, email: &EmailRequest) -> Result<(), NotifyError> {
        send_checked(self.id(), self.request(email)?).await?;
        Ok(())
    }
}

// ── Mailgun ───────────────────────────────────────────────────

pub struct Mailgun {
    base: String,
    api_key: Option<String>,
    domain_name: Option<String>,
    client: reqwest::Client,
}

impl Mailgun {
    fn request(&self, email: &EmailRequest) -> Result<reqwest::RequestBuilder, NotifyError> {
        let api_key = require(&self.api_key, "NOTIFICATION_EMAIL_MAILGUN_API_KEY")?;
        let domain = require(&self.domain_name, "NOTIFICATION_EMAIL_MAILGUN_DOMAIN_NAME")?;
        Ok(self
            .client
            .post(format!("{}/{domain}/messages", self.base))
            .basic_auth("api", Some(api_key))
            .form(&[
                ("from", email.from.as_str()),
                ("to", email.to.as_str()),
                ("subject", email.subject.as_str()),
                ("html", email.html.as_str()),
            ]))
    }
}

#[async_trait::async_trait]
impl Provider<EmailRequest> for Mailgun {
    fn id(&self) -> &'static str {
        "mailgun"
    }

    async fn send(&self, email: &EmailRequest) -> Result<(), NotifyError> {
        send_checked(self.id(), self.request(email)?).await?;
        Ok(())
    }
}

// ── SMTP ──────────────────────────────────────────────────────

pub struct Smtp {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

impl Smtp {
    /// Port 465 uses implicit TLS, port 25 upgrades opportunistically and
    /// everything else requires STARTTLS.
    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let host = require(&self.host, "NOTIFICATION_EMAIL_SMTP_HOST")?;

        let mut builder = match self.port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(self.port),
            25 => {
                let tls = TlsParameters::new(host.to_string())
                    .map_err(|e| NotifyError::Config(e.to_string()))?;
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                    .port(self.port)
                    .tls(Tls::Opportunistic(tls))
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(self.port),
        };

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

/// Build the MIME message for an email request.
fn smtp_message(email: &EmailRequest) -> Result<Message, NotifyError> {
    let from: Mailbox = email
        .from
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;
    let to: Mailbox = email
        .to
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Config(e.to_string()))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(&email.subject)
        .header(ContentType::TEXT_HTML)
        .body(email.html.clone())
        .map_err(|e| NotifyError::Smtp(e.to_string()))
}

#[async_trait::async_trait]
impl Provider<EmailRequest> for Smtp {
    fn id(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, email: &EmailRequest) -> Result<(), NotifyError> {
        let message = smtp_message(email)?;
        self.transport()?
            .send(message)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::Strategy;

    fn email() -> EmailRequest {
        EmailRequest {
            from: "alerts@example.com".to_string(),
            to: "admin@example.com".to_string(),
            subject: "Deploy finished".to_string(),
            html: "Deploy finished".to_string(),
        }
    }

    fn sendgrid(api_key: Option<&str>) -> Sendgrid {
        Sendgrid {
            url: format!("{}/v3/mail/send", ProviderEndpoints::default().sendgrid),
            api_key: api_key.map(str::to_string),
            client: reqwest::Client::new(),
        }
    }

    fn mailgun(domain_name: Option<&str>) -> Mailgun {
        Mailgun {
            base: format!("{}/v3", ProviderEndpoints::default().mailgun),
            api_key: Some("key-1".to_string()),
            domain_name: domain_name.map(str::to_string),
            client: reqwest::Client::new(),
        }
    }

    fn body_json(request: &reqwest::Request) -> serde_json::Value {
        let bytes = request.body().and_then(|b| b.as_bytes()).unwrap();
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn sendgrid_request_shape() {
        let provider = sendgrid(Some("SG.key"));
        let request = provider.request(&email()).unwrap().build().unwrap();
        assert_eq!(request.url().as_str(), "https://api.sendgrid.com/v3/mail/send");
        assert_eq!(request.headers()["authorization"], "Bearer SG.key");
        let body = body_json(&request);
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "admin@example.com");
        assert_eq!(body["from"]["email"], "alerts@example.com");
        assert_eq!(body["content"][0]["type"], "text/html");
    }

    #[test]
    fn sendgrid_without_key_is_config_error() {
        let provider = sendgrid(None);
        let err = provider.request(&email()).unwrap_err();
        assert!(err.to_string().contains("NOTIFICATION_EMAIL_SENDGRID_API_KEY"), "got: {err}");
    }

    #[test]
    fn sparkpost_request_shape() {
        let provider = Sparkpost {
            url: format!("{}/api/v1/transmissions", ProviderEndpoints::default().sparkpost),
            api_key: Some("sp-key".to_string()),
            client: reqwest::Client::new(),
        };
        let request = provider.request(&email()).unwrap().build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.sparkpost.com/api/v1/transmissions"
        );
        assert_eq!(request.headers()["authorization"], "sp-key");
        let body = body_json(&request);
        assert_eq!(body["recipients"][0]["address"]["email"], "admin@example.com");
        assert_eq!(body["content"]["html"], "Deploy finished");
    }

    #[test]
    fn mailgun_posts_form_to_domain() {
        let provider = mailgun(Some("mg.example.com"));
        let request = provider.request(&email()).unwrap().build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://api.mailgun.net/v3/mg.example.com/messages"
        );
        let auth = request.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with("Basic "));
        let form = std::str::from_utf8(request.body().unwrap().as_bytes().unwrap()).unwrap();
        assert!(form.contains("to=admin%40example.com"), "got: {form}");
        assert!(form.contains("subject=Deploy+finished"), "got: {form}");
    }

    #[test]
    fn mailgun_without_domain_is_config_error() {
        let provider = mailgun(None);
        assert!(matches!(provider.request(&email()), Err(NotifyError::Config(_))));
    }

    #[tokio::test]
    async fn ses_is_unsupported() {
        let err = Ses.send(&email()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Unsupported("ses")));
    }

    #[test]
    fn smtp_message_builds() {
        assert!(smtp_message(&email()).is_ok());
    }

    #[test]
    fn smtp_message_rejects_bad_address() {
        let mut request = email();
        request.to = "not-an-email".to_string();
        assert!(matches!(smtp_message(&request), Err(NotifyError::Config(_))));
    }

    #[test]
    fn smtp_transport_for_each_port() {
        for port in [25, 465, 587] {
            let smtp = Smtp {
                host: Some("smtp.example.com".to_string()),
                port,
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
            };
            assert!(smtp.transport().is_ok(), "port {port}");
        }
    }

    #[test]
    fn smtp_without_host_is_config_error() {
        let smtp = Smtp {
            host: None,
            port: 587,
            username: None,
            password: None,
        };
        assert!(matches!(smtp.transport(), Err(NotifyError::Config(_))));
    }

    #[tokio::test]
    async fn missing_recipient_fails_before_any_provider() {
        let config = ChannelConfig {
            providers: vec![EmailProvider::Ses {
                region: None,
                access_key_id: None,
                secret_access_key: None,
                session_token: None,
            }],
            strategy: Strategy::Fallback,
        };
        let addressing = Addressing {
            from: Some("alerts@example.com".to_string()),
            to: None,
        };
        let notifier = EmailNotifier::from_config(
            &config,
            &addressing,
            &ProviderEndpoints::default(),
            &reqwest::Client::new(),
        );
        let err = notifier.send("hello").await.unwrap_err();
        assert!(err.to_string().contains("NOTIFICATION_EMAIL_TO"), "got: {err}");
    }

    #[test]
    fn providers_built_in_configured_order() {
        let config = ChannelConfig {
            providers: vec![
                EmailProvider::Sendgrid { api_key: None },
                EmailProvider::Smtp {
                    host: None,
                    port: 587,
                    username: None,
                    password: None,
                },
            ],
            strategy: Strategy::RoundRobin,
        };
        let notifier = EmailNotifier::from_config(
            &config,
            &Addressing::default(),
            &ProviderEndpoints::default(),
            &reqwest::Client::new(),
        );
        assert_eq!(notifier.sender.provider_ids(), vec!["sendgrid", "smtp"]);
        assert_eq!(notifier.channel(), ChannelKind::Email);
    }
}

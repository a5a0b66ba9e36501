//! SMS channel over each provider's HTTP API.

use herald_core::{Addressing, ChannelConfig, ChannelKind, ProviderEndpoints, SmsProvider};
use serde_json::json;

use crate::http::{require, send_checked};
use crate::strategy::MultiProvider;
use crate::traits::{Notifier, NotifyError, Provider};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SmsRequest {
    pub from: String,
    pub to: String,
    pub text: String,
}

pub struct SmsNotifier {
    sender: MultiProvider<SmsRequest>,
    addressing: Addressing,
}

impl SmsNotifier {
    pub fn new(sender: MultiProvider<SmsRequest>, addressing: Addressing) -> Self {
        Self { sender, addressing }
    }

    pub fn from_config(
        config: &ChannelConfig<SmsProvider>,
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
            MultiProvider::new(ChannelKind::Sms, config.strategy, providers),
            addressing.clone(),
        )
    }
}

#[async_trait::async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, text: &str) -> Result<&'static str, NotifyError> {
        let request = SmsRequest {
            from: require(&self.addressing.from, "NOTIFICATION_SMS_FROM")?.to_string(),
            to: require(&self.addressing.to, "NOTIFICATION_SMS_TO")?.to_string(),
            text: text.to_string(),
        };
        self.sender.send(&request).await
    }

    fn channel(&self) -> ChannelKind {
        ChannelKind::Sms
    }
}

/// Username/password style credentials shared by most SMS APIs.
struct BasicAuth {
    user: Option<String>,
    secret: Option<String>,
    user_var: &'static str,
    secret_var: &'static str,
}

impl BasicAuth {
    fn pair(&self) -> Result<(&str, &str), NotifyError> {
        Ok((
            require(&self.user, self.user_var)?,
            require(&self.secret, self.secret_var)?,
        ))
    }
}

/// Which wire format a provider speaks.
enum Api {
    FortySixElks(BasicAuth),
    Callr(BasicAuth),
    Clickatell { api_key: Option<String> },
    Infobip(BasicAuth),
    Nexmo(BasicAuth),
    Plivo(BasicAuth),
    Twilio(BasicAuth),
}

impl Api {
    fn base_url<'a>(&self, endpoints: &'a ProviderEndpoints) -> &'a str {
        match self {
            Api::FortySixElks(_) => &endpoints.elks,
            Api::Callr(_) => &endpoints.callr,
            Api::Clickatell { .. } => &endpoints.clickatell,
            Api::Infobip(_) => &endpoints.infobip,
            Api::Nexmo(_) => &endpoints.nexmo,
            Api::Plivo(_) => &endpoints.plivo,
            Api::Twilio(_) => &endpoints.twilio,
        }
    }
}

/// An SMS provider reachable over plain authenticated HTTP.
pub struct HttpSms {
    id: &'static str,
    api: Api,
    base: String,
    client: reqwest::Client,
}

impl HttpSms {
    fn request(&self, sms: &SmsRequest) -> Result<reqwest::RequestBuilder, NotifyError> {
        let client = &self.client;
        let base = &self.base;
        let builder = match &self.api {
            Api::FortySixElks(auth) => {
                let (user, pass) = auth.pair()?;
                client
                    .post(format!("{base}/a1/sms"))
                    .basic_auth(user, Some(pass))
                    .form(&[
                        ("from", sms.from.as_str()),
                        ("to", sms.to.as_str()),
                        ("message", sms.text.as_str()),
                    ])
            }
            Api::Callr(auth) => {
                let (login, pass) = auth.pair()?;
                client
                    .post(format!("{base}/rest/v1.1/sms"))
                    .basic_auth(login, Some(pass))
                    .json(&json!({
                        "from": sms.from,
                        "to": sms.to,
                        "body": sms.text,
                        "options": null,
                    }))
            }
            Api::Clickatell { api_key } => {
                let api_key = require(api_key, "NOTIFICATION_SMS_CLICKATELL_API_KEY")?;
                client
                    .post(format!("{base}/messages"))
                    .header(reqwest::header::AUTHORIZATION, api_key)
                    .json(&json!({
                        "from": sms.from,
                        "to": [sms.to],
                        "content": sms.text,
                    }))
            }
            Api::Infobip(auth) => {
                let (user, pass) = auth.pair()?;
                client
                    .post(format!("{base}/sms/1/text/single"))
                    .basic_auth(user, Some(pass))
                    .json(&json!({
                        "from": sms.from,
                        "to": sms.to,
                        "text": sms.text,
                    }))
            }
            Api::Nexmo(auth) => {
                let (key, secret) = auth.pair()?;
                client.post(format!("{base}/sms/json")).form(&[
                    ("api_key", key),
                    ("api_secret", secret),
                    ("from", sms.from.as_str()),
                    ("to", sms.to.as_str()),
                    ("text", sms.text.as_str()),
                ])
            }
            Api::Plivo(auth) => {
                let (auth_id, token) = auth.pair()?;
                client
                    .post(format!("{base}/v1/Account/{auth_id}/Message/"))
                    .basic_auth(auth_id, Some(token))
                    .json(&json!({
                        "src": sms.from,
                        "dst": sms.to,
                        "text": sms.text,
                    }))
            }
            Api::Twilio(auth) => {
                let (sid, token) = auth.pair()?;
                client
                    .post(format!("{base}/2010-04-01/Accounts/{sid}/Messages.json"))
                    .basic_auth(sid, Some(token))
                    .form(&[
                        ("From", sms.from.as_str()),
                        ("To", sms.to.as_str()),
                        ("Body", sms.text.as_str()),
                    ])
            }
        };
        Ok(builder)
    }
}

/// Nexmo answers 200 even for rejected messages; the per-message status
/// carries the outcome.
fn check_nexmo_response(body: &serde_json::Value) -> Result<(), NotifyError> {
    let message = &body["messages"][0];
    match message["status"].as_str() {
        Some("0") => Ok(()),
        status => Err(NotifyError::Rejected {
            provider: "nexmo",
            status: 200,
            body: format!(
                "status {}: {}",
                status.unwrap_or("missing"),
                message["error-text"].as_str().unwrap_or("unknown error")
            ),
        }),
    }
}

#[async_trait::async_trait]
impl Provider<SmsRequest> for HttpSms {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn send(&self, sms: &SmsRequest) -> Result<(), NotifyError> {
        let response = send_checked(self.id, self.request(sms)?).await?;
        if let Api::Nexmo(_) = self.api {
            let body: serde_json::Value = response.json().await?;
            check_nexmo_response(&body)?;
        }
        Ok(())
    }
}

/// OVH signs every request with its own scheme, which the built-in
/// transport does not implement.
pub struct Ovh;

#[async_trait::async_trait]
impl Provider<SmsRequest> for Ovh {
    fn id(&self) -> &'static str {
        "ovh"
    }

    async fn send(&self, _sms: &SmsRequest) -> Result<(), NotifyError> {
        Err(NotifyError::Unsupported("ovh"))
    }
}

fn basic(
    user: Option<String>,
    secret: Option<String>,
    user_var: &'static str,
    secret_var: &'static str,
) -> BasicAuth {
    BasicAuth {
        user,
        secret,
        user_var,
        secret_var,
    }
}

/// Wire format for a backend, or `None` when it has no built-in transport.
fn http_api(spec: &SmsProvider) -> Option<Api> {
    let api = match spec.clone() {
        SmsProvider::FortySixElks {
            api_username,
            api_password,
        } => Api::FortySixElks(basic(
            api_username,
            api_password,
            "NOTIFICATION_SMS_46ELKS_API_USERNAME",
            "NOTIFICATION_SMS_46ELKS_API_PASSWORD",
        )),
        SmsProvider::Callr { login, password } => Api::Callr(basic(
            login,
            password,
            "NOTIFICATION_SMS_CALLR_LOGIN",
            "NOTIFICATION_SMS_CALLR_PASSWORD",
        )),
        SmsProvider::Clickatell { api_key } => Api::Clickatell { api_key },
        SmsProvider::Infobip { username, password } => Api::Infobip(basic(
            username,
            password,
            "NOTIFICATION_SMS_INFOBIP_USERNAME",
            "NOTIFICATION_SMS_INFOBIP_PASSWORD",
        )),
        SmsProvider::Nexmo {
            api_key,
            api_secret,
        } => Api::Nexmo(basic(
            api_key,
            api_secret,
            "NOTIFICATION_SMS_NEXMO_API_KEY",
            "NOTIFICATION_SMS_NEXMO_API_SECRET",
        )),
        SmsProvider::Ovh { .. } => return None,
        SmsProvider::Plivo {
            auth_id,
            auth_token,
        } => Api::Plivo(basic(
            auth_id,
            auth_token,
            "NOTIFICATION_SMS_PLIVO_AUTH_ID",
            "NOTIFICATION_SMS_PLIVO_AUTH_TOKEN",
        )),
        SmsProvider::Twilio {
            account_sid,
            auth_token,
        } => Api::Twilio(basic(
            account_sid,
            auth_token,
            "NOTIFICATION_SMS_TWILIO_ACCOUNT_SID",
            "NOTIFICATION_SMS_TWILIO_AUTH_TOKEN",
        )),
    };
    Some(api)
}

/// Map a configured backend onto its transport.
pub fn build_provider(
    spec: &SmsProvider,
    endpoints: &ProviderEndpoints,
    client: &reqwest::Client,
) -> Box<dyn Provider<SmsRequest>> {
    match http_api(spec) {
        Some(api) => Box::new(HttpSms {
            id: spec.id(),
            base: api.base_url(endpoints).to_string(),
            api,
            client: client.clone(),
        }),
        None => Box::new(Ovh),
    }
}

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Load a specific env file. Unlike [`load_dotenv`], a missing file is an error.
pub fn load_dotenv_from(path: &Path) -> Result<(), ConfigError> {
    dotenvy::from_path(path).map_err(|e| ConfigError::Dotenv {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// A variable counts as present only when it is set to a non-empty value.
fn var_opt(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).filter(|s| !s.is_empty()).cloned()
}

fn is_set(vars: &HashMap<String, String>, key: &str) -> bool {
    var_opt(vars, key).is_some()
}

fn any_set(vars: &HashMap<String, String>, keys: &[&str]) -> bool {
    keys.iter().any(|k| is_set(vars, k))
}

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const SMTP_PORTS: [u16; 3] = [25, 465, 587];
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const LEGACY_DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
const DISCORD_WEBHOOK_URL: &str = "NOTIFICATION_DISCORD_WEBHOOK_URL";

const EMAIL_TRIGGERS: &[&str] = &[
    "NOTIFICATION_EMAIL_SENDGRID",
    "NOTIFICATION_EMAIL_SES",
    "NOTIFICATION_EMAIL_SPARKPOST",
    "NOTIFICATION_EMAIL_MAILGUN",
    "NOTIFICATION_EMAIL_SMTP",
];

const SMS_TRIGGERS: &[&str] = &[
    "NOTIFICATION_SMS_46ELKS",
    "NOTIFICATION_SMS_CALLR",
    "NOTIFICATION_SMS_CLICKATELL",
    "NOTIFICATION_SMS_INFOBIP",
    "NOTIFICATION_SMS_NEXMO",
    "NOTIFICATION_SMS_OVH",
    "NOTIFICATION_SMS_PLIVO",
    "NOTIFICATION_SMS_TWILIO",
];

// ── Channels and strategies ───────────────────────────────────

/// A notification medium, listed in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Sms,
    Slack,
    Discord,
    Telegram,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Email,
        ChannelKind::Sms,
        ChannelKind::Slack,
        ChannelKind::Discord,
        ChannelKind::Telegram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Slack => "slack",
            ChannelKind::Discord => "discord",
            ChannelKind::Telegram => "telegram",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// How a channel picks among several providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Strategy {
    /// Try providers in order until one accepts the message.
    #[serde(rename = "fallback")]
    Fallback,
    /// Rotate the first provider on every send, falling back through the rest.
    #[default]
    #[serde(rename = "roundrobin")]
    RoundRobin,
    /// Only ever try one provider.
    #[serde(rename = "no-fallback")]
    NoFallback,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fallback => "fallback",
            Strategy::RoundRobin => "roundrobin",
            Strategy::NoFallback => "no-fallback",
        }
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Strategy::Fallback),
            "roundrobin" => Ok(Strategy::RoundRobin),
            "no-fallback" => Ok(Strategy::NoFallback),
            _ => Err(ConfigError::InvalidStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Parse an SMTP port number. Any port is accepted; see [`SMTP_PORTS`] for the
/// ones relays usually listen on.
pub fn parse_smtp_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidSmtpPort(raw.to_string()))
}

// ── Providers ─────────────────────────────────────────────────

/// Email backends. Fields are copied verbatim from the environment; a missing
/// field stays `None` and is reported by the provider when it sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailProvider {
    Sendgrid {
        api_key: Option<String>,
    },
    Ses {
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        session_token: Option<String>,
    },
    Sparkpost {
        api_key: Option<String>,
    },
    Mailgun {
        api_key: Option<String>,
        domain_name: Option<String>,
    },
    Smtp {
        host: Option<String>,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
}

impl EmailProvider {
    pub fn id(&self) -> &'static str {
        match self {
            EmailProvider::Sendgrid { .. } => "sendgrid",
            EmailProvider::Ses { .. } => "ses",
            EmailProvider::Sparkpost { .. } => "sparkpost",
            EmailProvider::Mailgun { .. } => "mailgun",
            EmailProvider::Smtp { .. } => "smtp",
        }
    }
}

/// SMS backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SmsProvider {
    #[serde(rename = "46elks")]
    FortySixElks {
        api_username: Option<String>,
        api_password: Option<String>,
    },
    Callr {
        login: Option<String>,
        password: Option<String>,
    },
    Clickatell {
        api_key: Option<String>,
    },
    Infobip {
        username: Option<String>,
        password: Option<String>,
    },
    Nexmo {
        api_key: Option<String>,
        api_secret: Option<String>,
    },
    Ovh {
        app_key: Option<String>,
        app_secret: Option<String>,
        consumer_key: Option<String>,
        account: Option<String>,
        host: Option<String>,
    },
    Plivo {
        auth_id: Option<String>,
        auth_token: Option<String>,
    },
    Twilio {
        account_sid: Option<String>,
        auth_token: Option<String>,
    },
}

impl SmsProvider {
    pub fn id(&self) -> &'static str {
        match self {
            SmsProvider::FortySixElks { .. } => "46elks",
            SmsProvider::Callr { .. } => "callr",
            SmsProvider::Clickatell { .. } => "clickatell",
            SmsProvider::Infobip { .. } => "infobip",
            SmsProvider::Nexmo { .. } => "nexmo",
            SmsProvider::Ovh { .. } => "ovh",
            SmsProvider::Plivo { .. } => "plivo",
            SmsProvider::Twilio { .. } => "twilio",
        }
    }
}

/// Slack backends. Only incoming webhooks are supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SlackProvider {
    Webhook { webhook_url: Option<String> },
}

impl SlackProvider {
    pub fn id(&self) -> &'static str {
        match self {
            SlackProvider::Webhook { .. } => "webhook",
        }
    }
}

// ── Channel configs ───────────────────────────────────────────

/// Providers of one multi-provider channel plus the strategy used between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig<P> {
    pub providers: Vec<P>,
    pub strategy: Strategy,
}

/// Sender and recipient for a channel that needs them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Addressing {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_key: String,
    pub chat_id: Option<String>,
    /// Bot API base URL, without a trailing slash.
    pub api_base: String,
}

/// Base URLs of the HTTP provider APIs, without trailing slashes. Each
/// transport appends its own path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    pub sendgrid: String,
    pub sparkpost: String,
    pub mailgun: String,
    pub elks: String,
    pub callr: String,
    pub clickatell: String,
    pub infobip: String,
    pub nexmo: String,
    pub plivo: String,
    pub twilio: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            sendgrid: "https://api.sendgrid.com".to_string(),
            sparkpost: "https://api.sparkpost.com".to_string(),
            mailgun: "https://api.mailgun.net".to_string(),
            elks: "https://api.46elks.com".to_string(),
            callr: "https://api.callr.com".to_string(),
            clickatell: "https://platform.clickatell.com".to_string(),
            infobip: "https://api.infobip.com".to_string(),
            nexmo: "https://rest.nexmo.com".to_string(),
            plivo: "https://api.plivo.com".to_string(),
            twilio: "https://api.twilio.com".to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Point every provider at the same host, e.g. a local relay or mock server.
    pub fn all(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            sendgrid: base.clone(),
            sparkpost: base.clone(),
            mailgun: base.clone(),
            elks: base.clone(),
            callr: base.clone(),
            clickatell: base.clone(),
            infobip: base.clone(),
            nexmo: base.clone(),
            plivo: base.clone(),
            twilio: base,
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Everything the dispatcher needs, resolved once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub email: Option<ChannelConfig<EmailProvider>>,
    pub email_addressing: Addressing,
    pub sms: Option<ChannelConfig<SmsProvider>>,
    pub sms_addressing: Addressing,
    pub slack: Option<ChannelConfig<SlackProvider>>,
    pub discord: Option<DiscordConfig>,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    /// Snapshot of the variables the config was resolved from, used to fill
    /// `{{NAME}}` placeholders in messages.
    #[serde(skip)]
    pub variables: BTreeMap<String, String>,
}

impl NotificationConfig {
    /// Resolve from the process environment (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::resolve(&vars)
    }

    /// Resolve from an explicit variable set. Never fails: incomplete
    /// providers are kept and fail when they are asked to send.
    pub fn resolve(vars: &HashMap<String, String>) -> Self {
        let mut vars = vars.clone();
        if let Some(url) = var_opt(&vars, LEGACY_DISCORD_WEBHOOK_URL) {
            vars.insert(DISCORD_WEBHOOK_URL.to_string(), url);
        }
        let vars = &vars;

        Self {
            email: resolve_email(vars),
            email_addressing: Addressing {
                from: var_opt(vars, "NOTIFICATION_EMAIL_FROM")
                    .or_else(|| var_opt(vars, "NOTIFICATION_EMAIL")),
                to: var_opt(vars, "NOTIFICATION_EMAIL_TO")
                    .or_else(|| var_opt(vars, "NOTIFICATION_EMAIL")),
            },
            sms: resolve_sms(vars),
            sms_addressing: Addressing {
                from: var_opt(vars, "NOTIFICATION_SMS_FROM"),
                to: var_opt(vars, "NOTIFICATION_SMS_TO"),
            },
            slack: resolve_slack(vars),
            discord: var_opt(vars, DISCORD_WEBHOOK_URL)
                .map(|webhook_url| DiscordConfig { webhook_url }),
            telegram: resolve_telegram(vars),
            endpoints: ProviderEndpoints::default(),
            variables: vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        }
    }

    /// Active channels in dispatch order.
    pub fn active_channels(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|kind| self.is_active(*kind))
            .collect()
    }

    pub fn is_active(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Email => self.email.is_some(),
            ChannelKind::Sms => self.sms.is_some(),
            ChannelKind::Slack => self.slack.is_some(),
            ChannelKind::Discord => self.discord.is_some(),
            ChannelKind::Telegram => self.telegram.is_some(),
        }
    }

    /// True when no channel is configured at all.
    pub fn is_empty(&self) -> bool {
        self.active_channels().is_empty()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let active = self.active_channels();
        if active.is_empty() {
            tracing::warn!("No notification channels configured");
            return;
        }
        tracing::info!("Notification channels: {}", join(&active));
        if let Some(email) = &self.email {
            tracing::info!(
                "  email:    providers=[{}], strategy={}",
                provider_ids(&email.providers, EmailProvider::id),
                email.strategy
            );
        }
        if let Some(sms) = &self.sms {
            tracing::info!(
                "  sms:      providers=[{}], strategy={}",
                provider_ids(&sms.providers, SmsProvider::id),
                sms.strategy
            );
        }
        if let Some(slack) = &self.slack {
            tracing::info!(
                "  slack:    providers=[{}], strategy={}",
                provider_ids(&slack.providers, SlackProvider::id),
                slack.strategy
            );
        }
        if self.discord.is_some() {
            tracing::info!("  discord:  webhook");
        }
        if let Some(telegram) = &self.telegram {
            tracing::info!(
                "  telegram: chat_id={}",
                telegram.chat_id.as_deref().unwrap_or("(none)")
            );
        }
    }

    /// Return a redacted view safe to print (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        fn channel<P>(
            cfg: &Option<ChannelConfig<P>>,
            id: fn(&P) -> &'static str,
        ) -> serde_json::Value {
            match cfg {
                Some(c) => serde_json::json!({
                    "active": true,
                    "strategy": c.strategy.as_str(),
                    "providers": c.providers.iter().map(id).collect::<Vec<_>>(),
                }),
                None => serde_json::json!({ "active": false }),
            }
        }

        serde_json::json!({
            "email": channel(&self.email, EmailProvider::id),
            "email_addressing": {
                "from": self.email_addressing.from,
                "to": self.email_addressing.to,
            },
            "sms": channel(&self.sms, SmsProvider::id),
            "sms_addressing": {
                "from": self.sms_addressing.from,
                "to": self.sms_addressing.to,
            },
            "slack": channel(&self.slack, SlackProvider::id),
            "discord": { "active": self.discord.is_some() },
            "telegram": {
                "active": self.telegram.is_some(),
                "chat_id": self.telegram.as_ref().and_then(|t| t.chat_id.clone()),
            },
        })
    }
}

fn join(kinds: &[ChannelKind]) -> String {
    kinds.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

fn provider_ids<P>(providers: &[P], id: fn(&P) -> &'static str) -> String {
    providers.iter().map(id).collect::<Vec<_>>().join(", ")
}

/// Read `NOTIFICATION_<CHANNEL>_STRATEGY`, warning on values we don't know.
fn resolve_strategy(vars: &HashMap<String, String>, channel: &str) -> Strategy {
    let key = format!("NOTIFICATION_{channel}_STRATEGY");
    match var_opt(vars, &key) {
        None => Strategy::default(),
        Some(raw) => raw.parse().unwrap_or_else(|e: ConfigError| {
            tracing::warn!(var = %key, error = %e, "Falling back to roundrobin strategy");
            Strategy::default()
        }),
    }
}

fn resolve_smtp_port(vars: &HashMap<String, String>) -> u16 {
    let Some(raw) = var_opt(vars, "NOTIFICATION_EMAIL_SMTP_PORT") else {
        return DEFAULT_SMTP_PORT;
    };
    match parse_smtp_port(&raw) {
        Ok(port) => {
            if !SMTP_PORTS.contains(&port) {
                tracing::warn!(port, "Unusual SMTP port, expected one of 25, 465 or 587");
            }
            port
        }
        Err(e) => {
            tracing::warn!(error = %e, "Using default SMTP port {}", DEFAULT_SMTP_PORT);
            DEFAULT_SMTP_PORT
        }
    }
}

fn resolve_email(vars: &HashMap<String, String>) -> Option<ChannelConfig<EmailProvider>> {
    if !any_set(vars, EMAIL_TRIGGERS) {
        return None;
    }
    let v = |key: &str| var_opt(vars, &format!("NOTIFICATION_EMAIL_{key}"));

    let mut providers = Vec::new();
    if is_set(vars, "NOTIFICATION_EMAIL_SENDGRID") {
        providers.push(EmailProvider::Sendgrid {
            api_key: v("SENDGRID_API_KEY"),
        });
    }
    if is_set(vars, "NOTIFICATION_EMAIL_SES") {
        providers.push(EmailProvider::Ses {
            region: v("SES_REGION"),
            access_key_id: v("SES_ACCESS_KEY_ID"),
            secret_access_key: v("SES_SECRET_ACCESS_KEY"),
            session_token: v("SES_SESSION_TOKEN"),
        });
    }
    if is_set(vars, "NOTIFICATION_EMAIL_SPARKPOST") {
        providers.push(EmailProvider::Sparkpost {
            api_key: v("SPARKPOST_API_KEY"),
        });
    }
    if is_set(vars, "NOTIFICATION_EMAIL_MAILGUN") {
        providers.push(EmailProvider::Mailgun {
            api_key: v("MAILGUN_API_KEY"),
            domain_name: v("MAILGUN_DOMAIN_NAME"),
        });
    }
    if is_set(vars, "NOTIFICATION_EMAIL_SMTP") {
        providers.push(EmailProvider::Smtp {
            host: v("SMTP_HOST"),
            port: resolve_smtp_port(vars),
            username: v("SMTP_USERNAME"),
            password: v("SMTP_PASSWORD"),
        });
    }

    Some(ChannelConfig {
        providers,
        strategy: resolve_strategy(vars, "EMAIL"),
    })
}

fn resolve_sms(vars: &HashMap<String, String>) -> Option<ChannelConfig<SmsProvider>> {
    if !any_set(vars, SMS_TRIGGERS) {
        return None;
    }
    let v = |key: &str| var_opt(vars, &format!("NOTIFICATION_SMS_{key}"));

    let mut providers = Vec::new();
    if is_set(vars, "NOTIFICATION_SMS_46ELKS") {
        providers.push(SmsProvider::FortySixElks {
            api_username: v("46ELKS_API_USERNAME"),
            api_password: v("46ELKS_API_PASSWORD"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_CALLR") {
        providers.push(SmsProvider::Callr {
            login: v("CALLR_LOGIN"),
            password: v("CALLR_PASSWORD"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_CLICKATELL") {
        providers.push(SmsProvider::Clickatell {
            api_key: v("CLICKATELL_API_KEY"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_INFOBIP") {
        providers.push(SmsProvider::Infobip {
            username: v("INFOBIP_USERNAME"),
            password: v("INFOBIP_PASSWORD"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_NEXMO") {
        providers.push(SmsProvider::Nexmo {
            api_key: v("NEXMO_API_KEY"),
            api_secret: v("NEXMO_API_SECRET"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_OVH") {
        providers.push(SmsProvider::Ovh {
            app_key: v("OVH_APP_KEY"),
            app_secret: v("OVH_APP_SECRET"),
            consumer_key: v("OVH_CONSUMER_KEY"),
            account: v("OVH_ACCOUNT"),
            host: v("OVH_HOST"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_PLIVO") {
        providers.push(SmsProvider::Plivo {
            auth_id: v("PLIVO_AUTH_ID"),
            auth_token: v("PLIVO_AUTH_TOKEN"),
        });
    }
    if is_set(vars, "NOTIFICATION_SMS_TWILIO") {
        providers.push(SmsProvider::Twilio {
            account_sid: v("TWILIO_ACCOUNT_SID"),
            auth_token: v("TWILIO_AUTH_TOKEN"),
        });
    }

    Some(ChannelConfig {
        providers,
        strategy: resolve_strategy(vars, "SMS"),
    })
}

fn resolve_slack(vars: &HashMap<String, String>) -> Option<ChannelConfig<SlackProvider>> {
    if !is_set(vars, "NOTIFICATION_SLACK") {
        return None;
    }

    let mut providers = Vec::new();
    if any_set(vars, &["NOTIFICATION_SLACK_WEBHOOK_URL", "NOTIFICATION_SLACK_WEBHOOK"]) {
        providers.push(SlackProvider::Webhook {
            webhook_url: var_opt(vars, "NOTIFICATION_SLACK_WEBHOOK_URL"),
        });
    }

    Some(ChannelConfig {
        providers,
        strategy: resolve_strategy(vars, "SLACK"),
    })
}

fn resolve_telegram(vars: &HashMap<String, String>) -> Option<TelegramConfig> {
    if !is_set(vars, "NOTIFICATION_TELEGRAM") {
        return None;
    }
    let bot_key = var_opt(vars, "NOTIFICATION_TELEGRAM_BOT_KEY")?;
    Some(TelegramConfig {
        bot_key,
        chat_id: var_opt(vars, "NOTIFICATION_TELEGRAM_CHAT_ID"),
        api_base: TELEGRAM_API_BASE.to_string(),
    })
}

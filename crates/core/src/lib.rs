pub mod config;
pub mod error;

pub use config::{
    load_dotenv, load_dotenv_from, Addressing, ChannelConfig, ChannelKind, DiscordConfig,
    EmailProvider, NotificationConfig, ProviderEndpoints, SlackProvider, SmsProvider, Strategy,
    TelegramConfig,
};
pub use error::ConfigError;

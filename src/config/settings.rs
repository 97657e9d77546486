use std::collections::HashMap;

use serde::Deserialize;

use crate::protocol::HEADER_SIZE;

/// Top-level configuration settings for the application.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub protocol: ProtocolSettings,
    pub session: SessionSettings,
    pub scheduler: SchedulerSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the bind address and how many connections may be open at once.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
}

/// Limits applied by the packet codec to inbound frames.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProtocolSettings {
    pub max_payload_len: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub identity_cache_capacity: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub tick_millis: u64,
}

/// Static credentials, username -> password digest.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    pub users: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub protocol: Option<PartialProtocolSettings>,
    pub session: Option<PartialSessionSettings>,
    pub scheduler: Option<PartialSchedulerSettings>,
    pub auth: Option<PartialAuthSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_connections: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialProtocolSettings {
    pub max_payload_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialSessionSettings {
    pub identity_cache_capacity: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialSchedulerSettings {
    pub tick_millis: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialAuthSettings {
    pub users: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_connections: 1000,
            },
            protocol: ProtocolSettings {
                max_payload_len: 1_048_576 + 512,
            },
            session: SessionSettings {
                identity_cache_capacity: 1000,
            },
            scheduler: SchedulerSettings { tick_millis: 1000 },
            auth: AuthSettings {
                users: HashMap::from([("admin".to_string(), "password".to_string())]),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let protocol = self.protocol.unwrap_or_default();
        let session = self.session.unwrap_or_default();
        let scheduler = self.scheduler.unwrap_or_default();
        let auth = self.auth.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
                max_connections: server.max_connections.unwrap_or(defaults.server.max_connections),
            },
            protocol: ProtocolSettings {
                max_payload_len: protocol.max_payload_len.unwrap_or(defaults.protocol.max_payload_len),
            },
            session: SessionSettings {
                identity_cache_capacity: session
                    .identity_cache_capacity
                    .unwrap_or(defaults.session.identity_cache_capacity),
            },
            scheduler: SchedulerSettings {
                tick_millis: scheduler.tick_millis.unwrap_or(defaults.scheduler.tick_millis),
            },
            auth: AuthSettings {
                users: auth.users.unwrap_or(defaults.auth.users),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(defaults.logging.level),
            },
        }
    }
}

impl Settings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Largest inbound frame the transport will buffer.
    pub fn max_frame_len(&self) -> usize {
        HEADER_SIZE + self.protocol.max_payload_len
    }
}

//! Application-level configuration: predefined rooms and server settings.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dto::protocol::{ClientId, RoomId, RoomKey};

/// Where the client/room document lives unless overridden.
const DEFAULT_CONFIG_PATH: &str = "config/rooms.json";
/// Env var that points at an alternative configuration document.
const CONFIG_PATH_ENV: &str = "BUTTON_HOLD_CONFIG_PATH";

/// A client allowed on this deployment and its predefined rooms.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_id: ClientId,
    pub rooms: Vec<RoomId>,
}

/// Runtime configuration, assembled once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    clients: Vec<ClientConfig>,
    pub port: u16,
    pub auth_secret: String,
    pub debug: bool,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to the built-in
    /// client set, and pick up server settings from the environment.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let clients = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let clients: Vec<ClientConfig> =
                        raw.clients.into_iter().map(Into::into).collect();
                    info!(
                        path = %path.display(),
                        count = clients.len(),
                        "loaded client configuration"
                    );
                    clients
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    default_clients()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                default_clients()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                default_clients()
            }
        };

        let port = env::var("PORT")
            .or_else(|_| env::var("SERVER_PORT"))
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8080);
        let auth_secret = env::var("AUTH_SECRET").unwrap_or_default();
        let debug = env::var("APP_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            clients,
            port,
            auth_secret,
            debug,
        }
    }

    pub fn clients(&self) -> &[ClientConfig] {
        &self.clients
    }

    /// Whether the client may create custom rooms.
    pub fn is_client_allowed(&self, client_id: &ClientId) -> bool {
        self.clients
            .iter()
            .any(|client| client.client_id == *client_id)
    }

    /// Whether the key names a room from the startup configuration.
    pub fn is_predefined(&self, key: &RoomKey) -> bool {
        self.clients.iter().any(|client| {
            client.client_id == key.client_id && client.rooms.contains(&key.room_id)
        })
    }

    /// Every predefined room key, for startup registration.
    pub fn predefined_rooms(&self) -> impl Iterator<Item = RoomKey> + '_ {
        self.clients.iter().flat_map(|client| {
            client
                .rooms
                .iter()
                .map(|room| RoomKey::new(client.client_id.clone(), room.clone()))
        })
    }
}

#[cfg(test)]
impl AppConfig {
    /// Built-in clients with a fixed secret, for tests across the crate.
    pub(crate) fn for_tests() -> Self {
        Self {
            clients: default_clients(),
            port: 0,
            auth_secret: "test-secret".into(),
            debug: false,
        }
    }
}

#[derive(Debug, Deserialize)]
/// On-disk JSON shape of the configuration document.
struct RawConfig {
    clients: Vec<RawClient>,
}

#[derive(Debug, Deserialize)]
struct RawClient {
    #[serde(rename = "clientId")]
    client_id: String,
    rooms: Vec<String>,
}

impl From<RawClient> for ClientConfig {
    fn from(value: RawClient) -> Self {
        Self {
            client_id: ClientId(value.client_id),
            rooms: value.rooms.into_iter().map(RoomId).collect(),
        }
    }
}

/// The env-var override wins over the default on-disk location.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Fallback client set used when no config document is present.
fn default_clients() -> Vec<ClientConfig> {
    vec![ClientConfig {
        client_id: ClientId("demo".into()),
        rooms: ["peace", "love", "fortune", "prestige"]
            .into_iter()
            .map(|room| RoomId(room.into()))
            .collect(),
    }]
}

//! Wire-level types shared between the session engine and its clients.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Opaque client identifier (at most 36 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ClientId(pub String);

/// Opaque room identifier (at most 36 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct RoomId(pub String);

/// Opaque user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Opaque small string (e.g. a display handle) attached to a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct UserPayload(pub String);

impl UserPayload {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

macro_rules! impl_display_for_ids {
    ($($ty:ty),*) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_owned())
                }
            }
        )*
    };
}

impl_display_for_ids!(ClientId, RoomId, UserId, UserPayload);

/// Identity of a room within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub client_id: ClientId,
    pub room_id: RoomId,
}

impl RoomKey {
    pub fn new(client_id: ClientId, room_id: RoomId) -> Self {
        Self { client_id, room_id }
    }
}

impl std::fmt::Display for RoomKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.client_id, self.room_id)
    }
}

/// Supported user locales; unknown tags fall back to English.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserLocale {
    #[default]
    En,
    Ru,
}

impl UserLocale {
    /// Parse a language tag leniently, defaulting to [`UserLocale::En`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ru" => UserLocale::Ru,
            _ => UserLocale::En,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserLocale::En => "en",
            UserLocale::Ru => "ru",
        }
    }
}

/// The three phases of the button state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ButtonPhase {
    Push,
    Hold,
    Release,
}

/// Envelope discriminator for outbound messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(into = "u8", try_from = "u8")]
pub enum GameState {
    Update,
    Record,
    Error,
}

impl From<GameState> for u8 {
    fn from(value: GameState) -> Self {
        match value {
            GameState::Update => 0,
            GameState::Record => 1,
            GameState::Error => 99,
        }
    }
}

impl TryFrom<u8> for GameState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            0 => Ok(GameState::Update),
            1 => Ok(GameState::Record),
            99 => Ok(GameState::Error),
            other => Err(format!("unknown game state tag {other}")),
        }
    }
}

/// A chat line authored by a player; the engine stamps `userID` on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub message: String,
}

/// The state of one live hold, both as read from and as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameplayContext {
    #[serde(rename = "buttonPhase")]
    pub button_phase: ButtonPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatMessage>,
    /// Push instant, seconds since epoch; set once at push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Hold duration in seconds as computed server-side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl GameplayContext {
    /// Fresh context for a hold that starts now.
    pub fn opened(now: i64) -> Self {
        Self {
            button_phase: ButtonPhase::Push,
            chat: None,
            timestamp: Some(now),
            duration: Some(0),
        }
    }
}

/// Immutable record of a completed hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameplayRecord {
    /// End of the hold, seconds since epoch (`push timestamp + duration`).
    pub timestamp: i64,
    pub duration: i64,
}

impl GameplayRecord {
    /// Build the record committed at session close from the final context.
    pub fn from_context(ctx: &GameplayContext) -> Self {
        let timestamp = ctx.timestamp.unwrap_or_default();
        let duration = ctx.duration.unwrap_or_default();
        Self {
            timestamp: timestamp + duration,
            duration,
        }
    }
}

/// Error payload carried inside an [`GameState::Error`] envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameplayError {
    pub message: String,
}

/// Room summary returned by the stats endpoint and folded into updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameRoomStats {
    #[serde(
        rename = "countActive",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub count_active: Option<i64>,
    #[serde(
        rename = "countLeaderboard",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub count_leaderboard: Option<i64>,
    #[serde(
        rename = "bestOverallDuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub best_overall_duration: Option<i64>,
    #[serde(
        rename = "bestTodaysDuration",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub best_todays_duration: Option<i64>,
    #[serde(
        rename = "bestUsersPayloads",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub best_users_payloads: Option<Vec<UserPayload>>,
}

/// Single outbound envelope shared by update, record, and error frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GameplayMessage {
    #[serde(rename = "gameState", default)]
    pub game_state: Option<GameState>,
    #[serde(flatten)]
    pub stats: GameRoomStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<GameplayContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<GameplayRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GameplayError>,
    /// Localized flavor text shown to the player during long holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "placeActive",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub place_active: Option<i64>,
    #[serde(
        rename = "placeLeaderboard",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub place_leaderboard: Option<i64>,
    #[serde(
        rename = "worldRecord",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub world_record: Option<bool>,
}

impl GameplayMessage {
    /// Shape an update frame around the current context.
    pub fn update(
        context: GameplayContext,
        flavor: Option<String>,
        chat: Option<ChatMessage>,
        place_active: Option<i64>,
        count_active: Option<i64>,
    ) -> Self {
        Self {
            game_state: Some(GameState::Update),
            context: Some(context),
            chat,
            message: flavor,
            place_active,
            stats: GameRoomStats {
                count_active,
                ..GameRoomStats::default()
            },
            ..Self::default()
        }
    }

    /// Shape the terminal record frame emitted at session close.
    pub fn record(
        record: GameplayRecord,
        place_leaderboard: Option<i64>,
        count_leaderboard: Option<i64>,
        world_record: Option<bool>,
    ) -> Self {
        Self {
            game_state: Some(GameState::Record),
            record: Some(record),
            place_leaderboard,
            world_record,
            stats: GameRoomStats {
                count_leaderboard,
                ..GameRoomStats::default()
            },
            ..Self::default()
        }
    }

    /// Shape an error frame carrying a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            game_state: Some(GameState::Error),
            error: Some(GameplayError {
                message: message.into(),
            }),
            ..Self::default()
        }
    }
}

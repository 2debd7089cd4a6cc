//! The per-player session engine: a button state machine driven by client
//! updates, with anti-cheat validation and dual-store bookkeeping.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::{
    dto::protocol::{
        ButtonPhase, ChatMessage, GameplayContext, GameplayMessage, GameplayRecord, UserId,
        UserLocale, UserPayload,
    },
    error::GameError,
    state::room::GameRoom,
};

/// Longest tolerated silence (seconds) before a new flavor message, indexed
/// by the hold-duration interval the player is currently in.
const MESSAGE_UPDATE_FREQUENCIES: [i64; 10] = [5, 10, 30, 60, 90, 120, 160, 180, 240, 320];
/// Upper bounds of the hold-duration intervals for the table above.
const MESSAGE_UPDATE_TIME_INTERVALS: [i64; 10] =
    [30, 60, 120, 240, 460, 780, 1280, 3240, 5760, 10240];

/// Transport failures as seen by the session engine.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection closed")]
    Closed,
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// One frame-oriented bidirectional connection to a player.
///
/// The engine owns its wire exclusively, so tests can drive a session with a
/// scripted wire the same way the storage traits admit in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait SessionWire: Send {
    /// Next client update; any failure is fatal to the session.
    async fn read_context(&mut self) -> Result<GameplayContext, WireError>;

    /// Push an outbound frame to the player.
    async fn write_message(&mut self, msg: &GameplayMessage) -> Result<(), WireError>;
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// A live hold for one user in one room.
pub struct GameSession<W> {
    room: Arc<GameRoom>,
    user_id: UserId,
    payload: UserPayload,
    locale: UserLocale,
    wire: W,
    last_message_time: i64,
}

impl<W: SessionWire> GameSession<W> {
    pub fn new(
        room: Arc<GameRoom>,
        user_id: UserId,
        payload: UserPayload,
        locale: UserLocale,
        wire: W,
    ) -> Self {
        Self {
            room,
            user_id,
            payload,
            locale,
            wire,
            last_message_time: unix_now(),
        }
    }

    /// Drive the session from push to release (or failure) and clean up.
    ///
    /// Returns the session's exit status: `None` for a clean run, otherwise
    /// every accumulated error joined into one.
    pub async fn maintain(mut self) -> Option<GameError> {
        let now = unix_now();
        let mut ctx = match self.register_at(now).await {
            Ok(ctx) => ctx,
            Err(err) => {
                // Nothing was registered, so there is nothing to clean up.
                let mut errors = vec![err];
                let frame = GameplayMessage::error(errors[0].to_string());
                if self.wire.write_message(&frame).await.is_err() {
                    errors.push(GameError::WriteFailed);
                }
                return GameError::join(errors);
            }
        };

        let mut errors = Vec::new();
        match self.send_update(now, ctx.clone(), None).await {
            Err(err) => errors.push(err),
            Ok(()) => loop {
                let inbound = match self.wire.read_context().await {
                    Ok(inbound) => inbound,
                    Err(_) => {
                        errors.push(GameError::ReadFailed);
                        break;
                    }
                };

                match self.update_at(unix_now(), &ctx, inbound).await {
                    Ok(next) => {
                        let released = next.button_phase == ButtonPhase::Release;
                        ctx = next;
                        if released || self.room.is_closed() {
                            break;
                        }
                    }
                    Err(err) => {
                        errors.push(err);
                        break;
                    }
                }
            },
        }

        self.close_at(unix_now(), ctx, errors).await
    }

    /// Claim the user's slot and register the fresh hold with the stores.
    ///
    /// On any failure the claim is released, so a failed start leaves no
    /// trace; once this returns `Ok` the close path owns the cleanup.
    async fn register_at(&mut self, now: i64) -> Result<GameplayContext, GameError> {
        if !self.room.try_claim_session(&self.user_id).await {
            return Err(GameError::SessionExists);
        }

        let key = self.room.key().clone();
        let registered: Result<(), GameError> = async {
            self.room
                .active_store()
                .set_liveness(key.clone(), self.user_id.clone(), 0, now)
                .await?;
            if !self.payload.is_empty() {
                self.room
                    .active_store()
                    .add_payload(key.clone(), self.user_id.clone(), self.payload.clone())
                    .await?;
            }
            self.room
                .chat_stream()
                .add_consumer(key, self.user_id.clone())
                .await?;
            Ok(())
        }
        .await;

        if let Err(err) = registered {
            self.room.release_session(&self.user_id).await;
            return Err(err);
        }

        Ok(GameplayContext::opened(now))
    }

    /// Validate one client update against the server's view of the hold.
    fn validate(
        prev: &GameplayContext,
        server_duration: i64,
        inbound: &GameplayContext,
    ) -> Result<(), GameError> {
        let push_timestamp = prev.timestamp.unwrap_or_default();

        if let Some(client_timestamp) = inbound.timestamp {
            if client_timestamp != push_timestamp {
                return Err(GameError::InvalidPushTimestamp {
                    expected: push_timestamp,
                    got: client_timestamp,
                });
            }
        }

        // Clients may over-report (their clock ran ahead); the server value
        // wins either way. Under-reporting is a replay or a rewind.
        if let Some(client_duration) = inbound.duration {
            if client_duration < server_duration {
                return Err(GameError::InvalidHoldDuration {
                    server: server_duration,
                    client: client_duration,
                });
            }
        }

        if matches!(prev.button_phase, ButtonPhase::Push | ButtonPhase::Hold)
            && inbound.button_phase == ButtonPhase::Push
        {
            return Err(GameError::InvalidButtonPhase);
        }

        Ok(())
    }

    /// Fold a client update into the session: validate, exchange chat,
    /// refresh liveness, and emit the next update frame.
    async fn update_at(
        &mut self,
        now: i64,
        prev: &GameplayContext,
        inbound: GameplayContext,
    ) -> Result<GameplayContext, GameError> {
        let push_timestamp = prev.timestamp.unwrap_or_default();
        let server_duration = now - push_timestamp;

        Self::validate(prev, server_duration, &inbound)?;

        let next = GameplayContext {
            button_phase: inbound.button_phase,
            chat: None,
            timestamp: Some(push_timestamp),
            duration: Some(server_duration),
        };

        let key = self.room.key().clone();
        let mut outbound_chat = None;
        if let Some(mut chat) = inbound.chat {
            chat.user_id = Some(self.user_id.clone());
            self.room.chat_stream().push(key.clone(), chat).await?;
        } else if let Ok(Some(chat)) = self
            .room
            .chat_stream()
            .pop(key.clone(), self.user_id.clone())
            .await
        {
            if chat.user_id.as_ref() != Some(&self.user_id) && !chat.message.is_empty() {
                outbound_chat = Some(chat);
            }
        }

        self.room
            .active_store()
            .set_liveness(key, self.user_id.clone(), server_duration, now)
            .await?;

        if next.button_phase != ButtonPhase::Release {
            self.send_update(now, next.clone(), outbound_chat).await?;
        }
        Ok(next)
    }

    /// Commit the hold and tear the session down, best-effort.
    ///
    /// Every store operation runs regardless of earlier failures; the errors
    /// are joined and reported through a trailing error frame.
    async fn close_at(
        mut self,
        now: i64,
        ctx: GameplayContext,
        mut errors: Vec<GameError>,
    ) -> Option<GameError> {
        let key = self.room.key().clone();
        let record = GameplayRecord::from_context(&ctx);

        if let Err(err) = self
            .room
            .record_store()
            .add_record(key.clone(), self.user_id.clone(), record)
            .await
        {
            errors.push(err.into());
        }
        if let Err(err) = self
            .room
            .active_store()
            .remove_liveness(key.clone(), self.user_id.clone(), now)
            .await
        {
            errors.push(err.into());
        }
        if let Err(err) = self
            .room
            .active_store()
            .remove_payload(key.clone(), self.user_id.clone())
            .await
        {
            errors.push(err.into());
        }

        // Leaderboard metrics are decoration on the record frame; their
        // failures do not block the close.
        let place = self
            .room
            .record_store()
            .place_for_duration(key.clone(), record.duration)
            .await
            .ok();
        let count = self.room.record_store().count_users(key).await.ok();
        let world_record = place.map(|place| place == 1);

        let frame = GameplayMessage::record(record, place, count, world_record);
        if self.wire.write_message(&frame).await.is_err() {
            errors.push(GameError::WriteFailed);
        }

        let joined = GameError::join(errors);
        if let Some(joined) = &joined {
            let frame = GameplayMessage::error(joined.to_string());
            let _ = self.wire.write_message(&frame).await;
        }

        self.room.release_session(&self.user_id).await;
        joined
    }

    /// Emit an update frame decorated with flavor, chat, and live metrics.
    async fn send_update(
        &mut self,
        now: i64,
        ctx: GameplayContext,
        chat: Option<ChatMessage>,
    ) -> Result<(), GameError> {
        let key = self.room.key().clone();
        let flavor = self.flavor_at(now, &ctx);

        // Metric lookups decorate the frame; a failed lookup leaves the
        // field absent rather than killing the session.
        let place = self
            .room
            .active_store()
            .place_of(key.clone(), self.user_id.clone())
            .await
            .ok()
            .flatten();
        let count = self.room.active_store().count_active(key).await.ok();

        let frame = GameplayMessage::update(ctx, flavor, chat, place, count);
        self.wire
            .write_message(&frame)
            .await
            .map_err(|_| GameError::WriteFailed)
    }

    /// Draw a flavor message when the player has been silent long enough for
    /// their current hold-duration interval.
    fn flavor_at(&mut self, now: i64, ctx: &GameplayContext) -> Option<String> {
        let source = self.room.flavor()?;
        let duration = ctx.duration.unwrap_or_default();
        if now - self.last_message_time < flavor_frequency(duration) {
            return None;
        }

        let message = source.random_message(self.locale);
        if message.is_some() {
            self.last_message_time = now;
        }
        message
    }
}

/// Seconds of silence tolerated before new flavor at the given hold duration.
fn flavor_frequency(duration: i64) -> i64 {
    MESSAGE_UPDATE_TIME_INTERVALS
        .iter()
        .position(|bound| *bound > duration)
        .map(|interval| MESSAGE_UPDATE_FREQUENCIES[interval])
        .unwrap_or(MESSAGE_UPDATE_FREQUENCIES[MESSAGE_UPDATE_FREQUENCIES.len() - 1])
}

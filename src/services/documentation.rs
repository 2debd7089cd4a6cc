use utoipa::OpenApi;

#[derive(OpenApi)]
/// Every route and schema the backend exposes, gathered for `/docs`.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::room::create_room,
        crate::routes::room::delete_room,
        crate::routes::room::room_stats,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::protocol::ButtonPhase,
            crate::dto::protocol::ChatMessage,
            crate::dto::protocol::GameRoomStats,
            crate::dto::protocol::GameplayContext,
            crate::dto::protocol::GameplayError,
            crate::dto::protocol::GameplayMessage,
            crate::dto::protocol::GameplayRecord,
            crate::dto::protocol::UserLocale,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "gameplay", description = "WebSocket gameplay sessions"),
        (name = "rooms", description = "Custom room management and stats"),
    )
)]
pub struct ApiDoc;

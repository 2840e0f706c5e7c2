use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Puzzle Arena Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::course::puzzle_input,
        crate::routes::course::answer_puzzle,
        crate::routes::course::puzzle_permission,
        crate::routes::course::puzzle_tries,
        crate::routes::course::user_tries,
        crate::routes::sse::competition_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::course::PuzzleInputRequest,
            crate::dto::course::AnswerPuzzleRequest,
            crate::dto::course::AnswerPuzzleResponse,
            crate::dto::course::RateLimitedResponse,
            crate::dto::course::PermissionResponse,
            crate::dto::attempt::AttemptSnapshot,
            crate::dto::attempt::UserSnapshot,
            crate::dto::attempt::GroupSnapshot,
            crate::dto::broadcast::AttemptUpdate,
            crate::dto::broadcast::UpdateKind,
            crate::state::attempt::PuzzleLevel,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "course", description = "Puzzle inputs, answers and tries"),
        (name = "spectators", description = "Live try updates over SSE and WebSocket"),
    )
)]
/// OpenAPI document for the whole service.
pub struct ApiDoc;

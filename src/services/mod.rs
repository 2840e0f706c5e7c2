/// Attempt lifecycle engine.
pub mod attempt_service;
/// Catalog server client: answer checks and puzzle inputs.
pub mod catalog_client;
/// Participant-facing puzzle flows.
pub mod course_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Submission cooldown gate.
pub mod rate_limiter;
/// Completion score policy.
pub mod scoring;
/// Server-Sent Events spectator streams.
pub mod sse_service;
/// Storage connection supervisor and degraded mode toggling.
pub mod storage_supervisor;
/// WebSocket spectator connections.
pub mod websocket_service;

#[cfg(test)]
mod test_support;

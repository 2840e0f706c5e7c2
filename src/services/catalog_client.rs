//! Client for the catalog servers that generate puzzle inputs and judge answers.

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::CatalogConfig;

/// Failure talking to a catalog server.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Step outside `1..=2`; rejected before any request is sent.
    #[error("invalid puzzle step `{0}`")]
    InvalidStep(u8),
    /// Transport failure or timeout.
    #[error("catalog request failed")]
    Request(#[from] reqwest::Error),
    /// Non-success HTTP status.
    #[error("catalog answered with status {0}")]
    Status(StatusCode),
    /// Body missing the expected fields.
    #[error("malformed catalog response: {0}")]
    MalformedResponse(String),
}

/// Identifies one puzzle instance on a catalog server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PuzzleRef {
    /// Base URL of the catalog server.
    pub address: String,
    /// Catalog theme.
    pub theme: String,
    /// Puzzle identifier within the theme.
    pub puzzle_id: String,
    /// Seed for the generated input; the user ID.
    pub seed_id: String,
}

/// Access to the external answer checker and input generator.
pub trait CatalogClient: Send + Sync {
    /// Ask the catalog whether `answer` solves `step` of the puzzle.
    fn check_answer(
        &self,
        puzzle: PuzzleRef,
        step: u8,
        answer: String,
    ) -> BoxFuture<'static, Result<bool, CatalogError>>;

    /// Fetch the generated input of the puzzle for its seed.
    fn fetch_input(&self, puzzle: PuzzleRef) -> BoxFuture<'static, Result<Value, CatalogError>>;
}

/// [`CatalogClient`] over HTTP.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http: Client,
}

impl HttpCatalogClient {
    /// Client applying the configured request timeout.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self { http })
    }

    async fn get_json(&self, url: String, query: &[(&str, &str)]) -> Result<Value, CatalogError> {
        debug!(%url, "calling catalog");
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status));
        }
        response
            .json::<Value>()
            .await
            .map_err(|err| CatalogError::MalformedResponse(err.to_string()))
    }
}

fn endpoint(address: &str, path: &str) -> String {
    format!("{}/{}", address.trim_end_matches('/'), path)
}

fn check_path(step: u8) -> Result<&'static str, CatalogError> {
    match step {
        1 => Ok("puzzle/check/first"),
        2 => Ok("puzzle/check/second"),
        other => Err(CatalogError::InvalidStep(other)),
    }
}

/// Extract the verdict from a check response; it must carry a boolean `matches`.
fn parse_verdict(body: &Value) -> Result<bool, CatalogError> {
    body.get("matches")
        .and_then(Value::as_bool)
        .ok_or_else(|| CatalogError::MalformedResponse(format!("missing boolean `matches` in {body}")))
}

impl CatalogClient for HttpCatalogClient {
    fn check_answer(
        &self,
        puzzle: PuzzleRef,
        step: u8,
        answer: String,
    ) -> BoxFuture<'static, Result<bool, CatalogError>> {
        let client = self.clone();
        Box::pin(async move {
            let url = endpoint(&puzzle.address, check_path(step)?);
            let body = client
                .get_json(
                    url,
                    &[
                        ("theme", puzzle.theme.as_str()),
                        ("puzzle", puzzle.puzzle_id.as_str()),
                        ("unique_id", puzzle.seed_id.as_str()),
                        ("solution", answer.as_str()),
                    ],
                )
                .await?;
            parse_verdict(&body)
        })
    }

    fn fetch_input(&self, puzzle: PuzzleRef) -> BoxFuture<'static, Result<Value, CatalogError>> {
        let client = self.clone();
        Box::pin(async move {
            let url = endpoint(&puzzle.address, "puzzle/generate/input");
            client
                .get_json(
                    url,
                    &[
                        ("theme", puzzle.theme.as_str()),
                        ("puzzle", puzzle.puzzle_id.as_str()),
                        ("unique_id", puzzle.seed_id.as_str()),
                    ],
                )
                .await
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    /// Catalog double judging answers against a fixed solution per step.
    #[derive(Clone, Default)]
    pub struct ScriptedCatalog {
        pub first_solution: String,
        pub second_solution: String,
        pub fail: bool,
        pub calls: Arc<AtomicUsize>,
        pub inputs: Arc<AtomicUsize>,
    }

    impl ScriptedCatalog {
        pub fn new(first: &str, second: &str) -> Self {
            Self {
                first_solution: first.into(),
                second_solution: second.into(),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        /// Answer checks received so far.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Input generations received so far.
        pub fn input_calls(&self) -> usize {
            self.inputs.load(Ordering::SeqCst)
        }
    }

    impl CatalogClient for ScriptedCatalog {
        fn check_answer(
            &self,
            _puzzle: PuzzleRef,
            step: u8,
            answer: String,
        ) -> BoxFuture<'static, Result<bool, CatalogError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = if self.fail {
                Err(CatalogError::MalformedResponse("scripted failure".into()))
            } else {
                match step {
                    1 => Ok(answer == self.first_solution),
                    2 => Ok(answer == self.second_solution),
                    other => Err(CatalogError::InvalidStep(other)),
                }
            };
            Box::pin(async move { outcome })
        }

        fn fetch_input(
            &self,
            puzzle: PuzzleRef,
        ) -> BoxFuture<'static, Result<Value, CatalogError>> {
            self.inputs.fetch_add(1, Ordering::SeqCst);
            let outcome = if self.fail {
                Err(CatalogError::MalformedResponse("scripted failure".into()))
            } else {
                Ok(serde_json::json!({ "input": format!("{}:{}", puzzle.puzzle_id, puzzle.seed_id) }))
            };
            Box::pin(async move { outcome })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    async fn spawn_catalog() -> String {
        let app = Router::new()
            .route(
                "/puzzle/check/first",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({ "matches": params.get("solution").map(String::as_str) == Some("42") }))
                }),
            )
            .route(
                "/puzzle/check/second",
                get(|| async { Json(json!({ "matches": "yes" })) }),
            )
            .route(
                "/puzzle/generate/input",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    Json(json!({
                        "theme": params.get("theme"),
                        "seed": params.get("unique_id"),
                    }))
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn puzzle(address: String) -> PuzzleRef {
        PuzzleRef {
            address,
            theme: "space".into(),
            puzzle_id: "p1".into(),
            seed_id: "u1".into(),
        }
    }

    fn client() -> HttpCatalogClient {
        HttpCatalogClient::new(&CatalogConfig::new(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn check_answer_reads_matches_flag() {
        let address = spawn_catalog().await;
        let client = client();

        assert!(
            client
                .check_answer(puzzle(address.clone()), 1, "42".into())
                .await
                .unwrap()
        );
        assert!(
            !client
                .check_answer(puzzle(address), 1, "41".into())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn non_boolean_matches_is_malformed() {
        let address = spawn_catalog().await;
        let result = client().check_answer(puzzle(address), 2, "42".into()).await;
        assert!(matches!(result, Err(CatalogError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn invalid_step_is_rejected_before_io() {
        let result = client()
            .check_answer(puzzle("http://127.0.0.1:9".into()), 3, "42".into())
            .await;
        assert!(matches!(result, Err(CatalogError::InvalidStep(3))));
    }

    #[tokio::test]
    async fn fetch_input_forwards_seed() {
        let address = spawn_catalog().await;
        let input = client().fetch_input(puzzle(address)).await.unwrap();
        assert_eq!(input, json!({ "theme": "space", "seed": "u1" }));
    }
}

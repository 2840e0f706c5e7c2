use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use axum::{Json, Router, extract::Query, routing::get};
use puzzle_arena_back::{
    config::AppConfig, dao::arena_store::memory::MemoryArenaStore, routes,
    services::catalog_client::HttpCatalogClient, state::AppState,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use tokio::{net::TcpListener, time::timeout};

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

type Params = Query<HashMap<String, String>>;

fn verdict(params: &HashMap<String, String>, expected: &str) -> Json<Value> {
    Json(json!({ "matches": params.get("solution").map(String::as_str) == Some(expected) }))
}

async fn check_first(Query(params): Params) -> Json<Value> {
    verdict(&params, "42")
}

async fn check_second(Query(params): Params) -> Json<Value> {
    verdict(&params, "4242")
}

async fn generate_input(Query(params): Params) -> Json<Value> {
    Json(json!({ "lines": [1, 2, 3], "seed": params.get("unique_id") }))
}

/// Catalog double: step 1 is solved by "42", step 2 by "4242".
async fn spawn_catalog() -> SocketAddr {
    serve(
        Router::new()
            .route("/puzzle/check/first", get(check_first))
            .route("/puzzle/check/second", get(check_second))
            .route("/puzzle/generate/input", get(generate_input)),
    )
    .await
}

struct Arena {
    base: String,
    http: Client,
}

impl Arena {
    async fn start() -> Self {
        let catalog = spawn_catalog().await;
        let config = AppConfig::from_json(&format!(
            r#"{{
                "directory": {{
                    "competitions": [{{
                        "id": "c1",
                        "title": "Spring Cup",
                        "catalog_address": "http://{catalog}",
                        "catalog_theme": "space"
                    }}],
                    "users": [
                        {{"id": "u1", "firstname": "Ada", "lastname": "Lovelace",
                          "groups": [{{"id": "g1", "name": "Blue"}}]}},
                        {{"id": "u2", "firstname": "Alan", "lastname": "Turing"}}
                    ]
                }}
            }}"#
        ))
        .unwrap();

        let client = HttpCatalogClient::new(&config.catalog).unwrap();
        let store = MemoryArenaStore::with_directory(
            config.directory.competitions.clone(),
            config.directory.users.clone(),
        );
        let (state, dispatcher) = AppState::new(config, Arc::new(client));
        tokio::spawn(dispatcher.run());
        state.set_store(Arc::new(store)).await;

        let addr = serve(routes::router(state)).await;
        Self {
            base: format!("http://{addr}"),
            http: Client::new(),
        }
    }

    async fn post(&self, user: &str, path: &str, body: Value) -> Response {
        self.http
            .post(format!("{}{path}", self.base))
            .header("X-User-Id", user)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, user: Option<&str>, path: &str) -> Response {
        let mut request = self.http.get(format!("{}{path}", self.base));
        if let Some(user) = user {
            request = request.header("X-User-Id", user);
        }
        request.send().await.unwrap()
    }

    async fn open_input(&self, user: &str) -> Value {
        let response = self
            .post(
                user,
                "/competitions/input",
                json!({"competition_id": "c1", "puzzle_id": "p1", "puzzle_index": 0, "puzzle_lvl": "EASY"}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    async fn answer(&self, user: &str, step: u8, answer: &str) -> Response {
        self.post(
            user,
            "/competitions/answer_puzzle",
            json!({
                "competition_id": "c1",
                "puzzle_id": "p1",
                "puzzle_index": 0,
                "puzzle_step": step,
                "answer": answer
            }),
        )
        .await
    }
}

/// Incrementally parse `data:` payloads from an SSE response.
struct EventReader {
    response: Response,
    buffer: String,
}

impl EventReader {
    async fn next(&mut self) -> Value {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame = self.buffer[..end].to_owned();
                self.buffer.drain(..end + 2);
                if let Some(data) = frame
                    .lines()
                    .find_map(|line| line.strip_prefix("data:"))
                {
                    return serde_json::from_str(data.trim()).unwrap();
                }
                continue;
            }
            let chunk = timeout(Duration::from_secs(2), self.response.chunk())
                .await
                .expect("sse chunk in time")
                .unwrap()
                .expect("sse stream open");
            self.buffer.push_str(&String::from_utf8_lossy(&chunk));
        }
    }
}

#[tokio::test]
async fn solving_a_puzzle_end_to_end() {
    let arena = Arena::start().await;
    let stream = arena.get(None, "/competitions/c1/sse").await;
    assert_eq!(stream.status(), StatusCode::OK);
    let mut events = EventReader {
        response: stream,
        buffer: String::new(),
    };

    let input = arena.open_input("u1").await;
    assert_eq!(input["seed"], "u1");

    let created = events.next().await;
    assert_eq!(created["competition_id"], "c1");
    assert_eq!(created["update_type"], "new");
    assert_eq!(created["try"]["step"], 1);
    assert_eq!(created["try"]["attempts"], 0);
    assert_eq!(created["try"]["user"]["groups"][0]["name"], "Blue");

    let wrong = arena.answer("u1", 1, "41").await;
    assert_eq!(wrong.status(), StatusCode::OK);
    let wrong: Value = wrong.json().await.unwrap();
    assert_eq!(
        wrong,
        json!({"is_correct": false, "puzzle_id": "p1", "puzzle_step": 1})
    );
    let updated = events.next().await;
    assert_eq!(updated["update_type"], "update");
    assert_eq!(updated["try"]["attempts"], 1);
    assert!(updated["try"]["end_time"].is_null());

    let right: Value = arena.answer("u1", 1, "42").await.json().await.unwrap();
    assert_eq!(right["is_correct"], true);
    let completed = events.next().await;
    assert_eq!(completed["update_type"], "update");
    assert_eq!(completed["try"]["attempts"], 2);
    assert!(completed["try"]["end_time"].is_string());
    assert_eq!(completed["try"]["score"], 35.0);
    let next = events.next().await;
    assert_eq!(next["update_type"], "new");
    assert_eq!(next["try"]["step"], 2);
    assert_eq!(next["try"]["attempts"], 0);

    let again = arena.answer("u1", 1, "42").await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let permission: Value = arena
        .get(Some("u1"), "/competitions/c1/puzzles/1/permission")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(permission, json!({"has_permission": true}));
    let permission: Value = arena
        .get(Some("u2"), "/competitions/c1/puzzles/1/permission")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(permission, json!({"has_permission": false}));

    let tries: Value = arena
        .get(Some("u1"), "/competitions/c1/puzzles/p1/0/tries")
        .await
        .json()
        .await
        .unwrap();
    let steps = tries
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["step"].as_u64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(steps, vec![1, 2]);
}

#[tokio::test]
async fn repeated_wrong_answers_hit_the_cooldown() {
    let arena = Arena::start().await;
    arena.open_input("u1").await;

    for guess in ["1", "2", "3"] {
        assert_eq!(arena.answer("u1", 1, guess).await.status(), StatusCode::OK);
    }

    let blocked = arena.answer("u1", 1, "42").await;
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = blocked.json().await.unwrap();
    let wait = body["wait_time_seconds"].as_u64().unwrap();
    assert!((170..=180).contains(&wait), "unexpected wait {wait}");

    let tries: Value = arena
        .get(Some("u1"), "/competitions/c1/users/u1/tries")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(tries[0]["attempts"], 3);
}

#[tokio::test]
async fn identity_and_input_are_enforced() {
    let arena = Arena::start().await;

    let anonymous = arena.get(None, "/competitions/c1/users/u1/tries").await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let stranger = arena.get(Some("ghost"), "/competitions/c1/users/u1/tries").await;
    assert_eq!(stranger.status(), StatusCode::UNAUTHORIZED);
    let other = arena.get(Some("u2"), "/competitions/c1/users/u1/tries").await;
    assert_eq!(other.status(), StatusCode::FORBIDDEN);

    let bad_step = arena.answer("u1", 3, "42").await;
    assert_eq!(bad_step.status(), StatusCode::BAD_REQUEST);

    let missing = arena.answer("u1", 1, "42").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unknown = arena.get(None, "/competitions/nope/sse").await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let health: Value = arena.get(None, "/healthcheck").await.json().await.unwrap();
    assert_eq!(health, json!({"status": "ok"}));
}

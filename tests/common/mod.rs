#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use golf_sync::db::{self, CursorStore, repository};
use golf_sync::error::AppError;
use golf_sync::models::*;
use golf_sync::remote::SyncRemote;
use golf_sync::remote::dto::{PullRequest, PullResponse, PushRequest, PushResponse, StateResponse};
use golf_sync::services::{EngineConfig, SyncEngine};
use sqlx::SqlitePool;

/// One recorded call against the remote.
#[derive(Debug, Clone)]
pub enum Call {
    State(SyncCursors),
    Push(PushRequest),
    Pull(PullRequest),
}

enum Scripted<T> {
    Reply(T),
    Fail(u16),
}

/// An in-process [`SyncRemote`] that replays queued replies and records
/// every request. When a queue runs dry it answers "not in sync", an empty
/// acknowledgement, or an empty page.
#[derive(Default)]
pub struct ScriptedRemote {
    states: Mutex<VecDeque<Scripted<StateResponse>>>,
    pushes: Mutex<VecDeque<Scripted<PushResponse>>>,
    pulls: Mutex<VecDeque<Scripted<PullResponse>>>,
    calls: Mutex<Vec<Call>>,
    latency: Mutex<Duration>,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_state(&self, response: StateResponse) {
        self.states.lock().unwrap().push_back(Scripted::Reply(response));
    }

    pub fn fail_state(&self, status: u16) {
        self.states.lock().unwrap().push_back(Scripted::Fail(status));
    }

    pub fn reply_push(&self, response: PushResponse) {
        self.pushes.lock().unwrap().push_back(Scripted::Reply(response));
    }

    pub fn fail_push(&self, status: u16) {
        self.pushes.lock().unwrap().push_back(Scripted::Fail(status));
    }

    pub fn reply_pull(&self, response: PullResponse) {
        self.pulls.lock().unwrap().push_back(Scripted::Reply(response));
    }

    pub fn fail_pull(&self, status: u16) {
        self.pulls.lock().unwrap().push_back(Scripted::Fail(status));
    }

    /// Delays every reply, to keep a round trip in flight.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn state_calls(&self) -> Vec<SyncCursors> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::State(cursors) => Some(cursors),
                _ => None,
            })
            .collect()
    }

    pub fn push_calls(&self) -> Vec<PushRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn pull_calls(&self) -> Vec<PullRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Pull(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    async fn answer<T: Default + Send>(&self, call: Call, queue: &Mutex<VecDeque<Scripted<T>>>) -> Result<T, AppError> {
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let next = queue.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(reply)) => Ok(reply),
            Some(Scripted::Fail(status)) => Err(AppError::Remote {
                status,
                message: "scripted failure".to_string(),
            }),
            None => Ok(T::default()),
        }
    }
}

#[async_trait]
impl SyncRemote for ScriptedRemote {
    async fn check_state(&self, cursors: &SyncCursors) -> Result<StateResponse, AppError> {
        self.answer(Call::State(cursors.clone()), &self.states).await
    }

    async fn push(&self, request: &PushRequest) -> Result<PushResponse, AppError> {
        self.answer(Call::Push(request.clone()), &self.pushes).await
    }

    async fn pull(&self, request: &PullRequest) -> Result<PullResponse, AppError> {
        self.answer(Call::Pull(request.clone()), &self.pulls).await
    }
}

pub async fn setup_db() -> SqlitePool {
    db::connect_in_memory()
        .await
        .expect("Failed to create test db")
}

pub async fn setup_engine(
    remote: Arc<dyn SyncRemote>,
    config: EngineConfig,
) -> (SqlitePool, Arc<SyncEngine>) {
    let pool = setup_db().await;
    let store = Arc::new(CursorStore::new(pool.clone()));
    let engine = Arc::new(SyncEngine::new(pool.clone(), store, remote, config));
    (pool, engine)
}

pub fn cursors(pairs: &[(Collection, &str)]) -> SyncCursors {
    let mut cursors = SyncCursors::default();
    for (collection, cursor) in pairs {
        cursors.set(*collection, *cursor);
    }
    cursors
}

/// A course with one game and scores for its first `holes` holes.
pub async fn seed_round(pool: &SqlitePool, profile_id: &str, holes: i32) -> (Course, Game, Vec<Score>) {
    let course = repository::insert_course(
        pool,
        NewCourseRequest {
            name: "Pebble Creek".to_string(),
            rounds: 18,
            profile_id: profile_id.to_string(),
        },
    )
    .await
    .expect("Failed to insert course");

    let game = repository::insert_game(
        pool,
        NewGameRequest {
            course_id: course.id.clone(),
            date: None,
        },
    )
    .await
    .expect("Failed to insert game");

    let mut scores = Vec::new();
    for hole in 0..holes {
        let score = repository::record_score(
            pool,
            RecordScoreRequest {
                game_id: game.id.clone(),
                hole,
                par: 4,
                score: 5,
                putts: 2,
            },
        )
        .await
        .expect("Failed to record score");
        scores.push(score);
    }

    (course, game, scores)
}

pub fn remote_score(game_id: &str, hole: i32) -> Score {
    Score {
        id: format!("{}-h{}", game_id, hole),
        game_id: game_id.to_string(),
        hole,
        par: 4,
        score: 4,
        putts: 2,
        updated_at: chrono::Utc::now().to_rfc3339(),
        is_deleted: false,
        sync_state: String::new(),
    }
}

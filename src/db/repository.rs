use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::course::is_valid_rounds;
use crate::models::profile::hash_dob;
use crate::models::{
    CompleteGameRequest, Course, EntityBatch, Game, NewCourseRequest, NewGameRequest,
    NewProfileRequest, Profile, RecordScoreRequest, Score, UpdateCourseRequest,
};

fn now() -> String {
    Utc::now().to_rfc3339()
}

// ---- profiles ----

pub async fn insert_profile(db: &SqlitePool, req: NewProfileRequest) -> Result<Profile, AppError> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("username must not be empty".to_string()));
    }
    if find_profile_by_username(db, &username).await?.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let now = now();
    let profile = Profile {
        id: Uuid::new_v4().to_string(),
        username,
        dob_hash: hash_dob(&req.dob),
        created_at: now.clone(),
        last_active_at: now.clone(),
        updated_at: now,
        is_deleted: false,
        sync_state: "pending".to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO profiles
            (id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending')
        "#,
    )
    .bind(&profile.id)
    .bind(&profile.username)
    .bind(&profile.dob_hash)
    .bind(&profile.created_at)
    .bind(&profile.last_active_at)
    .bind(&profile.updated_at)
    .execute(db)
    .await?;

    Ok(profile)
}

pub async fn find_profile_by_id(db: &SqlitePool, id: &str) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        "SELECT id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state FROM profiles WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Tombstoned profiles still hold their username.
pub async fn find_profile_by_username(
    db: &SqlitePool,
    username: &str,
) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        "SELECT id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state FROM profiles WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(db)
    .await
}

pub async fn fetch_profiles(db: &SqlitePool) -> Result<Vec<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        "SELECT id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state FROM profiles WHERE is_deleted = 0 ORDER BY created_at",
    )
    .fetch_all(db)
    .await
}

/// Records activity on a profile. Returns false when the profile is unknown.
pub async fn touch_profile(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = now();
    let result = sqlx::query(
        "UPDATE profiles SET last_active_at = ?1, updated_at = ?1, sync_state = 'pending' WHERE id = ?2 AND is_deleted = 0",
    )
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

// ---- courses ----

pub async fn insert_course(db: &SqlitePool, req: NewCourseRequest) -> Result<Course, AppError> {
    if !is_valid_rounds(req.rounds) {
        return Err(AppError::BadRequest(format!(
            "rounds must be 9 or 18, got {}",
            req.rounds
        )));
    }

    let course = Course {
        id: Uuid::new_v4().to_string(),
        name: req.name,
        rounds: req.rounds,
        profile_id: req.profile_id,
        updated_at: now(),
        is_deleted: false,
        sync_state: "pending".to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO courses (id, name, rounds, profile_id, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, 0, 'pending')
        "#,
    )
    .bind(&course.id)
    .bind(&course.name)
    .bind(course.rounds)
    .bind(&course.profile_id)
    .bind(&course.updated_at)
    .execute(db)
    .await?;

    Ok(course)
}

pub async fn find_course_by_id(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, name, rounds, profile_id, updated_at, is_deleted, sync_state FROM courses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_courses_for_profile(
    db: &SqlitePool,
    profile_id: &str,
) -> Result<Vec<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        r#"
        SELECT id, name, rounds, profile_id, updated_at, is_deleted, sync_state
        FROM courses
        WHERE profile_id = ? AND is_deleted = 0
        ORDER BY name
        "#,
    )
    .bind(profile_id)
    .fetch_all(db)
    .await
}

pub async fn update_course(
    db: &SqlitePool,
    id: &str,
    req: UpdateCourseRequest,
) -> Result<Option<Course>, AppError> {
    let mut current = match find_course_by_id(db, id).await? {
        Some(c) if !c.is_deleted => c,
        _ => return Ok(None),
    };

    if let Some(name) = req.name {
        current.name = name;
    }
    if let Some(rounds) = req.rounds {
        if !is_valid_rounds(rounds) {
            return Err(AppError::BadRequest(format!("rounds must be 9 or 18, got {}", rounds)));
        }
        current.rounds = rounds;
    }
    current.updated_at = now();
    current.sync_state = "pending".to_string();

    sqlx::query(
        "UPDATE courses SET name = ?1, rounds = ?2, updated_at = ?3, sync_state = 'pending' WHERE id = ?4",
    )
    .bind(&current.name)
    .bind(current.rounds)
    .bind(&current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

/// Tombstones a course so the deletion travels with the next push.
pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    tombstone(db, "UPDATE courses SET is_deleted = 1, updated_at = ?2, sync_state = 'pending' WHERE id = ?1 AND is_deleted = 0", id).await
}

// ---- games ----

pub async fn insert_game(db: &SqlitePool, req: NewGameRequest) -> Result<Game, AppError> {
    if find_course_by_id(db, &req.course_id).await?.is_none() {
        return Err(AppError::BadRequest(format!("unknown course {}", req.course_id)));
    }

    let now = now();
    let game = Game {
        id: Uuid::new_v4().to_string(),
        date: req.date.unwrap_or_else(|| now.clone()),
        course_id: req.course_id,
        final_note: String::new(),
        final_score: 0,
        completed_at: None,
        updated_at: now,
        is_deleted: false,
        sync_state: "pending".to_string(),
    };

    sqlx::query(
        r#"
        INSERT INTO games
            (id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, '', 0, NULL, ?4, 0, 'pending')
        "#,
    )
    .bind(&game.id)
    .bind(&game.date)
    .bind(&game.course_id)
    .bind(&game.updated_at)
    .execute(db)
    .await?;

    Ok(game)
}

pub async fn find_game_by_id(db: &SqlitePool, id: &str) -> Result<Option<Game>, sqlx::Error> {
    sqlx::query_as::<_, Game>(
        "SELECT id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state FROM games WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_games_for_course(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Vec<Game>, sqlx::Error> {
    sqlx::query_as::<_, Game>(
        r#"
        SELECT id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state
        FROM games
        WHERE course_id = ? AND is_deleted = 0
        ORDER BY date DESC
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

/// The active game of a course: the most recent one that is not deleted.
pub async fn latest_game_for_course(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Option<Game>, sqlx::Error> {
    sqlx::query_as::<_, Game>(
        r#"
        SELECT id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state
        FROM games
        WHERE course_id = ? AND is_deleted = 0
        ORDER BY date DESC, updated_at DESC
        LIMIT 1
        "#,
    )
    .bind(course_id)
    .fetch_optional(db)
    .await
}

pub async fn complete_game(
    db: &SqlitePool,
    id: &str,
    req: CompleteGameRequest,
) -> Result<Option<Game>, sqlx::Error> {
    let mut current = match find_game_by_id(db, id).await? {
        Some(g) if !g.is_deleted => g,
        _ => return Ok(None),
    };

    let now = now();
    current.final_score = req.final_score;
    current.final_note = req.final_note;
    current.completed_at = Some(now.clone());
    current.updated_at = now;
    current.sync_state = "pending".to_string();

    sqlx::query(
        r#"
        UPDATE games
        SET final_score = ?1,
            final_note = ?2,
            completed_at = ?3,
            updated_at = ?4,
            sync_state = 'pending'
        WHERE id = ?5
        "#,
    )
    .bind(current.final_score)
    .bind(&current.final_note)
    .bind(&current.completed_at)
    .bind(&current.updated_at)
    .bind(id)
    .execute(db)
    .await?;

    Ok(Some(current))
}

pub async fn delete_game(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    tombstone(db, "UPDATE games SET is_deleted = 1, updated_at = ?2, sync_state = 'pending' WHERE id = ?1 AND is_deleted = 0", id).await
}

// ---- scores ----

/// Records the score for one hole. A second call for the same hole of the
/// same game overwrites the first.
pub async fn record_score(db: &SqlitePool, req: RecordScoreRequest) -> Result<Score, AppError> {
    if req.hole < 0 {
        return Err(AppError::BadRequest("hole index must not be negative".to_string()));
    }
    if find_game_by_id(db, &req.game_id).await?.is_none() {
        return Err(AppError::BadRequest(format!("unknown game {}", req.game_id)));
    }

    let updated_at = now();
    sqlx::query(
        r#"
        INSERT INTO scores (id, game_id, hole, par, score, putts, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, 'pending')
        ON CONFLICT(game_id, hole) DO UPDATE SET
            par = excluded.par,
            score = excluded.score,
            putts = excluded.putts,
            updated_at = excluded.updated_at,
            is_deleted = 0,
            sync_state = 'pending'
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&req.game_id)
    .bind(req.hole)
    .bind(req.par)
    .bind(req.score)
    .bind(req.putts)
    .bind(&updated_at)
    .execute(db)
    .await?;

    sqlx::query_as::<_, Score>(
        "SELECT id, game_id, hole, par, score, putts, updated_at, is_deleted, sync_state FROM scores WHERE game_id = ? AND hole = ?",
    )
    .bind(&req.game_id)
    .bind(req.hole)
    .fetch_one(db)
    .await
    .map_err(AppError::from)
}

pub async fn fetch_scores_for_game(db: &SqlitePool, game_id: &str) -> Result<Vec<Score>, sqlx::Error> {
    sqlx::query_as::<_, Score>(
        r#"
        SELECT id, game_id, hole, par, score, putts, updated_at, is_deleted, sync_state
        FROM scores
        WHERE game_id = ? AND is_deleted = 0
        ORDER BY hole
        "#,
    )
    .bind(game_id)
    .fetch_all(db)
    .await
}

async fn tombstone(db: &SqlitePool, sql: &'static str, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(sql)
        .bind(id)
        .bind(now())
        .execute(db)
        .await?
        .rows_affected();
    Ok(result > 0)
}

// ---- sync support ----

/// Every local record, tombstones included, for a push. With `pending_only`
/// only records changed since they were last acknowledged are returned.
pub async fn collect_for_push(db: &SqlitePool, pending_only: bool) -> Result<EntityBatch, sqlx::Error> {
    let filter = if pending_only { "WHERE sync_state = 'pending'" } else { "" };

    let profiles = sqlx::query_as::<_, Profile>(&format!(
        "SELECT id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state FROM profiles {}",
        filter
    ))
    .fetch_all(db)
    .await?;
    let courses = sqlx::query_as::<_, Course>(&format!(
        "SELECT id, name, rounds, profile_id, updated_at, is_deleted, sync_state FROM courses {}",
        filter
    ))
    .fetch_all(db)
    .await?;
    let games = sqlx::query_as::<_, Game>(&format!(
        "SELECT id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state FROM games {}",
        filter
    ))
    .fetch_all(db)
    .await?;
    let scores = sqlx::query_as::<_, Score>(&format!(
        "SELECT id, game_id, hole, par, score, putts, updated_at, is_deleted, sync_state FROM scores {}",
        filter
    ))
    .fetch_all(db)
    .await?;

    Ok(EntityBatch {
        profiles,
        courses,
        games,
        scores,
    })
}

/// Marks pushed records as acknowledged. A row edited after it was collected
/// keeps its `pending` state because its `updated_at` no longer matches.
pub async fn mark_synced(db: &SqlitePool, pushed: &EntityBatch) -> Result<(), sqlx::Error> {
    let mut tx = db.begin().await?;

    for p in &pushed.profiles {
        mark_row(&mut tx, "UPDATE profiles SET sync_state = 'synced' WHERE id = ?1 AND updated_at = ?2", &p.id, &p.updated_at).await?;
    }
    for c in &pushed.courses {
        mark_row(&mut tx, "UPDATE courses SET sync_state = 'synced' WHERE id = ?1 AND updated_at = ?2", &c.id, &c.updated_at).await?;
    }
    for g in &pushed.games {
        mark_row(&mut tx, "UPDATE games SET sync_state = 'synced' WHERE id = ?1 AND updated_at = ?2", &g.id, &g.updated_at).await?;
    }
    for s in &pushed.scores {
        mark_row(&mut tx, "UPDATE scores SET sync_state = 'synced' WHERE id = ?1 AND updated_at = ?2", &s.id, &s.updated_at).await?;
    }

    tx.commit().await
}

async fn mark_row(
    conn: &mut SqliteConnection,
    sql: &'static str,
    id: &str,
    updated_at: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(sql).bind(id).bind(updated_at).execute(&mut *conn).await?;
    Ok(())
}

/// Applies pulled changes: insert when the id is new, overwrite otherwise.
/// A local row that is still `pending` and newer than the pulled copy is kept
/// as is, so an edit made while the round trip was in flight goes out on the
/// next push. The whole batch commits or none of it does.
pub async fn bulk_put(db: &SqlitePool, changes: &EntityBatch) -> Result<(), sqlx::Error> {
    if changes.is_empty() {
        return Ok(());
    }

    let fallback = now();
    let mut tx = db.begin().await?;

    for profile in &changes.profiles {
        put_profile(&mut tx, profile, &fallback).await?;
    }
    for course in &changes.courses {
        put_course(&mut tx, course, &fallback).await?;
    }
    for game in &changes.games {
        put_game(&mut tx, game, &fallback).await?;
    }
    for score in &changes.scores {
        put_score(&mut tx, score, &fallback).await?;
    }

    tx.commit().await
}

fn stamp<'a>(updated_at: &'a str, fallback: &'a str) -> &'a str {
    if updated_at.is_empty() { fallback } else { updated_at }
}

async fn put_profile(conn: &mut SqliteConnection, p: &Profile, fallback: &str) -> Result<(), sqlx::Error> {
    // The same username onboarded on another device: its id takes over.
    let shadowed: Option<(String,)> =
        sqlx::query_as("SELECT id FROM profiles WHERE username = ?1 AND id != ?2")
            .bind(&p.username)
            .bind(&p.id)
            .fetch_optional(&mut *conn)
            .await?;
    if let Some((local_id,)) = shadowed {
        adopt_profile(conn, &local_id, &p.id, fallback).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO profiles
            (id, username, dob_hash, created_at, last_active_at, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'synced')
        ON CONFLICT(id) DO UPDATE SET
            username = excluded.username,
            dob_hash = excluded.dob_hash,
            created_at = excluded.created_at,
            last_active_at = excluded.last_active_at,
            updated_at = excluded.updated_at,
            is_deleted = excluded.is_deleted,
            sync_state = 'synced'
        WHERE profiles.sync_state = 'synced'
            OR julianday(profiles.updated_at) <= julianday(excluded.updated_at)
        "#,
    )
    .bind(&p.id)
    .bind(&p.username)
    .bind(&p.dob_hash)
    .bind(&p.created_at)
    .bind(&p.last_active_at)
    .bind(stamp(&p.updated_at, fallback))
    .bind(p.is_deleted)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Moves the courses of `local_id` to `remote_id` and drops the local
/// profile row. The moved courses are left `pending` so the new owner is
/// pushed.
async fn adopt_profile(
    conn: &mut SqliteConnection,
    local_id: &str,
    remote_id: &str,
    now: &str,
) -> Result<(), sqlx::Error> {
    let moved = sqlx::query(
        "UPDATE courses SET profile_id = ?1, updated_at = ?2, sync_state = 'pending' WHERE profile_id = ?3",
    )
    .bind(remote_id)
    .bind(now)
    .bind(local_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM profiles WHERE id = ?1")
        .bind(local_id)
        .execute(&mut *conn)
        .await?;

    warn!(
        "Local profile {} merged into {} ({} courses moved)",
        local_id, remote_id, moved
    );
    Ok(())
}

async fn put_course(conn: &mut SqliteConnection, c: &Course, fallback: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO courses (id, name, rounds, profile_id, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'synced')
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            rounds = excluded.rounds,
            profile_id = excluded.profile_id,
            updated_at = excluded.updated_at,
            is_deleted = excluded.is_deleted,
            sync_state = 'synced'
        WHERE courses.sync_state = 'synced'
            OR julianday(courses.updated_at) <= julianday(excluded.updated_at)
        "#,
    )
    .bind(&c.id)
    .bind(&c.name)
    .bind(c.rounds)
    .bind(&c.profile_id)
    .bind(stamp(&c.updated_at, fallback))
    .bind(c.is_deleted)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn put_game(conn: &mut SqliteConnection, g: &Game, fallback: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO games
            (id, date, course_id, final_note, final_score, completed_at, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'synced')
        ON CONFLICT(id) DO UPDATE SET
            date = excluded.date,
            course_id = excluded.course_id,
            final_note = excluded.final_note,
            final_score = excluded.final_score,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at,
            is_deleted = excluded.is_deleted,
            sync_state = 'synced'
        WHERE games.sync_state = 'synced'
            OR julianday(games.updated_at) <= julianday(excluded.updated_at)
        "#,
    )
    .bind(&g.id)
    .bind(&g.date)
    .bind(&g.course_id)
    .bind(&g.final_note)
    .bind(g.final_score)
    .bind(&g.completed_at)
    .bind(stamp(&g.updated_at, fallback))
    .bind(g.is_deleted)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn put_score(conn: &mut SqliteConnection, s: &Score, fallback: &str) -> Result<(), sqlx::Error> {
    let updated_at = stamp(&s.updated_at, fallback);

    // Another row holding the same hole: the pulled copy replaces it unless
    // the local row is a newer unpushed edit, in which case the pulled copy
    // is dropped.
    let local_wins: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT COALESCE(sync_state = 'pending' AND julianday(updated_at) > julianday(?4), 0)
        FROM scores WHERE game_id = ?1 AND hole = ?2 AND id != ?3
        "#,
    )
    .bind(&s.game_id)
    .bind(s.hole)
    .bind(&s.id)
    .bind(updated_at)
    .fetch_optional(&mut *conn)
    .await?;
    match local_wins {
        Some((1,)) => return Ok(()),
        Some(_) => {
            sqlx::query("DELETE FROM scores WHERE game_id = ?1 AND hole = ?2 AND id != ?3")
                .bind(&s.game_id)
                .bind(s.hole)
                .bind(&s.id)
                .execute(&mut *conn)
                .await?;
        }
        None => {}
    }

    sqlx::query(
        r#"
        INSERT INTO scores (id, game_id, hole, par, score, putts, updated_at, is_deleted, sync_state)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'synced')
        ON CONFLICT(id) DO UPDATE SET
            game_id = excluded.game_id,
            hole = excluded.hole,
            par = excluded.par,
            score = excluded.score,
            putts = excluded.putts,
            updated_at = excluded.updated_at,
            is_deleted = excluded.is_deleted,
            sync_state = 'synced'
        WHERE scores.sync_state = 'synced'
            OR julianday(scores.updated_at) <= julianday(excluded.updated_at)
        "#,
    )
    .bind(&s.id)
    .bind(&s.game_id)
    .bind(s.hole)
    .bind(s.par)
    .bind(s.score)
    .bind(s.putts)
    .bind(updated_at)
    .bind(s.is_deleted)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    async fn setup_test_db() -> SqlitePool {
        connect_in_memory().await.expect("Failed to create test db")
    }

    async fn seed_course(pool: &SqlitePool) -> (Profile, Course) {
        let profile = insert_profile(
            pool,
            NewProfileRequest {
                username: "sam".to_string(),
                dob: "1990-04-01".to_string(),
            },
        )
        .await
        .expect("Failed to insert profile");

        let course = insert_course(
            pool,
            NewCourseRequest {
                name: "Pebble Creek".to_string(),
                rounds: 18,
                profile_id: profile.id.clone(),
            },
        )
        .await
        .expect("Failed to insert course");

        (profile, course)
    }

    #[tokio::test]
    async fn test_insert_and_fetch_course() {
        let pool = setup_test_db().await;
        let (profile, course) = seed_course(&pool).await;

        assert_eq!(course.sync_state, "pending");
        assert!(!course.is_deleted);

        let courses = fetch_courses_for_profile(&pool, &profile.id)
            .await
            .expect("Failed to fetch courses");
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, course.id);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_conflict() {
        let pool = setup_test_db().await;
        seed_course(&pool).await;

        let err = insert_profile(
            &pool,
            NewProfileRequest {
                username: "sam".to_string(),
                dob: "2000-01-01".to_string(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_course_rounds_must_be_nine_or_eighteen() {
        let pool = setup_test_db().await;
        let (profile, course) = seed_course(&pool).await;

        let err = insert_course(
            &pool,
            NewCourseRequest {
                name: "Pitch and putt".to_string(),
                rounds: 12,
                profile_id: profile.id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = update_course(
            &pool,
            &course.id,
            UpdateCourseRequest {
                name: None,
                rounds: Some(7),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_record_score_overwrites_same_hole() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;
        let game = insert_game(
            &pool,
            NewGameRequest {
                course_id: course.id.clone(),
                date: None,
            },
        )
        .await
        .expect("Failed to insert game");

        let first = record_score(
            &pool,
            RecordScoreRequest {
                game_id: game.id.clone(),
                hole: 0,
                par: 4,
                score: 6,
                putts: 3,
            },
        )
        .await
        .expect("Failed to record score");
        let second = record_score(
            &pool,
            RecordScoreRequest {
                game_id: game.id.clone(),
                hole: 0,
                par: 4,
                score: 5,
                putts: 2,
            },
        )
        .await
        .expect("Failed to record score");

        assert_eq!(first.id, second.id);
        let scores = fetch_scores_for_game(&pool, &game.id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 5);
        assert_eq!(scores[0].putts, 2);
    }

    #[tokio::test]
    async fn test_complete_game_and_latest_for_course() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;

        insert_game(
            &pool,
            NewGameRequest {
                course_id: course.id.clone(),
                date: Some("2025-05-01T08:00:00+00:00".to_string()),
            },
        )
        .await
        .unwrap();
        let recent = insert_game(
            &pool,
            NewGameRequest {
                course_id: course.id.clone(),
                date: Some("2025-06-01T08:00:00+00:00".to_string()),
            },
        )
        .await
        .unwrap();

        let completed = complete_game(
            &pool,
            &recent.id,
            CompleteGameRequest {
                final_score: 88,
                final_note: "windy".to_string(),
            },
        )
        .await
        .unwrap()
        .expect("Game not found");
        assert_eq!(completed.final_score, 88);
        assert!(completed.completed_at.is_some());

        let latest = latest_game_for_course(&pool, &course.id).await.unwrap().unwrap();
        assert_eq!(latest.id, recent.id);
        assert_eq!(latest.final_note, "windy");
    }

    #[tokio::test]
    async fn test_delete_is_a_tombstone() {
        let pool = setup_test_db().await;
        let (profile, course) = seed_course(&pool).await;

        assert!(delete_course(&pool, &course.id).await.unwrap());
        assert!(!delete_course(&pool, &course.id).await.unwrap());

        // Hidden from listings but still present for the next push.
        assert!(fetch_courses_for_profile(&pool, &profile.id).await.unwrap().is_empty());
        let snapshot = collect_for_push(&pool, false).await.unwrap();
        assert_eq!(snapshot.courses.len(), 1);
        assert!(snapshot.courses[0].is_deleted);
    }

    #[tokio::test]
    async fn test_mark_synced_skips_rows_edited_after_collection() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;

        let snapshot = collect_for_push(&pool, true).await.unwrap();
        assert_eq!(snapshot.profiles.len(), 1);
        assert_eq!(snapshot.courses.len(), 1);

        // Ensure a distinct timestamp for the edit.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        update_course(
            &pool,
            &course.id,
            UpdateCourseRequest {
                name: Some("Pebble Creek North".to_string()),
                rounds: None,
            },
        )
        .await
        .unwrap();

        mark_synced(&pool, &snapshot).await.unwrap();

        let pending = collect_for_push(&pool, true).await.unwrap();
        assert!(pending.profiles.is_empty());
        assert_eq!(pending.courses.len(), 1);
        assert_eq!(pending.courses[0].name, "Pebble Creek North");
    }

    #[tokio::test]
    async fn test_bulk_put_inserts_and_overwrites() {
        let pool = setup_test_db().await;
        let (profile, course) = seed_course(&pool).await;

        let mut renamed = course.clone();
        renamed.name = "Renamed remotely".to_string();
        let fresh = Course {
            id: Uuid::new_v4().to_string(),
            name: "Other device course".to_string(),
            rounds: 9,
            profile_id: profile.id.clone(),
            updated_at: String::new(),
            is_deleted: false,
            sync_state: String::new(),
        };

        bulk_put(
            &pool,
            &EntityBatch {
                courses: vec![renamed, fresh.clone()],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        let courses = fetch_courses_for_profile(&pool, &profile.id).await.unwrap();
        assert_eq!(courses.len(), 2);
        let stored = find_course_by_id(&pool, &course.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed remotely");
        assert_eq!(stored.sync_state, "synced");
        let inserted = find_course_by_id(&pool, &fresh.id).await.unwrap().unwrap();
        assert!(!inserted.updated_at.is_empty());
    }

    #[tokio::test]
    async fn test_bulk_put_replaces_hole_recorded_under_another_id() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;
        let game = insert_game(
            &pool,
            NewGameRequest {
                course_id: course.id.clone(),
                date: None,
            },
        )
        .await
        .unwrap();
        record_score(
            &pool,
            RecordScoreRequest {
                game_id: game.id.clone(),
                hole: 2,
                par: 3,
                score: 4,
                putts: 2,
            },
        )
        .await
        .unwrap();

        let remote = Score {
            id: Uuid::new_v4().to_string(),
            game_id: game.id.clone(),
            hole: 2,
            par: 3,
            score: 3,
            putts: 1,
            updated_at: now(),
            is_deleted: false,
            sync_state: String::new(),
        };
        bulk_put(
            &pool,
            &EntityBatch {
                scores: vec![remote.clone()],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        let scores = fetch_scores_for_game(&pool, &game.id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].id, remote.id);
        assert_eq!(scores[0].score, 3);
    }

    #[tokio::test]
    async fn test_bulk_put_keeps_newer_pending_edit() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;

        let mut stale = course.clone();
        stale.name = "Echo from the server".to_string();
        stale.updated_at = "2020-01-01T00:00:00+00:00".to_string();
        bulk_put(
            &pool,
            &EntityBatch {
                courses: vec![stale],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        let stored = find_course_by_id(&pool, &course.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Pebble Creek");
        assert_eq!(stored.sync_state, "pending");

        // Once acknowledged, the server copy applies whatever its timestamp.
        let snapshot = collect_for_push(&pool, true).await.unwrap();
        mark_synced(&pool, &snapshot).await.unwrap();
        let mut older = course.clone();
        older.name = "Renamed remotely".to_string();
        older.updated_at = "2020-01-01T00:00:00+00:00".to_string();
        bulk_put(
            &pool,
            &EntityBatch {
                courses: vec![older],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        let stored = find_course_by_id(&pool, &course.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Renamed remotely");
        assert_eq!(stored.sync_state, "synced");
    }

    #[tokio::test]
    async fn test_bulk_put_keeps_newer_pending_hole() {
        let pool = setup_test_db().await;
        let (_, course) = seed_course(&pool).await;
        let game = insert_game(
            &pool,
            NewGameRequest {
                course_id: course.id.clone(),
                date: None,
            },
        )
        .await
        .unwrap();
        let local = record_score(
            &pool,
            RecordScoreRequest {
                game_id: game.id.clone(),
                hole: 5,
                par: 4,
                score: 6,
                putts: 3,
            },
        )
        .await
        .unwrap();

        let stale = Score {
            id: Uuid::new_v4().to_string(),
            game_id: game.id.clone(),
            hole: 5,
            par: 4,
            score: 4,
            putts: 2,
            updated_at: "2020-01-01T00:00:00+00:00".to_string(),
            is_deleted: false,
            sync_state: String::new(),
        };
        bulk_put(
            &pool,
            &EntityBatch {
                scores: vec![stale],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        let scores = fetch_scores_for_game(&pool, &game.id).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].id, local.id);
        assert_eq!(scores[0].score, 6);
    }

    #[tokio::test]
    async fn test_bulk_put_adopts_profile_with_same_username() {
        let pool = setup_test_db().await;
        let (local, course) = seed_course(&pool).await;

        let remote = Profile {
            id: "p-other-device".to_string(),
            username: local.username.clone(),
            dob_hash: local.dob_hash.clone(),
            created_at: "2025-02-01T08:00:00+00:00".to_string(),
            last_active_at: "2025-02-01T08:00:00+00:00".to_string(),
            updated_at: "2025-02-01T08:00:00+00:00".to_string(),
            is_deleted: false,
            sync_state: String::new(),
        };
        bulk_put(
            &pool,
            &EntityBatch {
                profiles: vec![remote.clone()],
                ..EntityBatch::default()
            },
        )
        .await
        .unwrap();

        assert!(find_profile_by_id(&pool, &local.id).await.unwrap().is_none());
        let adopted = find_profile_by_username(&pool, "sam").await.unwrap().unwrap();
        assert_eq!(adopted.id, remote.id);
        assert_eq!(adopted.sync_state, "synced");

        let moved = find_course_by_id(&pool, &course.id).await.unwrap().unwrap();
        assert_eq!(moved.profile_id, remote.id);
        assert_eq!(moved.sync_state, "pending");
        assert!(fetch_courses_for_profile(&pool, &local.id).await.unwrap().is_empty());
    }
}

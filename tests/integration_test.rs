use aoi_watch::{
    db::{self, AoiStore, ChangeRecordStore, PgAoiStore, PgChangeRecordStore},
    models::change::{AnalysisWindow, NewChangeRecord},
    services::{
        detector::imagery_descriptor,
        queue::{ManualTrigger, TriggerQueue},
    },
};
use chrono::{NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run integration tests")
}

fn redis_url() -> String {
    std::env::var("REDIS_URL").expect("REDIS_URL must be set to run integration tests")
}

/// Integration test: PostgreSQL stores
///
/// Verifies against a real database:
/// 1. Migrations apply
/// 2. `list_active` returns active AOIs only, with the owner's email joined
/// 3. `update_last_checked` persists
/// 4. Change records round-trip with their imagery descriptors, newest first
///
/// Note: This requires a running PostgreSQL instance (DATABASE_URL).
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_postgres_stores() {
    let pool = db::init_pool(&database_url())
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");

    let email = format!("owner-{}@example.com", Uuid::new_v4());
    let user_id: Uuid = sqlx::query("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .expect("Failed to create user")
        .try_get("id")
        .expect("Missing user id");

    let geometry = serde_json::json!({
        "type": "Polygon",
        "coordinates": [[[77.5, 12.9], [77.51, 12.9], [77.51, 12.91], [77.5, 12.9]]]
    });

    let mut ids = Vec::new();
    for (name, status) in [("Active plot", "active"), ("Paused plot", "paused")] {
        let id: Uuid = sqlx::query(
            r#"
            INSERT INTO aois (user_id, name, geometry, change_type, status)
            VALUES ($1, $2, $3, 'deforestation', $4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(&geometry)
        .bind(status)
        .fetch_one(&pool)
        .await
        .expect("Failed to create AOI")
        .try_get("id")
        .expect("Missing AOI id");
        ids.push(id);
    }
    let (active_id, paused_id) = (ids[0], ids[1]);

    let aois = PgAoiStore::new(pool.clone());

    let active = aois.list_active().await.expect("list_active failed");
    let listed = active.iter().find(|a| a.id == active_id).expect("active AOI not listed");
    assert_eq!(listed.owner_email.as_deref(), Some(email.as_str()));
    assert_eq!(listed.geometry, geometry);
    assert!(active.iter().all(|a| a.id != paused_id));

    let checked_at = Utc::now();
    aois.update_last_checked(active_id, checked_at)
        .await
        .expect("update_last_checked failed");
    let reloaded = aois.get(active_id).await.expect("get failed").expect("AOI missing");
    let stored = reloaded.last_checked_at.expect("last_checked_at not set");
    assert!((stored - checked_at).num_milliseconds().abs() < 1);

    assert!(aois.get(Uuid::new_v4()).await.expect("get failed").is_none());

    let records = PgChangeRecordStore::new(pool.clone());
    let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
    let baseline = AnalysisWindow::new(d(2019, 1, 8), d(2023, 3, 14));
    let recent = AnalysisWindow::new(d(2024, 11, 1), d(2025, 4, 30));

    for (offset, area) in [(60, 600.0), (0, 750.0)] {
        records
            .insert(NewChangeRecord {
                aoi_id: active_id,
                user_id,
                detected_at: checked_at - chrono::Duration::seconds(offset),
                area_sq_meters: area,
                before: imagery_descriptor(&geometry, baseline),
                after: imagery_descriptor(&geometry, recent),
            })
            .await
            .expect("insert failed");
    }

    let listed = records.list_by_aoi(active_id).await.expect("list_by_aoi failed");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].area_sq_meters, 750.0);
    assert_eq!(listed[0].after.window, recent);
    assert!(listed.iter().all(|r| !r.is_read));

    // Cleanup
    sqlx::query("DELETE FROM change_records WHERE aoi_id = $1")
        .bind(active_id)
        .execute(&pool)
        .await
        .expect("Failed to delete change records");
    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("Failed to delete user");
}

/// Integration test: manual trigger queue round-trip.
///
/// Note: This requires a running Redis instance (REDIS_URL) not shared with
/// a live aoi-watch process.
#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_trigger_queue() {
    let queue = TriggerQueue::new(&redis_url()).expect("Failed to initialize trigger queue");
    queue.health_check().await.expect("Redis not reachable");

    while queue.dequeue().await.expect("dequeue failed").is_some() {}

    let first = ManualTrigger::new(Uuid::new_v4());
    let second = ManualTrigger::new(Uuid::new_v4());
    queue.enqueue(&first).await.expect("enqueue failed");
    queue.enqueue(&second).await.expect("enqueue failed");
    assert_eq!(queue.depth().await.expect("depth failed"), 2);

    // Oldest trigger comes out first.
    assert_eq!(queue.dequeue().await.expect("dequeue failed"), Some(first));
    assert_eq!(queue.dequeue().await.expect("dequeue failed"), Some(second));
    assert_eq!(queue.dequeue().await.expect("dequeue failed"), None);
}

//! Tests for the migration harness: ledger, revert, compatibility, drift.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use super::{
    DriftReport, applied_migrations, apply_down_to, apply_up, catalog, check_compatibility,
    detect_drift, schema_fingerprint,
};

async fn pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool")
}

#[tokio::test(flavor = "multi_thread")]
async fn apply_up_records_every_catalog_version() {
    let pool = pool().await;
    let applied = apply_up(&pool, "0.3.0").await.expect("apply");
    assert_eq!(applied, catalog().len());

    let ledger = applied_migrations(&pool).await.expect("ledger");
    assert_eq!(ledger.len(), catalog().len());
    for (row, migration) in ledger.iter().zip(catalog()) {
        assert_eq!(row.version, migration.version);
        assert_eq!(row.checksum, migration.checksum());
        assert_eq!(row.runtime_version, "0.3.0");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn reapplication_is_a_no_op() {
    let pool = pool().await;
    apply_up(&pool, "0.3.0").await.expect("first");
    let second = apply_up(&pool, "0.3.0").await.expect("second");
    assert_eq!(second, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn down_to_reverts_newest_first() {
    let pool = pool().await;
    apply_up(&pool, "0.3.0").await.expect("apply");

    let reverted = apply_down_to(&pool, "0.3.0").await.expect("down");
    assert_eq!(reverted, 2); // 0.5.0 and 0.4.0

    let ledger = applied_migrations(&pool).await.expect("ledger");
    assert_eq!(
        ledger.last().map(|m| m.version.clone()),
        Some("0.3.0".to_string())
    );

    // The reverted tables are gone, earlier ones remain.
    let tables: Vec<String> =
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .expect("tables")
            .iter()
            .map(|r| r.get("name"))
            .collect();
    assert!(tables.contains(&"project".to_string()));
    assert!(!tables.contains(&"task".to_string()));
    assert!(!tables.contains(&"match_record".to_string()));

    // Forward again restores everything.
    let reapplied = apply_up(&pool, "0.3.0").await.expect("reapply");
    assert_eq!(reapplied, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn compatibility_window_rejects_old_runtimes() {
    let pool = pool().await;
    apply_up(&pool, "0.3.0").await.expect("apply");

    check_compatibility(&pool, "0.3.0").await.expect("in window");
    check_compatibility(&pool, "1.0.0").await.expect("at max");
    let err = check_compatibility(&pool, "0.1.0").await.unwrap_err();
    assert!(err.to_string().contains("compatibility window"));
    let err = check_compatibility(&pool, "2.0.0").await.unwrap_err();
    assert!(err.to_string().contains("compatibility window"));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_ledger_is_compatible_with_anything() {
    let pool = pool().await;
    check_compatibility(&pool, "0.0.1").await.expect("empty ledger");
}

#[tokio::test(flavor = "multi_thread")]
async fn fingerprint_is_stable_and_input_sensitive() {
    let a = pool().await;
    let b = pool().await;
    apply_up(&a, "0.3.0").await.expect("apply");
    apply_up(&b, "0.3.0").await.expect("apply");

    let fa = schema_fingerprint(&a).await.expect("fingerprint");
    let fb = schema_fingerprint(&b).await.expect("fingerprint");
    assert_eq!(fa, fb);

    sqlx::raw_sql("CREATE TABLE rogue (id TEXT PRIMARY KEY)")
        .execute(&b)
        .await
        .expect("rogue table");
    let fb2 = schema_fingerprint(&b).await.expect("fingerprint");
    assert_ne!(fa, fb2);
}

#[tokio::test(flavor = "multi_thread")]
async fn drift_detection_flags_out_of_band_changes() {
    let pool = pool().await;
    apply_up(&pool, "0.3.0").await.expect("apply");
    assert_eq!(detect_drift(&pool).await.expect("clean"), DriftReport::Clean);

    sqlx::raw_sql("ALTER TABLE skill ADD COLUMN rogue TEXT")
        .execute(&pool)
        .await
        .expect("out-of-band DDL");
    match detect_drift(&pool).await.expect("drift") {
        DriftReport::Drifted { expected, actual } => assert_ne!(expected, actual),
        DriftReport::Clean => panic!("expected drift"),
    }
}

use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    #[tokio::test]
    async fn migrations_create_interactions_table_and_indexes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        let table_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name = 'interactions'",
        )
        .fetch_one(&pool)
        .await
        .expect("check interactions table")
        .get::<i64, _>("count");
        assert_eq!(table_count, 1);

        let index_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'index' AND name IN ('idx_interactions_hcp_name', 'idx_interactions_date', 'idx_interactions_created_at')",
        )
        .fetch_one(&pool)
        .await
        .expect("check indexes")
        .get::<i64, _>("count");
        assert_eq!(index_count, 3);
    }
}

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use fieldrep_core::{InteractionRecord, Material, Sentiment};

use super::{InteractionRepository, RepositoryError};
use crate::DbPool;

pub struct SqlInteractionRepository {
    pool: DbPool,
}

impl SqlInteractionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InteractionRow {
    id: i64,
    hcp_name: String,
    interaction_date: String,
    sentiment: String,
    materials_shared: String,
    discussion_summary: String,
    products_discussed: String,
    follow_up_date: Option<String>,
    key_insights: String,
}

impl InteractionRow {
    fn into_record(self) -> Result<InteractionRecord, RepositoryError> {
        let id = self.id;
        let corrupt = move |detail: String| RepositoryError::Corrupt { id, detail };

        let date = NaiveDate::parse_from_str(&self.interaction_date, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("bad interaction_date `{}`: {e}", self.interaction_date)))?;
        let follow_up_date = match &self.follow_up_date {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|e| corrupt(format!("bad follow_up_date `{raw}`: {e}")))?,
            ),
            None => None,
        };
        let sentiment = Sentiment::from_str(&self.sentiment)
            .map_err(|e| corrupt(e.to_string()))?;

        let raw_materials: Vec<String> = serde_json::from_str(&self.materials_shared)
            .map_err(|e| corrupt(format!("bad materials_shared json: {e}")))?;
        let mut materials_shared = std::collections::BTreeSet::new();
        for raw in raw_materials {
            materials_shared
                .insert(Material::from_str(&raw).map_err(|e| corrupt(e.to_string()))?);
        }

        let products_discussed: Vec<String> = serde_json::from_str(&self.products_discussed)
            .map_err(|e| corrupt(format!("bad products_discussed json: {e}")))?;

        let mut record = InteractionRecord {
            id: Some(self.id),
            hcp_name: self.hcp_name,
            date: Some(date),
            sentiment,
            materials_shared,
            discussion_summary: self.discussion_summary,
            products_discussed,
            follow_up_date,
            key_insights: self.key_insights,
            touched: Default::default(),
        };
        // Everything loaded from storage counts as confirmed data.
        record.derive_provenance();
        Ok(record)
    }
}

fn materials_json(record: &InteractionRecord) -> String {
    json!(record.materials_shared.iter().map(Material::as_str).collect::<Vec<_>>()).to_string()
}

fn products_json(record: &InteractionRecord) -> String {
    json!(record.products_discussed).to_string()
}

/// Pulls the required date out or refuses; repositories never invent values
/// for required fields.
fn required_date(record: &InteractionRecord) -> Result<String, RepositoryError> {
    if !record.validate_for_save().is_empty() {
        return Err(RepositoryError::Unvalidated);
    }
    match record.date {
        Some(date) => Ok(date.to_string()),
        None => Err(RepositoryError::Unvalidated),
    }
}

const SELECT_COLUMNS: &str = "id, hcp_name, interaction_date, sentiment, materials_shared, \
     discussion_summary, products_discussed, follow_up_date, key_insights";

#[async_trait]
impl InteractionRepository for SqlInteractionRepository {
    async fn save(&self, record: &InteractionRecord) -> Result<i64, RepositoryError> {
        let interaction_date = required_date(record)?;

        let result = sqlx::query(
            "INSERT INTO interactions \
             (hcp_name, interaction_date, sentiment, materials_shared, discussion_summary, \
              products_discussed, follow_up_date, key_insights) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.hcp_name.trim())
        .bind(interaction_date)
        .bind(record.sentiment.to_string())
        .bind(materials_json(record))
        .bind(&record.discussion_summary)
        .bind(products_json(record))
        .bind(record.follow_up_date.map(|d| d.to_string()))
        .bind(&record.key_insights)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn load(&self, id: i64) -> Result<InteractionRecord, RepositoryError> {
        let row: Option<InteractionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM interactions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(RepositoryError::NotFound(id))?.into_record()
    }

    async fn update(
        &self,
        id: i64,
        record: &InteractionRecord,
    ) -> Result<InteractionRecord, RepositoryError> {
        let interaction_date = required_date(record)?;

        let result = sqlx::query(
            "UPDATE interactions SET \
             hcp_name = ?, interaction_date = ?, sentiment = ?, materials_shared = ?, \
             discussion_summary = ?, products_discussed = ?, follow_up_date = ?, \
             key_insights = ?, updated_at = datetime('now') \
             WHERE id = ?",
        )
        .bind(record.hcp_name.trim())
        .bind(interaction_date)
        .bind(record.sentiment.to_string())
        .bind(materials_json(record))
        .bind(&record.discussion_summary)
        .bind(products_json(record))
        .bind(record.follow_up_date.map(|d| d.to_string()))
        .bind(&record.key_insights)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        self.load(id).await
    }

    async fn list(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<InteractionRecord>, RepositoryError> {
        let rows: Vec<InteractionRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM interactions \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ))
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InteractionRow::into_record).collect()
    }

    async fn delete(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM interactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use fieldrep_core::{Field, InteractionRecord, Material, Sentiment};

    use crate::repositories::{InteractionRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    use super::SqlInteractionRepository;

    async fn repository() -> SqlInteractionRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlInteractionRepository::new(pool)
    }

    fn saved_record() -> InteractionRecord {
        let mut record = InteractionRecord {
            hcp_name: "Dr. Smith".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, 25),
            sentiment: Sentiment::Positive,
            discussion_summary: "Discussed Product X efficacy data".to_string(),
            products_discussed: vec!["Product X".to_string()],
            ..InteractionRecord::default()
        };
        record.materials_shared.insert(Material::Brochures);
        record
    }

    #[tokio::test]
    async fn save_then_load_round_trips_with_provenance() {
        let repo = repository().await;
        let id = repo.save(&saved_record()).await.expect("save");

        let loaded = repo.load(id).await.expect("load");
        assert_eq!(loaded.id, Some(id));
        assert_eq!(loaded.hcp_name, "Dr. Smith");
        assert_eq!(loaded.sentiment, Sentiment::Positive);
        assert!(loaded.materials_shared.contains(&Material::Brochures));
        assert_eq!(loaded.products_discussed, vec!["Product X"]);
        assert!(loaded.touched.contains(&Field::HcpName), "loaded records count as confirmed");
    }

    #[tokio::test]
    async fn unvalidated_record_is_refused_before_reaching_storage() {
        let repo = repository().await;
        let record = InteractionRecord::default();

        let result = repo.save(&record).await;
        assert!(matches!(result, Err(RepositoryError::Unvalidated)));
    }

    #[tokio::test]
    async fn update_replaces_fields_and_bumps_updated_at() {
        let repo = repository().await;
        let id = repo.save(&saved_record()).await.expect("save");

        let mut changed = saved_record();
        changed.hcp_name = "Dr. John".to_string();
        changed.sentiment = Sentiment::Neutral;

        let updated = repo.update(id, &changed).await.expect("update");
        assert_eq!(updated.hcp_name, "Dr. John");
        assert_eq!(updated.sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let repo = repository().await;
        let result = repo.update(404, &saved_record()).await;
        assert!(matches!(result, Err(RepositoryError::NotFound(404))));
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let repo = repository().await;
        let first = repo.save(&saved_record()).await.expect("save first");
        let mut second_record = saved_record();
        second_record.hcp_name = "Dr. Patel".to_string();
        let second = repo.save(&second_record).await.expect("save second");

        let listed = repo.list(10, 0).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, Some(second));
        assert_eq!(listed[1].id, Some(first));
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let repo = repository().await;
        let id = repo.save(&saved_record()).await.expect("save");

        repo.delete(id).await.expect("delete");
        assert!(matches!(repo.load(id).await, Err(RepositoryError::NotFound(_))));
        assert!(matches!(repo.delete(id).await, Err(RepositoryError::NotFound(_))));
    }
}

use crate::domain::SourceId;
use crate::entities::{prelude::*, source_schedules};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set};

pub struct ScheduleRepository {
    conn: DatabaseConnection,
}

impl ScheduleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, source: SourceId) -> Result<Option<source_schedules::Model>> {
        Ok(SourceSchedules::find_by_id(source.as_str().to_string())
            .one(&self.conn)
            .await?)
    }

    pub async fn next_due_at(&self, source: SourceId) -> Result<Option<DateTime<Utc>>> {
        let Some(row) = self.get(source).await? else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&row.next_due_at)?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    pub async fn record_run(
        &self,
        source: SourceId,
        next_due_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        last_error: Option<String>,
    ) -> Result<()> {
        let active_model = source_schedules::ActiveModel {
            source_id: Set(source.as_str().to_string()),
            next_due_at: Set(next_due_at.to_rfc3339()),
            last_run_at: Set(Some(last_run_at.to_rfc3339())),
            last_error: Set(last_error),
        };

        SourceSchedules::insert(active_model)
            .on_conflict(
                OnConflict::column(source_schedules::Column::SourceId)
                    .update_columns([
                        source_schedules::Column::NextDueAt,
                        source_schedules::Column::LastRunAt,
                        source_schedules::Column::LastError,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }
}

//! SQLite implementation of the ProvenanceStore.
//!
//! One iteration (its row plus its fix rows) is written in one transaction,
//! as is one split (the split iteration, the child requirements, their
//! edges and the parent's stage change). Update and delete
//! protection is enforced by triggers in the schema.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{parse_datetime, parse_enum, parse_optional_uuid, parse_u32, parse_uuid};
use crate::domain::errors::{StorageError, StorageResult};
use crate::domain::models::{
    EvaluationSnapshot, FixApplication, Iteration, OutcomeRecord, Requirement, RequirementStage,
    SplitEdge,
};
use crate::domain::ports::{ProvenanceStore, RequirementSummary};

#[derive(Clone)]
pub struct SqliteProvenanceStore {
    pool: SqlitePool,
}

impl SqliteProvenanceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_requirement(
        tx: &mut Transaction<'_, Sqlite>,
        requirement: &Requirement,
    ) -> StorageResult<()> {
        let metadata = serde_json::to_string(&requirement.source_metadata)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"INSERT INTO requirements (id, original_text, parent_id, source_metadata, split_depth, current_stage, created_at, stage_updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(requirement.id.to_string())
        .bind(&requirement.original_text)
        .bind(requirement.parent_id.map(|id| id.to_string()))
        .bind(metadata)
        .bind(i64::from(requirement.split_depth))
        .bind(requirement.stage.as_str())
        .bind(requirement.created_at.to_rfc3339())
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_violation_or(e, StorageError::RequirementExists(requirement.id)))?;

        Ok(())
    }

    async fn insert_iteration(
        tx: &mut Transaction<'_, Sqlite>,
        requirement_id: Uuid,
        iteration: &Iteration,
    ) -> StorageResult<()> {
        let snapshot = serde_json::to_string(&iteration.snapshot)?;
        let id = requirement_id.to_string();
        let number = i64::from(iteration.iteration_number);

        sqlx::query(
            r#"INSERT INTO iterations (requirement_id, iteration_number, text_before, text_after, snapshot, ended_in_split, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(number)
        .bind(&iteration.text_before)
        .bind(&iteration.text_after)
        .bind(snapshot)
        .bind(iteration.ended_in_split)
        .bind(iteration.started_at.to_rfc3339())
        .bind(iteration.completed_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            unique_violation_or(
                e,
                StorageError::IterationExists {
                    requirement_id,
                    iteration: iteration.iteration_number,
                },
            )
        })?;

        for (position, fix) in iteration.fixes_applied.iter().enumerate() {
            sqlx::query(
                r#"INSERT INTO fix_applications (requirement_id, iteration_number, position, criterion, text_before, text_after, score_before, score_after, rebased, applied_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(&id)
            .bind(number)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(fix.criterion.as_str())
            .bind(&fix.text_before)
            .bind(&fix.text_after)
            .bind(fix.score_before)
            .bind(fix.score_after)
            .bind(fix.rebased)
            .bind(fix.applied_at.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    async fn update_stage<'e, E>(executor: E, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("UPDATE requirements SET current_stage = ?, stage_updated_at = ? WHERE id = ?")
            .bind(stage.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(requirement_id.to_string())
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::RequirementNotFound(requirement_id));
        }
        Ok(())
    }
}

/// Map a unique-constraint failure to `conflict`, anything else to a database error.
fn unique_violation_or(err: sqlx::Error, conflict: StorageError) -> StorageError {
    let unique = err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if unique {
        conflict
    } else {
        StorageError::from(err)
    }
}

const REQUIREMENT_COLUMNS: &str = r#"
    r.id, r.original_text, r.parent_id, r.source_metadata, r.split_depth, r.current_stage, r.created_at,
    (SELECT i.text_after FROM iterations i WHERE i.requirement_id = r.id
        ORDER BY i.iteration_number DESC LIMIT 1) AS current_text,
    (SELECT COUNT(*) FROM iterations i WHERE i.requirement_id = r.id) AS iteration_count
"#;

#[async_trait]
impl ProvenanceStore for SqliteProvenanceStore {
    async fn create_requirement(&self, requirement: &Requirement) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_requirement(&mut tx, requirement).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_requirement(&self, requirement_id: Uuid) -> StorageResult<Option<Requirement>> {
        let row: Option<RequirementRow> = sqlx::query_as(&format!(
            "SELECT {REQUIREMENT_COLUMNS} FROM requirements r WHERE r.id = ?"
        ))
        .bind(requirement_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Requirement::try_from).transpose()
    }

    async fn append_iteration(&self, requirement_id: Uuid, iteration: &Iteration) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_iteration(&mut tx, requirement_id, iteration).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn append_split(
        &self,
        parent_id: Uuid,
        iteration: &Iteration,
        children: &[(Requirement, String)],
    ) -> StorageResult<Vec<SplitEdge>> {
        let mut tx = self.pool.begin().await?;
        Self::insert_iteration(&mut tx, parent_id, iteration).await?;
        let mut edges = Vec::with_capacity(children.len());

        for (position, (child, rationale)) in children.iter().enumerate() {
            Self::insert_requirement(&mut tx, child).await?;

            let edge = SplitEdge {
                parent_requirement_id: parent_id,
                child_requirement_id: child.id,
                rationale: rationale.clone(),
                created_at: Utc::now(),
            };
            sqlx::query(
                r#"INSERT INTO split_edges (parent_id, child_id, position, rationale, created_at)
                   VALUES (?, ?, ?, ?, ?)"#,
            )
            .bind(parent_id.to_string())
            .bind(child.id.to_string())
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(&edge.rationale)
            .bind(edge.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| unique_violation_or(e, StorageError::ParentExists(child.id)))?;

            edges.push(edge);
        }

        Self::update_stage(&mut *tx, parent_id, RequirementStage::Split).await?;
        tx.commit().await?;
        Ok(edges)
    }

    async fn read_history(&self, requirement_id: Uuid) -> StorageResult<Vec<Iteration>> {
        let id = requirement_id.to_string();

        let iteration_rows: Vec<IterationRow> = sqlx::query_as(
            r#"SELECT iteration_number, text_before, text_after, snapshot, ended_in_split, started_at, completed_at
               FROM iterations WHERE requirement_id = ? ORDER BY iteration_number"#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let fix_rows: Vec<FixRow> = sqlx::query_as(
            r#"SELECT iteration_number, criterion, text_before, text_after, score_before, score_after, rebased, applied_at
               FROM fix_applications WHERE requirement_id = ? ORDER BY iteration_number, position"#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let mut fixes: BTreeMap<i64, Vec<FixApplication>> = BTreeMap::new();
        for row in fix_rows {
            let number = row.iteration_number;
            fixes.entry(number).or_default().push(FixApplication::try_from(row)?);
        }

        iteration_rows
            .into_iter()
            .map(|row| {
                let fixes_applied = fixes.remove(&row.iteration_number).unwrap_or_default();
                row.into_iteration(fixes_applied)
            })
            .collect()
    }

    async fn read_children(&self, requirement_id: Uuid) -> StorageResult<Vec<SplitEdge>> {
        let rows: Vec<SplitEdgeRow> = sqlx::query_as(
            "SELECT parent_id, child_id, rationale, created_at FROM split_edges WHERE parent_id = ? ORDER BY position",
        )
        .bind(requirement_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SplitEdge::try_from).collect()
    }

    async fn read_parent(&self, requirement_id: Uuid) -> StorageResult<Option<SplitEdge>> {
        let row: Option<SplitEdgeRow> = sqlx::query_as(
            "SELECT parent_id, child_id, rationale, created_at FROM split_edges WHERE child_id = ?",
        )
        .bind(requirement_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SplitEdge::try_from).transpose()
    }

    async fn set_current_stage(&self, requirement_id: Uuid, stage: RequirementStage) -> StorageResult<()> {
        Self::update_stage(&self.pool, requirement_id, stage).await
    }

    async fn append_outcome(&self, outcome: &OutcomeRecord) -> StorageResult<()> {
        let snapshot = serde_json::to_string(&outcome.snapshot)?;

        sqlx::query(
            r#"INSERT INTO outcomes (requirement_id, verdict, final_text, final_score, snapshot, iterations_executed, cancelled, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(outcome.requirement_id.to_string())
        .bind(outcome.verdict.as_str())
        .bind(&outcome.final_text)
        .bind(outcome.final_score)
        .bind(snapshot)
        .bind(i64::from(outcome.iterations_executed))
        .bind(outcome.cancelled)
        .bind(outcome.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_outcome(&self, requirement_id: Uuid) -> StorageResult<Option<OutcomeRecord>> {
        let row: Option<OutcomeRow> = sqlx::query_as(
            r#"SELECT requirement_id, verdict, final_text, final_score, snapshot, iterations_executed, cancelled, recorded_at
               FROM outcomes WHERE requirement_id = ? ORDER BY id DESC LIMIT 1"#,
        )
        .bind(requirement_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OutcomeRecord::try_from).transpose()
    }

    async fn list_requirements(&self, limit: usize) -> StorageResult<Vec<RequirementSummary>> {
        let rows: Vec<RequirementRow> = sqlx::query_as(&format!(
            "SELECT {REQUIREMENT_COLUMNS} FROM requirements r ORDER BY r.created_at DESC, r.rowid DESC LIMIT ?"
        ))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> StorageResult<RequirementSummary> {
                let iteration_count = parse_u32(row.iteration_count, "iteration_count")?;
                let requirement = Requirement::try_from(row)?;
                Ok(RequirementSummary {
                    id: requirement.id,
                    original_text: requirement.original_text,
                    current_text: requirement.current_text,
                    parent_id: requirement.parent_id,
                    split_depth: requirement.split_depth,
                    stage: requirement.stage,
                    iteration_count,
                })
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct RequirementRow {
    id: String,
    original_text: String,
    parent_id: Option<String>,
    source_metadata: String,
    split_depth: i64,
    current_stage: String,
    created_at: String,
    current_text: Option<String>,
    iteration_count: i64,
}

impl TryFrom<RequirementRow> for Requirement {
    type Error = StorageError;

    fn try_from(row: RequirementRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&row.id)?,
            current_text: row.current_text.unwrap_or_else(|| row.original_text.clone()),
            original_text: row.original_text,
            parent_id: parse_optional_uuid(row.parent_id)?,
            source_metadata: serde_json::from_str(&row.source_metadata)?,
            split_depth: parse_u32(row.split_depth, "split_depth")?,
            stage: parse_enum(&row.current_stage)?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct IterationRow {
    iteration_number: i64,
    text_before: String,
    text_after: String,
    snapshot: String,
    ended_in_split: bool,
    started_at: String,
    completed_at: String,
}

impl IterationRow {
    fn into_iteration(self, fixes_applied: Vec<FixApplication>) -> StorageResult<Iteration> {
        let snapshot: EvaluationSnapshot = serde_json::from_str(&self.snapshot)?;
        Ok(Iteration {
            iteration_number: parse_u32(self.iteration_number, "iteration_number")?,
            text_before: self.text_before,
            text_after: self.text_after,
            snapshot,
            fixes_applied,
            ended_in_split: self.ended_in_split,
            started_at: parse_datetime(&self.started_at)?,
            completed_at: parse_datetime(&self.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FixRow {
    iteration_number: i64,
    criterion: String,
    text_before: String,
    text_after: String,
    score_before: f64,
    score_after: Option<f64>,
    rebased: bool,
    applied_at: String,
}

impl TryFrom<FixRow> for FixApplication {
    type Error = StorageError;

    fn try_from(row: FixRow) -> Result<Self, Self::Error> {
        Ok(Self {
            criterion: parse_enum(&row.criterion)?,
            text_before: row.text_before,
            text_after: row.text_after,
            score_before: row.score_before,
            score_after: row.score_after,
            rebased: row.rebased,
            applied_at: parse_datetime(&row.applied_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SplitEdgeRow {
    parent_id: String,
    child_id: String,
    rationale: String,
    created_at: String,
}

impl TryFrom<SplitEdgeRow> for SplitEdge {
    type Error = StorageError;

    fn try_from(row: SplitEdgeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            parent_requirement_id: parse_uuid(&row.parent_id)?,
            child_requirement_id: parse_uuid(&row.child_id)?,
            rationale: row.rationale,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OutcomeRow {
    requirement_id: String,
    verdict: String,
    final_text: String,
    final_score: f64,
    snapshot: String,
    iterations_executed: i64,
    cancelled: bool,
    recorded_at: String,
}

impl TryFrom<OutcomeRow> for OutcomeRecord {
    type Error = StorageError;

    fn try_from(row: OutcomeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            requirement_id: parse_uuid(&row.requirement_id)?,
            verdict: parse_enum(&row.verdict)?,
            final_text: row.final_text,
            final_score: row.final_score,
            snapshot: serde_json::from_str(&row.snapshot)?,
            iterations_executed: parse_u32(row.iterations_executed, "iterations_executed")?,
            cancelled: row.cancelled,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}

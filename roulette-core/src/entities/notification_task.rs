use crate::entities::{NotificationChannel, NotificationStatus, NotificationType};
use crate::framework::DatabaseProcessor;
use crate::utils::backoff::DeliveryOutcome;
use kanau::processor::Processor;
use sqlx::types::Json;
use uuid::Uuid;

const TASK_COLUMNS: &str = r#"
    id,
    round_id,
    pairing_id,
    recipient_id,
    notification_type,
    channel,
    status,
    scheduled_for,
    sent_at,
    claimed_at,
    error_message,
    retry_count,
    variables,
    created_at
"#;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct NotificationTask {
    pub id: Uuid,
    pub round_id: Option<Uuid>,
    pub pairing_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub scheduled_for: time::OffsetDateTime,
    pub sent_at: Option<time::OffsetDateTime>,
    /// Set while a dispatcher pass holds the task in `sending`.
    pub claimed_at: Option<time::OffsetDateTime>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    /// Prepared template variables handed to the channel sender.
    pub variables: Json<serde_json::Value>,
    pub created_at: time::OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotificationTask {
    pub round_id: Option<Uuid>,
    pub pairing_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub scheduled_for: time::OffsetDateTime,
    pub variables: serde_json::Value,
}

impl NotificationTask {
    pub async fn insert(
        executor: impl sqlx::PgExecutor<'_>,
        task: &NewNotificationTask,
    ) -> Result<Uuid, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO notification_tasks
                (id, round_id, pairing_id, recipient_id, notification_type, channel,
                 status, scheduled_for, retry_count, variables)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7, 0, $8)
            RETURNING id
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(task.round_id)
        .bind(task.pairing_id)
        .bind(task.recipient_id)
        .bind(task.notification_type)
        .bind(task.channel)
        .bind(task.scheduled_for)
        .bind(Json(task.variables.clone()))
        .fetch_one(executor)
        .await
    }
}

#[derive(Debug, Clone)]
/// Insert a batch of pending tasks atomically.
pub struct InsertNotificationTasks {
    pub tasks: Vec<NewNotificationTask>,
}

impl Processor<InsertNotificationTasks> for DatabaseProcessor {
    type Output = Vec<Uuid>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertNotificationTasks")]
    async fn process(&self, cmd: InsertNotificationTasks) -> Result<Vec<Uuid>, sqlx::Error> {
        if cmd.tasks.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(cmd.tasks.len());
        for task in &cmd.tasks {
            ids.push(NotificationTask::insert(&mut *tx, task).await?);
        }
        tx.commit().await?;
        Ok(ids)
    }
}

#[derive(Debug, Clone)]
/// Atomically move due tasks to `sending` and return them.
///
/// A task is due when it is `pending` with `scheduled_for <= now`, or when it
/// has been stuck in `sending` since before `stale_before` (a dispatcher died
/// mid-delivery). Rows locked by a concurrent claim are skipped, so two
/// dispatcher passes never receive the same task.
pub struct ClaimDueNotificationTasks {
    pub now: time::OffsetDateTime,
    pub stale_before: time::OffsetDateTime,
    pub limit: i64,
}

impl Processor<ClaimDueNotificationTasks> for DatabaseProcessor {
    type Output = Vec<NotificationTask>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ClaimDueNotificationTasks")]
    async fn process(
        &self,
        cmd: ClaimDueNotificationTasks,
    ) -> Result<Vec<NotificationTask>, sqlx::Error> {
        let sql = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM notification_tasks
                WHERE (status = 'pending' AND scheduled_for <= $1)
                   OR (status = 'sending' AND claimed_at < $2)
                ORDER BY scheduled_for ASC, id ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notification_tasks
            SET status = 'sending', claimed_at = $1
            WHERE id IN (SELECT id FROM due)
            RETURNING {TASK_COLUMNS}
            "#
        );
        let mut tasks = sqlx::query_as::<_, NotificationTask>(&sql)
            .bind(cmd.now)
            .bind(cmd.stale_before)
            .bind(cmd.limit)
            .fetch_all(&self.pool)
            .await?;
        // UPDATE ... RETURNING does not keep the CTE order.
        tasks.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }
}

#[derive(Debug, Clone)]
/// Record the outcome of a delivery attempt on a claimed task.
///
/// Only a task still held by the same claim (`sending` with an unchanged
/// `claimed_at`) is updated; the returned flag is `false` when the claim was
/// lost in the meantime, including to a dispatcher that reclaimed it as stale.
pub struct SettleNotificationTask {
    pub task_id: Uuid,
    pub claimed_at: time::OffsetDateTime,
    pub outcome: DeliveryOutcome,
}

impl Processor<SettleNotificationTask> for DatabaseProcessor {
    type Output = bool;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:SettleNotificationTask")]
    async fn process(&self, cmd: SettleNotificationTask) -> Result<bool, sqlx::Error> {
        let result = match cmd.outcome {
            DeliveryOutcome::Sent { at } => {
                sqlx::query(
                    r#"
                    UPDATE notification_tasks
                    SET status = 'sent', sent_at = $3, claimed_at = NULL, error_message = NULL
                    WHERE id = $1 AND status = 'sending' AND claimed_at = $2
                    "#,
                )
                .bind(cmd.task_id)
                .bind(cmd.claimed_at)
                .bind(at)
                .execute(&self.pool)
                .await?
            }
            DeliveryOutcome::Retrying { at, attempt, error } => {
                sqlx::query(
                    r#"
                    UPDATE notification_tasks
                    SET status = 'pending',
                        scheduled_for = $3,
                        retry_count = $4,
                        error_message = $5,
                        claimed_at = NULL
                    WHERE id = $1 AND status = 'sending' AND claimed_at = $2
                    "#,
                )
                .bind(cmd.task_id)
                .bind(cmd.claimed_at)
                .bind(at)
                .bind(attempt)
                .bind(error)
                .execute(&self.pool)
                .await?
            }
            DeliveryOutcome::PermanentlyFailed { attempts, error } => {
                sqlx::query(
                    r#"
                    UPDATE notification_tasks
                    SET status = 'failed',
                        retry_count = $3,
                        error_message = $4,
                        claimed_at = NULL
                    WHERE id = $1 AND status = 'sending' AND claimed_at = $2
                    "#,
                )
                .bind(cmd.task_id)
                .bind(cmd.claimed_at)
                .bind(attempts)
                .bind(error)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, Clone)]
/// Permanently failed tasks, newest first.
pub struct ListFailedNotificationTasks {
    pub limit: i64,
    pub offset: i64,
}

impl Processor<ListFailedNotificationTasks> for DatabaseProcessor {
    type Output = Vec<NotificationTask>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListFailedNotificationTasks")]
    async fn process(
        &self,
        query: ListFailedNotificationTasks,
    ) -> Result<Vec<NotificationTask>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM notification_tasks
            WHERE status = 'failed'
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#
        );
        sqlx::query_as::<_, NotificationTask>(&sql)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(&self.pool)
            .await
    }
}

#[derive(Debug, Clone)]
/// Reset a permanently failed task so the dispatcher picks it up again.
pub struct RequeueNotificationTask {
    pub task_id: Uuid,
    pub now: time::OffsetDateTime,
}

impl Processor<RequeueNotificationTask> for DatabaseProcessor {
    type Output = Option<NotificationTask>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:RequeueNotificationTask")]
    async fn process(
        &self,
        cmd: RequeueNotificationTask,
    ) -> Result<Option<NotificationTask>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE notification_tasks
            SET status = 'pending', scheduled_for = $2, retry_count = 0, claimed_at = NULL
            WHERE id = $1 AND status = 'failed'
            RETURNING {TASK_COLUMNS}
            "#
        );
        sqlx::query_as::<_, NotificationTask>(&sql)
            .bind(cmd.task_id)
            .bind(cmd.now)
            .fetch_optional(&self.pool)
            .await
    }
}

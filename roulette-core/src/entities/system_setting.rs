/// A raw key/value row of the `system_settings` table.
///
/// Values are kept as text here; [`crate::matching::MatchingSettings`]
/// parses the keys it knows about.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SystemSetting {
    pub key: String,
    pub value: String,
}

impl SystemSetting {
    /// Every setting under the given key prefix, read in one query so a
    /// round sees a single consistent snapshot.
    pub async fn list_with_prefix(
        executor: impl sqlx::PgExecutor<'_>,
        prefix: &str,
    ) -> Result<Vec<SystemSetting>, sqlx::Error> {
        sqlx::query_as::<_, SystemSetting>(
            r#"
            SELECT key, value
            FROM system_settings
            WHERE starts_with(key, $1)
            "#,
        )
        .bind(prefix)
        .fetch_all(executor)
        .await
    }
}

use super::util::bounded;
use crate::domain_model::*;
use crate::domain_port::*;
use sqlx::MySqlPool;
use std::time::Duration;

pub struct MySqlIdentityLookup {
    pool: MySqlPool,
    op_timeout: Duration,
}

impl MySqlIdentityLookup {
    pub fn new(pool: MySqlPool, op_timeout: Duration) -> Self {
        MySqlIdentityLookup { pool, op_timeout }
    }
}

#[async_trait::async_trait]
impl IdentityLookup for MySqlIdentityLookup {
    async fn exists(&self, subject_id: SubjectId) -> Result<bool, StoreError> {
        let query = sqlx::query_scalar::<_, i64>(
            r#"
SELECT COUNT(1)
FROM subject
WHERE subject_id = ?
"#,
        )
        .bind(subject_id);
        let count: i64 = bounded(self.op_timeout, query.fetch_one(&self.pool)).await?;

        Ok(count > 0)
    }
}

use chrono::{DateTime, Duration, Utc};
use invitations_storage::{
    CreateInvitationParams, InvitationRecord, InvitationStore, ScopeId, StoreError,
    StoredInvitation, DEFAULT_CLAIM_TIMEOUT_SECS,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

type InvitationRow = (String, String, String, String, i64);

const SELECT_COLUMNS: &str = "SELECT token,scope_id,type_id,record,created_at FROM invitations";

/// Unclaimed, or claimed at or before the bound cutoff.
const AVAILABLE: &str = "(claimed=0 OR claimed_at IS NULL OR claimed_at<=?)";

pub struct SqliteInvitationStore {
    pool: SqlitePool,
    claim_timeout: Duration,
}

impl SqliteInvitationStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(backend)?;

        MIGRATOR.run(&pool).await.map_err(backend)?;

        Ok(Self {
            pool,
            claim_timeout: Duration::seconds(DEFAULT_CLAIM_TIMEOUT_SECS),
        })
    }

    /// Treat claims older than `timeout` as abandoned.
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }

    /// Claims taken at or before this instant (unix millis) have timed out.
    fn stale_cutoff(&self, now: DateTime<Utc>) -> i64 {
        (now - self.claim_timeout).timestamp_millis()
    }

    async fn fetch_unclaimed(&self, token: &str) -> Result<StoredInvitation, StoreError> {
        let row = sqlx::query_as::<_, InvitationRow>(&format!(
            "{SELECT_COLUMNS} WHERE token=? AND {AVAILABLE}"
        ))
        .bind(token)
        .bind(self.stale_cutoff(Utc::now()))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(decode_row).ok_or(StoreError::NotFound)?
    }
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode_row(
    (token, scope_id, type_id, record, created_at): InvitationRow,
) -> Result<StoredInvitation, StoreError> {
    let record: InvitationRecord = serde_json::from_str(&record).map_err(backend)?;
    let created_at = DateTime::<Utc>::from_timestamp_millis(created_at)
        .ok_or_else(|| StoreError::Backend(format!("invalid created_at: {created_at}")))?;
    Ok(StoredInvitation {
        token,
        scope_id: ScopeId(scope_id),
        type_id,
        record,
        created_at,
    })
}

#[async_trait::async_trait]
impl InvitationStore for SqliteInvitationStore {
    // ───────────────────────────── Invitations ─────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<StoredInvitation, StoreError> {
        let record = serde_json::to_string(&params.record).map_err(backend)?;
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO invitations(token,scope_id,type_id,record,created_at,claimed)
             VALUES(?,?,?,?,?,0)",
        )
        .bind(&params.token)
        .bind(&params.scope_id.0)
        .bind(&params.type_id)
        .bind(&record)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return StoreError::AlreadyExists;
                }
            }
            backend(e)
        })?;

        // Round-trip through millis so the returned row equals a later read.
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_at.timestamp_millis())
            .unwrap_or(created_at);
        Ok(StoredInvitation {
            token: params.token.clone(),
            scope_id: params.scope_id.clone(),
            type_id: params.type_id.clone(),
            record: params.record.clone(),
            created_at,
        })
    }

    async fn get_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError> {
        self.fetch_unclaimed(token).await
    }

    async fn list_invitations(
        &self,
        scope_id: &ScopeId,
    ) -> Result<Vec<StoredInvitation>, StoreError> {
        let rows = sqlx::query_as::<_, InvitationRow>(&format!(
            "{SELECT_COLUMNS} WHERE scope_id=? AND {AVAILABLE} ORDER BY created_at, rowid"
        ))
        .bind(&scope_id.0)
        .bind(self.stale_cutoff(Utc::now()))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(decode_row).collect()
    }

    async fn remove_invitation(&self, token: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM invitations WHERE token=?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ───────────────────────────── Consumption ─────────────────────────────

    async fn claim_invitation(&self, token: &str) -> Result<StoredInvitation, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let now = Utc::now();
        let res = sqlx::query(&format!(
            "UPDATE invitations SET claimed=1, claimed_at=? WHERE token=? AND {AVAILABLE}"
        ))
        .bind(now.timestamp_millis())
        .bind(token)
        .bind(self.stale_cutoff(now))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if res.rows_affected() == 0 {
            tx.rollback().await.map_err(backend)?;
            return Err(StoreError::NotFound);
        }

        let row = sqlx::query_as::<_, InvitationRow>(&format!("{SELECT_COLUMNS} WHERE token=?"))
            .bind(token)
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        decode_row(row)
    }

    async fn complete_claim(&self, token: &str) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM invitations WHERE token=? AND claimed=1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn release_claim(&self, token: &str) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE invitations SET claimed=0, claimed_at=NULL WHERE token=? AND claimed=1",
        )
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

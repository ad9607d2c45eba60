//! PostgreSQL storage implementation.
//!
//! Every ledger mutation is one statement. `try_consume` in particular is a
//! conditional `UPDATE … WHERE balance >= 1 RETURNING …`: the row lock taken
//! by the update is the serialization point, so two callers can never spend
//! the same last credit, whichever process they run in.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use quill_core::{Account, BackendSelection, PlanAssignment, PrivilegedKey, Tier, UserId};

use crate::error::{Result, StoreError};
use crate::schema::{table, ACCOUNT_COLUMNS, SELECTION_COLUMNS};
use crate::Store;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: String,
    balance: i64,
    lifetime_consumed_units: i64,
    monthly_consumed_units: i64,
    monthly_period_anchor: DateTime<Utc>,
    tier: String,
    subscription_active: bool,
    subscription_expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self> {
        let user_id =
            UserId::new(row.user_id).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tier = row
            .tier
            .parse::<Tier>()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Self {
            user_id,
            balance: row.balance,
            lifetime_consumed_units: row.lifetime_consumed_units,
            monthly_consumed_units: row.monthly_consumed_units,
            monthly_period_anchor: row.monthly_period_anchor,
            tier,
            subscription_active: row.subscription_active,
            subscription_expires_at: row.subscription_expires_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SelectionRow {
    project_ref: String,
    public_endpoint: String,
    public_key: String,
    privileged_key: String,
}

impl From<SelectionRow> for BackendSelection {
    fn from(row: SelectionRow) -> Self {
        Self {
            project_ref: row.project_ref,
            public_endpoint: row.public_endpoint,
            public_key: row.public_key,
            privileged_key: PrivilegedKey::new(row.privileged_key),
        }
    }
}

impl PgStore {
    /// Connect to PostgreSQL at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Error for a conditional update that matched no row: `NotFound` if the
    /// account is missing, otherwise the precondition failed.
    async fn explain_miss(&self, user_id: &UserId, precondition: &str) -> StoreError {
        match self.get_account(user_id).await {
            Ok(Some(_)) => StoreError::PreconditionFailed(precondition.to_string()),
            Ok(None) => StoreError::account_not_found(user_id),
            Err(e) => e,
        }
    }

    /// Run an account `UPDATE … RETURNING` and map a missing row to
    /// `NotFound`.
    async fn update_account(
        &self,
        user_id: &UserId,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, AccountRow, sqlx::postgres::PgArguments>,
    ) -> Result<Account> {
        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::account_not_found(user_id))?
            .try_into()
    }
}

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn get_account(&self, user_id: &UserId) -> Result<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM {} WHERE user_id = $1",
            table::ACCOUNTS
        );
        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(Account::try_from)
            .transpose()
    }

    async fn insert_account_if_absent(&self, account: &Account) -> Result<Account> {
        let insert = format!(
            "INSERT INTO {} ({ACCOUNT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id) DO NOTHING",
            table::ACCOUNTS
        );
        let result = sqlx::query(&insert)
            .bind(account.user_id.as_str())
            .bind(account.balance)
            .bind(account.lifetime_consumed_units)
            .bind(account.monthly_consumed_units)
            .bind(account.monthly_period_anchor)
            .bind(account.tier.as_str())
            .bind(account.subscription_active)
            .bind(account.subscription_expires_at)
            .bind(account.created_at)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            tracing::debug!(user_id = %account.user_id, "Account row inserted");
            return Ok(account.clone());
        }

        self.get_account(&account.user_id)
            .await?
            .ok_or_else(|| StoreError::account_not_found(&account.user_id))
    }

    async fn try_consume(&self, user_id: &UserId, units: i64) -> Result<Account> {
        let sql = format!(
            "UPDATE {} SET balance = balance - 1, \
                 lifetime_consumed_units = lifetime_consumed_units + $2, \
                 monthly_consumed_units = monthly_consumed_units + $2, \
                 updated_at = now() \
             WHERE user_id = $1 AND balance >= 1 \
             RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let updated = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(units)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = updated {
            return row.try_into();
        }

        // Zero rows: either no such account or no credit left.
        let balance_sql = format!("SELECT balance FROM {} WHERE user_id = $1", table::ACCOUNTS);
        let balance: Option<i64> = sqlx::query_scalar(&balance_sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match balance {
            Some(balance) => Err(StoreError::InsufficientCredits { balance }),
            None => Err(StoreError::account_not_found(user_id)),
        }
    }

    async fn reset_monthly(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Account> {
        let sql = format!(
            "UPDATE {} SET monthly_consumed_units = 0, monthly_period_anchor = $2, updated_at = $2 \
             WHERE user_id = $1 RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let query = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(now);
        self.update_account(user_id, query).await
    }

    async fn assign_plan(&self, user_id: &UserId, plan: &PlanAssignment) -> Result<Account> {
        let sql = format!(
            "UPDATE {} SET tier = $2, subscription_active = $3, subscription_expires_at = $4, \
                 balance = $5, updated_at = now() \
             WHERE user_id = $1 RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let query = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(plan.tier.as_str())
            .bind(plan.subscription_active)
            .bind(plan.subscription_expires_at)
            .bind(plan.balance);
        self.update_account(user_id, query).await
    }

    async fn extend_subscription(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<Account> {
        let sql = format!(
            "UPDATE {} SET subscription_expires_at = $2, updated_at = now() \
             WHERE user_id = $1 AND tier = $3 AND subscription_active \
             RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let renewed = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(expires_at)
            .bind(Tier::Pro.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match renewed {
            Some(row) => row.try_into(),
            None => Err(self.explain_miss(
                user_id,
                "only an active pro subscription can be renewed",
            )
            .await),
        }
    }

    async fn add_credits(&self, user_id: &UserId, amount: i64) -> Result<Account> {
        // The ceiling keeps `balance + amount` inside bigint range.
        let sql = format!(
            "UPDATE {} SET balance = balance + $2, updated_at = now() \
             WHERE user_id = $1 AND balance <= $3 RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let added = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(amount)
            .bind(i64::MAX.saturating_sub(amount.max(0)))
            .fetch_optional(&self.pool)
            .await?;

        match added {
            Some(row) => row.try_into(),
            None => Err(self.explain_miss(user_id, "balance would overflow").await),
        }
    }

    async fn expire_if_due(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
        plan: &PlanAssignment,
    ) -> Result<Option<Account>> {
        let sql = format!(
            "UPDATE {} SET tier = $3, subscription_active = $4, subscription_expires_at = $5, \
                 balance = $6, updated_at = $2 \
             WHERE user_id = $1 AND subscription_active \
               AND subscription_expires_at IS NOT NULL AND subscription_expires_at < $2 \
             RETURNING {ACCOUNT_COLUMNS}",
            table::ACCOUNTS
        );
        let expired = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(user_id.as_str())
            .bind(now)
            .bind(plan.tier.as_str())
            .bind(plan.subscription_active)
            .bind(plan.subscription_expires_at)
            .bind(plan.balance)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = expired {
            return Ok(Some(row.try_into()?));
        }

        if self.get_account(user_id).await?.is_none() {
            return Err(StoreError::account_not_found(user_id));
        }
        Ok(None)
    }

    // =========================================================================
    // Backend Selection Operations
    // =========================================================================

    async fn get_selection(&self, user_id: &UserId) -> Result<Option<BackendSelection>> {
        let sql = format!(
            "SELECT {SELECTION_COLUMNS} FROM {} WHERE user_id = $1",
            table::BACKEND_SELECTIONS
        );
        let row = sqlx::query_as::<_, SelectionRow>(&sql)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(BackendSelection::from))
    }

    async fn put_selection(&self, user_id: &UserId, selection: &BackendSelection) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (user_id, {SELECTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 project_ref = EXCLUDED.project_ref, \
                 public_endpoint = EXCLUDED.public_endpoint, \
                 public_key = EXCLUDED.public_key, \
                 privileged_key = EXCLUDED.privileged_key, \
                 updated_at = now()",
            table::BACKEND_SELECTIONS
        );
        sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(&selection.project_ref)
            .bind(&selection.public_endpoint)
            .bind(&selection.public_key)
            .bind(selection.privileged_key.expose())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_selection(&self, user_id: &UserId) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE user_id = $1",
            table::BACKEND_SELECTIONS
        );
        let result = sqlx::query(&sql)
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

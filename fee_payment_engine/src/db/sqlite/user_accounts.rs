use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{UserAccount, UserId},
    fpe_api::errors::FeeEngineError,
};

pub async fn fetch_account(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Option<UserAccount>, FeeEngineError> {
    let account = sqlx::query_as::<_, UserAccount>("SELECT * FROM user_accounts WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

/// Returns the account for `user_id`, creating an empty, active one stamped with `created_at` if there isn't one yet.
pub async fn fetch_or_create_account(
    user_id: &UserId,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserAccount, FeeEngineError> {
    let inserted = sqlx::query(
        r#"
            INSERT INTO user_accounts (user_id, created_at, updated_at) VALUES ($1, $2, $2)
            ON CONFLICT (user_id) DO NOTHING;
        "#,
    )
    .bind(user_id)
    .bind(created_at)
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() > 0 {
        debug!("🗃️ Created account record for {user_id}");
    }
    fetch_account(user_id, conn).await?.ok_or_else(|| {
        FeeEngineError::DatabaseError(format!("Account {user_id} is missing immediately after it was created"))
    })
}

/// Writes the fee bookkeeping and status of the account.
pub async fn save_account(
    account: &UserAccount,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserAccount, FeeEngineError> {
    let account = sqlx::query_as::<_, UserAccount>(
        r#"
            UPDATE user_accounts SET
                outstanding_platform_fees = $1,
                outstanding_fee_contracts = $2,
                account_status = $3,
                updated_at = $4
            WHERE user_id = $5
            RETURNING *;
        "#,
    )
    .bind(account.outstanding_platform_fees)
    .bind(Json(&account.outstanding_fee_contracts))
    .bind(account.account_status)
    .bind(now)
    .bind(&account.user_id)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

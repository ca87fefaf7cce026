use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sqlx::{Error as SqlxError, SqlitePool};

use crate::external::{InviteEmail, InviteNotifier};
use crate::id::new_uuid_v7;
use crate::model::{
    Invitation, HOUSEHOLD_NOT_FOUND, INVITES_CODE_EXHAUSTED, INVITES_INVALID_EMAIL,
    INVITES_NOT_FOUND, INVITE_STATUS_ACCEPTED, INVITE_STATUS_CANCELLED, INVITE_STATUS_PENDING,
};
use crate::time::now_ms;
use crate::{AppError, AppResult};

/// 32 characters; visually ambiguous I, O, 0 and 1 are excluded so codes
/// survive being read aloud or copied from paper.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;
const MAX_CODE_ATTEMPTS: u32 = 5;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern to compile"));

pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn validate_email(email: &str) -> AppResult<()> {
    if EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(
            AppError::new(INVITES_INVALID_EMAIL, "Invitation email address is not valid.")
                .with_context("email", email.to_string()),
        )
    }
}

/// Fires the invite email without tying its outcome to the caller. The
/// invitation row is already committed; delivery failures are only logged.
fn dispatch_invite(notifier: &dyn InviteNotifier, invite: InviteEmail) {
    let to = invite.to.clone();
    let fut = notifier.send_invite(invite);
    tokio::spawn(async move {
        if let Err(err) = fut.await {
            tracing::warn!(
                target = "larder",
                event = "invite_email_failed",
                to = %to,
                error = %err,
            );
        }
    });
}

/// Insert-with-retry against the unique code index. `next_code` is injected
/// so tests can force collisions; production use draws from `thread_rng`.
async fn issue_with(
    pool: &SqlitePool,
    household_id: &str,
    email: &str,
    mut next_code: impl FnMut() -> String,
) -> AppResult<Invitation> {
    validate_email(email)?;

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = next_code();
        let id = new_uuid_v7();
        let now = now_ms();
        let insert = sqlx::query(
            "INSERT INTO invitations (id, household_id, email, status, code, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(household_id)
        .bind(email)
        .bind(INVITE_STATUS_PENDING)
        .bind(&code)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        match insert {
            Ok(_) => {
                return Ok(Invitation {
                    id,
                    household_id: household_id.to_string(),
                    email: email.to_string(),
                    status: INVITE_STATUS_PENDING.to_string(),
                    code: Some(code),
                    created_at: now,
                    updated_at: now,
                })
            }
            Err(SqlxError::Database(db)) if db.is_unique_violation() => {
                tracing::warn!(
                    target = "larder",
                    event = "invite_code_collision",
                    attempt,
                    household_id = %household_id,
                );
            }
            Err(err) => return Err(AppError::from(err)),
        }
    }

    Err(AppError::new(
        INVITES_CODE_EXHAUSTED,
        "Could not find a free invitation code.",
    )
    .with_context("attempts", MAX_CODE_ATTEMPTS.to_string())
    .with_context("household_id", household_id.to_string()))
}

/// Issue a pending invitation and dispatch the invite email best-effort.
/// The same address may be invited repeatedly; only codes are unique.
pub async fn issue_invitation(
    pool: &SqlitePool,
    notifier: &dyn InviteNotifier,
    household_id: &str,
    email: &str,
) -> AppResult<Invitation> {
    let household = crate::household::get_household(pool, household_id)
        .await?
        .ok_or_else(|| {
            AppError::new(HOUSEHOLD_NOT_FOUND, "Household not found.")
                .with_context("household_id", household_id.to_string())
        })?;

    let invitation = issue_with(pool, household_id, email, || {
        generate_code(&mut rand::thread_rng())
    })
    .await?;

    if let Some(code) = invitation.code.clone() {
        dispatch_invite(
            notifier,
            InviteEmail {
                to: invitation.email.clone(),
                household_name: household.name,
                code,
            },
        );
    }
    Ok(invitation)
}

/// Accept a pending invitation by code and bind the user to its household.
/// Unknown, cancelled, or already-accepted codes are indistinguishable.
pub async fn accept_invitation(
    pool: &SqlitePool,
    code: &str,
    user_id: &str,
) -> AppResult<String> {
    let invitation = sqlx::query_as::<_, Invitation>(
        "SELECT id, household_id, email, status, code, created_at, updated_at \
         FROM invitations WHERE code = ? AND status = ?",
    )
    .bind(code)
    .bind(INVITE_STATUS_PENDING)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| AppError::new(INVITES_NOT_FOUND, "Invitation not found."))?;

    let now = now_ms();
    let mut tx = pool.begin().await.map_err(AppError::from)?;
    sqlx::query("UPDATE invitations SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(INVITE_STATUS_ACCEPTED)
        .bind(now)
        .bind(&invitation.id)
        .bind(INVITE_STATUS_PENDING)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

    sqlx::query(
        "INSERT INTO users (id, email, household_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?) \
         ON CONFLICT(id) DO UPDATE SET \
           household_id = excluded.household_id, \
           updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(&invitation.email)
    .bind(&invitation.household_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(AppError::from)?;
    tx.commit().await.map_err(AppError::from)?;

    tracing::info!(
        target = "larder",
        event = "invitation_accepted",
        invitation_id = %invitation.id,
        household_id = %invitation.household_id,
    );
    Ok(invitation.household_id)
}

/// Re-send the email for a pending invitation. Scoped by household id.
pub async fn resend_invitation(
    pool: &SqlitePool,
    notifier: &dyn InviteNotifier,
    household_id: &str,
    invitation_id: &str,
) -> AppResult<()> {
    let invitation = sqlx::query_as::<_, Invitation>(
        "SELECT id, household_id, email, status, code, created_at, updated_at \
         FROM invitations WHERE id = ? AND household_id = ? AND status = ?",
    )
    .bind(invitation_id)
    .bind(household_id)
    .bind(INVITE_STATUS_PENDING)
    .fetch_optional(pool)
    .await
    .map_err(AppError::from)?
    .ok_or_else(|| {
        AppError::new(INVITES_NOT_FOUND, "Invitation not found.")
            .with_context("invitation_id", invitation_id.to_string())
    })?;

    let code = invitation.code.clone().ok_or_else(|| {
        AppError::new(INVITES_NOT_FOUND, "Invitation has no code to resend.")
            .with_context("invitation_id", invitation_id.to_string())
    })?;

    sqlx::query("UPDATE invitations SET updated_at = ? WHERE id = ?")
        .bind(now_ms())
        .bind(invitation_id)
        .execute(pool)
        .await
        .map_err(AppError::from)?;

    let household = crate::household::get_household(pool, household_id).await?;
    dispatch_invite(
        notifier,
        InviteEmail {
            to: invitation.email,
            household_name: household.map(|h| h.name).unwrap_or_default(),
            code,
        },
    );
    Ok(())
}

/// Cancel a pending invitation. Scoped by household id; a foreign or
/// non-pending invitation reads as not found.
pub async fn cancel_invitation(
    pool: &SqlitePool,
    household_id: &str,
    invitation_id: &str,
) -> AppResult<()> {
    let res = sqlx::query(
        "UPDATE invitations SET status = ?, updated_at = ? \
         WHERE id = ? AND household_id = ? AND status = ?",
    )
    .bind(INVITE_STATUS_CANCELLED)
    .bind(now_ms())
    .bind(invitation_id)
    .bind(household_id)
    .bind(INVITE_STATUS_PENDING)
    .execute(pool)
    .await
    .map_err(AppError::from)?;

    if res.rows_affected() == 0 {
        return Err(AppError::new(INVITES_NOT_FOUND, "Invitation not found.")
            .with_context("invitation_id", invitation_id.to_string()));
    }
    Ok(())
}

pub async fn list_invitations(
    pool: &SqlitePool,
    household_id: &str,
) -> AppResult<Vec<Invitation>> {
    sqlx::query_as::<_, Invitation>(
        "SELECT id, household_id, email, status, code, created_at, updated_at \
         FROM invitations WHERE household_id = ? ORDER BY created_at DESC, id",
    )
    .bind(household_id)
    .fetch_all(pool)
    .await
    .map_err(AppError::from)
}

//! The atomic "message + wrapped-key + backup" commit — the single most
//! important transactional path. One transaction: ensure conversation,
//! upsert both ACL rows, insert the message, upsert the vault row,
//! optionally insert a backup row and trim retention. Fully commits or
//! fully rolls back.

use relaycore_common::models::message::SecureMessage;

use crate::repository::{backup, conversation, message, vault};

pub struct AtomicSendInput<'a> {
    pub message_id: &'a str,
    pub conversation_id: &'a str,
    pub sender_account_digest: &'a str,
    pub sender_device_id: &'a str,
    pub receiver_account_digest: &'a str,
    pub receiver_device_id: Option<&'a str>,
    pub header_json: &'a str,
    pub ciphertext_b64: &'a str,
    pub counter: i64,
    pub vault_device_id: &'a str,
    pub vault_direction: &'a str,
    pub wrapped_key_b64: &'a str,
    pub wrap_context: &'a str,
    pub dr_state_snapshot: Option<&'a str>,
    pub backup: Option<AtomicSendBackup<'a>>,
    pub backup_retain: i64,
}

pub struct AtomicSendBackup<'a> {
    pub payload_json: &'a str,
    pub with_dr_state: i64,
    pub device_label: Option<&'a str>,
    pub device_id: Option<&'a str>,
}

pub enum AtomicSendOutcome {
    Committed(SecureMessage),
    /// Unique-violation on the message id — maps to `Conflict` (409).
    Conflict,
    /// `counter` did not exceed the current per-(conversation, sender
    /// device) max — maps to `CounterTooLow` (409).
    CounterTooLow(i64),
}

pub async fn atomic_send(
    pool: &sqlx::SqlitePool,
    input: AtomicSendInput<'_>,
) -> anyhow::Result<AtomicSendOutcome> {
    let mut tx = pool.begin().await?;

    conversation::ensure_conversation(&mut tx, input.conversation_id).await?;
    conversation::upsert_acl_tx(
        &mut tx,
        input.conversation_id,
        input.sender_account_digest,
        Some(input.sender_device_id),
        relaycore_common::models::conversation::ROLE_MEMBER,
    )
    .await?;
    conversation::upsert_acl_tx(
        &mut tx,
        input.conversation_id,
        input.receiver_account_digest,
        input.receiver_device_id,
        relaycore_common::models::conversation::ROLE_MEMBER,
    )
    .await?;

    let max_counter = message::max_counter_tx(
        &mut tx,
        input.conversation_id,
        input.sender_account_digest,
        input.sender_device_id,
    )
    .await?;
    if input.counter <= max_counter {
        tx.rollback().await?;
        return Ok(AtomicSendOutcome::CounterTooLow(max_counter));
    }

    let inserted = message::insert_tx(
        &mut tx,
        input.message_id,
        input.conversation_id,
        input.sender_account_digest,
        input.sender_device_id,
        input.receiver_account_digest,
        input.receiver_device_id,
        input.header_json,
        input.ciphertext_b64,
        input.counter,
    )
    .await;

    let row = match inserted {
        Ok(row) => row,
        Err(err) if relaycore_common::error::is_unique_violation(&err) => {
            tx.rollback().await?;
            return Ok(AtomicSendOutcome::Conflict);
        }
        Err(err) => return Err(err.into()),
    };

    vault::upsert_tx(
        &mut tx,
        input.sender_account_digest,
        input.conversation_id,
        input.message_id,
        input.vault_device_id,
        input.vault_direction,
        input.wrapped_key_b64,
        input.wrap_context,
        input.dr_state_snapshot,
    )
    .await?;

    if let Some(b) = input.backup {
        let version = backup::next_version(pool, input.sender_account_digest).await?;
        sqlx::query(
            r#"
            INSERT INTO contact_secret_backups
                (account_digest, version, payload_json, with_dr_state, device_label, device_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(input.sender_account_digest)
        .bind(version)
        .bind(b.payload_json)
        .bind(b.with_dr_state)
        .bind(b.device_label)
        .bind(b.device_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM contact_secret_backups
            WHERE account_digest = ? AND id NOT IN (
                SELECT id FROM contact_secret_backups
                WHERE account_digest = ?
                ORDER BY updated_at DESC, id DESC
                LIMIT ?
            )
            "#,
        )
        .bind(input.sender_account_digest)
        .bind(input.sender_account_digest)
        .bind(input.backup_retain)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(AtomicSendOutcome::Committed(row))
}

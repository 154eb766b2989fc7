//! End-of-call accounting
//!
//! Runs once per session at teardown. Failures here are logged and swallowed;
//! accounting must never block or break the teardown path.

use crate::providers::{Providers, UsageVector};
use crate::session::{DialogState, SessionMeta};
use tracing::{info, warn};

/// Close out the call record and charge usage for the finished session.
pub async fn finalize(
    providers: &Providers,
    meta: &SessionMeta,
    dialog: &DialogState,
    duration_secs: u64,
) {
    if let Some(call_id) = &dialog.call_id {
        if let Err(err) = providers.call_log.finish(call_id, duration_secs).await {
            warn!(connection = %meta.connection_id, "failed to close call record: {err:#}");
        }
    }

    let Some(user_id) = &meta.user_id else {
        return;
    };

    let usage = UsageVector {
        duration_secs,
        synthesis_chars: dialog.synthesis_chars,
        tokens_in: dialog.tokens_in,
        tokens_out: dialog.tokens_out,
    };

    match providers
        .billing
        .charge(user_id, dialog.call_id.as_deref(), &usage)
        .await
    {
        Ok(receipt) => {
            info!(
                connection = %meta.connection_id,
                user = %user_id,
                charged = %receipt.total_charged,
                duration_secs,
                tokens_in = usage.tokens_in,
                tokens_out = usage.tokens_out,
                synthesis_chars = usage.synthesis_chars,
                "usage charged"
            );
        }
        Err(err) => {
            warn!(
                connection = %meta.connection_id,
                user = %user_id,
                "usage charge failed: {err:#}"
            );
        }
    }
}

//! Outcome handling shared by every transaction kind.

use super::state::{CoreState, Phase, TransactionCallback};
use crate::types::TransactionResult;
use tracing::{info, warn};

/// Bring the context back to idle after `result`
///
/// Runs under the context lock. Returns the callback to invoke once the lock is released.
pub(crate) fn finalize(
    id: u64,
    core: &mut CoreState,
    result: TransactionResult,
) -> Option<TransactionCallback> {
    info!(
        context = id,
        transaction = core.trans.as_str(),
        result = result.as_str(),
        http_code = core.responses.http_code(),
        "Transaction finished"
    );

    if result == TransactionResult::FormatError {
        warn!(
            context = id,
            timetoken = %core.cursor.timetoken,
            "Response format error, resetting subscribe cursor"
        );
        core.cursor.reset();
    }

    core.flags.via_post = false;
    core.flags.patch_or_delete = false;
    core.flags.cancel_requested = false;

    if core.trans.is_subscribe_family() && core.flags.auto_heartbeat_enabled {
        if let Some(link) = &core.auto_register.heartbeat {
            if let Some(slot) = link.slot {
                link.scheduler.arm_slot(slot);
            }
        }
    }

    if !core.settings.keep_alive.enabled {
        core.transport.close();
    }

    core.request = None;
    core.response = None;
    core.last_result = result;
    core.phase = Phase::Idle;
    core.callback.clone()
}

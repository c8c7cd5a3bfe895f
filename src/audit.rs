use serde_json::Value;
use uuid::Uuid;

use crate::{models::AuditEntry, state::AppState};

/// Records an audit entry. Failures are logged and never reach the caller.
pub async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };
    let result = state
        .policy
        .once("record_audit", state.store.record_audit(entry, state.clock.now()))
        .await;
    if let Err(err) = result {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}

//! Uniqueness probes for create payloads.

use crate::error::{ApiError, ErrorCode};
use crate::model::EntityMeta;
use crate::service::decode::coerce;
use crate::service::Payload;
use crate::store::Session;

/// Probe every `unique` field present in the payload against live rows.
/// The first collision fails the request.
pub async fn check_unique(session: &mut dyn Session, meta: &EntityMeta, payload: &Payload) -> Result<(), ApiError> {
    for field in meta.unique_fields() {
        let Some(raw) = payload.get(&field.name).filter(|v| !v.is_null()) else {
            continue;
        };
        let value = coerce(field.kind, raw).unwrap_or_else(|| raw.clone());
        let taken = session
            .exists_by(meta, &field.storage_name, &value)
            .await
            .map_err(|e| ApiError::new(ErrorCode::CreateGeneral).caused_by(e))?;
        if taken {
            tracing::debug!(field = %field.name, "unique value already taken");
            return Err(ApiError::with_message(
                ErrorCode::CreateDuplicate,
                format!("{} already exists", field.name),
            ));
        }
    }
    Ok(())
}

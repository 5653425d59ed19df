use crate::error::{ApiError, ErrorCode};
use crate::model::Entity;
use crate::query::plan_read;
use crate::service::expand::{plan_columns, project};
use crate::service::state::store_error;
use crate::service::{decode, validation, EntityService, Record, RequestState, Stage, Verb};
use tracing::Instrument;

impl<T: Entity> EntityService<T> {
    /// Partial update: only the supplied `partial_update` fields change.
    /// Responds with the re-fetched readable fields.
    pub async fn update(&self, id: Option<i64>, body: &[u8]) -> Result<Record, ApiError> {
        let mut state = RequestState::new(Verb::Update, &self.meta);
        let span = state.span();
        async move {
            let result = self.run_update(&mut state, id, body).await;
            state.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn run_update(&self, state: &mut RequestState, id: Option<i64>, body: &[u8]) -> Result<Record, ApiError> {
        let meta = &*self.meta;
        let id = id.ok_or_else(|| ApiError::with_message(ErrorCode::UpdateMissingField, "a positive id is required"))?;

        let mut probe = self
            .store
            .session(false)
            .await
            .map_err(store_error(ErrorCode::DbConnection))?;
        let exists = probe
            .find_by_id(meta, id, &[meta.primary_key.clone()])
            .await
            .map_err(store_error(ErrorCode::DbQuery))?;
        drop(probe);
        if exists.is_none() {
            return Err(ApiError::new(ErrorCode::UpdateNotFound));
        }

        let payload = decode::parse_payload(body)?;
        state.advance(Stage::Parsed);

        validation::check_update_fields(meta, &payload)?;
        state.advance(Stage::FieldsAuthorized);

        let coerced = decode::coerce_payload(meta, &payload).map_err(|field| {
            ApiError::with_message(ErrorCode::UpdateInvalidField, format!("invalid value for field '{}'", field))
        })?;
        state.advance(Stage::Validated);

        state.begin(self.store.as_ref(), self.options.transactional).await?;
        if let Some(hook) = &self.options.hooks.before_update {
            hook(&payload).map_err(|_| ApiError::new(ErrorCode::UpdateHookFailure))?;
        }
        state.advance(Stage::BeforeHooked);

        let session = state.session()?;
        let affected = session
            .update(meta, id, &decode::payload_to_row(meta, &coerced))
            .await
            .map_err(store_error(ErrorCode::UpdateGeneral))?;
        if affected == 0 {
            return Err(ApiError::new(ErrorCode::UpdateNotFound));
        }

        let plan = plan_read(meta, None, None).map_err(|_| ApiError::new(ErrorCode::UpdateGeneral))?;
        let row = session
            .find_by_id(meta, id, &plan_columns(meta, &plan))
            .await
            .map_err(store_error(ErrorCode::DbQuery))?
            .ok_or_else(|| ApiError::new(ErrorCode::UpdateNotFound))?;
        let record = project(meta, &plan, &row);
        state.advance(Stage::Persisted);

        if let Some(hook) = &self.options.hooks.after_update {
            hook(&payload).map_err(|_| ApiError::new(ErrorCode::UpdateHookFailure))?;
        }
        state.advance(Stage::AfterHooked);
        Ok(record)
    }
}

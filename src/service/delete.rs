use crate::error::{ApiError, ErrorCode};
use crate::model::Entity;
use crate::service::state::store_error;
use crate::service::{decode, EntityService, RequestState, Stage, Verb};
use tracing::Instrument;

impl<T: Entity> EntityService<T> {
    /// Soft delete: the row keeps existing with its deletion marker set.
    pub async fn delete(&self, id: Option<i64>) -> Result<(), ApiError> {
        let mut state = RequestState::new(Verb::Delete, &self.meta);
        let span = state.span();
        async move {
            let result = self.run_delete(&mut state, id).await;
            state.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn run_delete(&self, state: &mut RequestState, id: Option<i64>) -> Result<(), ApiError> {
        let meta = &*self.meta;
        let id = id.ok_or_else(|| ApiError::with_message(ErrorCode::DeleteMissingField, "a positive id is required"))?;

        let mut probe = self
            .store
            .session(false)
            .await
            .map_err(store_error(ErrorCode::DbConnection))?;
        let row = probe
            .find_by_id(meta, id, &[])
            .await
            .map_err(store_error(ErrorCode::DbQuery))?
            .ok_or_else(|| ApiError::new(ErrorCode::DeleteNotFound))?;
        drop(probe);
        let entity: T = decode::entity_from_row(meta, &row)
            .map_err(|e| ApiError::new(ErrorCode::DeleteGeneral).caused_by(e))?;
        state.advance(Stage::Parsed);
        state.advance(Stage::Validated);

        state.begin(self.store.as_ref(), self.options.transactional).await?;
        if let Some(hook) = &self.options.hooks.before_delete {
            hook(&entity).map_err(|_| ApiError::new(ErrorCode::DeleteHookFailure))?;
        }
        state.advance(Stage::BeforeHooked);

        let affected = state
            .session()?
            .soft_delete(meta, id)
            .await
            .map_err(store_error(ErrorCode::DeleteGeneral))?;
        if affected == 0 {
            return Err(ApiError::with_message(
                ErrorCode::DeleteGeneral,
                "row disappeared before it could be deleted",
            ));
        }
        state.advance(Stage::Persisted);

        if let Some(hook) = &self.options.hooks.after_delete {
            hook(&entity).map_err(|_| ApiError::new(ErrorCode::DeleteHookFailure))?;
        }
        state.advance(Stage::AfterHooked);
        Ok(())
    }
}

use crate::error::{ApiError, ErrorCode};
use crate::model::Entity;
use crate::service::state::store_error;
use crate::service::{decode, unique, validation, EntityService, RequestState, Stage, Verb};
use tracing::Instrument;

impl<T: Entity> EntityService<T> {
    /// Create one entity from a JSON body.
    pub async fn create(&self, body: &[u8]) -> Result<(), ApiError> {
        let mut state = RequestState::new(Verb::Create, &self.meta);
        let span = state.span();
        async move {
            let result = self.run_create(&mut state, body).await;
            state.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn run_create(&self, state: &mut RequestState, body: &[u8]) -> Result<(), ApiError> {
        let meta = &*self.meta;
        let mut payload = decode::parse_payload(body)?;
        state.advance(Stage::Parsed);

        validation::check_create_fields(meta, &payload)?;
        state.advance(Stage::FieldsAuthorized);

        validation::check_required(meta, &payload)?;
        state.advance(Stage::Validated);

        let mut probe = self
            .store
            .session(false)
            .await
            .map_err(store_error(ErrorCode::CreateGeneral))?;
        unique::check_unique(probe.as_mut(), meta, &payload).await?;
        drop(probe);
        state.advance(Stage::UniquenessChecked);

        decode::apply_defaults(meta, &mut payload);
        let mut entity: T = decode::decode_entity(meta, &payload)?;

        state.begin(self.store.as_ref(), self.options.transactional).await?;
        if let Some(hook) = &self.options.hooks.before_create {
            hook(&mut entity).map_err(|_| ApiError::new(ErrorCode::CreateHookFailure))?;
        }
        state.advance(Stage::BeforeHooked);

        let row = decode::entity_to_row(meta, &entity)
            .map_err(|e| ApiError::new(ErrorCode::CreateGeneral).caused_by(e))?;
        let stored = state
            .session()?
            .insert(meta, &row)
            .await
            .map_err(store_error(ErrorCode::CreateGeneral))?;
        let entity: T = decode::entity_from_row(meta, &stored)
            .map_err(|e| ApiError::new(ErrorCode::CreateGeneral).caused_by(e))?;
        state.advance(Stage::Persisted);

        if let Some(hook) = &self.options.hooks.after_create {
            hook(&entity).map_err(|_| ApiError::new(ErrorCode::CreateHookFailure))?;
        }
        state.advance(Stage::AfterHooked);
        Ok(())
    }
}

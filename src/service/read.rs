use crate::error::{ApiError, ErrorCode};
use crate::model::Entity;
use crate::query::{first_param, plan_read, QueryRejection};
use crate::service::expand::{expand_record, plan_columns, project, strip_helpers};
use crate::service::state::store_error;
use crate::service::{EntityService, Record, RequestState, Stage, Verb};
use tracing::Instrument;

pub(crate) fn rejection(r: QueryRejection) -> ApiError {
    ApiError::with_message(r.code(), r.to_string())
}

impl<T: Entity> EntityService<T> {
    /// Fetch one record by id. `params` may carry `fields` and `expand`.
    pub async fn read(&self, id: Option<i64>, params: &[(String, String)]) -> Result<Record, ApiError> {
        let mut state = RequestState::new(Verb::Read, &self.meta);
        let span = state.span();
        async move {
            let result = self.run_read(&mut state, id, params).await;
            state.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn run_read(
        &self,
        state: &mut RequestState,
        id: Option<i64>,
        params: &[(String, String)],
    ) -> Result<Record, ApiError> {
        let meta = &*self.meta;
        let id = id.ok_or_else(|| ApiError::new(ErrorCode::ReadInvalidId))?;
        state.advance(Stage::Parsed);

        let plan = plan_read(meta, first_param(params, "fields"), first_param(params, "expand")).map_err(rejection)?;
        state.advance(Stage::FieldsAuthorized);

        if let Some(hook) = &self.options.hooks.before_get {
            hook(&plan).map_err(|_| ApiError::new(ErrorCode::ReadHookFailure))?;
        }
        state.advance(Stage::BeforeHooked);

        state.begin(self.store.as_ref(), false).await?;
        let session = state.session()?;
        let row = session
            .find_by_id(meta, id, &plan_columns(meta, &plan))
            .await
            .map_err(store_error(ErrorCode::DbQuery))?
            .ok_or_else(|| ApiError::new(ErrorCode::ReadNotFound))?;
        let mut record = project(meta, &plan, &row);
        expand_record(session, &self.registry, meta, &plan, &mut record).await;
        state.advance(Stage::Persisted);

        if let Some(hook) = &self.options.hooks.after_get {
            hook(&mut record).map_err(|_| ApiError::new(ErrorCode::ReadHookFailure))?;
        }
        state.advance(Stage::AfterHooked);

        strip_helpers(meta, &plan, &mut record);
        Ok(record)
    }
}

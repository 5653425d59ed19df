use crate::error::{ApiError, ErrorCode};
use crate::model::Entity;
use crate::query::plan_list;
use crate::service::expand::{expand_record, plan_columns, project, strip_helpers};
use crate::service::read::rejection;
use crate::service::state::store_error;
use crate::service::{EntityService, ListPage, Pagination, Record, RequestState, Stage, Verb};
use crate::store::SelectQuery;
use tracing::Instrument;

impl<T: Entity> EntityService<T> {
    /// One page of live records matching the query-string filters.
    pub async fn list(&self, params: &[(String, String)]) -> Result<ListPage, ApiError> {
        let mut state = RequestState::new(Verb::List, &self.meta);
        let span = state.span();
        async move {
            let result = self.run_list(&mut state, params).await;
            state.finish(result).await
        }
        .instrument(span)
        .await
    }

    async fn run_list(&self, state: &mut RequestState, params: &[(String, String)]) -> Result<ListPage, ApiError> {
        let meta = &*self.meta;
        let plan = plan_list(meta, params).map_err(rejection)?;
        state.advance(Stage::Parsed);
        state.advance(Stage::FieldsAuthorized);

        if let Some(hook) = &self.options.hooks.before_list {
            hook(&plan).map_err(|_| ApiError::new(ErrorCode::ReadHookFailure))?;
        }
        state.advance(Stage::BeforeHooked);

        state.begin(self.store.as_ref(), false).await?;
        let session = state.session()?;
        let total = session
            .count(meta, &plan.filters)
            .await
            .map_err(store_error(ErrorCode::DbQuery))?;
        let query = SelectQuery {
            columns: plan_columns(meta, &plan.read),
            filters: plan.filters.clone(),
            sort: plan.sort.clone(),
            limit: Some(plan.page.per_page),
            offset: plan.page.offset(),
        };
        let rows = session
            .select(meta, &query)
            .await
            .map_err(store_error(ErrorCode::DbQuery))?;

        let mut records: Vec<Record> = rows.iter().map(|r| project(meta, &plan.read, r)).collect();
        for record in &mut records {
            expand_record(session, &self.registry, meta, &plan.read, record).await;
        }
        state.advance(Stage::Persisted);
        tracing::debug!(total, returned = records.len(), "page fetched");

        if let Some(hook) = &self.options.hooks.after_list {
            hook(records.as_mut_slice()).map_err(|_| ApiError::new(ErrorCode::ReadHookFailure))?;
        }
        state.advance(Stage::AfterHooked);

        for record in &mut records {
            strip_helpers(meta, &plan.read, record);
        }
        Ok(ListPage {
            data: records,
            pagination: Pagination {
                total,
                per_page: plan.page.per_page,
                current_page: plan.page.page,
                total_pages: plan.page.total_pages(total),
            },
        })
    }
}

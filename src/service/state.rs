//! Per-request pipeline state: stage tracking, the open session, commit/rollback.

use crate::error::{ApiError, ErrorCode};
use crate::model::EntityMeta;
use crate::store::{Session, Store, StoreError};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Create,
    Read,
    List,
    Update,
    Delete,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "get",
            Verb::List => "list",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stages in order. `Failed` is absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    Parsed,
    FieldsAuthorized,
    Validated,
    UniquenessChecked,
    BeforeHooked,
    Persisted,
    AfterHooked,
    Responded,
    Failed,
}

pub(crate) fn store_error(code: ErrorCode) -> impl FnOnce(StoreError) -> ApiError {
    move |e| ApiError::new(code).caused_by(e)
}

pub struct RequestState {
    verb: Verb,
    entity: String,
    request_id: Uuid,
    stage: Stage,
    session: Option<Box<dyn Session>>,
}

impl RequestState {
    pub fn new(verb: Verb, meta: &EntityMeta) -> Self {
        RequestState {
            verb,
            entity: meta.entity_name.clone(),
            request_id: Uuid::new_v4(),
            stage: Stage::Received,
            session: None,
        }
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "crud",
            verb = self.verb.as_str(),
            entity = %self.entity,
            request_id = %self.request_id
        )
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, stage: Stage) {
        if self.stage == Stage::Failed {
            return;
        }
        tracing::debug!(from = ?self.stage, to = ?stage, "stage");
        self.stage = stage;
    }

    /// Open the session the persistence steps run on.
    pub async fn begin(&mut self, store: &dyn Store, transactional: bool) -> Result<(), ApiError> {
        let code = if transactional {
            ErrorCode::DbTransaction
        } else {
            ErrorCode::DbConnection
        };
        let session = store.session(transactional).await.map_err(store_error(code))?;
        self.session = Some(session);
        Ok(())
    }

    pub fn session(&mut self) -> Result<&mut dyn Session, ApiError> {
        match self.session.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(ApiError::new(ErrorCode::Internal)),
        }
    }

    /// Commit on success, roll back on failure, and log the outcome.
    pub async fn finish<R>(mut self, result: Result<R, ApiError>) -> Result<R, ApiError> {
        match result {
            Ok(value) => {
                if let Some(session) = self.session.take() {
                    if let Err(e) = session.commit().await {
                        let err = ApiError::new(ErrorCode::DbTransaction).caused_by(e);
                        self.fail(&err);
                        return Err(err);
                    }
                }
                self.advance(Stage::Responded);
                Ok(value)
            }
            Err(err) => {
                if let Some(session) = self.session.take() {
                    if let Err(e) = session.rollback().await {
                        tracing::error!(error = %e, "rollback failed");
                    }
                }
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn fail(&mut self, err: &ApiError) {
        let at = self.stage;
        self.stage = Stage::Failed;
        if err.code.is_internal() {
            tracing::error!(
                code = err.code.code(),
                stage = ?at,
                detail = err.internal_detail().as_deref().unwrap_or(""),
                "request failed"
            );
        } else {
            tracing::warn!(code = err.code.code(), stage = ?at, message = %err.message, "request rejected");
        }
    }
}

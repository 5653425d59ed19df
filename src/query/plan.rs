//! Read and list plans built from query parameters against entity metadata.

use crate::error::ErrorCode;
use crate::model::EntityMeta;
use crate::query::{parse_filter_value, query_value_for_kind, Filter, FilterOp, Sort, SortOrder};
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// Parameters with a fixed meaning; everything else is a filter.
pub const RESERVED_PARAMS: &[&str] = &["page", "per_page", "fields", "expand", "sort_by", "sort_order"];

/// Structured rejection naming the first offending parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryRejection {
    #[error("field '{0}' cannot be read")]
    Field(String),
    #[error("unknown association '{0}'")]
    Association(String),
    #[error("cannot sort by '{0}'")]
    Sort(String),
    #[error("invalid value for filter '{0}'")]
    Filter(String),
}

impl QueryRejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            QueryRejection::Field(_) => ErrorCode::ReadInvalidField,
            QueryRejection::Association(_) => ErrorCode::ReadRelation,
            QueryRejection::Sort(_) => ErrorCode::ReadSort,
            QueryRejection::Filter(_) => ErrorCode::ReadFilter,
        }
    }
}

/// One association to inline, joined through a local foreign-key column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Expansion {
    pub name: String,
    pub column: String,
    /// The foreign-key column was fetched only to support this expansion.
    pub helper: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReadPlan {
    /// Logical field names, all readable, in request order.
    pub fields: Vec<String>,
    pub expand: Vec<Expansion>,
}

impl ReadPlan {
    /// Storage columns to select: requested fields plus foreign keys for expansion.
    pub fn columns(&self, meta: &EntityMeta) -> Vec<String> {
        let mut cols: Vec<String> = self
            .fields
            .iter()
            .filter_map(|f| meta.column_of(f))
            .map(str::to_string)
            .collect();
        for exp in &self.expand {
            if !cols.contains(&exp.column) {
                cols.push(exp.column.clone());
            }
        }
        cols
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: u64,
    pub per_page: u64,
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Page {
    /// `page` below 1 becomes 1; `per_page` outside [1, 100] becomes the default.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p as u64)
            .unwrap_or(DEFAULT_PAGE);
        let per_page = per_page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| (1..=MAX_PER_PAGE as i64).contains(p))
            .map(|p| p as u64)
            .unwrap_or(DEFAULT_PER_PAGE);
        Page { page, per_page }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.per_page)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListPlan {
    pub read: ReadPlan,
    pub filters: Vec<Filter>,
    pub sort: Option<Sort>,
    pub page: Page,
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.unwrap_or("").split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|o| o == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Resolve `fields` and `expand`. Unknown fields and associations are rejected.
pub fn plan_read(meta: &EntityMeta, fields: Option<&str>, expand: Option<&str>) -> Result<ReadPlan, QueryRejection> {
    let mut requested = split_list(fields);
    if let Some(bad) = requested.iter().find(|f| !meta.readable.contains(f.as_str())) {
        return Err(QueryRejection::Field(bad.clone()));
    }
    if requested.is_empty() {
        requested = meta.readable_fields().map(|f| f.name.clone()).collect();
    }

    let selected: Vec<&str> = requested.iter().filter_map(|f| meta.column_of(f)).collect();
    let mut expansions = Vec::new();
    for name in split_list(expand) {
        let assoc = meta
            .association(&name)
            .ok_or_else(|| QueryRejection::Association(name.clone()))?;
        expansions.push(Expansion {
            name: assoc.name.clone(),
            column: assoc.column.clone(),
            helper: !selected.contains(&assoc.column.as_str()),
        });
    }

    Ok(ReadPlan {
        fields: requested,
        expand: expansions,
    })
}

/// First value of a repeated query key.
pub(crate) fn first_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Build a list plan. Non-readable filter keys are dropped; a non-readable
/// `sort_by` is rejected. The first occurrence of a repeated key wins.
pub fn plan_list(meta: &EntityMeta, params: &[(String, String)]) -> Result<ListPlan, QueryRejection> {
    let page = Page::parse(first_param(params, "page"), first_param(params, "per_page"));
    let read = plan_read(meta, first_param(params, "fields"), first_param(params, "expand"))?;

    let sort = match first_param(params, "sort_by").map(str::trim).filter(|s| !s.is_empty()) {
        Some(field) => {
            let column = meta
                .column_of(field)
                .filter(|_| meta.readable.contains(field))
                .ok_or_else(|| QueryRejection::Sort(field.to_string()))?;
            Some(Sort {
                field: field.to_string(),
                column: column.to_string(),
                order: first_param(params, "sort_order").map(SortOrder::parse).unwrap_or_default(),
            })
        }
        None => None,
    };

    let mut filters: Vec<Filter> = Vec::new();
    for (key, raw) in params {
        if RESERVED_PARAMS.contains(&key.as_str()) || raw.is_empty() {
            continue;
        }
        if filters.iter().any(|f| &f.field == key) {
            continue;
        }
        let Some(field) = meta.field(key).filter(|f| f.is_column() && meta.readable.contains(key)) else {
            tracing::debug!(entity = %meta.entity_name, filter = %key, "dropping non-readable filter");
            continue;
        };
        let (op, text) = parse_filter_value(raw);
        if text.is_empty() {
            continue;
        }
        let value = match op {
            FilterOp::Eq => query_value_for_kind(field.kind, text).ok_or_else(|| QueryRejection::Filter(key.clone()))?,
            _ => serde_json::Value::String(text.to_string()),
        };
        filters.push(Filter {
            field: key.clone(),
            column: field.storage_name.clone(),
            op,
            value,
        });
    }

    Ok(ListPlan {
        read,
        filters,
        sort,
        page,
    })
}

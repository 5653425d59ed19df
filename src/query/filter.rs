//! Filter predicates and sort clauses.

use crate::model::FieldKind;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Contains,
    StartsWith,
    EndsWith,
}

/// One `column <op> value` predicate. `value` is the client value with any
/// `like:`/`start:`/`end:` prefix already stripped.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Filter {
    pub field: String,
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    /// LIKE pattern with the client text escaped, or `None` for equality.
    pub fn like_pattern(&self) -> Option<String> {
        let needle = match &self.value {
            Value::String(s) => escape_like(s),
            other => escape_like(&other.to_string()),
        };
        match self.op {
            FilterOp::Eq => None,
            FilterOp::Contains => Some(format!("%{}%", needle)),
            FilterOp::StartsWith => Some(format!("{}%", needle)),
            FilterOp::EndsWith => Some(format!("%{}", needle)),
        }
    }
}

/// Escape LIKE metacharacters so client text only ever matches literally.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split an optional match-mode prefix off a filter value.
pub fn parse_filter_value(raw: &str) -> (FilterOp, &str) {
    if let Some(rest) = raw.strip_prefix("like:") {
        (FilterOp::Contains, rest)
    } else if let Some(rest) = raw.strip_prefix("start:") {
        (FilterOp::StartsWith, rest)
    } else if let Some(rest) = raw.strip_prefix("end:") {
        (FilterOp::EndsWith, rest)
    } else {
        (FilterOp::Eq, raw)
    }
}

/// Coerce a query-string value to the column kind for equality matching.
/// Returns `None` when the text cannot represent that kind.
pub fn query_value_for_kind(kind: FieldKind, s: &str) -> Option<Value> {
    match kind {
        FieldKind::Integer => s.trim().parse::<i64>().ok().map(|n| Value::Number(n.into())),
        FieldKind::Float => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        FieldKind::Bool => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => Some(Value::String(s.to_string())),
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than `asc`/`desc` falls back to the default.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Sort {
    pub field: String,
    pub column: String,
    pub order: SortOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(op: FilterOp, v: &str) -> Filter {
        Filter {
            field: "name".into(),
            column: "name".into(),
            op,
            value: Value::String(v.into()),
        }
    }

    #[test]
    fn prefixes_select_match_mode() {
        assert_eq!(parse_filter_value("like:abc"), (FilterOp::Contains, "abc"));
        assert_eq!(parse_filter_value("start:abc"), (FilterOp::StartsWith, "abc"));
        assert_eq!(parse_filter_value("end:abc"), (FilterOp::EndsWith, "abc"));
        assert_eq!(parse_filter_value("abc"), (FilterOp::Eq, "abc"));
        assert_eq!(parse_filter_value("startle"), (FilterOp::Eq, "startle"));
    }

    #[test]
    fn like_patterns_escape_client_text() {
        assert_eq!(filter(FilterOp::Contains, "abc").like_pattern().unwrap(), "%abc%");
        assert_eq!(filter(FilterOp::StartsWith, "abc").like_pattern().unwrap(), "abc%");
        assert_eq!(filter(FilterOp::EndsWith, "abc").like_pattern().unwrap(), "%abc");
        assert_eq!(filter(FilterOp::Contains, "50%_off").like_pattern().unwrap(), "%50\\%\\_off%");
        assert!(filter(FilterOp::Eq, "abc").like_pattern().is_none());
    }

    #[test]
    fn coerces_query_values_by_kind() {
        assert_eq!(query_value_for_kind(FieldKind::Integer, "42"), Some(Value::from(42)));
        assert_eq!(query_value_for_kind(FieldKind::Integer, "x"), None);
        assert_eq!(query_value_for_kind(FieldKind::Bool, "TRUE"), Some(Value::Bool(true)));
        assert_eq!(query_value_for_kind(FieldKind::String, "42"), Some(Value::from("42")));
    }

    #[test]
    fn sort_order_defaults_to_desc() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("DESC"), SortOrder::Desc);
        assert_eq!(SortOrder::parse("sideways"), SortOrder::Desc);
    }
}

//! Error types for query compilation
use crate::schema::ColumnType;
use telemetry::FilterOperator;
use thiserror::Error;

/// Result type for query compilation.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while compiling a filter or aggregation expression.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The filter expression failed to parse
    #[error("syntax error: {0}")]
    Syntax(#[from] filterql::ParserError),

    /// The key is not present in the field registry
    #[error("key `{0}` not found")]
    KeyNotFound(String),

    /// The key is not present but a close match exists
    #[error("key `{key}` not found, did you mean `{suggestion}`?")]
    KeyNotFoundSuggestion { key: String, suggestion: String },

    /// A mapper has no physical column for the field. Callers that can
    /// fall back to the registry catch this variant.
    #[error("column not found for field `{0}`")]
    ColumnNotFound(String),

    /// A SELECT expression referenced an unknown field
    #[error("field `{0}` not found")]
    FieldNotFound(String),

    /// A SELECT expression referenced an unknown field with a close match
    #[error("field `{field}` not found, did you mean `{suggestion}`?")]
    FieldNotFoundSuggestion { field: String, suggestion: String },

    #[error("(not) between operator requires exactly two values")]
    BetweenValues,

    #[error("(not) in operator requires a list of values")]
    InValues,

    /// The operator needs a right-hand value but none was supplied
    #[error("operator `{0}` requires a value")]
    MissingValue(FilterOperator),

    #[error("exists operator is not supported for column type {0}")]
    ExistsUnsupported(ColumnType),

    /// Span-scope predicates only accept `= true`
    #[error("filter on `{0}` only supports `= true`")]
    SpanScopeFilter(String),

    /// A membership function was called without a key parameter
    #[error("function `{0}` requires a key parameter")]
    FunctionKeyMissing(String),

    /// A membership function was called without any values
    #[error("function `{0}` requires at least one value")]
    FunctionValueMissing(String),

    /// An aggregation expression could not be parsed as SQL
    #[error("failed to parse aggregation expression `{expr}`: {message}")]
    AggregationParse { expr: String, message: String },

    /// An aggregation expression parsed but could not be rewritten
    #[error("failed to rewrite `{expr}`: {source}")]
    Rewrite {
        expr: String,
        #[source]
        source: Box<QueryError>,
    },

    /// Combined failures from a batch rewrite
    #[error("{}", .0.join("; "))]
    Batch(Vec<String>),
}

impl QueryError {
    /// Wrap an error with the aggregation expression it came from.
    pub fn rewrite(expr: &str, source: QueryError) -> QueryError {
        QueryError::Rewrite {
            expr: expr.to_string(),
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message_joins_parts() {
        let err = QueryError::Batch(vec![
            "failed to rewrite `p99(x)`: key `x` not found".to_string(),
            "failed to rewrite `rate(`: bad input".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "failed to rewrite `p99(x)`: key `x` not found; failed to rewrite `rate(`: bad input"
        );
    }

    #[test]
    fn test_suggestion_message() {
        let err = QueryError::KeyNotFoundSuggestion {
            key: "service.nam".to_string(),
            suggestion: "service.name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "key `service.nam` not found, did you mean `service.name`?"
        );
    }
}

//! Filter expression compiler
//!
//! Walks the `filterql` parse tree and emits a placeholder-bound
//! condition through a signal's [`ConditionBuilder`].
use std::collections::HashSet;

use filterql::{
    AndExpression, Comparison, ComparisonOp, Function, FunctionCall, FunctionParam, OperatorToken,
    OrExpression, Primary, Query, UnaryExpression, Value,
};
use telemetry::{
    FieldKeySelector, FilterOperator, Registry, TelemetryFieldKey, TelemetryValue,
};
use tracing::warn;

use crate::error::QueryError;
use crate::fragment::{and_conds, or_conds, SqlFragment};
use crate::mapper::{suggest_correction, ConditionBuilder};

const LIKE_WITHOUT_WILDCARDS: &str = "LIKE operator used without wildcards (% or _). Consider using = operator for exact matches or add wildcards for pattern matching.";

/// Options for one compilation.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Column bare search terms are matched against.
    pub full_text_column: String,
    /// Pair positive conditions on map columns with an existence check.
    /// Map columns return the value type's default for absent keys, so
    /// aggregation predicates turn this on to avoid counting rows where
    /// the key was never set. The plain WHERE path leaves it off.
    pub exists_guards: bool,
}

impl CompileOptions {
    pub fn new(full_text_column: impl Into<String>) -> Self {
        Self {
            full_text_column: full_text_column.into(),
            exists_guards: false,
        }
    }

    pub fn with_exists_guards(mut self) -> Self {
        self.exists_guards = true;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new(config::FullTextConfig::default().column)
    }
}

/// A compiled condition: SQL text with `?` placeholders, the values bound
/// to them in order, and any non-fatal warnings raised along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFragment {
    pub sql: String,
    pub args: Vec<TelemetryValue>,
    pub warnings: Vec<String>,
}

/// Compile a filter expression to a bare condition.
pub fn compile_filter(
    dsl: &str,
    registry: &Registry,
    builder: &dyn ConditionBuilder,
    opts: &CompileOptions,
) -> Result<CompiledFragment, QueryError> {
    let query = filterql::parse(dsl)?;
    let mut compiler = Compiler {
        registry,
        builder,
        opts,
        frag: SqlFragment::new(),
        warnings: Vec::new(),
        warned_keys: HashSet::new(),
    };
    let sql = compiler.visit_query(&query)?;
    Ok(CompiledFragment {
        sql,
        args: compiler.frag.into_args(),
        warnings: compiler.warnings,
    })
}

/// Compile a filter expression to a full WHERE clause.
pub fn where_clause(
    dsl: &str,
    registry: &Registry,
    builder: &dyn ConditionBuilder,
    opts: &CompileOptions,
) -> Result<CompiledFragment, QueryError> {
    let mut fragment = compile_filter(dsl, registry, builder, opts)?;
    fragment.sql = format!("WHERE {}", fragment.sql);
    Ok(fragment)
}

pub(crate) fn literal_value(value: &Value) -> TelemetryValue {
    match value {
        Value::Text(s) | Value::Word(s) => TelemetryValue::String(s.clone()),
        Value::Number(n) => TelemetryValue::Float(*n),
        Value::Bool(b) => TelemetryValue::Bool(*b),
    }
}

/// Resolve a scalar operator token. `<=`/`>=` fold into their strict
/// variants, and negation of REGEXP/CONTAINS is ignored; both keep the
/// behavior existing queries were written against.
pub(crate) fn resolve_scalar_operator(token: OperatorToken, not: bool) -> FilterOperator {
    match token {
        OperatorToken::Eq => FilterOperator::Equal,
        OperatorToken::NotEq => FilterOperator::NotEqual,
        OperatorToken::Lt | OperatorToken::Le => FilterOperator::LessThan,
        OperatorToken::Gt | OperatorToken::Ge => FilterOperator::GreaterThan,
        OperatorToken::Like | OperatorToken::ILike => {
            if not {
                FilterOperator::NotLike
            } else {
                FilterOperator::Like
            }
        }
        OperatorToken::Regexp => FilterOperator::Regexp,
        OperatorToken::Contains => FilterOperator::Contains,
    }
}

fn has_like_wildcards(value: &TelemetryValue) -> bool {
    match value {
        TelemetryValue::String(s) => s.contains('%') || s.contains('_'),
        _ => false,
    }
}

struct Compiler<'a> {
    registry: &'a Registry,
    builder: &'a dyn ConditionBuilder,
    opts: &'a CompileOptions,
    frag: SqlFragment,
    warnings: Vec<String>,
    warned_keys: HashSet<String>,
}

impl<'a> Compiler<'a> {
    fn visit_query(&mut self, query: &Query) -> Result<String, QueryError> {
        self.visit_or(&query.expression)
    }

    fn visit_or(&mut self, expr: &OrExpression) -> Result<String, QueryError> {
        let conds = expr
            .and_expressions
            .iter()
            .map(|and| self.visit_and(and))
            .collect::<Result<Vec<_>, _>>()?;
        if conds.len() == 1 {
            Ok(conds.into_iter().next().unwrap_or_default())
        } else {
            Ok(or_conds(&conds))
        }
    }

    fn visit_and(&mut self, expr: &AndExpression) -> Result<String, QueryError> {
        let conds = expr
            .unary_expressions
            .iter()
            .map(|unary| self.visit_unary(unary))
            .collect::<Result<Vec<_>, _>>()?;
        if conds.len() == 1 {
            Ok(conds.into_iter().next().unwrap_or_default())
        } else {
            Ok(and_conds(&conds))
        }
    }

    fn visit_unary(&mut self, expr: &UnaryExpression) -> Result<String, QueryError> {
        let cond = self.visit_primary(&expr.primary)?;
        if expr.not {
            Ok(format!("NOT ({})", cond))
        } else {
            Ok(cond)
        }
    }

    fn visit_primary(&mut self, primary: &Primary) -> Result<String, QueryError> {
        match primary {
            Primary::Grouped(inner) => Ok(format!("({})", self.visit_or(inner)?)),
            Primary::Comparison(cmp) => self.visit_comparison(cmp),
            Primary::FunctionCall(call) => self.visit_function_call(call),
            Primary::FullText(ft) => Ok(self.full_text_condition(&ft.text)),
        }
    }

    fn visit_comparison(&mut self, cmp: &Comparison) -> Result<String, QueryError> {
        let keys = self.resolve_keys(&cmp.key.text)?;

        let (op, value) = match &cmp.op {
            ComparisonOp::Exists { not } => {
                let op = if *not {
                    FilterOperator::NotExists
                } else {
                    FilterOperator::Exists
                };
                (op, None)
            }
            ComparisonOp::In { not, values } => {
                let op = if *not {
                    FilterOperator::NotIn
                } else {
                    FilterOperator::In
                };
                let items = values.0.iter().map(literal_value).collect();
                (op, Some(TelemetryValue::Array(items)))
            }
            ComparisonOp::Between { not, low, high } => {
                let op = if *not {
                    FilterOperator::NotBetween
                } else {
                    FilterOperator::Between
                };
                let items = vec![literal_value(low), literal_value(high)];
                (op, Some(TelemetryValue::Array(items)))
            }
            ComparisonOp::Scalar { token, not, value } => {
                let op = resolve_scalar_operator(*token, *not);
                let value = literal_value(value);
                if matches!(token, OperatorToken::Like | OperatorToken::ILike)
                    && !has_like_wildcards(&value)
                {
                    self.warn_once(&cmp.key.text, LIKE_WITHOUT_WILDCARDS);
                }
                (op, Some(value))
            }
        };

        // one condition per physical key sharing the logical name
        let mut conds = Vec::with_capacity(keys.len());
        for key in &keys {
            let mut cond = self
                .builder
                .condition_for(key, op, value.as_ref(), &mut self.frag)?;
            if self.opts.exists_guards && self.needs_exists_guard(key, op) {
                let guard =
                    self.builder
                        .condition_for(key, FilterOperator::Exists, None, &mut self.frag)?;
                cond = format!("{} AND {}", cond, guard);
            }
            conds.push(cond);
        }
        Ok(or_conds(&conds))
    }

    fn needs_exists_guard(&self, key: &TelemetryFieldKey, op: FilterOperator) -> bool {
        if !op.add_default_exists_filter() {
            return false;
        }
        self.builder
            .column_for(key)
            .map(|c| c.column_type.is_map())
            .unwrap_or(false)
    }

    fn visit_function_call(&mut self, call: &FunctionCall) -> Result<String, QueryError> {
        let name = call.function.to_string();
        let key_text = call
            .params
            .iter()
            .find_map(|p| match p {
                FunctionParam::Key(key) => Some(key.text.clone()),
                _ => None,
            })
            .ok_or_else(|| QueryError::FunctionKeyMissing(name.clone()))?;
        let keys = self.resolve_keys(&key_text)?;

        let mut values = Vec::new();
        for param in &call.params {
            match param {
                FunctionParam::Key(_) => {}
                FunctionParam::Value(v) => values.push(literal_value(v)),
                FunctionParam::Array(list) => {
                    values.extend(list.0.iter().map(literal_value));
                }
            }
        }
        if values.is_empty() {
            return Err(QueryError::FunctionValueMissing(name));
        }

        let mut conds = Vec::with_capacity(keys.len());
        for key in &keys {
            let field = self.builder.table_field_name(key)?;
            let cond = match call.function {
                Function::Has => {
                    format!("has({}, {})", field, self.frag.var(values[0].clone()))
                }
                Function::HasAny => format!(
                    "hasAny({}, {})",
                    field,
                    self.frag.var(TelemetryValue::Array(values.clone()))
                ),
                Function::HasAll => format!(
                    "hasAll({}, {})",
                    field,
                    self.frag.var(TelemetryValue::Array(values.clone()))
                ),
                Function::HasNone => format!(
                    "NOT hasAny({}, {})",
                    field,
                    self.frag.var(TelemetryValue::Array(values.clone()))
                ),
            };
            conds.push(cond);
        }
        Ok(or_conds(&conds))
    }

    fn full_text_condition(&mut self, text: &str) -> String {
        format!(
            "(match({}, {}))",
            self.opts.full_text_column,
            self.frag.var(TelemetryValue::String(text.to_string()))
        )
    }

    /// Resolve a key token to the physical keys behind its logical name.
    fn resolve_keys(&mut self, key_text: &str) -> Result<Vec<TelemetryFieldKey>, QueryError> {
        let selector = FieldKeySelector::from_text(key_text);
        let entries: Vec<TelemetryFieldKey> = self
            .registry
            .get(&selector.name)
            .map(|keys| {
                keys.iter()
                    .filter(|entry| selector.matches(entry))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if entries.is_empty() {
            return Err(match suggest_correction(&selector.name, self.registry.keys()) {
                Some(suggestion) => QueryError::KeyNotFoundSuggestion {
                    key: selector.name,
                    suggestion,
                },
                None => QueryError::KeyNotFound(selector.name),
            });
        }
        if entries.len() > 1 {
            self.warn_once(
                &selector.name,
                "name maps to multiple physical fields; conditions are OR-joined across all of them",
            );
        }
        Ok(entries)
    }

    fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned_keys.insert(format!("{}:{}", key, message)) {
            warn!(key = %key, "{}", message);
            self.warnings.push(format!("key `{}`: {}", key, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::SpanConditionBuilder;
    use config::ClickHouseConfig;
    use telemetry::{FieldContext, FieldDataType, Signal};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.insert(
            "service.name".to_string(),
            vec![TelemetryFieldKey::new(
                "service.name",
                Signal::Traces,
                FieldContext::Resource,
                FieldDataType::String,
            )],
        );
        registry.insert(
            "http.status_code".to_string(),
            vec![
                TelemetryFieldKey::new(
                    "http.status_code",
                    Signal::Traces,
                    FieldContext::Attribute,
                    FieldDataType::Float64,
                ),
                TelemetryFieldKey::new(
                    "http.status_code",
                    Signal::Traces,
                    FieldContext::Attribute,
                    FieldDataType::String,
                ),
            ],
        );
        registry
    }

    fn compile(dsl: &str) -> CompiledFragment {
        let builder = SpanConditionBuilder::new(ClickHouseConfig::default());
        where_clause(dsl, &registry(), &builder, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_single_condition_keeps_comparison_wrap() {
        let fragment = compile("service.name = 'redis'");
        assert_eq!(fragment.sql, "WHERE (resources_string['service.name'] = ?)");
        assert_eq!(fragment.args, vec![TelemetryValue::from("redis")]);
    }

    #[test]
    fn test_ambiguous_key_fans_out() {
        let fragment = compile("http.status_code = 200");
        assert_eq!(
            fragment.sql,
            "WHERE (attributes_number['http.status_code'] = ? OR toFloat64OrNull(attributes_string['http.status_code']) = ?)"
        );
        assert_eq!(
            fragment.args,
            vec![TelemetryValue::from(200.0), TelemetryValue::from(200.0)]
        );
    }

    #[test]
    fn test_unknown_key_suggests_correction() {
        let builder = SpanConditionBuilder::new(ClickHouseConfig::default());
        let err = where_clause(
            "service.nam = 'redis'",
            &registry(),
            &builder,
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::KeyNotFoundSuggestion { .. }));
    }

    #[test]
    fn test_like_without_wildcards_warns_once() {
        let fragment = compile("service.name LIKE 'redis' AND service.name LIKE 'postgres'");
        assert_eq!(fragment.warnings.len(), 1);
        assert!(fragment.warnings[0].contains("without wildcards"));
    }

    #[test]
    fn test_ge_folds_to_strict_comparison() {
        let fragment = compile("http.status_code >= 500");
        assert!(fragment.sql.contains("attributes_number['http.status_code'] > ?"));
    }
}

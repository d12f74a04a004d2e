//! Field mapper and condition builder for the resource fingerprint table
//!
//! The fingerprint table stores every resource attribute of a fingerprint
//! in a single `labels` string. Conditions extract the attribute with
//! `simpleJSONExtractString` and pair it with cheap substring hints on the
//! raw `labels` text so ClickHouse can skip rows before parsing JSON.
//! Conditions on anything other than resource attributes cannot be pushed
//! down to this table and compile to `true`.
use crate::compiler::{literal_value, resolve_scalar_operator, CompiledFragment};
use crate::error::QueryError;
use crate::fragment::SqlFragment;
use crate::mapper::FieldMapper;
use crate::schema::{Column, ColumnType};
use filterql::{
    AndExpression, Comparison, ComparisonOp, OrExpression, Primary, UnaryExpression,
};
use telemetry::{
    field_key_from_text, FieldContext, FilterOperator, Registry, TelemetryFieldKey, TelemetryValue,
};

const LABELS: Column = Column::new("labels", ColumnType::String);

fn extract_field(name: &str) -> String {
    format!("simpleJSONExtractString(labels, '{}')", name)
}

fn name_hint(name: &str) -> TelemetryValue {
    TelemetryValue::String(format!("%{}%", name))
}

fn exact_hint(name: &str, value: &TelemetryValue) -> TelemetryValue {
    TelemetryValue::String(format!("%{}\":\"{}%", name, value))
}

fn like_hint(name: &str, value: &TelemetryValue) -> TelemetryValue {
    TelemetryValue::String(format!("%{}%{}%", name, value))
}

/// Field mapper for the fingerprint table.
#[derive(Debug, Default)]
pub struct ResourceFieldMapper;

impl ResourceFieldMapper {
    pub fn new() -> Self {
        Self
    }
}

impl FieldMapper for ResourceFieldMapper {
    fn column_for(&self, _key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        Ok(LABELS)
    }

    fn field_for(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        Ok(extract_field(&key.name))
    }

    fn is_static_field(&self, _name: &str) -> bool {
        false
    }

    fn default_context(&self) -> FieldContext {
        FieldContext::Resource
    }
}

/// Render one resource-attribute condition with its labels hints.
fn condition_for(
    name: &str,
    op: FilterOperator,
    value: Option<&TelemetryValue>,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let field = extract_field(name);

    if matches!(op, FilterOperator::Exists | FilterOperator::NotExists) {
        let has = format!("simpleJSONHas(labels, '{}')", name);
        return Ok(if op == FilterOperator::Exists {
            let check = frag.eq(&has, TelemetryValue::Bool(true));
            let hint = frag.like("labels", name_hint(name));
            format!("({} AND {})", check, hint)
        } else {
            format!("({})", frag.ne(&has, TelemetryValue::Bool(true)))
        });
    }

    let value = value.cloned().ok_or(QueryError::MissingValue(op))?;
    let cond = match op {
        FilterOperator::Equal => {
            let exact = exact_hint(name, &value);
            let eq = frag.eq(&field, value);
            let present = frag.like("labels", name_hint(name));
            let hint = frag.like("labels", exact);
            format!("({} AND {} AND {})", eq, present, hint)
        }
        FilterOperator::NotEqual => {
            let exact = exact_hint(name, &value);
            let ne = frag.ne(&field, value);
            let hint = frag.not_like("labels", exact);
            format!("({} AND {})", ne, hint)
        }
        FilterOperator::Like | FilterOperator::ILike => {
            let fuzzy = like_hint(name, &value);
            let like = frag.ilike(&field, value);
            let present = frag.like("labels", name_hint(name));
            let hint = frag.ilike("labels", fuzzy);
            format!("({} AND {} AND {})", like, present, hint)
        }
        FilterOperator::NotLike | FilterOperator::NotILike => {
            let fuzzy = like_hint(name, &value);
            let not_like = frag.not_ilike(&field, value);
            let hint = frag.not_ilike("labels", fuzzy);
            format!("({} AND {})", not_like, hint)
        }
        FilterOperator::Contains => {
            let fuzzy = like_hint(name, &value);
            let wrapped = TelemetryValue::String(format!("%{}%", value));
            let like = frag.ilike(&field, wrapped);
            let present = frag.like("labels", name_hint(name));
            let hint = frag.ilike("labels", fuzzy);
            format!("({} AND {} AND {})", like, present, hint)
        }
        FilterOperator::NotContains => {
            let fuzzy = like_hint(name, &value);
            let wrapped = TelemetryValue::String(format!("%{}%", value));
            let not_like = frag.not_ilike(&field, wrapped);
            let hint = frag.not_ilike("labels", fuzzy);
            format!("({} AND {})", not_like, hint)
        }
        FilterOperator::Regexp => {
            let m = format!("match({}, {})", field, frag.var(value));
            let present = frag.like("labels", name_hint(name));
            format!("({} AND {})", m, present)
        }
        FilterOperator::NotRegexp => {
            format!("(not match({}, {}))", field, frag.var(value))
        }
        FilterOperator::In => {
            let items = match value {
                TelemetryValue::Array(items) if !items.is_empty() => items,
                _ => return Err(QueryError::InValues),
            };
            let eqs: Vec<String> = items
                .iter()
                .map(|v| frag.eq(&field, v.clone()))
                .collect();
            let present = frag.like("labels", name_hint(name));
            let hints: Vec<String> = items
                .iter()
                .map(|v| frag.like("labels", exact_hint(name, v)))
                .collect();
            format!(
                "(({}) AND {} AND ({}))",
                eqs.join(" OR "),
                present,
                hints.join(" OR ")
            )
        }
        FilterOperator::NotIn => {
            let items = match value {
                TelemetryValue::Array(items) if !items.is_empty() => items,
                _ => return Err(QueryError::InValues),
            };
            let nes: Vec<String> = items
                .iter()
                .map(|v| frag.ne(&field, v.clone()))
                .collect();
            let hints: Vec<String> = items
                .iter()
                .map(|v| frag.not_like("labels", exact_hint(name, v)))
                .collect();
            format!("(({}) AND ({}))", nes.join(" AND "), hints.join(" AND "))
        }
        FilterOperator::GreaterThan => format!(
            "({} AND {})",
            frag.gt(&field, value),
            frag.like("labels", name_hint(name))
        ),
        FilterOperator::GreaterThanOrEq => format!(
            "({} AND {})",
            frag.ge(&field, value),
            frag.like("labels", name_hint(name))
        ),
        FilterOperator::LessThan => format!(
            "({} AND {})",
            frag.lt(&field, value),
            frag.like("labels", name_hint(name))
        ),
        FilterOperator::LessThanOrEq => format!(
            "({} AND {})",
            frag.le(&field, value),
            frag.like("labels", name_hint(name))
        ),
        FilterOperator::Between => {
            let (low, high) = match value {
                TelemetryValue::Array(items) if items.len() == 2 => {
                    (items[0].clone(), items[1].clone())
                }
                _ => return Err(QueryError::BetweenValues),
            };
            format!(
                "({} AND {})",
                frag.between(&field, low, high),
                frag.like("labels", name_hint(name))
            )
        }
        FilterOperator::NotBetween => {
            let (low, high) = match value {
                TelemetryValue::Array(items) if items.len() == 2 => {
                    (items[0].clone(), items[1].clone())
                }
                _ => return Err(QueryError::BetweenValues),
            };
            format!("({})", frag.not_between(&field, low, high))
        }
        FilterOperator::Exists | FilterOperator::NotExists => unreachable!("handled above"),
    };
    Ok(cond)
}

/// Compile a filter expression into a pre-filter condition over the
/// fingerprint table. Sub-expressions that reference anything other than
/// resource attributes collapse to `true`: an OR containing one becomes
/// unfilterable, an AND simply drops it.
pub fn resource_filter_condition(
    dsl: &str,
    registry: &Registry,
) -> Result<CompiledFragment, QueryError> {
    let query = filterql::parse(dsl)?;
    let mut frag = SqlFragment::new();
    let sql = visit_or(&query.expression, registry, &mut frag)?;
    Ok(CompiledFragment {
        sql,
        args: frag.into_args(),
        warnings: Vec::new(),
    })
}

fn visit_or(
    expr: &OrExpression,
    registry: &Registry,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let mut conds = Vec::with_capacity(expr.and_expressions.len());
    for and in &expr.and_expressions {
        let cond = visit_and(and, registry, frag)?;
        if cond == "true" {
            // one unfilterable branch makes the whole OR unfilterable
            return Ok("true".to_string());
        }
        conds.push(cond);
    }
    if conds.len() == 1 {
        Ok(conds.into_iter().next().unwrap_or_default())
    } else {
        Ok(format!("({})", conds.join(" OR ")))
    }
}

fn visit_and(
    expr: &AndExpression,
    registry: &Registry,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let mut conds = Vec::with_capacity(expr.unary_expressions.len());
    for unary in &expr.unary_expressions {
        let cond = visit_unary(unary, registry, frag)?;
        if cond != "true" {
            conds.push(cond);
        }
    }
    match conds.len() {
        0 => Ok("true".to_string()),
        1 => Ok(conds.into_iter().next().unwrap_or_default()),
        _ => Ok(format!("({})", conds.join(" AND "))),
    }
}

fn visit_unary(
    expr: &UnaryExpression,
    registry: &Registry,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let cond = visit_primary(&expr.primary, registry, frag)?;
    if expr.not {
        if cond == "true" {
            Ok("true".to_string())
        } else {
            Ok(format!("NOT ({})", cond))
        }
    } else {
        Ok(cond)
    }
}

fn visit_primary(
    primary: &Primary,
    registry: &Registry,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    match primary {
        Primary::Grouped(inner) => visit_or(inner, registry, frag),
        Primary::Comparison(cmp) => visit_comparison(cmp, registry, frag),
        // free-text and membership functions never touch resource labels
        Primary::FunctionCall(_) | Primary::FullText(_) => Ok("true".to_string()),
    }
}

fn visit_comparison(
    cmp: &Comparison,
    registry: &Registry,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let selector = field_key_from_text(&cmp.key.text);
    let is_resource = registry
        .get(&selector.name)
        .map(|entries| {
            entries
                .iter()
                .any(|e| e.field_context == FieldContext::Resource)
        })
        .unwrap_or(false)
        || selector.field_context == FieldContext::Resource;
    if !is_resource {
        return Ok("true".to_string());
    }

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
            (
                op,
                Some(TelemetryValue::Array(vec![
                    literal_value(low),
                    literal_value(high),
                ])),
            )
        }
        ComparisonOp::Scalar { token, not, value } => (
            resolve_scalar_operator(*token, *not),
            Some(literal_value(value)),
        ),
    };

    condition_for(&selector.name, op, value.as_ref(), frag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry::{FieldDataType, Signal};

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
            "http.request.method".to_string(),
            vec![TelemetryFieldKey::new(
                "http.request.method",
                Signal::Traces,
                FieldContext::Attribute,
                FieldDataType::String,
            )],
        );
        registry
    }

    #[test]
    fn test_equal_pairs_extract_with_hints() {
        let fragment =
            resource_filter_condition("service.name = 'redis-manual'", &registry()).unwrap();
        assert_eq!(
            fragment.sql,
            "(simpleJSONExtractString(labels, 'service.name') = ? AND labels LIKE ? AND labels LIKE ?)"
        );
        assert_eq!(
            fragment.args,
            vec![
                TelemetryValue::from("redis-manual"),
                TelemetryValue::from("%service.name%"),
                TelemetryValue::from("%service.name\":\"redis-manual%"),
            ]
        );
    }

    #[test]
    fn test_and_of_two_resource_conditions() {
        let fragment = resource_filter_condition(
            "service.name = 'redis' AND service.name = 'postgres'",
            &registry(),
        )
        .unwrap();
        assert!(fragment.sql.starts_with("(("));
        assert!(fragment.sql.contains(") AND ("));
    }

    #[test]
    fn test_or_with_attribute_collapses_to_true() {
        let fragment = resource_filter_condition(
            "service.name = 'redis' OR http.request.method = 'GET'",
            &registry(),
        )
        .unwrap();
        assert_eq!(fragment.sql, "true");
        assert!(fragment.args.is_empty());
    }

    #[test]
    fn test_and_with_attribute_drops_the_attribute() {
        let fragment = resource_filter_condition(
            "service.name = 'redis' AND http.request.method = 'GET'",
            &registry(),
        )
        .unwrap();
        assert_eq!(
            fragment.sql,
            "(simpleJSONExtractString(labels, 'service.name') = ? AND labels LIKE ? AND labels LIKE ?)"
        );
    }

    #[test]
    fn test_like_keeps_wildcards_in_hint() {
        let fragment =
            resource_filter_condition("service.name LIKE 'redis%'", &registry()).unwrap();
        assert_eq!(
            fragment.sql,
            "(LOWER(simpleJSONExtractString(labels, 'service.name')) LIKE LOWER(?) AND labels LIKE ? AND LOWER(labels) LIKE LOWER(?))"
        );
        assert_eq!(
            fragment.args,
            vec![
                TelemetryValue::from("redis%"),
                TelemetryValue::from("%service.name%"),
                TelemetryValue::from("%service.name%redis%%"),
            ]
        );
    }

    #[test]
    fn test_in_expands_with_hints() {
        let fragment = resource_filter_condition(
            "service.name IN ('redis', 'postgres')",
            &registry(),
        )
        .unwrap();
        assert_eq!(
            fragment.sql,
            "((simpleJSONExtractString(labels, 'service.name') = ? OR simpleJSONExtractString(labels, 'service.name') = ?) AND labels LIKE ? AND (labels LIKE ? OR labels LIKE ?))"
        );
    }

    #[test]
    fn test_not_in_expands_with_negative_hints() {
        let fragment = resource_filter_condition(
            "service.name NOT IN ('redis', 'postgres')",
            &registry(),
        )
        .unwrap();
        assert_eq!(
            fragment.sql,
            "((simpleJSONExtractString(labels, 'service.name') <> ? AND simpleJSONExtractString(labels, 'service.name') <> ?) AND (labels NOT LIKE ? AND labels NOT LIKE ?))"
        );
    }

    #[test]
    fn test_exists_and_not_exists() {
        let fragment =
            resource_filter_condition("service.name EXISTS", &registry()).unwrap();
        assert_eq!(
            fragment.sql,
            "(simpleJSONHas(labels, 'service.name') = ? AND labels LIKE ?)"
        );

        let fragment =
            resource_filter_condition("service.name NOT EXISTS", &registry()).unwrap();
        assert_eq!(fragment.sql, "(simpleJSONHas(labels, 'service.name') <> ?)");
        assert_eq!(fragment.args, vec![TelemetryValue::Bool(true)]);
    }

    #[test]
    fn test_not_equal_drops_presence_hint() {
        let fragment =
            resource_filter_condition("service.name != 'redis'", &registry()).unwrap();
        assert_eq!(
            fragment.sql,
            "(simpleJSONExtractString(labels, 'service.name') <> ? AND labels NOT LIKE ?)"
        );
        assert_eq!(
            fragment.args,
            vec![
                TelemetryValue::from("redis"),
                TelemetryValue::from("%service.name\":\"redis%"),
            ]
        );
    }

    #[test]
    fn test_full_text_cannot_prefilter() {
        let fragment = resource_filter_condition("error", &registry()).unwrap();
        assert_eq!(fragment.sql, "true");
    }
}

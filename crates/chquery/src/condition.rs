//! Shared operator-to-SQL lowering for the map/column backed signals
use crate::error::QueryError;
use crate::fragment::{and_conds, or_conds, SqlFragment};
use crate::schema::{Column, ColumnType};
use telemetry::{
    collision_handled_field, materialized_exists_column_name, FilterOperator, TelemetryFieldKey,
    TelemetryValue,
};

/// Render one condition for a field that lives in a regular column or a
/// map column. The trace and log builders both dispatch here once they
/// have resolved the column and the left-hand expression.
pub(crate) fn build_condition(
    column: Column,
    field: String,
    key: &TelemetryFieldKey,
    op: FilterOperator,
    value: Option<&TelemetryValue>,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    if matches!(op, FilterOperator::Exists | FilterOperator::NotExists) {
        return exists_condition(column, key, op, frag);
    }

    let value = value.cloned().ok_or(QueryError::MissingValue(op))?;
    // reconcile mismatched key/value data types before any operator
    let (field, value) = collision_handled_field(key, value, field);

    let cond = match op {
        FilterOperator::Equal => frag.eq(&field, value),
        FilterOperator::NotEqual => frag.ne(&field, value),
        FilterOperator::GreaterThan => frag.gt(&field, value),
        FilterOperator::GreaterThanOrEq => frag.ge(&field, value),
        FilterOperator::LessThan => frag.lt(&field, value),
        FilterOperator::LessThanOrEq => frag.le(&field, value),
        FilterOperator::Like => frag.like(&field, value),
        FilterOperator::NotLike => frag.not_like(&field, value),
        FilterOperator::ILike => frag.ilike(&field, value),
        FilterOperator::NotILike => frag.not_ilike(&field, value),
        FilterOperator::Contains => {
            let wrapped = TelemetryValue::String(format!("%{}%", value));
            frag.ilike(&field, wrapped)
        }
        FilterOperator::NotContains => {
            let wrapped = TelemetryValue::String(format!("%{}%", value));
            frag.not_ilike(&field, wrapped)
        }
        FilterOperator::Regexp => format!("(match({}, {}))", field, frag.var(value)),
        FilterOperator::NotRegexp => format!("(not match({}, {}))", field, frag.var(value)),
        FilterOperator::In => {
            let items = value_list(value)?;
            let conds: Vec<String> = items.into_iter().map(|v| frag.eq(&field, v)).collect();
            or_conds(&conds)
        }
        FilterOperator::NotIn => {
            let items = value_list(value)?;
            let conds: Vec<String> = items.into_iter().map(|v| frag.ne(&field, v)).collect();
            and_conds(&conds)
        }
        FilterOperator::Between => {
            let (low, high) = value_pair(value)?;
            frag.between(&field, low, high)
        }
        FilterOperator::NotBetween => {
            let (low, high) = value_pair(value)?;
            frag.not_between(&field, low, high)
        }
        FilterOperator::Exists | FilterOperator::NotExists => {
            return exists_condition(column, key, op, frag)
        }
    };
    Ok(cond)
}

/// Existence checks never look at the user value; they test the column's
/// absent-key default, or mapContains for map columns.
pub(crate) fn exists_condition(
    column: Column,
    key: &TelemetryFieldKey,
    op: FilterOperator,
    frag: &mut SqlFragment,
) -> Result<String, QueryError> {
    let exists = op == FilterOperator::Exists;
    match column.column_type {
        ColumnType::String
        | ColumnType::LowCardinalityString
        | ColumnType::FixedString(_)
        | ColumnType::DateTime64(_) => {
            let empty = TelemetryValue::String(String::new());
            if exists {
                Ok(frag.ne(column.name, empty))
            } else {
                Ok(frag.eq(column.name, empty))
            }
        }
        ColumnType::UInt64
        | ColumnType::UInt32
        | ColumnType::UInt8
        | ColumnType::Int8
        | ColumnType::Int16
        | ColumnType::Bool => {
            let zero = TelemetryValue::Float(0.0);
            if exists {
                Ok(frag.ne(column.name, zero))
            } else {
                Ok(frag.eq(column.name, zero))
            }
        }
        ColumnType::Map(_) => {
            let left = if key.materialized {
                materialized_exists_column_name(key)
            } else {
                format!("mapContains({}, '{}')", column.name, key.name)
            };
            let truthy = TelemetryValue::Bool(true);
            if exists {
                Ok(frag.eq(&left, truthy))
            } else {
                Ok(frag.ne(&left, truthy))
            }
        }
        other => Err(QueryError::ExistsUnsupported(other)),
    }
}

fn value_list(value: TelemetryValue) -> Result<Vec<TelemetryValue>, QueryError> {
    match value {
        TelemetryValue::Array(items) if !items.is_empty() => Ok(items),
        _ => Err(QueryError::InValues),
    }
}

fn value_pair(value: TelemetryValue) -> Result<(TelemetryValue, TelemetryValue), QueryError> {
    match value {
        TelemetryValue::Array(items) if items.len() == 2 => {
            let mut it = items.into_iter();
            let low = it.next().ok_or(QueryError::BetweenValues)?;
            let high = it.next().ok_or(QueryError::BetweenValues)?;
            Ok((low, high))
        }
        _ => Err(QueryError::BetweenValues),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MapValueType;
    use telemetry::{FieldContext, FieldDataType, Signal};

    fn string_map_key(name: &str) -> TelemetryFieldKey {
        TelemetryFieldKey::new(
            name,
            Signal::Traces,
            FieldContext::Attribute,
            FieldDataType::String,
        )
    }

    fn attributes_string() -> Column {
        Column::new("attributes_string", ColumnType::Map(MapValueType::String))
    }

    #[test]
    fn test_regexp_is_self_wrapped() {
        let mut frag = SqlFragment::new();
        let cond = build_condition(
            attributes_string(),
            "attributes_string['http.route']".to_string(),
            &string_map_key("http.route"),
            FilterOperator::Regexp,
            Some(&TelemetryValue::from("/api/.*")),
            &mut frag,
        )
        .unwrap();
        assert_eq!(cond, "(match(attributes_string['http.route'], ?))");
    }

    #[test]
    fn test_contains_wraps_value_in_wildcards() {
        let mut frag = SqlFragment::new();
        let cond = build_condition(
            attributes_string(),
            "attributes_string['message']".to_string(),
            &string_map_key("message"),
            FilterOperator::Contains,
            Some(&TelemetryValue::from("error")),
            &mut frag,
        )
        .unwrap();
        assert_eq!(cond, "LOWER(attributes_string['message']) LIKE LOWER(?)");
        assert_eq!(frag.args(), &[TelemetryValue::from("%error%")]);
    }

    #[test]
    fn test_in_expands_to_repeated_equality() {
        let mut frag = SqlFragment::new();
        let values = TelemetryValue::Array(vec![
            TelemetryValue::from("redis"),
            TelemetryValue::from("postgres"),
        ]);
        let cond = build_condition(
            attributes_string(),
            "attributes_string['service.name']".to_string(),
            &string_map_key("service.name"),
            FilterOperator::In,
            Some(&values),
            &mut frag,
        )
        .unwrap();
        assert_eq!(
            cond,
            "(attributes_string['service.name'] = ? OR attributes_string['service.name'] = ?)"
        );
    }

    #[test]
    fn test_not_in_expands_to_repeated_inequality() {
        let mut frag = SqlFragment::new();
        let values = TelemetryValue::Array(vec![
            TelemetryValue::from("redis"),
            TelemetryValue::from("postgres"),
        ]);
        let cond = build_condition(
            attributes_string(),
            "attributes_string['service.name']".to_string(),
            &string_map_key("service.name"),
            FilterOperator::NotIn,
            Some(&values),
            &mut frag,
        )
        .unwrap();
        assert_eq!(
            cond,
            "(attributes_string['service.name'] <> ? AND attributes_string['service.name'] <> ?)"
        );
    }

    #[test]
    fn test_between_requires_exactly_two_values() {
        let mut frag = SqlFragment::new();
        let result = build_condition(
            attributes_string(),
            "attributes_number['duration']".to_string(),
            &string_map_key("duration"),
            FilterOperator::Between,
            Some(&TelemetryValue::Array(vec![TelemetryValue::from(1.0)])),
            &mut frag,
        );
        assert!(matches!(result, Err(QueryError::BetweenValues)));
    }

    #[test]
    fn test_exists_on_map_uses_map_contains() {
        let mut frag = SqlFragment::new();
        let cond = exists_condition(
            attributes_string(),
            &string_map_key("http.route"),
            FilterOperator::Exists,
            &mut frag,
        )
        .unwrap();
        assert_eq!(cond, "mapContains(attributes_string, 'http.route') = ?");
        assert_eq!(frag.args(), &[TelemetryValue::Bool(true)]);
    }

    #[test]
    fn test_exists_on_materialized_map_key() {
        let mut frag = SqlFragment::new();
        let mut key = string_map_key("service.name");
        key.field_context = FieldContext::Resource;
        key.materialized = true;
        let column = Column::new("resources_string", ColumnType::Map(MapValueType::String));
        let cond =
            exists_condition(column, &key, FilterOperator::NotExists, &mut frag).unwrap();
        assert_eq!(cond, "resource_string_service$$name_exists <> ?");
    }

    #[test]
    fn test_exists_on_string_column_checks_empty() {
        let mut frag = SqlFragment::new();
        let column = Column::new("http_url", ColumnType::LowCardinalityString);
        let cond = exists_condition(
            column,
            &string_map_key("http_url"),
            FilterOperator::Exists,
            &mut frag,
        )
        .unwrap();
        assert_eq!(cond, "http_url <> ?");
        assert_eq!(frag.args(), &[TelemetryValue::String(String::new())]);
    }

    #[test]
    fn test_exists_unsupported_on_json() {
        let mut frag = SqlFragment::new();
        let column = Column::new("resource", ColumnType::Json);
        let result = exists_condition(
            column,
            &string_map_key("service.name"),
            FilterOperator::Exists,
            &mut frag,
        );
        assert!(matches!(result, Err(QueryError::ExistsUnsupported(_))));
    }
}

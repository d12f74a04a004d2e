//! Field mapper and condition builder for the metrics tables
//!
//! Metrics store every attribute in a single `labels` JSON string, so
//! apart from a handful of dedicated columns every field compiles to a
//! `JSONExtractString` over it.
use crate::condition::build_condition;
use crate::error::QueryError;
use crate::fragment::SqlFragment;
use crate::mapper::{ConditionBuilder, FieldMapper};
use crate::schema::{Column, ColumnType};
use telemetry::{FieldContext, FilterOperator, TelemetryFieldKey, TelemetryValue};

fn metric_column(name: &str) -> Option<Column> {
    use ColumnType::*;
    let col = match name {
        "metric_name" => Column::new("metric_name", String),
        "temporality" => Column::new("temporality", LowCardinalityString),
        "labels" => Column::new("labels", String),
        _ => return None,
    };
    Some(col)
}

fn resolve_field(key: &TelemetryFieldKey) -> String {
    match metric_column(&key.name) {
        Some(column) => column.name.to_string(),
        None => format!("JSONExtractString(labels, '{}')", key.name),
    }
}

/// Field mapper for the metrics tables.
#[derive(Debug, Default)]
pub struct MetricFieldMapper;

impl MetricFieldMapper {
    pub fn new() -> Self {
        Self
    }
}

impl FieldMapper for MetricFieldMapper {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        Ok(metric_column(&key.name)
            .unwrap_or(Column::new("labels", ColumnType::String)))
    }

    fn field_for(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        Ok(resolve_field(key))
    }

    fn is_static_field(&self, name: &str) -> bool {
        metric_column(name).is_some()
    }

    fn default_context(&self) -> FieldContext {
        FieldContext::Attribute
    }
}

/// Condition builder for the metrics tables.
#[derive(Debug, Default)]
pub struct MetricConditionBuilder;

impl MetricConditionBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl ConditionBuilder for MetricConditionBuilder {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        MetricFieldMapper.column_for(key)
    }

    fn table_field_name(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        Ok(resolve_field(key))
    }

    fn condition_for(
        &self,
        key: &TelemetryFieldKey,
        op: FilterOperator,
        value: Option<&TelemetryValue>,
        frag: &mut SqlFragment,
    ) -> Result<String, QueryError> {
        let column = self.column_for(key)?;
        let field = self.table_field_name(key)?;
        build_condition(column, field, key, op, value, frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry::{FieldDataType, Signal};

    fn metric_key(name: &str) -> TelemetryFieldKey {
        TelemetryFieldKey::new(
            name,
            Signal::Metrics,
            FieldContext::Attribute,
            FieldDataType::String,
        )
    }

    #[test]
    fn test_metric_name_is_a_column() {
        let mut frag = SqlFragment::new();
        let cond = MetricConditionBuilder::new()
            .condition_for(
                &metric_key("metric_name"),
                FilterOperator::Equal,
                Some(&TelemetryValue::from("http_requests_total")),
                &mut frag,
            )
            .unwrap();
        assert_eq!(cond, "metric_name = ?");
    }

    #[test]
    fn test_attribute_extracts_from_labels() {
        let mut frag = SqlFragment::new();
        let cond = MetricConditionBuilder::new()
            .condition_for(
                &metric_key("le"),
                FilterOperator::Equal,
                Some(&TelemetryValue::from("0.5")),
                &mut frag,
            )
            .unwrap();
        assert_eq!(cond, "JSONExtractString(labels, 'le') = ?");
    }

    #[test]
    fn test_mapper_aliases_label_reads() {
        let field = MetricFieldMapper::new()
            .column_expression_for(&metric_key("le"), &telemetry::Registry::new())
            .unwrap();
        assert_eq!(field, "JSONExtractString(labels, 'le') AS `le`");
    }
}

//! Field mapper and condition builder for the logs table
use crate::condition::build_condition;
use crate::error::QueryError;
use crate::fragment::SqlFragment;
use crate::mapper::{ConditionBuilder, FieldMapper};
use crate::schema::{Column, ColumnType, MapValueType};
use telemetry::{
    materialized_column_name, materialized_exists_column_name, FieldContext, FieldDataType,
    FilterOperator, TelemetryFieldKey, TelemetryValue,
};

/// Columns of the logs table.
fn log_column(name: &str) -> Option<Column> {
    use ColumnType::*;
    let col = match name {
        "ts_bucket_start" => Column::new("ts_bucket_start", UInt64),
        "resource_fingerprint" => Column::new("resource_fingerprint", String),

        "timestamp" => Column::new("timestamp", UInt64),
        "observed_timestamp" => Column::new("observed_timestamp", UInt64),
        "id" => Column::new("id", String),
        "trace_id" => Column::new("trace_id", String),
        "span_id" => Column::new("span_id", String),
        "trace_flags" => Column::new("trace_flags", UInt32),
        "severity_text" => Column::new("severity_text", LowCardinalityString),
        "severity_number" => Column::new("severity_number", UInt8),
        "body" => Column::new("body", String),

        "attributes_string" => Column::new("attributes_string", Map(MapValueType::String)),
        "attributes_number" => Column::new("attributes_number", Map(MapValueType::Float64)),
        "attributes_bool" => Column::new("attributes_bool", Map(MapValueType::Bool)),
        "resources_string" => Column::new("resources_string", Map(MapValueType::String)),
        "resource" => Column::new("resource", Json),

        "scope_name" => Column::new("scope_name", String),
        "scope_version" => Column::new("scope_version", String),
        "scope_string" => Column::new("scope_string", Map(MapValueType::String)),
        _ => return None,
    };
    Some(col)
}

fn attribute_map_column(data_type: FieldDataType) -> Option<&'static str> {
    match data_type {
        FieldDataType::String => Some("attributes_string"),
        FieldDataType::Int64 | FieldDataType::Float64 | FieldDataType::Number => {
            Some("attributes_number")
        }
        FieldDataType::Bool => Some("attributes_bool"),
        FieldDataType::Unspecified => None,
    }
}

fn scope_column(name: &str) -> Column {
    match name {
        "name" | "scope.name" | "scope_name" => log_column("scope_name"),
        "version" | "scope.version" | "scope_version" => log_column("scope_version"),
        _ => log_column("scope_string"),
    }
    // the scope columns are all in the table
    .unwrap_or(Column::new("scope_string", ColumnType::Map(MapValueType::String)))
}

fn resolve_column(key: &TelemetryFieldKey) -> Result<Column, QueryError> {
    match key.field_context {
        FieldContext::Resource => log_column("resource")
            .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
        FieldContext::Scope => Ok(scope_column(&key.name)),
        FieldContext::Attribute => attribute_map_column(key.field_data_type)
            .and_then(log_column)
            .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
        FieldContext::Log | FieldContext::Unspecified => {
            log_column(&key.name).ok_or_else(|| QueryError::ColumnNotFound(key.name.clone()))
        }
        FieldContext::Span => Err(QueryError::ColumnNotFound(key.name.clone())),
    }
}

fn map_field(column: Column, key: &TelemetryFieldKey) -> String {
    if key.materialized {
        materialized_column_name(key)
    } else {
        format!("{}['{}']", column.name, key.name)
    }
}

/// Field mapper for the logs table. Resource fields read through the JSON
/// `resource` column with a fallback to the legacy string map, same as
/// the spans mapper.
#[derive(Debug, Default)]
pub struct LogFieldMapper;

impl LogFieldMapper {
    pub fn new() -> Self {
        Self
    }
}

impl FieldMapper for LogFieldMapper {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        resolve_column(key)
    }

    fn field_for(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        let column = resolve_column(key)?;
        match column.column_type {
            ColumnType::Json => {
                let accessor = format!("{}.`{}`", column.name, key.name);
                if key.materialized {
                    let mat = materialized_column_name(key);
                    let mat_exists = materialized_exists_column_name(key);
                    Ok(format!(
                        "multiIf({} IS NOT NULL, {}::String, {}==true, {}, NULL)",
                        accessor, accessor, mat_exists, mat
                    ))
                } else {
                    Ok(format!(
                        "multiIf({} IS NOT NULL, {}::String, mapContains(resources_string, '{}'), resources_string['{}'], NULL)",
                        accessor, accessor, key.name, key.name
                    ))
                }
            }
            ColumnType::Map(_) => Ok(map_field(column, key)),
            _ => Ok(column.name.to_string()),
        }
    }

    fn is_static_field(&self, name: &str) -> bool {
        log_column(name).is_some()
    }

    fn default_context(&self) -> FieldContext {
        FieldContext::Log
    }
}

/// Condition builder for the logs table. Like the spans builder, the
/// WHERE path reads resource attributes from the legacy string map.
#[derive(Debug, Default)]
pub struct LogConditionBuilder;

impl LogConditionBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl ConditionBuilder for LogConditionBuilder {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        match key.field_context {
            FieldContext::Resource => log_column("resources_string")
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            _ => resolve_column(key),
        }
    }

    fn table_field_name(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        let column = self.column_for(key)?;
        match column.column_type {
            ColumnType::Map(_) => Ok(map_field(column, key)),
            _ => Ok(column.name.to_string()),
        }
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

//! Field mapper and condition builder for the spans table
use crate::condition::build_condition;
use crate::error::QueryError;
use crate::fragment::SqlFragment;
use crate::mapper::{ConditionBuilder, FieldMapper};
use crate::schema::{Column, ColumnType, MapValueType};
use config::ClickHouseConfig;
use telemetry::{
    materialized_column_name, materialized_exists_column_name, FieldContext, FieldDataType,
    FilterOperator, TelemetryFieldKey, TelemetryValue,
};

/// Virtual span-scope field matching root spans.
pub const SPAN_SCOPE_ROOT: &str = "isroot";
/// Virtual span-scope field matching service entry-point spans.
pub const SPAN_SCOPE_ENTRYPOINT: &str = "isentrypoint";

/// Columns of the spans table.
fn span_column(name: &str) -> Option<Column> {
    use ColumnType::*;
    let col = match name {
        "ts_bucket_start" => Column::new("ts_bucket_start", UInt64),
        "resource_fingerprint" => Column::new("resource_fingerprint", String),

        // intrinsic columns
        "timestamp" => Column::new("timestamp", DateTime64(9)),
        "trace_id" => Column::new("trace_id", FixedString(32)),
        "span_id" => Column::new("span_id", String),
        "trace_state" => Column::new("trace_state", String),
        "parent_span_id" => Column::new("parent_span_id", String),
        "flags" => Column::new("flags", UInt32),
        "name" => Column::new("name", LowCardinalityString),
        "kind" => Column::new("kind", Int8),
        "kind_string" => Column::new("kind_string", String),
        "duration_nano" => Column::new("duration_nano", UInt64),
        "status_code" => Column::new("status_code", Int16),
        "status_message" => Column::new("status_message", String),
        "status_code_string" => Column::new("status_code_string", String),

        // attribute and resource columns
        "attributes_string" => Column::new("attributes_string", Map(MapValueType::String)),
        "attributes_number" => Column::new("attributes_number", Map(MapValueType::Float64)),
        "attributes_bool" => Column::new("attributes_bool", Map(MapValueType::Bool)),
        "resources_string" => Column::new("resources_string", Map(MapValueType::String)),
        "resource" => Column::new("resource", Json),

        "events" => Column::new("events", ArrayString),
        "links" => Column::new("links", String),

        // derived columns
        "response_status_code" => Column::new("response_status_code", LowCardinalityString),
        "external_http_url" => Column::new("external_http_url", LowCardinalityString),
        "http_url" => Column::new("http_url", LowCardinalityString),
        "external_http_method" => Column::new("external_http_method", LowCardinalityString),
        "http_method" => Column::new("http_method", LowCardinalityString),
        "http_host" => Column::new("http_host", LowCardinalityString),
        "db_name" => Column::new("db_name", LowCardinalityString),
        "db_operation" => Column::new("db_operation", LowCardinalityString),
        "has_error" => Column::new("has_error", Bool),
        "is_remote" => Column::new("is_remote", LowCardinalityString),

        // materialized columns
        "resource_string_service$$name" => Column::new("resource_string_service$$name", String),
        "attribute_string_http$$route" => Column::new("attribute_string_http$$route", String),
        "attribute_string_messaging$$system" => {
            Column::new("attribute_string_messaging$$system", String)
        }
        "attribute_string_messaging$$operation" => {
            Column::new("attribute_string_messaging$$operation", String)
        }
        "attribute_string_db$$system" => Column::new("attribute_string_db$$system", String),
        "attribute_string_rpc$$system" => Column::new("attribute_string_rpc$$system", String),
        "attribute_string_rpc$$service" => Column::new("attribute_string_rpc$$service", String),
        "attribute_string_rpc$$method" => Column::new("attribute_string_rpc$$method", String),
        "attribute_string_peer$$service" => Column::new("attribute_string_peer$$service", String),

        // materialized exists companions
        "resource_string_service$$name_exists" => {
            Column::new("resource_string_service$$name_exists", Bool)
        }
        "attribute_string_http$$route_exists" => {
            Column::new("attribute_string_http$$route_exists", Bool)
        }
        "attribute_string_messaging$$system_exists" => {
            Column::new("attribute_string_messaging$$system_exists", Bool)
        }
        "attribute_string_messaging$$operation_exists" => {
            Column::new("attribute_string_messaging$$operation_exists", Bool)
        }
        "attribute_string_db$$system_exists" => {
            Column::new("attribute_string_db$$system_exists", Bool)
        }
        "attribute_string_rpc$$system_exists" => {
            Column::new("attribute_string_rpc$$system_exists", Bool)
        }
        "attribute_string_rpc$$service_exists" => {
            Column::new("attribute_string_rpc$$service_exists", Bool)
        }
        "attribute_string_rpc$$method_exists" => {
            Column::new("attribute_string_rpc$$method_exists", Bool)
        }
        "attribute_string_peer$$service_exists" => {
            Column::new("attribute_string_peer$$service_exists", Bool)
        }
        _ => return None,
    };
    Some(col)
}

/// Names kept for queries written against the previous table layout.
fn deprecated_alias(name: &str) -> Option<&'static str> {
    let new = match name {
        "traceID" => "trace_id",
        "spanID" => "span_id",
        "parentSpanID" => "parent_span_id",
        "spanKind" => "kind_string",
        "durationNano" => "duration_nano",
        "statusCode" => "status_code",
        "statusMessage" => "status_message",
        "statusCodeString" => "status_code_string",
        "references" => "links",
        "responseStatusCode" => "response_status_code",
        "externalHttpUrl" => "external_http_url",
        "httpUrl" => "http_url",
        "externalHttpMethod" => "external_http_method",
        "httpMethod" => "http_method",
        "httpHost" => "http_host",
        "dbName" => "db_name",
        "dbOperation" => "db_operation",
        "hasError" => "has_error",
        "isRemote" => "is_remote",
        "serviceName" => "resource_string_service$$name",
        "httpRoute" => "attribute_string_http$$route",
        "msgSystem" => "attribute_string_messaging$$system",
        "msgOperation" => "attribute_string_messaging$$operation",
        "dbSystem" => "attribute_string_db$$system",
        "rpcSystem" => "attribute_string_rpc$$system",
        "rpcService" => "attribute_string_rpc$$service",
        "rpcMethod" => "attribute_string_rpc$$method",
        "peerService" => "attribute_string_peer$$service",
        _ => return None,
    };
    Some(new)
}

fn static_span_column(name: &str) -> Option<Column> {
    span_column(deprecated_alias(name).unwrap_or(name))
}

fn is_span_scope_field(key: &TelemetryFieldKey) -> bool {
    matches!(
        key.field_context,
        FieldContext::Span | FieldContext::Unspecified
    ) && {
        let lower = key.name.to_lowercase();
        lower == SPAN_SCOPE_ROOT || lower == SPAN_SCOPE_ENTRYPOINT
    }
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

/// Field mapper for the spans table. Resource fields read through the
/// JSON `resource` column with a fallback to the legacy string map.
#[derive(Debug, Default)]
pub struct SpanFieldMapper;

impl SpanFieldMapper {
    pub fn new() -> Self {
        Self
    }
}

impl FieldMapper for SpanFieldMapper {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        match key.field_context {
            FieldContext::Resource => Ok(span_column("resource").unwrap_or(Column::new(
                "resource",
                ColumnType::Json,
            ))),
            // no scope data stored with spans yet
            FieldContext::Scope => Err(QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Attribute => attribute_map_column(key.field_data_type)
                .and_then(span_column)
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Span | FieldContext::Unspecified => static_span_column(&key.name)
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Log => Err(QueryError::ColumnNotFound(key.name.clone())),
        }
    }

    fn field_for(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        // span-scope fields are rendered by the condition builder
        if is_span_scope_field(key) {
            return Ok(key.name.clone());
        }

        let column = self.column_for(key)?;
        match column.column_type {
            ColumnType::Json => {
                // reads the JSON column first, falling back to the legacy
                // string map (or the materialized column) for old rows
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
            ColumnType::Map(_) => {
                if key.materialized {
                    Ok(materialized_column_name(key))
                } else {
                    Ok(format!("{}['{}']", column.name, key.name))
                }
            }
            _ => Ok(column.name.to_string()),
        }
    }

    fn is_static_field(&self, name: &str) -> bool {
        static_span_column(name).is_some()
    }

    fn default_context(&self) -> FieldContext {
        FieldContext::Span
    }
}

/// Condition builder for the spans table. The WHERE path still reads
/// resource attributes from the legacy `resources_string` map; the JSON
/// column is only consulted by SELECT expressions.
#[derive(Debug)]
pub struct SpanConditionBuilder {
    clickhouse: ClickHouseConfig,
}

impl SpanConditionBuilder {
    pub fn new(clickhouse: ClickHouseConfig) -> Self {
        Self { clickhouse }
    }

    fn span_scope_condition(
        &self,
        key: &TelemetryFieldKey,
        op: FilterOperator,
        value: Option<&TelemetryValue>,
    ) -> Result<String, QueryError> {
        let truthy = matches!(value, Some(TelemetryValue::Bool(true)))
            || matches!(value, Some(TelemetryValue::String(s)) if s.eq_ignore_ascii_case("true"));
        if op != FilterOperator::Equal || !truthy {
            return Err(QueryError::SpanScopeFilter(key.name.clone()));
        }
        if key.name.to_lowercase() == SPAN_SCOPE_ROOT {
            Ok("parent_span_id = ''".to_string())
        } else {
            Ok(format!(
                "((name, `resource_string_service$$name`) GLOBAL IN ( SELECT DISTINCT name, serviceName from {} )) AND parent_span_id != ''",
                self.clickhouse.top_level_operations()
            ))
        }
    }
}

impl ConditionBuilder for SpanConditionBuilder {
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError> {
        match key.field_context {
            FieldContext::Resource => span_column("resources_string")
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Scope => Err(QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Attribute => attribute_map_column(key.field_data_type)
                .and_then(span_column)
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Span | FieldContext::Unspecified => static_span_column(&key.name)
                .ok_or_else(|| QueryError::ColumnNotFound(key.name.clone())),
            FieldContext::Log => Err(QueryError::ColumnNotFound(key.name.clone())),
        }
    }

    fn table_field_name(&self, key: &TelemetryFieldKey) -> Result<String, QueryError> {
        let column = self.column_for(key)?;
        match column.column_type {
            ColumnType::Map(_) => {
                if key.materialized {
                    Ok(materialized_column_name(key))
                } else {
                    Ok(format!("{}['{}']", column.name, key.name))
                }
            }
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
        if is_span_scope_field(key) {
            return self.span_scope_condition(key, op, value);
        }
        let column = self.column_for(key)?;
        let field = self.table_field_name(key)?;
        build_condition(column, field, key, op, value, frag)
    }
}

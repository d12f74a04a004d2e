/// Shared telemetry field model
///
/// Defines the logical field key types used across the query compiler:
/// which signal a field belongs to, where it physically lives, what data
/// type it carries, and how a logical key name written by a user
/// (`resource.service.name:string`) is parsed into a structured selector.
pub mod operator;
pub mod store;
pub mod types;
pub mod value;

pub use operator::FilterOperator;
pub use store::MetadataStore;
pub use types::{
    field_key_from_text, materialized_column_name, materialized_exists_column_name, FieldContext,
    FieldDataType, FieldKeySelector, Registry, Signal, TelemetryFieldKey,
};
pub use value::{collision_handled_field, TelemetryValue};

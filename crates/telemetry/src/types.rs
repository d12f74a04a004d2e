/// Telemetry field key types and key-text parsing
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The telemetry signal a field belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Logs,
    Traces,
    Metrics,
    #[serde(rename = "")]
    #[default]
    Unspecified,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Logs => write!(f, "logs"),
            Signal::Traces => write!(f, "traces"),
            Signal::Metrics => write!(f, "metrics"),
            Signal::Unspecified => Ok(()),
        }
    }
}

/// Where a field physically lives.
///
/// Users can force a context with a key prefix: `resource.service.name`
/// always resolves against resource attributes, `log.severity_text`
/// against the log record itself, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldContext {
    Span,
    Log,
    Resource,
    Attribute,
    Scope,
    #[serde(rename = "")]
    #[default]
    Unspecified,
}

impl FieldContext {
    /// Parse a context prefix segment. Unknown segments map to
    /// `Unspecified` so the caller can fall back to treating the
    /// segment as part of the field name.
    pub fn from_token(s: &str) -> FieldContext {
        match s {
            "resource" => FieldContext::Resource,
            "scope" => FieldContext::Scope,
            "tag" | "attribute" => FieldContext::Attribute,
            "span" | "spanfield" => FieldContext::Span,
            "log" | "logfield" => FieldContext::Log,
            _ => FieldContext::Unspecified,
        }
    }
}

impl fmt::Display for FieldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldContext::Span => write!(f, "span"),
            FieldContext::Log => write!(f, "log"),
            FieldContext::Resource => write!(f, "resource"),
            FieldContext::Attribute => write!(f, "attribute"),
            FieldContext::Scope => write!(f, "scope"),
            FieldContext::Unspecified => Ok(()),
        }
    }
}

/// The data type a field carries.
///
/// `Int64` and `Number` are synonyms for `Float64` at the storage layer;
/// all numeric attributes land in the same float-valued map column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldDataType {
    String,
    Bool,
    Float64,
    Int64,
    Number,
    #[serde(rename = "")]
    #[default]
    Unspecified,
}

impl FieldDataType {
    /// Parse a `:type` suffix. Unknown suffixes map to `Unspecified`.
    pub fn from_token(s: &str) -> FieldDataType {
        match s.to_lowercase().as_str() {
            "string" => FieldDataType::String,
            "bool" => FieldDataType::Bool,
            "int" | "int8" | "int16" | "int32" | "int64" | "uint" | "uint8" | "uint16"
            | "uint32" | "uint64" => FieldDataType::Number,
            "float" | "float32" | "float64" | "double" | "decimal" => FieldDataType::Number,
            "number" => FieldDataType::Number,
            _ => FieldDataType::Unspecified,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldDataType::Float64 | FieldDataType::Int64 | FieldDataType::Number
        )
    }
}

impl fmt::Display for FieldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDataType::String => write!(f, "string"),
            FieldDataType::Bool => write!(f, "bool"),
            // numeric types share one storage representation
            FieldDataType::Float64 | FieldDataType::Int64 | FieldDataType::Number => {
                write!(f, "float64")
            }
            FieldDataType::Unspecified => Ok(()),
        }
    }
}

/// A logical field key.
///
/// Identity for lookup purposes is `(name, field_context,
/// field_data_type)`: two keys sharing a name but differing in context or
/// type are distinct physical fields behind one logical name, which is
/// what makes a name ambiguous.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetryFieldKey {
    pub name: String,
    #[serde(default)]
    pub signal: Signal,
    #[serde(default)]
    pub field_context: FieldContext,
    #[serde(default)]
    pub field_data_type: FieldDataType,
    #[serde(default)]
    pub materialized: bool,
}

impl TelemetryFieldKey {
    /// Convenience constructor for a fully specified key.
    pub fn new(
        name: &str,
        signal: Signal,
        field_context: FieldContext,
        field_data_type: FieldDataType,
    ) -> Self {
        Self {
            name: name.to_string(),
            signal,
            field_context,
            field_data_type,
            materialized: false,
        }
    }
}

/// All physical keys sharing a logical name, keyed by that name.
pub type Registry = HashMap<String, Vec<TelemetryFieldKey>>;

/// A query against the registry: a logical name with optionally pinned
/// context and data type. Leaving context or type unspecified matches
/// every physical key behind the name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldKeySelector {
    pub name: String,
    #[serde(default)]
    pub signal: Signal,
    #[serde(default)]
    pub field_context: FieldContext,
    #[serde(default)]
    pub field_data_type: FieldDataType,
}

impl FieldKeySelector {
    /// Parse a raw key token into a selector.
    ///
    /// `resource.service.name:string` yields name `service.name` with an
    /// explicit resource context and string type. A leading segment that
    /// is not a known context name, or a trailing suffix that is not a
    /// known type, stays part of the name; malformed input never fails.
    pub fn from_text(key: &str) -> FieldKeySelector {
        let mut parts: Vec<&str> = key.split('.').collect();

        let mut explicit_context = FieldContext::Unspecified;
        if parts.len() > 1 {
            explicit_context = FieldContext::from_token(parts[0]);
            if explicit_context != FieldContext::Unspecified {
                parts.remove(0);
            }
        }

        let mut explicit_data_type = FieldDataType::Unspecified;
        let mut stripped_last: Option<String> = None;
        if !parts.is_empty() {
            let last = parts[parts.len() - 1];
            if let Some((bare, suffix)) = last.split_once(':') {
                explicit_data_type = FieldDataType::from_token(suffix);
                if explicit_data_type != FieldDataType::Unspecified {
                    stripped_last = Some(bare.to_string());
                }
            }
        }
        if let Some(bare) = &stripped_last {
            let last_idx = parts.len() - 1;
            parts[last_idx] = bare;
        }

        FieldKeySelector {
            name: parts.join("."),
            signal: Signal::Unspecified,
            field_context: explicit_context,
            field_data_type: explicit_data_type,
        }
    }

    /// Whether a physical key satisfies this selector. Numeric types are
    /// compared folded: every numeric attribute lands in the same
    /// float-valued storage, so an `:int64` selector matches a `Float64`
    /// registry entry and vice versa.
    pub fn matches(&self, key: &TelemetryFieldKey) -> bool {
        self.name == key.name
            && (self.field_context == FieldContext::Unspecified
                || self.field_context == key.field_context)
            && (self.field_data_type == FieldDataType::Unspecified
                || self.field_data_type == key.field_data_type
                || (self.field_data_type.is_numeric() && key.field_data_type.is_numeric()))
    }
}

/// Parse a raw key token into a field key, carrying any explicit
/// context/type suffix over from the selector syntax.
pub fn field_key_from_text(key: &str) -> TelemetryFieldKey {
    let selector = FieldKeySelector::from_text(key);
    TelemetryFieldKey {
        name: selector.name,
        signal: selector.signal,
        field_context: selector.field_context,
        field_data_type: selector.field_data_type,
        materialized: false,
    }
}

/// The name of the precomputed column backing a materialized key:
/// context, folded data type, and the key name with `.` doubled to `$$`.
pub fn materialized_column_name(key: &TelemetryFieldKey) -> String {
    format!(
        "{}_{}_{}",
        key.field_context,
        key.field_data_type,
        key.name.replace('.', "$$")
    )
}

/// The companion boolean column recording whether the materialized value
/// was present in the source map.
pub fn materialized_exists_column_name(key: &TelemetryFieldKey) -> String {
    format!("{}_exists", materialized_column_name(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key() {
        let key = field_key_from_text("service.name");
        assert_eq!(key.name, "service.name");
        assert_eq!(key.field_context, FieldContext::Unspecified);
        assert_eq!(key.field_data_type, FieldDataType::Unspecified);
    }

    #[test]
    fn test_explicit_context() {
        let key = field_key_from_text("resource.service.name");
        assert_eq!(key.name, "service.name");
        assert_eq!(key.field_context, FieldContext::Resource);
    }

    #[test]
    fn test_explicit_type_suffix() {
        let key = field_key_from_text("http.status_code:int64");
        assert_eq!(key.name, "http.status_code");
        assert_eq!(key.field_data_type, FieldDataType::Number);
    }

    #[test]
    fn test_context_and_type() {
        let key = field_key_from_text("attribute.http.method:string");
        assert_eq!(key.name, "http.method");
        assert_eq!(key.field_context, FieldContext::Attribute);
        assert_eq!(key.field_data_type, FieldDataType::String);
    }

    #[test]
    fn test_unknown_suffix_stays_in_name() {
        let key = field_key_from_text("endpoint.path:port");
        assert_eq!(key.name, "endpoint.path:port");
        assert_eq!(key.field_data_type, FieldDataType::Unspecified);
    }

    #[test]
    fn test_single_segment_never_loses_context() {
        // a lone "resource" is a field name, not a context prefix
        let key = field_key_from_text("resource");
        assert_eq!(key.name, "resource");
        assert_eq!(key.field_context, FieldContext::Unspecified);
    }

    #[test]
    fn test_selector_matching() {
        let selector = FieldKeySelector::from_text("resource.service.name");
        let resource_key = TelemetryFieldKey::new(
            "service.name",
            Signal::Traces,
            FieldContext::Resource,
            FieldDataType::String,
        );
        let attribute_key = TelemetryFieldKey::new(
            "service.name",
            Signal::Traces,
            FieldContext::Attribute,
            FieldDataType::String,
        );
        assert!(selector.matches(&resource_key));
        assert!(!selector.matches(&attribute_key));

        let unpinned = FieldKeySelector::from_text("service.name");
        assert!(unpinned.matches(&resource_key));
        assert!(unpinned.matches(&attribute_key));
    }

    #[test]
    fn test_selector_numeric_types_match_folded() {
        // `:float64` and `:int64` suffixes both parse to Number, and
        // storage types Float64/Int64 must still satisfy them
        let stored = TelemetryFieldKey::new(
            "http.status_code",
            Signal::Traces,
            FieldContext::Attribute,
            FieldDataType::Float64,
        );
        assert!(FieldKeySelector::from_text("http.status_code:float64").matches(&stored));
        assert!(FieldKeySelector::from_text("http.status_code:int64").matches(&stored));
        assert!(!FieldKeySelector::from_text("http.status_code:string").matches(&stored));
    }

    #[test]
    fn test_materialized_column_names() {
        let key = TelemetryFieldKey {
            name: "service.name".to_string(),
            signal: Signal::Traces,
            field_context: FieldContext::Resource,
            field_data_type: FieldDataType::String,
            materialized: true,
        };
        assert_eq!(materialized_column_name(&key), "resource_string_service$$name");
        assert_eq!(
            materialized_exists_column_name(&key),
            "resource_string_service$$name_exists"
        );
    }

    #[test]
    fn test_materialized_column_folds_numeric_types() {
        let key = TelemetryFieldKey {
            name: "http.status_code".to_string(),
            signal: Signal::Traces,
            field_context: FieldContext::Attribute,
            field_data_type: FieldDataType::Int64,
            materialized: true,
        };
        assert_eq!(
            materialized_column_name(&key),
            "attribute_float64_http$$status_code"
        );
    }
}

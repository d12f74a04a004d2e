//! Field mapper and condition builder traits
use crate::error::QueryError;
use crate::fragment::SqlFragment;
use crate::schema::Column;
use telemetry::{FieldContext, FilterOperator, Registry, TelemetryFieldKey, TelemetryValue};

/// Resolves logical field keys to physical columns and SQL expressions
/// for one signal's tables.
pub trait FieldMapper {
    /// Physical column backing the key.
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError>;

    /// Expression that reads the field: the column name itself, a map
    /// subscript, a materialized column, or a JSON fallback chain.
    fn field_for(&self, key: &TelemetryFieldKey) -> Result<String, QueryError>;

    /// Whether `name` is a dedicated table column on this signal.
    fn is_static_field(&self, name: &str) -> bool;

    /// Context forced onto bare names that turn out to be table columns.
    fn default_context(&self) -> FieldContext;

    /// Expression for a key resolved through a set of registry entries:
    /// one entry reads it directly, several collapse to a first-non-empty
    /// `multiIf`, none falls back to the signal's table columns or fails
    /// with a fuzzy suggestion.
    fn registry_field_for(
        &self,
        key: &TelemetryFieldKey,
        entries: &[TelemetryFieldKey],
        registry: &Registry,
    ) -> Result<String, QueryError> {
        match entries {
            [] if self.is_static_field(&key.name) => {
                let mut forced = key.clone();
                forced.field_context = self.default_context();
                self.field_for(&forced)
            }
            [] => Err(match suggest_correction(&key.name, registry.keys()) {
                Some(suggestion) => QueryError::FieldNotFoundSuggestion {
                    field: key.name.clone(),
                    suggestion,
                },
                None => QueryError::FieldNotFound(key.name.clone()),
            }),
            [single] => self.field_for(single),
            many => {
                // first non-empty physical representation wins
                let mut parts = Vec::with_capacity(many.len() * 2 + 1);
                for entry in many {
                    let col = self.field_for(entry)?;
                    parts.push(format!("toString({}) != ''", col));
                    parts.push(format!("toString({})", col));
                }
                parts.push("NULL".to_string());
                Ok(format!("multiIf({})", parts.join(", ")))
            }
        }
    }

    /// SELECT expression for a field, consulting the registry when the
    /// key does not resolve to a column directly. The result is always
    /// aliased back to the logical name.
    fn column_expression_for(
        &self,
        key: &TelemetryFieldKey,
        registry: &Registry,
    ) -> Result<String, QueryError> {
        let column = match self.field_for(key) {
            Ok(col) => col,
            Err(QueryError::ColumnNotFound(_)) => {
                let entries = registry
                    .get(&key.name)
                    .map(|v| v.as_slice())
                    .unwrap_or_default();
                self.registry_field_for(key, entries, registry)?
            }
            Err(e) => return Err(e),
        };
        Ok(format!("{} AS `{}`", column, key.name))
    }
}

/// Builds WHERE-clause conditions for one signal's tables.
pub trait ConditionBuilder {
    /// Physical column backing the key, as seen by the WHERE path.
    fn column_for(&self, key: &TelemetryFieldKey) -> Result<Column, QueryError>;

    /// Left-hand expression used inside conditions.
    fn table_field_name(&self, key: &TelemetryFieldKey) -> Result<String, QueryError>;

    /// Render one `key <op> value` condition, binding arguments on `frag`.
    fn condition_for(
        &self,
        key: &TelemetryFieldKey,
        op: FilterOperator,
        value: Option<&TelemetryValue>,
        frag: &mut SqlFragment,
    ) -> Result<String, QueryError>;
}

/// Suggest the closest registry name within a small edit distance.
pub fn suggest_correction<'a, I>(name: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut best: Option<(usize, &String)> = None;
    for candidate in candidates {
        let distance = levenshtein(name, candidate);
        if distance == 0 || distance > 2 {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.clone())
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("service.name", "service.name"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
    }

    #[test]
    fn test_suggestion_within_distance() {
        let candidates = vec!["service.name".to_string(), "http.status_code".to_string()];
        assert_eq!(
            suggest_correction("service.nam", candidates.iter()),
            Some("service.name".to_string())
        );
        assert_eq!(suggest_correction("completely.else", candidates.iter()), None);
    }

    #[test]
    fn test_exact_match_is_not_a_suggestion() {
        let candidates = vec!["service.name".to_string()];
        assert_eq!(suggest_correction("service.name", candidates.iter()), None);
    }
}

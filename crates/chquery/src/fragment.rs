//! Placeholder-bound SQL fragments
use telemetry::TelemetryValue;

/// Accumulates bound arguments while a condition tree is rendered to SQL
/// text. Every value is bound as a positional `?` placeholder; argument
/// order is the order in which conditions were rendered.
#[derive(Debug, Default)]
pub struct SqlFragment {
    args: Vec<TelemetryValue>,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn var(&mut self, value: TelemetryValue) -> &'static str {
        self.args.push(value);
        "?"
    }

    pub fn eq(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} = {}", field, self.var(value))
    }

    pub fn ne(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} <> {}", field, self.var(value))
    }

    pub fn gt(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} > {}", field, self.var(value))
    }

    pub fn ge(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} >= {}", field, self.var(value))
    }

    pub fn lt(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} < {}", field, self.var(value))
    }

    pub fn le(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} <= {}", field, self.var(value))
    }

    pub fn like(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} LIKE {}", field, self.var(value))
    }

    pub fn not_like(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("{} NOT LIKE {}", field, self.var(value))
    }

    /// Case-insensitive LIKE. ClickHouse has no ILIKE in older versions,
    /// so both sides are folded with LOWER().
    pub fn ilike(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("LOWER({}) LIKE LOWER({})", field, self.var(value))
    }

    pub fn not_ilike(&mut self, field: &str, value: TelemetryValue) -> String {
        format!("LOWER({}) NOT LIKE LOWER({})", field, self.var(value))
    }

    pub fn between(&mut self, field: &str, low: TelemetryValue, high: TelemetryValue) -> String {
        format!("{} BETWEEN {} AND {}", field, self.var(low), self.var(high))
    }

    pub fn not_between(
        &mut self,
        field: &str,
        low: TelemetryValue,
        high: TelemetryValue,
    ) -> String {
        format!(
            "{} NOT BETWEEN {} AND {}",
            field,
            self.var(low),
            self.var(high)
        )
    }

    pub fn args(&self) -> &[TelemetryValue] {
        &self.args
    }

    pub fn into_args(self) -> Vec<TelemetryValue> {
        self.args
    }
}

/// Join conditions with OR, always wrapping the result in parentheses.
/// A single condition still gets wrapped; callers rely on this for the
/// nesting the emitted WHERE clauses carry.
pub fn or_conds(conds: &[String]) -> String {
    format!("({})", conds.join(" OR "))
}

/// Join conditions with AND, always wrapping the result in parentheses.
pub fn and_conds(conds: &[String]) -> String {
    format!("({})", conds.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_bind_in_render_order() {
        let mut frag = SqlFragment::new();
        let a = frag.eq("service", TelemetryValue::from("redis"));
        let b = frag.gt("duration", TelemetryValue::from(100.0));
        assert_eq!(a, "service = ?");
        assert_eq!(b, "duration > ?");
        assert_eq!(
            frag.into_args(),
            vec![TelemetryValue::from("redis"), TelemetryValue::from(100.0)]
        );
    }

    #[test]
    fn test_single_condition_still_wrapped() {
        assert_eq!(or_conds(&["a = ?".to_string()]), "(a = ?)");
        assert_eq!(and_conds(&["a = ?".to_string()]), "(a = ?)");
    }

    #[test]
    fn test_joins() {
        let conds = vec!["a = ?".to_string(), "b = ?".to_string()];
        assert_eq!(or_conds(&conds), "(a = ? OR b = ?)");
        assert_eq!(and_conds(&conds), "(a = ? AND b = ?)");
    }

    #[test]
    fn test_between_binds_two_args() {
        let mut frag = SqlFragment::new();
        let cond = frag.between(
            "status",
            TelemetryValue::from(200.0),
            TelemetryValue::from(300.0),
        );
        assert_eq!(cond, "status BETWEEN ? AND ?");
        assert_eq!(frag.args().len(), 2);
    }

    #[test]
    fn test_ilike_folds_both_sides() {
        let mut frag = SqlFragment::new();
        let cond = frag.ilike("body", TelemetryValue::from("%error%"));
        assert_eq!(cond, "LOWER(body) LIKE LOWER(?)");
    }
}

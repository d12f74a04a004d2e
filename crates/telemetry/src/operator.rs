/// Filter operators and their properties
use std::fmt;

/// The closed set of filter operators the query language supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
    NotLike,
    ILike,
    NotILike,
    Between,
    NotBetween,
    In,
    NotIn,
    Exists,
    NotExists,
    Regexp,
    NotRegexp,
    Contains,
    NotContains,
}

impl FilterOperator {
    /// Whether a condition built for this operator should be paired with
    /// an existence check on the same key. Map columns return the value
    /// type's default for absent keys, so a bare `attributes_number['x']
    /// > 10` would also match rows where `x` was never set. Negative
    /// operators are excluded: they are expected to match absent keys.
    pub fn add_default_exists_filter(&self) -> bool {
        matches!(
            self,
            FilterOperator::Equal
                | FilterOperator::LessThan
                | FilterOperator::LessThanOrEq
                | FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEq
                | FilterOperator::Like
                | FilterOperator::ILike
                | FilterOperator::Between
                | FilterOperator::In
                | FilterOperator::Regexp
                | FilterOperator::Contains
        )
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            FilterOperator::NotEqual
                | FilterOperator::NotLike
                | FilterOperator::NotILike
                | FilterOperator::NotBetween
                | FilterOperator::NotIn
                | FilterOperator::NotExists
                | FilterOperator::NotRegexp
                | FilterOperator::NotContains
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "!=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEq => "<=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEq => ">=",
            FilterOperator::Like => "LIKE",
            FilterOperator::NotLike => "NOT LIKE",
            FilterOperator::ILike => "ILIKE",
            FilterOperator::NotILike => "NOT ILIKE",
            FilterOperator::Between => "BETWEEN",
            FilterOperator::NotBetween => "NOT BETWEEN",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::Exists => "EXISTS",
            FilterOperator::NotExists => "NOT EXISTS",
            FilterOperator::Regexp => "REGEXP",
            FilterOperator::NotRegexp => "NOT REGEXP",
            FilterOperator::Contains => "CONTAINS",
            FilterOperator::NotContains => "NOT CONTAINS",
        };
        write!(f, "{}", s)
    }
}

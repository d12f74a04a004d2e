/// AST definitions for filter expressions
///
/// The tree mirrors the grammar: a query is an OR of ANDs of optionally
/// negated primaries, where a primary is a grouped sub-expression, a
/// comparison, a function call, or a full-text term.
use std::fmt;

/// A complete filter query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub expression: OrExpression,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

/// One or more AND-expressions joined by OR
#[derive(Debug, Clone, PartialEq)]
pub struct OrExpression {
    pub and_expressions: Vec<AndExpression>,
}

impl fmt::Display for OrExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.and_expressions.iter().enumerate() {
            if i > 0 {
                write!(f, " OR ")?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}

/// One or more unary expressions joined by AND (explicit or implicit)
#[derive(Debug, Clone, PartialEq)]
pub struct AndExpression {
    pub unary_expressions: Vec<UnaryExpression>,
}

impl fmt::Display for AndExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, expr) in self.unary_expressions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", expr)?;
        }
        Ok(())
    }
}

/// A primary with an optional leading NOT
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub not: bool,
    pub primary: Primary,
}

impl fmt::Display for UnaryExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.not {
            write!(f, "NOT ")?;
        }
        write!(f, "{}", self.primary)
    }
}

/// The atoms of the grammar
#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    /// Parenthesized sub-expression
    Grouped(OrExpression),
    /// `key <op> value` and friends
    Comparison(Comparison),
    /// `has(...)`, `hasAny(...)`, ...
    FunctionCall(FunctionCall),
    /// A quoted string or bare word standing alone
    FullText(FullText),
}

impl fmt::Display for Primary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primary::Grouped(expr) => write!(f, "({})", expr),
            Primary::Comparison(cmp) => write!(f, "{}", cmp),
            Primary::FunctionCall(call) => write!(f, "{}", call),
            Primary::FullText(ft) => write!(f, "{}", ft),
        }
    }
}

/// A comparison of a key against zero or more values
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub key: Key,
    pub op: ComparisonOp,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.key, self.op)
    }
}

/// The operator side of a comparison, with its operands
#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOp {
    Exists { not: bool },
    In { not: bool, values: ValueList },
    Between { not: bool, low: Value, high: Value },
    Scalar { token: OperatorToken, not: bool, value: Value },
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOp::Exists { not } => {
                if *not {
                    write!(f, "NOT ")?;
                }
                write!(f, "EXISTS")
            }
            ComparisonOp::In { not, values } => {
                if *not {
                    write!(f, "NOT ")?;
                }
                write!(f, "IN ({})", values)
            }
            ComparisonOp::Between { not, low, high } => {
                if *not {
                    write!(f, "NOT ")?;
                }
                write!(f, "BETWEEN {} AND {}", low, high)
            }
            ComparisonOp::Scalar { token, not, value } => {
                if *not {
                    write!(f, "NOT ")?;
                }
                write!(f, "{} {}", token, value)
            }
        }
    }
}

/// Scalar comparison operator tokens as written in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorToken {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    ILike,
    Regexp,
    Contains,
}

impl fmt::Display for OperatorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorToken::Eq => write!(f, "="),
            OperatorToken::NotEq => write!(f, "!="),
            OperatorToken::Lt => write!(f, "<"),
            OperatorToken::Le => write!(f, "<="),
            OperatorToken::Gt => write!(f, ">"),
            OperatorToken::Ge => write!(f, ">="),
            OperatorToken::Like => write!(f, "LIKE"),
            OperatorToken::ILike => write!(f, "ILIKE"),
            OperatorToken::Regexp => write!(f, "REGEXP"),
            OperatorToken::Contains => write!(f, "CONTAINS"),
        }
    }
}

/// Comma-separated values inside `IN (...)` or `[...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ValueList(pub Vec<Value>);

impl fmt::Display for ValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        Ok(())
    }
}

/// A standalone search term matched against the full-text column
#[derive(Debug, Clone, PartialEq)]
pub struct FullText {
    pub text: String,
}

impl fmt::Display for FullText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.text)
    }
}

/// Built-in membership functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Has,
    HasAny,
    HasAll,
    HasNone,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        if name.eq_ignore_ascii_case("has") {
            Some(Function::Has)
        } else if name.eq_ignore_ascii_case("hasany") {
            Some(Function::HasAny)
        } else if name.eq_ignore_ascii_case("hasall") {
            Some(Function::HasAll)
        } else if name.eq_ignore_ascii_case("hasnone") {
            Some(Function::HasNone)
        } else {
            None
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Has => write!(f, "has"),
            Function::HasAny => write!(f, "hasAny"),
            Function::HasAll => write!(f, "hasAll"),
            Function::HasNone => write!(f, "hasNone"),
        }
    }
}

/// A function call with its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: Function,
    pub params: Vec<FunctionParam>,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, ")")
    }
}

/// A single function parameter
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionParam {
    Key(Key),
    Value(Value),
    Array(ValueList),
}

impl fmt::Display for FunctionParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionParam::Key(key) => write!(f, "{}", key),
            FunctionParam::Value(value) => write!(f, "{}", value),
            FunctionParam::Array(values) => write!(f, "[{}]", values),
        }
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Quoted string
    Text(String),
    Number(f64),
    Bool(bool),
    /// Bare unquoted word, treated as a string downstream
    Word(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "'{}'", s),
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Word(w) => write!(f, "{}", w),
        }
    }
}

/// The raw key text as written, before registry resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub text: String,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

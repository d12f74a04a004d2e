/// Parser for filter expressions
///
/// Converts a stream of tokens into an Abstract Syntax Tree (AST).
use super::ast::*;
use super::lexer::{Lexer, LexerError, Token};
use std::fmt;

/// Keywords that may follow NOT in a comparison (`key NOT LIKE ...`)
const NEGATABLE_KEYWORDS: &[&str] = &[
    "like", "ilike", "in", "between", "exists", "regexp", "contains",
];

/// Parser for filter expressions
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a filter expression string
    pub fn new(input: &str) -> Result<Self, ParserError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize().map_err(ParserError::LexerError)?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the filter expression
    pub fn parse(&mut self) -> Result<Query, ParserError> {
        let expression = self.parse_or_expr()?;

        // Ensure we're at EOF
        if self.current_token() != &Token::Eof {
            return Err(ParserError::UnexpectedToken(
                self.current_token().clone(),
                "expected EOF".to_string(),
            ));
        }

        Ok(Query { expression })
    }

    /// Parse OR expression (lowest precedence)
    fn parse_or_expr(&mut self) -> Result<OrExpression, ParserError> {
        let mut and_expressions = vec![self.parse_and_expr()?];

        while self.current_token().is_keyword("or") {
            self.advance();
            and_expressions.push(self.parse_and_expr()?);
        }

        Ok(OrExpression { and_expressions })
    }

    /// Parse AND expression
    ///
    /// AND between terms may be spelled out or left implicit: `a = 1 b = 2`
    /// means `a = 1 AND b = 2`.
    fn parse_and_expr(&mut self) -> Result<AndExpression, ParserError> {
        let mut unary_expressions = vec![self.parse_unary_expr()?];

        loop {
            if self.current_token().is_keyword("and") {
                self.advance();
                unary_expressions.push(self.parse_unary_expr()?);
            } else if self.starts_unary() {
                unary_expressions.push(self.parse_unary_expr()?);
            } else {
                break;
            }
        }

        Ok(AndExpression { unary_expressions })
    }

    /// Whether the current token can begin a new unary expression
    fn starts_unary(&self) -> bool {
        match self.current_token() {
            Token::LParen | Token::String(_) | Token::Number(_) => true,
            Token::Identifier(id) => !id.eq_ignore_ascii_case("or"),
            _ => false,
        }
    }

    /// Parse unary expression (optional leading NOT)
    fn parse_unary_expr(&mut self) -> Result<UnaryExpression, ParserError> {
        let mut not = false;
        if self.current_token().is_keyword("not") {
            self.advance();
            not = true;
        }
        let primary = self.parse_primary()?;
        Ok(UnaryExpression { not, primary })
    }

    /// Parse a primary: grouped sub-expression, comparison, function call,
    /// or full-text term
    fn parse_primary(&mut self) -> Result<Primary, ParserError> {
        match self.current_token().clone() {
            Token::LParen => {
                self.advance();
                let expr = self.parse_or_expr()?;
                self.expect_token(Token::RParen)?;
                Ok(Primary::Grouped(expr))
            }
            Token::String(s) => {
                self.advance();
                Ok(Primary::FullText(FullText { text: s }))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Primary::FullText(FullText {
                    text: format!("{}", n),
                }))
            }
            Token::Identifier(id) => {
                if Function::from_name(&id).is_some() && self.peek_token() == &Token::LParen {
                    self.parse_function_call()
                } else {
                    self.advance();
                    self.parse_key_tail(id)
                }
            }
            token => Err(ParserError::UnexpectedToken(
                token,
                "expected '(', key, or search term".to_string(),
            )),
        }
    }

    /// Parse what follows a key token: an operator makes it a comparison,
    /// anything else leaves the key standing alone as a full-text term.
    fn parse_key_tail(&mut self, key_text: String) -> Result<Primary, ParserError> {
        let key = Key { text: key_text };

        let scalar_token = match self.current_token() {
            Token::Eq => Some(OperatorToken::Eq),
            Token::NotEq => Some(OperatorToken::NotEq),
            Token::Lt => Some(OperatorToken::Lt),
            Token::Lte => Some(OperatorToken::Le),
            Token::Gt => Some(OperatorToken::Gt),
            Token::Gte => Some(OperatorToken::Ge),
            _ => None,
        };
        if let Some(token) = scalar_token {
            self.advance();
            let value = self.parse_value()?;
            return Ok(Primary::Comparison(Comparison {
                key,
                op: ComparisonOp::Scalar {
                    token,
                    not: false,
                    value,
                },
            }));
        }

        // `key NOT LIKE ...` vs `key NOT other_key = ...`: only treat NOT
        // as part of this comparison when a negatable keyword follows it
        let mut not = false;
        if self.current_token().is_keyword("not")
            && NEGATABLE_KEYWORDS
                .iter()
                .any(|kw| self.peek_token().is_keyword(kw))
        {
            self.advance();
            not = true;
        }

        let op = if self.current_token().is_keyword("like") {
            self.advance();
            ComparisonOp::Scalar {
                token: OperatorToken::Like,
                not,
                value: self.parse_value()?,
            }
        } else if self.current_token().is_keyword("ilike") {
            self.advance();
            ComparisonOp::Scalar {
                token: OperatorToken::ILike,
                not,
                value: self.parse_value()?,
            }
        } else if self.current_token().is_keyword("regexp") {
            self.advance();
            ComparisonOp::Scalar {
                token: OperatorToken::Regexp,
                not,
                value: self.parse_value()?,
            }
        } else if self.current_token().is_keyword("contains") {
            self.advance();
            ComparisonOp::Scalar {
                token: OperatorToken::Contains,
                not,
                value: self.parse_value()?,
            }
        } else if self.current_token().is_keyword("in") {
            self.advance();
            ComparisonOp::In {
                not,
                values: self.parse_value_list()?,
            }
        } else if self.current_token().is_keyword("between") {
            self.advance();
            let low = self.parse_value()?;
            if !self.current_token().is_keyword("and") {
                return Err(ParserError::UnexpectedToken(
                    self.current_token().clone(),
                    "expected AND in BETWEEN".to_string(),
                ));
            }
            self.advance();
            let high = self.parse_value()?;
            ComparisonOp::Between { not, low, high }
        } else if self.current_token().is_keyword("exists") {
            self.advance();
            ComparisonOp::Exists { not }
        } else {
            // bare key standing alone is a full-text term
            return Ok(Primary::FullText(FullText { text: key.text }));
        };

        Ok(Primary::Comparison(Comparison { key, op }))
    }

    /// Parse a function call: has(key, value), hasAny(key, [v1, v2]), ...
    fn parse_function_call(&mut self) -> Result<Primary, ParserError> {
        let name = self.expect_identifier()?;
        let function = Function::from_name(&name)
            .ok_or_else(|| ParserError::UnknownFunction(name.clone()))?;

        self.expect_token(Token::LParen)?;

        let mut params = Vec::new();
        if self.current_token() != &Token::RParen {
            params.push(self.parse_function_param()?);
            while self.current_token() == &Token::Comma {
                self.advance();
                params.push(self.parse_function_param()?);
            }
        }

        self.expect_token(Token::RParen)?;

        Ok(Primary::FunctionCall(FunctionCall { function, params }))
    }

    fn parse_function_param(&mut self) -> Result<FunctionParam, ParserError> {
        match self.current_token().clone() {
            Token::LBracket => {
                self.advance();
                let mut values = Vec::new();
                if self.current_token() != &Token::RBracket {
                    values.push(self.parse_value()?);
                    while self.current_token() == &Token::Comma {
                        self.advance();
                        values.push(self.parse_value()?);
                    }
                }
                self.expect_token(Token::RBracket)?;
                Ok(FunctionParam::Array(ValueList(values)))
            }
            Token::String(s) => {
                self.advance();
                Ok(FunctionParam::Value(Value::Text(s)))
            }
            Token::Number(n) => {
                self.advance();
                Ok(FunctionParam::Value(Value::Number(n)))
            }
            Token::Identifier(id) => {
                self.advance();
                if id.eq_ignore_ascii_case("true") {
                    Ok(FunctionParam::Value(Value::Bool(true)))
                } else if id.eq_ignore_ascii_case("false") {
                    Ok(FunctionParam::Value(Value::Bool(false)))
                } else {
                    Ok(FunctionParam::Key(Key { text: id }))
                }
            }
            token => Err(ParserError::UnexpectedToken(
                token,
                "expected function parameter".to_string(),
            )),
        }
    }

    /// Parse a literal value
    fn parse_value(&mut self) -> Result<Value, ParserError> {
        match self.current_token().clone() {
            Token::String(s) => {
                self.advance();
                Ok(Value::Text(s))
            }
            Token::Number(n) => {
                self.advance();
                Ok(Value::Number(n))
            }
            Token::Identifier(id) => {
                self.advance();
                if id.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if id.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Word(id))
                }
            }
            token => Err(ParserError::UnexpectedToken(
                token,
                "expected value".to_string(),
            )),
        }
    }

    /// Parse a value list: `(v1, v2, ...)` or `[v1, v2, ...]`
    fn parse_value_list(&mut self) -> Result<ValueList, ParserError> {
        let closing = match self.current_token() {
            Token::LParen => Token::RParen,
            Token::LBracket => Token::RBracket,
            token => {
                return Err(ParserError::UnexpectedToken(
                    token.clone(),
                    "expected '(' or '[' after IN".to_string(),
                ))
            }
        };
        self.advance();

        let mut values = Vec::new();
        if self.current_token() != &closing {
            values.push(self.parse_value()?);
            while self.current_token() == &Token::Comma {
                self.advance();
                values.push(self.parse_value()?);
            }
        }

        self.expect_token(closing)?;
        Ok(ValueList(values))
    }

    fn current_token(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn peek_token(&self) -> &Token {
        self.tokens.get(self.position + 1).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn expect_token(&mut self, expected: Token) -> Result<(), ParserError> {
        if self.current_token() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(ParserError::UnexpectedToken(
                self.current_token().clone(),
                format!("expected {:?}", expected),
            ))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParserError> {
        match self.current_token() {
            Token::Identifier(id) => {
                let result = id.clone();
                self.advance();
                Ok(result)
            }
            _ => Err(ParserError::UnexpectedToken(
                self.current_token().clone(),
                "expected identifier".to_string(),
            )),
        }
    }
}

/// Parser errors
#[derive(Debug, Clone)]
pub enum ParserError {
    LexerError(LexerError),
    UnexpectedToken(Token, String),
    UnknownFunction(String),
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::LexerError(e) => write!(f, "Lexer error: {}", e),
            ParserError::UnexpectedToken(token, expected) => {
                write!(f, "Unexpected token {:?}, {}", token, expected)
            }
            ParserError::UnknownFunction(name) => write!(f, "Unknown function: {}", name),
        }
    }
}

impl std::error::Error for ParserError {}

/// Parse a filter expression string into an AST
pub fn parse(input: &str) -> Result<Query, ParserError> {
    let mut parser = Parser::new(input)?;
    parser.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_primary(query: &Query) -> &Primary {
        assert_eq!(query.expression.and_expressions.len(), 1);
        let and = &query.expression.and_expressions[0];
        assert_eq!(and.unary_expressions.len(), 1);
        &and.unary_expressions[0].primary
    }

    #[test]
    fn test_simple_comparison() {
        let query = parse("service.name = 'redis'").unwrap();
        match single_primary(&query) {
            Primary::Comparison(cmp) => {
                assert_eq!(cmp.key.text, "service.name");
                assert_eq!(
                    cmp.op,
                    ComparisonOp::Scalar {
                        token: OperatorToken::Eq,
                        not: false,
                        value: Value::Text("redis".to_string()),
                    }
                );
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_and() {
        let query = parse("service.name = 'redis' http.status_code = 200").unwrap();
        assert_eq!(query.expression.and_expressions.len(), 1);
        assert_eq!(
            query.expression.and_expressions[0].unary_expressions.len(),
            2
        );
    }

    #[test]
    fn test_or_of_ands() {
        let query = parse("a = 1 AND b = 2 OR c = 3").unwrap();
        assert_eq!(query.expression.and_expressions.len(), 2);
        assert_eq!(
            query.expression.and_expressions[0].unary_expressions.len(),
            2
        );
        assert_eq!(
            query.expression.and_expressions[1].unary_expressions.len(),
            1
        );
    }

    #[test]
    fn test_grouped_expression() {
        let query = parse("(a = 1 OR b = 2) AND c = 3").unwrap();
        let and = &query.expression.and_expressions[0];
        assert_eq!(and.unary_expressions.len(), 2);
        assert!(matches!(
            and.unary_expressions[0].primary,
            Primary::Grouped(_)
        ));
    }

    #[test]
    fn test_not_like() {
        let query = parse("body NOT LIKE '%error%'").unwrap();
        match single_primary(&query) {
            Primary::Comparison(cmp) => {
                assert_eq!(
                    cmp.op,
                    ComparisonOp::Scalar {
                        token: OperatorToken::Like,
                        not: true,
                        value: Value::Text("%error%".to_string()),
                    }
                );
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_not_starts_new_term_after_bare_key() {
        // `error NOT b = 2`: `error` is a full-text term, NOT negates the
        // following comparison
        let query = parse("error NOT b = 2").unwrap();
        let and = &query.expression.and_expressions[0];
        assert_eq!(and.unary_expressions.len(), 2);
        assert!(matches!(
            and.unary_expressions[0].primary,
            Primary::FullText(_)
        ));
        assert!(and.unary_expressions[1].not);
    }

    #[test]
    fn test_in_with_brackets_and_parens() {
        for input in [
            "status IN ('ok', 'error')",
            "status in ['ok', 'error']",
        ] {
            let query = parse(input).unwrap();
            match single_primary(&query) {
                Primary::Comparison(cmp) => match &cmp.op {
                    ComparisonOp::In { not, values } => {
                        assert!(!not);
                        assert_eq!(values.0.len(), 2);
                    }
                    other => panic!("expected IN, got {:?}", other),
                },
                other => panic!("expected comparison, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_between() {
        let query = parse("duration_nano BETWEEN 100 AND 200").unwrap();
        match single_primary(&query) {
            Primary::Comparison(cmp) => {
                assert_eq!(
                    cmp.op,
                    ComparisonOp::Between {
                        not: false,
                        low: Value::Number(100.0),
                        high: Value::Number(200.0),
                    }
                );
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_exists() {
        let query = parse("http.route NOT EXISTS").unwrap();
        match single_primary(&query) {
            Primary::Comparison(cmp) => {
                assert_eq!(cmp.op, ComparisonOp::Exists { not: true });
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_function_call() {
        let query = parse("hasAny(events, ['exception', 'retry'])").unwrap();
        match single_primary(&query) {
            Primary::FunctionCall(call) => {
                assert_eq!(call.function, Function::HasAny);
                assert_eq!(call.params.len(), 2);
                assert!(matches!(call.params[0], FunctionParam::Key(_)));
                assert!(matches!(call.params[1], FunctionParam::Array(_)));
            }
            other => panic!("expected function call, got {:?}", other),
        }
    }

    #[test]
    fn test_full_text_terms() {
        let query = parse("\"connection refused\" error").unwrap();
        let and = &query.expression.and_expressions[0];
        assert_eq!(and.unary_expressions.len(), 2);
        for unary in &and.unary_expressions {
            assert!(matches!(unary.primary, Primary::FullText(_)));
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("a = 1)").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let query = parse("NOT (a = 1 OR b LIKE '%x%') AND c EXISTS").unwrap();
        assert_eq!(
            query.to_string(),
            "NOT (a = 1 OR b LIKE '%x%') AND c EXISTS"
        );
    }
}

/// Lexer/Tokenizer for the filter expression language
///
/// Converts filter expression strings into a stream of tokens for parsing.
use std::fmt;

/// Token types in filter expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    String(String),
    Number(f64),
    Identifier(String),

    // Operators
    Eq,    // = or ==
    NotEq, // != or <>
    Gt,    // >
    Gte,   // >=
    Lt,    // <
    Lte,   // <=

    // Delimiters
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,

    // Special
    Eof,
}

impl Token {
    /// Case-insensitive keyword check for identifier tokens
    pub fn is_keyword(&self, keyword: &str) -> bool {
        match self {
            Token::Identifier(id) => id.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::String(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(id) => write!(f, "{}", id),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Gt => write!(f, ">"),
            Token::Gte => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Lte => write!(f, "<="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

/// Characters allowed inside a bare key or word.
///
/// Keys carry dots (`service.name`), type suffixes (`status_code:int`),
/// materialized-column separators (`service$$name`) and the occasional
/// dash or slash from attribute names.
fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | ':' | '$' | '-' | '/')
}

/// Lexer for filter expressions
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer from input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        if self.is_eof() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        match ch {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            '[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            ']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            ',' => {
                self.advance();
                Ok(Token::Comma)
            }
            '=' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                }
                Ok(Token::Eq)
            }
            '!' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    Err(LexerError::UnexpectedCharacter(ch, self.position))
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Ok(Token::Gte)
                } else {
                    Ok(Token::Gt)
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == '=' {
                    self.advance();
                    Ok(Token::Lte)
                } else if self.current_char() == '>' {
                    self.advance();
                    Ok(Token::NotEq)
                } else {
                    Ok(Token::Lt)
                }
            }
            '"' => self.read_string('"'),
            '\'' => self.read_string('\''),
            _ if ch.is_ascii_digit()
                || (ch == '-' && self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false)) =>
            {
                self.read_number()
            }
            _ if ch.is_alphabetic() || ch == '_' => Ok(self.read_identifier()),
            _ => Err(LexerError::UnexpectedCharacter(ch, self.position)),
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn current_char(&self) -> char {
        if self.is_eof() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek(&self) -> Option<char> {
        if self.position + 1 < self.input.len() {
            Some(self.input[self.position + 1])
        } else {
            None
        }
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_eof() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn read_string(&mut self, quote_char: char) -> Result<Token, LexerError> {
        let start_pos = self.position;
        self.advance(); // skip opening quote

        let mut value = String::new();

        while !self.is_eof() && self.current_char() != quote_char {
            if self.current_char() == '\\' {
                self.advance();
                if self.is_eof() {
                    return Err(LexerError::UnterminatedString(start_pos));
                }
                match self.current_char() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    _ => {
                        value.push('\\');
                        value.push(self.current_char());
                    }
                }
            } else {
                value.push(self.current_char());
            }
            self.advance();
        }

        if self.is_eof() {
            return Err(LexerError::UnterminatedString(start_pos));
        }

        self.advance(); // skip closing quote
        Ok(Token::String(value))
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start_pos = self.position;
        let mut num_str = String::new();

        if self.current_char() == '-' {
            num_str.push('-');
            self.advance();
        }

        while !self.is_eof() && self.current_char().is_ascii_digit() {
            num_str.push(self.current_char());
            self.advance();
        }

        if !self.is_eof()
            && self.current_char() == '.'
            && self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false)
        {
            num_str.push('.');
            self.advance();

            while !self.is_eof() && self.current_char().is_ascii_digit() {
                num_str.push(self.current_char());
                self.advance();
            }
        }

        // a digit run followed by identifier characters is a key or word,
        // not a number: 2xx, 500ms, 2b.checkout
        if !self.is_eof() && is_identifier_char(self.current_char()) {
            while !self.is_eof() && is_identifier_char(self.current_char()) {
                num_str.push(self.current_char());
                self.advance();
            }
            return Ok(Token::Identifier(num_str));
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| LexerError::InvalidNumber(num_str, start_pos))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_eof() && is_identifier_char(self.current_char()) {
            ident.push(self.current_char());
            self.advance();
        }

        Token::Identifier(ident)
    }
}

/// Lexer errors
#[derive(Debug, Clone)]
pub enum LexerError {
    UnexpectedCharacter(char, usize),
    UnterminatedString(usize),
    InvalidNumber(String, usize),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter(ch, pos) => {
                write!(f, "Unexpected character '{}' at position {}", ch, pos)
            }
            LexerError::UnterminatedString(pos) => {
                write!(f, "Unterminated string starting at position {}", pos)
            }
            LexerError::InvalidNumber(num, pos) => {
                write!(f, "Invalid number '{}' at position {}", num, pos)
            }
        }
    }
}

impl std::error::Error for LexerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_comparison() {
        let mut lexer = Lexer::new("service.name = 'redis'");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("service.name".to_string()),
                Token::Eq,
                Token::String("redis".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_operators() {
        let mut lexer = Lexer::new("= == != <> > >= < <=");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Eq,
                Token::Eq,
                Token::NotEq,
                Token::NotEq,
                Token::Gt,
                Token::Gte,
                Token::Lt,
                Token::Lte,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_quote_styles() {
        let mut lexer = Lexer::new(r#"'single' "double""#);
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::String("single".to_string()),
                Token::String("double".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("200 3.14 -1");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(200.0),
                Token::Number(3.14),
                Token::Number(-1.0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_digit_prefixed_word_is_identifier() {
        let mut lexer = Lexer::new("2xx 500ms");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("2xx".to_string()),
                Token::Identifier("500ms".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_key_with_context_and_type() {
        let mut lexer = Lexer::new("resource.service.name:string");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("resource.service.name:string".to_string()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_value_list_delimiters() {
        let mut lexer = Lexer::new("status IN ('a', 'b')");
        let tokens = lexer.tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("status".to_string()),
                Token::Identifier("IN".to_string()),
                Token::LParen,
                Token::String("a".to_string()),
                Token::Comma,
                Token::String("b".to_string()),
                Token::RParen,
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_keyword_check_is_case_insensitive() {
        assert!(Token::Identifier("AND".to_string()).is_keyword("and"));
        assert!(Token::Identifier("and".to_string()).is_keyword("and"));
        assert!(!Token::Identifier("android".to_string()).is_keyword("and"));
    }
}

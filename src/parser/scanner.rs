//! Definition string tokenizer with single-token lookahead

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::errors::{ParseError, ParseResult};

/// Characters that end an unenclosed word
const TERMINATORS: &[char] = &[
    '|', '&', '%', '<', '>', '=', '(', ')', '[', ']', '?', '#', '\'', '"', '/',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Lt => "<",
            Comparator::Le => "<=",
            Comparator::Gt => ">",
            Comparator::Ge => ">=",
            Comparator::Eq => "==",
        }
    }

    /// The comparator seen from the other operand: `5 < x` is `x > 5`
    pub fn invert(&self) -> Comparator {
        match self {
            Comparator::Lt => Comparator::Gt,
            Comparator::Le => Comparator::Ge,
            Comparator::Gt => Comparator::Lt,
            Comparator::Ge => Comparator::Le,
            Comparator::Eq => Comparator::Eq,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Unenclosed run: number, bigint, keyword or alias
    Word(String),
    /// Quoted string (`'`, `"`) or regex (`/`) body
    Enclosed { delimiter: char, text: String },
    Bar,
    Amp,
    Percent,
    Comparator(Comparator),
    /// `[]`
    ListPostfix,
    /// `?`
    Optional,
    /// `#name`
    Brand(String),
    GroupOpen,
    GroupClose,
    End,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "{}", word),
            Token::Enclosed { delimiter, text } => write!(f, "{}{}{}", delimiter, text, delimiter),
            Token::Bar => write!(f, "|"),
            Token::Amp => write!(f, "&"),
            Token::Percent => write!(f, "%"),
            Token::Comparator(c) => write!(f, "{}", c),
            Token::ListPostfix => write!(f, "[]"),
            Token::Optional => write!(f, "?"),
            Token::Brand(name) => write!(f, "#{}", name),
            Token::GroupOpen => write!(f, "("),
            Token::GroupClose => write!(f, ")"),
            Token::End => write!(f, "end of definition"),
        }
    }
}

/// Lazy tokenizer over a definition string.
pub struct Scanner<'a> {
    chars: Peekable<Chars<'a>>,
    lookahead: Option<Token>,
}

impl<'a> Scanner<'a> {
    pub fn new(definition: &'a str) -> Self {
        Self {
            chars: definition.chars().peekable(),
            lookahead: None,
        }
    }

    /// Returns the next token without consuming it
    pub fn peek(&mut self) -> ParseResult<&Token> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.scan()?);
        }
        Ok(self.lookahead.get_or_insert(Token::End))
    }

    /// Consumes and returns the next token
    pub fn next(&mut self) -> ParseResult<Token> {
        match self.lookahead.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn scan(&mut self) -> ParseResult<Token> {
        self.skip_whitespace();
        let Some(c) = self.chars.next() else {
            return Ok(Token::End);
        };
        let token = match c {
            '|' => Token::Bar,
            '&' => Token::Amp,
            '%' => Token::Percent,
            '(' => Token::GroupOpen,
            ')' => Token::GroupClose,
            '?' => Token::Optional,
            '<' | '>' => {
                let inclusive = self.chars.next_if_eq(&'=').is_some();
                Token::Comparator(match (c, inclusive) {
                    ('<', false) => Comparator::Lt,
                    ('<', true) => Comparator::Le,
                    ('>', false) => Comparator::Gt,
                    _ => Comparator::Ge,
                })
            }
            '=' => {
                if self.chars.next_if_eq(&'=').is_none() {
                    return Err(ParseError::syntax("'=' must be followed by '=' to form '=='"));
                }
                Token::Comparator(Comparator::Eq)
            }
            '[' => {
                self.skip_whitespace();
                if self.chars.next_if_eq(&']').is_none() {
                    return Err(ParseError::syntax("'[' must be followed by ']' to form '[]'"));
                }
                Token::ListPostfix
            }
            ']' => return Err(ParseError::syntax("Unexpected ']'")),
            '#' => {
                let name = self.word();
                if name.is_empty() {
                    return Err(ParseError::syntax("'#' must be followed by a brand name"));
                }
                Token::Brand(name)
            }
            '\'' | '"' | '/' => self.enclosed(c)?,
            first => {
                let mut word = String::new();
                word.push(first);
                word.push_str(&self.word());
                Token::Word(word)
            }
        };
        Ok(token)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| !c.is_whitespace() && !TERMINATORS.contains(c))
        {
            word.push(c);
        }
        word
    }

    fn enclosed(&mut self, delimiter: char) -> ParseResult<Token> {
        let mut text = String::new();
        loop {
            match self.chars.next() {
                None => {
                    return Err(ParseError::syntax(format!(
                        "{}{} requires a closing {}",
                        delimiter, text, delimiter
                    )))
                }
                Some(c) if c == delimiter => break,
                Some('\\') => match self.chars.next() {
                    // regex bodies keep their escapes for the regex engine
                    Some(escaped) if delimiter == '/' => {
                        text.push('\\');
                        text.push(escaped);
                    }
                    Some(escaped) if escaped == delimiter || escaped == '\\' => text.push(escaped),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => text.push('\\'),
                },
                Some(c) => text.push(c),
            }
        }
        Ok(Token::Enclosed { delimiter, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(definition: &str) -> Vec<Token> {
        let mut scanner = Scanner::new(definition);
        let mut out = Vec::new();
        loop {
            let token = scanner.next().unwrap();
            if token == Token::End {
                return out;
            }
            out.push(token);
        }
    }

    #[test]
    fn test_operators_and_words() {
        assert_eq!(
            tokens("5<=number<10|string[]"),
            vec![
                Token::Word("5".into()),
                Token::Comparator(Comparator::Le),
                Token::Word("number".into()),
                Token::Comparator(Comparator::Lt),
                Token::Word("10".into()),
                Token::Bar,
                Token::Word("string".into()),
                Token::ListPostfix,
            ]
        );
    }

    #[test]
    fn test_enclosed_literal_ignores_operators() {
        assert_eq!(
            tokens("'a|b&c' | /x[]|y/"),
            vec![
                Token::Enclosed { delimiter: '\'', text: "a|b&c".into() },
                Token::Bar,
                Token::Enclosed { delimiter: '/', text: "x[]|y".into() },
            ]
        );
    }

    #[test]
    fn test_escaped_delimiter() {
        assert_eq!(
            tokens(r"'it\'s'"),
            vec![Token::Enclosed { delimiter: '\'', text: "it's".into() }]
        );
    }

    #[test]
    fn test_unterminated_literal_is_syntax_error() {
        let mut scanner = Scanner::new("'abc");
        let err = scanner.next().unwrap_err();
        assert_eq!(err.code().code(), "AERO_SCHEMA_SYNTAX");
    }

    #[test]
    fn test_brand_and_spaced_list() {
        assert_eq!(
            tokens("string #id [ ]"),
            vec![
                Token::Word("string".into()),
                Token::Brand("id".into()),
                Token::ListPostfix,
            ]
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut scanner = Scanner::new("a|b");
        assert_eq!(scanner.peek().unwrap(), &Token::Word("a".into()));
        assert_eq!(scanner.next().unwrap(), Token::Word("a".into()));
        assert_eq!(scanner.next().unwrap(), Token::Bar);
    }
}

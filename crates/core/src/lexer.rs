//! Source text to token stream.
//!
//! The lexer is total: every character of the input ends up in exactly one
//! token, including whitespace and comments, so concatenating token texts
//! reproduces the source. Characters that match no rule become
//! [`TokenKind::Invalid`] tokens and lexing continues.

use crate::error::Location;

/// The closed keyword set. Identifiers in this list lex as keywords.
pub const KEYWORDS: &[&str] = &[
    "declare",
    "group",
    "blueprint",
    "do",
    "for",
    "task",
    "mutable",
    "immutable",
    "print",
    "if",
    "elif",
    "else",
    "each",
    "in",
    "march",
    "from",
    "to",
    "select",
    "case",
    "when",
    "end",
    "true",
    "false",
    "null",
    "and",
    "or",
    "not",
    "ask",
    "route",
    "respond",
];

/// Operators matched before any single-character operator.
const TWO_CHAR_OPERATORS: &[&str] = &[":=", "==", "!=", "<=", ">=", "=>", "&&", "||"];

const ONE_CHAR_OPERATORS: &[char] = &['=', '<', '>', '+', '-', '*', '/', '%', '!'];

const PUNCTUATION: &[char] = &['(', ')', '[', ']', '{', '}', ',', ':', '.'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Keyword,
    /// Quoted string literal; `text` includes the quotes.
    Str,
    Number,
    Operator,
    Punct,
    Comment,
    Whitespace,
    Newline,
    /// A character no rule accepts.
    Invalid,
    /// A string literal cut off by end of line or end of input.
    UnterminatedStr,
    Eof,
}

impl TokenKind {
    /// Tokens the parser never sees.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Comment | TokenKind::Whitespace | TokenKind::Newline
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source slice covered by this token.
    pub text: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::new(self.line, self.column)
    }

    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.is(TokenKind::Keyword, keyword)
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.is(TokenKind::Operator, op)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.is(TokenKind::Punct, punct)
    }

    /// Decoded contents of a string token (quotes stripped, escapes resolved).
    ///
    /// Returns `None` for any other kind of token.
    pub fn string_value(&self) -> Option<String> {
        if !matches!(self.kind, TokenKind::Str | TokenKind::UnterminatedStr) {
            return None;
        }
        let mut chars = self.text.chars();
        let quote = chars.next()?;
        let mut out = String::new();
        while let Some(c) = chars.next() {
            if c == quote {
                break;
            }
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                    None => break,
                }
                continue;
            }
            out.push(c);
        }
        Some(out)
    }
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Tokenize `src`. The returned vector always ends with an [`TokenKind::Eof`] token.
pub fn lex(src: &str) -> Vec<Token> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut column: u32 = 1;

    while pos < chars.len() {
        let c = chars[pos];
        let start = pos;
        let (tok_line, tok_column) = (line, column);

        let kind = if c == '\n' {
            pos += 1;
            TokenKind::Newline
        } else if c == '#' {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            TokenKind::Comment
        } else if c.is_whitespace() {
            while pos < chars.len() && chars[pos] != '\n' && chars[pos].is_whitespace() {
                pos += 1;
            }
            TokenKind::Whitespace
        } else if c == '"' || c == '\'' {
            pos += 1;
            let mut closed = false;
            while pos < chars.len() && chars[pos] != '\n' {
                let sc = chars[pos];
                if sc == '\\' && pos + 1 < chars.len() && chars[pos + 1] != '\n' {
                    pos += 2;
                    continue;
                }
                pos += 1;
                if sc == c {
                    closed = true;
                    break;
                }
            }
            if closed {
                TokenKind::Str
            } else {
                TokenKind::UnterminatedStr
            }
        } else if c.is_ascii_digit() {
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
            if pos + 1 < chars.len() && chars[pos] == '.' && chars[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            TokenKind::Number
        } else if c.is_ascii_alphabetic() || c == '_' {
            while pos < chars.len() && (chars[pos].is_ascii_alphanumeric() || chars[pos] == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().collect();
            if is_keyword(&word) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            }
        } else if pos + 1 < chars.len() && is_two_char_operator(c, chars[pos + 1]) {
            pos += 2;
            TokenKind::Operator
        } else if ONE_CHAR_OPERATORS.contains(&c) {
            pos += 1;
            TokenKind::Operator
        } else if PUNCTUATION.contains(&c) {
            pos += 1;
            TokenKind::Punct
        } else {
            pos += 1;
            TokenKind::Invalid
        };

        let text: String = chars[start..pos].iter().collect();
        if kind == TokenKind::Newline {
            line += 1;
            column = 1;
        } else {
            column += (pos - start) as u32;
        }
        tokens.push(Token {
            kind,
            text,
            line: tok_line,
            column: tok_column,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        column,
    });
    tokens
}

fn is_two_char_operator(first: char, second: char) -> bool {
    TWO_CHAR_OPERATORS.iter().any(|op| {
        let mut op_chars = op.chars();
        op_chars.next() == Some(first) && op_chars.next() == Some(second)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn significant(src: &str) -> Vec<(TokenKind, String)> {
        lex(src)
            .into_iter()
            .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::Eof)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn token_texts_reproduce_source() {
        let src = "declare web\n# comment\nmutable x = 'a\\'b' + 1.5\n\tprint x ~\n\"open";
        let rebuilt: String = lex(src).iter().map(|t| t.text.as_str()).collect();
        assert_eq!(rebuilt, src);
    }

    #[test]
    fn two_char_operators_win_over_one_char() {
        let ops: Vec<String> = significant("a := b == c != d <= e >= f => g = h < i > j")
            .into_iter()
            .filter(|(k, _)| *k == TokenKind::Operator)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(
            ops,
            vec![":=", "==", "!=", "<=", ">=", "=>", "=", "<", ">"]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let toks = significant("group Counter task endless end");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Keyword, "group".to_string()),
                (TokenKind::Identifier, "Counter".to_string()),
                (TokenKind::Keyword, "task".to_string()),
                (TokenKind::Identifier, "endless".to_string()),
                (TokenKind::Keyword, "end".to_string()),
            ]
        );
    }

    #[test]
    fn numbers_with_and_without_fraction() {
        let toks = significant("42 3.14 7.");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Number, "42".to_string()),
                (TokenKind::Number, "3.14".to_string()),
                (TokenKind::Number, "7".to_string()),
                (TokenKind::Punct, ".".to_string()),
            ]
        );
    }

    #[test]
    fn string_escapes_are_decoded() {
        let toks = lex(r#""say \"hi\"\n" 'it\'s'"#);
        assert_eq!(toks[0].kind, TokenKind::Str);
        assert_eq!(toks[0].string_value().as_deref(), Some("say \"hi\"\n"));
        assert_eq!(toks[2].kind, TokenKind::Str);
        assert_eq!(toks[2].string_value().as_deref(), Some("it's"));
    }

    #[test]
    fn unterminated_string_stops_at_line_end() {
        let toks = lex("print \"oops\nprint 1");
        assert_eq!(toks[2].kind, TokenKind::UnterminatedStr);
        assert_eq!(toks[2].text, "\"oops");
        assert_eq!(toks[3].kind, TokenKind::Newline);
        assert_eq!(toks[4].line, 2);
    }

    #[test]
    fn invalid_characters_do_not_abort() {
        let toks = significant("a @ b $");
        assert_eq!(
            toks,
            vec![
                (TokenKind::Identifier, "a".to_string()),
                (TokenKind::Invalid, "@".to_string()),
                (TokenKind::Identifier, "b".to_string()),
                (TokenKind::Invalid, "$".to_string()),
            ]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let toks = lex("mutable x\n  print x");
        let print = toks.iter().find(|t| t.is_keyword("print")).unwrap();
        assert_eq!((print.line, print.column), (2, 3));
        let eof = toks.last().unwrap();
        assert_eq!(eof.kind, TokenKind::Eof);
        assert_eq!(eof.line, 2);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let toks = lex("x # note := 1\ny");
        assert_eq!(toks[2].kind, TokenKind::Comment);
        assert_eq!(toks[2].text, "# note := 1");
        assert_eq!(toks[3].kind, TokenKind::Newline);
    }
}

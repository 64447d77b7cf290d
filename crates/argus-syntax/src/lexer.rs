//! Lexer wrapper: position tracking and automatic semicolon insertion.
//!
//! [`logos`] produces raw tokens with byte spans; this module converts them
//! into a flat token stream with `line:col` positions and applies the
//! semicolon insertion rule so the parser only ever sees explicit `;`
//! statement terminators.

use logos::Logos;

use crate::{
    error::SyntaxError,
    pos::Pos,
    token::Token,
};

/// A token paired with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: Pos,
}

/// Maps byte offsets to 1-based line/column pairs.
struct LineIndex {
    /// Byte offset of the start of each line.
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(src: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }
        Self { starts }
    }

    fn pos(&self, offset: usize) -> Pos {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Pos {
            line: u32::try_from(line + 1).unwrap_or(u32::MAX),
            col: u32::try_from(offset - self.starts[line] + 1).unwrap_or(u32::MAX),
        }
    }
}

/// Tokenizes a whole source file.
///
/// Newline tokens are consumed here: a newline becomes a `;` when the
/// previous significant token terminates a statement, and disappears
/// otherwise. The returned stream therefore contains no [`Token::Newline`].
pub fn tokenize(file: &str, src: &str) -> Result<Vec<Spanned>, SyntaxError> {
    let index = LineIndex::new(src);
    let mut out: Vec<Spanned> = Vec::new();
    let mut lexer = Token::lexer(src);
    while let Some(item) = lexer.next() {
        let pos = index.pos(lexer.span().start);
        let token = match item {
            Ok(token) => token,
            Err(()) => {
                return Err(SyntaxError::Lex {
                    file: file.to_owned(),
                    pos,
                    text: lexer.slice().to_owned(),
                });
            }
        };
        if token == Token::Newline {
            if out.last().is_some_and(|prev| prev.token.terminates_statement()) {
                out.push(Spanned { token: Token::Semi, pos });
            }
            continue;
        }
        out.push(Spanned { token, pos });
    }
    // A final statement without a trailing newline still terminates.
    if out.last().is_some_and(|prev| prev.token.terminates_statement()) {
        let pos = index.pos(src.len());
        out.push(Spanned { token: Token::Semi, pos });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize("test.go", src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn semicolon_inserted_after_identifier_at_line_end() {
        let tokens = kinds("x := 1\ny := 2\n");
        let semis = tokens.iter().filter(|t| **t == Token::Semi).count();
        assert_eq!(semis, 2, "each line should end in an inserted semicolon");
    }

    #[test]
    fn no_semicolon_after_operator_at_line_end() {
        let tokens = kinds("x := 1 +\n2\n");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()),
                Token::Define,
                Token::Int(1),
                Token::Plus,
                Token::Int(2),
                Token::Semi,
            ],
        );
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = tokenize("test.go", "a\n  b").unwrap();
        assert_eq!(tokens[0].pos, Pos { line: 1, col: 1 });
        assert_eq!(tokens[2].pos, Pos { line: 2, col: 3 });
    }

    #[test]
    fn hex_binary_and_underscore_literals() {
        assert_eq!(kinds("0x1F")[0], Token::Int(31));
        assert_eq!(kinds("0b101")[0], Token::Int(5));
        assert_eq!(kinds("1_000")[0], Token::Int(1000));
    }

    #[test]
    fn string_escapes_are_decoded() {
        assert_eq!(kinds(r#""a\nb""#)[0], Token::Str("a\nb".into()));
        assert_eq!(kinds("`raw\\n`")[0], Token::RawStr("raw\\n".into()));
    }
}

//! Token definitions for the Source Language lexer.
//!
//! The token set covers the full surface grammar: keywords, operators
//! (including `:=`, `...`, `<-`, `~` and the compound assignment forms),
//! and literal shapes. `true`, `false`, `nil`, `iota` and the built-in type
//! names are predeclared identifiers, not keywords, so they lex as `Ident`
//! and are resolved by the evaluator's identifier lookup order.

use logos::Logos;

/// Unescapes the body of an interpreted string literal.
///
/// Handles the common single-character escapes plus `\xNN` and `\uNNNN`.
/// Unknown escapes keep the escaped character as-is rather than failing —
/// the parser reports positions, not the lexer.
fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                if let Ok(b) = u8::from_str_radix(&hex, 16) {
                    out.push(b as char);
                }
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(c) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(c);
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn parse_int(slice: &str) -> Option<i64> {
    let cleaned: String = slice.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = cleaned.strip_prefix("0o").or_else(|| cleaned.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()
    } else {
        cleaned.parse().ok()
    }
}

fn parse_rune(slice: &str) -> Option<i64> {
    let body = &slice[1..slice.len() - 1];
    let unescaped = unescape(body);
    unescaped.chars().next().map(|c| i64::from(u32::from(c)))
}

/// A lexical token.
///
/// Produced by [`logos`]; newlines are kept as tokens so the lexer wrapper
/// can apply the automatic semicolon insertion rule.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*+/")]
pub enum Token {
    #[token("\n")]
    Newline,

    // --- keywords ---
    #[token("package")]
    Package,
    #[token("import")]
    Import,
    #[token("func")]
    Func,
    #[token("type")]
    Type,
    #[token("struct")]
    Struct,
    #[token("interface")]
    Interface,
    #[token("map")]
    Map,
    #[token("chan")]
    Chan,
    #[token("var")]
    Var,
    #[token("const")]
    Const,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("range")]
    Range,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("fallthrough")]
    Fallthrough,
    #[token("defer")]
    Defer,
    #[token("go")]
    Go,
    #[token("goto")]
    Goto,
    #[token("select")]
    Select,

    // --- literals ---
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Ident(String),
    #[regex(r"[0-9][0-9_]*|0[xX][0-9a-fA-F_]+|0[bB][01_]+|0[oO][0-7_]+", |lex| parse_int(lex.slice()), priority = 3)]
    Int(i64),
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?|[0-9][0-9_]*[eE][+-]?[0-9]+|\.[0-9][0-9_]*([eE][+-]?[0-9]+)?", |lex| lex.slice().replace('_', "").parse::<f64>().ok())]
    Float(f64),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| { let s = lex.slice(); unescape(&s[1..s.len() - 1]) })]
    Str(String),
    #[regex(r"`[^`]*`", |lex| { let s = lex.slice(); s[1..s.len() - 1].to_owned() })]
    RawStr(String),
    #[regex(r"'([^'\\\n]|\\.)+'", |lex| parse_rune(lex.slice()))]
    Rune(i64),

    // --- operators and delimiters ---
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AmpCaret,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("<-")]
    Arrow,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("=")]
    Assign,
    #[token(":=")]
    Define,
    #[token("!")]
    Not,
    #[token("...")]
    Ellipsis,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("&=")]
    AmpAssign,
    #[token("|=")]
    PipeAssign,
    #[token("^=")]
    CaretAssign,
    #[token("<<=")]
    ShlAssign,
    #[token(">>=")]
    ShrAssign,
    #[token("&^=")]
    AmpCaretAssign,
}

impl Token {
    /// Whether a newline directly after this token inserts a semicolon.
    ///
    /// This is the Source Language's automatic semicolon rule: insertion
    /// happens after identifiers, literals, the `break`/`continue`/
    /// `fallthrough`/`return` keywords, `++`/`--`, and closing delimiters.
    pub(crate) fn terminates_statement(&self) -> bool {
        matches!(
            self,
            Self::Ident(_)
                | Self::Int(_)
                | Self::Float(_)
                | Self::Str(_)
                | Self::RawStr(_)
                | Self::Rune(_)
                | Self::Break
                | Self::Continue
                | Self::Fallthrough
                | Self::Return
                | Self::PlusPlus
                | Self::MinusMinus
                | Self::RParen
                | Self::RBracket
                | Self::RBrace
        )
    }

    /// Short human-readable description used in parse errors.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Newline => "newline".to_owned(),
            Self::Ident(name) => format!("identifier {name:?}"),
            Self::Int(v) => format!("integer literal {v}"),
            Self::Float(v) => format!("float literal {v}"),
            Self::Str(_) | Self::RawStr(_) => "string literal".to_owned(),
            Self::Rune(_) => "rune literal".to_owned(),
            other => format!("{other:?}"),
        }
    }
}

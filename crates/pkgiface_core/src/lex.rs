use logos::Logos;

use crate::{
    diag::Diag,
    source::{FileId, SourceManager, Span},
};

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"0[xX][0-9A-Fa-f]+|[0-9]+")]
    Int,

    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+")]
    Float,

    #[regex(r"([0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?)i")]
    Imag,

    #[regex(r#"\"([^\"\\]|\\.)*\""#)]
    String,

    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
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
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("=")]
    Eq,
    #[token("...")]
    Ellipsis,
    #[token(".")]
    Dot,

    #[regex(r"\n")]
    Newline,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub file: FileId,
    pub span: Span,
    pub lexeme: String,
}

pub fn lex_file(source_manager: &SourceManager, file: FileId) -> (Vec<Token>, Vec<Diag>) {
    let source = &source_manager.file(file).text;
    let mut tokens = Vec::new();
    let mut diags = Vec::new();

    for (kind, span) in TokenKind::lexer(source).spanned() {
        match kind {
            Ok(kind) => {
                tokens.push(Token {
                    kind,
                    file,
                    span: span.start..span.end,
                    lexeme: source[span.clone()].to_string(),
                });
            }
            Err(_) => {
                diags.push(
                    Diag::error(file, span.start..span.end, "invalid token")
                        .with_help("remove or replace this character"),
                );
            }
        }
    }

    (tokens, diags)
}

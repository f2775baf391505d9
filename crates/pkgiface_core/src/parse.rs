use std::fmt;

use chumsky::{
    IterParser,
    error::Rich,
    extra,
    prelude::{Parser, choice, end, just, recursive, select_ref},
    span::SimpleSpan,
};

use crate::{
    constant::ConstValue,
    diag::{Diag, DiagLabel},
    ir::{Decl, DeclKind, FieldExpr, ImportClause, Manifest, PackageClause, QualName, SigExpr, TypeExpr},
    lex::{Token, TokenKind},
    source::{FileId, Span, Spanned},
};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ParseToken {
    Ident(String),
    Int(String),
    Float(String),
    Imag(String),
    String(String),

    Comma,
    Semi,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Minus,
    Star,
    Eq,
    Ellipsis,
    Dot,
}

impl fmt::Display for ParseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseToken::Ident(name) => write!(f, "`{name}`"),
            ParseToken::Int(raw) | ParseToken::Float(raw) | ParseToken::Imag(raw) => {
                write!(f, "`{raw}`")
            }
            ParseToken::String(value) => write!(f, "{value:?}"),
            ParseToken::Comma => f.write_str("`,`"),
            ParseToken::Semi => f.write_str("`;`"),
            ParseToken::LParen => f.write_str("`(`"),
            ParseToken::RParen => f.write_str("`)`"),
            ParseToken::LBracket => f.write_str("`[`"),
            ParseToken::RBracket => f.write_str("`]`"),
            ParseToken::LBrace => f.write_str("`{`"),
            ParseToken::RBrace => f.write_str("`}`"),
            ParseToken::Minus => f.write_str("`-`"),
            ParseToken::Star => f.write_str("`*`"),
            ParseToken::Eq => f.write_str("`=`"),
            ParseToken::Ellipsis => f.write_str("`...`"),
            ParseToken::Dot => f.write_str("`.`"),
        }
    }
}

#[derive(Clone, Debug)]
struct LineToken {
    kind: ParseToken,
    span: Span,
}

#[derive(Clone, Debug)]
struct Node<T> {
    value: T,
    span: SimpleSpan<usize>,
}

impl<T> Node<T> {
    fn new(value: T, span: SimpleSpan<usize>) -> Self {
        Self { value, span }
    }
}

#[derive(Clone, Debug)]
enum ParsedLine {
    Package {
        name: Node<String>,
        path: Node<String>,
    },
    Import {
        alias: Option<Node<String>>,
        path: Node<String>,
    },
    Decl {
        name: Node<QualName>,
        kind: DeclKind,
    },
}

type PError<'src> = Rich<'src, ParseToken>;
type PExtra<'src> = extra::Err<PError<'src>>;

pub fn parse_tokens(tokens: &[Token]) -> (Manifest, Vec<Diag>) {
    let mut manifest = Manifest::default();
    let mut diags = Vec::new();

    let mut line_start = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        if token.kind == TokenKind::Newline {
            parse_line(&tokens[line_start..idx], &mut manifest, &mut diags);
            line_start = idx + 1;
        }
    }

    if line_start < tokens.len() {
        parse_line(&tokens[line_start..], &mut manifest, &mut diags);
    }

    (manifest, diags)
}

fn parse_line(raw_tokens: &[Token], manifest: &mut Manifest, diags: &mut Vec<Diag>) {
    if raw_tokens.is_empty() {
        return;
    }

    let file = raw_tokens[0].file;
    let line_tokens = to_line_tokens(raw_tokens, diags);
    if line_tokens.is_empty() {
        return;
    }

    let parse_input: Vec<ParseToken> = line_tokens.iter().map(|token| token.kind.clone()).collect();

    match line_parser().parse(parse_input.as_slice()).into_result() {
        Ok(parsed) => push_parsed_line(parsed, file, &line_tokens, manifest, diags),
        Err(errors) => push_parse_errors(errors, file, &line_tokens, diags),
    }
}

fn push_parsed_line(
    parsed: ParsedLine,
    file: FileId,
    line_tokens: &[LineToken],
    manifest: &mut Manifest,
    diags: &mut Vec<Diag>,
) {
    match parsed {
        ParsedLine::Package { name, path } => {
            let name = to_spanned(name, file, line_tokens);
            let path = to_spanned(path, file, line_tokens);
            if let Some(previous) = &manifest.package {
                diags.push(
                    Diag::error_at(&name.pos(), "duplicate package clause")
                        .with_label(DiagLabel::at(&previous.name.pos(), "first package clause")),
                );
                return;
            }
            manifest.package = Some(PackageClause { name, path });
        }
        ParsedLine::Import { alias, path } => {
            manifest.imports.push(ImportClause {
                alias: alias.map(|alias| to_spanned(alias, file, line_tokens)),
                path: to_spanned(path, file, line_tokens),
            });
        }
        ParsedLine::Decl { name, kind } => {
            manifest.decls.push(Decl {
                name: to_spanned(name, file, line_tokens),
                kind,
            });
        }
    }
}

fn push_parse_errors(
    errors: Vec<PError<'_>>,
    file: FileId,
    line_tokens: &[LineToken],
    diags: &mut Vec<Diag>,
) {
    for error in errors {
        let span = byte_span(*error.span(), line_tokens);
        diags.push(
            Diag::error(file, span.clone(), "parse error").with_label(DiagLabel {
                file,
                span,
                message: error.to_string(),
            }),
        );
    }
}

fn to_line_tokens(raw_tokens: &[Token], diags: &mut Vec<Diag>) -> Vec<LineToken> {
    let mut out = Vec::with_capacity(raw_tokens.len());

    for token in raw_tokens {
        let kind = match token.kind {
            TokenKind::Ident => ParseToken::Ident(token.lexeme.clone()),
            TokenKind::Int => ParseToken::Int(token.lexeme.clone()),
            TokenKind::Float => ParseToken::Float(token.lexeme.clone()),
            TokenKind::Imag => ParseToken::Imag(token.lexeme.clone()),
            TokenKind::String => match unquote(&token.lexeme) {
                Ok(value) => ParseToken::String(value),
                Err(message) => {
                    diags.push(Diag::error(token.file, token.span.clone(), message));
                    ParseToken::String(String::new())
                }
            },
            TokenKind::Comma => ParseToken::Comma,
            TokenKind::Semi => ParseToken::Semi,
            TokenKind::LParen => ParseToken::LParen,
            TokenKind::RParen => ParseToken::RParen,
            TokenKind::LBracket => ParseToken::LBracket,
            TokenKind::RBracket => ParseToken::RBracket,
            TokenKind::LBrace => ParseToken::LBrace,
            TokenKind::RBrace => ParseToken::RBrace,
            TokenKind::Minus => ParseToken::Minus,
            TokenKind::Star => ParseToken::Star,
            TokenKind::Eq => ParseToken::Eq,
            TokenKind::Ellipsis => ParseToken::Ellipsis,
            TokenKind::Dot => ParseToken::Dot,
            TokenKind::Newline => continue,
        };

        out.push(LineToken {
            kind,
            span: token.span.clone(),
        });
    }

    out
}

fn line_parser<'src>() -> impl Parser<'src, &'src [ParseToken], ParsedLine, PExtra<'src>> {
    let ident = ident_parser();
    let string = select_ref! {
        ParseToken::String(value) => value.clone(),
    };
    let ty = type_parser();
    let decl_name = qual_name_parser().map_with(|value, extra| Node::new(value, extra.span()));

    let package = keyword("package")
        .ignore_then(
            ident
                .clone()
                .map_with(|value, extra| Node::new(value, extra.span())),
        )
        .then(
            string
                .clone()
                .map_with(|value, extra| Node::new(value, extra.span())),
        )
        .map(|(name, path)| ParsedLine::Package { name, path });

    let import = keyword("import")
        .ignore_then(
            ident
                .clone()
                .map_with(|value, extra| Node::new(value, extra.span()))
                .or_not(),
        )
        .then(string.map_with(|value, extra| Node::new(value, extra.span())))
        .map(|(alias, path)| ParsedLine::Import { alias, path });

    let type_decl = keyword("type")
        .ignore_then(decl_name.clone())
        .then(just(ParseToken::Eq).or_not())
        .then(ty.clone())
        .map(|((name, eq), ty)| ParsedLine::Decl {
            name,
            kind: match eq {
                Some(_) => DeclKind::Alias(ty),
                None => DeclKind::Type(ty),
            },
        });

    let method = keyword("func")
        .ignore_then(
            ty.clone()
                .delimited_by(just(ParseToken::LParen), just(ParseToken::RParen)),
        )
        .then(ident.map_with(|name, extra| Node::new(QualName::local(name), extra.span())))
        .then(signature_parser(ty.clone()))
        .map(|((recv, name), sig)| ParsedLine::Decl {
            name,
            kind: DeclKind::Method { recv, sig },
        });

    let func = keyword("func")
        .ignore_then(decl_name.clone())
        .then(signature_parser(ty.clone()))
        .map(|(name, sig)| ParsedLine::Decl {
            name,
            kind: DeclKind::Func(sig),
        });

    let var = keyword("var")
        .ignore_then(decl_name.clone())
        .then(ty.clone())
        .map(|(name, ty)| ParsedLine::Decl {
            name,
            kind: DeclKind::Var(ty),
        });

    let constant = keyword("const")
        .ignore_then(decl_name)
        .then(ty)
        .then_ignore(just(ParseToken::Eq))
        .then(literal_parser())
        .map(|((name, ty), value)| ParsedLine::Decl {
            name,
            kind: DeclKind::Const { ty, value },
        });

    choice((package, import, type_decl, method, func, var, constant)).then_ignore(end())
}

fn keyword<'src>(word: &'static str) -> impl Parser<'src, &'src [ParseToken], (), PExtra<'src>> + Clone {
    just(ParseToken::Ident(word.to_string())).ignored()
}

fn ident_parser<'src>() -> impl Parser<'src, &'src [ParseToken], String, PExtra<'src>> + Clone {
    select_ref! {
        ParseToken::Ident(name) => name.clone(),
    }
}

fn qual_name_parser<'src>() -> impl Parser<'src, &'src [ParseToken], QualName, PExtra<'src>> + Clone
{
    ident_parser()
        .then(just(ParseToken::Dot).ignore_then(ident_parser()).or_not())
        .map(|(first, second)| match second {
            Some(name) => QualName {
                qualifier: Some(first),
                name,
            },
            None => QualName::local(first),
        })
}

fn type_parser<'src>() -> impl Parser<'src, &'src [ParseToken], TypeExpr, PExtra<'src>> + Clone {
    recursive(|ty| {
        let length = select_ref! {
            ParseToken::Int(raw) => raw.clone(),
        }
        .try_map(|raw: String, span| {
            parse_int(&raw)
                .and_then(|len| u64::try_from(len).map_err(|_| format!("invalid array length `{raw}`")))
                .map_err(|message| Rich::custom(span, message))
        });

        let pointer = just(ParseToken::Star)
            .ignore_then(ty.clone())
            .map(|elem| TypeExpr::Pointer(Box::new(elem)));

        let slice = just(ParseToken::LBracket)
            .then(just(ParseToken::RBracket))
            .ignore_then(ty.clone())
            .map(|elem| TypeExpr::Slice(Box::new(elem)));

        let array = length
            .delimited_by(just(ParseToken::LBracket), just(ParseToken::RBracket))
            .then(ty.clone())
            .map(|(len, elem)| TypeExpr::Array(len, Box::new(elem)));

        let map = keyword("map")
            .ignore_then(
                ty.clone()
                    .delimited_by(just(ParseToken::LBracket), just(ParseToken::RBracket)),
            )
            .then(ty.clone())
            .map(|(key, value)| TypeExpr::Map(Box::new(key), Box::new(value)));

        let field = ident_parser()
            .then(ty.clone())
            .map(|(name, ty)| FieldExpr { name, ty });
        let structure = keyword("struct")
            .ignore_then(
                field
                    .separated_by(just(ParseToken::Semi))
                    .allow_trailing()
                    .collect::<Vec<_>>()
                    .delimited_by(just(ParseToken::LBrace), just(ParseToken::RBrace)),
            )
            .map(TypeExpr::Struct);

        let func = keyword("func")
            .ignore_then(signature_parser(ty.clone()))
            .map(TypeExpr::Func);

        choice((
            pointer,
            slice,
            array,
            map,
            structure,
            func,
            qual_name_parser().map(TypeExpr::Name),
        ))
    })
}

fn signature_parser<'src, T>(
    ty: T,
) -> impl Parser<'src, &'src [ParseToken], SigExpr, PExtra<'src>> + Clone
where
    T: Parser<'src, &'src [ParseToken], TypeExpr, PExtra<'src>> + Clone,
{
    let param = just(ParseToken::Ellipsis)
        .or_not()
        .then(ty.clone())
        .map(|(dots, ty)| (dots.is_some(), ty));
    let params = param
        .separated_by(just(ParseToken::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(ParseToken::LParen), just(ParseToken::RParen));

    let result_list = ty
        .clone()
        .separated_by(just(ParseToken::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(ParseToken::LParen), just(ParseToken::RParen));
    let results = choice((result_list, ty.map(|single| vec![single])))
        .or_not()
        .map(Option::unwrap_or_default);

    params
        .then(results)
        .try_map(|(params, results): (Vec<(bool, TypeExpr)>, Vec<TypeExpr>), span| {
            let count = params.len();
            let mut variadic = false;
            let mut out = Vec::with_capacity(count);
            for (idx, (dots, ty)) in params.into_iter().enumerate() {
                if !dots {
                    out.push(ty);
                    continue;
                }
                if idx + 1 != count {
                    return Err(Rich::custom(span, "can only use ... with final parameter"));
                }
                variadic = true;
                out.push(TypeExpr::Slice(Box::new(ty)));
            }
            Ok(SigExpr {
                params: out,
                results,
                variadic,
            })
        })
}

fn literal_parser<'src>() -> impl Parser<'src, &'src [ParseToken], ConstValue, PExtra<'src>> + Clone {
    let value = select_ref! {
        ParseToken::Int(raw) => parse_int(raw).map(ConstValue::Int),
        ParseToken::Float(raw) => parse_float(raw).map(ConstValue::Float),
        ParseToken::Imag(raw) => parse_float(raw.trim_end_matches('i'))
            .map(|im| ConstValue::Complex { re: 0.0, im }),
        ParseToken::String(value) => Ok(ConstValue::String(value.clone())),
        ParseToken::Ident(word) if word == "true" => Ok(ConstValue::Bool(true)),
        ParseToken::Ident(word) if word == "false" => Ok(ConstValue::Bool(false)),
    }
    .try_map(|value: Result<ConstValue, String>, span| {
        value.map_err(|message| Rich::custom(span, message))
    });

    just(ParseToken::Minus)
        .or_not()
        .then(value)
        .try_map(|(minus, value), span| match minus {
            Some(_) => value
                .negate()
                .ok_or_else(|| Rich::custom(span, "only numeric constants can be negated")),
            None => Ok(value),
        })
}

fn parse_int(raw: &str) -> Result<i128, String> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16)
            .map_err(|_| format!("invalid hexadecimal literal `{raw}`"));
    }

    raw.parse::<i128>()
        .map_err(|_| format!("invalid integer literal `{raw}`"))
}

fn parse_float(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("invalid floating-point literal `{raw}`"))
}

fn to_spanned<T>(node: Node<T>, file: FileId, line_tokens: &[LineToken]) -> Spanned<T> {
    Spanned {
        file,
        span: byte_span(node.span, line_tokens),
        value: node.value,
    }
}

fn byte_span(span: SimpleSpan<usize>, line_tokens: &[LineToken]) -> Span {
    if line_tokens.is_empty() {
        return 0..0;
    }

    let len = line_tokens.len();
    let start = span.start.min(len);
    let end = span.end.min(len);

    if start < end {
        return line_tokens[start].span.start..line_tokens[end - 1].span.end;
    }

    if start < len {
        return line_tokens[start].span.clone();
    }

    let eof = line_tokens[len - 1].span.end;
    eof..eof
}

fn unquote(input: &str) -> Result<String, String> {
    if input.len() < 2 || !input.starts_with('"') || !input.ends_with('"') {
        return Err("invalid string literal".to_string());
    }

    let mut out = String::new();
    let mut chars = input[1..input.len() - 1].chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        let escaped = chars
            .next()
            .ok_or_else(|| "unterminated escape".to_string())?;
        match escaped {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            other => {
                return Err(format!("unsupported escape `\\{other}`"));
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::{
        constant::ConstValue,
        diag::Diag,
        ir::{DeclKind, Manifest, QualName, SigExpr, TypeExpr},
        lex::lex_file,
        source::SourceManager,
    };

    use super::parse_tokens;

    fn parse(text: &str) -> (Manifest, Vec<Diag>) {
        let mut manager = SourceManager::new(Vec::new());
        let file = manager.add_virtual_file("test.pkg", text);
        let (tokens, lex_diags) = lex_file(&manager, file);
        assert!(lex_diags.is_empty());
        parse_tokens(&tokens)
    }

    fn named(name: &str) -> TypeExpr {
        TypeExpr::Name(QualName::local(name))
    }

    #[test]
    fn parses_clauses_and_declarations() {
        let (manifest, diags) = parse(
            "package lib \"example.com/lib\"\n\
             import io \"example.com/io\"\n\
             \n\
             type File struct { fd int; name string }\n\
             type Handle = *File\n\
             func Open(string, ...int) (*File, error)\n\
             func (*File) Close() error\n\
             var Stdout io.Writer\n\
             const MaxFiles int = -0x10\n",
        );
        assert!(diags.is_empty(), "{diags:?}");

        let package = manifest.package.expect("package clause");
        assert_eq!(package.name.value, "lib");
        assert_eq!(package.path.value, "example.com/lib");
        assert_eq!(manifest.imports.len(), 1);
        assert_eq!(
            manifest.imports[0].alias.as_ref().map(|a| a.value.as_str()),
            Some("io")
        );
        assert_eq!(manifest.decls.len(), 6);

        let DeclKind::Func(sig) = &manifest.decls[2].kind else {
            panic!("expected func");
        };
        assert_eq!(
            sig,
            &SigExpr {
                params: vec![named("string"), TypeExpr::Slice(Box::new(named("int")))],
                results: vec![TypeExpr::Pointer(Box::new(named("File"))), named("error")],
                variadic: true,
            }
        );

        let DeclKind::Method { recv, .. } = &manifest.decls[3].kind else {
            panic!("expected method");
        };
        assert_eq!(recv, &TypeExpr::Pointer(Box::new(named("File"))));
        assert_eq!(manifest.decls[3].name.value, QualName::local("Close"));

        let DeclKind::Var(ty) = &manifest.decls[4].kind else {
            panic!("expected var");
        };
        assert_eq!(
            ty,
            &TypeExpr::Name(QualName {
                qualifier: Some("io".to_string()),
                name: "Writer".to_string(),
            })
        );
        let DeclKind::Const { value, .. } = &manifest.decls[5].kind else {
            panic!("expected const");
        };
        assert_eq!(value, &ConstValue::Int(-16));
    }

    #[test]
    fn qualified_declaration_names_are_kept() {
        let (manifest, diags) = parse("type other.T map[string][4]*other.T\n");
        assert!(diags.is_empty(), "{diags:?}");
        let decl = &manifest.decls[0];
        assert_eq!(decl.name.value.qualifier.as_deref(), Some("other"));
        assert!(matches!(decl.kind, DeclKind::Type(TypeExpr::Map(_, _))));
    }

    #[test]
    fn rejects_misplaced_variadic_and_bad_negation() {
        let (manifest, diags) = parse("func F(...int, string)\n");
        assert!(!diags.is_empty());
        assert!(manifest.decls.is_empty());

        let (manifest, diags) = parse("const S string = -\"x\"\n");
        assert!(!diags.is_empty());
        assert!(manifest.decls.is_empty());
    }

    #[test]
    fn reports_duplicate_package_clause() {
        let (manifest, diags) = parse("package a \"a\"\npackage b \"b\"\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "duplicate package clause");
        assert_eq!(manifest.package.map(|p| p.name.value), Some("a".to_string()));
    }

    #[test]
    fn unknown_line_is_a_parse_error() {
        let (manifest, diags) = parse("package a \"a\"\nlet x = 1\nvar Y int\n");
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|diag| diag.message == "parse error"));
        assert_eq!(manifest.decls.len(), 1);
    }
}

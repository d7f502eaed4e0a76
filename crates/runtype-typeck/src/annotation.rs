//! Translating textual type annotations into type expressions.
//!
//! `Canonicalize` is the contract the core expects from an annotation
//! front end: deterministic, memoised, and failing with
//! `UnsupportedAnnotation` outside its supported subset.
//! `AnnotationCanonicalizer` implements it for a small typing-style syntax:
//!
//! ```text
//! int  str  float  bool  bytes  object  None  Any
//! List[int]  Set[str]  Dict[str, int]  Sequence[T]  Mapping[K, V]  Iterable[T]
//! Tuple[int, str]  Tuple[int, ...]  Tuple[()]
//! Union[int, str]  int | str  Optional[int]  Literal[1, "a", None]
//! ```
//!
//! plus any kind registered by name.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use runtype_common::{Kind, Value};

use crate::error::UnsupportedAnnotation;
use crate::expr::TypeExpr;

/// Anything that can turn an annotation into a `TypeExpr`.
pub trait Canonicalize {
    fn canonicalize(&self, annotation: &str) -> Result<TypeExpr, UnsupportedAnnotation>;
}

/// Memoising canonicalizer for textual annotations.
///
/// The same annotation text always yields the same (pointer-identical)
/// expression until a new kind is registered.
#[derive(Default)]
pub struct AnnotationCanonicalizer {
    kinds: RwLock<FxHashMap<String, Kind>>,
    memo: RwLock<FxHashMap<String, TypeExpr>>,
}

impl AnnotationCanonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `kind` available under its own name. Clears memoised results.
    pub fn register_kind(&self, kind: Kind) {
        let mut kinds = self.kinds.write();
        kinds.insert(kind.name().to_string(), kind);
        self.memo.write().clear();
    }

    /// Number of memoised annotations.
    pub fn memoized(&self) -> usize {
        self.memo.read().len()
    }
}

impl Canonicalize for AnnotationCanonicalizer {
    fn canonicalize(&self, annotation: &str) -> Result<TypeExpr, UnsupportedAnnotation> {
        let key = annotation.trim();
        if let Some(expr) = self.memo.read().get(key) {
            return Ok(expr.clone());
        }
        trace!(annotation = key, "canonicalizer miss");
        // Held until the insert so a concurrent `register_kind` cannot be
        // followed by a stale entry.
        let kinds = self.kinds.read();
        let expr = Parser::new(key, &kinds)?.parse_annotation()?;
        // A racing thread may have inserted first; keep its result.
        let mut memo = self.memo.write();
        Ok(memo.entry(key.to_string()).or_insert(expr).clone())
    }
}

// ── Lexer ──────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Pipe,
    Ellipsis,
}

fn tokenize(src: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '[' | ']' | '(' | ')' | ',' | '|' => {
                chars.next();
                tokens.push(match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    _ => Token::Pipe,
                });
            }
            '.' => {
                if src[start..].starts_with("...") {
                    chars.nth(2);
                    tokens.push(Token::Ellipsis);
                } else {
                    return Err(format!("unexpected `.` at offset {}", start));
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == c => break,
                        Some((_, ch)) => text.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut end = start + c.len_utf8();
                chars.next();
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let text = &src[start..end];
                let token = if text.contains('.') {
                    text.parse().map(Token::Float).map_err(|_| text.to_string())
                } else {
                    text.parse().map(Token::Int).map_err(|_| text.to_string())
                };
                tokens.push(token.map_err(|t| format!("invalid number `{}`", t))?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                        end = i + ch.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(src[start..end].to_string()));
            }
            other => return Err(format!("unexpected character `{}`", other)),
        }
    }
    Ok(tokens)
}

// ── Parser ─────────────────────────────────────────────────────────────

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    kinds: &'a FxHashMap<String, Kind>,
}

impl<'a> Parser<'a> {
    fn new(
        source: &'a str,
        kinds: &'a FxHashMap<String, Kind>,
    ) -> Result<Self, UnsupportedAnnotation> {
        let tokens = tokenize(source).map_err(|reason| UnsupportedAnnotation {
            annotation: source.to_string(),
            reason,
        })?;
        Ok(Parser {
            source,
            tokens,
            pos: 0,
            kinds,
        })
    }

    fn error(&self, reason: impl Into<String>) -> UnsupportedAnnotation {
        UnsupportedAnnotation {
            annotation: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), UnsupportedAnnotation> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?}, found {:?}", token, self.peek())))
        }
    }

    fn parse_annotation(&mut self) -> Result<TypeExpr, UnsupportedAnnotation> {
        let expr = self.parse_union()?;
        match self.peek() {
            None => Ok(expr),
            Some(t) => Err(self.error(format!("unexpected trailing {:?}", t))),
        }
    }

    /// `term ('|' term)*`
    fn parse_union(&mut self) -> Result<TypeExpr, UnsupportedAnnotation> {
        let mut alts = vec![self.parse_term()?];
        while self.eat(&Token::Pipe) {
            alts.push(self.parse_term()?);
        }
        Ok(if alts.len() == 1 {
            alts.remove(0)
        } else {
            TypeExpr::sum(alts)
        })
    }

    fn parse_term(&mut self) -> Result<TypeExpr, UnsupportedAnnotation> {
        let name = match self.bump() {
            Some(Token::Ident(name)) => name,
            other => return Err(self.error(format!("expected a type name, found {:?}", other))),
        };
        let name = name.strip_prefix("typing.").unwrap_or(&name).to_string();
        if !self.eat(&Token::LBracket) {
            return self.bare(&name);
        }
        let expr = match name.as_str() {
            "Literal" => TypeExpr::literal(self.literal_args()?),
            "Tuple" | "tuple" => self.tuple_args()?,
            _ => {
                let args = self.type_args()?;
                self.apply(&name, args)?
            }
        };
        self.expect(Token::RBracket)?;
        Ok(expr)
    }

    fn bare(&self, name: &str) -> Result<TypeExpr, UnsupportedAnnotation> {
        let expr = match name {
            "Any" => TypeExpr::any(),
            "None" | "NoneType" => TypeExpr::null(),
            "int" => TypeExpr::int(),
            "float" => TypeExpr::float(),
            "str" => TypeExpr::str(),
            "bool" => TypeExpr::bool(),
            "bytes" => TypeExpr::bytes(),
            "object" => TypeExpr::object(),
            "list" | "List" => TypeExpr::data(Kind::list()),
            "tuple" | "Tuple" => TypeExpr::data(Kind::tuple()),
            "set" | "Set" | "frozenset" | "FrozenSet" => TypeExpr::data(Kind::set()),
            "dict" | "Dict" => TypeExpr::data(Kind::dict()),
            "Sequence" => TypeExpr::data(Kind::sequence()),
            "Mapping" => TypeExpr::data(Kind::mapping()),
            "Iterable" => TypeExpr::data(Kind::iterable()),
            "Callable" => TypeExpr::data(Kind::callable()),
            other => match self.kinds.get(other) {
                Some(kind) => TypeExpr::data(kind.clone()),
                None => return Err(self.error(format!("unknown type `{}`", other))),
            },
        };
        Ok(expr)
    }

    fn arity(&self, name: &str, args: &[TypeExpr], n: usize) -> Result<(), UnsupportedAnnotation> {
        if args.len() == n {
            Ok(())
        } else {
            Err(self.error(format!(
                "`{}` takes {} parameter(s), found {}",
                name,
                n,
                args.len()
            )))
        }
    }

    fn apply(&self, name: &str, mut args: Vec<TypeExpr>) -> Result<TypeExpr, UnsupportedAnnotation> {
        let expr = match name {
            "Union" => TypeExpr::sum(args),
            "Optional" => {
                self.arity(name, &args, 1)?;
                TypeExpr::optional(args.remove(0))
            }
            "List" | "list" => {
                self.arity(name, &args, 1)?;
                TypeExpr::list(args.remove(0))
            }
            "Set" | "set" | "FrozenSet" | "frozenset" => {
                self.arity(name, &args, 1)?;
                TypeExpr::set(args.remove(0))
            }
            "Sequence" => {
                self.arity(name, &args, 1)?;
                TypeExpr::sequence(args.remove(0))
            }
            "Iterable" => {
                self.arity(name, &args, 1)?;
                TypeExpr::generic(Kind::iterable(), args)
            }
            "Dict" | "dict" => {
                self.arity(name, &args, 2)?;
                let value = args.remove(1);
                TypeExpr::dict(args.remove(0), value)
            }
            "Mapping" => {
                self.arity(name, &args, 2)?;
                let value = args.remove(1);
                TypeExpr::mapping(args.remove(0), value)
            }
            other => match self.kinds.get(other) {
                Some(kind) => TypeExpr::generic(kind.clone(), args),
                None => {
                    return Err(self.error(format!("`{}` cannot be parameterized", other)))
                }
            },
        };
        Ok(expr)
    }

    fn type_args(&mut self) -> Result<Vec<TypeExpr>, UnsupportedAnnotation> {
        let mut args = vec![self.parse_union()?];
        while self.eat(&Token::Comma) {
            args.push(self.parse_union()?);
        }
        Ok(args)
    }

    /// `Tuple[()]`, `Tuple[T, ...]` or `Tuple[T1, T2, ...]` (closed).
    fn tuple_args(&mut self) -> Result<TypeExpr, UnsupportedAnnotation> {
        if self.eat(&Token::LParen) {
            self.expect(Token::RParen)?;
            return Ok(TypeExpr::product([]));
        }
        let mut parts = vec![self.parse_union()?];
        while self.eat(&Token::Comma) {
            if self.eat(&Token::Ellipsis) {
                if parts.len() != 1 {
                    return Err(self.error("`...` is only allowed as `Tuple[T, ...]`"));
                }
                return Ok(TypeExpr::open_product([], parts.remove(0)));
            }
            parts.push(self.parse_union()?);
        }
        Ok(TypeExpr::product(parts))
    }

    fn literal_args(&mut self) -> Result<Vec<Value>, UnsupportedAnnotation> {
        let mut values = vec![self.literal()?];
        while self.eat(&Token::Comma) {
            values.push(self.literal()?);
        }
        Ok(values)
    }

    fn literal(&mut self) -> Result<Value, UnsupportedAnnotation> {
        match self.bump() {
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Float(x)) => Ok(Value::Float(x)),
            Some(Token::Str(s)) => Ok(Value::Str(s)),
            Some(Token::Ident(id)) if id == "True" => Ok(Value::Bool(true)),
            Some(Token::Ident(id)) if id == "False" => Ok(Value::Bool(false)),
            Some(Token::Ident(id)) if id == "None" => Ok(Value::Null),
            other => Err(self.error(format!("unsupported literal {:?}", other))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    fn canon(src: &str) -> TypeExpr {
        AnnotationCanonicalizer::new().canonicalize(src).unwrap()
    }

    #[test]
    fn builtin_annotations() {
        assert_eq!(canon("int"), TypeExpr::int());
        assert_eq!(canon("List[int]"), TypeExpr::list(TypeExpr::int()));
        assert_eq!(
            canon("Dict[str, List[int]]"),
            TypeExpr::dict(TypeExpr::str(), TypeExpr::list(TypeExpr::int()))
        );
        assert_eq!(
            canon("Tuple[int, ...]"),
            TypeExpr::open_product([], TypeExpr::int())
        );
        assert_eq!(canon("Tuple[()]"), TypeExpr::product([]));
        assert_eq!(canon("typing.Any"), TypeExpr::any());
    }

    #[test]
    fn union_spellings_agree() {
        assert_eq!(canon("Union[int, str]"), canon("int | str"));
        assert_eq!(canon("Optional[int]"), canon("int | None"));
    }

    #[test]
    fn literals() {
        let lit = canon("Literal[1, 'a', None]");
        assert!(validate(&lit, &Value::Int(1)));
        assert!(validate(&lit, &Value::Null));
        assert!(!validate(&lit, &Value::Int(2)));
    }

    #[test]
    fn memoised_per_annotation() {
        let c = AnnotationCanonicalizer::new();
        let a = c.canonicalize("List[int]").unwrap();
        let b = c.canonicalize("  List[int] ").unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(c.memoized(), 1);
    }

    #[test]
    fn registered_kinds() {
        let c = AnnotationCanonicalizer::new();
        assert!(c.canonicalize("User").is_err());
        let user = Kind::new("User", vec![]);
        c.register_kind(user.clone());
        assert_eq!(c.canonicalize("User").unwrap(), TypeExpr::data(user));
    }

    #[test]
    fn unsupported_annotations() {
        let c = AnnotationCanonicalizer::new();
        let err = c.canonicalize("Callable[[int], str]").unwrap_err();
        assert_eq!(err.annotation, "Callable[[int], str]");
        assert!(c.canonicalize("Dict[int]").is_err());
        assert!(c.canonicalize("List[int").is_err());
        assert_eq!(c.memoized(), 0);
    }
}

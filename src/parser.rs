use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
};

use crate::ast::{Atom, Expr, Type, TypeTag, Value};
use crate::bracket::BracketExpr;
use crate::{GispError, Limits};

/// Convert nom parsing errors to a positioned parse failure
pub(crate) fn to_parse_failure(source: &str, error: nom::Err<Error<&str>>) -> GispError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = source.len().saturating_sub(e.input.len());
            let near: String = e.input.chars().take(10).collect();
            let message = match e.code {
                ErrorKind::TooLarge => "Expression nested too deeply".to_string(),
                ErrorKind::Verify => format!("Unknown type name near '{}'", near),
                ErrorKind::Digit => "Integer literal out of range".to_string(),
                ErrorKind::Many1 => "Empty form".to_string(),
                ErrorKind::Satisfy => format!("Malformed special form near '{}'", near),
                ErrorKind::Char if e.input.is_empty() => "Unexpected end of input".to_string(),
                ErrorKind::Char => format!("Expected character near '{}'", near),
                _ if e.input.is_empty() => "Unexpected end of input".to_string(),
                _ => format!("Invalid syntax near '{}'", near),
            };
            GispError::ParseFailure { position, message }
        }
        nom::Err::Incomplete(_) => GispError::ParseFailure {
            position: source.len(),
            message: "Incomplete input".to_string(),
        },
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || "+-*/<>=!?_".contains(c)
}

fn comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(char(';'), take_while(|c: char| c != '\n')))(input)
}

/// Skip whitespace and `;` line comments
pub fn skip(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

/// Parse a type name after `::`, with an optional trailing `?`
fn type_parser(input: &str) -> IResult<&str, Type> {
    let (rest, keyword) = take_while1(|c: char| c.is_ascii_alphabetic())(input)?;
    let tag = TypeTag::from_keyword(keyword)
        .ok_or_else(|| nom::Err::Error(Error::new(input, ErrorKind::Verify)))?;
    let (rest, option) = opt(char('?'))(rest)?;
    Ok((
        rest,
        Type {
            tag,
            option: option.is_some(),
        },
    ))
}

/// Parse an identifier with an optional `::type` suffix
pub fn atom_parser(input: &str) -> IResult<&str, Atom> {
    let (rest, name) = take_while1(is_name_char)(input)?;
    let (rest, separator) = opt(tag("::"))(rest)?;
    // Once `::` is seen the type is mandatory
    let (rest, ty) = match separator {
        Some(_) => type_parser(rest)?,
        None => (rest, Type::ANY),
    };
    Ok((rest, Atom::new(name, ty)))
}

fn parse_float(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize(tuple((opt(char('-')), digit1, char('.'), digit1)))(input)?;
    match text.parse::<f64>() {
        Ok(x) => Ok((rest, Value::Float(x))),
        Err(_) => Err(nom::Err::Error(Error::new(input, ErrorKind::Float))),
    }
}

fn parse_int(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize(pair(opt(char('-')), digit1))(input)?;
    match text.parse::<i64>() {
        Ok(n) => Ok((rest, Value::Int(n))),
        Err(_) => Err(nom::Err::Failure(Error::new(input, ErrorKind::Digit))),
    }
}

/// Parse a string literal
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('"')(input)?;
    let mut text = String::new();
    let mut remaining = input;

    while let Some(ch) = remaining.chars().next() {
        if ch == '"' {
            return Ok((&remaining[1..], Value::Str(text)));
        } else if ch == '\\' {
            let mut chars = remaining.chars();
            chars.next();
            let Some(escaped) = chars.next() else {
                break;
            };
            text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                c => c,
            });
            remaining = &remaining[1 + escaped.len_utf8()..];
        } else {
            text.push(ch);
            remaining = &remaining[ch.len_utf8()..];
        }
    }

    Err(nom::Err::Failure(Error::new(remaining, ErrorKind::Char)))
}

/// `'name` quotes an atom
fn parse_quote(input: &str) -> IResult<&str, Expr> {
    let (rest, atom) = preceded(char('\''), atom_parser)(input)?;
    Ok((rest, Expr::Literal(Value::Atom(atom))))
}

/// Atoms, plus the `true`, `false` and `nil` keywords
fn parse_name(input: &str) -> IResult<&str, Expr> {
    let (rest, atom) = atom_parser(input)?;
    let expr = match atom.name.as_str() {
        "true" if atom.ty == Type::ANY => Expr::Literal(Value::Bool(true)),
        "false" if atom.ty == Type::ANY => Expr::Literal(Value::Bool(false)),
        "nil" if atom.ty == Type::ANY => Expr::Literal(Value::Nil),
        _ => Expr::Atom(atom),
    };
    Ok((rest, expr))
}

/// The value grammar, carrying the limits it enforces
#[derive(Debug, Clone, Copy, Default)]
pub struct Grammar {
    limits: Limits,
}

impl Grammar {
    pub fn new(limits: Limits) -> Self {
        Grammar { limits }
    }

    /// Parse one value: a primary followed by any number of `[...]` suffixes
    pub fn value<'a>(&self, input: &'a str, depth: usize) -> IResult<&'a str, Expr> {
        if depth > self.limits.max_parse_depth {
            return Err(nom::Err::Failure(Error::new(input, ErrorKind::TooLarge)));
        }
        let (mut rest, mut expr) = self.primary(input, depth)?;
        // Every suffix wraps the expression once more, so it counts as a level
        let mut nested = depth;
        loop {
            match self.bracket_expr(rest, nested) {
                Ok((next, suffix)) => {
                    nested += 1;
                    if nested > self.limits.max_parse_depth {
                        return Err(nom::Err::Failure(Error::new(rest, ErrorKind::TooLarge)));
                    }
                    expr = suffix
                        .task(vec![expr])
                        .map_err(|_| nom::Err::Failure(Error::new(rest, ErrorKind::Verify)))?;
                    rest = next;
                }
                Err(nom::Err::Error(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok((rest, expr))
    }

    fn primary<'a>(&self, input: &'a str, depth: usize) -> IResult<&'a str, Expr> {
        alt((
            |i| self.form(i, depth),
            |i| parse_float(i).map(|(rest, v)| (rest, Expr::Literal(v))),
            |i| parse_int(i).map(|(rest, v)| (rest, Expr::Literal(v))),
            |i| parse_string(i).map(|(rest, v)| (rest, Expr::Literal(v))),
            parse_quote,
            parse_name,
        ))(input)
    }

    /// `(head arg...)`, with `var` and `set` as special forms
    fn form<'a>(&self, input: &'a str, depth: usize) -> IResult<&'a str, Expr> {
        let (rest, mut items) = delimited(
            pair(char('('), skip),
            many0(|i: &'a str| -> IResult<&'a str, Expr> {
                let (i, item) = self.value(i, depth + 1)?;
                let (i, _) = skip(i)?;
                Ok((i, item))
            }),
            char(')'),
        )(input)?;
        if items.is_empty() {
            return Err(nom::Err::Failure(Error::new(input, ErrorKind::Many1)));
        }
        let head = items.remove(0);
        let expr = match (&head, items.len()) {
            (Expr::Atom(atom), 2) if atom.name == "var" => {
                let value = items.pop();
                match (items.pop(), value) {
                    (Some(Expr::Atom(atom)), Some(value)) => Expr::Define {
                        atom,
                        value: Box::new(value),
                    },
                    _ => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Satisfy))),
                }
            }
            (Expr::Atom(atom), 2) if atom.name == "set" => {
                let value = items.pop();
                match (items.pop(), value) {
                    (Some(target @ (Expr::Atom(_) | Expr::Bracket(_))), Some(value)) => {
                        Expr::Assign {
                            target: Box::new(target),
                            value: Box::new(value),
                        }
                    }
                    _ => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Satisfy))),
                }
            }
            _ => Expr::Call {
                head: Box::new(head),
                args: items,
            },
        };
        Ok((rest, expr))
    }

    /// `[e0]`, `[e0:e1]` or `[e0:e1:e2]`
    pub fn bracket<'a>(&self, input: &'a str, depth: usize) -> IResult<&'a str, Vec<Expr>> {
        delimited(
            char('['),
            separated_list1(
                char(':'),
                delimited(skip, |i| self.value(i, depth + 1), skip),
            ),
            char(']'),
        )(input)
    }

    pub fn bracket_expr<'a>(&self, input: &'a str, depth: usize) -> IResult<&'a str, BracketExpr> {
        let (rest, exprs) = self.bracket(input, depth)?;
        Ok((rest, BracketExpr::new(exprs)))
    }

    /// Split a whole program into its top-level forms
    pub fn program(&self, source: &str) -> Result<Vec<Expr>, GispError> {
        let mut forms = Vec::new();
        let mut rest = source;
        loop {
            let (next, _) = skip(rest).map_err(|e| to_parse_failure(source, e))?;
            if next.is_empty() {
                return Ok(forms);
            }
            let (next, form) = self
                .value(next, 0)
                .map_err(|e| to_parse_failure(source, e))?;
            forms.push(form);
            rest = next;
        }
    }
}

/// Parse one value with the default limits
pub fn value_parser(input: &str) -> IResult<&str, Expr> {
    Grammar::default().value(input, 0)
}

/// Parse a bracket suffix with the default limits
pub fn bracket_parser(input: &str) -> IResult<&str, Vec<Expr>> {
    Grammar::default().bracket(input, 0)
}

pub fn bracket_expr_parser(input: &str) -> IResult<&str, BracketExpr> {
    Grammar::default().bracket_expr(input, 0)
}

/// Parse a single complete expression from input
pub fn parse(input: &str) -> Result<Expr, GispError> {
    let grammar = Grammar::default();
    let (rest, _) = skip(input).map_err(|e| to_parse_failure(input, e))?;
    let (rest, expr) = grammar
        .value(rest, 0)
        .map_err(|e| to_parse_failure(input, e))?;
    match skip(rest) {
        Ok(("", _)) => Ok(expr),
        Ok((remaining, _)) => Err(GispError::ParseFailure {
            position: input.len() - remaining.len(),
            message: format!("Unexpected remaining input: '{}'", remaining),
        }),
        Err(e) => Err(to_parse_failure(input, e)),
    }
}

/// Parse every top-level form of a program with the default limits
pub fn parse_program(input: &str) -> Result<Vec<Expr>, GispError> {
    Grammar::default().program(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bracket::Bracket;
    use pretty_assertions::assert_eq;

    fn int(n: i64) -> Expr {
        Expr::Literal(Value::Int(n))
    }

    #[test]
    fn test_atom_without_suffix() {
        for name in ["x", "foo", "a-b", "+", "list?", "x1"] {
            let (rest, atom) = atom_parser(name).unwrap();
            assert_eq!(rest, "");
            assert_eq!(atom, Atom::new(name, Type::ANY));
        }
    }

    #[test]
    fn test_atom_with_type_suffix() {
        assert_eq!(
            atom_parser("x::atom").unwrap().1,
            Atom::new("x", Type::new(TypeTag::Atom))
        );
        assert_eq!(atom_parser("x::any").unwrap().1, Atom::new("x", Type::ANY));
        assert_eq!(
            atom_parser("x::int").unwrap().1,
            Atom::new("x", Type::new(TypeTag::Int))
        );
        assert_eq!(
            atom_parser("x::string?").unwrap().1,
            Atom::new("x", Type::optional(TypeTag::Str))
        );
    }

    #[test]
    fn test_atom_unknown_type_fails() {
        assert!(atom_parser("x::integer").is_err());
        assert!(matches!(
            parse("x::wat"),
            Err(GispError::ParseFailure { position: 3, .. })
        ));
    }

    #[test]
    fn test_unknown_type_is_recoverable() {
        match atom_parser("x::wat") {
            Err(nom::Err::Error(e)) => {
                assert_eq!(e.input, "wat");
                assert_eq!(e.code, ErrorKind::Verify);
            }
            other => panic!("expected a recoverable error, got {:?}", other),
        }
        let err = parse("(f x::wat)").unwrap_err();
        assert!(matches!(err, GispError::ParseFailure { .. }));
    }

    #[test]
    fn test_atom_failure_does_not_consume() {
        let input = "(x)";
        match atom_parser(input) {
            Err(nom::Err::Error(e)) => assert_eq!(e.input, input),
            other => panic!("expected a recoverable error, got {:?}", other),
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("42").unwrap(), int(42));
        assert_eq!(parse("-7").unwrap(), int(-7));
        assert_eq!(parse("1.5").unwrap(), Expr::Literal(Value::Float(1.5)));
        assert_eq!(parse("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse("nil").unwrap(), Expr::Literal(Value::Nil));
        assert_eq!(
            parse("\"a\\tb\\\"c\"").unwrap(),
            Expr::Literal(Value::from("a\tb\"c"))
        );
        assert_eq!(
            parse("'foo").unwrap(),
            Expr::Literal(Value::Atom(Atom::any("foo")))
        );
        assert!(parse("\"unterminated").is_err());
        assert!(parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_bracket_parser() {
        assert_eq!(bracket_parser("[1]").unwrap().1, vec![int(1)]);
        assert_eq!(bracket_parser("[0:2]").unwrap().1, vec![int(0), int(2)]);
        assert_eq!(
            bracket_parser("[ 0 : -1 : 2 ]").unwrap().1,
            vec![int(0), int(-1), int(2)]
        );
        assert!(bracket_parser("[]").is_err());
        assert!(bracket_parser("[1").is_err());
        assert_eq!(
            bracket_expr_parser("[k]").unwrap().1,
            BracketExpr::new(vec![Expr::Atom(Atom::any("k"))])
        );
    }

    #[test]
    fn test_bracket_suffixes() {
        let xs = Expr::Atom(Atom::any("xs"));
        assert_eq!(
            parse("xs[1]").unwrap(),
            Expr::Bracket(Bracket::new(xs.clone(), vec![int(1)]))
        );
        assert_eq!(
            parse("xs[0][1:2]").unwrap(),
            Expr::Bracket(Bracket::new(
                Expr::Bracket(Bracket::new(xs, vec![int(0)])),
                vec![int(1), int(2)]
            ))
        );
    }

    #[test]
    fn test_forms() {
        assert_eq!(
            parse("(f 1 (g))").unwrap(),
            Expr::Call {
                head: Box::new(Expr::Atom(Atom::any("f"))),
                args: vec![
                    int(1),
                    Expr::Call {
                        head: Box::new(Expr::Atom(Atom::any("g"))),
                        args: vec![],
                    }
                ],
            }
        );
        assert_eq!(
            parse("(var x::int 1)").unwrap(),
            Expr::Define {
                atom: Atom::new("x", Type::new(TypeTag::Int)),
                value: Box::new(int(1)),
            }
        );
        assert!(matches!(
            parse("(set xs[0] 1)").unwrap(),
            Expr::Assign { .. }
        ));
        assert!(parse("(set 1 2)").is_err());
        assert!(parse("()").is_err());
        assert!(parse("(f 1").is_err());
    }

    #[test]
    fn test_program_with_comments() {
        let forms = parse_program("; header\n(var x 1)\n  x ; trailing\n").unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[1], Expr::Atom(Atom::any("x")));
        assert!(parse_program("").unwrap().is_empty());
        assert!(parse("1 2").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let grammar = Grammar::new(Limits { max_parse_depth: 3 });
        assert!(grammar.program("(a (b (c)))").is_ok());
        let err = grammar.program("(a (b (c (d (e)))))").unwrap_err();
        assert!(matches!(err, GispError::ParseFailure { ref message, .. } if message.contains("deeply")));
    }

    #[test]
    fn test_suffix_chain_counts_toward_depth() {
        let grammar = Grammar::new(Limits { max_parse_depth: 3 });
        assert!(grammar.program("xs[0][1][2]").is_ok());
        let err = grammar.program("xs[0][1][2][3]").unwrap_err();
        assert!(matches!(err, GispError::ParseFailure { ref message, .. } if message.contains("deeply")));
        // Indices nested inside a chain share the same budget
        assert!(grammar.program("xs[0][ys[0]]").is_ok());
        assert!(grammar.program("xs[0][1][ys[0]]").is_err());
    }
}

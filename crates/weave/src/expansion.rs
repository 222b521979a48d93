//! Expansion compiler and mutator.
//!
//! The expansion of a macro is the token sequence between the braces after `>>`.
//! It is compiled once, when the macro is declared, into a list of fragments.
//! Each time the macro is applied the fragments are mutated against the capture tree
//!     of the match to produce the output tokens.
//!
//! | syntax                              | output                                           |
//! |-------------------------------------|--------------------------------------------------|
//! | `ident·name`, `···name`             | the tokens captured as `name`                    |
//! | `name··· (delimiter) { body }`      | `body` once per item of the list `name`          |
//! | `name···? { body }`                 | same, but nothing if `name` is missing or empty  |
//! | `··expander(args)`                  | the result of the expander on the expanded args  |
//! | `··cloak(args)`                     | the args as raw source code, lexed again         |
//! | `··unsafe(args)`                    | the args without hygienic renaming               |
//! | `$variable`                         | the variable, renamed with the expansion id      |
//! | anything else                       | that token                                       |
//!
//! Inside a repetition body, names are looked up in the current list item first
//!     and then in the enclosing scopes.

use crate::ast::{Ast, Scope};
use crate::error::{self, OperationKind, SimpleTokenError, UndefinedNameError};
use crate::expander::{self, ExpansionInput};
use crate::hygiene;
use crate::pattern;
use crate::token::stream::TokenStream;
use crate::token::{self, Kind, Token};
use std::collections::{BTreeSet, HashMap};

/// A compiled macro expansion.
#[derive(Debug, Clone)]
pub struct Expansion {
    fragments: Vec<Fragment>,
    constant: bool,
    cloaked: bool,
}

#[derive(Debug, Clone)]
enum Fragment {
    Token(Token),
    Free(Token),
    Capture {
        name: String,
    },
    Repeat {
        name: String,
        token: Token,
        optional: bool,
        delimiter: Vec<Token>,
        body: Vec<Fragment>,
    },
    Call {
        name: Token,
        expander: expander::BuiltIn,
        args: Vec<Fragment>,
    },
    Cloak {
        token: Token,
        args: Vec<Fragment>,
    },
}

struct Compiler<'a> {
    expanders: &'a HashMap<&'static str, expander::BuiltIn>,
    labels: &'a BTreeSet<String>,
    cloaked: bool,
}

impl Expansion {
    /// Compiles the expansion tokens.
    ///
    /// Every capture referenced must be one of the labels.
    /// If `hygiene` is off, free variables are not renamed.
    pub fn compile(
        tokens: &[Token],
        expanders: &HashMap<&'static str, expander::BuiltIn>,
        labels: &BTreeSet<String>,
        hygiene: bool,
    ) -> error::Result<Expansion> {
        let mut compiler = Compiler {
            expanders,
            labels,
            cloaked: false,
        };
        let fragments = compiler.compile(tokens, hygiene)?;
        let constant = fragments.iter().all(|f| matches!(f, Fragment::Token(_)));
        Ok(Expansion {
            fragments,
            constant,
            cloaked: compiler.cloaked,
        })
    }

    /// Returns whether the expansion is the same every time.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Produces the output of the expansion for a match.
    pub fn expand(&self, ast: &Ast, input: &mut ExpansionInput) -> error::Result<TokenStream> {
        if self.constant {
            return Ok(self
                .fragments
                .iter()
                .filter_map(|f| match f {
                    Fragment::Token(t) => Some(t.clone()),
                    _ => None,
                })
                .collect());
        }
        let mut out = TokenStream::new();
        mutate(&self.fragments, &Scope::root(ast), input, &mut out)?;
        if self.cloaked {
            out = input.lex(&out.to_string())?;
        }
        out.reset();
        Ok(out)
    }
}

impl<'a> Compiler<'a> {
    fn compile(&mut self, tokens: &[Token], hygiene: bool) -> error::Result<Vec<Fragment>> {
        let mut fragments = vec![];
        let mut i = 0;
        while i < tokens.len() {
            let t = &tokens[i];
            let next = |k: usize| tokens.get(i + k);
            if pattern::is_identifier(t)
                && next(1).is_some_and(pattern::is_dot)
                && next(2).is_some_and(pattern::is_identifier)
            {
                if Kind::from_name(t.text()).is_none() {
                    return Err(
                        UndefinedNameError::new(t.clone(), "token kind", Kind::names()).into(),
                    );
                }
                fragments.push(self.capture(&tokens[i + 2])?);
                i += 3;
            } else if t.is_operator("···") && next(1).is_some_and(pattern::is_identifier) {
                fragments.push(self.capture(&tokens[i + 1])?);
                i += 2;
            } else if pattern::is_identifier(t) && next(1).is_some_and(|n| n.is_operator("···")) {
                let (fragment, after) = self.repeat(tokens, i, hygiene)?;
                fragments.push(fragment);
                i = after;
            } else if t.is_operator("··") && next(1).is_some_and(pattern::is_identifier) {
                let after = self.call(tokens, i, hygiene, &mut fragments)?;
                i = after;
            } else if hygiene && t.kind() == Kind::Variable {
                fragments.push(Fragment::Free(t.clone()));
                i += 1;
            } else {
                fragments.push(Fragment::Token(t.clone()));
                i += 1;
            }
        }
        Ok(fragments)
    }

    fn check_label(&self, name: &Token) -> error::Result<String> {
        let label = name.text();
        if !self.labels.contains(label) {
            return Err(UndefinedNameError::new(
                name.clone(),
                "capture",
                self.labels.iter().map(String::as_str),
            )
            .into());
        }
        Ok(label.to_string())
    }

    fn capture(&self, name: &Token) -> error::Result<Fragment> {
        Ok(Fragment::Capture {
            name: self.check_label(name)?,
        })
    }

    /// Compiles `name··· [?] [(delimiter)] { body }` starting at the name.
    fn repeat(&mut self, tokens: &[Token], i: usize, hygiene: bool) -> error::Result<(Fragment, usize)> {
        let name = &tokens[i];
        let label = self.check_label(name)?;
        let mut j = pattern::significant(tokens, i + 2);
        let optional = j.is_some_and(|j| tokens[j].is_char('?'));
        if optional {
            j = j.and_then(|j| pattern::significant(tokens, j + 1));
        }
        let mut delimiter = vec![];
        if let Some(open) = j.filter(|&j| tokens[j].is_char('(')) {
            let close = closer(tokens, open)?;
            delimiter = tokens[open + 1..close].to_vec();
            j = pattern::significant(tokens, close + 1);
        }
        let Some(open) = j.filter(|&j| tokens[j].is_char('{')) else {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["expected '{{' with the body of the repetition over `{label}`"],
            )
            .into());
        };
        let close = closer(tokens, open)?;
        let body = self.compile(trimmed(&tokens[open + 1..close]), hygiene)?;
        Ok((
            Fragment::Repeat {
                name: label,
                token: name.clone(),
                optional,
                delimiter,
                body,
            },
            close + 1,
        ))
    }

    /// Compiles `··name(args)` or `··name{args}` starting at the `··`.
    fn call(
        &mut self,
        tokens: &[Token],
        i: usize,
        hygiene: bool,
        fragments: &mut Vec<Fragment>,
    ) -> error::Result<usize> {
        let name = &tokens[i + 1];
        let Some(open) = tokens
            .get(i + 2)
            .filter(|t| t.is_char('(') || t.is_char('{'))
            .map(|_| i + 2)
        else {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["expected '(' or '{{' after the expander `{}`", name.text()],
            )
            .into());
        };
        let close = closer(tokens, open)?;
        let args = &tokens[open + 1..close];
        if args.iter().all(Token::skippable) {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["the expander `{}` needs at least one argument", name.text()],
            )
            .into());
        }
        match name.text() {
            "unsafe" => {
                fragments.extend(self.compile(args, false)?);
            }
            "cloak" => {
                self.cloaked = true;
                let args = self.compile(args, hygiene)?;
                fragments.push(Fragment::Cloak {
                    token: name.clone(),
                    args,
                });
            }
            _ => {
                let Some(expander) = self.expanders.get(name.text()).copied() else {
                    let mut names: Vec<&str> = self.expanders.keys().copied().collect();
                    names.extend(["cloak", "unsafe"]);
                    return Err(UndefinedNameError::new(name.clone(), "expander", names).into());
                };
                let args = self.compile(args, hygiene)?;
                fragments.push(Fragment::Call {
                    name: name.clone(),
                    expander,
                    args,
                });
            }
        }
        Ok(close + 1)
    }
}

fn closer(tokens: &[Token], open: usize) -> error::Result<usize> {
    token::matching_closer(tokens, open).ok_or_else(|| {
        SimpleTokenError::new(tokens[open].clone(), "this delimiter is not closed").into()
    })
}

pub(crate) fn trimmed(tokens: &[Token]) -> &[Token] {
    let start = tokens
        .iter()
        .position(|t| !t.skippable())
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| !t.skippable())
        .map_or(start, |i| i + 1);
    &tokens[start..end]
}

fn mutate(
    fragments: &[Fragment],
    scope: &Scope,
    input: &mut ExpansionInput,
    out: &mut TokenStream,
) -> error::Result<()> {
    for fragment in fragments {
        match fragment {
            Fragment::Token(t) => out.push(t.clone()),
            Fragment::Free(t) => out.push(hygiene::rename(t, input.cycle_id())),
            Fragment::Capture { name } => {
                if let Some(ast) = scope.lookup(name) {
                    for t in ast.tokens() {
                        out.push(t.clone());
                    }
                }
            }
            Fragment::Repeat {
                name,
                token,
                optional,
                delimiter,
                body,
            } => {
                let items: Vec<&Ast> = scope
                    .lookup(name)
                    .filter(|ast| !ast.is_empty())
                    .map(|ast| ast.items().collect())
                    .unwrap_or_default();
                if items.is_empty() {
                    if *optional {
                        continue;
                    }
                    return Err(SimpleTokenError::new(
                        token.clone(),
                        format!["the capture `{name}` is missing or empty"],
                    )
                    .with_note(format![
                        "write `{name}···?` to expand to nothing in this case"
                    ])
                    .into());
                }
                let mut result = TokenStream::new();
                for (k, item) in items.iter().rev().enumerate() {
                    let child = scope.child(item);
                    let mut piece = TokenStream::new();
                    mutate(body, &child, input, &mut piece)?;
                    if k > 0 {
                        for t in delimiter {
                            piece.push(t.clone());
                        }
                    }
                    result.prepend(piece);
                }
                out.append(result);
            }
            Fragment::Call {
                name,
                expander,
                args,
            } => {
                let mut ts = TokenStream::new();
                mutate(args, scope, input, &mut ts)?;
                ts.reset();
                let result = expander
                    .call(ts, input)
                    .map_err(|err| err.propagate(OperationKind::Expander, name.clone()))?;
                out.append(result);
            }
            Fragment::Cloak { token, args } => {
                let mut ts = TokenStream::new();
                mutate(args, scope, input, &mut ts)?;
                ts.trim();
                out.push(Token::new(Kind::Cloaked, ts.to_string()).with_line(token.line()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::lexer;

    fn compile(source: &str, labels: &[&str]) -> error::Result<Expansion> {
        let tokens = lexer::tokenize(source).unwrap();
        let labels: BTreeSet<String> = labels.iter().map(|l| l.to_string()).collect();
        let expanders = HashMap::from([(
            "stringify",
            expander::BuiltIn::new(|ts, _| Ok(ts), "identity"),
        )]);
        Expansion::compile(&tokens, &expanders, &labels, true)
    }

    #[test]
    fn constant_expansion() {
        let expansion = compile("a + b;", &[]).unwrap();
        assert!(expansion.is_constant());
    }

    #[test]
    fn variables_make_the_expansion_dynamic() {
        assert!(!compile("$a = 1;", &[]).unwrap().is_constant());
        assert!(compile("··unsafe($a) = 1;", &[]).unwrap().is_constant());
    }

    #[test]
    fn captures_make_the_expansion_dynamic() {
        assert!(!compile("f(ident·a)", &["a"]).unwrap().is_constant());
        assert!(!compile("f(···a)", &["a"]).unwrap().is_constant());
    }

    #[test]
    fn repetition_syntax() {
        let expansion = compile("xs···? (, ) { ident·x }", &["xs", "x"]).unwrap();
        match expansion.fragments.as_slice() {
            [Fragment::Repeat {
                name,
                optional,
                delimiter,
                body,
                ..
            }] => {
                assert_eq!(name, "xs");
                assert!(*optional);
                let delimiter: String = delimiter.iter().map(|t| t.text()).collect();
                assert_eq!(delimiter, ", ");
                assert_eq!(body.len(), 1);
            }
            fragments => panic!("unexpected fragments {fragments:?}"),
        }
    }

    #[test]
    fn cloak_marks_the_expansion() {
        let expansion = compile("··cloak(a b)", &[]).unwrap();
        assert!(expansion.cloaked);
    }

    macro_rules! compile_failure_tests {
        ( $( ($name: ident, $source: expr, $labels: expr, $title: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    let err = compile($source, $labels).unwrap_err();
                    assert_eq!(err.title(), $title);
                }
            )+
        };
    }

    compile_failure_tests![
        (unbound_capture, "ident·b", &["a"], "undefined capture `b`"),
        (unbound_layer_capture, "···b", &["a"], "undefined capture `b`"),
        (unbound_repetition, "bs··· { x }", &["a"], "undefined capture `bs`"),
        (undefined_kind, "idnt·a", &["a"], "undefined token kind `idnt`"),
        (undefined_expander, "··stringfy(a)", &[], "undefined expander `stringfy`"),
        (
            empty_expander_args,
            "··stringify( )",
            &[],
            "the expander `stringify` needs at least one argument"
        ),
        (
            expander_without_args,
            "··stringify a",
            &[],
            "expected '(' or '{' after the expander `stringify`"
        ),
        (
            repetition_without_body,
            "xs··· (,) x",
            &["xs"],
            "expected '{' with the body of the repetition over `xs`"
        ),
        (unclosed_repetition_body, "xs··· { x", &["xs"], "this delimiter is not closed"),
    ];
}

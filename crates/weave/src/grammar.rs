//! Grammar patterns.
//!
//! A macro tagged `·grammar` describes its pattern as a list of rules instead of a
//!     flat sequence:
//!
//! ```text
//! macro ·grammar {
//!     enum ·production = 'enum' ident·name '{' case···',' '}' ;
//!     case = ident·label · '=' value ;
//!     value = integer·number | string·text ;
//! } >> { ... }
//! ```
//!
//! Each rule is `name [·production] [·optional] = alternative | alternative ... ;`.
//! Exactly one rule is the production, and it is the entry point of the pattern.
//! An alternative is a sequence of elements:
//!
//! - `'literal'`: the tokens of the string.
//! - `kind·name`: a token of the kind, captured as `name`.
//! - `·parser(args)·name`: a nested parser call, as in flat patterns.
//! - `rule` or `rule·alias`: a reference to another rule, captured as the rule name or the alias.
//! - `rule···'delimiter'`: a delimited list of the rule, captured as the rule name.
//! - `·`: the dominance marker. The rest of the alternative is committed.
//!
//! Rules are declared before they are compiled, so rules may refer to each other
//!     in any order and recursively.

use crate::error::{self, SimpleFailedPreconditionError, SimpleTokenError, UndefinedNameError};
use crate::parse::{self, registry, Parser, Pointer};
use crate::pattern::{self, Compiler, Pattern};
use crate::token::{self, Kind, Token};
use std::collections::{BTreeSet, HashMap};

struct Rule<'t> {
    name: &'t Token,
    production: bool,
    optional: bool,
    alternatives: Vec<&'t [Token]>,
    pointer: Pointer,
}

/// Compiles the rules into a pattern whose parser is the production rule.
pub fn compile(
    tokens: &[Token],
    parsers: &HashMap<&'static str, registry::BuiltIn>,
) -> error::Result<Pattern> {
    let rules = declare(tokens)?;
    let index: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| (rule.name.text(), i))
        .collect();

    let productions: Vec<&Rule> = rules.iter().filter(|rule| rule.production).collect();
    let entry = match productions.as_slice() {
        [] => {
            return Err(SimpleFailedPreconditionError::new(
                "a grammar must have a rule tagged ·production",
            )
            .into())
        }
        [entry] => index[entry.name.text()],
        [_, second, ..] => {
            return Err(SimpleTokenError::new(
                second.name.clone(),
                "a grammar can only have one rule tagged ·production",
            )
            .into())
        }
    };

    let mut compiler = Compiler::new(parsers);
    let mut definitions: Vec<Parser> = Vec::with_capacity(rules.len());
    let mut references: Vec<BTreeSet<usize>> = Vec::with_capacity(rules.len());
    let mut specificity = 0;
    for (i, rule) in rules.iter().enumerate() {
        let mut alternatives = vec![];
        let mut referenced = BTreeSet::new();
        for alternative in &rule.alternatives {
            compiler.new_scope();
            let (parser, units) =
                compile_alternative(&mut compiler, &rules, &index, alternative, &mut referenced)?;
            if i == entry {
                specificity = specificity.max(units);
            }
            alternatives.push(parser);
        }
        let mut parser = if alternatives.len() == 1 {
            alternatives.remove(0)
        } else {
            parse::either(alternatives).map_err(|err| pattern::build_error(rule.name, err))?
        };
        if rule.optional {
            parser = parse::optional(parser);
        }
        rule.pointer
            .define(&parser)
            .map_err(|err| pattern::build_error(rule.name, err))?;
        definitions.push(parser);
        references.push(referenced);
    }

    let mut reachable = BTreeSet::from([entry]);
    let mut stack = vec![entry];
    while let Some(i) = stack.pop() {
        for &j in &references[i] {
            if reachable.insert(j) {
                stack.push(j);
            }
        }
    }
    if let Some(rule) = (0..rules.len())
        .find(|i| !reachable.contains(i))
        .map(|i| &rules[i])
    {
        return Err(SimpleTokenError::new(
            rule.name.clone(),
            format![
                "the rule `{}` is not reachable from the production rule",
                rule.name.text()
            ],
        )
        .into());
    }

    for (rule, definition) in rules.iter().zip(&definitions) {
        definition
            .validate()
            .map_err(|err| pattern::build_error(rule.name, err))?;
    }

    let parser = definitions[entry].clone();
    if !parser.is_fallible() {
        return Err(SimpleTokenError::new(
            rules[entry].name.clone(),
            format![
                "the production rule `{}` matches any input",
                rules[entry].name.text()
            ],
        )
        .with_note("a macro that always matches would apply everywhere")
        .into());
    }
    let mut labels = compiler.into_labels();
    labels.extend(rules.iter().map(|rule| rule.name.text().to_string()));
    Pattern::new(parser, specificity, labels, definitions, tokens)
}

/// Reads the rule headers and splits the bodies into alternatives.
fn declare(tokens: &[Token]) -> error::Result<Vec<Rule<'_>>> {
    let mut rules: Vec<Rule> = vec![];
    let mut i = 0;
    while let Some(start) = pattern::significant(tokens, i) {
        let name = &tokens[start];
        if !pattern::is_identifier(name) {
            return Err(SimpleTokenError::new(name.clone(), "expected a rule name").into());
        }
        if Kind::from_name(name.text()).is_some() {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["`{}` is a token kind and cannot be a rule name", name.text()],
            )
            .into());
        }
        if rules.iter().any(|rule| rule.name.text() == name.text()) {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["the rule `{}` is defined more than once", name.text()],
            )
            .into());
        }
        let (mut production, mut optional) = (false, false);
        let mut j = start + 1;
        while let Some(k) = pattern::significant(tokens, j).filter(|&k| {
            pattern::is_dot(&tokens[k]) && tokens.get(k + 1).is_some_and(pattern::is_identifier)
        }) {
            let flag = &tokens[k + 1];
            match flag.text() {
                "production" => production = true,
                "optional" => optional = true,
                _ => {
                    return Err(UndefinedNameError::new(
                        flag.clone(),
                        "rule tag",
                        ["production", "optional"],
                    )
                    .into())
                }
            }
            j = k + 2;
        }
        let equals = pattern::significant(tokens, j)
            .filter(|&k| tokens[k].is_char('='))
            .ok_or_else(|| {
                SimpleTokenError::new(
                    name.clone(),
                    format!["expected '=' after the rule name `{}`", name.text()],
                )
            })?;
        let body_start = equals + 1;
        let Some(end) = find_terminator(tokens, body_start) else {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["the rule `{}` is not terminated by ';'", name.text()],
            )
            .into());
        };
        let alternatives = pattern::split(&tokens[body_start..end], |t| t.is_char('|'));
        if alternatives.iter().any(|a| a.iter().all(Token::skippable)) {
            return Err(SimpleTokenError::new(
                name.clone(),
                format!["the rule `{}` has an empty alternative", name.text()],
            )
            .into());
        }
        rules.push(Rule {
            name,
            production,
            optional,
            alternatives,
            pointer: Pointer::new(name.text()),
        });
        i = end + 1;
    }
    Ok(rules)
}

/// Returns the index of the first `;` at or after `from` that is not nested in delimiters.
fn find_terminator(tokens: &[Token], from: usize) -> Option<usize> {
    let mut depth = 0_usize;
    for (i, t) in tokens.iter().enumerate().skip(from) {
        if token::closer_for(t).is_some() {
            depth += 1;
        } else if token::is_closer(t) {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_char(';') {
            return Some(i);
        }
    }
    None
}

fn compile_alternative(
    compiler: &mut Compiler,
    rules: &[Rule],
    index: &HashMap<&str, usize>,
    tokens: &[Token],
    referenced: &mut BTreeSet<usize>,
) -> error::Result<(Parser, usize)> {
    let mut units = vec![];
    let mut marker = None;
    let mut i = 0;
    let lookup = |name: &Token| -> error::Result<usize> {
        index.get(name.text()).copied().ok_or_else(|| {
            UndefinedNameError::new(name.clone(), "grammar rule", index.keys().copied()).into()
        })
    };
    while let Some(j) = pattern::significant(tokens, i) {
        let t = &tokens[j];
        let next = |k: usize| tokens.get(j + k);
        if t.kind() == Kind::String {
            let parser = parse::literal(&token::unquote(t.text()))
                .map_err(|err| pattern::build_error(t, err))?;
            units.push(parser);
            i = j + 1;
        } else if pattern::is_dot(t) {
            if next(1).is_some_and(pattern::is_identifier) {
                let (parser, after) = compiler.call(tokens, j)?;
                units.push(parser);
                i = after;
            } else {
                if marker.is_some() {
                    return Err(SimpleTokenError::new(
                        t.clone(),
                        "an alternative can contain at most one dominance marker",
                    )
                    .into());
                }
                marker = Some((units.len(), t.clone()));
                i = j + 1;
            }
        } else if pattern::is_identifier(t) {
            let aliased = next(1).is_some_and(pattern::is_dot)
                && next(2).is_some_and(pattern::is_identifier);
            if aliased && Kind::from_name(t.text()).is_some() {
                units.push(compiler.kind_capture(t, &tokens[j + 2])?);
                i = j + 3;
            } else if next(1).is_some_and(|n| n.is_operator("···"))
                && next(2).is_some_and(|n| n.kind() == Kind::String)
            {
                let rule = lookup(t)?;
                referenced.insert(rule);
                let delimiter = &tokens[j + 2];
                let delimiter = parse::literal(&token::unquote(delimiter.text()))
                    .map_err(|err| pattern::build_error(delimiter, err))?;
                let list = parse::list(rules[rule].pointer.parser(), delimiter);
                units.push(compiler.capture(list, t)?);
                i = j + 3;
            } else {
                let rule = lookup(t)?;
                referenced.insert(rule);
                let (alias, after) = if aliased {
                    (&tokens[j + 2], j + 3)
                } else {
                    (t, j + 1)
                };
                units.push(compiler.capture(rules[rule].pointer.parser(), alias)?);
                i = after;
            }
        } else {
            return Err(SimpleTokenError::new(
                t.clone(),
                format!["unexpected {} in a grammar rule", t.describe()],
            )
            .with_note("literal tokens in grammar rules are written as strings, like '('")
            .into());
        }
    }
    let n = units.len();
    Ok((pattern::assemble(units, marker)?, n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Ast;
    use crate::token::lexer;
    use crate::token::stream::TokenStream;

    fn compile(source: &str) -> error::Result<Pattern> {
        let tokens = lexer::tokenize(source).unwrap();
        Pattern::compile(&tokens, &registry::built_in_parsers(), true)
    }

    fn parse(pattern: &Pattern, source: &str) -> parse::Result<Ast> {
        let mut ts = TokenStream::from_source(source).unwrap();
        pattern.parser().parse(&mut ts)
    }

    const ENUM: &str = "
        enum ·production = 'enum' ident·name '{' case···',' '}' ;
        case = ident·label · '=' value ;
        value = integer·number | string·text ;
    ";

    #[test]
    fn enum_grammar() {
        let pattern = compile(ENUM).unwrap();
        assert_eq!(pattern.specificity(), 5);
        let ast = parse(&pattern, "enum Color { Red = 1, Green = 'g' }").unwrap();
        assert_eq!(ast.get("name").unwrap().as_token().unwrap().text(), "Color");
        let labels: Vec<&str> = ast
            .get("case")
            .unwrap()
            .items()
            .map(|case| case.get("label").unwrap().as_token().unwrap().text())
            .collect();
        assert_eq!(labels, vec!["Red", "Green"]);
        let values: Vec<String> = ast
            .get("case")
            .unwrap()
            .items()
            .map(|case| {
                case.get("value")
                    .unwrap()
                    .tokens()
                    .iter()
                    .map(|t| t.text())
                    .collect()
            })
            .collect();
        assert_eq!(values, vec!["1", "'g'"]);
    }

    #[test]
    fn commit_inside_rule() {
        let pattern = compile(ENUM).unwrap();
        assert!(matches!(
            parse(&pattern, "enum Color { Red }"),
            Err(parse::Failure::Halt(_))
        ));
    }

    #[test]
    fn recursive_rules() {
        let pattern = compile(
            "
            nested ·production = '(' inner ')' ;
            inner = nested | ident·leaf ;
            ",
        )
        .unwrap();
        assert!(parse(&pattern, "((a))").is_ok());
        assert!(parse(&pattern, "((a)").is_err());
        assert_eq!(pattern.rules().len(), 2);
    }

    #[test]
    fn optional_rule_and_alias() {
        let pattern = compile(
            "
            call ·production = ident·name '(' args·arguments ')' ;
            args ·optional = ident···',' ;
            ",
        );
        // `ident` is a token kind, so it cannot be used as a rule reference.
        assert_eq!(
            pattern.unwrap_err().title(),
            "undefined grammar rule `ident`"
        );

        let pattern = compile(
            "
            call ·production = ident·name '(' args·arguments ')' ;
            args ·optional = arg···',' ;
            arg = ident·value ;
            ",
        )
        .unwrap();
        let ast = parse(&pattern, "f()").unwrap();
        assert!(ast.get("arguments").unwrap().is_empty());
        let ast = parse(&pattern, "f(a, b)").unwrap();
        assert_eq!(ast.get("arguments").unwrap().tokens().len(), 2);
    }

    #[test]
    fn nested_parser_in_rule() {
        let pattern = compile("main ·production = 'print' ·parentheses()·args ;").unwrap();
        let ast = parse(&pattern, "print (a, b)").unwrap();
        assert_eq!(ast.get("args").unwrap().tokens().len(), 6);
    }

    macro_rules! grammar_failure_tests {
        ( $( ($name: ident, $source: expr, $title: expr), )+ ) => {
            $(
                #[test]
                fn $name() {
                    let err = compile($source).unwrap_err();
                    assert_eq!(err.title(), $title);
                }
            )+
        };
    }

    grammar_failure_tests![
        (
            no_production,
            "a = 'x' ;",
            "a grammar must have a rule tagged ·production"
        ),
        (
            two_productions,
            "a ·production = 'x' ; b ·production = 'y' ;",
            "a grammar can only have one rule tagged ·production"
        ),
        (
            duplicate_rule,
            "a ·production = 'x' ; a = 'y' ;",
            "the rule `a` is defined more than once"
        ),
        (
            unknown_rule,
            "a ·production = 'x' b ;",
            "undefined grammar rule `b`"
        ),
        (
            unreachable_rule,
            "a ·production = 'x' ; b = 'y' ;",
            "the rule `b` is not reachable from the production rule"
        ),
        (
            infallible_entry,
            "a ·production ·optional = 'x' ;",
            "the production rule `a` matches any input"
        ),
        (
            kind_as_rule_name,
            "ident ·production = 'x' ;",
            "`ident` is a token kind and cannot be a rule name"
        ),
        (
            unterminated_rule,
            "a ·production = 'x'",
            "the rule `a` is not terminated by ';'"
        ),
        (
            unknown_rule_tag,
            "a ·prodution = 'x' ;",
            "undefined rule tag `prodution`"
        ),
        (
            duplicate_capture_in_alternative,
            "a ·production = ident·x ident·x ;",
            "the capture `x` appears more than once"
        ),
        (
            infallible_entry_through_rule,
            "a ·production = b ; b ·optional = 'x' ;",
            "the production rule `a` matches any input"
        ),
        (
            dead_branch_through_rule,
            "a ·production = 'z' inner ; inner = opt | ident·x ; opt ·optional = 'x' ;",
            "branch 1 of either can never fail, so the branches after it are unreachable"
        ),
        (
            bare_literal,
            "a ·production = ( ident·x ) ;",
            "unexpected '(' in a grammar rule"
        ),
    ];

    #[test]
    fn tags_separated_by_whitespace() {
        let pattern = compile(
            "
            a
                ·production
                = 'x' b ;
            b  ·optional  = 'y' ;
            ",
        )
        .unwrap();
        assert!(parse(&pattern, "x y").is_ok());
        assert!(parse(&pattern, "x").is_ok());
        assert!(parse(&pattern, "y").is_err());
    }

    #[test]
    fn optional_rule_passes_on_expected_tokens() {
        let pattern = compile("a ·production = b 'y' ; b ·optional = 'x' ;").unwrap();
        let expected: Vec<String> = pattern
            .parser()
            .expected()
            .iter()
            .map(|t| t.text().to_string())
            .collect();
        assert_eq!(expected, vec!["x", "y"]);
        assert!(parse(&pattern, "x y").is_ok());
        assert!(parse(&pattern, "y").is_ok());
    }

    #[test]
    fn captures_are_scoped_per_alternative() {
        assert!(compile("a ·production = 'x' ident·v | 'y' integer·v ;").is_ok());
    }
}

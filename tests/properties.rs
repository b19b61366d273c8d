use std::{cell::RefCell, rc::Rc};

use bhilal::{
    ast::{ExpressionKind, Literal, StatementKind},
    parser,
    tokenizer::{self, TokenType},
    tree_walk_interpreter::{format_number, Interpreter},
};
use proptest::prelude::*;

const ALIASES: &[(&str, &str)] = &[
    ("print", "montre"),
    ("let", "soit"),
    ("if", "si"),
    ("else", "sinon"),
    ("while", "tantque"),
    ("do", "faire"),
    ("function", "fonction"),
    ("return", "renvoie"),
    ("class", "classe"),
    ("new", "nouveau"),
    ("inherits", "herite"),
    ("private", "prive"),
    ("try", "essaye"),
    ("catch", "attrape"),
    ("finally", "enfin"),
    ("throw", "lance"),
    ("abstract", "abstrait"),
    ("include", "inclure"),
    ("port_scan", "scan_ports"),
    ("fetch", "requete_http"),
    ("http_request", "requete_http"),
];

/// The literal printed by a single `montre <literal>` program.
fn printed_literal(source: &str) -> Literal {
    let tokens = tokenizer::tokens(source).expect("literal should tokenize");
    let program = parser::program(&tokens).expect("literal should parse");
    let [statement] = program.0.as_slice() else {
        panic!("expected one statement, got {}", program);
    };
    let StatementKind::Print(expressions) = &statement.kind else {
        panic!("expected a print statement, got {}", statement);
    };
    let ExpressionKind::Literal(literal) = &expressions[0].kind else {
        panic!("expected a literal, got {}", expressions[0]);
    };
    literal.clone()
}

fn token_types(source: &str) -> Vec<TokenType> {
    tokenizer::tokens(source)
        .expect("source should tokenize")
        .into_iter()
        .map(|token| token.token_type)
        .collect()
}

fn output_of(source: &str) -> String {
    let output = Rc::new(RefCell::new(Vec::new()));
    let mut interpreter = Interpreter::new(output.clone());
    interpreter
        .run_source(source)
        .expect("program should run");
    String::from_utf8(output.take()).expect("Output should be valid UTF-8")
}

proptest! {
    #[test]
    fn number_literals_round_trip(text in "[0-9]{1,9}(\\.[0-9]{1,6})?") {
        let expected: f64 = text.parse().unwrap();
        prop_assert_eq!(
            printed_literal(&format!("montre {}", text)),
            Literal::Number(expected)
        );
    }

    #[test]
    fn string_literals_round_trip(text in "[^\"]*") {
        prop_assert_eq!(
            printed_literal(&format!("montre \"{}\"", text)),
            Literal::String(text.clone())
        );
    }

    #[test]
    fn aliases_lex_like_their_canonical_word((alias, canonical) in prop::sample::select(ALIASES)) {
        prop_assert_eq!(token_types(alias), token_types(canonical));
        // Once more through the tokenizer: the canonical form is a fixed point.
        prop_assert_eq!(token_types(canonical), token_types(tokenizer::canonical_word(canonical)));
    }

    #[test]
    fn aliased_programs_parse_identically(x in 0u32..1000, y in 0u32..1000) {
        let french = format!(
            "soit x = {x}\nfonction f(n) {{ renvoie n }}\nsi x > {y} {{ montre f(x) }} sinon {{ montre {y} }}"
        );
        let english = format!(
            "let x = {x}\nfunction f(n) {{ return n }}\nif x > {y} {{ print f(x) }} else {{ print {y} }}"
        );
        let parse = |source: &str| {
            let tokens = tokenizer::tokens(source).unwrap();
            parser::program(&tokens).unwrap().to_string()
        };
        prop_assert_eq!(parse(&french), parse(&english));
        prop_assert_eq!(output_of(&french), output_of(&english));
    }

    #[test]
    fn front_end_never_panics(source in "\\PC*") {
        if let Ok(tokens) = tokenizer::tokens(&source) {
            let _ = parser::program(&tokens);
        }
    }

    #[test]
    fn arithmetic_matches_host_numbers(a in -1000i32..1000, b in 1i32..1000) {
        let (a, b) = (f64::from(a), f64::from(b));
        let expected = [a + b, a - b, a * b, a / b]
            .map(format_number)
            .join("\n");
        // There are no negative literals; build them by subtraction.
        let literal = if a < 0.0 { format!("0 - {}", -a) } else { a.to_string() };
        let source = format!(
            "soit a = {literal}\nsoit b = {b}\nmontre a + b\nmontre a - b\nmontre a * b\nmontre a / b"
        );
        prop_assert_eq!(output_of(&source), format!("{expected}\n"));
    }
}

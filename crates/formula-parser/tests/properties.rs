//! Property-based tests for the formula parser.

use formula_parser::{parse, BinaryKind, LiteralValue, Node, ParseOptions};
use proptest::prelude::*;

fn eval_options() -> ParseOptions {
    ParseOptions {
        eval_mode: true,
        ..ParseOptions::default()
    }
}

fn num(n: u32) -> Node {
    Node::Literal {
        value: LiteralValue::Number(f64::from(n)),
    }
}

fn minus(left: Node, right: Node) -> Node {
    Node::Binary {
        kind: BinaryKind::Minus,
        op: "-",
        left: Box::new(left),
        right: Box::new(right),
    }
}

proptest! {
    #[test]
    fn subtraction_folds_left(a in 0u32..1000, b in 0u32..1000, c in 0u32..1000) {
        let ast = parse(&format!("{a}-{b}-{c}"), eval_options()).unwrap();
        prop_assert_eq!(ast, minus(minus(num(a), num(b)), num(c)));
    }

    #[test]
    fn plain_text_is_one_raw_node(text in "[a-zA-Z0-9 .,!?{}\n]{1,40}") {
        let ast = parse(&text, ParseOptions::default()).unwrap();
        prop_assert_eq!(ast, Node::Document { body: vec![Node::Raw { value: text }] });
    }

    #[test]
    fn identifier_script_is_variable(name in "[a-z_][a-zA-Z0-9_]{0,12}") {
        prop_assume!(!["true", "false", "null", "undefined"].contains(&name.to_ascii_lowercase().as_str()));
        let ast = parse(&format!("${{{name}}}"), ParseOptions::default()).unwrap();
        let expected = Node::Document {
            body: vec![Node::Expression {
                body: Box::new(Node::Variable { name }),
            }],
        };
        prop_assert_eq!(ast, expected);
    }

    /// Any identifier names a filter; anything with a space or operator in it does not.
    #[test]
    fn filter_name_is_identifier(name in "[a-z_$][a-z0-9_]{0,8}", junk in "[ +*(']") {
        let ast = parse(&format!("${{x | {name}}}"), ParseOptions::default()).unwrap();
        let Node::Document { body } = ast else {
            return Err(TestCaseError::fail("expected a document"));
        };
        prop_assert_eq!(body[0].type_name(), "expression");

        let broken = format!("${{x | {name}{junk}y}}");
        prop_assert!(parse(&broken, ParseOptions::default()).is_err());
    }

    /// Whatever the input, parsing returns instead of looping or panicking.
    #[test]
    fn arbitrary_input_terminates(source in "[a-z0-9${}`'\"|:()\\[\\] +\\-*,.?]{0,30}") {
        let _ = parse(&source, ParseOptions::default());
        let _ = parse(&source, eval_options());
    }
}

//! The serialized AST is the contract with evaluators; pin its shape.

use formula_parser::{parse, ParseOptions};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_document_json() {
    let ast = parse("Total: ${price * 2 | currency:'USD'}", ParseOptions::default()).unwrap();
    let expected = json!({
        "type": "document",
        "body": [
            { "type": "raw", "value": "Total: " },
            {
                "type": "expression",
                "body": {
                    "type": "filter",
                    "input": {
                        "type": "multiply",
                        "op": "*",
                        "left": { "type": "variable", "name": "price" },
                        "right": { "type": "literal", "value": 2.0 }
                    },
                    "fnName": "currency",
                    "args": [{ "type": "literal", "value": "USD" }]
                }
            }
        ]
    });
    assert_eq!(serde_json::to_value(&ast).unwrap(), expected);
}

#[test]
fn test_expression_json() {
    let options = ParseOptions {
        eval_mode: true,
        ..ParseOptions::default()
    };
    let ast = parse("!user.admin ? `Hi ${name}` : [null, {a: true}]", options).unwrap();
    let expected = json!({
        "type": "conditional",
        "test": {
            "type": "unary",
            "op": "!",
            "value": {
                "type": "get",
                "host": { "type": "variable", "name": "user" },
                "key": "admin"
            }
        },
        "consequent": {
            "type": "template",
            "body": [
                { "type": "template_raw", "value": "Hi " },
                { "type": "variable", "name": "name" }
            ]
        },
        "alternate": {
            "type": "array",
            "members": [
                { "type": "literal", "value": null },
                {
                    "type": "object",
                    "members": [
                        { "key": "a", "value": { "type": "literal", "value": true } }
                    ]
                }
            ]
        }
    });
    assert_eq!(serde_json::to_value(&ast).unwrap(), expected);
}

#[test]
fn test_binary_type_is_operator_family() {
    let options = ParseOptions {
        eval_mode: true,
        ..ParseOptions::default()
    };
    let ast = parse("a - 1 === `x` & b", options).unwrap();
    let expected = json!({
        "type": "binary",
        "op": "&",
        "left": {
            "type": "streq",
            "op": "===",
            "left": {
                "type": "minus",
                "op": "-",
                "left": { "type": "variable", "name": "a" },
                "right": { "type": "literal", "value": 1.0 }
            },
            "right": {
                "type": "template",
                "body": [{ "type": "template_raw", "value": "x" }]
            }
        },
        "right": { "type": "variable", "name": "b" }
    });
    assert_eq!(serde_json::to_value(&ast).unwrap(), expected);
}

#[test]
fn test_every_node_has_one_type_tag() {
    let options = ParseOptions {
        eval_mode: true,
        ..ParseOptions::default()
    };
    let ast = parse("x % 2 == 0 || y <= 3", options).unwrap();
    let value = serde_json::to_value(&ast).unwrap();
    assert_eq!(value["type"], json!(ast.type_name()));
    assert_eq!(value["left"]["type"], json!("eq"));
    assert_eq!(value["left"]["left"]["type"], json!("remainder"));
    assert_eq!(value["right"]["type"], json!("le"));
    assert!(value.get("kind").is_none());
}

#[test]
fn test_options_from_json() {
    let options: ParseOptions = serde_json::from_str(r#"{ "evalMode": true }"#).unwrap();
    assert!(options.eval_mode);
    assert!(options.allow_filter);
}

//! Statement dumps for `vidlang parse`.
//!
//! - [`tree()`] renders an indented, human-readable tree
//! - [`to_json()`] converts a statement into a `serde_json::Value`
//!
//! # Examples
//!
//! ```
//! use vidlang::parse;
//! use vidlang::printer::{to_json, tree};
//!
//! let stmt = parse("x := 2 + 3").next().unwrap().unwrap();
//! assert_eq!(tree(&stmt), "Assignment :=\n  dest: x\n  Math +\n    Number 2\n    Number 3\n");
//! assert_eq!(to_json(&stmt)["dest"][0], "x");
//! ```

use std::fmt::Write;

use serde_json::{Value as Json, json};

use crate::ast::{Command, Expr, Statement, Value};

pub fn tree(statement: &Statement) -> String {
    let mut out = String::new();
    match statement {
        Statement::Assignment(assign) => {
            let op = if assign.is_declaration { ":=" } else { "=" };
            line(&mut out, 0, &format!("Assignment {op}"));
            line(&mut out, 1, &format!("dest: {}", assign.dest.join(", ")));
            value_tree(&mut out, 1, &assign.value);
        }
        Statement::Expr(expr) => expr_tree(&mut out, 0, expr),
    }
    out
}

fn line(out: &mut String, depth: usize, text: &str) {
    let _ = writeln!(out, "{}{text}", "  ".repeat(depth));
}

fn expr_tree(out: &mut String, depth: usize, expr: &Expr) {
    line(out, depth, "Expr");
    if !expr.input.is_empty() {
        line(out, depth + 1, "input:");
        for value in &expr.input {
            value_tree(out, depth + 2, value);
        }
    }
    line(out, depth + 1, "pipeline:");
    for cmd in &expr.pipeline.commands {
        command_tree(out, depth + 2, cmd);
    }
}

fn command_tree(out: &mut String, depth: usize, cmd: &Command) {
    line(out, depth, &format!("Command {}", cmd.name));
    for arg in &cmd.args {
        value_tree(out, depth + 1, arg);
    }
}

fn value_tree(out: &mut String, depth: usize, value: &Value) {
    match value {
        Value::Bool(b) => line(out, depth, &format!("Bool {b}")),
        Value::Number(n) => line(out, depth, &format!("Number {n}")),
        Value::String(_) => line(out, depth, &format!("String {value}")),
        Value::Identifier(name) => line(out, depth, &format!("Identifier {name}")),
        Value::SelfStar => line(out, depth, "SelfStar"),
        Value::List(items) => {
            line(out, depth, "List");
            for item in items {
                value_tree(out, depth + 1, item);
            }
        }
        Value::SubExpr(sub) => {
            line(out, depth, &format!("SubExpr [{}]", sub.params.join(", ")));
            value_tree(out, depth + 1, &sub.body);
        }
        Value::Math(math) => {
            line(out, depth, &format!("Math {}", math.op));
            value_tree(out, depth + 1, &math.left);
            value_tree(out, depth + 1, &math.right);
        }
        Value::Expr(expr) => expr_tree(out, depth, expr),
    }
}

pub fn to_json(statement: &Statement) -> Json {
    match statement {
        Statement::Assignment(assign) => json!({
            "type": "assignment",
            "declaration": assign.is_declaration,
            "dest": assign.dest,
            "value": value_json(&assign.value),
        }),
        Statement::Expr(expr) => expr_json(expr),
    }
}

fn expr_json(expr: &Expr) -> Json {
    json!({
        "type": "expr",
        "input": expr.input.iter().map(value_json).collect::<Vec<_>>(),
        "pipeline": expr.pipeline.commands.iter().map(command_json).collect::<Vec<_>>(),
    })
}

fn command_json(cmd: &Command) -> Json {
    json!({
        "name": cmd.name,
        "args": cmd.args.iter().map(value_json).collect::<Vec<_>>(),
    })
}

fn value_json(value: &Value) -> Json {
    match value {
        Value::Bool(b) => json!({ "type": "bool", "value": b }),
        Value::Number(n) => json!({ "type": "number", "value": n }),
        Value::String(s) => json!({ "type": "string", "value": s }),
        Value::Identifier(name) => json!({ "type": "identifier", "name": name }),
        Value::SelfStar => json!({ "type": "self" }),
        Value::List(items) => json!({
            "type": "list",
            "items": items.iter().map(value_json).collect::<Vec<_>>(),
        }),
        Value::SubExpr(sub) => json!({
            "type": "subexpr",
            "params": sub.params,
            "body": value_json(&sub.body),
        }),
        Value::Math(math) => json!({
            "type": "math",
            "op": math.op.symbol(),
            "left": value_json(&math.left),
            "right": value_json(&math.right),
        }),
        Value::Expr(expr) => expr_json(expr),
    }
}

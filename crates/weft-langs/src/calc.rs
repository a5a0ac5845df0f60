//! Integer arithmetic with the usual precedence.
//!
//! ```text
//! sum     = product (add_op product)*
//! product = atom (mul_op atom)*
//! atom    = number | '(' sum ')'
//! ```

use std::num::ParseIntError;
use std::sync::Arc;

use weft_engine::{Document, NodeId, Value};
use weft_grammar::{CharSet, GrammarBuilder, GrammarError, ParseletId, SemanticContext, field};

use crate::Sample;

/// Handles of the calculator rules inside a grammar.
#[derive(Debug, Clone, Copy)]
pub struct CalcRules {
    pub expr: ParseletId,
    /// Indexed by the first character of the operand.
    pub atom: ParseletId,
    /// Optional whitespace.
    pub ws: ParseletId,
}

/// Adds the calculator rules to `b`. None of them has a hook, so they can be
/// embedded in a grammar of any context type.
pub fn rules<C>(b: &mut GrammarBuilder<C>) -> CalcRules {
    let ws = b.class(CharSet::whitespace()).repeat().optional().skip().no_error().id();
    let number = b.class(CharSet::ascii_digit()).repeat().named("number").id();
    let expr = b.forward().named("expr").id();

    let open = b.literal("(").id();
    let close = b.literal(")").id();
    let group = b
        .seq([open.into(), ws.into(), expr.into(), ws.into(), close.into()])
        .named("group")
        .id();
    let atom = b.indexed([('(', group)], Some(number)).cache().named("atom").id();

    let star = b.literal("*").id();
    let slash = b.literal("/").id();
    let mul_op = b.choice([star, slash]).named("mul_op").id();
    let product = chain(b, ws, "Product", mul_op, atom);

    let plus = b.literal("+").id();
    let minus = b.literal("-").id();
    let add_op = b.choice([plus, minus]).named("add_op").id();
    let sum = chain(b, ws, "Sum", add_op, product);

    b.define(expr, sum);
    CalcRules { expr, atom, ws }
}

/// `operand (op operand)*`, left associative. A lone operand is passed
/// through, anything longer becomes a `kind` object with a `first` operand
/// and a list of `rest` operations.
fn chain<C>(
    b: &mut GrammarBuilder<C>,
    ws: ParseletId,
    kind: &str,
    op: ParseletId,
    operand: ParseletId,
) -> ParseletId {
    let name = kind.to_ascii_lowercase();
    let tail = b
        .seq([ws.into(), field("op", op), ws.into(), field("operand", operand)])
        .object("Operation")
        .repeat()
        .named(&format!("{name}_tail"))
        .id();
    let longer = b
        .seq([field("first", operand), field("rest", tail)])
        .object(kind)
        .named(&format!("{name}_chain"))
        .id();
    b.choice([longer, operand]).cache().named(&name).id()
}

/// A calculator grammar whose documents are a single expression.
pub fn language() -> Result<Sample<()>, GrammarError> {
    let mut b = GrammarBuilder::new();
    let CalcRules { expr, ws, .. } = rules(&mut b);
    let start = b.seq([ws.into(), expr.into(), ws.into()]).named("calc").id();
    Ok(Sample { grammar: Arc::new(b.start()?), start })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("`{text}` is not a number: {source}")]
    InvalidNumber { text: String, source: ParseIntError },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("missing {0}")]
    Missing(String),
    #[error("cannot evaluate {0}")]
    Unexpected(String),
}

/// Evaluates an expression value of `document`.
pub fn evaluate<C: SemanticContext>(
    document: &Document<C>,
    value: &Value,
) -> Result<i64, EvalError> {
    let id = match value {
        Value::None => return Err(EvalError::Missing("operand".to_string())),
        Value::Text(text) => {
            return text
                .parse()
                .map_err(|source| EvalError::InvalidNumber { text: text.clone(), source });
        }
        Value::Node(id) => *id,
    };
    match document.kind(id) {
        Some("Sum" | "Product") => {
            let mut acc = operand(document, id, "first")?;
            let rest = document.field(id, "rest").and_then(Value::as_node);
            let operations = rest.and_then(|rest| document.items(rest)).unwrap_or_default();
            for operation in operations {
                let operation = operation
                    .as_node()
                    .ok_or_else(|| EvalError::Unexpected("a bare value".to_string()))?;
                let op = document.field(operation, "op").and_then(Value::as_text);
                let rhs = operand(document, operation, "operand")?;
                acc = apply(op, acc, rhs)?;
            }
            Ok(acc)
        }
        Some("Negate") => {
            operand(document, id, "operand")?.checked_neg().ok_or(EvalError::Overflow)
        }
        Some(kind) => Err(EvalError::Unexpected(format!("`{kind}`"))),
        None => Err(EvalError::Unexpected("a list".to_string())),
    }
}

fn operand<C: SemanticContext>(
    document: &Document<C>,
    id: NodeId,
    name: &str,
) -> Result<i64, EvalError> {
    match document.field(id, name) {
        Some(value) => evaluate(document, value),
        None => Err(EvalError::Missing(format!("field `{name}`"))),
    }
}

fn apply(op: Option<&str>, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    let result = match op {
        Some("+") => lhs.checked_add(rhs),
        Some("-") => lhs.checked_sub(rhs),
        Some("*") => lhs.checked_mul(rhs),
        Some("/" | "%") if rhs == 0 => return Err(EvalError::DivisionByZero),
        Some("/") => lhs.checked_div(rhs),
        Some("%") => lhs.checked_rem(rhs),
        Some(op) => return Err(EvalError::Unexpected(format!("operator `{op}`"))),
        None => return Err(EvalError::Missing("operator".to_string())),
    };
    result.ok_or(EvalError::Overflow)
}

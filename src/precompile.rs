//! Opt-in rewrite of clock calls into constant dates.
//!
//! `$now` and `$today` read the clock when the statement is compiled, not
//! each time it runs:
//!
//! ```text
//! $today()      ->  date('2024-05-01 00:00:00')
//! $now(-3)      ->  date('2024-05-01 09:30:12', -3)
//! ```

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::CompileError;
use crate::functions::dates;
use crate::node::{NodeId, NodeKind, Tree};
use crate::parser::SyntaxTree;
use crate::token::{Literal, Token, TokenKind};

const NOW: &str = "$now";
const TODAY: &str = "$today";

/// Rewrites every clock call in `syntax`. Returns how many were rewritten.
pub fn precompile(syntax: &mut SyntaxTree) -> Result<usize, CompileError> {
    let tree = syntax.tree_mut();
    let calls: Vec<NodeId> = (0..tree.len())
        .filter(|&id| tree.kind(id) == NodeKind::Method)
        .filter(|&id| {
            tree.left(id).is_some_and(|name| {
                let name = tree.text(name);
                name.eq_ignore_ascii_case(NOW) || name.eq_ignore_ascii_case(TODAY)
            })
        })
        .collect();
    for &call in &calls {
        rewrite(tree, call)?;
    }
    if !calls.is_empty() {
        debug!(rewritten = calls.len(), "precompiled clock calls");
    }
    Ok(calls.len())
}

fn rewrite(tree: &mut Tree, call: NodeId) -> Result<(), CompileError> {
    let Some(name_node) = tree.left(call) else {
        return Ok(());
    };
    let name = tree.text(name_node).to_lowercase();
    let arguments = tree.arguments(call, 1);
    let invalid = |tree: &Tree| CompileError::InvalidMethodCall {
        name: name.clone(),
        arguments: arguments
            .iter()
            .map(|&a| tree.render(a))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let hours = match arguments.as_slice() {
        [] => None,
        [zone] => Some(constant_hours(tree, *zone).ok_or_else(|| invalid(tree))?),
        _ => return Err(invalid(tree)),
    };
    let instant = if name == TODAY {
        dates::today(hours)
    } else {
        dates::now(hours)
    }
    .map_err(|_| invalid(tree))?;
    let text = instant.format(dates::DISPLAY_FORMAT).to_string();

    let position = tree.token(name_node).position;
    tree.set_token(name_node, Token::new(TokenKind::MethodCall, "date", position));
    let constant = tree.push(
        NodeKind::Constant,
        Token::new(TokenKind::ConstantString, text.clone(), position)
            .with_literal(Literal::Text(text)),
    );
    let mut children = vec![name_node, constant];
    children.extend(arguments.iter().copied());
    tree.replace_children(call, children);
    Ok(())
}

/// A numeric constant, possibly negated.
fn constant_hours(tree: &Tree, node: NodeId) -> Option<Decimal> {
    match tree.kind(node) {
        NodeKind::Constant => tree.token(node).number(),
        NodeKind::Subtract if tree.is_negation(node) => {
            let operand = tree.right(node)?;
            (tree.kind(operand) == NodeKind::Constant)
                .then(|| tree.token(operand).number())
                .flatten()
                .map(|n| -n)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scanner::scan;

    fn parsed(source: &str) -> SyntaxTree {
        let mut statements = scan(source).unwrap();
        parse(statements.remove(0)).unwrap()
    }

    #[test]
    fn test_rewrites_clock_calls() {
        let mut syntax = parsed("$today() + '1d'");
        assert_eq!(precompile(&mut syntax).unwrap(), 1);
        let rendered = syntax.render();
        assert!(rendered.starts_with("date('"), "{}", rendered);
        assert!(rendered.contains(" 00:00:00')"), "{}", rendered);
    }

    #[test]
    fn test_keeps_negative_zone() {
        let mut syntax = parsed("$now(-3)");
        precompile(&mut syntax).unwrap();
        assert!(syntax.render().ends_with(",-3)"), "{}", syntax.render());
    }

    #[test]
    fn test_rejects_computed_zone() {
        let mut syntax = parsed("$now(Zone)");
        assert!(matches!(
            precompile(&mut syntax),
            Err(CompileError::InvalidMethodCall { .. })
        ));
    }
}

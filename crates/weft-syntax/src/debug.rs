use std::fmt;

use text_size::TextRange;

use crate::{NodeOrToken, ParseNode, SyntaxKind};

/// Indented dump of a parse tree, one element per line.
///
/// ```text
/// element@0..7
///   '<'@0..1 "<"
///   name@1..4 "div"
/// ```
///
/// Repetition nodes are suffixed with `*`, error tokens are prefixed with
/// `ERROR`.
pub struct DebugTree<'a> {
    root: &'a ParseNode,
    name: &'a dyn Fn(SyntaxKind) -> String,
}

impl<'a> DebugTree<'a> {
    pub fn new(root: &'a ParseNode, name: &'a dyn Fn(SyntaxKind) -> String) -> Self {
        Self { root, name }
    }
}

impl fmt::Display for DebugTree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut result = Ok(());
        self.root.walk(&mut |element, start, depth| {
            if result.is_err() {
                return;
            }
            let range = TextRange::at(start, element.text_len());
            let name = (self.name)(element.kind());
            let indent = "  ".repeat(depth);
            result = match element {
                NodeOrToken::Node(node) => {
                    let star = if node.is_repeat() { "*" } else { "" };
                    writeln!(f, "{indent}{name}{star}@{range:?}")
                }
                NodeOrToken::Token(token) => {
                    let error = if token.is_error() { "ERROR " } else { "" };
                    writeln!(f, "{indent}{error}{name}@{range:?} {:?}", token.text())
                }
            };
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::{GreenNode, GreenToken};

    #[test]
    fn dump() {
        let name = |kind: SyntaxKind| match kind.raw() {
            0 => "word".to_string(),
            1 => "words".to_string(),
            _ => "root".to_string(),
        };
        let words = GreenNode::repeat(
            SyntaxKind::new(1),
            vec![
                GreenToken::new(SyntaxKind::new(0), "ab").into(),
                GreenToken::error(SyntaxKind::new(0), "!").into(),
            ],
        );
        let root: ParseNode = GreenNode::new(
            SyntaxKind::new(2),
            vec![words.into(), GreenToken::error(SyntaxKind::new(0), "").into()],
        )
        .into();

        expect![[r#"
            root@0..3
              words*@0..3
                word@0..2 "ab"
                ERROR word@2..3 "!"
              ERROR word@3..3 ""
        "#]]
        .assert_eq(&DebugTree::new(&root, &name).to_string());
    }
}

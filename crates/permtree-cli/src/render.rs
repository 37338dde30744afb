//! Plain-text tree rendering

use permtree_core::{Coverage, Session};
use std::fmt::Write as _;

/// Render the visible rows of a session
///
/// ```text
/// - [~] Orders <orders> (3/7)
///     [x] Export <orders.list.export>
/// + [ ] Catalog <catalog> (0/3)
/// ```
///
/// `-`/`+` mark expanded/collapsed branches. `[x]` is a granted node,
/// `[~]` an ungranted node with grants below it.
pub fn render(session: &Session) -> String {
    let selection = session.selection();
    let expansion = session.expansion();
    let mut out = String::new();

    for node in expansion.visible() {
        let id = node.id().as_str();
        let fold = match (node.is_leaf(), expansion.is_expanded(id)) {
            (true, _) => ' ',
            (false, true) => '-',
            (false, false) => '+',
        };
        let mark = match (selection.is_granted(id), selection.coverage(id)) {
            (true, _) => "[x]",
            (false, Ok(Coverage::Partial)) => "[~]",
            _ => "[ ]",
        };

        let indent = "  ".repeat(node.depth());
        let _ = write!(out, "{indent}{fold} {mark} {} <{id}>", node.label());
        if !node.is_leaf() {
            if let (Ok(granted), Ok(total)) = (selection.granted_count(id), selection.total_count(id)) {
                let _ = write!(out, " ({granted}/{total})");
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use permtree_core::{NodeId, NodeSpec, SessionConfig, TreeSpec};

    #[test]
    fn renders_marks_and_counts() {
        let spec = TreeSpec::Nested(vec![NodeSpec::branch(
            "A",
            vec![NodeSpec::leaf("B"), NodeSpec::leaf("C").with_label("Refunds")],
        )
        .with_label("Orders")]);
        let session = Session::build(&spec, vec![NodeId::from("C")], &SessionConfig::new()).unwrap();

        assert_eq!(
            render(&session),
            "- [~] Orders <A> (1/3)\n    [ ] B <B>\n    [x] Refunds <C>\n"
        );
    }
}

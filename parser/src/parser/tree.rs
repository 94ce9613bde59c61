use serde::{Deserialize, Serialize};

use crate::token::{escape_whitespace, Token};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Rule {
        rule_index: usize,
        /// Outer alternative the rule took, when known.
        alt: Option<usize>,
    },
    Token(Token),
    /// A token consumed or conjured up by error recovery.
    Error(Token),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// State that invoked this rule; `None` for the start rule.
    pub invoking_state: Option<usize>,
    /// Stream indices of the first and last tokens of a rule node.
    pub start: Option<usize>,
    pub stop: Option<usize>,
}

/// Parse trees are kept in an arena; nodes refer to each other by index.
/// Rule nodes are reparented when left-recursive rules are unrolled, so
/// parents are plain indices rather than owning links.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseTree {
    nodes: Vec<TreeNode>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    pub fn add_rule(
        &mut self,
        rule_index: usize,
        parent: Option<NodeId>,
        invoking_state: Option<usize>,
    ) -> NodeId {
        self.push(TreeNode {
            kind: NodeKind::Rule {
                rule_index,
                alt: None,
            },
            parent,
            children: vec![],
            invoking_state,
            start: None,
            stop: None,
        })
    }

    pub fn add_token(&mut self, parent: NodeId, token: Token) -> NodeId {
        self.add_leaf(parent, NodeKind::Token(token))
    }

    pub fn add_error(&mut self, parent: NodeId, token: Token) -> NodeId {
        self.add_leaf(parent, NodeKind::Error(token))
    }

    fn add_leaf(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.push(TreeNode {
            kind,
            parent: Some(parent),
            children: vec![],
            invoking_state: None,
            start: None,
            stop: None,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Detaches the last child of `parent`, if it is `child`.
    pub fn remove_last_child(&mut self, parent: NodeId, child: NodeId) {
        if self.nodes[parent].children.last() == Some(&child) {
            self.nodes[parent].children.pop();
        }
    }

    pub fn rule_index(&self, id: NodeId) -> Option<usize> {
        match self.nodes[id].kind {
            NodeKind::Rule { rule_index, .. } => Some(rule_index),
            _ => None,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Renders the subtree at `id` in LISP form, `(rule child ...)`.
    /// `token_text` supplies the text of leaves.
    pub fn to_string_tree(
        &self,
        id: NodeId,
        rule_names: &[String],
        token_text: &dyn Fn(&Token) -> String,
    ) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, id, rule_names, token_text);
        out
    }

    fn write_tree(
        &self,
        out: &mut String,
        id: NodeId,
        rule_names: &[String],
        token_text: &dyn Fn(&Token) -> String,
    ) {
        let node = &self.nodes[id];
        let label = match &node.kind {
            NodeKind::Rule { rule_index, .. } => rule_names
                .get(*rule_index)
                .cloned()
                .unwrap_or_else(|| rule_index.to_string()),
            NodeKind::Token(t) | NodeKind::Error(t) => escape_whitespace(&token_text(t)),
        };
        if node.children.is_empty() {
            out.push_str(&label);
            return;
        }
        out.push('(');
        out.push_str(&label);
        for &c in &node.children {
            out.push(' ');
            self.write_tree(out, c, rule_names, token_text);
        }
        out.push(')');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token;

    fn tok(text: &str) -> Token {
        Token {
            ttype: 1,
            channel: token::DEFAULT_CHANNEL,
            span: 0..1,
            line: 1,
            column: 0,
            index: None,
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn lisp_rendering() {
        let names = vec!["s".to_string(), "e".to_string()];
        let mut t = ParseTree::new();
        let s = t.add_rule(0, None, None);
        let e = t.add_rule(1, Some(s), Some(3));
        t.add_child(s, e);
        t.add_token(e, tok("a"));
        t.add_token(s, tok("\n"));
        let empty = t.add_rule(1, Some(s), Some(4));
        t.add_child(s, empty);
        let text = |t: &Token| t.text.clone().unwrap_or_default();
        assert_eq!(t.to_string_tree(s, &names, &text), "(s (e a) \\n e)");
    }
}

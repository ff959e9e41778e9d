//! Per-kind stacks of open blocks awaiting their closing tag

use std::collections::BTreeMap;

/// One open block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockFrame {
    /// Offset of the opening tag
    pub offset: usize,
    pub has_else: bool,
}

/// Open blocks keyed by block kind (`"if"`); kind names are case-insensitive
#[derive(Debug, Default)]
pub struct BlockStack {
    stacks: BTreeMap<String, Vec<BlockFrame>>,
}

impl BlockStack {
    pub fn push(&mut self, kind: &str, offset: usize) {
        self.stacks
            .entry(kind.to_ascii_lowercase())
            .or_default()
            .push(BlockFrame {
                offset,
                has_else: false,
            });
    }

    pub fn pop(&mut self, kind: &str) -> Option<BlockFrame> {
        self.stacks.get_mut(&kind.to_ascii_lowercase())?.pop()
    }

    /// The innermost open block of `kind`
    pub fn current(&self, kind: &str) -> Option<&BlockFrame> {
        self.stacks.get(&kind.to_ascii_lowercase())?.last()
    }

    pub fn current_mut(&mut self, kind: &str) -> Option<&mut BlockFrame> {
        self.stacks.get_mut(&kind.to_ascii_lowercase())?.last_mut()
    }

    /// Empty every stack, yielding `(kind, frame)` innermost first per kind
    pub fn drain_open(&mut self) -> Vec<(String, BlockFrame)> {
        let mut open = Vec::new();
        for (kind, stack) in std::mem::take(&mut self.stacks) {
            open.extend(stack.into_iter().rev().map(|frame| (kind.clone(), frame)));
        }
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_is_lifo() {
        let mut blocks = BlockStack::default();
        blocks.push("if", 0);
        blocks.push("IF", 10);
        assert_eq!(blocks.pop("if").map(|f| f.offset), Some(10));
        assert_eq!(blocks.pop("If").map(|f| f.offset), Some(0));
        assert_eq!(blocks.pop("if"), None);
    }

    #[test]
    fn test_unknown_kind_is_empty() {
        let mut blocks = BlockStack::default();
        assert!(blocks.current("for").is_none());
        assert!(blocks.pop("for").is_none());
    }

    #[test]
    fn test_else_flag_on_current_frame() {
        let mut blocks = BlockStack::default();
        blocks.push("if", 0);
        blocks.push("if", 5);
        blocks.current_mut("if").unwrap().has_else = true;
        assert!(blocks.current("if").unwrap().has_else);
        blocks.pop("if");
        assert!(!blocks.current("if").unwrap().has_else);
    }

    #[test]
    fn test_drain_open_innermost_first() {
        let mut blocks = BlockStack::default();
        blocks.push("if", 1);
        blocks.push("if", 7);
        blocks.push("loop", 3);
        let open: Vec<_> = blocks
            .drain_open()
            .into_iter()
            .map(|(kind, frame)| (kind, frame.offset))
            .collect();
        assert_eq!(
            open,
            vec![
                ("if".to_string(), 7),
                ("if".to_string(), 1),
                ("loop".to_string(), 3)
            ]
        );
        assert!(blocks.current("if").is_none());
    }
}

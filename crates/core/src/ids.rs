use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a stacked panel and of the interaction instance bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PanelId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out panel ids. Owned by the render engine so that two charts never
/// share a counter.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> PanelId {
        let id = PanelId(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocators_are_independent() {
        let mut first = IdAllocator::new();
        let mut second = IdAllocator::new();

        assert_eq!(first.allocate(), PanelId(0));
        assert_eq!(first.allocate(), PanelId(1));
        assert_eq!(second.allocate(), PanelId(0));
    }
}

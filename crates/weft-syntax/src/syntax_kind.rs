/// Raw identifier of the grammar node (parselet) that produced a parse node.
///
/// The grammar crate maps its arena handles to and from this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyntaxKind(u32);

impl SyntaxKind {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl From<u32> for SyntaxKind {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

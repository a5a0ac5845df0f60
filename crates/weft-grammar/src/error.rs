/// Programmer errors detected while building or starting a grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("forward reference `{0}` is never defined")]
    UnresolvedForward(String),
    #[error("forward reference `{0}` is already defined")]
    AlreadyDefined(String),
    #[error("forward reference `{0}` resolves to itself")]
    CyclicForward(String),
    #[error("dispatch key {key:?} of `{parselet}` is already taken")]
    DuplicateDispatch { parselet: String, key: char },
    #[error("name `{0}` is already used")]
    DuplicateName(String),
    #[error("no parselet is named `{0}`")]
    UnknownName(String),
    #[error("`{parselet}` cannot build {build}")]
    InvalidBuild { parselet: String, build: String },
    #[error("`{0}` has nothing to match")]
    Empty(String),
    #[error("`{parselet}` is not {expected}")]
    WrongKind { parselet: String, expected: &'static str },
}

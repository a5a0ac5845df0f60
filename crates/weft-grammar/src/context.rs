/// Per-parse state read and written by accept hooks.
///
/// The parser takes a snapshot before every attempt that may run a hook and
/// restores it when the attempt fails, so a context only has to describe how
/// to save and reload itself.
pub trait SemanticContext: Default {
    type Snapshot: Clone;

    fn snapshot(&self) -> Self::Snapshot;

    fn restore(&mut self, snapshot: Self::Snapshot);

    /// Digest of the current state. Context-sensitive parselets are only
    /// memoized while this is `Some`, and a memoized result is only reused
    /// under an equal fingerprint.
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}

impl SemanticContext for () {
    type Snapshot = ();

    fn snapshot(&self) {}

    fn restore(&mut self, (): ()) {}

    fn fingerprint(&self) -> Option<u64> {
        Some(0)
    }
}

/// What a hook gets to see of a successful raw match.
#[derive(Debug, Clone, Copy)]
pub struct AcceptInput<'a> {
    /// The matched text.
    pub text: &'a str,
    /// The semantic value of the match, when it is a string.
    pub value: Option<&'a str>,
}

/// Semantic check run after a parselet matched.
pub trait Accept<C> {
    /// Rejecting a match makes the parselet fail as if the text did not
    /// match, and the message becomes a diagnostic candidate.
    fn accept(&self, cx: &mut C, input: AcceptInput<'_>) -> Result<(), String>;

    /// Called instead of [`Accept::accept`] when the parselet is completed as
    /// missing at end of input. Returns the message of the recorded error.
    fn on_missing(&self, cx: &mut C) -> Option<String> {
        let _ = cx;
        None
    }
}

/// Adapts a closure into an [`Accept`] hook.
pub struct AcceptFn<F>(pub F);

impl<C, F> Accept<C> for AcceptFn<F>
where
    F: Fn(&mut C, AcceptInput<'_>) -> Result<(), String>,
{
    fn accept(&self, cx: &mut C, input: AcceptInput<'_>) -> Result<(), String> {
        (self.0)(cx, input)
    }
}

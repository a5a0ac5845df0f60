use std::fmt;

/// A set of characters described by inclusive ranges, optionally negated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CharSet {
    ranges: Vec<(char, char)>,
    negated: bool,
}

impl CharSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(lo: char, hi: char) -> Self {
        debug_assert!(lo <= hi, "empty range {lo:?}..={hi:?}");
        Self { ranges: vec![(lo, hi)], negated: false }
    }

    pub fn chars(chars: &str) -> Self {
        Self { ranges: chars.chars().map(|c| (c, c)).collect(), negated: false }
    }

    pub fn ascii_digit() -> Self {
        Self::range('0', '9')
    }

    pub fn ascii_alpha() -> Self {
        Self::range('a', 'z').union(&Self::range('A', 'Z'))
    }

    pub fn ascii_alphanumeric() -> Self {
        Self::ascii_alpha().union(&Self::ascii_digit())
    }

    pub fn whitespace() -> Self {
        Self::chars(" \t\r\n")
    }

    /// Adds the ranges of `other`. Both sets are expected to be non-negated.
    pub fn union(mut self, other: &Self) -> Self {
        debug_assert!(!self.negated && !other.negated, "union of negated character sets");
        self.ranges.extend_from_slice(&other.ranges);
        self
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty() && !self.negated
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != self.negated
    }

    /// Returns `true` if every character of `text` belongs to the set.
    pub fn contains_all(&self, text: &str) -> bool {
        text.chars().all(|c| self.contains(c))
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        if self.negated {
            f.write_str("^")?;
        }
        for &(lo, hi) in &self.ranges {
            if lo == hi {
                write!(f, "{}", lo.escape_debug())?;
            } else {
                write!(f, "{}-{}", lo.escape_debug(), hi.escape_debug())?;
            }
        }
        f.write_str("]")
    }
}

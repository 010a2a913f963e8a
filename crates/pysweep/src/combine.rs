use indexmap::IndexSet;
use std::hash::Hash;
use std::path::PathBuf;

pub trait Combine {
    /// Combine two values, preferring the values in `self`.
    ///
    /// Scalars and lists from `self` win outright whenever they are present, even if
    /// they happen to equal a built-in default. Sets are unioned with the higher
    /// precedence items placed first.
    #[must_use]
    fn combine(self, other: Self) -> Self;
}

macro_rules! impl_combine_or {
    ($name:ty) => {
        impl Combine for Option<$name> {
            fn combine(self, other: Option<$name>) -> Option<$name> {
                self.or(other)
            }
        }
    };
}

impl_combine_or!(String);
impl_combine_or!(Vec<String>);
impl_combine_or!(Vec<PathBuf>);

impl<T> Combine for IndexSet<T>
where
    T: Eq + Hash,
{
    fn combine(mut self, other: Self) -> Self {
        self.extend(other);
        self
    }
}

impl<T> Combine for Option<IndexSet<T>>
where
    T: Eq + Hash,
{
    /// Union of both sets when both are present
    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Some(a), Some(b)) => Some(a.combine(b)),
            (a, b) => a.or(b),
        }
    }
}

use crate::expr::{Expr, Lookup, Predicate, PATH_SEPARATOR};
use crate::value::Value;

/// Things that can be narrowed down by predicates.
pub trait Filter: Sized {
    fn filter_by(self, predicate: Predicate) -> Self;

    /// Filter using a lookup path, e.g. `filter("celestial_type__lte", 4)`.
    ///
    /// A trailing lookup suffix selects the comparison; without one the
    /// comparison is `exact`.
    fn filter(self, path: &str, value: impl Into<Value>) -> Self {
        self.filter_by(lookup(path, value))
    }

    fn exclude(self, path: &str, value: impl Into<Value>) -> Self {
        self.filter_by(Predicate::Not(Box::new(lookup(path, value))))
    }
}

/// Split a lookup path into its field path and comparison.
pub fn split_lookup(path: &str) -> (&str, Lookup) {
    match path.rsplit_once(PATH_SEPARATOR) {
        Some((field, suffix)) => match Lookup::from_suffix(suffix) {
            Some(lookup) => (field, lookup),
            None => (path, Lookup::Exact),
        },
        None => (path, Lookup::Exact),
    }
}

pub fn lookup(path: &str, value: impl Into<Value>) -> Predicate {
    let (field, lookup) = split_lookup(path);
    Predicate::Compare {
        lhs: Expr::field(field),
        lookup,
        rhs: value.into(),
    }
}

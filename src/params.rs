/*!
# Named Parameter Vectors

Inference code refers to parameters by name (`"r0"`, `"reporting"`), while the
numerical core wants contiguous arrays. This module fixes the bridge once: a
[`ParamSet`] establishes a canonical name ordering at construction time, and
every labeled structure of a run (parameter vectors, bounds, covariance rows
and columns, trace columns) is laid out in that same order. Downstream code
indexes by position and never re-derives the ordering.

## Example Usage

```rust
use mhfit::params::ParamVector;

let theta = ParamVector::from_pairs([("r0", 15.0), ("reporting", 0.7)]).unwrap();
assert_eq!(theta.get("r0"), Some(15.0));
assert_eq!(theta.set().index_of("reporting"), Some(1));
```
*/

use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, ArrayView1};

use crate::error::{Error, Result};

/// The ordered set of parameter names for one run.
///
/// Cheap to clone (the name list is shared); two sets compare equal when they
/// hold the same names in the same order, which is the label contract every
/// labeled operation in this crate checks against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSet {
    names: Arc<[String]>,
}

impl ParamSet {
    /// Builds a parameter set from an ordered list of names.
    ///
    /// Fails if the list is empty or contains a duplicate name.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::Config("parameter set is empty".into()));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::Config(format!("duplicate parameter name `{name}`")));
            }
        }
        Ok(Self {
            names: names.into(),
        })
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the set holds no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The names in canonical order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of `name` in the canonical ordering, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Name at position `i`. Panics if out of range, like slice indexing.
    pub fn name(&self, i: usize) -> &str {
        &self.names[i]
    }

    /// Checks that `other` carries exactly this set, reporting the first
    /// label that does not line up.
    pub(crate) fn check_matches(&self, other: &ParamSet) -> Result<()> {
        if self == other {
            return Ok(());
        }
        let name = self
            .names
            .iter()
            .zip(other.names.iter().map(Some).chain(std::iter::repeat(None)))
            .find(|(a, b)| Some(*a) != *b)
            .map(|(a, _)| a.clone())
            .unwrap_or_else(|| other.names[self.names.len()..][0].clone());
        Err(Error::LabelMismatch { name })
    }
}

/// An ordered, named vector of parameter values.
///
/// The value layout follows the owning [`ParamSet`]; `get`/`set` by name are
/// conveniences for callers, the sampler itself works on the positional
/// `values()` view.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamVector {
    set: ParamSet,
    values: Array1<f64>,
}

impl ParamVector {
    /// Pairs a parameter set with a value for each name, in set order.
    pub fn new(set: ParamSet, values: Array1<f64>) -> Result<Self> {
        if values.len() != set.len() {
            return Err(Error::Config(format!(
                "expected {} values for {} parameters, got {}",
                set.len(),
                set.len(),
                values.len()
            )));
        }
        Ok(Self { set, values })
    }

    /// Builds the set and the vector in one go from `(name, value)` pairs;
    /// the pair order becomes the canonical parameter order.
    ///
    /// ```rust
    /// use mhfit::params::ParamVector;
    ///
    /// let theta = ParamVector::from_pairs([("a", 5.0), ("b", 0.1)]).unwrap();
    /// assert_eq!(theta.values().to_vec(), vec![5.0, 0.1]);
    /// ```
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<f64>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        let set = ParamSet::new(names)?;
        Ok(Self {
            set,
            values: Array1::from_vec(values),
        })
    }

    /// The owning parameter set.
    pub fn set(&self) -> &ParamSet {
        &self.set
    }

    /// Positional view of the values, in set order.
    pub fn values(&self) -> ArrayView1<'_, f64> {
        self.values.view()
    }

    /// Value of `name`, if the set carries it.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.set.index_of(name).map(|i| self.values[i])
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the vector holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same set, different values. The chain loop uses this to wrap candidate
    /// points without touching the name bookkeeping.
    ///
    /// Panics if `values` does not have one entry per parameter.
    pub fn with_values(&self, values: Array1<f64>) -> ParamVector {
        assert_eq!(
            values.len(),
            self.set.len(),
            "value count does not match the parameter set"
        );
        ParamVector {
            set: self.set.clone(),
            values,
        }
    }
}

impl fmt::Display for ParamVector {
    /// `name = value` pairs separated by ` | `, four decimal places; the
    /// format progress reporting uses for the current chain state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.set.names().iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{} = {:.4}", name, self.values[i])?;
        }
        Ok(())
    }
}

/// Per-parameter truncation bounds, aligned with a [`ParamSet`].
///
/// Immutable for the run; unspecified entries default to -inf/+inf.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Bounds {
    /// Bounds covering the whole real line for `len` parameters.
    pub fn unbounded(len: usize) -> Self {
        Self {
            lower: Array1::from_elem(len, f64::NEG_INFINITY),
            upper: Array1::from_elem(len, f64::INFINITY),
        }
    }

    /// Builds bounds for `set` from partial `(name, value)` lists.
    ///
    /// Names absent from `set` are rejected; so is any pair with
    /// `lower > upper`.
    pub fn from_pairs(
        set: &ParamSet,
        lower: &[(String, f64)],
        upper: &[(String, f64)],
    ) -> Result<Self> {
        let mut bounds = Self::unbounded(set.len());
        for (name, value) in lower {
            let i = set
                .index_of(name)
                .ok_or_else(|| Error::UnknownParameter { name: name.clone() })?;
            bounds.lower[i] = *value;
        }
        for (name, value) in upper {
            let i = set
                .index_of(name)
                .ok_or_else(|| Error::UnknownParameter { name: name.clone() })?;
            bounds.upper[i] = *value;
        }
        for i in 0..set.len() {
            if bounds.lower[i] > bounds.upper[i] {
                return Err(Error::Config(format!(
                    "bounds of `{}` are inverted: lower {} > upper {}",
                    set.name(i),
                    bounds.lower[i],
                    bounds.upper[i]
                )));
            }
        }
        Ok(bounds)
    }

    /// Lower bounds, in set order.
    pub fn lower(&self) -> ArrayView1<'_, f64> {
        self.lower.view()
    }

    /// Upper bounds, in set order.
    pub fn upper(&self) -> ArrayView1<'_, f64> {
        self.upper.view()
    }

    /// True when every component of `values` lies inside its bounds.
    pub fn contains(&self, values: ArrayView1<'_, f64>) -> bool {
        values
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (lo, up))| *v >= *lo && *v <= *up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_preserved() {
        let theta = ParamVector::from_pairs([("b", 2.0), ("a", 1.0), ("c", 3.0)]).unwrap();
        assert_eq!(theta.set().names(), ["b", "a", "c"]);
        assert_eq!(theta.set().index_of("a"), Some(1));
        assert_eq!(theta.values().to_vec(), vec![2.0, 1.0, 3.0]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let res = ParamVector::from_pairs([("a", 1.0), ("a", 2.0)]);
        assert!(matches!(res, Err(Error::Config(_))), "got {res:?}");
    }

    #[test]
    fn empty_set_rejected() {
        let res = ParamSet::new(Vec::<String>::new());
        assert!(matches!(res, Err(Error::Config(_))), "got {res:?}");
    }

    #[test]
    fn get_by_name() {
        let theta = ParamVector::from_pairs([("r0", 15.0), ("reporting", 0.7)]).unwrap();
        assert_eq!(theta.get("r0"), Some(15.0));
        assert_eq!(theta.get("reporting"), Some(0.7));
        assert_eq!(theta.get("gamma"), None);
    }

    #[test]
    fn display_format() {
        let theta = ParamVector::from_pairs([("a", 5.0), ("b", 0.125)]).unwrap();
        assert_eq!(theta.to_string(), "a = 5.0000 | b = 0.1250");
    }

    #[test]
    fn mismatched_sets_report_first_offender() {
        let a = ParamSet::new(["a", "b"]).unwrap();
        let b = ParamSet::new(["a", "c"]).unwrap();
        match a.check_matches(&b) {
            Err(Error::LabelMismatch { name }) => assert_eq!(name, "b"),
            other => panic!("expected LabelMismatch, got {other:?}"),
        }
        assert!(a.check_matches(&a.clone()).is_ok());
    }

    #[test]
    fn shorter_set_reports_missing_label() {
        let a = ParamSet::new(["a", "b", "c"]).unwrap();
        let b = ParamSet::new(["a", "b"]).unwrap();
        match a.check_matches(&b) {
            Err(Error::LabelMismatch { name }) => assert_eq!(name, "c"),
            other => panic!("expected LabelMismatch, got {other:?}"),
        }
    }

    #[test]
    fn bounds_default_to_infinite() {
        let set = ParamSet::new(["a", "b"]).unwrap();
        let bounds = Bounds::from_pairs(&set, &[("a".into(), 0.0)], &[]).unwrap();
        assert_eq!(bounds.lower()[0], 0.0);
        assert_eq!(bounds.lower()[1], f64::NEG_INFINITY);
        assert_eq!(bounds.upper()[0], f64::INFINITY);
    }

    #[test]
    fn bounds_unknown_name_rejected() {
        let set = ParamSet::new(["a"]).unwrap();
        let res = Bounds::from_pairs(&set, &[("z".into(), 0.0)], &[]);
        match res {
            Err(Error::UnknownParameter { name }) => assert_eq!(name, "z"),
            other => panic!("expected UnknownParameter, got {other:?}"),
        }
    }

    #[test]
    fn inverted_bounds_rejected() {
        let set = ParamSet::new(["a"]).unwrap();
        let res = Bounds::from_pairs(&set, &[("a".into(), 2.0)], &[("a".into(), 1.0)]);
        assert!(matches!(res, Err(Error::Config(_))), "got {res:?}");
    }

    #[test]
    fn contains_checks_componentwise() {
        let set = ParamSet::new(["a", "b"]).unwrap();
        let bounds =
            Bounds::from_pairs(&set, &[("a".into(), 0.0)], &[("b".into(), 1.0)]).unwrap();
        let inside = ParamVector::from_pairs([("a", 0.5), ("b", 0.5)]).unwrap();
        let outside = ParamVector::from_pairs([("a", -0.5), ("b", 0.5)]).unwrap();
        assert!(bounds.contains(inside.values()));
        assert!(!bounds.contains(outside.values()));
    }
}

//! Label cartesian expansion.
//!
//! Given a metric, a partially bound label assignment and an ordered list of unbound dimensions,
//! [`expand`] visits every combination of dimension values depth-first, in declaration order, and
//! hands each fully bound assignment to a sink callback exactly once.  The same inputs always yield
//! the same sequence, which keeps scrape payloads stable in shape across runs.
use std::collections::BTreeMap;
use std::sync::Arc;

use mm_core::MeshResult;

/// A label assignment.  Ordered so that rendering is deterministic.
pub type Labels = BTreeMap<&'static str, String>;

/// One unbound label and its candidate values, cross-multiplied during expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dimension {
    /// Label key.
    pub name: &'static str,
    /// Candidate values, visited in order.  Shared, since the same lists recur for every pod.
    pub values: Arc<[String]>,
}

impl Dimension {
    /// Build a dimension from anything that yields strings.
    pub fn new<I, S>(name: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { name, values: values.into_iter().map(Into::into).collect() }
    }

    /// Build a dimension over an already shared value list.
    #[must_use]
    pub const fn shared(name: &'static str, values: Arc<[String]>) -> Self {
        Self { name, values }
    }

    /// Number of candidate values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the dimension has no candidates (and so collapses the product to zero).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Number of series one expansion over `dimensions` produces: the product of their sizes, or 1 for
/// no dimensions at all.
#[must_use]
pub fn cardinality(dimensions: &[Dimension]) -> usize {
    dimensions.iter().map(Dimension::len).product()
}

/// Enumerate the cross product of `dimensions` on top of `labels`, calling `emit` once per
/// combination, and return the sum of what `emit` reported.
///
/// `labels` is borrowed mutably for the whole call.  Each recursion level binds its own dimension,
/// recurses, and puts the key back the way it found it (removed, or its previous value restored)
/// before returning, including when `emit` fails part way through.
pub fn expand<F>(metric: &str, labels: &mut Labels, dimensions: &[Dimension], emit: &mut F) -> MeshResult<usize>
where
    F: FnMut(&str, &Labels) -> MeshResult<usize>,
{
    let Some((head, tail)) = dimensions.split_first() else {
        return emit(metric, labels);
    };

    let previous = labels.remove(head.name);
    let mut total = 0;
    let mut failure = None;
    for value in head.values.iter() {
        labels.insert(head.name, value.clone());
        match expand(metric, labels, tail, emit) {
            Ok(n) => total += n,
            Err(e) => {
                failure = Some(e);
                break;
            },
        }
    }

    match previous {
        Some(value) => labels.insert(head.name, value),
        None => labels.remove(head.name),
    };
    failure.map_or(Ok(total), Err)
}

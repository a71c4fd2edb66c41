//! Lazy filtering over an arbitrary iterator

/// Decides whether an item passes a [`FilterIterator`]
pub trait Predicate<T> {
    fn evaluate(&self, item: &T) -> bool;
}

impl<T, F> Predicate<T> for F
where
    F: Fn(&T) -> bool,
{
    fn evaluate(&self, item: &T) -> bool {
        self(item)
    }
}

/// Yields only the items of `source` that satisfy `predicate`.
///
/// At most one item is buffered and the source is advanced only as far as
/// needed to find it.
pub struct FilterIterator<I: Iterator, P> {
    source: I,
    predicate: P,
    buffered: Option<I::Item>,
}

impl<I, P> FilterIterator<I, P>
where
    I: Iterator,
    P: Predicate<I::Item>,
{
    pub fn new(source: I, predicate: P) -> Self {
        Self {
            source,
            predicate,
            buffered: None,
        }
    }

    /// Whether another matching item exists, pulling from the source if needed
    pub fn has_next(&mut self) -> bool {
        if self.buffered.is_none() {
            let predicate = &self.predicate;
            self.buffered = self.source.find(|item| predicate.evaluate(item));
        }
        self.buffered.is_some()
    }

    /// The wrapped iterator
    pub fn into_inner(self) -> I {
        self.source
    }
}

impl<I, P> Iterator for FilterIterator<I, P>
where
    I: Iterator,
    P: Predicate<I::Item>,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            self.buffered.take()
        } else {
            None
        }
    }
}

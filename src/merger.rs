//! Binary heap k-way merger.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::error::Error;

/// One heap entry. The comparator is carried per entry so the standard library heap
/// can order entries without a `T: Ord` bound.
struct HeapEntry<T, F> {
    item: T,
    source: usize,
    compare: F,
}

impl<T, F> PartialEq for HeapEntry<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T, F> Eq for HeapEntry<T, F> where F: Fn(&T, &T) -> Ordering {}

impl<T, F> PartialOrd for HeapEntry<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, F> Ord for HeapEntry<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    // the binary heap is a max-heap, so the ordering is reversed to pop the least
    // item first; ties go to the lowest source index, keeping the merge stable
    fn cmp(&self, other: &Self) -> Ordering {
        (self.compare)(&self.item, &other.item)
            .then(self.source.cmp(&other.source))
            .reverse()
    }
}

/// Binary heap merger implementation.
/// Merges multiple ordered inputs into a single ordered output under a caller-supplied
/// total order. Time complexity is *m* \* log(*n*) in worst case where *m* is the
/// number of items, *n* is the number of inputs.
pub struct RecordMerger<T, E, F, C>
where
    E: Error,
    F: Fn(&T, &T) -> Ordering + Copy,
    C: IntoIterator<Item = Result<T, E>>,
{
    items: BinaryHeap<HeapEntry<T, F>>,
    sources: Vec<C::IntoIter>,
    compare: F,
    initiated: bool,
}

impl<T, E, F, C> RecordMerger<T, E, F, C>
where
    E: Error,
    F: Fn(&T, &T) -> Ordering + Copy,
    C: IntoIterator<Item = Result<T, E>>,
{
    /// Creates an instance of a merger using `sources` as inputs.
    /// Each source's items must be ordered ascending under `compare`, otherwise the
    /// result is undefined.
    pub fn new<I>(sources: I, compare: F) -> Self
    where
        I: IntoIterator<Item = C>,
    {
        let sources = Vec::from_iter(sources.into_iter().map(|s| s.into_iter()));
        let items = BinaryHeap::with_capacity(sources.len());

        RecordMerger {
            sources,
            items,
            compare,
            initiated: false,
        }
    }

    fn refill(&mut self, source: usize) -> Result<(), E> {
        if let Some(item) = self.sources[source].next() {
            let item = item?;
            self.items.push(HeapEntry {
                item,
                source,
                compare: self.compare,
            });
        }
        Ok(())
    }
}

impl<T, E, F, C> Iterator for RecordMerger<T, E, F, C>
where
    E: Error,
    F: Fn(&T, &T) -> Ordering + Copy,
    C: IntoIterator<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    /// Returns the next item from the inputs in ascending order under the comparator.
    fn next(&mut self) -> Option<Self::Item> {
        if !self.initiated {
            self.initiated = true;
            for source in 0..self.sources.len() {
                if let Err(err) = self.refill(source) {
                    return Some(Err(err));
                }
            }
        }

        let entry = self.items.pop()?;
        if let Err(err) = self.refill(entry.source) {
            return Some(Err(err));
        }

        Some(Ok(entry.item))
    }
}

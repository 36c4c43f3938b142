//! Deferred tasks driven by an explicit clock.
//!
//! Nothing here sleeps. The host calls [`Scheduler::pop_due`] (through
//! `Board::tick`) with the current time and runs whatever has come due, in
//! due-time order with ties broken by scheduling order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Session generation. Bumped by every reset and every accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation after this one.
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// A task that has come due.
#[derive(Debug, Clone, PartialEq)]
pub struct DueTask<T> {
    /// When the task was scheduled to run.
    pub due: Instant,
    /// Generation the task belongs to; `None` for tasks that survive resets.
    pub generation: Option<Generation>,
    pub task: T,
}

#[derive(Debug)]
struct Entry<T> {
    due: Instant,
    seq: u64,
    generation: Option<Generation>,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the max-heap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Queue of deferred tasks.
#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run at `due`.
    pub fn schedule(&mut self, due: Instant, generation: Option<Generation>, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { due, seq, generation, task });
    }

    /// Remove the earliest task whose due time is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<DueTask<T>> {
        if self.heap.peek()?.due > now {
            return None;
        }
        self.heap.pop().map(|entry| DueTask {
            due: entry.due,
            generation: entry.generation,
            task: entry.task,
        })
    }

    /// Drop every task keyed to a generation other than `current`.
    /// Returns how many were dropped.
    pub fn cancel_stale(&mut self, current: Generation) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|entry| entry.generation.is_none_or(|generation| generation == current));
        before - self.heap.len()
    }

    /// Due time of the next task.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.due)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

//! Ordered event buffers with stable cursors under insertion and erasure.
//!
//! A buffer is a doubly-linked list of events over a [`SlotPool`]; a
//! [`Cursor`] names a slot and stays valid until that exact event is erased.
//! The RT flavor draws from a preallocated pool of [`MAX_EVENTS`] slots, the
//! general flavor grows on the heap. Both present the same interface, so
//! patches process either transparently.

use stagehand_midi::MidiEvent;

use crate::config::MAX_EVENTS;
use crate::pool::SlotPool;

const NIL: usize = usize::MAX;

/// A stable position in an [`EventBuffer`].
///
/// The one-past-the-end position is a cursor like any other; it compares
/// equal to [`EventBuffer::end`] and must not be dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(usize);

struct Node {
    ev: MidiEvent,
    prev: usize,
    next: usize,
}

/// An ordered sequence of events with O(1) insert/erase at any cursor.
pub struct EventBuffer {
    pool: SlotPool<Node>,
    head: usize,
    tail: usize,
    len: usize,
}

impl EventBuffer {
    /// The RT flavor: pool-backed, bounded at [`MAX_EVENTS`] before falling
    /// back to the heap.
    pub fn rt() -> Self {
        Self {
            pool: SlotPool::bounded(MAX_EVENTS),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    /// The general flavor: heap-backed, unbounded.
    pub fn general() -> Self {
        Self {
            pool: SlotPool::unbounded(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    #[inline]
    pub fn begin(&self) -> Cursor {
        Cursor(self.head)
    }

    #[inline]
    pub fn end(&self) -> Cursor {
        Cursor(NIL)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Cursor one step towards the end; `end` stays put.
    #[inline]
    pub fn next(&self, at: Cursor) -> Cursor {
        if at.0 == NIL {
            at
        } else {
            Cursor(self.pool.get(at.0).next)
        }
    }

    /// Cursor one step towards the beginning; stepping back from `end`
    /// yields the last event.
    #[inline]
    pub fn prev(&self, at: Cursor) -> Cursor {
        if at.0 == NIL {
            Cursor(self.tail)
        } else {
            Cursor(self.pool.get(at.0).prev)
        }
    }

    #[inline]
    pub fn get(&self, at: Cursor) -> &MidiEvent {
        &self.pool.get(at.0).ev
    }

    #[inline]
    pub fn get_mut(&mut self, at: Cursor) -> &mut MidiEvent {
        &mut self.pool.get_mut(at.0).ev
    }

    /// Insert `ev` before `before`, returning a cursor to the new event.
    pub fn insert(&mut self, before: Cursor, ev: MidiEvent) -> Cursor {
        let prev = if before.0 == NIL {
            self.tail
        } else {
            self.pool.get(before.0).prev
        };

        let index = self.pool.alloc(Node {
            ev,
            prev,
            next: before.0,
        });

        if prev == NIL {
            self.head = index;
        } else {
            self.pool.get_mut(prev).next = index;
        }
        if before.0 == NIL {
            self.tail = index;
        } else {
            self.pool.get_mut(before.0).prev = index;
        }

        self.len += 1;
        Cursor(index)
    }

    /// Append `ev`, returning its cursor.
    pub fn push_back(&mut self, ev: MidiEvent) -> Cursor {
        self.insert(self.end(), ev)
    }

    /// Remove the event at `at`, returning the cursor to the following
    /// event. Only cursors to the erased event are invalidated.
    pub fn erase(&mut self, at: Cursor) -> Cursor {
        let node = self.pool.free(at.0);

        if node.prev == NIL {
            self.head = node.next;
        } else {
            self.pool.get_mut(node.prev).next = node.next;
        }
        if node.next == NIL {
            self.tail = node.prev;
        } else {
            self.pool.get_mut(node.next).prev = node.prev;
        }

        self.len -= 1;
        Cursor(node.next)
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buffer: self,
            at: self.head,
        }
    }

    /// How often an allocation had to leave the pool (RT flavor only; the
    /// general flavor always allocates on the heap).
    pub fn fallback_count(&self) -> u64 {
        self.pool.fallback_count()
    }
}

pub struct Iter<'a> {
    buffer: &'a EventBuffer,
    at: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a MidiEvent;

    fn next(&mut self) -> Option<&'a MidiEvent> {
        if self.at == NIL {
            None
        } else {
            let node = self.buffer.pool.get(self.at);
            self.at = node.next;
            Some(&node.ev)
        }
    }
}

/// A half-open span `[begin, end)` of events in one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    begin: Cursor,
    end: Cursor,
}

impl EventRange {
    pub fn new(begin: Cursor, end: Cursor) -> Self {
        Self { begin, end }
    }

    /// An empty range positioned at `at`.
    pub fn empty_at(at: Cursor) -> Self {
        Self { begin: at, end: at }
    }

    /// The single-event range covering `at`.
    pub fn single(buffer: &EventBuffer, at: Cursor) -> Self {
        Self {
            begin: at,
            end: buffer.next(at),
        }
    }

    #[inline]
    pub fn begin(&self) -> Cursor {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> Cursor {
        self.end
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    #[inline]
    pub fn set_begin(&mut self, at: Cursor) {
        self.begin = at;
    }

    pub fn advance_begin(&mut self, buffer: &EventBuffer, n: usize) {
        for _ in 0..n {
            self.begin = buffer.next(self.begin);
        }
    }

    pub fn advance_end(&mut self, buffer: &EventBuffer, n: usize) {
        for _ in 0..n {
            self.end = buffer.next(self.end);
        }
    }

    /// Number of events in the range.
    pub fn count(&self, buffer: &EventBuffer) -> usize {
        let mut n = 0;
        let mut at = self.begin;
        while at != self.end {
            n += 1;
            at = buffer.next(at);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(buffer: &EventBuffer) -> Vec<i32> {
        buffer.iter().map(|ev| ev.note()).collect()
    }

    #[test]
    fn test_push_back_orders_events() {
        let mut buffer = EventBuffer::rt();
        for note in [60, 62, 64] {
            buffer.push_back(MidiEvent::noteon(0, 0, note, 100));
        }
        assert_eq!(events(&buffer), vec![60, 62, 64]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_insert_before_cursor() {
        let mut buffer = EventBuffer::rt();
        buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        let at = buffer.push_back(MidiEvent::noteon(0, 0, 64, 100));
        let inserted = buffer.insert(at, MidiEvent::noteon(0, 0, 62, 100));
        assert_eq!(events(&buffer), vec![60, 62, 64]);
        assert_eq!(buffer.get(inserted).note(), 62);
    }

    #[test]
    fn test_erase_returns_following_cursor() {
        let mut buffer = EventBuffer::rt();
        buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        let mid = buffer.push_back(MidiEvent::noteon(0, 0, 62, 100));
        let last = buffer.push_back(MidiEvent::noteon(0, 0, 64, 100));

        let after = buffer.erase(mid);
        assert_eq!(after, last);
        assert_eq!(events(&buffer), vec![60, 64]);
    }

    #[test]
    fn test_cursors_stable_across_insert_and_erase() {
        let mut buffer = EventBuffer::rt();
        let a = buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        let b = buffer.push_back(MidiEvent::noteon(0, 0, 62, 100));
        let c = buffer.push_back(MidiEvent::noteon(0, 0, 64, 100));

        buffer.insert(b, MidiEvent::noteon(0, 0, 61, 100));
        buffer.erase(a);

        // b and c still point at their events
        assert_eq!(buffer.get(b).note(), 62);
        assert_eq!(buffer.get(c).note(), 64);
        assert_eq!(events(&buffer), vec![61, 62, 64]);
    }

    #[test]
    fn test_erase_last_updates_end_walk() {
        let mut buffer = EventBuffer::rt();
        let a = buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        let b = buffer.push_back(MidiEvent::noteon(0, 0, 62, 100));
        assert_eq!(buffer.erase(b), buffer.end());
        assert_eq!(buffer.next(a), buffer.end());
    }

    #[test]
    fn test_range_single_and_count() {
        let mut buffer = EventBuffer::rt();
        let a = buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        buffer.push_back(MidiEvent::noteon(0, 0, 62, 100));

        let single = EventRange::single(&buffer, a);
        assert_eq!(single.count(&buffer), 1);

        let all = EventRange::new(buffer.begin(), buffer.end());
        assert_eq!(all.count(&buffer), 2);

        let mut r = all;
        r.advance_begin(&buffer, 1);
        assert_eq!(r.count(&buffer), 1);
    }

    #[test]
    fn test_clear_resets_pool() {
        let mut buffer = EventBuffer::rt();
        for _ in 0..10 {
            buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        }
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.begin(), buffer.end());
    }

    #[test]
    fn test_rt_buffer_overflow_falls_back() {
        let mut buffer = EventBuffer::rt();
        for _ in 0..MAX_EVENTS + 3 {
            buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        }
        assert_eq!(buffer.len(), MAX_EVENTS + 3);
        assert_eq!(buffer.fallback_count(), 3);
    }

    #[test]
    fn test_general_buffer_same_interface() {
        let mut buffer = EventBuffer::general();
        let a = buffer.push_back(MidiEvent::noteon(0, 0, 60, 100));
        buffer.push_back(MidiEvent::noteon(0, 0, 62, 100));
        buffer.erase(a);
        assert_eq!(events(&buffer), vec![62]);
    }
}

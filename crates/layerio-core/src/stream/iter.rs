//! Borrowing iterators over a [`Stream`].
//!
//! Each yields `Result` items and stops at end of stream. After an error
//! the iterator is fused.

use crate::chars::LineOptions;
use crate::error::Result;
use crate::transport::Transport;

use super::Stream;

/// Lines, as returned by [`Stream::gets`].
pub struct Lines<'a, T: Transport> {
    stream: &'a mut Stream<T>,
    opts: LineOptions,
    done: bool,
}

impl<'a, T: Transport> Lines<'a, T> {
    pub(super) fn new(stream: &'a mut Stream<T>, opts: LineOptions) -> Self {
        Self {
            stream,
            opts,
            done: false,
        }
    }
}

impl<T: Transport> Iterator for Lines<'_, T> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.stream.gets(&self.opts).transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

/// Characters in the caller encoding.
pub struct Chars<'a, T: Transport> {
    stream: &'a mut Stream<T>,
    done: bool,
}

impl<'a, T: Transport> Chars<'a, T> {
    pub(super) fn new(stream: &'a mut Stream<T>) -> Self {
        Self {
            stream,
            done: false,
        }
    }
}

impl<T: Transport> Iterator for Chars<'_, T> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.stream.getc().transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

/// Raw bytes.
pub struct Bytes<'a, T: Transport> {
    stream: &'a mut Stream<T>,
    done: bool,
}

impl<'a, T: Transport> Bytes<'a, T> {
    pub(super) fn new(stream: &'a mut Stream<T>) -> Self {
        Self {
            stream,
            done: false,
        }
    }
}

impl<T: Transport> Iterator for Bytes<'_, T> {
    type Item = Result<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.stream.getbyte().transpose();
        self.done = !matches!(item, Some(Ok(_)));
        item
    }
}

use crate::buffer::ByteLayer;
use crate::chars::{CharLayer, Source};
use crate::encoding::Transcoder;
use crate::error::Result;
use crate::retry::{Policy, RetryLayer};
use crate::transport::{Io, Transport};

/// Character-granularity view of a pipeline's read side.
///
/// Without a converter it serves the byte buffer directly; with one it
/// serves the decode queue, refilling and converting as needed.
pub(crate) struct ReadCursor<'a, T: Transport + ?Sized> {
    pub(super) io: RetryLayer<'a, T>,
    pub(super) bytes: &'a mut ByteLayer,
    pub(super) chars: &'a mut CharLayer,
    pub(super) conv: Option<Transcoder>,
    pub(super) policy: Policy,
}

impl<T: Transport + ?Sized> Source for ReadCursor<'_, T> {
    fn fill_buf(&mut self) -> Result<Io<&[u8]>> {
        let Some(conv) = self.conv else {
            if self.bytes.is_read_empty() {
                match self.bytes.fill(&mut self.io, self.policy)? {
                    Io::Ready(_) => {}
                    Io::WouldBlock => return Ok(Io::WouldBlock),
                    Io::Eof => return Ok(Io::Eof),
                }
            }
            return Ok(Io::Ready(self.bytes.buffered()));
        };
        while self.chars.pending().is_empty() {
            if self.bytes.is_read_empty() {
                match self.bytes.fill(&mut self.io, self.policy)? {
                    Io::Ready(_) => {}
                    Io::WouldBlock => return Ok(Io::WouldBlock),
                    Io::Eof => {
                        self.chars.finish(&conv);
                        if self.chars.pending().is_empty() {
                            return Ok(Io::Eof);
                        }
                        continue;
                    }
                }
            }
            let n = self.bytes.buffered().len();
            self.chars.decode(&conv, self.bytes.buffered());
            self.bytes.consume(n);
        }
        Ok(Io::Ready(self.chars.pending()))
    }

    fn consume(&mut self, n: usize) {
        match self.conv {
            Some(_) => self.chars.consume(n),
            None => self.bytes.consume(n),
        }
    }

    fn unread(&mut self, bytes: &[u8]) -> Result<()> {
        match self.conv {
            Some(_) => {
                self.chars.unread(bytes);
                Ok(())
            }
            None => self.bytes.unread(bytes),
        }
    }
}

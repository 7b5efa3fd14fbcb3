//! The durable side of the mapping store.

use super::{Record, factory_image};
use crate::BUTTON_COUNT;

/// A durable medium holding one [`Record`] per button.
///
/// Every operation is non-blocking in the style of `embedded-hal`'s serial traits: a medium that needs more time
/// returns [`nb::Error::WouldBlock`] and is polled again on a later tick. The store guarantees that at most one
/// read or one commit is in flight at a time.
pub trait Medium {
    /// Medium-specific failure.
    type Error: core::fmt::Debug;

    /// Reads the record at `index`. The store calls this repeatedly for the same index until it completes.
    fn read(&mut self, index: usize) -> nb::Result<Record, Self::Error>;

    /// Begins committing `record` at `index`. Returns [`nb::Error::WouldBlock`] if a previous commit is still
    /// underway.
    fn write(&mut self, index: usize, record: Record) -> nb::Result<(), Self::Error>;

    /// Completes once the last commit is durable. This is the acknowledgement of a [`write`][Self::write].
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

/// Failures of a [`MemoryMedium`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryError {
    /// The index does not name a record.
    OutOfRange(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Countdown<T> {
    index: usize,
    payload: T,
    remaining: u32,
}

/// A [`Medium`] kept in RAM, with latency measured in polls.
///
/// Useful for tests and simulation, and as a reference for what the store expects of real storage: reads that
/// take a while to come back and commits that are acknowledged some time after they're issued.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MemoryMedium<const N: usize = BUTTON_COUNT> {
    records: [Record; N],
    read_latency: u32,
    write_latency: u32,
    reading: Option<Countdown<()>>,
    writing: Option<Countdown<Record>>,
    commits: u32,
}

impl<const N: usize> MemoryMedium<N> {
    /// Constructs a [`MemoryMedium`] holding `records`, answering every request immediately.
    pub fn new(records: [Record; N]) -> Self {
        Self {
            records,
            read_latency: 0,
            write_latency: 0,
            reading: None,
            writing: None,
            commits: 0,
        }
    }

    /// A medium fresh from the factory, seeded with [`factory_image`].
    pub fn provisioned() -> Self {
        Self::new(factory_image())
    }

    /// A medium that has been erased and never written.
    pub fn blank() -> Self {
        Self::new([[0xFF; super::RECORD_LEN]; N])
    }

    /// Sets how many polls a read and a commit take to complete.
    pub fn with_latency(mut self, read_latency: u32, write_latency: u32) -> Self {
        self.read_latency = read_latency;
        self.write_latency = write_latency;
        self
    }

    /// The durable contents, i.e., only what has been committed.
    pub fn records(&self) -> &[Record; N] {
        &self.records
    }

    /// Number of commits completed so far.
    pub fn commits(&self) -> u32 {
        self.commits
    }

    fn check(index: usize) -> Result<(), MemoryError> {
        if index < N {
            Ok(())
        } else {
            Err(MemoryError::OutOfRange(index))
        }
    }
}

impl<const N: usize> Medium for MemoryMedium<N> {
    type Error = MemoryError;

    fn read(&mut self, index: usize) -> nb::Result<Record, Self::Error> {
        Self::check(index)?;

        let mut reading = match self.reading {
            Some(reading) if reading.index == index => reading,
            _ => Countdown {
                index,
                payload: (),
                remaining: self.read_latency,
            },
        };

        if reading.remaining > 0 {
            reading.remaining -= 1;
            self.reading = Some(reading);
            return Err(nb::Error::WouldBlock);
        }

        self.reading = None;
        Ok(self.records[index])
    }

    fn write(&mut self, index: usize, record: Record) -> nb::Result<(), Self::Error> {
        Self::check(index)?;
        if self.writing.is_some() {
            return Err(nb::Error::WouldBlock);
        }

        self.writing = Some(Countdown {
            index,
            payload: record,
            remaining: self.write_latency,
        });
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let Some(writing) = &mut self.writing else {
            return Ok(());
        };

        if writing.remaining > 0 {
            writing.remaining -= 1;
            return Err(nb::Error::WouldBlock);
        }

        self.records[writing.index] = writing.payload;
        self.writing = None;
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_latency() {
        let mut medium = MemoryMedium::<4>::provisioned().with_latency(2, 0);
        assert_eq!(Err(nb::Error::WouldBlock), medium.read(1));
        assert_eq!(Err(nb::Error::WouldBlock), medium.read(1));
        assert_eq!(Ok([0xB0, 0x2F, 0x7F, 0x1E]), medium.read(1));
    }

    #[test]
    fn commit_is_durable_only_after_flush() {
        let mut medium = MemoryMedium::<4>::blank().with_latency(0, 1);
        medium.write(0, [0x90, 0x40, 0x7F, 30]).unwrap();
        assert_eq!(
            Err(nb::Error::WouldBlock),
            medium.write(1, [0x90, 0x41, 0x7F, 30]),
            "A second commit must wait for the first"
        );
        assert_eq!(Err(nb::Error::WouldBlock), medium.flush());
        assert_eq!([0xFF; 4], medium.records()[0]);
        assert_eq!(Ok(()), medium.flush());
        assert_eq!([0x90, 0x40, 0x7F, 30], medium.records()[0]);
        assert_eq!(1, medium.commits());
    }

    #[test]
    fn out_of_range() {
        let mut medium = MemoryMedium::<4>::blank();
        assert_eq!(
            Err(nb::Error::Other(MemoryError::OutOfRange(4))),
            medium.read(4)
        );
    }
}

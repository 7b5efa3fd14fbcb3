//! Provides [`MappingStore`], the table of what each button plays, kept in working memory and mirrored to a
//! durable [`Medium`].
//!
//! The store owns two processes which advance one step per tick:
//! - **Boot load** copies every record from the medium into working memory, one slot at a time. A slot can be
//!   neither read nor written until it has loaded.
//! - **Commit** pushes writes back out to the medium, strictly one at a time and in the order they were made.
//!   Commits only begin once boot load has finished, so the medium never sees a read and a write interleaved.

mod journal;
pub use journal::*;

mod medium;
pub use medium::*;

mod slot;
pub use slot::*;

use crate::{BUTTON_COUNT, event::Event};
use tinyvec::ArrayVec;

/// Writes which can be waiting on the medium at once. Learning happens at the speed of a performer's feet, so
/// this is generous.
const COMMIT_QUEUE_LEN: usize = 8;

/// Failures of [`MappingStore::write`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// The slot has not been loaded from the medium yet.
    NotLoaded(usize),
    /// Too many commits are outstanding, and none of them can absorb this write.
    QueueFull,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PendingCommit {
    index: usize,
    record: Record,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Boot {
    /// Waiting on the medium for the slot at this index.
    Loading(usize),
    Complete,
}

/// Durable, indexable table of [`MappingSlot`]s.
#[derive(Debug)]
pub struct MappingStore<M, const N: usize = BUTTON_COUNT> {
    medium: M,
    /// Working memory; `None` until the slot has loaded.
    slots: [Option<MappingSlot>; N],
    boot: Boot,
    commits: ArrayVec<[PendingCommit; COMMIT_QUEUE_LEN]>,
    /// Whether the front of `commits` has been handed to the medium.
    in_flight: bool,
}

impl<M: Medium, const N: usize> MappingStore<M, N> {
    /// Constructs a [`MappingStore`]. Nothing is loaded until [`tick`][Self::tick] is called.
    pub fn new(medium: M) -> Self {
        Self {
            medium,
            slots: [None; N],
            boot: if N == 0 {
                Boot::Complete
            } else {
                Boot::Loading(0)
            },
            commits: ArrayVec::new(),
            in_flight: false,
        }
    }

    /// Advances boot load or, once that's finished, the commit at the front of the queue.
    pub fn tick(&mut self) -> Event {
        match self.boot {
            Boot::Loading(index) => self.load(index),
            Boot::Complete => self.commit(),
        }
    }

    fn load(&mut self, index: usize) -> Event {
        let factory_default = MappingSlot::factory_default(index);
        let slot = match self.medium.read(index) {
            Err(nb::Error::WouldBlock) => return Event::none(),
            Ok(record) => match MappingSlot::from_record(record) {
                Ok(slot) => slot,
                Err(RecordError::Erased) => {
                    info!("Slot {} has never been written, using factory default", index);
                    factory_default
                }
                Err(e) => {
                    warn!("Slot {} holds an invalid record ({}), using factory default", index, e);
                    factory_default
                }
            },
            Err(nb::Error::Other(_)) => {
                error!("Failed to read slot {}, using factory default", index);
                factory_default
            }
        };

        debug!("Loaded slot {}: {}", index, slot);
        self.slots[index] = Some(slot);

        if index + 1 < N {
            self.boot = Boot::Loading(index + 1);
            Event::SlotLoaded
        } else {
            info!("Boot load complete, {} slots ready", N);
            self.boot = Boot::Complete;
            Event::SlotLoaded | Event::BootLoadComplete
        }
    }

    fn commit(&mut self) -> Event {
        let Some(&pending) = self.commits.first() else {
            return Event::none();
        };

        if !self.in_flight {
            match self.medium.write(pending.index, pending.record) {
                Ok(()) => self.in_flight = true,
                Err(nb::Error::WouldBlock) => return Event::none(),
                Err(nb::Error::Other(_)) => {
                    error!("Failed to begin commit of slot {}, will retry", pending.index);
                    return Event::none();
                }
            }
        }

        match self.medium.flush() {
            Ok(()) => {
                self.commits.remove(0);
                self.in_flight = false;
                debug!("Slot {} committed", pending.index);
                Event::CommitAcknowledged
            }
            Err(nb::Error::WouldBlock) => Event::none(),
            Err(nb::Error::Other(_)) => {
                error!("Commit of slot {} failed, will retry", pending.index);
                self.in_flight = false;
                Event::none()
            }
        }
    }

    /// Returns the working copy of the slot at `index`, or `None` if it hasn't loaded yet.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range; button indices are validated before they reach the store.
    pub fn read(&self, index: usize) -> Option<MappingSlot> {
        self.slots[index]
    }

    /// Replaces the slot at `index` in working memory and queues a commit to the medium.
    ///
    /// A write to a slot whose previous commit hasn't been acknowledged yet simply queues behind it. When the
    /// queue is full, the write is folded into the most recent queued commit for the same slot (if one has not
    /// been handed to the medium yet); the medium ends up with the same final contents either way.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn write(&mut self, index: usize, slot: MappingSlot) -> Result<(), StoreError> {
        if self.slots[index].is_none() {
            return Err(StoreError::NotLoaded(index));
        }

        let pending = PendingCommit {
            index,
            record: slot.to_record(),
        };
        if let Some(rejected) = self.commits.try_push(pending) {
            let skip = usize::from(self.in_flight);
            match self
                .commits
                .iter_mut()
                .skip(skip)
                .rev()
                .find(|queued| queued.index == index)
            {
                Some(queued) => queued.record = rejected.record,
                None => return Err(StoreError::QueueFull),
            }
        }

        self.slots[index] = Some(slot);
        Ok(())
    }

    /// Returns `true` once the slot at `index` may be read and written.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn is_loaded(&self, index: usize) -> bool {
        self.slots[index].is_some()
    }

    /// Returns `true` once every slot has loaded.
    pub fn is_boot_complete(&self) -> bool {
        self.boot == Boot::Complete
    }

    /// Returns `true` while any write has yet to be acknowledged by the medium.
    pub fn is_committing(&self) -> bool {
        !self.commits.is_empty()
    }

    /// Getter.
    pub fn medium(&self) -> &M {
        &self.medium
    }
}

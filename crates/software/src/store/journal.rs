//! Provides [`Journal`], a layout for keeping [`Record`]s on flash, where bytes can be programmed one entry at a
//! time but only cleared a whole sector at a time.
//!
//! The journal alternates between two sectors. The active sector opens with a header carrying a generation
//! number, and every commit appends one entry after it; a later entry for a slot overrides an earlier one. When
//! the active sector fills up, the live records are compacted into the other sector under the next generation.
//! A sector is erased once per sector's worth of commits, not once per commit.

use super::{RECORD_LEN, Record};
use core::iter;

const HEADER_MARK: u8 = 0xA5;
const RECORD_MARK: u8 = 0x5A;
const ERASED: u8 = 0xFF;

/// Length of an entry before padding to the medium's programming granularity: a mark byte, the slot index (or
/// the generation, for a header), then the record.
pub const JOURNAL_ENTRY_LEN: usize = 2 + RECORD_LEN;

/// One programmable unit of a journal sector.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JournalEntry {
    /// Opens a sector.
    Header {
        /// Incremented, wrapping, on every compaction.
        generation: u8,
    },
    /// A committed record.
    Record {
        /// Index of the slot.
        index: u8,
        /// The slot's new contents.
        record: Record,
    },
}

impl JournalEntry {
    /// Writes the entry into `out`, padding with erased bytes.
    ///
    /// # Panics
    /// Panics if `out` is shorter than [`JOURNAL_ENTRY_LEN`].
    pub fn encode(&self, out: &mut [u8]) {
        out.fill(ERASED);
        match *self {
            Self::Header { generation } => {
                out[0] = HEADER_MARK;
                out[1] = generation;
            }
            Self::Record { index, record } => {
                out[0] = RECORD_MARK;
                out[1] = index;
                out[2..JOURNAL_ENTRY_LEN].copy_from_slice(&record);
            }
        }
    }

    /// Reads an entry back. Returns `None` for erased space and anything else that isn't an entry.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes.first()? {
            HEADER_MARK => Some(Self::Header {
                generation: *bytes.get(1)?,
            }),
            RECORD_MARK => Some(Self::Record {
                index: *bytes.get(1)?,
                record: bytes.get(2..JOURNAL_ENTRY_LEN)?.try_into().ok()?,
            }),
            _ => None,
        }
    }
}

/// Which of two sectors holds the newer journal, given the generation in each sector's header (if it has one).
pub fn newest_sector(generations: [Option<u8>; 2]) -> Option<usize> {
    match generations {
        [None, None] => None,
        [Some(_), None] => Some(0),
        [None, Some(_)] => Some(1),
        // generations wrap, so whichever is a short step ahead of the other is newer
        [Some(a), Some(b)] => Some(if (b.wrapping_sub(a) as i8) > 0 { 1 } else { 0 }),
    }
}

/// RAM image of a journal sector: the latest record for every slot, and where the next entry goes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Journal<const N: usize> {
    records: [Record; N],
    generation: u8,
    /// Entries in the sector so far, header included.
    entries: usize,
    capacity: usize,
}

impl<const N: usize> Journal<N> {
    /// A journal holding only its header, as found in a freshly erased sector which fits `capacity` entries.
    ///
    /// # Panics
    /// Panics if `capacity` can't hold a header, a record for every slot, and one more entry.
    pub fn new(generation: u8, capacity: usize) -> Self {
        assert!(capacity > N + 1, "A journal sector must outlast a compaction");
        Self {
            records: [[ERASED; RECORD_LEN]; N],
            generation,
            entries: 1,
            capacity,
        }
    }

    /// Folds the entry at the next position into the image. Returns `false` once the sector's entries have run
    /// out, after which nothing more should be replayed.
    pub fn replay(&mut self, bytes: &[u8]) -> bool {
        if self.entries == self.capacity {
            return false;
        }
        match JournalEntry::decode(bytes) {
            Some(JournalEntry::Record { index, record }) => {
                if let Some(slot) = self.records.get_mut(usize::from(index)) {
                    *slot = record;
                }
                self.entries += 1;
                true
            }
            _ => false,
        }
    }

    /// Updates a slot and returns the entry to program, along with its position in the sector. Returns `None`
    /// when the sector is full, in which case the update is only kept in the image until
    /// [`compacted`][Self::compacted] carries it over.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn append(&mut self, index: usize, record: Record) -> Option<(usize, JournalEntry)> {
        self.records[index] = record;
        if self.entries == self.capacity {
            return None;
        }
        let position = self.entries;
        self.entries += 1;
        Some((
            position,
            JournalEntry::Record {
                index: index as u8,
                record,
            },
        ))
    }

    /// The same records under the next generation, laid out from the start of an empty sector.
    pub fn compacted(&self) -> Self {
        let mut next = Self::new(self.generation.wrapping_add(1), self.capacity);
        next.records = self.records;
        next.entries += self.live().count();
        next
    }

    /// Every entry needed to rebuild this journal in an empty sector, in position order.
    pub fn entries(&self) -> impl Iterator<Item = JournalEntry> + '_ {
        iter::once(JournalEntry::Header {
            generation: self.generation,
        })
        .chain(self.live().map(|(index, &record)| JournalEntry::Record {
            index: index as u8,
            record,
        }))
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| **record != [ERASED; RECORD_LEN])
    }

    /// The latest record for a slot; erased if the slot was never written.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    pub fn record(&self, index: usize) -> Record {
        self.records[index]
    }

    /// Getter.
    pub fn generation(&self) -> u8 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: usize = 8;

    fn encoded(entry: JournalEntry) -> [u8; 8] {
        let mut bytes = [0; 8];
        entry.encode(&mut bytes);
        bytes
    }

    /// Writes `journal` into an empty sector the way the firmware does after compacting.
    fn sector(journal: &Journal<4>) -> [[u8; 8]; CAPACITY] {
        let mut sector = [[ERASED; 8]; CAPACITY];
        for (bytes, entry) in sector.iter_mut().zip(journal.entries()) {
            entry.encode(bytes);
        }
        sector
    }

    #[test]
    fn entry_layout() {
        assert_eq!(
            [0x5A, 2, 0x90, 0x3C, 0x64, 30, 0xFF, 0xFF],
            encoded(JournalEntry::Record {
                index: 2,
                record: [0x90, 0x3C, 0x64, 30]
            }),
            "Expected left but got right"
        );
        assert_eq!(
            Some(JournalEntry::Header { generation: 7 }),
            JournalEntry::decode(&encoded(JournalEntry::Header { generation: 7 }))
        );
        assert_eq!(None, JournalEntry::decode(&[ERASED; 8]));
    }

    #[test]
    fn newest_sector_wraps() {
        assert_eq!(None, newest_sector([None, None]));
        assert_eq!(Some(1), newest_sector([None, Some(3)]));
        assert_eq!(Some(1), newest_sector([Some(3), Some(4)]));
        assert_eq!(Some(0), newest_sector([Some(4), Some(3)]));
        assert_eq!(
            Some(0),
            newest_sector([Some(0), Some(255)]),
            "Generation 0 follows 255"
        );
    }

    #[test]
    fn later_entries_override_earlier() {
        let mut journal = Journal::<4>::new(0, CAPACITY);
        let entries = [
            JournalEntry::Record { index: 1, record: [0xC0, 0x05, 0x00, 30] },
            JournalEntry::Record { index: 1, record: [0xC0, 0x06, 0x00, 30] },
        ];
        for entry in entries {
            assert!(journal.replay(&encoded(entry)));
        }
        assert!(!journal.replay(&[ERASED; 8]), "Replay should stop at erased space");
        assert_eq!([0xC0, 0x06, 0x00, 30], journal.record(1));
        assert_eq!([ERASED; RECORD_LEN], journal.record(0));

        let (position, _) = journal.append(0, [0xB0, 0x10, 0x7F, 30]).unwrap();
        assert_eq!(3, position, "The next entry should follow the replayed ones");
    }

    #[test]
    fn commits_append_until_full() {
        let mut journal = Journal::<4>::new(0, CAPACITY);
        let record = [0x90, 0x3C, 0x64, 30];
        for position in 1..CAPACITY {
            assert_eq!(
                Some((position, JournalEntry::Record { index: 3, record })),
                journal.append(3, record),
                "Expected left but got right"
            );
        }
        assert_eq!(None, journal.append(2, record));
        assert_eq!(record, journal.record(2), "A write to a full sector should still reach the image");
    }

    #[test]
    fn compaction_erases_once_per_sector() {
        let mut journal = Journal::<4>::new(0, CAPACITY);
        let mut compactions = 0;
        for commit in 0..100u8 {
            let record = [0xB0, commit & 0x7F, 0x7F, 30];
            if journal.append(usize::from(commit % 2), record).is_none() {
                journal = journal.compacted();
                compactions += 1;
            }
        }
        // seven commits fill the first sector; two slots carry over each time, so every later sector takes five
        // and the sixth compacts again
        assert_eq!(16, compactions, "Expected left but got right");
        assert_eq!(16, journal.generation());
    }

    #[test]
    fn compacted_sector_replays_to_same_image() {
        let mut journal = Journal::<4>::new(254, CAPACITY);
        for _ in 1..CAPACITY {
            journal.append(0, [0xB0, 0x10, 0x7F, 30]);
        }
        assert_eq!(None, journal.append(3, [0xC0, 0x07, 0x00, 30]));
        let compacted = journal.compacted();
        assert_eq!(255, compacted.generation());

        let sector = sector(&compacted);
        let Some(JournalEntry::Header { generation }) = JournalEntry::decode(&sector[0]) else {
            panic!("A compacted sector should open with a header");
        };
        let mut replayed = Journal::<4>::new(generation, CAPACITY);
        for bytes in &sector[1..] {
            if !replayed.replay(bytes) {
                break;
            }
        }
        assert_eq!(compacted, replayed, "Expected left but got right");
        assert_eq!([0xC0, 0x07, 0x00, 30], replayed.record(3));
    }
}

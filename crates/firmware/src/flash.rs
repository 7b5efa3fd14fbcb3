//! Keeps the button mappings in a [`Journal`] spread over the first two sectors of flash bank 2.
//!
//! The chip runs in dual-bank mode and the firmware image lives wholly in bank 1, so programming or erasing bank 2
//! leaves instruction fetch free to continue. Programming still takes far longer than a main tick, though, so
//! flash is owned by its own low-priority task. The footswitch talks to it through [`FlashMedium`], which never
//! waits: requests and their results pass through channels, and anything not yet answered is reported as
//! [`nb::Error::WouldBlock`]. Commits append to the journal; a sector is only erased when the journal moves over.

use defmt::*;
use embassy_stm32::flash::{Blocking, Error, Flash, WRITE_SIZE};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use midi_footswitch_lib::{
    BUTTON_COUNT,
    store::{JOURNAL_ENTRY_LEN, Journal, JournalEntry, Medium, Record, newest_sector},
};

/// Offsets of sectors 12 and 13, the two 16 KiB sectors at the start of bank 2.
const SECTORS: [u32; 2] = [0x10_0000, 0x10_4000];
const SECTOR_LEN: u32 = 0x4000;

/// Bytes per journal entry, rounded up to the flash's programming granularity.
const ENTRY_LEN: usize = JOURNAL_ENTRY_LEN.div_ceil(WRITE_SIZE) * WRITE_SIZE;
const CAPACITY: usize = SECTOR_LEN as usize / ENTRY_LEN;

enum Request {
    Read(usize),
    Write(usize, Record),
}

static REQUESTS: Channel<CriticalSectionRawMutex, Request, 1> = Channel::new();
static READ_RESULTS: Channel<CriticalSectionRawMutex, Result<Record, Error>, 1> = Channel::new();
static WRITE_RESULTS: Channel<CriticalSectionRawMutex, Result<(), Error>, 1> = Channel::new();

#[derive(Clone, Copy, PartialEq)]
enum Pending {
    Read(usize),
    Write,
}

/// A [`Medium`] backed by [`flash_task`].
#[derive(Default)]
pub struct FlashMedium {
    pending: Option<Pending>,
}

impl FlashMedium {
    pub fn new() -> Self {
        Self { pending: None }
    }
}

impl Medium for FlashMedium {
    type Error = Error;

    fn read(&mut self, index: usize) -> nb::Result<Record, Self::Error> {
        match self.pending {
            None => {
                REQUESTS
                    .try_send(Request::Read(index))
                    .map_err(|_| nb::Error::WouldBlock)?;
                self.pending = Some(Pending::Read(index));
                Err(nb::Error::WouldBlock)
            }
            Some(Pending::Read(requested)) if requested == index => {
                let result = READ_RESULTS
                    .try_receive()
                    .map_err(|_| nb::Error::WouldBlock)?;
                self.pending = None;
                result.map_err(nb::Error::Other)
            }
            Some(_) => Err(nb::Error::WouldBlock),
        }
    }

    fn write(&mut self, index: usize, record: Record) -> nb::Result<(), Self::Error> {
        if self.pending.is_some() {
            return Err(nb::Error::WouldBlock);
        }
        REQUESTS
            .try_send(Request::Write(index, record))
            .map_err(|_| nb::Error::WouldBlock)?;
        self.pending = Some(Pending::Write);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        if self.pending != Some(Pending::Write) {
            return Ok(());
        }
        let result = WRITE_RESULTS
            .try_receive()
            .map_err(|_| nb::Error::WouldBlock)?;
        self.pending = None;
        result.map_err(nb::Error::Other)
    }
}

/// The journal in flash, and which sector it is in.
struct Store {
    flash: Flash<'static, Blocking>,
    journal: Journal<BUTTON_COUNT>,
    active: usize,
    /// Whether the active sector holds the journal's header. A blank device has none until its first commit.
    formatted: bool,
}

impl Store {
    fn read_entry(&mut self, sector: usize, position: usize) -> Result<[u8; ENTRY_LEN], Error> {
        let mut bytes = [0; ENTRY_LEN];
        self.flash
            .blocking_read(SECTORS[sector] + (position * ENTRY_LEN) as u32, &mut bytes)?;
        Ok(bytes)
    }

    fn write_entry(&mut self, sector: usize, position: usize, entry: JournalEntry) -> Result<(), Error> {
        let mut bytes = [0; ENTRY_LEN];
        entry.encode(&mut bytes);
        self.flash
            .blocking_write(SECTORS[sector] + (position * ENTRY_LEN) as u32, &bytes)
    }

    /// Finds the newest journal and replays it into RAM.
    fn open(flash: Flash<'static, Blocking>) -> Result<Self, Error> {
        let mut store = Self {
            flash,
            journal: Journal::new(0, CAPACITY),
            active: 1,
            formatted: false,
        };

        let mut generations = [None; 2];
        for (sector, generation) in generations.iter_mut().enumerate() {
            if let Some(JournalEntry::Header { generation: found }) =
                JournalEntry::decode(&store.read_entry(sector, 0)?)
            {
                *generation = Some(found);
            }
        }
        let Some(active) = newest_sector(generations) else {
            info!("No mappings in flash yet");
            return Ok(store);
        };

        store.active = active;
        store.formatted = true;
        store.journal = Journal::new(generations[active].unwrap_or_default(), CAPACITY);
        for position in 1..CAPACITY {
            let bytes = store.read_entry(active, position)?;
            if !store.journal.replay(&bytes) {
                break;
            }
        }
        info!(
            "Replayed mappings from sector {}, generation {}",
            active,
            store.journal.generation()
        );
        Ok(store)
    }

    fn commit(&mut self, index: usize, record: Record) -> Result<(), Error> {
        if self.formatted {
            if let Some((position, entry)) = self.journal.append(index, record) {
                return self.write_entry(self.active, position, entry);
            }
        } else {
            self.journal.append(index, record);
        }
        self.compact()
    }

    /// Rewrites the live records into the other sector and makes it the active one.
    fn compact(&mut self) -> Result<(), Error> {
        let target = 1 - self.active;
        let compacted = self.journal.compacted();
        debug!(
            "Moving mappings to sector {}, generation {}",
            target,
            compacted.generation()
        );

        let start = SECTORS[target];
        self.flash.blocking_erase(start, start + SECTOR_LEN)?;
        // the header goes in last, so a sector cut short never outranks the one it was copied from
        let mut entries = compacted.entries().enumerate();
        let header = entries.next();
        for (position, entry) in entries {
            self.write_entry(target, position, entry)?;
        }
        if let Some((position, entry)) = header {
            self.write_entry(target, position, entry)?;
        }

        self.journal = compacted;
        self.active = target;
        self.formatted = true;
        Ok(())
    }
}

/// Task which owns the flash peripheral and serves [`FlashMedium`]'s requests.
///
/// Reads are answered from the replayed journal. If the journal could not be read at startup, every read
/// reports the failure and the footswitch falls back to its factory mappings.
#[embassy_executor::task]
pub async fn flash_task(flash: Flash<'static, Blocking>) -> ! {
    let mut store = Store::open(flash);
    if let Err(e) = &store {
        error!("Failed to read mappings from flash: {}", e);
    }

    loop {
        match REQUESTS.receive().await {
            Request::Read(index) => {
                let result = match &store {
                    Ok(store) => Ok(store.journal.record(index)),
                    Err(e) => Err(*e),
                };
                READ_RESULTS.send(result).await;
            }
            Request::Write(index, record) => {
                let result = match &mut store {
                    Ok(store) => store.commit(index, record),
                    Err(e) => Err(*e),
                };
                match result {
                    Ok(()) => info!("Mapping for button {} written to flash", index),
                    Err(e) => warn!("Failed to write mapping for button {}: {}", index, e),
                }
                WRITE_RESULTS.send(result).await;
            }
        }
    }
}

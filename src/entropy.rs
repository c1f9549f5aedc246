use solana_program::{clock::Slot, hash::hashv, msg};

use crate::{config::DRAW_DOMAIN, error::RaffleError, state::EntropySeed};

/// What a seed must be bound to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedContext {
    pub raffle_id: u64,
    pub total_entries: u64,
    /// Entropy has to come from a slot strictly after this one
    pub closed_slot: Slot,
}

pub trait EntropyAdapter {
    /// Deterministic for a given context once the source event exists.
    fn seed_for(&self, context: &SeedContext) -> Result<EntropySeed, RaffleError>;
}

/// Bind an external random value to a raffle.
pub fn bind_seed(context: &SeedContext, source_slot: Slot, source: &[u8]) -> EntropySeed {
    let value = hashv(&[
        DRAW_DOMAIN,
        &context.raffle_id.to_le_bytes(),
        &context.total_entries.to_le_bytes(),
        &source_slot.to_le_bytes(),
        source,
    ]);
    EntropySeed {
        value: value.to_bytes(),
        raffle_id: context.raffle_id,
        total_entries: context.total_entries,
        source_slot,
    }
}

/// Entropy drawn from the raw `SlotHashes` sysvar data.
///
/// Uses the hash of the first slot recorded after the close slot.
/// Participants can only buy before close, so none of them can know it.
/// The sysvar only keeps the most recent records, so the first post-close
/// record is only provably the first while a record at or before the close
/// slot is still present. Past that point the draw fails with
/// `EntropyExpired` instead of falling back to a later hash.
pub struct SlotHashEntropy<'d> {
    data: &'d [u8],
}

impl<'d> SlotHashEntropy<'d> {
    /// Size of one `(slot, hash)` record
    const RECORD_LEN: usize = 8 + 32;
    /// The sysvar keeps at most this many records
    const MAX_RECORDS: usize = 512;

    pub fn new(data: &'d [u8]) -> Self {
        Self { data }
    }

    fn records(&self) -> impl Iterator<Item = (Slot, &'d [u8])> + 'd {
        let data = self.data;
        let declared = data
            .get(..8)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u64::from_le_bytes)
            .unwrap_or(0) as usize;
        let stored = data.len().saturating_sub(8) / Self::RECORD_LEN;
        let count = declared.min(stored).min(Self::MAX_RECORDS);

        data.get(8..)
            .unwrap_or(&[])
            .chunks_exact(Self::RECORD_LEN)
            .take(count)
            .map(|record| {
                let (slot, hash) = record.split_at(8);
                let mut slot_bytes = [0u8; 8];
                slot_bytes.copy_from_slice(slot);
                (Slot::from_le_bytes(slot_bytes), hash)
            })
    }
}

impl<'d> EntropyAdapter for SlotHashEntropy<'d> {
    fn seed_for(&self, context: &SeedContext) -> Result<EntropySeed, RaffleError> {
        let mut first_after: Option<(Slot, &[u8])> = None;
        let mut covers_close = false;
        for (slot, hash) in self.records() {
            if slot <= context.closed_slot {
                covers_close = true;
            } else if first_after.map_or(true, |(first, _)| slot < first) {
                first_after = Some((slot, hash));
            }
        }

        let (slot, hash) = first_after.ok_or_else(|| {
            msg!("No slot hash after slot {} recorded yet", context.closed_slot);
            RaffleError::EntropyUnavailable
        })?;
        if !covers_close {
            msg!(
                "Slot hashes no longer reach back to slot {}, oldest after it is {}",
                context.closed_slot,
                slot
            );
            return Err(RaffleError::EntropyExpired);
        }
        Ok(bind_seed(context, slot, hash))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::cell::Cell;

    /// Adapter returning a chosen seed value
    pub struct FixedEntropy {
        value: [u8; 32],
        rebind: Option<(u64, u64)>,
        calls: Cell<u32>,
    }

    impl FixedEntropy {
        pub fn new(value: [u8; 32]) -> Self {
            Self {
                value,
                rebind: None,
                calls: Cell::new(0),
            }
        }

        /// Seed whose 256-bit value equals `value`
        pub fn from_u64(value: u64) -> Self {
            let mut bytes = [0u8; 32];
            bytes[24..].copy_from_slice(&value.to_be_bytes());
            Self::new(bytes)
        }

        /// Report the seed as bound to another raffle and entry count
        pub fn bound_to(mut self, raffle_id: u64, total_entries: u64) -> Self {
            self.rebind = Some((raffle_id, total_entries));
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.get()
        }
    }

    impl EntropyAdapter for FixedEntropy {
        fn seed_for(&self, context: &SeedContext) -> Result<EntropySeed, RaffleError> {
            self.calls.set(self.calls.get() + 1);
            let (raffle_id, total_entries) = self
                .rebind
                .unwrap_or((context.raffle_id, context.total_entries));
            Ok(EntropySeed {
                value: self.value,
                raffle_id,
                total_entries,
                source_slot: context.closed_slot + 1,
            })
        }
    }
}

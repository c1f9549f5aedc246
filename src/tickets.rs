//! Append-only record of ticket purchases.
//!
//! Each purchase is stored as one contiguous range of entry indices, so
//! the ranges partition `[0, total_entries)` in purchase order and the
//! owner of any index is found by binary search.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::{
    error::RaffleError,
    ledger::Ledger,
    state::{RaffleAccount, RaffleState},
};

/// Tickets bought by one participant in one purchase
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Entry {
    pub participant: Pubkey,
    /// First owned entry index
    pub range_start: u64,
    /// One past the last owned entry index
    pub range_end: u64,
}

impl Entry {
    pub const LEN: usize = 32 + 8 + 8;

    pub fn count(&self) -> u64 {
        self.range_end - self.range_start
    }

    pub fn contains(&self, index: u64) -> bool {
        self.range_start <= index && index < self.range_end
    }
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct TicketLedger {
    pub is_initialized: bool,
    /// Raffle account this ledger belongs to
    pub raffle: Pubkey,
    /// Maximum number of purchases the account can hold
    pub capacity: u32,
    entries: Vec<Entry>,
}

impl TicketLedger {
    const HEADER_LEN: usize = 1 + 32 + 4 + 4;

    pub fn new(raffle: Pubkey, capacity: u32) -> Self {
        Self {
            is_initialized: true,
            raffle,
            capacity,
            entries: Vec::new(),
        }
    }

    /// Account size needed to hold `capacity` purchases
    pub fn space(capacity: u32) -> usize {
        Self::HEADER_LEN + capacity as usize * Entry::LEN
    }

    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let ledger = Self::deserialize(&mut &data[..]).map_err(|_| ProgramError::InvalidAccountData)?;
        if !ledger.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        if ledger.entries.len() > ledger.capacity as usize {
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(ledger)
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        if dst.len() < Self::space(self.capacity) {
            return Err(ProgramError::AccountDataTooSmall);
        }
        self.serialize(&mut &mut dst[..])
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity as usize
    }

    pub fn total_entries(&self) -> u64 {
        self.entries.last().map(|e| e.range_end).unwrap_or(0)
    }

    pub fn entries_of<'l>(&'l self, participant: &'l Pubkey) -> impl Iterator<Item = &'l Entry> + 'l {
        self.entries
            .iter()
            .filter(move |e| e.participant == *participant)
    }

    /// Tickets held by `participant` across all purchases
    pub fn tickets_of(&self, participant: &Pubkey) -> u64 {
        self.entries_of(participant).map(Entry::count).sum()
    }

    /// Buy `count` tickets for `participant` at cluster time `now`.
    ///
    /// Sales stop at the raffle's `sales_end`, if it has one. The payment moves from the participant into the raffle vault before
    /// the entry is appended. A failed payment leaves both the raffle and
    /// the ledger untouched.
    pub fn buy<L: Ledger + ?Sized>(
        &mut self,
        raffle: &mut RaffleAccount,
        participant: &Pubkey,
        count: u64,
        now: UnixTimestamp,
        ledger: &mut L,
    ) -> Result<Entry, RaffleError> {
        if raffle.state != RaffleState::Open {
            return Err(RaffleError::InvalidState);
        }
        if raffle.sales_end.map_or(false, |end| now >= end) {
            return Err(RaffleError::InvalidState);
        }
        if count == 0 {
            return Err(RaffleError::InvalidAmount);
        }

        let range_start = raffle.total_entries;
        let range_end = range_start.checked_add(count).ok_or(RaffleError::Overflow)?;
        if let Some(max) = raffle.max_entries {
            if range_end > max {
                return Err(RaffleError::SoldOut);
            }
        }
        if let Some(limit) = raffle.max_entries_per_participant {
            let held = self
                .tickets_of(participant)
                .checked_add(count)
                .ok_or(RaffleError::Overflow)?;
            if held > limit {
                return Err(RaffleError::ParticipantLimitReached);
            }
        }
        if self.is_full() {
            return Err(RaffleError::LedgerFull);
        }

        let price = count
            .checked_mul(raffle.ticket_price)
            .ok_or(RaffleError::Overflow)?;
        let escrow_balance = raffle
            .escrow_balance
            .checked_add(price)
            .ok_or(RaffleError::Overflow)?;

        ledger.transfer(participant, &raffle.vault, price)?;

        let entry = Entry {
            participant: *participant,
            range_start,
            range_end,
        };
        self.entries.push(entry);
        raffle.total_entries = range_end;
        raffle.escrow_balance = escrow_balance;

        msg!(
            "Entries {}..{} sold to {} for {} lamports",
            range_start,
            range_end,
            participant,
            price
        );
        Ok(entry)
    }

    /// Owner of entry `index`
    pub fn resolve(&self, index: u64) -> Result<Pubkey, RaffleError> {
        if index >= self.total_entries() {
            return Err(RaffleError::OutOfRange);
        }
        // ranges are sorted and contiguous, so the owner is the first
        // entry whose end lies past the index
        let position = self.entries.partition_point(|e| e.range_end <= index);
        self.entries
            .get(position)
            .filter(|e| e.contains(index))
            .map(|e| e.participant)
            .ok_or(RaffleError::OutOfRange)
    }
}

use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{clock::UnixTimestamp, pubkey::Pubkey};

use crate::error::RaffleError;

/// 10000 basis points = 100%
pub const BASIS_POINTS_DENOMINATOR: u64 = 10_000;

/// PDA seed prefix for raffle accounts
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// PDA seed prefix for ticket ledger accounts
pub const TICKETS_SEED: &[u8] = b"tickets";

/// Domain separator mixed into every draw seed
pub const DRAW_DOMAIN: &[u8] = b"fair-raffle:draw";

/// Upper bound on purchases a single ticket ledger can hold. Accounts
/// created through a CPI may hold at most 10 KiB of data, and
/// `41 + 212 * 48` is the largest ledger that fits.
pub const MAX_LEDGER_CAPACITY: u32 = 212;

/// Per-raffle configuration, fixed when the raffle is opened
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleConfig {
    /// Price per ticket in lamports
    pub ticket_price: u64,
    /// Protocol fee in basis points (e.g. 500 = 5%)
    pub fee_basis_points: u16,
    /// Account receiving the protocol fee at settlement
    pub fee_recipient: Pubkey,
    /// Optional cap on the total number of tickets sold
    pub max_entries: Option<u64>,
    /// Optional cap on tickets held by a single participant
    pub max_entries_per_participant: Option<u64>,
    /// Optional unix timestamp at which ticket sales stop
    pub sales_end: Option<UnixTimestamp>,
}

impl RaffleConfig {
    pub fn new(ticket_price: u64, fee_basis_points: u16, fee_recipient: Pubkey) -> Self {
        Self {
            ticket_price,
            fee_basis_points,
            fee_recipient,
            max_entries: None,
            max_entries_per_participant: None,
            sales_end: None,
        }
    }

    /// Check the configuration of a raffle opened at time `now`
    pub fn validate(&self, now: UnixTimestamp) -> Result<(), RaffleError> {
        if self.ticket_price == 0 {
            return Err(RaffleError::InvalidConfig);
        }
        if u64::from(self.fee_basis_points) > BASIS_POINTS_DENOMINATOR {
            return Err(RaffleError::InvalidConfig);
        }
        if self.max_entries == Some(0) || self.max_entries_per_participant == Some(0) {
            return Err(RaffleError::InvalidConfig);
        }
        if self.sales_end.map_or(false, |end| end <= now) {
            return Err(RaffleError::InvalidConfig);
        }
        Ok(())
    }
}

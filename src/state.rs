use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    clock::{Slot, UnixTimestamp},
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};
use std::convert::TryFrom;

use crate::ledger::LedgerRef;

/// Lifecycle state of a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaffleState {
    /// Tickets can be bought
    Open,
    /// Sales ended, waiting for the draw
    Closed,
    /// Winning entry selected, waiting for settlement
    Drawn,
    /// Escrow paid out to winner and fee recipient
    Settled,
    /// Escrow refunded to participants
    Cancelled,
}

impl RaffleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RaffleState::Settled | RaffleState::Cancelled)
    }
}

impl TryFrom<u8> for RaffleState {
    type Error = ProgramError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(RaffleState::Open),
            1 => Ok(RaffleState::Closed),
            2 => Ok(RaffleState::Drawn),
            3 => Ok(RaffleState::Settled),
            4 => Ok(RaffleState::Cancelled),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }
}

impl From<RaffleState> for u8 {
    fn from(state: RaffleState) -> Self {
        match state {
            RaffleState::Open => 0,
            RaffleState::Closed => 1,
            RaffleState::Drawn => 2,
            RaffleState::Settled => 3,
            RaffleState::Cancelled => 4,
        }
    }
}

/// Seed consumed by the draw, bound to the raffle it was produced for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntropySeed {
    /// 256-bit seed, read as a big-endian unsigned integer
    pub value: [u8; 32],
    /// Raffle the seed was derived for
    pub raffle_id: u64,
    /// Entry count the seed was derived for
    pub total_entries: u64,
    /// Slot whose hash the seed was derived from
    pub source_slot: Slot,
}

impl EntropySeed {
    const LEN: usize = 32 + 8 + 8 + 8;
}

/// Receipt of the one and only payout of a raffle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayoutRecord {
    pub winner: Pubkey,
    pub winner_amount: u64,
    pub fee_amount: u64,
    /// Reference returned by the ledger for the payout batch
    pub ledger_ref: LedgerRef,
}

impl PayoutRecord {
    const LEN: usize = 32 + 8 + 8 + 32;

    pub fn total(&self) -> u64 {
        self.winner_amount.saturating_add(self.fee_amount)
    }
}

/// Raffle account data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RaffleAccount {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Identifier chosen by the operator (used in PDA derivation)
    pub id: u64,
    /// Identity allowed to close and cancel the raffle
    pub operator: Pubkey,
    /// Receives the protocol fee at settlement
    pub fee_recipient: Pubkey,
    /// Account holding the escrowed lamports (the raffle PDA itself)
    pub vault: Pubkey,
    /// Ticket ledger account bound to this raffle
    pub ticket_ledger: Pubkey,
    /// Price per ticket in lamports
    pub ticket_price: u64,
    /// Fee in basis points (e.g. 500 = 5%)
    pub fee_basis_points: u16,
    /// Optional cap on total tickets
    pub max_entries: Option<u64>,
    /// Optional cap on tickets per participant
    pub max_entries_per_participant: Option<u64>,
    /// Optional unix timestamp at which ticket sales stop
    pub sales_end: Option<UnixTimestamp>,
    pub state: RaffleState,
    /// Tickets sold so far
    pub total_entries: u64,
    /// Lamports held for payout or refund
    pub escrow_balance: u64,
    /// Slot at which sales were closed
    pub closed_slot: Option<Slot>,
    pub winning_entry_index: Option<u64>,
    pub entropy: Option<EntropySeed>,
    pub payout: Option<PayoutRecord>,
}

impl RaffleAccount {
    pub fn state(&self) -> RaffleState {
        self.state
    }

    pub fn winning_entry_index(&self) -> Option<u64> {
        self.winning_entry_index
    }

    pub fn payout(&self) -> Option<&PayoutRecord> {
        self.payout.as_ref()
    }

    /// Escrow the raffle must hold while tickets are outstanding
    pub fn expected_escrow(&self) -> Option<u64> {
        self.total_entries.checked_mul(self.ticket_price)
    }
}

impl Sealed for RaffleAccount {}

impl IsInitialized for RaffleAccount {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

fn unpack_option_u64(src: &[u8; 9]) -> Result<Option<u64>, ProgramError> {
    let (flag, value) = array_refs![src, 1, 8];
    match flag[0] {
        0 => Ok(None),
        1 => Ok(Some(u64::from_le_bytes(*value))),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn pack_option_u64(value: Option<u64>, dst: &mut [u8; 9]) {
    let (flag_dst, value_dst) = mut_array_refs![dst, 1, 8];
    flag_dst[0] = value.is_some() as u8;
    *value_dst = value.unwrap_or_default().to_le_bytes();
}

fn unpack_option_i64(src: &[u8; 9]) -> Result<Option<i64>, ProgramError> {
    let (flag, value) = array_refs![src, 1, 8];
    match flag[0] {
        0 => Ok(None),
        1 => Ok(Some(i64::from_le_bytes(*value))),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn pack_option_i64(value: Option<i64>, dst: &mut [u8; 9]) {
    let (flag_dst, value_dst) = mut_array_refs![dst, 1, 8];
    flag_dst[0] = value.is_some() as u8;
    *value_dst = value.unwrap_or_default().to_le_bytes();
}

fn unpack_entropy(src: &[u8; 1 + EntropySeed::LEN]) -> Result<Option<EntropySeed>, ProgramError> {
    let (flag, value, raffle_id, total_entries, source_slot) = array_refs![src, 1, 32, 8, 8, 8];
    match flag[0] {
        0 => Ok(None),
        1 => Ok(Some(EntropySeed {
            value: *value,
            raffle_id: u64::from_le_bytes(*raffle_id),
            total_entries: u64::from_le_bytes(*total_entries),
            source_slot: Slot::from_le_bytes(*source_slot),
        })),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn pack_entropy(seed: Option<&EntropySeed>, dst: &mut [u8; 1 + EntropySeed::LEN]) {
    let (flag_dst, value_dst, raffle_id_dst, total_entries_dst, source_slot_dst) =
        mut_array_refs![dst, 1, 32, 8, 8, 8];
    match seed {
        Some(seed) => {
            flag_dst[0] = 1;
            *value_dst = seed.value;
            *raffle_id_dst = seed.raffle_id.to_le_bytes();
            *total_entries_dst = seed.total_entries.to_le_bytes();
            *source_slot_dst = seed.source_slot.to_le_bytes();
        }
        None => {
            flag_dst[0] = 0;
            *value_dst = [0; 32];
            *raffle_id_dst = [0; 8];
            *total_entries_dst = [0; 8];
            *source_slot_dst = [0; 8];
        }
    }
}

fn unpack_payout(src: &[u8; 1 + PayoutRecord::LEN]) -> Result<Option<PayoutRecord>, ProgramError> {
    let (flag, winner, winner_amount, fee_amount, ledger_ref) = array_refs![src, 1, 32, 8, 8, 32];
    match flag[0] {
        0 => Ok(None),
        1 => Ok(Some(PayoutRecord {
            winner: Pubkey::new_from_array(*winner),
            winner_amount: u64::from_le_bytes(*winner_amount),
            fee_amount: u64::from_le_bytes(*fee_amount),
            ledger_ref: LedgerRef(*ledger_ref),
        })),
        _ => Err(ProgramError::InvalidAccountData),
    }
}

fn pack_payout(record: Option<&PayoutRecord>, dst: &mut [u8; 1 + PayoutRecord::LEN]) {
    let (flag_dst, winner_dst, winner_amount_dst, fee_amount_dst, ledger_ref_dst) =
        mut_array_refs![dst, 1, 32, 8, 8, 32];
    match record {
        Some(record) => {
            flag_dst[0] = 1;
            winner_dst.copy_from_slice(record.winner.as_ref());
            *winner_amount_dst = record.winner_amount.to_le_bytes();
            *fee_amount_dst = record.fee_amount.to_le_bytes();
            *ledger_ref_dst = record.ledger_ref.0;
        }
        None => {
            flag_dst[0] = 0;
            *winner_dst = [0; 32];
            *winner_amount_dst = [0; 8];
            *fee_amount_dst = [0; 8];
            *ledger_ref_dst = [0; 32];
        }
    }
}

impl Pack for RaffleAccount {
    const LEN: usize = 1 + 8 + 32 + 32 + 32 + 32 + 8 + 2 + 9 + 9 + 9 + 1 + 8 + 8 + 9 + 9 + 57 + 81;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, RaffleAccount::LEN];
        let (
            is_initialized,
            id,
            operator,
            fee_recipient,
            vault,
            ticket_ledger,
            ticket_price,
            fee_basis_points,
            max_entries,
            max_entries_per_participant,
            sales_end,
            state,
            total_entries,
            escrow_balance,
            closed_slot,
            winning_entry_index,
            entropy,
            payout,
        ) = array_refs![src, 1, 8, 32, 32, 32, 32, 8, 2, 9, 9, 9, 1, 8, 8, 9, 9, 57, 81];

        let is_initialized = match is_initialized[0] {
            0 => false,
            1 => true,
            _ => return Err(ProgramError::InvalidAccountData),
        };

        Ok(RaffleAccount {
            is_initialized,
            id: u64::from_le_bytes(*id),
            operator: Pubkey::new_from_array(*operator),
            fee_recipient: Pubkey::new_from_array(*fee_recipient),
            vault: Pubkey::new_from_array(*vault),
            ticket_ledger: Pubkey::new_from_array(*ticket_ledger),
            ticket_price: u64::from_le_bytes(*ticket_price),
            fee_basis_points: u16::from_le_bytes(*fee_basis_points),
            max_entries: unpack_option_u64(max_entries)?,
            max_entries_per_participant: unpack_option_u64(max_entries_per_participant)?,
            sales_end: unpack_option_i64(sales_end)?,
            state: RaffleState::try_from(state[0])?,
            total_entries: u64::from_le_bytes(*total_entries),
            escrow_balance: u64::from_le_bytes(*escrow_balance),
            closed_slot: unpack_option_u64(closed_slot)?,
            winning_entry_index: unpack_option_u64(winning_entry_index)?,
            entropy: unpack_entropy(entropy)?,
            payout: unpack_payout(payout)?,
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, RaffleAccount::LEN];
        let (
            is_initialized_dst,
            id_dst,
            operator_dst,
            fee_recipient_dst,
            vault_dst,
            ticket_ledger_dst,
            ticket_price_dst,
            fee_basis_points_dst,
            max_entries_dst,
            max_entries_per_participant_dst,
            sales_end_dst,
            state_dst,
            total_entries_dst,
            escrow_balance_dst,
            closed_slot_dst,
            winning_entry_index_dst,
            entropy_dst,
            payout_dst,
        ) = mut_array_refs![dst, 1, 8, 32, 32, 32, 32, 8, 2, 9, 9, 9, 1, 8, 8, 9, 9, 57, 81];

        is_initialized_dst[0] = self.is_initialized as u8;
        *id_dst = self.id.to_le_bytes();
        operator_dst.copy_from_slice(self.operator.as_ref());
        fee_recipient_dst.copy_from_slice(self.fee_recipient.as_ref());
        vault_dst.copy_from_slice(self.vault.as_ref());
        ticket_ledger_dst.copy_from_slice(self.ticket_ledger.as_ref());
        *ticket_price_dst = self.ticket_price.to_le_bytes();
        *fee_basis_points_dst = self.fee_basis_points.to_le_bytes();
        pack_option_u64(self.max_entries, max_entries_dst);
        pack_option_u64(self.max_entries_per_participant, max_entries_per_participant_dst);
        pack_option_i64(self.sales_end, sales_end_dst);
        state_dst[0] = self.state.into();
        *total_entries_dst = self.total_entries.to_le_bytes();
        *escrow_balance_dst = self.escrow_balance.to_le_bytes();
        pack_option_u64(self.closed_slot, closed_slot_dst);
        pack_option_u64(self.winning_entry_index, winning_entry_index_dst);
        pack_entropy(self.entropy.as_ref(), entropy_dst);
        pack_payout(self.payout.as_ref(), payout_dst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RaffleAccount {
        RaffleAccount {
            is_initialized: true,
            id: 7,
            operator: Pubkey::new_unique(),
            fee_recipient: Pubkey::new_unique(),
            vault: Pubkey::new_unique(),
            ticket_ledger: Pubkey::new_unique(),
            ticket_price: 10,
            fee_basis_points: 500,
            max_entries: Some(100),
            max_entries_per_participant: None,
            sales_end: Some(1_700_000_600),
            state: RaffleState::Drawn,
            total_entries: 4,
            escrow_balance: 40,
            closed_slot: Some(1_234),
            winning_entry_index: Some(2),
            entropy: Some(EntropySeed {
                value: [9; 32],
                raffle_id: 7,
                total_entries: 4,
                source_slot: 1_235,
            }),
            payout: None,
        }
    }

    #[test]
    fn pack_preserves_every_field() {
        let raffle = sample();
        let mut data = vec![0u8; RaffleAccount::LEN];
        RaffleAccount::pack(raffle, &mut data).unwrap();
        assert_eq!(RaffleAccount::unpack(&data).unwrap(), raffle);
    }

    #[test]
    fn settled_raffle_keeps_payout_record() {
        let mut raffle = sample();
        raffle.state = RaffleState::Settled;
        raffle.escrow_balance = 0;
        raffle.payout = Some(PayoutRecord {
            winner: Pubkey::new_unique(),
            winner_amount: 38,
            fee_amount: 2,
            ledger_ref: LedgerRef([3; 32]),
        });

        let mut data = vec![0u8; RaffleAccount::LEN];
        RaffleAccount::pack(raffle, &mut data).unwrap();
        let unpacked = RaffleAccount::unpack(&data).unwrap();
        assert_eq!(unpacked.payout().map(PayoutRecord::total), Some(40));
    }

    #[test]
    fn unknown_state_byte_is_rejected() {
        let mut data = vec![0u8; RaffleAccount::LEN];
        RaffleAccount::pack(sample(), &mut data).unwrap();
        // state byte sits after the fixed config fields
        data[1 + 8 + 32 * 4 + 8 + 2 + 9 + 9 + 9] = 9;
        assert_eq!(
            RaffleAccount::unpack(&data),
            Err(ProgramError::InvalidAccountData)
        );
    }

    #[test]
    fn uninitialized_account_does_not_unpack() {
        let data = vec![0u8; RaffleAccount::LEN];
        assert_eq!(
            RaffleAccount::unpack(&data),
            Err(ProgramError::UninitializedAccount)
        );
        assert!(!RaffleAccount::unpack_unchecked(&data).unwrap().is_initialized);
    }
}

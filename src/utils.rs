use solana_program::pubkey::Pubkey;

use crate::config::{RAFFLE_SEED, TICKETS_SEED};

/// Find the program derived address of an operator's raffle
pub fn find_raffle_address(program_id: &Pubkey, operator: &Pubkey, raffle_id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(
        &[RAFFLE_SEED, operator.as_ref(), &raffle_id.to_le_bytes()],
        program_id,
    )
}

/// Find the program derived address of a raffle's ticket ledger
pub fn find_ticket_ledger_address(program_id: &Pubkey, raffle: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[TICKETS_SEED, raffle.as_ref()], program_id)
}

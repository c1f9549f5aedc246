// Fair Raffle
// Escrowed lamport raffles on Solana, drawn from post-close slot hashes

// Core modules
pub mod config;
pub mod entrypoint;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

// Raffle lifecycle
pub mod draw;
pub mod entropy;
pub mod ledger;
pub mod payout;
pub mod raffle;
pub mod tickets;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}

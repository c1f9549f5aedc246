use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
    sysvar::{clock, slot_hashes},
};

use crate::{
    config::RaffleConfig,
    utils::{find_raffle_address, find_ticket_ledger_address},
};

#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Open a new raffle and its ticket ledger
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The operator, pays for both accounts
    /// 1. `[writable]` The raffle account (PDA of operator and id)
    /// 2. `[writable]` The ticket ledger account (PDA of the raffle)
    /// 3. `[]` The system program
    OpenRaffle {
        /// Identifier, unique per operator
        id: u64,
        config: RaffleConfig,
        /// Number of purchases the ticket ledger can hold
        ledger_capacity: u32,
    },

    /// Buy tickets in an open raffle
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The participant paying for the tickets
    /// 1. `[writable]` The raffle account
    /// 2. `[writable]` The ticket ledger account
    /// 3. `[]` The system program
    BuyTickets {
        /// Number of tickets to purchase
        count: u64,
    },

    /// End ticket sales (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The operator
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The clock sysvar
    CloseRaffle {},

    /// Refund every participant and cancel the raffle (operator only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` The operator
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The ticket ledger account
    /// 3.. `[writable]` Every distinct participant
    CancelRaffle {},

    /// Select the winning entry of a closed raffle
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any user
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The slot hashes sysvar
    DrawWinner {},

    /// Pay the fee recipient and the winner of a drawn raffle
    ///
    /// Accounts expected:
    /// 0. `[signer]` Any user
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The ticket ledger account
    /// 3. `[writable]` The fee recipient
    /// 4. `[writable]` The winner (owner of the winning entry)
    /// 5. `[]` The clock sysvar
    SettleRaffle {},
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        Self::try_from_slice(input).map_err(|_| ProgramError::InvalidInstructionData)
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Result<Vec<u8>, ProgramError> {
        self.try_to_vec()
            .map_err(|_| ProgramError::InvalidInstructionData)
    }
}

/// Create open_raffle instruction
pub fn open_raffle(
    program_id: &Pubkey,
    operator: &Pubkey,
    id: u64,
    config: RaffleConfig,
    ledger_capacity: u32,
) -> Result<Instruction, ProgramError> {
    let (raffle, _) = find_raffle_address(program_id, operator, id);
    let (ticket_ledger, _) = find_ticket_ledger_address(program_id, &raffle);
    let data = RaffleInstruction::OpenRaffle {
        id,
        config,
        ledger_capacity,
    }
    .pack()?;

    let accounts = vec![
        AccountMeta::new(*operator, true),
        AccountMeta::new(raffle, false),
        AccountMeta::new(ticket_ledger, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create buy_tickets instruction
pub fn buy_tickets(
    program_id: &Pubkey,
    participant: &Pubkey,
    raffle: &Pubkey,
    count: u64,
) -> Result<Instruction, ProgramError> {
    let (ticket_ledger, _) = find_ticket_ledger_address(program_id, raffle);
    let data = RaffleInstruction::BuyTickets { count }.pack()?;

    let accounts = vec![
        AccountMeta::new(*participant, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new(ticket_ledger, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create close_raffle instruction
pub fn close_raffle(
    program_id: &Pubkey,
    operator: &Pubkey,
    raffle: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::CloseRaffle {}.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*operator, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create cancel_raffle instruction. `participants` must list every
/// distinct buyer recorded in the ticket ledger.
pub fn cancel_raffle(
    program_id: &Pubkey,
    operator: &Pubkey,
    raffle: &Pubkey,
    participants: &[Pubkey],
) -> Result<Instruction, ProgramError> {
    let (ticket_ledger, _) = find_ticket_ledger_address(program_id, raffle);
    let data = RaffleInstruction::CancelRaffle {}.pack()?;

    let mut accounts = vec![
        AccountMeta::new_readonly(*operator, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(ticket_ledger, false),
    ];
    accounts.extend(participants.iter().map(|p| AccountMeta::new(*p, false)));

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create draw_winner instruction
pub fn draw_winner(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let data = RaffleInstruction::DrawWinner {}.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(slot_hashes::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

/// Create settle_raffle instruction
pub fn settle_raffle(
    program_id: &Pubkey,
    caller: &Pubkey,
    raffle: &Pubkey,
    fee_recipient: &Pubkey,
    winner: &Pubkey,
) -> Result<Instruction, ProgramError> {
    let (ticket_ledger, _) = find_ticket_ledger_address(program_id, raffle);
    let data = RaffleInstruction::SettleRaffle {}.pack()?;

    let accounts = vec![
        AccountMeta::new_readonly(*caller, true),
        AccountMeta::new(*raffle, false),
        AccountMeta::new_readonly(ticket_ledger, false),
        AccountMeta::new(*fee_recipient, false),
        AccountMeta::new(*winner, false),
        AccountMeta::new_readonly(clock::id(), false),
    ];

    Ok(Instruction {
        program_id: *program_id,
        accounts,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_encode_their_variant() {
        let program_id = Pubkey::new_unique();
        let operator = Pubkey::new_unique();
        let config = RaffleConfig::new(25_000_000, 1000, Pubkey::new_unique());

        let ix = open_raffle(&program_id, &operator, 3, config, 128).unwrap();
        assert_eq!(
            RaffleInstruction::unpack(&ix.data).unwrap(),
            RaffleInstruction::OpenRaffle {
                id: 3,
                config,
                ledger_capacity: 128
            }
        );
        assert_eq!(ix.accounts[1].pubkey, find_raffle_address(&program_id, &operator, 3).0);

        let raffle = ix.accounts[1].pubkey;
        let ix = buy_tickets(&program_id, &operator, &raffle, 4).unwrap();
        assert_eq!(
            RaffleInstruction::unpack(&ix.data).unwrap(),
            RaffleInstruction::BuyTickets { count: 4 }
        );

        let participants = [Pubkey::new_unique(), Pubkey::new_unique()];
        let ix = cancel_raffle(&program_id, &operator, &raffle, &participants).unwrap();
        assert_eq!(ix.accounts.len(), 5);
        assert!(ix.accounts[3..].iter().all(|meta| meta.is_writable && !meta.is_signer));
    }

    #[test]
    fn unknown_tag_is_invalid_instruction_data() {
        assert_eq!(
            RaffleInstruction::unpack(&[42]),
            Err(ProgramError::InvalidInstructionData)
        );
        assert_eq!(
            RaffleInstruction::unpack(&[]),
            Err(ProgramError::InvalidInstructionData)
        );
        // trailing bytes are rejected as well
        assert_eq!(
            RaffleInstruction::unpack(&[2, 0]),
            Err(ProgramError::InvalidInstructionData)
        );
    }
}

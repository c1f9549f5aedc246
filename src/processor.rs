use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::invoke_signed,
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    system_instruction, system_program,
    sysvar::{clock::Clock, rent::Rent, slot_hashes, Sysvar},
};

use crate::{
    config::{RaffleConfig, MAX_LEDGER_CAPACITY, RAFFLE_SEED, TICKETS_SEED},
    draw::draw,
    entropy::SlotHashEntropy,
    error::RaffleError,
    instruction::RaffleInstruction,
    ledger::LamportLedger,
    payout::settle,
    state::{RaffleAccount, RaffleState},
    tickets::TicketLedger,
    utils::{find_raffle_address, find_ticket_ledger_address},
};

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::OpenRaffle {
                id,
                config,
                ledger_capacity,
            } => {
                msg!("Instruction: Open Raffle");
                Self::process_open_raffle(accounts, id, config, ledger_capacity, program_id)
            }
            RaffleInstruction::BuyTickets { count } => {
                msg!("Instruction: Buy Tickets");
                Self::process_buy_tickets(accounts, count, program_id)
            }
            RaffleInstruction::CloseRaffle {} => {
                msg!("Instruction: Close Raffle");
                Self::process_close_raffle(accounts, program_id)
            }
            RaffleInstruction::CancelRaffle {} => {
                msg!("Instruction: Cancel Raffle");
                Self::process_cancel_raffle(accounts, program_id)
            }
            RaffleInstruction::DrawWinner {} => {
                msg!("Instruction: Draw Winner");
                Self::process_draw_winner(accounts, program_id)
            }
            RaffleInstruction::SettleRaffle {} => {
                msg!("Instruction: Settle Raffle");
                Self::process_settle_raffle(accounts, program_id)
            }
        }
    }

    /// Process the OpenRaffle instruction
    ///
    /// Creates the raffle PDA, which doubles as the escrow vault, and the
    /// ticket ledger PDA sized for `ledger_capacity` purchases
    fn process_open_raffle(
        accounts: &[AccountInfo],
        id: u64,
        config: RaffleConfig,
        ledger_capacity: u32,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let tickets_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !operator_info.is_signer {
            msg!("Operator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_system_program(system_program_info)?;

        if ledger_capacity == 0 || ledger_capacity > MAX_LEDGER_CAPACITY {
            msg!("Ledger capacity must be between 1 and {}", MAX_LEDGER_CAPACITY);
            return Err(Self::fail(RaffleError::InvalidConfig));
        }
        let raffle = RaffleAccount::open(
            config,
            *operator_info.key,
            id,
            *raffle_info.key,
            *tickets_info.key,
            Clock::get()?.unix_timestamp,
        )
        .map_err(Self::fail)?;

        let (expected_raffle, raffle_bump) = find_raffle_address(program_id, operator_info.key, id);
        if *raffle_info.key != expected_raffle {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }
        let (expected_tickets, tickets_bump) = find_ticket_ledger_address(program_id, raffle_info.key);
        if *tickets_info.key != expected_tickets {
            msg!("Invalid ticket ledger account address");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle_info.owner == program_id || tickets_info.owner == program_id {
            msg!("Raffle {} is already open", id);
            return Err(ProgramError::AccountAlreadyInitialized);
        }

        Self::create_pda_account(
            operator_info,
            raffle_info,
            system_program_info,
            RaffleAccount::LEN,
            program_id,
            &[
                RAFFLE_SEED,
                operator_info.key.as_ref(),
                &id.to_le_bytes(),
                &[raffle_bump],
            ],
        )?;
        Self::create_pda_account(
            operator_info,
            tickets_info,
            system_program_info,
            TicketLedger::space(ledger_capacity),
            program_id,
            &[TICKETS_SEED, raffle_info.key.as_ref(), &[tickets_bump]],
        )?;

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;
        TicketLedger::new(*raffle_info.key, ledger_capacity)
            .pack(&mut tickets_info.data.borrow_mut())?;

        msg!(
            "Raffle opened: Raffle={}, Operator={}, TicketPrice={}, Fee={}%, Capacity={}",
            raffle_info.key,
            operator_info.key,
            raffle.ticket_price,
            raffle.fee_basis_points as f32 / 100.0,
            ledger_capacity
        );
        Ok(())
    }

    fn process_buy_tickets(accounts: &[AccountInfo], count: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let participant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let tickets_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !participant_info.is_signer {
            msg!("Participant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        Self::check_system_program(system_program_info)?;

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let mut tickets = Self::load_tickets(tickets_info, raffle_info, &raffle, program_id)?;
        if !tickets_info.is_writable {
            msg!("Ticket ledger account must be writable");
            return Err(ProgramError::InvalidArgument);
        }

        let clock = Clock::get()?;
        let mut ledger =
            LamportLedger::new(program_id, accounts, clock.slot).with_system_program(system_program_info);
        let entry = tickets
            .buy(&mut raffle, participant_info.key, count, clock.unix_timestamp, &mut ledger)
            .map_err(Self::fail)?;

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;
        tickets.pack(&mut tickets_info.data.borrow_mut())?;

        msg!(
            "Tickets purchased: Raffle={}, Buyer={}, Count={}, TotalEntries={}",
            raffle_info.key,
            participant_info.key,
            entry.count(),
            raffle.total_entries
        );
        Ok(())
    }

    fn process_close_raffle(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;

        if !operator_info.is_signer {
            msg!("Operator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let clock = Clock::from_account_info(clock_info)?;
        raffle
            .close(operator_info.key, clock.slot)
            .map_err(Self::fail)?;

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle closed: Raffle={}, Slot={}, Entries={}",
            raffle_info.key,
            clock.slot,
            raffle.total_entries
        );
        Ok(())
    }

    /// Process the CancelRaffle instruction
    ///
    /// Every distinct participant in the ticket ledger has to be passed
    /// after the ledger account, or the refund batch is rejected
    fn process_cancel_raffle(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let operator_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let tickets_info = next_account_info(account_info_iter)?;

        if !operator_info.is_signer {
            msg!("Operator must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let tickets = Self::load_tickets(tickets_info, raffle_info, &raffle, program_id)?;

        let clock = Clock::get()?;
        let mut ledger = LamportLedger::new(program_id, accounts, clock.slot);
        let refunds = raffle
            .cancel(operator_info.key, &tickets, &mut ledger)
            .map_err(Self::fail)?;

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle cancelled: Raffle={}, Refunds={}",
            raffle_info.key,
            refunds.len()
        );
        Ok(())
    }

    fn process_draw_winner(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let slot_hashes_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if *slot_hashes_info.key != slot_hashes::id() {
            msg!("Invalid slot hashes sysvar account");
            return Err(ProgramError::InvalidArgument);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let index = {
            let data = slot_hashes_info.try_borrow_data()?;
            draw(&mut raffle, &SlotHashEntropy::new(&data)).map_err(Self::fail)?
        };

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Winner drawn: Raffle={}, Entry={}, Caller={}",
            raffle_info.key,
            index,
            caller_info.key
        );
        Ok(())
    }

    fn process_settle_raffle(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let caller_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let tickets_info = next_account_info(account_info_iter)?;
        let fee_recipient_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;
        let clock_info = next_account_info(account_info_iter)?;

        if !caller_info.is_signer {
            msg!("Caller must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let mut raffle = Self::load_raffle(raffle_info, program_id)?;
        let tickets = Self::load_tickets(tickets_info, raffle_info, &raffle, program_id)?;

        if *fee_recipient_info.key != raffle.fee_recipient {
            msg!("Fee recipient does not match the raffle");
            return Err(ProgramError::InvalidArgument);
        }
        if raffle.state() == RaffleState::Drawn {
            if let Some(index) = raffle.winning_entry_index() {
                let winner = tickets.resolve(index).map_err(Self::fail)?;
                if *winner_info.key != winner {
                    msg!("Winner account must be {}, the owner of entry {}", winner, index);
                    return Err(ProgramError::InvalidArgument);
                }
            }
        }

        let clock = Clock::from_account_info(clock_info)?;
        let mut ledger = LamportLedger::new(program_id, accounts, clock.slot);
        let record = settle(caller_info.key, &mut raffle, &tickets, &mut ledger).map_err(Self::fail)?;

        RaffleAccount::pack(raffle, &mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle settled: Raffle={}, Winner={}, Prize={}, Fee={}",
            raffle_info.key,
            record.winner,
            record.winner_amount,
            record.fee_amount
        );
        Ok(())
    }

    fn check_system_program(system_program_info: &AccountInfo) -> ProgramResult {
        if *system_program_info.key != system_program::id() {
            msg!("Invalid system program account");
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    fn load_raffle(raffle_info: &AccountInfo, program_id: &Pubkey) -> Result<RaffleAccount, ProgramError> {
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if !raffle_info.is_writable {
            msg!("Raffle account must be writable");
            return Err(ProgramError::InvalidArgument);
        }
        let raffle = RaffleAccount::unpack(&raffle_info.data.borrow())?;
        if raffle.vault != *raffle_info.key {
            msg!("Raffle account does not hold its own escrow");
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(raffle)
    }

    fn load_tickets(
        tickets_info: &AccountInfo,
        raffle_info: &AccountInfo,
        raffle: &RaffleAccount,
        program_id: &Pubkey,
    ) -> Result<TicketLedger, ProgramError> {
        if tickets_info.owner != program_id {
            msg!("Ticket ledger account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if *tickets_info.key != raffle.ticket_ledger {
            msg!("Ticket ledger does not belong to this raffle");
            return Err(ProgramError::InvalidArgument);
        }
        let tickets = TicketLedger::unpack(&tickets_info.data.borrow())?;
        if tickets.raffle != *raffle_info.key {
            msg!("Ticket ledger does not belong to this raffle");
            return Err(ProgramError::InvalidAccountData);
        }
        Ok(tickets)
    }

    fn create_pda_account<'a>(
        payer_info: &AccountInfo<'a>,
        account_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        space: usize,
        program_id: &Pubkey,
        seeds: &[&[u8]],
    ) -> ProgramResult {
        let rent = Rent::get()?;
        invoke_signed(
            &system_instruction::create_account(
                payer_info.key,
                account_info.key,
                rent.minimum_balance(space),
                space as u64,
                program_id,
            ),
            &[payer_info.clone(), account_info.clone(), system_program_info.clone()],
            &[seeds],
        )
    }

    /// Log a raffle error before handing it to the runtime
    fn fail(error: RaffleError) -> ProgramError {
        msg!("Error: {}", error);
        error.into()
    }
}

//! Lifecycle transitions owned by the raffle operator.

use solana_program::{
    clock::{Slot, UnixTimestamp},
    msg,
    pubkey::Pubkey,
};

use crate::{
    config::RaffleConfig,
    error::RaffleError,
    ledger::{Ledger, Transfer},
    state::{RaffleAccount, RaffleState},
    tickets::TicketLedger,
};

impl RaffleAccount {
    /// Create a raffle in the Open state with an empty escrow. `now` is the
    /// current cluster time, which a sales deadline must lie after.
    pub fn open(
        config: RaffleConfig,
        operator: Pubkey,
        id: u64,
        vault: Pubkey,
        ticket_ledger: Pubkey,
        now: UnixTimestamp,
    ) -> Result<Self, RaffleError> {
        config.validate(now)?;
        Ok(Self {
            is_initialized: true,
            id,
            operator,
            fee_recipient: config.fee_recipient,
            vault,
            ticket_ledger,
            ticket_price: config.ticket_price,
            fee_basis_points: config.fee_basis_points,
            max_entries: config.max_entries,
            max_entries_per_participant: config.max_entries_per_participant,
            sales_end: config.sales_end,
            state: RaffleState::Open,
            total_entries: 0,
            escrow_balance: 0,
            closed_slot: None,
            winning_entry_index: None,
            entropy: None,
            payout: None,
        })
    }

    fn require_operator(&self, caller: &Pubkey) -> Result<(), RaffleError> {
        if *caller != self.operator {
            return Err(RaffleError::Unauthorized);
        }
        Ok(())
    }

    /// End ticket sales. The draw may only use entropy from after `slot`.
    pub fn close(&mut self, caller: &Pubkey, slot: Slot) -> Result<(), RaffleError> {
        self.require_operator(caller)?;
        if self.state != RaffleState::Open {
            return Err(RaffleError::InvalidState);
        }
        self.state = RaffleState::Closed;
        self.closed_slot = Some(slot);
        msg!("Raffle {} closed at slot {} with {} entries", self.id, slot, self.total_entries);
        Ok(())
    }

    /// Refund every purchase and end the raffle.
    ///
    /// Allowed while Open or Closed. Once a winner is drawn the escrow
    /// belongs to the winner and cancellation is refused.
    pub fn cancel<L: Ledger + ?Sized>(
        &mut self,
        caller: &Pubkey,
        tickets: &TicketLedger,
        ledger: &mut L,
    ) -> Result<Vec<Transfer>, RaffleError> {
        self.require_operator(caller)?;
        if self.state.is_terminal() || self.state == RaffleState::Drawn {
            return Err(RaffleError::InvalidState);
        }
        if tickets.total_entries() != self.total_entries {
            return Err(RaffleError::InvalidState);
        }

        let refunds = self.refunds(tickets)?;
        let refunded = refunds
            .iter()
            .try_fold(0u64, |sum, r| sum.checked_add(r.amount))
            .ok_or(RaffleError::Overflow)?;
        if refunded != self.escrow_balance {
            return Err(RaffleError::InvalidState);
        }

        ledger.transfer_all(&refunds)?;

        self.escrow_balance = 0;
        self.state = RaffleState::Cancelled;
        msg!("Raffle {} cancelled, refunded {} lamports in {} transfers", self.id, refunded, refunds.len());
        Ok(refunds)
    }

    /// One refund per participant, in order of first purchase
    fn refunds(&self, tickets: &TicketLedger) -> Result<Vec<Transfer>, RaffleError> {
        let mut refunds: Vec<Transfer> = Vec::new();
        for entry in tickets.entries() {
            let amount = entry
                .count()
                .checked_mul(self.ticket_price)
                .ok_or(RaffleError::Overflow)?;
            match refunds.iter_mut().find(|r| r.to == entry.participant) {
                Some(refund) => {
                    refund.amount = refund.amount.checked_add(amount).ok_or(RaffleError::Overflow)?
                }
                None => refunds.push(Transfer {
                    from: self.vault,
                    to: entry.participant,
                    amount,
                }),
            }
        }
        Ok(refunds)
    }
}

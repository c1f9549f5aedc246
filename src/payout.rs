use solana_program::{msg, pubkey::Pubkey};

use crate::{
    config::BASIS_POINTS_DENOMINATOR,
    error::RaffleError,
    ledger::{Ledger, Transfer},
    state::{PayoutRecord, RaffleAccount, RaffleState},
    tickets::TicketLedger,
};

/// Split `escrow` into `(fee, winner_amount)`. The fee rounds down and the
/// remainder goes to the winner, so the parts always add up to `escrow`.
pub fn split_payout(escrow: u64, fee_basis_points: u16) -> Result<(u64, u64), RaffleError> {
    if u64::from(fee_basis_points) > BASIS_POINTS_DENOMINATOR {
        return Err(RaffleError::InvalidConfig);
    }
    let fee = u128::from(escrow) * u128::from(fee_basis_points) / u128::from(BASIS_POINTS_DENOMINATOR);
    // fee <= escrow because fee_basis_points <= 10000
    let fee = u64::try_from(fee).map_err(|_| RaffleError::Overflow)?;
    let winner_amount = escrow.checked_sub(fee).ok_or(RaffleError::Overflow)?;
    Ok((fee, winner_amount))
}

/// Pay out a drawn raffle. Runs once: Drawn -> Settled.
pub fn settle<L: Ledger + ?Sized>(
    caller: &Pubkey,
    raffle: &mut RaffleAccount,
    tickets: &TicketLedger,
    ledger: &mut L,
) -> Result<PayoutRecord, RaffleError> {
    if raffle.state == RaffleState::Settled || raffle.payout.is_some() {
        return Err(RaffleError::AlreadySettled);
    }
    if raffle.state != RaffleState::Drawn {
        return Err(RaffleError::InvalidState);
    }
    if tickets.total_entries() != raffle.total_entries {
        return Err(RaffleError::InvalidState);
    }

    let index = raffle.winning_entry_index.ok_or(RaffleError::InvalidState)?;
    let winner = tickets.resolve(index)?;
    let escrow = raffle.escrow_balance;
    let (fee_amount, winner_amount) = split_payout(escrow, raffle.fee_basis_points)?;

    let ledger_ref = ledger.transfer_all(&[
        Transfer {
            from: raffle.vault,
            to: raffle.fee_recipient,
            amount: fee_amount,
        },
        Transfer {
            from: raffle.vault,
            to: winner,
            amount: winner_amount,
        },
    ])?;

    let record = PayoutRecord {
        winner,
        winner_amount,
        fee_amount,
        ledger_ref,
    };
    raffle.escrow_balance = 0;
    raffle.payout = Some(record);
    raffle.state = RaffleState::Settled;

    msg!(
        "Raffle {} settled by {}: {} lamports to winner {}, {} lamports fee",
        raffle.id,
        caller,
        winner_amount,
        winner,
        fee_amount
    );
    Ok(record)
}

use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError, program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Ticket price, fee or limits rejected at open
    #[error("Invalid raffle configuration")]
    InvalidConfig,

    /// Operation not allowed in the raffle's current lifecycle state
    #[error("Operation not allowed in the current raffle state")]
    InvalidState,

    /// Only the raffle operator can perform this action
    #[error("Only the raffle operator can perform this action")]
    Unauthorized,

    /// Ticket count must be greater than zero
    #[error("Invalid ticket amount")]
    InvalidAmount,

    /// Entry index is outside of the sold range
    #[error("Entry index out of range")]
    OutOfRange,

    /// No tickets were sold
    #[error("No tickets were sold")]
    NoEntries,

    /// Payout has already been made
    #[error("Raffle has already been settled")]
    AlreadySettled,

    /// The ledger rejected a value transfer
    #[error("Value transfer failed")]
    TransferFailed,

    /// Purchase would exceed the raffle's ticket supply
    #[error("Not enough tickets left")]
    SoldOut,

    /// Purchase would exceed the per-participant ticket limit
    #[error("Participant ticket limit reached")]
    ParticipantLimitReached,

    /// Ticket ledger account has no room for another purchase
    #[error("Ticket ledger is full")]
    LedgerFull,

    /// No slot hash after the close slot is available yet
    #[error("Entropy not yet available")]
    EntropyUnavailable,

    /// Entropy seed is bound to a different raffle or entry count
    #[error("Entropy seed does not match raffle")]
    EntropyMismatch,

    /// Arithmetic overflow
    #[error("Arithmetic overflow")]
    Overflow,

    /// The first slot hash after the close slot is no longer recorded
    #[error("Entropy for this raffle has expired")]
    EntropyExpired,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ProgramError::from(RaffleError::InvalidConfig), ProgramError::Custom(0));
        assert_eq!(ProgramError::from(RaffleError::TransferFailed), ProgramError::Custom(7));
        assert_eq!(ProgramError::from(RaffleError::Overflow), ProgramError::Custom(13));
        assert_eq!(ProgramError::from(RaffleError::EntropyExpired), ProgramError::Custom(14));
    }
}

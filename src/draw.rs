//! Winner selection.
//!
//! The winning entry is `seed mod total_entries`, where the seed is the
//! 32-byte entropy value read as one big-endian unsigned 256-bit integer.
//! The remainder is accumulated byte by byte (Horner's rule), so no bits
//! of the seed are dropped before reducing.

use solana_program::msg;

use crate::{
    entropy::{EntropyAdapter, SeedContext},
    error::RaffleError,
    state::{RaffleAccount, RaffleState},
};

/// `seed % modulus`, with `seed` a big-endian 256-bit unsigned integer
pub fn reduce_seed(seed: &[u8; 32], modulus: u64) -> Result<u64, RaffleError> {
    if modulus == 0 {
        return Err(RaffleError::NoEntries);
    }
    let modulus = u128::from(modulus);
    // acc < modulus <= u64::MAX, so the shift cannot overflow u128
    let remainder = seed
        .iter()
        .fold(0u128, |acc, byte| ((acc << 8) | u128::from(*byte)) % modulus);
    Ok(remainder as u64)
}

/// Select the winning entry of a closed raffle. Runs once: Closed -> Drawn.
pub fn draw<E: EntropyAdapter + ?Sized>(
    raffle: &mut RaffleAccount,
    entropy: &E,
) -> Result<u64, RaffleError> {
    if raffle.state != RaffleState::Closed {
        return Err(RaffleError::InvalidState);
    }
    if raffle.total_entries == 0 {
        return Err(RaffleError::NoEntries);
    }
    let closed_slot = raffle.closed_slot.ok_or(RaffleError::InvalidState)?;

    let context = SeedContext {
        raffle_id: raffle.id,
        total_entries: raffle.total_entries,
        closed_slot,
    };
    let seed = entropy.seed_for(&context)?;
    if seed.raffle_id != raffle.id || seed.total_entries != raffle.total_entries {
        return Err(RaffleError::EntropyMismatch);
    }
    if seed.source_slot <= closed_slot {
        return Err(RaffleError::EntropyUnavailable);
    }

    let index = reduce_seed(&seed.value, raffle.total_entries)?;

    raffle.winning_entry_index = Some(index);
    raffle.entropy = Some(seed);
    raffle.state = RaffleState::Drawn;
    msg!(
        "Raffle {} drawn: entry {} of {} (entropy from slot {})",
        raffle.id,
        index,
        raffle.total_entries,
        seed.source_slot
    );
    Ok(index)
}

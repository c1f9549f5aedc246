//! Value transfer capability consumed by the raffle core.
//!
//! The core never moves lamports itself. It hands a [`Transfer`] batch to a
//! [`Ledger`], which must apply the whole batch or none of it.

use solana_program::{
    account_info::AccountInfo,
    clock::Slot,
    hash::hashv,
    msg,
    program::invoke,
    pubkey::Pubkey,
    system_instruction,
};

use crate::error::RaffleError;

/// A single value movement
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: u64,
}

/// Reference identifying an applied transfer batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerRef(pub [u8; 32]);

impl LedgerRef {
    /// Digest of a batch, salted with a caller supplied context value
    pub fn for_batch(context: u64, transfers: &[Transfer]) -> Self {
        let context = context.to_le_bytes();
        let mut parts: Vec<[u8; 72]> = Vec::with_capacity(transfers.len());
        for transfer in transfers {
            let mut part = [0u8; 72];
            part[..32].copy_from_slice(transfer.from.as_ref());
            part[32..64].copy_from_slice(transfer.to.as_ref());
            part[64..].copy_from_slice(&transfer.amount.to_le_bytes());
            parts.push(part);
        }
        let mut input: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
        input.push(&context);
        input.extend(parts.iter().map(|p| &p[..]));
        LedgerRef(hashv(&input).to_bytes())
    }
}

pub trait Ledger {
    /// Apply every transfer in order, or none of them.
    fn transfer_all(&mut self, transfers: &[Transfer]) -> Result<LedgerRef, RaffleError>;

    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<LedgerRef, RaffleError> {
        self.transfer_all(&[Transfer {
            from: *from,
            to: *to,
            amount,
        }])
    }
}

/// Lamport ledger backed by the accounts of the current instruction.
///
/// Sources owned by the program (the raffle vault) are debited directly.
/// Any other source is debited through a system program transfer, which
/// requires it to have signed the transaction.
pub struct LamportLedger<'a, 'b> {
    program_id: &'b Pubkey,
    accounts: &'b [AccountInfo<'a>],
    system_program: Option<&'b AccountInfo<'a>>,
    slot: Slot,
}

impl<'a, 'b> LamportLedger<'a, 'b> {
    pub fn new(program_id: &'b Pubkey, accounts: &'b [AccountInfo<'a>], slot: Slot) -> Self {
        Self {
            program_id,
            accounts,
            system_program: None,
            slot,
        }
    }

    pub fn with_system_program(mut self, system_program: &'b AccountInfo<'a>) -> Self {
        self.system_program = Some(system_program);
        self
    }

    fn find(&self, key: &Pubkey) -> Result<&'b AccountInfo<'a>, RaffleError> {
        self.accounts
            .iter()
            .find(|info| info.key == key)
            .ok_or_else(|| {
                msg!("Ledger: account {} was not provided", key);
                RaffleError::TransferFailed
            })
    }

    fn check(&self, transfers: &[Transfer]) -> Result<(), RaffleError> {
        for (i, transfer) in transfers.iter().enumerate() {
            if transfer.amount == 0 {
                continue;
            }
            let from = self.find(&transfer.from)?;
            let to = self.find(&transfer.to)?;
            if from.key == to.key || !from.is_writable || !to.is_writable {
                msg!("Ledger: transfer {} -> {} needs two distinct writable accounts", from.key, to.key);
                return Err(RaffleError::TransferFailed);
            }
            if from.owner != self.program_id {
                if !from.is_signer || self.system_program.is_none() {
                    msg!("Ledger: {} must sign and the system program must be provided", from.key);
                    return Err(RaffleError::TransferFailed);
                }
            }
            // later legs in the batch may draw on the same source
            let mut debit = 0u64;
            for other in transfers[..=i].iter().filter(|t| t.from == transfer.from) {
                debit = debit.checked_add(other.amount).ok_or(RaffleError::Overflow)?;
            }
            if from.lamports() < debit {
                msg!("Ledger: insufficient funds in {}: needed {}, had {}", from.key, debit, from.lamports());
                return Err(RaffleError::TransferFailed);
            }
        }
        Ok(())
    }

    fn apply(&self, transfer: &Transfer) -> Result<(), RaffleError> {
        let from = self.find(&transfer.from)?;
        let to = self.find(&transfer.to)?;

        if from.owner == self.program_id {
            let mut from_lamports = from
                .try_borrow_mut_lamports()
                .map_err(|_| RaffleError::TransferFailed)?;
            let mut to_lamports = to
                .try_borrow_mut_lamports()
                .map_err(|_| RaffleError::TransferFailed)?;
            let debited = from_lamports
                .checked_sub(transfer.amount)
                .ok_or(RaffleError::TransferFailed)?;
            let credited = to_lamports
                .checked_add(transfer.amount)
                .ok_or(RaffleError::Overflow)?;
            **from_lamports = debited;
            **to_lamports = credited;
            return Ok(());
        }

        let system_program = self.system_program.ok_or(RaffleError::TransferFailed)?;
        invoke(
            &system_instruction::transfer(from.key, to.key, transfer.amount),
            &[from.clone(), to.clone(), system_program.clone()],
        )
        .map_err(|err| {
            msg!("Ledger: system transfer from {} failed: {}", from.key, err);
            RaffleError::TransferFailed
        })
    }
}

impl<'a, 'b> Ledger for LamportLedger<'a, 'b> {
    fn transfer_all(&mut self, transfers: &[Transfer]) -> Result<LedgerRef, RaffleError> {
        self.check(transfers)?;
        for transfer in transfers.iter().filter(|t| t.amount > 0) {
            self.apply(transfer)?;
        }
        Ok(LedgerRef::for_batch(self.slot, transfers))
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::{HashMap, HashSet};

    /// In-memory ledger with all-or-nothing batches
    #[derive(Default)]
    pub struct MemoryLedger {
        balances: HashMap<Pubkey, u64>,
        frozen: HashSet<Pubkey>,
        applied: Vec<Transfer>,
        batches: u64,
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fund(&mut self, key: &Pubkey, amount: u64) {
            *self.balances.entry(*key).or_default() += amount;
        }

        pub fn balance(&self, key: &Pubkey) -> u64 {
            self.balances.get(key).copied().unwrap_or_default()
        }

        /// Every transfer touching `key` fails from now on
        pub fn freeze(&mut self, key: &Pubkey) {
            self.frozen.insert(*key);
        }

        pub fn applied(&self) -> &[Transfer] {
            &self.applied
        }
    }

    impl Ledger for MemoryLedger {
        fn transfer_all(&mut self, transfers: &[Transfer]) -> Result<LedgerRef, RaffleError> {
            let mut next = self.balances.clone();
            for transfer in transfers.iter().filter(|t| t.amount > 0) {
                if self.frozen.contains(&transfer.from) || self.frozen.contains(&transfer.to) {
                    return Err(RaffleError::TransferFailed);
                }
                let from = next.entry(transfer.from).or_default();
                *from = from
                    .checked_sub(transfer.amount)
                    .ok_or(RaffleError::TransferFailed)?;
                *next.entry(transfer.to).or_default() += transfer.amount;
            }
            self.balances = next;
            self.applied
                .extend(transfers.iter().filter(|t| t.amount > 0).copied());
            self.batches += 1;
            Ok(LedgerRef::for_batch(self.batches, transfers))
        }
    }

    #[test]
    fn failed_batch_leaves_balances_untouched() {
        let (a, b, c) = (Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique());
        let mut ledger = MemoryLedger::new();
        ledger.fund(&a, 100);
        ledger.freeze(&c);

        let batch = [
            Transfer { from: a, to: b, amount: 60 },
            Transfer { from: a, to: c, amount: 10 },
        ];
        assert_eq!(ledger.transfer_all(&batch), Err(RaffleError::TransferFailed));
        assert_eq!(ledger.balance(&a), 100);
        assert_eq!(ledger.balance(&b), 0);
        assert!(ledger.applied().is_empty());
    }

    #[test]
    fn overdraft_is_rejected() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut ledger = MemoryLedger::new();
        ledger.fund(&a, 5);
        assert_eq!(ledger.transfer(&a, &b, 6), Err(RaffleError::TransferFailed));
        assert!(ledger.transfer(&a, &b, 5).is_ok());
        assert_eq!(ledger.balance(&b), 5);
    }

    #[test]
    fn batch_reference_depends_on_content() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let one = [Transfer { from: a, to: b, amount: 1 }];
        let two = [Transfer { from: a, to: b, amount: 2 }];
        assert_ne!(LedgerRef::for_batch(1, &one), LedgerRef::for_batch(1, &two));
        assert_ne!(LedgerRef::for_batch(1, &one), LedgerRef::for_batch(2, &one));
        assert_eq!(LedgerRef::for_batch(1, &one), LedgerRef::for_batch(1, &one));
    }
}

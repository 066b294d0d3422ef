//! Application layer orchestrating the reconciliation flow.
//!
//! A [`scheduler::Scheduler`] owns the scan context and drives passes: the
//! [`cursor::BlockCursor`] picks a reorg-safe starting block, the
//! [`scanner::TransactionScanner`] lists wallet transactions since then, and the
//! [`reconciler::Reconciler`] applies each one to payment records, strictly in sequence.

pub mod cursor;
pub mod invoices;
pub mod notify;
pub mod reconciler;
pub mod scanner;
pub mod scheduler;

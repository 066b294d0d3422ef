//! Domain layer: money rounding, chain and invoice models, payment status rules and the
//! ports through which the application reaches external collaborators.

pub mod amounts;
pub mod chain;
pub mod invoice;
pub mod payment;
pub mod ports;
pub mod settlement;
pub mod status;

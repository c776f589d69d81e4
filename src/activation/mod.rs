//! Activation waiting: wall-clock instants and block heights

pub mod waiter;

pub use waiter::{fine_step, Activation, ActivationWaiter, WaiterSettings};

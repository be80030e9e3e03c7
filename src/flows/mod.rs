//! Declarative step tables for the shipped flows.

pub mod incident;
pub mod permit;

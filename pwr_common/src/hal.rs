//! Hardware abstraction types for relay control.
//!
//! This module contains the addressing types, the 40-pin header numbering
//! table and the capability trait every GPIO backend implements.

pub mod consts;
pub mod driver;
pub mod header;
pub mod types;

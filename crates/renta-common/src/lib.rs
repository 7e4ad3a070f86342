//! renta-common: shared types and error handling for the RENTA pricing core
//!
//! Everything here is domain-neutral plumbing used by the other crates:
//!
//! - **Identifiers**: [`PropertyId`], [`CityKey`], [`CurrencyCode`]
//! - **Dates**: ISO boundary parsing and inclusive [`DateRange`] iteration
//! - **Errors**: the central [`RentaError`] with a code taxonomy matching the
//!   failure classes of the pricing engine (configuration, data, store,
//!   model lifecycle)
//! - **Nonfatal sink**: [`nonfatal::observe`], the one place swallowed
//!   errors are recorded

#![warn(missing_docs)]

mod dates;
mod error;
pub mod nonfatal;
mod types;

pub use dates::{format_iso_date, parse_iso_date, DateRange};
pub use error::{ErrorClass, ErrorCode, RentaError, Result};
pub use types::{CityKey, CurrencyCode, PropertyId};

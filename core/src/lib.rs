//! A crate to break smart-card command APDUs down into readable parts.
//!
//! ```rust
//! use apdu_view::{Decoder, Registry};
//!
//! let mut registry = Registry::new();
//! registry
//!     .merge_str(r#"{ "CLA": { "00": { "INS": { "A4": { "Name": "SELECT" } } } } }"#)
//!     .unwrap();
//!
//! let apdu = Decoder::new(&registry)
//!     .decode_hex("00A40400094F07A000000247100100")
//!     .unwrap();
//!
//! assert_eq!("SELECT", apdu.header.ins.name);
//! println!("{}", apdu);
//! ```

mod trace;

#[cfg(feature = "serde")]
mod serialize;

pub mod apdu;
pub mod config;
pub mod reader;
pub mod registry;
pub mod tlv;

pub use apdu::{DecodedApdu, Decoder, Error};
pub use registry::{CodeName, DecodedHeader, Registry};
pub use tlv::TlvRecord;

//! Decoding of command APDUs.
//!
//! A command is laid out as `CLA INS P1 P2 [Lc] [payload] [Le]`, where the payload is
//! a run of TLV records and Lc may use the extended form (`81 xx`, `82 xx xx`, ...).

use std::fmt::{self, Display, Formatter};

use crate::reader::{LengthError, Reader};
use crate::registry::{DecodedHeader, Registry};
use crate::tlv::{TlvRecord, Tlvs};
use crate::trace::debug;

pub const HEADER_SIZE: usize = 4;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Malformed hex input: {0}")]
    MalformedInput(#[from] hex::FromHexError),

    #[error("APDU header needs 4 octets, but got only {0}")]
    TruncatedHeader(usize),

    #[error("Length field announces {expected} more octets, but only {available} are left")]
    TruncatedLength { expected: usize, available: usize },

    #[error("Length field of {octets} octets is too large")]
    LengthOverflow { octets: usize },

    #[error("Payload is declared as {expected} octets, but only {available} are left")]
    TruncatedPayload { expected: usize, available: usize },

    #[error("TLV {record} at payload offset {offset} overruns the declared payload")]
    MalformedTlv { record: usize, offset: usize },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Converts hex digits into octets. ASCII whitespace between digits is ignored.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    Ok(hex::decode(digits)?)
}

/// A command APDU broken down into its parts.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DecodedApdu {
    pub header: DecodedHeader,

    /// Declared length of the payload.
    pub length: usize,

    /// Octets taken by the length field; zero if the command ends after the header.
    pub length_size: usize,

    pub records: Vec<TlvRecord>,

    /// Octets trailing the payload, taken as the expected response length.
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "crate::serialize::upper_hex_opt")
    )]
    pub le: Option<Vec<u8>>,
}

/// Decodes commands, naming their header through a registry.
#[derive(Clone, Copy)]
pub struct Decoder<'a> {
    registry: &'a Registry,
}

impl<'a> Decoder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Decodes a command written as hex digits.
    pub fn decode_hex(&self, input: &str) -> Result<DecodedApdu> {
        self.decode(&parse_hex(input)?)
    }

    /// Decodes a command from its octets.
    /// Fails as a whole if any part is inconsistent; no partial result is returned.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedApdu> {
        let mut reader = Reader::new(bytes);

        let header = reader
            .read(HEADER_SIZE)
            .ok_or(Error::TruncatedHeader(bytes.len()))?;
        let header = self
            .registry
            .lookup(header[0], header[1], header[2], header[3]);
        debug!(
            "Header: {} {} {} {}",
            header.cla.name, header.ins.name, header.p1.name, header.p2.name
        );

        // A command ending right after the header carries no length field.
        let (length, length_size) = match reader.read_length() {
            Ok(length) => (length.value, length.size),
            Err(LengthError::Missing) => (0, 0),
            Err(LengthError::Truncated {
                expected,
                available,
            }) => {
                return Err(Error::TruncatedLength {
                    expected,
                    available,
                })
            }
            Err(LengthError::Overflow { octets }) => return Err(Error::LengthOverflow { octets }),
        };
        debug!("Length: {} ({} octets)", length, length_size);

        let payload = reader.read(length).ok_or(Error::TruncatedPayload {
            expected: length,
            available: reader.remaining(),
        })?;
        let records = Tlvs::new(payload).collect::<Result<Vec<_>>>()?;
        debug!("Records: {}", records.len());

        let le = match reader.rest() {
            [] => None,
            rest => Some(rest.to_vec()),
        };

        Ok(DecodedApdu {
            header,
            length,
            length_size,
            records,
            le,
        })
    }
}

impl Display for DecodedApdu {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let DecodedHeader { cla, ins, p1, p2 } = &self.header;

        writeln!(f, "CLA: {:02X} ({})", cla.code, cla.name)?;
        writeln!(f, "INS: {:02X} ({})", ins.code, ins.name)?;
        writeln!(f, "P1:  {:02X} ({})", p1.code, p1.name)?;
        writeln!(f, "P2:  {:02X} ({})", p2.code, p2.name)?;
        writeln!(f)?;
        writeln!(f, "LEN: {:02X}", self.length)?;
        writeln!(f)?;

        for (i, record) in self.records.iter().enumerate() {
            writeln!(f, "TLV {}:", i + 1)?;
            writeln!(f, "\tTAG: {:02X}", record.tag)?;
            writeln!(f, "\tLEN: {:02X}", record.length)?;
            writeln!(f, "\tVAL: {}", hex::encode_upper(&record.value))?;
        }

        if let Some(le) = &self.le {
            writeln!(f, "LE:  {}", hex::encode_upper(le))?;
        }

        Ok(())
    }
}

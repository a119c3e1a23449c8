//! TLV records carried in a command payload.
//!
//! Each record is a single tag octet, a length using the same short/extended form as
//! the APDU length field, then that many value octets.

use crate::apdu::Error;
use crate::reader::{LengthError, Reader};

/// A single Tag-Length-Value record.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TlvRecord {
    pub tag: u8,
    pub length: usize,
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "crate::serialize::upper_hex")
    )]
    pub value: Vec<u8>,
}

/// Lazily walks the records of a payload.
///
/// Yields an error and stops if a record does not fit in the payload.
pub struct Tlvs<'a> {
    reader: Reader<'a>,
    index: usize,
    done: bool,
}

impl<'a> Tlvs<'a> {
    /// Walks the payload, which must hold exactly the declared number of octets.
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(payload),
            index: 0,
            done: false,
        }
    }

    fn read_record(&mut self) -> Result<TlvRecord, Error> {
        let offset = self.reader.position();
        let overrun = Error::MalformedTlv {
            record: self.index,
            offset,
        };

        let tag = self.reader.next().ok_or(overrun.clone())?;
        let length = match self.reader.read_length() {
            Ok(length) => length.value,
            Err(LengthError::Overflow { octets }) => return Err(Error::LengthOverflow { octets }),
            Err(_) => return Err(overrun),
        };
        let value = self.reader.read(length).ok_or(overrun)?;

        Ok(TlvRecord {
            tag,
            length,
            value: value.to_vec(),
        })
    }
}

impl<'a> Iterator for Tlvs<'a> {
    type Item = Result<TlvRecord, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }

        self.index += 1;
        let record = self.read_record();
        self.done = record.is_err();

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload() {
        assert_eq!(0, Tlvs::new(&[]).count());
    }

    #[test]
    fn test_records() {
        let records: Result<Vec<_>, _> =
            Tlvs::new(&[0x4F, 0x02, 0xA0, 0x00, 0x50, 0x00, 0x87, 0x01, 0xFF]).collect();

        assert_eq!(
            vec![
                TlvRecord {
                    tag: 0x4F,
                    length: 2,
                    value: vec![0xA0, 0x00]
                },
                TlvRecord {
                    tag: 0x50,
                    length: 0,
                    value: vec![]
                },
                TlvRecord {
                    tag: 0x87,
                    length: 1,
                    value: vec![0xFF]
                },
            ],
            records.unwrap(),
        );
    }

    #[test]
    fn test_extended_record_length() {
        let mut payload = vec![0x53, 0x81, 0x80];
        payload.extend([0x5A; 0x80]);

        let record = Tlvs::new(&payload).next().unwrap().unwrap();
        assert_eq!(0x53, record.tag);
        assert_eq!(0x80, record.length);
        assert_eq!(vec![0x5A; 0x80], record.value);
    }

    #[test]
    fn test_value_overrun() {
        let mut tlvs = Tlvs::new(&[0x4F, 0x01, 0xA0, 0x50, 0x03, 0x01]);

        assert!(tlvs.next().unwrap().is_ok());
        assert_eq!(
            Some(Err(Error::MalformedTlv {
                record: 2,
                offset: 3
            })),
            tlvs.next(),
        );
        assert_eq!(None, tlvs.next());
    }

    #[test]
    fn test_missing_length() {
        assert_eq!(
            Some(Err(Error::MalformedTlv {
                record: 1,
                offset: 0
            })),
            Tlvs::new(&[0x4F]).next(),
        );
    }

    #[test]
    fn test_extended_length_overrun() {
        assert_eq!(
            Some(Err(Error::MalformedTlv {
                record: 1,
                offset: 0
            })),
            Tlvs::new(&[0x4F, 0x82, 0x01]).next(),
        );
    }
}

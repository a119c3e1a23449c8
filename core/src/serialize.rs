//! Serializers rendering octets the same way the text output does.

use serde::Serializer;

pub(crate) fn upper_hex<T, S>(bytes: T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&hex::encode_upper(bytes))
}

pub(crate) fn upper_hex_opt<T, S>(bytes: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    match bytes {
        Some(bytes) => upper_hex(bytes, serializer),
        None => serializer.serialize_none(),
    }
}

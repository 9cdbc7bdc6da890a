use crate::error::{eof, Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use prost::Message;
use std::{
    fmt::{Display, Formatter},
    io::{Cursor, Read},
};

/// edef8ba9-79d6-4ace-a3c8-27dcd51d21ed
pub const WIDEVINE_SYSTEM_ID: [u8; 16] = [
    0xed, 0xef, 0x8b, 0xa9, 0x79, 0xd6, 0x4a, 0xce, 0xa3, 0xc8, 0x27, 0xdc, 0xd5, 0x1d, 0x21, 0xed,
];

fn remaining(buf: &Cursor<&[u8]>) -> u64 {
    (buf.get_ref().len() as u64).saturating_sub(buf.position())
}

/// Body of a Protection System Specific Header box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsshBox {
    pub version: u8,
    pub system_id: [u8; 16],
    /// Only present in version 1 boxes.
    pub key_ids: Vec<[u8; 16]>,
    pub data: Vec<u8>,
}

impl PsshBox {
    /// Parses the body of a `pssh` box, header excluded.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut buf = Cursor::new(payload);

        let version = buf.read_u8().map_err(eof("pssh version"))?;
        let mut flags = [0u8; 3];
        buf.read_exact(&mut flags).map_err(eof("pssh flags"))?;

        let mut system_id = [0u8; 16];
        buf.read_exact(&mut system_id)
            .map_err(eof("pssh system id"))?;

        let mut key_ids = Vec::new();
        if version > 0 {
            let kid_count = buf.read_u32::<BigEndian>().map_err(eof("pssh kid count"))?;
            if u64::from(kid_count) * 16 > remaining(&buf) {
                return Err(Error::Truncated("pssh kid"));
            }
            key_ids.reserve(kid_count as usize);
            for _ in 0..kid_count {
                let mut kid = [0u8; 16];
                buf.read_exact(&mut kid).map_err(eof("pssh kid"))?;
                key_ids.push(kid);
            }
        }

        let data_length = buf.read_u32::<BigEndian>().map_err(eof("pssh data size"))?;
        if u64::from(data_length) > remaining(&buf) {
            return Err(Error::Truncated("pssh data"));
        }
        let mut data = vec![0u8; data_length as usize];
        buf.read_exact(&mut data).map_err(eof("pssh data"))?;

        Ok(Self {
            version,
            system_id,
            key_ids,
            data,
        })
    }

    pub fn is_widevine(&self) -> bool {
        self.system_id == WIDEVINE_SYSTEM_ID
    }

    pub fn system_id_hex(&self) -> String {
        hex::encode(self.system_id)
    }

    /// Resolves the key id carried by a Widevine header.
    ///
    /// The protobuf `content_id` is preferred; the first protobuf key id and then the box-level
    /// key ids are used when it is absent.
    pub fn widevine_key_id(&self) -> Result<KeyId> {
        let data = WidevinePsshData::decode(self.data.as_slice())
            .map_err(|e| Error::InvalidPayload(e.to_string()))?;

        let id = data
            .content_id
            .filter(|id| !id.is_empty())
            .or_else(|| data.key_ids.into_iter().find(|id| !id.is_empty()))
            .or_else(|| self.key_ids.first().map(|id| id.to_vec()))
            .ok_or_else(|| Error::InvalidPayload("no content id or key id".to_string()))?;

        Ok(KeyId::from_bytes(&id))
    }
}

/// Subset of the Widevine `WidevinePsshData` protobuf message.
#[derive(Clone, PartialEq, Message)]
pub struct WidevinePsshData {
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub key_ids: Vec<Vec<u8>>,
    #[prost(string, optional, tag = "3")]
    pub provider: Option<String>,
    #[prost(bytes = "vec", optional, tag = "4")]
    pub content_id: Option<Vec<u8>>,
    #[prost(uint32, optional, tag = "9")]
    pub protection_scheme: Option<u32>,
}

/// A content key identifier in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Normalizes a hex string, accepting uppercase digits and UUID dashes.
    pub fn from_hex<S: AsRef<str>>(s: S) -> Self {
        Self(
            s.as_ref()
                .chars()
                .filter(|c| *c != '-')
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for KeyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

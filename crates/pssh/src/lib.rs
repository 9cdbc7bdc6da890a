//! Key id recovery from ISO-BMFF protection headers.
//!
//! An encrypted CENC track carries one `pssh` box per DRM system inside its `moov` box.
//! [extract_key_id] walks the box tree, picks the Widevine header and returns the key id
//! encoded in its protobuf payload.

mod error;
pub mod mp4;
mod pssh;

pub use error::*;
pub use pssh::*;

use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::Path,
};

/// Extracts the Widevine key id of an encrypted MP4 file.
pub fn extract_key_id<P: AsRef<Path>>(path: P) -> Result<KeyId> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    widevine_key_id(&mut reader)
}

pub fn extract_key_id_from_bytes(data: &[u8]) -> Result<KeyId> {
    widevine_key_id(&mut Cursor::new(data))
}

/// Returns every `pssh` box found in the first `moov` box.
pub fn find_pssh_boxes<R: Read + Seek>(reader: &mut R) -> Result<Vec<PsshBox>> {
    let moov = mp4::read_moov(reader)?;
    let mut boxes = Vec::new();
    mp4::collect_pssh(&moov, &mut boxes)?;
    Ok(boxes)
}

fn widevine_key_id<R: Read + Seek>(reader: &mut R) -> Result<KeyId> {
    let boxes = find_pssh_boxes(reader)?;
    let widevine = boxes
        .iter()
        .find(|pssh| pssh.is_widevine())
        .ok_or(Error::NoWidevineHeader)?;
    widevine.widevine_key_id()
}

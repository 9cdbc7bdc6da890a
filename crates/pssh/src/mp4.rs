use crate::{
    error::{eof, Error, Result},
    pssh::PsshBox,
};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

pub const MOOV: [u8; 4] = *b"moov";
pub const PSSH: [u8; 4] = *b"pssh";

/// Boxes whose payload is a plain sequence of child boxes.
const CONTAINERS: [[u8; 4]; 10] = [
    *b"moov", *b"trak", *b"mdia", *b"minf", *b"stbl", *b"mvex", *b"moof", *b"traf", *b"edts",
    *b"dinf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub box_type: [u8; 4],
    pub header_size: u64,
    /// Size of the box body, header excluded.
    pub payload_size: u64,
}

impl BoxHeader {
    /// Reads a box header.
    ///
    /// `remaining` is the number of bytes between the start of this box and the end of the
    /// enclosing scope. A box can never be larger than that.
    pub fn read<R: Read>(reader: &mut R, remaining: u64) -> Result<Self> {
        let size = reader.read_u32::<BigEndian>().map_err(eof("box size"))?;
        let mut box_type = [0u8; 4];
        reader.read_exact(&mut box_type).map_err(eof("box type"))?;

        let (size, header_size) = match size {
            // largesize follows the type
            1 => (
                reader.read_u64::<BigEndian>().map_err(eof("box largesize"))?,
                16,
            ),
            // box extends to the end of its scope
            0 => (remaining, 8),
            size => (size as u64, 8),
        };

        if size < header_size {
            return Err(Error::InvalidBoxSize {
                box_type: fourcc(&box_type),
                size,
            });
        }
        if size > remaining {
            return Err(Error::Truncated("box body"));
        }

        Ok(Self {
            box_type,
            header_size,
            payload_size: size - header_size,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.header_size + self.payload_size
    }
}

pub fn fourcc(box_type: &[u8; 4]) -> String {
    String::from_utf8_lossy(box_type).into_owned()
}

/// Seeks through top-level boxes and returns the body of the first `moov`.
pub fn read_moov<R: Read + Seek>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let mut position = 0;
    while position < len {
        let header = BoxHeader::read(reader, len - position)?;
        log::trace!("top-level box {} at {position}", fourcc(&header.box_type));

        if header.box_type == MOOV {
            let mut payload = vec![0u8; header.payload_size as usize];
            reader.read_exact(&mut payload).map_err(eof("moov"))?;
            return Ok(payload);
        }

        position += header.total_size();
        reader.seek(SeekFrom::Start(position))?;
    }

    Err(Error::NoMovieBox)
}

/// Collects every `pssh` box below `payload`, descending into container boxes.
pub fn collect_pssh(payload: &[u8], boxes: &mut Vec<PsshBox>) -> Result<()> {
    let len = payload.len() as u64;
    let mut reader = Cursor::new(payload);

    while reader.position() < len {
        let start = reader.position();
        let header = BoxHeader::read(&mut reader, len - start)?;
        let body_start = (start + header.header_size) as usize;
        let body = &payload[body_start..body_start + header.payload_size as usize];

        if header.box_type == PSSH {
            let pssh = PsshBox::parse(body)?;
            log::debug!("found pssh box for system {}", pssh.system_id_hex());
            boxes.push(pssh);
        } else if CONTAINERS.contains(&header.box_type) {
            collect_pssh(body, boxes)?;
        }

        reader.set_position(start + header.total_size());
    }

    Ok(())
}

//! Compound File Binary (OLE2) container for a single stream.
//!
//! Legacy workbooks are stored as a `Workbook` stream inside a compound
//! file. This writer covers exactly that case: version 3 (512-byte
//! sectors), a root entry with one child stream, and a FAT that fits in the
//! header's 109 DIFAT slots. The stream is padded to the mini-stream cutoff
//! so it always lives in regular sectors.

use crate::error::ExportError;

pub const MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const SECTOR_SIZE: usize = 512;
const HEADER_SIZE: usize = 512;
const DIRENTRY_SIZE: usize = 128;
const MINI_STREAM_CUTOFF: usize = 4096;
const HEADER_DIFAT_SLOTS: usize = 109;
const FAT_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / 4;

const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FREESECT: u32 = 0xFFFF_FFFF;
const FATSECT: u32 = 0xFFFF_FFFD;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const STGTY_EMPTY: u8 = 0;
const STGTY_STREAM: u8 = 2;
const STGTY_ROOT: u8 = 5;
const COLOR_BLACK: u8 = 1;

/// Write `data` as the only stream of a new compound file.
pub fn write_single_stream(name: &str, data: &[u8]) -> Result<Vec<u8>, ExportError> {
    if name.encode_utf16().count() > 31 {
        return Err(ExportError::TooLarge(format!("stream name '{name}' exceeds 31 characters")));
    }
    let stream_len = data.len().max(MINI_STREAM_CUTOFF);
    let stream_sectors = stream_len.div_ceil(SECTOR_SIZE);
    let dir_sectors = 1;
    // Each FAT sector describes itself as well, hence 127 usable entries.
    let fat_sectors = (stream_sectors + dir_sectors).div_ceil(FAT_ENTRIES_PER_SECTOR - 1);
    if fat_sectors > HEADER_DIFAT_SLOTS {
        return Err(ExportError::TooLarge(format!(
            "{} byte stream needs {fat_sectors} FAT sectors, at most {HEADER_DIFAT_SLOTS} are supported",
            data.len()
        )));
    }

    let dir_start = fat_sectors as u32;
    let stream_start = dir_start + dir_sectors as u32;
    let total_sectors = fat_sectors + dir_sectors + stream_sectors;

    let mut out = Vec::with_capacity(HEADER_SIZE + total_sectors * SECTOR_SIZE);
    out.extend_from_slice(&header(fat_sectors as u32, dir_start));

    let mut fat = vec![FREESECT; fat_sectors * FAT_ENTRIES_PER_SECTOR];
    fat[..fat_sectors].fill(FATSECT);
    fat[dir_start as usize] = ENDOFCHAIN;
    for i in 0..stream_sectors {
        let id = stream_start as usize + i;
        fat[id] = if i + 1 == stream_sectors { ENDOFCHAIN } else { id as u32 + 1 };
    }
    for next in fat {
        out.extend_from_slice(&next.to_le_bytes());
    }

    out.extend_from_slice(&entry("Root Entry", STGTY_ROOT, 1, ENDOFCHAIN, 0));
    out.extend_from_slice(&entry(name, STGTY_STREAM, NOSTREAM, stream_start, stream_len as u64));
    out.extend_from_slice(&empty_entry());
    out.extend_from_slice(&empty_entry());

    out.extend_from_slice(data);
    out.resize(HEADER_SIZE + total_sectors * SECTOR_SIZE, 0);
    Ok(out)
}

fn header(fat_sectors: u32, dir_start: u32) -> [u8; HEADER_SIZE] {
    let mut h = [0u8; HEADER_SIZE];
    h[0..8].copy_from_slice(&MAGIC);
    // 8..24: CLSID, zero
    h[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    h[26..28].copy_from_slice(&3u16.to_le_bytes());
    h[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    h[30..32].copy_from_slice(&9u16.to_le_bytes());
    h[32..34].copy_from_slice(&6u16.to_le_bytes());
    // 40: directory sector count, always 0 for version 3
    h[44..48].copy_from_slice(&fat_sectors.to_le_bytes());
    h[48..52].copy_from_slice(&dir_start.to_le_bytes());
    h[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    h[60..64].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    h[68..72].copy_from_slice(&ENDOFCHAIN.to_le_bytes());
    for slot in 0..HEADER_DIFAT_SLOTS {
        let value = if slot < fat_sectors as usize { slot as u32 } else { FREESECT };
        let at = 76 + slot * 4;
        h[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    h
}

fn entry(name: &str, kind: u8, child: u32, start: u32, size: u64) -> [u8; DIRENTRY_SIZE] {
    let mut e = [0u8; DIRENTRY_SIZE];
    let units: Vec<u16> = name.encode_utf16().take(31).collect();
    for (i, unit) in units.iter().enumerate() {
        e[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    // Length in bytes including the terminating null.
    e[64..66].copy_from_slice(&(((units.len() + 1) * 2) as u16).to_le_bytes());
    e[66] = kind;
    e[67] = COLOR_BLACK;
    e[68..72].copy_from_slice(&NOSTREAM.to_le_bytes());
    e[72..76].copy_from_slice(&NOSTREAM.to_le_bytes());
    e[76..80].copy_from_slice(&child.to_le_bytes());
    e[116..120].copy_from_slice(&start.to_le_bytes());
    e[120..128].copy_from_slice(&size.to_le_bytes());
    e
}

fn empty_entry() -> [u8; DIRENTRY_SIZE] {
    let mut e = [0u8; DIRENTRY_SIZE];
    e[66] = STGTY_EMPTY;
    e[68..80].fill(0xFF);
    e
}

fn u32_at(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

fn sector(bytes: &[u8], id: u32) -> Option<&[u8]> {
    let start = HEADER_SIZE + id as usize * SECTOR_SIZE;
    bytes.get(start..start + SECTOR_SIZE)
}

/// Read a top-level stream by name from a compound file written with
/// 512-byte sectors and no DIFAT chain.
pub fn read_stream(bytes: &[u8], name: &str) -> Option<Vec<u8>> {
    if bytes.get(0..8)? != &MAGIC[..] {
        return None;
    }
    let fat_count = u32_at(bytes, 44)? as usize;
    let mut fat = Vec::new();
    for slot in 0..fat_count.min(HEADER_DIFAT_SLOTS) {
        let id = u32_at(bytes, 76 + slot * 4)?;
        let data = sector(bytes, id)?;
        fat.extend((0..FAT_ENTRIES_PER_SECTOR).filter_map(|i| u32_at(data, i * 4)));
    }
    let chain = |start: u32| -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let mut id = start;
        while id != ENDOFCHAIN {
            out.extend_from_slice(sector(bytes, id)?);
            id = *fat.get(id as usize)?;
            if out.len() > bytes.len() {
                return None;
            }
        }
        Some(out)
    };

    let directory = chain(u32_at(bytes, 48)?)?;
    directory.chunks_exact(DIRENTRY_SIZE).find_map(|e| {
        if e[66] != STGTY_STREAM {
            return None;
        }
        let len = ((u16::from_le_bytes([e[64], e[65]]) as usize).saturating_sub(2) / 2).min(31);
        let units: Vec<u16> = e[..len * 2]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if String::from_utf16_lossy(&units) != name {
            return None;
        }
        let start = u32_at(e, 116)?;
        let size = u64::from_le_bytes(e[120..128].try_into().ok()?) as usize;
        let mut data = chain(start)?;
        data.truncate(size);
        Some(data)
    })
}

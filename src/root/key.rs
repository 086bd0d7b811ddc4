//! `TKey` records, the headers ROOT puts in front of every stored object.

use std::time::{SystemTime, UNIX_EPOCH};

use super::rbuffer::RBuffer;
use super::wbuffer::WBuffer;
use super::{Result, RootError};

/// Key version for files with 32 bit seek pointers
const KEY_VERSION: u16 = 4;
/// Fixed part of a small key header, before the three strings
const KEY_FIXED_LEN: usize = 26;

#[derive(Debug, Clone, Default)]
pub(crate) struct Key {
    /// Bytes of the key header plus the (compressed) object
    pub(crate) n_bytes: u32,
    pub(crate) version: u16,
    /// Uncompressed object length
    pub(crate) obj_len: u32,
    pub(crate) datime: u32,
    pub(crate) key_len: u16,
    pub(crate) cycle: u16,
    pub(crate) seek_key: u64,
    pub(crate) seek_pdir: u64,
    pub(crate) class_name: String,
    pub(crate) name: String,
    pub(crate) title: String,
}

/// Public information about a key in a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub class_name: String,
    pub cycle: u16,
}

impl From<&Key> for KeyInfo {
    fn from(key: &Key) -> Self {
        Self {
            name: key.name.clone(),
            class_name: key.class_name.clone(),
            cycle: key.cycle,
        }
    }
}

impl Key {
    /// Read a key header at the current position
    pub(crate) fn read(r: &mut RBuffer, is_large: bool) -> Result<Self> {
        let n_bytes = r.read_u32()?;
        let version = r.read_u16()?;
        let obj_len = r.read_u32()?;
        let datime = r.read_u32()?;
        let key_len = r.read_u16()?;
        let cycle = r.read_u16()?;

        let (seek_key, seek_pdir) = if version > 1000 || is_large {
            (r.read_u64()?, r.read_u64()?)
        } else {
            (r.read_u32()? as u64, r.read_u32()? as u64)
        };

        let class_name = r.read_string()?;
        let name = r.read_string()?;
        let title = r.read_string()?;

        Ok(Key {
            n_bytes,
            version,
            obj_len,
            datime,
            key_len,
            cycle,
            seek_key,
            seek_pdir,
            class_name,
            name,
            title,
        })
    }

    /// A new key for a small file
    ///
    /// The lengths and seek positions are filled in by the writer.
    pub(crate) fn new(class_name: &str, name: &str, title: &str) -> Self {
        let mut key = Key {
            version: KEY_VERSION,
            datime: datime_now(),
            cycle: 1,
            class_name: class_name.to_owned(),
            name: name.to_owned(),
            title: title.to_owned(),
            ..Default::default()
        };
        key.key_len = key.header_len() as u16;
        key
    }

    /// Length of the serialised header
    pub(crate) fn header_len(&self) -> usize {
        KEY_FIXED_LEN
            + string_len(&self.class_name)
            + string_len(&self.name)
            + string_len(&self.title)
    }

    pub(crate) fn write(&self, w: &mut WBuffer) -> Result<()> {
        w.write_u32(self.n_bytes);
        w.write_u16(self.version);
        w.write_u32(self.obj_len);
        w.write_u32(self.datime);
        w.write_u16(self.key_len);
        w.write_u16(self.cycle);
        w.write_u32(small_seek(self.seek_key)?);
        w.write_u32(small_seek(self.seek_pdir)?);
        w.write_string(&self.class_name);
        w.write_string(&self.name);
        w.write_string(&self.title);
        Ok(())
    }
}

pub(crate) fn string_len(s: &str) -> usize {
    if s.len() < 255 {
        1 + s.len()
    } else {
        5 + s.len()
    }
}

pub(crate) fn small_seek(seek: u64) -> Result<u32> {
    u32::try_from(seek)
        .ok()
        .filter(|&s| s <= i32::MAX as u32)
        .ok_or(RootError::TooLarge)
}

/// The current time in ROOT's `TDatime` encoding
pub(crate) fn datime_now() -> u32 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    datime_from_unix(secs)
}

fn datime_from_unix(secs: u64) -> u32 {
    let days = (secs / 86400) as i64;
    let rem = secs % 86400;
    let (year, month, day) = civil_from_days(days);
    let (hour, min, sec) = (rem / 3600, rem % 3600 / 60, rem % 60);
    (((year - 1995).max(0) as u32) << 26)
        | ((month as u32) << 22)
        | ((day as u32) << 17)
        | ((hour as u32) << 12)
        | ((min as u32) << 6)
        | sec as u32
}

// proleptic Gregorian calendar date from days since 1970-01-01
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut key = Key::new("TTree", "events", "a tree");
        key.n_bytes = 1234;
        key.obj_len = 1000;
        key.seek_key = 300;
        key.seek_pdir = 100;
        let mut w = WBuffer::new(0);
        key.write(&mut w).unwrap();
        let data = w.into_inner();
        assert_eq!(data.len(), key.key_len as usize);

        let read = Key::read(&mut RBuffer::new(&data), false).unwrap();
        assert_eq!(read.n_bytes, 1234);
        assert_eq!(read.obj_len, 1000);
        assert_eq!(read.cycle, 1);
        assert_eq!(read.seek_key, 300);
        assert_eq!(read.seek_pdir, 100);
        assert_eq!(read.class_name, "TTree");
        assert_eq!(read.name, "events");
        assert_eq!(read.title, "a tree");
    }

    #[test]
    fn datime() {
        // 2021-03-04 05:06:07 UTC
        let t = datime_from_unix(1614834367);
        assert_eq!(t >> 26, 26);
        assert_eq!((t >> 22) & 0xF, 3);
        assert_eq!((t >> 17) & 0x1F, 4);
        assert_eq!((t >> 12) & 0x1F, 5);
        assert_eq!((t >> 6) & 0x3F, 6);
        assert_eq!(t & 0x3F, 7);
    }

    #[test]
    fn seek_limit() {
        assert_eq!(small_seek(100).unwrap(), 100);
        assert!(matches!(small_seek(1 << 31), Err(RootError::TooLarge)));
    }
}

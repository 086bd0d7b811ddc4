use std::io::Write;
use std::str::FromStr;

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::root::RootCompression;

const GZIP_DEFAULT_LEVEL: u8 = 6;
const LZ4_DEFAULT_LEVEL: u8 = 0;
const ZSTD_DEFAULT_LEVEL: u8 = 0;
const ZLIB_DEFAULT_LEVEL: u8 = 1;
const ROOT_ZSTD_DEFAULT_LEVEL: u8 = 5;

lazy_static! {
    static ref COMPRESSION_RE: Regex =
        Regex::new(r"^(?P<algo>[[:alnum:]]+)(?P<lvl>_\d+)?$").unwrap();
}

/// Compression format of text output
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Compression {
    /// The bzip2 format
    Bzip2,
    /// The gzip format with compression level as associated value
    Gzip(u8),
    /// The lz4 format with compression level as associated value
    Lz4(u8),
    /// The zstd format with compression level as associated value
    Zstd(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCompressionErr {
    #[error("Unknown compression algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("Level {1} not supported for {0} compression")]
    UnsupportedLevel(String, String),
}

/// Split `algo_level` into the algorithm and an optional level
fn split_setting(s: &str) -> Result<(String, Option<String>), ParseCompressionErr> {
    let lower_case = s.to_ascii_lowercase();
    let Some(captures) = COMPRESSION_RE.captures(&lower_case) else {
        return Err(ParseCompressionErr::UnknownAlgorithm(s.to_owned()));
    };
    let algo = captures["algo"].to_owned();
    let lvl = captures.name("lvl").map(|lvl| lvl.as_str().to_owned());
    Ok((algo, lvl))
}

fn parse_level(
    algo: &str,
    lvl: Option<String>,
    default: u8,
    max: u8,
) -> Result<u8, ParseCompressionErr> {
    let Some(lvl) = lvl else {
        return Ok(default);
    };
    match lvl[1..].parse::<u8>() {
        Ok(n) if n <= max => Ok(n),
        _ => Err(ParseCompressionErr::UnsupportedLevel(algo.to_owned(), lvl)),
    }
}

impl FromStr for Compression {
    type Err = ParseCompressionErr;

    /// Parse settings like `gzip`, `zstd_5` or `bz2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Compression::*;

        let (algo, lvl) = split_setting(s)?;
        match algo.as_str() {
            "bzip2" | "bz2" => match lvl {
                Some(lvl) => Err(ParseCompressionErr::UnsupportedLevel(algo, lvl)),
                None => Ok(Bzip2),
            },
            "gzip" | "gz" => Ok(Gzip(parse_level(&algo, lvl, GZIP_DEFAULT_LEVEL, 9)?)),
            "lz4" => Ok(Lz4(parse_level(&algo, lvl, LZ4_DEFAULT_LEVEL, 16)?)),
            "zstd" | "zstandard" => {
                Ok(Zstd(parse_level(&algo, lvl, ZSTD_DEFAULT_LEVEL, 19)?))
            }
            _ => Err(ParseCompressionErr::UnknownAlgorithm(s.to_owned())),
        }
    }
}

impl FromStr for RootCompression {
    type Err = ParseCompressionErr;

    /// Parse settings like `none`, `zlib_9` or `zstd`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algo, lvl) = split_setting(s)?;
        match algo.as_str() {
            "none" => match lvl {
                Some(lvl) => Err(ParseCompressionErr::UnsupportedLevel(algo, lvl)),
                None => Ok(RootCompression::None),
            },
            "zlib" | "gzip" | "gz" => Ok(RootCompression::Zlib(parse_level(
                &algo,
                lvl,
                ZLIB_DEFAULT_LEVEL,
                9,
            )?)),
            "zstd" | "zstandard" => Ok(RootCompression::Zstd(parse_level(
                &algo,
                lvl,
                ROOT_ZSTD_DEFAULT_LEVEL,
                19,
            )?)),
            _ => Err(ParseCompressionErr::UnknownAlgorithm(s.to_owned())),
        }
    }
}

/// Finishes the lz4 frame when dropped
struct Lz4Writer<W: Write> {
    encoder: Option<lz4::Encoder<W>>,
}

impl<W: Write> Write for Lz4Writer<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.write(buf),
            None => Ok(0),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self.encoder.as_mut() {
            Some(encoder) => encoder.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for Lz4Writer<W> {
    fn drop(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            let (mut writer, res) = encoder.finish();
            if let Err(err) = res.and_then(|_| writer.flush()) {
                log::error!("Failed to finish lz4 stream: {err}");
            }
        }
    }
}

/// Convert into a writer that compresses to the given format
///
/// The compressed stream is finalised when the writer is dropped.
pub fn compress_writer<'a, W: 'a + Write>(
    writer: W,
    compression: Option<Compression>,
) -> Result<Box<dyn Write + 'a>, std::io::Error> {
    match compression {
        Some(Compression::Bzip2) => {
            let encoder = BzEncoder::new(writer, bzip2::Compression::best());
            Ok(Box::new(encoder))
        }
        Some(Compression::Gzip(lvl)) => {
            let encoder =
                GzEncoder::new(writer, flate2::Compression::new(lvl.into()));
            Ok(Box::new(encoder))
        }
        Some(Compression::Lz4(lvl)) => {
            let encoder = lz4::EncoderBuilder::new()
                .auto_flush(true)
                .level(lvl.into())
                .build(writer)?;
            Ok(Box::new(Lz4Writer {
                encoder: Some(encoder),
            }))
        }
        Some(Compression::Zstd(lvl)) => {
            let encoder = zstd::Encoder::new(writer, lvl.into())?;
            Ok(Box::new(encoder.auto_finish()))
        }
        None => Ok(Box::new(writer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_text_compression() {
        assert_eq!("bz2".parse(), Ok(Compression::Bzip2));
        assert_eq!("GZIP_9".parse(), Ok(Compression::Gzip(9)));
        assert_eq!("gz".parse(), Ok(Compression::Gzip(GZIP_DEFAULT_LEVEL)));
        assert_eq!("zstd_19".parse(), Ok(Compression::Zstd(19)));
        assert!(matches!(
            "zstd_20".parse::<Compression>(),
            Err(ParseCompressionErr::UnsupportedLevel(..))
        ));
        assert!(matches!(
            "bzip2_3".parse::<Compression>(),
            Err(ParseCompressionErr::UnsupportedLevel(..))
        ));
        assert!(matches!(
            "rar".parse::<Compression>(),
            Err(ParseCompressionErr::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn parse_root_compression() {
        assert_eq!("none".parse(), Ok(RootCompression::None));
        assert_eq!("zlib".parse(), Ok(RootCompression::Zlib(1)));
        assert_eq!("zlib_9".parse(), Ok(RootCompression::Zlib(9)));
        assert_eq!("zstd".parse(), Ok(RootCompression::Zstd(5)));
        assert!("zlib_10".parse::<RootCompression>().is_err());
        assert!("lz4".parse::<RootCompression>().is_err());
    }
}

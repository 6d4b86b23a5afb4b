/// Read binary data
pub mod read;

/// Write binary data
pub mod write;

use std::fmt;

#[derive(Copy, Clone)]
pub enum U8 {}

#[derive(Copy, Clone)]
pub enum U16Be {}

#[derive(Copy, Clone)]
pub enum I16Be {}

#[derive(Copy, Clone)]
pub enum U24Be {}

#[derive(Copy, Clone)]
pub enum U32Be {}

/// How a 32-bit table version field is laid out.
///
/// Container-level tables (`maxp`, `post`, `vhea`, ...) store a 16.16 value where the fractional
/// part holds a decimal digit in its top nibble (`0x00025000` is version 2.5). Layout tables such
/// as `GPOS` store a plain major/minor pair of `uint16` values (`0x00010001` is version 1.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VersionEncoding {
    Fixed,
    MajorMinor,
}

/// A decoded table version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16) -> Self {
        Version { major, minor }
    }

    /// Decode a raw 32-bit version field.
    ///
    /// ```
    /// use opentype_codec::binary::{Version, VersionEncoding};
    ///
    /// assert_eq!(Version::from_raw(0x00025000, VersionEncoding::Fixed), Version::new(2, 5));
    /// assert_eq!(Version::from_raw(0x00010001, VersionEncoding::MajorMinor), Version::new(1, 1));
    /// ```
    pub fn from_raw(raw: u32, encoding: VersionEncoding) -> Self {
        let major = (raw >> 16) as u16;
        let low = (raw & 0xFFFF) as u16;
        let minor = match encoding {
            VersionEncoding::Fixed => low >> 12,
            VersionEncoding::MajorMinor => low,
        };
        Version { major, minor }
    }

    /// Encode the version back into its raw 32-bit field.
    pub fn to_raw(self, encoding: VersionEncoding) -> u32 {
        let low = match encoding {
            VersionEncoding::Fixed => self.minor << 12,
            VersionEncoding::MajorMinor => self.minor,
        };
        (u32::from(self.major) << 16) | u32::from(low)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

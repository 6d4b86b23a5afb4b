#![warn(rust_2018_idioms)]

//! Reading and writing of the OpenType `cmap` and `GPOS` tables.
//!
//! The [`binary`] module provides the offset-aware reader and writer every table is built on.
//! [`tables::cmap`] decodes character maps and builds new ones from a glyph list, and [`gpos`]
//! decodes glyph positioning lookups and writes a subset of them back.

/// Reading and writing of binary data.
pub mod binary;
pub mod error;
pub mod gpos;
pub mod layout;
pub mod size;
pub mod tables;
pub mod tag;

//! Font tables that are not part of the OpenType layout system.

pub mod cmap;

//! Construct a `cmap` table from the character assignments of a list of glyphs.
//!
//! The table always carries a Windows BMP format 4 subtable. Format 12, format 13 and format 14
//! subtables are added when the glyphs need them.

use std::convert::TryFrom;

use itertools::Itertools;
use log::debug;

use crate::error::WriteError;
use crate::tables::cmap::owned::{self, VariationSelector};
use crate::tables::cmap::{EncodingId, PlatformId, SequentialMapGroup, UvsMapping};

const MAX_CODE_POINT: u32 = 0x10FFFF;
const MAX_BMP_CODE_POINT: u32 = 0xFFFF;

/// Format 4 header plus reservedPad.
const FORMAT4_HEADER_SIZE: usize = 16;
/// One entry in each of the four parallel segment arrays.
const FORMAT4_SEGMENT_SIZE: usize = 8;
/// Room kept free below the 16-bit length limit once segments stop being added.
const FORMAT4_HEADROOM: usize = 20;

/// The characters a glyph is reachable from.
pub trait CmapGlyph {
    /// Code points that map directly to the glyph.
    fn unicodes(&self) -> &[u32];

    /// `(code point, variation selector)` sequences that map to the glyph.
    fn variation_sequences(&self) -> &[(u32, u32)];

    /// Inclusive `(start, end)` code point ranges that all map to the glyph.
    fn unicode_ranges(&self) -> &[(u32, u32)];
}

/// A plain [`CmapGlyph`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlyphMappings {
    pub unicodes: Vec<u32>,
    pub variation_sequences: Vec<(u32, u32)>,
    pub unicode_ranges: Vec<(u32, u32)>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CmapOptions {
    /// Fonts with more glyphs than this get a format 12 subtable even when every code point is
    /// in the BMP, unless explicit ranges were supplied.
    pub large_font_glyph_count: usize,
}

/// A single code point assignment. The terminator segment has no glyph.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Segment {
    start: u32,
    end: u32,
    id_delta: i16,
    glyph_id: Option<u16>,
}

struct Format4 {
    subtable: owned::CmapSubtable,
    /// Whether any BMP code point was left out to stay under the length limit.
    truncated: bool,
}

impl GlyphMappings {
    pub fn new(unicodes: Vec<u32>) -> Self {
        GlyphMappings {
            unicodes,
            ..GlyphMappings::default()
        }
    }
}

impl CmapGlyph for GlyphMappings {
    fn unicodes(&self) -> &[u32] {
        &self.unicodes
    }

    fn variation_sequences(&self) -> &[(u32, u32)] {
        &self.variation_sequences
    }

    fn unicode_ranges(&self) -> &[(u32, u32)] {
        &self.unicode_ranges
    }
}

impl Default for CmapOptions {
    fn default() -> Self {
        CmapOptions {
            large_font_glyph_count: 1000,
        }
    }
}

impl Segment {
    fn new(code: u32, glyph_id: u16) -> Self {
        Segment {
            start: code,
            end: code,
            id_delta: glyph_id.wrapping_sub(code as u16) as i16,
            glyph_id: Some(glyph_id),
        }
    }

    fn terminator() -> Self {
        Segment {
            start: 0xFFFF,
            end: 0xFFFF,
            id_delta: 1,
            glyph_id: None,
        }
    }
}

/// Build a `cmap` table for `glyphs`. The glyph id of each glyph is its index in the slice.
///
/// Every code point gets a segment of its own in format 4 and a group of its own in format 12.
/// Returns `WriteError::BadValue` for more than 65536 glyphs, or for code points, selectors and
/// ranges that reach beyond U+10FFFF.
pub fn build_cmap<G: CmapGlyph>(
    glyphs: &[G],
    options: &CmapOptions,
) -> Result<owned::Cmap, WriteError> {
    let mut segments = Vec::new();
    let mut variations = Vec::new();
    let mut ranges = Vec::new();
    let mut needs_format12 = false;

    for (index, glyph) in glyphs.iter().enumerate() {
        let glyph_id = u16::try_from(index)?;
        for &code in glyph.unicodes() {
            if code > MAX_CODE_POINT {
                return Err(WriteError::BadValue);
            }
            if code > MAX_BMP_CODE_POINT && !needs_format12 {
                debug!("cmap format 12 required for U+{:04X}", code);
                needs_format12 = true;
            }
            segments.push(Segment::new(code, glyph_id));
        }
        for &(code, selector) in glyph.variation_sequences() {
            if code > MAX_CODE_POINT || selector > MAX_CODE_POINT {
                return Err(WriteError::BadValue);
            }
            variations.push((selector, code, glyph_id));
        }
        for &(start, end) in glyph.unicode_ranges() {
            if start > end || end > MAX_CODE_POINT {
                return Err(WriteError::BadValue);
            }
            ranges.push(SequentialMapGroup {
                start_char_code: start,
                end_char_code: end,
                start_glyph_id: u32::from(glyph_id),
            });
        }
    }

    if ranges.is_empty() && glyphs.len() > options.large_font_glyph_count && !needs_format12 {
        debug!(
            "adding cmap format 12 for a font with {} glyphs",
            glyphs.len()
        );
        needs_format12 = true;
    }

    segments.sort_by_key(|segment| segment.start);
    segments.push(Segment::terminator());

    let format4 = format4_subtable(&segments)?;
    if format4.truncated && !needs_format12 {
        debug!("cmap format 4 is full, adding format 12 for the remaining code points");
        needs_format12 = true;
    }

    let mut encoding_records = vec![owned::EncodingRecord {
        platform_id: PlatformId::WINDOWS.0,
        encoding_id: EncodingId::WINDOWS_UNICODE_BMP_UCS2.0,
        sub_table: format4.subtable,
    }];

    if needs_format12 {
        let groups = segments
            .iter()
            .filter_map(|segment| {
                segment.glyph_id.map(|glyph_id| SequentialMapGroup {
                    start_char_code: segment.start,
                    end_char_code: segment.end,
                    start_glyph_id: u32::from(glyph_id),
                })
            })
            .collect();
        encoding_records.push(owned::EncodingRecord {
            platform_id: PlatformId::WINDOWS.0,
            encoding_id: EncodingId::WINDOWS_UNICODE_UCS4.0,
            sub_table: owned::CmapSubtable::Format12 {
                language: 0,
                groups,
            },
        });
    }

    if !ranges.is_empty() {
        debug!("adding cmap format 13 with {} ranges", ranges.len());
        ranges.sort_by_key(|group| group.start_char_code);
        encoding_records.push(owned::EncodingRecord {
            platform_id: PlatformId::WINDOWS.0,
            encoding_id: EncodingId::WINDOWS_UNICODE_UCS4.0,
            sub_table: owned::CmapSubtable::Format13 {
                language: 0,
                groups: ranges,
            },
        });
    }

    if !variations.is_empty() {
        debug!("adding cmap format 14 with {} sequences", variations.len());
        encoding_records.push(owned::EncodingRecord {
            platform_id: PlatformId::UNICODE.0,
            encoding_id: EncodingId::UNICODE_VARIATION_SEQUENCES.0,
            sub_table: format14_subtable(variations),
        });
    }

    Ok(owned::Cmap { encoding_records })
}

/// Lay out the sorted `segments` as a format 4 subtable.
///
/// Segments beyond the BMP are skipped. Once the subtable approaches the 16-bit length limit only
/// the terminator is added.
fn format4_subtable(segments: &[Segment]) -> Result<Format4, WriteError> {
    let mut end_codes = Vec::new();
    let mut start_codes = Vec::new();
    let mut id_deltas = Vec::new();
    let mut id_range_offsets = Vec::new();
    let mut length = FORMAT4_HEADER_SIZE;
    let mut full = false;
    let mut truncated = false;

    for segment in segments {
        if segment.end > MAX_BMP_CODE_POINT {
            continue;
        }
        if full && segment.glyph_id.is_some() {
            truncated = true;
            continue;
        }
        start_codes.push(u16::try_from(segment.start)?);
        end_codes.push(u16::try_from(segment.end)?);
        id_deltas.push(segment.id_delta);
        id_range_offsets.push(0);
        length += FORMAT4_SEGMENT_SIZE;
        full = length + FORMAT4_HEADROOM > usize::from(u16::MAX);
    }

    Ok(Format4 {
        subtable: owned::CmapSubtable::Format4 {
            language: 0,
            end_codes,
            start_codes,
            id_deltas,
            id_range_offsets,
            glyph_id_array: Vec::new(),
        },
        truncated,
    })
}

/// Every sequence is written as a non-default mapping. Selectors and code points are sorted and a
/// sequence given twice keeps the last glyph.
fn format14_subtable(variations: Vec<(u32, u32, u16)>) -> owned::CmapSubtable {
    let sorted = variations
        .into_iter()
        .sorted_by_key(|&(selector, code, _)| (selector, code));
    let by_selector = sorted.group_by(|&(selector, _, _)| selector);

    let var_selector_records = (&by_selector)
        .into_iter()
        .map(|(var_selector, sequences)| {
            let non_default_uvs = sequences
                .map(|(_, unicode_value, glyph_id)| UvsMapping {
                    unicode_value,
                    glyph_id,
                })
                .coalesce(|prev, next| {
                    if prev.unicode_value == next.unicode_value {
                        Ok(next)
                    } else {
                        Err((prev, next))
                    }
                })
                .collect();
            VariationSelector {
                var_selector,
                default_uvs: Vec::new(),
                non_default_uvs,
            }
        })
        .collect();

    owned::CmapSubtable::Format14 {
        var_selector_records,
    }
}

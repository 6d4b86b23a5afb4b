//! Reading and writing of the `cmap` character to glyph mapping table.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/cmap>

pub mod builder;

use std::collections::BTreeMap;
use std::convert::TryFrom;

use log::warn;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, U16Be, U24Be, U32Be, U8};
use crate::error::{ParseError, WriteError};
use crate::size;

/// The highest code point a group may reference.
const MAX_CODE_POINT: u32 = 0x10FFFF;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_SYMBOL: EncodingId = EncodingId(0);
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);

    pub const UNICODE_2_0_FULL: EncodingId = EncodingId(4);
    pub const UNICODE_VARIATION_SEQUENCES: EncodingId = EncodingId(5);
}

/// The `cmap` table header and its directory of encoding records.
pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

/// A decoded `cmap` subtable that still borrows the font data.
pub enum CmapSubtable<'a> {
    Format0 {
        language: u16,
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        language: u16,
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        /// The data from the start of the `idRangeOffsets` array onwards. Glyph ids in the
        /// glyph id array are addressed relative to the position of each `idRangeOffset` field.
        id_range_offsets_scope: ReadScope<'a>,
    },
    Format6 {
        language: u16,
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
    Format13 {
        language: u32,
        groups: ReadArray<'a, SequentialMapGroup>,
    },
    Format14(VariationSubtable<'a>),
}

/// A group of consecutive code points.
///
/// In a format 12 subtable the glyph id increments with the code point. In format 13 every code
/// point in the group maps to `start_glyph_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

/// Unicode variation sequences subtable (format 14).
///
/// The default and non-default UVS blocks are only read when asked for.
#[derive(Clone)]
pub struct VariationSubtable<'a> {
    scope: ReadScope<'a>,
    records: ReadArray<'a, VariationSelectorRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VariationSelectorRecord {
    pub var_selector: u32,
    pub default_uvs_offset: u32,
    pub non_default_uvs_offset: u32,
}

/// A range of code points that use their default glyph when followed by a variation selector.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnicodeRange {
    pub start_unicode_value: u32,
    pub additional_count: u8,
}

/// An explicit glyph for a variation sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UvsMapping {
    pub unicode_value: u32,
    pub glyph_id: u16,
}

/// The result of looking up a variation sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VariationMapping {
    /// Use the glyph the base code point maps to without a selector.
    UseDefault,
    Glyph(u16),
}

/// Every mapping a font's `cmap` table provides, as returned by [`read_cmap_mappings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmapMappings {
    /// Platform of the selected subtable.
    pub platform_id: u16,
    /// Encoding of the selected subtable.
    pub encoding_id: u16,
    /// Format of the selected subtable.
    pub format: u16,
    pub glyph_index_map: BTreeMap<u32, u16>,
    /// Variation sequences keyed by selector, then by base code point.
    pub variations: Option<BTreeMap<u32, BTreeMap<u32, VariationMapping>>>,
}

#[derive(Copy, Clone)]
struct Format4Calculator {
    seg_count: u16,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check_version(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl EncodingRecord {
    /// Whether this record maps Unicode code points: Windows Symbol, BMP and UCS-4, or any of the
    /// Unicode platform encodings 0 to 4.
    pub fn is_unicode_mapping(&self) -> bool {
        match PlatformId(self.platform_id) {
            PlatformId::WINDOWS => matches!(
                EncodingId(self.encoding_id),
                EncodingId::WINDOWS_SYMBOL
                    | EncodingId::WINDOWS_UNICODE_BMP_UCS2
                    | EncodingId::WINDOWS_UNICODE_UCS4
            ),
            PlatformId::UNICODE => self.encoding_id <= EncodingId::UNICODE_2_0_FULL.0,
            _ => false,
        }
    }
}

impl<'a> Cmap<'a> {
    pub fn encoding_records(&self) -> impl Iterator<Item = EncodingRecord> + 'a {
        self.encoding_records.iter()
    }

    /// Find the first encoding record for the given `platform_id` and `encoding_id`
    pub fn find_subtable(
        &self,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Option<EncodingRecord> {
        self.encoding_records.iter().find(|record| {
            record.platform_id == platform_id.0 && record.encoding_id == encoding_id.0
        })
    }

    /// Read the format number of the subtable `record` points at.
    pub fn subtable_format(&self, record: &EncodingRecord) -> Result<u16, ParseError> {
        self.subtable_scope(record)?.read::<U16Be>()
    }

    pub fn subtable(&self, record: &EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        self.subtable_scope(record)?.read::<CmapSubtable<'_>>()
    }

    /// Choose the subtable used as the primary character map.
    ///
    /// The directory is scanned from the last record to the first and every record with a Unicode
    /// mapping replaces the previous candidate, so the first declared one is chosen. The format of
    /// every record is read during the scan.
    pub fn select_subtable(&self) -> Result<(EncodingRecord, CmapSubtable<'a>), ParseError> {
        let mut selected = None;
        for index in (0..self.encoding_records.len()).rev() {
            let record = self
                .encoding_records
                .get_item(index)
                .ok_or(ParseError::BadIndex)?;
            let _format = self.subtable_format(&record)?;
            if record.is_unicode_mapping() {
                selected = Some(record);
            }
        }

        let record = selected.ok_or(ParseError::UnsuitableCmap)?;
        let subtable = self.subtable(&record)?;
        Ok((record, subtable))
    }

    fn subtable_scope(&self, record: &EncodingRecord) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(record.offset)?;
        Ok(self.scope.offset(offset))
    }
}

impl ReadBinary for CmapSubtable<'_> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtable<'a>, ParseError> {
        let subtable_scope = ctxt.scope();
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * size::U16 + 256)?;
                let language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                })
            }
            4 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets_scope = ctxt.scope();
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                Ok(CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    id_range_offsets_scope,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                })
            }
            12 | 13 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                let constant_glyph = subtable_format == 13;
                groups.check_items(|group| group.is_valid(constant_glyph))?;
                if constant_glyph {
                    Ok(CmapSubtable::Format13 { language, groups })
                } else {
                    Ok(CmapSubtable::Format12 { language, groups })
                }
            }
            14 => {
                let _length = ctxt.read_u32be()?;
                let num_records = usize::try_from(ctxt.read_u32be()?)?;
                let records = ctxt.read_array::<VariationSelectorRecord>(num_records)?;
                Ok(CmapSubtable::Format14(VariationSubtable {
                    scope: subtable_scope,
                    records,
                }))
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: subtable_scope.base(),
            }),
        }
    }
}

impl<'a> CmapSubtable<'a> {
    pub fn format(&self) -> u16 {
        match self {
            CmapSubtable::Format0 { .. } => 0,
            CmapSubtable::Format4 { .. } => 4,
            CmapSubtable::Format6 { .. } => 6,
            CmapSubtable::Format12 { .. } => 12,
            CmapSubtable::Format13 { .. } => 13,
            CmapSubtable::Format14(_) => 14,
        }
    }

    /// Look up the glyph for a single character.
    ///
    /// Format 14 subtables hold no direct mappings and always return `None`.
    pub fn map_glyph(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                let index = usize::try_from(ch)?;
                Ok(glyph_id_array.get_item(index).map(u16::from))
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                id_range_offsets_scope,
                ..
            } => {
                for index in 0..end_codes.len().saturating_sub(1) {
                    let segment =
                        Segment::get(start_codes, end_codes, id_deltas, id_range_offsets, index)?;
                    if segment.contains(ch) {
                        // NOTE(unwrap): `contains` guarantees `ch` is at most `end_code`
                        let code = u16::try_from(ch).unwrap();
                        return segment.glyph_id(*id_range_offsets_scope, code).map(Some);
                    }
                }
                Ok(None)
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => match ch.checked_sub(u32::from(*first_code)) {
                Some(index) => Ok(glyph_id_array.get_item(usize::try_from(index)?)),
                None => Ok(None),
            },
            CmapSubtable::Format12 { groups, .. } => {
                for group in groups {
                    if group.start_char_code <= ch && ch <= group.end_char_code {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        return Ok(Some(u16::try_from(glyph_id)?));
                    }
                }
                Ok(None)
            }
            CmapSubtable::Format13 { groups, .. } => {
                for group in groups {
                    if group.start_char_code <= ch && ch <= group.end_char_code {
                        return Ok(Some(u16::try_from(group.start_glyph_id)?));
                    }
                }
                Ok(None)
            }
            CmapSubtable::Format14(_) => Ok(None),
        }
    }

    /// Call `f` with every (character, glyph id) pair in the subtable.
    ///
    /// The final format 4 segment is the `0xFFFF` terminator and is not expanded. Glyph id 0 is
    /// reported like any other glyph.
    pub fn mappings_fn<F>(&self, mut f: F) -> Result<(), ParseError>
    where
        F: FnMut(u32, u16),
    {
        match self {
            CmapSubtable::Format0 { glyph_id_array, .. } => {
                for (ch, glyph_id) in (0u32..).zip(glyph_id_array.iter()) {
                    f(ch, u16::from(glyph_id));
                }
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                id_range_offsets_scope,
                ..
            } => {
                for index in 0..end_codes.len().saturating_sub(1) {
                    let segment =
                        Segment::get(start_codes, end_codes, id_deltas, id_range_offsets, index)?;
                    for code in segment.start_code..=segment.end_code {
                        let glyph_id = segment.glyph_id(*id_range_offsets_scope, code)?;
                        f(u32::from(code), glyph_id);
                    }
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
                ..
            } => {
                for (ch, glyph_id) in (u32::from(*first_code)..).zip(glyph_id_array.iter()) {
                    f(ch, glyph_id);
                }
            }
            CmapSubtable::Format12 { groups, .. } => {
                for group in groups {
                    for ch in group.start_char_code..=group.end_char_code {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        f(ch, u16::try_from(glyph_id)?);
                    }
                }
            }
            CmapSubtable::Format13 { groups, .. } => {
                for group in groups {
                    let glyph_id = u16::try_from(group.start_glyph_id)?;
                    for ch in group.start_char_code..=group.end_char_code {
                        f(ch, glyph_id);
                    }
                }
            }
            CmapSubtable::Format14(_) => {}
        }

        Ok(())
    }

    /// Collect every mapping in the subtable.
    pub fn glyph_index_map(&self) -> Result<BTreeMap<u32, u16>, ParseError> {
        let mut map = BTreeMap::new();
        self.mappings_fn(|ch, glyph_id| {
            map.insert(ch, glyph_id);
        })?;
        Ok(map)
    }
}

/// One segment of a format 4 subtable, gathered from the four parallel arrays.
struct Segment {
    index: usize,
    start_code: u16,
    end_code: u16,
    id_delta: i16,
    id_range_offset: u16,
}

impl Segment {
    fn get(
        start_codes: &ReadArray<'_, U16Be>,
        end_codes: &ReadArray<'_, U16Be>,
        id_deltas: &ReadArray<'_, I16Be>,
        id_range_offsets: &ReadArray<'_, U16Be>,
        index: usize,
    ) -> Result<Segment, ParseError> {
        let missing = || ParseError::BadIndex;
        Ok(Segment {
            index,
            start_code: start_codes.get_item(index).ok_or_else(missing)?,
            end_code: end_codes.get_item(index).ok_or_else(missing)?,
            id_delta: id_deltas.get_item(index).ok_or_else(missing)?,
            id_range_offset: id_range_offsets.get_item(index).ok_or_else(missing)?,
        })
    }

    fn contains(&self, ch: u32) -> bool {
        u32::from(self.start_code) <= ch && ch <= u32::from(self.end_code)
    }

    /// `id_range_offsets_scope` starts at the first `idRangeOffset` field.
    fn glyph_id(
        &self,
        id_range_offsets_scope: ReadScope<'_>,
        code: u16,
    ) -> Result<u16, ParseError> {
        let delta = self.id_delta as u16;
        if self.id_range_offset == 0 {
            return Ok(code.wrapping_add(delta));
        }

        let offset = self.index * size::U16
            + usize::from(self.id_range_offset)
            + usize::from(code - self.start_code) * size::U16;
        let glyph_id = id_range_offsets_scope.offset(offset).read::<U16Be>()?;
        if glyph_id == 0 {
            Ok(0)
        } else {
            Ok(glyph_id.wrapping_add(delta))
        }
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);

    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl WriteBinary for SequentialMapGroup {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, group: SequentialMapGroup) -> Result<(), WriteError> {
        U32Be::write(ctxt, group.start_char_code)?;
        U32Be::write(ctxt, group.end_char_code)?;
        U32Be::write(ctxt, group.start_glyph_id)?;

        Ok(())
    }
}

impl SequentialMapGroup {
    /// Check that the group covers real code points and that every glyph id it produces fits in
    /// 16 bits.
    fn is_valid(&self, constant_glyph: bool) -> bool {
        if self.start_char_code > self.end_char_code || self.end_char_code > MAX_CODE_POINT {
            return false;
        }
        let last_glyph_id = if constant_glyph {
            Some(self.start_glyph_id)
        } else {
            self.start_glyph_id
                .checked_add(self.end_char_code - self.start_char_code)
        };
        matches!(last_glyph_id, Some(glyph_id) if glyph_id <= u32::from(u16::MAX))
    }
}

impl ReadFrom for VariationSelectorRecord {
    type ReadType = (U24Be, U32Be, U32Be);

    fn read_from(
        (var_selector, default_uvs_offset, non_default_uvs_offset): (u32, u32, u32),
    ) -> Self {
        VariationSelectorRecord {
            var_selector,
            default_uvs_offset,
            non_default_uvs_offset,
        }
    }
}

impl ReadFrom for UnicodeRange {
    type ReadType = (U24Be, U8);

    fn read_from((start_unicode_value, additional_count): (u32, u8)) -> Self {
        UnicodeRange {
            start_unicode_value,
            additional_count,
        }
    }
}

impl WriteBinary for UnicodeRange {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, range: UnicodeRange) -> Result<(), WriteError> {
        U24Be::write(ctxt, range.start_unicode_value)?;
        U8::write(ctxt, range.additional_count)?;
        Ok(())
    }
}

impl UnicodeRange {
    pub fn contains(&self, ch: u32) -> bool {
        self.start_unicode_value <= ch
            && ch - self.start_unicode_value <= u32::from(self.additional_count)
    }

    pub fn code_points(&self) -> impl Iterator<Item = u32> {
        let start = self.start_unicode_value;
        (0..=u32::from(self.additional_count)).map(move |delta| start + delta)
    }
}

impl ReadFrom for UvsMapping {
    type ReadType = (U24Be, U16Be);

    fn read_from((unicode_value, glyph_id): (u32, u16)) -> Self {
        UvsMapping {
            unicode_value,
            glyph_id,
        }
    }
}

impl WriteBinary for UvsMapping {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, mapping: UvsMapping) -> Result<(), WriteError> {
        U24Be::write(ctxt, mapping.unicode_value)?;
        U16Be::write(ctxt, mapping.glyph_id)?;
        Ok(())
    }
}

impl VariationSelectorRecord {
    /// Read the default UVS block. A null offset gives an empty list.
    pub fn default_uvs(
        &self,
        subtable: &VariationSubtable<'_>,
    ) -> Result<Vec<UnicodeRange>, ParseError> {
        subtable.read_block::<UnicodeRange>(self.default_uvs_offset)
    }

    /// Read the non-default UVS block. A null offset gives an empty list.
    pub fn non_default_uvs(
        &self,
        subtable: &VariationSubtable<'_>,
    ) -> Result<Vec<UvsMapping>, ParseError> {
        subtable.read_block::<UvsMapping>(self.non_default_uvs_offset)
    }
}

impl<'a> VariationSubtable<'a> {
    pub fn records(&self) -> impl Iterator<Item = VariationSelectorRecord> + 'a {
        self.records.iter()
    }

    /// Look up the variation sequence `ch` followed by `selector`.
    ///
    /// An explicit glyph in the non-default block takes precedence over the default block.
    pub fn map_variant(
        &self,
        ch: u32,
        selector: u32,
    ) -> Result<Option<VariationMapping>, ParseError> {
        let record = match self.records().find(|record| record.var_selector == selector) {
            Some(record) => record,
            None => return Ok(None),
        };

        let non_default = record.non_default_uvs(self)?;
        if let Some(mapping) = non_default.iter().find(|mapping| mapping.unicode_value == ch) {
            return Ok(Some(VariationMapping::Glyph(mapping.glyph_id)));
        }
        let default = record.default_uvs(self)?;
        if default.iter().any(|range| range.contains(ch)) {
            return Ok(Some(VariationMapping::UseDefault));
        }
        Ok(None)
    }

    /// Expand every record into a map keyed by selector, then by base code point.
    pub fn variation_map(
        &self,
    ) -> Result<BTreeMap<u32, BTreeMap<u32, VariationMapping>>, ParseError> {
        let mut variations: BTreeMap<u32, BTreeMap<u32, VariationMapping>> = BTreeMap::new();
        for record in self.records() {
            let map = variations.entry(record.var_selector).or_default();
            for range in record.default_uvs(self)? {
                for ch in range.code_points() {
                    map.insert(ch, VariationMapping::UseDefault);
                }
            }
            for mapping in record.non_default_uvs(self)? {
                map.insert(mapping.unicode_value, VariationMapping::Glyph(mapping.glyph_id));
            }
        }
        Ok(variations)
    }

    fn read_block<T>(&self, offset: u32) -> Result<Vec<T>, ParseError>
    where
        T: ReadFrom,
    {
        if offset == 0 {
            return Ok(Vec::new());
        }
        let mut ctxt = self.scope.offset(usize::try_from(offset)?).ctxt();
        let count = usize::try_from(ctxt.read_u32be()?)?;
        let array = ctxt.read_array::<T>(count)?;
        Ok(array.iter().collect())
    }
}

/// Decode the `cmap` table in `scope` into a single character map.
///
/// The primary map comes from the subtable chosen by [`Cmap::select_subtable`]. Characters it
/// does not cover are filled in from the other Unicode subtables in directory order, which
/// brings in the supplementary plane groups of a format 12 or 13 subtable next to a format 4
/// one. Those secondary subtables are optional; failures reading them are logged and skipped.
/// Variation sequences come from the first format 14 subtable.
pub fn read_cmap_mappings(scope: ReadScope<'_>) -> Result<CmapMappings, ParseError> {
    let cmap = scope.read::<Cmap<'_>>()?;
    let (selected, subtable) = cmap.select_subtable()?;
    let mut glyph_index_map = subtable.glyph_index_map()?;

    for record in cmap.encoding_records() {
        if record == selected || !record.is_unicode_mapping() {
            continue;
        }
        let merged = cmap.subtable(&record).and_then(|other| {
            other.mappings_fn(|ch, glyph_id| {
                glyph_index_map.entry(ch).or_insert(glyph_id);
            })
        });
        if let Err(err) = merged {
            warn!(
                "skipping cmap subtable ({}, {}): {}",
                record.platform_id, record.encoding_id, err
            );
        }
    }

    let mut variations = None;
    for record in cmap.encoding_records() {
        if cmap.subtable_format(&record)? == 14 {
            if let CmapSubtable::Format14(uvs) = cmap.subtable(&record)? {
                variations = Some(uvs.variation_map()?);
            }
            break;
        }
    }

    Ok(CmapMappings {
        platform_id: selected.platform_id,
        encoding_id: selected.encoding_id,
        format: subtable.format(),
        glyph_index_map,
        variations,
    })
}

impl Format4Calculator {
    fn seg_count_x2(self) -> u16 {
        2 * self.seg_count
    }

    /// Twice the largest power of two not exceeding the segment count.
    fn search_range(self) -> u16 {
        match self.seg_count.checked_ilog2() {
            Some(log2) => 2 * (1u16 << log2),
            None => 0,
        }
    }

    fn entry_selector(self) -> u16 {
        self.seg_count.checked_ilog2().map_or(0, |log2| log2 as u16)
    }

    fn range_shift(self) -> u16 {
        self.seg_count_x2() - self.search_range()
    }
}

pub mod owned {
    //! `cmap` structures that own their data, for writing.

    use super::{
        size, Format4Calculator, I16Be, SequentialMapGroup, TryFrom, U16Be, U24Be, U32Be,
        UnicodeRange, UvsMapping, WriteBinary, WriteContext, WriteError,
    };
    use crate::binary::write::offset32;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Cmap {
        pub encoding_records: Vec<EncodingRecord>,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct EncodingRecord {
        pub platform_id: u16,
        pub encoding_id: u16,
        pub sub_table: CmapSubtable,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CmapSubtable {
        Format0 {
            language: u16,
            glyph_id_array: Box<[u8; 256]>,
        },
        Format4 {
            language: u16,
            end_codes: Vec<u16>,
            start_codes: Vec<u16>,
            id_deltas: Vec<i16>,
            id_range_offsets: Vec<u16>,
            glyph_id_array: Vec<u16>,
        },
        Format6 {
            language: u16,
            first_code: u16,
            glyph_id_array: Vec<u16>,
        },
        Format12 {
            language: u32,
            groups: Vec<SequentialMapGroup>,
        },
        Format13 {
            language: u32,
            groups: Vec<SequentialMapGroup>,
        },
        Format14 {
            var_selector_records: Vec<VariationSelector>,
        },
    }

    /// One variation selector and the sequences that use it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct VariationSelector {
        pub var_selector: u32,
        pub default_uvs: Vec<UnicodeRange>,
        pub non_default_uvs: Vec<UvsMapping>,
    }

    impl CmapSubtable {
        pub fn format(&self) -> u16 {
            match self {
                CmapSubtable::Format0 { .. } => 0,
                CmapSubtable::Format4 { .. } => 4,
                CmapSubtable::Format6 { .. } => 6,
                CmapSubtable::Format12 { .. } => 12,
                CmapSubtable::Format13 { .. } => 13,
                CmapSubtable::Format14 { .. } => 14,
            }
        }
    }

    impl WriteBinary<&Self> for Cmap {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, table: &Cmap) -> Result<(), WriteError> {
            let start = ctxt.bytes_written();
            U16Be::write(ctxt, 0u16)?; // version
            U16Be::write(ctxt, u16::try_from(table.encoding_records.len())?)?;

            let mut offsets = Vec::with_capacity(table.encoding_records.len());
            for record in &table.encoding_records {
                U16Be::write(ctxt, record.platform_id)?;
                U16Be::write(ctxt, record.encoding_id)?;
                offsets.push(ctxt.placeholder::<U32Be, u32>()?);
            }

            for (record, placeholder) in table.encoding_records.iter().zip(offsets) {
                let offset = offset32(start, ctxt.bytes_written())?;
                CmapSubtable::write(ctxt, &record.sub_table)?;
                ctxt.write_placeholder(placeholder, offset)?;
            }

            Ok(())
        }
    }

    impl WriteBinary<&Self> for CmapSubtable {
        type Output = ();

        fn write<C: WriteContext>(ctxt: &mut C, table: &CmapSubtable) -> Result<(), WriteError> {
            match table {
                CmapSubtable::Format0 {
                    language,
                    glyph_id_array,
                } => {
                    U16Be::write(ctxt, 0u16)?; // format
                    U16Be::write(ctxt, u16::try_from(3 * size::U16 + glyph_id_array.len())?)?; // length
                    U16Be::write(ctxt, *language)?;
                    ctxt.write_bytes(glyph_id_array.as_ref())?;
                }
                CmapSubtable::Format4 {
                    language,
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                } => {
                    let seg_count = start_codes.len();
                    if end_codes.len() != seg_count
                        || id_deltas.len() != seg_count
                        || id_range_offsets.len() != seg_count
                    {
                        return Err(WriteError::BadValue);
                    }
                    // Header and reservedPad, four parallel arrays, then the glyph id array.
                    let length = 8 * size::U16
                        + 4 * size::U16 * seg_count
                        + size::U16 * glyph_id_array.len();
                    let length = u16::try_from(length).map_err(|_| WriteError::Overflow)?;
                    let calc = Format4Calculator {
                        seg_count: u16::try_from(seg_count)?,
                    };

                    U16Be::write(ctxt, 4u16)?; // format
                    U16Be::write(ctxt, length)?;
                    U16Be::write(ctxt, *language)?;
                    U16Be::write(ctxt, calc.seg_count_x2())?;
                    U16Be::write(ctxt, calc.search_range())?;
                    U16Be::write(ctxt, calc.entry_selector())?;
                    U16Be::write(ctxt, calc.range_shift())?;
                    ctxt.write_iter::<U16Be, _>(end_codes.iter().copied())?;
                    U16Be::write(ctxt, 0u16)?; // reserved_pad
                    ctxt.write_iter::<U16Be, _>(start_codes.iter().copied())?;
                    ctxt.write_iter::<I16Be, _>(id_deltas.iter().copied())?;
                    ctxt.write_iter::<U16Be, _>(id_range_offsets.iter().copied())?;
                    ctxt.write_iter::<U16Be, _>(glyph_id_array.iter().copied())?;
                }
                CmapSubtable::Format6 {
                    language,
                    first_code,
                    glyph_id_array,
                } => {
                    let length = 5 * size::U16 + size::U16 * glyph_id_array.len();

                    U16Be::write(ctxt, 6u16)?; // format
                    U16Be::write(ctxt, u16::try_from(length).map_err(|_| WriteError::Overflow)?)?;
                    U16Be::write(ctxt, *language)?;
                    U16Be::write(ctxt, *first_code)?;
                    U16Be::write(ctxt, u16::try_from(glyph_id_array.len())?)?;
                    ctxt.write_iter::<U16Be, _>(glyph_id_array.iter().copied())?;
                }
                CmapSubtable::Format12 { language, groups } => {
                    write_groups(ctxt, 12, *language, groups)?;
                }
                CmapSubtable::Format13 { language, groups } => {
                    write_groups(ctxt, 13, *language, groups)?;
                }
                CmapSubtable::Format14 {
                    var_selector_records,
                } => {
                    let start = ctxt.bytes_written();
                    U16Be::write(ctxt, 14u16)?; // format
                    let length = ctxt.placeholder::<U32Be, u32>()?;
                    U32Be::write(ctxt, u32::try_from(var_selector_records.len())?)?;

                    let mut offsets = Vec::with_capacity(var_selector_records.len());
                    for record in var_selector_records {
                        U24Be::write(ctxt, record.var_selector)?;
                        let default_uvs = ctxt.placeholder::<U32Be, u32>()?;
                        let non_default_uvs = ctxt.placeholder::<U32Be, u32>()?;
                        offsets.push((default_uvs, non_default_uvs));
                    }

                    for (record, (default_uvs, non_default_uvs)) in
                        var_selector_records.iter().zip(offsets)
                    {
                        if !record.default_uvs.is_empty() {
                            let offset = offset32(start, ctxt.bytes_written())?;
                            U32Be::write(ctxt, u32::try_from(record.default_uvs.len())?)?;
                            ctxt.write_iter::<UnicodeRange, _>(record.default_uvs.iter().copied())?;
                            ctxt.write_placeholder(default_uvs, offset)?;
                        }
                        if !record.non_default_uvs.is_empty() {
                            let offset = offset32(start, ctxt.bytes_written())?;
                            U32Be::write(ctxt, u32::try_from(record.non_default_uvs.len())?)?;
                            ctxt.write_iter::<UvsMapping, _>(
                                record.non_default_uvs.iter().copied(),
                            )?;
                            ctxt.write_placeholder(non_default_uvs, offset)?;
                        }
                    }

                    let total = offset32(start, ctxt.bytes_written())?;
                    ctxt.write_placeholder(length, total)?;
                }
            }

            Ok(())
        }
    }

    fn write_groups<C: WriteContext>(
        ctxt: &mut C,
        format: u16,
        language: u32,
        groups: &[SequentialMapGroup],
    ) -> Result<(), WriteError> {
        let length = 2 * size::U16 + 3 * size::U32 + 3 * size::U32 * groups.len();

        U16Be::write(ctxt, format)?;
        U16Be::write(ctxt, 0u16)?; // reserved
        U32Be::write(ctxt, u32::try_from(length).map_err(|_| WriteError::Overflow)?)?;
        U32Be::write(ctxt, language)?;
        U32Be::write(ctxt, u32::try_from(groups.len())?)?;
        ctxt.write_iter::<SequentialMapGroup, _>(groups.iter().copied())?;
        Ok(())
    }
}

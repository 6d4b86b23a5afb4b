//! Structures shared by the OpenType layout tables.
//!
//! This covers the script list, feature list and feature variations that make up the header of
//! `GPOS` (and `GSUB`), along with the coverage and class definition tables and the contextual
//! rule structures that lookups of several types are built from.
//!
//! Everything here is decoded into owned values. Offsets are resolved while reading and recomputed
//! when writing.

use bitflags::bitflags;

use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadFrom,
    ReadScope,
};
use crate::binary::write::{offset16, Placeholder, WriteBinary, WriteContext};
use crate::binary::{U16Be, U32Be, Version, VersionEncoding};
use crate::error::{ParseError, WriteError};
use crate::size;
use crate::tag;
use std::cmp::Ordering;
use std::convert::TryFrom;

bitflags! {
    /// Lookup qualifiers.
    ///
    /// <https://learn.microsoft.com/en-us/typography/opentype/spec/chapter2#lookup-table>
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct LookupFlag: u16 {
        /// Cursive attachment is right-to-left.
        const RIGHT_TO_LEFT = 0x0001;
        const IGNORE_BASE_GLYPHS = 0x0002;
        const IGNORE_LIGATURES = 0x0004;
        const IGNORE_MARKS = 0x0008;
        /// The lookup is followed by a mark filtering set index.
        const USE_MARK_FILTERING_SET = 0x0010;
        // 0x00E0 reserved
        /// Mark attachment class filter in the high byte.
        const MARK_ATTACHMENT_TYPE_MASK = 0xFF00;
    }
}

impl LookupFlag {
    pub fn mark_attachment_type(self) -> u8 {
        (self.bits() >> 8) as u8
    }

    pub fn use_mark_filtering_set(self) -> bool {
        self.contains(LookupFlag::USE_MARK_FILTERING_SET)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptList {
    pub script_records: Vec<ScriptRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptRecord {
    pub script_tag: u32,
    pub script_table: ScriptTable,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptTable {
    pub opt_default_langsys: Option<LangSys>,
    pub langsys_records: Vec<LangSysRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LangSysRecord {
    pub langsys_tag: u32,
    pub langsys_table: LangSys,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LangSys {
    /// Index of a feature required for this language system, `0xFFFF` in the font when there is
    /// none.
    pub required_feature_index: Option<u16>,
    pub feature_indices: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureList {
    pub feature_records: Vec<FeatureRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub feature_tag: u32,
    pub feature_table: FeatureTable,
}

/// A feature table.
///
/// Feature parameters are not retained; the offset is written back as 0.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub lookup_indices: Vec<u16>,
}

/// Feature variations, present in version 1.1 layout tables.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVariations {
    pub version: Version,
    pub records: Vec<FeatureVariationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVariationRecord {
    pub opt_condition_set: Option<ConditionSet>,
    pub opt_substitutions: Option<FeatureTableSubstitution>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionSet {
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Font variation axis range. Range limits are F2DOT14 values in normalised coordinates.
    Format1 {
        axis_index: u16,
        filter_range_min_value: i16,
        filter_range_max_value: i16,
    },
    /// A condition format this crate does not interpret.
    Unsupported { format: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTableSubstitution {
    pub version: Version,
    pub substitutions: Vec<FeatureTableSubstitutionRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTableSubstitutionRecord {
    pub feature_index: u16,
    pub alternate_feature_table: FeatureTable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Coverage {
    Format1 {
        glyph_array: Vec<u16>,
    },
    Format2 {
        coverage_range_array: Vec<CoverageRangeRecord>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CoverageRangeRecord {
    pub start_glyph: u16,
    pub end_glyph: u16,
    pub start_coverage_index: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassDef {
    Format1 {
        start_glyph: u16,
        class_value_array: Vec<u16>,
    },
    Format2 {
        class_range_array: Vec<ClassRangeRecord>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClassRangeRecord {
    pub start_glyph: u16,
    pub end_glyph: u16,
    pub class_value: u16,
}

/// Contextual positioning (and substitution) subtable.
///
/// Lookup records are `(sequence_index, lookup_list_index)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextLookup {
    Format1 {
        coverage: Coverage,
        rule_sets: Vec<Option<RuleSet>>,
    },
    Format2 {
        coverage: Coverage,
        classdef: ClassDef,
        class_sets: Vec<Option<RuleSet>>,
    },
    Format3 {
        coverages: Vec<Coverage>,
        lookup_records: Vec<(u16, u16)>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
}

/// A sequence rule. In class-based sets `input_sequence` holds classes rather than glyph ids.
///
/// The first input glyph is implied by the coverage table and not stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rule {
    pub input_sequence: Vec<u16>,
    pub lookup_records: Vec<(u16, u16)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainContextLookup {
    Format1 {
        coverage: Coverage,
        chain_rule_sets: Vec<Option<ChainRuleSet>>,
    },
    Format2 {
        coverage: Coverage,
        opt_backtrack_classdef: Option<ClassDef>,
        input_classdef: ClassDef,
        opt_lookahead_classdef: Option<ClassDef>,
        chain_class_sets: Vec<Option<ChainRuleSet>>,
    },
    Format3 {
        backtrack_coverages: Vec<Coverage>,
        input_coverages: Vec<Coverage>,
        lookahead_coverages: Vec<Coverage>,
        lookup_records: Vec<(u16, u16)>,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainRuleSet {
    pub chain_rules: Vec<ChainRule>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainRule {
    pub backtrack_sequence: Vec<u16>,
    pub input_sequence: Vec<u16>,
    pub lookahead_sequence: Vec<u16>,
    pub lookup_records: Vec<(u16, u16)>,
}

impl ReadBinary for ScriptList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let script_count = usize::from(ctxt.read_u16be()?);
        let script_records = ctxt
            .read_array_dep::<ScriptRecord>(script_count, scope)?
            .read_to_vec()?;
        Ok(ScriptList { script_records })
    }
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_u32be()?;
        let script_table = ctxt
            .read_pointer::<U16Be, ScriptTable>(scope)?
            .unwrap_or_default();
        Ok(ScriptRecord {
            script_tag,
            script_table,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for ScriptTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let opt_default_langsys = ctxt.read_pointer::<U16Be, LangSys>(scope)?;
        let langsys_count = usize::from(ctxt.read_u16be()?);
        let langsys_records = ctxt
            .read_array_dep::<LangSysRecord>(langsys_count, scope)?
            .read_to_vec()?;
        Ok(ScriptTable {
            opt_default_langsys,
            langsys_records,
        })
    }
}

impl ReadBinaryDep for LangSysRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LangSysRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let langsys_tag = ctxt.read_u32be()?;
        let langsys_table = ctxt
            .read_pointer::<U16Be, LangSys>(scope)?
            .unwrap_or_default();
        Ok(LangSysRecord {
            langsys_tag,
            langsys_table,
        })
    }
}

impl ReadFixedSizeDep for LangSysRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _lookup_order = ctxt.read_u16be()?; // reserved, should be zero
        let required_feature_index = match ctxt.read_u16be()? {
            0xFFFF => None,
            index => Some(index),
        };
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            required_feature_index,
            feature_indices,
        })
    }
}

impl ReadBinary for FeatureList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let feature_count = usize::from(ctxt.read_u16be()?);
        let feature_records = ctxt
            .read_array_dep::<FeatureRecord>(feature_count, scope)?
            .read_to_vec()?;
        Ok(FeatureList { feature_records })
    }
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_u32be()?;
        let feature_table = ctxt
            .read_pointer::<U16Be, FeatureTable>(scope)?
            .unwrap_or_default();
        Ok(FeatureRecord {
            feature_tag,
            feature_table,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for FeatureTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _feature_params = ctxt.read_u16be()?;
        let lookup_index_count = usize::from(ctxt.read_u16be()?);
        let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
        Ok(FeatureTable { lookup_indices })
    }
}

impl ReadBinary for FeatureVariations {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_version(VersionEncoding::MajorMinor)?;
        ctxt.check_version(version.major == 1)?;
        let record_count = usize::try_from(ctxt.read_u32be()?)?;
        let records = ctxt
            .read_array_dep::<FeatureVariationRecord>(record_count, scope)?
            .read_to_vec()?;
        Ok(FeatureVariations { version, records })
    }
}

impl ReadBinaryDep for FeatureVariationRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureVariationRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let opt_condition_set = ctxt.read_pointer::<U32Be, ConditionSet>(scope)?;
        let opt_substitutions = ctxt.read_pointer::<U32Be, FeatureTableSubstitution>(scope)?;
        Ok(FeatureVariationRecord {
            opt_condition_set,
            opt_substitutions,
        })
    }
}

impl ReadFixedSizeDep for FeatureVariationRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        2 * size::U32
    }
}

impl ReadBinary for ConditionSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let condition_count = usize::from(ctxt.read_u16be()?);
        let mut conditions = Vec::with_capacity(condition_count);
        for _ in 0..condition_count {
            let condition = ctxt
                .read_pointer::<U32Be, Condition>(scope)?
                .ok_or(ParseError::BadOffset)?;
            conditions.push(condition);
        }
        Ok(ConditionSet { conditions })
    }
}

impl ReadBinary for Condition {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let axis_index = ctxt.read_u16be()?;
                let filter_range_min_value = ctxt.read_i16be()?;
                let filter_range_max_value = ctxt.read_i16be()?;
                Ok(Condition::Format1 {
                    axis_index,
                    filter_range_min_value,
                    filter_range_max_value,
                })
            }
            format => Ok(Condition::Unsupported { format }),
        }
    }
}

impl ReadBinary for FeatureTableSubstitution {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_version(VersionEncoding::MajorMinor)?;
        ctxt.check_version(version.major == 1)?;
        let substitution_count = usize::from(ctxt.read_u16be()?);
        let mut substitutions = Vec::with_capacity(substitution_count);
        for _ in 0..substitution_count {
            let feature_index = ctxt.read_u16be()?;
            let alternate_feature_table = ctxt
                .read_pointer::<U32Be, FeatureTable>(scope)?
                .ok_or(ParseError::BadOffset)?;
            substitutions.push(FeatureTableSubstitutionRecord {
                feature_index,
                alternate_feature_table,
            });
        }
        Ok(FeatureTableSubstitution {
            version,
            substitutions,
        })
    }
}

impl ScriptList {
    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.script_records
            .iter()
            .find(|record| record.script_tag == script_tag)
            .map(|record| &record.script_table)
    }

    /// Find `script_tag`, falling back to the `DFLT` script.
    pub fn find_script_or_default(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.find_script(script_tag)
            .or_else(|| self.find_script(tag::DFLT))
    }
}

impl ScriptTable {
    pub fn default_langsys_record(&self) -> Option<&LangSys> {
        self.opt_default_langsys.as_ref()
    }

    pub fn find_langsys(&self, langsys_tag: u32) -> Option<&LangSys> {
        self.langsys_records
            .iter()
            .find(|record| record.langsys_tag == langsys_tag)
            .map(|record| &record.langsys_table)
    }

    pub fn find_langsys_or_default(&self, opt_lang_tag: Option<u32>) -> Option<&LangSys> {
        match opt_lang_tag {
            Some(lang_tag) => self
                .find_langsys(lang_tag)
                .or_else(|| self.default_langsys_record()),
            None => self.default_langsys_record(),
        }
    }
}

impl FeatureList {
    pub fn nth_feature_record(&self, index: usize) -> Result<&FeatureRecord, ParseError> {
        self.feature_records.check_index(index)?;
        Ok(&self.feature_records[index])
    }

    /// Find the feature with `feature_tag` among the features enabled by `langsys`.
    pub fn find_langsys_feature(
        &self,
        langsys: &LangSys,
        feature_tag: u32,
    ) -> Result<Option<&FeatureTable>, ParseError> {
        for feature_index in &langsys.feature_indices {
            let feature_record = self.nth_feature_record(usize::from(*feature_index))?;
            if feature_record.feature_tag == feature_tag {
                return Ok(Some(&feature_record.feature_table));
            }
        }
        Ok(None)
    }
}

impl WriteBinary<&Self> for ScriptList {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, script_list: &ScriptList) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        U16Be::write(ctxt, u16::try_from(script_list.script_records.len())?)?;
        let mut offsets = Vec::with_capacity(script_list.script_records.len());
        for record in &script_list.script_records {
            U32Be::write(ctxt, record.script_tag)?;
            offsets.push(ctxt.placeholder::<U16Be, _>()?);
        }
        for (record, placeholder) in script_list.script_records.iter().zip(offsets) {
            write_subtable::<_, ScriptTable, _>(ctxt, start, placeholder, &record.script_table)?;
        }
        Ok(())
    }
}

impl WriteBinary<&Self> for ScriptTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, script: &ScriptTable) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        let default_langsys = ctxt.placeholder::<U16Be, _>()?;
        U16Be::write(ctxt, u16::try_from(script.langsys_records.len())?)?;
        let mut offsets = Vec::with_capacity(script.langsys_records.len());
        for record in &script.langsys_records {
            U32Be::write(ctxt, record.langsys_tag)?;
            offsets.push(ctxt.placeholder::<U16Be, _>()?);
        }
        write_opt_subtable::<_, LangSys, _>(
            ctxt,
            start,
            default_langsys,
            script.opt_default_langsys.as_ref(),
        )?;
        for (record, placeholder) in script.langsys_records.iter().zip(offsets) {
            write_subtable::<_, LangSys, _>(ctxt, start, placeholder, &record.langsys_table)?;
        }
        Ok(())
    }
}

impl WriteBinary<&Self> for LangSys {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, langsys: &LangSys) -> Result<(), WriteError> {
        U16Be::write(ctxt, 0u16)?; // lookup_order
        U16Be::write(ctxt, langsys.required_feature_index.unwrap_or(0xFFFF))?;
        U16Be::write(ctxt, u16::try_from(langsys.feature_indices.len())?)?;
        ctxt.write_iter::<U16Be, _>(langsys.feature_indices.iter().copied())
    }
}

impl WriteBinary<&Self> for FeatureList {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, feature_list: &FeatureList) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        U16Be::write(ctxt, u16::try_from(feature_list.feature_records.len())?)?;
        let mut offsets = Vec::with_capacity(feature_list.feature_records.len());
        for record in &feature_list.feature_records {
            U32Be::write(ctxt, record.feature_tag)?;
            offsets.push(ctxt.placeholder::<U16Be, _>()?);
        }
        for (record, placeholder) in feature_list.feature_records.iter().zip(offsets) {
            write_subtable::<_, FeatureTable, _>(ctxt, start, placeholder, &record.feature_table)?;
        }
        Ok(())
    }
}

impl WriteBinary<&Self> for FeatureTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, feature: &FeatureTable) -> Result<(), WriteError> {
        U16Be::write(ctxt, 0u16)?; // feature_params
        U16Be::write(ctxt, u16::try_from(feature.lookup_indices.len())?)?;
        ctxt.write_iter::<U16Be, _>(feature.lookup_indices.iter().copied())
    }
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = ctxt.read_u16be()?;
                let glyph_array = ctxt.read_array::<U16Be>(usize::from(glyph_count))?;
                // The glyph indices must be in numerical order for binary searching of the list.
                // https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2#coverage-format-1
                Ok(Coverage::Format1 {
                    glyph_array: glyph_array.to_vec(),
                })
            }
            2 => {
                let coverage_range_count = ctxt.read_u16be()?;
                let coverage_range_array =
                    ctxt.read_array::<CoverageRangeRecord>(usize::from(coverage_range_count))?;
                coverage_range_array.check_items(|range| range.start_glyph <= range.end_glyph)?;
                Ok(Coverage::Format2 {
                    coverage_range_array: coverage_range_array.to_vec(),
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl WriteBinary<&Self> for Coverage {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, coverage: &Coverage) -> Result<(), WriteError> {
        match coverage {
            Coverage::Format1 { glyph_array } => {
                U16Be::write(ctxt, 1u16)?;
                U16Be::write(ctxt, u16::try_from(glyph_array.len())?)?;
                ctxt.write_iter::<U16Be, _>(glyph_array.iter().copied())
            }
            Coverage::Format2 {
                coverage_range_array,
            } => {
                U16Be::write(ctxt, 2u16)?;
                U16Be::write(ctxt, u16::try_from(coverage_range_array.len())?)?;
                for range in coverage_range_array {
                    U16Be::write(ctxt, range.start_glyph)?;
                    U16Be::write(ctxt, range.end_glyph)?;
                    U16Be::write(ctxt, range.start_coverage_index)?;
                }
                Ok(())
            }
        }
    }
}

impl Coverage {
    /// Build a format 2 coverage table from glyph ids in ascending order, merging consecutive
    /// glyphs into ranges.
    pub fn ranges_from_glyphs(glyphs: &[u16]) -> Coverage {
        let mut coverage_range_array: Vec<CoverageRangeRecord> = Vec::new();
        for (index, &glyph) in glyphs.iter().enumerate() {
            match coverage_range_array.last_mut() {
                Some(range) if range.end_glyph.checked_add(1) == Some(glyph) => {
                    range.end_glyph = glyph
                }
                _ => coverage_range_array.push(CoverageRangeRecord {
                    start_glyph: glyph,
                    end_glyph: glyph,
                    start_coverage_index: index as u16,
                }),
            }
        }
        Coverage::Format2 {
            coverage_range_array,
        }
    }

    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        match *self {
            Coverage::Format1 { ref glyph_array } => {
                // The glyph indices must be in numerical order for binary searching of the list.
                // https://docs.microsoft.com/en-us/typography/opentype/spec/chapter2#coverage-format-1
                glyph_array
                    .binary_search(&glyph)
                    .ok()
                    .and_then(|index| u16::try_from(index).ok())
            }
            Coverage::Format2 {
                ref coverage_range_array,
            } => {
                // Ranges are ordered by start glyph and do not overlap
                let index = coverage_range_array
                    .binary_search_by(|range| {
                        range_order(range.start_glyph, range.end_glyph, glyph)
                    })
                    .ok()?;
                let range = &coverage_range_array[index];
                range
                    .start_coverage_index
                    .checked_add(glyph - range.start_glyph)
            }
        }
    }

    /// Convenience method to count the total number of glyphs covered
    pub fn glyph_count(&self) -> usize {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array.len(),
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array
                .iter()
                .fold(0, |acc, coverage_range_record| {
                    acc + (usize::from(coverage_range_record.end_glyph))
                        - (usize::from(coverage_range_record.start_glyph))
                        + 1
                }),
        }
    }

    /// The covered glyphs in coverage index order.
    pub fn glyphs(&self) -> Vec<u16> {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array.clone(),
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array
                .iter()
                .flat_map(|range| range.start_glyph..=range.end_glyph)
                .collect(),
        }
    }
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = ctxt.read_u16be()?;
                let class_value_array =
                    ctxt.read_array::<U16Be>(usize::from(glyph_count))?.to_vec();
                Ok(ClassDef::Format1 {
                    start_glyph,
                    class_value_array,
                })
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_range_array = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)
                    // Some fonts declare more class ranges than the table holds. Cap the length
                    // based on the available bytes.
                    .or_else(|_| ctxt.read_array_truncated::<ClassRangeRecord>(class_range_count))?
                    .to_vec();
                Ok(ClassDef::Format2 { class_range_array })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl WriteBinary<&Self> for ClassDef {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, classdef: &ClassDef) -> Result<(), WriteError> {
        match classdef {
            ClassDef::Format1 {
                start_glyph,
                class_value_array,
            } => {
                U16Be::write(ctxt, 1u16)?;
                U16Be::write(ctxt, *start_glyph)?;
                U16Be::write(ctxt, u16::try_from(class_value_array.len())?)?;
                ctxt.write_iter::<U16Be, _>(class_value_array.iter().copied())
            }
            ClassDef::Format2 { class_range_array } => {
                U16Be::write(ctxt, 2u16)?;
                U16Be::write(ctxt, u16::try_from(class_range_array.len())?)?;
                for range in class_range_array {
                    U16Be::write(ctxt, range.start_glyph)?;
                    U16Be::write(ctxt, range.end_glyph)?;
                    U16Be::write(ctxt, range.class_value)?;
                }
                Ok(())
            }
        }
    }
}

impl ClassDef {
    /// The class of `glyph`. Glyphs not assigned a class are in class 0.
    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        match *self {
            ClassDef::Format1 {
                start_glyph,
                ref class_value_array,
            } => glyph
                .checked_sub(start_glyph)
                .and_then(|class_index| class_value_array.get(usize::from(class_index)))
                .copied()
                .unwrap_or(0),
            ClassDef::Format2 {
                ref class_range_array,
            } => class_range_array
                .binary_search_by(|range| range_order(range.start_glyph, range.end_glyph, glyph))
                .map_or(0, |index| class_range_array[index].class_value),
        }
    }
}

/// Where the glyph range `start..=end` lies relative to `glyph`, for searching ranges ordered by
/// start glyph.
fn range_order(start: u16, end: u16, glyph: u16) -> Ordering {
    if start > glyph {
        Ordering::Greater
    } else if end >= glyph {
        Ordering::Equal
    } else {
        Ordering::Less
    }
}

impl ReadBinary for ContextLookup {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(ctxt, scope)?;
                let rule_set_count = usize::from(ctxt.read_u16be()?);
                let rule_set_offsets = ctxt.read_array::<U16Be>(rule_set_count)?;
                let rule_sets = read_objects_nullable::<RuleSet>(&scope, rule_set_offsets)?;
                Ok(ContextLookup::Format1 {
                    coverage,
                    rule_sets,
                })
            }
            2 => {
                let coverage = read_coverage(ctxt, scope)?;
                let classdef = ctxt
                    .read_pointer::<U16Be, ClassDef>(scope)?
                    .ok_or(ParseError::BadOffset)?;
                let class_set_count = usize::from(ctxt.read_u16be()?);
                let class_set_offsets = ctxt.read_array::<U16Be>(class_set_count)?;
                let class_sets = read_objects_nullable::<RuleSet>(&scope, class_set_offsets)?;
                Ok(ContextLookup::Format2 {
                    coverage,
                    classdef,
                    class_sets,
                })
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let coverage_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let coverages = read_coverages(&scope, coverage_offsets)?;
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                Ok(ContextLookup::Format3 {
                    coverages,
                    lookup_records,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl ReadBinary for RuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let rule_count = usize::from(ctxt.read_u16be()?);
        let rule_offsets = ctxt.read_array::<U16Be>(rule_count)?;
        let rules = read_objects::<Rule>(&scope, rule_offsets)?;
        Ok(RuleSet { rules })
    }
}

impl ReadBinary for Rule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(Rule {
            input_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for ChainContextLookup {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(ctxt, scope)?;
                let chain_rule_set_count = usize::from(ctxt.read_u16be()?);
                let chain_rule_set_offsets = ctxt.read_array::<U16Be>(chain_rule_set_count)?;
                let chain_rule_sets =
                    read_objects_nullable::<ChainRuleSet>(&scope, chain_rule_set_offsets)?;
                Ok(ChainContextLookup::Format1 {
                    coverage,
                    chain_rule_sets,
                })
            }
            2 => {
                let coverage = read_coverage(ctxt, scope)?;
                let opt_backtrack_classdef = ctxt.read_pointer::<U16Be, ClassDef>(scope)?;
                let input_classdef = ctxt
                    .read_pointer::<U16Be, ClassDef>(scope)?
                    .ok_or(ParseError::BadOffset)?;
                let opt_lookahead_classdef = ctxt.read_pointer::<U16Be, ClassDef>(scope)?;
                let chain_class_set_count = usize::from(ctxt.read_u16be()?);
                let chain_class_set_offsets = ctxt.read_array::<U16Be>(chain_class_set_count)?;
                let chain_class_sets =
                    read_objects_nullable::<ChainRuleSet>(&scope, chain_class_set_offsets)?;
                Ok(ChainContextLookup::Format2 {
                    coverage,
                    opt_backtrack_classdef,
                    input_classdef,
                    opt_lookahead_classdef,
                    chain_class_sets,
                })
            }
            3 => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_coverage_offsets = ctxt.read_array::<U16Be>(input_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
                let backtrack_coverages = read_coverages(&scope, backtrack_coverage_offsets)?;
                let input_coverages = read_coverages(&scope, input_coverage_offsets)?;
                let lookahead_coverages = read_coverages(&scope, lookahead_coverage_offsets)?;
                Ok(ChainContextLookup::Format3 {
                    backtrack_coverages,
                    input_coverages,
                    lookahead_coverages,
                    lookup_records,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl ReadBinary for ChainRuleSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let chain_rule_count = usize::from(ctxt.read_u16be()?);
        let chain_rule_offsets = ctxt.read_array::<U16Be>(chain_rule_count)?;
        let chain_rules = read_objects::<ChainRule>(&scope, chain_rule_offsets)?;
        Ok(ChainRuleSet { chain_rules })
    }
}

impl ReadBinary for ChainRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let backtrack_count = usize::from(ctxt.read_u16be()?);
        let backtrack_sequence = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
        let input_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(input_count > 0)?;
        let input_sequence = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
        let lookahead_count = usize::from(ctxt.read_u16be()?);
        let lookahead_sequence = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_records = ctxt.read_array::<(U16Be, U16Be)>(lookup_count)?.to_vec();
        Ok(ChainRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

/// Formats 1 and 3 of chaining context subtables can be written. Format 2 results in
/// `WriteError::NotImplemented`.
impl WriteBinary<&Self> for ChainContextLookup {
    type Output = ();

    fn write<C: WriteContext>(
        ctxt: &mut C,
        lookup: &ChainContextLookup,
    ) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        match lookup {
            ChainContextLookup::Format1 {
                coverage,
                chain_rule_sets,
            } => {
                U16Be::write(ctxt, 1u16)?;
                let coverage_offset = ctxt.placeholder::<U16Be, _>()?;
                U16Be::write(ctxt, u16::try_from(chain_rule_sets.len())?)?;
                let set_offsets = ctxt.placeholder_array::<U16Be, _>(chain_rule_sets.len())?;
                write_subtable::<_, Coverage, _>(ctxt, start, coverage_offset, coverage)?;
                for (chain_rule_set, placeholder) in chain_rule_sets.iter().zip(set_offsets) {
                    write_opt_subtable::<_, ChainRuleSet, _>(
                        ctxt,
                        start,
                        placeholder,
                        chain_rule_set.as_ref(),
                    )?;
                }
                Ok(())
            }
            ChainContextLookup::Format2 { .. } => Err(WriteError::NotImplemented),
            ChainContextLookup::Format3 {
                backtrack_coverages,
                input_coverages,
                lookahead_coverages,
                lookup_records,
            } => {
                U16Be::write(ctxt, 3u16)?;
                U16Be::write(ctxt, u16::try_from(backtrack_coverages.len())?)?;
                let backtrack_offsets =
                    ctxt.placeholder_array::<U16Be, _>(backtrack_coverages.len())?;
                U16Be::write(ctxt, u16::try_from(input_coverages.len())?)?;
                let input_offsets = ctxt.placeholder_array::<U16Be, _>(input_coverages.len())?;
                U16Be::write(ctxt, u16::try_from(lookahead_coverages.len())?)?;
                let lookahead_offsets =
                    ctxt.placeholder_array::<U16Be, _>(lookahead_coverages.len())?;
                write_lookup_records(ctxt, lookup_records)?;

                let coverages = backtrack_coverages
                    .iter()
                    .zip(backtrack_offsets)
                    .chain(input_coverages.iter().zip(input_offsets))
                    .chain(lookahead_coverages.iter().zip(lookahead_offsets));
                for (coverage, placeholder) in coverages {
                    write_subtable::<_, Coverage, _>(ctxt, start, placeholder, coverage)?;
                }
                Ok(())
            }
        }
    }
}

impl WriteBinary<&Self> for ChainRuleSet {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, set: &ChainRuleSet) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        U16Be::write(ctxt, u16::try_from(set.chain_rules.len())?)?;
        let offsets = ctxt.placeholder_array::<U16Be, _>(set.chain_rules.len())?;
        for (chain_rule, placeholder) in set.chain_rules.iter().zip(offsets) {
            write_subtable::<_, ChainRule, _>(ctxt, start, placeholder, chain_rule)?;
        }
        Ok(())
    }
}

impl WriteBinary<&Self> for ChainRule {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, rule: &ChainRule) -> Result<(), WriteError> {
        U16Be::write(ctxt, u16::try_from(rule.backtrack_sequence.len())?)?;
        ctxt.write_iter::<U16Be, _>(rule.backtrack_sequence.iter().copied())?;
        // The input count includes the first glyph, which is covered by the coverage table
        U16Be::write(ctxt, u16::try_from(rule.input_sequence.len() + 1)?)?;
        ctxt.write_iter::<U16Be, _>(rule.input_sequence.iter().copied())?;
        U16Be::write(ctxt, u16::try_from(rule.lookahead_sequence.len())?)?;
        ctxt.write_iter::<U16Be, _>(rule.lookahead_sequence.iter().copied())?;
        write_lookup_records(ctxt, &rule.lookup_records)
    }
}

fn write_lookup_records<C: WriteContext>(
    ctxt: &mut C,
    lookup_records: &[(u16, u16)],
) -> Result<(), WriteError> {
    U16Be::write(ctxt, u16::try_from(lookup_records.len())?)?;
    for &(sequence_index, lookup_list_index) in lookup_records {
        U16Be::write(ctxt, sequence_index)?;
        U16Be::write(ctxt, lookup_list_index)?;
    }
    Ok(())
}

/// Write `value` at the current position and point `placeholder` at it, relative to `base`.
pub(crate) fn write_subtable<'v, C, T, HostType>(
    ctxt: &mut C,
    base: usize,
    placeholder: Placeholder<U16Be, u16>,
    value: &'v HostType,
) -> Result<(), WriteError>
where
    C: WriteContext,
    T: WriteBinary<&'v HostType, Output = ()>,
{
    ctxt.write_placeholder(placeholder, offset16(base, ctxt.bytes_written())?)?;
    T::write(ctxt, value)
}

/// Like `write_subtable` but writes a zero offset for absent values.
pub(crate) fn write_opt_subtable<'v, C, T, HostType>(
    ctxt: &mut C,
    base: usize,
    placeholder: Placeholder<U16Be, u16>,
    opt_value: Option<&'v HostType>,
) -> Result<(), WriteError>
where
    C: WriteContext,
    T: WriteBinary<&'v HostType, Output = ()>,
{
    match opt_value {
        Some(value) => write_subtable::<C, T, HostType>(ctxt, base, placeholder, value),
        None => ctxt.write_placeholder(placeholder, 0u16),
    }
}

/// Read a required 16-bit coverage offset relative to `scope`.
pub(crate) fn read_coverage<'a>(
    ctxt: &mut ReadCtxt<'a>,
    scope: ReadScope<'a>,
) -> Result<Coverage, ParseError> {
    ctxt.read_pointer::<U16Be, Coverage>(scope)?
        .ok_or(ParseError::BadOffset)
}

fn read_objects<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<T::HostType<'a>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let object = scope.offset(usize::from(offset)).read::<T>()?;
        objects.push(object);
    }
    Ok(objects)
}

fn read_objects_nullable<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Option<T::HostType<'a>>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        if offset != 0 {
            let object = scope.offset(usize::from(offset)).read::<T>()?;
            objects.push(Some(object));
        } else {
            objects.push(None);
        }
    }
    Ok(objects)
}

fn read_coverages<'a>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Coverage>, ParseError> {
    let mut coverages = Vec::with_capacity(offsets.len());
    for coverage_offset in &offsets {
        if coverage_offset == 0 {
            return Err(ParseError::BadOffset);
        }
        let coverage = scope
            .offset(usize::from(coverage_offset))
            .read::<Coverage>()?;
        coverages.push(coverage);
    }
    Ok(coverages)
}

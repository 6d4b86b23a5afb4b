//! Reading and writing of the `GPOS` glyph positioning table.
//!
//! The table is decoded into an owned tree: the script and feature lists from [`layout`], and a
//! lookup list whose lookups hold one [`PosSubtable`] per subtable offset.
//!
//! Writing covers the header, the script, feature and lookup lists, single adjustment lookups and
//! chaining context lookups (formats 1 and 3). Everything else reports
//! `WriteError::NotImplemented`.
//!
//! <https://learn.microsoft.com/en-us/typography/opentype/spec/gpos>
//!
//! [`layout`]: crate::layout

use std::convert::TryFrom;

use bitflags::bitflags;
use log::warn;

use crate::binary::read::{
    CheckIndex, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadScope,
};
use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteContext};
use crate::binary::{U16Be, U32Be, Version, VersionEncoding};
use crate::error::{ParseError, WriteError};
use crate::layout::{
    read_coverage, write_opt_subtable, write_subtable, ChainContextLookup, ClassDef, ContextLookup,
    Coverage, FeatureList, FeatureTable, FeatureVariations, LangSys, LookupFlag, ScriptList,
    ScriptTable,
};
use crate::size;

bitflags! {
    /// Selects which fields of a [`ValueRecord`] are present in the font data.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
    pub struct ValueFormat: u16 {
        const X_PLACEMENT = 0x0001;
        const Y_PLACEMENT = 0x0002;
        const X_ADVANCE = 0x0004;
        const Y_ADVANCE = 0x0008;
        const X_PLACEMENT_DEVICE = 0x0010;
        const Y_PLACEMENT_DEVICE = 0x0020;
        const X_ADVANCE_DEVICE = 0x0040;
        const Y_ADVANCE_DEVICE = 0x0080;
    }
}

impl ValueFormat {
    /// Number of bytes a value record in this format occupies.
    pub fn size(self) -> usize {
        self.bits().count_ones() as usize * size::U16
    }
}

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let value_format = ctxt.read_u16be()?;
        ValueFormat::from_bits(value_format).ok_or(ParseError::BadValue)
    }
}

impl WriteBinary for ValueFormat {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, value_format: ValueFormat) -> Result<(), WriteError> {
        U16Be::write(ctxt, value_format.bits())
    }
}

/// A positioning adjustment.
///
/// Fields that are absent from the font data are `None`. Device fields hold the raw offset of a
/// device or variation index table; those tables are not read.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ValueRecord {
    pub x_placement: Option<i16>,
    pub y_placement: Option<i16>,
    pub x_advance: Option<i16>,
    pub y_advance: Option<i16>,
    pub x_placement_device: Option<u16>,
    pub y_placement_device: Option<u16>,
    pub x_advance_device: Option<u16>,
    pub y_advance_device: Option<u16>,
}

struct ValueField {
    flag: ValueFormat,
    get: fn(&ValueRecord) -> Option<u16>,
    set: fn(&mut ValueRecord, u16),
}

// Fields in the order they are stored. Reading and writing both walk this table.
const VALUE_FIELDS: [ValueField; 8] = [
    ValueField {
        flag: ValueFormat::X_PLACEMENT,
        get: |record| record.x_placement.map(|value| value as u16),
        set: |record, raw| record.x_placement = Some(raw as i16),
    },
    ValueField {
        flag: ValueFormat::Y_PLACEMENT,
        get: |record| record.y_placement.map(|value| value as u16),
        set: |record, raw| record.y_placement = Some(raw as i16),
    },
    ValueField {
        flag: ValueFormat::X_ADVANCE,
        get: |record| record.x_advance.map(|value| value as u16),
        set: |record, raw| record.x_advance = Some(raw as i16),
    },
    ValueField {
        flag: ValueFormat::Y_ADVANCE,
        get: |record| record.y_advance.map(|value| value as u16),
        set: |record, raw| record.y_advance = Some(raw as i16),
    },
    ValueField {
        flag: ValueFormat::X_PLACEMENT_DEVICE,
        get: |record| record.x_placement_device,
        set: |record, raw| record.x_placement_device = Some(raw),
    },
    ValueField {
        flag: ValueFormat::Y_PLACEMENT_DEVICE,
        get: |record| record.y_placement_device,
        set: |record, raw| record.y_placement_device = Some(raw),
    },
    ValueField {
        flag: ValueFormat::X_ADVANCE_DEVICE,
        get: |record| record.x_advance_device,
        set: |record, raw| record.x_advance_device = Some(raw),
    },
    ValueField {
        flag: ValueFormat::Y_ADVANCE_DEVICE,
        get: |record| record.y_advance_device,
        set: |record, raw| record.y_advance_device = Some(raw),
    },
];

impl ValueRecord {
    /// The smallest format that holds every field present in this record.
    pub fn value_format(&self) -> ValueFormat {
        VALUE_FIELDS
            .iter()
            .filter(|field| (field.get)(self).is_some())
            .fold(ValueFormat::empty(), |format, field| format | field.flag)
    }
}

impl ReadBinaryDep for ValueRecord {
    type Args<'a> = ValueFormat;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        value_format: ValueFormat,
    ) -> Result<Self, ParseError> {
        let mut record = ValueRecord::default();
        for field in VALUE_FIELDS
            .iter()
            .filter(|field| value_format.contains(field.flag))
        {
            (field.set)(&mut record, ctxt.read_u16be()?);
        }
        Ok(record)
    }
}

impl ReadFixedSizeDep for ValueRecord {
    fn size(value_format: ValueFormat) -> usize {
        value_format.size()
    }
}

/// Writes the fields selected by the value format. Selected fields missing from the record are
/// written as zero, fields outside the format are dropped.
impl WriteBinaryDep<&Self> for ValueRecord {
    type Args = ValueFormat;
    type Output = ();

    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        record: &ValueRecord,
        value_format: ValueFormat,
    ) -> Result<(), WriteError> {
        for field in VALUE_FIELDS
            .iter()
            .filter(|field| value_format.contains(field.flag))
        {
            U16Be::write(ctxt, (field.get)(record).unwrap_or(0))?;
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Anchor {
    Format1 {
        x: i16,
        y: i16,
    },
    /// Anchor with a contour point index that hinting may move.
    Format2 {
        x: i16,
        y: i16,
        anchor_point: u16,
    },
    /// Anchor with raw device table offsets.
    Format3 {
        x: i16,
        y: i16,
        x_device_offset: u16,
        y_device_offset: u16,
    },
}

impl Anchor {
    pub fn x(&self) -> i16 {
        match *self {
            Anchor::Format1 { x, .. } | Anchor::Format2 { x, .. } | Anchor::Format3 { x, .. } => x,
        }
    }

    pub fn y(&self) -> i16 {
        match *self {
            Anchor::Format1 { y, .. } | Anchor::Format2 { y, .. } | Anchor::Format3 { y, .. } => y,
        }
    }
}

impl ReadBinary for Anchor {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let offset = ctxt.scope().base();
        let format = ctxt.read_u16be()?;
        if !(1..=3).contains(&format) {
            return Err(ParseError::UnsupportedFormat { format, offset });
        }
        let x = ctxt.read_i16be()?;
        let y = ctxt.read_i16be()?;
        match format {
            1 => Ok(Anchor::Format1 { x, y }),
            2 => {
                let anchor_point = ctxt.read_u16be()?;
                Ok(Anchor::Format2 { x, y, anchor_point })
            }
            _ => {
                let x_device_offset = ctxt.read_u16be()?;
                let y_device_offset = ctxt.read_u16be()?;
                Ok(Anchor::Format3 {
                    x,
                    y,
                    x_device_offset,
                    y_device_offset,
                })
            }
        }
    }
}

/// Single adjustment positioning (lookup type 1).
#[derive(Debug, Clone, PartialEq)]
pub enum SinglePos {
    /// One value record shared by every covered glyph.
    Format1 {
        coverage: Coverage,
        value_format: ValueFormat,
        value_record: ValueRecord,
    },
    /// One value record per covered glyph, in coverage order.
    Format2 {
        coverage: Coverage,
        value_format: ValueFormat,
        value_records: Vec<ValueRecord>,
    },
}

impl ReadBinary for SinglePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(ctxt, scope)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_record = ctxt.read_dep::<ValueRecord>(value_format)?;
                Ok(SinglePos::Format1 {
                    coverage,
                    value_format,
                    value_record,
                })
            }
            2 => {
                let coverage = read_coverage(ctxt, scope)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_count = usize::from(ctxt.read_u16be()?);
                let value_records = ctxt
                    .read_array_dep::<ValueRecord>(value_count, value_format)?
                    .read_to_vec()?;
                Ok(SinglePos::Format2 {
                    coverage,
                    value_format,
                    value_records,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl WriteBinary<&Self> for SinglePos {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, single_pos: &SinglePos) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        match single_pos {
            SinglePos::Format1 {
                coverage,
                value_format,
                value_record,
            } => {
                U16Be::write(ctxt, 1u16)?;
                let coverage_offset = ctxt.placeholder::<U16Be, _>()?;
                ValueFormat::write(ctxt, *value_format)?;
                ValueRecord::write_dep(ctxt, value_record, *value_format)?;
                write_subtable::<_, Coverage, _>(ctxt, start, coverage_offset, coverage)
            }
            SinglePos::Format2 {
                coverage,
                value_format,
                value_records,
            } => {
                U16Be::write(ctxt, 2u16)?;
                let coverage_offset = ctxt.placeholder::<U16Be, _>()?;
                ValueFormat::write(ctxt, *value_format)?;
                U16Be::write(ctxt, u16::try_from(value_records.len())?)?;
                for value_record in value_records {
                    ValueRecord::write_dep(ctxt, value_record, *value_format)?;
                }
                write_subtable::<_, Coverage, _>(ctxt, start, coverage_offset, coverage)
            }
        }
    }
}

impl SinglePos {
    /// The adjustment for `glyph`, or `None` if it is not covered.
    pub fn apply(&self, glyph: u16) -> Result<Option<ValueRecord>, ParseError> {
        match self {
            SinglePos::Format1 {
                coverage,
                value_record,
                ..
            } => Ok(coverage
                .glyph_coverage_value(glyph)
                .map(|_| *value_record)),
            SinglePos::Format2 {
                coverage,
                value_records,
                ..
            } => match coverage.glyph_coverage_value(glyph) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    value_records.check_index(coverage_index)?;
                    Ok(Some(value_records[coverage_index]))
                }
                None => Ok(None),
            },
        }
    }
}

/// Pair adjustment positioning (lookup type 2).
#[derive(Debug, Clone, PartialEq)]
pub enum PairPos {
    /// Adjustments for explicit glyph pairs, one pair set per covered first glyph.
    Format1 {
        coverage: Coverage,
        value_format1: ValueFormat,
        value_format2: ValueFormat,
        pair_sets: Vec<PairSet>,
    },
    /// Adjustments for pairs of glyph classes.
    Format2 {
        coverage: Coverage,
        value_format1: ValueFormat,
        value_format2: ValueFormat,
        classdef1: ClassDef,
        classdef2: ClassDef,
        class1_count: u16,
        class2_count: u16,
        /// One record per first glyph class. Empty when both value formats are empty, since
        /// every pair then has empty adjustments.
        class1_records: Vec<Class1Record>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairSet {
    pub pair_value_records: Vec<PairValueRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairValueRecord {
    pub second_glyph: u16,
    pub value_record1: ValueRecord,
    pub value_record2: ValueRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class1Record {
    pub class2_records: Vec<Class2Record>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class2Record {
    pub value_record1: ValueRecord,
    pub value_record2: ValueRecord,
}

impl ReadBinary for PairPos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(ctxt, scope)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let pair_set_count = usize::from(ctxt.read_u16be()?);
                let mut pair_sets = Vec::with_capacity(pair_set_count);
                for _ in 0..pair_set_count {
                    let pair_set = ctxt
                        .read_pointer_dep::<U16Be, PairSet>(scope, (value_format1, value_format2))?
                        .ok_or(ParseError::BadOffset)?;
                    pair_sets.push(pair_set);
                }
                Ok(PairPos::Format1 {
                    coverage,
                    value_format1,
                    value_format2,
                    pair_sets,
                })
            }
            2 => {
                let coverage = read_coverage(ctxt, scope)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let classdef1 = ctxt
                    .read_pointer::<U16Be, ClassDef>(scope)?
                    .ok_or(ParseError::BadOffset)?;
                let classdef2 = ctxt
                    .read_pointer::<U16Be, ClassDef>(scope)?
                    .ok_or(ParseError::BadOffset)?;
                let class1_count = ctxt.read_u16be()?;
                let class2_count = ctxt.read_u16be()?;
                // A grid of empty records occupies no bytes so it is not materialised
                let class1_records = if value_format1.is_empty() && value_format2.is_empty() {
                    Vec::new()
                } else {
                    ctxt.read_array_dep::<Class1Record>(
                        usize::from(class1_count),
                        (usize::from(class2_count), value_format1, value_format2),
                    )?
                    .read_to_vec()?
                };
                Ok(PairPos::Format2 {
                    coverage,
                    value_format1,
                    value_format2,
                    classdef1,
                    classdef2,
                    class1_count,
                    class2_count,
                    class1_records,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl ReadBinaryDep for PairSet {
    type Args<'a> = (ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, args: Self::Args<'a>) -> Result<Self, ParseError> {
        let pair_value_count = usize::from(ctxt.read_u16be()?);
        let pair_value_records = ctxt
            .read_array_dep::<PairValueRecord>(pair_value_count, args)?
            .read_to_vec()?;
        Ok(PairSet { pair_value_records })
    }
}

impl ReadBinaryDep for PairValueRecord {
    type Args<'a> = (ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let second_glyph = ctxt.read_u16be()?;
        let value_record1 = ctxt.read_dep::<ValueRecord>(value_format1)?;
        let value_record2 = ctxt.read_dep::<ValueRecord>(value_format2)?;
        Ok(PairValueRecord {
            second_glyph,
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for PairValueRecord {
    fn size((value_format1, value_format2): Self::Args<'_>) -> usize {
        size::U16 + value_format1.size() + value_format2.size()
    }
}

impl ReadBinaryDep for Class1Record {
    type Args<'a> = (usize, ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, args: Self::Args<'a>) -> Result<Self, ParseError> {
        let (class2_count, value_format1, value_format2) = args;
        let class2_records = ctxt
            .read_array_dep::<Class2Record>(class2_count, (value_format1, value_format2))?
            .read_to_vec()?;
        Ok(Class1Record { class2_records })
    }
}

impl ReadFixedSizeDep for Class1Record {
    fn size((class2_count, value_format1, value_format2): Self::Args<'_>) -> usize {
        class2_count * (value_format1.size() + value_format2.size())
    }
}

impl ReadBinaryDep for Class2Record {
    type Args<'a> = (ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let value_record1 = ctxt.read_dep::<ValueRecord>(value_format1)?;
        let value_record2 = ctxt.read_dep::<ValueRecord>(value_format2)?;
        Ok(Class2Record {
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for Class2Record {
    fn size((value_format1, value_format2): Self::Args<'_>) -> usize {
        value_format1.size() + value_format2.size()
    }
}

impl PairPos {
    /// The adjustments for the pair `glyph1`, `glyph2`, or `None` if the pair is not covered.
    pub fn apply(
        &self,
        glyph1: u16,
        glyph2: u16,
    ) -> Result<Option<(ValueRecord, ValueRecord)>, ParseError> {
        match self {
            PairPos::Format1 {
                coverage,
                pair_sets,
                ..
            } => match coverage.glyph_coverage_value(glyph1) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    pair_sets.check_index(coverage_index)?;
                    let pair = pair_sets[coverage_index]
                        .pair_value_records
                        .iter()
                        .find(|pair| pair.second_glyph == glyph2);
                    Ok(pair.map(|pair| (pair.value_record1, pair.value_record2)))
                }
                None => Ok(None),
            },
            PairPos::Format2 {
                coverage,
                value_format1,
                value_format2,
                classdef1,
                classdef2,
                class1_count,
                class2_count,
                class1_records,
            } => {
                if coverage.glyph_coverage_value(glyph1).is_none() {
                    return Ok(None);
                }
                let class1_value = classdef1.glyph_class_value(glyph1);
                let class2_value = classdef2.glyph_class_value(glyph2);
                if class1_value >= *class1_count || class2_value >= *class2_count {
                    return Err(ParseError::BadIndex);
                }
                if value_format1.is_empty() && value_format2.is_empty() {
                    return Ok(Some((ValueRecord::default(), ValueRecord::default())));
                }
                let class2_record = class1_records
                    .get(usize::from(class1_value))
                    .and_then(|class1_record| {
                        class1_record.class2_records.get(usize::from(class2_value))
                    })
                    .ok_or(ParseError::BadIndex)?;
                Ok(Some((
                    class2_record.value_record1,
                    class2_record.value_record2,
                )))
            }
        }
    }
}

/// Cursive attachment positioning (lookup type 3).
#[derive(Debug, Clone, PartialEq)]
pub struct CursivePos {
    pub coverage: Coverage,
    pub entry_exit_records: Vec<EntryExitRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EntryExitRecord {
    pub entry_anchor: Option<Anchor>,
    pub exit_anchor: Option<Anchor>,
}

impl ReadBinary for CursivePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(ctxt, scope)?;
                let entry_exit_count = usize::from(ctxt.read_u16be()?);
                let entry_exit_records = ctxt
                    .read_array_dep::<EntryExitRecord>(entry_exit_count, scope)?
                    .read_to_vec()?;
                Ok(CursivePos {
                    coverage,
                    entry_exit_records,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl ReadBinaryDep for EntryExitRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let entry_anchor = ctxt.read_pointer::<U16Be, Anchor>(scope)?;
        let exit_anchor = ctxt.read_pointer::<U16Be, Anchor>(scope)?;
        Ok(EntryExitRecord {
            entry_anchor,
            exit_anchor,
        })
    }
}

impl ReadFixedSizeDep for EntryExitRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        2 * size::U16
    }
}

impl CursivePos {
    /// The exit anchor of `glyph1` and the entry anchor of `glyph2`, when both exist.
    pub fn apply(&self, glyph1: u16, glyph2: u16) -> Result<Option<(Anchor, Anchor)>, ParseError> {
        let coverage_value1 = self.coverage.glyph_coverage_value(glyph1);
        let coverage_value2 = self.coverage.glyph_coverage_value(glyph2);
        match (coverage_value1, coverage_value2) {
            (Some(coverage_index1), Some(coverage_index2)) => {
                let coverage_index1 = usize::from(coverage_index1);
                let coverage_index2 = usize::from(coverage_index2);
                self.entry_exit_records.check_index(coverage_index1)?;
                self.entry_exit_records.check_index(coverage_index2)?;
                let exit = self.entry_exit_records[coverage_index1].exit_anchor;
                let entry = self.entry_exit_records[coverage_index2].entry_anchor;
                Ok(exit.zip(entry))
            }
            _ => Ok(None),
        }
    }
}

/// Mark-to-base attachment positioning (lookup type 4).
///
/// Mark-to-mark attachment (lookup type 6) has the same layout, with the base coverage listing
/// the marks being attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkBasePos {
    pub mark_coverage: Coverage,
    pub base_coverage: Coverage,
    pub mark_class_count: u16,
    pub mark_array: MarkArray,
    pub base_array: BaseArray,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkArray {
    pub mark_records: Vec<MarkRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MarkRecord {
    pub mark_class: u16,
    pub mark_anchor: Anchor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseArray {
    pub base_records: Vec<BaseRecord>,
}

/// One anchor per mark class. Classes that do not attach to this base have no anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRecord {
    pub base_anchors: Vec<Option<Anchor>>,
}

impl ReadBinary for MarkBasePos {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage = read_coverage(ctxt, scope)?;
                let base_coverage = read_coverage(ctxt, scope)?;
                let mark_class_count = ctxt.read_u16be()?;
                let mark_array = ctxt
                    .read_pointer::<U16Be, MarkArray>(scope)?
                    .ok_or(ParseError::BadOffset)?;
                let base_array = ctxt
                    .read_pointer_dep::<U16Be, BaseArray>(scope, usize::from(mark_class_count))?
                    .ok_or(ParseError::BadOffset)?;
                Ok(MarkBasePos {
                    mark_coverage,
                    base_coverage,
                    mark_class_count,
                    mark_array,
                    base_array,
                })
            }
            format => Err(ParseError::UnsupportedFormat {
                format,
                offset: scope.base(),
            }),
        }
    }
}

impl ReadBinary for MarkArray {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let mark_count = usize::from(ctxt.read_u16be()?);
        let mark_records = ctxt
            .read_array_dep::<MarkRecord>(mark_count, scope)?
            .read_to_vec()?;
        Ok(MarkArray { mark_records })
    }
}

impl ReadBinaryDep for MarkRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let mark_class = ctxt.read_u16be()?;
        let mark_anchor = ctxt
            .read_pointer::<U16Be, Anchor>(scope)?
            .ok_or(ParseError::BadOffset)?;
        Ok(MarkRecord {
            mark_class,
            mark_anchor,
        })
    }
}

impl ReadFixedSizeDep for MarkRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        2 * size::U16
    }
}

impl ReadBinaryDep for BaseArray {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        mark_class_count: usize,
    ) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let base_count = usize::from(ctxt.read_u16be()?);
        let base_records = ctxt
            .read_array_dep::<BaseRecord>(base_count, (scope, mark_class_count))?
            .read_to_vec()?;
        Ok(BaseArray { base_records })
    }
}

impl ReadBinaryDep for BaseRecord {
    type Args<'a> = (ReadScope<'a>, usize);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (scope, mark_class_count): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let mut base_anchors = Vec::with_capacity(mark_class_count);
        for _ in 0..mark_class_count {
            base_anchors.push(ctxt.read_pointer::<U16Be, Anchor>(scope)?);
        }
        Ok(BaseRecord { base_anchors })
    }
}

impl ReadFixedSizeDep for BaseRecord {
    fn size((_scope, mark_class_count): Self::Args<'_>) -> usize {
        mark_class_count * size::U16
    }
}

impl MarkBasePos {
    /// The base anchor and mark anchor for attaching `mark_glyph` to `base_glyph`.
    pub fn apply(
        &self,
        base_glyph: u16,
        mark_glyph: u16,
    ) -> Result<Option<(Anchor, Anchor)>, ParseError> {
        let base_coverage_value = self.base_coverage.glyph_coverage_value(base_glyph);
        let mark_coverage_value = self.mark_coverage.glyph_coverage_value(mark_glyph);
        let (base_index, mark_index) = match (base_coverage_value, mark_coverage_value) {
            (Some(base_index), Some(mark_index)) => {
                (usize::from(base_index), usize::from(mark_index))
            }
            _ => return Ok(None),
        };
        let base_record = self
            .base_array
            .base_records
            .get(base_index)
            .ok_or(ParseError::BadIndex)?;
        let mark_record = self
            .mark_array
            .mark_records
            .get(mark_index)
            .ok_or(ParseError::BadIndex)?;
        let base_anchor = base_record
            .base_anchors
            .get(usize::from(mark_record.mark_class))
            .ok_or(ParseError::BadIndex)?;
        Ok(base_anchor.map(|base_anchor| (base_anchor, mark_record.mark_anchor)))
    }
}

/// The nine positioning lookup types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PosLookupType {
    SinglePos = 1,
    PairPos = 2,
    CursivePos = 3,
    MarkBasePos = 4,
    MarkLigPos = 5,
    MarkMarkPos = 6,
    ContextPos = 7,
    ChainContextPos = 8,
    Extension = 9,
}

impl TryFrom<u16> for PosLookupType {
    type Error = ParseError;

    fn try_from(lookup_type: u16) -> Result<Self, ParseError> {
        match lookup_type {
            1 => Ok(PosLookupType::SinglePos),
            2 => Ok(PosLookupType::PairPos),
            3 => Ok(PosLookupType::CursivePos),
            4 => Ok(PosLookupType::MarkBasePos),
            5 => Ok(PosLookupType::MarkLigPos),
            6 => Ok(PosLookupType::MarkMarkPos),
            7 => Ok(PosLookupType::ContextPos),
            8 => Ok(PosLookupType::ChainContextPos),
            9 => Ok(PosLookupType::Extension),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl From<PosLookupType> for u16 {
    fn from(lookup_type: PosLookupType) -> u16 {
        lookup_type as u16
    }
}

impl PosLookupType {
    /// Whether subtables of this type in `format` can be decoded.
    pub fn supports_format(self, format: u16) -> bool {
        match self {
            PosLookupType::SinglePos | PosLookupType::PairPos => matches!(format, 1 | 2),
            PosLookupType::CursivePos
            | PosLookupType::MarkBasePos
            | PosLookupType::MarkMarkPos
            | PosLookupType::Extension => format == 1,
            PosLookupType::MarkLigPos => false,
            PosLookupType::ContextPos | PosLookupType::ChainContextPos => {
                matches!(format, 1 | 2 | 3)
            }
        }
    }
}

/// A decoded lookup subtable.
#[derive(Debug, Clone, PartialEq)]
pub enum PosSubtable {
    Single(SinglePos),
    Pair(PairPos),
    Cursive(CursivePos),
    MarkBase(MarkBasePos),
    MarkMark(MarkBasePos),
    Context(ContextLookup),
    ChainContext(ChainContextLookup),
    /// An extension subtable and the subtable it points to.
    Extension {
        extension_lookup_type: PosLookupType,
        subtable: Box<PosSubtable>,
    },
    /// A subtable of a known lookup type in a format that is not decoded. Mark-to-ligature
    /// subtables always end up here.
    Unsupported {
        lookup_type: PosLookupType,
        format: u16,
    },
}

impl ReadBinaryDep for PosSubtable {
    type Args<'a> = PosLookupType;
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        lookup_type: PosLookupType,
    ) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = scope.read::<U16Be>()?;
        if !lookup_type.supports_format(format) {
            warn!(
                "unsupported GPOS lookup type {} subtable format {} at 0x{:x}",
                u16::from(lookup_type),
                format,
                scope.base()
            );
            return Ok(PosSubtable::Unsupported {
                lookup_type,
                format,
            });
        }

        match lookup_type {
            PosLookupType::SinglePos => ctxt.read::<SinglePos>().map(PosSubtable::Single),
            PosLookupType::PairPos => ctxt.read::<PairPos>().map(PosSubtable::Pair),
            PosLookupType::CursivePos => ctxt.read::<CursivePos>().map(PosSubtable::Cursive),
            PosLookupType::MarkBasePos => ctxt.read::<MarkBasePos>().map(PosSubtable::MarkBase),
            PosLookupType::MarkMarkPos => ctxt.read::<MarkBasePos>().map(PosSubtable::MarkMark),
            PosLookupType::ContextPos => ctxt.read::<ContextLookup>().map(PosSubtable::Context),
            PosLookupType::ChainContextPos => ctxt
                .read::<ChainContextLookup>()
                .map(PosSubtable::ChainContext),
            PosLookupType::MarkLigPos => Ok(PosSubtable::Unsupported {
                lookup_type,
                format,
            }),
            PosLookupType::Extension => {
                let _format = ctxt.read_u16be()?;
                let extension_lookup_type = PosLookupType::try_from(ctxt.read_u16be()?)?;
                ctxt.check(extension_lookup_type != PosLookupType::Extension)?;
                let subtable = ctxt
                    .read_pointer_dep::<U32Be, PosSubtable>(scope, extension_lookup_type)?
                    .ok_or(ParseError::BadOffset)?;
                Ok(PosSubtable::Extension {
                    extension_lookup_type,
                    subtable: Box::new(subtable),
                })
            }
        }
    }
}

impl PosSubtable {
    /// The lookup type of the data in this subtable, looking through extensions.
    pub fn lookup_type(&self) -> PosLookupType {
        match self {
            PosSubtable::Single(_) => PosLookupType::SinglePos,
            PosSubtable::Pair(_) => PosLookupType::PairPos,
            PosSubtable::Cursive(_) => PosLookupType::CursivePos,
            PosSubtable::MarkBase(_) => PosLookupType::MarkBasePos,
            PosSubtable::MarkMark(_) => PosLookupType::MarkMarkPos,
            PosSubtable::Context(_) => PosLookupType::ContextPos,
            PosSubtable::ChainContext(_) => PosLookupType::ChainContextPos,
            PosSubtable::Extension {
                extension_lookup_type,
                ..
            } => *extension_lookup_type,
            PosSubtable::Unsupported { lookup_type, .. } => *lookup_type,
        }
    }
}

/// Single adjustment and chaining context (formats 1 and 3) subtables can be written.
impl WriteBinary<&Self> for PosSubtable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subtable: &PosSubtable) -> Result<(), WriteError> {
        match subtable {
            PosSubtable::Single(single_pos) => SinglePos::write(ctxt, single_pos),
            PosSubtable::ChainContext(chain_context) => {
                ChainContextLookup::write(ctxt, chain_context)
            }
            PosSubtable::Pair(_)
            | PosSubtable::Cursive(_)
            | PosSubtable::MarkBase(_)
            | PosSubtable::MarkMark(_)
            | PosSubtable::Context(_)
            | PosSubtable::Extension { .. }
            | PosSubtable::Unsupported { .. } => Err(WriteError::NotImplemented),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PosLookup {
    pub lookup_type: PosLookupType,
    pub lookup_flag: LookupFlag,
    pub subtables: Vec<PosSubtable>,
    /// Present when `lookup_flag` has `USE_MARK_FILTERING_SET`.
    pub mark_filtering_set: Option<u16>,
}

impl ReadBinary for PosLookup {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = PosLookupType::try_from(ctxt.read_u16be()?)?;
        let lookup_flag = LookupFlag::from_bits_retain(ctxt.read_u16be()?);
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
        let mark_filtering_set = if lookup_flag.use_mark_filtering_set() {
            Some(ctxt.read_u16be()?)
        } else {
            None
        };

        let mut subtables = Vec::with_capacity(subtable_count);
        for subtable_offset in &subtable_offsets {
            if subtable_offset == 0 {
                return Err(ParseError::BadOffset);
            }
            let subtable = scope
                .offset(usize::from(subtable_offset))
                .read_dep::<PosSubtable>(lookup_type)?;
            subtables.push(subtable);
        }

        // All extension subtables of a lookup must wrap the same lookup type
        if lookup_type == PosLookupType::Extension {
            let mut extension_types = subtables.iter().filter_map(|subtable| match subtable {
                PosSubtable::Extension {
                    extension_lookup_type,
                    ..
                } => Some(*extension_lookup_type),
                _ => None,
            });
            if let Some(first) = extension_types.next() {
                ctxt.check(extension_types.all(|other| other == first))?;
            }
        }

        Ok(PosLookup {
            lookup_type,
            lookup_flag,
            subtables,
            mark_filtering_set,
        })
    }
}

impl WriteBinary<&Self> for PosLookup {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, lookup: &PosLookup) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        U16Be::write(ctxt, u16::from(lookup.lookup_type))?;
        U16Be::write(ctxt, lookup.lookup_flag.bits())?;
        U16Be::write(ctxt, u16::try_from(lookup.subtables.len())?)?;
        let subtable_offsets = ctxt.placeholder_array::<U16Be, _>(lookup.subtables.len())?;
        match (
            lookup.lookup_flag.use_mark_filtering_set(),
            lookup.mark_filtering_set,
        ) {
            (true, Some(mark_filtering_set)) => U16Be::write(ctxt, mark_filtering_set)?,
            (false, None) => {}
            _ => return Err(WriteError::BadValue),
        }
        for (subtable, placeholder) in lookup.subtables.iter().zip(subtable_offsets) {
            write_subtable::<_, PosSubtable, _>(ctxt, start, placeholder, subtable)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupList {
    pub lookups: Vec<PosLookup>,
}

impl ReadBinary for LookupList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let mut lookups = Vec::with_capacity(lookup_count);
        for _ in 0..lookup_count {
            let lookup = ctxt
                .read_pointer::<U16Be, PosLookup>(scope)?
                .ok_or(ParseError::BadOffset)?;
            lookups.push(lookup);
        }
        Ok(LookupList { lookups })
    }
}

impl WriteBinary<&Self> for LookupList {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, lookup_list: &LookupList) -> Result<(), WriteError> {
        let start = ctxt.bytes_written();
        U16Be::write(ctxt, u16::try_from(lookup_list.lookups.len())?)?;
        let lookup_offsets = ctxt.placeholder_array::<U16Be, _>(lookup_list.lookups.len())?;
        for (lookup, placeholder) in lookup_list.lookups.iter().zip(lookup_offsets) {
            write_subtable::<_, PosLookup, _>(ctxt, start, placeholder, lookup)?;
        }
        Ok(())
    }
}

/// The `GPOS` table.
#[derive(Debug, Clone, PartialEq)]
pub struct GposTable {
    pub version: Version,
    pub opt_script_list: Option<ScriptList>,
    pub opt_feature_list: Option<FeatureList>,
    pub opt_lookup_list: Option<LookupList>,
    /// Only present in version 1.1 tables.
    pub opt_feature_variations: Option<FeatureVariations>,
}

impl ReadBinary for GposTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_version(VersionEncoding::MajorMinor)?;
        ctxt.check_version(version.major == 1 && version.minor <= 1)?;
        let opt_script_list = ctxt.read_pointer::<U16Be, ScriptList>(scope)?;
        let opt_feature_list = ctxt.read_pointer::<U16Be, FeatureList>(scope)?;
        let opt_lookup_list = ctxt.read_pointer::<U16Be, LookupList>(scope)?;
        let opt_feature_variations = if version.minor == 1 {
            ctxt.read_pointer::<U32Be, FeatureVariations>(scope)?
        } else {
            None
        };
        Ok(GposTable {
            version,
            opt_script_list,
            opt_feature_list,
            opt_lookup_list,
            opt_feature_variations,
        })
    }
}

/// Tables are written as version 1.0. Feature variations cannot be written.
impl WriteBinary<&Self> for GposTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &GposTable) -> Result<(), WriteError> {
        if table.opt_feature_variations.is_some() {
            return Err(WriteError::NotImplemented);
        }
        let start = ctxt.bytes_written();
        U32Be::write(
            ctxt,
            Version::new(1, 0).to_raw(VersionEncoding::MajorMinor),
        )?;
        let script_list = ctxt.placeholder::<U16Be, _>()?;
        let feature_list = ctxt.placeholder::<U16Be, _>()?;
        let lookup_list = ctxt.placeholder::<U16Be, _>()?;
        write_opt_subtable::<_, ScriptList, _>(
            ctxt,
            start,
            script_list,
            table.opt_script_list.as_ref(),
        )?;
        write_opt_subtable::<_, FeatureList, _>(
            ctxt,
            start,
            feature_list,
            table.opt_feature_list.as_ref(),
        )?;
        write_opt_subtable::<_, LookupList, _>(
            ctxt,
            start,
            lookup_list,
            table.opt_lookup_list.as_ref(),
        )
    }
}

impl GposTable {
    pub fn find_script(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.opt_script_list.as_ref()?.find_script(script_tag)
    }

    pub fn find_script_or_default(&self, script_tag: u32) -> Option<&ScriptTable> {
        self.opt_script_list
            .as_ref()?
            .find_script_or_default(script_tag)
    }

    pub fn find_langsys_feature(
        &self,
        langsys: &LangSys,
        feature_tag: u32,
    ) -> Result<Option<&FeatureTable>, ParseError> {
        match &self.opt_feature_list {
            Some(feature_list) => feature_list.find_langsys_feature(langsys, feature_tag),
            None => Ok(None),
        }
    }

    pub fn lookup(&self, index: u16) -> Option<&PosLookup> {
        self.opt_lookup_list
            .as_ref()?
            .lookups
            .get(usize::from(index))
    }

    /// The lookups a feature refers to, in the order it lists them.
    pub fn feature_lookups(&self, feature: &FeatureTable) -> Result<Vec<&PosLookup>, ParseError> {
        feature
            .lookup_indices
            .iter()
            .map(|&index| self.lookup(index).ok_or(ParseError::BadIndex))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::WriteBuffer;
    use crate::tests::writer::{self, TtfType::*};

    fn single_pos_format1() -> Vec<u8> {
        writer::convert(&[
            UInt16(1),      // format
            UInt16(10),     // coverage offset
            UInt16(0x0005), // X_PLACEMENT | X_ADVANCE
            Int16(-20),
            Int16(100),
            // coverage
            UInt16(1),
            UInt16(2),
            UInt16(5),
            UInt16(7),
        ])
    }

    fn read_subtable(data: &[u8], lookup_type: PosLookupType) -> PosSubtable {
        ReadScope::new(data)
            .read_dep::<PosSubtable>(lookup_type)
            .unwrap()
    }

    #[test]
    fn value_record_fields_follow_format() {
        let record = ValueRecord {
            x_placement: Some(1),
            y_placement: Some(-2),
            x_advance: Some(3),
            y_advance: Some(-4),
            ..ValueRecord::default()
        };
        let all = [1i16, -2, 3, -4];
        for mask in 0..=0xFu16 {
            let value_format = ValueFormat::from_bits(mask).unwrap();
            let mut buffer = WriteBuffer::new();
            ValueRecord::write_dep(&mut buffer, &record, value_format).unwrap();
            let expected = (0..4)
                .filter(|&bit| mask & (1 << bit) != 0)
                .flat_map(|bit| all[bit].to_be_bytes())
                .collect::<Vec<_>>();
            assert_eq!(buffer.bytes(), expected.as_slice(), "mask {:#x}", mask);
            assert_eq!(buffer.bytes().len(), value_format.size());

            let decoded = ReadScope::new(buffer.bytes())
                .read_dep::<ValueRecord>(value_format)
                .unwrap();
            let bit = |n: u16| mask & (1 << n) != 0;
            assert_eq!(decoded.x_placement, Some(1).filter(|_| bit(0)));
            assert_eq!(decoded.y_placement, Some(-2).filter(|_| bit(1)));
            assert_eq!(decoded.x_advance, Some(3).filter(|_| bit(2)));
            assert_eq!(decoded.y_advance, Some(-4).filter(|_| bit(3)));
            assert_eq!(decoded.x_placement_device, None);
            assert_eq!(decoded.value_format(), value_format);
        }
    }

    #[test]
    fn missing_fields_are_written_as_zero() {
        let record = ValueRecord {
            y_advance: Some(7),
            ..ValueRecord::default()
        };
        let mut buffer = WriteBuffer::new();
        let format = ValueFormat::X_ADVANCE | ValueFormat::Y_ADVANCE | ValueFormat::X_ADVANCE_DEVICE;
        ValueRecord::write_dep(&mut buffer, &record, format).unwrap();
        assert_eq!(buffer.bytes(), &[0, 0, 0, 7, 0, 0]);
    }

    #[test]
    fn value_format_rejects_reserved_bits() {
        let data = writer::convert(&[UInt16(0x0100)]);
        assert_eq!(
            ReadScope::new(&data).read::<ValueFormat>(),
            Err(ParseError::BadValue)
        );
    }

    #[test]
    fn read_single_pos() {
        let data = single_pos_format1();
        let single_pos = match read_subtable(&data, PosLookupType::SinglePos) {
            PosSubtable::Single(single_pos) => single_pos,
            other => panic!("expected single pos, got {:?}", other),
        };
        let expected = ValueRecord {
            x_placement: Some(-20),
            x_advance: Some(100),
            ..ValueRecord::default()
        };
        assert_eq!(single_pos.apply(7), Ok(Some(expected)));
        assert_eq!(single_pos.apply(6), Ok(None));

        let data = writer::convert(&[
            UInt16(2),      // format
            UInt16(12),     // coverage offset
            UInt16(0x0008), // Y_ADVANCE
            UInt16(2),      // value count
            Int16(10),
            Int16(20),
            // coverage
            UInt16(1),
            UInt16(2),
            UInt16(3),
            UInt16(9),
        ]);
        let single_pos = ReadScope::new(&data).read::<SinglePos>().unwrap();
        let y_advance = |y| ValueRecord {
            y_advance: Some(y),
            ..ValueRecord::default()
        };
        assert_eq!(single_pos.apply(3), Ok(Some(y_advance(10))));
        assert_eq!(single_pos.apply(9), Ok(Some(y_advance(20))));
        assert_eq!(single_pos.apply(4), Ok(None));
    }

    #[test]
    fn read_pair_pos_format1() {
        let data = writer::convert(&[
            UInt16(1),      // format
            UInt16(22),     // coverage offset
            UInt16(0x0004), // value format 1: X_ADVANCE
            UInt16(0),      // value format 2
            UInt16(1),      // pair set count
            UInt16(12),     // pair set offset
            // pair set
            UInt16(2),
            UInt16(20),
            Int16(-50),
            UInt16(30),
            Int16(-10),
            // coverage
            UInt16(1),
            UInt16(1),
            UInt16(10),
        ]);
        let pair_pos = ReadScope::new(&data).read::<PairPos>().unwrap();
        let x_advance = |x| ValueRecord {
            x_advance: Some(x),
            ..ValueRecord::default()
        };
        assert_eq!(
            pair_pos.apply(10, 30),
            Ok(Some((x_advance(-10), ValueRecord::default())))
        );
        assert_eq!(
            pair_pos.apply(10, 20),
            Ok(Some((x_advance(-50), ValueRecord::default())))
        );
        assert_eq!(pair_pos.apply(10, 31), Ok(None));
        assert_eq!(pair_pos.apply(11, 20), Ok(None));
    }

    #[test]
    fn read_pair_pos_format2() {
        let data = writer::convert(&[
            UInt16(2),      // format
            UInt16(24),     // coverage offset
            UInt16(0x0004), // value format 1: X_ADVANCE
            UInt16(0),      // value format 2
            UInt16(32),     // class def 1 offset
            UInt16(40),     // class def 2 offset
            UInt16(2),      // class 1 count
            UInt16(2),      // class 2 count
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(-40),
            // coverage
            UInt16(1),
            UInt16(2),
            UInt16(5),
            UInt16(6),
            // class def 1
            UInt16(1),
            UInt16(6),
            UInt16(1),
            UInt16(1),
            // class def 2
            UInt16(1),
            UInt16(7),
            UInt16(1),
            UInt16(1),
        ]);
        let pair_pos = read_subtable(&data, PosLookupType::PairPos);
        let pair_pos = match pair_pos {
            PosSubtable::Pair(pair_pos @ PairPos::Format2 { .. }) => pair_pos,
            other => panic!("expected pair pos format 2, got {:?}", other),
        };
        let x_advance = |x| ValueRecord {
            x_advance: Some(x),
            ..ValueRecord::default()
        };
        assert_eq!(
            pair_pos.apply(6, 7),
            Ok(Some((x_advance(-40), ValueRecord::default())))
        );
        assert_eq!(
            pair_pos.apply(5, 7),
            Ok(Some((x_advance(0), ValueRecord::default())))
        );
        assert_eq!(pair_pos.apply(9, 7), Ok(None));
    }

    fn pair_pos_format2_header(value_format1: u16, class_count: u16) -> Vec<u8> {
        writer::convert(&[
            UInt16(2),             // format
            UInt16(16),            // coverage offset
            UInt16(value_format1), // value format 1
            UInt16(0),             // value format 2
            UInt16(22),            // class def 1 offset
            UInt16(30),            // class def 2 offset
            UInt16(class_count),   // class 1 count
            UInt16(class_count),   // class 2 count
            // coverage
            UInt16(1),
            UInt16(1),
            UInt16(5),
            // class def 1
            UInt16(1),
            UInt16(5),
            UInt16(1),
            UInt16(2),
            // class def 2
            UInt16(2),
            UInt16(1),
            UInt16(7),
            UInt16(7),
            UInt16(1),
        ])
    }

    #[test]
    fn pair_pos_format2_large_grid_in_small_table() {
        // 3000 x 3000 empty records claimed by a 40 byte table
        let data = pair_pos_format2_header(0, 3000);
        assert_eq!(data.len(), 40);
        let pair_pos = ReadScope::new(&data).read::<PairPos>().unwrap();
        match &pair_pos {
            PairPos::Format2 {
                class1_count,
                class1_records,
                ..
            } => {
                assert_eq!(*class1_count, 3000);
                assert!(class1_records.is_empty());
            }
            other => panic!("expected pair pos format 2, got {:?}", other),
        }
        assert_eq!(
            pair_pos.apply(5, 7),
            Ok(Some((ValueRecord::default(), ValueRecord::default())))
        );
        assert_eq!(pair_pos.apply(6, 7), Ok(None));

        // With a value format the grid must fit in the data
        let data = pair_pos_format2_header(0x0004, 3000);
        assert_eq!(
            ReadScope::new(&data).read::<PairPos>(),
            Err(ParseError::BadEof)
        );
    }

    #[test]
    fn pair_pos_format2_class_out_of_range() {
        let data = pair_pos_format2_header(0, 2);
        let pair_pos = ReadScope::new(&data).read::<PairPos>().unwrap();
        // Glyph 5 is in class 2 but there are only two first glyph classes
        assert_eq!(pair_pos.apply(5, 7), Err(ParseError::BadIndex));
    }

    #[test]
    fn pair_pos_format2_short_records() {
        let x_advance = ValueRecord {
            x_advance: Some(-30),
            ..ValueRecord::default()
        };
        let pair_pos = PairPos::Format2 {
            coverage: Coverage::Format1 {
                glyph_array: vec![5],
            },
            value_format1: ValueFormat::X_ADVANCE,
            value_format2: ValueFormat::empty(),
            classdef1: ClassDef::Format1 {
                start_glyph: 5,
                class_value_array: vec![1],
            },
            classdef2: ClassDef::Format1 {
                start_glyph: 7,
                class_value_array: vec![0, 1],
            },
            class1_count: 2,
            class2_count: 2,
            class1_records: vec![
                Class1Record {
                    class2_records: Vec::new(),
                },
                Class1Record {
                    class2_records: vec![Class2Record {
                        value_record1: x_advance,
                        value_record2: ValueRecord::default(),
                    }],
                },
            ],
        };
        assert_eq!(
            pair_pos.apply(5, 7),
            Ok(Some((x_advance, ValueRecord::default())))
        );
        assert_eq!(pair_pos.apply(5, 8), Err(ParseError::BadIndex));
    }

    #[test]
    fn zero_width_value_records_are_bounded() {
        let single_pos = |value_count| {
            writer::convert(&[
                UInt16(2),           // format
                UInt16(8),           // coverage offset
                UInt16(0),           // value format
                UInt16(value_count), // value count
                // coverage
                UInt16(1),
                UInt16(1),
                UInt16(5),
            ])
        };
        match ReadScope::new(&single_pos(2)).read::<SinglePos>() {
            Ok(SinglePos::Format2 { value_records, .. }) => {
                assert_eq!(value_records, vec![ValueRecord::default(); 2])
            }
            other => panic!("expected single pos format 2, got {:?}", other),
        }
        assert_eq!(
            ReadScope::new(&single_pos(60000)).read::<SinglePos>(),
            Err(ParseError::Malformed { offset: 8 })
        );
    }

    #[test]
    fn read_cursive_pos() {
        let data = writer::convert(&[
            UInt16(1),  // format
            UInt16(14), // coverage offset
            UInt16(2),  // entry exit count
            UInt16(0),  // glyph 1 entry
            UInt16(22), // glyph 1 exit
            UInt16(28), // glyph 2 entry
            UInt16(0),  // glyph 2 exit
            // coverage
            UInt16(1),
            UInt16(2),
            UInt16(1),
            UInt16(2),
            // anchors
            UInt16(1),
            Int16(100),
            Int16(0),
            UInt16(1),
            Int16(0),
            Int16(50),
        ]);
        let cursive = match read_subtable(&data, PosLookupType::CursivePos) {
            PosSubtable::Cursive(cursive) => cursive,
            other => panic!("expected cursive pos, got {:?}", other),
        };
        assert_eq!(
            cursive.apply(1, 2),
            Ok(Some((
                Anchor::Format1 { x: 100, y: 0 },
                Anchor::Format1 { x: 0, y: 50 }
            )))
        );
        assert_eq!(cursive.apply(2, 1), Ok(None));
        assert_eq!(cursive.entry_exit_records[0].entry_anchor, None);
    }

    fn mark_base_pos() -> Vec<u8> {
        writer::convert(&[
            UInt16(1),  // format
            UInt16(12), // mark coverage offset
            UInt16(18), // base coverage offset
            UInt16(1),  // mark class count
            UInt16(24), // mark array offset
            UInt16(36), // base array offset
            // mark coverage
            UInt16(1),
            UInt16(1),
            UInt16(50),
            // base coverage
            UInt16(1),
            UInt16(1),
            UInt16(10),
            // mark array
            UInt16(1),
            UInt16(0), // class
            UInt16(6), // anchor offset
            UInt16(1),
            Int16(5),
            Int16(600),
            // base array
            UInt16(1),
            UInt16(4), // anchor offset
            UInt16(2),
            Int16(250),
            Int16(500),
            UInt16(3),
        ])
    }

    #[test]
    fn read_mark_base_pos() {
        let data = mark_base_pos();
        let mark_base = match read_subtable(&data, PosLookupType::MarkBasePos) {
            PosSubtable::MarkBase(mark_base) => mark_base,
            other => panic!("expected mark to base, got {:?}", other),
        };
        assert_eq!(
            mark_base.apply(10, 50),
            Ok(Some((
                Anchor::Format2 {
                    x: 250,
                    y: 500,
                    anchor_point: 3
                },
                Anchor::Format1 { x: 5, y: 600 }
            )))
        );
        assert_eq!(mark_base.apply(50, 10), Ok(None));

        // Mark-to-mark shares the layout
        match read_subtable(&data, PosLookupType::MarkMarkPos) {
            PosSubtable::MarkMark(mark_mark) => assert_eq!(mark_mark, mark_base),
            other => panic!("expected mark to mark, got {:?}", other),
        }
    }

    #[test]
    fn read_context_pos() {
        let data = writer::convert(&[
            UInt16(3),  // format
            UInt16(1),  // glyph count
            UInt16(1),  // lookup count
            UInt16(12), // coverage offset
            UInt16(0),  // sequence index
            UInt16(4),  // lookup index
            // coverage
            UInt16(1),
            UInt16(1),
            UInt16(7),
        ]);
        match read_subtable(&data, PosLookupType::ContextPos) {
            PosSubtable::Context(ContextLookup::Format3 {
                coverages,
                lookup_records,
            }) => {
                assert_eq!(coverages[0].glyphs(), vec![7]);
                assert_eq!(lookup_records, vec![(0, 4)]);
            }
            other => panic!("expected context format 3, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_formats_become_markers() {
        let data = writer::convert(&[UInt16(3), UInt16(0)]);
        assert_eq!(
            read_subtable(&data, PosLookupType::SinglePos),
            PosSubtable::Unsupported {
                lookup_type: PosLookupType::SinglePos,
                format: 3
            }
        );

        let data = writer::convert(&[UInt16(1)]);
        assert_eq!(
            read_subtable(&data, PosLookupType::MarkLigPos),
            PosSubtable::Unsupported {
                lookup_type: PosLookupType::MarkLigPos,
                format: 1
            }
        );

        // Called directly the subtable reader reports the format
        assert_eq!(
            ReadScope::new(&writer::convert(&[UInt16(3)])).read::<SinglePos>(),
            Err(ParseError::UnsupportedFormat {
                format: 3,
                offset: 0
            })
        );
    }

    #[test]
    fn errors_inside_supported_subtables_propagate() {
        // Coverage offset points past the end of the data
        let data = writer::convert(&[UInt16(1), UInt16(40), UInt16(0)]);
        assert_eq!(
            ReadScope::new(&data).read_dep::<PosSubtable>(PosLookupType::SinglePos),
            Err(ParseError::BadEof)
        );
    }

    #[test]
    fn read_extension() {
        let mut data = writer::convert(&[UInt16(1), UInt16(1), UInt32(8)]);
        data.extend(single_pos_format1());
        match read_subtable(&data, PosLookupType::Extension) {
            PosSubtable::Extension {
                extension_lookup_type,
                subtable,
            } => {
                assert_eq!(extension_lookup_type, PosLookupType::SinglePos);
                assert_eq!(subtable.lookup_type(), PosLookupType::SinglePos);
                assert!(matches!(*subtable, PosSubtable::Single(_)));
            }
            other => panic!("expected extension, got {:?}", other),
        }
    }

    #[test]
    fn extension_of_extension_is_rejected() {
        let data = writer::convert(&[UInt16(1), UInt16(9), UInt32(8), UInt16(1)]);
        assert_eq!(
            ReadScope::new(&data).read_dep::<PosSubtable>(PosLookupType::Extension),
            Err(ParseError::Malformed { offset: 4 })
        );
    }

    #[test]
    fn extension_with_null_offset_is_rejected() {
        let data = writer::convert(&[UInt16(1), UInt16(1), UInt32(0)]);
        assert_eq!(
            ReadScope::new(&data).read_dep::<PosSubtable>(PosLookupType::Extension),
            Err(ParseError::BadOffset)
        );
    }

    #[test]
    fn extension_types_must_agree() {
        let mut data = writer::convert(&[
            UInt16(9),  // lookup type
            UInt16(0),  // lookup flag
            UInt16(2),  // subtable count
            UInt16(10), // first subtable
            UInt16(34), // second subtable
            // first extension, wraps single pos
            UInt16(1),
            UInt16(1),
            UInt32(8),
        ]);
        data.extend(single_pos_format1());
        data.extend(writer::convert(&[
            // second extension, wraps pair pos
            UInt16(1),
            UInt16(2),
            UInt32(8),
            UInt16(7),
        ]));
        assert_eq!(
            ReadScope::new(&data).read::<PosLookup>(),
            Err(ParseError::Malformed { offset: 10 })
        );
    }

    #[test]
    fn lookup_type_out_of_range() {
        let data = writer::convert(&[UInt16(10), UInt16(0), UInt16(0)]);
        assert_eq!(
            ReadScope::new(&data).read::<PosLookup>(),
            Err(ParseError::BadValue)
        );
        assert_eq!(PosLookupType::try_from(0u16), Err(ParseError::BadValue));
    }

    #[test]
    fn mark_lig_lookup_does_not_stop_siblings() {
        let mut data = writer::convert(&[
            UInt16(2),  // lookup count
            UInt16(6),  // mark to ligature lookup
            UInt16(16), // single pos lookup
            // lookup 0
            UInt16(5),
            UInt16(0),
            UInt16(1),
            UInt16(8),
            UInt16(1), // subtable format
            // lookup 1
            UInt16(1),
            UInt16(0),
            UInt16(1),
            UInt16(8),
        ]);
        data.extend(single_pos_format1());
        let lookup_list = ReadScope::new(&data).read::<LookupList>().unwrap();
        assert_eq!(lookup_list.lookups.len(), 2);
        assert_eq!(
            lookup_list.lookups[0].subtables,
            vec![PosSubtable::Unsupported {
                lookup_type: PosLookupType::MarkLigPos,
                format: 1
            }]
        );
        assert!(matches!(
            lookup_list.lookups[1].subtables[0],
            PosSubtable::Single(_)
        ));
    }

    #[test]
    fn mark_filtering_set_is_read_and_written() {
        let mut data = writer::convert(&[
            UInt16(1),      // lookup type
            UInt16(0x0018), // IGNORE_MARKS | USE_MARK_FILTERING_SET
            UInt16(1),
            UInt16(10),
            UInt16(3), // mark filtering set
        ]);
        data.extend(single_pos_format1());
        let lookup = ReadScope::new(&data).read::<PosLookup>().unwrap();
        assert_eq!(lookup.mark_filtering_set, Some(3));
        assert!(lookup.lookup_flag.contains(LookupFlag::IGNORE_MARKS));

        let mut buffer = WriteBuffer::new();
        PosLookup::write(&mut buffer, &lookup).unwrap();
        assert_eq!(buffer.bytes(), data.as_slice());
    }

    #[test]
    fn mark_filtering_set_must_match_flag() {
        let lookup = PosLookup {
            lookup_type: PosLookupType::SinglePos,
            lookup_flag: LookupFlag::USE_MARK_FILTERING_SET,
            subtables: Vec::new(),
            mark_filtering_set: None,
        };
        let mut buffer = WriteBuffer::new();
        assert_eq!(
            PosLookup::write(&mut buffer, &lookup),
            Err(WriteError::BadValue)
        );
    }

    #[test]
    fn only_single_and_chain_subtables_are_written() {
        let data = mark_base_pos();
        let subtable = read_subtable(&data, PosLookupType::MarkBasePos);
        let mut buffer = WriteBuffer::new();
        assert_eq!(
            PosSubtable::write(&mut buffer, &subtable),
            Err(WriteError::NotImplemented)
        );

        let extension = PosSubtable::Extension {
            extension_lookup_type: PosLookupType::SinglePos,
            subtable: Box::new(read_subtable(
                &single_pos_format1(),
                PosLookupType::SinglePos,
            )),
        };
        assert_eq!(
            PosSubtable::write(&mut buffer, &extension),
            Err(WriteError::NotImplemented)
        );
    }

    #[test]
    fn single_pos_round_trip() {
        let data = single_pos_format1();
        let single_pos = ReadScope::new(&data).read::<SinglePos>().unwrap();
        let mut buffer = WriteBuffer::new();
        SinglePos::write(&mut buffer, &single_pos).unwrap();
        assert_eq!(buffer.bytes(), data.as_slice());
    }
}

use opentype_codec::binary::read::ReadScope;
use opentype_codec::binary::write::{WriteBinary, WriteBuffer};
use opentype_codec::binary::Version;
use opentype_codec::error::{ParseError, WriteError};
use opentype_codec::gpos::{
    GposTable, LookupList, PairPos, PosLookup, PosLookupType, PosSubtable, SinglePos,
    ValueFormat, ValueRecord,
};
use opentype_codec::layout::{
    ChainContextLookup, Coverage, FeatureList, FeatureRecord, FeatureTable, FeatureVariations,
    LangSys, LangSysRecord, LookupFlag, ScriptList, ScriptRecord, ScriptTable,
};
use opentype_codec::tag;

fn lookup(lookup_type: PosLookupType, subtables: Vec<PosSubtable>) -> PosLookup {
    PosLookup {
        lookup_type,
        lookup_flag: LookupFlag::empty(),
        subtables,
        mark_filtering_set: None,
    }
}

fn advance(x_placement: i16, x_advance: i16) -> ValueRecord {
    ValueRecord {
        x_placement: Some(x_placement),
        x_advance: Some(x_advance),
        ..ValueRecord::default()
    }
}

fn kerning_table() -> GposTable {
    let single = SinglePos::Format1 {
        coverage: Coverage::Format1 {
            glyph_array: vec![3, 4, 9],
        },
        value_format: ValueFormat::X_PLACEMENT | ValueFormat::X_ADVANCE,
        value_record: advance(-10, 20),
    };
    let per_glyph = SinglePos::Format2 {
        coverage: Coverage::ranges_from_glyphs(&[20, 21, 22]),
        value_format: ValueFormat::Y_PLACEMENT,
        value_records: vec![
            ValueRecord {
                y_placement: Some(1),
                ..ValueRecord::default()
            },
            ValueRecord {
                y_placement: Some(2),
                ..ValueRecord::default()
            },
            ValueRecord {
                y_placement: Some(-3),
                ..ValueRecord::default()
            },
        ],
    };
    let chain = ChainContextLookup::Format3 {
        backtrack_coverages: vec![Coverage::Format1 {
            glyph_array: vec![1],
        }],
        input_coverages: vec![
            Coverage::Format1 {
                glyph_array: vec![3],
            },
            Coverage::Format1 {
                glyph_array: vec![4, 5],
            },
        ],
        lookahead_coverages: vec![],
        lookup_records: vec![(0, 0), (1, 1)],
    };

    let langsys = LangSys {
        required_feature_index: None,
        feature_indices: vec![0],
    };
    GposTable {
        version: Version::new(1, 0),
        opt_script_list: Some(ScriptList {
            script_records: vec![
                ScriptRecord {
                    script_tag: tag::DFLT,
                    script_table: ScriptTable {
                        opt_default_langsys: Some(langsys.clone()),
                        langsys_records: vec![],
                    },
                },
                ScriptRecord {
                    script_tag: tag::LATN,
                    script_table: ScriptTable {
                        opt_default_langsys: None,
                        langsys_records: vec![LangSysRecord {
                            langsys_tag: tag::from_string("TRK").unwrap(),
                            langsys_table: langsys,
                        }],
                    },
                },
            ],
        }),
        opt_feature_list: Some(FeatureList {
            feature_records: vec![FeatureRecord {
                feature_tag: tag::KERN,
                feature_table: FeatureTable {
                    lookup_indices: vec![0, 2],
                },
            }],
        }),
        opt_lookup_list: Some(LookupList {
            lookups: vec![
                lookup(
                    PosLookupType::SinglePos,
                    vec![PosSubtable::Single(single), PosSubtable::Single(per_glyph)],
                ),
                PosLookup {
                    lookup_type: PosLookupType::SinglePos,
                    lookup_flag: LookupFlag::IGNORE_MARKS | LookupFlag::USE_MARK_FILTERING_SET,
                    subtables: vec![],
                    mark_filtering_set: Some(2),
                },
                lookup(
                    PosLookupType::ChainContextPos,
                    vec![PosSubtable::ChainContext(chain)],
                ),
            ],
        }),
        opt_feature_variations: None,
    }
}

fn write_table(table: &GposTable) -> Result<Vec<u8>, WriteError> {
    let mut buffer = WriteBuffer::new();
    GposTable::write(&mut buffer, table)?;
    Ok(buffer.into_inner())
}

#[test]
fn round_trip() {
    let table = kerning_table();
    let data = write_table(&table).unwrap();
    let read_back = ReadScope::new(&data).read::<GposTable>().unwrap();
    assert_eq!(read_back, table);

    // Writing the decoded table again is stable.
    assert_eq!(write_table(&read_back).unwrap(), data);
}

#[test]
fn feature_lookup_queries() {
    let data = write_table(&kerning_table()).unwrap();
    let table = ReadScope::new(&data).read::<GposTable>().unwrap();

    let script = table.find_script_or_default(tag::from_string("cyrl").unwrap()).unwrap();
    let langsys = script.default_langsys_record().unwrap();
    let kern = table.find_langsys_feature(langsys, tag::KERN).unwrap().unwrap();
    let lookups = table.feature_lookups(kern).unwrap();
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[1].lookup_type, PosLookupType::ChainContextPos);

    let latn = table.find_script(tag::LATN).unwrap();
    assert!(latn.find_langsys(tag::from_string("TRK").unwrap()).is_some());
    assert!(latn.default_langsys_record().is_none());

    match &lookups[0].subtables[0] {
        PosSubtable::Single(single) => {
            assert_eq!(single.apply(9).unwrap(), Some(advance(-10, 20)));
            assert_eq!(single.apply(5).unwrap(), None);
        }
        other => panic!("unexpected subtable {:?}", other),
    }
    match &lookups[0].subtables[1] {
        PosSubtable::Single(single) => {
            let record = single.apply(22).unwrap().unwrap();
            assert_eq!(record.y_placement, Some(-3));
        }
        other => panic!("unexpected subtable {:?}", other),
    }

    let missing = FeatureTable {
        lookup_indices: vec![7],
    };
    assert_eq!(table.feature_lookups(&missing), Err(ParseError::BadIndex));
}

#[test]
fn versions() {
    let header = |major: u16, minor: u16| -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&major.to_be_bytes());
        data.extend_from_slice(&minor.to_be_bytes());
        data.extend_from_slice(&[0; 6]);
        data
    };

    let table = ReadScope::new(&header(1, 0)).read::<GposTable>().unwrap();
    assert_eq!(table.version, Version::new(1, 0));
    assert!(table.opt_lookup_list.is_none());

    // Version 1.1 adds a 32-bit feature variations offset.
    let mut data = header(1, 1);
    data.extend_from_slice(&[0, 0, 0, 14]);
    data.extend_from_slice(&[0, 1, 0, 0, 0, 0, 0, 0]);
    let table = ReadScope::new(&data).read::<GposTable>().unwrap();
    assert_eq!(
        table.opt_feature_variations,
        Some(FeatureVariations {
            version: Version::new(1, 0),
            records: vec![],
        })
    );

    for (major, minor) in [(2, 0), (1, 2), (0, 1)] {
        assert_eq!(
            ReadScope::new(&header(major, minor)).read::<GposTable>(),
            Err(ParseError::BadVersion)
        );
    }
}

#[test]
fn unwritable_tables() {
    let mut table = kerning_table();
    let pair = PairPos::Format1 {
        coverage: Coverage::Format1 {
            glyph_array: vec![1],
        },
        value_format1: ValueFormat::X_ADVANCE,
        value_format2: ValueFormat::empty(),
        pair_sets: vec![],
    };
    table
        .opt_lookup_list
        .as_mut()
        .unwrap()
        .lookups
        .push(lookup(PosLookupType::PairPos, vec![PosSubtable::Pair(pair)]));
    assert_eq!(write_table(&table), Err(WriteError::NotImplemented));

    let mut table = kerning_table();
    table.opt_feature_variations = Some(FeatureVariations {
        version: Version::new(1, 0),
        records: vec![],
    });
    assert_eq!(write_table(&table), Err(WriteError::NotImplemented));
}

#[test]
fn offsets_that_do_not_fit_overflow() {
    let glyphs: Vec<u16> = (0..20000).collect();
    let single = SinglePos::Format2 {
        coverage: Coverage::Format1 {
            glyph_array: glyphs,
        },
        value_format: ValueFormat::X_PLACEMENT | ValueFormat::X_ADVANCE,
        value_records: vec![advance(1, 2); 20000],
    };
    let mut table = kerning_table();
    table.opt_lookup_list = Some(LookupList {
        lookups: vec![lookup(
            PosLookupType::SinglePos,
            vec![PosSubtable::Single(single)],
        )],
    });
    assert_eq!(write_table(&table), Err(WriteError::Overflow));
}

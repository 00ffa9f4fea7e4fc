//! Shared fixtures for store integration tests.
#![allow(dead_code)]

use colstore_core::{
    Categorical, CategoryLabels, Column, NumericValues, Table, TimeUnit, table::MISSING_CODE,
    table::NAT,
};

/// Four-row table with one column of each kind.
///
/// `A` text a..d, `B` unordered categorical over a..d, `C` microsecond
/// timestamps, `D` uint64.
pub fn abcd_table() -> Table {
    let letters = ["a", "b", "c", "d"];
    Table::try_new(vec![
        Column::text("A", letters.map(Some)),
        Column::categorical("B", Categorical::from_text(&letters.map(Some), false)),
        Column::numeric(
            "C",
            NumericValues::timestamps(
                TimeUnit::Microsecond,
                vec![
                    1_704_067_200_000_000,
                    1_704_067_200_000_001,
                    1_704_153_600_000_000,
                    1_704_240_000_500_000,
                ],
            ),
        ),
        Column::numeric("D", vec![0u64, 1, u64::MAX - 1, u64::MAX]),
    ])
    .expect("valid abcd table")
}

/// Table exercising every numeric subtype, missing markers and both
/// categorical flavors.
pub fn kitchen_sink_table() -> Table {
    Table::try_new(vec![
        Column::text(
            "note",
            [Some("plain"), None, Some("comma, quote \" and\nnewline"), Some("é")],
        ),
        Column::numeric("flag", vec![true, false, false, true]),
        Column::numeric("i8", vec![i8::MIN, -1, 0, i8::MAX]),
        Column::numeric("i16", vec![i16::MIN, -1, 0, i16::MAX]),
        Column::numeric("i32", vec![i32::MIN, -1, 0, i32::MAX]),
        Column::numeric("i64", vec![i64::MIN, -1, 0, i64::MAX]),
        Column::numeric("u8", vec![0u8, 1, 254, u8::MAX]),
        Column::numeric("u16", vec![0u16, 1, 65_534, u16::MAX]),
        Column::numeric("u32", vec![0u32, 1, 7, u32::MAX]),
        Column::numeric("u64", vec![0u64, 1, 7, u64::MAX]),
        Column::numeric("f32", vec![0.5f32, -0.0, f32::NAN, f32::MAX]),
        Column::numeric("f64", vec![0.1f64, f64::INFINITY, f64::NAN, f64::MIN_POSITIVE]),
        Column::numeric(
            "ts_tz",
            NumericValues::Timestamp {
                unit: TimeUnit::Nanosecond,
                timezone: Some("America/New_York".to_string()),
                values: vec![0, NAT, -1, 1_700_000_000_123_456_789],
            },
        ),
        Column::categorical(
            "size",
            Categorical::try_new(
                vec![2, 0, MISSING_CODE, 1],
                CategoryLabels::Text(vec!["S".into(), "M".into(), "L".into()]),
                true,
            )
            .expect("valid ordered categorical"),
        ),
        Column::categorical(
            "bucket",
            Categorical::try_new(
                vec![0, 0, 1, MISSING_CODE],
                CategoryLabels::Numeric(NumericValues::from(vec![100i32, -5])),
                false,
            )
            .expect("valid numeric categorical"),
        ),
    ])
    .expect("valid kitchen sink table")
}

// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Conversion of columnar pages into rows.

use base64::Engine;
use serde_json::{Map, Number, Value};

use crate::protocol::{Column, RowSet, TableSchema, TypedColumn};

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Converts `pages` into rows, in page order.
pub fn rows(schema: &TableSchema, pages: &[RowSet]) -> Vec<Row> {
    pages.iter().flat_map(|page| page_rows(schema, page)).collect()
}

/// Converts one page into rows.
///
/// The row count is taken from the page's first column. Columns the schema
/// does not name are keyed `_c<index>`. Null rows, as well as `NaN` and
/// infinite doubles, become [`Value::Null`]; binary values are base64
/// encoded.
pub fn page_rows(schema: &TableSchema, page: &RowSet) -> Vec<Row> {
    let count = page
        .columns
        .first()
        .and_then(Column::populated_len)
        .unwrap_or(0);
    let names: Vec<String> = (0..page.columns.len())
        .map(|i| match schema.columns.get(i) {
            Some(desc) => desc.column_name.clone(),
            None => format!("_c{i}"),
        })
        .collect();

    (0..count)
        .map(|row| {
            names
                .iter()
                .zip(&page.columns)
                .map(|(name, column)| (name.clone(), cell(column, row)))
                .collect()
        })
        .collect()
}

fn cell(column: &Column, row: usize) -> Value {
    if let Some(c) = &column.binary_val {
        return typed(c, row, |v| {
            Value::String(base64::engine::general_purpose::STANDARD.encode(v))
        });
    }
    if let Some(c) = &column.bool_val {
        return typed(c, row, |v| Value::Bool(*v));
    }
    if let Some(c) = &column.byte_val {
        return typed(c, row, |v| Value::from(*v));
    }
    if let Some(c) = &column.double_val {
        return typed(c, row, |v| {
            Number::from_f64(*v).map_or(Value::Null, Value::Number)
        });
    }
    if let Some(c) = &column.i16_val {
        return typed(c, row, |v| Value::from(*v));
    }
    if let Some(c) = &column.i32_val {
        return typed(c, row, |v| Value::from(*v));
    }
    if let Some(c) = &column.i64_val {
        return typed(c, row, |v| Value::from(*v));
    }
    if let Some(c) = &column.string_val {
        return typed(c, row, |v| Value::String(v.clone()));
    }
    Value::Null
}

fn typed<T>(column: &TypedColumn<T>, row: usize, f: impl FnOnce(&T) -> Value) -> Value {
    if column.is_null(row) {
        return Value::Null;
    }
    column.values.get(row).map_or(Value::Null, f)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::protocol::ColumnDesc;

    use super::*;

    fn schema(names: &[&str]) -> TableSchema {
        TableSchema {
            columns: names
                .iter()
                .enumerate()
                .map(|(i, name)| ColumnDesc {
                    column_name: name.to_string(),
                    type_name: "STRING_TYPE".into(),
                    position: i32::try_from(i).unwrap() + 1,
                    comment: None,
                })
                .collect(),
        }
    }

    #[test]
    fn honours_null_bitmap() {
        let page = RowSet {
            start_row_offset: 0,
            columns: vec![
                Column {
                    i64_val: Some(TypedColumn {
                        values: vec![1, 0, 3, 0, 5, 6, 7, 8, 0],
                        // Rows 1, 3 and 8.
                        nulls: vec![0b0000_1010, 0b0000_0001],
                    }),
                    ..Default::default()
                },
                Column {
                    string_val: Some(TypedColumn::new(
                        ["a", "b", "c", "d", "e", "f", "g", "h", "i"]
                            .map(String::from)
                            .to_vec(),
                    )),
                    ..Default::default()
                },
            ],
        };
        let rows = page_rows(&schema(&["id", "name"]), &page);
        assert_eq!(rows.len(), 9);
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(
            ids,
            vec![
                json!(1),
                Value::Null,
                json!(3),
                Value::Null,
                json!(5),
                json!(6),
                json!(7),
                json!(8),
                Value::Null
            ]
        );
        assert_eq!(rows[8]["name"], json!("i"));
    }

    #[test]
    fn converts_each_type() {
        let page = RowSet {
            start_row_offset: 0,
            columns: vec![
                Column {
                    bool_val: Some(TypedColumn::new(vec![true])),
                    ..Default::default()
                },
                Column {
                    byte_val: Some(TypedColumn::new(vec![-1])),
                    ..Default::default()
                },
                Column {
                    double_val: Some(TypedColumn::new(vec![f64::NAN])),
                    ..Default::default()
                },
                Column {
                    binary_val: Some(TypedColumn::new(vec![b"hi".to_vec()])),
                    ..Default::default()
                },
                Column::default(),
            ],
        };
        let rows = page_rows(&schema(&["b", "t", "d"]), &page);
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"b": true, "t": -1, "d": null, "_c3": "aGk=", "_c4": null})
        );
    }

    #[test]
    fn concatenates_pages() {
        let page = |values: Vec<i32>| RowSet {
            start_row_offset: 0,
            columns: vec![Column {
                i32_val: Some(TypedColumn::new(values)),
                ..Default::default()
            }],
        };
        let rows = rows(
            &schema(&["n"]),
            &[page(vec![1, 2]), page(vec![]), page(vec![3])],
        );
        let values: Vec<_> = rows.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(values, vec![json!(1), json!(2), json!(3)]);
    }
}

use orc_core::*;

use test_helpers::*;

#[test]
fn test_nullable_columns_roundtrip() {
    let schema = create_test_schema();
    let rows: Vec<Vec<OrcValue>> = (0..100)
        .map(|i| {
            vec![
                OrcValue::Int32(i),
                if i % 3 == 0 {
                    OrcValue::Null
                } else {
                    OrcValue::from(format!("n{}", i))
                },
                OrcValue::from(if i % 4 == 0 { None } else { Some(i as f64) }),
                OrcValue::Boolean(i % 2 == 0),
            ]
        })
        .collect();

    test_roundtrip(rows, schema).unwrap();
}

#[test]
fn test_all_null_column() {
    let schema = Schema::parse("struct<a:int,b:string,c:list<int>>").unwrap();
    let rows: Vec<Vec<OrcValue>> = (0..20)
        .map(|i| vec![OrcValue::Int32(i), OrcValue::Null, OrcValue::Null])
        .collect();

    let bytes = write_to_bytes(WriterBuilder::new(), schema.clone(), rows.clone()).unwrap();
    let reader = Reader::open(bytes.clone()).unwrap();
    let b = reader.column_statistics("b").unwrap();
    assert_eq!(b.count, 20);
    assert_eq!(b.null_count, 20);
    assert_eq!(b.min(), None);

    test_roundtrip(rows, schema).unwrap();
}

#[test]
fn test_nulls_inside_nested_values() {
    let schema = Schema::parse(
        "struct<items:list<string>,lookup:map<string,int>,inner:struct<x:int,y:string>>",
    )
    .unwrap();
    let rows = vec![
        vec![
            OrcValue::List(vec![OrcValue::Null, OrcValue::from("a"), OrcValue::Null]),
            OrcValue::Map(vec![
                (OrcValue::from("k1"), OrcValue::Null),
                (OrcValue::from("k2"), OrcValue::Int32(2)),
            ]),
            OrcValue::record([("x", OrcValue::Null), ("y", OrcValue::from("why"))]),
        ],
        vec![OrcValue::Null, OrcValue::Null, OrcValue::Null],
        vec![
            OrcValue::List(vec![]),
            OrcValue::Map(vec![]),
            OrcValue::record([("x", OrcValue::Int32(1)), ("y", OrcValue::Null)]),
        ],
    ];

    test_roundtrip(rows, schema).unwrap();
}

#[test]
fn test_missing_record_fields_read_back_as_null() {
    let schema = Schema::parse("struct<inner:struct<x:int,y:string>>").unwrap();
    let bytes = write_to_bytes(
        WriterBuilder::new(),
        schema,
        vec![vec![OrcValue::record([("y", OrcValue::from("only y"))])]],
    )
    .unwrap();

    let rows = read_all(bytes).unwrap();
    assert_eq!(
        rows[0][0],
        OrcValue::record([("x", OrcValue::Null), ("y", OrcValue::from("only y"))])
    );
}

#[test]
fn test_unknown_record_field_is_rejected() {
    let schema = Schema::parse("struct<inner:struct<x:int>>").unwrap();
    let mut writer = Writer::new(Vec::new(), schema).unwrap();
    let err = writer
        .write_row(vec![OrcValue::record([("z", OrcValue::Int32(1))])])
        .unwrap_err();
    assert!(matches!(err, OrcError::UnsupportedValueType { .. }));
}

#[test]
fn test_null_row_root_for_struct_fields() {
    // stripes without any null skip the PRESENT stream; mixing both must still decode
    let schema = Schema::parse("struct<v:bigint>").unwrap();
    let mut rows: Vec<Vec<OrcValue>> = (0..10).map(|i| vec![OrcValue::Int64(i)]).collect();
    rows.extend((0..10).map(|i| vec![OrcValue::from(if i % 2 == 0 { Some(i as i64) } else { None })]));

    test_roundtrip_with_options(rows, schema, WriterBuilder::new().with_stripe_row_limit(10))
        .unwrap();
}

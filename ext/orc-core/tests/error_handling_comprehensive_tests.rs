use bytes::Bytes;
use orc_core::*;

use test_helpers::*;

fn sample_file(stripe_rows: u64, total_rows: usize) -> Vec<u8> {
    write_to_bytes(
        WriterBuilder::new().with_stripe_row_limit(stripe_rows),
        create_test_schema(),
        generate_test_rows(total_rows),
    )
    .unwrap()
    .to_vec()
}

#[test]
fn test_open_rejects_non_orc_input() {
    for input in [
        Bytes::new(),
        Bytes::from_static(b"PAR1"),
        Bytes::from_static(b"not an orc file at all, just some text"),
    ] {
        assert!(matches!(
            Reader::open(input).err().unwrap(),
            OrcError::NotAnOrcFile
        ));
    }
}

#[test]
fn test_open_rejects_truncated_files() {
    let file = sample_file(100, 100);

    for len in [3, 10, file.len() - 1] {
        let truncated = Bytes::copy_from_slice(&file[..len]);
        let err = Reader::open(truncated).err().unwrap();
        assert!(
            matches!(err, OrcError::TruncatedFile(_)),
            "length {}: unexpected {:?}",
            len,
            err
        );
    }
}

#[test]
fn test_open_rejects_future_major_version() {
    let mut file = sample_file(100, 10);
    // [.. major, minor, "ORC", postscript length]
    let major = file.len() - 1 - 3 - 2;
    file[major] = 1;

    let err = Reader::open(Bytes::from(file)).err().unwrap();
    assert!(matches!(err, OrcError::UnsupportedVersion { major: 1, .. }));
}

#[test]
fn test_newer_minor_version_is_accepted() {
    let mut file = sample_file(100, 10);
    let minor = file.len() - 1 - 3 - 1;
    file[minor] = 99;

    let reader = Reader::open(Bytes::from(file)).unwrap();
    assert_eq!(reader.metadata().version, (0, 99));
    assert_eq!(reader.read_rows().count(), 10);
}

#[test]
fn test_open_rejects_corrupt_footer() {
    let file = sample_file(100, 10);
    let reader = Reader::open(Bytes::from(file.clone())).unwrap();
    let footer_start = reader
        .stripes()
        .last()
        .map(|s| s.offset + s.total_length())
        .unwrap() as usize;

    let schema_at = footer_start
        + file[footer_start..]
            .windows(7)
            .position(|w| w == b"struct<")
            .unwrap();
    let mut corrupt = file;
    corrupt[schema_at] = b'#';

    let err = Reader::open(Bytes::from(corrupt)).err().unwrap();
    assert!(matches!(err, OrcError::CorruptFooter(_)), "unexpected {:?}", err);
}

#[test]
fn test_corrupt_stripe_leaves_other_stripes_readable() {
    let mut file = sample_file(10, 30);
    let stripes = Reader::open(Bytes::from(file.clone()))
        .unwrap()
        .stripes()
        .to_vec();
    assert_eq!(stripes.len(), 3);

    file[stripes[1].offset as usize + 2] ^= 0x5a;
    let reader = Reader::open(Bytes::from(file)).unwrap();

    let first: Vec<_> = reader.read_stripe(0).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(first, generate_test_rows(10));

    match reader.read_stripe(1).err().unwrap() {
        OrcError::CorruptStripe { stripe, reason } => {
            assert_eq!(stripe, 1);
            assert!(reason.contains("checksum"), "{}", reason);
        }
        other => panic!("unexpected {:?}", other),
    }

    let last: Vec<_> = reader.read_stripe(2).unwrap().collect::<Result<_>>().unwrap();
    assert_eq!(last, generate_test_rows(30)[20..].to_vec());

    // row iteration stops at the damaged stripe
    let rows: Vec<_> = reader.read_rows().collect();
    assert_eq!(rows.len(), 11);
    assert!(rows[10].is_err());
}

#[test]
fn test_corrupt_stripe_without_checksum_verification() {
    let mut file = sample_file(10, 20);
    let reader = Reader::open(Bytes::from(file.clone())).unwrap();
    let stripe = reader.stripes()[1];

    // clobber the stripe footer so its layout cannot be parsed
    let footer_start = (stripe.offset + stripe.data_length) as usize;
    for byte in &mut file[footer_start..footer_start + stripe.footer_length as usize] {
        *byte = 0xff;
    }

    let reader = ReaderBuilder::new()
        .with_checksum_verification(false)
        .open(Bytes::from(file))
        .unwrap();
    assert!(reader.read_stripe(0).is_ok());
    assert!(matches!(
        reader.read_stripe(1).err().unwrap(),
        OrcError::CorruptStripe { stripe: 1, .. }
    ));
}

#[test]
fn test_index_out_of_range() {
    let reader = Reader::open(Bytes::from(sample_file(10, 20))).unwrap();

    assert!(matches!(
        reader.read_stripe(2).err().unwrap(),
        OrcError::IndexOutOfRange { index: 2, len: 2 }
    ));
    assert!(matches!(
        reader.read_row(20),
        Err(OrcError::IndexOutOfRange { index: 20, len: 20 })
    ));
    assert!(reader.stripe_statistics(5).is_err());
}

#[test]
fn test_missing_file() {
    let err = FileChunkReader::new("/nonexistent/path/data.orc").unwrap_err();
    assert!(err.to_string().contains("Failed to open"));
    assert!(matches!(err.root(), OrcError::Io(_)));
}

#[test]
fn test_schema_errors_carry_position() {
    match Schema::parse("struct<a:int,b:integer>").unwrap_err() {
        OrcError::InvalidSchemaSyntax { position, message } => {
            assert!(position > 0);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected {:?}", other),
    }
}

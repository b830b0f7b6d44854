use omx::store::{OpenMode, StoreFile, StoreType};
use omx::{CompressionLevel, ErrorKind, LogicalType, OmxFile, ZonalDataset};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn scratch(name: &str) -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

fn sequential_round_trip(zones: u64, compression: CompressionLevel) {
    let (_dir, path) = scratch("sequential.omx");

    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(zones).unwrap();
        let matrix = file
            .add_matrix_compressed("seq", LogicalType::Double, compression)
            .unwrap();
        let mut row = vec![0f64; zones as usize];
        for r in 0..zones {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (r * zones + c as u64) as f64;
            }
            matrix.write_row_typed(r, &row).unwrap();
        }
        file.close().unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    let matrix = file.matrix_mut("seq").unwrap();
    assert_eq!(matrix.compression_level(), compression);
    let mut row = vec![0f64; zones as usize];
    for r in 0..zones {
        matrix.read_row_typed(r, &mut row).unwrap();
        for (c, &cell) in row.iter().enumerate() {
            assert_eq!(cell, (r * zones + c as u64) as f64, "cell ({r}, {c})");
        }
    }
}

#[test]
fn sequential_rows_survive_reopen() {
    sequential_round_trip(500, CompressionLevel::NoCompression);
    sequential_round_trip(300, CompressionLevel::Level6);
}

#[test]
fn sampled_rows_survive_reopen_5000_zones() {
    let (_dir, path) = scratch("sampled.omx");
    let zones = 5000u64;
    let sampled: Vec<u64> = (0..zones).step_by(97).chain([zones - 1]).collect();
    let cell = |r: u64, c: u64| ((r * zones + c) % 1_000_003) as f32;

    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(zones).unwrap();
        let matrix = file.add_matrix("sampled", LogicalType::Float).unwrap();
        for &r in &sampled {
            let row: Vec<f32> = (0..zones).map(|c| cell(r, c)).collect();
            matrix.write_row_typed(r, &row).unwrap();
        }
        file.close().unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.zones().unwrap(), zones);
    let matrix = file.matrix_mut("sampled").unwrap();
    let mut row = vec![0f32; zones as usize];
    for &r in &sampled {
        matrix.read_row_typed(r, &mut row).unwrap();
        for (c, &value) in row.iter().enumerate() {
            assert_eq!(value, cell(r, c as u64), "cell ({r}, {c})");
        }
    }

    // Rows never written read back as zeros
    matrix.read_row_typed(1, &mut row).unwrap();
    assert!(row.iter().all(|&v| v == 0.0));
}

#[test]
fn rewrites_and_flushes_keep_file_size_bounded() {
    let (_dir, path) = scratch("bounded.omx");
    let zones = 1000u64;
    let cell = |r: u64, c: u64, pass: u64| ((r * 31 + c * 17 + pass) % 977) as f64;
    let write = |file: &mut OmxFile, rows: &[u64], pass: u64| {
        let matrix = file.matrix_mut("m").unwrap();
        for &r in rows {
            let row: Vec<f64> = (0..zones).map(|c| cell(r, c, pass)).collect();
            matrix.write_row_typed(r, &row).unwrap();
        }
    };

    let mut file = OmxFile::new(&path);
    file.open_with_truncate(zones).unwrap();
    file.add_matrix_compressed("m", LogicalType::Double, CompressionLevel::Level1)
        .unwrap();
    let all: Vec<u64> = (0..zones).collect();
    write(&mut file, &all, 0);
    file.flush().unwrap();
    let baseline = file.file_size().unwrap();

    // Alternating halves switch chunks on every row
    let interleaved: Vec<u64> = (0..zones / 2).flat_map(|r| [r, r + zones / 2]).collect();
    for pass in 1..=2 {
        write(&mut file, &interleaved, pass);
    }
    file.flush().unwrap();
    let rewritten = file.file_size().unwrap();
    assert!(
        rewritten <= baseline * 3,
        "{rewritten} bytes after rewrites, {baseline} before"
    );

    for i in 0..100u32 {
        file.attributes_mut().unwrap().set("stamp", i).unwrap();
        file.flush().unwrap();
    }
    let stamped = file.file_size().unwrap();
    assert!(
        stamped < rewritten + 32 * 1024,
        "{stamped} bytes after attribute flushes, {rewritten} before"
    );

    let matrix = file.matrix_mut("m").unwrap();
    let mut row = vec![0f64; zones as usize];
    for r in [0, 1, zones / 2, zones - 1] {
        matrix.read_row_typed(r, &mut row).unwrap();
        for (c, &value) in row.iter().enumerate() {
            assert_eq!(value, cell(r, c as u64, 2), "cell ({r}, {c})");
        }
    }
    file.close().unwrap();

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.attributes().unwrap().get::<u32>("stamp").unwrap(), 99);
    file.matrix_mut("m").unwrap().read_row_typed(zones - 2, &mut row).unwrap();
    assert_eq!(row[3], cell(zones - 2, 3, 2));
}

#[test]
#[ignore = "writes a 200 MB container"]
fn sequential_rows_survive_reopen_5000_zones() {
    sequential_round_trip(5000, CompressionLevel::NoCompression);
}

#[test]
fn duplicate_and_empty_names_are_rejected() {
    let (_dir, path) = scratch("names.omx");
    let mut file = OmxFile::new(&path);
    file.open_with_truncate(10).unwrap();

    file.add_matrix("m", LogicalType::Double).unwrap();
    let err = file.add_matrix("m", LogicalType::Double).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateName);

    let err = file.add_matrix("", LogicalType::Double).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDataType);

    let err = file.add_matrix("text", LogicalType::String).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDataType);
    assert_eq!(file.matrix_count().unwrap(), 1);
}

#[test]
fn lookups_by_index_and_name() {
    let (_dir, path) = scratch("lookups.omx");
    let mut file = OmxFile::new(&path);
    file.open_with_truncate(4).unwrap();
    for name in ["a", "b", "c"] {
        file.add_matrix(name, LogicalType::Int32).unwrap();
    }

    assert_eq!(file.matrix_at(42).unwrap_err().kind(), ErrorKind::IndexOutOfRange);
    assert_eq!(file.matrix("missing").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(file.matrix_at(2).unwrap().name(), "c");
    assert!(file.matrix_exists("b").unwrap());
    assert!(!file.zonal_reference_exists("b").unwrap());
}

#[test]
fn creation_order_survives_reopen() {
    let (_dir, path) = scratch("order.omx");
    let matrices = ["zeta", "alpha", "mid", "beta"];
    let references = ["names", "area", "district"];

    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(6).unwrap();
        for name in matrices {
            file.add_matrix(name, LogicalType::Float).unwrap();
        }
        for name in references {
            file.add_zonal_reference(name, LogicalType::UInt16).unwrap();
        }
        file.remove_matrix("mid").unwrap();
        file.add_matrix("mid", LogicalType::Float).unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.matrix_names().unwrap(), vec!["zeta", "alpha", "beta", "mid"]);
    assert_eq!(file.zonal_reference_names().unwrap(), references.to_vec());
}

#[test]
fn remove_by_index_and_name() {
    let (_dir, path) = scratch("remove.omx");
    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(3).unwrap();
        for name in ["a", "b", "c"] {
            file.add_matrix(name, LogicalType::UInt8)
                .unwrap()
                .write_row(0, &[1, 2, 3])
                .unwrap();
        }
        file.add_zonal_reference("r", LogicalType::Int64).unwrap();

        file.remove_matrix_at(0).unwrap();
        file.remove_zonal_reference("r").unwrap();
        assert_eq!(file.remove_matrix("a").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(file.remove_matrix_at(5).unwrap_err().kind(), ErrorKind::IndexOutOfRange);
        file.close().unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open().unwrap();
    assert_eq!(file.matrix_names().unwrap(), vec!["b", "c"]);
    assert_eq!(file.zonal_reference_count().unwrap(), 0);
    assert_eq!(file.matrix_mut("c").unwrap().read_row_vec::<u8>(0).unwrap(), vec![1, 2, 3]);
}

#[test]
fn string_reference_length_must_match_zones() {
    let (_dir, path) = scratch("labels.omx");
    let zones = 5000u64;
    let labels: Vec<String> = (0..zones).map(|z| format!("zone-{z}")).collect();

    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(zones).unwrap();
        let reference = file
            .add_zonal_reference("labels", LogicalType::String)
            .unwrap();
        let err = reference
            .write_string_reference(&labels[..4999])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SizeMismatch);
        reference.write_string_reference(&labels).unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    let reference = file.zonal_reference("labels").unwrap();
    assert_eq!(reference.data_size(), 0);
    assert_eq!(reference.read_string_reference().unwrap(), labels);
}

#[test]
fn numeric_reference_round_trip() {
    let (_dir, path) = scratch("areas.omx");
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let areas: Vec<f64> = (0..250).map(|_| rng.gen_range(0.0..100.0)).collect();

    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(250).unwrap();
        file.add_zonal_reference_compressed("area", LogicalType::Double, CompressionLevel::Level9)
            .unwrap()
            .write_reference_typed(&areas)
            .unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    let reference = file.zonal_reference_mut("area").unwrap();
    assert_eq!(reference.compression_level(), CompressionLevel::Level9);
    assert_eq!(reference.read_reference_vec::<f64>().unwrap(), areas);
}

fn write_bare_container(path: &std::path::Path, version: Option<&str>) {
    let store = StoreFile::open(path, OpenMode::Truncate).unwrap();
    if let Some(version) = version {
        let mut data = version.as_bytes().to_vec();
        data.push(0);
        store
            .write_attribute("/", "OMX_VERSION", StoreType::fixed_string(data.len() as u32), data)
            .unwrap();
    }
    store
        .write_attribute("/", "OMX_ZONES", StoreType::integer(8, false), 3u64.to_le_bytes().to_vec())
        .unwrap();
    store.create_group("/matrices", true).unwrap();
    store.create_group("/zonalReferences", true).unwrap();
    store.close().unwrap();
}

#[test]
fn missing_or_wrong_version_is_rejected() {
    let (_dir, path) = scratch("version.omx");

    for version in [None, Some("0.2"), Some("")] {
        write_bare_container(&path, version);
        let mut file = OmxFile::new(&path);
        let err = file.open_read_only().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format, "version {version:?}");
        assert!(!file.is_open());
        assert_eq!(file.matrix_count().unwrap_err().kind(), ErrorKind::State);
    }

    write_bare_container(&path, Some("0.3"));
    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.zones().unwrap(), 3);
}

#[test]
fn numeric_version_attribute_is_rejected() {
    let (_dir, path) = scratch("numeric_version.omx");
    write_bare_container(&path, None);
    let store = StoreFile::open(&path, OpenMode::ReadWrite).unwrap();
    store
        .write_attribute("/", "OMX_VERSION", StoreType::float(8), 0.3f64.to_le_bytes().to_vec())
        .unwrap();
    store.close().unwrap();

    let mut file = OmxFile::new(&path);
    let err = file.open_read_only().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!file.is_open());
}

#[test]
fn missing_zone_attribute_is_a_format_error() {
    let (_dir, path) = scratch("zones.omx");
    let store = StoreFile::open(&path, OpenMode::Truncate).unwrap();
    store
        .write_attribute("/", "OMX_VERSION", StoreType::fixed_string(4), b"0.3\0".to_vec())
        .unwrap();
    store.close().unwrap();

    let err = OmxFile::new(&path).open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn zero_zone_container() {
    let (_dir, path) = scratch("empty.omx");
    let mut file = OmxFile::new(&path);
    file.open_with_truncate(0).unwrap();

    let matrix = file.add_matrix("m", LogicalType::Double).unwrap();
    assert_eq!(matrix.zones(), 0);
    assert!(matrix.create_row_buffer().unwrap().is_empty());
    for row in [0, 1, u64::MAX] {
        assert_eq!(matrix.write_row(row, &[]).unwrap_err().kind(), ErrorKind::Range);
        assert_eq!(matrix.read_row(row, &mut []).unwrap_err().kind(), ErrorKind::Range);
    }
    file.close().unwrap();

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.matrix_names().unwrap(), vec!["m"]);
}

#[test]
fn read_only_containers_reject_writes() {
    let (_dir, path) = scratch("readonly.omx");
    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(2).unwrap();
        file.add_matrix("m", LogicalType::Int16).unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert!(file.is_read_only().unwrap());

    let err = file.add_matrix("n", LogicalType::Int16).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let err = file.remove_matrix("m").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let err = file.attributes_mut().unwrap().set("x", 1u8).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    let err = file
        .matrix_mut("m")
        .unwrap()
        .write_row_typed(0, &[1i16, 2])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // Reading an unwritten row yields zeros
    assert_eq!(file.matrix_mut("m").unwrap().read_row_vec::<i16>(1).unwrap(), vec![0, 0]);
}

#[test]
fn open_with_create_reuses_existing_file() {
    let (_dir, path) = scratch("create.omx");
    {
        let mut file = OmxFile::new(&path);
        file.open_with_create(8).unwrap();
        file.add_matrix("kept", LogicalType::UInt32).unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_with_create(99).unwrap();
    assert_eq!(file.zones().unwrap(), 8);
    assert_eq!(file.matrix_names().unwrap(), vec!["kept"]);
    assert!(file.file_size().unwrap() > 64);
}

#[test]
fn mixed_matrix_types_are_accepted_on_open() {
    let (_dir, path) = scratch("mixed.omx");
    {
        let mut file = OmxFile::new(&path);
        file.open_with_truncate(2).unwrap();
        file.add_matrix("d", LogicalType::Double).unwrap();
        file.add_matrix("i", LogicalType::Int8).unwrap();
        file.add_zonal_reference("s", LogicalType::String).unwrap();
        file.add_zonal_reference("u", LogicalType::UInt64).unwrap();
    }

    let mut file = OmxFile::new(&path);
    file.open_read_only().unwrap();
    assert_eq!(file.matrix("d").unwrap().data_type(), LogicalType::Double);
    assert_eq!(file.matrix("i").unwrap().data_type(), LogicalType::Int8);
    assert_eq!(file.zonal_reference("s").unwrap().data_type(), LogicalType::String);
    assert_eq!(file.zonal_reference_at(1).unwrap().data_type(), LogicalType::UInt64);
}

#[test]
fn entities_are_released_on_close() {
    let (_dir, path) = scratch("close.omx");
    let mut file = OmxFile::new(&path);
    file.open_with_truncate(2).unwrap();
    file.add_matrix("m", LogicalType::Float).unwrap();
    file.close().unwrap();

    assert_eq!(file.matrix("m").unwrap_err().kind(), ErrorKind::State);
    assert_eq!(file.open_with_truncate(2).unwrap_err().kind(), ErrorKind::State);
}

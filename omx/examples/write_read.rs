//! Write a small skim container, then read it back

use omx::{CompressionLevel, LogicalType, OmxFile, ZonalDataset};
use std::time::Instant;

fn main() -> omx::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let filename = "example_skims.omx";
    let zones = 1_000u64;

    println!("Creating '{filename}' with {zones} zones...");
    let start = Instant::now();
    let mut file = OmxFile::new(filename);
    file.open_with_truncate(zones)?;
    file.attributes_mut()?.set_string("model", "example")?;

    let time = file.add_matrix_compressed("time", LogicalType::Float, CompressionLevel::Level4)?;
    time.attributes_mut().set_string("units", "minutes")?;
    let mut row = vec![0f32; zones as usize];
    for r in 0..zones {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (r as f32 - c as f32).abs() * 0.75;
        }
        time.write_row_typed(r, &row)?;
    }

    let names: Vec<String> = (0..zones).map(|z| format!("zone {}", z + 1)).collect();
    file.add_zonal_reference("names", LogicalType::String)?
        .write_string_reference(&names)?;
    file.close()?;
    println!("Written in {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);

    println!("\nReopening read-only...");
    let mut file = OmxFile::new(filename);
    file.open_read_only()?;
    println!("   Version: {}", file.version()?);
    println!("   Zones: {}", file.zones()?);
    println!("   File size: {} bytes", file.file_size()?);
    println!("   Matrices: {:?}", file.matrix_names()?);
    println!("   Zonal references: {:?}", file.zonal_reference_names()?);

    let time = file.matrix_mut("time")?;
    println!(
        "\nMatrix '{}': {} ({}), units {}",
        time.name(),
        time.data_type(),
        time.compression_level(),
        time.attributes().get_as_string("units")?
    );
    let start = Instant::now();
    let row: Vec<f32> = time.read_row_vec(10)?;
    println!(
        "   Row 10 read in {:.3}ms, first cells {:?}",
        start.elapsed().as_secs_f64() * 1000.0,
        &row[..5]
    );

    let labels = file.zonal_reference("names")?.read_string_reference()?;
    println!("   First labels: {:?}", &labels[..3]);

    file.close()?;
    std::fs::remove_file(filename).ok();
    Ok(())
}

use std::path::PathBuf;

use scan_parser::{
    decoder::decode_scan,
    reader::{source_provider, DEFAULT_CHUNK_CAPACITY},
    ReaderError,
};

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/site.e57"));

    let provider = source_provider(&path).unwrap();
    let mut source = provider.open_source().unwrap();
    println!("Number of scans: {}", source.scan_count());

    for index in 0..source.scan_count() {
        let scan = source.scan_metadata(index).unwrap();
        let (rows, columns) = scan.grid_shape();
        println!(
            "Scan[{index}] {:?}: {} points, {rows} x {columns}",
            scan.name, scan.point_count
        );

        let fields: Vec<_> = scan.fields.keys().copied().collect();
        let mut first = None;
        let summary = decode_scan::<ReaderError, _>(
            source.as_mut(),
            &scan,
            &fields,
            DEFAULT_CHUNK_CAPACITY,
            1,
            |point| {
                if first.is_none() {
                    first = Some(point);
                }
                Ok(())
            },
        )
        .unwrap();

        println!("  valid points: {}", summary.emitted);
        if let Some(point) = first {
            println!("  first point: {:?}", point);
        }
    }
}

use std::env;
use std::path::PathBuf;
use std::process;

use shpcodec::shapefile::{self, ReaderOptions};

fn main() {
    let mut args = env::args();

    if args.len() != 2 {
        eprintln!("Usage: {} <SHP_PATH>", args.next().unwrap_or_default());
        process::exit(1);
    }

    args.next();
    let path = PathBuf::from(args.next().unwrap_or_default());

    let options = ReaderOptions::default().with_validation(true);
    let reader = match shapefile::open(&path, options) {
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
        Ok(reader) => reader,
    };

    if let Some(projection) = reader.projection() {
        println!("Projection: {}", projection.trim());
    }

    let mut n_records: usize = 0;
    for feature_result in reader {
        match feature_result {
            Err(err) => {
                eprintln!("Error during read: {}", err);
                process::exit(1);
            }
            Ok(feature) => {
                n_records += 1;
                match feature.geometry {
                    Some(ref geometry) => print!("{}", geometry),
                    None => print!("NULL"),
                }
                for (name, value) in feature.attributes.0.iter() {
                    print!("; {}: {}", name, value);
                }
                println!();
            }
        }
    }

    println!("Read {} records", n_records);
}

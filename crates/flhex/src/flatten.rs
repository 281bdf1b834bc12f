use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use flhex_core::{encode, encoded_len, load, FlattenOptions};
use log::{info, LevelFilter};

use crate::reporter::ProgressBarReporter;

pub fn flatten_file<P1: AsRef<Path>, P2: AsRef<Path>>(
    input_path: &P1,
    output_path: &P2,
    options: &FlattenOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let input = File::open(input_path)
        .map_err(|err| format!("{} ({})", err, input_path.display()))?;
    let image = load(BufReader::new(input), options.padding)?;

    let width = match options.record_width {
        0 => image.record_width(),
        width => width,
    };
    info!(
        "Flattening {:#x} bytes into {} byte records",
        image.size(),
        width
    );

    // The output is only touched once the whole input decoded
    let output = File::create(output_path)
        .map_err(|err| format!("{} ({})", err, output_path.display()))?;
    let writer = BufWriter::new(output);

    let should_print_progress = log::max_level() >= LevelFilter::Info;

    let result = if should_print_progress {
        let len = encoded_len(&image, width);
        info!("Writing {}", output_path.display());
        let mut reporter = ProgressBarReporter::new(len, writer);
        let result = encode(&image, width, &mut reporter);
        reporter.finish();
        println!();
        result
    } else {
        encode(&image, width, writer)
    };

    if let Err(err) = result {
        fs::remove_file(output_path)?;
        return Err(Box::new(err));
    }

    Ok(())
}

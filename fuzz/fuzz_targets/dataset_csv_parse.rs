//! Fuzz target for observation dataset parsing.
//!
//! Feeds arbitrary bytes to the dataset reader, with and without the
//! `image_url` requirement, checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wildlabel::dataset::{from_dataset_csv_slice, AggregateOptions};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_dataset_csv_slice(data, &AggregateOptions::default());
    let _ = from_dataset_csv_slice(
        data,
        &AggregateOptions {
            require_image_url: true,
            ..Default::default()
        },
    );
});

#![no_main]

use libfuzzer_sys::fuzz_target;

const SUFFIX: &str = ".obj";
include!("common.rs");

fuzz_target!(|data: &[u8]| exercise(data));

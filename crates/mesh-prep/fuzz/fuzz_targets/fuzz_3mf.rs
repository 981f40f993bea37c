#![no_main]

use libfuzzer_sys::fuzz_target;

const SUFFIX: &str = ".3mf";
include!("common.rs");

fuzz_target!(|data: &[u8]| exercise(data));

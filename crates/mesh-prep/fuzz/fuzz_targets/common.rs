// Shared body of the loader targets; `include!`d with `SUFFIX` defined.

use std::io::Write;

use mesh_prep::{AnalysisConfig, Preprocessor, load_mesh};

/// Loading arbitrary bytes may fail but never panic, and anything that
/// loads must survive preprocessing.
fn exercise(data: &[u8]) {
    let Ok(mut file) = tempfile::NamedTempFile::with_suffix(SUFFIX) else {
        return;
    };
    if file.write_all(data).and_then(|()| file.flush()).is_err() {
        return;
    }
    if let Ok(mesh) = load_mesh(file.path()) {
        let _ = Preprocessor::new(AnalysisConfig::fast().with_seed(0)).run_mesh(&mesh);
    }
}

use std::path::{Path, PathBuf};

pub const SAMPLE_FIXTURE: &str = "tests/fixtures/sample.fb2";

pub fn core_fixtures() -> Vec<&'static str> {
    let mut out = Vec::with_capacity(1);
    if Path::new(SAMPLE_FIXTURE).exists() {
        out.push(SAMPLE_FIXTURE);
    }
    out
}

/// Extra `.fb2` books dropped under `tests/fixtures/corpus`, if any.
pub fn discover_optional_corpus() -> Vec<PathBuf> {
    let mut out = Vec::new();
    for root in ["tests/fixtures/corpus", "tests/datasets/fb2"] {
        let Ok(entries) = std::fs::read_dir(Path::new(root)) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("fb2"))
            {
                out.push(path);
            }
        }
    }
    out.sort();
    out.dedup();
    out
}

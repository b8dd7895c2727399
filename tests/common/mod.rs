#![allow(dead_code)] // Not every test module uses every helper

use std::fs;
use std::path::{Path, PathBuf};

use ffladder::engine::{
    Backend, BackendDescriptor, ConcurrencyClass, EncodeJob, HwAccelRequest, OutputManager,
    QualitySelection, RunContext,
};

/// Write an executable /bin/sh stub that stands in for ffmpeg. The executor
/// always passes the staging path as the last argument, which the stub picks
/// up with a plain `for` loop.
#[cfg(unix)]
pub fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    let script = format!("#!/bin/sh\nfor a; do out=\"$a\"; done\n{body}\n");
    fs::write(&path, script).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Stub that writes a small fake rendition and succeeds.
#[cfg(unix)]
pub fn ok_stub(dir: &Path) -> PathBuf {
    write_stub(dir, "encoder-ok.sh", "printf 'fake rendition' > \"$out\"")
}

pub fn software_backend() -> BackendDescriptor {
    BackendDescriptor {
        backend: Backend::Software,
        encoder: Backend::Software.encoder_name(),
        concurrency: ConcurrencyClass::CpuBound,
    }
}

/// Resolve a descriptor the way the binary does, from a synthetic snapshot.
pub fn resolved_software_backend() -> BackendDescriptor {
    ffladder::engine::hardware::resolve(
        HwAccelRequest::Backend(Backend::Software),
        &Default::default(),
    )
    .unwrap()
}

/// Build one job per selected tier against a fake input file.
pub fn make_jobs(input: &Path, tiers: Option<Vec<&str>>) -> Vec<EncodeJob> {
    let selection = QualitySelection {
        tiers: tiers.map(|t| t.iter().map(|s| s.to_string()).collect()),
        best_quality: false,
    };
    let backend = software_backend();
    ffladder::engine::plan(&selection)
        .unwrap()
        .into_iter()
        .map(|spec| EncodeJob::new(spec, backend, input.to_path_buf()))
        .collect()
}

/// Run context pointing at a stub encoder.
pub fn stub_ctx(program: &Path, dest: &Path) -> RunContext {
    let outputs = OutputManager::new(dest).unwrap();
    let mut ctx = RunContext::new(outputs);
    ctx.encoder_program = program.to_string_lossy().to_string();
    ctx
}

/// Create a small fake input file and return its path.
pub fn fake_input(dir: &Path) -> PathBuf {
    let input = dir.join("clip.mkv");
    fs::write(&input, b"not really a video").unwrap();
    input
}

/// All `.part` staging files left in a directory.
pub fn part_files(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.ends_with(".part"))
                .unwrap_or(false)
        })
        .collect()
}

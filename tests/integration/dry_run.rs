// Dry runs plan and print encoder commands without touching any output

use std::fs;

use clap::Parser;
use tempfile::TempDir;

use crate::common;
use ffladder::app;
use ffladder::cli::Cli;

#[test]
fn test_dry_run_writes_nothing_and_exits_zero() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    let dest = tmp.path().join("out");

    let cli = Cli::parse_from([
        "ffladder",
        input.to_str().unwrap(),
        dest.to_str().unwrap(),
        "--hw-accel",
        "none",
        "--parallel",
        "--dry-run",
    ]);
    let code = app::run(cli).unwrap();
    assert_eq!(code, 0);

    let entries: Vec<_> = fs::read_dir(&dest).unwrap().collect();
    assert!(
        entries.is_empty(),
        "dry run must not write into {}",
        dest.display()
    );
}

#[test]
fn test_dry_run_leaves_existing_renditions_untouched() {
    let tmp = TempDir::new().unwrap();
    let input = common::fake_input(tmp.path());
    let dest = tmp.path().join("out");
    fs::create_dir_all(&dest).unwrap();
    let existing = dest.join("clip-high.mp4");
    fs::write(&existing, b"previous rendition").unwrap();

    let cli = Cli::parse_from([
        "ffladder",
        input.to_str().unwrap(),
        dest.to_str().unwrap(),
        "--hw-accel",
        "none",
        "--dry-run",
    ]);
    let code = app::run(cli).unwrap();
    assert_eq!(code, 0);

    assert_eq!(fs::read(&existing).unwrap(), b"previous rendition");
    assert_eq!(fs::read_dir(&dest).unwrap().count(), 1);
}

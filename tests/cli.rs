/// Command-line integration tests
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// One plus-strand intron: donor GT at 5, acceptor AG at 14, cut [5, 16)
const SCAFFOLD: &str = "CCCCCGTCCCCCCCAGCCCCC";

const SMALL_GEOMETRY: &[&str] = &[
    "--donor-left",
    "2",
    "--donor-right",
    "2",
    "--acceptor-left",
    "2",
    "--acceptor-right",
    "2",
    "--min-intron-length",
    "6",
    "--max-intron-length",
    "30",
];

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn create_test_assembly(dir: &TempDir) -> PathBuf {
    write_file(dir, "assembly.fa", &format!(">chr1\n{}\n>chr2\nAAAAAAAAAA\n", SCAFFOLD))
}

fn intron_cutter() -> Command {
    Command::cargo_bin("intron-cutter").unwrap()
}

#[test]
fn test_run_writes_cut_table() {
    let dir = TempDir::new().unwrap();
    let fasta = create_test_assembly(&dir);
    let lengths = write_file(&dir, "lengths.txt", "11\n11\n12\n");
    let cuts = dir.path().join("cuts.csv");
    let introns = dir.path().join("introns.csv");

    intron_cutter()
        .arg("run")
        .arg("-f")
        .arg(&fasta)
        .arg("-l")
        .arg(&lengths)
        .arg("-o")
        .arg(&cuts)
        .arg("--introns-output")
        .arg(&introns)
        .args(["--strand", "both", "--donor-model", "none"])
        .args(SMALL_GEOMETRY)
        .arg("--threads")
        .arg("2")
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 1 cuts"));

    assert_eq!(fs::read_to_string(&cuts).unwrap(), "scaffold;start;end\nchr1;5;16\n");
    assert_eq!(
        fs::read_to_string(&introns).unwrap(),
        "scaffold;start;end\nchr1;5;16\n"
    );
}

#[test]
fn test_run_reports_failed_scaffolds() {
    let dir = TempDir::new().unwrap();
    let fasta = create_test_assembly(&dir);
    let lengths = write_file(&dir, "lengths.txt", "11\n");
    let cuts = dir.path().join("cuts.csv");

    intron_cutter()
        .arg("run")
        .arg("-f")
        .arg(&fasta)
        .arg("-l")
        .arg(&lengths)
        .arg("-o")
        .arg(&cuts)
        .args(["--donor-model", "donor.model", "--classifier", "/nonexistent/classifier"])
        .args(SMALL_GEOMETRY)
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 2 scaffolds failed"));

    // the scaffold without candidates still completes and the table keeps its header
    assert_eq!(fs::read_to_string(&cuts).unwrap(), "scaffold;start;end\n");
}

#[test]
fn test_scan_writes_site_datasets() {
    let dir = TempDir::new().unwrap();
    let fasta = create_test_assembly(&dir);
    let donors = dir.path().join("donors.csv");
    let acceptors = dir.path().join("acceptors.csv");

    intron_cutter()
        .arg("scan")
        .arg("-f")
        .arg(&fasta)
        .arg("--donor-output")
        .arg(&donors)
        .arg("--acceptor-output")
        .arg(&acceptors)
        .args(SMALL_GEOMETRY)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&donors).unwrap(),
        "scaffold;position;sequence\nchr1;5;CCGTCC\n"
    );
    assert_eq!(
        fs::read_to_string(&acceptors).unwrap(),
        "scaffold;position;sequence\nchr1;14;CCAGCC\n"
    );
}

#[test]
fn test_scan_orphan_filter_uses_donor_results() {
    let dir = TempDir::new().unwrap();
    let fasta = create_test_assembly(&dir);
    let positives = write_file(&dir, "donor_results.csv", "scaffold;position\n");
    let donors = dir.path().join("donors.csv");
    let acceptors = dir.path().join("acceptors.csv");

    intron_cutter()
        .arg("scan")
        .arg("-f")
        .arg(&fasta)
        .arg("--donor-output")
        .arg(&donors)
        .arg("--acceptor-output")
        .arg(&acceptors)
        .arg("--donor-results")
        .arg(&positives)
        .args(SMALL_GEOMETRY)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&acceptors).unwrap(),
        "scaffold;position;sequence\n"
    );
}

#[test]
fn test_classify_reports_metrics() {
    let dir = TempDir::new().unwrap();
    let dataset = write_file(
        &dir,
        "donors.csv",
        "scaffold;position;sequence;label\nchr1;5;CCGTCC;1\nchr1;9;AAGTAA;-1\n",
    );
    let results = dir.path().join("results.csv");

    intron_cutter()
        .arg("classify")
        .arg("-i")
        .arg(&dataset)
        .arg("-o")
        .arg(&results)
        .args(["--role", "donor", "--model", "random", "--imbalance-ratio", "0.5"])
        .assert()
        .success()
        .stderr(predicate::str::contains("TP: 1, FP: 1, TN: 0, FN: 0"))
        .stderr(predicate::str::contains("Adjusted precision: 0.3333"));

    assert_eq!(
        fs::read_to_string(&results).unwrap(),
        "scaffold;position\nchr1;5\nchr1;9\n"
    );
}

#[test]
fn test_pair_extract_and_prune() {
    let dir = TempDir::new().unwrap();
    let fasta = create_test_assembly(&dir);
    let donors = write_file(&dir, "donors.csv", "scaffold;position\nchr1;5\n");
    let acceptors = write_file(&dir, "acceptors.csv", "scaffold;position\nchr1;14\n");
    let introns = dir.path().join("introns.csv");

    intron_cutter()
        .arg("pair")
        .arg("--donors")
        .arg(&donors)
        .arg("--acceptors")
        .arg(&acceptors)
        .arg("-o")
        .arg(&introns)
        .args(SMALL_GEOMETRY)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&introns).unwrap(),
        "scaffold;start;end\nchr1;5;16\n"
    );

    let sequences = dir.path().join("sequences.csv");
    intron_cutter()
        .arg("extract")
        .arg("-f")
        .arg(&fasta)
        .arg("-i")
        .arg(&introns)
        .arg("-o")
        .arg(&sequences)
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&sequences).unwrap(),
        "scaffold;start;end;sequence\nchr1;5;16;GTCCCCCCCAG\n"
    );

    let training = dir.path().join("training.csv");
    intron_cutter()
        .arg("extract")
        .arg("-f")
        .arg(&fasta)
        .arg("-i")
        .arg(&introns)
        .arg("-o")
        .arg(&training)
        .args(["--training-label", "-1"])
        .assert()
        .success();
    assert_eq!(
        fs::read_to_string(&training).unwrap(),
        "sequence;label\nGTCCCCCCCAG;-1\n"
    );
}

#[test]
fn test_prune_prefers_more_probable_length() {
    let dir = TempDir::new().unwrap();
    let introns = write_file(
        &dir,
        "introns.csv",
        "scaffold;start;end\nchr1;100;180\nchr1;150;220\n",
    );
    let mut lengths = String::new();
    for (length, count) in [(70, 19), (80, 18), (50, 3)] {
        for _ in 0..count {
            lengths.push_str(&format!("{}\n", length));
        }
    }
    let lengths = write_file(&dir, "lengths.txt", &lengths);
    let cuts = dir.path().join("cuts.csv");

    intron_cutter()
        .arg("prune")
        .arg("-i")
        .arg(&introns)
        .arg("-l")
        .arg(&lengths)
        .arg("-o")
        .arg(&cuts)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&cuts).unwrap(),
        "scaffold;start;end\nchr1;150;220\n"
    );
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let lengths = write_file(&dir, "lengths.txt", "11\n");

    intron_cutter()
        .arg("run")
        .arg("-f")
        .arg(dir.path().join("missing.fa"))
        .arg("-l")
        .arg(&lengths)
        .arg("-o")
        .arg(dir.path().join("cuts.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

use std::path::Path;

use ptti::model::Trajectory;
use ptti::output::{read_tsv, write_tsv};
use ptti::stats::{CompareOptions, ErrorReport};
use ptti::system::{compare_files, ComparisonInputs};
use ptti::PttiError;
use pretty_assertions::assert_eq;

fn trajectory(time: &[f64], rows: &[&[f64]]) -> Trajectory {
    Trajectory::new(time.to_vec(), rows.iter().map(|r| r.to_vec()).collect())
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_identical_runs_report_zero_error() {
    let dir = tempfile::tempdir().unwrap();
    let run = trajectory(&[0.0, 1.0, 2.0], &[&[990.0, 10.0, 0.0], &[980.0, 0.0, 20.0], &[0.0, 30.0, 970.0]]);
    let input = dir.path().join("run.tsv");
    let reference = dir.path().join("reference.tsv");
    let std = dir.path().join("reference-std.tsv");
    write_tsv(&input, &run).unwrap();
    write_tsv(&reference, &run).unwrap();
    write_tsv(&std, &trajectory(&[0.0, 1.0, 2.0], &[&[1.0, 0.0, 1.0][..]; 3])).unwrap();

    let (comparison, written) =
        compare_files(&input, &reference, Some(&std), CompareOptions::default()).unwrap();

    assert_eq!(comparison.columns, 3);
    assert_eq!(written.len(), 4);
    for suffix in ["abserr", "relerr", "stderr"] {
        let series = read_tsv(dir.path().join(format!("run-{}.tsv", suffix))).unwrap();
        assert_eq!(series.time, run.time);
        assert!(series.rows.iter().flatten().all(|v| *v == 0.0));
    }

    let report: ErrorReport = serde_yaml::from_str(
        &std::fs::read_to_string(dir.path().join("run-err.yaml")).unwrap(),
    )
    .unwrap();
    assert_eq!(
        report,
        ErrorReport {
            abserr: vec![0.0; 3],
            relerr: vec![0.0; 3],
            stderr: Some(vec![0.0; 3]),
        }
    );
}

#[test]
fn test_report_without_std_has_no_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.tsv");
    let reference = dir.path().join("b.tsv");
    write_tsv(&input, &trajectory(&[0.0, 2.0], &[&[2.0], &[2.0]])).unwrap();
    write_tsv(&reference, &trajectory(&[0.0, 2.0], &[&[1.0], &[1.0]])).unwrap();

    let (comparison, _) = compare_files(&input, &reference, None, CompareOptions::default()).unwrap();
    assert_eq!(comparison.report.abserr, vec![1.0]);
    assert_eq!(comparison.report.relerr, vec![1.0]);

    let report = std::fs::read_to_string(dir.path().join("a-err.yaml")).unwrap();
    assert!(!report.contains("stderr"));
    assert_eq!(
        files_in(dir.path()),
        vec!["a-abserr.tsv", "a-err.yaml", "a-relerr.tsv", "a.tsv", "b.tsv"]
    );
}

#[test]
fn test_mismatched_time_axes_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.tsv");
    let reference = dir.path().join("b.tsv");
    write_tsv(&input, &trajectory(&[0.0, 1.0, 2.0], &[&[1.0], &[1.0], &[1.0]])).unwrap();
    write_tsv(&reference, &trajectory(&[0.0, 1.5, 2.0], &[&[1.0], &[1.0], &[1.0]])).unwrap();

    let error = compare_files(&input, &reference, None, CompareOptions::default()).unwrap_err();
    assert!(matches!(error, PttiError::Stats(_)));
    assert_eq!(error.exit_code(), 1);
    assert_eq!(files_in(dir.path()), vec!["a.tsv", "b.tsv"]);
}

#[test]
fn test_too_many_columns_write_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.tsv");
    let reference = dir.path().join("b.tsv");
    write_tsv(&input, &trajectory(&[0.0, 1.0], &[&[1.0, 2.0], &[1.0, 2.0]])).unwrap();
    write_tsv(&reference, &trajectory(&[0.0, 1.0], &[&[1.0], &[1.0]])).unwrap();

    let options = CompareOptions {
        columns: Some(2),
        skip: 0,
    };
    assert!(compare_files(&input, &reference, None, options).is_err());
    assert_eq!(files_in(dir.path()), vec!["a.tsv", "b.tsv"]);
}

#[test]
fn test_default_columns_known_before_comparing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("a.tsv");
    let reference = dir.path().join("b.tsv");
    write_tsv(&input, &trajectory(&[0.0, 1.0], &[&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]])).unwrap();
    write_tsv(&reference, &trajectory(&[0.0, 2.0], &[&[1.0, 2.0], &[1.0, 2.0]])).unwrap();

    let inputs = ComparisonInputs::load(&input, &reference, None).unwrap();
    assert_eq!(inputs.default_columns(), 2);

    // the time axes differ, so the comparison itself still fails
    assert!(inputs.compare(&input, CompareOptions::default()).is_err());
    assert_eq!(files_in(dir.path()), vec!["a.tsv", "b.tsv"]);
}

use std::fs;
use std::process::Command;

use tempfile::tempdir;

const TRAINING: &str = "name,date,ratio,floor,size\n\
a,2024-03-01,0.90,1.0,300\n\
b,2024-03-01,0.92,1.5,250\n\
c,2024-03-02,0.95,2.5,728\n\
d,2024-03-02,0.93,2.0,468\n\
e,2024-03-03,0.91,1.2,160\n\
f,2024-03-03,0.94,2.2,600\n";

const EVALUATION: &str = "name,size,floor\nnew-a,300,1.1\nnew-b,728,2.4\n";

#[test]
fn estimate_writes_interval_predictions() {
    let tmp = tempdir().expect("temporary directory");
    let training_path = tmp.path().join("train.csv");
    let evaluation_path = tmp.path().join("eval.csv");
    let config_path = tmp.path().join("run.toml");
    let output_path = tmp.path().join("intervals.csv");
    fs::write(&training_path, TRAINING).expect("write training data");
    fs::write(&evaluation_path, EVALUATION).expect("write evaluation data");
    fs::write(
        &config_path,
        "[bootstrap]\nconfidence_level = 0.9\n\n[data]\nid_column = \"name\"\nexclude_columns = [\"date\"]\n\n[model]\nfamily = \"ridge\"\nalpha = 0.5\n",
    )
    .expect("write config");

    let exe = env!("CARGO_BIN_EXE_bidfloor");
    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "estimate",
            training_path.to_str().expect("path str"),
            evaluation_path.to_str().expect("path str"),
            "--config",
            config_path.to_str().expect("path str"),
            "--output",
            output_path.to_str().expect("path str"),
            "--rounds",
            "25",
            "--seed",
            "7",
            "--threads",
            "2",
            "--no-progress",
        ])
        .status()
        .expect("run bidfloor cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    let written = fs::read_to_string(&output_path).expect("read predictions");
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("name,mean,lower,upper"));

    let rows: Vec<Vec<String>> = lines
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "new-a");
    assert_eq!(rows[1][0], "new-b");
    for row in &rows {
        let values: Vec<f64> = row[1..].iter().map(|v| v.parse().expect("float")).collect();
        let (mean, lower, upper) = (values[0], values[1], values[2]);
        assert!(lower <= upper, "{row:?}");
        assert!(mean.is_finite());
    }
}

#[test]
fn failed_estimate_exits_nonzero_without_output() {
    let tmp = tempdir().expect("temporary directory");
    let training_path = tmp.path().join("train.csv");
    let evaluation_path = tmp.path().join("eval.csv");
    fs::write(&training_path, TRAINING).expect("write training data");
    // `size` is missing from the evaluation table.
    fs::write(&evaluation_path, "name,floor\nx,1.0\n").expect("write evaluation data");

    let exe = env!("CARGO_BIN_EXE_bidfloor");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "estimate",
            training_path.to_str().expect("path str"),
            evaluation_path.to_str().expect("path str"),
            "--no-progress",
        ])
        .output()
        .expect("run bidfloor cli");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
    assert!(!tmp.path().join("predictions.csv").exists());
}

#[test]
fn zero_rounds_is_rejected_by_the_cli() {
    let tmp = tempdir().expect("temporary directory");
    let training_path = tmp.path().join("train.csv");
    fs::write(&training_path, "ratio,floor\n0.9,1.0\n0.95,2.0\n").expect("write training data");
    let evaluation_path = tmp.path().join("eval.csv");
    fs::write(&evaluation_path, "floor\n1.5\n").expect("write evaluation data");

    let status = Command::new(env!("CARGO_BIN_EXE_bidfloor"))
        .current_dir(tmp.path())
        .args([
            "estimate",
            training_path.to_str().expect("path str"),
            evaluation_path.to_str().expect("path str"),
            "--rounds",
            "0",
            "--no-progress",
        ])
        .status()
        .expect("run bidfloor cli");

    assert_eq!(status.code(), Some(1));
    assert!(!tmp.path().join("predictions.csv").exists());
}

#[test]
fn config_command_prints_a_loadable_default() {
    let tmp = tempdir().expect("temporary directory");
    let output = Command::new(env!("CARGO_BIN_EXE_bidfloor"))
        .args(["config"])
        .output()
        .expect("run bidfloor cli");
    assert!(output.status.success());

    let printed = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(printed.contains("[bootstrap]"));
    assert!(printed.contains("family = \"ridge\""));

    let path = tmp.path().join("default.toml");
    fs::write(&path, &printed).expect("write config");
    let loaded = bidfloor::config::RunConfig::load(&path).expect("load printed config");
    assert_eq!(loaded, bidfloor::config::RunConfig::default());
}

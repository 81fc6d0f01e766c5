use std::path::Path;
use std::process::Command;

fn write_tone(path: &Path, freq: f64, sample_rate: u32, secs: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    let n = (sample_rate as f64 * secs) as usize;
    for i in 0..n {
        let phase = 2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64;
        writer
            .write_sample((0.5 * phase.sin() * i16::MAX as f64) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

fn audiolens(cwd: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_audiolens"));
    cmd.current_dir(cwd).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn analyzes_a_wav_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("tone.wav");
    let output = dir.path().join("out").join("tone.json");
    write_tone(&input, 440.0, 22050, 1.0);

    let status = audiolens(dir.path())
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--no-progress")
        .status()
        .expect("run audiolens");
    assert!(status.success());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).expect("read output"))
            .expect("parse output");
    assert_eq!(json["sampleRate"], 22050);
    assert_eq!(json["hopLength"], 512);
    assert_eq!(json["frames"].as_array().map(Vec::len), Some(44));
    assert_eq!(json["bandNames"].as_array().map(Vec::len), Some(7));
    assert_eq!(json["chromaNames"][9], "A");
    assert!(json["tempo"].as_f64().is_some_and(|t| t > 0.0));

    let frame = &json["frames"][20];
    for key in [
        "time", "rms", "centroid", "centroid_hz", "contrast", "onset", "harmonic", "percussive",
    ] {
        assert!(frame[key].is_number(), "missing {}", key);
    }
    assert_eq!(frame["bands"].as_array().map(Vec::len), Some(7));
    assert_eq!(frame["chroma"].as_array().map(Vec::len), Some(12));
}

#[test]
fn default_output_goes_to_data_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_tone(&dir.path().join("beep.wav"), 880.0, 22050, 0.5);

    let status = audiolens(dir.path())
        .args(["beep.wav", "--hop", "1024", "--pretty", "--no-progress"])
        .status()
        .expect("run audiolens");
    assert!(status.success());

    let written = std::fs::read_to_string(dir.path().join("data").join("beep.json"))
        .expect("default output");
    assert!(written.contains('\n'));
    let json: serde_json::Value = serde_json::from_str(&written).expect("parse output");
    assert_eq!(json["hopLength"], 1024);
    assert_eq!(json["frames"].as_array().map(Vec::len), Some(11025 / 1024 + 1));
}

#[test]
fn missing_input_fails_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("nested").join("out.json");

    let result = audiolens(dir.path())
        .arg("no-such-file.mp3")
        .arg("-o")
        .arg(&output)
        .output()
        .expect("run audiolens");

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("input file not found: no-such-file.mp3"), "{}", stderr);
    assert!(!output.exists());
    assert!(!dir.path().join("nested").exists());
    assert!(!dir.path().join("data").exists());
}

#[test]
fn zero_hop_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_tone(&dir.path().join("tone.wav"), 440.0, 22050, 0.2);

    let result = audiolens(dir.path())
        .args(["tone.wav", "--hop", "0", "--no-progress"])
        .output()
        .expect("run audiolens");
    assert_eq!(result.status.code(), Some(1));
    assert!(!dir.path().join("data").exists());
}

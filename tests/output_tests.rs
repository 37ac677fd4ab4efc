use std::time::Duration;

use reachscan::output::{write_results, OutputFormat};
use reachscan::types::{ProbeDetails, ProbeMode, ProbeOutcome, Target};

fn outcomes() -> Vec<ProbeOutcome> {
    vec![
        ProbeOutcome::reachable(
            &Target::new("a.test", 443),
            ProbeMode::Tls,
            ProbeDetails {
                status: None,
                issuer: Some("Example CA".into()),
                expires: Some("2030-01-01T00:00:00Z".into()),
            },
            Duration::from_millis(40),
        ),
        ProbeOutcome::failed(
            &Target::new("b.test", 443),
            ProbeMode::Tls,
            "connection refused",
            Duration::ZERO,
        ),
    ]
}

#[test]
fn json_file_holds_an_array_of_records() {
    let path = std::env::temp_dir().join(format!("reachscan-{}-out.json", std::process::id()));
    let format = write_results(&path, &outcomes()).unwrap();
    assert_eq!(format, OutputFormat::Json);

    let body = std::fs::read_to_string(&path).unwrap();
    let read: Vec<ProbeOutcome> = serde_json::from_str(&body).unwrap();
    assert_eq!(read.len(), 2);
    assert!(read[0].reachable && !read[1].reachable);
    assert_eq!(read[0].issuer.as_deref(), Some("Example CA"));
    assert_eq!(read[1].error.as_deref(), Some("connection refused"));
    std::fs::remove_file(&path).ok();
}

#[test]
fn text_file_has_one_line_per_outcome() {
    let path = std::env::temp_dir().join(format!("reachscan-{}-out.txt", std::process::id()));
    let format = write_results(&path, &outcomes()).unwrap();
    assert_eq!(format, OutputFormat::Text);

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["✓\ttls\ta.test:443", "✗\ttls\tb.test:443"]);
    std::fs::remove_file(&path).ok();
}

#[test]
fn unwritable_path_reports_error() {
    let path = std::env::temp_dir().join("reachscan-no-such-dir").join("out.json");
    assert!(write_results(&path, &outcomes()).is_err());
}

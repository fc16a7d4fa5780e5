use clap::Parser as _;
use netcoord_analyser::bucket;
use netcoord_analyser::cli::NetcoordCli;
use netcoord_analyser::compare::Comparator;
use netcoord_analyser::derived::{DerivedLogs, LineStyle};
use netcoord_analyser::extract::{ExtractionReport, Extractor, RecordPattern};
use netcoord_analyser::stats::{self, AggregateStatistics, StatsError};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

fn test_data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(name)
}

fn run(args: &[&str]) -> anyhow::Result<()> {
    let cli = NetcoordCli::try_parse_from(
        std::iter::once("netcoord-analyser").chain(args.iter().copied()),
    )?;
    netcoord_analyser::execute_command(cli)
}

#[test]
fn ping_log_line_accounting() -> anyhow::Result<()> {
    let extraction = Extractor::new(RecordPattern::Rtt).extract_file(test_data("ping.log"))?;

    assert_eq!(
        extraction.report,
        ExtractionReport {
            valid: 4,
            invalid: 1,
            headers: 2,
            blank: 1,
        }
    );
    assert_eq!(extraction.report.total(), 8);
    assert_eq!(extraction.values(), vec![10.0, 4.0, 20.0, 0.0]);
    Ok(())
}

#[test]
fn extract_compare_and_render() -> anyhow::Result<()> {
    let extractor = Extractor::new(RecordPattern::Rtt);
    let ping = extractor.extract_file(test_data("ping.log"))?;
    let serf = extractor.extract_file(test_data("serf.log"))?;

    let comparison = Comparator::default().compare(&ping.records, &serf.records);
    assert_eq!(comparison.signed(), vec![2.5, -1.0, 1.0, 1.0]);
    assert_eq!(comparison.unmatched_estimates, 1);
    assert_eq!(comparison.unmatched_ground_truth, 0);
    // no relative value against a zero ground truth
    assert_eq!(comparison.relative(), vec![0.25, 0.25, 0.05]);

    let summary = comparison.summary(&[50.0, 90.0])?;
    assert_eq!(summary.mae, 1.375);
    assert!((summary.rmse - 2.3125f64.sqrt()).abs() < 1e-12);
    assert_eq!(summary.signed.mean, 0.875);
    assert_eq!(summary.signed.signs.positive_pct, 75.0);

    let logs = DerivedLogs::render(&comparison, LineStyle::Compact);
    let signed = logs.signed.lines().collect::<Vec<_>>();
    assert_eq!(signed[0], "=== Intra-network pings for net_1 ===");
    assert_eq!(
        signed[1],
        "[net_1] clab-nebula-serf1 (10.0.1.10) → [net_1] clab-nebula-serf2 (10.0.1.11): +2.500ms [serf_rtt:12.500ms, ping_rtt:10.000ms]"
    );
    assert_eq!(logs.absolute.lines().count(), 6);
    assert_eq!(logs.relative.lines().count(), 5);
    assert!(logs
        .relative
        .lines()
        .any(|line| line.contains(": 0.250 [serf_rtt:12.500ms, ping_rtt:10.000ms]")));

    // the written lines read back as the same values
    let reread = extractor.extract(logs.signed.lines()).collect::<Vec<_>>();
    let values = reread.iter().filter_map(|r| r.rtt()).collect::<Vec<_>>();
    assert_eq!(values, comparison.signed());
    Ok(())
}

#[test]
fn distribution_properties_of_differences() -> anyhow::Result<()> {
    let extractor = Extractor::new(RecordPattern::Rtt);
    let comparison = Comparator::default().compare(
        &extractor.extract_file(test_data("ping.log"))?.records,
        &extractor.extract_file(test_data("serf.log"))?.records,
    );
    let signed = comparison.signed();

    assert_eq!(stats::percentile(&signed, 50.0)?, stats::median(&signed)?);

    let cdf = stats::empirical_cdf(&signed);
    assert_eq!(cdf.len(), signed.len());
    assert!(cdf.windows(2).all(|w| w[0].0 <= w[1].0 && w[0].1 <= w[1].1));
    assert_eq!(cdf.last().map(|(_, p)| *p), Some(1.0));
    Ok(())
}

#[test]
fn empty_log_has_no_statistics() -> anyhow::Result<()> {
    let extraction = Extractor::new(RecordPattern::Rtt).extract_file(test_data("empty.log"))?;
    assert!(extraction.report.is_empty());
    assert_eq!(extraction.report.total(), 0);

    assert!(matches!(
        AggregateStatistics::compute(&extraction.values(), &[50.0]),
        Err(StatsError::EmptyInput)
    ));
    Ok(())
}

#[test]
fn stats_command_rejects_empty_log() {
    let input = test_data("empty.log");
    let result = run(&["--quiet", "stats", "--input", input.to_str().unwrap()]);

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("No valid records"));
}

#[test]
fn coordinate_magnitudes_and_windows() -> anyhow::Result<()> {
    let extraction =
        Extractor::new(RecordPattern::Coordinate).extract_file(test_data("coordinates.log"))?;
    assert_eq!(extraction.report.valid, 5);
    assert_eq!(extraction.report.invalid, 1);

    let magnitudes = bucket::coordinate_magnitudes(&extraction.records);
    assert_eq!(magnitudes[0].1, 5.0);

    let buckets = bucket::bucket_by_window(magnitudes, chrono::TimeDelta::minutes(10))?;
    let summaries = bucket::summarise(&buckets)?;
    assert_eq!(
        summaries.iter().map(|s| (s.count, s.mean)).collect::<Vec<_>>(),
        vec![(4, 3.75), (1, 5.0)]
    );

    let centroids = bucket::centroid_series(&bucket::coordinates(&extraction.records));
    assert_eq!(centroids[0].centroid, vec![1.5, 2.0]);
    assert_eq!(centroids[1].migration, Some(2.5));
    Ok(())
}

#[test]
fn drift_logs_group_by_timestamp() -> anyhow::Result<()> {
    let nodes =
        Extractor::new(RecordPattern::NodeDrift).extract_file(test_data("node_drift.log"))?;
    let samples = bucket::node_drift(&nodes.records);
    let summaries = bucket::summarise(&bucket::bucket_by_timestamp(samples.vec_distance))?;
    assert_eq!(
        summaries.iter().map(|s| s.mean).collect::<Vec<_>>(),
        vec![4.0, 5.0]
    );

    let centroid = Extractor::new(RecordPattern::CentroidDrift)
        .extract_file(test_data("centroid_drift.log"))?;
    assert_eq!(
        bucket::centroid_drift(&centroid.records)
            .into_iter()
            .map(|(_, v)| v)
            .collect::<Vec<_>>(),
        vec![0.5, 0.75, 1.25]
    );
    Ok(())
}

#[test]
fn diff_command_writes_logs_summary_and_json() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out_dir = dir.path().join("out");
    let json = dir.path().join("diff.json");
    let ping = test_data("ping.log");
    let serf = test_data("serf.log");

    run(&[
        "--quiet",
        "--json",
        json.to_str().unwrap(),
        "diff",
        "--ping",
        ping.to_str().unwrap(),
        "--estimate",
        serf.to_str().unwrap(),
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--percentile",
        "50",
    ])?;

    let mut written = walkdir::WalkDir::new(&out_dir)
        .min_depth(1)
        .into_iter()
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    written.sort();
    assert_eq!(
        written,
        vec![
            "absolute_diff.log",
            "relative_diff.log",
            "signed_diff.log",
            "summary.txt"
        ]
    );

    let summary = std::fs::read_to_string(out_dir.join("summary.txt"))?;
    assert!(summary.contains("MAE"));
    assert!(summary.contains("1.375"));
    assert!(summary.contains(&format!("Lines of {}", ping.display())));
    assert!(summary.contains(&format!("Lines of {}", serf.display())));

    let output: serde_json::Value = serde_json::from_reader(std::fs::File::open(&json)?)?;
    assert_eq!(output["command"], "diff");
    assert_eq!(output["data"]["pairs"], 4);
    assert_eq!(output["data"]["signed"]["percentiles"]["p50"], 1.0);
    assert_eq!(
        output["data"]["lines"]["ping"],
        serde_json::json!({ "valid": 4, "invalid": 1, "headers": 2, "blank": 1 })
    );
    assert_eq!(
        output["data"]["lines"]["estimate"],
        serde_json::json!({ "valid": 5, "invalid": 0, "headers": 3, "blank": 0 })
    );
    Ok(())
}

#[test]
fn sort_command_orders_by_rtt() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("sorted.log");
    let input = test_data("serf.log");

    run(&[
        "--quiet",
        "sort",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--by",
        "rtt",
    ])?;

    let sorted = std::fs::read_to_string(&output)?;
    assert_eq!(
        sorted.lines().collect::<Vec<_>>(),
        vec![
            "[net_1] clab-nebula-serf1 (10.0.1.10) → [net_1] clab-nebula-serf3 (10.0.1.12): 3.000ms",
            "[net_1] clab-nebula-serf1 (10.0.1.10) → [net_1] clab-nebula-serf2 (10.0.1.11): 12.500ms",
            "[net_1] clab-nebula-serf1 (10.0.1.10) → [net_2] clab-nebula-serf7 (10.0.2.10): 21.000ms",
            "[net_2] clab-nebula-serf7 (10.0.2.10) → [net_1] clab-nebula-serf2 (10.0.1.11): 1.000ms",
            "[net_2] clab-nebula-serf8 (10.0.2.11) → [net_1] clab-nebula-serf2 (10.0.1.11): 5.000ms",
        ]
    );
    Ok(())
}

#[test]
fn compare_dims_command_reports_wins() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let ping = test_data("ping.log");
    let serf = test_data("serf.log");
    let diff_dir = dir.path().join("diff");
    run(&[
        "--quiet",
        "diff",
        "--ping",
        ping.to_str().unwrap(),
        "--estimate",
        serf.to_str().unwrap(),
        "--out-dir",
        diff_dir.to_str().unwrap(),
    ])?;

    let signed = diff_dir.join("signed_diff.log");
    let report = dir.path().join("dims.txt");
    run(&[
        "--quiet",
        "compare-dims",
        "--a",
        &format!("5D={}", signed.display()),
        "--b",
        &format!("8D={}", signed.display()),
        "--output",
        report.to_str().unwrap(),
    ])?;

    let rendered = std::fs::read_to_string(&report)?;
    assert!(rendered.starts_with("5D vs 8D\n"));
    assert!(rendered.contains("Tie"));
    Ok(())
}

fn write_signed_diff(dir: &Path) -> anyhow::Result<PathBuf> {
    let ping = test_data("ping.log");
    let serf = test_data("serf.log");
    let diff_dir = dir.join("diff");
    run(&[
        "--quiet",
        "diff",
        "--ping",
        ping.to_str().unwrap(),
        "--estimate",
        serf.to_str().unwrap(),
        "--out-dir",
        diff_dir.to_str().unwrap(),
    ])?;
    Ok(diff_dir.join("signed_diff.log"))
}

fn groups(value: &serde_json::Value) -> Vec<(String, u64)> {
    value
        .as_array()
        .into_iter()
        .flatten()
        .map(|g| {
            (
                g["group"].as_str().unwrap_or_default().to_string(),
                g["count"].as_u64().unwrap_or_default(),
            )
        })
        .collect()
}

#[test]
fn analyse_command_breaks_down_signed_differences() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let signed = write_signed_diff(dir.path())?;
    let report = dir.path().join("analysis.txt");
    let json = dir.path().join("analysis.json");

    run(&[
        "--quiet",
        "--json",
        json.to_str().unwrap(),
        "analyse",
        "--input",
        signed.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
        "--threshold",
        "2",
    ])?;

    let output: serde_json::Value = serde_json::from_reader(std::fs::File::open(&json)?)?;
    let data = &output["data"];
    assert_eq!(output["command"], "analyse");
    assert_eq!(data["mae"], 1.375);
    assert_eq!(
        groups(&data["network_types"]),
        vec![("intra".to_string(), 2), ("inter".to_string(), 2)]
    );
    // only the +2.5 ms difference exceeds the threshold
    assert_eq!(
        groups(&data["deviations"]),
        vec![("low".to_string(), 3), ("high+".to_string(), 1)]
    );
    assert_eq!(
        groups(&data["ping_ranges"]),
        vec![("0-10ms".to_string(), 2), ("10-30ms".to_string(), 2)]
    );
    assert_eq!(data["lines"]["valid"], 4);
    assert_eq!(data["lines"]["headers"], 2);

    let rendered = std::fs::read_to_string(&report)?;
    assert!(rendered.contains("Deviation (threshold ±2 ms)"));
    assert!(rendered.contains("Ping RTT range impact"));
    assert!(rendered.contains(&format!("Lines of {}", signed.display())));
    Ok(())
}

#[test]
fn analyse_command_rejects_plain_rtt_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = test_data("ping.log");
    let report = dir.path().join("analysis.txt");

    let err = run(&[
        "--quiet",
        "analyse",
        "--input",
        input.to_str().unwrap(),
        "--report",
        report.to_str().unwrap(),
    ])
    .unwrap_err();

    assert!(format!("{err:#}").contains("holds no signed difference lines"));
    assert!(!report.exists());
}

#[test]
fn outliers_command_writes_grouped_lines() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let signed = write_signed_diff(dir.path())?;
    let output = dir.path().join("outliers.txt");

    run(&[
        "--quiet",
        "outliers",
        "--input",
        signed.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--top",
        "1",
    ])?;

    let rendered = std::fs::read_to_string(&output)?;
    let lines = rendered.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "=== Serf RTT > Real RTT ===");
    assert!(lines[1].contains("clab-nebula-serf2") && lines[1].contains("+2.500ms"));
    assert_eq!(lines[3], "=== Serf RTT < Real RTT ===");
    assert!(lines[4].contains("-1.000ms"));
    assert_eq!(lines[6], "=== Serf RTT ≈ Real RTT ===");
    // |+1.000| is the smallest difference, first seen on serf1 → serf7
    assert!(lines[7].contains("clab-nebula-serf7") && lines[7].contains("+1.000ms"));
    assert_eq!(lines.len(), 8);
    Ok(())
}

#[test]
fn drift_command_rejects_oversized_window() {
    let dir = tempfile::tempdir().unwrap();
    let input = test_data("coordinates.log");
    let chart = dir.path().join("drift.png");

    let err = run(&[
        "--quiet",
        "drift",
        "--input",
        input.to_str().unwrap(),
        "--window-minutes",
        "9000000000000000",
        "--output",
        chart.to_str().unwrap(),
    ])
    .unwrap_err();

    assert!(format!("{err:#}").contains("drift window"));
    assert!(!chart.exists());
}

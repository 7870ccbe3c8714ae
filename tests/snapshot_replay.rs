/// Offline replay: captured DOM windows → harvest loop → JSON on disk.
use table_harvest::{
    ContainerRef, ConvergeReason, HarvestSettings, Harvester, JsonFileSink, KeyStrategy, Outcome,
    ResultSink, SnapshotSurface,
};

fn window(ids: std::ops::RangeInclusive<u32>) -> String {
    let rows: String = ids
        .map(|i| format!(r#"<tr aria-rowindex="{i}"><td>{i}</td><td>Product {i}</td><td>€{i}.00</td></tr>"#))
        .collect();
    format!(
        r#"<html><body>
<div class="ag-grid-wrapper"><table id="t">
  <thead><tr><th>ID</th><th>Name</th><th>Price</th></tr></thead>
  <tbody>{rows}</tbody>
</table></div>
<footer>Showing 1-4 of 10</footer>
</body></html>"#
    )
}

#[tokio::test]
async fn replays_overlapping_windows_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = Vec::new();
    for (n, ids) in [1..=4, 3..=7, 6..=10].into_iter().enumerate() {
        let path = dir.path().join(format!("window-{}.html", n));
        std::fs::write(&path, window(ids)).unwrap();
        files.push(path);
    }

    let surface = SnapshotSurface::from_files(&files).unwrap();
    let report = Harvester::new(HarvestSettings::default())
        .run(&surface, &ContainerRef::new("#t"))
        .await;

    assert_eq!(report.outcome, Outcome::Converged(ConvergeReason::TargetReached));
    assert_eq!(report.attempts, 3);
    assert!(report.virtualized);
    assert_eq!(report.headers, vec!["ID", "Name", "Price"]);

    let out = dir.path().join("products.json");
    JsonFileSink::new(&out).write(&report.headers, &report.rows).unwrap();
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["ID"], "1");
    assert_eq!(records[9]["Name"], "Product 10");
    assert_eq!(records[9]["Price"], "€10.00");
}

#[tokio::test]
async fn identity_strategy_keeps_rows_with_equal_content() {
    let html = r#"<html><body><table id="t"><tbody>
<tr aria-rowindex="1"><td>Bob</td><td>Sales</td></tr>
<tr aria-rowindex="2"><td>Bob</td><td>Sales</td></tr>
</tbody></table></body></html>"#;

    let by_content = Harvester::new(HarvestSettings::default())
        .run(&SnapshotSurface::new(vec![html.to_string()]), &ContainerRef::new("#t"))
        .await;
    assert_eq!(by_content.outcome, Outcome::Converged(ConvergeReason::FullyRendered));
    assert_eq!(by_content.row_count(), 1);

    let settings = HarvestSettings {
        key_strategy: KeyStrategy::PreferIdentity,
        ..HarvestSettings::default()
    };
    let by_identity = Harvester::new(settings)
        .run(&SnapshotSurface::new(vec![html.to_string()]), &ContainerRef::new("#t"))
        .await;
    assert_eq!(by_identity.row_count(), 2);
}

#[tokio::test]
async fn missing_snapshot_file_is_an_error() {
    let err = SnapshotSurface::from_files(&["/definitely/not/here.html"]).unwrap_err();
    assert!(err.to_string().contains("not/here.html"));
}

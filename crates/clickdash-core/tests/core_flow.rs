use chrono::{
  Duration,
  Utc
};
use clickdash_core::metrics::{
  dashboard_metrics,
  defect_tables,
  status_counts
};
use clickdash_core::settings::{
  Settings,
  SettingsStore
};
use clickdash_core::task::tasks_from_values;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn settings_export_then_import_is_identical() {
  let temp = tempdir().expect("tempdir");
  let store = SettingsStore::open(
    &temp.path().join("data")
  )
  .expect("open store");

  let settings = Settings {
    api_key:         "pk_81234567_ABCDEFGHIJ"
      .to_string(),
    space_id:        "90123".to_string(),
    list_id:         "901234567".to_string(),
    endpoint:        "https://api.clickup.com/api/v2/space/{spaceId}/list"
      .to_string(),
    fetch_all_pages: false
  };
  store.save(&settings).expect("save");

  let exported = temp.path().join("backup.json");
  store.export_to(&exported).expect("export");
  store.clear().expect("clear");
  assert!(
    store
      .load()
      .expect("load after clear")
      .is_none()
  );

  let imported = store
    .import_from(&exported)
    .expect("import");
  assert_eq!(imported, settings);
  assert_eq!(
    store.load().expect("load").as_ref(),
    Some(&settings)
  );

  let raw: serde_json::Value =
    serde_json::from_str(
      &std::fs::read_to_string(&exported)
        .expect("read export")
    )
    .expect("export is json");
  assert_eq!(raw["listId"], json!("901234567"));
  assert_eq!(
    raw["fetchAllPages"],
    json!(false)
  );
}

#[test]
fn upstream_payload_to_dashboard_numbers() {
  let now = Utc::now();
  let stamp = |days: i64| {
    (now - Duration::days(days))
      .timestamp_millis()
      .to_string()
  };

  let mut values = Vec::new();
  for i in 0..10 {
    let status = match i {
      | 0..=3 => "완료",
      | 4..=6 => "결함",
      | _ => "미확인"
    };
    values.push(json!({
      "id": format!("86c1x{i:04}"),
      "name": format!("Issue {i}"),
      "status": { "status": status, "color": "#FF6B6B", "type": "custom" },
      "date_created": stamp(20 - i),
      "date_updated": stamp(2),
    }));
  }
  values.push(json!({ "unexpected": true }));

  let tasks = tasks_from_values(&values);
  assert_eq!(tasks.len(), 10);

  let metrics = dashboard_metrics(&tasks, now);
  assert_eq!(metrics.completion_rate, 40);
  assert_eq!(metrics.active, 6);

  let counts = status_counts(&tasks);
  assert_eq!(counts.len(), 3);
  assert_eq!(counts[0].status, "완료");
  assert_eq!(counts[1].percentage, 30);

  let tables = defect_tables(&tasks, now);
  assert_eq!(tables.normal.len(), 3);
  assert_eq!(tables.normal[0].short_id, "006");
  assert_eq!(tables.resolved.len(), 4);
}

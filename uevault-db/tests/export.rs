use tempfile::TempDir;
use uevault_catalog::{FieldValue, Record, field};
use uevault_db::{export_subset, read_subset};

fn record(id: &str, title: &str, price: f64) -> Record {
    Record::from_pairs([
        (field::ASSET_ID, FieldValue::text(id)),
        (field::APP_TITLE, FieldValue::text(title)),
        (field::PRICE, FieldValue::Float(price)),
    ])
}

#[test]
fn exports_selected_columns_only() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("nested/selection.csv");
    let rows = [record("a1", "Forest, Deluxe", 10.0), record("b2", "Rocks", 2.5)];

    let n = export_subset(rows.iter(), &[field::ASSET_ID, field::PRICE], &dest).unwrap();
    assert_eq!(n, 2);
    let text = std::fs::read_to_string(&dest).unwrap();
    assert_eq!(text, "Asset_id,Price\na1,10.0\nb2,2.5\n");
}

#[test]
fn tsv_subset_reads_back() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("selection.tsv");
    let rows = [record("a1", "Forest, Deluxe", 10.0)];
    export_subset(rows.iter(), &[field::ASSET_ID, field::APP_TITLE], &dest).unwrap();

    let text = std::fs::read_to_string(&dest).unwrap();
    assert!(text.starts_with("Asset_id\tApp title\n"));

    let back = read_subset(&dest).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].get_text(field::APP_TITLE), Some("Forest, Deluxe"));
}

#[test]
fn unwritable_destination_is_a_write_error() {
    let tmp = TempDir::new().unwrap();
    let blocker = tmp.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let err = export_subset(
        [record("a1", "t", 1.0)].iter(),
        &[field::ASSET_ID],
        &blocker.join("out.csv"),
    )
    .unwrap_err();
    assert!(matches!(err, uevault_db::StorageError::Write { .. }));
}

use std::fs;
use std::sync::atomic::AtomicBool;

use tempfile::TempDir;
use uevault_catalog::{AssetExtra, AssetInfo, BatchFilter, CatalogItem, FieldValue, field};
use uevault_import::{ListOutcome, SilentProgress, run_list};
use uevault_lib::{AppSettings, CacheSettings, FilterValue, VaultContext};

fn item(name: &str, asset_id: &str, price: f64) -> CatalogItem {
    let mut item = CatalogItem {
        app_name: name.to_string(),
        app_title: name.to_string(),
        extra: Some(AssetExtra {
            price: Some(price),
            ..AssetExtra::default()
        }),
        ..CatalogItem::default()
    };
    item.asset_infos.insert(
        "Windows".to_string(),
        AssetInfo {
            asset_id: asset_id.to_string(),
            ..AssetInfo::default()
        },
    );
    item
}

fn context(tmp: &TempDir, data_file: &str) -> VaultContext {
    let settings = AppSettings {
        data_source: Some(tmp.path().join(data_file)),
        page_size: 2,
        cache: CacheSettings::under(&tmp.path().join("cache")),
        ..AppSettings::default()
    };
    VaultContext::new(settings, tmp.path().join("settings.toml"))
}

fn list(ctx: &VaultContext) {
    let source = ctx.catalog_source(None).unwrap();
    let mut backend = ctx.open_backend(&ctx.data_source(None).unwrap());
    let outcome = run_list(
        &source,
        backend.as_mut(),
        &ctx.list_options(BatchFilter::default()),
        &AtomicBool::new(false),
        &SilentProgress,
    )
    .unwrap();
    assert!(matches!(outcome, ListOutcome::Completed(_)));
}

fn user_edits_survive_a_new_list_run(data_file: &str) {
    let tmp = TempDir::new().unwrap();
    let ctx = context(&tmp, data_file);
    fs::create_dir_all(&ctx.settings().cache.metadata_dir).unwrap();
    let source = ctx.catalog_source(None).unwrap();
    for (name, id, price) in [("Rocks", "r1", 10.0), ("Trees", "t1", 4.0), ("Sky", "s1", 30.0)] {
        source.save_item(&item(name, id, price)).unwrap();
    }
    list(&ctx);

    let source_path = ctx.data_source(None).unwrap();
    let mut view = ctx.open_view(&source_path).unwrap();
    assert_eq!(view.filtered_len(), 3);
    assert_eq!(view.total_pages(), 2);

    let filter = ctx.filter_engine().compile("price < 20").unwrap();
    view.apply_filter(Some(filter));
    assert_eq!(view.filtered_len(), 2);
    let first = view.page_keys()[0].clone();
    assert!(view.set_cell(0, field::COMMENT, "keep me"));
    let report = view.save().unwrap();
    assert!(report.is_complete());
    view.close().unwrap();

    source.save_item(&item("Rocks", "r1", 8.0)).unwrap();
    list(&ctx);

    let view = ctx.open_view(&source_path).unwrap();
    let record = view.record(&first).unwrap();
    assert_eq!(record.get_text(field::COMMENT), Some("keep me"));
    if first == "r1" {
        assert_eq!(record.get(field::PRICE), Some(&FieldValue::Float(8.0)));
    }
}

#[test]
fn flat_file_session() {
    user_edits_survive_a_new_list_run("assets.csv");
}

#[test]
fn sqlite_session() {
    user_edits_survive_a_new_list_run("assets.db");
}

#[test]
fn saved_filters_are_offered_by_name() {
    let tmp = TempDir::new().unwrap();
    let mut ctx = context(&tmp, "assets.csv");
    ctx.settings_mut()
        .save_filter(FilterValue::query("Cheap", "price < 5"));
    ctx.save().unwrap();

    let reloaded = VaultContext::load(Some(tmp.path().join("settings.toml")));
    let engine = reloaded.filter_engine();
    assert_eq!(engine.saved().len(), 1);
    assert!(engine.compile("Cheap").is_ok());
}

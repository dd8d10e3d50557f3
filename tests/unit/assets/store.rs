use super::*;

fn blob() -> ImageBlob {
    ImageBlob::new("image/png", vec![0])
}

#[test]
fn add_get_remove_bump_revision() {
    let store = MemoryAssetStore::new();
    assert_eq!(store.revision(), 0);

    let logo = Asset::new(AssetKind::Logo, "Acme mark", blob());
    let id = logo.id.clone();
    store.add(logo);
    assert_eq!(store.revision(), 1);
    assert!(store.contains(&id));
    assert_eq!(store.get(&id).unwrap().name, "Acme mark");

    assert!(store.remove(&id));
    assert!(!store.remove(&id));
    assert_eq!(store.revision(), 2);
    assert!(store.list().is_empty());
}

#[test]
fn re_adding_replaces_in_place() {
    let store = MemoryAssetStore::new();
    let mut a = Asset::new(AssetKind::Product, "Tee", blob());
    store.add(a.clone());
    store.add(Asset::new(AssetKind::Logo, "Mark", blob()));
    a.name = "White tee".to_string();
    store.add(a.clone());
    let names: Vec<String> = store.list().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["White tee", "Mark"]);
}

#[test]
fn asset_json_uses_type_field() {
    let mut a = Asset::new(AssetKind::Logo, "Mark", blob());
    a.id = AssetId::from("a1");
    let v = serde_json::to_value(&a).unwrap();
    assert_eq!(v["id"], "a1");
    assert_eq!(v["type"], "logo");
    assert_eq!(v["image"]["mimeType"], "image/png");
}

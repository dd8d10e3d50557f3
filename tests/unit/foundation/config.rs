use std::collections::HashMap;

use super::*;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |k| map.get(k).cloned()
}

#[test]
fn keys_from_list_and_singletons_are_deduplicated() {
    let cfg = StudioConfig::default()
        .with_overrides(env(&[
            ("GEMINI_API_KEYS", "alpha, beta\ngamma,,alpha"),
            ("GEMINI_API_KEY", " beta "),
            ("API_KEY", "delta"),
            ("GEMINI_API_KEY_3", "epsilon"),
        ]))
        .unwrap();
    assert_eq!(cfg.api_keys, vec!["alpha", "beta", "gamma", "delta", "epsilon"]);
}

#[test]
fn overrides_replace_defaults() {
    let cfg = StudioConfig::default()
        .with_overrides(env(&[
            ("MOCKFORGE_BASE_URL", "http://localhost:9000/"),
            ("MOCKFORGE_IMAGE_MODEL", "img-x"),
            ("MOCKFORGE_TIMEOUT_SECS", "12"),
            ("MOCKFORGE_STARTING_CREDITS", "3"),
        ]))
        .unwrap();
    assert_eq!(cfg.base_url, "http://localhost:9000");
    assert_eq!(cfg.image_model, "img-x");
    assert_eq!(cfg.text_model, DEFAULT_TEXT_MODEL);
    assert_eq!(cfg.request_timeout_secs, 12);
    assert_eq!(cfg.starting_credits, 3);
}

#[test]
fn bad_number_is_a_validation_error() {
    let err = StudioConfig::default()
        .with_overrides(env(&[("MOCKFORGE_TIMEOUT_SECS", "soon")]))
        .unwrap_err();
    assert!(matches!(err, StudioError::Validation(_)));
}

#[test]
fn json_defaults_fill_missing_fields() {
    let cfg: StudioConfig = serde_json::from_str(r#"{ "api_keys": ["k1"] }"#).unwrap();
    assert_eq!(cfg.api_keys, vec!["k1"]);
    assert_eq!(cfg.image_model, DEFAULT_IMAGE_MODEL);
    assert_eq!(cfg.retry_backoff_ms, 1_000);
}

use crate::{
    foundation::{clock::ManualClock, error::UserFacing},
    gateway::provider::ScriptedProvider,
    keys::pool::CircuitState,
    storage::kv::MemoryStore,
    studio::layer::PlacedLayer,
};

use super::*;

struct Harness {
    gateway: AiGateway,
    provider: Arc<ScriptedProvider>,
    pool: Arc<KeyPool>,
    credits: Arc<CreditLedger>,
}

fn harness(keys: &[&str], credits: i64) -> Harness {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let clock: SharedClock = Arc::new(ManualClock::new(1_000_000));
    let pool = Arc::new(KeyPool::new(
        keys.iter().map(|k| (*k).to_string()).collect(),
        store.clone(),
        clock.clone(),
    ));
    let provider = Arc::new(ScriptedProvider::new());
    let ledger = Arc::new(CreditLedger::new(store, clock, credits));
    let gateway = AiGateway::new(
        ResilientInvoker::with_backoff(pool.clone(), Duration::ZERO),
        provider.clone(),
        PromptBuilder::new("img", "txt"),
        ledger.clone(),
    );
    Harness {
        gateway,
        provider,
        pool,
        credits: ledger,
    }
}

fn png() -> ImageBlob {
    ImageBlob::new("image/png", vec![137, 80, 78, 71])
}

#[tokio::test]
async fn successful_generation_keeps_the_credit() {
    let h = harness(&["k1"], 3);
    h.provider.push(Ok(GenerateResponse::with_image(&png())));

    let out = h
        .gateway
        .generate_asset("a red fox", AssetKind::Logo)
        .await
        .unwrap();
    assert_eq!(out, png());
    assert_eq!(h.credits.balance().unwrap(), 2);
    assert_eq!(h.provider.calls()[0].credential, "k1");
}

#[tokio::test]
async fn quota_exceeded_refunds_exactly_one_credit() {
    let h = harness(&["k1"], 5);
    h.provider
        .push(Err(StudioError::provider(None, "quota exceeded for project")))
        .push(Err(StudioError::provider(None, "quota exceeded for project")));

    let err = h
        .gateway
        .generate_asset("a mug", AssetKind::Product)
        .await
        .unwrap_err();

    assert!(err.is_quota());
    assert_eq!(err.user_category(), UserFacing::Busy);
    assert_eq!(h.credits.balance().unwrap(), 5);
    let record = h.pool.record("k1").unwrap();
    assert!(record.last_failure_was_quota);
    assert_eq!(record.circuit_state, CircuitState::Open);

    let refunds = h
        .credits
        .transactions()
        .unwrap()
        .iter()
        .filter(|t| t.kind == crate::credits::ledger::TransactionKind::Refund)
        .count();
    assert_eq!(refunds, 1);
}

#[tokio::test]
async fn blocked_and_imageless_responses_refund() {
    let h = harness(&["k1", "k2"], 2);
    h.provider
        .push(Ok(GenerateResponse::blocked("SAFETY")))
        .push(Ok(GenerateResponse::finished("RECITATION")))
        .push(Ok(GenerateResponse::with_text("sorry, no image")));

    let blocked = h.gateway.refine(&png(), "add flames").await.unwrap_err();
    assert_eq!(blocked.user_category(), UserFacing::Blocked);
    let recitation = h.gateway.remove_background(&png()).await.unwrap_err();
    assert!(matches!(recitation, StudioError::ContentBlocked(_)));
    let empty = h
        .gateway
        .realtime_composite(&png(), "")
        .await
        .unwrap_err();
    assert!(matches!(empty, StudioError::MalformedResponse(_)));

    assert_eq!(h.credits.balance().unwrap(), 2);
    assert_eq!(h.provider.calls().len(), 3);
    assert_eq!(h.pool.record("k1").unwrap().consecutive_failures, 0);
}

#[tokio::test]
async fn no_credits_means_no_call() {
    let h = harness(&["k1"], 0);
    let err = h
        .gateway
        .generate_asset("fox", AssetKind::Logo)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::InsufficientCredits { balance: 0 }));
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn empty_pool_refunds() {
    let h = harness(&[], 1);
    let err = h.gateway.remove_background(&png()).await.unwrap_err();
    assert!(matches!(err, StudioError::NoCredentialsAvailable));
    assert_eq!(h.credits.balance().unwrap(), 1);
}

#[tokio::test]
async fn validation_happens_before_spending() {
    let h = harness(&["k1"], 1);
    assert!(matches!(
        h.gateway.refine(&png(), "   ").await,
        Err(StudioError::Validation(_))
    ));
    assert_eq!(h.credits.balance().unwrap(), 1);
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn composite_sends_product_and_overlays() {
    let h = harness(&["k1"], 1);
    h.provider.push(Ok(GenerateResponse::with_image(&png())));
    let layer = PlacedLayer::new(crate::assets::store::AssetId::from("fox"));
    let art = png();
    let overlays = [Overlay {
        layer: &layer,
        image: &art,
        name: "Fox",
    }];

    h.gateway
        .generate_composite(&png(), &overlays, "")
        .await
        .unwrap();
    let call = &h.provider.calls()[0];
    assert_eq!(call.request.image_part_count(), 2);
    assert_eq!(call.request.model, "img");
}

#[tokio::test]
async fn analyze_parses_name_and_kind() {
    let h = harness(&["k1"], 2);
    h.provider
        .push(Ok(GenerateResponse::with_text(
            "```json\n{\"name\": \" Fox Emblem \", \"type\": \"LOGO\"}\n```",
        )))
        .push(Ok(GenerateResponse::with_text("{\"type\": \"logo\"}")));

    let analysis = h.gateway.analyze(&png()).await.unwrap();
    assert_eq!(
        analysis,
        AssetAnalysis {
            name: "Fox Emblem".to_string(),
            kind: AssetKind::Logo
        }
    );
    assert!(matches!(
        h.gateway.analyze(&png()).await,
        Err(StudioError::MalformedResponse(_))
    ));
    assert_eq!(h.credits.balance().unwrap(), 1);
}

#[tokio::test]
async fn interpret_command_resolves_layer() {
    let h = harness(&["k1"], 1);
    h.provider.push(Ok(GenerateResponse::with_text(
        r#"{"action":"delete","target":"fox"}"#,
    )));
    let layers = vec![LayerContext {
        id: LayerId::from("l1"),
        name: "Fox Emblem".to_string(),
        x: 50.0,
        y: 50.0,
        scale: 1.0,
        rotation: 0.0,
    }];
    let cmd = h
        .gateway
        .interpret_command("remove the fox", &layers, None)
        .await
        .unwrap();
    assert_eq!(
        cmd,
        CanvasCommand::Delete {
            layer: LayerId::from("l1")
        }
    );
    assert_eq!(h.credits.balance().unwrap(), 0);
}

#[test]
fn analysis_defaults_to_product() {
    let a = parse_analysis(r#"{"name":"Mug","type":"thing"}"#).unwrap();
    assert_eq!(a.kind, AssetKind::Product);
}

use super::*;

fn png_blob() -> ImageBlob {
    ImageBlob::new("image/png", vec![1, 2, 3, 4])
}

#[test]
fn request_serializes_in_provider_shape() {
    let req = GenerateRequest::user("m", vec![Part::text("hello"), Part::image(&png_blob())])
        .with_system("be brief")
        .expect_image();
    let v = serde_json::to_value(&req).unwrap();
    assert!(v.get("model").is_none());
    assert_eq!(v["systemInstruction"]["parts"][0]["text"], "be brief");
    assert_eq!(v["contents"][0]["role"], "user");
    assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(v["contents"][0]["parts"][1]["inlineData"]["data"], "AQIDBA==");
    assert_eq!(
        v["generationConfig"]["responseModalities"],
        serde_json::json!(["IMAGE", "TEXT"])
    );
    assert_eq!(req.image_part_count(), 1);
    assert_eq!(req.prompt_text(), "hello");
}

#[test]
fn response_parses_provider_json() {
    let raw = r#"{
        "candidates": [{
            "content": { "role": "model", "parts": [
                { "text": "here you go", "thought": false },
                { "inlineData": { "mimeType": "image/png", "data": "AQIDBA==" } },
                { "functionCall": { "name": "x" } }
            ]},
            "finishReason": "STOP"
        }],
        "usageMetadata": { "totalTokenCount": 12 }
    }"#;
    let resp: GenerateResponse = serde_json::from_str(raw).unwrap();
    assert_eq!(extract_image(&resp).unwrap(), png_blob());
    assert_eq!(extract_text(&resp).unwrap(), "here you go");
}

#[test]
fn three_failure_shapes_are_distinct() {
    let upfront = extract_image(&GenerateResponse::blocked("SAFETY")).unwrap_err();
    assert!(matches!(upfront, StudioError::ContentBlocked(ref m) if m.contains("SAFETY")));

    let finish = extract_image(&GenerateResponse::finished("IMAGE_SAFETY")).unwrap_err();
    assert!(matches!(finish, StudioError::ContentBlocked(ref m) if m.contains("IMAGE_SAFETY")));

    let text_only = extract_image(&GenerateResponse::with_text("sorry, no")).unwrap_err();
    assert!(matches!(text_only, StudioError::MalformedResponse(_)));
}

#[test]
fn empty_response_is_malformed() {
    let resp = GenerateResponse::default();
    assert!(matches!(
        extract_image(&resp).unwrap_err(),
        StudioError::MalformedResponse(_)
    ));
    assert!(matches!(
        extract_text(&resp).unwrap_err(),
        StudioError::MalformedResponse(_)
    ));
}

#[test]
fn data_urls_round_trip_and_reject_garbage() {
    let blob = png_blob();
    let url = blob.data_url();
    assert_eq!(url, "data:image/png;base64,AQIDBA==");
    assert_eq!(ImageBlob::from_data_url(&url).unwrap(), blob);
    assert!(ImageBlob::from_data_url("http://x").is_err());
    assert!(ImageBlob::from_data_url("data:image/png,raw").is_err());
}

#[test]
fn sniffing_detects_png() {
    let mut buf = Vec::new();
    image::RgbaImage::new(1, 1)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    assert_eq!(ImageBlob::from_bytes(buf).unwrap().mime_type, "image/png");
    assert!(ImageBlob::from_bytes(vec![0, 1, 2]).is_err());
}

#[test]
fn blob_debug_hides_payload() {
    let s = format!("{:?}", ImageBlob::new("image/jpeg", vec![0; 4096]));
    assert!(s.contains("len: 4096"));
}

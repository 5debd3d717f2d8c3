use pii_shield_core::{
    contains_tokens, parse_tokens, AnonymizeResponse, Config, DeanonymizeResponse, PiiCategory,
    PiiError, PiiService,
};

#[test]
fn test_anonymize_then_deanonymize_through_public_api() {
    let service = PiiService::from_config(&Config::demo()).unwrap();
    let text = "Mi cédula es CC: 12345678 y mi teléfono +57 300 123 4567";

    let anonymized = service.anonymize(text).unwrap();
    assert!(contains_tokens(&anonymized.anonymized_text));
    assert_eq!(parse_tokens(&anonymized.anonymized_text).len(), 2);
    assert_eq!(anonymized.items[0].category, PiiCategory::NationalId);
    assert_eq!(anonymized.items[1].category, PiiCategory::Phone);

    let restored = service.deanonymize(&anonymized.anonymized_text).unwrap();
    assert_eq!(restored.text, text);
    assert_eq!(restored.tokens_processed, 2);
}

#[test]
fn test_structured_failures() {
    let service = PiiService::from_config(&Config::demo()).unwrap();

    let response = AnonymizeResponse::from_result(&service.anonymize(""));
    assert!(!response.success);
    assert_eq!(response.error_kind, Some("validation_error"));

    let response = DeanonymizeResponse::from_result(
        &service.deanonymize("Respuesta con <PII_EMAIL_0000abcd> desconocido"),
    );
    assert!(response.success);
    assert_eq!(response.text, "Respuesta con <PII_EMAIL_0000abcd> desconocido");
    assert_eq!(response.unresolved, vec!["<PII_EMAIL_0000abcd>".to_string()]);
}

#[test]
fn test_module_exports() {
    let mut config = Config::default();
    config.validate().unwrap();

    // Keyed mode without a secret cannot build a service.
    assert!(matches!(
        PiiService::from_config(&config).err(),
        Some(PiiError::Configuration(_))
    ));

    config.tokenizer.secret = Some("exports-secret".to_string());
    config.mapping.database_path = ":memory:".into();
    assert!(PiiService::from_config(&config).is_ok());
}

use crate::config::{Config, StoreBackend, TokenMode};
use crate::detection::PiiCategory;
use crate::service::PiiService;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::info;

fn durable_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.tokenizer.mode = TokenMode::Keyed;
    config.tokenizer.secret = Some("integration-secret".to_string());
    config.mapping.backend = StoreBackend::Sqlite;
    config.mapping.database_path = temp_dir.path().join("mappings.db");
    config
}

fn fake_message(rng: &mut StdRng) -> String {
    let first: String = FirstName().fake_with_rng(rng);
    let last: String = LastName().fake_with_rng(rng);
    let email: String = SafeEmail().fake_with_rng(rng);
    let phone = format!(
        "3{:02} {:03} {:04}",
        rng.gen_range(0..100),
        rng.gen_range(0..1000),
        rng.gen_range(0..10000)
    );
    let cedula = rng.gen_range(10_000_000u64..9_999_999_999);

    match rng.gen_range(0..4) {
        0 => format!("Buenas, soy el Sr. {} {}, mi correo es {}", first, last, email),
        1 => format!("Llámeme al {} o escriba a {}.", phone, email),
        2 => format!("Cédula {} a nombre de la Sra. {}", cedula, last),
        _ => format!(
            "Dirección: Calle {} # {}-{}, teléfono {}",
            rng.gen_range(1..200),
            rng.gen_range(1..100),
            rng.gen_range(1..100),
            phone
        ),
    }
}

#[test]
fn test_round_trip_on_generated_messages() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .try_init();

    let temp_dir = TempDir::new().unwrap();
    let service = PiiService::from_config(&durable_config(&temp_dir)).unwrap();
    let mut rng = StdRng::seed_from_u64(12345);

    for _ in 0..200 {
        let message = fake_message(&mut rng);
        let anonymized = service.anonymize(&message).unwrap();
        assert!(!anonymized.items.is_empty(), "nothing detected in {:?}", message);

        let restored = service.deanonymize(&anonymized.anonymized_text).unwrap();
        assert_eq!(restored.text, message);
        assert!(restored.unresolved.is_empty());
    }

    let stats = service.statistics().unwrap();
    info!("Generated-message round trip left {} mappings", stats.total_mappings);
    assert!(stats.total_mappings > 0);
}

#[test]
fn test_round_trip_in_demo_mode() {
    let service = PiiService::from_config(&Config::demo()).unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let message = fake_message(&mut rng);
        let anonymized = service.anonymize(&message).unwrap();
        let restored = service.deanonymize(&anonymized.anonymized_text).unwrap();
        assert_eq!(restored.text, message);
    }
}

#[test]
fn test_model_reply_from_earlier_turn_resolves() {
    let temp_dir = TempDir::new().unwrap();
    let config = durable_config(&temp_dir);

    let first_turn = {
        let service = PiiService::from_config(&config).unwrap();
        service
            .anonymize("Represento al Dr. Juan Pérez, CC: 12345678")
            .unwrap()
    };

    // A later request, possibly another process, sees only the model's reply.
    let service = PiiService::from_config(&config).unwrap();
    let name_token = &first_turn.items[0].token;
    let id_token = &first_turn.items[1].token;
    let reply = format!(
        "Entendido. El poder debe firmarlo {} identificado con {}.",
        name_token, id_token
    );

    let restored = service.deanonymize(&reply).unwrap();
    assert_eq!(
        restored.text,
        "Entendido. El poder debe firmarlo Dr. Juan Pérez identificado con CC: 12345678."
    );
    assert_eq!(restored.tokens_processed, 2);
}

#[test]
fn test_same_value_same_token_across_modes_and_calls() {
    let temp_dir = TempDir::new().unwrap();
    let keyed = PiiService::from_config(&durable_config(&temp_dir)).unwrap();
    let demo = PiiService::from_config(&Config::demo()).unwrap();

    let a = keyed.anonymize("escriba a juan@ejemplo.com").unwrap();
    let b = keyed.anonymize("juan@ejemplo.com otra vez").unwrap();
    assert_eq!(a.items[0].token, b.items[0].token);

    let c = demo.anonymize("escriba a juan@ejemplo.com").unwrap();
    assert_eq!(c.items[0].category, PiiCategory::Email);
    assert_ne!(a.items[0].token, c.items[0].token);
}

#[test]
fn test_concurrent_anonymize_of_same_value() {
    let temp_dir = TempDir::new().unwrap();
    let service = Arc::new(PiiService::from_config(&durable_config(&temp_dir)).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                service
                    .anonymize(&format!("petición {}: llamar al +57 300 123 4567", i))
                    .unwrap()
            })
        })
        .collect();

    let tokens: Vec<String> = handles
        .into_iter()
        .map(|h| h.join().unwrap().items[0].token.clone())
        .collect();

    assert!(tokens.windows(2).all(|w| w[0] == w[1]));
    let stats = service.statistics().unwrap();
    assert_eq!(stats.total_mappings, 1);
    assert_eq!(stats.mappings_by_category.get(&PiiCategory::Phone), Some(&1));
}

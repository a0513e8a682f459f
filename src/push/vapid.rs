use base64::{URL_SAFE_NO_PAD, encode_config};
use jwt_simple::prelude::ES256KeyPair;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::config;
use crate::types::push::VapidConfig;

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Debug, Clone)]
pub(crate) enum VapidConfigStatus {
    Missing,
    Incomplete,
    Ready(VapidConfig),
}

fn non_blank(value: Option<&String>) -> Option<&String> {
    value.filter(|value| !value.trim().is_empty())
}

pub(crate) fn load_vapid_config(config: &config::AppConfig) -> VapidConfigStatus {
    let private_key = non_blank(config.vapid_private_key.as_ref());
    let public_key = non_blank(config.vapid_public_key.as_ref());
    let subject = non_blank(config.vapid_subject.as_ref());
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            VapidConfigStatus::Ready(VapidConfig {
                private_key: private_key.trim().to_string(),
                public_key: public_key.trim().to_string(),
                subject: subject.trim().to_string(),
            })
        }
        _ if has_any => VapidConfigStatus::Incomplete,
        _ => VapidConfigStatus::Missing,
    }
}

pub fn generate_vapid_credentials() -> Result<VapidCredentials, web_push::WebPushError> {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<VapidCredentials, web_push::WebPushError> {
    let key_pair = generate_es256_keypair_with_rng(rng);
    let private_key = encode_config(key_pair.to_bytes(), URL_SAFE_NO_PAD);
    let public_key =
        web_push::VapidSignatureBuilder::from_base64_no_sub(&private_key, URL_SAFE_NO_PAD)?
            .get_public_key();
    let public_key = encode_config(public_key, URL_SAFE_NO_PAD);

    Ok(VapidCredentials {
        private_key,
        public_key,
    })
}

fn generate_es256_keypair_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> ES256KeyPair {
    let mut key_bytes = [0u8; 32];
    loop {
        rng.fill_bytes(&mut key_bytes);
        if let Ok(key_pair) = ES256KeyPair::from_bytes(&key_bytes) {
            return key_pair;
        }
    }
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generate_vapid_credentials_with_rng__should_be_deterministic_for_seed() {
        // Given
        let mut first_rng = StdRng::from_seed([7u8; 32]);
        let mut second_rng = StdRng::from_seed([7u8; 32]);

        // When
        let first =
            generate_vapid_credentials_with_rng(&mut first_rng).expect("credentials should generate");
        let second = generate_vapid_credentials_with_rng(&mut second_rng)
            .expect("credentials should generate");

        // Then
        assert_eq!(first.private_key, second.private_key);
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(first.private_key.len(), 43);
        assert!(first.public_key.starts_with('B'));
    }

    #[test]
    fn load_vapid_config__should_classify_missing_incomplete_and_ready() {
        // Given
        let missing = config::AppConfig::default();
        let incomplete = config::AppConfig {
            vapid_private_key: Some("private".to_string()),
            vapid_subject: Some("   ".to_string()),
            ..Default::default()
        };
        let ready = config::AppConfig {
            vapid_private_key: Some("private".to_string()),
            vapid_public_key: Some("public".to_string()),
            vapid_subject: Some("mailto:admin@sekolah.sch.id".to_string()),
            ..Default::default()
        };

        // Then
        assert!(matches!(load_vapid_config(&missing), VapidConfigStatus::Missing));
        assert!(matches!(
            load_vapid_config(&incomplete),
            VapidConfigStatus::Incomplete
        ));
        match load_vapid_config(&ready) {
            VapidConfigStatus::Ready(vapid) => {
                assert_eq!(vapid.subject, "mailto:admin@sekolah.sch.id");
            }
            other => panic!("expected ready config, got {other:?}"),
        }
    }
}

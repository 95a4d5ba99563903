use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, crypto};

use super::{
    error::{KeySetError, VerifyError},
    jwks::{KeyRecord, KeySet},
};

/// Verifies an RS256 signature against the issuer's keys.
///
/// With a `kid`, only keys carrying that `kid` (or no `kid` at all) are tried;
/// without one, every key is tried. The algorithm is always RS256, whatever the
/// token header claims.
pub fn verify_signature(
    signing_input: &[u8],
    signature: &[u8],
    kid: Option<&str>,
    keys: &KeySet,
) -> Result<(), VerifyError> {
    if keys.is_empty() {
        return Err(KeySetError::NoUsableKeys.into());
    }

    let signature = BASE64_URL_SAFE_NO_PAD.encode(signature);
    let verified = keys
        .keys()
        .iter()
        .filter(|key| is_candidate(key, kid))
        .any(|key| {
            matches!(
                crypto::verify(&signature, signing_input, key.decoding_key(), Algorithm::RS256),
                Ok(true)
            )
        });

    if verified {
        Ok(())
    } else {
        Err(VerifyError::SignatureInvalid)
    }
}

fn is_candidate(key: &KeyRecord, kid: Option<&str>) -> bool {
    match (kid, key.kid()) {
        (Some(wanted), Some(actual)) => wanted == actual,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;
    use testutils::TestKey;

    use super::*;
    use crate::id_token::token::ParsedToken;

    fn key_set(keys: &[TestKey]) -> KeySet {
        KeySet::from_json(&serde_json::to_vec(&testutils::jwks(keys)).unwrap()).unwrap()
    }

    fn signed(key: TestKey, kid: Option<&str>) -> ParsedToken {
        let claims = json!({
            "iss": "https://appleid.apple.com",
            "aud": "com.example.app",
            "exp": 1_893_456_000,
            "sub": "001.abc",
        });
        ParsedToken::parse(&testutils::sign_with_kid(&claims, key, kid)).unwrap()
    }

    #[rstest]
    #[case::matching_kid(TestKey::Primary, Some("primary-key"), &[TestKey::Primary], true)]
    #[case::matching_kid_among_many(
        TestKey::Rotated,
        Some("rotated-key"),
        &[TestKey::Primary, TestKey::Rotated],
        true
    )]
    #[case::no_kid_scans_all(TestKey::Rotated, None, &[TestKey::Primary, TestKey::Rotated], true)]
    #[case::unknown_kid(TestKey::Primary, Some("unknown"), &[TestKey::Primary], false)]
    #[case::kid_of_other_key(
        TestKey::Primary,
        Some("rotated-key"),
        &[TestKey::Primary, TestKey::Rotated],
        false
    )]
    #[case::signer_not_in_set(TestKey::Rotated, Some("rotated-key"), &[TestKey::Primary], false)]
    #[case::no_kid_signer_not_in_set(TestKey::Rotated, None, &[TestKey::Primary], false)]
    fn test_verify_signature(
        #[case] signer: TestKey,
        #[case] kid: Option<&str>,
        #[case] keys: &[TestKey],
        #[case] want_ok: bool,
    ) {
        // given
        let token = signed(signer, kid);

        // when
        let got = verify_signature(
            token.signing_input(),
            token.signature(),
            token.header.kid.as_deref(),
            &key_set(keys),
        );

        // then
        match want_ok {
            true => assert!(got.is_ok(), "{got:?}"),
            false => assert!(matches!(got, Err(VerifyError::SignatureInvalid)), "{got:?}"),
        }
    }

    #[test]
    fn test_verify_signature_key_without_kid_is_candidate() {
        // given
        let mut jwk = TestKey::Primary.jwk();
        jwk.as_object_mut().unwrap().remove("kid");
        let keys = KeySet::from_json(&serde_json::to_vec(&json!({"keys": [jwk]})).unwrap()).unwrap();
        let token = signed(TestKey::Primary, Some("primary-key"));

        // when
        let got = verify_signature(token.signing_input(), token.signature(), Some("primary-key"), &keys);

        // then
        assert!(got.is_ok());
    }

    #[test]
    fn test_verify_signature_tampered_input() {
        // given
        let token = signed(TestKey::Primary, Some("primary-key"));
        let mut signing_input = token.signing_input().to_vec();
        let last = signing_input.len() - 1;
        signing_input[last] ^= 0x01;

        // when
        let got = verify_signature(
            &signing_input,
            token.signature(),
            Some("primary-key"),
            &key_set(&[TestKey::Primary]),
        );

        // then
        assert!(matches!(got, Err(VerifyError::SignatureInvalid)));
    }

    #[test]
    fn test_verify_signature_empty_key_set() {
        let token = signed(TestKey::Primary, Some("primary-key"));

        let got = verify_signature(
            token.signing_input(),
            token.signature(),
            Some("primary-key"),
            &KeySet::default(),
        );

        assert!(matches!(
            got,
            Err(VerifyError::KeySetUnavailable(KeySetError::NoUsableKeys))
        ));
    }
}

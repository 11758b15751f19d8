use backend_lib::auth::password::{self, DIGEST_LENGTH, SALT_LENGTH};
use backend_lib::auth::{
    validate_password_strength, PasswordHasher, PasswordRequirements, PasswordScheme,
};

#[test]
fn test_password_hashing_and_verification() {
    let stored = password::encrypt("SecureP@ssw0rd").unwrap();

    assert_ne!(stored, "SecureP@ssw0rd");
    assert!(password::verify("SecureP@ssw0rd", &stored));
    assert!(!password::verify("SecureP@ssw0rD", &stored));

    // padded base64 of the raw salt and digest
    let (salt, digest) = stored.split_once(':').unwrap();
    assert_eq!(salt.len(), SALT_LENGTH.div_ceil(3) * 4);
    assert_eq!(digest.len(), DIGEST_LENGTH.div_ceil(3) * 4);
}

#[test]
fn test_encrypt_is_salted() {
    let first = password::encrypt("same-password").unwrap();
    let second = password::encrypt("same-password").unwrap();
    assert_ne!(first, second);
    assert!(password::verify("same-password", &first));
    assert!(password::verify("same-password", &second));
}

#[test]
fn test_malformed_credentials_fail_closed() {
    for stored in ["", ":", "abc", "a:b:c", "!!!:???", "c2FsdA==", "$scrypt$garbage"] {
        assert!(!password::verify("anything", stored), "{stored:?}");
        assert!(!PasswordHasher::default().verify("anything", stored), "{stored:?}");
    }
}

#[test]
fn test_hasher_accepts_both_schemes() {
    let scrypt = PasswordHasher::with_scrypt_cost(PasswordScheme::Scrypt, 4, 8, 1).unwrap();
    let legacy = PasswordHasher::default();

    let modern = scrypt.encrypt("open-sesame").unwrap();
    let old = legacy.encrypt("open-sesame").unwrap();

    for hasher in [&scrypt, &legacy] {
        assert!(hasher.verify("open-sesame", &modern));
        assert!(hasher.verify("open-sesame", &old));
    }
    assert!(scrypt.needs_rehash(&old));
    assert!(!scrypt.needs_rehash(&modern));
    assert!(legacy.needs_rehash(&modern));
}

#[test]
fn test_password_strength_validation() {
    let requirements = PasswordRequirements::default();

    assert!(validate_password_strength("eightchr", &requirements));
    assert!(!validate_password_strength("seven77", &requirements));
    assert!(!validate_password_strength("        ", &requirements));

    let custom_requirements = PasswordRequirements {
        min_length: 8,
        require_uppercase: false,
        require_lowercase: true,
        require_digit: true,
        require_special: false,
    };

    assert!(validate_password_strength("securepassw0rd", &custom_requirements));
    assert!(!validate_password_strength("securepassword", &custom_requirements));
}

//! Integration tests for account creation, keystore blobs and import

use peggy::account::AccountDeriver;
use peggy::address::{Address, Network, Protocol};
use peggy::crypto::{KeyGenerator, KeyType};
use peggy::error::PeggyError;
use peggy::keystore;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn test_generate_store_and_reopen() -> TestResult {
    let deriver = AccountDeriver::default();
    let account = deriver.new_account(KeyType::Secp256k1)?;

    // Blob is hex of the JSON key info
    assert!(account.private_key_blob.chars().all(|c| c.is_ascii_hexdigit()));

    let reopened = keystore::decode(&account.private_key_blob)?;
    assert_eq!(reopened.key_type(), KeyType::Secp256k1);
    assert_eq!(reopened.public_key_bytes().to_vec(), account.public_key);
    assert_eq!(deriver.address_of(&reopened)?, account.address);

    // The printed address parses back to the same identity
    let parsed: Address = account.address.to_string().parse()?;
    assert_eq!(parsed, account.address);
    assert_eq!(parsed.protocol(), Protocol::Secp256k1);
    Ok(())
}

#[test]
fn test_import_keeps_blob_verbatim() -> TestResult {
    let deriver = AccountDeriver::new(Network::Testnet, KeyGenerator::default());
    let created = deriver.new_account(KeyType::Secp256k1)?;

    let padded = format!("  {}\n", created.private_key_blob);
    let imported = deriver.import_account(&padded)?;
    assert_eq!(imported.private_key_blob, padded);
    assert_eq!(imported.address, created.address);
    assert!(imported.address.to_string().starts_with("t1"));
    Ok(())
}

#[test]
fn test_known_key_has_stable_address() -> TestResult {
    let blob = keystore::encode(KeyType::Secp256k1, &[0x01; 32])?;
    let first = AccountDeriver::default().import_account(&blob)?;
    let second = AccountDeriver::default().import_account(&blob)?;
    assert_eq!(first.address, second.address);
    assert_eq!(first.address.payload().len(), 20);

    // Same key on another network differs only by prefix
    let testnet = AccountDeriver::new(Network::Testnet, KeyGenerator::default())
        .import_account(&blob)?;
    assert_eq!(testnet.address.payload(), first.address.payload());
    assert_eq!(
        &testnet.address.to_string()[1..],
        &first.address.to_string()[1..]
    );
    Ok(())
}

#[test]
fn test_generated_accounts_differ() -> TestResult {
    let deriver = AccountDeriver::default();
    let alice = deriver.new_account(KeyType::Secp256k1)?;
    let bob = deriver.new_account(KeyType::Secp256k1)?;
    assert_ne!(alice.address, bob.address);
    assert_ne!(alice.private_key_blob, bob.private_key_blob);
    Ok(())
}

#[test]
fn test_bls_and_garbage_are_rejected() {
    let deriver = AccountDeriver::default();
    assert!(matches!(
        deriver.new_account(KeyType::Bls),
        Err(PeggyError::UnsupportedKeyType(_))
    ));
    assert!(matches!(
        deriver.import_account("not hex at all"),
        Err(PeggyError::MalformedKeystore(_))
    ));
}

//! Account creation and import.

use crate::address::{Address, Network};
use crate::crypto::{KeyGenerator, KeyPair, KeyType};
use crate::error::Result;
use crate::keystore;
use tracing::info;

/// The externally visible identity of an account plus its portable key.
/// Persisting `private_key_blob` is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub public_key: Vec<u8>,
    pub private_key_blob: String,
}

impl Account {
    /// Re-opens the keypair from the stored blob, e.g. for signing.
    pub fn key_pair(&self) -> Result<KeyPair> {
        keystore::decode(&self.private_key_blob)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountDeriver {
    network: Network,
    generator: KeyGenerator,
}

impl AccountDeriver {
    pub fn new(network: Network, generator: KeyGenerator) -> Self {
        AccountDeriver { network, generator }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn new_account(&self, key_type: KeyType) -> Result<Account> {
        let key_pair = self.generator.generate(key_type)?;
        let private_key_blob = keystore::encode_key_pair(&key_pair)?;
        let account = self.describe(&key_pair, private_key_blob)?;
        info!("Created {} account {}", key_type, account.address);
        Ok(account)
    }

    /// The returned blob is `blob` verbatim.
    pub fn import_account(&self, blob: &str) -> Result<Account> {
        let key_pair = keystore::decode(blob)?;
        let account = self.describe(&key_pair, blob.to_string())?;
        info!("Imported account {}", account.address);
        Ok(account)
    }

    /// Address for an already opened keypair.
    pub fn address_of(&self, key_pair: &KeyPair) -> Result<Address> {
        Address::from_public_key(&key_pair.public_key_bytes(), self.network)
    }

    fn describe(&self, key_pair: &KeyPair, private_key_blob: String) -> Result<Account> {
        Ok(Account {
            address: self.address_of(key_pair)?,
            public_key: key_pair.public_key_bytes().to_vec(),
            private_key_blob,
        })
    }
}

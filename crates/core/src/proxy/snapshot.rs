use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use anyhow::{anyhow, Context, Result};

use super::{StorageError, StorageReader};

/// In-memory storage captured at a single block.
///
/// The snapshot file is a JSON object mapping account addresses to objects that
/// map slots to 32-byte words. Slots and words may be written as hex (`0x...`)
/// or decimal strings; short hex words are left-padded.
///
/// ```json
/// { "0x5FbDB2315678afecb367f032d93F642f64180aa3": { "0x3608...bbc": "0x...e7f1" } }
/// ```
///
/// The `block` argument of [`StorageReader::read_slot`] is ignored. Slots that
/// were not captured read as zero.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStorage {
    accounts: BTreeMap<Address, BTreeMap<B256, B256>>,
}

impl SnapshotStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: Address, slot: B256, value: B256) {
        self.accounts.entry(address).or_default().insert(slot, value);
    }

    pub fn with_slot(mut self, address: Address, slot: B256, value: B256) -> Self {
        self.insert(address, slot, value);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let parsed: BTreeMap<String, BTreeMap<String, String>> =
            serde_json::from_str(raw).context("Failed to parse storage snapshot JSON")?;
        let mut storage = Self::new();
        for (account, slots) in parsed {
            let address = Address::from_str(account.trim())
                .map_err(|e| anyhow!("Invalid account address {account:?} in snapshot: {e}"))?;
            for (slot, value) in slots {
                let slot = parse_word(&slot)
                    .with_context(|| format!("Invalid slot key for account {account}"))?;
                let value = parse_word(&value)
                    .with_context(|| format!("Invalid storage value for account {account}"))?;
                storage.insert(address, slot, value);
            }
        }
        Ok(storage)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read storage snapshot: {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("Failed to load storage snapshot: {}", path.display()))
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl StorageReader for SnapshotStorage {
    fn read_slot(
        &self,
        address: Address,
        slot: B256,
        _block: Option<u64>,
    ) -> Result<B256, StorageError> {
        let account = self.accounts.get(&address).ok_or(StorageError::UnknownAccount(address))?;
        Ok(account.get(&slot).copied().unwrap_or(B256::ZERO))
    }
}

fn parse_word(raw: &str) -> Result<B256> {
    let value = U256::from_str(raw.trim()).map_err(|e| anyhow!("{raw:?}: {e}"))?;
    Ok(B256::from(value.to_be_bytes::<32>()))
}

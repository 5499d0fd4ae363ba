//! Proxy implementation-slot discovery.
//!
//! The resolver walks an ordered chain of probes and stops at the first one that
//! reports a usable slot:
//! 1. the slot reported by the diff oracle,
//! 2. the EIP-1967 implementation slot,
//! 3. the legacy ZeppelinOS implementation slot,
//! 4. state variables whose name suggests an implementation pointer.
//!
//! Storage access goes through [`StorageReader`]. Read failures never abort a
//! run; they make the probe inconclusive and the chain moves on.

mod probes;
mod snapshot;

use alloy_primitives::{b256, Address, B256, U256};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{ContractDescriptor, SlotInfo};

pub use probes::{Eip1967Probe, NamedVariableProbe, OracleSlotProbe, ZeppelinOsProbe};
pub use snapshot::SnapshotStorage;

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// `keccak256("org.zeppelinos.proxy.implementation")`
pub const ZEPPELINOS_IMPLEMENTATION_SLOT: B256 =
    b256!("7050c9e0f4ca769c69bd3a8ef740bc37934f8e2c036e5a723fd8ee048ed3f8c3");

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no storage recorded for account {0}")]
    UnknownAccount(Address),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Read access to contract storage at an optional block height.
pub trait StorageReader {
    fn read_slot(
        &self,
        address: Address,
        slot: B256,
        block: Option<u64>,
    ) -> Result<B256, StorageError>;
}

/// Which probe produced a resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeSource {
    Oracle,
    Eip1967,
    ZeppelinOs,
    NamedVariable(String),
}

impl std::fmt::Display for ProbeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeSource::Oracle => f.write_str("oracle"),
            ProbeSource::Eip1967 => f.write_str("eip1967"),
            ProbeSource::ZeppelinOs => f.write_str("zeppelinos"),
            ProbeSource::NamedVariable(name) => write!(f, "variable {name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotResolution {
    pub slot: SlotInfo,
    pub source: ProbeSource,
    /// Implementation address read from storage, when a read took place.
    pub implementation: Option<Address>,
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found(SlotResolution),
    Inconclusive(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("implementation slot not found for proxy {proxy}")]
    NotFound { proxy: String, attempts: Vec<String> },
}

/// Everything a probe may look at.
pub struct ProbeContext<'a> {
    pub proxy: &'a ContractDescriptor,
    pub reader: Option<&'a dyn StorageReader>,
    pub block: Option<u64>,
}

impl ProbeContext<'_> {
    /// Read a slot of the proxy, if both a reader and the proxy address are known.
    pub fn read(&self, slot: B256) -> Result<B256, String> {
        let reader = self.reader.ok_or_else(|| "no storage reader available".to_string())?;
        let address =
            self.proxy.address().ok_or_else(|| "proxy address is not known".to_string())?;
        reader.read_slot(address, slot, self.block).map_err(|e| e.to_string())
    }

    pub fn can_read(&self) -> bool {
        self.reader.is_some() && self.proxy.address().is_some()
    }
}

pub trait SlotProbe {
    fn name(&self) -> &'static str;
    fn probe(&self, ctx: &ProbeContext<'_>) -> ProbeOutcome;
}

/// Ordered probe chain.
pub struct SlotResolver {
    probes: Vec<Box<dyn SlotProbe>>,
}

impl Default for SlotResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotResolver {
    /// The standard chain: oracle, EIP-1967, ZeppelinOS, named variables.
    pub fn new() -> Self {
        Self {
            probes: vec![
                Box::new(OracleSlotProbe),
                Box::new(Eip1967Probe),
                Box::new(ZeppelinOsProbe),
                Box::new(NamedVariableProbe),
            ],
        }
    }

    pub fn with_probes(probes: Vec<Box<dyn SlotProbe>>) -> Self {
        Self { probes }
    }

    pub fn probe_names(&self) -> Vec<&'static str> {
        self.probes.iter().map(|p| p.name()).collect()
    }

    /// Resolve the implementation slot of `proxy`.
    ///
    /// The outcome (success or failure) is memoized on the descriptor; later
    /// calls return it without running any probe.
    pub fn resolve(
        &self,
        proxy: &ContractDescriptor,
        reader: Option<&dyn StorageReader>,
        block: Option<u64>,
    ) -> Result<SlotResolution, SlotError> {
        proxy.resolution_cell().get_or_init(|| self.run_chain(proxy, reader, block)).clone()
    }

    fn run_chain(
        &self,
        proxy: &ContractDescriptor,
        reader: Option<&dyn StorageReader>,
        block: Option<u64>,
    ) -> Result<SlotResolution, SlotError> {
        let ctx = ProbeContext { proxy, reader, block };
        let mut attempts = Vec::with_capacity(self.probes.len());
        for probe in &self.probes {
            match probe.probe(&ctx) {
                ProbeOutcome::Found(resolution) => {
                    info!(
                        proxy = proxy.name(),
                        probe = probe.name(),
                        slot = %resolution.slot.slot_literal(),
                        "resolved implementation slot"
                    );
                    return Ok(resolution);
                }
                ProbeOutcome::Inconclusive(reason) => {
                    debug!(
                        proxy = proxy.name(),
                        probe = probe.name(),
                        %reason,
                        "probe inconclusive"
                    );
                    attempts.push(format!("{}: {}", probe.name(), reason));
                }
            }
        }
        Err(SlotError::NotFound { proxy: proxy.name().to_string(), attempts })
    }
}

/// Extract an address stored at `offset` bytes (from the low-order end) of a
/// storage word, `size_bits` wide.
///
/// Returns `None` when the extracted value has bits set above the low 160 bits
/// or is zero.
pub fn decode_address(word: B256, offset: u8, size_bits: u16) -> Option<Address> {
    let shift = usize::from(offset) * 8;
    if shift >= 256 {
        return None;
    }
    let mut value = U256::from_be_bytes(word.0) >> shift;
    if size_bits < 256 {
        let mask = (U256::from(1u8) << usize::from(size_bits)) - U256::from(1u8);
        value &= mask;
    }
    if value.is_zero() || !(value >> 160usize).is_zero() {
        return None;
    }
    Some(Address::from_word(B256::from(value.to_be_bytes::<32>())))
}

pub fn slot_word(slot: U256) -> B256 {
    B256::from(slot.to_be_bytes::<32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_address_requires_zero_upper_bytes() {
        let mut word = [0u8; 32];
        word[31] = 0x01;
        assert!(decode_address(B256::from(word), 0, 256).is_some());
        word[0] = 0xff;
        assert!(decode_address(B256::from(word), 0, 256).is_none());
    }

    #[test]
    fn decode_address_handles_packed_offset() {
        let mut word = [0u8; 32];
        // bool at offset 0, address at offset 1
        word[31] = 0x01;
        word[30] = 0xaa;
        let addr = decode_address(B256::from(word), 1, 160).expect("address");
        assert_eq!(addr.0[19], 0xaa);
    }

    #[test]
    fn decode_address_rejects_zero() {
        assert!(decode_address(B256::ZERO, 0, 160).is_none());
    }
}

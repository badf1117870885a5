//! Versioned, CRC-checked persistent configuration record.
//!
//! Ground truth: `firmware/src/common/Config.c`. The compiled-in default
//! (`nvm_config` in the original) carries a correct CRC; `load` rejects
//! anything whose CRC doesn't match, leaving the active record untouched;
//! `save` recomputes the CRC and writes the whole record.
//!
//! This crate implements the "with role byte" schema variant (spec.md §9
//! Open Questions): the hub needs a role tag to tell its own provisioning
//! apart from a node's in a shared NV layout, so both device classes use
//! the same schema rather than maintaining two.

use crate::crc16::crc16;

/// Schema version this build understands. `load` refuses any other
/// version outright, even before checking the CRC.
pub const SCHEMA_VERSION: u16 = 2;

/// Device role, stored so a single schema serves both device classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum Role {
    Node = 0,
    Hub = 1,
}

impl Role {
    fn from_u8(v: u8) -> Option<Role> {
        match v {
            0 => Some(Role::Node),
            1 => Some(Role::Hub),
            _ => None,
        }
    }
}

/// The configuration record as it sits in RAM. Byte layout for NV
/// persistence is handled by [`ConfigRecord::to_bytes`] /
/// [`ConfigRecord::from_bytes`], laid out exactly as spec.md §6 item 1
/// describes: `version(2) + network_id(6) + report_interval(4) +
/// aes_key(17) + node_id(1) + role(1) + crc(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRecord {
    version: u16,
    network_id: [u8; 6],
    report_interval_s: u32,
    aes_key: [u8; 17],
    address: u8,
    role: Role,
    crc: u16,
}

pub const RECORD_SIZE: usize = 2 + 6 + 4 + 17 + 1 + 1 + 2;
const CRC_OFFSET: usize = RECORD_SIZE - 2;

/// Factory-provisioned default, matching the original's compiled-in
/// `nvm_config`: network id `AA BB CC DD EE FF`, 60 s report interval,
/// placeholder AES key, carrying a correct CRC so a blank device boots
/// with a valid configuration.
impl ConfigRecord {
    pub fn default_node() -> Self {
        Self::new_with_crc(
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            60,
            *b"1DUMMYKEYFOOBAR1\0",
            0x80,
            Role::Node,
        )
    }

    pub fn default_hub() -> Self {
        Self::new_with_crc(
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            60,
            *b"1DUMMYKEYFOOBAR1\0",
            0xAA,
            Role::Hub,
        )
    }

    fn new_with_crc(
        network_id: [u8; 6],
        report_interval_s: u32,
        aes_key: [u8; 17],
        address: u8,
        role: Role,
    ) -> Self {
        let mut record = ConfigRecord {
            version: SCHEMA_VERSION,
            network_id,
            report_interval_s,
            aes_key,
            address,
            role,
            crc: 0,
        };
        record.update_crc();
        record
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn network_id(&self) -> [u8; 6] {
        self.network_id
    }

    pub fn aes_key(&self) -> &[u8; 17] {
        &self.aes_key
    }

    pub fn report_interval_s(&self) -> u32 {
        self.report_interval_s
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_network_id(&mut self, network_id: [u8; 6]) {
        self.network_id = network_id;
    }

    pub fn set_aes_key(&mut self, aes_key: [u8; 17]) {
        self.aes_key = aes_key;
    }

    /// Sets the report interval. Panics if `seconds == 0`: the interval
    /// must be positive by invariant (spec.md §3), and a zero value can
    /// only reach here as a programming error, not operator input.
    pub fn set_report_interval_s(&mut self, seconds: u32) {
        assert!(seconds > 0, "report interval must be greater than zero");
        self.report_interval_s = seconds;
    }

    fn is_structurally_valid(&self) -> bool {
        self.version == SCHEMA_VERSION && self.address != 0 && self.report_interval_s > 0
    }

    fn update_crc(&mut self) {
        let bytes = self.to_bytes();
        self.crc = crc16(&bytes[..CRC_OFFSET]);
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let mut i = 0;
        out[i..i + 2].copy_from_slice(&self.version.to_le_bytes());
        i += 2;
        out[i..i + 6].copy_from_slice(&self.network_id);
        i += 6;
        out[i..i + 4].copy_from_slice(&self.report_interval_s.to_le_bytes());
        i += 4;
        out[i..i + 17].copy_from_slice(&self.aes_key);
        i += 17;
        out[i] = self.address;
        i += 1;
        out[i] = self.role as u8;
        i += 1;
        out[i..i + 2].copy_from_slice(&self.crc.to_le_bytes());
        out
    }

    /// Parses a raw record without validating it — callers go through
    /// [`ConfigStore::load`] for the accept/reject decision.
    fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Option<ConfigRecord> {
        let mut i = 0;
        let version = u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        i += 2;
        let mut network_id = [0u8; 6];
        network_id.copy_from_slice(&bytes[i..i + 6]);
        i += 6;
        let report_interval_s = u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
        i += 4;
        let mut aes_key = [0u8; 17];
        aes_key.copy_from_slice(&bytes[i..i + 17]);
        i += 17;
        let address = bytes[i];
        i += 1;
        let role = Role::from_u8(bytes[i])?;
        i += 1;
        let crc = u16::from_le_bytes([bytes[i], bytes[i + 1]]);

        Some(ConfigRecord {
            version,
            network_id,
            report_interval_s,
            aes_key,
            address,
            role,
            crc,
        })
    }

    fn crc_is_valid(&self) -> bool {
        let bytes = self.to_bytes();
        self.crc == crc16(&bytes[..CRC_OFFSET])
    }
}

/// Non-volatile backing store for the single configuration record.
pub trait ConfigStorage {
    fn read(&self) -> [u8; RECORD_SIZE];
    fn write(&mut self, bytes: &[u8; RECORD_SIZE]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ConfigError {
    /// Raw bytes didn't even decode into a known role; never written, or
    /// written by a build with a different role encoding.
    Malformed,
    /// Decoded, but failed the CRC, schema version, address-nonzero, or
    /// interval-positive invariant.
    Invalid,
}

/// Owns the active, validated configuration and the NV storage it's
/// persisted to.
pub struct ConfigStore<S: ConfigStorage> {
    storage: S,
    active: ConfigRecord,
}

impl<S: ConfigStorage> ConfigStore<S> {
    /// Starts with `default` as the active record (used before the first
    /// successful [`ConfigStore::load`], or if load is never called on a
    /// factory-fresh device).
    pub fn new(storage: S, default: ConfigRecord) -> Self {
        Self {
            storage,
            active: default,
        }
    }

    pub fn active(&self) -> &ConfigRecord {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut ConfigRecord {
        &mut self.active
    }

    /// Reads the full record into a staging area, validates it, and only
    /// on success replaces the active configuration. A rejected load
    /// leaves the active configuration untouched.
    pub fn load(&mut self) -> Result<(), ConfigError> {
        let bytes = self.storage.read();
        let candidate = ConfigRecord::from_bytes(&bytes).ok_or(ConfigError::Malformed)?;
        if !candidate.crc_is_valid() || !candidate.is_structurally_valid() {
            return Err(ConfigError::Invalid);
        }
        self.active = candidate;
        Ok(())
    }

    /// Recomputes the CRC over the active record and writes the whole
    /// record, including the CRC.
    pub fn save(&mut self) {
        self.active.update_crc();
        let bytes = self.active.to_bytes();
        self.storage.write(&bytes);
    }
}

/// In-memory [`ConfigStorage`] for host tests.
pub struct RamStorage {
    bytes: [u8; RECORD_SIZE],
}

impl RamStorage {
    pub fn from_record(record: &ConfigRecord) -> Self {
        Self {
            bytes: record.to_bytes(),
        }
    }

    pub fn blank() -> Self {
        Self {
            bytes: [0u8; RECORD_SIZE],
        }
    }
}

impl ConfigStorage for RamStorage {
    fn read(&self) -> [u8; RECORD_SIZE] {
        self.bytes
    }

    fn write(&mut self, bytes: &[u8; RECORD_SIZE]) {
        self.bytes = *bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_node_config_has_valid_crc() {
        let cfg = ConfigRecord::default_node();
        assert!(cfg.crc_is_valid());
        assert!(cfg.is_structurally_valid());
    }

    #[test]
    fn load_accepts_a_record_with_correct_crc() {
        let record = ConfigRecord::default_node();
        let storage = RamStorage::from_record(&record);
        let mut store = ConfigStore::new(storage, ConfigRecord::default_node());
        assert!(store.load().is_ok());
        assert_eq!(store.active().network_id(), record.network_id());
    }

    #[test]
    fn single_bit_flip_in_non_crc_byte_is_rejected() {
        let record = ConfigRecord::default_node();
        let mut bytes = record.to_bytes();
        bytes[6] ^= 0x01; // inside report_interval
        let storage = RamStorage { bytes };
        let mut store = ConfigStore::new(storage, ConfigRecord::default_node());
        assert!(store.load().is_err());
    }

    #[test]
    fn rejected_load_leaves_active_config_unchanged() {
        let good_default = ConfigRecord::default_node();
        let mut corrupt = ConfigRecord::default_hub();
        // Corrupt the CRC directly so it fails validation.
        let mut bytes = corrupt.to_bytes();
        bytes[RECORD_SIZE - 1] ^= 0xFF;
        corrupt = ConfigRecord::from_bytes(&bytes).unwrap();
        let storage = RamStorage { bytes: corrupt.to_bytes() };

        let mut store = ConfigStore::new(storage, good_default);
        let before = *store.active();
        assert!(store.load().is_err());
        assert_eq!(*store.active(), before);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let mut record = ConfigRecord::default_node();
        record.version = SCHEMA_VERSION + 1;
        record.update_crc();
        let storage = RamStorage::from_record(&record);
        let mut store = ConfigStore::new(storage, ConfigRecord::default_node());
        assert!(store.load().is_err());
    }

    #[test]
    fn rejects_zero_address() {
        let mut record = ConfigRecord::default_node();
        record.address = 0;
        record.update_crc();
        let storage = RamStorage::from_record(&record);
        let mut store = ConfigStore::new(storage, ConfigRecord::default_node());
        assert!(store.load().is_err());
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut store = ConfigStore::new(RamStorage::blank(), ConfigRecord::default_node());
        store.active_mut().set_report_interval_s(120);
        store.save();
        store.active_mut().set_report_interval_s(5); // clobber RAM copy
        assert!(store.load().is_ok());
        assert_eq!(store.active().report_interval_s(), 120);
    }

    #[test]
    #[should_panic(expected = "report interval must be greater than zero")]
    fn set_report_interval_rejects_zero() {
        let mut record = ConfigRecord::default_node();
        record.set_report_interval_s(0);
    }
}

//! TSW API request and response models.
//!
//! Field names follow the API's camelCase JSON. Enumerations carry an
//! `Unknown` variant so new server-side values do not break decoding.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Decode JSON `null` as the type's default. The API sends `null` for empty
/// strings, lists, maps and nested objects.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Catalog types
// ============================================================================

/// A datacenter region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Region {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// An installable operating system image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Image {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub display_name: String,
    #[serde(deserialize_with = "null_default")]
    pub operating_system_name: String,
    #[serde(deserialize_with = "null_default")]
    pub operating_system_version: String,
    /// Image does not support custom partitioning.
    pub disable_customizable_storage: bool,
}

// ============================================================================
// SSH keys
// ============================================================================

/// An SSH public key registered with a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SshKey {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub created: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
    /// Always `"KEY"`.
    #[serde(deserialize_with = "null_default")]
    pub object_type: String,
    pub project_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub display_name: String,
    /// Public key content.
    #[serde(deserialize_with = "null_default")]
    pub key: String,
}

/// Request body for creating an SSH key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSshKeyRequest {
    pub display_name: String,
    pub project_id: i64,
    pub key: String,
}

// ============================================================================
// Metal services
// ============================================================================

/// Lifecycle status of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Active,
    Suspended,
    Terminated,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Terminated => "Terminated",
            Self::Error => "Error",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Power state of a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerState {
    Off,
    On,
    Rebooting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "Off"),
            Self::On => write!(f, "On"),
            Self::Rebooting => write!(f, "Rebooting"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A bare metal service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Metal {
    pub id: i64,
    #[serde(deserialize_with = "null_default")]
    pub created: String,
    pub deleted: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub object_type: String,
    pub project_id: i64,
    #[serde(deserialize_with = "null_default")]
    pub display_name: String,

    #[serde(deserialize_with = "null_default")]
    pub region_id: String,
    pub status: Status,
    pub power_state: PowerState,

    #[serde(deserialize_with = "null_default")]
    pub tier_id: String,
    pub memory_gb: i32,
    #[serde(deserialize_with = "null_default")]
    pub image_id: String,
    /// Installed drives keyed by slot (e.g. `nvme0n1`).
    #[serde(deserialize_with = "null_default")]
    pub storage_devices: BTreeMap<String, MetalStorageDevice>,

    #[serde(deserialize_with = "null_default")]
    pub ip_addresses: Vec<IpAddr>,

    pub monthly_price: f64,
    pub hourly_price: f64,

    #[serde(deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub events: Vec<ProvisioningEvent>,
}

/// An event recorded while a service is provisioned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningEvent {
    pub priority: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub state: EventState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventState {
    Pending,
    InProgress,
    Complete,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Request body for creating a metal service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMetalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub display_name: String,
    pub region_id: String,
    pub tier_id: String,
    pub memory_gb: i32,
    pub image_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub ssh_key_ids: Vec<i64>,
    /// Drive choice per slot, e.g. `nvme0n1 -> 960g`.
    #[serde(default)]
    pub disks: BTreeMap<String, String>,
    #[serde(default)]
    pub ipxe_url: Option<String>,
    #[serde(default)]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub reserve_pricing: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raid_arrays: Vec<RaidArray>,
}

/// Request body for reinstalling a metal service. Unset fields keep their
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReinstallMetalRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ssh_key_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipxe_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partitions: Vec<Partition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub raid_arrays: Vec<RaidArray>,
}

/// Request body for renaming a metal service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameMetalRequest {
    pub name: String,
}

/// Empty `result` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Power command accepted by `PowerCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerCommand {
    PowerOn,
    PowerOff,
}

impl PowerCommand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PowerOn => "PowerOn",
            Self::PowerOff => "PowerOff",
        }
    }
}

impl fmt::Display for PowerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log line for a metal service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogMessage {
    #[serde(deserialize_with = "null_default")]
    pub timestamp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub message: String,
}

// ============================================================================
// Storage layout
// ============================================================================

/// A partition on a drive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    pub name: String,
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system: Option<FileSystem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_point: Option<String>,
}

/// A software RAID array built from partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaidArray {
    pub name: String,
    #[serde(rename = "type")]
    pub raid_type: RaidType,
    /// Partition names.
    pub members: Vec<String>,
    #[serde(rename = "filesystem")]
    pub file_system: FileSystem,
    pub mount_point: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RaidType {
    None,
    Raid0,
    Raid1,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileSystem {
    Btrfs,
    Ext2,
    Ext4,
    Fat32,
    Ramfs,
    Swap,
    Tmpfs,
    Unformatted,
    Vfat,
    Xfs,
    Zfsroot,
    #[default]
    #[serde(other)]
    Unknown,
}

// ============================================================================
// Tiers and availability
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetalTierType {
    Compute,
    #[serde(rename = "GPU")]
    Gpu,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MetalTierType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "Compute",
            Self::Gpu => "GPU",
            Self::Unknown => "Unknown",
        }
    }
}

/// A hardware configuration tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetalTier {
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    /// CPU model.
    #[serde(deserialize_with = "null_default")]
    pub cpu: String,
    /// Cores/threads description.
    #[serde(deserialize_with = "null_default")]
    pub cpu_description: String,
    #[serde(deserialize_with = "null_default")]
    pub external_identifier: String,
    pub hidden: bool,
    /// Availability per region.
    #[serde(deserialize_with = "null_default")]
    pub availability: BTreeMap<String, Option<ServiceAvailability>>,
    #[serde(deserialize_with = "null_default")]
    pub memory_options: Vec<MemoryOption>,
    #[serde(deserialize_with = "null_default")]
    pub drive_slots: Vec<DriveSlot>,
    #[serde(deserialize_with = "null_default")]
    pub network_options: Vec<NetworkOption>,
    pub monthly_price: f64,
    pub hourly_price: f64,
    pub memory_option_set_id: i32,
    pub drive_slot_set_id: i32,
    pub network_option_set_id: i32,
    pub tier_type: MetalTierType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceAvailability {
    pub max_quantity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryOption {
    pub gb: i32,
    pub monthly_price: f64,
    pub hourly_price: f64,
    pub default: bool,
}

/// A drive slot and the drives it accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveSlot {
    /// Slot identifier such as `nvme0n1`.
    #[serde(deserialize_with = "null_default")]
    pub id: String,
    #[serde(deserialize_with = "null_default")]
    pub default: String,
    pub required: bool,
    #[serde(deserialize_with = "null_default")]
    pub options: Vec<MetalStorageDevice>,
}

/// A drive that can be installed in a slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetalStorageDevice {
    /// Drive name, e.g. `1.92t` or `960g`.
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    pub default: bool,
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub capacity_gb: i32,
    #[serde(deserialize_with = "null_default")]
    pub details: DriveDetails,
    pub monthly_price: f64,
    pub hourly_price: f64,
    pub is_boss_drive: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveDetails {
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub device_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    #[serde(deserialize_with = "null_default")]
    pub serial: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    #[serde(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    Ssd,
    #[serde(rename = "NVME")]
    Nvme,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkOption {
    pub speed_gbps: i32,
    pub monthly_price: f64,
    pub hourly_price: f64,
    pub default: bool,
    pub is_bonded: bool,
}

/// A configuration that can be ordered in a region right now.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetalConfiguration {
    /// Drive name per slot.
    #[serde(deserialize_with = "null_default")]
    pub disks: BTreeMap<String, String>,
    pub memory_gb: i32,
    #[serde(deserialize_with = "null_default")]
    pub tier: MetalTier,
    pub quantity: i32,
}

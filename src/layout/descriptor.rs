//! Disk layout types
//!
//! A layout is an ordered list of disks in four contiguous regions:
//! baseline (tags 1-4 and 6-13), dump (tag 5), data (from tag 14) and
//! archive (right after the last data disk).

use super::synthesizer::{DATA_START_TAG, DUMP_TAG};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// =============================================================================
// Tags and Groups
// =============================================================================

/// Sequential disk tag, rendered as `diskN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiskTag(pub u32);

impl DiskTag {
    pub fn number(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for DiskTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "disk{}", self.0)
    }
}

impl FromStr for DiskTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.strip_prefix("disk")
            .and_then(|n| n.parse::<u32>().ok())
            .map(DiskTag)
            .ok_or_else(|| Error::InvalidLayout(format!("bad disk tag '{}'", s)))
    }
}

impl TryFrom<String> for DiskTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DiskTag> for String {
    fn from(tag: DiskTag) -> Self {
        tag.to_string()
    }
}

/// Region a disk belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskGroup {
    Baseline,
    Dump,
    Data,
    Archive,
}

impl DiskGroup {
    /// Baseline and dump disks keep their tags across every resize
    pub fn is_fixed(&self) -> bool {
        matches!(self, DiskGroup::Baseline | DiskGroup::Dump)
    }

    /// Position of the region; baseline and dump share the fixed prefix
    fn rank(&self) -> u8 {
        match self {
            DiskGroup::Baseline | DiskGroup::Dump => 0,
            DiskGroup::Data => 1,
            DiskGroup::Archive => 2,
        }
    }
}

impl FromStr for DiskGroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(DiskGroup::Baseline),
            "dump" => Ok(DiskGroup::Dump),
            "data" => Ok(DiskGroup::Data),
            "archive" | "arch" => Ok(DiskGroup::Archive),
            other => Err(Error::InvalidLayout(format!("unknown disk group '{}'", other))),
        }
    }
}

impl std::fmt::Display for DiskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiskGroup::Baseline => write!(f, "baseline"),
            DiskGroup::Dump => write!(f, "dump"),
            DiskGroup::Data => write!(f, "data"),
            DiskGroup::Archive => write!(f, "archive"),
        }
    }
}

// =============================================================================
// Disk Descriptor
// =============================================================================

/// How the guest consumes a disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backing", rename_all = "lowercase")]
pub enum DiskBacking {
    /// Logical volume on its own volume group
    #[serde(rename_all = "camelCase")]
    Lvm { vg_name: String, lvm_name: String },
    /// Member of an ASM disk group
    #[serde(rename_all = "camelCase")]
    Asm { disk_group: String },
}

impl DiskBacking {
    pub fn lvm(name: &str) -> Self {
        DiskBacking::Lvm {
            vg_name: name.to_string(),
            lvm_name: name.to_string(),
        }
    }

    pub fn asm(disk_group: &str) -> Self {
        DiskBacking::Asm {
            disk_group: disk_group.to_string(),
        }
    }
}

/// One additional disk of a database VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskDescriptor {
    pub tag: DiskTag,
    pub size_gb: u64,
    /// Guest device path, e.g. `/dev/sdf`
    pub device: String,
    pub mount_dir: String,
    pub datastore: String,
    pub group: DiskGroup,
    /// Oracle disk name, e.g. `DATADISK2`
    pub role_name: String,
    #[serde(flatten)]
    pub backing: DiskBacking,
}

// =============================================================================
// Layout Inputs
// =============================================================================

/// Datastores disks are placed on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatastorePlan {
    /// Binaries and part of the control/redo disks
    pub primary: String,
    /// Remaining baseline disks, dump and archive
    pub secondary: String,
    /// Data disks
    pub bulk: String,
}

impl Default for DatastorePlan {
    fn default() -> Self {
        Self {
            primary: "Datastore1".to_string(),
            secondary: "Datastore2".to_string(),
            bulk: "Datastore3".to_string(),
        }
    }
}

impl DatastorePlan {
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("primary", &self.primary),
            ("secondary", &self.secondary),
            ("bulk", &self.bulk),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Configuration(format!("datastore plan: {} is empty", field)));
            }
        }
        Ok(())
    }
}

/// Requested aggregate sizes in GB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutSizes {
    pub dump_gb: u64,
    pub data_gb: u64,
    pub archive_gb: u64,
}

impl Default for LayoutSizes {
    fn default() -> Self {
        Self {
            dump_gb: 100,
            data_gb: 500,
            archive_gb: 500,
        }
    }
}

// =============================================================================
// Disk Layout
// =============================================================================

/// Ordered disks of a database VM plus the inputs they were built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskLayout {
    pub sizes: LayoutSizes,
    pub datastores: DatastorePlan,
    pub disks: Vec<DiskDescriptor>,
}

impl DiskLayout {
    pub fn disks(&self) -> &[DiskDescriptor] {
        &self.disks
    }

    pub fn len(&self) -> usize {
        self.disks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disks.is_empty()
    }

    pub fn group(&self, group: DiskGroup) -> impl Iterator<Item = &DiskDescriptor> {
        self.disks.iter().filter(move |d| d.group == group)
    }

    pub fn count(&self, group: DiskGroup) -> usize {
        self.group(group).count()
    }

    /// Sum of disk sizes in one group
    pub fn group_gb(&self, group: DiskGroup) -> u64 {
        self.group(group).fold(0, |sum, d| sum.saturating_add(d.size_gb))
    }

    pub fn total_gb(&self) -> u64 {
        self.disks.iter().fold(0, |sum, d| sum.saturating_add(d.size_gb))
    }

    /// GB requested from each datastore
    pub fn demand_by_datastore(&self) -> BTreeMap<String, u64> {
        let mut demand = BTreeMap::new();
        for disk in &self.disks {
            let total = demand.entry(disk.datastore.clone()).or_insert(0u64);
            *total = total.saturating_add(disk.size_gb);
        }
        demand
    }

    /// Check tag contiguity, the fixed prefix, region order and region totals
    pub fn validate(&self) -> Result<()> {
        for (i, disk) in self.disks.iter().enumerate() {
            let expected = i as u32 + 1;
            if disk.tag.number() != expected {
                return Err(Error::InvalidLayout(format!(
                    "expected disk{} at position {}, found {}",
                    expected, i, disk.tag
                )));
            }
        }

        let fixed_len = (DATA_START_TAG - 1) as usize;
        if self.disks.len() < fixed_len {
            return Err(Error::InvalidLayout(format!(
                "layout has {} disks, the fixed prefix alone needs {}",
                self.disks.len(),
                fixed_len
            )));
        }

        for disk in &self.disks[..fixed_len] {
            let expected = if disk.tag.number() == DUMP_TAG {
                DiskGroup::Dump
            } else {
                DiskGroup::Baseline
            };
            if disk.group != expected {
                return Err(Error::InvalidLayout(format!(
                    "{} must be a {} disk, found {}",
                    disk.tag, expected, disk.group
                )));
            }
        }

        if let Some(disk) = self.disks[fixed_len..].iter().find(|d| d.group.is_fixed()) {
            return Err(Error::InvalidLayout(format!(
                "{} disk {} is past the fixed prefix",
                disk.group, disk.tag
            )));
        }

        if let Some(pair) = self
            .disks
            .windows(2)
            .find(|pair| pair[0].group.rank() > pair[1].group.rank())
        {
            return Err(Error::InvalidLayout(format!(
                "{} disk {} follows {} disk {}",
                pair[1].group, pair[1].tag, pair[0].group, pair[0].tag
            )));
        }

        for (group, expected) in [
            (DiskGroup::Dump, self.sizes.dump_gb),
            (DiskGroup::Data, self.sizes.data_gb),
            (DiskGroup::Archive, self.sizes.archive_gb),
        ] {
            let actual = self.group_gb(group);
            if actual != expected {
                return Err(Error::InvalidLayout(format!(
                    "{} disks hold {} GB but sizes say {} GB",
                    group, actual, expected
                )));
            }
        }
        Ok(())
    }
}

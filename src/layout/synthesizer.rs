//! Disk Layout Synthesizer
//!
//! Pure functions that build a database VM's disk list from three sizes and
//! recompute only the affected regions when one size changes. Data is split
//! into disks of at most 1000 GB, archive into disks of at most 500 GB, and
//! the last disk of each region takes the remainder.

use super::baseline::baseline;
use super::descriptor::{
    DatastorePlan, DiskBacking, DiskDescriptor, DiskGroup, DiskLayout, DiskTag, LayoutSizes,
};
use super::device::device_label;
use crate::error::{Error, Result};
use tracing::debug;

pub const DUMP_TAG: u32 = 5;
pub const DATA_START_TAG: u32 = 14;
pub const DATA_MAX_CHUNK_GB: u64 = 1000;
pub const ARCHIVE_MAX_CHUNK_GB: u64 = 500;
/// Highest tag a layout may reach; one VM takes at most 256 virtual disks
pub const MAX_DISK_TAG: u32 = 256;

/// Regions produced by [`chunk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedGroup {
    Data,
    Archive,
}

impl ChunkedGroup {
    pub fn group(&self) -> DiskGroup {
        match self {
            ChunkedGroup::Data => DiskGroup::Data,
            ChunkedGroup::Archive => DiskGroup::Archive,
        }
    }

    fn disk_group(&self) -> &'static str {
        match self {
            ChunkedGroup::Data => "DATADG",
            ChunkedGroup::Archive => "ARCHDG",
        }
    }

    fn disk_prefix(&self) -> &'static str {
        match self {
            ChunkedGroup::Data => "DATADISK",
            ChunkedGroup::Archive => "ARCHDISK",
        }
    }
}

/// The dump disk at tag 5
pub fn dump(size_gb: u64, datastore: &str) -> DiskDescriptor {
    DiskDescriptor {
        tag: DiskTag(DUMP_TAG),
        size_gb,
        device: device_label(DUMP_TAG),
        mount_dir: "/ORACLE/dump".to_string(),
        datastore: datastore.to_string(),
        group: DiskGroup::Dump,
        role_name: "DUMP".to_string(),
        backing: DiskBacking::lvm("dump"),
    }
}

/// Split `total_gb` into disks of at most `max_chunk_gb`, tagged from `start_tag`.
///
/// A non-positive total or a zero chunk size yields no disks. A split whose
/// last tag would pass [`MAX_DISK_TAG`] is rejected before anything is built.
pub fn chunk(
    total_gb: i64,
    max_chunk_gb: u64,
    start_tag: u32,
    group: ChunkedGroup,
    datastore: &str,
) -> Result<Vec<DiskDescriptor>> {
    if total_gb <= 0 || max_chunk_gb == 0 {
        return Ok(Vec::new());
    }

    let mut remaining = total_gb as u64;
    let count = remaining.div_ceil(max_chunk_gb);
    let last_tag = u64::from(start_tag)
        .checked_add(count - 1)
        .filter(|last| *last <= u64::from(MAX_DISK_TAG));
    if last_tag.is_none() {
        return Err(Error::InvalidLayout(format!(
            "{} GB of {} in disks of {} GB needs {} disks from {}, past disk{}",
            total_gb,
            group.group(),
            max_chunk_gb,
            count,
            DiskTag(start_tag),
            MAX_DISK_TAG
        )));
    }

    let mut disks = Vec::with_capacity(count as usize);
    let mut tag = start_tag;

    while remaining > 0 {
        let size_gb = remaining.min(max_chunk_gb);
        disks.push(DiskDescriptor {
            tag: DiskTag(tag),
            size_gb,
            device: device_label(tag),
            mount_dir: "/data".to_string(),
            datastore: datastore.to_string(),
            group: group.group(),
            role_name: format!("{}{}", group.disk_prefix(), disks.len() + 1),
            backing: DiskBacking::asm(group.disk_group()),
        });
        remaining -= size_gb;
        tag += 1;
    }

    Ok(disks)
}

/// Clamp a GB count into the signed range [`chunk`] takes
fn signed_gb(gb: u64) -> i64 {
    i64::try_from(gb).unwrap_or(i64::MAX)
}

fn data_region(data_gb: u64, plan: &DatastorePlan) -> Result<Vec<DiskDescriptor>> {
    chunk(
        signed_gb(data_gb),
        DATA_MAX_CHUNK_GB,
        DATA_START_TAG,
        ChunkedGroup::Data,
        &plan.bulk,
    )
}

fn archive_region(
    archive_gb: u64,
    data_count: usize,
    plan: &DatastorePlan,
) -> Result<Vec<DiskDescriptor>> {
    let start_tag = u32::try_from(data_count)
        .ok()
        .and_then(|count| DATA_START_TAG.checked_add(count))
        .ok_or_else(|| Error::InvalidLayout(format!("{} data disks is too many", data_count)))?;
    chunk(
        signed_gb(archive_gb),
        ARCHIVE_MAX_CHUNK_GB,
        start_tag,
        ChunkedGroup::Archive,
        &plan.secondary,
    )
}

/// Build a full layout on the default datastore plan.
///
/// Negative data or archive sizes produce empty regions.
pub fn compose(dump_gb: u64, data_gb: i64, archive_gb: i64) -> Result<DiskLayout> {
    let sizes = LayoutSizes {
        dump_gb,
        data_gb: data_gb.max(0) as u64,
        archive_gb: archive_gb.max(0) as u64,
    };
    compose_with(&sizes, &DatastorePlan::default())
}

/// Build a full layout from explicit sizes and datastores
pub fn compose_with(sizes: &LayoutSizes, plan: &DatastorePlan) -> Result<DiskLayout> {
    let data = data_region(sizes.data_gb, plan)?;
    let archive = archive_region(sizes.archive_gb, data.len(), plan)?;

    let mut disks = baseline(plan);
    let dump_position = disks
        .iter()
        .position(|d| d.tag.number() > DUMP_TAG)
        .unwrap_or(disks.len());
    disks.insert(dump_position, dump(sizes.dump_gb, &plan.secondary));
    disks.extend(data);
    disks.extend(archive);

    debug!(
        "Composed layout: {} disks, {} GB total",
        disks.len(),
        disks.iter().map(|d| d.size_gb).sum::<u64>()
    );

    Ok(DiskLayout {
        sizes: *sizes,
        datastores: plan.clone(),
        disks,
    })
}

/// Recompute one region of a layout.
///
/// Changing dump only touches tag 5. Changing data regenerates data and
/// archive, since archive tags follow the last data tag. Changing archive
/// regenerates archive only. All other disks are carried over unchanged.
pub fn resize(layout: &DiskLayout, group: DiskGroup, new_size_gb: i64) -> Result<DiskLayout> {
    layout.validate()?;

    let mut next = layout.clone();
    match group {
        DiskGroup::Baseline => {
            return Err(Error::InvalidLayout("baseline disks have fixed sizes".into()));
        }
        DiskGroup::Dump => {
            if new_size_gb < 0 {
                return Err(Error::InvalidLayout(format!(
                    "dump size must not be negative, got {}",
                    new_size_gb
                )));
            }
            let size = new_size_gb as u64;
            for disk in next.disks.iter_mut().filter(|d| d.group == DiskGroup::Dump) {
                disk.size_gb = size;
            }
            next.sizes.dump_gb = size;
        }
        DiskGroup::Data => {
            let size = new_size_gb.max(0) as u64;
            let data = data_region(size, &layout.datastores)?;
            let archive = archive_region(layout.sizes.archive_gb, data.len(), &layout.datastores)?;
            next.disks.retain(|d| d.group.is_fixed());
            next.disks.extend(data);
            next.disks.extend(archive);
            next.sizes.data_gb = size;
        }
        DiskGroup::Archive => {
            let size = new_size_gb.max(0) as u64;
            let archive = archive_region(size, layout.count(DiskGroup::Data), &layout.datastores)?;
            next.disks.retain(|d| d.group != DiskGroup::Archive);
            next.disks.extend(archive);
            next.sizes.archive_gb = size;
        }
    }

    debug!(
        "Resized {} to {} GB: {} -> {} disks",
        group,
        new_size_gb,
        layout.len(),
        next.len()
    );
    Ok(next)
}

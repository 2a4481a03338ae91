//! Fixed baseline disks of a database VM

use super::descriptor::{DatastorePlan, DiskBacking, DiskDescriptor, DiskGroup, DiskTag};
use super::device::device_label;

#[derive(Clone, Copy)]
enum Placement {
    Primary,
    Secondary,
}

#[derive(Clone, Copy)]
enum Backing {
    Lvm(&'static str),
    Asm(&'static str),
}

struct BaselineDisk {
    tag: u32,
    size_gb: u64,
    mount_dir: &'static str,
    placement: Placement,
    role_name: &'static str,
    backing: Backing,
}

const BASELINE: [BaselineDisk; 12] = [
    BaselineDisk { tag: 1, size_gb: 100, mount_dir: "/ORACLE/19.0.0.0", placement: Placement::Secondary, role_name: "ORACLE", backing: Backing::Lvm("odata") },
    BaselineDisk { tag: 2, size_gb: 150, mount_dir: "/ORACLE/19.0.0.0/product", placement: Placement::Secondary, role_name: "ORACLE_PRODUCT", backing: Backing::Lvm("oproduct") },
    BaselineDisk { tag: 3, size_gb: 100, mount_dir: "/grid_home/19.0.0.0", placement: Placement::Secondary, role_name: "GRID_DATA", backing: Backing::Lvm("gdata") },
    BaselineDisk { tag: 4, size_gb: 150, mount_dir: "/grid_home/19.0.0.0/product", placement: Placement::Primary, role_name: "GRID_DATA_PRODUCT", backing: Backing::Lvm("gproduct") },
    BaselineDisk { tag: 6, size_gb: 50, mount_dir: "/application/oem", placement: Placement::Primary, role_name: "OEM", backing: Backing::Lvm("oem") },
    BaselineDisk { tag: 7, size_gb: 100, mount_dir: "/BinariesBackup", placement: Placement::Primary, role_name: "BinariesBackup", backing: Backing::Lvm("binaries") },
    BaselineDisk { tag: 8, size_gb: 5, mount_dir: "/data", placement: Placement::Primary, role_name: "CONTDISK1", backing: Backing::Asm("CONTDG1") },
    BaselineDisk { tag: 9, size_gb: 5, mount_dir: "/data", placement: Placement::Primary, role_name: "CONTDISK2", backing: Backing::Asm("CONTDG2") },
    BaselineDisk { tag: 10, size_gb: 5, mount_dir: "/data", placement: Placement::Secondary, role_name: "CONTDISK3", backing: Backing::Asm("CONTDG3") },
    BaselineDisk { tag: 11, size_gb: 30, mount_dir: "/data", placement: Placement::Secondary, role_name: "REDODISK1", backing: Backing::Asm("REDODG1") },
    BaselineDisk { tag: 12, size_gb: 30, mount_dir: "/data", placement: Placement::Secondary, role_name: "REDODISK2", backing: Backing::Asm("REDODG2") },
    BaselineDisk { tag: 13, size_gb: 30, mount_dir: "/data", placement: Placement::Secondary, role_name: "REDODISK3", backing: Backing::Asm("REDODG3") },
];

/// The 12 baseline disks in tag order, without the dump disk at tag 5
pub fn baseline(plan: &DatastorePlan) -> Vec<DiskDescriptor> {
    BASELINE
        .iter()
        .map(|disk| DiskDescriptor {
            tag: DiskTag(disk.tag),
            size_gb: disk.size_gb,
            device: device_label(disk.tag),
            mount_dir: disk.mount_dir.to_string(),
            datastore: match disk.placement {
                Placement::Primary => plan.primary.clone(),
                Placement::Secondary => plan.secondary.clone(),
            },
            group: DiskGroup::Baseline,
            role_name: disk.role_name.to_string(),
            backing: match disk.backing {
                Backing::Lvm(name) => DiskBacking::lvm(name),
                Backing::Asm(group) => DiskBacking::asm(group),
            },
        })
        .collect()
}

//! Guest device labels
//!
//! SCSI disks appear as `/dev/sda`, `/dev/sdb`, ... `/dev/sdz`, then
//! `/dev/sdaa`. The suffix is a bijective base-26 number, so every index has
//! exactly one label and the sequence never repeats.

const DEVICE_PREFIX: &str = "/dev/sd";

/// Letter suffix for a zero-based index: 0 → `a`, 25 → `z`, 26 → `aa`
pub fn device_suffix(index: u32) -> String {
    let mut n = u64::from(index) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    letters.into_iter().map(char::from).collect()
}

/// Device path for the disk at `index`. Index 0 is the root disk, so the
/// first additional disk (tag 1) is `/dev/sdb`.
pub fn device_label(index: u32) -> String {
    format!("{}{}", DEVICE_PREFIX, device_suffix(index))
}

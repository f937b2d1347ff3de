use super::percent;
use std::{collections::HashSet, path::Path};
use sysinfo::Disks;

pub struct DiskCollector {
    disks: Disks,
}

impl DiskCollector {
    pub fn new() -> Self {
        let disks = Disks::new_with_refreshed_list();

        Self { disks }
    }

    /// Used space across all mounted filesystems
    pub fn collect(&mut self) -> Option<f32> {
        self.disks.refresh_list();

        used_percent(
            self.disks
                .iter()
                .map(|disk| (disk.mount_point(), disk.total_space(), disk.available_space())),
        )
    }
}

/// Used share of `(mount point, total, available)` entries, each mount
/// counted once. Device names are not unique (`overlay`, `tmpfs`).
fn used_percent<'a>(mounts: impl IntoIterator<Item = (&'a Path, u64, u64)>) -> Option<f32> {
    let mut seen = HashSet::new();
    let mut total_space = 0u64;
    let mut available_space = 0u64;

    for (mount_point, total, available) in mounts {
        if !seen.insert(mount_point) {
            continue;
        }
        total_space = total_space.saturating_add(total);
        available_space = available_space.saturating_add(available);
    }

    percent(total_space.saturating_sub(available_space), total_space)
}

//! Local block device enumeration from `/proc/partitions`.

use std::collections::BTreeMap;

use crate::DRIVER_NAME;
use crate::volume::LocalDevices;

/// Kernel partition table read by default.
pub const PROC_PARTITIONS: &str = "/proc/partitions";

const HEADER_LINES: usize = 2;

/// Parses the `/proc/partitions` table into device paths.
///
/// The first two lines (column header and blank separator) are skipped.
/// Every remaining line with at least four whitespace-separated fields
/// yields `/dev/<fourth field>`; shorter lines are ignored.
#[must_use]
pub fn parse_partitions(content: &str) -> LocalDevices {
    let device_map: BTreeMap<String, String> = content
        .lines()
        .skip(HEADER_LINES)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(|name| (format!("/dev/{name}"), String::new()))
        .collect();

    LocalDevices {
        driver: DRIVER_NAME.to_owned(),
        device_map,
    }
}

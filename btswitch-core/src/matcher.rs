/*!
 * Name matching
 */

use crate::device::Device;

/// Devices whose name equals (`exact`) or starts with `query`, in input order.
///
/// Matching is case-sensitive. A blank query matches nothing so callers fall
/// back to the "no name given" path instead of silently selecting everything.
pub fn find_by_name(devices: &[Device], query: &str, exact: bool) -> Vec<Device> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    devices
        .iter()
        .filter(|d| {
            if exact {
                d.name == query
            } else {
                d.name.starts_with(query)
            }
        })
        .cloned()
        .collect()
}

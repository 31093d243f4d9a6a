//! Tracking codes chaining every ballot to the previous one of its device.

use crate::group::ElementModQ;

/// The starting point of a device's chain.
pub fn get_hash_for_device(device_id: u64, session_id: u64, launch_code: u64, location: &str) -> ElementModQ {
    hash_elems!(device_id, session_id, launch_code, location)
}

/// The code of a ballot encrypted at `timestamp`, following `previous_code`.
pub fn get_ballot_code(previous_code: &ElementModQ, timestamp: u64, ballot_hash: &ElementModQ) -> ElementModQ {
    hash_elems!(previous_code, timestamp, ballot_hash)
}

//! Reply texts
//!
//! Every reply the gateway writes is one of these lines, except `list`,
//! which writes a JSON array of device references, and a successful `open`,
//! which writes nothing and transfers a descriptor instead.

/// Request carried no action field
pub const MISSING_ACTION: &str = "Missing action\n";

/// Action name not recognized
pub const INVALID_ACTION: &str = "Invalid action\n";

/// Device reference absent or not in the current enumeration
pub const NO_SUCH_DEVICE: &str = "No such device\n";

/// Authorization granted
pub const GRANTED: &str = "yes\n";

/// Authorization denied
pub const DENIED: &str = "no\n";

/// Open requested without authorization
pub const NO_PERMISSION: &str = "No permission\n";

/// Host-level open failure
pub const FAILED_OPEN: &str = "Failed to open device\n";

/// Close released at least one held descriptor
pub const CLOSED: &str = "Closed\n";

/// Close found no held descriptor for the device
pub const NOT_OPEN: &str = "Not open\n";

/// Whether a reply text reports a failed request
///
/// Used by callers to derive an exit status. A `"no\n"` permission verdict
/// counts as failure so scripts can branch on the result directly.
pub fn is_failure(text: &str) -> bool {
    matches!(
        text,
        MISSING_ACTION | INVALID_ACTION | NO_SUCH_DEVICE | DENIED | NO_PERMISSION | FAILED_OPEN
            | NOT_OPEN
    )
}

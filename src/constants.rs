// -
// Log-line contracts read back by the failover oracle

/// Emitted when `start()` wins the lock outright.
pub const PRIMARY_LOCK_ACQUIRED: &str = "Primary lock acquired.";

/// Emitted when a standby is promoted by its waiter.
pub const RESUMING_FROM_STANDBY: &str = "Resuming startup sequence from STANDBY";

/// Markers searched (case-insensitively) in node logs.
pub(crate) const PROMOTION_MARKERS: [&str; 2] = ["Primary lock acquired", RESUMING_FROM_STANDBY];

// -
// Registry keys

pub const PRIMARY_LEAD_HOST: &str = "primaryLeadHost";
pub const PRIMARY_LEAD_PORT: &str = "primaryLeadPort";

pub const LAST_CYCLED_TIME: &str = "lastCycledTime";
pub const LAST_CYCLED_TIME_FOR_LEAD: &str = "lastCycledTimeForLead";

pub const STORE_VM_CYCLED: &str = "storeVmCycled";
pub const LEAD_VM_CYCLED: &str = "leadVmCycled";

/// Registry counters
pub const STOP_START_VMS: &str = "stopStartVms";
pub const STOP_START_LEAD_VMS: &str = "stopStartLeadVms";

/// Roles
pub const LEAD_ROLE: &str = "lead";
pub const SERVER_ROLE: &str = "server";

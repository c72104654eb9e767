mod file_lock_failover;
mod three_lead_failover;

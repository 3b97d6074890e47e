//! Exit code constants for the locktable CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid identifier, bad config)
//! - 2: Lock table I/O failure or corrupt table
//! - 3: Lock could not be acquired in time
//! - 4: Synchronizer failed or was stopped while waiting

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid identifier, or invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Lock table failure: the table file could not be read, written, or parsed.
pub const TABLE_FAILURE: i32 = 2;

/// Lock acquisition failure: the lock stayed held past the requested timeout.
pub const LOCK_FAILURE: i32 = 3;

/// Synchronizer failure: the background reconciliation loop is dead or stopped.
pub const SERVICE_FAILURE: i32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            SUCCESS,
            USER_ERROR,
            TABLE_FAILURE,
            LOCK_FAILURE,
            SERVICE_FAILURE,
        ];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn success_is_zero() {
        assert_eq!(SUCCESS, 0);
    }
}

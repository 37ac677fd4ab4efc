use anyhow::{bail, Result};

/// Token every run must be started with.
pub const REQUIRED_UID: &str = "Caseklowzed455";

/// Abort unless `uid` matches [`REQUIRED_UID`] exactly. Must run before any probing.
pub fn check_uid(uid: &str) -> Result<()> {
    if uid != REQUIRED_UID {
        bail!("incorrect UID, supply --uid {REQUIRED_UID}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_only() {
        assert!(check_uid(REQUIRED_UID).is_ok());
        assert!(check_uid("caseklowzed455").is_err());
        assert!(check_uid(" Caseklowzed455").is_err());
        assert!(check_uid("").is_err());
    }
}

//! Reset scheduling.

/// Returns true when a runtime reset is due after `executed` units.
///
/// `reset_every` of `None` or zero disables resets. Otherwise a reset is due
/// exactly on positive multiples of `reset_every`.
pub fn reset_due(executed: u32, reset_every: Option<u32>) -> bool {
    match reset_every {
        Some(every) if every > 0 => executed > 0 && executed % every == 0,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_when_unset_or_zero() {
        assert!(!reset_due(5, None));
        assert!(!reset_due(5, Some(0)));
    }

    #[test]
    fn triggers_only_on_multiples() {
        let due: Vec<u32> = (0..=10).filter(|n| reset_due(*n, Some(3))).collect();
        assert_eq!(due, vec![3, 6, 9]);
    }

    #[test]
    fn every_unit_when_one() {
        assert!((1..=4).all(|n| reset_due(n, Some(1))));
        assert!(!reset_due(0, Some(1)));
    }
}

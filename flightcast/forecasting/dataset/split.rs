use crate::error::ForecastError;

/// Share of samples held out for evaluation by default.
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;

/// Splits `items` into `(train, holdout)` where holdout is the trailing `fraction`.
///
/// The hold-out takes `floor(fraction * len)` items from the tail, so order is
/// preserved, the most recent samples are evaluated and rounding favours training.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn holdout_tail<T>(items: &[T], fraction: f64) -> Result<(&[T], &[T]), ForecastError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ForecastError::Configuration(format!(
            "holdout fraction must lie in (0, 1), got {fraction}"
        )));
    }
    let held = ((fraction * items.len() as f64).floor() as usize).min(items.len());
    Ok(items.split_at(items.len() - held))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_out_the_last_fifth() {
        let items: Vec<u32> = (0..10).collect();
        let (train, test) = holdout_tail(&items, DEFAULT_HOLDOUT_FRACTION).unwrap();
        assert_eq!(train.len(), 8);
        assert_eq!(test, &[8, 9]);
    }

    #[test]
    fn small_inputs_round_towards_training() {
        let items = [1, 2, 3];
        let (train, test) = holdout_tail(&items, 0.2).unwrap();
        assert_eq!(train, &[1, 2, 3]);
        assert!(test.is_empty());
        let items: Vec<u32> = (0..7).collect();
        let (train, test) = holdout_tail(&items, 0.2).unwrap();
        assert_eq!(train.len(), 6);
        assert_eq!(test, &[6]);
        let (train, test) = holdout_tail::<u8>(&[], 0.2).unwrap();
        assert!(train.is_empty() && test.is_empty());
    }

    #[test]
    fn rejects_degenerate_fractions() {
        let items = [1, 2, 3];
        assert!(holdout_tail(&items, 0.0).is_err());
        assert!(holdout_tail(&items, 1.0).is_err());
        assert!(holdout_tail(&items, f64::NAN).is_err());
    }
}

use crate::models::error::RouteError;

/// Number of wide-side channels averaged into each narrow-side channel.
///
/// Only whole ratios are supported: 4 → 2 is 2, 6 → 4 is an error.
pub fn downmix_ratio(wide: u16, narrow: u16) -> Result<usize, RouteError> {
    if wide == 0 || narrow == 0 {
        return Err(RouteError::InvalidArgument("channel count must be positive".into()));
    }
    if narrow > wide {
        return Err(RouteError::InvalidArgument(format!(
            "cannot provide {} channels from {}",
            narrow, wide
        )));
    }
    if wide % narrow != 0 {
        return Err(RouteError::InvalidArgument(format!(
            "unsupported channel ratio {}:{}",
            wide, narrow
        )));
    }
    Ok((wide / narrow) as usize)
}

/// Average every `ratio` consecutive samples of interleaved `samples`.
///
/// Stereo `[L0, R0, L1, R1]` with ratio 2 becomes mono `[(L0+R0)/2, (L1+R1)/2]`.
/// A ratio of 1 copies the input.
pub fn downmix(samples: &[i16], ratio: usize) -> Vec<i16> {
    if ratio <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(ratio)
        .map(|group| {
            let sum: i32 = group.iter().map(|&s| s as i32).sum();
            (sum / ratio as i32) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_pair_averages_to_mono() {
        assert_eq!(downmix(&[100, 300], 2), vec![200]);
    }

    #[test]
    fn quad_to_stereo_averages_adjacent_channels() {
        assert_eq!(downmix(&[10, 20, 30, 50, 1, 3, 5, 7], 2), vec![15, 40, 2, 6]);
    }

    #[test]
    fn averaging_does_not_overflow() {
        assert_eq!(downmix(&[i16::MAX, i16::MAX], 2), vec![i16::MAX]);
        assert_eq!(downmix(&[i16::MIN, i16::MIN], 2), vec![i16::MIN]);
    }

    #[test]
    fn ratio_one_is_identity() {
        assert_eq!(downmix(&[1, 2, 3], 1), vec![1, 2, 3]);
    }

    #[test]
    fn ratios_must_divide_evenly() {
        assert_eq!(downmix_ratio(2, 1).unwrap(), 2);
        assert_eq!(downmix_ratio(8, 2).unwrap(), 4);
        assert_eq!(downmix_ratio(2, 2).unwrap(), 1);
        assert!(downmix_ratio(6, 4).is_err());
        assert!(downmix_ratio(1, 2).is_err());
        assert!(downmix_ratio(0, 1).is_err());
    }
}

pub struct StatsHelper;

impl StatsHelper {
    /// Arithmetic mean, `None` for an empty sequence.
    pub fn mean<I>(samples: I) -> Option<f64>
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = samples
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Mean of the non-zero entries, used to stand in for beams whose
    /// detection was reported as zero.
    pub fn mean_nonzero(samples: &[u32]) -> Option<f64> {
        Self::mean(
            samples
                .iter()
                .filter(|&&value| value > 0)
                .map(|&value| f64::from(value)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_sequence_is_none() {
        assert_eq!(StatsHelper::mean(Vec::<f64>::new()), None);
    }

    #[test]
    fn mean_handles_single_value() {
        assert_eq!(StatsHelper::mean([4.0]), Some(4.0));
    }

    #[test]
    fn mean_nonzero_skips_zero_detections() {
        assert_eq!(StatsHelper::mean_nonzero(&[0, 100, 0, 200]), Some(150.0));
        assert_eq!(StatsHelper::mean_nonzero(&[0, 0]), None);
    }
}

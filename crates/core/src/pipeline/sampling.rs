use crate::shared::constants::SAMPLE_INTERVAL;

/// Whether a frame should run detection.
///
/// Frame numbers are 1-based. The first frame is always sampled so the
/// output never starts with an unchecked frame, then every
/// [`SAMPLE_INTERVAL`]-th frame after that. Unsampled frames pass through
/// unannotated; boxes are not carried over from the previous sample.
pub fn is_sampled(frame_number: usize) -> bool {
    frame_number == 1 || frame_number % SAMPLE_INTERVAL == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, true)]
    #[case(2, false)]
    #[case(3, false)]
    #[case(4, false)]
    #[case(5, true)]
    #[case(6, false)]
    #[case(9, false)]
    #[case(10, true)]
    #[case(15, true)]
    #[case(100, true)]
    #[case(101, false)]
    fn test_sampling_schedule(#[case] frame_number: usize, #[case] expected: bool) {
        assert_eq!(is_sampled(frame_number), expected);
    }

    #[test]
    fn test_sampled_frames_in_first_twenty() {
        let sampled: Vec<usize> = (1..=20).filter(|&n| is_sampled(n)).collect();
        assert_eq!(sampled, vec![1, 5, 10, 15, 20]);
    }
}

//! Median filtering for impulsive noise.

/// Returns the median of `buffer`, sorting it in place.
///
/// Even-length buffers yield the mean of the two middle values. An empty
/// buffer yields `0.0`.
pub fn find_median(buffer: &mut [f32]) -> f32 {
    let size = buffer.len();
    if size == 0 {
        return 0.0;
    }
    buffer.sort_unstable_by(|a, b| a.total_cmp(b));
    if size % 2 == 0 {
        (buffer[size / 2 - 1] + buffer[size / 2]) / 2.0
    } else {
        buffer[size / 2]
    }
}

/// Sliding median over `input`.
///
/// Even window sizes are bumped to the next odd size. Near the edges the
/// window is truncated to the samples that exist.
pub fn median_filter(input: &[f32], window_size: usize) -> Vec<f32> {
    let window_size = if window_size % 2 == 0 { window_size + 1 } else { window_size };
    let half_window = window_size / 2;
    let mut window = Vec::with_capacity(window_size);

    (0..input.len())
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(input.len());
            window.clear();
            window.extend_from_slice(&input[start..end]);
            find_median(&mut window)
        })
        .collect()
}

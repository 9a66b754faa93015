//! # Visualizer
//!
//! Reads the analyzer attached to the playing track once per animation frame
//! and turns it into numbers a renderer can draw: spectrum bars and a
//! waveform trace. Sampling never touches playback state, and a missed frame
//! only means a missed picture.

/// Byte-valued analyser taps, in the layout browsers use: frequency bins are
/// magnitudes in `0..=255`, time-domain samples are centred on 128.
pub trait Analyzer {
    fn bin_count(&self) -> usize;

    fn frequency_data(&mut self, out: &mut [u8]);

    fn time_domain_data(&mut self, out: &mut [u8]);
}

/// One rendered frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisualFrame {
    /// Bar heights in `0.0..=1.0`, low frequencies first.
    pub bars: Vec<f32>,
    /// Samples in `-1.0..=1.0`.
    pub waveform: Vec<f32>,
}

impl VisualFrame {
    /// Loudest bar, handy for a single-value level meter.
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.bars.iter().copied().fold(0.0, f32::max)
    }
}

#[derive(Debug, Clone)]
pub struct Visualizer {
    bar_count: usize,
    frequency: Vec<u8>,
    time_domain: Vec<u8>,
}

impl Visualizer {
    #[must_use]
    pub fn new(bar_count: usize) -> Self {
        Self {
            bar_count: bar_count.max(1),
            frequency: Vec::new(),
            time_domain: Vec::new(),
        }
    }

    /// Sample the analyzer once.
    pub fn frame(&mut self, analyzer: &mut dyn Analyzer) -> VisualFrame {
        let bins = analyzer.bin_count();
        if bins == 0 {
            return VisualFrame::default();
        }
        self.frequency.resize(bins, 0);
        self.time_domain.resize(bins, 128);
        analyzer.frequency_data(&mut self.frequency);
        analyzer.time_domain_data(&mut self.time_domain);

        VisualFrame {
            bars: bars(&self.frequency, self.bar_count),
            waveform: self
                .time_domain
                .iter()
                .map(|&s| ((f32::from(s) - 128.0) / 128.0).clamp(-1.0, 1.0))
                .collect(),
        }
    }
}

/// Average consecutive bins into `count` bars.
fn bars(bins: &[u8], count: usize) -> Vec<f32> {
    let count = count.min(bins.len());
    let per_bar = bins.len() / count;
    (0..count)
        .map(|bar| {
            let start = bar * per_bar;
            let end = if bar + 1 == count { bins.len() } else { start + per_bar };
            let slice = &bins[start..end];
            let sum: u32 = slice.iter().map(|&b| u32::from(b)).sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = sum as f32 / slice.len() as f32;
            mean / 255.0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ramp {
        bins: usize,
    }

    impl Analyzer for Ramp {
        fn bin_count(&self) -> usize {
            self.bins
        }

        fn frequency_data(&mut self, out: &mut [u8]) {
            for (i, v) in out.iter_mut().enumerate() {
                *v = if i < self.bins / 2 { 255 } else { 0 };
            }
        }

        fn time_domain_data(&mut self, out: &mut [u8]) {
            for (i, v) in out.iter_mut().enumerate() {
                *v = if i % 2 == 0 { 0 } else { 255 };
            }
        }
    }

    #[test]
    fn test_bars_average_bins() {
        let mut visualizer = Visualizer::new(4);
        let frame = visualizer.frame(&mut Ramp { bins: 8 });

        assert_eq!(frame.bars, vec![1.0, 1.0, 0.0, 0.0]);
        assert!((frame.peak() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_waveform_is_normalised() {
        let mut visualizer = Visualizer::new(2);
        let frame = visualizer.frame(&mut Ramp { bins: 4 });

        assert_eq!(frame.waveform.len(), 4);
        assert!((frame.waveform[0] + 1.0).abs() < f32::EPSILON);
        assert!(frame.waveform[1] > 0.99 && frame.waveform[1] <= 1.0);
    }

    #[test]
    fn test_more_bars_than_bins() {
        let mut visualizer = Visualizer::new(64);
        let frame = visualizer.frame(&mut Ramp { bins: 4 });
        assert_eq!(frame.bars.len(), 4);
    }

    #[test]
    fn test_silent_analyzer() {
        let mut visualizer = Visualizer::new(8);
        let frame = visualizer.frame(&mut Ramp { bins: 0 });
        assert_eq!(frame, VisualFrame::default());
        assert_eq!(frame.peak(), 0.0);
    }
}

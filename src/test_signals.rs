//! Synthetic rhythm generators shared by the unit tests

/// Length of one synthetic drum hit in seconds
const HIT_SECONDS: f32 = 0.04;

/// Deterministic xorshift noise source
pub(crate) struct Xorshift32(u32);

impl Xorshift32 {
    pub(crate) fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    /// Uniform sample in [-1, 1)
    pub(crate) fn next_bipolar(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
    }
}

/// Add a decaying sine hit starting at `start_sample`
pub(crate) fn add_hit(samples: &mut [f32], start_sample: usize, sample_rate: u32, amplitude: f32) {
    let len = (HIT_SECONDS * sample_rate as f32) as usize;
    for i in 0..len {
        let Some(s) = samples.get_mut(start_sample + i) else {
            break;
        };
        let t = i as f32 / len as f32;
        let phase = 2.0 * std::f32::consts::PI * 160.0 * i as f32 / sample_rate as f32;
        *s += amplitude * (-t * 5.0).exp() * phase.sin();
    }
}

/// One hit per beat, first hit `offset_beats` beats into the signal
pub(crate) fn click_track(
    duration_seconds: f32,
    bpm: f32,
    sample_rate: u32,
    offset_beats: f32,
    amplitude: f32,
) -> Vec<f32> {
    let num_samples = (duration_seconds * sample_rate as f32) as usize;
    let mut samples = vec![0.0f32; num_samples];
    let beat_seconds = 60.0 / bpm;

    let mut beat = offset_beats;
    loop {
        let start = (beat * beat_seconds * sample_rate as f32).round() as usize;
        if start >= num_samples {
            break;
        }
        add_hit(&mut samples, start, sample_rate, amplitude);
        beat += 1.0;
    }
    samples
}

/// Kick on every beat plus an equally loud hit on every half-beat offset
pub(crate) fn backbeat_track(duration_seconds: f32, bpm: f32, sample_rate: u32) -> Vec<f32> {
    let mut samples = click_track(duration_seconds, bpm, sample_rate, 0.0, 0.8);
    let offbeat = click_track(duration_seconds, bpm, sample_rate, 0.5, 0.8);
    for (s, o) in samples.iter_mut().zip(offbeat) {
        *s += o;
    }
    samples
}

/// Add uniform noise of the given peak amplitude
pub(crate) fn add_noise(samples: &mut [f32], amplitude: f32, seed: u32) {
    let mut rng = Xorshift32::new(seed);
    for s in samples.iter_mut() {
        *s += amplitude * rng.next_bipolar();
    }
}

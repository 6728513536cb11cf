//! Spectral helpers shared by resampling and band power estimation

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::cell::RefCell;
use std::f64::consts::PI;

thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<f64>> = RefCell::new(FftPlanner::new());
}

fn fft_forward(buffer: &mut [Complex<f64>]) {
    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_forward(buffer.len());
        fft.process(buffer);
    });
}

fn fft_inverse(buffer: &mut [Complex<f64>]) {
    FFT_PLANNER.with(|planner| {
        let fft = planner.borrow_mut().plan_fft_inverse(buffer.len());
        fft.process(buffer);
    });
}

/// Fourier-domain resampling of a real signal to `num` samples.
///
/// The spectrum is truncated or zero-padded around the Nyquist bin, which is
/// split (upsampling) or folded (downsampling) when the shorter length is even.
pub fn resample(signal: &[f64], num: usize) -> Vec<f64> {
    let nx = signal.len();
    if nx == 0 || num == 0 {
        return vec![0.0; num];
    }
    if nx == num {
        return signal.to_vec();
    }

    let mut spectrum: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    fft_forward(&mut spectrum);

    let n = nx.min(num);
    let nyq = n / 2 + 1;
    let mut out = vec![Complex::new(0.0, 0.0); num];

    out[..nyq].copy_from_slice(&spectrum[..nyq]);
    let negative = n - nyq;
    if negative > 0 {
        out[num - negative..].copy_from_slice(&spectrum[nx - negative..]);
    }

    if n % 2 == 0 {
        let half = n / 2;
        if num < nx {
            out[half] += spectrum[nx - half];
        } else {
            out[half] *= 0.5;
            out[num - half] = out[half];
        }
    }

    fft_inverse(&mut out);
    let scale = 1.0 / nx as f64;
    out.iter().map(|c| c.re * scale).collect()
}

/// One-sided power spectral density
#[derive(Debug, Clone)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl Spectrum {
    /// Frequency spacing between bins
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }

    /// Simpson integral of the density over bins where `keep(freq)` holds
    pub fn integrate<F>(&self, keep: F) -> f64
    where
        F: Fn(f64) -> bool,
    {
        let selected: Vec<f64> = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(&f, _)| keep(f))
            .map(|(_, &p)| p)
            .collect();
        simpson(&selected, self.resolution())
    }
}

/// Periodic Hamming window
pub fn hamming(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// Bias of the median of `n` chi-squared (2 dof) periodogram values
/// relative to their mean: `1 + sum over k in 1..=(n-1)/2 of 1/(2k+1) - 1/(2k)`
pub fn median_bias(n: usize) -> f64 {
    1.0 + (1..=(n.saturating_sub(1)) / 2)
        .map(|k| {
            let even = 2.0 * k as f64;
            1.0 / (even + 1.0) - 1.0 / even
        })
        .sum::<f64>()
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    match n {
        0 => 0.0,
        _ if n % 2 == 1 => values[n / 2],
        _ => 0.5 * (values[n / 2 - 1] + values[n / 2]),
    }
}

/// Welch PSD estimate: Hamming window, 50% overlap, constant detrend, density
/// scaling, bias-corrected median over segments.
///
/// `nperseg` is clamped to the signal length.
pub fn welch(signal: &[f64], sfreq: f64, nperseg: usize) -> Spectrum {
    let n = signal.len();
    let nperseg = nperseg.min(n).max(1);
    let noverlap = nperseg / 2;
    let step = (nperseg - noverlap).max(1);
    let window = hamming(nperseg);
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let n_bins = nperseg / 2 + 1;
    let last = n_bins - 1;
    let scale = 1.0 / (sfreq * window_power);

    // periodograms[k] holds bin k of every segment
    let mut periodograms: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];

    let mut start = 0;
    while start + nperseg <= n {
        let chunk = &signal[start..start + nperseg];
        let mean = chunk.iter().sum::<f64>() / nperseg as f64;
        for ((slot, &x), &w) in buffer.iter_mut().zip(chunk).zip(&window) {
            *slot = Complex::new((x - mean) * w, 0.0);
        }
        fft_forward(&mut buffer);

        for (k, (bin, c)) in periodograms.iter_mut().zip(&buffer[..n_bins]).enumerate() {
            // DC (and Nyquist for even lengths) appear once in the one-sided spectrum
            let unpaired = k == 0 || (nperseg % 2 == 0 && k == last);
            let factor = if unpaired { 1.0 } else { 2.0 };
            bin.push(c.norm_sqr() * scale * factor);
        }
        start += step;
    }

    let bias = median_bias(periodograms.first().map_or(0, Vec::len));
    let density = periodograms
        .iter_mut()
        .map(|bin| median(bin) / bias)
        .collect();

    let frequencies = (0..n_bins)
        .map(|k| k as f64 * sfreq / nperseg as f64)
        .collect();

    Spectrum {
        frequencies,
        density,
    }
}

/// Composite Simpson integration with uniform spacing.
///
/// Even sample counts average the two schemes that place the trapezoid on the
/// first and on the last interval.
pub fn simpson(y: &[f64], dx: f64) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => 0.5 * dx * (y[0] + y[1]),
        _ if n % 2 == 1 => simpson_odd(y, dx),
        _ => {
            let head = simpson_odd(&y[..n - 1], dx) + 0.5 * dx * (y[n - 2] + y[n - 1]);
            let tail = simpson_odd(&y[1..], dx) + 0.5 * dx * (y[0] + y[1]);
            0.5 * (head + tail)
        }
    }
}

fn simpson_odd(y: &[f64], dx: f64) -> f64 {
    y.windows(3)
        .step_by(2)
        .map(|w| w[0] + 4.0 * w[1] + w[2])
        .sum::<f64>()
        * dx
        / 3.0
}

use std::f64::consts::PI;

/// Platform heave for a given ping, a sinusoid with the given amplitude and
/// period in pings.
pub fn heave_at(ping: usize, amplitude_m: f64, period_pings: f64) -> f64 {
    if period_pings <= 0.0 {
        return 0.0;
    }
    amplitude_m * (ping as f64 / period_pings * 2.0 * PI).sin()
}

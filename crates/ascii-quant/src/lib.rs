//! Anthony Dekker's NeuQuant self-organizing-map color quantizer.
//!
//! Trains a 256-entry network of representative colors on an RGBA
//! pixel buffer, then exposes nearest-index lookup and a flattened
//! RGBA color map — the same public shape the pipeline's GIF stage
//! used to get from a third-party quantizer, now trained in-house.

use ascii_types::AsciiFrameError;
use tracing::{debug, span, Level};

const NETSIZE: usize = 256;
const NCYCLES: i32 = 100;
const PRIMES: [usize; 4] = [499, 491, 487, 503];
const MIN_PICTURE_BYTES: usize = 4 * PRIMES[3];

const NETBIASSHIFT: i32 = 4;
const INTBIASSHIFT: i32 = 16;
const INTBIAS: i32 = 1 << INTBIASSHIFT;
const GAMMASHIFT: i32 = 10;
const BETASHIFT: i32 = 10;
const BETA: i32 = INTBIAS >> BETASHIFT;
const BETAGAMMA: i32 = INTBIAS << (GAMMASHIFT - BETASHIFT);

const INITRAD: i32 = (NETSIZE >> 3) as i32;
const RADIUSBIASSHIFT: i32 = 6;
const RADIUSBIAS: i32 = 1 << RADIUSBIASSHIFT;
const INITRADIUS: i32 = INITRAD * RADIUSBIAS;
const RADIUSDEC: i32 = 30;

const ALPHABIASSHIFT: i32 = 10;
const INITALPHA: i32 = 1 << ALPHABIASSHIFT;

const RADBIASSHIFT: i32 = 8;
const RADBIAS: i32 = 1 << RADBIASSHIFT;
const ALPHARADBSHIFT: i32 = ALPHABIASSHIFT + RADBIASSHIFT;
const ALPHARADBIAS: i32 = 1 << ALPHARADBSHIFT;

const COMPONENT: &str = "NeuQuant";

/// A single trained network entry: (b, g, r, original-index) in
/// bias-shifted space during training, right-shifted back to 8-bit
/// channel values after [`NeuQuant::unbiasnet`].
type Sample = [i32; 4];

/// One quantizer per frame: trains on that frame's pixels, then is
/// queried for palette indices. Single-owner, single-thread, discarded
/// after use.
pub struct NeuQuant {
    network: Vec<Sample>,
    netindex: [i32; 256],
    used_entry: Vec<bool>,
}

impl NeuQuant {
    /// `sample_fac` in `[1, 30]`: lower means denser sampling (slower,
    /// higher quality). `pixels` is a flat RGBA buffer.
    pub fn new(sample_fac: i32, pixels: &[u8]) -> Result<NeuQuant, AsciiFrameError> {
        if pixels.len() < MIN_PICTURE_BYTES {
            return Err(AsciiFrameError::quantize(
                COMPONENT,
                format!(
                    "pixel buffer too small to form even one full sample ({} bytes, need {})",
                    pixels.len(),
                    MIN_PICTURE_BYTES
                ),
            ));
        }

        let span = span!(Level::DEBUG, "neuquant_train", pixels = pixels.len(), sample_fac);
        let _guard = span.enter();

        let mut net = Network::new(pixels, sample_fac.clamp(1, 30));
        net.train();
        net.unbiasnet();
        net.inxbuild();

        debug!(stage = "C6", netsize = NETSIZE, "NeuQuant training complete");

        Ok(NeuQuant {
            network: net.network,
            netindex: net.netindex,
            used_entry: vec![false; NETSIZE],
        })
    }

    /// Nearest network entry to `rgba[0..3]`, marking it used.
    pub fn index_of(&mut self, rgba: &[u8]) -> usize {
        let idx = self.map(rgba[0] as i32, rgba[1] as i32, rgba[2] as i32);
        self.used_entry[idx] = true;
        idx
    }

    /// Flattened RGBA color map, in network order (index == palette index).
    pub fn color_map_rgba(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NETSIZE * 4);
        for entry in &self.network {
            out.push(entry[2] as u8);
            out.push(entry[1] as u8);
            out.push(entry[0] as u8);
            out.push(0xff);
        }
        out
    }

    /// Flattened RGB color map (GIF global/local color tables carry no alpha).
    pub fn color_map_rgb(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NETSIZE * 3);
        for entry in &self.network {
            out.push(entry[2] as u8);
            out.push(entry[1] as u8);
            out.push(entry[0] as u8);
        }
        out
    }

    pub fn is_used(&self, index: usize) -> bool {
        self.used_entry[index]
    }

    /// Nearest palette index to `(r, g, b)`, restricted to entries with
    /// `used_entry[i] == true`. Returns `None` if no entry is used.
    pub fn nearest_used(&self, r: u8, g: u8, b: u8) -> Option<usize> {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        let mut best = None;
        let mut best_dist = i32::MAX;
        for (i, entry) in self.network.iter().enumerate() {
            if !self.used_entry[i] {
                continue;
            }
            let dist = (entry[2] - r).abs() + (entry[1] - g).abs() + (entry[0] - b).abs();
            if dist < best_dist {
                best_dist = dist;
                best = Some(i);
            }
        }
        best
    }

    /// Bidirectional search outward from `netindex[g]` along the
    /// green-sorted network, pruning either direction as soon as the
    /// green-channel distance alone exceeds the best match found.
    fn map(&self, r: i32, g: i32, b: i32) -> usize {
        let mut best_d = i32::MAX;
        let mut best_pos = 0usize;

        let netsize = NETSIZE as i32;
        let mut i = self.netindex[g as usize];
        let mut j = i - 1;

        while i < netsize || j >= 0 {
            if i < netsize {
                let p = self.network[i as usize];
                let gdist = p[1] - g;
                if gdist >= best_d {
                    i = netsize;
                } else {
                    let dist = gdist.abs() + (p[0] - b).abs() + (p[2] - r).abs();
                    if dist < best_d {
                        best_d = dist;
                        best_pos = i as usize;
                    }
                    i += 1;
                }
            }
            if j >= 0 {
                let p = self.network[j as usize];
                let gdist = g - p[1];
                if gdist >= best_d {
                    j = -1;
                } else {
                    let dist = gdist.abs() + (p[0] - b).abs() + (p[2] - r).abs();
                    if dist < best_d {
                        best_d = dist;
                        best_pos = j as usize;
                    }
                    j -= 1;
                }
            }
        }

        best_pos
    }
}

struct Network {
    network: Vec<Sample>,
    netindex: [i32; 256],
    bias: [i32; NETSIZE],
    freq: [i32; NETSIZE],
    radpower: [i32; NETSIZE / 2],
    pixels: Vec<u8>,
    sample_fac: i32,
}

impl Network {
    fn new(pixels: &[u8], sample_fac: i32) -> Network {
        let mut network = Vec::with_capacity(NETSIZE);
        let mut freq = [0i32; NETSIZE];
        for i in 0..NETSIZE {
            let v = ((i as i32) << (NETBIASSHIFT + 8)) / NETSIZE as i32;
            network.push([v, v, v, i as i32]);
            freq[i] = INTBIAS / NETSIZE as i32;
        }

        Network {
            network,
            netindex: [0; 256],
            bias: [0; NETSIZE],
            freq,
            radpower: [0; NETSIZE / 2],
            pixels: pixels.to_vec(),
            sample_fac,
        }
    }

    fn train(&mut self) {
        let lengthcount = self.pixels.len() / 4;
        let samplepixels = lengthcount / self.sample_fac as usize;
        let delta = (samplepixels / NCYCLES as usize).max(1);

        let mut alpha = INITALPHA;
        let mut radius = INITRADIUS;
        let mut rad = radius >> RADIUSBIASSHIFT;
        if rad <= 1 {
            rad = 0;
        }
        self.set_radpower(rad, alpha);

        let step = pick_stride(lengthcount);
        let mut pos = 0usize;
        let mut i = 0usize;

        while i < samplepixels {
            let idx = pos * 4;
            let b = (self.pixels[idx] as i32) << NETBIASSHIFT;
            let g = (self.pixels[idx + 1] as i32) << NETBIASSHIFT;
            let r = (self.pixels[idx + 2] as i32) << NETBIASSHIFT;

            let winner = self.contest(b, g, r);
            self.altersingle(alpha, winner, b, g, r);
            if rad > 0 {
                self.alterneigh(rad, winner, b, g, r);
            }

            pos = (pos + step) % lengthcount;
            i += 1;

            if i % delta == 0 {
                alpha -= alpha / 30;
                radius -= radius / RADIUSDEC;
                rad = radius >> RADIUSBIASSHIFT;
                if rad <= 1 {
                    rad = 0;
                }
                self.set_radpower(rad, alpha);
            }
        }
    }

    /// Neighbor pull-strength schedule: decreases with distance `i`
    /// from the winning sample, scaled by the current (decaying) alpha.
    fn set_radpower(&mut self, rad: i32, alpha: i32) {
        for i in 0..rad.max(0) as usize {
            let ii = i as i32;
            self.radpower[i] = alpha * (((rad * rad - ii * ii) * RADBIAS) / (rad * rad));
        }
    }

    fn contest(&mut self, b: i32, g: i32, r: i32) -> usize {
        let mut best_d = i32::MAX;
        let mut best_bias_d = i32::MAX;
        let mut bestpos = 0usize;
        let mut bestbiaspos = 0usize;

        for i in 0..NETSIZE {
            let p = self.network[i];
            let dist = (p[0] - b).abs() + (p[1] - g).abs() + (p[2] - r).abs();
            if dist < best_d {
                best_d = dist;
                bestpos = i;
            }

            let biasdist = dist - ((self.bias[i]) >> (INTBIASSHIFT - NETBIASSHIFT));
            if biasdist < best_bias_d {
                best_bias_d = biasdist;
                bestbiaspos = i;
            }

            let betafreq = self.freq[i] >> BETASHIFT;
            self.freq[i] -= betafreq;
            self.bias[i] += betafreq << GAMMASHIFT;
        }

        self.freq[bestpos] += BETA;
        self.bias[bestpos] -= BETAGAMMA;

        bestbiaspos
    }

    fn altersingle(&mut self, alpha: i32, i: usize, b: i32, g: i32, r: i32) {
        let p = &mut self.network[i];
        p[0] -= (alpha * (p[0] - b)) / INITALPHA;
        p[1] -= (alpha * (p[1] - g)) / INITALPHA;
        p[2] -= (alpha * (p[2] - r)) / INITALPHA;
    }

    fn alterneigh(&mut self, rad: i32, i: usize, b: i32, g: i32, r: i32) {
        let i = i as i32;
        let lo = (i - rad).max(-1);
        let hi = (i + rad).min(NETSIZE as i32);

        let mut j = i + 1;
        let mut k = i - 1;
        let mut m = 1usize;

        while j < hi || k > lo {
            let a = self.radpower[m];
            m += 1;

            if j < hi {
                let p = &mut self.network[j as usize];
                p[0] -= (a * (p[0] - b)) / ALPHARADBIAS;
                p[1] -= (a * (p[1] - g)) / ALPHARADBIAS;
                p[2] -= (a * (p[2] - r)) / ALPHARADBIAS;
                j += 1;
            }
            if k > lo {
                let p = &mut self.network[k as usize];
                p[0] -= (a * (p[0] - b)) / ALPHARADBIAS;
                p[1] -= (a * (p[1] - g)) / ALPHARADBIAS;
                p[2] -= (a * (p[2] - r)) / ALPHARADBIAS;
                k -= 1;
            }
        }
    }

    fn unbiasnet(&mut self) {
        for p in self.network.iter_mut() {
            p[0] >>= NETBIASSHIFT;
            p[1] >>= NETBIASSHIFT;
            p[2] >>= NETBIASSHIFT;
        }
    }

    /// Sorts samples ascending by green, then builds `netindex[g]` so it
    /// points to the midpoint of the run of samples sharing green value
    /// `g`, filling gaps with the first sample whose green is >= g.
    fn inxbuild(&mut self) {
        self.network.sort_by_key(|p| p[1]);

        let mut previouscol = 0i32;
        let mut startpos = 0i32;

        for i in 0..NETSIZE as i32 {
            let g = self.network[i as usize][1];
            if g != previouscol {
                self.netindex[previouscol as usize] = (startpos + i) >> 1;
                for j in (previouscol + 1)..g {
                    self.netindex[j as usize] = i;
                }
                previouscol = g;
                startpos = i;
            }
        }

        let maxnetpos = NETSIZE as i32 - 1;
        self.netindex[previouscol as usize] = (startpos + maxnetpos) >> 1;
        for j in (previouscol + 1)..256 {
            self.netindex[j as usize] = maxnetpos;
        }
    }
}

fn pick_stride(lengthcount: usize) -> usize {
    for &p in &PRIMES {
        if lengthcount % p != 0 {
            return p;
        }
    }
    PRIMES[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_rgba(w: usize, h: usize, rgba: [u8; 4]) -> Vec<u8> {
        let mut v = Vec::with_capacity(w * h * 4);
        for _ in 0..(w * h) {
            v.extend_from_slice(&rgba);
        }
        v
    }

    #[test]
    fn too_small_buffer_is_rejected() {
        let pixels = vec![0u8; 4];
        assert!(NeuQuant::new(10, &pixels).is_err());
    }

    #[test]
    fn monochrome_input_quantizes_to_single_color() {
        let pixels = solid_rgba(64, 64, [200, 50, 10, 255]);
        let mut nq = NeuQuant::new(10, &pixels).unwrap();
        let idx0 = nq.index_of(&[200, 50, 10, 255]);
        for chunk in pixels.chunks_exact(4) {
            assert_eq!(nq.index_of(chunk), idx0);
        }
    }

    #[test]
    fn color_map_has_256_entries() {
        let pixels = solid_rgba(64, 64, [10, 20, 30, 255]);
        let nq = NeuQuant::new(10, &pixels).unwrap();
        assert_eq!(nq.color_map_rgba().len(), NETSIZE * 4);
        assert_eq!(nq.color_map_rgb().len(), NETSIZE * 3);
    }

    #[test]
    fn nearest_used_ignores_unused_entries() {
        let pixels = solid_rgba(64, 64, [0, 0, 0, 255]);
        let mut nq = NeuQuant::new(10, &pixels).unwrap();
        assert!(nq.nearest_used(0, 0, 0).is_none());
        let idx = nq.index_of(&[0, 0, 0, 255]);
        assert_eq!(nq.nearest_used(0, 0, 0), Some(idx));
    }

    proptest::proptest! {
        #[test]
        fn index_of_always_in_range(r: u8, g: u8, b: u8) {
            let pixels = solid_rgba(64, 64, [r, g, b, 255]);
            if let Ok(mut nq) = NeuQuant::new(10, &pixels) {
                let idx = nq.index_of(&[r, g, b, 255]);
                proptest::prop_assert!(idx < NETSIZE);
            }
        }
    }
}

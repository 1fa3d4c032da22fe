//! Keyframe storage shared by every curve timeline.
//!
//! Frames are stored flat: `time, value1, value2, ...` per frame. The parallel `curves` array
//! holds one entry per frame describing the segment that starts at that frame: [`LINEAR`],
//! [`STEPPED`], or `BEZIER + offset` where `offset` points into the bezier table appended after
//! the per-frame entries. Each bezier segment is pre-sampled into [`BEZIER_SIZE`] floats
//! (9 points) so queries never solve the cubic.

pub const LINEAR: f32 = 0.0;
pub const STEPPED: f32 = 1.0;
pub const BEZIER: f32 = 2.0;
pub const BEZIER_SIZE: usize = 18;

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum CurveKind {
    Linear,
    Stepped,
    Bezier(usize),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CurveFrames {
    entries: usize,
    frames: Vec<f32>,
    curves: Vec<f32>,
}

impl CurveFrames {
    /// `values` is the number of floats per frame after the time.
    pub fn new(frame_count: usize, bezier_count: usize, values: usize) -> Self {
        let entries = values + 1;
        let mut curves = vec![LINEAR; frame_count + bezier_count * BEZIER_SIZE];
        if frame_count > 0 {
            curves[frame_count - 1] = STEPPED;
        }
        Self {
            entries,
            frames: vec![0.0; frame_count * entries],
            curves,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len() / self.entries
    }

    pub fn frame_entries(&self) -> usize {
        self.entries
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn curves(&self) -> &[f32] {
        &self.curves
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time of the last key.
    pub fn duration(&self) -> f32 {
        match self.frame_count() {
            0 => 0.0,
            n => self.frames[(n - 1) * self.entries],
        }
    }

    pub(crate) fn first_time(&self) -> f32 {
        self.frames.first().copied().unwrap_or(0.0)
    }

    pub fn set_frame(&mut self, frame: usize, time: f32, values: &[f32]) {
        let i = frame * self.entries;
        self.frames[i] = time;
        let n = values.len().min(self.entries - 1);
        self.frames[i + 1..i + 1 + n].copy_from_slice(&values[..n]);
    }

    pub fn set_linear(&mut self, frame: usize) {
        self.curves[frame] = LINEAR;
    }

    pub fn set_stepped(&mut self, frame: usize) {
        self.curves[frame] = STEPPED;
    }

    /// Drops unused bezier storage when fewer segments were set than reserved.
    pub fn shrink(&mut self, bezier_count: usize) {
        let size = self.frame_count() + bezier_count * BEZIER_SIZE;
        if self.curves.len() > size {
            self.curves.truncate(size);
        }
    }

    /// Pre-samples bezier segment number `bezier` for value `value` of the segment starting at
    /// `frame`. Multi-value frames reserve consecutive segments, one per value, and only value 0
    /// records the curve offset.
    #[allow(clippy::too_many_arguments)]
    pub fn set_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        value: usize,
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) {
        let i = self.frame_count() + bezier * BEZIER_SIZE;
        if value == 0 {
            self.curves[frame] = BEZIER + i as f32;
        }
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_bezier(
            i,
            (time1 + dx, value1 + dy),
            (dx, dy),
            (tmpx * 2.0 + dddx, tmpy * 2.0 + dddy),
            (dddx, dddy),
        );
    }

    /// Deform variant of [`Self::set_bezier`]: the curve maps time to a 0..1 blend percent, so
    /// `cy1`/`cy2` are normalized and the end values are implicitly 0 and 1.
    #[allow(clippy::too_many_arguments)]
    pub fn set_percent_bezier(
        &mut self,
        bezier: usize,
        frame: usize,
        time1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
    ) {
        let i = self.frame_count() + bezier * BEZIER_SIZE;
        self.curves[frame] = BEZIER + i as f32;
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = cy2 * 0.03 - cy1 * 0.06;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = (cy1 - cy2 + 0.333_333_33) * 0.018;
        let dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.166_666_67;
        let dy = cy1 * 0.3 + tmpy + dddy * 0.166_666_67;
        self.fill_bezier(
            i,
            (time1 + dx, dy),
            (dx, dy),
            (tmpx * 2.0 + dddx, tmpy * 2.0 + dddy),
            (dddx, dddy),
        );
    }

    // Forward differencing of the cubic at 9 evenly spaced parameter steps.
    fn fill_bezier(
        &mut self,
        start: usize,
        (mut x, mut y): (f32, f32),
        (mut dx, mut dy): (f32, f32),
        (mut ddx, mut ddy): (f32, f32),
        (dddx, dddy): (f32, f32),
    ) {
        for pair in self.curves[start..start + BEZIER_SIZE].chunks_exact_mut(2) {
            pair[0] = x;
            pair[1] = y;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }
    }

    /// Float index of the last frame whose time is `<= time`, or of frame 0 when `time` precedes
    /// every key.
    pub(crate) fn search(&self, time: f32) -> usize {
        search(&self.frames, self.entries, time)
    }

    pub(crate) fn curve_kind(&self, frame: usize) -> CurveKind {
        if frame + 1 >= self.frame_count() {
            return CurveKind::Stepped;
        }
        let curve = self.curves[frame];
        if curve == LINEAR {
            CurveKind::Linear
        } else if curve == STEPPED {
            CurveKind::Stepped
        } else {
            CurveKind::Bezier((curve - BEZIER) as usize)
        }
    }

    /// Evaluates the pre-sampled segment at `curve_index` for the value at `value_offset` within
    /// the frame starting at float index `frame_index`.
    pub(crate) fn bezier_value(
        &self,
        time: f32,
        frame_index: usize,
        value_offset: usize,
        curve_index: usize,
    ) -> f32 {
        let curves = &self.curves;
        if curves[curve_index] > time {
            let x = self.frames[frame_index];
            let y = self.frames[frame_index + value_offset];
            return y + (time - x) / (curves[curve_index] - x) * (curves[curve_index + 1] - y);
        }
        let end = curve_index + BEZIER_SIZE;
        let mut i = curve_index + 2;
        while i < end {
            if curves[i] >= time {
                let (x, y) = (curves[i - 2], curves[i - 1]);
                return y + (time - x) / (curves[i] - x) * (curves[i + 1] - y);
            }
            i += 2;
        }
        let next = frame_index + self.entries;
        let (x, y) = (curves[end - 2], curves[end - 1]);
        y + (time - x) / (self.frames[next] - x) * (self.frames[next + value_offset] - y)
    }

    /// Interpolates the first `N` values at `time`. Returns the float index of the frame used
    /// alongside the values. `time` must not precede the first key.
    pub(crate) fn sample<const N: usize>(&self, time: f32) -> (usize, [f32; N]) {
        let i = self.search(time);
        let mut out = [0.0; N];
        match self.curve_kind(i / self.entries) {
            CurveKind::Linear => {
                let next = i + self.entries;
                let before = self.frames[i];
                let t = (time - before) / (self.frames[next] - before);
                for (v, value) in out.iter_mut().enumerate() {
                    let a = self.frames[i + 1 + v];
                    *value = a + (self.frames[next + 1 + v] - a) * t;
                }
            }
            CurveKind::Stepped => {
                out.copy_from_slice(&self.frames[i + 1..i + 1 + N]);
            }
            CurveKind::Bezier(offset) => {
                for (v, value) in out.iter_mut().enumerate() {
                    *value = self.bezier_value(time, i, 1 + v, offset + v * BEZIER_SIZE);
                }
            }
        }
        (i, out)
    }

    pub(crate) fn value(&self, time: f32) -> f32 {
        let (_, [value]) = self.sample::<1>(time);
        value
    }

    /// Blend percent (0..1) between `frame` and the next frame, for frames without values.
    pub(crate) fn percent(&self, time: f32, frame: usize) -> f32 {
        let i = frame * self.entries;
        match self.curve_kind(frame) {
            CurveKind::Linear => {
                let x = self.frames[i];
                (time - x) / (self.frames[i + self.entries] - x)
            }
            CurveKind::Stepped => 0.0,
            CurveKind::Bezier(mut c) => {
                let curves = &self.curves;
                if curves[c] > time {
                    let x = self.frames[i];
                    return curves[c + 1] * (time - x) / (curves[c] - x);
                }
                let end = c + BEZIER_SIZE;
                c += 2;
                while c < end {
                    if curves[c] >= time {
                        let (x, y) = (curves[c - 2], curves[c - 1]);
                        return y + (time - x) / (curves[c] - x) * (curves[c + 1] - y);
                    }
                    c += 2;
                }
                let (x, y) = (curves[end - 2], curves[end - 1]);
                y + (1.0 - y) * (time - x) / (self.frames[i + self.entries] - x)
            }
        }
    }
}

/// Binary search over keys laid out every `stride` floats. Returns the float index of the last
/// key whose time is `<= time`, or 0 when none is.
pub(crate) fn search(frames: &[f32], stride: usize, time: f32) -> usize {
    let count = frames.len() / stride;
    if count == 0 {
        return 0;
    }
    let (mut lo, mut hi) = (1, count);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if frames[mid * stride] > time {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    (lo - 1) * stride
}

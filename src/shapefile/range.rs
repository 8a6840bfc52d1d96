/// Running (min, max) of one axis.
///
/// Starts empty (both NaN). NaN values and `f64::MIN`, which some producers
/// write to mean "no point", never widen the range.
#[derive(Debug, Clone, Copy)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Default for Range {
    fn default() -> Range {
        Range::empty()
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Range) -> bool {
        (self.is_empty() && other.is_empty()) || (self.min == other.min && self.max == other.max)
    }
}

impl Range {
    pub fn empty() -> Range {
        Range { min: f64::NAN, max: f64::NAN }
    }

    pub fn new(min: f64, max: f64) -> Range {
        let mut r = Range::empty();
        r.expand(min);
        r.expand(max);
        r
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_nan() && self.max.is_nan()
    }

    pub fn expand(&mut self, value: f64) {
        if value.is_nan() || value == f64::MIN {
            return;
        }
        if self.is_empty() {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    pub fn expand_range(&mut self, other: &Range) {
        if !other.is_empty() {
            self.expand(other.min);
            self.expand(other.max);
        }
    }

    pub fn clear(&mut self) {
        *self = Range::empty();
    }

    /// (min, max), with `absent` substituted when the range is empty.
    pub fn or(&self, absent: f64) -> (f64, f64) {
        if self.is_empty() {
            (absent, absent)
        } else {
            (self.min, self.max)
        }
    }
}

/// Per-axis extent of some set of coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub x: Range,
    pub y: Range,
    pub z: Range,
    pub m: Range,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() && self.y.is_empty()
    }

    pub fn expand(&mut self, other: &BoundingBox) {
        self.x.expand_range(&other.x);
        self.y.expand_range(&other.y);
        self.z.expand_range(&other.z);
        self.m.expand_range(&other.m);
    }

    pub fn clear(&mut self) {
        *self = BoundingBox::default();
    }
}

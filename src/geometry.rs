//! # Geometry Planning Module
//!
//! Computes target pixel dimensions from a requested width/height pair and an
//! aspect-ratio policy. A requested dimension of `0` means "unspecified".
//!
//! The planner is pure math: no decoding, no errors, always a plan.

/// Concrete target dimensions derived from an original size and a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPlan {
    pub target_width: u32,
    pub target_height: u32,
}

impl GeometryPlan {
    /// True when the plan leaves the original dimensions untouched.
    pub fn is_noop(&self, original_width: u32, original_height: u32) -> bool {
        self.target_width == original_width && self.target_height == original_height
    }
}

/// Stateless planner for resize geometry.
pub struct GeometryPlanner;

impl GeometryPlanner {
    /// Plans target dimensions for a resize.
    ///
    /// Rules, in order:
    /// - both requested dimensions `0` → original dimensions (no-op);
    /// - `preserve_aspect == false` → each requested dimension replaces the
    ///   original only where it is > 0;
    /// - both requested > 0 with aspect preservation → the smaller of the two
    ///   scale factors is applied to both dimensions (fit-within, never crops);
    /// - exactly one requested > 0 → the other dimension is scaled by the same
    ///   ratio.
    ///
    /// Fractional results truncate toward zero, clamped to at least one pixel.
    pub fn plan(
        original_width: u32,
        original_height: u32,
        requested_width: u32,
        requested_height: u32,
        preserve_aspect: bool,
    ) -> GeometryPlan {
        if requested_width == 0 && requested_height == 0 {
            return GeometryPlan {
                target_width: original_width,
                target_height: original_height,
            };
        }

        if !preserve_aspect {
            return GeometryPlan {
                target_width: if requested_width > 0 {
                    requested_width
                } else {
                    original_width
                },
                target_height: if requested_height > 0 {
                    requested_height
                } else {
                    original_height
                },
            };
        }

        if requested_width > 0 && requested_height > 0 {
            let scale_w = requested_width as f64 / original_width as f64;
            let scale_h = requested_height as f64 / original_height as f64;
            let scale = scale_w.min(scale_h);

            return GeometryPlan {
                target_width: ((original_width as f64 * scale) as u32).max(1),
                target_height: ((original_height as f64 * scale) as u32).max(1),
            };
        }

        if requested_width > 0 {
            let scale = requested_width as f64 / original_width as f64;
            GeometryPlan {
                target_width: requested_width.max(1),
                target_height: ((original_height as f64 * scale) as u32).max(1),
            }
        } else {
            let scale = requested_height as f64 / original_height as f64;
            GeometryPlan {
                target_width: ((original_width as f64 * scale) as u32).max(1),
                target_height: requested_height.max(1),
            }
        }
    }
}

use serde::{Deserialize, Serialize};

/// Vertical compression of the isometric projection.
const ISO_HEIGHT_FACTOR: f64 = 2.0 / 3.1;
const FIT_MARGIN: f64 = 0.15;

pub const DEFAULT_PAN_X: f64 = -100.0;
pub const DEFAULT_PAN_Y: f64 = -250.0;

/// Pixel geometry the zoom limits are derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub tile_width: f64,
    pub tile_height: f64,
    pub container_width: f64,
    pub container_height: f64,
    pub base_min_zoom: f64,
    pub base_max_zoom: f64,
    pub zoom_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        ViewportConfig {
            tile_width: 128.0,
            tile_height: 128.0,
            container_width: 910.0,
            container_height: 910.0,
            base_min_zoom: 0.5,
            base_max_zoom: 2.0,
            zoom_step: 0.1,
        }
    }
}

impl ViewportConfig {
    /// Largest zoom at which a `side` x `side` grid fits the container,
    /// shrunk by `margin` on both axes.
    fn fit_ratio(&self, side: usize, margin: f64) -> f64 {
        let side = side.max(1) as f64;
        let map_width = side * self.tile_width;
        let map_height = side * self.tile_height * ISO_HEIGHT_FACTOR;
        let scale_x = self.container_width * (1.0 - margin) / map_width;
        let scale_y = self.container_height * (1.0 - margin) / map_height;
        scale_x.min(scale_y)
    }

    pub fn min_zoom(&self, side: usize, multiplier: u32) -> f64 {
        let floor = if multiplier >= 4 {
            0.05
        } else {
            self.base_min_zoom
        };
        floor.max(self.fit_ratio(side, 0.0) * 0.6)
    }

    pub fn max_zoom(&self, multiplier: u32) -> f64 {
        (self.base_max_zoom * (1.0 + multiplier as f64 * 0.1)).min(3.0)
    }

    pub fn fit_zoom(&self, side: usize, multiplier: u32) -> f64 {
        let fit = self.fit_ratio(side, FIT_MARGIN);
        self.min_zoom(side, multiplier)
            .max(fit.min(self.max_zoom(multiplier)))
    }

    /// Zoom increment, smaller on large canvases.
    pub fn zoom_step(&self, multiplier: u32) -> f64 {
        self.zoom_step / (multiplier as f64 * 0.5).max(1.0)
    }
}

/// Persisted camera position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            zoom: 1.0,
            pan_x: DEFAULT_PAN_X,
            pan_y: DEFAULT_PAN_Y,
        }
    }
}

impl Viewport {
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan_x += dx;
        self.pan_y += dy;
    }

    pub fn zoom_in(&mut self, config: &ViewportConfig, multiplier: u32) -> bool {
        let max = config.max_zoom(multiplier);
        if self.zoom >= max {
            return false;
        }
        self.zoom = (self.zoom + config.zoom_step(multiplier)).min(max);
        true
    }

    pub fn zoom_out(&mut self, config: &ViewportConfig, side: usize, multiplier: u32) -> bool {
        let min = config.min_zoom(side, multiplier);
        if self.zoom <= min {
            return false;
        }
        self.zoom = (self.zoom - config.zoom_step(multiplier)).max(min);
        true
    }

    pub fn reset(&mut self, config: &ViewportConfig, side: usize, multiplier: u32) {
        self.zoom = config.fit_zoom(side, multiplier);
        self.pan_x = DEFAULT_PAN_X;
        self.pan_y = DEFAULT_PAN_Y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn small_grid_is_bounded_by_base_limits() {
        let cfg = ViewportConfig::default();
        // 7 tiles are 896px wide, width is the binding axis
        let min = cfg.min_zoom(7, 1);
        assert!(close(min, (910.0 / 896.0) * 0.6));
        assert!(close(cfg.max_zoom(1), 2.2));
        let fit = cfg.fit_zoom(7, 1);
        assert!(close(fit, 910.0 * 0.85 / 896.0));
    }

    #[test]
    fn large_canvas_allows_deeper_zoom_out() {
        let cfg = ViewportConfig::default();
        let side = 56;
        let min = cfg.min_zoom(side, 8);
        assert!(close(min, (910.0_f64 / (56.0 * 128.0) * 0.6).max(0.05)));
        assert!(min < 0.5);
        assert!(close(cfg.max_zoom(8), 3.0));
        assert!(close(cfg.fit_zoom(side, 8), 910.0 * 0.85 / (56.0 * 128.0)));
    }

    #[test]
    fn zoom_steps_shrink_with_multiplier() {
        let cfg = ViewportConfig::default();
        assert!(close(cfg.zoom_step(1), 0.1));
        assert!(close(cfg.zoom_step(2), 0.1));
        assert!(close(cfg.zoom_step(4), 0.05));
        assert!(close(cfg.zoom_step(8), 0.025));
    }

    #[test]
    fn zoom_in_clamps_at_max() {
        let cfg = ViewportConfig::default();
        let mut view = Viewport {
            zoom: 2.15,
            ..Viewport::default()
        };
        assert!(view.zoom_in(&cfg, 1));
        assert!(close(view.zoom, 2.2));
        assert!(!view.zoom_in(&cfg, 1));
    }

    #[test]
    fn zoom_out_clamps_at_min() {
        let cfg = ViewportConfig::default();
        let min = cfg.min_zoom(7, 1);
        let mut view = Viewport {
            zoom: min + 0.01,
            ..Viewport::default()
        };
        assert!(view.zoom_out(&cfg, 7, 1));
        assert!(close(view.zoom, min));
        assert!(!view.zoom_out(&cfg, 7, 1));
    }

    #[test]
    fn reset_restores_pan_and_fit() {
        let cfg = ViewportConfig::default();
        let mut view = Viewport::default();
        view.pan_by(30.0, -12.0);
        view.zoom = 0.7;
        view.reset(&cfg, 14, 2);
        assert!(close(view.pan_x, -100.0));
        assert!(close(view.pan_y, -250.0));
        assert!(close(view.zoom, cfg.fit_zoom(14, 2)));
    }
}

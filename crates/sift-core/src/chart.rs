//! Pie chart geometry
//!
//! Pure layout: turns a category breakdown into wedge paths, label anchors
//! and connector lines. Angles are compass bearings (0° at the top,
//! increasing clockwise) in an SVG-style, y-down coordinate system.

use std::fmt::Write as _;

use serde::Serialize;

use crate::analytics::CategorySpending;

/// Default slice colours, cycled when there are more slices
pub const DEFAULT_PALETTE: &[&str] = &[
    "#12a38b", "#1cb5e0", "#f5a623", "#e94e77", "#8e6dd8", "#34e89e", "#5c7aea", "#ffcf56",
    "#0fcd84", "#ff7a59",
];

const FULL_CIRCLE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Drawing area and distances used by `layout`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    pub width: f64,
    pub height: f64,
    pub center: Point,
    pub radius: f64,
    /// Distance of a label beyond the circle edge
    pub label_offset: f64,
    /// Gap between the circle edge and the start of a connector line
    pub line_gap: f64,
}

impl Default for ChartFrame {
    fn default() -> Self {
        Self::new(480.0, 400.0)
    }
}

impl ChartFrame {
    /// Frame centred in a `width` x `height` area, leaving room for labels
    pub fn new(width: f64, height: f64) -> Self {
        let label_offset = 36.0;
        let radius = (width.min(height) / 2.0 - label_offset - 24.0).max(10.0);
        Self {
            width,
            height,
            center: Point {
                x: width / 2.0,
                y: height / 2.0,
            },
            radius,
            label_offset,
            line_gap: 6.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SliceShape {
    /// Closed wedge path (`M center L start A ... end Z`)
    Arc { path: String, large_arc: bool },
    /// The slice covers the whole circle
    FullCircle { center: Point, radius: f64 },
}

/// Geometry of one category's wedge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSlice {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
    pub start_angle: f64,
    pub end_angle: f64,
    pub shape: SliceShape,
    pub label_position: Point,
    pub line_start: Point,
    pub line_end: Point,
}

impl ChartSlice {
    pub fn sweep(&self) -> f64 {
        self.end_angle - self.start_angle
    }

    pub fn mid_angle(&self) -> f64 {
        (self.start_angle + self.end_angle) / 2.0
    }

    /// SVG `text-anchor` keeping the label clear of the circle
    pub fn text_anchor(&self, frame: &ChartFrame) -> &'static str {
        let dx = self.label_position.x - frame.center.x;
        if dx.abs() < 1e-6 {
            "middle"
        } else if dx < 0.0 {
            "end"
        } else {
            "start"
        }
    }
}

/// Point at `radius` from `center` on a compass bearing
pub fn polar(center: Point, radius: f64, angle_deg: f64) -> Point {
    let rad = (angle_deg - 90.0).to_radians();
    Point {
        x: center.x + radius * rad.cos(),
        y: center.y + radius * rad.sin(),
    }
}

fn wedge_path(frame: &ChartFrame, start: f64, end: f64, large_arc: bool) -> String {
    let c = frame.center;
    let from = polar(c, frame.radius, start);
    let to = polar(c, frame.radius, end);
    format!(
        "M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z",
        c.x,
        c.y,
        from.x,
        from.y,
        frame.radius,
        frame.radius,
        u8::from(large_arc),
        to.x,
        to.y
    )
}

/// Lay out one wedge per category
///
/// Sweeps are proportional to each category's percentage, normalized by
/// the sum of the percentages so they always close the circle. Returns no
/// slices when every percentage is zero.
pub fn layout(categories: &[CategorySpending], frame: &ChartFrame) -> Vec<ChartSlice> {
    let shares: Vec<f64> = categories.iter().map(|c| c.percentage.max(0.0)).collect();
    let sum: f64 = shares.iter().sum();
    if sum <= 0.0 {
        return Vec::new();
    }

    let mut slices = Vec::with_capacity(categories.len());
    let mut cumulative = 0.0;
    for (i, (category, share)) in categories.iter().zip(&shares).enumerate() {
        let start = 360.0 * cumulative / sum;
        cumulative += share;
        // Pin the last edge so rounding never leaves a gap
        let end = if i + 1 == categories.len() {
            360.0
        } else {
            360.0 * cumulative / sum
        };
        let sweep = end - start;

        let shape = if categories.len() == 1 || sweep >= 360.0 - FULL_CIRCLE_EPSILON {
            SliceShape::FullCircle {
                center: frame.center,
                radius: frame.radius,
            }
        } else {
            let large_arc = sweep > 180.0;
            SliceShape::Arc {
                path: wedge_path(frame, start, end, large_arc),
                large_arc,
            }
        };

        let mid = (start + end) / 2.0;
        let label_position = polar(frame.center, frame.radius + frame.label_offset, mid);
        slices.push(ChartSlice {
            category: category.category.clone(),
            amount: category.amount,
            percentage: category.percentage,
            start_angle: start,
            end_angle: end,
            shape,
            label_position,
            line_start: polar(frame.center, frame.radius + frame.line_gap, mid),
            line_end: label_position,
        });
    }
    slices
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Render laid-out slices as a standalone SVG document
pub fn render_svg(slices: &[ChartSlice], frame: &ChartFrame, palette: &[&str]) -> String {
    let palette = if palette.is_empty() {
        DEFAULT_PALETTE
    } else {
        palette
    };

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = frame.width,
        h = frame.height
    );

    if slices.is_empty() {
        let _ = writeln!(
            svg,
            r##"  <text x="{:.2}" y="{:.2}" text-anchor="middle" font-family="sans-serif" font-size="14" fill="#666">No spending data</text>"##,
            frame.center.x, frame.center.y
        );
    }

    for (i, slice) in slices.iter().enumerate() {
        if slice.sweep() <= FULL_CIRCLE_EPSILON {
            continue;
        }
        let colour = palette[i % palette.len()];
        match &slice.shape {
            SliceShape::Arc { path, .. } => {
                let _ = writeln!(
                    svg,
                    r##"  <path d="{}" fill="{}" stroke="#fff" stroke-width="1"/>"##,
                    path, colour
                );
            }
            SliceShape::FullCircle { center, radius } => {
                let _ = writeln!(
                    svg,
                    r#"  <circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}"/>"#,
                    center.x, center.y, radius, colour
                );
            }
        }
    }

    for slice in slices.iter().filter(|s| s.sweep() > FULL_CIRCLE_EPSILON) {
        let _ = writeln!(
            svg,
            r##"  <line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="#888" stroke-width="1"/>"##,
            slice.line_start.x, slice.line_start.y, slice.line_end.x, slice.line_end.y
        );
        let _ = writeln!(
            svg,
            r#"  <text x="{:.2}" y="{:.2}" text-anchor="{}" dominant-baseline="middle" font-family="sans-serif" font-size="12">{} ({:.1}%)</text>"#,
            slice.label_position.x,
            slice.label_position.y,
            slice.text_anchor(frame),
            escape_xml(&slice.category),
            slice.percentage
        );
    }

    svg.push_str("</svg>\n");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, percentage: f64) -> CategorySpending {
        CategorySpending {
            category: name.to_string(),
            amount: percentage * 10.0,
            percentage,
            receipt_count: 1,
        }
    }

    fn frame() -> ChartFrame {
        ChartFrame {
            width: 400.0,
            height: 400.0,
            center: Point { x: 200.0, y: 200.0 },
            radius: 100.0,
            label_offset: 30.0,
            line_gap: 5.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_polar_compass_bearings() {
        let c = Point { x: 200.0, y: 200.0 };
        let top = polar(c, 100.0, 0.0);
        assert!(close(top.x, 200.0) && close(top.y, 100.0));
        let right = polar(c, 100.0, 90.0);
        assert!(close(right.x, 300.0) && close(right.y, 200.0));
        let bottom = polar(c, 100.0, 180.0);
        assert!(close(bottom.x, 200.0) && close(bottom.y, 300.0));
    }

    #[test]
    fn test_two_slices() {
        let slices = layout(&[category("A", 66.7), category("B", 33.3)], &frame());
        assert_eq!(slices.len(), 2);

        assert!(close(slices[0].start_angle, 0.0));
        assert!(close(slices[0].end_angle, 240.12));
        assert!(matches!(
            slices[0].shape,
            SliceShape::Arc {
                large_arc: true,
                ..
            }
        ));
        assert!(close(slices[1].start_angle, 240.12));
        assert!(close(slices[1].end_angle, 360.0));
        assert!(matches!(
            slices[1].shape,
            SliceShape::Arc {
                large_arc: false,
                ..
            }
        ));
    }

    #[test]
    fn test_sweeps_total_360_when_rounding_drifts() {
        // Rounded percentages summing to 99.9
        let slices = layout(
            &[category("A", 33.3), category("B", 33.3), category("C", 33.3)],
            &frame(),
        );
        let total: f64 = slices.iter().map(ChartSlice::sweep).sum();
        assert!(close(total, 360.0));
        assert!(slices.windows(2).all(|w| close(w[0].end_angle, w[1].start_angle)));
    }

    #[test]
    fn test_single_category_is_full_circle() {
        let slices = layout(&[category("Only", 100.0)], &frame());
        assert_eq!(slices.len(), 1);
        assert_eq!(
            slices[0].shape,
            SliceShape::FullCircle {
                center: Point { x: 200.0, y: 200.0 },
                radius: 100.0
            }
        );
        assert!(close(slices[0].sweep(), 360.0));
    }

    #[test]
    fn test_zero_share_slices_beside_full_one() {
        let slices = layout(&[category("All", 100.0), category("None", 0.0)], &frame());
        assert!(matches!(slices[0].shape, SliceShape::FullCircle { .. }));
        assert!(close(slices[1].sweep(), 0.0));
    }

    #[test]
    fn test_zero_total_gives_no_slices() {
        assert!(layout(&[category("A", 0.0), category("B", 0.0)], &frame()).is_empty());
        assert!(layout(&[], &frame()).is_empty());
    }

    #[test]
    fn test_label_and_connector_positions() {
        let f = frame();
        let slices = layout(&[category("A", 50.0), category("B", 50.0)], &f);

        // First slice spans 0..180, mid-angle 90 (due east)
        let label = slices[0].label_position;
        assert!(close(label.x, 200.0 + 130.0) && close(label.y, 200.0));
        assert!(close(slices[0].line_start.x, 200.0 + 105.0));
        assert_eq!(slices[0].line_end, label);
        assert_eq!(slices[0].text_anchor(&f), "start");
        assert_eq!(slices[1].text_anchor(&f), "end");
    }

    #[test]
    fn test_wedge_path() {
        let slices = layout(&[category("A", 25.0), category("B", 75.0)], &frame());
        match &slices[0].shape {
            SliceShape::Arc { path, large_arc } => {
                assert!(!large_arc);
                assert_eq!(
                    path,
                    "M 200.00 200.00 L 200.00 100.00 A 100.00 100.00 0 0 1 300.00 200.00 Z"
                );
            }
            other => panic!("expected arc, got {:?}", other),
        }
    }

    #[test]
    fn test_render_svg() {
        let f = frame();
        let slices = layout(&[category("Food & Drink", 60.0), category("Travel", 40.0)], &f);
        let svg = render_svg(&slices, &f, &[]);

        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("Food &amp; Drink (60.0%)"));
        assert!(svg.contains(DEFAULT_PALETTE[0]));
    }

    #[test]
    fn test_render_svg_empty_and_single() {
        let f = frame();
        assert!(render_svg(&[], &f, DEFAULT_PALETTE).contains("No spending data"));

        let single = layout(&[category("Rent", 100.0)], &f);
        let svg = render_svg(&single, &f, &["#000000"]);
        assert!(svg.contains(r##"<circle cx="200.00" cy="200.00" r="100.00" fill="#000000"/>"##));
        assert!(!svg.contains("<path"));
    }
}

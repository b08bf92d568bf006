// Skeletal overlay renderer
// Maps the latest pose snapshot onto a transparent surface sized to the video

use crate::models::pose::{BodyLandmark, PoseSnapshot};
use image::{Rgba, RgbaImage};

/// Color of skeleton segments (RGBA).
pub const SEGMENT_COLOR: Rgba<u8> = Rgba([229, 255, 0, 255]);
/// Color of keypoint markers (RGBA).
pub const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Marker radius in pixels.
pub const MARKER_RADIUS: i32 = 7;

/// A point in normalized video coordinates ([0, 1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn midpoint(a: Point, b: Point) -> Point {
        Point {
            x: (a.x + b.x) / 2.0,
            y: (a.y + b.y) / 2.0,
        }
    }
}

// ==============================================================================
// Derived Keypoints (15-point reduced skeleton)
// ==============================================================================

/// The 15 rendering keypoints: 13 landmarks taken directly from the snapshot
/// plus the two computed midpoints (neck, mid-hip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeypointLabel {
    Head,
    Neck,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    MidHip,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl KeypointLabel {
    pub const ALL: [KeypointLabel; 15] = [
        KeypointLabel::Head,
        KeypointLabel::Neck,
        KeypointLabel::LeftShoulder,
        KeypointLabel::RightShoulder,
        KeypointLabel::LeftElbow,
        KeypointLabel::RightElbow,
        KeypointLabel::LeftWrist,
        KeypointLabel::RightWrist,
        KeypointLabel::MidHip,
        KeypointLabel::LeftHip,
        KeypointLabel::RightHip,
        KeypointLabel::LeftKnee,
        KeypointLabel::RightKnee,
        KeypointLabel::LeftAnkle,
        KeypointLabel::RightAnkle,
    ];

    /// Anatomical label drawn next to the marker.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeypointLabel::Head => "HEAD",
            KeypointLabel::Neck => "NECK",
            KeypointLabel::LeftShoulder => "L_SHOULDER",
            KeypointLabel::RightShoulder => "R_SHOULDER",
            KeypointLabel::LeftElbow => "L_ELBOW",
            KeypointLabel::RightElbow => "R_ELBOW",
            KeypointLabel::LeftWrist => "L_WRIST",
            KeypointLabel::RightWrist => "R_WRIST",
            KeypointLabel::MidHip => "MID_HIP",
            KeypointLabel::LeftHip => "L_HIP",
            KeypointLabel::RightHip => "R_HIP",
            KeypointLabel::LeftKnee => "L_KNEE",
            KeypointLabel::RightKnee => "R_KNEE",
            KeypointLabel::LeftAnkle => "L_ANKLE",
            KeypointLabel::RightAnkle => "R_ANKLE",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|l| l == self).unwrap_or(0)
    }
}

/// Skeleton topology: which derived keypoints are connected by a segment.
pub const SKELETON_EDGES: [(KeypointLabel, KeypointLabel); 14] = [
    (KeypointLabel::Head, KeypointLabel::Neck),
    (KeypointLabel::Neck, KeypointLabel::LeftShoulder),
    (KeypointLabel::Neck, KeypointLabel::RightShoulder),
    (KeypointLabel::LeftShoulder, KeypointLabel::LeftElbow),
    (KeypointLabel::LeftElbow, KeypointLabel::LeftWrist),
    (KeypointLabel::RightShoulder, KeypointLabel::RightElbow),
    (KeypointLabel::RightElbow, KeypointLabel::RightWrist),
    (KeypointLabel::Neck, KeypointLabel::MidHip),
    (KeypointLabel::MidHip, KeypointLabel::LeftHip),
    (KeypointLabel::MidHip, KeypointLabel::RightHip),
    (KeypointLabel::LeftHip, KeypointLabel::LeftKnee),
    (KeypointLabel::LeftKnee, KeypointLabel::LeftAnkle),
    (KeypointLabel::RightHip, KeypointLabel::RightKnee),
    (KeypointLabel::RightKnee, KeypointLabel::RightAnkle),
];

/// The reduced skeleton for one snapshot. Computed freshly every time;
/// never carried over between snapshots.
#[derive(Debug, Default, Clone)]
pub struct DerivedSkeleton {
    points: [Option<Point>; 15],
}

impl DerivedSkeleton {
    pub fn from_snapshot(snapshot: &PoseSnapshot) -> Self {
        let direct = |lm: BodyLandmark| {
            snapshot.landmark(lm).map(|l| Point { x: l.x, y: l.y })
        };
        let midpoint = |a: BodyLandmark, b: BodyLandmark| match (direct(a), direct(b)) {
            (Some(p), Some(q)) => Some(Point::midpoint(p, q)),
            _ => None,
        };

        let mut points = [None; 15];
        points[KeypointLabel::Head.index()] = direct(BodyLandmark::Nose);
        points[KeypointLabel::Neck.index()] =
            midpoint(BodyLandmark::LeftShoulder, BodyLandmark::RightShoulder);
        points[KeypointLabel::LeftShoulder.index()] = direct(BodyLandmark::LeftShoulder);
        points[KeypointLabel::RightShoulder.index()] = direct(BodyLandmark::RightShoulder);
        points[KeypointLabel::LeftElbow.index()] = direct(BodyLandmark::LeftElbow);
        points[KeypointLabel::RightElbow.index()] = direct(BodyLandmark::RightElbow);
        points[KeypointLabel::LeftWrist.index()] = direct(BodyLandmark::LeftWrist);
        points[KeypointLabel::RightWrist.index()] = direct(BodyLandmark::RightWrist);
        points[KeypointLabel::MidHip.index()] =
            midpoint(BodyLandmark::LeftHip, BodyLandmark::RightHip);
        points[KeypointLabel::LeftHip.index()] = direct(BodyLandmark::LeftHip);
        points[KeypointLabel::RightHip.index()] = direct(BodyLandmark::RightHip);
        points[KeypointLabel::LeftKnee.index()] = direct(BodyLandmark::LeftKnee);
        points[KeypointLabel::RightKnee.index()] = direct(BodyLandmark::RightKnee);
        points[KeypointLabel::LeftAnkle.index()] = direct(BodyLandmark::LeftAnkle);
        points[KeypointLabel::RightAnkle.index()] = direct(BodyLandmark::RightAnkle);

        Self { points }
    }

    pub fn point(&self, label: KeypointLabel) -> Option<Point> {
        self.points[label.index()]
    }
}

// ==============================================================================
// Draw Surface
// ==============================================================================

/// Drawing target for the overlay. Coordinates are in pixels of the surface.
/// The bitmap implementation below rasterizes segments and markers; labels
/// are part of the contract for presentation-layer surfaces.
pub trait DrawSurface: Send {
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn draw_segment(&mut self, from: Point, to: Point);
    fn draw_marker(&mut self, at: Point, label: &str);
}

// ==============================================================================
// Overlay Renderer
// ==============================================================================

/// Renders the latest snapshot onto the surface, once per new snapshot.
/// Never timer-driven, so duplicate or interpolated frames cannot appear.
pub struct OverlayRenderer {
    surface: Box<dyn DrawSurface>,
    visible: bool,
    dims: (u32, u32),
}

impl OverlayRenderer {
    pub fn new(surface: Box<dyn DrawSurface>) -> Self {
        Self {
            surface,
            visible: true,
            dims: (0, 0),
        }
    }

    /// Draw the skeleton for `snapshot` onto a surface sized to `dims`.
    ///
    /// Edges with an unresolvable endpoint are skipped; an empty snapshot
    /// clears the surface and draws nothing.
    pub fn render(&mut self, snapshot: &PoseSnapshot, dims: (u32, u32)) {
        if !self.visible {
            return;
        }

        if dims != self.dims {
            self.surface.resize(dims.0, dims.1);
            self.dims = dims;
        }
        self.surface.clear();

        let skeleton = DerivedSkeleton::from_snapshot(snapshot);
        let (w, h) = (dims.0 as f32, dims.1 as f32);
        let to_px = |p: Point| Point {
            x: p.x * w,
            y: p.y * h,
        };

        for (from, to) in SKELETON_EDGES {
            if let (Some(a), Some(b)) = (skeleton.point(from), skeleton.point(to)) {
                self.surface.draw_segment(to_px(a), to_px(b));
            }
        }

        for label in KeypointLabel::ALL {
            if let Some(p) = skeleton.point(label) {
                self.surface.draw_marker(to_px(p), label.as_str());
            }
        }
    }

    /// Toggle overlay visibility. Turning it off clears the surface and
    /// suppresses draws until it is turned back on; re-enabling resumes on
    /// the next snapshot.
    pub fn set_visible(&mut self, visible: bool) {
        if !visible && self.visible {
            self.surface.clear();
        }
        self.visible = visible;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Clear the surface outright (used on session teardown).
    pub fn clear(&mut self) {
        self.surface.clear();
    }
}

// ==============================================================================
// Bitmap Surface
// ==============================================================================

/// RGBA pixel-buffer surface. Transparent background, rasterized segments
/// and circular markers.
pub struct BitmapSurface {
    buffer: RgbaImage,
}

impl BitmapSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::new(width, height),
        }
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    fn plot(&mut self, x: i32, y: i32, color: Rgba<u8>) {
        if x >= 0 && y >= 0 && (x as u32) < self.buffer.width() && (y as u32) < self.buffer.height()
        {
            self.buffer.put_pixel(x as u32, y as u32, color);
        }
    }

    fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, color: Rgba<u8>) {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= radius * radius {
                    self.plot(cx + dx, cy + dy, color);
                }
            }
        }
    }
}

impl DrawSurface for BitmapSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.buffer = RgbaImage::new(width.max(1), height.max(1));
    }

    fn clear(&mut self) {
        for px in self.buffer.pixels_mut() {
            *px = Rgba([0, 0, 0, 0]);
        }
    }

    fn draw_segment(&mut self, from: Point, to: Point) {
        // Bresenham, slightly thickened so the skeleton reads at video size.
        let (mut x0, mut y0) = (from.x.round() as i32, from.y.round() as i32);
        let (x1, y1) = (to.x.round() as i32, to.y.round() as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.fill_circle(x0, y0, 1, SEGMENT_COLOR);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn draw_marker(&mut self, at: Point, _label: &str) {
        self.fill_circle(
            at.x.round() as i32,
            at.y.round() as i32,
            MARKER_RADIUS,
            MARKER_COLOR,
        );
    }
}

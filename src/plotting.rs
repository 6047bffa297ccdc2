use std::path::{Path, PathBuf};

use plotpy::{Curve, Plot, Text};

use crate::records::{site_file, OutputError};
use crate::structs::PathPoint;

/// Turns a site's ordered points into a visual artifact under `dir`.
pub trait PathRenderer {
    fn render(&mut self, site: &str, points: &[PathPoint], dir: &Path)
        -> Result<PathBuf, OutputError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    Source,
    Hop,
    Destination,
}

impl MarkerKind {
    fn of(idx: usize, len: usize, point: &PathPoint) -> Self {
        if point.is_source {
            MarkerKind::Source
        } else if idx == len - 1 {
            MarkerKind::Destination
        } else {
            MarkerKind::Hop
        }
    }

    fn color(self) -> &'static str {
        match self {
            MarkerKind::Source => "green",
            MarkerKind::Hop => "blue",
            MarkerKind::Destination => "red",
        }
    }

    fn style(self) -> &'static str {
        match self {
            MarkerKind::Source => "s",
            MarkerKind::Hop => "o",
            MarkerKind::Destination => "^",
        }
    }

    fn name(self) -> &'static str {
        match self {
            MarkerKind::Source => "Source",
            MarkerKind::Hop => "Hop",
            MarkerKind::Destination => "Destination",
        }
    }
}

/// Annotation drawn next to a marker.
fn caption(idx: usize, kind: MarkerKind, point: &PathPoint) -> String {
    match kind {
        MarkerKind::Source => format!("{}\n{}", kind.name(), point.label),
        MarkerKind::Hop => format!("{} {idx}: {}\n{}", kind.name(), point.label, point.detail),
        MarkerKind::Destination => {
            format!("{}: {}\n{}", kind.name(), point.label, point.detail)
        }
    }
}

/// SVG route map drawn with plotpy, longitude on x and latitude on y.
#[derive(Debug, Default)]
pub struct SvgMapRenderer;

impl PathRenderer for SvgMapRenderer {
    fn render(
        &mut self,
        site: &str,
        points: &[PathPoint],
        dir: &Path,
    ) -> Result<PathBuf, OutputError> {
        if points.len() < 2 {
            return Err(OutputError::Render(format!(
                "need at least 2 points, got {}",
                points.len()
            )));
        }

        let mut route = Curve::new();
        route
            .set_label(&format!("Route to {site}"))
            .set_line_color("red")
            .set_line_width(2.0);
        route.points_begin();
        for p in points {
            route.points_add(p.longitude, p.latitude);
        }
        route.points_end();

        let mut plot = Plot::new();
        plot.add(&route);

        let mut text = Text::new();
        text.set_fontsize(7.0).set_align_horizontal("left");

        for (idx, point) in points.iter().enumerate() {
            let kind = MarkerKind::of(idx, points.len(), point);

            let mut marker = Curve::new();
            marker
                .set_line_style("None")
                .set_marker_style(kind.style())
                .set_marker_color(kind.color())
                .set_marker_size(9.0);
            marker.points_begin();
            marker.points_add(point.longitude, point.latitude);
            marker.points_end();
            plot.add(&marker);

            text.set_color(kind.color());
            text.draw(point.longitude, point.latitude, &caption(idx, kind, point));
        }
        plot.add(&text);

        plot.grid_and_labels("Longitude", "Latitude")
            .set_title(&format!("Route to {site}"))
            .set_figure_size_points(1000., 600.);

        let path = site_file(dir, site, "_traceroute_map.svg");
        plot.save(&path).map_err(|e| OutputError::Render(e.to_string()))?;

        Ok(path)
    }
}

//! Visualization utilities for CVRP solutions.
//!
//! Generates SVG route maps and convergence plots, and exports for plotting.

use crate::error::{Result, SolverError};
use crate::instance::CvrpInstance;
use crate::solution::Solution;
use std::fs::File;
use std::io::Write;
use std::path::Path;
#[cfg(not(feature = "resvg"))]
use std::process::Command;
#[cfg(feature = "resvg")]
use resvg::tiny_skia::{Pixmap, Transform};
#[cfg(feature = "resvg")]
use resvg::usvg::{self, TreeParsing};

/// One color per route, cycled when there are more routes than colors
const ROUTE_COLORS: [&str; 10] = [
    "#3498db", "#2ecc71", "#9b59b6", "#f39c12", "#1abc9c", "#e67e22", "#34495e", "#16a085", "#8e44ad", "#d35400",
];

fn render_error(msg: impl Into<String>) -> SolverError {
    SolverError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg.into()))
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Node radius
    pub node_radius: f64,
    /// Draw customer ids next to the nodes
    pub show_labels: bool,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 5.0,
            show_labels: true,
        }
    }
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equirectangular projection of the instance onto the canvas.
    /// Longitudes are shrunk by the cosine of the mean latitude.
    fn projection(&self, instance: &CvrpInstance) -> impl Fn(f64, f64) -> (f64, f64) {
        let nodes = instance.nodes();
        let mean_lat = nodes.iter().map(|n| n.location.latitude).sum::<f64>() / nodes.len().max(1) as f64;
        let kx = mean_lat.to_radians().cos().max(1e-6);

        let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for node in nodes {
            let x = node.location.longitude * kx;
            let y = node.location.latitude;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let span = (max_x - min_x).max(max_y - min_y).max(1e-9);
        let scale = (self.width.min(self.height) - 2.0 * self.margin) / span;
        let (margin, height) = (self.margin, self.height);

        move |lat: f64, lon: f64| {
            let tx = margin + (lon * kx - min_x) * scale;
            let ty = height - margin - (lat - min_y) * scale;
            (tx, ty)
        }
    }

    /// Generate SVG map of the routes of a solution
    pub fn generate_svg(&self, instance: &CvrpInstance, solution: &Solution) -> String {
        let mut svg = String::new();
        let project = self.projection(instance);

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .node {{ fill: #ffffff; stroke-width: 2; }}
    .overloaded {{ fill: #fadbd8; }}
    .depot {{ fill: #e74c3c; stroke: #c0392b; stroke-width: 2; }}
    .edge {{ stroke-width: 2; fill: none; stroke-linejoin: round; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">Instance: {} | Cost: {:.2} | Vehicles: {} | Feasible: {}</text>
"##,
            self.margin,
            escape_xml(&instance.name),
            solution.cost,
            solution.stats.num_routes,
            solution.feasible
        ));

        let depot = instance.node(instance.depot());
        let (dx, dy) = project(depot.location.latitude, depot.location.longitude);

        for (r, summary) in solution.route_summaries(instance).iter().enumerate() {
            let color = ROUTE_COLORS[r % ROUTE_COLORS.len()];
            let dash = if summary.is_overloaded() { r#" stroke-dasharray="6,4""# } else { "" };

            let mut points = format!("{:.2},{:.2}", dx, dy);
            for &c in &summary.customers {
                let loc = instance.node(c).location;
                let (x, y) = project(loc.latitude, loc.longitude);
                points.push_str(&format!(" {:.2},{:.2}", x, y));
            }
            points.push_str(&format!(" {:.2},{:.2}", dx, dy));

            svg.push_str(&format!(
                r##"<polyline points="{}" class="edge" stroke="{}"{}/>
"##,
                points, color, dash
            ));

            for &c in &summary.customers {
                let node = instance.node(c);
                let (x, y) = project(node.location.latitude, node.location.longitude);
                let class = if summary.is_overloaded() { "node overloaded" } else { "node" };

                svg.push_str(&format!(
                    r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}" stroke="{}"/>
"##,
                    x, y, self.node_radius, class, color
                ));

                if self.show_labels {
                    svg.push_str(&format!(
                        r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                        x,
                        y - self.node_radius - 3.0,
                        escape_xml(node.id.as_str())
                    ));
                }
            }
        }

        let side = 2.0 * self.node_radius + 4.0;
        svg.push_str(&format!(
            r##"<rect x="{:.2}" y="{:.2}" width="{}" height="{}" class="depot"/>
<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
            dx - side / 2.0,
            dy - side / 2.0,
            side,
            side,
            dx,
            dy - side,
            escape_xml(depot.id.as_str())
        ));

        // Legend: one line per route with its load
        let mut legend_y = 45.0;
        for (r, summary) in solution.route_summaries(instance).iter().enumerate() {
            let color = ROUTE_COLORS[r % ROUTE_COLORS.len()];
            svg.push_str(&format!(
                r##"<rect x="{}" y="{}" width="12" height="12" fill="{}"/>
<text x="{}" y="{}" class="label">Route {} ({:.1}/{:.1})</text>
"##,
                self.width - 150.0,
                legend_y,
                color,
                self.width - 132.0,
                legend_y + 10.0,
                r + 1,
                summary.load,
                instance.capacity()
            ));
            legend_y += 16.0;
        }

        svg.push_str("</svg>");

        svg
    }

    /// Generate convergence plot of the best cost per generation
    pub fn generate_convergence_svg(&self, solution: &Solution) -> String {
        let history = &solution.history;
        let mut svg = String::new();

        let width = self.width;
        let height = 400.0;
        let margin = 60.0;

        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .line {{ stroke: #3498db; stroke-width: 2; fill: none; }}
    .axis {{ stroke: #2c3e50; stroke-width: 1; }}
    .label {{ font-family: Arial; font-size: 12px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            width, height, width, height
        ));

        svg.push_str(&format!(
            r#"<text x="{}" y="25" class="title">Convergence - {} (seed {})</text>
"#,
            margin,
            escape_xml(&solution.algorithm),
            solution.seed
        ));

        let plot_width = width - 2.0 * margin;
        let plot_height = height - 2.0 * margin;

        svg.push_str(&format!(
            r##"<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<line x1="{}" y1="{}" x2="{}" y2="{}" class="axis"/>
<text x="{}" y="{}" class="label" text-anchor="middle">Generation</text>
"##,
            margin,
            height - margin,
            width - margin,
            height - margin,
            margin,
            margin,
            margin,
            height - margin,
            width / 2.0,
            height - margin / 3.0
        ));

        if history.is_empty() {
            svg.push_str("</svg>");
            return svg;
        }

        let finite = || history.iter().copied().filter(|c| c.is_finite());
        let y_min = finite().fold(f64::INFINITY, f64::min);
        let y_max = finite().fold(f64::NEG_INFINITY, f64::max);
        let y_span = (y_max - y_min).max(1e-9);
        let x_scale = plot_width / (history.len().saturating_sub(1)).max(1) as f64;

        svg.push_str(&format!(
            r##"<text x="{}" y="{}" class="label" text-anchor="end">{:.2}</text>
<text x="{}" y="{}" class="label" text-anchor="end">{:.2}</text>
<text x="{}" y="{}" class="label" text-anchor="end">{}</text>
"##,
            margin - 5.0,
            margin + 4.0,
            y_max,
            margin - 5.0,
            height - margin + 4.0,
            y_min,
            width - margin,
            height - margin + 16.0,
            history.len() - 1
        ));

        let mut path = String::new();
        for (i, &cost) in history.iter().enumerate() {
            let x = margin + i as f64 * x_scale;
            let y = margin + (y_max - cost.clamp(y_min, y_max)) / y_span * plot_height;

            if path.is_empty() {
                path.push_str(&format!("M {:.2} {:.2}", x, y));
            } else {
                path.push_str(&format!(" L {:.2} {:.2}", x, y));
            }
        }

        svg.push_str(&format!(
            r##"<path d="{}" class="line"/>
"##,
            path
        ));

        svg.push_str("</svg>");

        svg
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG, natively with the `resvg` feature, otherwise through an
    /// external converter (`rsvg-convert`, then `magick`, then `inkscape`).
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let path = path.as_ref();

        #[cfg(feature = "resvg")]
        {
            let utree = usvg::Tree::from_str(svg, &usvg::Options::default())
                .map_err(|e| render_error(format!("usvg parse error: {}", e)))?;
            let rtree = resvg::Tree::from_usvg(&utree);

            let w = utree.size.width().ceil() as u32;
            let h = utree.size.height().ceil() as u32;
            let mut pixmap = Pixmap::new(w.max(1), h.max(1)).ok_or_else(|| render_error("failed to create pixmap"))?;
            rtree.render(Transform::default(), &mut pixmap.as_mut());
            pixmap
                .save_png(path)
                .map_err(|e| render_error(format!("save_png failed: {}", e)))?;
            return Ok(());
        }

        #[cfg(not(feature = "resvg"))]
        {
            let tmp_svg = path.with_extension("svg.tmp");
            self.save_svg(svg, &tmp_svg)?;

            let src_path = tmp_svg.to_string_lossy().into_owned();
            let dst_path = path.to_string_lossy().into_owned();
            let (src, dst) = (src_path.as_str(), dst_path.as_str());
            let converters: [(&str, Vec<&str>); 3] = [
                ("rsvg-convert", vec!["-o", dst, src]),
                ("magick", vec!["convert", src, dst]),
                ("inkscape", vec![src, "--export-type=png", "--export-filename", dst]),
            ];

            for (program, args) in &converters {
                if let Ok(status) = Command::new(program).args(args).status() {
                    if status.success() {
                        let _ = std::fs::remove_file(&tmp_svg);
                        return Ok(());
                    }
                }
                log::debug!("{} could not convert {}", program, src);
            }

            let _ = std::fs::remove_file(&tmp_svg);
            Err(render_error(
                "no SVG->PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
            ))
        }
    }

    /// Export data for external plotting (e.g., matplotlib)
    pub fn export_plot_data(&self, instance: &CvrpInstance, solution: &Solution) -> String {
        let mut data = String::new();

        data.push_str("# CVRP Solution Data\n");
        data.push_str(&format!("# Instance: {}\n", instance.name));
        data.push_str(&format!("# Cost: {:.2}\n", solution.cost));
        data.push_str(&format!("# Capacity: {}\n", instance.capacity()));
        data.push_str(&format!("# Feasible: {}\n\n", solution.feasible));

        data.push_str("# Nodes: id, latitude, longitude, demand\n");
        for node in instance.nodes() {
            data.push_str(&format!(
                "{},{},{},{}\n",
                node.id, node.location.latitude, node.location.longitude, node.demand
            ));
        }

        data.push_str("\n# Routes: sequence of customer ids (depot implied at both ends)\n");
        for route in solution.route_ids(instance) {
            let ids: Vec<&str> = route.iter().map(|id| id.as_str()).collect();
            data.push_str(&ids.join(","));
            data.push('\n');
        }

        data.push_str("\n# History: best cost per generation\n");
        let history: Vec<String> = solution.history.iter().map(|c| c.to_string()).collect();
        data.push_str(&history.join(","));
        data.push('\n');

        data
    }
}

/// Write the route map and the convergence plot (SVG, plus PNG when a renderer
/// is available) into `dir`
pub fn render_solution<P: AsRef<Path>>(instance: &CvrpInstance, solution: &Solution, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let viz = Visualizer::new();
    let plots = [
        ("routes", viz.generate_svg(instance, solution)),
        ("convergence", viz.generate_convergence_svg(solution)),
    ];

    for (name, svg) in &plots {
        viz.save_svg(svg, dir.join(format!("{}.svg", name)))?;
        if let Err(e) = viz.save_png(svg, dir.join(format!("{}.png", name))) {
            log::warn!("PNG export of {} skipped: {}", name, e);
        }
    }

    std::fs::write(dir.join("plot_data.txt"), viz.export_plot_data(instance, solution))?;
    log::info!("Visualizations written to {}", dir.display());
    Ok(())
}

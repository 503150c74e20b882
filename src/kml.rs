//! Very simple functions for producing KML files specifically suited to this crate and the
//! programs that use it.
//!
//! This is not a general KML solution. It only implements the handful of elements needed to put
//! fences and alert placemarks on a map, with a streaming API where the caller is responsible for
//! closing the tags it opens.

use crate::{
    alert_database::AlertRecord,
    geo::{self, Coord},
    geofence::{FenceRegion, Geofence},
    FenceWatchResult,
};
use chrono::{DateTime, Utc};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// How many segments to use when tracing a circle fence outline.
const CIRCLE_SEGMENTS: u32 = 64;

pub struct KmlFile(BufWriter<File>);

impl KmlFile {
    pub fn new<P: AsRef<Path>>(pth: P) -> FenceWatchResult<Self> {
        let p = pth.as_ref();

        let f = std::fs::File::create(p)?;
        let mut new = KmlFile(BufWriter::new(f));
        new.start_document()?;
        Ok(new)
    }
}

impl KmlWriter for KmlFile {
    fn output(&mut self) -> &mut dyn Write {
        &mut self.0
    }
}

impl Drop for KmlFile {
    fn drop(&mut self) {
        self.finish_document();
    }
}

pub trait KmlWriter {
    fn output(&mut self) -> &mut dyn Write;

    /// Open a file for output and start by putting the header out.
    fn start_document(&mut self) -> FenceWatchResult<()> {
        const HEADER: &str = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "\n",
            r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#,
            "\n",
            "<Document>\n"
        );

        self.output().write_all(HEADER.as_bytes())?;

        Ok(())
    }

    /// Close a document.
    fn finish_document(&mut self) {
        const FOOTER: &str = concat!(r#"</Document>"#, "\n", r#"</kml>"#, "\n");
        let _ = self.output().write_all(FOOTER.as_bytes());
    }

    /// Write a description element to the file.
    fn write_description(&mut self, description: &str) -> FenceWatchResult<()> {
        writeln!(
            self.output(),
            "<description><![CDATA[{}]]></description>",
            description
        )?;
        Ok(())
    }

    /// Start a KML folder.
    fn start_folder(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        is_open: bool,
    ) -> FenceWatchResult<()> {
        self.output().write_all("<Folder>\n".as_bytes())?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if is_open {
            self.output().write_all("<open>1</open>\n".as_bytes())?;
        }

        Ok(())
    }

    /// Close out a folder element
    fn finish_folder(&mut self) -> FenceWatchResult<()> {
        writeln!(self.output(), "</Folder>")?;
        Ok(())
    }

    /// Start a placemark element.
    fn start_placemark(
        &mut self,
        name: Option<&str>,
        description: Option<&str>,
        style_url: Option<&str>,
    ) -> FenceWatchResult<()> {
        writeln!(self.output(), "<Placemark>")?;

        if let Some(name) = name {
            writeln!(self.output(), "<name>{}</name>", name)?;
        }

        if let Some(description) = description {
            self.write_description(description)?;
        }

        if let Some(style_url) = style_url {
            writeln!(self.output(), "<styleUrl>{}</styleUrl>", style_url)?;
        }

        Ok(())
    }

    /// Close out a placemark element.
    fn finish_placemark(&mut self) -> FenceWatchResult<()> {
        writeln!(self.output(), "</Placemark>")?;
        Ok(())
    }

    /// Start a style definition.
    fn start_style(&mut self, style_id: Option<&str>) -> FenceWatchResult<()> {
        if let Some(style_id) = style_id {
            writeln!(self.output(), "<Style id=\"{}\">", style_id)?;
        } else {
            writeln!(self.output(), "<Style>")?;
        }
        Ok(())
    }

    /// Close out a style definition.
    fn finish_style(&mut self) -> FenceWatchResult<()> {
        writeln!(self.output(), "</Style>")?;
        Ok(())
    }

    /// Create a PolyStyle element.
    ///
    /// These should ONLY go inside a style element.
    fn create_poly_style(
        &mut self,
        color: Option<&str>,
        filled: bool,
        outlined: bool,
    ) -> FenceWatchResult<()> {
        writeln!(self.output(), "<PolyStyle>")?;

        if let Some(color) = color {
            writeln!(self.output(), "<color>{}</color>", color)?;
            writeln!(self.output(), "<colorMode>normal</colorMode>")?;
        } else {
            writeln!(self.output(), "<colorMode>random</colorMode>")?;
        }

        let filled = if filled { 1 } else { 0 };
        let outlined = if outlined { 1 } else { 0 };

        writeln!(self.output(), "<fill>{}</fill>", filled)?;
        writeln!(self.output(), "<outline>{}</outline>", outlined)?;

        writeln!(self.output(), "</PolyStyle>")?;
        Ok(())
    }

    /// Create an IconStyle element.
    fn create_icon_style(&mut self, icon_url: Option<&str>, scale: f64) -> FenceWatchResult<()> {
        writeln!(self.output(), "<IconStyle>")?;

        if scale > 0.0 {
            writeln!(self.output(), "<scale>{}</scale>", scale)?;
        } else {
            writeln!(self.output(), "<scale>1</scale>")?;
        }

        if let Some(icon_url) = icon_url {
            writeln!(self.output(), "<Icon><href>{}</href></Icon>", icon_url)?;
        }

        writeln!(self.output(), "</IconStyle>")?;
        Ok(())
    }

    /// Write out a TimeStamp element.
    fn timestamp(&mut self, when: DateTime<Utc>) -> FenceWatchResult<()> {
        writeln!(
            self.output(),
            "<TimeStamp><when>{}</when></TimeStamp>",
            when.format("%Y-%m-%dT%H:%M:%S.000Z")
        )?;
        Ok(())
    }

    /// Start a Polygon element.
    fn start_polygon(&mut self, altitude_mode: Option<&str>) -> FenceWatchResult<()> {
        self.output().write_all("<Polygon>\n".as_bytes())?;

        if let Some(altitude_mode) = altitude_mode {
            debug_assert!(
                altitude_mode == "clampToGround"
                    || altitude_mode == "relativeToGround"
                    || altitude_mode == "absolute"
            );

            writeln!(
                self.output(),
                "<altitudeMode>{}</altitudeMode>",
                altitude_mode
            )?;
        }

        Ok(())
    }

    /// Close out a Polygon element.
    fn finish_polygon(&mut self) -> FenceWatchResult<()> {
        self.output().write_all("</Polygon>\n".as_bytes())?;
        Ok(())
    }

    /// Start the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    fn polygon_start_outer_ring(&mut self) -> FenceWatchResult<()> {
        self.output().write_all("<outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// End the polygon outer ring.
    ///
    /// This should only be used inside a Polygon element.
    fn polygon_finish_outer_ring(&mut self) -> FenceWatchResult<()> {
        self.output().write_all("</outerBoundaryIs>\n".as_bytes())?;
        Ok(())
    }

    /// Start a LinearRing.
    fn start_linear_ring(&mut self) -> FenceWatchResult<()> {
        self.output()
            .write_all("<LinearRing>\n<coordinates>\n".as_bytes())?;
        Ok(())
    }

    /// End a LinearRing.
    fn finish_linear_ring(&mut self) -> FenceWatchResult<()> {
        self.output()
            .write_all("</coordinates>\n</LinearRing>\n".as_bytes())?;
        Ok(())
    }

    /// Add a vertex to the LinearRing
    ///
    /// Must be used inside a linear ring element.
    fn linear_ring_add_vertex(&mut self, lat: f64, lon: f64, z: f64) -> FenceWatchResult<()> {
        writeln!(self.output(), "{},{},{}", lon, lat, z)?;
        Ok(())
    }

    /// Write out a KML Point element
    fn create_point(&mut self, lat: f64, lon: f64, z: f64) -> FenceWatchResult<()> {
        writeln!(
            self.output(),
            "<Point>\n<coordinates>{},{},{}</coordinates>\n</Point>",
            lon,
            lat,
            z
        )?;
        Ok(())
    }
}

impl Geofence {
    /// Write this fence out as a placemark with its boundary polygon.
    ///
    /// Circle fences are traced as a 64 segment ring. A fence that is not yet evaluable has no
    /// geometry worth drawing and is skipped entirely.
    pub fn kml_write(&self, out: &mut dyn KmlWriter) -> FenceWatchResult<()> {
        let ring = match &self.region {
            FenceRegion::Polygon { vertices } => {
                if vertices.len() < 3 {
                    return Ok(());
                }
                vertices.clone()
            }
            FenceRegion::Circle { center, radius } => {
                let (center, radius) = match (center, radius) {
                    (Some(c), Some(r)) => (*c, *r),
                    _ => return Ok(()),
                };

                (0..CIRCLE_SEGMENTS)
                    .map(|i| {
                        let bearing = f64::from(i) * 360.0 / f64::from(CIRCLE_SEGMENTS);
                        geo::destination(center, bearing, radius)
                    })
                    .collect()
            }
        };

        out.start_placemark(Some(&self.name), None, None)?;

        out.start_style(None)?;
        out.create_poly_style(Some(&kml_color(&self.style.fill_color)), true, true)?;
        out.finish_style()?;

        out.start_polygon(Some("clampToGround"))?;
        out.polygon_start_outer_ring()?;
        out.start_linear_ring()?;

        for vertex in &ring {
            out.linear_ring_add_vertex(vertex.lat, vertex.lon, 0.0)?;
        }
        // Close the loop.
        out.linear_ring_add_vertex(ring[0].lat, ring[0].lon, 0.0)?;

        out.finish_linear_ring()?;
        out.polygon_finish_outer_ring()?;
        out.finish_polygon()?;

        out.finish_placemark()?;

        Ok(())
    }
}

impl AlertRecord {
    /// Write this alert out as a point placemark at the offending position.
    pub fn kml_write(&self, out: &mut dyn KmlWriter, style_url: &str) -> FenceWatchResult<()> {
        out.start_placemark(Some(&self.device_name), Some(&self.message), Some(style_url))?;
        out.timestamp(self.timestamp)?;

        let Coord { lat, lon } = self.coordinates;
        out.create_point(lat, lon, 0.0)?;

        out.finish_placemark()?;

        Ok(())
    }
}

/// Convert a "#RRGGBB" style color into KML's aabbggrr form with a fixed half-opaque alpha.
///
/// Malformed colors fall back to a translucent red rather than erroring; styling is cosmetic.
fn kml_color(css: &str) -> String {
    let hex = css.strip_prefix('#').unwrap_or(css);

    if hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        let hex = hex.to_ascii_lowercase();
        format!("7f{}{}{}", &hex[4..6], &hex[2..4], &hex[0..2])
    } else {
        "7f0000ff".to_owned()
    }
}

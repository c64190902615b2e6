use exif::{Exif, In, Reader, Tag, Value};
use image::ImageReader;
use shared::GpsCoordinates;
use std::io::Cursor;

pub const NO_METADATA_PLACEHOLDER: &str = "No EXIF metadata found.";

const MAX_VALUE_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataReport {
    /// HTML fragment rendered by the upload page.
    pub html: String,
    pub coordinates: Option<GpsCoordinates>,
}

impl MetadataReport {
    pub fn unavailable() -> Self {
        Self {
            html: NO_METADATA_PLACEHOLDER.to_string(),
            coordinates: None,
        }
    }
}

pub fn map_url(coordinates: &GpsCoordinates) -> String {
    format!(
        "https://www.google.com/maps?q={:.6},{:.6}",
        coordinates.latitude, coordinates.longitude
    )
}

/// Reads EXIF tags from `content`. Undecodable input and images without tags
/// both produce [`MetadataReport::unavailable`].
pub fn extract_metadata(content: &[u8]) -> MetadataReport {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(content)) {
        Ok(exif) => exif,
        Err(e) => {
            log::debug!("No readable EXIF block: {}", e);
            return MetadataReport::unavailable();
        }
    };

    let mut lines = Vec::new();
    if let Some((width, height)) = image_dimensions(content) {
        lines.push(format_line("Dimensions", &format!("{} x {} px", width, height)));
    }

    let mut tag_count = 0;
    for field in exif.fields() {
        if field.ifd_num == In::THUMBNAIL {
            continue;
        }
        tag_count += 1;
        let value = field.display_value().with_unit(&exif).to_string();
        lines.push(format_line(&field.tag.to_string(), &truncate(&value)));
    }

    if tag_count == 0 {
        log::debug!("EXIF block present but carries no primary tags");
        return MetadataReport::unavailable();
    }

    let coordinates = gps_coordinates(&exif);
    if let Some(coords) = &coordinates {
        lines.push(format!(
            "<strong>GPS Coordinates:</strong> {:.6}, {:.6} (<a href=\"{}\" target=\"_blank\">View on map</a>)<br>",
            coords.latitude,
            coords.longitude,
            escape_html(&map_url(coords))
        ));
    }

    MetadataReport {
        html: lines.concat(),
        coordinates,
    }
}

/// Converts a degrees/minutes/seconds triple to signed decimal degrees.
/// `S` and `W` references are negative; any other reference is rejected.
pub fn dms_to_decimal(dms: [f64; 3], reference: char) -> Option<f64> {
    if dms.iter().any(|part| !part.is_finite()) {
        return None;
    }
    let decimal = dms[0] + dms[1] / 60.0 + dms[2] / 3600.0;
    match reference.to_ascii_uppercase() {
        'N' | 'E' => Some(decimal),
        'S' | 'W' => Some(-decimal),
        _ => None,
    }
}

fn gps_coordinates(exif: &Exif) -> Option<GpsCoordinates> {
    let latitude = gps_component(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
    let longitude = gps_component(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
    Some(GpsCoordinates {
        latitude,
        longitude,
    })
}

fn gps_component(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let dms = match &exif.get_field(value_tag, In::PRIMARY)?.value {
        Value::Rational(parts) if parts.len() >= 3 => {
            [parts[0].to_f64(), parts[1].to_f64(), parts[2].to_f64()]
        }
        _ => return None,
    };
    let reference = match &exif.get_field(ref_tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values.first().and_then(|v| v.first()).map(|b| *b as char)?,
        _ => return None,
    };
    dms_to_decimal(dms, reference)
}

fn image_dimensions(content: &[u8]) -> Option<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(content))
        .with_guessed_format()
        .ok()?;
    reader.format()?;
    reader.into_dimensions().ok()
}

fn format_line(label: &str, value: &str) -> String {
    format!(
        "<strong>{}:</strong> {}<br>",
        escape_html(label),
        escape_html(value)
    )
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(MAX_VALUE_CHARS).collect();
    cut.push_str("...");
    cut
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, Rational};

    fn ascii(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    fn dms(tag: Tag, d: u32, m: u32, s: u32) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Rational(vec![
                Rational { num: d, denom: 1 },
                Rational { num: m, denom: 1 },
                Rational { num: s, denom: 1 },
            ]),
        }
    }

    fn write_tiff(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        buf.into_inner()
    }

    /// TIFF bytes tagged as shot at 40°26'46"N, 79°58'56"W.
    pub(crate) fn tiff_with_gps() -> Vec<u8> {
        write_tiff(&[
            ascii(Tag::Make, "TestCam <Pro>"),
            ascii(Tag::GPSLatitudeRef, "N"),
            dms(Tag::GPSLatitude, 40, 26, 46),
            ascii(Tag::GPSLongitudeRef, "W"),
            dms(Tag::GPSLongitude, 79, 58, 56),
        ])
    }

    #[test]
    fn dms_conversion_signs_by_hemisphere() {
        let lat = dms_to_decimal([40.0, 26.0, 46.0], 'N').unwrap();
        let lon = dms_to_decimal([79.0, 58.0, 56.0], 'W').unwrap();
        assert!((lat - 40.4461).abs() < 1e-4);
        assert!((lon + 79.9822).abs() < 1e-4);
        assert!(dms_to_decimal([33.0, 52.0, 4.0], 's').unwrap() < 0.0);
        assert_eq!(dms_to_decimal([1.0, 0.0, 0.0], 'X'), None);
        assert_eq!(dms_to_decimal([1.0, f64::NAN, 0.0], 'N'), None);
    }

    #[test]
    fn gps_block_yields_coordinates_and_map_link() {
        let report = extract_metadata(&tiff_with_gps());

        let coords = report.coordinates.expect("coordinates");
        assert!((coords.latitude - 40.4461).abs() < 1e-4);
        assert!((coords.longitude + 79.9822).abs() < 1e-4);
        assert!(report.html.contains("<strong>Make:</strong>"));
        assert!(report.html.contains("TestCam &lt;Pro&gt;"));
        assert!(report.html.contains("https://www.google.com/maps?q=40.446111,-79.982222"));
        assert_eq!(
            map_url(&coords),
            "https://www.google.com/maps?q=40.446111,-79.982222"
        );
    }

    #[test]
    fn latitude_without_longitude_has_no_map_link() {
        let bytes = write_tiff(&[
            ascii(Tag::Make, "TestCam"),
            ascii(Tag::GPSLatitudeRef, "N"),
            dms(Tag::GPSLatitude, 40, 26, 46),
        ]);
        let report = extract_metadata(&bytes);

        assert!(report.coordinates.is_none());
        assert!(report.html.contains("<strong>Make:</strong>"));
        assert!(!report.html.contains("google.com/maps"));
    }

    #[test]
    fn image_without_exif_gets_placeholder() {
        let mut png = Cursor::new(Vec::new());
        image::RgbImage::new(4, 4)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();

        let report = extract_metadata(png.get_ref());
        assert_eq!(report, MetadataReport::unavailable());
        assert!(!report.html.contains("google.com/maps"));
    }

    #[test]
    fn garbage_bytes_get_placeholder() {
        let report = extract_metadata(b"definitely not an image");
        assert_eq!(report.html, NO_METADATA_PLACEHOLDER);
        assert!(report.coordinates.is_none());
    }
}

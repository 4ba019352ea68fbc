//! Reader for `.pcd` point cloud files (ascii and binary bodies).
//!
//! Only the x, y, z fields are extracted. Points with NaN coordinates are
//! kept so that point indices match the file.

use std::path::Path;

use nalgebra as na;

use crate::error::{SyncError, SyncResult};
use crate::store::PointCloudDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataFormat {
    Ascii,
    Binary,
}

#[derive(Debug, Clone)]
struct Field {
    name: String,
    size: usize,
    kind: char,
    count: usize,
}

#[derive(Debug, Clone)]
struct Header {
    fields: Vec<Field>,
    points: usize,
    /// Bytes per binary record.
    stride: usize,
    data: DataFormat,
}

impl Header {

    /// Byte offset (binary) and value offset (ascii) of field `name`.
    fn offsets(&self, name: &str) -> SyncResult<(usize, usize, &Field)> {
        let mut bytes = 0;
        let mut values = 0;
        for f in &self.fields {
            if f.name == name {
                return Ok((bytes, values, f));
            }
            bytes += f.size * f.count;
            values += f.count;
        }
        Err(SyncError::Decode(format!("pcd has no '{}' field", name)))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PcdDecoder;

impl PointCloudDecoder for PcdDecoder {
    fn decode(&self, path: &Path) -> SyncResult<Vec<na::Point3<f64>>> {
        let bytes = std::fs::read(path)?;
        let points = parse_pcd(&bytes)?;
        log::trace!("decoded {} points from {}", points.len(), path.display());
        Ok(points)
    }
}

pub fn parse_pcd(bytes: &[u8]) -> SyncResult<Vec<na::Point3<f64>>> {
    let (header, body) = parse_header(bytes)?;
    match header.data {
        DataFormat::Ascii => parse_ascii(&header, body),
        DataFormat::Binary => parse_binary(&header, body),
    }
}

fn parse_header(bytes: &[u8]) -> SyncResult<(Header, &[u8])> {
    let mut names: Vec<String> = Vec::new();
    let mut sizes: Vec<usize> = Vec::new();
    let mut kinds: Vec<char> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut width = 0usize;
    let mut height = 1usize;
    let mut points: Option<usize> = None;

    let mut offset = 0;
    while offset < bytes.len() {
        let end = bytes[offset..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| offset + p);
        let line = std::str::from_utf8(&bytes[offset..end])
            .map_err(|_| SyncError::Decode("pcd header is not utf-8".into()))?
            .trim();
        offset = (end + 1).min(bytes.len());
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let key = tokens.next().unwrap_or_default().to_ascii_uppercase();
        let values: Vec<&str> = tokens.collect();
        match key.as_str() {
            "FIELDS" => names = values.iter().map(|s| s.to_string()).collect(),
            "SIZE" => sizes = parse_list(&values, "SIZE")?,
            "TYPE" => {
                kinds = values
                    .iter()
                    .map(|s| s.chars().next().unwrap_or('?').to_ascii_uppercase())
                    .collect()
            }
            "COUNT" => counts = parse_list(&values, "COUNT")?,
            "WIDTH" => width = parse_one(&values, "WIDTH")?,
            "HEIGHT" => height = parse_one(&values, "HEIGHT")?,
            "POINTS" => points = Some(parse_one(&values, "POINTS")?),
            "DATA" => {
                let data = match values.first().map(|s| s.to_ascii_lowercase()).as_deref() {
                    Some("ascii") => DataFormat::Ascii,
                    Some("binary") => DataFormat::Binary,
                    Some(other) => {
                        return Err(SyncError::Decode(format!(
                            "unsupported pcd data format '{}'",
                            other
                        )));
                    }
                    None => return Err(SyncError::Decode("DATA line without format".into())),
                };
                if counts.is_empty() {
                    counts = vec![1; names.len()];
                }
                if sizes.len() != names.len()
                    || kinds.len() != names.len()
                    || counts.len() != names.len()
                {
                    return Err(SyncError::Decode(
                        "FIELDS, SIZE, TYPE and COUNT lengths differ".into(),
                    ));
                }
                let fields: Vec<Field> = names
                    .into_iter()
                    .zip(sizes)
                    .zip(kinds)
                    .zip(counts)
                    .map(|(((name, size), kind), count)| Field {
                        name,
                        size,
                        kind,
                        count,
                    })
                    .collect();
                let points = match points {
                    Some(points) => points,
                    None => width
                        .checked_mul(height)
                        .ok_or_else(|| SyncError::Decode("WIDTH * HEIGHT overflows".into()))?,
                };
                let header = Header {
                    stride: record_layout(&fields)?,
                    fields,
                    points,
                    data,
                };
                return Ok((header, &bytes[offset..]));
            }
            // VERSION, VIEWPOINT
            _ => {}
        }
    }
    Err(SyncError::Decode("pcd header has no DATA line".into()))
}

/// Bytes per record. Checks that byte and value offsets of every field fit
/// in `usize`.
fn record_layout(fields: &[Field]) -> SyncResult<usize> {
    let overflow = || SyncError::Decode("pcd field layout overflows".into());
    let mut bytes = 0usize;
    let mut values = 0usize;
    for f in fields {
        let len = f.size.checked_mul(f.count).ok_or_else(overflow)?;
        bytes = bytes.checked_add(len).ok_or_else(overflow)?;
        values = values.checked_add(f.count).ok_or_else(overflow)?;
    }
    Ok(bytes)
}

fn parse_list(values: &[&str], key: &str) -> SyncResult<Vec<usize>> {
    values
        .iter()
        .map(|s| {
            s.parse()
                .map_err(|_| SyncError::Decode(format!("invalid {} value '{}'", key, s)))
        })
        .collect()
}

fn parse_one(values: &[&str], key: &str) -> SyncResult<usize> {
    let list = parse_list(values, key)?;
    list.first()
        .copied()
        .ok_or_else(|| SyncError::Decode(format!("{} has no value", key)))
}

fn parse_ascii(header: &Header, body: &[u8]) -> SyncResult<Vec<na::Point3<f64>>> {
    let (_, xi, _) = header.offsets("x")?;
    let (_, yi, _) = header.offsets("y")?;
    let (_, zi, _) = header.offsets("z")?;
    let text = std::str::from_utf8(body)
        .map_err(|_| SyncError::Decode("ascii pcd body is not utf-8".into()))?;
    // the declared count is untrusted, a row needs at least two bytes
    let mut points = Vec::with_capacity(header.points.min(body.len() / 2));
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if points.len() == header.points {
            break;
        }
        let values: Vec<&str> = line.split_whitespace().collect();
        let get = |i: usize| -> SyncResult<f64> {
            let token = values
                .get(i)
                .ok_or_else(|| SyncError::Decode(format!("short pcd row '{}'", line)))?;
            // nan is spelled "nan" by PCL, which f64::from_str accepts
            token
                .parse::<f64>()
                .map_err(|_| SyncError::Decode(format!("invalid number '{}'", token)))
        };
        points.push(na::Point3::new(get(xi)?, get(yi)?, get(zi)?));
    }
    if points.len() != header.points {
        return Err(SyncError::Decode(format!(
            "pcd declares {} points but has {}",
            header.points,
            points.len()
        )));
    }
    Ok(points)
}

fn parse_binary(header: &Header, body: &[u8]) -> SyncResult<Vec<na::Point3<f64>>> {
    let stride = header.stride;
    if stride == 0 {
        return Err(SyncError::Decode("binary pcd records are empty".into()));
    }
    let needed = stride.checked_mul(header.points).ok_or_else(|| {
        SyncError::Decode(format!("pcd declares too many points ({})", header.points))
    })?;
    if body.len() < needed {
        return Err(SyncError::Decode(format!(
            "binary pcd body has {} bytes, {} expected",
            body.len(),
            needed
        )));
    }
    let fx = header.offsets("x")?;
    let fy = header.offsets("y")?;
    let fz = header.offsets("z")?;
    (0..header.points)
        .map(|i| {
            let record = &body[i * stride..(i + 1) * stride];
            Ok(na::Point3::new(
                read_scalar(record, fx.0, fx.2)?,
                read_scalar(record, fy.0, fy.2)?,
                read_scalar(record, fz.0, fz.2)?,
            ))
        })
        .collect()
}

fn read_scalar(record: &[u8], offset: usize, field: &Field) -> SyncResult<f64> {
    let b = &record[offset..offset + field.size];
    let value = match (field.kind, field.size) {
        ('F', 4) => f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        ('F', 8) => f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
        ('I', 1) => i8::from_le_bytes([b[0]]) as f64,
        ('I', 2) => i16::from_le_bytes([b[0], b[1]]) as f64,
        ('I', 4) => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        ('U', 1) => b[0] as f64,
        ('U', 2) => u16::from_le_bytes([b[0], b[1]]) as f64,
        ('U', 4) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
        (kind, size) => {
            return Err(SyncError::Decode(format!(
                "unsupported pcd field '{}' of type {}{}",
                field.name, kind, size
            )));
        }
    };
    Ok(value)
}

/// Serializes points as an ascii pcd with x, y, z float fields.
pub fn write_ascii_pcd(points: &[na::Point3<f64>]) -> String {
    let mut s = String::new();
    s += "# .PCD v0.7 - Point Cloud Data file format\n";
    s += "VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n";
    s += format!("WIDTH {}\nHEIGHT 1\n", points.len()).as_str();
    s += "VIEWPOINT 0 0 0 1 0 0 0\n";
    s += format!("POINTS {}\nDATA ascii\n", points.len()).as_str();
    for p in points {
        s += format!("{} {} {}\n", p.x, p.y, p.z).as_str();
    }
    s
}

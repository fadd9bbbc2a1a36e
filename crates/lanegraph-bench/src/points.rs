//! Point file loading.
//!
//! Accepted formats, detected from the first non-blank character:
//!
//! - JSON array of pairs: `[[x, y], ...]`
//! - JSON object with a `points` array: `{"points": [[x, y], ...]}`
//! - Delimited text: one `x,y` (or `x y`) pair per line; blank lines and
//!   lines starting with `#` are ignored.

use lanegraph_pipeline::Point;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum PointFile {
    Bare(Vec<[f64; 2]>),
    Wrapped { points: Vec<[f64; 2]> },
}

/// Parse the contents of a point file.
pub fn parse_points(text: &str) -> Result<Vec<Point>, String> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let file: PointFile =
            serde_json::from_str(trimmed).map_err(|e| format!("invalid JSON point file: {e}"))?;
        let (PointFile::Bare(pairs) | PointFile::Wrapped { points: pairs }) = file;
        return Ok(pairs.into_iter().map(|[x, y]| Point::new(x, y)).collect());
    }

    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| {
            let point =
                parse_line(line).ok_or_else(|| format!("line {n}: expected `x,y`, got {line:?}"))?;
            if point.is_finite() {
                Ok(point)
            } else {
                Err(format!("line {n}: non-finite coordinate in {line:?}"))
            }
        })
        .collect()
}

fn parse_line(line: &str) -> Option<Point> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty());
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(Point::new(x, y))
}

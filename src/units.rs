use std::fmt;
use std::str::FromStr;

/// Absolute CSS length units understood by both the stylesheet and the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unit {
    Pt,
    Pc,
    Px,
    Mm,
    Cm,
    In,
}

impl Unit {
    fn points_per_unit(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Pc => 12.0,
            Unit::Px => 0.75,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "pt" => Some(Unit::Pt),
            "pc" => Some(Unit::Pc),
            "px" => Some(Unit::Px),
            "mm" => Some(Unit::Mm),
            "cm" => Some(Unit::Cm),
            "in" => Some(Unit::In),
            _ => None,
        }
    }
}

/// A CSS length such as `2.5cm` or `11pt`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f64,
    pub unit: Unit,
}

impl Length {
    pub const fn mm(value: f64) -> Self {
        Self {
            value,
            unit: Unit::Mm,
        }
    }

    pub const fn inches(value: f64) -> Self {
        Self {
            value,
            unit: Unit::In,
        }
    }

    pub fn to_pt(self) -> f64 {
        self.value * self.unit.points_per_unit()
    }
}

impl FromStr for Length {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty length".to_string());
        }

        let split = s
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| format!("`{s}` is not a length"))?;
        if value < 0.0 || !value.is_finite() {
            return Err(format!("`{s}` must be a non-negative length"));
        }

        let unit = if suffix.is_empty() {
            // Only zero may omit its unit
            if value != 0.0 {
                return Err(format!("`{s}` is missing a unit"));
            }
            Unit::Pt
        } else {
            Unit::from_suffix(suffix).ok_or_else(|| format!("unsupported unit in `{s}`"))?
        };

        Ok(Self { value, unit })
    }
}

/// Format a point value the way Typst expects it.
pub fn format_pt(points: f64) -> String {
    let rounded = format!("{points:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}pt")
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pt(self.to_pt()))
    }
}

/// Physical page dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: Length,
    pub height: Length,
}

fn named_page_size(name: &str) -> Option<PageSize> {
    let (w, h) = match name.to_ascii_lowercase().as_str() {
        "a0" => (Length::mm(841.0), Length::mm(1189.0)),
        "a1" => (Length::mm(594.0), Length::mm(841.0)),
        "a2" => (Length::mm(420.0), Length::mm(594.0)),
        "a3" => (Length::mm(297.0), Length::mm(420.0)),
        "a4" => (Length::mm(210.0), Length::mm(297.0)),
        "a5" => (Length::mm(148.0), Length::mm(210.0)),
        "a6" => (Length::mm(105.0), Length::mm(148.0)),
        "b4" => (Length::mm(250.0), Length::mm(353.0)),
        "b5" => (Length::mm(176.0), Length::mm(250.0)),
        "letter" => (Length::inches(8.5), Length::inches(11.0)),
        "legal" => (Length::inches(8.5), Length::inches(14.0)),
        "executive" => (Length::inches(7.25), Length::inches(10.5)),
        "tabloid" => (Length::inches(11.0), Length::inches(17.0)),
        _ => return None,
    };
    Some(PageSize {
        width: w,
        height: h,
    })
}

impl FromStr for PageSize {
    type Err = String;

    /// Accepts `A4`, `letter landscape`, `210mm 297mm` and similar.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();

        let orientation = tokens.last().map(|t| t.to_ascii_lowercase());
        let landscape = orientation.as_deref() == Some("landscape");
        if landscape || orientation.as_deref() == Some("portrait") {
            tokens.pop();
        }

        let size = match tokens.as_slice() {
            [name] => named_page_size(name).ok_or_else(|| format!("unknown page size `{name}`"))?,
            [width, height] => PageSize {
                width: width.parse()?,
                height: height.parse()?,
            },
            _ => return Err(format!("`{s}` is not a page size")),
        };

        if landscape && size.width.to_pt() < size.height.to_pt() {
            Ok(PageSize {
                width: size.height,
                height: size.width,
            })
        } else {
            Ok(size)
        }
    }
}
